//! Scene-set reduction: containment filtering, overlap deduplication and
//! temporal subsampling.
//!
//! All functions preserve the relative order of the scenes they keep and are
//! idempotent, so they can be chained and re-applied freely.

use crate::types::{GeoBBox, Scene};
use chrono::{Duration, NaiveDate};
use geo::Contains;

/// Keeps only scenes whose footprint strictly contains the whole AOI.
///
/// Scenes that merely intersect the box are dropped. An AOI that straddles a
/// grid boundary therefore keeps nothing; callers surface that case as a
/// distinct warning before failing with a no-results error.
pub fn retain_containing(scenes: Vec<Scene>, bbox: &GeoBBox) -> Vec<Scene> {
	let aoi = bbox.to_polygon();
	scenes
		.into_iter()
		.filter(|scene| match scene.footprint() {
			Ok(footprint) => footprint.contains(&aoi),
			Err(err) => {
				log::warn!("dropping scene '{}' with unparsable footprint: {err}", scene.id);
				false
			}
		})
		.collect()
}

/// Sentinel-2 overlap removal.
///
/// Counts scenes per MGRS zone (the first two characters of the grid cell in
/// the scene id), keeps only the dominant zone, and within it keeps the first
/// scene per acquisition date tag.
pub fn dedup_sentinel2(scenes: Vec<Scene>) -> Vec<Scene> {
	if scenes.is_empty() {
		return scenes;
	}

	let mut zone_counts: Vec<(String, usize)> = Vec::new();
	for scene in &scenes {
		let zone = scene.mgrs_zone().to_string();
		match zone_counts.iter_mut().find(|(known, _)| *known == zone) {
			Some((_, count)) => *count += 1,
			None => zone_counts.push((zone, 1)),
		}
	}

	// First-seen zone wins ties, like iterating a dict in insertion order.
	let mut max_zone = zone_counts[0].0.clone();
	let mut max_count = zone_counts[0].1;
	for (zone, count) in &zone_counts[1..] {
		if *count > max_count {
			max_zone = zone.clone();
			max_count = *count;
		}
	}

	let mut seen_dates: Vec<String> = Vec::new();
	scenes
		.into_iter()
		.filter(|scene| {
			if scene.mgrs_zone() != max_zone {
				return false;
			}
			let date = scene.acquisition_tag().to_string();
			if seen_dates.contains(&date) {
				false
			} else {
				seen_dates.push(date);
				true
			}
		})
		.collect()
}

/// Landsat overlap removal: one scene per `(date, WRS path, WRS row)`,
/// keeping the least cloudy of each group. Earlier scenes win ties.
pub fn dedup_landsat(scenes: Vec<Scene>) -> Vec<Scene> {
	let mut groups: Vec<(String, Scene)> = Vec::new();
	for scene in scenes {
		let key = format!(
			"{}_{}_{}",
			scene.date(),
			scene.wrs_path.as_deref().unwrap_or(""),
			scene.wrs_row.as_deref().unwrap_or("")
		);
		match groups.iter_mut().find(|(known, _)| *known == key) {
			Some((_, best)) => {
				if scene.cloud_cover < best.cloud_cover {
					*best = scene;
				}
			}
			None => groups.push((key, scene)),
		}
	}
	groups.into_iter().map(|(_, scene)| scene).collect()
}

/// The subsampling cadence in days for a request spanning `total_days`.
pub fn cadence_days(total_days: i64) -> i64 {
	if total_days <= 90 {
		4
	} else if total_days <= 365 {
		15
	} else if total_days <= 730 {
		30
	} else if total_days <= 1095 {
		45
	} else {
		60
	}
}

/// Temporal subsampling ("smart filter"): one scene per cadence bucket.
///
/// Scenes are walked in ascending datetime order. A bucket opens at the first
/// scene's date; within a bucket the least cloudy scene is retained (earlier
/// wins ties); a scene at or beyond bucket start + cadence closes the bucket
/// and opens a new one at its own date.
pub fn smart_filter(mut scenes: Vec<Scene>, start: NaiveDate, end: NaiveDate) -> Vec<Scene> {
	let frequency = Duration::days(cadence_days((end - start).num_days()));
	scenes.sort_by_key(|scene| scene.datetime);

	let mut selected = Vec::new();
	let mut bucket_start: Option<NaiveDate> = None;
	let mut best: Option<Scene> = None;

	for scene in scenes {
		let date = scene.date();
		match bucket_start {
			Some(opened) if date < opened + frequency => {
				if let Some(current) = &best {
					if scene.cloud_cover < current.cloud_cover {
						best = Some(scene);
					}
				}
			}
			_ => {
				if let Some(done) = best.take() {
					selected.push(done);
				}
				bucket_start = Some(date);
				best = Some(scene);
			}
		}
	}
	if let Some(done) = best {
		selected.push(done);
	}
	selected
}

/// The most recent scene per grid cell, used by the single-shot tile path.
pub fn latest_per_grid(scenes: Vec<Scene>) -> Vec<Scene> {
	let mut latest: Vec<(String, Scene)> = Vec::new();
	for scene in scenes {
		let grid = scene.grid_cell().to_string();
		match latest.iter_mut().find(|(known, _)| *known == grid) {
			Some((_, newest)) => {
				if scene.datetime > newest.datetime {
					*newest = scene;
				}
			}
			None => latest.push((grid, scene)),
		}
	}
	latest.into_iter().map(|(_, scene)| scene).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::scene_fixtures::scene;

	fn ids(scenes: &[Scene]) -> Vec<&str> {
		scenes.iter().map(|s| s.id.as_str()).collect()
	}

	#[test]
	fn containment_is_strict() {
		let aoi = GeoBBox::new(-1.0, -1.0, 1.0, 1.0).unwrap();
		let scenes = vec![
			scene("S2A_45RVL_20241201_0_L2A", "2024-12-01T05:00:00Z", 10.0, 2.0),
			// footprint only touches the AOI corner
			scene("S2A_44RVL_20241202_0_L2A", "2024-12-02T05:00:00Z", 10.0, 0.5),
		];
		let kept = retain_containing(scenes, &aoi);
		assert_eq!(ids(&kept), ["S2A_45RVL_20241201_0_L2A"]);
	}

	#[test]
	fn containment_is_idempotent() {
		let aoi = GeoBBox::new(-1.0, -1.0, 1.0, 1.0).unwrap();
		let scenes = vec![
			scene("S2A_45RVL_20241201_0_L2A", "2024-12-01T05:00:00Z", 10.0, 2.0),
			scene("S2A_45RVL_20241205_0_L2A", "2024-12-05T05:00:00Z", 10.0, 3.0),
		];
		let once = retain_containing(scenes, &aoi);
		let twice = retain_containing(once.clone(), &aoi);
		assert_eq!(ids(&once), ids(&twice));
	}

	#[test]
	fn sentinel2_dedup_keeps_dominant_zone_one_scene_per_date() {
		let scenes = vec![
			scene("S2A_45RVL_20241201_0_L2A", "2024-12-01T05:00:00Z", 10.0, 2.0),
			scene("S2B_44RVL_20241201_0_L2A", "2024-12-01T05:10:00Z", 5.0, 2.0),
			scene("S2A_45RVL_20241206_0_L2A", "2024-12-06T05:00:00Z", 20.0, 2.0),
			scene("S2A_45RWL_20241206_1_L2A", "2024-12-06T05:00:10Z", 1.0, 2.0),
		];
		let kept = dedup_sentinel2(scenes);
		// zone 45 has three scenes, zone 44 one; 2024-12-06 appears once
		assert_eq!(ids(&kept), ["S2A_45RVL_20241201_0_L2A", "S2A_45RVL_20241206_0_L2A"]);
	}

	#[test]
	fn sentinel2_dedup_is_idempotent() {
		let scenes = vec![
			scene("S2A_45RVL_20241201_0_L2A", "2024-12-01T05:00:00Z", 10.0, 2.0),
			scene("S2A_45RVL_20241206_0_L2A", "2024-12-06T05:00:00Z", 20.0, 2.0),
		];
		let once = dedup_sentinel2(scenes);
		let twice = dedup_sentinel2(once.clone());
		assert_eq!(ids(&once), ids(&twice));
	}

	#[test]
	fn landsat_dedup_picks_least_cloudy_per_cell() {
		let mut a = scene("LC08_L2SP_142040_20241201_02_T1", "2024-12-01T04:50:00Z", 40.0, 3.0);
		a.wrs_path = Some("142".to_string());
		a.wrs_row = Some("40".to_string());
		let mut b = a.clone();
		b.id = "LC09_L2SP_142040_20241201_02_T1".to_string();
		b.cloud_cover = 15.0;
		let mut c = a.clone();
		c.id = "LC08_L2SP_142041_20241201_02_T1".to_string();
		c.wrs_row = Some("41".to_string());

		let kept = dedup_landsat(vec![a, b, c]);
		assert_eq!(
			ids(&kept),
			["LC09_L2SP_142040_20241201_02_T1", "LC08_L2SP_142041_20241201_02_T1"]
		);
	}

	#[test]
	fn landsat_dedup_is_idempotent() {
		let mut a = scene("LC08_L2SP_142040_20241201_02_T1", "2024-12-01T04:50:00Z", 40.0, 3.0);
		a.wrs_path = Some("142".to_string());
		a.wrs_row = Some("40".to_string());
		let mut b = a.clone();
		b.id = "LC09_L2SP_142040_20241201_02_T1".to_string();
		b.cloud_cover = 15.0;

		let once = dedup_landsat(vec![a, b]);
		let twice = dedup_landsat(once.clone());
		assert_eq!(ids(&once), ids(&twice));
	}

	#[test]
	fn cadence_table() {
		assert_eq!(cadence_days(60), 4);
		assert_eq!(cadence_days(90), 4);
		assert_eq!(cadence_days(200), 15);
		assert_eq!(cadence_days(500), 30);
		assert_eq!(cadence_days(900), 45);
		assert_eq!(cadence_days(1500), 60);
	}

	fn daily_scenes(count: u32) -> Vec<Scene> {
		(0..count)
			.map(|i| {
				let day = 1 + i;
				scene(
					&format!("S2A_45RVL_202401{day:02}_0_L2A"),
					&format!("2024-01-{day:02}T05:00:00Z"),
					(i % 7) as f64,
					2.0,
				)
			})
			.collect()
	}

	#[test]
	fn smart_filter_respects_cadence() {
		let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
		let end = NaiveDate::from_ymd_opt(2024, 1, 29).unwrap();
		let kept = smart_filter(daily_scenes(28), start, end);

		// 28-day span: one scene per 4-day bucket
		assert_eq!(kept.len(), 7);
		for pair in kept.windows(2) {
			let gap = pair[1].date() - pair[0].date();
			assert!(gap >= Duration::days(1), "kept scenes must move forward in time");
		}
	}

	#[test]
	fn smart_filter_keeps_least_cloudy_per_bucket() {
		let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
		let end = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
		let scenes = vec![
			scene("S2A_45RVL_20240101_0_L2A", "2024-01-01T05:00:00Z", 25.0, 2.0),
			scene("S2A_45RVL_20240102_0_L2A", "2024-01-02T05:00:00Z", 3.0, 2.0),
			scene("S2A_45RVL_20240103_0_L2A", "2024-01-03T05:00:00Z", 3.0, 2.0),
			scene("S2A_45RVL_20240108_0_L2A", "2024-01-08T05:00:00Z", 12.0, 2.0),
		];
		let kept = smart_filter(scenes, start, end);
		// first bucket: ties resolve to the earlier scene
		assert_eq!(ids(&kept), ["S2A_45RVL_20240102_0_L2A", "S2A_45RVL_20240108_0_L2A"]);
	}

	#[test]
	fn smart_filter_length_is_monotone_in_span() {
		let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
		let scenes = daily_scenes(28);

		let mut last_len = usize::MAX;
		for span in [28, 120, 400, 800, 1200] {
			let end = start + Duration::days(span);
			let kept = smart_filter(scenes.clone(), start, end);
			assert!(kept.len() <= last_len, "longer spans must not keep more scenes");
			last_len = kept.len();
		}
	}

	#[test]
	fn latest_per_grid_keeps_newest() {
		let scenes = vec![
			scene("S2A_45RVL_20241201_0_L2A", "2024-12-01T05:00:00Z", 10.0, 2.0),
			scene("S2A_45RVL_20241211_0_L2A", "2024-12-11T05:00:00Z", 50.0, 2.0),
			scene("S2A_44RVL_20241215_0_L2A", "2024-12-15T05:00:00Z", 5.0, 2.0),
		];
		let kept = latest_per_grid(scenes);
		assert_eq!(ids(&kept), ["S2A_45RVL_20241211_0_L2A", "S2A_44RVL_20241215_0_L2A"]);
	}
}
