pub mod compute;
pub mod extract;
pub mod search;
pub mod tile;

use chrono::{Duration, NaiveDate, Utc};

/// Parses an optional `YYYY-MM-DD` argument, defaulting to `lookback_days`
/// before today / today itself.
pub fn date_or_default(value: &Option<String>, lookback_days: i64) -> anyhow::Result<NaiveDate> {
	match value {
		Some(text) => text
			.parse::<NaiveDate>()
			.map_err(|_| vcube_core::EngineError::Validation(format!("'{text}' is not a YYYY-MM-DD date")).into()),
		None => Ok(Utc::now().date_naive() - Duration::days(lookback_days)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_dates_and_defaults() {
		let parsed = date_or_default(&Some("2024-12-01".to_string()), 0).unwrap();
		assert_eq!(parsed, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());

		let today = date_or_default(&None, 0).unwrap();
		let last_year = date_or_default(&None, 365).unwrap();
		assert_eq!(today - last_year, Duration::days(365));
	}

	#[test]
	fn rejects_malformed_dates() {
		assert!(date_or_default(&Some("yesterday".to_string()), 0).is_err());
	}
}
