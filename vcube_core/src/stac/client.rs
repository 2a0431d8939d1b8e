use super::query::{self, SearchQuery};
use crate::error::EngineError;
use crate::types::{Scene, Sensor};
use anyhow::Result;
use serde_json::Value;

/// Async STAC client for the request tier.
///
/// Every page fetch is a suspension point; pagination follows the `rel=next`
/// links exactly as the catalog returns them. Any non-2xx answer fails the
/// search with a [`EngineError::Catalog`] carrying the response verbatim.
#[derive(Clone, Debug, Default)]
pub struct CatalogClient {
	http: reqwest::Client,
}

impl CatalogClient {
	pub fn new() -> CatalogClient {
		CatalogClient {
			http: reqwest::Client::new(),
		}
	}

	pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Scene>> {
		let search_url = query.search_url();
		let mut url = search_url.clone();
		let mut method = "POST".to_string();
		let mut body = Some(query.body());
		let mut scenes = Vec::new();

		loop {
			let request = if method.eq_ignore_ascii_case("GET") {
				self.http.get(&url)
			} else {
				self.http.post(&url).json(body.as_ref().unwrap_or(&Value::Null))
			};
			let response = request
				.send()
				.await
				.map_err(|err| EngineError::catalog(format!("request to {url} failed: {err}")))?;

			let status = response.status();
			if !status.is_success() {
				let detail = response.text().await.unwrap_or_default();
				return Err(EngineError::catalog(format!("status {status} from {url}: {detail}")));
			}

			let page: Value = response
				.json()
				.await
				.map_err(|err| EngineError::catalog(format!("unreadable response from {url}: {err}")))?;
			query::collect_scenes(&page, &mut scenes)?;

			match query::next_page(&page) {
				Some(next) => {
					url = next.href.unwrap_or_else(|| search_url.clone());
					method = next.method;
					if next.body.is_some() {
						body = next.body;
					}
				}
				None => break,
			}
		}
		log::debug!("catalog search returned {} scenes", scenes.len());
		Ok(scenes)
	}

	/// Obtains a read-enabled variant of `href` from the Planetary Computer
	/// signing endpoint.
	pub async fn sign_href(&self, href: &str) -> Result<String> {
		let response = self
			.http
			.get(query::SIGNING_URL)
			.query(&[("href", href)])
			.send()
			.await
			.map_err(|err| EngineError::catalog(format!("signing request failed: {err}")))?;
		let status = response.status();
		if !status.is_success() {
			return Err(EngineError::catalog(format!("signing failed with status {status}")));
		}
		let payload: Value = response
			.json()
			.await
			.map_err(|err| EngineError::catalog(format!("unreadable signing response: {err}")))?;
		query::signed_href(&payload)
	}

	/// Signs `href` when the sensor requires it, passes it through otherwise.
	pub async fn resolve_href(&self, sensor: Sensor, href: &str) -> Result<String> {
		if sensor.needs_signing() {
			self.sign_href(href).await
		} else {
			Ok(href.to_string())
		}
	}
}
