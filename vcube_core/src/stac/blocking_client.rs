use super::query::{self, SearchQuery};
use crate::error::EngineError;
use crate::types::{Scene, Sensor};
use anyhow::Result;
use serde_json::Value;

/// Blocking twin of [`super::CatalogClient`] for plain command-line calls.
///
/// Shares the request-body construction and pagination handling with the
/// async client through [`query`].
#[derive(Debug, Default)]
pub struct BlockingCatalogClient {
	http: reqwest::blocking::Client,
}

impl BlockingCatalogClient {
	pub fn new() -> BlockingCatalogClient {
		BlockingCatalogClient {
			http: reqwest::blocking::Client::new(),
		}
	}

	pub fn search(&self, query: &SearchQuery) -> Result<Vec<Scene>> {
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
				.map_err(|err| EngineError::catalog(format!("request to {url} failed: {err}")))?;

			let status = response.status();
			if !status.is_success() {
				let detail = response.text().unwrap_or_default();
				return Err(EngineError::catalog(format!("status {status} from {url}: {detail}")));
			}

			let page: Value = response
				.json()
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
		Ok(scenes)
	}

	pub fn sign_href(&self, href: &str) -> Result<String> {
		let response = self
			.http
			.get(query::SIGNING_URL)
			.query(&[("href", href)])
			.send()
			.map_err(|err| EngineError::catalog(format!("signing request failed: {err}")))?;
		let status = response.status();
		if !status.is_success() {
			return Err(EngineError::catalog(format!("signing failed with status {status}")));
		}
		let payload: Value = response
			.json()
			.map_err(|err| EngineError::catalog(format!("unreadable signing response: {err}")))?;
		query::signed_href(&payload)
	}

	pub fn resolve_href(&self, sensor: Sensor, href: &str) -> Result<String> {
		if sensor.needs_signing() {
			self.sign_href(href)
		} else {
			Ok(href.to_string())
		}
	}
}
