use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use aperture_domain::entity::Entity;

use crate::Result;

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
	#[serde(default)]
	entities: Vec<Entity>,
}

/// Runs named-entity recognition over `text` and returns the entities in document order.
pub async fn extract_entities(
	cfg: &aperture_config::ProviderConfig,
	text: &str,
) -> Result<Vec<Entity>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"text": text,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let bytes = res.error_for_status()?.bytes().await?;

	parse_entities_response(&bytes)
}

fn parse_entities_response(bytes: &[u8]) -> Result<Vec<Entity>> {
	let parsed: EntitiesResponse = serde_json::from_slice(bytes)?;

	Ok(parsed.entities)
}
