mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Classification, Config, DEFAULT_COMPANY_EXCLUSIONS, EmbeddingProviderConfig, Ingestion, Mail,
	Postgres, ProviderConfig, Providers, Qdrant, Repair, Search, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.mail.token_path.trim().is_empty() {
		return Err(Error::Validation {
			message: "mail.token_path must be non-empty.".to_string(),
		});
	}
	if cfg.mail.user_id.trim().is_empty() {
		return Err(Error::Validation { message: "mail.user_id must be non-empty.".to_string() });
	}

	for (label, value) in [
		("ingestion.batch_limit", cfg.ingestion.batch_limit as u64),
		("ingestion.max_batches", cfg.ingestion.max_batches as u64),
		("ingestion.max_body_chars", cfg.ingestion.max_body_chars as u64),
		("ingestion.entity_body_chars", cfg.ingestion.entity_body_chars as u64),
		("search.top_k", cfg.search.top_k as u64),
		("search.min_query_chars", cfg.search.min_query_chars as u64),
		("repair.batch_size", cfg.repair.batch_size as u64),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.ingestion.batch_limit > 500 {
		return Err(Error::Validation {
			message: "ingestion.batch_limit must be 500 or less.".to_string(),
		});
	}
	if cfg.search.candidate_k < cfg.search.top_k {
		return Err(Error::Validation {
			message: "search.candidate_k must be greater than or equal to search.top_k."
				.to_string(),
		});
	}
	if cfg.repair.max_attempts <= 0 {
		return Err(Error::Validation {
			message: "repair.max_attempts must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("entity_extractor", &cfg.providers.entity_extractor.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.mail.base_query = cfg.mail.base_query.trim().to_string();
	cfg.ingestion.run_deadline_ms = cfg.ingestion.run_deadline_ms.filter(|ms| *ms > 0);

	let mut exclusions = Vec::with_capacity(cfg.classification.company_exclusions.len());

	for name in &cfg.classification.company_exclusions {
		let name = name.trim().to_lowercase();

		if !name.is_empty() && !exclusions.contains(&name) {
			exclusions.push(name);
		}
	}

	cfg.classification.company_exclusions = exclusions;
}
