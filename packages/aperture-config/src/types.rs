use serde::Deserialize;
use serde_json::{Map, Value};

/// Mail platforms and job boards that send on behalf of employers; never reported as a company.
pub const DEFAULT_COMPANY_EXCLUSIONS: [&str; 12] = [
	"gmail",
	"google mail",
	"linkedin",
	"indeed",
	"glassdoor",
	"ziprecruiter",
	"workday",
	"greenhouse",
	"lever",
	"smartrecruiters",
	"jobvite",
	"icims",
];

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub mail: Mail,
	#[serde(default)]
	pub ingestion: Ingestion,
	#[serde(default)]
	pub classification: Classification,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub repair: Repair,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub entity_extractor: ProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Mail {
	#[serde(default = "default_mail_api_base")]
	pub api_base: String,
	#[serde(default = "default_mail_user_id")]
	pub user_id: String,
	/// Gmail search expression every listing starts from, e.g. `category:primary`.
	#[serde(default)]
	pub base_query: String,
	#[serde(default = "default_mail_timeout_ms")]
	pub timeout_ms: u64,
	pub token_path: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Ingestion {
	pub batch_limit: u32,
	/// Batches of `batch_limit` messages processed per run; newer messages wait for the next run.
	pub max_batches: u32,
	/// Moves on to newer batches after a failed commit. The failed batch then falls behind the
	/// watermark and is not listed again.
	pub continue_on_batch_failure: bool,
	pub run_deadline_ms: Option<u64>,
	pub interval_ms: u64,
	pub max_body_chars: usize,
	pub entity_body_chars: usize,
}
impl Default for Ingestion {
	fn default() -> Self {
		Self {
			batch_limit: 50,
			max_batches: 1,
			continue_on_batch_failure: false,
			run_deadline_ms: None,
			interval_ms: 300_000,
			max_body_chars: 100_000,
			entity_body_chars: 1_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Classification {
	pub company_exclusions: Vec<String>,
}
impl Default for Classification {
	fn default() -> Self {
		Self {
			company_exclusions: DEFAULT_COMPANY_EXCLUSIONS
				.iter()
				.map(|name| name.to_string())
				.collect(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub candidate_k: u32,
	pub top_k: u32,
	pub min_query_chars: usize,
}
impl Default for Search {
	fn default() -> Self {
		Self { candidate_k: 20, top_k: 15, min_query_chars: 2 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Repair {
	pub batch_size: u32,
	pub max_attempts: i32,
}
impl Default for Repair {
	fn default() -> Self {
		Self { batch_size: 64, max_attempts: 12 }
	}
}

fn default_mail_api_base() -> String {
	"https://gmail.googleapis.com".to_string()
}

fn default_mail_user_id() -> String {
	"me".to_string()
}

fn default_mail_timeout_ms() -> u64 {
	30_000
}
