pub mod classifier;
pub mod dedup;
pub mod jobs;
pub mod orchestrator;
pub mod repair;
pub mod search;
pub mod watermark;
pub mod worker;
pub mod writer;

mod embedder;
mod error;

pub use classifier::Classifier;
pub use dedup::{DedupDecision, Deduplicator};
pub use embedder::validate_vector_dim;
pub use error::{Error, Result};
pub use jobs::{JobApplicationItem, JobFilter};
pub use orchestrator::{RunOutcome, RunSummary};
pub use repair::RepairReport;
pub use search::{SearchItem, SearchRequest, SearchResponse};
pub use worker::{IngestionHandle, IngestionWorker, RunTicket};
pub use writer::{BatchOutcome, DualStoreWriter};

use std::{future::Future, pin::Pin, sync::Arc};

use time::{Duration, OffsetDateTime};

use aperture_config::{Config, EmbeddingProviderConfig, ProviderConfig};
use aperture_domain::{entity::Entity, extract::ContentExtractor, raw::RawMessage};
use aperture_providers::{
	credentials::{AccessToken, TokenFileCredentials},
	embedding, entities,
	gmail::{GmailClient, MessagePage},
};
use aperture_storage::{
	db::Db,
	models::{EmailRow, NewEmail, PendingEmbedding},
	outbox,
	qdrant::{QdrantStore, VectorHit, VectorPoint},
	queries,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, aperture_providers::Result<Vec<Vec<f32>>>>;
}

pub trait EntityExtractor
where
	Self: Send + Sync,
{
	fn extract<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, aperture_providers::Result<Vec<Entity>>>;
}

/// Source of the current mail credential. Never prompts and never refreshes.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	fn current_credential(&self) -> BoxFuture<'_, Option<AccessToken>>;
}

pub trait MailSource
where
	Self: Send + Sync,
{
	fn list_new_message_ids<'a>(
		&'a self,
		credential: &'a AccessToken,
		since: Option<OffsetDateTime>,
		limit: u32,
		page_token: Option<&'a str>,
	) -> BoxFuture<'a, aperture_providers::Result<MessagePage>>;

	fn get_message<'a>(
		&'a self,
		credential: &'a AccessToken,
		message_id: &'a str,
	) -> BoxFuture<'a, aperture_providers::Result<RawMessage>>;
}

/// Relational side of the index: messages, attachments, and the embedding outbox.
pub trait MessageStore
where
	Self: Send + Sync,
{
	fn exists<'a>(&'a self, message_id: &'a str) -> BoxFuture<'a, aperture_storage::Result<bool>>;

	fn latest_received_at(&self)
	-> BoxFuture<'_, aperture_storage::Result<Option<OffsetDateTime>>>;

	/// Stages the whole batch in one transaction; nothing is visible unless everything is.
	fn insert_batch<'a>(
		&'a self,
		batch: &'a [NewEmail],
		now: OffsetDateTime,
	) -> BoxFuture<'a, aperture_storage::Result<()>>;

	fn mark_embedded<'a>(
		&'a self,
		message_ids: &'a [String],
		now: OffsetDateTime,
	) -> BoxFuture<'a, aperture_storage::Result<()>>;

	fn mark_embedding_failed<'a>(
		&'a self,
		message_id: &'a str,
		error: &'a str,
		available_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, aperture_storage::Result<()>>;

	fn claim_pending(
		&self,
		now: OffsetDateTime,
		limit: i64,
		max_attempts: i32,
		lease: Duration,
	) -> BoxFuture<'_, aperture_storage::Result<Vec<PendingEmbedding>>>;

	fn store_vector<'a>(
		&'a self,
		message_id: &'a str,
		vec: &'a [f32],
		now: OffsetDateTime,
	) -> BoxFuture<'a, aperture_storage::Result<()>>;

	fn fetch_by_ids<'a>(
		&'a self,
		message_ids: &'a [String],
	) -> BoxFuture<'a, aperture_storage::Result<Vec<EmailRow>>>;

	fn list_by_category<'a>(
		&'a self,
		categories: &'a [String],
		statuses: Option<&'a [String]>,
	) -> BoxFuture<'a, aperture_storage::Result<Vec<EmailRow>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn upsert<'a>(
		&'a self,
		points: &'a [VectorPoint],
	) -> BoxFuture<'a, aperture_storage::Result<()>>;

	fn nearest(
		&self,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'_, aperture_storage::Result<Vec<VectorHit>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub entities: Arc<dyn EntityExtractor>,
	pub credentials: Arc<dyn CredentialProvider>,
	pub mail: Arc<dyn MailSource>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		entities: Arc<dyn EntityExtractor>,
		credentials: Arc<dyn CredentialProvider>,
		mail: Arc<dyn MailSource>,
	) -> Self {
		Self { embedding, entities, credentials, mail }
	}

	/// HTTP providers, the Gmail REST client, and the token-file credential from `cfg`.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let http = Arc::new(HttpProviders);
		let mail = Arc::new(GmailClient::new(&cfg.mail)?);
		let credentials = Arc::new(TokenFileCredentials::new(&cfg.mail.token_path));

		Ok(Self { embedding: http.clone(), entities: http, credentials, mail })
	}
}

#[derive(Clone)]
pub struct Stores {
	pub messages: Arc<dyn MessageStore>,
	pub vectors: Arc<dyn VectorIndex>,
}
impl Stores {
	pub fn new(messages: Arc<dyn MessageStore>, vectors: Arc<dyn VectorIndex>) -> Self {
		Self { messages, vectors }
	}
}

pub struct ApertureService {
	pub cfg: Config,
	pub stores: Stores,
	pub providers: Providers,
	classifier: Classifier,
	extractor: ContentExtractor,
}
impl ApertureService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Result<Self> {
		let providers = Providers::from_config(&cfg)?;
		let stores = Stores::new(Arc::new(db), Arc::new(qdrant));

		Self::with_collaborators(cfg, stores, providers)
	}

	pub fn with_collaborators(cfg: Config, stores: Stores, providers: Providers) -> Result<Self> {
		let classifier = Classifier::from_config(&cfg)?;
		let extractor = ContentExtractor::new(cfg.ingestion.max_body_chars);

		Ok(Self { cfg, stores, providers, classifier, extractor })
	}

	pub fn classifier(&self) -> &Classifier {
		&self.classifier
	}
}

pub(crate) fn embedding_version(cfg: &Config) -> String {
	embedding::embedding_version(&cfg.providers.embedding)
}

struct HttpProviders;

impl EmbeddingProvider for HttpProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, aperture_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl EntityExtractor for HttpProviders {
	fn extract<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, aperture_providers::Result<Vec<Entity>>> {
		Box::pin(entities::extract_entities(cfg, text))
	}
}

impl CredentialProvider for TokenFileCredentials {
	fn current_credential(&self) -> BoxFuture<'_, Option<AccessToken>> {
		Box::pin(self.load())
	}
}

impl MailSource for GmailClient {
	fn list_new_message_ids<'a>(
		&'a self,
		credential: &'a AccessToken,
		since: Option<OffsetDateTime>,
		limit: u32,
		page_token: Option<&'a str>,
	) -> BoxFuture<'a, aperture_providers::Result<MessagePage>> {
		Box::pin(GmailClient::list_new_message_ids(
			self,
			&credential.access_token,
			since,
			limit,
			page_token,
		))
	}

	fn get_message<'a>(
		&'a self,
		credential: &'a AccessToken,
		message_id: &'a str,
	) -> BoxFuture<'a, aperture_providers::Result<RawMessage>> {
		Box::pin(GmailClient::get_message(self, &credential.access_token, message_id))
	}
}

impl MessageStore for Db {
	fn exists<'a>(&'a self, message_id: &'a str) -> BoxFuture<'a, aperture_storage::Result<bool>> {
		Box::pin(queries::email_exists(self, message_id))
	}

	fn latest_received_at(
		&self,
	) -> BoxFuture<'_, aperture_storage::Result<Option<OffsetDateTime>>> {
		Box::pin(queries::latest_received_at(self))
	}

	fn insert_batch<'a>(
		&'a self,
		batch: &'a [NewEmail],
		now: OffsetDateTime,
	) -> BoxFuture<'a, aperture_storage::Result<()>> {
		Box::pin(queries::insert_batch(self, batch, now))
	}

	fn mark_embedded<'a>(
		&'a self,
		message_ids: &'a [String],
		now: OffsetDateTime,
	) -> BoxFuture<'a, aperture_storage::Result<()>> {
		Box::pin(outbox::mark_done(self, message_ids, now))
	}

	fn mark_embedding_failed<'a>(
		&'a self,
		message_id: &'a str,
		error: &'a str,
		available_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, aperture_storage::Result<()>> {
		Box::pin(outbox::mark_failed(self, message_id, error, available_at, now))
	}

	fn claim_pending(
		&self,
		now: OffsetDateTime,
		limit: i64,
		max_attempts: i32,
		lease: Duration,
	) -> BoxFuture<'_, aperture_storage::Result<Vec<PendingEmbedding>>> {
		Box::pin(outbox::claim_due(self, now, limit, max_attempts, lease))
	}

	fn store_vector<'a>(
		&'a self,
		message_id: &'a str,
		vec: &'a [f32],
		now: OffsetDateTime,
	) -> BoxFuture<'a, aperture_storage::Result<()>> {
		Box::pin(outbox::store_vector(self, message_id, vec, now))
	}

	fn fetch_by_ids<'a>(
		&'a self,
		message_ids: &'a [String],
	) -> BoxFuture<'a, aperture_storage::Result<Vec<EmailRow>>> {
		Box::pin(queries::fetch_emails_by_ids(self, message_ids))
	}

	fn list_by_category<'a>(
		&'a self,
		categories: &'a [String],
		statuses: Option<&'a [String]>,
	) -> BoxFuture<'a, aperture_storage::Result<Vec<EmailRow>>> {
		Box::pin(queries::list_emails_by_category(self, categories, statuses))
	}
}

impl VectorIndex for QdrantStore {
	fn upsert<'a>(
		&'a self,
		points: &'a [VectorPoint],
	) -> BoxFuture<'a, aperture_storage::Result<()>> {
		Box::pin(QdrantStore::upsert(self, points))
	}

	fn nearest(
		&self,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'_, aperture_storage::Result<Vec<VectorHit>>> {
		Box::pin(QdrantStore::nearest(self, vector, limit))
	}
}
