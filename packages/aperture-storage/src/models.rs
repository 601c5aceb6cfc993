use time::OffsetDateTime;
use uuid::Uuid;

pub const INGESTION_PENDING_EMBEDDING: &str = "PENDING_EMBEDDING";
pub const INGESTION_COMPLETE: &str = "COMPLETE";

pub const OUTBOX_PENDING: &str = "PENDING";
pub const OUTBOX_FAILED: &str = "FAILED";
pub const OUTBOX_DONE: &str = "DONE";

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct EmailRow {
	pub message_id: String,
	pub thread_id: String,
	pub sender: String,
	pub subject: String,
	pub snippet: String,
	pub received_at: OffsetDateTime,
	pub category: String,
	pub job_company: Option<String>,
	pub job_status: Option<String>,
	pub has_attachment: bool,
	pub embedding_version: String,
	pub ingestion_status: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AttachmentRow {
	pub attachment_id: Uuid,
	pub message_id: String,
	pub filename: String,
	pub mime_type: String,
	pub size_bytes: i64,
}

/// Repair input: the outbox row joined with the text its vector was derived from.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct PendingEmbedding {
	pub outbox_id: Uuid,
	pub message_id: String,
	pub embedding_version: String,
	pub vec: Option<Vec<f32>>,
	pub attempts: i32,
	pub sender: String,
	pub subject: String,
	pub snippet: String,
	pub has_attachment: bool,
}

#[derive(Clone, Debug)]
pub struct NewAttachment {
	pub filename: String,
	pub mime_type: String,
	pub size_bytes: i64,
}

/// One message staged for the relational half of a batch commit.
#[derive(Clone, Debug)]
pub struct NewEmail {
	pub message_id: String,
	pub thread_id: String,
	pub sender: String,
	pub subject: String,
	pub snippet: String,
	pub received_at: OffsetDateTime,
	pub category: String,
	pub job_company: Option<String>,
	pub job_status: Option<String>,
	pub embedding_version: String,
	pub attachments: Vec<NewAttachment>,
	pub vec: Vec<f32>,
}
