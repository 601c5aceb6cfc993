use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{AttachmentRow, EmailRow, INGESTION_PENDING_EMBEDDING, NewEmail},
	outbox,
};

const EMAIL_COLUMNS: &str = "\
message_id, thread_id, sender, subject, snippet, received_at, category, job_company, job_status, \
has_attachment, embedding_version, ingestion_status, created_at, updated_at";

pub async fn email_exists(db: &Db, message_id: &str) -> Result<bool> {
	let exists: bool =
		sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM emails WHERE message_id = $1)")
			.bind(message_id)
			.fetch_one(&db.pool)
			.await?;

	Ok(exists)
}

pub async fn latest_received_at(db: &Db) -> Result<Option<OffsetDateTime>> {
	let latest: Option<OffsetDateTime> = sqlx::query_scalar("SELECT max(received_at) FROM emails")
		.fetch_one(&db.pool)
		.await?;

	Ok(latest)
}

/// Writes every message, its attachments, and its outbox row in one transaction.
///
/// Either the whole batch becomes visible or none of it does.
pub async fn insert_batch(db: &Db, batch: &[NewEmail], now: OffsetDateTime) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	for email in batch {
		insert_email(&mut tx, email, now).await?;
		outbox::enqueue(&mut tx, &email.message_id, &email.embedding_version, &email.vec, now)
			.await?;
	}

	tx.commit().await?;

	Ok(())
}

async fn insert_email(
	conn: &mut PgConnection,
	email: &NewEmail,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO emails (
	message_id,
	thread_id,
	sender,
	subject,
	snippet,
	received_at,
	category,
	job_company,
	job_status,
	has_attachment,
	embedding_version,
	ingestion_status,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)",
	)
	.bind(email.message_id.as_str())
	.bind(email.thread_id.as_str())
	.bind(email.sender.as_str())
	.bind(email.subject.as_str())
	.bind(email.snippet.as_str())
	.bind(email.received_at)
	.bind(email.category.as_str())
	.bind(email.job_company.as_deref())
	.bind(email.job_status.as_deref())
	.bind(!email.attachments.is_empty())
	.bind(email.embedding_version.as_str())
	.bind(INGESTION_PENDING_EMBEDDING)
	.bind(now)
	.execute(&mut *conn)
	.await?;

	for attachment in &email.attachments {
		sqlx::query(
			"\
INSERT INTO email_attachments (attachment_id, message_id, filename, mime_type, size_bytes)
VALUES ($1, $2, $3, $4, $5)",
		)
		.bind(Uuid::new_v4())
		.bind(email.message_id.as_str())
		.bind(attachment.filename.as_str())
		.bind(attachment.mime_type.as_str())
		.bind(attachment.size_bytes)
		.execute(&mut *conn)
		.await?;
	}

	Ok(())
}

pub async fn fetch_email(db: &Db, message_id: &str) -> Result<Option<EmailRow>> {
	let sql = format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE message_id = $1");
	let row = sqlx::query_as::<_, EmailRow>(&sql).bind(message_id).fetch_optional(&db.pool).await?;

	Ok(row)
}

pub async fn fetch_emails_by_ids(db: &Db, message_ids: &[String]) -> Result<Vec<EmailRow>> {
	if message_ids.is_empty() {
		return Ok(Vec::new());
	}

	let sql = format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE message_id = ANY($1)");
	let rows = sqlx::query_as::<_, EmailRow>(&sql).bind(message_ids).fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn fetch_attachments(db: &Db, message_id: &str) -> Result<Vec<AttachmentRow>> {
	let rows = sqlx::query_as::<_, AttachmentRow>(
		"\
SELECT attachment_id, message_id, filename, mime_type, size_bytes
FROM email_attachments
WHERE message_id = $1
ORDER BY filename, attachment_id",
	)
	.bind(message_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Newest first. `statuses = None` leaves the job status unconstrained.
pub async fn list_emails_by_category(
	db: &Db,
	categories: &[String],
	statuses: Option<&[String]>,
) -> Result<Vec<EmailRow>> {
	let sql = format!(
		"\
SELECT {EMAIL_COLUMNS}
FROM emails
WHERE category = ANY($1)
	AND ($2::text[] IS NULL OR job_status = ANY($2))
ORDER BY received_at DESC, message_id ASC"
	);
	let rows = sqlx::query_as::<_, EmailRow>(&sql)
		.bind(categories)
		.bind(statuses)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn count_pending_embeddings(db: &Db) -> Result<i64> {
	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM emails WHERE ingestion_status = $1")
		.bind(INGESTION_PENDING_EMBEDDING)
		.fetch_one(&db.pool)
		.await?;

	Ok(count)
}
