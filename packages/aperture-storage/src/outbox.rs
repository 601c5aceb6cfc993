use sqlx::PgConnection;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{INGESTION_COMPLETE, OUTBOX_DONE, OUTBOX_FAILED, OUTBOX_PENDING, PendingEmbedding},
};

/// Staged rows stay invisible to the repair pass while the writer finishes the vector upsert.
pub const STAGED_LEASE: Duration = Duration::seconds(60);

pub async fn enqueue(
	conn: &mut PgConnection,
	message_id: &str,
	embedding_version: &str,
	vec: &[f32],
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO embedding_outbox (
	outbox_id,
	message_id,
	embedding_version,
	vec,
	status,
	attempts,
	available_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $7)",
	)
	.bind(Uuid::new_v4())
	.bind(message_id)
	.bind(embedding_version)
	.bind(vec)
	.bind(OUTBOX_PENDING)
	.bind(now + STAGED_LEASE)
	.bind(now)
	.execute(conn)
	.await?;

	Ok(())
}

/// Claims due outbox rows and pushes their `available_at` out by `lease`.
pub async fn claim_due(
	db: &Db,
	now: OffsetDateTime,
	limit: i64,
	max_attempts: i32,
	lease: Duration,
) -> Result<Vec<PendingEmbedding>> {
	let mut tx = db.pool.begin().await?;
	let rows = sqlx::query_as::<_, PendingEmbedding>(
		"\
SELECT
	o.outbox_id,
	o.message_id,
	o.embedding_version,
	o.vec,
	o.attempts,
	e.sender,
	e.subject,
	e.snippet,
	e.has_attachment
FROM embedding_outbox o
JOIN emails e ON e.message_id = o.message_id
WHERE o.status IN ($1, $2)
	AND o.available_at <= $3
	AND o.attempts < $4
ORDER BY o.available_at ASC, o.outbox_id ASC
LIMIT $5
FOR UPDATE OF o SKIP LOCKED",
	)
	.bind(OUTBOX_PENDING)
	.bind(OUTBOX_FAILED)
	.bind(now)
	.bind(max_attempts)
	.bind(limit)
	.fetch_all(&mut *tx)
	.await?;

	if !rows.is_empty() {
		let ids: Vec<Uuid> = rows.iter().map(|row| row.outbox_id).collect();

		sqlx::query(
			"\
UPDATE embedding_outbox
SET available_at = $1, updated_at = $2
WHERE outbox_id = ANY($3)",
		)
		.bind(now + lease)
		.bind(now)
		.bind(&ids)
		.execute(&mut *tx)
		.await?;
	}

	tx.commit().await?;

	Ok(rows)
}

pub async fn store_vector(
	db: &Db,
	message_id: &str,
	vec: &[f32],
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query("UPDATE embedding_outbox SET vec = $1, updated_at = $2 WHERE message_id = $3")
		.bind(vec)
		.bind(now)
		.bind(message_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Marks the vector write as landed and flips the messages to `COMPLETE`.
pub async fn mark_done(db: &Db, message_ids: &[String], now: OffsetDateTime) -> Result<()> {
	if message_ids.is_empty() {
		return Ok(());
	}

	let mut tx = db.pool.begin().await?;

	sqlx::query(
		"\
UPDATE embedding_outbox
SET status = $1, last_error = NULL, updated_at = $2
WHERE message_id = ANY($3)",
	)
	.bind(OUTBOX_DONE)
	.bind(now)
	.bind(message_ids)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"UPDATE emails SET ingestion_status = $1, updated_at = $2 WHERE message_id = ANY($3)",
	)
	.bind(INGESTION_COMPLETE)
	.bind(now)
	.bind(message_ids)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

pub async fn mark_failed(
	db: &Db,
	message_id: &str,
	error: &str,
	available_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE embedding_outbox
SET status = $1,
	attempts = attempts + 1,
	last_error = $2,
	available_at = $3,
	updated_at = $4
WHERE message_id = $5",
	)
	.bind(OUTBOX_FAILED)
	.bind(error)
	.bind(available_at)
	.bind(now)
	.bind(message_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}
