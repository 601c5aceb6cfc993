/// Failures from Postgres, Qdrant, or another store backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Qdrant request failed: {0}")]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error("Vector for {message_id} has {actual} dimensions; the collection expects {expected}.")]
	VectorDimension { message_id: String, actual: usize, expected: u32 },
	/// Raised by store implementations that are neither Postgres nor Qdrant.
	#[error("Store backend failed: {0}")]
	Backend(String),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
