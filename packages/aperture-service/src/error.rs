pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("No mail credential is available.")]
	AuthUnavailable,
	#[error("Fetch failed: {message}")]
	FetchFailure { message: String },
	#[error("Embedding failed: {message}")]
	EmbeddingFailure { message: String },
	#[error("Batch commit failed: {message}")]
	StoreCommitFailure { message: String },
	#[error("Vector store write failed: {message}")]
	VectorStoreFailure { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Ingestion worker has stopped.")]
	WorkerStopped,
	#[error(transparent)]
	Domain(#[from] aperture_domain::Error),
}
impl From<aperture_storage::Error> for Error {
	fn from(err: aperture_storage::Error) -> Self {
		match err {
			aperture_storage::Error::Qdrant(err) => Self::Qdrant { message: err.to_string() },
			err => Self::Storage { message: err.to_string() },
		}
	}
}
impl From<aperture_providers::Error> for Error {
	fn from(err: aperture_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
