use crate::{ApertureService, Error, Result};

impl ApertureService {
	/// Embeds one text and checks the vector against the collection dimension.
	pub(crate) async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await
			.map_err(|err| Error::EmbeddingFailure { message: err.to_string() })?;
		let Ok([vec]) = <[Vec<f32>; 1]>::try_from(vectors) else {
			return Err(Error::EmbeddingFailure {
				message: "Embedding provider must return exactly one vector.".to_string(),
			});
		};

		validate_vector_dim(&vec, self.cfg.storage.qdrant.vector_dim)?;

		Ok(vec)
	}
}

pub fn validate_vector_dim(vec: &[f32], expected_dim: u32) -> Result<()> {
	if vec.len() != expected_dim as usize {
		return Err(Error::EmbeddingFailure {
			message: format!(
				"Embedding dimension {} does not match configured vector_dim {}.",
				vec.len(),
				expected_dim
			),
		});
	}
	if vec.iter().any(|value| !value.is_finite()) {
		return Err(Error::EmbeddingFailure {
			message: "Embedding contains a non-finite value.".to_string(),
		});
	}

	Ok(())
}
