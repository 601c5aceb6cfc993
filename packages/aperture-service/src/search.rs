use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};

use aperture_domain::Category;
use aperture_storage::models::EmailRow;

use crate::{ApertureService, Error, Result};

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub top_k: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchItem {
	pub message_id: String,
	/// `1 - cosine distance`, clamped to `0.0..=1.0`; higher is closer.
	pub relevance: f32,
	pub sender: String,
	pub subject: String,
	pub preview: String,
	pub category: Category,
	pub has_attachment: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub items: Vec<SearchItem>,
}

impl ApertureService {
	/// Semantic search over indexed messages.
	///
	/// Hits the vector store returns for messages that are missing from Postgres are dropped.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let cfg = &self.cfg.search;
		let query = req.query.trim();

		if query.chars().count() < cfg.min_query_chars {
			return Err(Error::InvalidRequest {
				message: format!("query must be at least {} characters.", cfg.min_query_chars),
			});
		}

		let top_k = req.top_k.unwrap_or(cfg.top_k).min(cfg.candidate_k).max(1) as usize;
		let vector = self.embed_text(&aperture_domain::query_embedding_text(query)).await?;
		let mut hits = self
			.stores
			.vectors
			.nearest(vector, cfg.candidate_k as u64)
			.await
			.map_err(|err| Error::VectorStoreFailure { message: err.to_string() })?;

		hits.sort_by(|a, b| {
			a.distance
				.partial_cmp(&b.distance)
				.unwrap_or(Ordering::Equal)
				.then_with(|| a.message_id.cmp(&b.message_id))
		});

		let ids: Vec<String> = hits.iter().map(|hit| hit.message_id.clone()).collect();
		let rows: HashMap<String, EmailRow> = self
			.stores
			.messages
			.fetch_by_ids(&ids)
			.await?
			.into_iter()
			.map(|row| (row.message_id.clone(), row))
			.collect();
		let mut items = Vec::with_capacity(top_k);

		for hit in hits {
			let Some(row) = rows.get(&hit.message_id) else {
				tracing::debug!(message_id = %hit.message_id, "Vector hit has no stored message.");

				continue;
			};

			items.push(SearchItem {
				message_id: hit.message_id,
				relevance: relevance_from_distance(hit.distance),
				sender: row.sender.clone(),
				subject: row.subject.clone(),
				preview: row.snippet.clone(),
				category: row.category.parse()?,
				has_attachment: row.has_attachment,
			});

			if items.len() == top_k {
				break;
			}
		}

		Ok(SearchResponse { items })
	}
}

pub fn relevance_from_distance(distance: f32) -> f32 {
	if distance.is_nan() {
		return 0.0;
	}

	(1.0 - distance).clamp(0.0, 1.0)
}
