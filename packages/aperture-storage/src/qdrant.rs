use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		CreateCollectionBuilder, Distance, PointStruct, Query, QueryPointsBuilder,
		UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind,
	},
};
use uuid::Uuid;

use crate::{Error, Result};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &aperture_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the cosine collection when it does not exist yet.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
					VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
				),
			)
			.await?;

		Ok(())
	}

	pub async fn upsert(&self, points: &[VectorPoint]) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		let mut structs = Vec::with_capacity(points.len());

		for point in points {
			if point.vector.len() != self.vector_dim as usize {
				return Err(Error::VectorDimension {
					message_id: point.message_id.clone(),
					actual: point.vector.len(),
					expected: self.vector_dim,
				});
			}

			structs.push(PointStruct::new(
				point_id_for(&point.message_id).to_string(),
				point.vector.clone(),
				point.payload(),
			));
		}

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), structs).wait(true))
			.await?;

		Ok(())
	}

	/// Nearest neighbours by cosine distance, closest first.
	pub async fn nearest(&self, vector: Vec<f32>, limit: u64) -> Result<Vec<VectorHit>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.with_payload(true)
			.limit(limit);
		let response = self.client.query(search).await?;
		let hits = response
			.result
			.into_iter()
			.filter_map(|point| {
				let message_id = payload_string(&point.payload, "message_id")?;

				Some(VectorHit { message_id, distance: 1.0 - point.score })
			})
			.collect();

		Ok(hits)
	}
}

#[derive(Clone, Debug)]
pub struct VectorPoint {
	pub message_id: String,
	pub vector: Vec<f32>,
	pub sender: String,
	pub subject: String,
	pub has_attachment: bool,
	pub embedding_version: String,
}
impl VectorPoint {
	fn payload(&self) -> Payload {
		let mut payload = Payload::new();

		payload.insert("message_id", self.message_id.clone());
		payload.insert("sender", self.sender.clone());
		payload.insert("subject", self.subject.clone());
		payload.insert("has_attachment", self.has_attachment);
		payload.insert("embedding_version", self.embedding_version.clone());

		payload
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct VectorHit {
	pub message_id: String,
	/// Cosine distance; `0.0` is identical direction.
	pub distance: f32,
}

/// Qdrant ids must be UUIDs or integers; mail ids are opaque strings.
pub fn point_id_for(message_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, message_id.as_bytes())
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}
