use std::collections::HashSet;

use crate::{MessageStore, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DedupDecision {
	/// Listed earlier in this run.
	SeenInRun,
	/// Already persisted by a previous run.
	Stored,
	New,
}
impl DedupDecision {
	pub fn is_new(self) -> bool {
		self == Self::New
	}
}

/// Two-layer duplicate check: an in-run id set, then a store lookup.
#[derive(Debug, Default)]
pub struct Deduplicator {
	seen: HashSet<String>,
}
impl Deduplicator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Checks `message_id` and records it as seen for the rest of the run.
	pub async fn check(
		&mut self,
		store: &dyn MessageStore,
		message_id: &str,
	) -> Result<DedupDecision> {
		if !self.seen.insert(message_id.to_string()) {
			return Ok(DedupDecision::SeenInRun);
		}
		if store.exists(message_id).await? {
			return Ok(DedupDecision::Stored);
		}

		Ok(DedupDecision::New)
	}
}
