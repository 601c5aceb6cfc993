use time::OffsetDateTime;

use crate::{ApertureService, Result};

impl ApertureService {
	/// Latest `received_at` across stored messages; `None` on an empty store.
	pub async fn latest_received_at(&self) -> Result<Option<OffsetDateTime>> {
		Ok(self.stores.messages.latest_received_at().await?)
	}
}
