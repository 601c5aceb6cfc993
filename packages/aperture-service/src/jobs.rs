use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use aperture_domain::{Category, JobStatus};

use crate::{ApertureService, Result};

#[derive(Clone, Debug, Deserialize)]
pub struct JobFilter {
	#[serde(default = "default_job_categories")]
	pub categories: Vec<Category>,
	/// Empty means any status.
	#[serde(default)]
	pub statuses: Vec<JobStatus>,
}
impl Default for JobFilter {
	fn default() -> Self {
		Self { categories: default_job_categories(), statuses: Vec::new() }
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobApplicationItem {
	pub message_id: String,
	pub sender: String,
	pub subject: String,
	pub company: Option<String>,
	pub status: Option<JobStatus>,
	#[serde(with = "time::serde::rfc3339")]
	pub received_at: OffsetDateTime,
}

impl ApertureService {
	/// Messages in the filtered categories, newest first.
	pub async fn list_job_applications(
		&self,
		filter: JobFilter,
	) -> Result<Vec<JobApplicationItem>> {
		let categories = if filter.categories.is_empty() {
			default_job_categories()
		} else {
			filter.categories
		};
		let categories: Vec<String> =
			categories.iter().map(|category| category.as_str().to_string()).collect();
		let statuses: Vec<String> =
			filter.statuses.iter().map(|status| status.as_str().to_string()).collect();
		let statuses = (!statuses.is_empty()).then_some(statuses.as_slice());
		let rows = self.stores.messages.list_by_category(&categories, statuses).await?;
		let mut items = Vec::with_capacity(rows.len());

		for row in rows {
			let status = match row.job_status.as_deref() {
				Some(raw) => Some(raw.parse::<JobStatus>()?),
				None => None,
			};

			items.push(JobApplicationItem {
				message_id: row.message_id,
				sender: row.sender,
				subject: row.subject,
				company: row.job_company,
				status,
				received_at: row.received_at,
			});
		}

		Ok(items)
	}
}

fn default_job_categories() -> Vec<Category> {
	vec![Category::JobApplication]
}
