use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
	General,
	JobApplication,
	Receipt,
	Newsletter,
}
impl Category {
	pub const ALL: [Self; 4] =
		[Self::General, Self::JobApplication, Self::Receipt, Self::Newsletter];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::General => "General",
			Self::JobApplication => "JobApplication",
			Self::Receipt => "Receipt",
			Self::Newsletter => "Newsletter",
		}
	}
}
impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Category {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|category| category.as_str() == value)
			.ok_or_else(|| Error::UnknownValue { kind: "category", value: value.to_string() })
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
	Applied,
	Interview,
	Offer,
	Rejected,
}
impl JobStatus {
	pub const ALL: [Self; 4] = [Self::Applied, Self::Interview, Self::Offer, Self::Rejected];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Applied => "Applied",
			Self::Interview => "Interview",
			Self::Offer => "Offer",
			Self::Rejected => "Rejected",
		}
	}
}
impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for JobStatus {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|status| status.as_str() == value)
			.ok_or_else(|| Error::UnknownValue { kind: "job status", value: value.to_string() })
	}
}

/// Result of classifying one message.
///
/// Company and status only exist on job applications; the constructors are the only way to build
/// a value, so the coupling cannot be broken by callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
	category: Category,
	company: Option<String>,
	job_status: Option<JobStatus>,
}
impl Classification {
	pub fn general() -> Self {
		Self { category: Category::General, company: None, job_status: None }
	}

	/// Builds a non-job classification. A `JobApplication` category falls back to the default
	/// `Applied` status with no company.
	pub fn other(category: Category) -> Self {
		match category {
			Category::JobApplication => Self::job_application(JobStatus::Applied, None),
			category => Self { category, company: None, job_status: None },
		}
	}

	pub fn job_application(status: JobStatus, company: Option<String>) -> Self {
		Self { category: Category::JobApplication, company, job_status: Some(status) }
	}

	pub fn category(&self) -> Category {
		self.category
	}

	pub fn company(&self) -> Option<&str> {
		self.company.as_deref()
	}

	pub fn job_status(&self) -> Option<JobStatus> {
		self.job_status
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
	pub filename: String,
	pub mime_type: String,
	pub size_bytes: i64,
}
