//! Rule-based categorisation with entity-backed company extraction for job applications.

use aperture_config::{Config, ProviderConfig};
use aperture_domain::{
	Category, Classification, JobStatus,
	entity,
	rules::{self, KeywordRule, RuleTable},
};

use crate::{EntityExtractor, Result};

/// Outcome of the keyword pass alone, before any entity lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleVerdict {
	pub category: Category,
	pub job_status: Option<JobStatus>,
}

#[derive(Clone, Debug)]
pub struct Classifier {
	categories: RuleTable<Category>,
	statuses: RuleTable<JobStatus>,
	exclusions: Vec<String>,
	entity_body_chars: usize,
}
impl Classifier {
	pub fn new(
		category_rules: Vec<KeywordRule<Category>>,
		status_rules: Vec<KeywordRule<JobStatus>>,
		exclusions: Vec<String>,
		entity_body_chars: usize,
	) -> Result<Self> {
		Ok(Self {
			categories: RuleTable::compile(category_rules)?,
			statuses: RuleTable::compile(status_rules)?,
			exclusions: exclusions.into_iter().map(|name| name.to_lowercase()).collect(),
			entity_body_chars,
		})
	}

	pub fn from_config(cfg: &Config) -> Result<Self> {
		Self::new(
			rules::default_category_rules(),
			rules::default_status_rules(),
			cfg.classification.company_exclusions.clone(),
			cfg.ingestion.entity_body_chars,
		)
	}

	/// Keyword pass over subject and body. Deterministic for a fixed rule set.
	pub fn apply_rules(&self, subject: &str, body: &str) -> RuleVerdict {
		let buffer = rules::scan_buffer(subject, body);
		let category = self.categories.first_match(&buffer).unwrap_or(Category::General);
		let job_status = match category {
			Category::JobApplication =>
				Some(self.statuses.first_match(&buffer).unwrap_or(JobStatus::Applied)),
			_ => None,
		};

		RuleVerdict { category, job_status }
	}

	/// Full classification. An entity extractor failure degrades the message to `General`.
	pub async fn classify(
		&self,
		extractor: &dyn EntityExtractor,
		cfg: &ProviderConfig,
		subject: &str,
		body: &str,
	) -> Classification {
		let verdict = self.apply_rules(subject, body);
		let Some(status) = verdict.job_status else {
			return Classification::other(verdict.category);
		};
		let input = entity::entity_input(subject, body, self.entity_body_chars);

		match extractor.extract(cfg, &input).await {
			Ok(entities) => Classification::job_application(
				status,
				entity::select_company(&entities, &self.exclusions),
			),
			Err(err) => {
				tracing::warn!(error = %err, "Entity extraction failed; classifying as General.");

				Classification::general()
			},
		}
	}
}
