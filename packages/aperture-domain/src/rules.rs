//! Ordered keyword rule tables with whole-word matching.
//!
//! Earlier rules take priority over later ones. The tables are plain ordered lists so the
//! priority is part of the contract, not an artifact of container iteration order.

use regex::Regex;

use crate::{Category, Error, JobStatus, Result};

pub const JOB_APPLICATION_KEYWORDS: [&str; 10] = [
	"application",
	"applied",
	"resume",
	"cv",
	"interview",
	"recruiting",
	"talent acquisition",
	"we've received your application",
	"next steps",
	"coding challenge",
];
pub const RECEIPT_KEYWORDS: [&str; 6] = [
	"receipt",
	"invoice",
	"order confirmation",
	"your order",
	"billing statement",
	"payment confirmation",
];
pub const NEWSLETTER_KEYWORDS: [&str; 4] =
	["unsubscribe", "view in browser", "newsletter", "daily digest"];

pub const REJECTED_KEYWORDS: [&str; 8] = [
	"unfortunately",
	"other candidates",
	"not moving forward",
	"not be moving forward",
	"regret to inform",
	"not been selected",
	"position has been filled",
	"decided to pursue",
];
pub const INTERVIEW_KEYWORDS: [&str; 7] = [
	"interview",
	"phone screen",
	"schedule a call",
	"your availability",
	"coding challenge",
	"technical assessment",
	"next round",
];
pub const OFFER_KEYWORDS: [&str; 5] =
	["offer letter", "job offer", "pleased to offer", "excited to offer", "extend an offer"];
pub const APPLIED_KEYWORDS: [&str; 5] = [
	"received your application",
	"thank you for applying",
	"thanks for applying",
	"application received",
	"applied",
];

#[derive(Clone, Debug)]
pub struct KeywordRule<T> {
	pub label: T,
	pub keywords: Vec<String>,
}
impl<T> KeywordRule<T> {
	pub fn new<I, S>(label: T, keywords: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { label, keywords: keywords.into_iter().map(Into::into).collect() }
	}
}

/// Compiled rule list. Matching is over lower-cased text; the first rule with any whole-word
/// keyword hit wins.
#[derive(Clone, Debug)]
pub struct RuleTable<T> {
	rules: Vec<(T, Regex)>,
}
impl<T> RuleTable<T>
where
	T: Copy + std::fmt::Debug,
{
	pub fn compile(rules: Vec<KeywordRule<T>>) -> Result<Self> {
		let mut compiled = Vec::with_capacity(rules.len());

		for rule in rules {
			let label = format!("{:?}", rule.label);
			let regex = whole_word_regex(&rule.keywords)
				.map_err(|message| Error::InvalidRule { label, message })?;

			compiled.push((rule.label, regex));
		}

		Ok(Self { rules: compiled })
	}

	/// Returns the label of the first rule matching `lowered`, which must already be lower-cased.
	pub fn first_match(&self, lowered: &str) -> Option<T> {
		self.rules.iter().find(|(_, regex)| regex.is_match(lowered)).map(|(label, _)| *label)
	}

	pub fn labels(&self) -> Vec<T> {
		self.rules.iter().map(|(label, _)| *label).collect()
	}
}

pub fn default_category_rules() -> Vec<KeywordRule<Category>> {
	vec![
		KeywordRule::new(Category::JobApplication, JOB_APPLICATION_KEYWORDS),
		KeywordRule::new(Category::Receipt, RECEIPT_KEYWORDS),
		KeywordRule::new(Category::Newsletter, NEWSLETTER_KEYWORDS),
	]
}

pub fn default_status_rules() -> Vec<KeywordRule<JobStatus>> {
	vec![
		KeywordRule::new(JobStatus::Rejected, REJECTED_KEYWORDS),
		KeywordRule::new(JobStatus::Interview, INTERVIEW_KEYWORDS),
		KeywordRule::new(JobStatus::Offer, OFFER_KEYWORDS),
		KeywordRule::new(JobStatus::Applied, APPLIED_KEYWORDS),
	]
}

/// Builds the single lower-cased buffer both rule tables scan.
pub fn scan_buffer(subject: &str, body: &str) -> String {
	format!("{} {}", subject.to_lowercase(), body.to_lowercase())
}

fn whole_word_regex(keywords: &[String]) -> std::result::Result<Regex, String> {
	let mut alternatives = Vec::with_capacity(keywords.len());

	for keyword in keywords {
		let keyword = keyword.trim().to_lowercase();

		if keyword.is_empty() {
			return Err("keywords must be non-empty".to_string());
		}

		let starts_word = keyword.chars().next().is_some_and(is_word_char);
		let ends_word = keyword.chars().last().is_some_and(is_word_char);

		alternatives.push(format!(
			"{}{}{}",
			if starts_word { r"\b" } else { "" },
			regex::escape(&keyword),
			if ends_word { r"\b" } else { "" },
		));
	}

	if alternatives.is_empty() {
		return Err("rule has no keywords".to_string());
	}

	Regex::new(&format!("(?:{})", alternatives.join("|"))).map_err(|err| err.to_string())
}

fn is_word_char(ch: char) -> bool {
	ch.is_alphanumeric() || ch == '_'
}
