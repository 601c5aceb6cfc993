use serde::{Deserialize, Serialize};

/// Entity label reported by the named-entity extractor. Labels outside the known set decode as
/// [`EntityLabel::Other`] and are ignored by company selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
	Org,
	Person,
	Gpe,
	Product,
	Date,
	Money,
	#[serde(other)]
	Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
	pub text: String,
	pub label: EntityLabel,
}
impl Entity {
	pub fn new(text: impl Into<String>, label: EntityLabel) -> Self {
		Self { text: text.into(), label }
	}
}

/// Text handed to the entity extractor: the subject followed by the head of the body.
pub fn entity_input(subject: &str, body: &str, body_chars: usize) -> String {
	let head = crate::truncate_chars(body, body_chars);

	if head.is_empty() { subject.to_string() } else { format!("{subject}\n{head}") }
}

/// Picks the first organization whose name is not a known mail platform or job board.
///
/// `exclusions` must already be lower-cased.
pub fn select_company(entities: &[Entity], exclusions: &[String]) -> Option<String> {
	entities
		.iter()
		.filter(|entity| entity.label == EntityLabel::Org)
		.map(|entity| entity.text.trim())
		.find(|name| {
			!name.is_empty() && {
				let lowered = name.to_lowercase();

				!exclusions.iter().any(|excluded| *excluded == lowered)
			}
		})
		.map(ToString::to_string)
}
