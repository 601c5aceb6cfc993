pub mod entity;
pub mod extract;
pub mod message;
pub mod raw;
pub mod rules;

mod error;

pub use error::{Error, Result};
pub use message::{AttachmentMeta, Category, Classification, JobStatus};

/// Renders the text that is embedded for a message.
///
/// The index, the repair pass, and search queries all go through this function; vectors built
/// from any other rendering are not comparable with the stored ones.
pub fn embedding_text(subject: &str, snippet: &str) -> String {
	format!("Subject: {subject}\n\n{snippet}")
}

/// A search query rendered as a message with the query as subject and no snippet.
pub fn query_embedding_text(query: &str) -> String {
	embedding_text(query.trim(), "")
}

/// Truncates `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((idx, _)) => &text[..idx],
		None => text,
	}
}
