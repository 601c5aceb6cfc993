use base64::{
	Engine,
	alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc2822};

use crate::{
	AttachmentMeta,
	raw::{MessagePart, RawMessage},
};

pub const DEFAULT_SUBJECT: &str = "No Subject";
pub const DEFAULT_SENDER: &str = "No Sender";
pub const DEFAULT_ATTACHMENT_MIME: &str = "application/octet-stream";

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionIssue {
	MissingPayload,
	MissingSubject,
	MissingSender,
	DateFallback { raw: String },
	UndecodableBody { part_id: String },
	BodyTruncated { original_chars: usize },
}

#[derive(Clone, Debug)]
pub struct ExtractedContent {
	pub subject: String,
	pub sender: String,
	pub received_at: OffsetDateTime,
	pub body_text: String,
	pub attachments: Vec<AttachmentMeta>,
	/// Degradations applied while extracting; empty for a well-formed message.
	pub issues: Vec<ExtractionIssue>,
}

/// Turns a fetched message into header fields, a plain-text body, and attachment metadata.
///
/// Extraction never fails. Missing or garbled parts fall back to defaults and are reported
/// through [`ExtractedContent::issues`].
#[derive(Clone, Debug)]
pub struct ContentExtractor {
	max_body_chars: usize,
}
impl ContentExtractor {
	pub fn new(max_body_chars: usize) -> Self {
		Self { max_body_chars }
	}

	pub fn extract(&self, raw: &RawMessage) -> ExtractedContent {
		self.extract_at(raw, OffsetDateTime::now_utc())
	}

	/// Same as [`Self::extract`], with `now` used when the date header cannot be parsed.
	pub fn extract_at(&self, raw: &RawMessage, now: OffsetDateTime) -> ExtractedContent {
		let mut issues = Vec::new();
		let Some(payload) = raw.payload.as_ref() else {
			issues.push(ExtractionIssue::MissingPayload);
			issues.push(ExtractionIssue::MissingSubject);
			issues.push(ExtractionIssue::MissingSender);
			issues.push(ExtractionIssue::DateFallback { raw: String::new() });

			return ExtractedContent {
				subject: DEFAULT_SUBJECT.to_string(),
				sender: DEFAULT_SENDER.to_string(),
				received_at: now,
				body_text: String::new(),
				attachments: Vec::new(),
				issues,
			};
		};
		let subject = match header_value(payload, "subject") {
			Some(value) => value.to_string(),
			None => {
				issues.push(ExtractionIssue::MissingSubject);

				DEFAULT_SUBJECT.to_string()
			},
		};
		let sender = match header_value(payload, "from") {
			Some(value) => value.to_string(),
			None => {
				issues.push(ExtractionIssue::MissingSender);

				DEFAULT_SENDER.to_string()
			},
		};
		let date_raw = header_value(payload, "date").unwrap_or_default();
		let received_at = match parse_message_date(date_raw) {
			Some(ts) => ts,
			None => {
				issues.push(ExtractionIssue::DateFallback { raw: date_raw.to_string() });

				now
			},
		};
		let mut body_text = first_plain_text_body(payload, &mut issues);
		let original_chars = body_text.chars().count();

		if original_chars > self.max_body_chars {
			body_text = crate::truncate_chars(&body_text, self.max_body_chars).to_string();

			issues.push(ExtractionIssue::BodyTruncated { original_chars });
		}

		ExtractedContent {
			subject,
			sender,
			received_at,
			body_text,
			attachments: collect_attachments(payload),
			issues,
		}
	}
}

/// Parses an RFC 2822 `Date` header into UTC. A trailing comment such as `(PST)` is ignored.
pub fn parse_message_date(raw: &str) -> Option<OffsetDateTime> {
	let mut value = raw.trim();

	if value.ends_with(')')
		&& let Some(open) = value.rfind('(')
	{
		value = value[..open].trim_end();
	}
	if value.is_empty() {
		return None;
	}

	OffsetDateTime::parse(value, &Rfc2822).ok().map(|ts| ts.to_offset(UtcOffset::UTC))
}

pub fn collect_attachments(payload: &MessagePart) -> Vec<AttachmentMeta> {
	payload
		.walk()
		.into_iter()
		.filter(|part| !part.filename.trim().is_empty())
		.map(|part| AttachmentMeta {
			filename: part.filename.clone(),
			mime_type: if part.mime_type.trim().is_empty() {
				DEFAULT_ATTACHMENT_MIME.to_string()
			} else {
				part.mime_type.clone()
			},
			size_bytes: part.body.as_ref().map(|body| body.size.max(0)).unwrap_or(0),
		})
		.collect()
}

fn header_value<'a>(payload: &'a MessagePart, name: &str) -> Option<&'a str> {
	payload
		.headers
		.iter()
		.find(|header| header.name.eq_ignore_ascii_case(name))
		.map(|header| header.value.as_str())
}

fn first_plain_text_body(payload: &MessagePart, issues: &mut Vec<ExtractionIssue>) -> String {
	for part in payload.walk() {
		if !part.mime_type.eq_ignore_ascii_case("text/plain") || !part.filename.trim().is_empty() {
			continue;
		}

		let Some(data) = part.body.as_ref().and_then(|body| body.data.as_deref()) else {
			continue;
		};

		match URL_SAFE_LENIENT.decode(data.trim()) {
			Ok(bytes) => return String::from_utf8_lossy(&bytes).into_owned(),
			Err(_) =>
				issues.push(ExtractionIssue::UndecodableBody { part_id: part.part_id.clone() }),
		}
	}

	String::new()
}
