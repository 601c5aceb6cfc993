//! Wire shape of a message as returned by the mail source (`format=full`).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
	pub id: String,
	#[serde(default)]
	pub thread_id: String,
	#[serde(default)]
	pub snippet: String,
	#[serde(default)]
	pub payload: Option<MessagePart>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
	#[serde(default)]
	pub part_id: String,
	#[serde(default)]
	pub mime_type: String,
	#[serde(default)]
	pub filename: String,
	#[serde(default)]
	pub headers: Vec<Header>,
	#[serde(default)]
	pub body: Option<PartBody>,
	#[serde(default)]
	pub parts: Vec<MessagePart>,
}
impl MessagePart {
	/// Visits this part and every nested part in pre-order.
	pub fn walk(&self) -> Vec<&MessagePart> {
		let mut out = Vec::new();
		let mut stack = vec![self];

		while let Some(part) = stack.pop() {
			out.push(part);

			for child in part.parts.iter().rev() {
				stack.push(child);
			}
		}

		out
	}
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Header {
	pub name: String,
	pub value: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
	#[serde(default)]
	pub size: i64,
	#[serde(default)]
	pub data: Option<String>,
	#[serde(default)]
	pub attachment_id: Option<String>,
}
