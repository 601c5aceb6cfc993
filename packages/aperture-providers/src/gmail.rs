use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use time::OffsetDateTime;

use aperture_domain::raw::RawMessage;

use crate::{Error, Result};

/// One page of message ids, newest first as the mailbox returns them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessagePage {
	pub ids: Vec<String>,
	pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
	#[serde(default)]
	messages: Vec<MessageRef>,
	#[serde(default)]
	next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
	id: String,
}

#[derive(Clone, Debug)]
pub struct GmailClient {
	client: Client,
	api_base: String,
	user_id: String,
	base_query: String,
}
impl GmailClient {
	pub fn new(cfg: &aperture_config::Mail) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			api_base: cfg.api_base.trim_end_matches('/').to_string(),
			user_id: cfg.user_id.clone(),
			base_query: cfg.base_query.clone(),
		})
	}

	/// Lists ids received after `since`, or everything matching the base query on a first run.
	pub async fn list_new_message_ids(
		&self,
		access_token: &str,
		since: Option<OffsetDateTime>,
		max_results: u32,
		page_token: Option<&str>,
	) -> Result<MessagePage> {
		let query = listing_query(&self.base_query, since.map(OffsetDateTime::unix_timestamp));

		self.list_message_ids(access_token, &query, max_results, page_token).await
	}

	pub async fn list_message_ids(
		&self,
		access_token: &str,
		query: &str,
		max_results: u32,
		page_token: Option<&str>,
	) -> Result<MessagePage> {
		let url = format!("{}/gmail/v1/users/{}/messages", self.api_base, self.user_id);
		let mut params = vec![("maxResults", max_results.to_string())];

		if !query.is_empty() {
			params.push(("q", query.to_string()));
		}
		if let Some(token) = page_token {
			params.push(("pageToken", token.to_string()));
		}

		let res = self.client.get(url).bearer_auth(access_token).query(&params).send().await?;
		let body: ListResponse = check_status(res).await?.json().await?;

		Ok(MessagePage {
			ids: body.messages.into_iter().map(|message| message.id).collect(),
			next_page_token: body.next_page_token.filter(|token| !token.is_empty()),
		})
	}

	pub async fn get_message(&self, access_token: &str, message_id: &str) -> Result<RawMessage> {
		let url =
			format!("{}/gmail/v1/users/{}/messages/{message_id}", self.api_base, self.user_id);
		let res = self
			.client
			.get(url)
			.bearer_auth(access_token)
			.query(&[("format", "full")])
			.send()
			.await?;
		let raw: RawMessage = check_status(res).await?.json().await?;

		Ok(raw)
	}
}

/// Appends the watermark filter to the configured base query.
pub fn listing_query(base_query: &str, after_unix_seconds: Option<i64>) -> String {
	match after_unix_seconds {
		Some(seconds) if base_query.is_empty() => format!("after:{seconds}"),
		Some(seconds) => format!("{base_query} after:{seconds}"),
		None => base_query.to_string(),
	}
}

async fn check_status(res: Response) -> Result<Response> {
	let status = res.status();

	if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
		return Err(Error::Unauthorized { status: status.as_u16() });
	}
	if !status.is_success() {
		let message = res.text().await.unwrap_or_default();

		return Err(Error::Status { status: status.as_u16(), message });
	}

	Ok(res)
}
