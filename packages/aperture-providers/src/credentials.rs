//! Access tokens read from a JSON file maintained by an external OAuth helper.
//!
//! Nothing here refreshes tokens. A missing, unreadable, or expired token means there is no
//! credential and the caller aborts the run.

use std::{io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use time::OffsetDateTime;
use tokio::fs;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW: time::Duration = time::Duration::seconds(30);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
	pub access_token: String,
	pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
struct TokenFile {
	access_token: String,
	#[serde(default, with = "time::serde::rfc3339::option")]
	expires_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug)]
pub struct TokenFileCredentials {
	path: PathBuf,
}
impl TokenFileCredentials {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub async fn load(&self) -> Option<AccessToken> {
		self.load_at(OffsetDateTime::now_utc()).await
	}

	pub async fn load_at(&self, now: OffsetDateTime) -> Option<AccessToken> {
		let raw = match fs::read_to_string(&self.path).await {
			Ok(raw) => raw,
			Err(err) if err.kind() == ErrorKind::NotFound => {
				tracing::warn!(path = %self.path.display(), "Token file does not exist.");

				return None;
			},
			Err(err) => {
				tracing::warn!(
					path = %self.path.display(),
					error = %err,
					"Token file is not readable."
				);

				return None;
			},
		};
		let file: TokenFile = match serde_json::from_str(&raw) {
			Ok(file) => file,
			Err(err) => {
				tracing::warn!(
					path = %self.path.display(),
					error = %err,
					"Token file is malformed."
				);

				return None;
			},
		};

		if file.access_token.trim().is_empty() {
			return None;
		}
		if let Some(expires_at) = file.expires_at
			&& expires_at - EXPIRY_SKEW <= now
		{
			tracing::warn!(path = %self.path.display(), %expires_at, "Access token has expired.");

			return None;
		}

		Some(AccessToken { access_token: file.access_token, expires_at: file.expires_at })
	}
}
