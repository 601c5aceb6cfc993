//! Per-test Postgres databases and Qdrant collections for the storage integration tests.
//!
//! `APERTURE_PG_DSN` names a server the tests may create databases on and `APERTURE_QDRANT_URL`
//! a Qdrant gRPC endpoint. Tests skip themselves when either is unset.

use std::{env, str::FromStr};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

pub const PG_DSN_ENV: &str = "APERTURE_PG_DSN";
pub const QDRANT_URL_ENV: &str = "APERTURE_QDRANT_URL";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("APERTURE_PG_DSN is not a valid Postgres DSN: {0}")]
	InvalidDsn(#[source] sqlx::Error),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
}

/// One test's database and collection. Finish with [`Sandbox::teardown`].
pub struct Sandbox {
	database: String,
	dsn: String,
	server: PgConnectOptions,
	qdrant_url: Option<String>,
	collection: String,
	torn_down: bool,
}
impl Sandbox {
	/// `Ok(None)` when `APERTURE_PG_DSN` is unset.
	pub async fn from_env() -> Result<Option<Self>> {
		let Ok(dsn) = env::var(PG_DSN_ENV) else {
			return Ok(None);
		};

		Self::create(&dsn, env::var(QDRANT_URL_ENV).ok()).await.map(Some)
	}

	pub async fn create(server_dsn: &str, qdrant_url: Option<String>) -> Result<Self> {
		let server = PgConnectOptions::from_str(server_dsn).map_err(Error::InvalidDsn)?;
		let suffix = Uuid::new_v4().simple().to_string();
		let database = format!("aperture_test_{suffix}");
		let mut conn = PgConnection::connect_with(&server).await?;

		conn.execute(format!(r#"CREATE DATABASE "{database}""#).as_str()).await?;
		conn.close().await?;

		Ok(Self {
			dsn: server.clone().database(&database).to_url_lossy().to_string(),
			database,
			server,
			qdrant_url,
			collection: format!("aperture_emails_{suffix}"),
			torn_down: false,
		})
	}

	pub fn postgres_config(&self) -> aperture_config::Postgres {
		aperture_config::Postgres { dsn: self.dsn.clone(), pool_max_conns: 2 }
	}

	/// `None` when `APERTURE_QDRANT_URL` is unset.
	pub fn qdrant_config(&self, vector_dim: u32) -> Option<aperture_config::Qdrant> {
		self.qdrant_url.as_ref().map(|url| aperture_config::Qdrant {
			url: url.clone(),
			collection: self.collection.clone(),
			vector_dim,
		})
	}

	/// Drops the collection, if one was created, and then the database.
	pub async fn teardown(mut self) -> Result<()> {
		if let Some(url) = &self.qdrant_url {
			let client = Qdrant::from_url(url).build().map_err(Box::new)?;

			if client.collection_exists(self.collection.clone()).await.map_err(Box::new)? {
				client.delete_collection(self.collection.clone()).await.map_err(Box::new)?;
			}
		}

		let mut conn = PgConnection::connect_with(&self.server).await?;
		let drop_sql = format!(r#"DROP DATABASE IF EXISTS "{}" WITH (FORCE)"#, self.database);

		conn.execute(drop_sql.as_str()).await?;
		conn.close().await?;

		self.torn_down = true;

		Ok(())
	}
}
impl Drop for Sandbox {
	fn drop(&mut self) {
		if !self.torn_down {
			eprintln!("Test database {} was left behind; drop it manually.", self.database);
		}
	}
}
