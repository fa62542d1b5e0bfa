/*
 * Copyright 2021 Daniel Bornkessel
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use url::Url;

use crate::pg::tls::{self, TlsMode};

/// A failed statement, with the SQLSTATE reported by the backend if there is one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}{}", .code.as_ref().map(|c| format!(" (SQLSTATE {})", c)).unwrap_or_default())]
pub struct SqlError {
    pub code: Option<String>,
    pub message: String,
}

impl SqlError {
    pub fn backend(code: &str, message: impl Into<String>) -> Self {
        SqlError {
            code: Some(code.to_string()),
            message: message.into(),
        }
    }

    pub fn client(message: impl Into<String>) -> Self {
        SqlError {
            code: None,
            message: message.into(),
        }
    }

    pub fn condition(&self) -> Option<Condition> {
        self.code.as_deref().and_then(Condition::from_code)
    }

    pub fn is(&self, condition: Condition) -> bool {
        self.condition() == Some(condition)
    }
}

impl From<tokio_postgres::Error> for SqlError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) => SqlError::backend(db.code().code(), db.message()),
            None => SqlError {
                code: e.code().map(|c| c.code().to_string()),
                message: e.to_string(),
            },
        }
    }
}

/// Backend conditions the role engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    DuplicateObject,
    DuplicateDatabase,
    UndefinedObject,
    InvalidCatalogName,
    AlreadyMember,
    SyntaxError,
}

/// SQLSTATE to condition.
pub const CONDITIONS: &[(&str, Condition)] = &[
    ("42710", Condition::DuplicateObject),
    ("42P04", Condition::DuplicateDatabase),
    ("42704", Condition::UndefinedObject),
    ("3D000", Condition::InvalidCatalogName),
    ("0LP01", Condition::AlreadyMember),
    ("42601", Condition::SyntaxError),
];

/// Conditions that mean "already done" and may be downgraded to success by
/// the operation that names them.
pub const BENIGN_CONDITIONS: &[Condition] = &[
    Condition::DuplicateObject,
    Condition::DuplicateDatabase,
    Condition::UndefinedObject,
    Condition::InvalidCatalogName,
    Condition::AlreadyMember,
];

impl Condition {
    pub fn from_code(code: &str) -> Option<Condition> {
        CONDITIONS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, condition)| *condition)
    }

    pub fn code(self) -> &'static str {
        CONDITIONS
            .iter()
            .find(|(_, condition)| *condition == self)
            .map(|(code, _)| *code)
            .unwrap_or_default()
    }

    pub fn is_benign(self) -> bool {
        BENIGN_CONDITIONS.contains(&self)
    }
}

pub trait Tolerate {
    /// Turns a failure carrying one of the given benign conditions into success.
    fn tolerate(self, conditions: &[Condition]) -> Result<(), SqlError>;
}

impl<T> Tolerate for Result<T, SqlError> {
    fn tolerate(self, conditions: &[Condition]) -> Result<(), SqlError> {
        match self {
            Ok(_) => Ok(()),
            Err(e) => match e.condition() {
                Some(c) if c.is_benign() && conditions.contains(&c) => {
                    debug!("ignoring benign error: {}", e);
                    Ok(())
                }
                _ => Err(e),
            },
        }
    }
}

/// One open connection to one database.
#[async_trait]
pub trait Session: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<(), SqlError>;

    async fn execute_with(&self, sql: &str, params: &[&str]) -> Result<u64, SqlError>;

    /// First column of the first row, if any.
    async fn query_string(&self, sql: &str, params: &[&str]) -> Result<Option<String>, SqlError>;

    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, database: &str) -> Result<Box<dyn Session>, SqlError>;
}

#[derive(Clone)]
pub struct PgConnector {
    host: String,
    user: String,
    password: String,
    uri_args: String,
    tls_mode: TlsMode,
    tls: Option<MakeRustlsConnect>,
}

impl PgConnector {
    /// Fails if the `sslmode` in `uri_args` is unknown.
    pub fn new(host: &str, user: &str, password: &str, uri_args: &str) -> Result<Self, SqlError> {
        let tls_mode = TlsMode::from_uri_args(uri_args)?;
        let tls = tls::client_config(tls_mode)?.map(MakeRustlsConnect::new);
        Ok(PgConnector {
            host: host.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            uri_args: uri_args.to_string(),
            tls_mode,
            tls,
        })
    }

    pub fn tls_mode(&self) -> TlsMode {
        self.tls_mode
    }

    pub fn connection_url(&self, database: &str) -> Result<Url, SqlError> {
        let mut url = Url::parse(&format!("postgresql://{}/", self.host))
            .map_err(|e| SqlError::client(format!("invalid postgres host '{}': {}", self.host, e)))?;
        url.set_username(&self.user)
            .map_err(|_| SqlError::client(format!("invalid postgres user '{}'", self.user)))?;
        url.set_password(Some(&self.password))
            .map_err(|_| SqlError::client("invalid postgres password"))?;
        url.set_path(&format!("/{}", database));
        url.set_query(Some(&tls::connection_query(&self.uri_args, self.tls_mode)));
        Ok(url)
    }
}

fn spawn_connection<S, T>(database: &str, connection: tokio_postgres::Connection<S, T>) -> JoinHandle<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let database = database.to_string();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!("connection to database {} failed: {}", database, e);
        }
    })
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, database: &str) -> Result<Box<dyn Session>, SqlError> {
        let url = self.connection_url(database)?;

        debug!(
            "connecting to database {} on {} (sslmode {:?})",
            database, self.host, self.tls_mode
        );
        let (client, connection) = match &self.tls {
            None => {
                let (client, connection) = tokio_postgres::connect(url.as_str(), NoTls).await?;
                (client, spawn_connection(database, connection))
            }
            Some(tls) => {
                let (client, connection) = tokio_postgres::connect(url.as_str(), tls.clone()).await?;
                (client, spawn_connection(database, connection))
            }
        };

        Ok(Box::new(PgSession { client, connection }))
    }
}

pub struct PgSession {
    client: tokio_postgres::Client,
    connection: JoinHandle<()>,
}

fn to_sql_params<'a>(params: &'a [&'a str]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&self, sql: &str) -> Result<(), SqlError> {
        Ok(self.client.batch_execute(sql).await?)
    }

    async fn execute_with(&self, sql: &str, params: &[&str]) -> Result<u64, SqlError> {
        let params = to_sql_params(params);
        Ok(self.client.execute(sql, &params).await?)
    }

    async fn query_string(&self, sql: &str, params: &[&str]) -> Result<Option<String>, SqlError> {
        let params = to_sql_params(params);
        let rows = self.client.query(sql, &params).await?;
        match rows.first() {
            Some(row) => Ok(row.try_get::<_, Option<String>>(0)?),
            None => Ok(None),
        }
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.connection.abort();
    }
}
