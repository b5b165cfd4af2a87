//! Minimal Trino HTTP client.
//!
//! Speaks the `/v1/statement` protocol: submit the statement, then follow
//! `nextUri` until the server stops returning one, collecting columns and
//! rows on the way.

use async_trait::async_trait;
use errors::SqlClientError;
use icekit_core::{Column, QueryResult, SqlClient, SqlConnector};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const USER_HEADER: &str = "X-Trino-User";
const CATALOG_HEADER: &str = "X-Trino-Catalog";
const SCHEMA_HEADER: &str = "X-Trino-Schema";
const SESSION_HEADER: &str = "X-Trino-Session";

/// Opens [`TrinoClient`]s.
#[derive(Debug, Clone, Default)]
pub struct TrinoConnector {
    http: reqwest::Client
}

impl TrinoConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SqlConnector for TrinoConnector {
    fn open(&self, dsn: &str) -> Result<Arc<dyn SqlClient>, SqlClientError> {
        let client = TrinoClient::from_dsn(self.http.clone(), dsn)?;
        Ok(Arc::new(client))
    }
}

#[derive(Debug)]
pub struct TrinoClient {
    http: reqwest::Client,
    statement_url: Url,
    user: String,
    catalog: Option<String>,
    schema: Option<String>,
    session: Option<String>,
    closed: AtomicBool
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    next_uri: Option<String>,
    columns: Option<Vec<Column>>,
    data: Option<Vec<Vec<serde_json::Value>>>,
    error: Option<StatementError>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementError {
    message: String,
    #[serde(default)]
    error_name: String
}

impl TrinoClient {
    /// Parses `http://{user}@{host}:{port}?catalog=..&schema=..[&session_properties=..]`.
    pub fn from_dsn(http: reqwest::Client, dsn: &str) -> Result<Self, SqlClientError> {
        let invalid = |reason: &str| SqlClientError::InvalidDsn {
            dsn: dsn.to_string(),
            reason: reason.to_string()
        };

        let url = Url::parse(dsn).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        let user = url.username();
        if user.is_empty() {
            return Err(invalid("missing user"));
        }

        let mut catalog = None;
        let mut schema = None;
        let mut session = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "catalog" => catalog = Some(value.into_owned()),
                "schema" => schema = Some(value.into_owned()),
                "session_properties" => session = Some(value.into_owned()),
                other => tracing::debug!("Ignoring unknown DSN parameter {}", other)
            }
        }

        let mut statement_url = url.clone();
        statement_url
            .set_username("")
            .map_err(|()| invalid("cannot strip user"))?;
        statement_url.set_query(None);
        statement_url.set_path("/v1/statement");

        Ok(Self {
            http,
            statement_url,
            user: user.to_string(),
            catalog,
            schema,
            session,
            closed: AtomicBool::new(false)
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn with_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request.header(USER_HEADER, &self.user);
        if let Some(catalog) = &self.catalog {
            request = request.header(CATALOG_HEADER, catalog);
        }
        if let Some(schema) = &self.schema {
            request = request.header(SCHEMA_HEADER, schema);
        }
        if let Some(session) = &self.session {
            request = request.header(SESSION_HEADER, session);
        }
        request
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<StatementResponse, SqlClientError> {
        let response = self
            .with_headers(request)
            .send()
            .await
            .map_err(|e| SqlClientError::Transport {
                reason: e.to_string()
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SqlClientError::Transport {
                reason: format!("HTTP {}: {}", status, body)
            });
        }

        response.json().await.map_err(|e| SqlClientError::Transport {
            reason: format!("malformed response: {}", e)
        })
    }
}

#[async_trait]
impl SqlClient for TrinoClient {
    async fn query(&self, sql: &str) -> Result<QueryResult, SqlClientError> {
        if self.is_closed() {
            return Err(SqlClientError::Closed);
        }

        let mut result = QueryResult::default();
        let mut page = self
            .fetch(self.http.post(self.statement_url.clone()).body(sql.to_string()))
            .await?;

        loop {
            if let Some(error) = page.error {
                return Err(SqlClientError::Query {
                    error_name: error.error_name,
                    message: error.message
                });
            }
            if result.columns.is_empty() {
                if let Some(columns) = page.columns {
                    result.columns = columns;
                }
            }
            if let Some(rows) = page.data {
                result.rows.extend(rows);
            }
            let Some(next) = page.next_uri else {
                break;
            };
            page = self.fetch(self.http.get(next)).await?;
        }

        tracing::debug!("Query returned {} row(s)", result.rows.len());
        Ok(result)
    }

    async fn close(&self) -> Result<(), SqlClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(SqlClientError::AlreadyClosed);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
