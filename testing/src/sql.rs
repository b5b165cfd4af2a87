//! In-memory SQL driver.

use async_trait::async_trait;
use errors::SqlClientError;
use icekit_core::{QueryResult, SqlClient, SqlConnector};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Hands out [`FakeSqlClient`]s and remembers every DSN it was given.
#[derive(Debug, Default)]
pub struct FakeSqlConnector {
    open_failure: Option<String>,
    failing_queries: u32,
    dsns: Mutex<Vec<String>>,
    clients: Mutex<Vec<Arc<FakeSqlClient>>>
}

impl FakeSqlConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open` fails with `reason`.
    pub fn fail_open(mut self, reason: &str) -> Self {
        self.open_failure = Some(reason.to_string());
        self
    }

    /// The first `count` queries of each client fail with a transport error.
    pub fn failing_queries(mut self, count: u32) -> Self {
        self.failing_queries = count;
        self
    }

    pub fn dsns(&self) -> Vec<String> {
        self.dsns.lock().clone()
    }

    pub fn clients(&self) -> Vec<Arc<FakeSqlClient>> {
        self.clients.lock().clone()
    }
}

impl SqlConnector for FakeSqlConnector {
    fn open(&self, dsn: &str) -> Result<Arc<dyn SqlClient>, SqlClientError> {
        self.dsns.lock().push(dsn.to_string());
        if let Some(reason) = &self.open_failure {
            return Err(SqlClientError::InvalidDsn {
                dsn: dsn.to_string(),
                reason: reason.clone()
            });
        }
        let client = Arc::new(FakeSqlClient {
            dsn: dsn.to_string(),
            remaining_failures: AtomicU32::new(self.failing_queries),
            queries: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false)
        });
        self.clients.lock().push(Arc::clone(&client));
        Ok(client)
    }
}

#[derive(Debug)]
pub struct FakeSqlClient {
    dsn: String,
    remaining_failures: AtomicU32,
    queries: Mutex<Vec<String>>,
    closed: AtomicBool
}

impl FakeSqlClient {
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Statements received, failed attempts included.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SqlClient for FakeSqlClient {
    async fn query(&self, sql: &str) -> Result<QueryResult, SqlClientError> {
        if self.is_closed() {
            return Err(SqlClientError::Closed);
        }
        self.queries.lock().push(sql.to_string());

        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SqlClientError::Transport {
                reason: "connection refused".to_string()
            });
        }
        Ok(QueryResult::default())
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
