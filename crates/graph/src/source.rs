//! Citation database access
//!
//! The tree builder only needs two reads: "is this identifier known?" and
//! "give me its record". `ApiDataSource` answers both over HTTP;
//! `StaticDataSource` serves records held in memory.

use async_trait::async_trait;
use citenet_common::config::DataSourceConfig;
use citenet_common::errors::{AppError, Result};
use citenet_common::http::{NetworkClient, STATUS_NOT_FOUND, STATUS_OK};
use citenet_common::records::{IdKind, Record};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Read contract of the citation database
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Whether the database knows `identifier`
    async fn exists(&self, identifier: &str, kind: IdKind) -> Result<bool>;

    /// Full record for `identifier`
    async fn fetch_record(&self, identifier: &str, kind: IdKind) -> Result<Record>;
}

/// Citation database reached over HTTP
pub struct ApiDataSource {
    client: Arc<dyn NetworkClient>,
    paper_url: String,
}

impl ApiDataSource {
    pub fn new(client: Arc<dyn NetworkClient>, config: &DataSourceConfig) -> Self {
        Self {
            client,
            paper_url: config.paper_url(),
        }
    }
}

#[async_trait]
impl DataSource for ApiDataSource {
    async fn exists(&self, identifier: &str, kind: IdKind) -> Result<bool> {
        let response = self
            .client
            .get(&self.paper_url, &[(kind.param(), identifier)])
            .await?;

        debug!(identifier = identifier, kind = %kind, status = response.status, "Existence check");
        match response.status {
            STATUS_OK => Ok(true),
            STATUS_NOT_FOUND => Ok(false),
            status => Err(AppError::UpstreamStatus {
                status,
                url: self.paper_url.clone(),
            }),
        }
    }

    async fn fetch_record(&self, identifier: &str, kind: IdKind) -> Result<Record> {
        let response = self
            .client
            .get(&self.paper_url, &[(kind.param(), identifier)])
            .await?;

        match response.status {
            STATUS_OK => serde_json::from_str(&response.body).map_err(|e| AppError::MalformedRecord {
                identifier: identifier.to_string(),
                message: e.to_string(),
            }),
            STATUS_NOT_FOUND => Err(AppError::RecordNotFound {
                identifier: identifier.to_string(),
            }),
            status => Err(AppError::UpstreamStatus {
                status,
                url: self.paper_url.clone(),
            }),
        }
    }
}

/// In-memory citation database
///
/// Records are keyed by uri; DOIs resolve through a separate index.
#[derive(Default)]
pub struct StaticDataSource {
    records: HashMap<String, Record>,
    dois: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl StaticDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record reachable by uri
    pub fn with_record(mut self, record: Record) -> Self {
        self.records.insert(record.uri.clone(), record);
        self
    }

    /// Add a record reachable by both uri and `doi`
    pub fn with_doi(mut self, doi: impl Into<String>, record: Record) -> Self {
        self.dois.insert(doi.into(), record.uri.clone());
        self.with_record(record)
    }

    /// Number of `fetch_record` calls served
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn lookup(&self, identifier: &str, kind: IdKind) -> Option<&Record> {
        match kind {
            IdKind::Uri => self.records.get(identifier),
            IdKind::Doi => self
                .dois
                .get(identifier)
                .and_then(|uri| self.records.get(uri)),
        }
    }
}

impl FromIterator<Record> for StaticDataSource {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        iter.into_iter()
            .fold(StaticDataSource::new(), StaticDataSource::with_record)
    }
}

#[async_trait]
impl DataSource for StaticDataSource {
    async fn exists(&self, identifier: &str, kind: IdKind) -> Result<bool> {
        Ok(self.lookup(identifier, kind).is_some())
    }

    async fn fetch_record(&self, identifier: &str, kind: IdKind) -> Result<Record> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.lookup(identifier, kind)
            .cloned()
            .ok_or_else(|| AppError::RecordNotFound {
                identifier: identifier.to_string(),
            })
    }
}
