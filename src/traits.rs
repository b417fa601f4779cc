//! Source connector trait and registry.
//!
//! Each external data source (World Bank, ReliefWeb, GNews, ACLED) is a
//! [`Connector`]. The [`ConnectorRegistry`] fans a [`ReportRequest`] out to
//! every registered connector at once and collects their records.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               ConnectorRegistry               │
//! │ ┌──────────┐┌──────────┐┌────────┐┌─────────┐ │
//! │ │World Bank││ReliefWeb ││ GNews  ││  ACLED  │ │
//! │ └──────────┘└──────────┘└────────┘└─────────┘ │
//! └──────────────────────┬────────────────────────┘
//!                        ▼
//!          fetch_all() → corpus → chunks → index
//! ```
//!
//! Connectors are fail-soft at the registry boundary: a network error, a
//! bad status, an unexpected JSON shape, a timeout, or simply an empty
//! result all turn into a single "no data" [`SourceRecord`]. The model is
//! told explicitly that a source had nothing rather than seeing silence.
//!
//! # Usage
//!
//! ```rust
//! use ngo_report::traits::ConnectorRegistry;
//!
//! let connectors = ConnectorRegistry::new();
//! // connectors.register(std::sync::Arc::new(MyConnector::new()));
//! assert!(connectors.is_empty());
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::connector_acled::AcledConnector;
use crate::connector_gnews::GNewsConnector;
use crate::connector_reliefweb::ReliefWebConnector;
use crate::connector_worldbank::WorldBankConnector;
use crate::models::{Provenance, ReportRequest, SourceRecord};

// ═══════════════════════════════════════════════════════════════════════
// Connector Trait
// ═══════════════════════════════════════════════════════════════════════

/// An external data source that produces records for one report request.
///
/// Implementors only write [`scan`](Connector::scan) and
/// [`no_data_record`](Connector::no_data_record); the provided
/// [`fetch`](Connector::fetch) wraps them with the fail-soft policy.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use ngo_report::models::{Provenance, ReportRequest, SourceRecord};
/// use ngo_report::traits::Connector;
///
/// pub struct BulletinConnector;
///
/// #[async_trait]
/// impl Connector for BulletinConnector {
///     fn name(&self) -> &str { "bulletin" }
///     fn provenance(&self) -> Provenance { Provenance::SituationReport }
///
///     async fn scan(&self, _req: &ReportRequest) -> Result<Vec<SourceRecord>> {
///         Ok(vec![])
///     }
///
///     fn no_data_record(&self, req: &ReportRequest) -> SourceRecord {
///         SourceRecord::no_data(
///             self.provenance(),
///             req.end(),
///             format!("No bulletins for {}.", req.country.name),
///         )
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Short identifier used in logs and `ngo-report sources`
    /// (e.g. `"worldbank"`).
    fn name(&self) -> &str;

    /// Which citation label records from this connector carry.
    fn provenance(&self) -> Provenance;

    /// Query the upstream for the request's country and date window.
    ///
    /// Errors here never escape the registry; see [`fetch`](Connector::fetch).
    async fn scan(&self, req: &ReportRequest) -> Result<Vec<SourceRecord>>;

    /// The record that stands in for this source when it has nothing.
    fn no_data_record(&self, req: &ReportRequest) -> SourceRecord;

    /// Fail-soft wrapper around [`scan`](Connector::scan).
    ///
    /// Always returns at least one record: the scanned records, or the
    /// sentinel when the scan failed or came back empty.
    async fn fetch(&self, req: &ReportRequest) -> Vec<SourceRecord> {
        match self.scan(req).await {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => {
                tracing::info!(source = self.name(), country = req.country.name, "no records");
                vec![self.no_data_record(req)]
            }
            Err(e) => {
                tracing::warn!(
                    source = self.name(),
                    country = req.country.name,
                    error = %format!("{:#}", e),
                    "source fetch failed"
                );
                vec![self.no_data_record(req)]
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ConnectorRegistry
// ═══════════════════════════════════════════════════════════════════════

/// The set of connectors consulted for every report.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
        }
    }

    /// Register every enabled built-in connector from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let sources = &config.sources;
        let mut registry = Self::new();

        if sources.worldbank.enabled {
            registry.register(Arc::new(WorldBankConnector::new(
                sources.worldbank.clone(),
                sources.timeout_secs,
                sources.max_retries,
            )?));
        }
        if sources.reliefweb.enabled {
            registry.register(Arc::new(ReliefWebConnector::new(
                sources.reliefweb.clone(),
                sources.timeout_secs,
                sources.max_retries,
            )?));
        }
        if sources.gnews.enabled {
            registry.register(Arc::new(GNewsConnector::new(
                sources.gnews.clone(),
                sources.timeout_secs,
                sources.max_retries,
            )?));
        }
        if sources.acled.enabled {
            registry.register(Arc::new(AcledConnector::new(
                sources.acled.clone(),
                sources.timeout_secs,
                sources.max_retries,
            )?));
        }

        Ok(registry)
    }

    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.push(connector);
    }

    pub fn connectors(&self) -> &[Arc<dyn Connector>] {
        &self.connectors
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Fetch from every connector concurrently.
    ///
    /// Each connector is bounded by `timeout`; one that overruns
    /// contributes its sentinel record. Records are returned in
    /// registration order; the corpus builder applies the final ordering.
    pub async fn fetch_all(&self, req: &ReportRequest, timeout: Duration) -> Vec<SourceRecord> {
        let futures = self.connectors.iter().map(|connector| {
            let connector = Arc::clone(connector);
            async move {
                let started = Instant::now();
                let records = match tokio::time::timeout(timeout, connector.fetch(req)).await {
                    Ok(records) => records,
                    Err(_) => {
                        tracing::warn!(
                            source = connector.name(),
                            country = req.country.name,
                            timeout_secs = timeout.as_secs(),
                            "source fetch timed out"
                        );
                        vec![connector.no_data_record(req)]
                    }
                };
                tracing::info!(
                    source = connector.name(),
                    records = records.iter().filter(|r| !r.no_data).count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "source fetched"
                );
                records
            }
        });

        futures::future::join_all(futures)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}
