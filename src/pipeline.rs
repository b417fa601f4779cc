//! Report pipeline orchestration.
//!
//! Coordinates one report request end to end:
//!
//! ```text
//! resolve country ─► fetch sources ─► corpus ─► chunks ─► index
//!        │              (concurrent)                        │
//!        ▼                                                  ▼
//!   ReportError                   parse ◄─ generate ◄─ prompt ◄─ MMR query
//! ```
//!
//! Source failures are absorbed by the connectors; only invalid input,
//! embedding, generation, and timeout failures reach the caller as a
//! [`ReportError`]. A pipeline owns its capabilities (connectors, embedder,
//! generator) and is shared across requests; per-request state lives on
//! the stack of [`ReportPipeline::generate_report`].

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chunk::chunk_corpus;
use crate::config::Config;
use crate::corpus::{build_corpus, Corpus};
use crate::country;
use crate::embedding::{create_embedder, Embedder};
use crate::error::ReportError;
use crate::generation::{create_generator, TextGenerator};
use crate::models::{DateRange, Passage, Report, ReportRequest};
use crate::parse::parse_report;
use crate::prompt::{assemble, Prompt};
use crate::retrieval::{MmrParams, RetrievalIndex, RetrievalResult};
use crate::traits::ConnectorRegistry;

/// The reusable report generator.
pub struct ReportPipeline {
    config: Config,
    connectors: ConnectorRegistry,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn TextGenerator>,
}

impl ReportPipeline {
    /// Assemble a pipeline from explicit capabilities.
    pub fn new(
        config: Config,
        connectors: ConnectorRegistry,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            connectors,
            embedder,
            generator,
        }
    }

    /// Build connectors, embedder, and generator from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.clone(),
            ConnectorRegistry::from_config(config)?,
            create_embedder(&config.embedding)?,
            create_generator(&config.generation)?,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connectors(&self) -> &ConnectorRegistry {
        &self.connectors
    }

    /// Validate the date range and resolve the country.
    pub fn resolve(&self, country_name: &str, range: DateRange) -> Result<ReportRequest, ReportError> {
        if !range.is_valid() {
            return Err(ReportError::InvalidDateRange {
                start: range.start_date,
                end: range.end_date,
            });
        }
        let country = country::lookup(country_name)
            .map_err(|_| ReportError::UnknownCountry(country_name.trim().to_string()))?;
        Ok(ReportRequest { country, range })
    }

    /// Fetch every source and render the corpus.
    pub async fn corpus(&self, req: &ReportRequest) -> Corpus {
        let timeout = Duration::from_secs(self.config.sources.timeout_secs);
        let records = self.connectors.fetch_all(req, timeout).await;
        let corpus = build_corpus(records);
        tracing::info!(
            country = req.country.name,
            blocks = corpus.blocks.len(),
            bytes = corpus.text.len(),
            "corpus built"
        );
        corpus
    }

    /// Split a corpus with the configured chunking parameters.
    pub fn passages(&self, corpus: &Corpus) -> Vec<Passage> {
        chunk_corpus(
            corpus,
            self.config.chunking.max_chars,
            self.config.chunking.overlap_chars,
        )
    }

    /// Embed the passages and select the context for `country`.
    pub async fn retrieve(
        &self,
        country_name: &str,
        passages: Vec<Passage>,
    ) -> Result<RetrievalResult, ReportError> {
        let started = Instant::now();
        let total = passages.len();
        let index = RetrievalIndex::build(
            passages,
            self.embedder.as_ref(),
            self.config.embedding.batch_size,
        )
        .await
        .map_err(|e| ReportError::Embedding(format!("{:#}", e)))?;

        let query = self.config.retrieval.query_for(country_name);
        let result = index
            .query(
                &query,
                self.embedder.as_ref(),
                MmrParams::from(&self.config.retrieval),
            )
            .await
            .map_err(|e| ReportError::Embedding(format!("{:#}", e)))?;

        tracing::info!(
            passages = total,
            selected = result.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "context retrieved"
        );
        Ok(result)
    }

    /// Build the prompt for a request without calling the model.
    pub async fn prompt(&self, req: &ReportRequest) -> Result<Prompt, ReportError> {
        let corpus = self.corpus(req).await;
        let passages = self.passages(&corpus);
        let retrieved = self.retrieve(req.country.name, passages).await?;
        Ok(assemble(
            req.country.name,
            &retrieved,
            &self.config.generation.language,
        ))
    }

    /// Produce a structured report for `country_name` over `range`.
    ///
    /// # Errors
    ///
    /// - [`ReportError::InvalidDateRange`] if `start > end`
    /// - [`ReportError::UnknownCountry`] if the name or code is not recognized
    /// - [`ReportError::Embedding`] if the embedding provider fails
    /// - [`ReportError::Generation`] / [`ReportError::EmptyGeneration`] if
    ///   the model fails or returns only whitespace
    pub async fn generate_report(
        &self,
        country_name: &str,
        range: DateRange,
    ) -> Result<Report, ReportError> {
        let started = Instant::now();
        let req = self.resolve(country_name, range)?;
        tracing::info!(
            country = req.country.name,
            start = %req.start(),
            end = %req.end(),
            "generating report"
        );

        let prompt = self.prompt(&req).await?;

        let generation_started = Instant::now();
        let text = self
            .generator
            .generate(
                &prompt.system,
                &prompt.user,
                self.config.generation.max_tokens,
            )
            .await
            .map_err(|e| ReportError::Generation(format!("{:#}", e)))?;
        if text.trim().is_empty() {
            return Err(ReportError::EmptyGeneration);
        }
        tracing::info!(
            model = self.generator.model_name(),
            chars = text.len(),
            elapsed_ms = generation_started.elapsed().as_millis() as u64,
            "generation finished"
        );

        let report = parse_report(&text);
        if report.is_empty() {
            tracing::warn!(country = req.country.name, "model output had no recognizable sections");
        }
        let uncited = report.uncited_items().len();
        if uncited > 0 {
            tracing::warn!(country = req.country.name, uncited, "report items without a citation");
        }

        tracing::info!(
            country = req.country.name,
            key_events = report.key_events.len(),
            trends = report.trends.len(),
            risks = report.risks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "report generated"
        );
        Ok(report)
    }

    /// [`generate_report`](Self::generate_report) bounded by `timeout`.
    pub async fn generate_report_with_timeout(
        &self,
        country_name: &str,
        range: DateRange,
        timeout: Duration,
    ) -> Result<Report, ReportError> {
        match tokio::time::timeout(timeout, self.generate_report(country_name, range)).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::Timeout(timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::{Provenance, SourceRecord};
    use crate::traits::Connector;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct StaticConnector;

    #[async_trait]
    impl Connector for StaticConnector {
        fn name(&self) -> &str {
            "static"
        }
        fn provenance(&self) -> Provenance {
            Provenance::SituationReport
        }
        async fn scan(&self, req: &ReportRequest) -> Result<Vec<SourceRecord>> {
            Ok(SourceRecord::new(
                Provenance::SituationReport,
                Some("Flash update".to_string()),
                req.end(),
                "OCHA",
                "Floods displaced 200,000 people.",
            )
            .into_iter()
            .collect())
        }
        fn no_data_record(&self, req: &ReportRequest) -> SourceRecord {
            SourceRecord::no_data(Provenance::SituationReport, req.end(), "none")
        }
    }

    /// Records the prompt it was given and replies with canned text.
    struct CannedGenerator {
        reply: Result<String, String>,
        seen_user: Mutex<Option<String>>,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn generate(&self, _system: &str, user: &str, _max: usize) -> Result<String> {
            if let Ok(mut seen) = self.seen_user.lock() {
                *seen = Some(user.to_string());
            }
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn make_pipeline(reply: Result<String, String>) -> (ReportPipeline, Arc<CannedGenerator>) {
        let generator = Arc::new(CannedGenerator {
            reply,
            seen_user: Mutex::new(None),
        });
        let mut connectors = ConnectorRegistry::new();
        connectors.register(Arc::new(StaticConnector));
        let pipeline = ReportPipeline::new(
            Config::default(),
            connectors,
            Arc::new(HashEmbedder::new(64)),
            generator.clone(),
        );
        (pipeline, generator)
    }

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_generate_report_end_to_end() {
        let (pipeline, generator) = make_pipeline(Ok(
            "**Executive Summary**\nSevere floods (ReliefWeb).\n**Key Events**\n- 200,000 displaced (ReliefWeb)"
                .to_string(),
        ));
        let report = pipeline
            .generate_report("Kenya", range((2024, 1, 1), (2024, 6, 30)))
            .await
            .unwrap();
        assert_eq!(report.summary, "Severe floods (ReliefWeb).");
        assert_eq!(report.key_events, vec!["200,000 displaced (ReliefWeb)"]);

        let user = generator.seen_user.lock().unwrap().clone().unwrap();
        assert!(user.starts_with("Relevant data about Kenya:"));
        assert!(user.contains("Floods displaced 200,000 people."));
    }

    #[tokio::test]
    async fn test_invalid_range_and_unknown_country() {
        let (pipeline, _) = make_pipeline(Ok("x".to_string()));
        let err = pipeline
            .generate_report("Kenya", range((2024, 6, 30), (2024, 1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidDateRange { .. }));

        let err = pipeline
            .generate_report("Atlantis", range((2024, 1, 1), (2024, 6, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::UnknownCountry(ref c) if c == "Atlantis"));
    }

    #[tokio::test]
    async fn test_generation_failures_map_to_report_errors() {
        let (pipeline, _) = make_pipeline(Err("connection refused".to_string()));
        let err = pipeline
            .generate_report("Kenya", range((2024, 1, 1), (2024, 6, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Generation(_)));
        assert!(err.to_string().contains("connection refused"));

        let (pipeline, _) = make_pipeline(Ok("  \n ".to_string()));
        let err = pipeline
            .generate_report("Kenya", range((2024, 1, 1), (2024, 6, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::EmptyGeneration));
    }

    #[tokio::test]
    async fn test_unstructured_output_is_empty_report() {
        let (pipeline, _) = make_pipeline(Ok("I am unable to comply.".to_string()));
        let report = pipeline
            .generate_report("KE", range((2024, 1, 1), (2024, 1, 1)))
            .await
            .unwrap();
        assert!(report.is_empty());
    }
}
