//! # NGO Report
//!
//! Retrieval-augmented situation reports for humanitarian work.
//!
//! Given a country and a date range, the pipeline pulls economic
//! indicators (World Bank), conflict events (ACLED), situation reports
//! (ReliefWeb) and news (GNews), merges them into one corpus, splits it
//! into overlapping passages, selects a relevant and diverse subset with
//! maximal marginal relevance, and asks a chat model for a cited report
//! that is parsed back into sections.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌───────────┐   ┌────────────┐
//! │  Connectors  │──▶│  Corpus  │──▶│  Chunker  │──▶│ Retrieval  │
//! │ WB/ACLED/... │   │ blocks   │   │ passages  │   │ embed+MMR  │
//! └──────────────┘   └──────────┘   └───────────┘   └─────┬──────┘
//!                                                         │
//!        ┌────────┐   ┌────────────┐   ┌──────────┐       │
//!        │ Report │◀──│   Parser   │◀──│ Generator│◀──────┘
//!        └───┬────┘   └────────────┘   └──────────┘  prompt
//!            │
//!     ┌──────┴─────┐
//!     ▼            ▼
//! ┌────────┐  ┌────────┐
//! │  CLI   │  │  HTTP  │
//! └────────┘  └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ngo-report sources                                   # check credentials
//! ngo-report corpus --country Kenya --start 2024-01-01 --end 2024-06-30
//! ngo-report report --country Kenya --start 2024-01-01 --end 2024-06-30
//! ngo-report serve                                     # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`country`] | Country name and ISO code lookup |
//! | [`traits`] | `Connector` trait and registry |
//! | [`connector_worldbank`] | World Bank indicators |
//! | [`connector_acled`] | ACLED conflict events |
//! | [`connector_reliefweb`] | ReliefWeb situation reports |
//! | [`connector_gnews`] | GNews articles |
//! | [`corpus`] | Merge records into one provenance-ordered text |
//! | [`chunk`] | Overlapping passage splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`retrieval`] | Similarity index and MMR selection |
//! | [`prompt`] | Prompt assembly |
//! | [`generation`] | Chat model backends |
//! | [`parse`] | Model output to [`models::Report`] |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`export`] | Markdown and JSON rendering |
//! | [`server`] | HTTP API |
//! | [`sources`] | Source readiness listing |

pub mod chunk;
pub mod config;
pub mod connector_acled;
pub mod connector_gnews;
pub mod connector_reliefweb;
pub mod connector_worldbank;
pub mod corpus;
pub mod country;
pub mod embedding;
pub mod error;
pub mod export;
pub mod generation;
pub mod http;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod server;
pub mod sources;
pub mod traits;

pub use error::ReportError;
pub use pipeline::ReportPipeline;
