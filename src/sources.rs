//! Source status listing.
//!
//! Reports which sources are enabled and whether their credentials are
//! present. Used by both the `ngo-report sources` CLI command and the
//! `GET /api/sources` HTTP endpoint.
//!
//! | Source | Ready When |
//! |--------|-----------|
//! | `worldbank` | Enabled (public API) |
//! | `reliefweb` | Enabled (public API, `appname` identifies the caller) |
//! | `gnews` | Enabled and the API token variable is set |
//! | `acled` | Enabled and both credential variables are set |
//!
//! No network calls are made; an unreachable upstream only shows up when a
//! report is generated.

use anyhow::Result;
use serde::Serialize;

use crate::config::{secret, Config};
use crate::models::Provenance;

/// Configuration and readiness of one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    /// The connector name (e.g. `"gnews"`).
    pub name: String,
    /// Citation label used for this source's records.
    pub label: Provenance,
    pub enabled: bool,
    /// Enabled with all required credentials present.
    pub ready: bool,
    pub base_url: String,
    /// Diagnostic notes (e.g. `"G_NEWS_TOKEN not set"`).
    pub notes: Option<String>,
}

fn missing_vars(vars: &[&str]) -> Vec<String> {
    vars.iter()
        .filter(|v| secret(v).is_none())
        .map(|v| v.to_string())
        .collect()
}

fn status(
    name: &str,
    label: Provenance,
    enabled: bool,
    base_url: &str,
    required_env: &[&str],
) -> SourceStatus {
    let missing = missing_vars(required_env);
    let notes = if !enabled {
        Some("disabled in config".to_string())
    } else if !missing.is_empty() {
        Some(format!("{} not set", missing.join(", ")))
    } else if required_env.is_empty() {
        Some("public API".to_string())
    } else {
        Some("credentials present".to_string())
    };

    SourceStatus {
        name: name.to_string(),
        label,
        enabled,
        ready: enabled && missing.is_empty(),
        base_url: base_url.to_string(),
        notes,
    }
}

/// Returns the status of every built-in source, in corpus order.
pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    let s = &config.sources;
    vec![
        status(
            "worldbank",
            Provenance::EconomicIndicator,
            s.worldbank.enabled,
            &s.worldbank.base_url,
            &[],
        ),
        status(
            "acled",
            Provenance::ConflictEvent,
            s.acled.enabled,
            &s.acled.base_url,
            &[s.acled.username_env.as_str(), s.acled.password_env.as_str()],
        ),
        status(
            "reliefweb",
            Provenance::SituationReport,
            s.reliefweb.enabled,
            &s.reliefweb.base_url,
            &[],
        ),
        status(
            "gnews",
            Provenance::NewsArticle,
            s.gnews.enabled,
            &s.gnews.base_url,
            &[s.gnews.api_key_env.as_str()],
        ),
    ]
}

/// CLI entry point for `ngo-report sources`.
pub fn list_sources(config: &Config) -> Result<()> {
    let sources = get_sources(config);
    println!("{:<12} {:<13} {:<9} {:<7} NOTES", "SOURCE", "LABEL", "ENABLED", "READY");
    for s in &sources {
        println!(
            "{:<12} {:<13} {:<9} {:<7} {}",
            s.name,
            s.label.label(),
            s.enabled,
            s.ready,
            s.notes.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
