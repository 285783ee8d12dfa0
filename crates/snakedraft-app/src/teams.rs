// Team lists for seeding a draft pool: The Blue Alliance, CSV files, or a
// typed-in comma-separated list.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use snakedraft_core::Item;
use tracing::{debug, info, warn};

use crate::config::Config;

const USER_AGENT: &str = concat!("snakedraft/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TeamListError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("request for event {event} failed: {source}")]
    Http {
        event: String,
        source: reqwest::Error,
    },

    #[error("The Blue Alliance returned HTTP {status} for event {event}")]
    Status { event: String, status: u16 },

    #[error("no TBA API key configured; pass a comma-separated team list instead")]
    NoApiKey,

    #[error("no teams found in {0}")]
    Empty(String),
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Looks up the teams attending an event.
#[async_trait]
pub trait TeamRosterProvider: Send + Sync {
    async fn teams_at_event(&self, event_code: &str) -> Result<Vec<Item>, TeamListError>;
}

/// `/event/{code}/teams/simple` entry. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct SimpleTeam {
    team_number: i64,
}

/// The Blue Alliance v3 API client.
pub struct TbaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TbaClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn event_url(&self, event_code: &str) -> String {
        format!("{}/event/{}/teams/simple", self.base_url, event_code.trim())
    }
}

#[async_trait]
impl TeamRosterProvider for TbaClient {
    async fn teams_at_event(&self, event_code: &str) -> Result<Vec<Item>, TeamListError> {
        let http_err = |source| TeamListError::Http {
            event: event_code.to_string(),
            source,
        };
        let url = self.event_url(event_code);
        debug!(%url, "Fetching event teams");

        let response = self
            .http
            .get(&url)
            .header("X-TBA-Auth-Key", &self.api_key)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            warn!(event = event_code, status = status.as_u16(), "TBA request rejected");
            return Err(TeamListError::Status {
                event: event_code.to_string(),
                status: status.as_u16(),
            });
        }

        let teams: Vec<SimpleTeam> = response.json().await.map_err(http_err)?;
        let items = teams_from_simple(teams);
        info!(event = event_code, teams = items.len(), "Loaded event teams");
        Ok(items)
    }
}

/// Provider used when no API key is configured. Every lookup fails.
pub struct NoProvider;

#[async_trait]
impl TeamRosterProvider for NoProvider {
    async fn teams_at_event(&self, _event_code: &str) -> Result<Vec<Item>, TeamListError> {
        Err(TeamListError::NoApiKey)
    }
}

/// Build the configured provider: TBA when a key is present, otherwise one
/// that always refuses.
pub fn provider_from_config(config: &Config) -> Arc<dyn TeamRosterProvider> {
    match &config.credentials.tba_api_key {
        Some(key) if !key.is_empty() => Arc::new(TbaClient::new(&config.tba.base_url, key)),
        _ => Arc::new(NoProvider),
    }
}

fn teams_from_simple(teams: Vec<SimpleTeam>) -> Vec<Item> {
    let mut seen = HashSet::new();
    teams
        .into_iter()
        .filter(|t| seen.insert(t.team_number))
        .map(|t| Item::new(t.team_number.to_string(), t.team_number))
        .collect()
}

// ---------------------------------------------------------------------------
// Manual lists and CSV files
// ---------------------------------------------------------------------------

/// Parse a comma-separated list of team numbers.
///
/// Entries are trimmed; blanks, anything that is not all digits, and repeats
/// of an earlier entry are dropped.
pub fn parse_team_list(input: &str) -> Vec<Item> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for entry in input.split(',').map(str::trim) {
        if entry.is_empty() || !entry.bytes().all(|b| b.is_ascii_digit()) {
            if !entry.is_empty() {
                debug!(entry, "Skipping non-numeric team");
            }
            continue;
        }
        let Ok(number) = entry.parse::<i64>() else {
            continue;
        };
        if seen.insert(entry.to_string()) {
            items.push(Item::new(entry, number));
        }
    }
    items
}

#[derive(Debug, Deserialize)]
struct CsvTeam {
    label: String,
    #[serde(default)]
    sort_key: Option<i64>,
}

fn load_teams_from_reader<R: Read>(rdr: R) -> Result<Vec<Item>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for (row, result) in reader.deserialize::<CsvTeam>().enumerate() {
        match result {
            Ok(raw) => {
                let label = raw.label.trim().to_string();
                if label.is_empty() {
                    continue;
                }
                // Without an explicit key, numeric labels sort numerically
                // and everything else keeps file order.
                let sort_key = raw
                    .sort_key
                    .or_else(|| label.parse().ok())
                    .unwrap_or(row as i64);
                if !seen.insert(label.clone()) {
                    warn!("duplicate team '{}' in CSV, keeping the first", label);
                    continue;
                }
                items.push(Item::new(label, sort_key));
            }
            Err(e) => {
                warn!("skipping malformed team row: {}", e);
            }
        }
    }
    Ok(items)
}

/// Load teams from a CSV file with a `label` column and an optional
/// `sort_key` column.
pub fn load_teams_csv(path: &Path) -> Result<Vec<Item>, TeamListError> {
    let file = std::fs::File::open(path).map_err(|e| TeamListError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_teams_from_reader(file).map_err(|e| TeamListError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Pool source selection
// ---------------------------------------------------------------------------

/// Where the items for a new draft come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolSource {
    Manual(String),
    CsvFile(PathBuf),
    Event(String),
}

impl PoolSource {
    /// Anything with a comma is a manual list, a `.csv` path is a file, and
    /// the rest is treated as an event code.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.contains(',') {
            PoolSource::Manual(input.to_string())
        } else if input.to_ascii_lowercase().ends_with(".csv") {
            PoolSource::CsvFile(PathBuf::from(input))
        } else {
            PoolSource::Event(input.to_string())
        }
    }

    /// Produce the item list. An empty result is an error.
    pub async fn load(&self, provider: &dyn TeamRosterProvider) -> Result<Vec<Item>, TeamListError> {
        let (items, what) = match self {
            PoolSource::Manual(list) => (parse_team_list(list), "team list".to_string()),
            PoolSource::CsvFile(path) => (load_teams_csv(path)?, path.display().to_string()),
            PoolSource::Event(code) => (provider.teams_at_event(code).await?, format!("event {code}")),
        };
        if items.is_empty() {
            return Err(TeamListError::Empty(what));
        }
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
