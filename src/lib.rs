//! TrustGrid - command-line client for the TrustGrid security dashboard
//!
//! Submits targets to a TrustGrid backend, follows scan progress and renders
//! the results. Scanning itself happens server-side; this crate only drives
//! the scan lifecycle over HTTP.
//!
//! # Warning
//! Only scan systems you own or have explicit permission to test.

pub mod auth;
pub mod backend;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod lifecycle;
pub mod profile;
pub mod progress;
pub mod report;
pub mod store;
pub mod utils;

pub use error::{Result, ScanError};

/// Common types shared by the backend transport and the lifecycle controller
pub mod types {
    use crate::progress::ProgressEntry;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ScanRequest {
        pub target: String,
        pub ports: Option<String>,
    }

    impl ScanRequest {
        pub fn new(target: impl Into<String>) -> Self {
            Self {
                target: target.into(),
                ports: None,
            }
        }

        pub fn with_ports(mut self, ports: impl Into<String>) -> Self {
            self.ports = Some(ports.into());
            self
        }

        pub fn is_empty(&self) -> bool {
            self.target.trim().is_empty()
        }
    }

    /// Backend-defined result row, kept as raw JSON.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ResultRecord(pub Value);

    impl ResultRecord {
        /// Display text for a field; missing or null fields render as "-".
        pub fn field(&self, name: &str) -> String {
            match self.0.get(name) {
                None | Some(Value::Null) => "-".to_string(),
                Some(Value::String(s)) if s.is_empty() => "-".to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            }
        }

        pub fn get_str(&self, name: &str) -> Option<&str> {
            self.0.get(name).and_then(Value::as_str)
        }

        /// Top-level entries, for key/value rendering.
        pub fn entries(&self) -> Vec<(String, String)> {
            match &self.0 {
                Value::Object(map) => map
                    .iter()
                    .map(|(k, v)| {
                        let text = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), text)
                    })
                    .collect(),
                other => vec![("value".to_string(), other.to_string())],
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ScanStatus {
        Running,
        Finished,
        Error,
        Other(String),
    }

    impl ScanStatus {
        pub fn parse(raw: &str) -> Self {
            match raw {
                "running" => ScanStatus::Running,
                "finished" => ScanStatus::Finished,
                "error" => ScanStatus::Error,
                other => ScanStatus::Other(other.to_string()),
            }
        }

        pub fn is_terminal(&self) -> bool {
            matches!(self, ScanStatus::Finished | ScanStatus::Error)
        }
    }

    /// Body of `GET status/<id>/`.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct StatusReport {
        #[serde(default)]
        pub status: String,
        #[serde(default)]
        pub progress: Vec<ProgressEntry>,
        #[serde(default)]
        pub error: Option<String>,
        #[serde(default)]
        pub details: Option<String>,
        #[serde(default)]
        pub results: Option<Vec<ResultRecord>>,
    }

    impl StatusReport {
        pub fn scan_status(&self) -> ScanStatus {
            ScanStatus::parse(&self.status)
        }

        /// Error text from either field the backends use.
        pub fn error_detail(&self) -> &str {
            self.error
                .as_deref()
                .or(self.details.as_deref())
                .unwrap_or("unknown")
        }
    }

    /// Outcome of the scan-creation POST.
    #[derive(Debug, Clone, PartialEq)]
    pub enum ScanStart {
        /// Asynchronous scan; poll with this id.
        Queued { scan_id: String },
        /// Synchronous scan; the body already holds the results.
        Completed { results: Vec<ResultRecord> },
    }

    impl ScanStart {
        /// Results of an inline scan: the `results` array if present, else the
        /// whole body as a single record.
        pub fn from_inline_body(body: Value) -> Self {
            let results = match body {
                Value::Object(mut map) if matches!(map.get("results"), Some(Value::Array(_))) => {
                    match map.remove("results") {
                        Some(Value::Array(rows)) => rows.into_iter().map(ResultRecord).collect(),
                        _ => Vec::new(),
                    }
                }
                Value::Array(rows) => rows.into_iter().map(ResultRecord).collect(),
                Value::Null => Vec::new(),
                other => vec![ResultRecord(other)],
            };
            ScanStart::Completed { results }
        }
    }
}
