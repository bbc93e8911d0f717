use crate::types::ScanRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_NETWORK_PORTS: &str = "1-1024";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    /// Web application scan (spider + active scan)
    Webapp,
    /// REST API scan
    Api,
    /// Domain / WHOIS / DNS lookup
    Domain,
    /// TLS certificate inspection
    Ssl,
    /// Host port scan
    Network,
}

impl fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScannerKind::Webapp => "webapp",
            ScannerKind::Api => "api",
            ScannerKind::Domain => "domain",
            ScannerKind::Ssl => "ssl",
            ScannerKind::Network => "network",
        };
        f.write_str(name)
    }
}

/// How the scan-creation body names the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetField {
    Target,
    Domain,
    /// `{ip, ports}`
    IpAndPorts,
}

/// Whether the create call hands back a scan id or the finished result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Polling {
        /// Results come from `results/<id>/` rather than the status body.
        separate_results: bool,
    },
    Inline,
}

/// Where the PDF report for a finished scan comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
    /// `GET download-pdf/<id>/`, or `download-pdf/` when not keyed.
    Endpoint { keyed: bool },
    /// Re-post the scan body with `flag: true` and read the PDF back.
    Repost { flag: &'static str },
    /// Base64 PDF stored in a field of the last result.
    EmbeddedBase64 { field: &'static str },
}

/// Static description of one scanner's backend contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProfile {
    pub kind: ScannerKind,
    pub slug: &'static str,
    pub title: &'static str,
    pub target_field: TargetField,
    pub mode: ScanMode,
    pub report: ReportSource,
    pub poll_interval: Duration,
    /// Stages seeded at 0% on submit.
    pub stages: &'static [&'static str],
    /// Result columns shown in the table; empty means key/value listing.
    pub columns: &'static [&'static str],
    pub result_noun: &'static str,
    pub prompt: &'static str,
}

impl ScanProfile {
    pub fn for_kind(kind: ScannerKind) -> Self {
        match kind {
            ScannerKind::Webapp => Self {
                kind,
                slug: "webappscanner",
                title: "WebApp Scanner",
                target_field: TargetField::Target,
                mode: ScanMode::Polling { separate_results: false },
                report: ReportSource::Endpoint { keyed: true },
                poll_interval: Duration::from_millis(1500),
                stages: &["open_url", "spider", "active_scan"],
                columns: &["alert", "risk", "url", "param", "cweid", "suggestion"],
                result_noun: "alerts",
                prompt: "Please enter a URL to scan.",
            },
            ScannerKind::Api => Self {
                kind,
                slug: "apiscanner",
                title: "API Scanner",
                target_field: TargetField::Target,
                mode: ScanMode::Polling { separate_results: true },
                report: ReportSource::Endpoint { keyed: true },
                poll_interval: Duration::from_millis(2000),
                stages: &[],
                columns: &["alert", "cve", "priority", "url", "suggestion"],
                result_noun: "alerts",
                prompt: "Please enter an API base URL to scan.",
            },
            ScannerKind::Domain => Self {
                kind,
                slug: "domainscanner",
                title: "Domain Scanner",
                target_field: TargetField::Domain,
                mode: ScanMode::Inline,
                report: ReportSource::Repost { flag: "download_pdf" },
                poll_interval: Duration::from_millis(2000),
                stages: &[],
                columns: &[],
                result_noun: "records",
                prompt: "Enter a domain (example.com)",
            },
            ScannerKind::Ssl => Self {
                kind,
                slug: "sslscanner",
                title: "SSL Scanner",
                target_field: TargetField::Domain,
                mode: ScanMode::Inline,
                report: ReportSource::EmbeddedBase64 { field: "pdf_base64" },
                poll_interval: Duration::from_millis(2000),
                stages: &[],
                columns: &[],
                result_noun: "records",
                prompt: "Enter a domain (example.com)",
            },
            ScannerKind::Network => Self {
                kind,
                slug: "networkscanner",
                title: "Network Scanner",
                target_field: TargetField::IpAndPorts,
                mode: ScanMode::Inline,
                report: ReportSource::Endpoint { keyed: false },
                poll_interval: Duration::from_millis(2000),
                stages: &[],
                columns: &["host", "port", "status", "service", "vulnerable", "cve"],
                result_noun: "ports",
                prompt: "Enter an IP address to scan.",
            },
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.mode, ScanMode::Polling { .. })
    }

    /// JSON body for the scan-creation POST.
    pub fn request_body(&self, request: &ScanRequest) -> Value {
        let target = request.target.trim();
        match self.target_field {
            TargetField::Target => json!({ "target": target }),
            TargetField::Domain => json!({ "domain": target }),
            TargetField::IpAndPorts => json!({
                "ip": target,
                "ports": request.ports.as_deref().unwrap_or(DEFAULT_NETWORK_PORTS),
            }),
        }
    }

    pub fn scan_path(&self) -> String {
        format!("api/{}/scan/", self.slug)
    }

    pub fn status_path(&self, scan_id: &str) -> String {
        format!("api/{}/status/{}/", self.slug, scan_id)
    }

    pub fn results_path(&self, scan_id: &str) -> String {
        format!("api/{}/results/{}/", self.slug, scan_id)
    }

    pub fn download_path(&self, scan_id: Option<&str>) -> String {
        match scan_id {
            Some(id) => format!("api/{}/download-pdf/{}/", self.slug, id),
            None => format!("api/{}/download-pdf/", self.slug),
        }
    }

    /// File name the saved report gets.
    pub fn report_file_name(&self, scan_id: Option<&str>, target: &str) -> String {
        let stem = sanitize_file_stem(target);
        match self.kind {
            ScannerKind::Webapp | ScannerKind::Api => {
                format!("{}_report.pdf", scan_id.map(sanitize_file_stem).unwrap_or(stem))
            }
            ScannerKind::Domain => format!("{}_report.pdf", stem),
            ScannerKind::Ssl => format!("{}_ssl_report.pdf", stem.replace('.', "_")),
            ScannerKind::Network => "network_report.pdf".to_string(),
        }
    }
}

/// Human label for a backend stage name.
pub fn stage_label(stage: &str) -> &str {
    match stage {
        "open_url" => "Open URL",
        "spider" => "Spider",
        "active_scan" => "Active Scan",
        other => other,
    }
}

fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "scan".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shapes() {
        let req = ScanRequest::new("example.com");

        let web = ScanProfile::for_kind(ScannerKind::Webapp);
        assert_eq!(web.request_body(&req), json!({ "target": "example.com" }));

        let ssl = ScanProfile::for_kind(ScannerKind::Ssl);
        assert_eq!(ssl.request_body(&req), json!({ "domain": "example.com" }));

        let net = ScanProfile::for_kind(ScannerKind::Network);
        assert_eq!(
            net.request_body(&ScanRequest::new("10.0.0.5")),
            json!({ "ip": "10.0.0.5", "ports": "1-1024" })
        );
        assert_eq!(
            net.request_body(&ScanRequest::new("10.0.0.5").with_ports("22,80")),
            json!({ "ip": "10.0.0.5", "ports": "22,80" })
        );
    }

    #[test]
    fn test_paths() {
        let api = ScanProfile::for_kind(ScannerKind::Api);
        assert_eq!(api.scan_path(), "api/apiscanner/scan/");
        assert_eq!(api.status_path("abc"), "api/apiscanner/status/abc/");
        assert_eq!(api.results_path("abc"), "api/apiscanner/results/abc/");
        assert_eq!(api.download_path(Some("abc")), "api/apiscanner/download-pdf/abc/");

        let net = ScanProfile::for_kind(ScannerKind::Network);
        assert_eq!(net.download_path(None), "api/networkscanner/download-pdf/");
    }

    #[test]
    fn test_report_file_names() {
        let ssl = ScanProfile::for_kind(ScannerKind::Ssl);
        assert_eq!(ssl.report_file_name(None, "www.example.com"), "www_example_com_ssl_report.pdf");

        let web = ScanProfile::for_kind(ScannerKind::Webapp);
        assert_eq!(web.report_file_name(Some("42ab"), "https://x.io"), "42ab_report.pdf");

        let domain = ScanProfile::for_kind(ScannerKind::Domain);
        assert_eq!(domain.report_file_name(None, "example.com"), "example.com_report.pdf");
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(stage_label("active_scan"), "Active Scan");
        assert_eq!(stage_label("passive"), "passive");
    }
}
