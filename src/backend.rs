use crate::config::Config;
use crate::profile::{ReportSource, ScanMode, ScanProfile};
use crate::types::{ResultRecord, ScanRequest, ScanStart, StatusReport};
use crate::{Result, ScanError};
use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Backend operations the scan lifecycle depends on.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    /// POST the scan-creation request.
    async fn start_scan(&self, profile: &ScanProfile, request: &ScanRequest) -> Result<ScanStart>;

    /// One status poll. Non-2xx answers without a terminal status are errors.
    async fn scan_status(&self, profile: &ScanProfile, scan_id: &str) -> Result<StatusReport>;

    async fn scan_results(&self, profile: &ScanProfile, scan_id: &str) -> Result<Vec<ResultRecord>>;

    /// Raw PDF bytes for endpoint- or repost-backed reports.
    async fn fetch_report(
        &self,
        profile: &ScanProfile,
        scan_id: Option<&str>,
        request: &ScanRequest,
    ) -> Result<Vec<u8>>;
}

/// Parse the configured base URL, making sure relative joins keep its path.
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScanError::InvalidInput("backend base URL is empty".to_string()));
    }
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Ok(Url::parse(&with_slash)?)
}

pub fn build_http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .danger_accept_invalid_certs(!config.backend.verify_ssl)
        .user_agent(&config.backend.user_agent)
        .build()
        .map_err(ScanError::Http)
}

pub struct HttpBackend {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = build_http_client(config)?;
        let base = normalize_base_url(&config.backend.base_url)?;
        Ok(Self::with_client(client, base))
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        Self {
            client,
            base,
            token: None,
        }
    }

    /// Attach `Authorization: Bearer` to every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base.join(path)?;
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }
}

/// Backend error text, if the body has one.
fn error_field(body: &Value) -> String {
    body.get("error")
        .or_else(|| body.get("detail"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn scan_id_field(body: &Value) -> Option<String> {
    match body.get("scan_id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Scan ids are spliced into URL paths, so only plain path-segment
/// characters are accepted.
fn is_routable_scan_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl ScanBackend for HttpBackend {
    async fn start_scan(&self, profile: &ScanProfile, request: &ScanRequest) -> Result<ScanStart> {
        let body = profile.request_body(request);
        let response = self
            .request(Method::POST, &profile.scan_path())?
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        trace!("scan response ({}): {}", status, text);
        let parsed: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            return Err(ScanError::Backend {
                status: status.as_u16(),
                message: parsed.as_ref().map(error_field).unwrap_or_default(),
            });
        }

        let parsed = parsed.ok_or_else(|| {
            ScanError::MalformedResponse("scan response is not JSON".to_string())
        })?;

        match profile.mode {
            ScanMode::Polling { .. } => match scan_id_field(&parsed) {
                Some(scan_id) if is_routable_scan_id(&scan_id) => Ok(ScanStart::Queued { scan_id }),
                Some(scan_id) => Err(ScanError::MalformedResponse(format!(
                    "scan_id {:?} is not a valid path segment",
                    scan_id
                ))),
                None => Err(ScanError::MalformedResponse(
                    "scan response carried no scan_id".to_string(),
                )),
            },
            ScanMode::Inline => Ok(ScanStart::from_inline_body(parsed)),
        }
    }

    async fn scan_status(&self, profile: &ScanProfile, scan_id: &str) -> Result<StatusReport> {
        let response = self
            .request(Method::GET, &profile.status_path(scan_id))?
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let report = serde_json::from_str::<StatusReport>(&text);

        if status.is_success() {
            return Ok(report?);
        }

        match report {
            Ok(report) if report.scan_status().is_terminal() => Ok(report),
            Ok(report) => Err(ScanError::Backend {
                status: status.as_u16(),
                message: report.error.unwrap_or_default(),
            }),
            Err(_) => Err(ScanError::Backend {
                status: status.as_u16(),
                message: String::new(),
            }),
        }
    }

    async fn scan_results(&self, profile: &ScanProfile, scan_id: &str) -> Result<Vec<ResultRecord>> {
        let response = self
            .request(Method::GET, &profile.results_path(scan_id))?
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Err(ScanError::Backend {
                status: status.as_u16(),
                message: error_field(&body),
            });
        }

        let body: Value = serde_json::from_str(&text)?;
        Ok(match body.get("results") {
            Some(Value::Array(rows)) => rows.iter().cloned().map(ResultRecord).collect(),
            _ => Vec::new(),
        })
    }

    async fn fetch_report(
        &self,
        profile: &ScanProfile,
        scan_id: Option<&str>,
        request: &ScanRequest,
    ) -> Result<Vec<u8>> {
        let builder = match profile.report {
            ReportSource::Endpoint { keyed: true } => {
                let id = scan_id.ok_or_else(|| ScanError::NoReport("scan has no id".to_string()))?;
                self.request(Method::GET, &profile.download_path(Some(id)))?
            }
            ReportSource::Endpoint { keyed: false } => {
                self.request(Method::GET, &profile.download_path(None))?
            }
            ReportSource::Repost { flag } => {
                let mut body = profile.request_body(request);
                if let Value::Object(map) = &mut body {
                    map.insert(flag.to_string(), Value::Bool(true));
                }
                self.request(Method::POST, &profile.scan_path())?.json(&body)
            }
            ReportSource::EmbeddedBase64 { .. } => {
                return Err(ScanError::InvalidInput(format!(
                    "{} reports are embedded in the scan result",
                    profile.kind
                )))
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Backend {
                status: status.as_u16(),
                message: "Failed to download PDF".to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
