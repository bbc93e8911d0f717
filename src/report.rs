use crate::backend::ScanBackend;
use crate::lifecycle::{Phase, ScanState};
use crate::profile::{ReportSource, ScanProfile};
use crate::utils::encoding;
use crate::{Result, ScanError};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Fetch or decode the PDF for a finished scan and write it to `dest_dir`.
pub async fn save_report(
    backend: &dyn ScanBackend,
    profile: &ScanProfile,
    state: &ScanState,
    dest_dir: &Path,
) -> Result<PathBuf> {
    if state.phase != Phase::Finished {
        return Err(ScanError::NoReport("scan has not finished".to_string()));
    }
    let request = state
        .request
        .as_ref()
        .ok_or_else(|| ScanError::NoReport("no scan was submitted".to_string()))?;

    let bytes = match profile.report {
        ReportSource::EmbeddedBase64 { field } => {
            let encoded = state
                .results
                .last()
                .and_then(|record| record.get_str(field))
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| ScanError::NoReport("No PDF available".to_string()))?;
            decode_embedded_pdf(encoded)?
        }
        _ => {
            if state.scan_id.is_none() && state.results.is_empty() {
                return Err(ScanError::NoReport("scan produced no results".to_string()));
            }
            backend
                .fetch_report(profile, state.scan_id.as_deref(), request)
                .await?
        }
    };

    if bytes.is_empty() {
        return Err(ScanError::NoReport("backend returned an empty report".to_string()));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        warn!("Report for {} does not look like a PDF", request.target);
    }

    let file_name = profile.report_file_name(state.scan_id.as_deref(), &request.target);
    write_report(dest_dir, &file_name, &bytes).await
}

/// Decode a base64 PDF payload, tolerating a `data:` URL prefix and line breaks.
pub fn decode_embedded_pdf(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(encoding::base64_decode(&compact)?)
}

async fn write_report(dest_dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| ScanError::Reporting(format!("Failed to create output directory: {}", e)))?;

    let path = dest_dir.join(file_name);
    debug!("Writing {} bytes to {}", bytes.len(), path.display());
    fs::write(&path, bytes)
        .await
        .map_err(|e| ScanError::Reporting(format!("Failed to write report: {}", e)))?;

    info!("Saved report to {}", path.display());
    Ok(path)
}
