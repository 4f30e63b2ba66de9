// mulegraph/src/client.rs
//
// Analysis service client.
//
//   POST {base}/api/analyze      multipart, field "file" → AnalysisResult
//   GET  {base}/api/sample-data  → [TransactionRow], re-encoded as a CSV file
//
// Non-success responses carry `{"error": "..."}` when the service has
// something to say; otherwise the generic message for the request kind is
// used. No retry: one request per user action.

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::{InputError, ServiceError, GENERIC_ANALYSIS_FAILURE, GENERIC_SAMPLE_FAILURE};
use crate::model::{AnalysisResult, ErrorPayload, TransactionRow};

pub const SAMPLE_FILE_NAME: &str = "sample_transactions.csv";

// ── Input file ────────────────────────────────────────────────────────────────

/// A selected transaction file. Only the `.csv` suffix is checked here; the
/// service owns content validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvFile {
    pub name: String,
    pub data: Bytes,
}

impl CsvFile {
    pub fn validate(name: &str, data: impl Into<Bytes>) -> Result<Self, InputError> {
        if !name.to_ascii_lowercase().ends_with(".csv") {
            return Err(InputError::NotCsv { name: name.to_string() });
        }
        Ok(Self { name: name.to_string(), data: data.into() })
    }

    pub fn size_kb(&self) -> f64 { self.data.len() as f64 / 1024.0 }
}

/// Header row plus one line per transaction, in service field order.
pub fn encode_sample_csv(rows: &[TransactionRow]) -> Result<CsvFile, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["transaction_id", "sender_id", "receiver_id", "amount", "timestamp"])?;
    for row in rows {
        // whole amounts carry no fraction: 200, not 200.0
        wtr.write_record([
            row.transaction_id.as_str(),
            row.sender_id.as_str(),
            row.receiver_id.as_str(),
            row.amount.to_string().as_str(),
            row.timestamp.as_str(),
        ])?;
    }
    let data = wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(CsvFile { name: SAMPLE_FILE_NAME.to_string(), data: Bytes::from(data) })
}

// ── HTTP client ───────────────────────────────────────────────────────────────

pub struct AnalysisClient {
    http:     Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| ServiceError::Transport { context: "building HTTP client", source })?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    pub async fn analyze(&self, file: &CsvFile) -> Result<AnalysisResult, ServiceError> {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.name.clone())
            .mime_str("text/csv")
            .map_err(|source| ServiceError::Transport { context: GENERIC_ANALYSIS_FAILURE, source })?;
        let form = Form::new().part("file", part);

        info!("uploading {} ({:.1} KB) for analysis", file.name, file.size_kb());
        let resp = self.http
            .post(self.url("/api/analyze"))
            .multipart(form)
            .send()
            .await
            .map_err(|source| ServiceError::Transport { context: GENERIC_ANALYSIS_FAILURE, source })?;

        let body = checked_body(resp, GENERIC_ANALYSIS_FAILURE, true).await?;
        let result = AnalysisResult::from_json(&body)?;
        debug!(
            "analysis returned {} accounts, {} rings",
            result.suspicious_accounts.len(),
            result.fraud_rings.len()
        );
        Ok(result)
    }

    /// Fetch the bundled sample transactions and hand them back as a CSV
    /// ready for `analyze`.
    pub async fn sample(&self) -> Result<CsvFile, ServiceError> {
        let resp = self.http
            .get(self.url("/api/sample-data"))
            .send()
            .await
            .map_err(|source| ServiceError::Transport { context: GENERIC_SAMPLE_FAILURE, source })?;

        let body = checked_body(resp, GENERIC_SAMPLE_FAILURE, false).await?;
        let rows: Vec<TransactionRow> = serde_json::from_slice(&body)?;
        info!("sample dataset: {} transactions", rows.len());
        Ok(encode_sample_csv(&rows)?)
    }
}

/// Body of a successful response, or the service's message on failure.
async fn checked_body(resp: Response, fallback: &'static str, use_server_message: bool) -> Result<Bytes, ServiceError> {
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|source| ServiceError::Transport { context: fallback, source })?;

    if status.is_success() {
        return Ok(body);
    }
    let message = if use_server_message { error_message(&body, fallback) } else { fallback.to_string() };
    warn!("service returned HTTP {}: {}", status.as_u16(), message);
    Err(ServiceError::Status { status: status.as_u16(), message })
}

/// `{"error": msg}` → msg; anything else → `fallback`.
pub fn error_message(body: &[u8], fallback: &str) -> String {
    serde_json::from_slice::<ErrorPayload>(body)
        .ok()
        .and_then(|p| p.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
