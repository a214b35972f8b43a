//! Classification service client.
//!
//! `Classifier` is the seam the dashboard's jobs call through. `HttpClassifier`
//! talks to the AegisNet API; tests substitute an in-memory implementation.

use crate::config::Settings;
use crate::features::{self, FEATURES};
use crate::model::{AnalysisResult, PredictedLabel, SingleFlowResult, SourceFile, ThreatDetail};
use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

/// Why a submission failed.
///
/// The display string is the message shown to the operator: the HTTP status
/// when the request was rejected, else the server's own error, else the
/// low-level failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },
    #[error("{0}")]
    Application(String),
    #[error("{0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl SubmitError {
    fn from_status(status: reqwest::StatusCode) -> Self {
        SubmitError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        }
    }
}

/// One flow's feature values, serialized as a JSON object in feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    values: Vec<(&'static str, f64)>,
}

impl FlowRecord {
    /// Build a record from raw form entries, one per feature in `FEATURES` order.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Self {
        let values = FEATURES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let raw = entries.get(i).map(|s| s.as_ref()).unwrap_or("");
                (*name, features::coerce_value(raw))
            })
            .collect();
        FlowRecord { values }
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| *n == feature).map(|(_, v)| *v)
    }
}

impl Serialize for FlowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

pub type ClassifyFuture<T> = BoxFuture<'static, std::result::Result<T, SubmitError>>;

/// Remote flow classifier.
///
/// Returned futures own everything they need, so a request keeps running to
/// completion after the caller has moved on.
pub trait Classifier: Send + Sync {
    fn classify_batch(&self, file: SourceFile) -> ClassifyFuture<AnalysisResult>;
    fn classify_single(&self, flow: FlowRecord) -> ClassifyFuture<SingleFlowResult>;
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct BatchResponse {
    status: Option<String>,
    total_flows: Option<u64>,
    benign_count: Option<u64>,
    attack_count: Option<u64>,
    threat_indices: Option<Vec<u64>>,
    threat_details: Option<Vec<ThreatDetail>>,
    feature_importances: Option<serde_json::Map<String, serde_json::Value>>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SingleResponse {
    status: Option<String>,
    prediction: Option<String>,
    confidence_score: Option<f64>,
    error: Option<String>,
}

fn require<T>(field: Option<T>, name: &str) -> std::result::Result<T, SubmitError> {
    field.ok_or_else(|| SubmitError::Malformed(format!("missing field '{}'", name)))
}

/// Decode a 2xx batch response body.
pub fn decode_batch(body: &[u8]) -> std::result::Result<AnalysisResult, SubmitError> {
    let resp: BatchResponse =
        serde_json::from_slice(body).map_err(|e| SubmitError::Malformed(e.to_string()))?;

    if resp.status.as_deref() != Some("success") {
        return Err(SubmitError::Application(
            resp.error.unwrap_or_else(|| "Unexpected API response".to_string()),
        ));
    }

    let total_flows = require(resp.total_flows, "total_flows")?;
    let benign_count = require(resp.benign_count, "benign_count")?;
    let attack_count = require(resp.attack_count, "attack_count")?;
    if benign_count.checked_add(attack_count) != Some(total_flows) {
        return Err(SubmitError::Malformed(format!(
            "benign_count ({}) + attack_count ({}) != total_flows ({})",
            benign_count, attack_count, total_flows
        )));
    }

    let threat_indices = resp.threat_indices.unwrap_or_default();
    if !threat_indices.is_empty() && threat_indices.len() as u64 != attack_count {
        log::warn!(
            "Response lists {} threat indices for {} attacks",
            threat_indices.len(),
            attack_count
        );
    }

    let mut feature_importances = Vec::new();
    for (name, value) in resp.feature_importances.unwrap_or_default() {
        match value.as_f64() {
            Some(v) if features::is_known_feature(&name) => feature_importances.push((name, v)),
            _ => log::warn!("Dropping feature importance entry '{}': {}", name, value),
        }
    }

    Ok(AnalysisResult {
        total_flows,
        benign_count,
        attack_count,
        threat_indices,
        threat_details: resp.threat_details.unwrap_or_default(),
        feature_importances,
    })
}

/// Decode a 2xx single-flow response body.
pub fn decode_single(body: &[u8]) -> std::result::Result<SingleFlowResult, SubmitError> {
    let resp: SingleResponse =
        serde_json::from_slice(body).map_err(|e| SubmitError::Malformed(e.to_string()))?;

    if resp.status.as_deref() != Some("success") {
        return Err(SubmitError::Application(
            resp.error.unwrap_or_else(|| "Unknown server error".to_string()),
        ));
    }

    Ok(SingleFlowResult {
        prediction: PredictedLabel::from(resp.prediction.unwrap_or_default()),
        confidence_score: require(resp.confidence_score, "confidence_score")?,
    })
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Classifier backed by the AegisNet REST API.
#[derive(Clone)]
pub struct HttpClassifier {
    http: reqwest::Client,
    base_url: String,
}

impl HttpClassifier {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(HttpClassifier {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

async fn read_success_body(
    sent: std::result::Result<reqwest::Response, reqwest::Error>,
) -> std::result::Result<Vec<u8>, SubmitError> {
    let response = sent.map_err(|e| SubmitError::Transport(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SubmitError::from_status(status));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| SubmitError::Transport(e.to_string()))?;
    Ok(body.to_vec())
}

impl Classifier for HttpClassifier {
    fn classify_batch(&self, file: SourceFile) -> ClassifyFuture<AnalysisResult> {
        let http = self.http.clone();
        let url = self.endpoint("predict");
        async move {
            let bytes = file
                .read()
                .await
                .map_err(|e| SubmitError::Transport(format!("Failed to read {}: {}", file.name(), e)))?;
            log::info!("POST {} ({}, {} bytes)", url, file.name(), bytes.len());

            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(file.name().to_string())
                .mime_str("text/csv")
                .map_err(|e| SubmitError::Transport(e.to_string()))?;
            let form = reqwest::multipart::Form::new().part("file", part);

            let body = read_success_body(http.post(&url).multipart(form).send().await).await?;
            decode_batch(&body)
        }
        .boxed()
    }

    fn classify_single(&self, flow: FlowRecord) -> ClassifyFuture<SingleFlowResult> {
        let http = self.http.clone();
        let url = self.endpoint("predict_single");
        async move {
            log::info!("POST {}", url);
            let body = read_success_body(http.post(&url).json(&flow).send().await).await?;
            decode_single(&body)
        }
        .boxed()
    }
}
