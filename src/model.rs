//! Domain types shared by the ingest, submission and view layers.

use serde::Deserialize;
use std::fmt;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Classification outcome for one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PredictedLabel {
    Benign,
    Attack,
}

impl PredictedLabel {
    /// Wire spelling, also used in exported logs.
    pub fn as_str(self) -> &'static str {
        match self {
            PredictedLabel::Benign => "BENIGN",
            PredictedLabel::Attack => "ATTACK",
        }
    }
}

/// Anything the server sends other than `ATTACK` counts as benign.
impl From<String> for PredictedLabel {
    fn from(s: String) -> Self {
        if s == "ATTACK" {
            PredictedLabel::Attack
        } else {
            PredictedLabel::Benign
        }
    }
}

impl fmt::Display for PredictedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flow the classifier flagged, with its 1-based row in the submitted file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreatDetail {
    pub row_number: u64,
    pub predicted_label: PredictedLabel,
    pub confidence_score: f64,
}

/// Outcome of a batch classification.
///
/// Built once from a successful response and never mutated afterwards;
/// `benign_count + attack_count == total_flows` always holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisResult {
    pub total_flows: u64,
    pub benign_count: u64,
    pub attack_count: u64,
    /// 1-based row numbers of flows classified as attacks
    pub threat_indices: Vec<u64>,
    pub threat_details: Vec<ThreatDetail>,
    /// Feature name to importance in `[0, 1]`, in the order the server sent them
    pub feature_importances: Vec<(String, f64)>,
}

impl AnalysisResult {
    pub fn has_threats(&self) -> bool {
        !self.threat_indices.is_empty()
    }
}

/// Outcome of a single-flow classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleFlowResult {
    pub prediction: PredictedLabel,
    pub confidence_score: f64,
}

impl SingleFlowResult {
    /// Result line for the manual analysis panel.
    pub fn summary(&self) -> String {
        let pct = format!("{:.2}", self.confidence_score * 100.0);
        match self.prediction {
            PredictedLabel::Attack => format!("RESULT: THREAT DETECTED (Confidence: {}%)", pct),
            PredictedLabel::Benign => format!("RESULT: FLOW IS BENIGN (Confidence: {}%)", pct),
        }
    }
}

#[derive(Debug, Clone)]
enum SourceData {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// Opaque handle to a file the operator selected.
///
/// Cheap to clone; in-flight jobs hold their own clone so clearing the
/// selection never affects a running request.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    data: SourceData,
}

impl SourceFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        SourceFile {
            name,
            data: SourceData::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        SourceFile {
            name: name.into(),
            data: SourceData::Memory(Arc::from(bytes)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.data {
            SourceData::Path(p) => Some(p),
            SourceData::Memory(_) => None,
        }
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.data {
            SourceData::Path(p) => tokio::fs::read(p).await,
            SourceData::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }

    /// Open the contents for buffered streaming reads.
    pub fn open_blocking(&self) -> std::io::Result<Box<dyn BufRead + Send>> {
        match &self.data {
            SourceData::Path(p) => Ok(Box::new(BufReader::new(std::fs::File::open(p)?))),
            SourceData::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }
}

/// Format a count with thousands separators: `1234567` -> `1,234,567`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
