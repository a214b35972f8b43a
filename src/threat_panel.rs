//! Threat records panel: truncated index listing and full-log export.

use crate::model::{AnalysisResult, ThreatDetail};
use crate::result_store::ResultView;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use std::fmt::Write;
use std::path::Path;
use thiserror::Error;

/// How many threat indices the panel lists before deferring to the export.
pub const DISPLAY_LIMIT: usize = 50;

pub const CSV_HEADER: [&str; 3] = ["row_number", "predicted_label", "confidence_score"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One line per threat detail
    Csv,
    /// Human-readable report listing the threat row indices
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportWarning {
    #[error("No threat records to download.")]
    NothingToExport,
    #[error("Failed to build threat log: {0}")]
    Serialize(String),
}

impl ExportWarning {
    /// Whether the export was refused for lack of data rather than failing.
    pub fn is_empty_export(&self) -> bool {
        matches!(self, ExportWarning::NothingToExport)
    }
}

/// A file the operator can save.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub contents: String,
    /// Number of threat records in the artifact
    pub records: usize,
}

impl ExportArtifact {
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, &self.contents)
            .await
            .with_context(|| format!("Failed to write threat log to {}", path.display()))
    }
}

/// `2026-10-14T09:30:00.123Z` -> `2026-10-14T09-30-00-123Z`
fn file_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Serialize the full threat log of `result`, not just the listed part.
pub fn export(
    result: Option<&AnalysisResult>,
    format: ExportFormat,
    now: DateTime<Utc>,
) -> std::result::Result<ExportArtifact, ExportWarning> {
    let result = result.ok_or(ExportWarning::NothingToExport)?;
    match format {
        ExportFormat::Csv => export_csv(result, now),
        ExportFormat::Text => export_text(result, now),
    }
}

fn export_csv(result: &AnalysisResult, now: DateTime<Utc>) -> std::result::Result<ExportArtifact, ExportWarning> {
    if result.threat_details.is_empty() {
        return Err(ExportWarning::NothingToExport);
    }

    let bytes = write_threat_csv(Vec::new(), &result.threat_details).map_err(|e| {
        log::error!("Failed to serialize threat log: {}", e);
        ExportWarning::Serialize(e.to_string())
    })?;

    Ok(ExportArtifact {
        file_name: format!("AegisNet_Threat_Log_{}.csv", file_timestamp(now)),
        contents: String::from_utf8_lossy(&bytes).into_owned(),
        records: result.threat_details.len(),
    })
}

/// Write the header and one record per detail into `out`, flushing it.
fn write_threat_csv<W: std::io::Write>(out: W, details: &[ThreatDetail]) -> csv::Result<W> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for detail in details {
        writer.write_record([
            detail.row_number.to_string().as_str(),
            detail.predicted_label.as_str(),
            detail.confidence_score.to_string().as_str(),
        ])?;
    }
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

fn export_text(result: &AnalysisResult, now: DateTime<Utc>) -> std::result::Result<ExportArtifact, ExportWarning> {
    if result.threat_indices.is_empty() {
        return Err(ExportWarning::NothingToExport);
    }

    let rule = "=".repeat(60);
    let indices: Vec<String> = result.threat_indices.iter().map(|i| i.to_string()).collect();
    let generated = now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "AegisNet Sentinel - Threat Records Log");
    let _ = writeln!(out, "Generated: {}", generated);
    let _ = writeln!(out, "Total Threats Identified: {}", result.threat_indices.len());
    let _ = writeln!(out, "{}\n", rule);
    let _ = writeln!(out, "Threat Row Indices (1-based):");
    let _ = writeln!(out, "{}", indices.join(", "));
    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(out, "End of Report");

    Ok(ExportArtifact {
        file_name: format!("AegisNet_Threat_Log_{}.txt", file_timestamp(now)),
        contents: out,
        records: result.threat_indices.len(),
    })
}

/// Listing state of the threat records panel.
#[derive(Debug, Clone)]
pub struct ThreatPanel {
    listed: Vec<u64>,
    remaining: usize,
    active: bool,
    expanded: bool,
}

impl Default for ThreatPanel {
    fn default() -> Self {
        ThreatPanel {
            listed: Vec::new(),
            remaining: 0,
            active: false,
            expanded: true,
        }
    }
}

impl ThreatPanel {
    /// Row numbers currently listed, at most `DISPLAY_LIMIT`.
    pub fn listed(&self) -> &[u64] {
        &self.listed
    }

    /// Threat rows not listed; only reachable through the export.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn more_text(&self) -> Option<String> {
        (self.remaining > 0).then(|| format!("...and {} more. Download full log below.", self.remaining))
    }

    /// Whether the latest result has any threats to show.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn toggle_expanded(&mut self) {
        self.expanded = !self.expanded;
    }
}

impl ResultView for ThreatPanel {
    fn on_publish(&mut self, result: &AnalysisResult) {
        let shown = result.threat_indices.len().min(DISPLAY_LIMIT);
        self.listed = result.threat_indices[..shown].to_vec();
        self.remaining = result.threat_indices.len() - shown;
        self.active = result.has_threats();
        log::debug!(
            "Threat panel lists {} of {} indices",
            shown,
            result.threat_indices.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PredictedLabel;
    use chrono::TimeZone;

    fn result_with_threats(n: u64) -> AnalysisResult {
        AnalysisResult {
            total_flows: n * 2,
            benign_count: n,
            attack_count: n,
            threat_indices: (1..=n).map(|i| i * 2).collect(),
            threat_details: (1..=n)
                .map(|i| ThreatDetail {
                    row_number: i * 2,
                    predicted_label: PredictedLabel::Attack,
                    confidence_score: 0.75,
                })
                .collect(),
            feature_importances: Vec::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 5).unwrap()
    }

    #[test]
    fn test_listing_under_limit() {
        let mut panel = ThreatPanel::default();
        panel.on_publish(&result_with_threats(2));
        assert_eq!(panel.listed(), &[2, 4]);
        assert_eq!(panel.remaining(), 0);
        assert!(panel.more_text().is_none());
        assert!(panel.is_active());
    }

    #[test]
    fn test_listing_truncates() {
        let mut panel = ThreatPanel::default();
        panel.on_publish(&result_with_threats(120));
        assert_eq!(panel.listed().len(), DISPLAY_LIMIT);
        assert_eq!(panel.remaining(), 70);
        assert_eq!(
            panel.more_text().as_deref(),
            Some("...and 70 more. Download full log below.")
        );

        panel.on_publish(&result_with_threats(DISPLAY_LIMIT as u64));
        assert_eq!(panel.listed().len(), DISPLAY_LIMIT);
        assert!(panel.more_text().is_none());
    }

    #[test]
    fn test_no_threats_deactivates() {
        let mut panel = ThreatPanel::default();
        panel.on_publish(&result_with_threats(3));
        panel.on_publish(&AnalysisResult::default());
        assert!(!panel.is_active());
        assert!(panel.listed().is_empty());
    }

    #[test]
    fn test_expand_state_survives_updates() {
        let mut panel = ThreatPanel::default();
        assert!(panel.is_expanded());
        panel.toggle_expanded();
        panel.on_publish(&result_with_threats(3));
        assert!(!panel.is_expanded());
        panel.toggle_expanded();
        assert!(panel.is_expanded());
    }

    #[test]
    fn test_csv_export_has_every_record() {
        let result = result_with_threats(120);
        let artifact = export(Some(&result), ExportFormat::Csv, now()).unwrap();
        assert_eq!(artifact.file_name, "AegisNet_Threat_Log_2026-10-14T09-30-05-000Z.csv");
        let lines: Vec<&str> = artifact.contents.lines().collect();
        assert_eq!(lines[0], "row_number,predicted_label,confidence_score");
        assert_eq!(lines.len(), 121);
        assert_eq!(lines[1], "2,ATTACK,0.75");
        assert_eq!(artifact.records, 120);
    }

    #[test]
    fn test_text_export() {
        let result = result_with_threats(3);
        let artifact = export(Some(&result), ExportFormat::Text, now()).unwrap();
        assert!(artifact.file_name.ends_with(".txt"));
        assert!(artifact.contents.contains("Total Threats Identified: 3"));
        assert!(artifact.contents.contains("\n2, 4, 6\n"));
        assert!(artifact.contents.ends_with("End of Report\n"));
    }

    #[test]
    fn test_export_with_nothing_warns() {
        assert_eq!(
            export(None, ExportFormat::Csv, now()),
            Err(ExportWarning::NothingToExport)
        );
        let empty = AnalysisResult::default();
        assert_eq!(
            export(Some(&empty), ExportFormat::Csv, now()),
            Err(ExportWarning::NothingToExport)
        );
        assert_eq!(
            export(Some(&empty), ExportFormat::Text, now()),
            Err(ExportWarning::NothingToExport)
        );
    }

    #[derive(Debug)]
    struct FullDisk;

    impl std::io::Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_csv_write_failure_is_reported() {
        let result = result_with_threats(2);
        let err = write_threat_csv(FullDisk, &result.threat_details).unwrap_err();
        assert!(err.to_string().contains("no space left"));
    }

    #[test]
    fn test_csv_export_writes_every_record() {
        let result = result_with_threats(3);
        let artifact = export(Some(&result), ExportFormat::Csv, now()).unwrap();
        assert_eq!(artifact.contents.lines().count(), 1 + artifact.records);
        assert!(!ExportWarning::Serialize("x".to_string()).is_empty_export());
    }

    #[tokio::test]
    async fn test_artifact_write() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = export(Some(&result_with_threats(1)), ExportFormat::Csv, now()).unwrap();
        let path = dir.path().join(&artifact.file_name);
        artifact.write_to(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), artifact.contents);
    }
}
