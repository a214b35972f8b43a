//! Application controller.
//!
//! `Dashboard` owns every piece of view state. The host feeds it `Event`s
//! through `dispatch` and executes the `Command`s it returns; job completions
//! come back as further events. All mutation happens inside `dispatch`, so the
//! store and its views can never be observed out of step.

use crate::chart::ChartBinding;
use crate::client::{FlowRecord, SubmitError};
use crate::csv_ingest::{self, CsvPreview, IngestError};
use crate::features::FEATURES;
use crate::model::{AnalysisResult, SingleFlowResult, SourceFile};
use crate::result_store::{ResultStore, ResultView};
use crate::submission::{SubmissionController, SubmitRejected};
use crate::theme::{ThemeController, ThemePhase, ThemeStore};
use crate::threat_panel::{self, ExportArtifact, ExportFormat, ThreatPanel};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Events and commands
// ============================================================================

/// Everything that can happen to the dashboard.
#[derive(Debug, Clone)]
pub enum Event {
    // File intake
    FileSelected(SourceFile),
    FileDropped(SourceFile),
    FileCleared,
    PreviewParsed {
        generation: u64,
        result: Result<CsvPreview, IngestError>,
    },
    OpenPreview,
    ClosePreview,
    DownloadSource,

    // Batch analysis
    SubmitBatch,
    BatchSettled(Result<AnalysisResult, SubmitError>),

    // Manual analysis
    ManualFieldChanged { index: usize, value: String },
    SubmitManual,
    ManualSettled(Result<SingleFlowResult, SubmitError>),

    // Threat panel
    ToggleThreatPanel,
    ExportThreats(ExportFormat),

    // Theme
    ToggleTheme,
    ThemePhase { generation: u64, phase: ThemePhase },
}

/// Async work whose completion is reported back as an `Event`.
#[derive(Debug, Clone)]
pub enum Job {
    ParsePreview { generation: u64, file: SourceFile },
    ClassifyBatch(SourceFile),
    ClassifySingle(FlowRecord),
    Timer {
        delay: Duration,
        generation: u64,
        phase: ThemePhase,
    },
}

/// A file to offer to the operator for saving.
#[derive(Debug, Clone)]
pub enum Download {
    ThreatLog(ExportArtifact),
    /// The originally selected file, unchanged
    SourceCopy(SourceFile),
}

impl Download {
    /// Write the download to `path`, returning the number of bytes written.
    ///
    /// Path-backed sources are copied file to file, never loaded whole.
    pub async fn save_to(&self, path: &Path) -> anyhow::Result<u64> {
        match self {
            Download::ThreatLog(artifact) => {
                artifact.write_to(path).await?;
                Ok(artifact.contents.len() as u64)
            }
            Download::SourceCopy(file) => match file.path() {
                Some(source) => tokio::fs::copy(source, path).await.with_context(|| {
                    format!("Failed to copy {} to {}", source.display(), path.display())
                }),
                None => {
                    let bytes = file
                        .read()
                        .await
                        .with_context(|| format!("Failed to read {}", file.name()))?;
                    tokio::fs::write(path, &bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    Ok(bytes.len() as u64)
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Run(Job),
    Save(Download),
}

// ============================================================================
// Notices and manual result
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient message for the operator (rendered as a toast by the host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// What the manual analysis panel shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ManualOutcome {
    #[default]
    Empty,
    Result(SingleFlowResult),
    Error(String),
}

impl ManualOutcome {
    pub fn text(&self) -> Option<String> {
        match self {
            ManualOutcome::Empty => None,
            ManualOutcome::Result(r) => Some(r.summary()),
            ManualOutcome::Error(msg) => Some(format!("ERROR: {}", msg)),
        }
    }

    /// Attack results and errors use the danger style.
    pub fn is_danger(&self) -> bool {
        match self {
            ManualOutcome::Empty => false,
            ManualOutcome::Result(r) => r.prediction == crate::model::PredictedLabel::Attack,
            ManualOutcome::Error(_) => true,
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

pub struct Dashboard {
    selected: Option<SourceFile>,
    /// Bumped on every selection change so stale preview parses are dropped
    selection_generation: u64,
    preview: Option<CsvPreview>,
    preview_open: bool,

    submissions: SubmissionController,
    store: ResultStore,
    charts: ChartBinding,
    threats: ThreatPanel,
    theme: ThemeController,

    manual_entries: Vec<String>,
    manual_outcome: ManualOutcome,

    notices: Vec<Notice>,
}

impl Dashboard {
    /// Build the dashboard, styled with the persisted theme. The store is only
    /// written when a toggle commits.
    pub fn new(theme_store: Box<dyn ThemeStore>) -> Self {
        let theme = ThemeController::load(theme_store);
        let palette = theme.palette();
        Dashboard {
            selected: None,
            selection_generation: 0,
            preview: None,
            preview_open: false,
            submissions: SubmissionController::default(),
            store: ResultStore::default(),
            charts: ChartBinding::new(palette),
            threats: ThreatPanel::default(),
            theme,
            manual_entries: vec![String::new(); FEATURES.len()],
            manual_outcome: ManualOutcome::default(),
            notices: Vec::new(),
        }
    }

    /// Apply one event and return the work it starts.
    pub fn dispatch(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::FileSelected(file) | Event::FileDropped(file) => self.select_file(file),
            Event::FileCleared => {
                log::info!("File selection cleared");
                self.clear_selection();
                Vec::new()
            }
            Event::PreviewParsed { generation, result } => {
                self.preview_parsed(generation, result);
                Vec::new()
            }
            Event::OpenPreview => {
                self.preview_open = self.preview.is_some();
                Vec::new()
            }
            Event::ClosePreview => {
                self.preview_open = false;
                Vec::new()
            }
            Event::DownloadSource => {
                let source = self
                    .preview
                    .as_ref()
                    .map(|p| p.source.clone())
                    .or_else(|| self.selected.clone());
                match source {
                    Some(file) => vec![Command::Save(Download::SourceCopy(file))],
                    None => {
                        self.notify(NoticeLevel::Warning, "No file selected.");
                        Vec::new()
                    }
                }
            }

            Event::SubmitBatch => self.submit_batch(),
            Event::BatchSettled(result) => {
                self.batch_settled(result);
                Vec::new()
            }

            Event::ManualFieldChanged { index, value } => {
                if let Some(entry) = self.manual_entries.get_mut(index) {
                    *entry = value;
                }
                Vec::new()
            }
            Event::SubmitManual => self.submit_manual(),
            Event::ManualSettled(result) => {
                self.manual_settled(result);
                Vec::new()
            }

            Event::ToggleThreatPanel => {
                self.threats.toggle_expanded();
                Vec::new()
            }
            Event::ExportThreats(format) => self.export_threats(format),

            Event::ToggleTheme => match self.theme.toggle(true) {
                Some(plan) => vec![
                    Command::Run(Job::Timer {
                        delay: plan.commit_after,
                        generation: plan.generation,
                        phase: ThemePhase::Commit,
                    }),
                    Command::Run(Job::Timer {
                        delay: plan.settle_after,
                        generation: plan.generation,
                        phase: ThemePhase::Settle,
                    }),
                ],
                None => {
                    self.charts.restyle(self.theme.active().palette());
                    Vec::new()
                }
            },
            Event::ThemePhase { generation, phase } => {
                if let Some(palette) = self.theme.advance(generation, phase) {
                    self.charts.restyle(palette);
                }
                Vec::new()
            }
        }
    }

    // -- File intake --

    fn clear_selection(&mut self) {
        self.selection_generation += 1;
        self.selected = None;
        self.preview = None;
        self.preview_open = false;
        self.submissions.batch.set_input_ready(false);
    }

    fn select_file(&mut self, file: SourceFile) -> Vec<Command> {
        log::info!("File selection attempt: {}", file.name());
        if let Err(e) = csv_ingest::validate_name(file.name()) {
            log::warn!("{}", e);
            self.clear_selection();
            self.notify(NoticeLevel::Warning, "Invalid file type. Please upload a CSV file.");
            return Vec::new();
        }

        self.clear_selection();
        self.selected = Some(file.clone());
        self.submissions.batch.set_input_ready(true);
        self.notify(NoticeLevel::Info, format!("File ready for analysis: {}", file.name()));
        vec![Command::Run(Job::ParsePreview {
            generation: self.selection_generation,
            file,
        })]
    }

    fn preview_parsed(&mut self, generation: u64, result: Result<CsvPreview, IngestError>) {
        if generation != self.selection_generation {
            log::debug!("Dropping preview for superseded selection {}", generation);
            return;
        }
        match result {
            Ok(preview) => self.preview = Some(preview),
            Err(e) => {
                log::warn!("Preview unavailable: {}", e);
                self.preview = None;
            }
        }
    }

    // -- Batch analysis --

    fn submit_batch(&mut self) -> Vec<Command> {
        let file = match &self.selected {
            Some(f) => f.clone(),
            None => {
                log::warn!("No file selected; analysis aborted");
                self.submissions.batch.set_input_ready(false);
                self.notify(NoticeLevel::Warning, IngestError::NoFile.to_string());
                return Vec::new();
            }
        };

        if let Err(e) = csv_ingest::validate_name(file.name()) {
            log::warn!("{}; analysis aborted", e);
            self.clear_selection();
            self.notify(NoticeLevel::Warning, IngestError::NoFile.to_string());
            return Vec::new();
        }

        match self.submissions.batch.begin() {
            Ok(()) => {}
            Err(SubmitRejected::InFlight) => {
                log::debug!("Batch submission already in flight; ignoring trigger");
                return Vec::new();
            }
            Err(SubmitRejected::NotReady) => return Vec::new(),
        }

        log::info!("Starting analysis for file: {}", file.name());
        self.notify(NoticeLevel::Info, "Analyzing file... Please wait.");
        vec![Command::Run(Job::ClassifyBatch(file))]
    }

    fn batch_settled(&mut self, result: Result<AnalysisResult, SubmitError>) {
        match result {
            Ok(result) => {
                self.submissions.batch.settle(true);
                let attacks = result.attack_count;
                let mut views: [&mut dyn ResultView; 2] = [&mut self.charts, &mut self.threats];
                self.store.publish(result, &mut views);
                self.notify(
                    NoticeLevel::Success,
                    format!("Analysis complete. {} threats detected.", attacks),
                );
            }
            Err(e) => {
                self.submissions.batch.settle(false);
                log::error!("File upload error: {}", e);
                self.notify(NoticeLevel::Error, format!("Analysis Failed: {}", e));
            }
        }
    }

    // -- Manual analysis --

    fn submit_manual(&mut self) -> Vec<Command> {
        if let Err(e) = self.submissions.manual.begin() {
            log::debug!("Manual submission rejected: {}", e);
            return Vec::new();
        }
        self.notify(NoticeLevel::Info, "Analyzing single flow...");
        let flow = FlowRecord::from_entries(&self.manual_entries);
        vec![Command::Run(Job::ClassifySingle(flow))]
    }

    fn manual_settled(&mut self, result: Result<SingleFlowResult, SubmitError>) {
        match result {
            Ok(r) => {
                self.submissions.manual.settle(true);
                self.notify(
                    NoticeLevel::Success,
                    format!("Analysis Complete: {}", r.prediction),
                );
                self.manual_outcome = ManualOutcome::Result(r);
            }
            Err(e) => {
                self.submissions.manual.settle(false);
                log::error!("Manual analysis error: {}", e);
                self.notify(NoticeLevel::Error, format!("Analysis Failed: {}", e));
                self.manual_outcome = ManualOutcome::Error(e.to_string());
            }
        }
    }

    // -- Threat panel --

    fn export_threats(&mut self, format: ExportFormat) -> Vec<Command> {
        let current = self.store.current().map(Arc::as_ref);
        match threat_panel::export(current, format, chrono::Utc::now()) {
            Ok(artifact) => {
                log::info!("Exporting threat log with {} records", artifact.records);
                self.notify(
                    NoticeLevel::Success,
                    format!("Threat log downloaded: {} records", artifact.records),
                );
                vec![Command::Save(Download::ThreatLog(artifact))]
            }
            Err(w) => {
                let level = if w.is_empty_export() {
                    NoticeLevel::Warning
                } else {
                    NoticeLevel::Error
                };
                self.notify(level, w.to_string());
                Vec::new()
            }
        }
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    // -- Read access for the view --

    pub fn selected_file(&self) -> Option<&SourceFile> {
        self.selected.as_ref()
    }

    pub fn preview(&self) -> Option<&CsvPreview> {
        self.preview.as_ref()
    }

    pub fn preview_enabled(&self) -> bool {
        self.preview.is_some()
    }

    pub fn preview_open(&self) -> bool {
        self.preview_open
    }

    pub fn batch_submit_enabled(&self) -> bool {
        self.submissions.batch.control_enabled()
    }

    pub fn manual_submit_enabled(&self) -> bool {
        self.submissions.manual.control_enabled()
    }

    pub fn loader_visible(&self) -> bool {
        self.submissions.loader_visible()
    }

    pub fn submissions(&self) -> &SubmissionController {
        &self.submissions
    }

    pub fn result(&self) -> Option<&Arc<AnalysisResult>> {
        self.store.current()
    }

    pub fn charts(&self) -> &ChartBinding {
        &self.charts
    }

    pub fn threats(&self) -> &ThreatPanel {
        &self.threats
    }

    pub fn theme(&self) -> &ThemeController {
        &self.theme
    }

    pub fn manual_entries(&self) -> &[String] {
        &self.manual_entries
    }

    pub fn manual_outcome(&self) -> &ManualOutcome {
        &self.manual_outcome
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Hand pending notices to the host.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
