//! AegisNet Sentinel - Graphical User Interface
//!
//! Single-screen dashboard: pick or drop a flow CSV, preview it, submit it for
//! classification, and inspect the benign/attack breakdown. A manual form
//! classifies one flow at a time.

use aegisnet_sentinel::chart::{AGGREGATE_LABELS, AGGREGATE_TITLE};
use aegisnet_sentinel::client::HttpClassifier;
use aegisnet_sentinel::config::Settings;
use aegisnet_sentinel::dashboard::{Download, Job, Notice, NoticeLevel};
use aegisnet_sentinel::features::FEATURES;
use aegisnet_sentinel::runtime::Runtime;
use aegisnet_sentinel::theme::{FileThemeStore, MemoryThemeStore, Rgb, ThemeName, ThemeStore};
use aegisnet_sentinel::threat_panel::ExportFormat;
use aegisnet_sentinel::{Command, Dashboard, Event, SourceFile};
use iced::widget::{
    button, column, container, progress_bar, row, rule, scrollable, text, text_input,
};
use iced::{Center, Element, Fill, Subscription, Task, Theme};
use std::path::PathBuf;
use std::sync::Arc;

/// Columns shown in the preview table before the rest are summarized.
const PREVIEW_COLUMN_LIMIT: usize = 8;
/// Notices kept on screen.
const NOTICE_LIMIT: usize = 5;

fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load();
    log::info!(
        "Using classification service at {} (timeout {}s)",
        settings.api_base_url,
        settings.request_timeout_secs
    );
    let classifier = match HttpClassifier::new(&settings) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    };
    let runtime = Runtime::new(Arc::new(classifier));

    iced::application(move || App::new(runtime.clone()), App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .centered()
        .run()
}

// ============================================================================
// App State
// ============================================================================

struct App {
    dashboard: Dashboard,
    runtime: Runtime,
    notices: Vec<Notice>,
}

impl App {
    fn theme(&self) -> Theme {
        match self.dashboard.theme().active() {
            ThemeName::Neon => Theme::Dark,
            ThemeName::Magenta => Theme::Dracula,
        }
    }

    fn new(runtime: Runtime) -> (Self, Task<Message>) {
        let store: Box<dyn ThemeStore> = match FileThemeStore::from_default_path() {
            Some(store) => Box::new(store),
            None => {
                log::warn!("HOME is not set; theme choice will not be remembered");
                Box::new(MemoryThemeStore::default())
            }
        };
        (
            App {
                dashboard: Dashboard::new(store),
                runtime,
                notices: Vec::new(),
            },
            Task::none(),
        )
    }

    fn subscription(&self) -> Subscription<Message> {
        iced::event::listen_with(|event, _status, _window| match event {
            iced::Event::Window(iced::window::Event::FileDropped(path)) => {
                Some(Message::PathDropped(path))
            }
            _ => None,
        })
    }

    fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
        if self.notices.len() > NOTICE_LIMIT {
            let excess = self.notices.len() - NOTICE_LIMIT;
            self.notices.drain(..excess);
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone)]
enum Message {
    Dashboard(Event),

    // File dialogs
    BrowseFile,
    FileChosen(Option<PathBuf>),
    PathDropped(PathBuf),
    SaveTargetChosen(Download, Option<PathBuf>),
    SaveCompleted(Result<(PathBuf, u64), String>),

    DismissNotices,
}

// ============================================================================
// Update
// ============================================================================

impl App {
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Dashboard(event) => self.dispatch(event),

            Message::BrowseFile => Task::perform(
                async {
                    let file = rfd::AsyncFileDialog::new()
                        .set_title("Select network flow CSV")
                        .add_filter("CSV", &["csv", "CSV"])
                        .pick_file()
                        .await;
                    file.map(|f| f.path().to_path_buf())
                },
                Message::FileChosen,
            ),
            Message::FileChosen(Some(path)) => {
                self.dispatch(Event::FileSelected(SourceFile::from_path(path)))
            }
            Message::FileChosen(None) => Task::none(),
            Message::PathDropped(path) => {
                self.dispatch(Event::FileDropped(SourceFile::from_path(path)))
            }

            Message::SaveTargetChosen(download, Some(path)) => Task::perform(
                async move {
                    download
                        .save_to(&path)
                        .await
                        .map(|bytes| (path, bytes))
                        .map_err(|e| format!("{:#}", e))
                },
                Message::SaveCompleted,
            ),
            Message::SaveTargetChosen(_, None) => Task::none(),
            Message::SaveCompleted(Ok((path, bytes))) => {
                log::info!("Saved {} bytes to {}", bytes, path.display());
                self.push_notice(Notice {
                    level: NoticeLevel::Success,
                    message: format!("Saved {}", path.display()),
                });
                Task::none()
            }
            Message::SaveCompleted(Err(e)) => {
                log::error!("{}", e);
                self.push_notice(Notice {
                    level: NoticeLevel::Error,
                    message: e,
                });
                Task::none()
            }

            Message::DismissNotices => {
                self.notices.clear();
                Task::none()
            }
        }
    }

    fn dispatch(&mut self, event: Event) -> Task<Message> {
        let commands = self.dashboard.dispatch(event);
        for notice in self.dashboard.take_notices() {
            self.push_notice(notice);
        }
        Task::batch(commands.into_iter().map(|c| self.command_task(c)))
    }

    fn command_task(&self, command: Command) -> Task<Message> {
        match command {
            Command::Run(job) => run_job(&self.runtime, job),
            Command::Save(download) => {
                let suggested = match &download {
                    Download::ThreatLog(artifact) => artifact.file_name.clone(),
                    Download::SourceCopy(file) => file.name().to_string(),
                };
                Task::perform(
                    async move {
                        let target = rfd::AsyncFileDialog::new()
                            .set_title("Save file")
                            .set_file_name(&suggested)
                            .save_file()
                            .await;
                        (download, target.map(|f| f.path().to_path_buf()))
                    },
                    |(download, target)| Message::SaveTargetChosen(download, target),
                )
            }
        }
    }
}

fn run_job(runtime: &Runtime, job: Job) -> Task<Message> {
    Task::perform(runtime.perform(job), Message::Dashboard)
}

// ============================================================================
// View
// ============================================================================

impl App {
    fn view(&self) -> Element<'_, Message> {
        let d = &self.dashboard;

        let header = row![
            text("AegisNet Sentinel").size(28).width(Fill),
            text(d.theme().indicator())
                .size(13)
                .font(iced::Font::MONOSPACE),
            button(text("Toggle Theme").size(13))
                .on_press(Message::Dashboard(Event::ToggleTheme))
                .style(button::secondary),
        ]
        .spacing(12)
        .align_y(Center);

        let content = column![
            self.view_upload(),
            self.view_preview(),
            rule::horizontal(1),
            self.view_results(),
            self.view_threats(),
            rule::horizontal(1),
            self.view_manual(),
        ]
        .spacing(16);

        column![
            container(header).padding([10, 20]),
            rule::horizontal(1),
            self.view_notices(),
            scrollable(container(content).padding(20).width(Fill)).height(Fill),
        ]
        .into()
    }

    // -- File intake --
    fn view_upload(&self) -> Element<'_, Message> {
        let d = &self.dashboard;
        let name = d.selected_file().map(|f| f.name()).unwrap_or("");

        let picker = row![
            text_input("Drop a CSV file here or browse...", name).width(Fill),
            button(text("Browse").size(13)).on_press(Message::BrowseFile),
            button(text("Clear").size(13))
                .on_press_maybe(
                    d.selected_file()
                        .map(|_| Message::Dashboard(Event::FileCleared))
                )
                .style(button::secondary),
        ]
        .spacing(10)
        .align_y(Center);

        let actions = row![
            button(text("Analyze Traffic").size(14))
                .on_press_maybe(
                    d.batch_submit_enabled()
                        .then_some(Message::Dashboard(Event::SubmitBatch))
                )
                .style(button::primary),
            button(text("Preview").size(13))
                .on_press_maybe(
                    d.preview_enabled()
                        .then_some(Message::Dashboard(Event::OpenPreview))
                )
                .style(button::secondary),
            button(text("Download Source").size(13))
                .on_press_maybe(
                    d.selected_file()
                        .map(|_| Message::Dashboard(Event::DownloadSource))
                )
                .style(button::secondary),
        ]
        .spacing(10)
        .align_y(Center);

        let loader: Element<'_, Message> = if d.loader_visible() {
            text("Analyzing...")
                .size(13)
                .color(iced::Color::from_rgb(0.9, 0.8, 0.3))
                .into()
        } else {
            column![].into()
        };

        column![text("Upload Flow Data").size(16), picker, actions, loader]
            .spacing(8)
            .into()
    }

    fn view_preview(&self) -> Element<'_, Message> {
        let d = &self.dashboard;
        let preview = match d.preview() {
            Some(p) if d.preview_open() => p,
            _ => return column![].into(),
        };

        let shown: Vec<&str> = preview
            .columns
            .iter()
            .take(PREVIEW_COLUMN_LIMIT)
            .map(String::as_str)
            .collect();
        let header = row(shown.iter().map(|c| text(*c).size(12).width(130).into())).spacing(6);

        let mut lines: Vec<Element<'_, Message>> = vec![header.into(), rule::horizontal(1).into()];
        for i in 0..preview.total_rows_in_preview() {
            let cells = shown.iter().map(|c| {
                text(preview.cell(i, c).unwrap_or(""))
                    .size(12)
                    .width(130)
                    .into()
            });
            lines.push(row(cells).spacing(6).into());
        }

        let hidden = preview.columns.len().saturating_sub(PREVIEW_COLUMN_LIMIT);
        let summary = if hidden > 0 {
            format!(
                "{} rows shown, {} more columns not shown (parsed by {})",
                preview.total_rows_in_preview(),
                hidden,
                preview.parser
            )
        } else {
            format!(
                "{} rows shown (parsed by {})",
                preview.total_rows_in_preview(),
                preview.parser
            )
        };

        column![
            row![
                text(format!("Preview: {}", preview.source.name())).size(14).width(Fill),
                button(text("Close").size(13))
                    .on_press(Message::Dashboard(Event::ClosePreview))
                    .style(button::secondary),
            ]
            .align_y(Center),
            scrollable(container(column(lines).spacing(2)).padding(8)).height(250),
            text(summary)
                .size(12)
                .color(iced::Color::from_rgb(0.6, 0.6, 0.6)),
        ]
        .spacing(6)
        .into()
    }

    // -- Charts --
    fn view_results(&self) -> Element<'_, Message> {
        let charts = self.dashboard.charts();
        let palette = charts.palette();

        let title = text(AGGREGATE_TITLE).size(18).color(color(palette.title));
        if !charts.has_data() {
            return column![
                title,
                text("No analysis yet. Submit a CSV file to see results.")
                    .size(13)
                    .color(iced::Color::from_rgb(0.6, 0.6, 0.6)),
            ]
            .spacing(8)
            .into();
        }

        let readout = charts.readout();
        let numbers = row![
            stat("Total Flows", readout.total),
            stat("Benign", readout.benign),
            stat("Threats", readout.threats),
            stat("Threat %", readout.threat_percentage),
        ]
        .spacing(30);

        let aggregate = charts.aggregate();
        let fractions = aggregate.fractions();
        let slices = column((0..2).map(|i| {
            row![
                text(AGGREGATE_LABELS[i])
                    .size(13)
                    .width(80)
                    .color(color(aggregate.slice_colors[i])),
                progress_bar(0.0..=1.0, fractions[i]),
                text(aggregate.data[i].to_string())
                    .size(13)
                    .width(80)
                    .color(color(aggregate.legend_color)),
            ]
            .spacing(10)
            .align_y(Center)
            .into()
        }))
        .spacing(6);

        let importance: Element<'_, Message> = match charts.importance() {
            Some(chart) => {
                let bars = chart.labels.iter().zip(&chart.values).map(|(label, value)| {
                    row![
                        text(label.as_str()).size(12).width(220),
                        progress_bar(0.0..=100.0, *value as f32),
                        text(format!("{:.2}%", value))
                            .size(12)
                            .width(70)
                            .color(color(chart.bar_color)),
                    ]
                    .spacing(10)
                    .align_y(Center)
                    .into()
                });
                column![
                    text("Feature Importance").size(16),
                    column(bars).spacing(4),
                ]
                .spacing(8)
                .into()
            }
            None => column![].into(),
        };

        column![title, numbers, slices, importance].spacing(12).into()
    }

    // -- Threat panel --
    fn view_threats(&self) -> Element<'_, Message> {
        let panel = self.dashboard.threats();
        if !panel.is_active() {
            return column![].into();
        }

        let caret = if panel.is_expanded() { "v" } else { ">" };
        let toggle = button(text(format!("{} Threat Records", caret)).size(14))
            .on_press(Message::Dashboard(Event::ToggleThreatPanel))
            .style(button::text);

        if !panel.is_expanded() {
            return column![toggle].into();
        }

        let danger = color(self.dashboard.charts().palette().attack);
        let listed: Vec<String> = panel.listed().iter().map(|i| format!("Row {}", i)).collect();
        let mut body = column![text(listed.join(", ")).size(12).color(danger)].spacing(6);
        if let Some(more) = panel.more_text() {
            body = body.push(
                text(more)
                    .size(12)
                    .color(iced::Color::from_rgb(0.6, 0.6, 0.6)),
            );
        }

        let exports = row![
            button(text("Download CSV Log").size(13))
                .on_press(Message::Dashboard(Event::ExportThreats(ExportFormat::Csv))),
            button(text("Download Text Report").size(13))
                .on_press(Message::Dashboard(Event::ExportThreats(ExportFormat::Text)))
                .style(button::secondary),
        ]
        .spacing(10);

        column![toggle, body, exports].spacing(8).into()
    }

    // -- Manual analysis --
    fn view_manual(&self) -> Element<'_, Message> {
        let d = &self.dashboard;

        let grid = column((0..FEATURES.len()).step_by(2).map(|i| {
            let mut pair = row![self.manual_field(i)].spacing(20);
            if i + 1 < FEATURES.len() {
                pair = pair.push(self.manual_field(i + 1));
            }
            pair.into()
        }))
        .spacing(6);

        let outcome: Element<'_, Message> = match d.manual_outcome().text() {
            Some(msg) => {
                let c = if d.manual_outcome().is_danger() {
                    iced::Color::from_rgb(0.9, 0.3, 0.3)
                } else {
                    iced::Color::from_rgb(0.4, 0.9, 0.4)
                };
                text(msg).size(14).color(c).into()
            }
            None => column![].into(),
        };

        column![
            text("Manual Flow Analysis").size(16),
            grid,
            button(text("Analyze Flow").size(14))
                .on_press_maybe(
                    d.manual_submit_enabled()
                        .then_some(Message::Dashboard(Event::SubmitManual))
                )
                .style(button::primary),
            outcome,
        ]
        .spacing(10)
        .into()
    }

    fn manual_field(&self, i: usize) -> Element<'_, Message> {
        row![
            text(FEATURES[i]).size(12).width(200),
            text_input("0", &self.dashboard.manual_entries()[i])
                .on_input(move |value| {
                    Message::Dashboard(Event::ManualFieldChanged { index: i, value })
                })
                .width(Fill),
        ]
        .spacing(8)
        .align_y(Center)
        .into()
    }

    // -- Notices --
    fn view_notices(&self) -> Element<'_, Message> {
        if self.notices.is_empty() {
            return column![].into();
        }
        let lines = self.notices.iter().map(|n| {
            text(n.message.as_str())
                .size(13)
                .color(notice_color(n.level))
                .into()
        });
        container(
            row![
                column(lines).spacing(2).width(Fill),
                button(text("Dismiss").size(12))
                    .on_press(Message::DismissNotices)
                    .style(button::text),
            ]
            .align_y(Center),
        )
        .padding([6, 20])
        .into()
    }
}

// ============================================================================
// Helper widgets
// ============================================================================

fn color(rgb: Rgb) -> iced::Color {
    iced::Color::from_rgb8(rgb.0, rgb.1, rgb.2)
}

fn notice_color(level: NoticeLevel) -> iced::Color {
    match level {
        NoticeLevel::Info => iced::Color::from_rgb(0.6, 0.8, 1.0),
        NoticeLevel::Success => iced::Color::from_rgb(0.4, 0.9, 0.4),
        NoticeLevel::Warning => iced::Color::from_rgb(0.95, 0.75, 0.3),
        NoticeLevel::Error => iced::Color::from_rgb(0.9, 0.3, 0.3),
    }
}

/// A labelled number in the results readout.
fn stat<'a>(label: &'a str, value: String) -> Element<'a, Message> {
    column![
        text(label)
            .size(12)
            .color(iced::Color::from_rgb(0.6, 0.6, 0.6)),
        text(value).size(22),
    ]
    .spacing(2)
    .into()
}
