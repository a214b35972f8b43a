//! Neon/magenta theme with persisted choice and a timed transition.
//!
//! An animated toggle runs in three phases. Phase 1 happens at toggle time:
//! the transition flag goes up and the indicator shows `SYNCING`. Phase 2,
//! `COMMIT_DELAY` later, persists the new theme and restyles the charts.
//! Phase 3, `SETTLE_DELAY` after phase 1, drops the flag and shows the resting
//! indicator.
//!
//! A toggle during a running transition restarts it: the new target is the
//! opposite of the in-progress target and the earlier phases are ignored.

use crate::config;
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const COMMIT_DELAY: Duration = Duration::from_millis(350);
pub const SETTLE_DELAY: Duration = Duration::from_millis(700);

pub const TRANSITION_INDICATOR: &str = "SYNCING";

const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeName {
    #[default]
    Neon,
    Magenta,
}

impl ThemeName {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeName::Neon => "neon",
            ThemeName::Magenta => "magenta",
        }
    }

    pub fn other(self) -> Self {
        match self {
            ThemeName::Neon => ThemeName::Magenta,
            ThemeName::Magenta => ThemeName::Neon,
        }
    }

    /// Indicator text once no transition is running.
    pub fn resting_indicator(self) -> &'static str {
        match self {
            ThemeName::Neon => "NEON",
            ThemeName::Magenta => "MAGENTA",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            ThemeName::Neon => Palette {
                benign: Rgb(0x00, 0xff, 0x00),
                attack: Rgb(0xff, 0x33, 0x33),
                legend: Rgb(0x00, 0xff, 0x00),
                title: Rgb(0x00, 0xff, 0xff),
                bar: Rgb(0x00, 0xff, 0xff),
                grid: Rgb(0x0a, 0x3d, 0x3d),
            },
            ThemeName::Magenta => Palette {
                benign: Rgb(0xff, 0x4f, 0xd8),
                attack: Rgb(0xff, 0xb0, 0x00),
                legend: Rgb(0xff, 0x4f, 0xd8),
                title: Rgb(0xc7, 0x7d, 0xff),
                bar: Rgb(0xff, 0x00, 0xff),
                grid: Rgb(0x3d, 0x0a, 0x3d),
            },
        }
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "neon" => Ok(ThemeName::Neon),
            "magenta" => Ok(ThemeName::Magenta),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Chart colors for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub benign: Rgb,
    pub attack: Rgb,
    pub legend: Rgb,
    pub title: Rgb,
    pub bar: Rgb,
    pub grid: Rgb,
}

/// Persisted key-value slot for the active theme name.
pub trait ThemeStore: Send {
    fn load(&self) -> Option<String>;
    fn save(&mut self, theme: &str) -> Result<()>;
}

/// `theme=` line in the settings file.
pub struct FileThemeStore {
    path: PathBuf,
}

impl FileThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileThemeStore { path: path.into() }
    }

    /// Store in the default settings file, if `$HOME` is known.
    pub fn from_default_path() -> Option<Self> {
        config::config_path().map(FileThemeStore::new)
    }
}

impl ThemeStore for FileThemeStore {
    fn load(&self) -> Option<String> {
        config::read_key(&self.path, THEME_KEY)
    }

    fn save(&mut self, theme: &str) -> Result<()> {
        config::write_key(&self.path, THEME_KEY, theme)
    }
}

/// In-memory store. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryThemeStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryThemeStore {
    pub fn with_value(value: &str) -> Self {
        MemoryThemeStore {
            slot: Arc::new(Mutex::new(Some(value.to_string()))),
        }
    }

    pub fn value(&self) -> Option<String> {
        self.slot.lock().map(|s| s.clone()).unwrap_or(None)
    }
}

impl ThemeStore for MemoryThemeStore {
    fn load(&self) -> Option<String> {
        self.value()
    }

    fn save(&mut self, theme: &str) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("theme store lock poisoned"))?;
        *slot = Some(theme.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemePhase {
    Commit,
    Settle,
}

/// Timers the host must run after an animated toggle. Both delays count from
/// the toggle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub generation: u64,
    pub target: ThemeName,
    pub commit_after: Duration,
    pub settle_after: Duration,
}

/// Process-wide theme state.
pub struct ThemeController {
    active: ThemeName,
    pending: Option<ThemeName>,
    transitioning: bool,
    indicator: &'static str,
    generation: u64,
    store: Box<dyn ThemeStore>,
}

impl ThemeController {
    /// Read the persisted theme; absent or unrecognized values mean `Neon`.
    pub fn load(store: Box<dyn ThemeStore>) -> Self {
        let active = match store.load() {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                log::warn!("Ignoring persisted theme: {}", e);
                ThemeName::default()
            }),
            None => ThemeName::default(),
        };
        ThemeController {
            active,
            pending: None,
            transitioning: false,
            indicator: active.resting_indicator(),
            generation: 0,
            store,
        }
    }

    pub fn active(&self) -> ThemeName {
        self.active
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn indicator(&self) -> &'static str {
        self.indicator
    }

    /// Chart colors for the active theme. Nothing is persisted.
    pub fn palette(&self) -> Palette {
        self.active.palette()
    }

    /// Commit `theme` immediately, with no transition. Returns the palette to
    /// apply to the charts.
    pub fn apply_theme(&mut self, theme: ThemeName) -> Palette {
        self.active = theme;
        if let Err(e) = self.store.save(theme.as_str()) {
            log::warn!("Failed to persist theme '{}': {:#}", theme, e);
        }
        if !self.transitioning {
            self.indicator = theme.resting_indicator();
        }
        log::info!("Theme set to {}", theme);
        theme.palette()
    }

    /// Flip the theme.
    ///
    /// With `animate` this runs phase 1 and returns the plan for phases 2 and 3.
    /// Without it the theme is committed at once and `None` is returned; the
    /// caller restyles from `active().palette()`.
    pub fn toggle(&mut self, animate: bool) -> Option<TransitionPlan> {
        let target = self.pending.unwrap_or(self.active).other();
        self.generation += 1;

        if !animate {
            self.pending = None;
            self.transitioning = false;
            self.apply_theme(target);
            return None;
        }

        self.pending = Some(target);
        self.transitioning = true;
        self.indicator = TRANSITION_INDICATOR;
        Some(TransitionPlan {
            generation: self.generation,
            target,
            commit_after: COMMIT_DELAY,
            settle_after: SETTLE_DELAY,
        })
    }

    /// Run a timed phase. Phases from a superseded toggle return `None`;
    /// a commit returns the palette to apply.
    pub fn advance(&mut self, generation: u64, phase: ThemePhase) -> Option<Palette> {
        if generation != self.generation {
            log::debug!(
                "Ignoring {:?} from superseded transition {} (current {})",
                phase,
                generation,
                self.generation
            );
            return None;
        }
        let target = self.pending?;
        match phase {
            ThemePhase::Commit => Some(self.apply_theme(target)),
            ThemePhase::Settle => {
                self.pending = None;
                self.transitioning = false;
                self.indicator = self.active.resting_indicator();
                None
            }
        }
    }
}
