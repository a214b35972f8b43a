//! Settings persistence in `~/.aegisnet-sentinel.conf`.
//!
//! Plain `key=value` lines. Unknown keys are preserved when a single key is
//! rewritten.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the classification service.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Load from the config file, then apply `AEGISNET_API_URL` and
    /// `AEGISNET_TIMEOUT_SECS` overrides.
    pub fn load() -> Self {
        let mut settings = match config_path() {
            Some(path) => Settings::from_file(&path),
            None => Settings::default(),
        };
        if let Ok(url) = std::env::var("AEGISNET_API_URL") {
            if !url.trim().is_empty() {
                settings.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(secs) = std::env::var("AEGISNET_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(n) => settings.request_timeout_secs = n,
                Err(_) => log::warn!("Ignoring invalid AEGISNET_TIMEOUT_SECS '{}'", secs),
            }
        }
        settings
    }

    /// Read settings from `path`, falling back to defaults for anything missing.
    pub fn from_file(path: &Path) -> Self {
        let mut settings = Settings::default();
        if let Some(url) = read_key(path, "api_url") {
            settings.api_base_url = url;
        }
        if let Some(secs) = read_key(path, "timeout_secs") {
            match secs.parse() {
                Ok(n) => settings.request_timeout_secs = n,
                Err(_) => log::warn!("Ignoring invalid timeout_secs '{}' in {}", secs, path.display()),
            }
        }
        settings
    }
}

/// Get the config file path: ~/.aegisnet-sentinel.conf
pub fn config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".aegisnet-sentinel.conf"))
}

/// Value of `key` in the config file, if the file and key exist.
pub fn read_key(path: &Path, key: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    content.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim().to_string())
    })
}

/// Set `key` to `value`, keeping every other line of the file.
pub fn write_key(path: &Path, key: &str, value: &str) -> Result<()> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;
    for line in content.lines() {
        let is_key = line
            .split_once('=')
            .map(|(k, _)| k.trim() == key)
            .unwrap_or(false);
        if is_key {
            if !replaced {
                lines.push(format!("{}={}", key, value));
                replaced = true;
            }
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.push(format!("{}={}", key, value));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    std::fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::from_file(&dir.path().join("nope.conf"));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.conf");
        std::fs::write(&path, "api_url = http://10.0.0.5:8080\ntimeout_secs=abc\ntheme=magenta\n").unwrap();
        let s = Settings::from_file(&path);
        assert_eq!(s.api_base_url, "http://10.0.0.5:8080");
        assert_eq!(s.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_write_key_preserves_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.conf");
        std::fs::write(&path, "api_url=http://x\ntheme=neon\n").unwrap();
        write_key(&path, "theme", "magenta").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "api_url=http://x\ntheme=magenta\n");

        let fresh = dir.path().join("b.conf");
        write_key(&fresh, "theme", "neon").unwrap();
        assert_eq!(read_key(&fresh, "theme").as_deref(), Some("neon"));
    }
}
