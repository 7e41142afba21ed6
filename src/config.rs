use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::{Cli, ColorMode, ResumePolicy, Theme};

// ---------------------------------------------------------------------------
// TOML-deserializable config (intermediate representation)
// ---------------------------------------------------------------------------

/// Raw config as parsed from the TOML file.
/// All fields are optional so that missing keys fall through to defaults.
/// Unknown keys are silently ignored by serde.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    follow: Option<bool>,
    debug: Option<bool>,
    theme: Option<String>,
    theme_file: Option<PathBuf>,
    color: Option<String>,
    follow_mode: FileFollowConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileFollowConfig {
    poll_interval_ms: Option<u64>,
    max_poll_interval_ms: Option<u64>,
    on_rotate: Option<String>,
}

// ---------------------------------------------------------------------------
// Effective (merged) config
// ---------------------------------------------------------------------------

/// Which theme catalog to load.
#[derive(Debug, Clone, PartialEq)]
pub enum ThemeSelection {
    Builtin(Theme),
    File(PathBuf),
}

impl std::fmt::Display for ThemeSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemeSelection::Builtin(theme) => write!(f, "{}", theme),
            ThemeSelection::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub follow: bool,
    pub debug_mode: bool,
    pub theme: ThemeSelection,
    pub color: ColorMode,
    pub follow_mode: FollowConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FollowConfig {
    pub poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    pub on_rotate: ResumePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            follow: false,
            debug_mode: false,
            theme: ThemeSelection::Builtin(Theme::Dark),
            color: ColorMode::Auto,
            follow_mode: FollowConfig::default(),
        }
    }
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_poll_interval_ms: 1000,
            on_rotate: ResumePolicy::Start,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Returns the default config file path: `~/.config/loghue/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("loghue").join("config.toml"))
}

/// Load the config file. Returns `None` if the file does not exist or
/// cannot be parsed.
fn load_file_config(path: &Path) -> Option<FileConfig> {
    if !path.exists() {
        return None;
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<FileConfig>(&contents) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                eprintln!(
                    "loghue: warning: failed to parse config file {}: {}",
                    path.display(),
                    e
                );
                None
            }
        },
        Err(e) => {
            eprintln!(
                "loghue: warning: failed to read config file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

fn parse_theme(s: &str) -> Option<Theme> {
    match s.to_lowercase().as_str() {
        "dark" => Some(Theme::Dark),
        "light" => Some(Theme::Light),
        other => {
            eprintln!(
                "loghue: warning: unknown theme \"{}\", using default",
                other
            );
            None
        }
    }
}

fn parse_color_mode(s: &str) -> Option<ColorMode> {
    match s.to_lowercase().as_str() {
        "auto" => Some(ColorMode::Auto),
        "always" => Some(ColorMode::Always),
        "never" => Some(ColorMode::Never),
        other => {
            eprintln!(
                "loghue: warning: unknown color mode \"{}\", using default",
                other
            );
            None
        }
    }
}

fn parse_resume_policy(s: &str) -> Option<ResumePolicy> {
    match s.to_lowercase().as_str() {
        "start" => Some(ResumePolicy::Start),
        "end" => Some(ResumePolicy::End),
        other => {
            eprintln!(
                "loghue: warning: unknown on_rotate value \"{}\", using default",
                other
            );
            None
        }
    }
}

/// Build the effective `AppConfig` by merging defaults, config file, and CLI args.
///
/// Precedence (highest wins):
/// 1. CLI flags (if explicitly provided)
/// 2. Config file values
/// 3. Hardcoded defaults
///
/// Within one layer an explicit theme file beats a built-in theme name.
pub fn build_config(cli: &Cli) -> AppConfig {
    let mut config = AppConfig::default();

    let config_path = cli.config.clone().or_else(default_config_path);

    if let Some(ref path) = config_path {
        if let Some(file_cfg) = load_file_config(path) {
            apply_file_config(&mut config, file_cfg);
        } else if cli.config.is_some() && !path.exists() {
            eprintln!(
                "loghue: warning: config file not found: {}",
                path.display()
            );
        }
    }

    if cli.follow {
        config.follow = true;
    }
    if cli.debug {
        config.debug_mode = true;
    }
    if let Some(ref theme) = cli.theme {
        config.theme = ThemeSelection::Builtin(theme.clone());
    }
    if let Some(ref path) = cli.theme_file {
        config.theme = ThemeSelection::File(path.clone());
    }
    if let Some(color) = cli.color {
        config.color = color;
    }

    config
}

fn apply_file_config(config: &mut AppConfig, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.follow {
        config.follow = v;
    }
    if let Some(v) = file_cfg.debug {
        config.debug_mode = v;
    }
    if let Some(theme) = file_cfg.theme.as_deref().and_then(parse_theme) {
        config.theme = ThemeSelection::Builtin(theme);
    }
    if let Some(path) = file_cfg.theme_file {
        config.theme = ThemeSelection::File(path);
    }
    if let Some(color) = file_cfg.color.as_deref().and_then(parse_color_mode) {
        config.color = color;
    }

    let follow_mode = file_cfg.follow_mode;
    if let Some(ms) = follow_mode.poll_interval_ms {
        config.follow_mode.poll_interval_ms = ms;
    }
    if let Some(ms) = follow_mode.max_poll_interval_ms {
        config.follow_mode.max_poll_interval_ms = ms;
    }
    if let Some(policy) = follow_mode.on_rotate.as_deref().and_then(parse_resume_policy) {
        config.follow_mode.on_rotate = policy;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
