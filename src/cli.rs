use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Highlight log files in the terminal
#[derive(Parser, Debug)]
#[command(name = "loghue", about = "Highlight log files in the terminal")]
pub struct Cli {
    /// Log file to highlight; `-` or nothing reads piped standard input
    pub file: Option<PathBuf>,

    /// Keep reading as the file grows (survives rotation and truncation)
    #[arg(short = 'f', long, default_value_t = false)]
    pub follow: bool,

    /// Built-in theme: dark or light
    #[arg(long, value_enum, conflicts_with = "theme_file")]
    pub theme: Option<Theme>,

    /// Path to a TOML theme definition
    #[arg(long)]
    pub theme_file: Option<PathBuf>,

    /// When to emit colors
    #[arg(long, value_enum)]
    pub color: Option<ColorMode>,

    /// Log diagnostics to stderr
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Print the version
    Version,
    /// Print the effective configuration and a preview of every category
    Debug,
}

#[derive(Clone, Debug, PartialEq, ValueEnum)]
pub enum Theme {
    Dark,
    Light,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color only when stdout is a terminal and NO_COLOR is unset
    #[default]
    Auto,
    Always,
    Never,
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorMode::Auto => write!(f, "auto"),
            ColorMode::Always => write!(f, "always"),
            ColorMode::Never => write!(f, "never"),
        }
    }
}

/// Where to resume after the followed file is rotated or truncated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResumePolicy {
    #[default]
    Start,
    End,
}

impl std::fmt::Display for ResumePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResumePolicy::Start => write!(f, "start"),
            ResumePolicy::End => write!(f, "end"),
        }
    }
}
