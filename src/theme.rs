//! Theme catalogs.
//!
//! A [`ThemeCatalog`] maps category names to abstract [`StyleDescriptor`]s.
//! Two catalogs are built in ([`ThemeCatalog::dark()`] and
//! [`ThemeCatalog::light()`]); others are read from TOML files:
//!
//! ```toml
//! name = "solar"
//!
//! [[styles]]
//! category = "date"
//! fg = "#b58900"
//! bold = true
//! ```
//!
//! Catalogs are validated when built and never change afterwards. Turning
//! them into terminal escape codes is the job of [`crate::scheme`].

use std::collections::HashSet;
use std::path::Path;

use crossterm::style::Color;
use serde::Deserialize;

use crate::cli::Theme;
use crate::config::ThemeSelection;
use crate::error::ThemeError;
use crate::matcher::Category;

// ---------------------------------------------------------------------------
// StyleDescriptor
// ---------------------------------------------------------------------------

/// Abstract style of one category. `foreground: None` keeps the terminal's
/// default color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StyleDescriptor {
    pub foreground: Option<Color>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl StyleDescriptor {
    pub fn fg(color: Color) -> Self {
        Self {
            foreground: Some(color),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }
}

// ---------------------------------------------------------------------------
// ThemeCatalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeCatalog {
    name: String,
    entries: Vec<(String, StyleDescriptor)>,
}

impl ThemeCatalog {
    /// Build a catalog, rejecting duplicate categories.
    pub fn from_entries(
        name: impl Into<String>,
        entries: Vec<(String, StyleDescriptor)>,
    ) -> Result<Self, ThemeError> {
        let name = name.into();
        let mut seen = HashSet::new();
        for (category, _) in &entries {
            if !seen.insert(category.as_str()) {
                return Err(ThemeError::DuplicateCategory {
                    origin: name,
                    category: category.clone(),
                });
            }
            if Category::from_name(category).is_none() {
                log::warn!("theme {}: unknown category \"{}\" ignored", name, category);
            }
        }
        Ok(Self { name, entries })
    }

    /// Resolve the configured theme: a built-in or a file on disk.
    pub fn from_selection(selection: &ThemeSelection) -> Result<Self, ThemeError> {
        match selection {
            ThemeSelection::Builtin(theme) => Ok(Self::builtin(theme)),
            ThemeSelection::File(path) => Self::load(path),
        }
    }

    pub fn builtin(theme: &Theme) -> Self {
        match theme {
            Theme::Dark => Self::dark(),
            Theme::Light => Self::light(),
        }
    }

    /// Read and validate a TOML theme file.
    pub fn load(path: &Path) -> Result<Self, ThemeError> {
        let text = std::fs::read_to_string(path).map_err(|source| ThemeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&path.display().to_string(), &text)
    }

    /// Parse a TOML theme definition. `origin` names the source in errors
    /// and is the fallback theme name.
    pub fn parse(origin: &str, text: &str) -> Result<Self, ThemeError> {
        let file: ThemeFile = toml::from_str(text).map_err(|e| ThemeError::Syntax {
            origin: origin.to_string(),
            message: e.message().to_string(),
        })?;

        let mut entries = Vec::with_capacity(file.styles.len());
        for style in file.styles {
            let foreground = match style.fg {
                None => None,
                Some(value) => {
                    parse_color_value(&value).ok_or_else(|| ThemeError::UnsupportedColor {
                        origin: origin.to_string(),
                        category: style.category.clone(),
                        color: value.to_string(),
                    })?
                }
            };
            entries.push((
                style.category,
                StyleDescriptor {
                    foreground,
                    bold: style.bold,
                    italic: style.italic,
                    underline: style.underline,
                },
            ));
        }

        let catalog = Self::from_entries(file.name.unwrap_or_else(|| origin.to_string()), entries)
            .map_err(|e| match e {
                ThemeError::DuplicateCategory { category, .. } => ThemeError::DuplicateCategory {
                    origin: origin.to_string(),
                    category,
                },
                other => other,
            })?;
        Ok(catalog)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, category: &str) -> Option<&StyleDescriptor> {
        self.entries
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, style)| style)
    }

    pub fn entries(&self) -> &[(String, StyleDescriptor)] {
        &self.entries
    }

    /// Default theme, tuned for dark backgrounds.
    pub fn dark() -> Self {
        Self::builtin_from("dark", |category| match category {
            Category::Quoted => StyleDescriptor::fg(Color::DarkYellow),
            Category::Url => StyleDescriptor::fg(Color::Blue).underline(),
            Category::Date => StyleDescriptor::fg(Color::Magenta),
            Category::Time => StyleDescriptor::fg(Color::Blue),
            Category::Uuid => StyleDescriptor::fg(Color::Rgb {
                r: 135,
                g: 175,
                b: 255,
            })
            .italic(),
            Category::Ipv6 | Category::Ipv4 => StyleDescriptor::fg(Color::Cyan),
            Category::Path => StyleDescriptor::fg(Color::Green),
            Category::Error => StyleDescriptor::fg(Color::Red).bold(),
            Category::Warn => StyleDescriptor::fg(Color::Yellow).bold(),
            Category::Info => StyleDescriptor::fg(Color::DarkGreen),
            Category::Debug => StyleDescriptor::fg(Color::DarkCyan),
            Category::Trace => StyleDescriptor::fg(Color::DarkGrey),
            Category::HttpMethod => StyleDescriptor::fg(Color::DarkMagenta).bold(),
            Category::Key => StyleDescriptor::fg(Color::Grey).italic(),
            Category::Constant => StyleDescriptor::fg(Color::Red).italic(),
            Category::Hex => StyleDescriptor::fg(Color::Rgb {
                r: 255,
                g: 135,
                b: 95,
            }),
            Category::Number => StyleDescriptor::fg(Color::DarkCyan),
        })
    }

    /// Theme for light backgrounds. Avoids the bright palette half.
    pub fn light() -> Self {
        Self::builtin_from("light", |category| match category {
            Category::Quoted => StyleDescriptor::fg(Color::DarkYellow),
            Category::Url => StyleDescriptor::fg(Color::DarkBlue).underline(),
            Category::Date => StyleDescriptor::fg(Color::DarkMagenta),
            Category::Time => StyleDescriptor::fg(Color::DarkBlue),
            Category::Uuid => StyleDescriptor::fg(Color::Rgb {
                r: 0,
                g: 95,
                b: 175,
            })
            .italic(),
            Category::Ipv6 | Category::Ipv4 => StyleDescriptor::fg(Color::DarkCyan),
            Category::Path => StyleDescriptor::fg(Color::DarkGreen),
            Category::Error => StyleDescriptor::fg(Color::DarkRed).bold(),
            Category::Warn => StyleDescriptor::fg(Color::DarkYellow).bold(),
            Category::Info => StyleDescriptor::fg(Color::DarkGreen),
            Category::Debug => StyleDescriptor::fg(Color::DarkBlue),
            Category::Trace => StyleDescriptor::fg(Color::DarkGrey),
            Category::HttpMethod => StyleDescriptor::fg(Color::DarkMagenta).bold(),
            Category::Key => StyleDescriptor::fg(Color::Black).italic(),
            Category::Constant => StyleDescriptor::fg(Color::DarkRed).italic(),
            Category::Hex => StyleDescriptor::fg(Color::Rgb {
                r: 175,
                g: 95,
                b: 0,
            }),
            Category::Number => StyleDescriptor::fg(Color::DarkBlue),
        })
    }

    fn builtin_from(name: &str, style_of: impl Fn(Category) -> StyleDescriptor) -> Self {
        Self {
            name: name.to_string(),
            entries: Category::ALL
                .iter()
                .map(|c| (c.name().to_string(), style_of(*c)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// TOML representation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ThemeFile {
    name: Option<String>,
    #[serde(default)]
    styles: Vec<StyleEntry>,
}

#[derive(Debug, Deserialize)]
struct StyleEntry {
    category: String,
    fg: Option<ColorValue>,
    #[serde(default)]
    bold: bool,
    #[serde(default)]
    italic: bool,
    #[serde(default)]
    underline: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Index(i64),
    Text(String),
}

impl std::fmt::Display for ColorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorValue::Index(i) => write!(f, "{}", i),
            ColorValue::Text(s) => f.write_str(s),
        }
    }
}

/// `None` if the encoding is unsupported; `Some(None)` for the terminal
/// default color.
fn parse_color_value(value: &ColorValue) -> Option<Option<Color>> {
    match value {
        ColorValue::Index(i) => u8::try_from(*i).ok().map(|n| Some(Color::AnsiValue(n))),
        ColorValue::Text(s) => parse_color(s),
    }
}

/// Parse a color name, `#rrggbb`, or a palette index `0`..`255`.
pub fn parse_color(spec: &str) -> Option<Option<Color>> {
    let spec = spec.trim();
    if let Some(hex) = spec.strip_prefix('#') {
        return parse_hex(hex).map(Some);
    }
    if !spec.is_empty() && spec.bytes().all(|b| b.is_ascii_digit()) {
        return spec.parse::<u8>().ok().map(|n| Some(Color::AnsiValue(n)));
    }

    let name = spec.to_ascii_lowercase().replace(['-', ' '], "_");
    let color = match name.as_str() {
        "default" | "none" => return Some(None),
        "black" => Color::Black,
        "red" => Color::DarkRed,
        "green" => Color::DarkGreen,
        "yellow" => Color::DarkYellow,
        "blue" => Color::DarkBlue,
        "magenta" => Color::DarkMagenta,
        "cyan" => Color::DarkCyan,
        "white" => Color::Grey,
        "bright_black" | "gray" | "grey" | "dark_gray" | "dark_grey" => Color::DarkGrey,
        "bright_red" => Color::Red,
        "bright_green" => Color::Green,
        "bright_yellow" => Color::Yellow,
        "bright_blue" => Color::Blue,
        "bright_magenta" => Color::Magenta,
        "bright_cyan" => Color::Cyan,
        "bright_white" => Color::White,
        _ => return None,
    };
    Some(Some(color))
}

fn parse_hex(hex: &str) -> Option<Color> {
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
