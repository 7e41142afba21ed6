//! Color schemes: a theme catalog resolved against the terminal's color
//! capability.
//!
//! Resolution happens once at startup. The stream only ever looks up
//! precomputed [`StyleToken`]s, so rendering never touches the environment.

use std::collections::BTreeMap;
use std::io::{self, IsTerminal};

use crossterm::style::Color;

use crate::cli::ColorMode;
use crate::matcher::Category;
use crate::theme::{StyleDescriptor, ThemeCatalog};

/// SGR reset. Closes every styled segment.
pub const RESET: &str = "\x1b[0m";

// ---------------------------------------------------------------------------
// ColorProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColorProfile {
    NoColor,
    Ansi16,
    Ansi256,
    TrueColor,
}

impl ColorProfile {
    /// Inspect stdout and the environment.
    pub fn detect(mode: ColorMode) -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self::from_environment(
            mode,
            io::stdout().is_terminal(),
            no_color,
            crossterm::style::available_color_count(),
        )
    }

    /// Pure half of [`ColorProfile::detect`].
    pub fn from_environment(
        mode: ColorMode,
        is_terminal: bool,
        no_color: bool,
        color_count: u16,
    ) -> Self {
        match mode {
            ColorMode::Never => return ColorProfile::NoColor,
            ColorMode::Auto if !is_terminal || no_color => return ColorProfile::NoColor,
            ColorMode::Auto | ColorMode::Always => {}
        }
        if color_count >= u16::MAX {
            ColorProfile::TrueColor
        } else if color_count >= 256 {
            ColorProfile::Ansi256
        } else {
            ColorProfile::Ansi16
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorProfile::NoColor => "none",
            ColorProfile::Ansi16 => "ansi16",
            ColorProfile::Ansi256 => "ansi256",
            ColorProfile::TrueColor => "truecolor",
        }
    }
}

impl std::fmt::Display for ColorProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// StyleToken
// ---------------------------------------------------------------------------

/// A ready-to-emit SGR opening sequence. Empty for plain text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleToken {
    open: String,
}

impl StyleToken {
    pub fn plain() -> Self {
        Self::default()
    }

    fn from_params(params: &[String]) -> Self {
        if params.is_empty() {
            return Self::plain();
        }
        Self {
            open: format!("\x1b[{}m", params.join(";")),
        }
    }

    pub fn is_plain(&self) -> bool {
        self.open.is_empty()
    }

    pub fn open(&self) -> &str {
        &self.open
    }
}

// ---------------------------------------------------------------------------
// Scheme
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    profile: ColorProfile,
    tokens: BTreeMap<Category, StyleToken>,
}

impl Scheme {
    /// Resolve every category. Categories the catalog lacks get a plain
    /// token; under [`ColorProfile::NoColor`] every token is plain.
    pub fn resolve(catalog: &ThemeCatalog, profile: ColorProfile) -> Self {
        let tokens = Category::ALL
            .iter()
            .map(|category| {
                let style = catalog.get(category.name()).copied().unwrap_or_default();
                (*category, resolve_style(&style, profile))
            })
            .collect();
        Self { profile, tokens }
    }

    /// A scheme with no entries at all.
    pub fn unstyled() -> Self {
        Self {
            profile: ColorProfile::NoColor,
            tokens: BTreeMap::new(),
        }
    }

    pub fn get(&self, category: Category) -> Option<&StyleToken> {
        self.tokens.get(&category)
    }

    pub fn profile(&self) -> ColorProfile {
        self.profile
    }

    /// True when rendering through this scheme can never add escapes.
    pub fn is_plain(&self) -> bool {
        self.tokens.values().all(StyleToken::is_plain)
    }
}

fn resolve_style(style: &StyleDescriptor, profile: ColorProfile) -> StyleToken {
    if profile == ColorProfile::NoColor {
        return StyleToken::plain();
    }
    let mut params = Vec::new();
    if style.bold {
        params.push("1".to_string());
    }
    if style.italic {
        params.push("3".to_string());
    }
    if style.underline {
        params.push("4".to_string());
    }
    if let Some(fg) = style.foreground.and_then(|c| foreground_sgr(c, profile)) {
        params.push(fg);
    }
    StyleToken::from_params(&params)
}

fn foreground_sgr(color: Color, profile: ColorProfile) -> Option<String> {
    match color {
        Color::Reset => None,
        Color::Rgb { r, g, b } => Some(match profile {
            ColorProfile::TrueColor => format!("38;2;{};{};{}", r, g, b),
            ColorProfile::Ansi256 => format!("38;5;{}", rgb_to_ansi256(r, g, b)),
            _ => basic_sgr(nearest_basic(r, g, b)),
        }),
        Color::AnsiValue(n) if n < 16 => Some(basic_sgr(n)),
        Color::AnsiValue(n) => Some(match profile {
            ColorProfile::Ansi16 | ColorProfile::NoColor => {
                let (r, g, b) = ansi256_to_rgb(n);
                basic_sgr(nearest_basic(r, g, b))
            }
            _ => format!("38;5;{}", n),
        }),
        named => basic_index(named).map(basic_sgr),
    }
}

fn basic_index(color: Color) -> Option<u8> {
    let index = match color {
        Color::Black => 0,
        Color::DarkRed => 1,
        Color::DarkGreen => 2,
        Color::DarkYellow => 3,
        Color::DarkBlue => 4,
        Color::DarkMagenta => 5,
        Color::DarkCyan => 6,
        Color::Grey => 7,
        Color::DarkGrey => 8,
        Color::Red => 9,
        Color::Green => 10,
        Color::Yellow => 11,
        Color::Blue => 12,
        Color::Magenta => 13,
        Color::Cyan => 14,
        Color::White => 15,
        _ => return None,
    };
    Some(index)
}

fn basic_sgr(index: u8) -> String {
    if index < 8 {
        (30 + index).to_string()
    } else {
        (90 + index - 8).to_string()
    }
}

// ---------------------------------------------------------------------------
// Palette math
// ---------------------------------------------------------------------------

/// xterm's default 16-color palette.
const BASIC_PALETTE: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

fn distance((r1, g1, b1): (u8, u8, u8), (r2, g2, b2): (u8, u8, u8)) -> u32 {
    let d = |a: u8, b: u8| (i32::from(a) - i32::from(b)).unsigned_abs().pow(2);
    d(r1, r2) + d(g1, g2) + d(b1, b2)
}

fn nearest_cube_level(v: u8) -> usize {
    CUBE_LEVELS
        .iter()
        .enumerate()
        .min_by_key(|(_, level)| (i32::from(**level) - i32::from(v)).unsigned_abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Nearest xterm-256 index, choosing between the 6x6x6 cube and the grey ramp.
pub(crate) fn rgb_to_ansi256(r: u8, g: u8, b: u8) -> u8 {
    let (ri, gi, bi) = (nearest_cube_level(r), nearest_cube_level(g), nearest_cube_level(b));
    let cube_rgb = (CUBE_LEVELS[ri], CUBE_LEVELS[gi], CUBE_LEVELS[bi]);
    let cube_index = 16 + 36 * ri + 6 * gi + bi;

    let avg = (u32::from(r) + u32::from(g) + u32::from(b)) / 3;
    let grey_step = if avg < 8 { 0 } else { ((avg - 8 + 5) / 10).min(23) };
    let grey_value = (8 + 10 * grey_step) as u8;
    let grey_index = 232 + grey_step as usize;

    let target = (r, g, b);
    if distance(target, (grey_value, grey_value, grey_value)) < distance(target, cube_rgb) {
        grey_index as u8
    } else {
        cube_index as u8
    }
}

pub(crate) fn ansi256_to_rgb(n: u8) -> (u8, u8, u8) {
    match n {
        0..=15 => BASIC_PALETTE[n as usize],
        16..=231 => {
            let i = (n - 16) as usize;
            (CUBE_LEVELS[i / 36], CUBE_LEVELS[(i / 6) % 6], CUBE_LEVELS[i % 6])
        }
        _ => {
            let v = 8 + 10 * (n - 232);
            (v, v, v)
        }
    }
}

/// Nearest of the 16 basic colors, as a palette index.
pub(crate) fn nearest_basic(r: u8, g: u8, b: u8) -> u8 {
    BASIC_PALETTE
        .iter()
        .enumerate()
        .min_by_key(|(_, rgb)| distance((r, g, b), **rgb))
        .map(|(i, _)| i as u8)
        .unwrap_or(7)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
