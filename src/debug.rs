//! `loghue debug`: show what the highlighter would do in this terminal.

use std::io::{self, Write};

use crate::config::AppConfig;
use crate::error::{Error, StreamError};
use crate::matcher::{Category, MatcherPipeline};
use crate::render::LineRenderer;
use crate::scheme::{ColorProfile, Scheme};
use crate::theme::ThemeCatalog;

/// Print the report for `config` to stdout.
pub fn run_debug(config: &AppConfig) -> Result<(), Error> {
    let catalog = ThemeCatalog::from_selection(&config.theme)?;
    let profile = ColorProfile::detect(config.color);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(config, &catalog, profile, &mut out).map_err(StreamError::Output)?;
    Ok(())
}

/// Effective settings, then one rendered sample line per category.
pub fn write_report<W: Write>(
    config: &AppConfig,
    catalog: &ThemeCatalog,
    profile: ColorProfile,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "loghue {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "theme:          {} ({})", catalog.name(), config.theme)?;
    writeln!(out, "color mode:     {}", config.color)?;
    writeln!(out, "color profile:  {}", profile)?;
    writeln!(out, "follow:         {}", config.follow)?;
    writeln!(
        out,
        "poll interval:  {}ms..{}ms",
        config.follow_mode.poll_interval_ms, config.follow_mode.max_poll_interval_ms
    )?;
    writeln!(out, "on rotate:      {}", config.follow_mode.on_rotate)?;
    writeln!(out)?;

    let renderer = LineRenderer::new(MatcherPipeline::default(), Scheme::resolve(catalog, profile));
    for category in Category::ALL {
        let rendered = renderer.render_line(category.sample().as_bytes());
        write!(out, "{:<12} ", category.name())?;
        out.write_all(&rendered)?;
        writeln!(out)?;
    }
    out.flush()
}
