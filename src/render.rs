//! Turning a line plus its matches into styled output bytes.

use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::matcher::{Match, MatcherPipeline};
use crate::scheme::{Scheme, StyleToken, RESET};

/// SGR sequences already present in the input; group 1 holds the parameters.
static SGR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)\x1b\[([0-9;:]*)m").expect("SGR pattern is valid")
});

/// A contiguous piece of the line, styled or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a [u8],
    pub style: Option<&'a StyleToken>,
}

/// Cut `line` into segments that cover it exactly once, in order.
///
/// `matches` must be sorted and non-overlapping. A match that breaks that
/// contract, or falls outside the line, is skipped and its bytes stay plain.
/// Categories without a (non-plain) token in `scheme` are left plain too.
pub fn segment<'a>(line: &'a [u8], matches: &[Match], scheme: &'a Scheme) -> Vec<Segment<'a>> {
    let mut segments = Vec::with_capacity(matches.len() * 2 + 1);
    let mut cursor = 0;

    for m in matches {
        if m.start < cursor || m.start >= m.end || m.end > line.len() {
            log::debug!("skipping invalid match {:?} at cursor {}", m, cursor);
            continue;
        }
        if m.start > cursor {
            segments.push(Segment {
                text: &line[cursor..m.start],
                style: None,
            });
        }
        segments.push(Segment {
            text: &line[m.start..m.end],
            style: scheme.get(m.category).filter(|t| !t.is_plain()),
        });
        cursor = m.end;
    }

    if cursor < line.len() {
        segments.push(Segment {
            text: &line[cursor..],
            style: None,
        });
    }
    segments
}

/// Render `line` with every styled segment wrapped in its opening sequence
/// and a reset.
///
/// When the line carries its own SGR styling, whatever was in effect is
/// re-emitted after each reset so the rest of the line keeps its look.
pub fn render(line: &[u8], matches: &[Match], scheme: &Scheme) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + matches.len() * 12);
    let mut active = Vec::new();
    for seg in segment(line, matches, scheme) {
        match seg.style {
            Some(token) => {
                out.extend_from_slice(token.open().as_bytes());
                out.extend_from_slice(seg.text);
                out.extend_from_slice(RESET.as_bytes());
                out.extend_from_slice(&active);
            }
            None => {
                out.extend_from_slice(seg.text);
                track_sgr(seg.text, &mut active);
            }
        }
    }
    out
}

/// Fold the SGR sequences in `text` into `active`, the sequences needed to
/// restore the current state from a reset.
fn track_sgr(text: &[u8], active: &mut Vec<u8>) {
    if !text.contains(&0x1b) {
        return;
    }
    for caps in SGR_RE.captures_iter(text) {
        let params = caps.get(1).map_or(&b""[..], |p| p.as_bytes());
        let resets = params.is_empty() || params.split(|b| *b == b';').next() == Some(&b"0"[..]);
        if resets {
            active.clear();
        }
        if !params.is_empty() && params.iter().any(|b| *b != b'0' && *b != b';') {
            active.extend_from_slice(&caps[0]);
        }
    }
}

/// Split a trailing `\n` or `\r\n` off a line.
pub fn split_terminator(line: &[u8]) -> (&[u8], &[u8]) {
    let cut = if line.ends_with(b"\r\n") {
        line.len() - 2
    } else if line.ends_with(b"\n") {
        line.len() - 1
    } else {
        line.len()
    };
    line.split_at(cut)
}

/// Pipeline and scheme bundled for the stream.
#[derive(Debug, Clone)]
pub struct LineRenderer {
    pipeline: MatcherPipeline,
    scheme: Scheme,
}

impl LineRenderer {
    pub fn new(pipeline: MatcherPipeline, scheme: Scheme) -> Self {
        Self { pipeline, scheme }
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Render one raw line. The terminator is copied through unstyled.
    pub fn render_line(&self, line: &[u8]) -> Vec<u8> {
        if self.scheme.is_plain() {
            return line.to_vec();
        }
        let (body, terminator) = split_terminator(line);
        let matches = self.pipeline.scan(body);
        let mut out = render(body, &matches, &self.scheme);
        out.extend_from_slice(terminator);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Category;
    use crate::scheme::ColorProfile;
    use crate::theme::{StyleDescriptor, ThemeCatalog};
    use crossterm::style::Color;
    use rstest::rstest;

    fn scheme_for(styles: &[(Category, StyleDescriptor)]) -> Scheme {
        let entries = styles
            .iter()
            .map(|(c, s)| (c.name().to_string(), *s))
            .collect();
        let catalog = ThemeCatalog::from_entries("test", entries).unwrap();
        Scheme::resolve(&catalog, ColorProfile::Ansi16)
    }

    fn concat(segments: &[Segment<'_>]) -> Vec<u8> {
        segments.iter().flat_map(|s| s.text.iter().copied()).collect()
    }

    #[test]
    fn test_segments_cover_line_exactly() {
        let line = b"2024-01-15 ERROR code=42";
        let pipeline = MatcherPipeline::default();
        let scheme = Scheme::resolve(&ThemeCatalog::dark(), ColorProfile::Ansi256);
        let matches = pipeline.scan(line);
        let segments = segment(line, &matches, &scheme);
        assert_eq!(concat(&segments), line.to_vec());
        assert!(segments.iter().all(|s| !s.text.is_empty()));
    }

    #[test]
    fn test_no_matches_is_identity() {
        let scheme = Scheme::resolve(&ThemeCatalog::dark(), ColorProfile::TrueColor);
        let line = b"nothing to see here";
        assert_eq!(render(line, &[], &scheme), line.to_vec());
        assert_eq!(segment(line, &[], &scheme).len(), 1);
    }

    #[test]
    fn test_empty_line() {
        let scheme = Scheme::resolve(&ThemeCatalog::dark(), ColorProfile::TrueColor);
        assert!(segment(b"", &[], &scheme).is_empty());
        assert!(render(b"", &[], &scheme).is_empty());
    }

    #[test]
    fn test_styled_segment_is_wrapped_and_reset() {
        let scheme = scheme_for(&[(Category::Date, StyleDescriptor::fg(Color::DarkRed).bold())]);
        let line = b"at 2024-01-15 ok";
        let matches = vec![Match::new(3, 13, Category::Date)];
        assert_eq!(
            render(line, &matches, &scheme),
            b"at \x1b[1;31m2024-01-15\x1b[0m ok".to_vec()
        );
    }

    #[test]
    fn test_adjacent_matches_stay_separate() {
        let scheme = scheme_for(&[
            (Category::Number, StyleDescriptor::fg(Color::DarkCyan)),
            (Category::Key, StyleDescriptor::fg(Color::DarkYellow)),
        ]);
        let line = b"ab12";
        let matches = vec![
            Match::new(0, 2, Category::Key),
            Match::new(2, 4, Category::Number),
        ];
        assert_eq!(
            render(line, &matches, &scheme),
            b"\x1b[33mab\x1b[0m\x1b[36m12\x1b[0m".to_vec()
        );
    }

    #[test]
    fn test_category_missing_from_scheme_stays_plain() {
        let scheme = Scheme::unstyled();
        let line = b"id 42";
        let matches = vec![Match::new(3, 5, Category::Number)];
        let segments = segment(line, &matches, &scheme);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.style.is_none()));
        assert_eq!(render(line, &matches, &scheme), line.to_vec());
    }

    #[test]
    fn test_invalid_matches_are_skipped() {
        let scheme = scheme_for(&[(Category::Number, StyleDescriptor::fg(Color::DarkCyan))]);
        let line = b"1 22 333";
        let matches = vec![
            Match::new(2, 4, Category::Number),
            // overlaps the previous one
            Match::new(3, 8, Category::Number),
            // past the end
            Match::new(5, 20, Category::Number),
        ];
        let segments = segment(line, &matches, &scheme);
        assert_eq!(concat(&segments), line.to_vec());
        assert_eq!(
            render(line, &matches, &scheme),
            b"1 \x1b[36m22\x1b[0m 333".to_vec()
        );
    }

    #[test]
    fn test_escape_sequences_are_copied_verbatim() {
        let renderer = LineRenderer::new(
            MatcherPipeline::with_categories(&[Category::Number]),
            scheme_for(&[(Category::Number, StyleDescriptor::fg(Color::DarkCyan))]),
        );
        let out = renderer.render_line(b"\x1b[31mred\x1b[0m 7\n");
        assert_eq!(out, b"\x1b[31mred\x1b[0m \x1b[36m7\x1b[0m\n".to_vec());
    }

    #[test]
    fn test_existing_color_is_restored_after_each_highlight() {
        let renderer = LineRenderer::new(
            MatcherPipeline::with_categories(&[Category::Error, Category::Number]),
            scheme_for(&[
                (Category::Error, StyleDescriptor::fg(Color::Red).bold()),
                (Category::Number, StyleDescriptor::fg(Color::DarkCyan)),
            ]),
        );
        let out = renderer.render_line(b"\x1b[31mfailed 42 later\x1b[0m done 7\n");
        assert_eq!(
            out,
            b"\x1b[31m\x1b[1;91mfailed\x1b[0m\x1b[31m \x1b[36m42\x1b[0m\x1b[31m later\x1b[0m done \x1b[36m7\x1b[0m\n"
                .to_vec()
        );
    }

    #[rstest]
    #[case::plain(b"no escapes", b"")]
    #[case::single(b"\x1b[31mred", b"\x1b[31m")]
    #[case::stacked(b"\x1b[1m\x1b[32mx", b"\x1b[1m\x1b[32m")]
    #[case::reset_clears(b"\x1b[31mred\x1b[0m", b"")]
    #[case::empty_reset_clears(b"\x1b[31mred\x1b[m", b"")]
    #[case::reset_then_color(b"\x1b[1m\x1b[0;33mx", b"\x1b[0;33m")]
    #[case::cursor_move_ignored(b"\x1b[2K\x1b[34m", b"\x1b[34m")]
    fn test_track_sgr(#[case] text: &[u8], #[case] expected: &[u8]) {
        let mut active = Vec::new();
        track_sgr(text, &mut active);
        assert_eq!(active, expected.to_vec());
    }

    #[test]
    fn test_render_line_keeps_crlf_unstyled() {
        let renderer = LineRenderer::new(
            MatcherPipeline::with_categories(&[Category::Number]),
            scheme_for(&[(Category::Number, StyleDescriptor::fg(Color::DarkCyan))]),
        );
        assert_eq!(
            renderer.render_line(b"n=5\r\n"),
            b"n=\x1b[36m5\x1b[0m\r\n".to_vec()
        );
    }

    #[test]
    fn test_render_line_plain_scheme_is_byte_identical() {
        let renderer = LineRenderer::new(
            MatcherPipeline::default(),
            Scheme::resolve(&ThemeCatalog::dark(), ColorProfile::NoColor),
        );
        let line = b"2024-01-15 ERROR \xff\xfe 10.0.0.1\n";
        assert_eq!(renderer.render_line(line), line.to_vec());
    }

    #[test]
    fn test_split_terminator() {
        assert_eq!(split_terminator(b"a\r\n"), (&b"a"[..], &b"\r\n"[..]));
        assert_eq!(split_terminator(b"a\n"), (&b"a"[..], &b"\n"[..]));
        assert_eq!(split_terminator(b"a"), (&b"a"[..], &b""[..]));
        assert_eq!(split_terminator(b"\r"), (&b"\r"[..], &b""[..]));
    }
}
