//! Pattern detectors and overlap resolution.
//!
//! Every highlightable category is a variant of the closed [`Category`]
//! enum, carrying its own detector pattern and default priority. A
//! [`MatcherPipeline`] runs an ordered list of [`Matcher`]s over one line
//! and reconciles their overlapping hits into a sorted, non-overlapping
//! list of [`Match`]es.
//!
//! Overlap policy:
//! - lower `priority` wins; equal priorities go to the matcher declared
//!   first in the pipeline
//! - the losing match is dropped whole, never trimmed
//! - matches that merely touch (`a.end == b.start`) do not overlap
//!
//! Embedded terminal escape sequences are never scanned: detectors only
//! see the visible text between them, so no match can straddle one.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::bytes::Regex;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A semantic class of text span. Discriminants follow declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Quoted,
    Url,
    Date,
    Time,
    Uuid,
    Ipv6,
    Ipv4,
    Path,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    HttpMethod,
    Key,
    Constant,
    Hex,
    Number,
}

impl Category {
    pub const COUNT: usize = 18;

    /// All categories in declaration order.
    pub const ALL: [Category; Category::COUNT] = [
        Category::Quoted,
        Category::Url,
        Category::Date,
        Category::Time,
        Category::Uuid,
        Category::Ipv6,
        Category::Ipv4,
        Category::Path,
        Category::Error,
        Category::Warn,
        Category::Info,
        Category::Debug,
        Category::Trace,
        Category::HttpMethod,
        Category::Key,
        Category::Constant,
        Category::Hex,
        Category::Number,
    ];

    /// Name used by theme definitions.
    pub fn name(self) -> &'static str {
        match self {
            Category::Quoted => "quoted",
            Category::Url => "url",
            Category::Date => "date",
            Category::Time => "time",
            Category::Uuid => "uuid",
            Category::Ipv6 => "ipv6",
            Category::Ipv4 => "ipv4",
            Category::Path => "path",
            Category::Error => "error",
            Category::Warn => "warn",
            Category::Info => "info",
            Category::Debug => "debug",
            Category::Trace => "trace",
            Category::HttpMethod => "http_method",
            Category::Key => "key",
            Category::Constant => "constant",
            Category::Hex => "hex",
            Category::Number => "number",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Default priority. Lower wins an overlap.
    pub fn priority(self) -> u8 {
        match self {
            Category::Quoted => 5,
            Category::Url => 10,
            Category::Date | Category::Time => 20,
            Category::Uuid => 30,
            Category::Ipv6 | Category::Ipv4 => 40,
            Category::Path => 50,
            Category::Error
            | Category::Warn
            | Category::Info
            | Category::Debug
            | Category::Trace
            | Category::HttpMethod => 70,
            Category::Key => 80,
            Category::Constant | Category::Hex => 90,
            Category::Number => 100,
        }
    }

    /// A short line that exercises this category, used by `loghue debug`.
    pub fn sample(self) -> &'static str {
        match self {
            Category::Quoted => "user said \"hello there\"",
            Category::Url => "fetched https://example.com/status?verbose=1",
            Category::Date => "rotated on 2024-03-09 and 09/Mar/2024",
            Category::Time => "started at 14:02:37.412Z",
            Category::Uuid => "request 550e8400-e29b-41d4-a716-446655440000",
            Category::Ipv6 => "bound to fe80::1ff:fe23:4567:890a",
            Category::Ipv4 => "client 192.168.10.24 accepted",
            Category::Path => "reading /var/log/nginx/access.log",
            Category::Error => "[ERROR] connection refused",
            Category::Warn => "[WARN] disk almost full",
            Category::Info => "[INFO] listening",
            Category::Debug => "[DEBUG] cache miss",
            Category::Trace => "[TRACE] entering handler",
            Category::HttpMethod => "POST request accepted",
            Category::Key => "retries=3 backoff=exp",
            Category::Constant => "enabled: true, parent: null",
            Category::Hex => "fault at 0x7ffd5a2c",
            Category::Number => "processed 1024 items in 3.75 s",
        }
    }

    fn regex(self) -> &'static Regex {
        &DETECTORS[self as usize]
    }

    /// Capture group holding the styled span; 0 is the whole match.
    fn group(self) -> usize {
        match self {
            Category::Key | Category::Time => 1,
            _ => 0,
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            Category::Url => {
                r#"(?i)\b(?:https?|ftp|file|wss?)://[^\s"'<>\x1b]*[^\s"'<>\x1b.,;:!?)\]]"#
            }
            Category::Date => concat!(
                r"\b[0-9]{4}-(?:0[1-9]|1[0-2])-(?:0[1-9]|[12][0-9]|3[01])",
                r"|\b[0-9]{4}/(?:0[1-9]|1[0-2])/(?:0[1-9]|[12][0-9]|3[01])",
                r"|\b(?:0[1-9]|[12][0-9]|3[01])/(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)/[0-9]{4}",
                r"|\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) +(?:[1-9]|[12][0-9]|3[01])\b",
            ),
            Category::Time => concat!(
                r"(?:^|[^0-9])(",
                r"(?:[01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9](?:[.,][0-9]{1,9})?",
                r"(?:Z|[+-](?:[01][0-9]|2[0-3]):?[0-5][0-9])?)",
            ),
            Category::Uuid => {
                r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b"
            }
            Category::Ipv6 => concat!(
                r"(?i)\b(?:[0-9a-f]{1,4}:){7}[0-9a-f]{1,4}\b",
                r"|\b(?:[0-9a-f]{1,4}:){1,6}(?::[0-9a-f]{1,4}){1,6}\b",
                r"|\b(?:[0-9a-f]{1,4}:){2,7}:",
                // Leading compression: `\b` cannot sit before ':', `\B` keeps
                // it off the tail of a word.
                r"|\B::ffff(?::0{1,4})?:(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}",
                r"(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\b",
                r"|\B::(?:[0-9a-f]{1,4}(?::[0-9a-f]{1,4}){0,6}\b)?",
            ),
            Category::Ipv4 => concat!(
                r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}",
                r"(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])",
                r"(?:/(?:3[0-2]|[12]?[0-9]))?\b",
            ),
            Category::Path => concat!(
                r"(?:~|\.{1,2})(?:/[\w.\-@+%]+)+/?",
                r"|(?:\b[\w.\-]+)?(?:/[\w.\-@+%]+){2,}/?",
            ),
            Category::Quoted => r#""(?-u:[^"\\]|\\.)*""#,
            Category::Error => {
                r"(?i)\b(?:error|err|fatal|failed|failure|critical|crit|panic|panicked|severe|emerg|emergency|alert|exception)\b"
            }
            Category::Warn => r"(?i)\b(?:warn|warning|deprecated)\b",
            Category::Info => r"(?i)\b(?:info|notice)\b",
            Category::Debug => r"(?i)\b(?:debug|dbg)\b",
            Category::Trace => r"(?i)\b(?:trace|verbose)\b",
            Category::HttpMethod => {
                r"\b(?:GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS|CONNECT|TRACE)\b"
            }
            Category::Key => r"\b([A-Za-z_][\w.\-]*)=",
            Category::Constant => {
                r"\b(?:true|false|True|False|TRUE|FALSE|null|NULL|nil|none|None|undefined)\b"
            }
            Category::Hex => r"\b0[xX][0-9a-fA-F]+\b",
            Category::Number => r"\b[0-9]+(?:\.[0-9]+)?",
        }
    }

    /// Report every non-empty hit of this category's detector in `text`.
    fn find_all(self, text: &[u8], mut hit: impl FnMut(Range<usize>)) {
        let group = self.group();
        if group == 0 {
            for m in self.regex().find_iter(text) {
                if !m.is_empty() {
                    hit(m.range());
                }
            }
        } else {
            for caps in self.regex().captures_iter(text) {
                if let Some(m) = caps.get(group).filter(|m| !m.is_empty()) {
                    hit(m.range());
                }
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Compiled once, indexed by `Category as usize`.
static DETECTORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    Category::ALL
        .iter()
        .map(|c| Regex::new(c.pattern()).expect("built-in detector pattern is valid"))
        .collect()
});

/// CSI, OSC and two-byte escape sequences.
static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("escape sequence pattern is valid")
});

// ---------------------------------------------------------------------------
// Match / Matcher
// ---------------------------------------------------------------------------

/// One detected span: `start < end <= line.len()`, offsets in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub category: Category,
}

impl Match {
    pub fn new(start: usize, end: usize, category: Category) -> Self {
        Self {
            start,
            end,
            category,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when the two spans share at least one byte.
    pub fn overlaps(&self, other: &Match) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A detector slot in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    pub category: Category,
    pub priority: u8,
}

impl Matcher {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            priority: category.priority(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

// ---------------------------------------------------------------------------
// MatcherPipeline
// ---------------------------------------------------------------------------

/// An ordered set of matchers. Order is the equal-priority tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherPipeline {
    matchers: Vec<Matcher>,
}

impl Default for MatcherPipeline {
    fn default() -> Self {
        Self::from_matchers(Category::ALL.into_iter().map(Matcher::new).collect())
    }
}

impl MatcherPipeline {
    pub fn from_matchers(matchers: Vec<Matcher>) -> Self {
        Self { matchers }
    }

    /// Pipeline over `categories` with their default priorities.
    pub fn with_categories(categories: &[Category]) -> Self {
        Self::from_matchers(categories.iter().copied().map(Matcher::new).collect())
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Detect all categories in `line` and return the surviving matches in
    /// ascending `start` order.
    pub fn scan(&self, line: &[u8]) -> Vec<Match> {
        let mut candidates = Vec::new();
        for run in visible_runs(line) {
            let text = &line[run.clone()];
            for (rank, matcher) in self.matchers.iter().enumerate() {
                matcher.category.find_all(text, |r| {
                    candidates.push(Candidate {
                        span: Match::new(run.start + r.start, run.start + r.end, matcher.category),
                        priority: matcher.priority,
                        rank,
                    });
                });
            }
        }
        resolve_overlaps(candidates)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    span: Match,
    priority: u8,
    rank: usize,
}

/// Keep the best candidate of every overlapping group.
///
/// Candidates are visited best-first (priority, then pipeline rank, then
/// position); each is kept only if it touches no span already kept. The
/// kept spans are disjoint, so the only kept span that can overlap a
/// candidate is the last one starting before the candidate ends.
fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Match> {
    candidates.sort_by_key(|c| (c.priority, c.rank, c.span.start, c.span.end));

    let mut kept: BTreeMap<usize, Match> = BTreeMap::new();
    for c in candidates {
        let clashes = kept
            .range(..c.span.end)
            .next_back()
            .is_some_and(|(_, prev)| prev.overlaps(&c.span));
        if !clashes {
            kept.insert(c.span.start, c.span);
        }
    }
    kept.into_values().collect()
}

/// Byte ranges of `line` that lie outside escape sequences.
pub fn visible_runs(line: &[u8]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut cursor = 0;
    for esc in ESCAPE_RE.find_iter(line) {
        if esc.start() > cursor {
            runs.push(cursor..esc.start());
        }
        cursor = esc.end();
    }
    if cursor < line.len() {
        runs.push(cursor..line.len());
    }
    runs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn spans<'a>(line: &'a str, matches: &[Match]) -> Vec<(Category, &'a str)> {
        matches
            .iter()
            .map(|m| (m.category, &line[m.start..m.end]))
            .collect()
    }

    fn scan(line: &str) -> Vec<(Category, &str)> {
        let matches = MatcherPipeline::default().scan(line.as_bytes());
        spans(line, &matches)
    }

    fn cand(start: usize, end: usize, category: Category, priority: u8, rank: usize) -> Candidate {
        Candidate {
            span: Match::new(start, end, category),
            priority,
            rank,
        }
    }

    // -- Category table -------------------------------------------------------

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(DETECTORS.len(), Category::COUNT);
    }

    #[test]
    fn test_discriminants_follow_declaration_order() {
        for (i, c) in Category::ALL.iter().enumerate() {
            assert_eq!(*c as usize, i);
        }
    }

    #[test]
    fn test_names_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::from_name(c.name()), Some(c));
        }
        assert_eq!(Category::from_name("sparkle"), None);
    }

    #[test]
    fn test_every_sample_detects_its_category() {
        let pipeline = MatcherPipeline::default();
        for c in Category::ALL {
            let hits = pipeline.scan(c.sample().as_bytes());
            assert!(
                hits.iter().any(|m| m.category == c),
                "sample for {} produced {:?}",
                c,
                hits
            );
        }
    }

    // -- Detectors ------------------------------------------------------------

    #[rstest]
    #[case::url("see https://example.com/a/b?x=1.", Category::Url, "https://example.com/a/b?x=1")]
    #[case::iso_date("2024-01-15T10:00:00Z started", Category::Date, "2024-01-15")]
    #[case::iso_time("2024-01-15T10:00:00Z started", Category::Time, "10:00:00Z")]
    #[case::slash_date("2024/01/15 rotated", Category::Date, "2024/01/15")]
    #[case::clf_date("[15/Jan/2024:10:00:00 +0000]", Category::Date, "15/Jan/2024")]
    #[case::clf_time("[15/Jan/2024:10:00:00 +0000]", Category::Time, "10:00:00")]
    #[case::syslog_date("Jan  5 10:00:00 host sshd", Category::Date, "Jan  5")]
    #[case::fractional_time("at 23:59:59.999 done", Category::Time, "23:59:59.999")]
    #[case::log4j_time("2024-01-15 10:00:00,123 INFO", Category::Time, "10:00:00,123")]
    #[case::uuid("id=550e8400-e29b-41d4-a716-446655440000", Category::Uuid, "550e8400-e29b-41d4-a716-446655440000")]
    #[case::ipv4("from 192.168.1.10:8080", Category::Ipv4, "192.168.1.10")]
    #[case::ipv4_cidr("route 10.0.0.0/8 added", Category::Ipv4, "10.0.0.0/8")]
    #[case::ipv6("addr 2001:db8::8a2e:370:7334 up", Category::Ipv6, "2001:db8::8a2e:370:7334")]
    #[case::ipv6_link_local("fe80::1 ready", Category::Ipv6, "fe80::1")]
    #[case::ipv6_full("2001:0db8:85a3:0000:0000:8a2e:0370:7334", Category::Ipv6, "2001:0db8:85a3:0000:0000:8a2e:0370:7334")]
    #[case::ipv6_loopback("listening on ::1 port 80", Category::Ipv6, "::1")]
    #[case::ipv6_mapped_ipv4("peer ::ffff:192.168.0.1 ok", Category::Ipv6, "::ffff:192.168.0.1")]
    #[case::ipv6_unspecified("route :: default", Category::Ipv6, "::")]
    #[case::abs_path("open /var/log/app.log failed", Category::Path, "/var/log/app.log")]
    #[case::home_path("wrote ~/notes.txt", Category::Path, "~/notes.txt")]
    #[case::relative_path("compiling src/bin/main.rs", Category::Path, "src/bin/main.rs")]
    #[case::quoted(r#"msg="hello world" x"#, Category::Quoted, r#""hello world""#)]
    #[case::quoted_escape(r#"say "a \"b\" c""#, Category::Quoted, r#""a \"b\" c""#)]
    #[case::error("[ERROR] boom", Category::Error, "ERROR")]
    #[case::warn("WARN disk", Category::Warn, "WARN")]
    #[case::info("level=info", Category::Info, "info")]
    #[case::debug("[debug] cache", Category::Debug, "debug")]
    #[case::trace("Trace: enter", Category::Trace, "Trace")]
    #[case::http_method("GET /api/v1/users HTTP/1.1", Category::HttpMethod, "GET")]
    #[case::http_path("GET /api/v1/users HTTP/1.1", Category::Path, "/api/v1/users")]
    #[case::key("user_id=42", Category::Key, "user_id")]
    #[case::constant("enabled=true", Category::Constant, "true")]
    #[case::hex("ptr 0xdeadBEEF", Category::Hex, "0xdeadBEEF")]
    #[case::decimal("took 125.5ms", Category::Number, "125.5")]
    fn test_detects(#[case] line: &str, #[case] category: Category, #[case] expected: &str) {
        let found = scan(line);
        assert!(
            found.contains(&(category, expected)),
            "expected {} {:?} in {:?}",
            category,
            expected,
            found
        );
    }

    #[rstest]
    #[case::word_suffix_digits("abc123", Category::Number)]
    #[case::version_tag("v1", Category::Number)]
    #[case::mac_address("00:1a:2b:3c:4d:5e", Category::Ipv6)]
    #[case::single_segment_path("/tmp", Category::Path)]
    #[case::http_version("HTTP/1.1", Category::Path)]
    #[case::lowercase_method("get lost", Category::HttpMethod)]
    #[case::time_inside_digit_run("build 1012:30:45", Category::Time)]
    #[case::time_after_key_digits("offset=9923:59:59", Category::Time)]
    #[case::double_colon_after_word("std::io", Category::Ipv6)]
    fn test_ignores(#[case] line: &str, #[case] category: Category) {
        let found = scan(line);
        assert!(
            found.iter().all(|(c, _)| *c != category),
            "unexpected {} in {:?}",
            category,
            found
        );
    }

    #[test]
    fn test_plain_prose_has_no_matches() {
        assert!(scan("nothing to see here").is_empty());
    }

    #[test]
    fn test_key_excludes_equals_sign() {
        let line = "retries=3";
        let found = scan(line);
        assert_eq!(found, vec![(Category::Key, "retries"), (Category::Number, "3")]);
    }

    // -- Priority between real detectors ---------------------------------------

    #[test]
    fn test_url_swallows_inner_path_and_numbers() {
        let line = "GET https://host:8443/a/b/c?id=7";
        let found = scan(line);
        assert_eq!(
            found,
            vec![
                (Category::HttpMethod, "GET"),
                (Category::Url, "https://host:8443/a/b/c?id=7"),
            ]
        );
    }

    #[test]
    fn test_quoted_wins_over_contents() {
        let line = r#"msg="took 5 ms at 10.0.0.1""#;
        let found = scan(line);
        assert_eq!(
            found,
            vec![
                (Category::Key, "msg"),
                (Category::Quoted, r#""took 5 ms at 10.0.0.1""#),
            ]
        );
    }

    #[test]
    fn test_hex_beats_number() {
        assert_eq!(scan("0x1F"), vec![(Category::Hex, "0x1F")]);
    }

    #[test]
    fn test_equal_priority_uses_declaration_order() {
        // `TRACE` is both a severity and an HTTP method, both priority 70.
        assert_eq!(scan("TRACE"), vec![(Category::Trace, "TRACE")]);

        let reversed =
            MatcherPipeline::with_categories(&[Category::HttpMethod, Category::Trace]);
        let hits = reversed.scan(b"TRACE");
        assert_eq!(spans("TRACE", &hits), vec![(Category::HttpMethod, "TRACE")]);
    }

    #[test]
    fn test_tie_break_is_stable_across_runs() {
        let pipeline = MatcherPipeline::default();
        let first = pipeline.scan(b"TRACE /x/y/z");
        for _ in 0..20 {
            assert_eq!(pipeline.scan(b"TRACE /x/y/z"), first);
        }
    }

    #[test]
    fn test_custom_priority_overrides_default() {
        let pipeline = MatcherPipeline::from_matchers(vec![
            Matcher::new(Category::Ipv4),
            Matcher::new(Category::Number).with_priority(1),
        ]);
        let hits = pipeline.scan(b"10.0.0.1");
        // "10.0" and "0.1" beat the address they overlap.
        assert!(hits.iter().all(|m| m.category == Category::Number));
        assert_eq!(hits.len(), 2);
    }

    // -- resolve_overlaps -----------------------------------------------------

    #[test]
    fn test_resolve_partial_overlap_keeps_lower_priority() {
        let kept = resolve_overlaps(vec![
            cand(0, 5, Category::Number, 100, 1),
            cand(3, 8, Category::Date, 20, 0),
        ]);
        assert_eq!(kept, vec![Match::new(3, 8, Category::Date)]);
    }

    #[test]
    fn test_resolve_containment_drops_loser_whole() {
        let kept = resolve_overlaps(vec![
            cand(0, 10, Category::Number, 100, 1),
            cand(2, 4, Category::Hex, 90, 0),
        ]);
        assert_eq!(kept, vec![Match::new(2, 4, Category::Hex)]);

        let kept = resolve_overlaps(vec![
            cand(0, 10, Category::Url, 10, 0),
            cand(2, 4, Category::Number, 100, 1),
        ]);
        assert_eq!(kept, vec![Match::new(0, 10, Category::Url)]);
    }

    #[test]
    fn test_resolve_adjacent_spans_both_survive() {
        let kept = resolve_overlaps(vec![
            cand(5, 9, Category::Number, 100, 1),
            cand(0, 5, Category::Date, 20, 0),
        ]);
        assert_eq!(
            kept,
            vec![Match::new(0, 5, Category::Date), Match::new(5, 9, Category::Number)]
        );
    }

    #[test]
    fn test_resolve_equal_priority_earlier_rank_wins() {
        let kept = resolve_overlaps(vec![
            cand(0, 5, Category::HttpMethod, 70, 13),
            cand(0, 5, Category::Trace, 70, 12),
        ]);
        assert_eq!(kept, vec![Match::new(0, 5, Category::Trace)]);
    }

    #[test]
    fn test_resolve_chain_keeps_both_ends() {
        // A(0..4) overlaps B(3..7) overlaps C(6..9); B is worst.
        let kept = resolve_overlaps(vec![
            cand(0, 4, Category::Date, 20, 0),
            cand(3, 7, Category::Number, 100, 2),
            cand(6, 9, Category::Uuid, 30, 1),
        ]);
        assert_eq!(
            kept,
            vec![Match::new(0, 4, Category::Date), Match::new(6, 9, Category::Uuid)]
        );
    }

    #[test]
    fn test_resolve_output_sorted_by_start() {
        let kept = resolve_overlaps(vec![
            cand(20, 25, Category::Number, 100, 2),
            cand(0, 3, Category::Number, 100, 2),
            cand(10, 15, Category::Url, 10, 0),
        ]);
        let starts: Vec<usize> = kept.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 10, 20]);
    }

    #[test]
    fn test_match_overlap_predicate() {
        let a = Match::new(0, 5, Category::Number);
        assert!(a.overlaps(&Match::new(4, 6, Category::Number)));
        assert!(a.overlaps(&Match::new(1, 2, Category::Number)));
        assert!(!a.overlaps(&Match::new(5, 6, Category::Number)));
        assert_eq!(a.len(), 5);
    }

    // -- Escape sequences -----------------------------------------------------

    #[test]
    fn test_visible_runs_skip_escapes() {
        let line = b"\x1b[31mERROR\x1b[0m done";
        let runs = visible_runs(line);
        assert_eq!(runs, vec![5..10, 14..19]);
    }

    #[test]
    fn test_scan_never_matches_inside_escape_sequences() {
        let line = "\x1b[1;32m2024-01-15\x1b[0m \x1b]0;title 42\x07 code 7";
        let matches = MatcherPipeline::default().scan(line.as_bytes());
        let found = spans(line, &matches);
        assert_eq!(
            found,
            vec![(Category::Date, "2024-01-15"), (Category::Number, "7")]
        );
    }

    #[test]
    fn test_match_cannot_span_an_escape() {
        // Without splitting, this would read as one quoted string.
        let line = "\"a\x1b[0mb\"";
        let matches = MatcherPipeline::default().scan(line.as_bytes());
        assert!(matches.iter().all(|m| m.category != Category::Quoted));
    }

    #[test]
    fn test_invalid_utf8_is_scanned_without_panic() {
        let line = b"\xff\xfe ERROR 42 \"\xc3\x28\"";
        let matches = MatcherPipeline::default().scan(line);
        let cats: Vec<Category> = matches.iter().map(|m| m.category).collect();
        assert_eq!(cats, vec![Category::Error, Category::Number, Category::Quoted]);
    }
}
