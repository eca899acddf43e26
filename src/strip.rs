//! Markup stripping: XHTML content document -> normalized plain text.
//!
//! Four passes, in order:
//! 1. literal break insertion from an ordered (pattern, replacement) table,
//! 2. a single forward scan that drops tags and script/style bodies,
//! 3. decoding of six named entities,
//! 4. per-line trimming with empty lines removed.

use std::borrow::Cow;

/// Break rules applied before tag removal. Order matters: replacements run in sequence.
const DEFAULT_BREAKS: &[(&str, &str)] = &[
    ("</p>", "</p>\n"),
    ("<br>", "\n"),
    ("<br/>", "\n"),
    ("<br />", "\n"),
    ("</div>", "</div>\n"),
    ("</h1>", "</h1>\n\n"),
    ("</h2>", "</h2>\n\n"),
    ("</h3>", "</h3>\n\n"),
    ("</h4>", "</h4>\n\n"),
];

/// Entities decoded after stripping, in replacement order.
const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

const SCRIPT_OPEN: &[u8] = b"<script";
const SCRIPT_CLOSE: &[u8] = b"</script>";
const STYLE_OPEN: &[u8] = b"<style";
const STYLE_CLOSE: &[u8] = b"</style>";

/// One literal substitution applied to the raw markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakRule {
    pub pattern: Cow<'static, str>,
    pub replacement: Cow<'static, str>,
}

/// Scanner position relative to markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Outside any tag; bytes are emitted.
    Text,
    /// Between `<` and the next `>`. Tag names are not validated. A skipped
    /// `</script>` or `</style>` also lands here, so text up to the next `>` is hidden.
    Tag,
    /// After `<script`, until `</script>`.
    ScriptBody,
    /// After `<style`, until `</style>`.
    StyleBody,
}

/// Markup-to-text converter holding the break table.
///
/// `Stripper::default()` uses the built-in table; extra closing tags can be added
/// with [`with_line_break`](Stripper::with_line_break) and
/// [`with_paragraph_break`](Stripper::with_paragraph_break).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripper {
    rules: Vec<BreakRule>,
}

impl Default for Stripper {
    fn default() -> Self {
        let rules = DEFAULT_BREAKS
            .iter()
            .map(|&(pattern, replacement)| BreakRule {
                pattern: Cow::Borrowed(pattern),
                replacement: Cow::Borrowed(replacement),
            })
            .collect();
        Self { rules }
    }
}

impl Stripper {
    pub fn rules(&self) -> &[BreakRule] {
        &self.rules
    }

    /// Append a rule: `pattern` is replaced by `replacement` before tags are removed.
    pub fn with_rule(
        mut self,
        pattern: impl Into<Cow<'static, str>>,
        replacement: impl Into<Cow<'static, str>>,
    ) -> Self {
        let pattern = pattern.into();
        if !pattern.is_empty() {
            self.rules.push(BreakRule {
                pattern,
                replacement: replacement.into(),
            });
        }
        self
    }

    /// Follow `closing_tag` (e.g. `</li>`) with a newline.
    pub fn with_line_break(self, closing_tag: &str) -> Self {
        let replacement = format!("{}\n", closing_tag);
        self.with_rule(closing_tag.to_string(), replacement)
    }

    /// Follow `closing_tag` (e.g. `</h5>`) with a blank line.
    pub fn with_paragraph_break(self, closing_tag: &str) -> Self {
        let replacement = format!("{}\n\n", closing_tag);
        self.with_rule(closing_tag.to_string(), replacement)
    }

    /// Convert one document's markup to normalized plain text.
    pub fn strip(&self, markup: &str) -> String {
        let mut html = markup.to_string();
        for rule in &self.rules {
            if html.contains(&*rule.pattern) {
                html = html.replace(&*rule.pattern, &rule.replacement);
            }
        }
        let text = remove_tags(&html);
        let text = decode_entities(&text);
        collapse_lines(&text)
    }
}

/// Strip with the default break table.
pub fn strip_markup(markup: &str) -> String {
    Stripper::default().strip(markup)
}

/// Case-insensitive check for `marker` at byte offset `at`.
fn marker_at(bytes: &[u8], at: usize, marker: &[u8]) -> bool {
    bytes
        .get(at..at + marker.len())
        .is_some_and(|s| s.eq_ignore_ascii_case(marker))
}

/// Emit only the bytes scanned in `Text`. Every state change happens on an ASCII byte,
/// so multi-byte characters are kept or dropped whole.
fn remove_tags(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut state = ScanState::Text;
    let mut i = 0;

    while i < bytes.len() {
        match state {
            ScanState::Text | ScanState::Tag => match bytes[i] {
                b'<' => {
                    if marker_at(bytes, i, SCRIPT_OPEN) {
                        state = ScanState::ScriptBody;
                    } else if marker_at(bytes, i, SCRIPT_CLOSE) {
                        state = ScanState::Tag;
                        i += SCRIPT_CLOSE.len();
                        continue;
                    } else if marker_at(bytes, i, STYLE_OPEN) {
                        state = ScanState::StyleBody;
                    } else if marker_at(bytes, i, STYLE_CLOSE) {
                        state = ScanState::Tag;
                        i += STYLE_CLOSE.len();
                        continue;
                    } else {
                        state = ScanState::Tag;
                    }
                }
                b'>' => state = ScanState::Text,
                b if state == ScanState::Text => out.push(b),
                _ => {}
            },
            ScanState::ScriptBody => {
                if marker_at(bytes, i, SCRIPT_CLOSE) {
                    state = ScanState::Tag;
                    i += SCRIPT_CLOSE.len();
                    continue;
                }
            }
            ScanState::StyleBody => {
                if marker_at(bytes, i, STYLE_CLOSE) {
                    state = ScanState::Tag;
                    i += STYLE_CLOSE.len();
                    continue;
                }
            }
        }
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn decode_entities(text: &str) -> String {
    let mut s = text.to_string();
    for (entity, literal) in ENTITIES {
        if s.contains(entity) {
            s = s.replace(entity, literal);
        }
    }
    s
}

/// Trim every line and drop the empty ones.
fn collapse_lines(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
