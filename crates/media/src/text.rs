//! Text cleanup for titles, message bodies and chat formatting.

use std::sync::LazyLock;

use regex::Regex;

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_TEXT_CHARS: usize = 2000;

const ELLIPSIS: &str = "...";

static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"[ \t]+"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| compile(r"\n{3,}"));
static URL: LazyLock<Regex> = LazyLock::new(|| compile(r"https?://\S+"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| compile(r"^(#{1,3})\s+(.+)$"));
static SUBTEXT: LazyLock<Regex> = LazyLock::new(|| compile(r"^-#\s+"));

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| compile(r"```(?:[a-zA-Z0-9_+-]*\n)?([\s\S]*?)```"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| compile(r"`([^`]+?)`"));
static SPOILER: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)\|\|(.+?)\|\|"));
static STRIKE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)~~(.+?)~~"));
static QUOTE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^>(?:>>)?\s*"));
static MASKED_LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"\[([^\]]+?)\]\([^)]+?\)"));
static BOLD_ITALIC: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)\*\*\*(.+?)\*\*\*|___(.+?)___"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\*([^*]+?)\*\*|__([^_]+?)__"));
static ITALIC_STAR: LazyLock<Regex> = LazyLock::new(|| compile(r"\*([^*]+?)\*"));
static ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(^|[^\w])_([^_]+?)_([^\w]|$)"));
static ESCAPE: LazyLock<Regex> = LazyLock::new(|| compile(r"\\([*_~`|>\\\[\]])"));

// The patterns are literals; a failure here is a bug caught by the tests.
#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

/// Collapse every whitespace run (newlines included) into one space.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` chars, ending with `...` when shortened.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str(ELLIPSIS);
    out
}

/// Single-line title, at most [`MAX_TITLE_CHARS`]. `None` when blank.
#[must_use]
pub fn normalize_title(title: &str) -> Option<String> {
    let collapsed = collapse_whitespace(title);
    if collapsed.is_empty() {
        return None;
    }
    Some(truncate_chars(&collapsed, MAX_TITLE_CHARS))
}

/// Message body cleanup: spaces collapsed, paragraph breaks kept (at most
/// one blank line), truncated to `max` chars.
#[must_use]
pub fn normalize_text(text: &str, max: usize) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| INLINE_SPACE.replace_all(line.trim(), " ").into_owned())
        .collect();
    let joined = lines.join("\n");
    let joined = BLANK_LINES.replace_all(&joined, "\n\n");
    truncate_chars(joined.trim(), max)
}

/// Remove `http(s)://` URLs (e.g. `t.co` links trailing a tweet).
#[must_use]
pub fn strip_urls(text: &str) -> String {
    collapse_whitespace(&URL.replace_all(text, " "))
}

/// Remove chat markdown (bold, italics, underline, strikethrough, spoilers,
/// code, quotes, masked links) keeping the visible text.
#[must_use]
pub fn strip_chat_formatting(text: &str) -> String {
    // Escaped markers are swapped for private-use chars so the emphasis
    // patterns cannot see them, then restored as plain characters.
    let protected = ESCAPE.replace_all(text, |caps: &regex::Captures<'_>| {
        caps[1].chars().map(protect).collect::<String>()
    });
    let mut out = CODE_BLOCK.replace_all(&protected, "$1").into_owned();
    out = INLINE_CODE.replace_all(&out, "$1").into_owned();
    out = SPOILER.replace_all(&out, "$1").into_owned();
    out = STRIKE.replace_all(&out, "$1").into_owned();
    out = QUOTE.replace_all(&out, "").into_owned();
    out = MASKED_LINK.replace_all(&out, "$1").into_owned();

    // Nested emphasis needs a few passes; stop once stable.
    for _ in 0..5 {
        let before = out.clone();
        out = BOLD_ITALIC.replace_all(&out, "$1$2").into_owned();
        out = BOLD.replace_all(&out, "$1$2").into_owned();
        out = ITALIC_STAR.replace_all(&out, "$1").into_owned();
        out = ITALIC_UNDERSCORE.replace_all(&out, "$1$2$3").into_owned();
        if out == before {
            break;
        }
    }

    out.chars().map(unprotect).collect::<String>().trim().to_string()
}

const PROTECT_BASE: u32 = 0xE000;

fn protect(c: char) -> char {
    char::from_u32(PROTECT_BASE + c as u32).unwrap_or(c)
}

fn unprotect(c: char) -> char {
    match c as u32 {
        v @ PROTECT_BASE..=0xE07F => char::from_u32(v - PROTECT_BASE).unwrap_or(c),
        _ => c,
    }
}

/// Title, subtitle and remaining body parsed from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headings {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: String,
}

/// Pull `#`..`###` headings out of a message.
///
/// The highest-level heading becomes the title, the next heading of a
/// different level the subtitle. Heading and `-#` subtext lines are removed
/// from the body.
#[must_use]
pub fn parse_headings(content: &str) -> Headings {
    let mut headings: Vec<(usize, String)> = Vec::new();
    let mut body = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(caps) = HEADING.captures(trimmed) {
            let level = caps[1].len();
            let text = strip_chat_formatting(caps[2].trim());
            if !text.is_empty() {
                headings.push((level, text));
            }
            continue;
        }
        if SUBTEXT.is_match(trimmed) {
            continue;
        }
        body.push(line);
    }

    // Stable sort keeps document order among headings of the same level.
    headings.sort_by_key(|(level, _)| *level);
    let mut iter = headings.into_iter();
    let first = iter.next();
    let subtitle = match (&first, iter.next()) {
        (Some((top, _)), Some((level, text))) if level != *top => Some(text),
        _ => None,
    };

    Headings {
        title: first.map(|(_, text)| text),
        subtitle,
        body: body.join("\n").trim().to_string(),
    }
}
