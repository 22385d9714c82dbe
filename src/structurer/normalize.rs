use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static INLINE_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());

const SHORT_TEXT_WORDS: usize = 5;

/// Clean attachment text before structuring.
///
/// Short labels (under five words, not markup) are only trimmed. Everything else
/// has tags stripped, is transliterated to ASCII, and gets inline whitespace runs
/// collapsed to a single space. Newlines survive.
pub fn normalize_text(raw: &str) -> String {
    if !looks_like_markup(raw) && raw.split_whitespace().count() < SHORT_TEXT_WORDS {
        return raw.trim().to_string();
    }

    let stripped = strip_markup(raw);
    let repaired = stripped.replace('ﬁ', "fi");
    let ascii = deunicode::deunicode(&repaired);
    INLINE_WS_RE.replace_all(&ascii, " ").trim().to_string()
}

fn looks_like_markup(text: &str) -> bool {
    text.starts_with('<')
}

/// Text content of an HTML fragment, entities decoded.
fn strip_markup(text: &str) -> String {
    let fragment = Html::parse_fragment(text);
    fragment.root_element().text().collect::<String>()
}

// ── Tests ──
