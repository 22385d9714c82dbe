use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:[-'’.]\w+)*").unwrap());
// Treebank-style contractions: `minister's` -> `minister` `'s`, `don't` -> `do` `n't`.
static CLITIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)(n['’]t|['’](?:s|m|d|ll|re|ve))$").unwrap());

/// English stop words (NLTK list).
const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
    "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
    "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
    "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
    "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
    "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "don't", "should", "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren",
    "aren't", "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't",
    "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn", "mightn't", "mustn",
    "mustn't", "needn", "needn't", "shan", "shan't", "shouldn", "shouldn't", "wasn", "wasn't",
    "weren", "weren't", "won", "won't", "wouldn", "wouldn't",
];

/// Lowercased words that end in a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "no", "nos", "vol", "pp", "para",
    "paras", "cl", "cll", "reg", "regs", "sch", "pt", "div", "subdiv", "ss", "sec", "art",
    "ch", "ed", "eds", "etc", "e.g", "i.e", "cf", "viz", "vs", "v", "pty", "ltd", "inc",
    "co", "corp", "vic", "cth", "nsw", "qld", "jan", "feb", "mar", "apr", "jun", "jul",
    "aug", "sep", "sept", "oct", "nov", "dec",
];

const CLOSERS: &[char] = &['"', '\'', ')', ']', '”', '’'];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Split English prose into sentences.
///
/// Boundaries come from Unicode sentence segmentation. Pieces ending in a known
/// abbreviation or a single-letter initial are joined back onto the next piece, as
/// are lines broken without a terminator. A blank line always ends a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for piece in text.split_sentence_bounds() {
        if piece.trim().is_empty() {
            if piece.contains('\n') {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
            current.push_str(piece);
            continue;
        }
        if !current.trim().is_empty() && !continues(&current) {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
        current.push_str(piece);
    }

    push_sentence(&mut sentences, &current);
    sentences
}

/// Whether a segmented piece runs on into the next one.
fn continues(sentence: &str) -> bool {
    let body = sentence.trim_end().trim_end_matches(CLOSERS);
    match body.strip_suffix('.') {
        Some(before) => is_abbreviation(before),
        None => !body.ends_with(['!', '?']),
    }
}

fn push_sentence(out: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Whether the word right before a period is an abbreviation or an initial.
fn is_abbreviation(before: &str) -> bool {
    let word = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if word.is_empty() {
        return false;
    }
    let mut letters = word.chars();
    let single_letter = matches!((letters.next(), letters.next()), (Some(c), None) if c.is_alphabetic());
    single_letter || ABBREVIATIONS.contains(&word.as_str())
}

/// Lowercased word tokens. Hyphenated and dotted forms stay whole; possessives
/// and contractions are split off as their own tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();
    for word in WORD_RE.find_iter(&lower).map(|m| m.as_str()) {
        match CLITIC_RE.captures(word) {
            Some(caps) => {
                tokens.push(caps[1].to_string());
                tokens.push(caps[2].to_string());
            }
            None => tokens.push(word.to_string()),
        }
    }
    tokens
}

/// Most frequent alphanumeric non-stop-words, highest count first.
/// Equal counts keep first-occurrence order.
pub fn key_terms(text: &str, limit: usize) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for token in tokenize(text) {
        if !token.chars().all(char::is_alphanumeric) || is_stop_word(&token) {
            continue;
        }
        let count = counts.entry(token.clone()).or_insert(0);
        if *count == 0 {
            order.push(token);
        }
        *count += 1;
    }

    // stable sort keeps first-occurrence order among ties
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(limit);
    order
}

// ── Tests ──
