pub mod text;

use serde::{Deserialize, Serialize};

use crate::content::flatten::{flatten, FlattenedSection};
use crate::content::DocumentRecord;

const KEY_TERM_CANDIDATES: usize = 10;
const KEY_TERM_QUESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaSource {
    pub document_id: String,
    pub section_title: String,
    pub document_title: String,
}

/// One generated training pair, persisted as a JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub source: QaSource,
}

impl QaPair {
    fn new(question: String, answer: &str, section_title: &str, document_title: &str, document_id: &str) -> Self {
        Self {
            question,
            answer: format!("{} [Source: {}, Section: {}]", answer, document_title, section_title),
            source: QaSource {
                document_id: document_id.to_string(),
                section_title: section_title.to_string(),
                document_title: document_title.to_string(),
            },
        }
    }
}

/// Purpose, key-term (up to three) and provision pairs for one section.
/// Sections without text produce nothing.
pub fn synthesize(section: &FlattenedSection<'_>, document_title: &str, document_id: &str) -> Vec<QaPair> {
    let body = section.text();
    if body.trim().is_empty() {
        return Vec::new();
    }
    let sentences = text::split_sentences(body);
    let Some(first) = sentences.first() else {
        return Vec::new();
    };

    let title = section.full_title.as_str();
    let pair = |question: String, answer: &str| QaPair::new(question, answer, title, document_title, document_id);
    let mut pairs = Vec::with_capacity(2 + KEY_TERM_QUESTIONS);

    pairs.push(pair(
        format!("What is the purpose of {} in the {}?", title, document_title),
        &format!(
            "The purpose of {} in the {} is to {}",
            title,
            document_title,
            first.to_lowercase()
        ),
    ));

    for term in text::key_terms(body, KEY_TERM_CANDIDATES)
        .iter()
        .take(KEY_TERM_QUESTIONS)
    {
        pairs.push(pair(
            format!(
                "How does the {} define or describe '{}' in {}?",
                document_title, term, title
            ),
            sentence_with_term(&sentences, term),
        ));
    }

    let provision = sentences.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
    pairs.push(pair(
        format!(
            "What is the main provision stated in {} of the {}?",
            title, document_title
        ),
        &provision,
    ));

    pairs
}

/// First sentence mentioning `term`, case-insensitively; otherwise the first sentence.
fn sentence_with_term<'a>(sentences: &'a [String], term: &str) -> &'a str {
    let needle = term.to_lowercase();
    sentences
        .iter()
        .find(|s| s.to_lowercase().contains(&needle))
        .or_else(|| sentences.first())
        .map(String::as_str)
        .unwrap_or("")
}

/// All pairs for a document, in section order.
pub fn synthesize_document(doc: &DocumentRecord) -> Vec<QaPair> {
    let title = doc.display_title();
    flatten(&doc.content)
        .iter()
        .flat_map(|section| synthesize(section, title, &doc.metadata.document_id))
        .collect()
}

// ── Tests ──
