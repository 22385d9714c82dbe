pub mod normalize;
pub mod schema;
pub mod service;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::content::{ContentNode, DocumentRecord, NodeKind};
use crate::hits::RawHit;
use normalize::normalize_text;
use service::{StructureError, StructuringService};

pub const FALLBACK_TEXT_CHARS: usize = 1000;
const MAX_TREE_DEPTH: usize = 32;

/// Turns raw search hits into structured documents.
///
/// Cheap to clone; every clone shares the same structuring service.
#[derive(Clone)]
pub struct Structurer {
    service: Arc<dyn StructuringService>,
    max_depth: usize,
}

impl Structurer {
    pub fn new(service: Arc<dyn StructuringService>) -> Self {
        Self {
            service,
            max_depth: MAX_TREE_DEPTH,
        }
    }

    /// One record per attachment with text. Never fails: malformed hits yield
    /// nothing and structuring failures fall back to a single-section tree.
    pub async fn structure(&self, hit: &Value) -> Vec<DocumentRecord> {
        let hit = match RawHit::parse(hit) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Skipping unrecognised hit: {}", e);
                return Vec::new();
            }
        };

        let mut documents = Vec::new();
        for info in hit.source().attachments() {
            let Some(raw_text) = info.text() else {
                continue;
            };
            let title = hit.title_for(info);
            let metadata = hit.metadata_for(info);
            let text = normalize_text(raw_text);
            let content = self.structure_text(&text, &title).await;
            documents.push(DocumentRecord {
                content,
                title,
                metadata,
            });
        }
        documents
    }

    pub async fn structure_text(&self, text: &str, title: &str) -> ContentNode {
        match self.try_structure(text, title).await {
            Ok(tree) => {
                debug!("Structured '{}' into {} top-level nodes", title, tree.children.len());
                tree
            }
            Err(e) => {
                warn!("Structuring failed for '{}', using fallback tree: {}", title, e);
                fallback_tree(text, title)
            }
        }
    }

    async fn try_structure(&self, text: &str, title: &str) -> Result<ContentNode, StructureError> {
        let generated = self.service.generate(text, title).await?;
        schema::parse_tree(&generated, self.max_depth)
    }
}

/// `Unknown(title) > Section 1 "Full Text"` holding the first 1000 characters.
pub fn fallback_tree(text: &str, title: &str) -> ContentNode {
    let head = service::truncate_chars(text, FALLBACK_TEXT_CHARS);
    let body = if head.len() < text.len() {
        format!("{}...", head)
    } else {
        head.to_string()
    };
    ContentNode::new(NodeKind::Unknown, title).with_children(vec![ContentNode::new(
        NodeKind::Section,
        "Full Text",
    )
    .with_number("1")
    .with_text(body)])
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::flatten::flatten;
    use crate::qa::synthesize;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns a canned completion and records what it was asked.
    struct CannedService {
        reply: Result<String, ()>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl CannedService {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl StructuringService for CannedService {
        async fn generate(&self, text: &str, title: &str) -> Result<String, StructureError> {
            self.calls.lock().unwrap().push((text.to_string(), title.to_string()));
            self.reply.clone().map_err(|_| StructureError::EmptyCompletion)
        }
    }

    fn fixture(name: &str) -> Value {
        let raw = std::fs::read_to_string(format!("tests/fixtures/{}.json", name)).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    fn assert_fallback(tree: &ContentNode, title: &str) {
        assert_eq!(tree.kind, NodeKind::Unknown);
        assert_eq!(tree.title, title);
        assert_eq!(tree.children.len(), 1);
        let section = &tree.children[0];
        assert_eq!(section.kind, NodeKind::Section);
        assert_eq!(section.number.as_deref(), Some("1"));
        assert_eq!(section.title, "Full Text");
        assert!(section.is_leaf());
    }

    #[test]
    fn fallback_truncates_long_text() {
        let long = "x".repeat(1500);
        let tree = fallback_tree(&long, "Long Text");
        assert_fallback(&tree, "Long Text");
        assert_eq!(tree.children[0].text, format!("{}...", "x".repeat(1000)));

        let exact = "é".repeat(1000);
        assert_eq!(fallback_tree(&exact, "Exact").children[0].text, exact);

        assert_eq!(fallback_tree("", "Empty").children[0].text, "");
    }

    #[tokio::test]
    async fn service_failure_falls_back() {
        let structurer = Structurer::new(CannedService::failing());
        let tree = structurer.structure_text("Some text to keep.", "Failing").await;
        assert_fallback(&tree, "Failing");
        assert_eq!(tree.children[0].text, "Some text to keep.");
    }

    #[tokio::test]
    async fn malformed_output_falls_back() {
        for reply in [
            "I could not parse that document.",
            r#"{"title": "A", "type": "Act", "content": [{"type": "Section"}]}"#,
            r#"{"title": "A", "type": "Act", "content": [ truncated"#,
        ] {
            let structurer = Structurer::new(CannedService::ok(reply));
            let tree = structurer.structure_text("Body text.", "Broken").await;
            assert_fallback(&tree, "Broken");
        }
    }

    #[tokio::test]
    async fn single_attachment_hit() {
        let reply = std::fs::read_to_string("tests/fixtures/service_tree.json").unwrap();
        let service = CannedService::ok(&reply);
        let structurer = Structurer::new(service.clone());

        let docs = structurer.structure(&fixture("hit_single")).await;
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.title, "Road Safety Act 1986");
        assert_eq!(doc.metadata.document_id, "node-1204");
        assert_eq!(doc.content.kind, NodeKind::Document);
        assert_eq!(flatten(&doc.content).len(), 3);

        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (text, title) = &calls[0];
        assert_eq!(title, "Road Safety Act 1986");
        assert!(text.starts_with("Part 1 Preliminary\n1 Purposes\n"));
        assert!(!text.contains("<p>"));
    }

    #[tokio::test]
    async fn one_record_per_non_empty_attachment() {
        let structurer = Structurer::new(CannedService::failing());
        let docs = structurer.structure(&fixture("hit_multi")).await;
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Subordinate Legislation Regulations 2024", "Schedule 1"]
        );
        assert_eq!(docs[0].metadata.content_length, 124);
        assert_eq!(docs[0].metadata.legislation_type, "sr_in_force");
        assert_eq!(docs[1].content.children[0].text, "Schedule 1 Forms");
    }

    #[tokio::test]
    async fn unrecognised_hits_yield_nothing() {
        let structurer = Structurer::new(CannedService::failing());
        assert!(structurer.structure(&serde_json::json!(42)).await.is_empty());
        assert!(structurer
            .structure(&serde_json::json!({"_id": "1", "_source": {}}))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn medium_text_end_to_end() {
        let reply = r#"{
            "title": "Medium Text",
            "type": "Act",
            "content": [
                {"type": "Section", "title": "1", "text": "This is the first section of a medium-length text.", "content": []}
            ]
        }"#;
        let structurer = Structurer::new(CannedService::ok(reply));
        let tree = structurer
            .structure_text("Section 1. This is the first section of a medium-length text.", "Medium Text")
            .await;

        let sections = flatten(&tree);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].full_title, "Section  1");
        assert_eq!(sections[0].text(), "This is the first section of a medium-length text.");

        let pairs = synthesize(&sections[0], "Medium Text", "");
        // purpose, three key terms (first, section, text), provision
        assert_eq!(pairs.len(), 5);
        assert_eq!(pairs[0].question, "What is the purpose of Section  1 in the Medium Text?");
        assert_eq!(
            pairs[0].answer,
            "The purpose of Section  1 in the Medium Text is to this is the first section of a \
             medium-length text. [Source: Medium Text, Section: Section  1]"
        );
        assert_eq!(
            pairs[4].answer,
            "This is the first section of a medium-length text. [Source: Medium Text, Section: Section  1]"
        );
        assert!(pairs
            .iter()
            .all(|p| p.answer.ends_with(" [Source: Medium Text, Section: Section  1]")));
    }
}
