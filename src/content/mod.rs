pub mod flatten;

use serde::{Deserialize, Serialize};

/// Structural role of a node in a legal document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    Part,
    Division,
    Section,
    Unknown,
}

impl NodeKind {
    /// Lenient mapping from the free-form `type` labels emitted by the structuring service.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "document" => NodeKind::Document,
            "part" => NodeKind::Part,
            "division" => NodeKind::Division,
            "section" => NodeKind::Section,
            _ => NodeKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Document => "Document",
            NodeKind::Part => "Part",
            NodeKind::Division => "Division",
            NodeKind::Section => "Section",
            NodeKind::Unknown => "Unknown",
        }
    }

    /// Part, Division and Section nodes are the units QA pairs are generated for.
    pub fn is_section(&self) -> bool {
        matches!(self, NodeKind::Part | NodeKind::Division | NodeKind::Section)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document or one structural unit inside it. Each node owns its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "content", default)]
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    pub fn new(kind: NodeKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            number: None,
            title: title.into(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_children(mut self, children: Vec<ContentNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `"<kind> <number> <title>"`, outer whitespace trimmed. A missing number
    /// renders as empty, leaving two spaces between kind and title.
    pub fn label(&self) -> String {
        let number = self.number.as_deref().unwrap_or("");
        format!("{} {} {}", self.kind, number, self.title).trim().to_string()
    }
}

/// Source metadata carried alongside each structured document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: String,
    pub document_id: String,
    pub filename: String,
    pub date: String,
    pub author: String,
    pub language: String,
    pub content_type: String,
    pub content_length: u64,
    pub legislation_type: String,
    pub legislation_year: String,
    pub act_number: String,
    pub effective_date: String,
    pub version_number: String,
}

/// One structured attachment of a search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub content: ContentNode,
    pub title: String,
    pub metadata: Metadata,
}

impl DocumentRecord {
    /// Title used in generated questions; never empty.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Document"
        } else {
            &self.title
        }
    }
}

// ── Tests ──
