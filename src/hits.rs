//! Typed view over raw search hits.
//!
//! Hits arrive as loosely shaped Elasticsearch documents: attachments may be a
//! single object or a list, and most source fields may be a scalar or an array
//! of scalars. Everything is checked here so nothing past the structurer has to
//! deal with untyped JSON.

use serde::Deserialize;
use serde_json::Value;

use crate::content::Metadata;

/// A JSON scalar rendered as text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Integer(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Scalar::Integer(n) => u64::try_from(*n).ok(),
            Scalar::Float(n) if *n >= 0.0 => Some(*n as u64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A source field that may hold one value or an array of values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Many(Vec<Option<Scalar>>),
    One(Scalar),
}

impl Field {
    /// The value itself, or the first element of an array.
    pub fn first(&self) -> Option<String> {
        match self {
            Field::One(s) => Some(s.to_text()),
            Field::Many(items) => items.first().cloned().flatten().map(|s| s.to_text()),
        }
    }
}

fn first_text(field: &Option<Field>) -> String {
    field.as_ref().and_then(Field::first).unwrap_or_default()
}

fn scalar_text(value: &Option<Scalar>) -> String {
    value.as_ref().map(Scalar::to_text).unwrap_or_default()
}

/// Attachment payload as indexed by the search backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub content: Option<String>,
    pub title: Option<String>,
    pub date: Option<Scalar>,
    pub author: Option<Scalar>,
    pub language: Option<Scalar>,
    pub content_type: Option<Scalar>,
    pub content_length: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttachmentInfo {
    pub filename: Option<Scalar>,
    pub attachment: Option<Attachment>,
}

impl AttachmentInfo {
    /// Attachment text, when present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.attachment
            .as_ref()
            .and_then(|a| a.content.as_deref())
            .filter(|c| !c.is_empty())
    }
}

/// `es_attachment` is either one embedded attachment or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Attachments {
    Many(Vec<AttachmentInfo>),
    One(AttachmentInfo),
}

impl Attachments {
    pub fn as_slice(&self) -> &[AttachmentInfo] {
        match self {
            Attachments::Many(items) => items,
            Attachments::One(item) => std::slice::from_ref(item),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HitSource {
    pub title: Option<Field>,
    #[serde(rename = "type")]
    pub legislation_type: Option<Field>,
    pub field_legislation_year: Option<Field>,
    pub field_act_sr_number: Option<Field>,
    pub field_in_force_effective_date: Option<Field>,
    pub field_in_force_version_number: Option<Field>,
    pub es_attachment: Option<Attachments>,
}

impl HitSource {
    pub fn attachments(&self) -> &[AttachmentInfo] {
        self.es_attachment
            .as_ref()
            .map(Attachments::as_slice)
            .unwrap_or(&[])
    }

    pub fn title(&self) -> String {
        first_text(&self.title)
    }
}

/// One search hit: either an `{_id, _source}` envelope or a bare source document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id", default)]
    id: Option<Scalar>,
    #[serde(rename = "_source", default)]
    envelope: Option<HitSource>,
    #[serde(flatten)]
    inline: HitSource,
}

impl RawHit {
    pub fn parse(value: &Value) -> Result<Self, serde_json::Error> {
        RawHit::deserialize(value)
    }

    pub fn source(&self) -> &HitSource {
        self.envelope.as_ref().unwrap_or(&self.inline)
    }

    pub fn document_id(&self) -> String {
        scalar_text(&self.id)
    }

    /// Attachment title, falling back to the hit's own title.
    pub fn title_for(&self, info: &AttachmentInfo) -> String {
        info.attachment
            .as_ref()
            .and_then(|a| a.title.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.source().title())
    }

    pub fn metadata_for(&self, info: &AttachmentInfo) -> Metadata {
        let source = self.source();
        let attachment = info.attachment.clone().unwrap_or_default();
        Metadata {
            title: self.title_for(info),
            document_id: self.document_id(),
            filename: scalar_text(&info.filename),
            date: scalar_text(&attachment.date),
            author: scalar_text(&attachment.author),
            language: scalar_text(&attachment.language),
            content_type: scalar_text(&attachment.content_type),
            content_length: attachment
                .content_length
                .as_ref()
                .and_then(Scalar::to_u64)
                .unwrap_or(0),
            legislation_type: first_text(&source.legislation_type),
            legislation_year: first_text(&source.field_legislation_year),
            act_number: first_text(&source.field_act_sr_number),
            effective_date: first_text(&source.field_in_force_effective_date),
            version_number: first_text(&source.field_in_force_version_number),
        }
    }
}

// ── Tests ──
