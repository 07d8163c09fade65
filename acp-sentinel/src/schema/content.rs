//! Content blocks carried by prompts, message chunks, tool calls and
//! permission requests.
//!
//! The standard kinds are `text`, `image`, `audio`, `resource_link` and
//! `resource`. Any other `type` value is preserved verbatim as
//! [`ContentBlock::Extension`] so that domain profiles can decide whether it is
//! acceptable instead of the codec rejecting it outright.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Content block kinds defined by the protocol
pub const STANDARD_CONTENT_KINDS: &[&str] = &["text", "image", "audio", "resource_link", "resource"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotations: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub data: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioContent {
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Resource contents inlined into a prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddedResourceContents {
    #[serde(rename_all = "camelCase")]
    Text {
        uri: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Blob {
        uri: String,
        blob: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    pub resource: EmbeddedResourceContents,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionContentError {
    #[error("'{0}' is a standard content kind, not an extension")]
    StandardKind(String),
    #[error("extension content '{kind}' must be a JSON object, got {found}")]
    NotAnObject { kind: String, found: Value },
}

/// A content block whose `type` is not one of the standard kinds.
///
/// The payload is the complete object as it appears on the wire, including
/// its `type` field.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionContent {
    kind: String,
    payload: Map<String, Value>,
}

impl ExtensionContent {
    /// Build an extension block from its kind and the rest of its fields.
    ///
    /// A `type` key in `fields` is overwritten with `kind`.
    pub fn new(kind: impl Into<String>, fields: Value) -> Result<Self, ExtensionContentError> {
        let kind = kind.into();
        if STANDARD_CONTENT_KINDS.contains(&kind.as_str()) {
            return Err(ExtensionContentError::StandardKind(kind));
        }
        let mut payload = match fields {
            Value::Object(map) => map,
            found => return Err(ExtensionContentError::NotAnObject { kind, found }),
        };
        payload.insert("type".to_string(), Value::String(kind.clone()));
        Ok(Self { kind, payload })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(TextContent),
    Image(ImageContent),
    Audio(AudioContent),
    ResourceLink(ResourceLink),
    Resource(EmbeddedResource),
    Extension(ExtensionContent),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextContent::new(text))
    }

    /// Wire `type` of this block
    pub fn kind(&self) -> &str {
        match self {
            ContentBlock::Text(_) => "text",
            ContentBlock::Image(_) => "image",
            ContentBlock::Audio(_) => "audio",
            ContentBlock::ResourceLink(_) => "resource_link",
            ContentBlock::Resource(_) => "resource",
            ContentBlock::Extension(ext) => ext.kind(),
        }
    }

    pub fn is_extension(&self) -> bool {
        matches!(self, ContentBlock::Extension(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

fn tagged<T: Serialize, E: serde::ser::Error>(kind: &str, inner: &T) -> Result<Value, E> {
    let mut object = match serde_json::to_value(inner).map_err(E::custom)? {
        Value::Object(map) => map,
        other => {
            return Err(E::custom(format!(
                "content block '{}' must serialize to an object, got {}",
                kind, other
            )))
        }
    };
    object.insert("type".to_string(), Value::String(kind.to_string()));
    Ok(Value::Object(object))
}

impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            ContentBlock::Text(inner) => tagged::<_, S::Error>(self.kind(), inner)?,
            ContentBlock::Image(inner) => tagged::<_, S::Error>(self.kind(), inner)?,
            ContentBlock::Audio(inner) => tagged::<_, S::Error>(self.kind(), inner)?,
            ContentBlock::ResourceLink(inner) => tagged::<_, S::Error>(self.kind(), inner)?,
            ContentBlock::Resource(inner) => tagged::<_, S::Error>(self.kind(), inner)?,
            ContentBlock::Extension(ext) => Value::Object(ext.payload.clone()),
        };
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::custom("content block is missing its 'type' field"))?
            .to_string();

        let block = match kind.as_str() {
            "text" => ContentBlock::Text(serde_json::from_value(value).map_err(D::Error::custom)?),
            "image" => ContentBlock::Image(serde_json::from_value(value).map_err(D::Error::custom)?),
            "audio" => ContentBlock::Audio(serde_json::from_value(value).map_err(D::Error::custom)?),
            "resource_link" => {
                ContentBlock::ResourceLink(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
            "resource" => {
                ContentBlock::Resource(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
            _ => ContentBlock::Extension(
                ExtensionContent::new(kind.as_str(), value).map_err(D::Error::custom)?,
            ),
        };
        Ok(block)
    }
}
