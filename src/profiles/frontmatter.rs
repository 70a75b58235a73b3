//! Markdown documents with a YAML frontmatter block.
//!
//! ```text
//! ---
//! profile:
//!   name: dev
//! ---
//! Markdown body, used as the system instruction.
//! ```

use crate::models::ConfigTree;
use crate::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn frontmatter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)??---[ \t]*(?:\r?\n|\z)")
            .expect("Invalid regex")
    })
}

/// A parsed markdown document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Frontmatter as a tree (empty when the document has none).
    pub data: ConfigTree,
    /// Markdown following the frontmatter, trimmed.
    pub body: String,
}

/// Split `content` into frontmatter and body.
///
/// A document without frontmatter yields an empty tree and the whole content
/// as body. Frontmatter that is not a YAML mapping is an error.
pub fn parse(content: &str) -> Result<Document> {
    let Some(caps) = frontmatter_regex().captures(content) else {
        return Ok(Document {
            data: ConfigTree::new(),
            body: content.trim().to_string(),
        });
    };

    let yaml = caps.get(1).map_or("", |m| m.as_str());
    let end = caps.get(0).map_or(0, |m| m.end());

    let data = if yaml.trim().is_empty() {
        ConfigTree::new()
    } else {
        match serde_yaml::from_str::<Value>(yaml)? {
            Value::Object(map) => map,
            Value::Null => ConfigTree::new(),
            other => {
                return Err(Error::InvalidInput(format!(
                    "frontmatter must be a mapping, got {}",
                    other
                )));
            }
        }
    };

    Ok(Document {
        data,
        body: content[end..].trim().to_string(),
    })
}

/// Set `system.instruction` from the body unless the data already defines it.
pub fn apply_body_as_instruction(doc: &mut Document) {
    if doc.body.is_empty() {
        return;
    }
    let system = doc
        .data
        .entry("system")
        .or_insert_with(|| Value::Object(ConfigTree::new()));
    if let Some(map) = system.as_object_mut() {
        map.entry("instruction")
            .or_insert_with(|| Value::String(doc.body.clone()));
    }
}
