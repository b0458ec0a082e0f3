//! Front matter extraction for manuscript documents.
//!
//! A document carries metadata in one of two places:
//!
//! 1. A sibling YAML file next to it (`one.yml`, `one.yaml` or `one.md.yml`)
//! 2. An inline block at the very top of the document:
//!
//! ```text
//! ---
//! id: opening
//! title: The Opening
//! ---
//! ```
//!
//! The closing fence may also be `...`. A sibling file wins wholesale over
//! the inline block. Nothing in this module returns an error: unreadable or
//! malformed metadata is logged and reported as "no metadata".

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::path::with_appended_extension;

/// A parsed metadata value.
///
/// Mappings keep their authoring order. When a key repeats, the last value
/// wins and the key keeps the position of its first occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metadata {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Metadata>),
    Mapping(IndexMap<String, Metadata>),
}

impl Metadata {
    /// Look up a key in a mapping value.
    pub fn get(&self, key: &str) -> Option<&Metadata> {
        match self {
            Metadata::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Metadata::String(s) => Some(s),
            _ => None,
        }
    }

    /// The declared `id`, if this is a mapping with a scalar `id` entry.
    ///
    /// Numbers are accepted and stringified (`id: 7` declares `"7"`).
    pub fn id(&self) -> Option<String> {
        let id = match self.get("id")? {
            Metadata::String(s) => s.trim().to_string(),
            Metadata::Integer(n) => n.to_string(),
            Metadata::Float(n) => n.to_string(),
            _ => return None,
        };
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    fn into_key(self) -> String {
        match self {
            Metadata::String(s) => s,
            Metadata::Null => "null".to_string(),
            Metadata::Bool(b) => b.to_string(),
            Metadata::Integer(n) => n.to_string(),
            Metadata::Float(n) => n.to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MetadataVisitor)
    }
}

struct MetadataVisitor;

impl<'de> Visitor<'de> for MetadataVisitor {
    type Value = Metadata;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Metadata, E> {
        Ok(Metadata::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Metadata, E> {
        Ok(Metadata::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Metadata, E> {
        Ok(i64::try_from(v)
            .map(Metadata::Integer)
            .unwrap_or(Metadata::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Metadata, E> {
        Ok(Metadata::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Metadata, E> {
        Ok(Metadata::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Metadata, E> {
        Ok(Metadata::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Metadata, E> {
        Ok(Metadata::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Metadata, E> {
        Ok(Metadata::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Metadata, D::Error>
    where
        D: Deserializer<'de>,
    {
        Metadata::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Metadata, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Metadata::Sequence(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Metadata, A::Error>
    where
        A: MapAccess<'de>,
    {
        // Plain insert: a repeated key overwrites instead of failing
        let mut entries = IndexMap::new();
        while let Some((key, value)) = map.next_entry::<Metadata, Metadata>()? {
            entries.insert(key.into_key(), value);
        }
        Ok(Metadata::Mapping(entries))
    }
}

/// Split a leading front matter block into `(interior, rest)`.
///
/// The text must start with a `---` line; the block ends at the first line
/// that is exactly `---` or `...`.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let body = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if bare == "---" || bare == "..." {
            return Some((&body[..offset], &body[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Return the trimmed interior of the leading front matter block, or `""`
/// when the text has no well-formed block at its very start.
pub fn extract(text: &str) -> &str {
    split_front_matter(text)
        .map(|(interior, _)| interior.trim())
        .unwrap_or("")
}

/// Return the document text with its leading front matter block removed.
pub fn strip_front_matter(text: &str) -> &str {
    split_front_matter(text)
        .map(|(_, rest)| rest)
        .unwrap_or(text)
}

/// Parse a raw metadata block. Empty input and malformed YAML both yield
/// `None`.
pub fn parse(raw: &str) -> Option<Metadata> {
    if raw.trim().is_empty() {
        return None;
    }
    match serde_yaml::from_str::<Metadata>(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(error = %err, "metadata block did not parse");
            None
        }
    }
}

/// Candidate sibling metadata files for a document, in lookup order.
pub fn sibling_candidates(path: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(stem) = path.file_stem() {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        for ext in ["yml", "yaml"] {
            let mut name = stem.to_owned();
            name.push(".");
            name.push(ext);
            candidates.push(dir.join(name));
        }
    }
    candidates.push(with_appended_extension(path, ".yml"));
    candidates.retain(|candidate| candidate != path);
    candidates.dedup();
    candidates
}

/// Read the metadata for a document, preferring a sibling YAML file over an
/// inline front matter block.
pub fn extract_metadata(path: &Path) -> Option<Metadata> {
    for sibling in sibling_candidates(path) {
        if !sibling.is_file() {
            continue;
        }
        match fs::read_to_string(&sibling) {
            Ok(text) => {
                // A sibling file may itself be fenced
                let raw = match extract(&text) {
                    "" => text.as_str(),
                    fenced => fenced,
                };
                if let Some(value) = parse(raw) {
                    return Some(value);
                }
                warn!(path = %sibling.display(), "ignoring unparsable metadata file");
            }
            Err(err) => {
                warn!(path = %sibling.display(), error = %err, "failed to read metadata file");
            }
        }
    }

    match fs::read_to_string(path) {
        Ok(text) => parse(extract(&text)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read document");
            None
        }
    }
}
