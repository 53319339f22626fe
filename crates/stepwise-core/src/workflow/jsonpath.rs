//! Minimal JSON path subset used by transition rules.
//!
//! Supports:
//! - `$.a.b.c` (dot notation)
//! - `$.a[0].b` (array index)
//! - `$` (the whole document)
//!
//! Filters, wildcards and slices are not supported.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// A parsed path. Parsing happens once, when the rule is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidPath {
            path: path.to_string(),
            message: message.to_string(),
        };

        let rest = if path == "$" {
            ""
        } else if let Some(stripped) = path.strip_prefix("$.") {
            stripped
        } else {
            return Err(invalid("must start with '$.'"));
        };

        let mut segments = Vec::new();
        if rest.is_empty() {
            return Ok(Self {
                raw: path.to_string(),
                segments,
            });
        }

        for part in rest.split('.') {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }

            // field, field[0], field[0][1]
            let (field, mut indexes) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if !field.is_empty() {
                segments.push(Segment::Field(field.to_string()));
            } else if indexes.is_empty() {
                return Err(invalid("empty segment"));
            }

            while !indexes.is_empty() {
                let close = indexes
                    .find(']')
                    .ok_or_else(|| invalid("unclosed '['"))?;
                if !indexes.starts_with('[') {
                    return Err(invalid("unexpected characters after ']'"));
                }
                let index: usize = indexes[1..close]
                    .parse()
                    .map_err(|_| invalid("array index must be a non-negative integer"))?;
                segments.push(Segment::Index(index));
                indexes = &indexes[close + 1..];
            }
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// `$.<name>`
    pub fn field(name: &str) -> Self {
        Self {
            raw: format!("$.{}", name),
            segments: vec![Segment::Field(name.to_string())],
        }
    }

    /// Resolve against a document. Only borrows; nothing is cloned.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let mut current = value;
        for segment in &self.segments {
            current = match segment {
                Segment::Field(name) => current.get(name)?,
                Segment::Index(idx) => current.get(*idx)?,
            };
        }
        Some(current)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for JsonPath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        JsonPath::parse(&value)
    }
}

impl From<JsonPath> for String {
    fn from(path: JsonPath) -> Self {
        path.raw
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
