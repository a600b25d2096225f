use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::error::SkipReason;
use crate::segment::Segment;

/// Derives a document key from one raw line.
///
/// Implementations never fail on malformed input; they report why no key
/// could be produced and the caller turns that into a skipped record.
pub trait KeyResolver {
    fn resolve(&mut self, line: &str) -> Result<String, SkipReason>;
}

/// Ignores line content and hands out `"{seed}-{n}"` for `n = 1, 2, ...`.
///
/// Seeding from a segment's path and start offset makes keys unique across
/// segments and repeatable when the same segment is read again.
#[derive(Debug, Clone)]
pub struct SequentialIdKeyResolver {
    seed: String,
    counter: u64,
}

impl SequentialIdKeyResolver {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            counter: 0,
        }
    }

    pub fn for_segment(segment: &Segment) -> Self {
        Self::new(format!("{}-{}", segment.path().display(), segment.start()))
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl KeyResolver for SequentialIdKeyResolver {
    fn resolve(&mut self, _line: &str) -> Result<String, SkipReason> {
        self.counter += 1;
        Ok(format!("{}-{}", self.seed, self.counter))
    }
}

/// Borrowed view of a JSON value, tagged by the shape the field search cares
/// about.
#[derive(Debug, Clone, Copy)]
pub enum JsonNode<'a> {
    Object(&'a Map<String, Value>),
    List(&'a [Value]),
    Scalar(&'a Value),
}

impl<'a> From<&'a Value> for JsonNode<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            Value::Array(items) => Self::List(items),
            other => Self::Scalar(other),
        }
    }
}

/// Breadth-first search for `field`, starting at `root`.
///
/// Returns the value of the first object that has the field, visiting objects
/// level by level in document order. Objects inside lists are visited as
/// children of the object holding the list; scalars and nested lists are not
/// descended into.
pub fn find_field<'a>(root: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        if let Some(value) = current.get(field) {
            return Some(value);
        }
        for child in current.values() {
            match JsonNode::from(child) {
                JsonNode::Object(map) => queue.push_back(map),
                JsonNode::List(items) => {
                    queue.extend(items.iter().filter_map(|item| match JsonNode::from(item) {
                        JsonNode::Object(map) => Some(map),
                        JsonNode::List(_) | JsonNode::Scalar(_) => None,
                    }))
                }
                JsonNode::Scalar(_) => {}
            }
        }
    }
    None
}

/// Reads the key from a named field anywhere in a JSON object line.
#[derive(Debug, Clone)]
pub struct JsonFieldKeyResolver {
    field: String,
}

impl JsonFieldKeyResolver {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl KeyResolver for JsonFieldKeyResolver {
    fn resolve(&mut self, line: &str) -> Result<String, SkipReason> {
        let root: Map<String, Value> =
            serde_json::from_str(line.trim()).map_err(|err| SkipReason::InvalidJson {
                message: err.to_string(),
            })?;

        // The shallowest match decides, even when its type is unusable.
        match find_field(&root, &self.field) {
            Some(Value::String(text)) => Ok(text.clone()),
            // Digits come through verbatim (serde_json `arbitrary_precision`).
            Some(Value::Number(number)) => Ok(number.to_string()),
            Some(_) => Err(SkipReason::InvalidFieldType {
                field: self.field.clone(),
            }),
            None => Err(SkipReason::FieldNotFound {
                field: self.field.clone(),
            }),
        }
    }
}
