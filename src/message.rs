//! Messages flowing through the pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

/// An immutable XML payload.
///
/// Cheap to clone; the bytes are shared, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document(Arc<[u8]>);

impl Document {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Document(bytes.into().into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Document::new(text.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Document {
    fn from(bytes: Vec<u8>) -> Self {
        Document::new(bytes)
    }
}

/// The unit that flows through the pipeline: a payload plus headers.
///
/// Splitting one message produces N messages, each inheriting the parent's
/// headers unless a later stage overwrites them.
#[derive(Debug, Clone)]
pub struct Message {
    pub body: Document,
    pub headers: BTreeMap<String, String>,
}

impl Message {
    pub fn new(body: Document) -> Self {
        Message {
            body,
            headers: BTreeMap::new(),
        }
    }

    /// New message with this payload, inheriting this message's headers.
    pub fn child(&self, body: Document) -> Self {
        Message {
            body,
            headers: self.headers.clone(),
        }
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}
