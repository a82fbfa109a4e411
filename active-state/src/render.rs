//! Render boundary
//!
//! A tracker wraps exactly one child element. Rendering merges the active
//! markers into that child's class name on a copy; when nothing is active
//! the child itself is returned so callers can compare by pointer.

use crate::types::{Result, TrackerError};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A presentational element as seen by the render boundary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Element kind (e.g. "a", "li")
    pub tag: String,
    /// Space-separated class list
    pub class_name: Option<String>,
    /// Remaining attributes
    pub attributes: BTreeMap<String, String>,
    /// Text content
    pub text: Option<String>,
    /// Nested elements
    pub children: Vec<Rc<Element>>,
}

impl Element {
    /// Create an element with no attributes
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Builder method: set the class name
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Builder method: set an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder method: set the text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder method: append a child
    pub fn with_child(mut self, child: Rc<Element>) -> Self {
        self.children.push(child);
        self
    }

    /// Class tokens in order
    pub fn classes(&self) -> Vec<&str> {
        self.class_name
            .as_deref()
            .map(|name| name.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Join class tokens, skipping empty ones
pub fn class_names<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(token);
    }
    joined
}

/// Apply `markers` to the single child in `children`
///
/// Returns the original `Rc` untouched when no non-empty marker is given.
pub fn merge_markers(children: &[Rc<Element>], markers: &[String]) -> Result<Rc<Element>> {
    let child = match children {
        [only] => only,
        _ => return Err(TrackerError::InvalidChild(children.len())),
    };

    let mut tokens = markers
        .iter()
        .map(|marker| marker.trim())
        .filter(|marker| !marker.is_empty())
        .peekable();
    if tokens.peek().is_none() {
        return Ok(Rc::clone(child));
    }

    let existing = child.class_name.as_deref().unwrap_or_default();
    let merged = Element {
        class_name: Some(class_names(std::iter::once(existing).chain(tokens))),
        ..Element::clone(child)
    };
    Ok(Rc::new(merged))
}
