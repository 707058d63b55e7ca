//! Document tree consumed by the schema compiler.
//!
//! [`Element`] is the contract between a markup front end and the core: a tag, an
//! ordered (possibly repeated) attribute list, ordered children, trimmed text content
//! and the source line. The core never looks at raw markup; [`crate::parser`] is one
//! front end producing this tree, tests and tools may build it by hand.

use crate::error::SchemaError;

/// One element of the input document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
    pub line: usize,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// First attribute with the given name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn has_child(&self, tag: &str) -> bool {
        self.children.iter().any(|c| c.tag == tag)
    }

    /// A child usable as a property: carries a `value` attribute or text, and no elements.
    fn property_value(&self) -> Option<&str> {
        if !self.children.is_empty() {
            return None;
        }
        if let Some(v) = self.attr("value") {
            return Some(v);
        }
        if !self.text.is_empty() {
            return Some(self.text.as_str());
        }
        None
    }

    pub fn is_property_child(&self, names: &[&str]) -> bool {
        names.contains(&self.tag.as_str()) && self.property_value().is_some()
    }

    /// Collect attributes plus children acting as properties (tags listed in `names`).
    pub fn props(&self, names: &[&str]) -> Props {
        let mut entries = self.attrs.clone();
        for child in &self.children {
            if !names.contains(&child.tag.as_str()) {
                continue;
            }
            if let Some(v) = child.property_value() {
                entries.push((child.tag.clone(), v.to_string()));
            }
        }
        Props { entries }
    }

    /// Merge this element on top of `base` (field inheritance): own properties win,
    /// the base's child declarations come first.
    pub fn inherit_from(&self, base: &Element, prop_names: &[&str]) -> Element {
        let own = self.props(prop_names);
        let mut attrs: Vec<(String, String)> = base
            .attrs
            .iter()
            .filter(|(k, _)| k != "name" && k != "reuse" && !own.contains(k))
            .cloned()
            .collect();
        attrs.extend(self.attrs.iter().filter(|(k, _)| k != "reuse").cloned());

        let mut children: Vec<Element> = base
            .children
            .iter()
            .filter(|c| !(c.is_property_child(prop_names) && (c.tag == "name" || own.contains(&c.tag))))
            .cloned()
            .collect();
        children.extend(self.children.iter().cloned());

        Element {
            tag: self.tag.clone(),
            attrs,
            children,
            text: self.text.clone(),
            line: self.line,
        }
    }
}

/// Multi-valued property map of one element, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    entries: Vec<(String, String)>,
}

impl Props {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Every value of a repeatable property, in document order.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn count(&self, key: &str) -> usize {
        self.entries.iter().filter(|(k, _)| k == key).count()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// At most one instance of `key` is allowed.
    pub fn single(&self, key: &str) -> Result<Option<&str>, SchemaError> {
        if self.count(key) > 1 {
            return Err(SchemaError::DuplicateProperty(key.to_string()));
        }
        Ok(self.get(key))
    }

    /// Exactly one instance of `key` is required.
    pub fn required(&self, key: &str) -> Result<&str, SchemaError> {
        self.single(key)?
            .ok_or_else(|| SchemaError::MissingProperty(key.to_string()))
    }

    /// Attribute names (and property children) not present in `expected`.
    pub fn unknown<'a>(&'a self, expected: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(move |k| !expected.contains(k))
    }
}
