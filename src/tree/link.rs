//! Link data carried by links, images, citations and reference definitions.

use serde::{Deserialize, Serialize};

/// One `key="value"` attribute from a reference definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Label, destination, title and attributes of a link.
///
/// Copies handed out by the resolver are independent clones; mutating one
/// never affects the pooled definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkData {
    pub label: Option<String>,
    pub source: Option<String>,
    pub title: Option<String>,
    pub attr: Vec<Attribute>,
}

impl LinkData {
    pub fn new(
        label: Option<String>,
        source: Option<String>,
        title: Option<String>,
        attr: Vec<Attribute>,
    ) -> Self {
        Self {
            label,
            source,
            title,
            attr,
        }
    }

    /// Reference-style link data with only a label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// Look up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attr
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// `width`/`height` attribute with units normalized for print output.
    ///
    /// Units are lowercased, `px` becomes `pt`, and a bare number gets `pt`.
    ///
    /// ```
    /// use mmd_export::tree::{Attribute, LinkData};
    ///
    /// let link = LinkData {
    ///     attr: vec![Attribute::new("width", "300PX"), Attribute::new("height", "40")],
    ///     ..Default::default()
    /// };
    /// assert_eq!(link.dimension("width").as_deref(), Some("300pt"));
    /// assert_eq!(link.dimension("height").as_deref(), Some("40pt"));
    /// ```
    pub fn dimension(&self, key: &str) -> Option<String> {
        self.attribute(key).map(correct_dimension_units)
    }

    pub fn is_mailto(&self) -> bool {
        self.source
            .as_deref()
            .is_some_and(|s| s.starts_with("mailto:"))
    }
}

fn correct_dimension_units(value: &str) -> String {
    let mut result = value.trim().to_lowercase();
    if let Some(stem) = result.strip_suffix("px") {
        result = format!("{stem}pt");
    } else if !result.is_empty()
        && !result.ends_with('%')
        && !result.chars().any(|c| c.is_ascii_alphabetic())
    {
        result.push_str("pt");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup() {
        let link = LinkData::new(
            Some("logo".into()),
            Some("logo.png".into()),
            None,
            vec![Attribute::new("class", "wide")],
        );
        assert_eq!(link.attribute("class"), Some("wide"));
        assert_eq!(link.attribute("id"), None);
    }

    #[test]
    fn test_dimension_units() {
        assert_eq!(correct_dimension_units("10PX"), "10pt");
        assert_eq!(correct_dimension_units("50%"), "50%");
        assert_eq!(correct_dimension_units("3cm"), "3cm");
        assert_eq!(correct_dimension_units("12"), "12pt");
    }

    #[test]
    fn test_clone_is_independent() {
        let original = LinkData::labeled("home");
        let mut copy = original.clone();
        copy.source = Some("/".into());
        assert!(original.source.is_none());
    }

    #[test]
    fn test_mailto() {
        let mut link = LinkData::default();
        assert!(!link.is_mailto());
        link.source = Some("mailto:me@example.com".into());
        assert!(link.is_mailto());
    }
}
