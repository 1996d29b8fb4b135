//! Resource addressing.
//!
//! A resource is addressed by an ordered sequence of `(type, name)`
//! elements. The textual form joins elements with `/`, for example
//! `subsystem=logging/handler=console`. The empty address is the root and
//! renders as `/`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element name that matches any name in a registration.
pub const WILDCARD: &str = "*";

/// Error parsing an address string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError {
    /// The invalid address string.
    pub address: String,

    /// The reason for the error.
    pub reason: String,
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid address '{}': {}", self.address, self.reason)
    }
}

impl std::error::Error for AddressParseError {}

/// One `(type, name)` step of a resource address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    /// Child type, e.g. `subsystem`
    pub key: String,

    /// Child name, e.g. `logging`, or `*` in a wildcard registration
    pub value: String,
}

impl PathElement {
    /// Create an element with a concrete name.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create an element matching every name of the given type.
    pub fn wildcard(key: impl Into<String>) -> Self {
        Self::new(key, WILDCARD)
    }

    /// Whether this element is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }

    /// Whether this (registration) element matches a concrete element.
    pub fn matches(&self, other: &PathElement) -> bool {
        self.key == other.key && (self.is_wildcard() || self.value == other.value)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for PathElement {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| AddressParseError {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| invalid("element must have the form type=name"))?;
        if key.is_empty() || value.is_empty() {
            return Err(invalid("type and name must be non-empty"));
        }
        if value.contains('=') {
            return Err(invalid("name must not contain '='"));
        }

        Ok(Self::new(key, value))
    }
}

/// Ordered sequence of path elements from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathAddress {
    elements: Vec<PathElement>,
}

impl PathAddress {
    /// The root address.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build an address from elements.
    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// Address of a child of this address.
    pub fn append(&self, element: PathElement) -> Self {
        let mut elements = self.elements.clone();
        elements.push(element);
        Self { elements }
    }

    /// The parent address, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.elements.is_empty() {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// The last element, or `None` for the root.
    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// All elements in order.
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether this is the root address.
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether any element is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.elements.iter().any(PathElement::is_wildcard)
    }

    /// Whether this (possibly wildcard) address matches a concrete one.
    pub fn matches(&self, other: &PathAddress) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|(pattern, element)| pattern.matches(element))
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "/");
        }
        let rendered = self
            .elements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/");
        write!(f, "{}", rendered)
    }
}

impl FromStr for PathAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let elements = trimmed
            .split('/')
            .map(PathElement::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { elements })
    }
}

impl TryFrom<String> for PathAddress {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PathAddress> for String {
    fn from(address: PathAddress) -> Self {
        address.to_string()
    }
}

impl From<PathElement> for PathAddress {
    fn from(element: PathElement) -> Self {
        Self {
            elements: vec![element],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let address: PathAddress = "subsystem=logging/handler=console".parse().unwrap();
        assert_eq!(address.len(), 2);
        assert_eq!(address.to_string(), "subsystem=logging/handler=console");
        assert_eq!(
            address.parent().unwrap().to_string(),
            "subsystem=logging"
        );
    }

    #[test]
    fn test_root() {
        let root: PathAddress = "/".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_invalid_element() {
        assert!("subsystem".parse::<PathAddress>().is_err());
        assert!("subsystem=".parse::<PathAddress>().is_err());
        assert!("=foo".parse::<PathAddress>().is_err());
    }

    #[test]
    fn test_wildcard_matching() {
        let pattern = PathAddress::from(PathElement::wildcard("deployment"));
        let concrete: PathAddress = "deployment=app.war".parse().unwrap();
        let other: PathAddress = "subsystem=app.war".parse().unwrap();
        assert!(pattern.is_wildcard());
        assert!(pattern.matches(&concrete));
        assert!(!pattern.matches(&other));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let address: PathAddress = "subsystem=foo".parse().unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"subsystem=foo\"");
        let back: PathAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
