//! Identifier validation for labels and relationship types.
//!
//! Cypher cannot bind labels or relationship types as parameters, so they
//! have to be written into the query text. Only tokens made of ASCII
//! letters, digits and underscore ever get there, and only through the
//! types in this module.

use std::fmt;

use neocrud_core::{CrudError, PropertyValue};

/// Check that `token` is non-empty and contains only `[A-Za-z0-9_]`.
pub fn validate(token: &str) -> Result<&str, CrudError> {
    let safe = !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');

    if safe {
        Ok(token)
    } else {
        Err(CrudError::InvalidIdentifier {
            token: token.to_string(),
        })
    }
}

/// A label or relationship type that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(token: &str) -> Result<Self, CrudError> {
        validate(token).map(|t| Self(t.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `:TYPE`, for a relationship pattern.
    pub fn type_clause(&self) -> String {
        format!(":{}", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free set of validated labels. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(Vec<Identifier>);

impl LabelSet {
    /// Validate every label; the first unsafe one fails the whole set.
    pub fn new<I, S>(labels: I) -> Result<Self, CrudError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<Identifier> = Vec::new();
        for label in labels {
            let ident = Identifier::new(label.as_ref())?;
            if !set.contains(&ident) {
                set.push(ident);
            }
        }
        Ok(Self(set))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identifier> {
        self.0.iter()
    }

    /// `:A:B` for a node pattern; empty when there are no labels.
    pub fn clause(&self) -> String {
        self.0.iter().map(Identifier::type_clause).collect()
    }

    /// The labels as a list parameter, for procedures that take them bound.
    pub fn to_param(&self) -> PropertyValue {
        PropertyValue::List(
            self.0
                .iter()
                .map(|l| PropertyValue::String(l.0.clone()))
                .collect(),
        )
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().map(|l| l.0.clone()).collect()
    }
}
