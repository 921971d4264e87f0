//! Entity names and entity type declarations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::model::{RelationDecl, SortOrder};

/// Characters that may not appear in an app label, model name, field name
/// or accessor name. `:` is the cache key delimiter and `.` the qualifier.
const RESERVED: &[char] = &[':', '.'];

// == Entity Name ==
/// Qualified entity type name, `app.Model`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityName {
    app: String,
    model: String,
}

impl EntityName {
    /// Parses a fully qualified `app.Model` name.
    pub fn parse(name: &str) -> Result<Self, ConfigurationError> {
        let Some((app, model)) = name.split_once('.') else {
            return Err(ConfigurationError::InvalidName {
                name: name.to_string(),
                reason: "expected a qualified name of the form app.Model".to_string(),
            });
        };
        Self::new(app, model)
    }

    pub fn new(app: &str, model: &str) -> Result<Self, ConfigurationError> {
        validate_segment(app)?;
        validate_segment(model)?;
        Ok(Self {
            app: app.to_string(),
            model: model.to_string(),
        })
    }

    /// Resolves a relation target reference. An unqualified `Model` is taken
    /// to live in the same app as the declaring type.
    pub fn resolve_reference(
        reference: &str,
        from: &EntityName,
    ) -> Result<Self, ConfigurationError> {
        if reference.contains('.') {
            Self::parse(reference)
        } else {
            Self::new(&from.app, reference)
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Default reverse accessor stem: the lowercased model name.
    pub fn default_accessor(&self) -> String {
        self.model.to_lowercase()
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.model)
    }
}

impl TryFrom<String> for EntityName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityName> for String {
    fn from(value: EntityName) -> Self {
        value.to_string()
    }
}

/// Checks a single name segment (app label, model, field or accessor).
pub fn validate_segment(segment: &str) -> Result<(), ConfigurationError> {
    let reason = if segment.is_empty() {
        Some("name cannot be empty")
    } else if segment.contains(RESERVED) {
        Some("name cannot contain ':' or '.'")
    } else if segment.chars().any(char::is_whitespace) {
        Some("name cannot contain whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigurationError::InvalidName {
            name: segment.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

// == Entity Type ==
/// A record schema as handed to the registry: its name, default ordering,
/// optional TTL and declared relations.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub(crate) name: String,
    pub(crate) ordering: SortOrder,
    pub(crate) ttl: Option<u64>,
    pub(crate) relations: Vec<RelationDecl>,
}

impl EntityType {
    /// Starts a declaration for the qualified type `name` (`app.Model`).
    /// The name is validated at registration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ordering: SortOrder::default(),
            ttl: None,
            relations: Vec::new(),
        }
    }

    /// Default ordering for collections of this type, e.g. `["-rank", "title"]`.
    pub fn with_ordering<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ordering = SortOrder::parse(fields);
        self
    }

    /// TTL in seconds for every cache entry keyed under this type.
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl = Some(ttl_seconds);
        self
    }

    pub fn with_relation(mut self, relation: RelationDecl) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
