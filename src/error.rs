use indexmap::IndexMap;
use thiserror::Error;

use crate::document::{Element, NodePath, QName};

/// Errors raised by the update pipeline
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MigrationError {
    #[error("document does not declare a version")]
    UnknownVersion,

    #[error("invalid version: expected {expected}, found {found}")]
    InvalidVersion { expected: String, found: String },

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error("embedded {tag} at {path} failed: {source}")]
    Embedded {
        path: NodePath,
        tag: QName,
        #[source]
        source: Box<MigrationError>,
    },
}

impl MigrationError {
    /// True when `force` may recover from this error by cleaning the document
    pub fn is_recoverable(&self) -> bool {
        match self {
            MigrationError::Update(_) => true,
            MigrationError::Embedded { source, .. } => source.is_recoverable(),
            MigrationError::UnknownVersion | MigrationError::InvalidVersion { .. } => false,
        }
    }

    /// The innermost error, skipping embedded wrappers
    pub fn root_cause(&self) -> &MigrationError {
        match self {
            MigrationError::Embedded { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// The document holds constructs or id collisions the target version cannot represent.
/// Both lists are complete.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{}", self.describe())]
pub struct UpdateError {
    pub disallowed: Vec<OffendingNode>,
    /// Every element sharing each duplicated id, in document order
    pub duplicates: IndexMap<String, Vec<NodePath>>,
}

impl UpdateError {
    pub fn is_empty(&self) -> bool {
        self.disallowed.is_empty() && self.duplicates.is_empty()
    }

    fn describe(&self) -> String {
        let mut message = format!(
            "found {} untranslatable construct(s) and {} duplicated id(s)",
            self.disallowed.len(),
            self.duplicates.len()
        );
        for node in &self.disallowed {
            message.push_str(&format!("; {} at {} ({})", node.element.name, node.path, node.rule_id));
        }
        for (id, paths) in &self.duplicates {
            message.push_str(&format!("; id '{}' used {} times", id, paths.len()));
        }
        message
    }
}

/// A disallowed element found by the scanner, copied out of the document
#[derive(Debug, Clone, PartialEq)]
pub struct OffendingNode {
    pub path: NodePath,
    pub rule_id: String,
    pub element: Element,
}
