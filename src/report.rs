use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::document::{Element, NamespaceMap, NodePath, QName};

/// What a forced update discarded or renamed. Built fresh by every `clean`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Copies of excised sub-trees, taken before detachment
    pub removed_fragments: Vec<RemovedFragment>,
    /// Original id to the ids assigned to its duplicates, in encounter order
    pub identifier_remap: IndexMap<String, Vec<String>>,
}

impl MigrationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.removed_fragments.is_empty() && self.identifier_remap.is_empty()
    }

    /// Fold a report produced for the sub-tree at `at` into this one
    pub fn absorb(&mut self, at: &NodePath, other: MigrationReport) {
        for fragment in other.removed_fragments {
            self.removed_fragments.push(RemovedFragment {
                path: at.join(&fragment.path),
                ..fragment
            });
        }
        for (original, renamed) in other.identifier_remap {
            self.identifier_remap.entry(original).or_default().extend(renamed);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedFragment {
    /// Where the fragment sat when it was removed
    pub path: NodePath,
    pub rule_id: String,
    pub element: Element,
    /// Namespaces the fragment inherited from its ancestors
    pub scope: NamespaceMap,
}

impl RemovedFragment {
    pub fn tag(&self) -> &QName {
        &self.element.name
    }
}

/// Warning generated during an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateWarning {
    pub message: String,
    pub namespace: Option<String>,
    pub warning_type: UpdateWarningType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateWarningType {
    /// A schema-location pair was kept because no target location is known
    UnknownSchemaLocation,
    /// The schema-location hint had an odd number of tokens
    MalformedSchemaLocation,
}

impl UpdateWarning {
    pub fn new(message: String, warning_type: UpdateWarningType) -> Self {
        Self {
            message,
            namespace: None,
            warning_type,
        }
    }

    pub fn with_namespace(mut self, namespace: String) -> Self {
        self.namespace = Some(namespace);
        self
    }
}

/// Result of a successful `update`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub source_version: String,
    pub target_version: String,
    /// True when the feasibility check failed and `clean` ran
    pub forced: bool,
    pub report: MigrationReport,
    pub warnings: Vec<UpdateWarning>,
}

impl UpdateOutcome {
    /// Fold the outcome of an embedded update at `at` into this one
    pub fn absorb(&mut self, at: &NodePath, other: UpdateOutcome) {
        self.forced |= other.forced;
        self.report.absorb(at, other.report);
        self.warnings.extend(other.warnings);
    }
}
