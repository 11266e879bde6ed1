use serde::{Deserialize, Serialize};

use crate::document::{Element, NamespaceMap, NodePath, QName};
use crate::duplicates;
use crate::scanner;
use crate::updater::VersionUpdater;

/// Post-update verification of a document against the updater that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Validation error with detailed information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: NodePath,
    pub error_type: ValidationErrorType,
    pub message: String,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorType {
    VersionMismatch,
    StaleNamespace,
    DisallowedConstruct,
    DuplicateId,
}

/// Validation warning for non-critical issues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: NodePath,
    pub warning_type: ValidationWarningType,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationWarningType {
    /// A schemaLocation pair does not point at the target version's schema
    OutdatedSchemaLocation,
}

impl ValidationError {
    pub fn new(path: NodePath, error_type: ValidationErrorType, message: String) -> Self {
        Self {
            path,
            error_type,
            message,
            suggested_fix: None,
        }
    }

    pub fn with_suggested_fix(mut self, fix: String) -> Self {
        self.suggested_fix = Some(fix);
        self
    }
}

impl ValidationWarning {
    pub fn new(path: NodePath, warning_type: ValidationWarningType, message: String) -> Self {
        Self {
            path,
            warning_type,
            message,
        }
    }
}

/// Check that `root` looks like the output of `updater`: the target version
/// is declared, no remapped namespace survives, nothing disallowed remains,
/// and ids are unique where the target requires it.
pub fn verify(updater: &VersionUpdater, root: &Element) -> ValidationReport {
    let mut report = ValidationReport::new();

    check_versions(updater, root, &NodePath::root(), &mut report);
    check_namespaces(updater, root, &mut report);

    for node in scanner::find_disallowed(root, &NamespaceMap::new(), &updater.disallowed_specs()) {
        report.add_error(ValidationError::new(
            node.path,
            ValidationErrorType::DisallowedConstruct,
            format!("{} is not allowed after the update ({})", node.element.name, node.rule_id),
        ));
    }

    if updater.requires_unique_ids() {
        for (id, paths) in duplicates::find_duplicates(root) {
            report.add_error(
                ValidationError::new(
                    paths[0].clone(),
                    ValidationErrorType::DuplicateId,
                    format!("id '{}' is used {} times", id, paths.len()),
                )
                .with_suggested_fix("Re-run the update with force to assign fresh ids".to_string()),
            );
        }
    }

    report
}

// `at` is where `root` sits in the verified document
fn check_versions(updater: &VersionUpdater, root: &Element, at: &NodePath, report: &mut ValidationReport) {
    let expected = updater.target_version_for(root);
    match updater.declared_version(root) {
        Some(found) if found == expected => {}
        found => report.add_error(
            ValidationError::new(
                at.clone(),
                ValidationErrorType::VersionMismatch,
                format!(
                    "expected version {}, found {}",
                    expected,
                    found.as_deref().unwrap_or("none")
                ),
            )
            .with_suggested_fix(format!("Update the document to {} {}", updater.family, expected)),
        ),
    }

    if let Some(embedded) = &updater.embedded {
        for path in updater.embedded_roots(root) {
            if let Some(sub) = root.get(&path) {
                check_versions(&embedded.updater, sub, &at.join(&path), report);
            }
        }
    }
}

fn check_namespaces(updater: &VersionUpdater, root: &Element, report: &mut ValidationReport) {
    let stale = updater.effective_namespace_map();
    let hint = QName::xsi("schemaLocation");

    root.walk(|visit| {
        let element = visit.element;
        let in_stale = |name: &QName| name.namespace.as_ref().is_some_and(|ns| stale.contains_key(ns));

        if element.namespaces.values().any(|uri| stale.contains_key(uri))
            || in_stale(&element.name)
            || element.attributes.keys().any(in_stale)
        {
            report.add_error(ValidationError::new(
                visit.node_path(),
                ValidationErrorType::StaleNamespace,
                format!("{} still uses a namespace replaced in {}", element.name, updater.target_version),
            ));
        }

        if let Some(value) = element.attributes.get(&hint) {
            let tokens: Vec<&str> = value.split_whitespace().collect();
            for pair in tokens.chunks_exact(2) {
                if let Some(target) = updater.schema_location_for(pair[0]) {
                    if target != pair[1] {
                        report.add_warning(ValidationWarning::new(
                            visit.node_path(),
                            ValidationWarningType::OutdatedSchemaLocation,
                            format!("{} points at {}, expected {}", pair[0], pair[1], target),
                        ));
                    }
                }
            }
        }
    });
}
