use tracing::debug;

use crate::document::{Element, NamespaceMap, NodePath};
use crate::duplicates;
use crate::error::{MigrationError, UpdateError};
use crate::namespaces;
use crate::report::{MigrationReport, UpdateOutcome};
use crate::scanner;
use crate::updater::VersionUpdater;
use crate::vocabulary;

impl VersionUpdater {
    /// Decide whether `root` can be updated without losing anything.
    ///
    /// Never mutates. Version errors come first, the outer document's before
    /// any embedded root's. Otherwise every disallowed construct and
    /// duplicated id is reported at once, wherever in the document it sits.
    pub fn check_update(&self, root: &Element) -> Result<(), MigrationError> {
        self.check_versions(root)?;

        let infeasible = self.infeasibilities(root);
        if !infeasible.is_empty() {
            return Err(infeasible.into());
        }
        Ok(())
    }

    /// Rewrite `root` in place from the source to the target version.
    ///
    /// With `force`, a recoverable check failure triggers `clean` followed by
    /// a single rewrite. Without it, a failed check leaves `root` untouched.
    pub fn update(&self, root: &mut Element, force: bool) -> Result<UpdateOutcome, MigrationError> {
        let mut outcome = UpdateOutcome {
            source_version: self.source_version.clone(),
            target_version: self.target_version.clone(),
            forced: false,
            report: MigrationReport::new(),
            warnings: Vec::new(),
        };

        match self.check_update(root) {
            Ok(()) => {}
            Err(err) if force && err.is_recoverable() => {
                debug!(family = %self.family, "update not possible as-is; cleaning document");
                outcome.report = self.clean(root);
                outcome.forced = true;
            }
            Err(err) => return Err(err),
        }

        self.rewrite(root, &mut outcome);
        debug!(
            family = %self.family,
            from = %self.source_version,
            to = %self.target_version,
            "updated document"
        );
        Ok(outcome)
    }

    /// Remove disallowed constructs, then give duplicated ids fresh values.
    /// Rules of embedded schemas apply to the whole document.
    pub fn clean(&self, root: &mut Element) -> MigrationReport {
        let scope = NamespaceMap::new();
        let mut report = MigrationReport::new();

        let offending = scanner::find_disallowed(root, &scope, &self.disallowed_specs());
        report.removed_fragments = scanner::excise(root, &scope, &offending);

        if self.requires_unique_ids() {
            let found = duplicates::find_duplicates(root);
            report.identifier_remap = duplicates::resolve_duplicates(root, &found);
        }
        report
    }

    /// Everything in `root` the target version cannot represent
    pub fn infeasibilities(&self, root: &Element) -> UpdateError {
        UpdateError {
            disallowed: scanner::find_disallowed(root, &NamespaceMap::new(), &self.disallowed_specs()),
            duplicates: if self.requires_unique_ids() {
                duplicates::find_duplicates(root)
            } else {
                Default::default()
            },
        }
    }

    fn check_version(&self, root: &Element) -> Result<(), MigrationError> {
        let found = self
            .declared_version(root)
            .filter(|version| !version.is_empty())
            .ok_or(MigrationError::UnknownVersion)?;

        if found != self.source_version {
            return Err(MigrationError::InvalidVersion {
                expected: self.source_version.clone(),
                found,
            });
        }
        Ok(())
    }

    /// The root's version, then the version of every embedded root
    fn check_versions(&self, root: &Element) -> Result<(), MigrationError> {
        self.check_version(root)?;

        let Some(embedded) = &self.embedded else {
            return Ok(());
        };
        for path in self.embedded_roots(root) {
            let Some(sub) = root.get(&path) else {
                continue;
            };
            embedded
                .updater
                .check_versions(sub)
                .map_err(|source| MigrationError::Embedded {
                    path: path.clone(),
                    tag: sub.name.clone(),
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    /// The fixed rewrite chain
    fn rewrite(&self, root: &mut Element, outcome: &mut UpdateOutcome) {
        let scope = NamespaceMap::new();
        let namespace_map = self.effective_namespace_map();
        namespaces::rewrite_namespaces(root, &namespace_map);
        outcome.warnings.extend(namespaces::rewrite_schema_locations(
            root,
            &scope,
            &namespace_map,
            |ns| self.schema_location_for(ns),
        ));

        self.stamp_versions(root);
        for updater in self.content_updaters() {
            vocabulary::translate(root, &scope, &updater.vocabulary_map);
            scanner::prune_optionals(root, &scope, &updater.optional_elements);
            scanner::translate_fields(root, &scope, &updater.translatable_fields);
        }
    }

    /// Stamp the target version on every element that carries one. Embedded
    /// roots and everything below them are stamped by the embedded updater.
    fn stamp_versions(&self, root: &mut Element) {
        let embedded = self.embedded.as_ref();
        let mut embedded_roots = Vec::new();
        let mut stamped = 0;
        root.walk_mut(&mut |path, element| {
            if embedded.is_some_and(|embedded| embedded.is_root(element)) {
                embedded_roots.push(path.clone());
                return false;
            }
            if self.version_scheme.carries(element) {
                let version = self.target_version_for(element).to_string();
                self.version_scheme.stamp(element, &version);
                stamped += 1;
            }
            true
        });
        debug!(family = %self.family, stamped, "stamped target versions");

        if let Some(embedded) = embedded {
            for path in embedded_roots {
                if let Some(sub) = root.get_mut(&path) {
                    embedded.updater.stamp_versions(sub);
                }
            }
        }
    }

    /// Outermost embedded roots, in document order
    pub(crate) fn embedded_roots(&self, root: &Element) -> Vec<NodePath> {
        let Some(embedded) = &self.embedded else {
            return Vec::new();
        };

        let mut roots: Vec<NodePath> = Vec::new();
        root.walk(|visit| {
            if embedded.is_root(visit.element) {
                let path = visit.node_path();
                if !roots.iter().any(|outer| outer.is_ancestor_of(&path)) {
                    roots.push(path);
                }
            }
        });
        roots
    }
}
