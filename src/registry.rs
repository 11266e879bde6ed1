use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::document::{Element, NodePath, QName};
use crate::error::MigrationError;
use crate::report::{MigrationReport, UpdateOutcome};
use crate::rules::RuleError;
use crate::schema_version::SchemaVersion;
use crate::tables::{cybox, stix};
use crate::updater::{SchemaFamily, VersionScheme, VersionUpdater};

/// Every single-step transition the crate ships tables for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdaterKind {
    Stix1_1,
    Cybox2_0,
    Cybox2_0_1,
}

impl UpdaterKind {
    pub const ALL: [UpdaterKind; 3] = [UpdaterKind::Stix1_1, UpdaterKind::Cybox2_0, UpdaterKind::Cybox2_0_1];

    pub fn family(self) -> SchemaFamily {
        match self {
            UpdaterKind::Stix1_1 => SchemaFamily::Stix,
            UpdaterKind::Cybox2_0 | UpdaterKind::Cybox2_0_1 => SchemaFamily::Cybox,
        }
    }

    pub fn build(self) -> Result<VersionUpdater, RuleError> {
        match self {
            UpdaterKind::Stix1_1 => stix::stix_1_1(),
            UpdaterKind::Cybox2_0 => cybox::cybox_2_0(),
            UpdaterKind::Cybox2_0_1 => cybox::cybox_2_0_1(),
        }
    }
}

impl fmt::Display for UpdaterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdaterKind::Stix1_1 => write!(f, "STIX 1.1"),
            UpdaterKind::Cybox2_0 => write!(f, "CybOX 2.0"),
            UpdaterKind::Cybox2_0_1 => write!(f, "CybOX 2.0.1"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unrecognised document root: {0}")]
    UnknownDocument(QName),

    #[error("Unsupported {family} version: {version}")]
    UnsupportedVersion { family: SchemaFamily, version: String },

    #[error("No migration path found from {0} to {1}")]
    NoMigrationPath(String, String),

    #[error("Invalid update table for {kind}: {source}")]
    InvalidTable {
        kind: UpdaterKind,
        #[source]
        source: RuleError,
    },

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Family and declared version of a document, read from its root element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedDocument {
    pub family: SchemaFamily,
    pub version: Option<String>,
}

/// Catalogue of the built-in updaters
#[derive(Debug)]
pub struct SchemaRegistry {
    updaters: IndexMap<UpdaterKind, VersionUpdater>,
}

impl SchemaRegistry {
    /// Build and validate every built-in table
    pub fn new() -> Result<Self, RegistryError> {
        let mut updaters = IndexMap::new();
        for kind in UpdaterKind::ALL {
            updaters.insert(kind, validate_table(kind, kind.build())?);
        }
        Ok(Self { updaters })
    }

    pub fn updater(&self, kind: UpdaterKind) -> Option<&VersionUpdater> {
        self.updaters.get(&kind)
    }

    /// (source, target) version pairs supported for `family`
    pub fn supported_versions(&self, family: SchemaFamily) -> Vec<(String, String)> {
        self.updaters
            .values()
            .filter(|updater| updater.family == family)
            .map(|updater| (updater.source_version.clone(), updater.target_version.clone()))
            .collect()
    }

    /// Newest version any updater of `family` produces
    pub fn latest_version(&self, family: SchemaFamily) -> Option<String> {
        self.updaters
            .values()
            .filter(|updater| updater.family == family)
            .filter_map(|updater| {
                updater
                    .target_version
                    .parse::<SchemaVersion>()
                    .ok()
                    .map(|parsed| (parsed, &updater.target_version))
            })
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, version)| version.clone())
    }

    pub fn detect(&self, root: &Element) -> Result<DetectedDocument, RegistryError> {
        let family = if root.name == QName::new(stix::NS_STIX, "STIX_Package") {
            SchemaFamily::Stix
        } else if root.name == QName::new(cybox::NS_CYBOX, "Observables") {
            SchemaFamily::Cybox
        } else {
            return Err(RegistryError::UnknownDocument(root.name.clone()));
        };

        Ok(DetectedDocument {
            family,
            version: version_scheme(family).declared(root).filter(|v| !v.is_empty()),
        })
    }

    /// Single-step updaters leading from `from` to `to`, in order
    pub fn migration_path(
        &self,
        family: SchemaFamily,
        from: &str,
        to: &str,
    ) -> Result<Vec<&VersionUpdater>, RegistryError> {
        let mut path = Vec::new();
        let mut current = from;

        while current != to {
            let next = self
                .updaters
                .values()
                .find(|updater| updater.family == family && updater.source_version == current)
                .ok_or_else(|| {
                    if path.is_empty() && !self.knows_version(family, from) {
                        RegistryError::UnsupportedVersion {
                            family,
                            version: from.to_string(),
                        }
                    } else {
                        RegistryError::NoMigrationPath(from.to_string(), to.to_string())
                    }
                })?;
            if path.len() == self.updaters.len() {
                return Err(RegistryError::NoMigrationPath(from.to_string(), to.to_string()));
            }
            path.push(next);
            current = next.target_version.as_str();
        }
        Ok(path)
    }

    /// Update `root` to `target` (default: the newest known version),
    /// chaining single-step updaters. `root` is only replaced once every
    /// step has succeeded. A document already at or past `target` fails
    /// with `InvalidVersion`.
    pub fn update(
        &self,
        root: &mut Element,
        target: Option<&str>,
        force: bool,
    ) -> Result<UpdateOutcome, RegistryError> {
        let detected = self.detect(root)?;
        let version = detected.version.ok_or(MigrationError::UnknownVersion)?;
        let target = match target {
            Some(target) => target.to_string(),
            None => self
                .latest_version(detected.family)
                .ok_or_else(|| RegistryError::NoMigrationPath(version.clone(), "latest".to_string()))?,
        };

        if is_at_or_past(&version, &target) {
            let expected = self
                .final_updater(detected.family, &target)
                .map(|updater| updater.source_version.clone())
                .ok_or_else(|| RegistryError::NoMigrationPath(version.clone(), target.clone()))?;
            return Err(MigrationError::InvalidVersion {
                expected,
                found: version,
            }
            .into());
        }

        let path = self.migration_path(detected.family, &version, &target)?;
        let mut working = root.clone();
        let mut outcome = UpdateOutcome {
            source_version: version,
            target_version: target,
            forced: false,
            report: MigrationReport::new(),
            warnings: Vec::new(),
        };

        for updater in path {
            debug!(
                family = %updater.family,
                from = %updater.source_version,
                to = %updater.target_version,
                "applying update step"
            );
            let step = updater.update(&mut working, force)?;
            outcome.absorb(&NodePath::root(), step);
        }

        *root = working;
        Ok(outcome)
    }

    /// Whether `update` would succeed without `force`. Runs the chain on a
    /// copy, so later steps are checked against the output of earlier ones.
    pub fn check_update(&self, root: &Element, target: Option<&str>) -> Result<(), RegistryError> {
        let mut scratch = root.clone();
        self.update(&mut scratch, target, false).map(|_| ())
    }

    /// The updater producing `target`, for verifying an updated document
    pub fn final_updater(&self, family: SchemaFamily, target: &str) -> Option<&VersionUpdater> {
        self.updaters
            .values()
            .find(|updater| updater.family == family && updater.target_version == target)
    }

    fn knows_version(&self, family: SchemaFamily, version: &str) -> bool {
        self.supported_versions(family)
            .iter()
            .any(|(source, target)| source == version || target == version)
    }
}

fn validate_table(
    kind: UpdaterKind,
    table: Result<VersionUpdater, RuleError>,
) -> Result<VersionUpdater, RegistryError> {
    let updater = table.map_err(|source| RegistryError::InvalidTable { kind, source })?;
    updater
        .validate_versions()
        .map_err(|source| RegistryError::InvalidTable {
            kind,
            source: source.into(),
        })?;
    Ok(updater)
}

// Nothing is left to update once the document declares `target` or newer
fn is_at_or_past(version: &str, target: &str) -> bool {
    match (version.parse::<SchemaVersion>(), target.parse::<SchemaVersion>()) {
        (Ok(version), Ok(target)) => version >= target,
        _ => version == target,
    }
}

fn version_scheme(family: SchemaFamily) -> VersionScheme {
    match family {
        SchemaFamily::Stix => VersionScheme::Attribute("version".to_string()),
        SchemaFamily::Cybox => VersionScheme::CyboxTriplet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    fn cybox_doc(minor: &str, update: &str, body: &str) -> Element {
        xml::parse(&format!(
            r#"<cybox:Observables xmlns:cybox="{}" xmlns:cyboxVocabs="{}"
                xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                cybox_major_version="2" cybox_minor_version="{}" cybox_update_version="{}">{}</cybox:Observables>"#,
            cybox::NS_CYBOX,
            cybox::NS_CYBOX_VOCABS,
            minor,
            update,
            body
        ))
        .unwrap()
    }

    #[test]
    fn test_registry_builds_every_table() {
        let registry = SchemaRegistry::new().unwrap();
        for kind in UpdaterKind::ALL {
            assert_eq!(registry.updater(kind).unwrap().family, kind.family());
        }
    }

    #[test]
    fn test_supported_and_latest_versions() {
        let registry = SchemaRegistry::new().unwrap();
        assert_eq!(
            registry.supported_versions(SchemaFamily::Cybox),
            vec![
                ("2.0".to_string(), "2.0.1".to_string()),
                ("2.0.1".to_string(), "2.1".to_string()),
            ]
        );
        assert_eq!(registry.latest_version(SchemaFamily::Cybox).as_deref(), Some("2.1"));
        assert_eq!(registry.latest_version(SchemaFamily::Stix).as_deref(), Some("1.1.1"));
    }

    #[test]
    fn test_detect() {
        let registry = SchemaRegistry::new().unwrap();
        let detected = registry.detect(&cybox_doc("0", "1", "")).unwrap();
        assert_eq!(detected.family, SchemaFamily::Cybox);
        assert_eq!(detected.version.as_deref(), Some("2.0.1"));

        let package = Element::new(QName::new(stix::NS_STIX, "STIX_Package")).with_attribute(QName::local("version"), "1.1");
        assert_eq!(registry.detect(&package).unwrap().version.as_deref(), Some("1.1"));

        let other = Element::new(QName::new("urn:other", "Root"));
        assert!(matches!(registry.detect(&other), Err(RegistryError::UnknownDocument(_))));
    }

    #[test]
    fn test_chained_update_to_latest() {
        let registry = SchemaRegistry::new().unwrap();
        let mut root = cybox_doc(
            "0",
            "0",
            r#"<cybox:Observable id="example:Observable-1">
                 <cybox:Event><cybox:Type xsi:type="cyboxVocabs:EventTypeVocab-1.0">Anomoly Events</cybox:Type></cybox:Event>
               </cybox:Observable>"#,
        );

        let outcome = registry.update(&mut root, None, false).unwrap();
        assert_eq!(outcome.source_version, "2.0");
        assert_eq!(outcome.target_version, "2.1");
        assert_eq!(root.attr("cybox_minor_version"), Some("1"));
        assert_eq!(root.attr("cybox_update_version"), Some("0"));

        let kind = &root.children[0].children[0].children[0];
        assert_eq!(kind.text.as_deref(), Some("Anomaly Events"));
    }

    #[test]
    fn test_failed_step_leaves_document_untouched() {
        let registry = SchemaRegistry::new().unwrap();
        let mut root = cybox_doc(
            "0",
            "0",
            r#"<cybox:Observable id="example:Observable-1"/><cybox:Observable id="example:Observable-1"/>"#,
        );
        let before = root.clone();

        let err = registry.update(&mut root, Some("2.1"), false).unwrap_err();
        assert!(matches!(err, RegistryError::Migration(MigrationError::Update(_))));
        assert_eq!(root, before);

        let outcome = registry.update(&mut root, Some("2.1"), true).unwrap();
        assert!(outcome.forced);
        assert_eq!(outcome.report.identifier_remap.len(), 1);
    }

    #[test]
    fn test_check_update_covers_every_step() {
        let registry = SchemaRegistry::new().unwrap();
        let root = cybox_doc("0", "0", r#"<cybox:Observable id="a"/><cybox:Observable id="a"/>"#);

        assert!(registry.check_update(&root, Some("2.0.1")).is_ok());
        assert!(matches!(
            registry.check_update(&root, None),
            Err(RegistryError::Migration(MigrationError::Update(_)))
        ));
        assert_eq!(root.attr("cybox_update_version"), Some("0"));
        assert_eq!(
            registry.final_updater(SchemaFamily::Cybox, "2.1").unwrap().source_version,
            "2.0.1"
        );
    }

    #[test]
    fn test_migration_path_errors() {
        let registry = SchemaRegistry::new().unwrap();
        assert!(matches!(
            registry.migration_path(SchemaFamily::Cybox, "1.0", "2.1"),
            Err(RegistryError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            registry.migration_path(SchemaFamily::Cybox, "2.0", "3.0"),
            Err(RegistryError::NoMigrationPath(_, _))
        ));
        assert!(registry.migration_path(SchemaFamily::Stix, "1.1.1", "1.1.1").unwrap().is_empty());
    }

    #[test]
    fn test_up_to_date_document_is_rejected() {
        let registry = SchemaRegistry::new().unwrap();
        let mut root = cybox_doc("1", "0", "");
        let before = root.clone();

        match registry.update(&mut root, None, false) {
            Err(RegistryError::Migration(MigrationError::InvalidVersion { expected, found })) => {
                assert_eq!(expected, "2.0.1");
                assert_eq!(found, "2.1");
            }
            other => panic!("expected an invalid version, got {:?}", other),
        }
        assert_eq!(root, before);
        assert!(registry.check_update(&root, Some("2.1")).is_err());

        let mut current = cybox_doc("0", "1", "");
        assert!(matches!(
            registry.update(&mut current, Some("2.0.1"), true),
            Err(RegistryError::Migration(MigrationError::InvalidVersion { .. }))
        ));
        assert!(matches!(
            registry.update(&mut current, Some("2.0"), true),
            Err(RegistryError::NoMigrationPath(_, _))
        ));
    }

    #[test]
    fn test_table_with_malformed_version_is_rejected() {
        let mut table = cybox::cybox_2_0_1().unwrap();
        table.target_version = "2.l".to_string();

        match validate_table(UpdaterKind::Cybox2_0_1, Ok(table)) {
            Err(RegistryError::InvalidTable { kind, source }) => {
                assert_eq!(kind, UpdaterKind::Cybox2_0_1);
                assert!(matches!(source, RuleError::InvalidVersion(_)));
            }
            other => panic!("expected an invalid table, got {:?}", other),
        }
        assert!(validate_table(UpdaterKind::Cybox2_0_1, cybox::cybox_2_0_1()).is_ok());
    }
}
