use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::{Element, QName};
use crate::rules::{DisallowedConstructSpec, OptionalElementSpec, TranslatableFieldSpec};
use crate::schema_version::{SchemaVersion, SchemaVersionError};
use crate::vocabulary::{Vocabulary, VocabularyMap};

const CYBOX_MAJOR: &str = "cybox_major_version";
const CYBOX_MINOR: &str = "cybox_minor_version";
const CYBOX_UPDATE: &str = "cybox_update_version";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaFamily {
    Stix,
    Cybox,
}

impl fmt::Display for SchemaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaFamily::Stix => write!(f, "STIX"),
            SchemaFamily::Cybox => write!(f, "CybOX"),
        }
    }
}

/// How a document (or embedded sub-tree) declares its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionScheme {
    /// A single attribute, e.g. `version="1.1"`
    Attribute(String),
    /// `cybox_major_version`, `cybox_minor_version` and `cybox_update_version`
    CyboxTriplet,
}

impl VersionScheme {
    pub fn declared(&self, element: &Element) -> Option<String> {
        match self {
            VersionScheme::Attribute(name) => element.attr(name).map(str::to_string),
            VersionScheme::CyboxTriplet => {
                let major = element.attr(CYBOX_MAJOR)?;
                let minor = element.attr(CYBOX_MINOR).unwrap_or("0");
                let update = element.attr(CYBOX_UPDATE);
                Some(match SchemaVersion::from_triplet(major, minor, update) {
                    Ok(version) => version.to_string(),
                    Err(_) => format!("{}.{}.{}", major, minor, update.unwrap_or("")),
                })
            }
        }
    }

    /// Whether `element` carries a version under this scheme
    pub fn carries(&self, element: &Element) -> bool {
        match self {
            VersionScheme::Attribute(name) => element.attr(name).is_some(),
            VersionScheme::CyboxTriplet => element.attr(CYBOX_MAJOR).is_some(),
        }
    }

    pub fn stamp(&self, element: &mut Element, version: &str) {
        match self {
            VersionScheme::Attribute(name) => element.set_attr(name, version),
            VersionScheme::CyboxTriplet => {
                if let Ok(parsed) = version.parse::<SchemaVersion>() {
                    let (major, minor, update) = parsed.to_triplet();
                    element.set_attr(CYBOX_MAJOR, major);
                    element.set_attr(CYBOX_MINOR, minor);
                    element.set_attr(CYBOX_UPDATE, update);
                }
            }
        }
    }
}

/// Content of a second, independently versioned schema. Its version is
/// declared on the root elements; its constructs may appear anywhere in the
/// document and are checked and rewritten wherever they occur.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedSchema {
    /// Element names that carry the embedded schema's version
    pub roots: Vec<QName>,
    pub updater: Box<VersionUpdater>,
}

impl EmbeddedSchema {
    pub fn is_root(&self, element: &Element) -> bool {
        self.roots.contains(&element.name) && self.updater.version_scheme.carries(element)
    }
}

/// Configuration for one source → target version step. Immutable once
/// built; every call's report is returned, never stored here.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionUpdater {
    pub family: SchemaFamily,
    pub source_version: String,
    pub target_version: String,
    pub version_scheme: VersionScheme,
    pub namespace_map: IndexMap<String, String>,
    pub schema_location_map: IndexMap<String, String>,
    pub vocabulary_map: VocabularyMap,
    /// Local names of constructs versioned by their own scheme, with their target version
    pub version_exceptions: IndexMap<String, String>,
    pub disallowed: Vec<DisallowedConstructSpec>,
    pub optional_elements: Vec<OptionalElementSpec>,
    pub translatable_fields: Vec<TranslatableFieldSpec>,
    /// The target version newly requires unique ids
    pub enforce_unique_ids: bool,
    pub embedded: Option<EmbeddedSchema>,
}

impl VersionUpdater {
    pub fn new(
        family: SchemaFamily,
        source_version: impl Into<String>,
        target_version: impl Into<String>,
        version_scheme: VersionScheme,
    ) -> Self {
        Self {
            family,
            source_version: source_version.into(),
            target_version: target_version.into(),
            version_scheme,
            namespace_map: IndexMap::new(),
            schema_location_map: IndexMap::new(),
            vocabulary_map: VocabularyMap::new(),
            version_exceptions: IndexMap::new(),
            disallowed: Vec::new(),
            optional_elements: Vec::new(),
            translatable_fields: Vec::new(),
            enforce_unique_ids: false,
            embedded: None,
        }
    }

    pub fn with_namespace(mut self, old: &str, new: &str) -> Self {
        self.namespace_map.insert(old.to_string(), new.to_string());
        self
    }

    pub fn with_schema_locations<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.schema_location_map
            .extend(pairs.into_iter().map(|(ns, loc)| (ns.to_string(), loc.to_string())));
        self
    }

    /// `source_type` is the resolved `xsi:type` found in source documents
    pub fn with_vocabulary(mut self, source_type: QName, vocabulary: Vocabulary) -> Self {
        self.vocabulary_map.insert(source_type, vocabulary);
        self
    }

    pub fn with_version_exception(mut self, local_name: &str, version: &str) -> Self {
        self.version_exceptions.insert(local_name.to_string(), version.to_string());
        self
    }

    pub fn with_disallowed(mut self, spec: DisallowedConstructSpec) -> Self {
        self.disallowed.push(spec);
        self
    }

    pub fn with_optional(mut self, spec: OptionalElementSpec) -> Self {
        self.optional_elements.push(spec);
        self
    }

    pub fn with_translatable(mut self, spec: TranslatableFieldSpec) -> Self {
        self.translatable_fields.push(spec);
        self
    }

    pub fn enforcing_unique_ids(mut self) -> Self {
        self.enforce_unique_ids = true;
        self
    }

    pub fn with_embedded(mut self, roots: Vec<QName>, updater: VersionUpdater) -> Self {
        self.embedded = Some(EmbeddedSchema {
            roots,
            updater: Box::new(updater),
        });
        self
    }

    pub fn declared_version(&self, root: &Element) -> Option<String> {
        self.version_scheme.declared(root)
    }

    /// Version to stamp on `element`: its construct-specific exception, or the target
    pub fn target_version_for(&self, element: &Element) -> &str {
        self.version_exceptions
            .get(&element.name.local)
            .map(String::as_str)
            .unwrap_or(self.target_version.as_str())
    }

    /// This updater followed by every embedded one, outermost first
    pub fn content_updaters(&self) -> Vec<&VersionUpdater> {
        let mut updaters = vec![self];
        let mut current = self;
        while let Some(embedded) = &current.embedded {
            current = &*embedded.updater;
            updaters.push(current);
        }
        updaters
    }

    /// Disallowed constructs of this updater and of embedded schemas
    pub fn disallowed_specs(&self) -> Vec<DisallowedConstructSpec> {
        self.content_updaters()
            .into_iter()
            .flat_map(|updater| updater.disallowed.iter().cloned())
            .collect()
    }

    /// Whether ids must be unique anywhere in the document
    pub fn requires_unique_ids(&self) -> bool {
        self.content_updaters()
            .iter()
            .any(|updater| updater.enforce_unique_ids)
    }

    /// Every version this updater (and its embedded ones) reads or stamps must parse
    pub fn validate_versions(&self) -> Result<(), SchemaVersionError> {
        for updater in self.content_updaters() {
            let versions = [&updater.source_version, &updater.target_version]
                .into_iter()
                .chain(updater.version_exceptions.values());
            for version in versions {
                version.parse::<SchemaVersion>()?;
            }
        }
        Ok(())
    }

    /// Namespace remaps of this updater followed by those of embedded schemas
    pub fn effective_namespace_map(&self) -> IndexMap<String, String> {
        let mut map = self.namespace_map.clone();
        if let Some(embedded) = &self.embedded {
            for (old, new) in embedded.updater.effective_namespace_map() {
                map.entry(old).or_insert(new);
            }
        }
        map
    }

    /// Target schema document for a (target-version) namespace URI
    pub fn schema_location_for(&self, namespace: &str) -> Option<&str> {
        self.schema_location_map
            .get(namespace)
            .map(String::as_str)
            .or_else(|| {
                self.embedded
                    .as_ref()
                    .and_then(|embedded| embedded.updater.schema_location_for(namespace))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_updater_is_shareable() {
        assert_send_sync::<VersionUpdater>();
    }

    #[test]
    fn test_attribute_scheme() {
        let scheme = VersionScheme::Attribute("version".to_string());
        let mut element = Element::new(QName::local("Package"));
        assert_eq!(scheme.declared(&element), None);
        assert!(!scheme.carries(&element));

        scheme.stamp(&mut element, "1.1.1");
        assert_eq!(scheme.declared(&element).as_deref(), Some("1.1.1"));
    }

    #[test]
    fn test_triplet_scheme() {
        let scheme = VersionScheme::CyboxTriplet;
        let mut element = Element::new(QName::local("Observables"))
            .with_attribute(QName::local(CYBOX_MAJOR), "2")
            .with_attribute(QName::local(CYBOX_MINOR), "0")
            .with_attribute(QName::local(CYBOX_UPDATE), "1");
        assert_eq!(scheme.declared(&element).as_deref(), Some("2.0.1"));

        scheme.stamp(&mut element, "2.1");
        assert_eq!(element.attr(CYBOX_MINOR), Some("1"));
        assert_eq!(element.attr(CYBOX_UPDATE), Some("0"));
        assert_eq!(scheme.declared(&element).as_deref(), Some("2.1"));

        let garbled = Element::new(QName::local("Observables")).with_attribute(QName::local(CYBOX_MAJOR), "x");
        assert_eq!(scheme.declared(&garbled).as_deref(), Some("x.0."));
    }

    #[test]
    fn test_version_exceptions_and_lookups() {
        let inner = VersionUpdater::new(SchemaFamily::Cybox, "2.0.1", "2.1", VersionScheme::CyboxTriplet)
            .with_namespace("urn:inner-old", "urn:inner-new")
            .with_schema_locations([("urn:inner-new", "inner.xsd")]);
        let outer = VersionUpdater::new(
            SchemaFamily::Stix,
            "1.1",
            "1.1.1",
            VersionScheme::Attribute("version".to_string()),
        )
        .with_version_exception("Indicator", "2.1.1")
        .with_namespace("urn:old", "urn:new")
        .with_schema_locations([("urn:new", "outer.xsd")])
        .with_embedded(vec![QName::local("Observables")], inner);

        let indicator = Element::new(QName::new("urn:indicator", "Indicator"));
        let campaign = Element::new(QName::new("urn:campaign", "Campaign"));
        assert_eq!(outer.target_version_for(&indicator), "2.1.1");
        assert_eq!(outer.target_version_for(&campaign), "1.1.1");

        let map = outer.effective_namespace_map();
        assert_eq!(map.len(), 2);
        assert_eq!(outer.content_updaters().len(), 2);
        assert!(!outer.requires_unique_ids());
        assert_eq!(outer.schema_location_for("urn:new"), Some("outer.xsd"));
        assert_eq!(outer.schema_location_for("urn:inner-new"), Some("inner.xsd"));
        assert_eq!(outer.schema_location_for("urn:unknown"), None);
    }

    #[test]
    fn test_validate_versions_rejects_malformed_table_entries() {
        let inner = VersionUpdater::new(SchemaFamily::Cybox, "2.0.1", "2.1", VersionScheme::CyboxTriplet)
            .enforcing_unique_ids();
        let outer = VersionUpdater::new(
            SchemaFamily::Stix,
            "1.1",
            "1.1.1",
            VersionScheme::Attribute("version".to_string()),
        )
        .with_version_exception("Indicator", "2.1.1")
        .with_embedded(vec![QName::local("Observables")], inner.clone());
        assert!(outer.validate_versions().is_ok());
        assert!(outer.requires_unique_ids());

        let typo = outer.clone().with_version_exception("Indicator", "2.1.x");
        assert!(typo.validate_versions().is_err());

        let mut bad_inner = inner;
        bad_inner.target_version = "2,1".to_string();
        let nested = outer.with_embedded(vec![QName::local("Observables")], bad_inner);
        assert!(nested.validate_versions().is_err());
    }
}
