use super::prefix_map;
use crate::document::{QName, NS_XSI};
use crate::rules::{
    DisallowedConstructSpec, NodeSelector, OptionalElementSpec, PrefixMap, RuleError, TranslatableFieldSpec,
};
use crate::updater::{SchemaFamily, VersionScheme, VersionUpdater};
use crate::vocabulary::Vocabulary;

pub const NS_CYBOX: &str = "http://cybox.mitre.org/cybox-2";
pub const NS_CYBOX_COMMON: &str = "http://cybox.mitre.org/common-2";
pub const NS_CYBOX_VOCABS: &str = "http://cybox.mitre.org/default_vocabularies-2";

/// Prefixes the CybOX rules are written with
pub fn nsmap() -> PrefixMap {
    prefix_map(&[
        ("cybox", NS_CYBOX),
        ("cyboxCommon", NS_CYBOX_COMMON),
        ("cyboxVocabs", NS_CYBOX_VOCABS),
        ("cybox-cpe", "http://cybox.mitre.org/extensions/platform#CPE2.3-1"),
        ("AddressObj", "http://cybox.mitre.org/objects#AddressObject-2"),
        ("ArtifactObj", "http://cybox.mitre.org/objects#ArtifactObject-2"),
        ("DNSQueryObj", "http://cybox.mitre.org/objects#DNSQueryObject-2"),
        ("DomainNameObj", "http://cybox.mitre.org/objects#DomainNameObject-1"),
        ("EmailMessageObj", "http://cybox.mitre.org/objects#EmailMessageObject-2"),
        ("FileObj", "http://cybox.mitre.org/objects#FileObject-2"),
        ("HTTPSessionObj", "http://cybox.mitre.org/objects#HTTPSessionObject-2"),
        ("LinkObj", "http://cybox.mitre.org/objects#LinkObject-1"),
        ("MutexObj", "http://cybox.mitre.org/objects#MutexObject-2"),
        ("NetworkConnectionObj", "http://cybox.mitre.org/objects#NetworkConnectionObject-2"),
        ("PortObj", "http://cybox.mitre.org/objects#PortObject-2"),
        ("ProcessObj", "http://cybox.mitre.org/objects#ProcessObject-2"),
        ("SocketAddressObj", "http://cybox.mitre.org/objects#SocketAddressObject-1"),
        ("URIObj", "http://cybox.mitre.org/objects#URIObject-2"),
        ("WinExecutableFileObj", "http://cybox.mitre.org/objects#WinExecutableFileObject-2"),
        ("WinFileObj", "http://cybox.mitre.org/objects#WinFileObject-2"),
        ("WinRegistryKeyObj", "http://cybox.mitre.org/objects#WinRegistryKeyObject-2"),
        ("X509CertificateObj", "http://cybox.mitre.org/objects#X509CertificateObject-2"),
        ("xsi", NS_XSI),
    ])
}

/// Object namespace, schema directory and file stem
const OBJECT_SCHEMAS: &[(&str, &str, &str)] = &[
    ("http://cybox.mitre.org/objects#AddressObject-2", "Address", "Address_Object"),
    ("http://cybox.mitre.org/objects#ArtifactObject-2", "Artifact", "Artifact_Object"),
    ("http://cybox.mitre.org/objects#DNSQueryObject-2", "DNS_Query", "DNS_Query_Object"),
    ("http://cybox.mitre.org/objects#EmailMessageObject-2", "Email_Message", "Email_Message_Object"),
    ("http://cybox.mitre.org/objects#FileObject-2", "File", "File_Object"),
    ("http://cybox.mitre.org/objects#HTTPSessionObject-2", "HTTP_Session", "HTTP_Session_Object"),
    ("http://cybox.mitre.org/objects#MutexObject-2", "Mutex", "Mutex_Object"),
    (
        "http://cybox.mitre.org/objects#NetworkConnectionObject-2",
        "Network_Connection",
        "Network_Connection_Object",
    ),
    ("http://cybox.mitre.org/objects#PortObject-2", "Port", "Port_Object"),
    ("http://cybox.mitre.org/objects#ProcessObject-2", "Process", "Process_Object"),
    ("http://cybox.mitre.org/objects#URIObject-2", "URI", "URI_Object"),
    (
        "http://cybox.mitre.org/objects#WinExecutableFileObject-2",
        "Win_Executable_File",
        "Win_Executable_File_Object",
    ),
    ("http://cybox.mitre.org/objects#WinFileObject-2", "Win_File", "Win_File_Object"),
    (
        "http://cybox.mitre.org/objects#WinRegistryKeyObject-2",
        "Win_Registry_Key",
        "Win_Registry_Key_Object",
    ),
    (
        "http://cybox.mitre.org/objects#X509CertificateObject-2",
        "X509_Certificate",
        "X509_Certificate_Object",
    ),
];

/// Objects still at major version 1 keep their own release line
const V1_OBJECT_SCHEMAS: &[V1ObjectSchema] = &[
    V1ObjectSchema {
        namespace: "http://cybox.mitre.org/objects#LinkObject-1",
        dir: "Link",
        file: "Link_Object",
        releases: (Some("1.0.1"), "1.1"),
    },
    V1ObjectSchema {
        namespace: "http://cybox.mitre.org/objects#SocketAddressObject-1",
        dir: "Socket_Address",
        file: "Socket_Address_Object",
        releases: (Some("1.0.1"), "1.1"),
    },
    // new in 2.1
    V1ObjectSchema {
        namespace: "http://cybox.mitre.org/objects#DomainNameObject-1",
        dir: "Domain_Name",
        file: "Domain_Name_Object",
        releases: (None, "1.0"),
    },
];

struct V1ObjectSchema {
    namespace: &'static str,
    dir: &'static str,
    file: &'static str,
    /// Object release shipped with CybOX 2.0.1 and 2.1
    releases: (Option<&'static str>, &'static str),
}

fn schema_locations(
    release: &str,
    object_release: impl Fn(&V1ObjectSchema) -> Option<&'static str>,
) -> Vec<(String, String)> {
    let base = "http://cybox.mitre.org/XMLSchema";
    let mut locations = vec![
        (NS_CYBOX.to_string(), format!("{}/core/{}/cybox_core.xsd", base, release)),
        (NS_CYBOX_COMMON.to_string(), format!("{}/common/{}/cybox_common.xsd", base, release)),
        (
            NS_CYBOX_VOCABS.to_string(),
            format!("{}/default_vocabularies/{}/cybox_default_vocabularies.xsd", base, release),
        ),
        (
            "http://cybox.mitre.org/extensions/platform#CPE2.3-1".to_string(),
            "http://cybox.mitre.org/XMLSchema/extensions/platform/cpe2.3/1.0.1/cpe2.3.xsd".to_string(),
        ),
    ];
    for (ns, dir, file) in OBJECT_SCHEMAS {
        locations.push((ns.to_string(), format!("{}/objects/{}/{}/{}.xsd", base, dir, release, file)));
    }
    for object in V1_OBJECT_SCHEMAS {
        if let Some(object_release) = object_release(object) {
            locations.push((
                object.namespace.to_string(),
                format!("{}/objects/{}/{}/{}.xsd", base, object.dir, object_release, object.file),
            ));
        }
    }
    locations
}

/// CybOX 2.0 → 2.0.1: location, vocabulary and spelling fixes only
pub fn cybox_2_0() -> Result<VersionUpdater, RuleError> {
    let locations = schema_locations("2.0.1", |object| object.releases.0);
    Ok(
        VersionUpdater::new(SchemaFamily::Cybox, "2.0", "2.0.1", VersionScheme::CyboxTriplet)
            .with_schema_locations(locations.iter().map(|(ns, loc)| (ns.as_str(), loc.as_str())))
            .with_vocabulary(
                QName::new(NS_CYBOX_VOCABS, "EventTypeVocab-1.0"),
                Vocabulary::new(
                    "EventTypeVocab-1.0.1",
                    "CybOX Default Event Type Vocabulary",
                    "http://cybox.mitre.org/XMLSchema/default_vocabularies/2.0.1/cybox_default_vocabularies.xsd#EventTypeVocab-1.0.1",
                )
                .with_correction("Anomoly Events", "Anomaly Events"),
            ),
    )
}

/// CybOX 2.0.1 → 2.1: ids become schematically unique
pub fn cybox_2_0_1() -> Result<VersionUpdater, RuleError> {
    let ns = nsmap();
    let locations = schema_locations("2.1", |object| Some(object.releases.1));

    Ok(
        VersionUpdater::new(SchemaFamily::Cybox, "2.0.1", "2.1", VersionScheme::CyboxTriplet)
            .with_schema_locations(locations.iter().map(|(ns, loc)| (ns.as_str(), loc.as_str())))
            .with_vocabulary(
                QName::new(NS_CYBOX_VOCABS, "ObjectRelationshipVocab-1.0"),
                Vocabulary::new(
                    "ObjectRelationshipVocab-1.1",
                    "CybOX Default Object-Object Relationships",
                    "http://cybox.mitre.org/XMLSchema/default_vocabularies/2.1/cybox_default_vocabularies.xsd#ObjectRelationshipVocab-1.1",
                ),
            )
            .with_vocabulary(
                QName::new(NS_CYBOX_VOCABS, "ToolTypeVocab-1.0"),
                Vocabulary::new(
                    "ToolTypeVocab-1.1",
                    "CybOX Default Tool Types",
                    "http://cybox.mitre.org/XMLSchema/default_vocabularies/2.1/cybox_default_vocabularies.xsd#ToolTypeVocab-1.1",
                ),
            )
            .with_disallowed(DisallowedConstructSpec::new(
                "network-connection-layer7",
                NodeSelector::new(&ns, "NetworkConnectionObj:Layer7_Connections")?
                    .child_of_typed(&ns, "NetworkConnectionObj:NetworkConnectionObjectType")?,
            ))
            .with_disallowed(DisallowedConstructSpec::new(
                "object-keywords",
                NodeSelector::new(&ns, "cybox:Keywords")?.child_of(&ns, "cybox:Object")?,
            ))
            .with_disallowed(DisallowedConstructSpec::new(
                "win-executable-peinfo-type",
                NodeSelector::new(&ns, "WinExecutableFileObj:Type")?
                    .child_of_typed(&ns, "WinExecutableFileObj:WindowsExecutableFileObjectType")?,
            ))
            .with_optional(OptionalElementSpec::new(NodeSelector::new(&ns, "cyboxCommon:Hashes")?))
            .with_optional(OptionalElementSpec::new(
                NodeSelector::new(&ns, "cybox:Observable_Composition")?.child_of(&ns, "cybox:Observable")?,
            ))
            .with_translatable(TranslatableFieldSpec::new(
                &ns,
                NodeSelector::new(&ns, "EmailMessageObj:Raw_Header")?,
                "EmailMessageObj:Raw_Headers",
            )?)
            .enforcing_unique_ids(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use crate::xml;

    fn observables(minor: &str, update: Option<&str>, body: &str) -> String {
        format!(
            r#"<cybox:Observables xmlns:cybox="{cybox}" xmlns:cyboxCommon="{common}"
                xmlns:NetworkConnectionObj="http://cybox.mitre.org/objects#NetworkConnectionObject-2"
                xmlns:EmailMessageObj="http://cybox.mitre.org/objects#EmailMessageObject-2"
                xmlns:cyboxVocabs="{vocabs}" xmlns:xsi="{xsi}"
                xsi:schemaLocation="{cybox} http://cybox.mitre.org/XMLSchema/core/2.0/cybox_core.xsd"
                cybox_major_version="2" cybox_minor_version="{minor}"{update}>
              {body}
            </cybox:Observables>"#,
            cybox = NS_CYBOX,
            common = NS_CYBOX_COMMON,
            vocabs = NS_CYBOX_VOCABS,
            xsi = NS_XSI,
            minor = minor,
            update = update.map(|u| format!(r#" cybox_update_version="{}""#, u)).unwrap_or_default(),
            body = body,
        )
    }

    #[test]
    fn test_tables_build() {
        assert!(cybox_2_0().is_ok());
        let updater = cybox_2_0_1().unwrap();
        assert_eq!(updater.disallowed.len(), 3);
        assert!(updater.enforce_unique_ids);
    }

    #[test]
    fn test_cybox_2_0_corrects_event_terms() {
        let updater = cybox_2_0().unwrap();
        let mut root = xml::parse(&observables(
            "0",
            None,
            r#"<cybox:Observable id="example:Observable-1">
                 <cybox:Event><cybox:Type xsi:type="cyboxVocabs:EventTypeVocab-1.0">Anomoly Events</cybox:Type></cybox:Event>
               </cybox:Observable>"#,
        ))
        .unwrap();

        let outcome = updater.update(&mut root, false).unwrap();
        assert!(outcome.warnings.is_empty());

        let kind = &root.children[0].children[0].children[0];
        assert_eq!(kind.xsi_type(), Some("cyboxVocabs:EventTypeVocab-1.0.1"));
        assert_eq!(kind.text.as_deref(), Some("Anomaly Events"));
        assert_eq!(root.attr("cybox_minor_version"), Some("0"));
        assert_eq!(root.attr("cybox_update_version"), Some("1"));
        assert_eq!(
            root.attributes[&QName::xsi("schemaLocation")],
            format!("{} http://cybox.mitre.org/XMLSchema/core/2.0.1/cybox_core.xsd", NS_CYBOX)
        );
    }

    #[test]
    fn test_cybox_2_0_1_rejects_layer7_connections() {
        let updater = cybox_2_0_1().unwrap();
        let text = observables(
            "0",
            Some("1"),
            r#"<cybox:Observable id="example:Observable-1">
                 <cybox:Object>
                   <cybox:Properties xsi:type="NetworkConnectionObj:NetworkConnectionObjectType">
                     <NetworkConnectionObj:Layer7_Connections/>
                   </cybox:Properties>
                 </cybox:Object>
               </cybox:Observable>"#,
        );
        let mut root = xml::parse(&text).unwrap();

        match updater.update(&mut root, false) {
            Err(MigrationError::Update(error)) => {
                assert_eq!(error.disallowed.len(), 1);
                assert_eq!(error.disallowed[0].rule_id, "network-connection-layer7");
            }
            other => panic!("expected an update error, got {:?}", other),
        }

        let outcome = updater.update(&mut root, true).unwrap();
        assert_eq!(outcome.report.removed_fragments.len(), 1);
        assert_eq!(root.attr("cybox_minor_version"), Some("1"));
        assert_eq!(root.attr("cybox_update_version"), Some("0"));
    }

    #[test]
    fn test_cybox_2_0_1_renames_and_prunes() {
        let updater = cybox_2_0_1().unwrap();
        let mut root = xml::parse(&observables(
            "0",
            Some("1"),
            r#"<cybox:Observable id="example:Observable-1">
                 <cybox:Object>
                   <cybox:Properties xsi:type="EmailMessageObj:EmailMessageObjectType">
                     <EmailMessageObj:Raw_Header>From: a@example.com</EmailMessageObj:Raw_Header>
                   </cybox:Properties>
                   <cyboxCommon:Hashes/>
                 </cybox:Object>
               </cybox:Observable>"#,
        ))
        .unwrap();

        updater.update(&mut root, false).unwrap();
        let object = &root.children[0].children[0];
        assert_eq!(object.children.len(), 1);
        let header = &object.children[0].children[0];
        assert_eq!(header.name.local, "Raw_Headers");
        assert_eq!(header.text.as_deref(), Some("From: a@example.com"));
    }
}
