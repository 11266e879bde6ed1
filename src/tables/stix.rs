use super::{cybox, prefix_map};
use crate::document::{QName, NS_XSI};
use crate::rules::{PrefixMap, RuleError};
use crate::updater::{SchemaFamily, VersionScheme, VersionUpdater};
use crate::vocabulary::Vocabulary;

pub const NS_STIX: &str = "http://stix.mitre.org/stix-1";
pub const NS_STIX_VOCABS: &str = "http://stix.mitre.org/default_vocabularies-1";
pub const NS_CIQ_IDENTITY_OLD: &str = "http://stix.mitre.org/extensions/Identity#stix-ciq3.0-1";
pub const NS_CIQ_IDENTITY: &str = "http://stix.mitre.org/extensions/Identity#CIQIdentity3.0-1";

/// Prefixes the STIX 1.1 rules are written with
pub fn nsmap() -> PrefixMap {
    prefix_map(&[
        ("TOUMarking", "http://data-marking.mitre.org/extensions/MarkingStructure#Terms_Of_Use-1"),
        ("campaign", "http://stix.mitre.org/Campaign-1"),
        ("coa", "http://stix.mitre.org/CourseOfAction-1"),
        ("et", "http://stix.mitre.org/ExploitTarget-1"),
        ("genericStructuredCOA", "http://stix.mitre.org/extensions/StructuredCOA#Generic-1"),
        ("genericTM", "http://stix.mitre.org/extensions/TestMechanism#Generic-1"),
        ("incident", "http://stix.mitre.org/Incident-1"),
        ("indicator", "http://stix.mitre.org/Indicator-2"),
        ("marking", "http://data-marking.mitre.org/Marking-1"),
        ("simpleMarking", "http://data-marking.mitre.org/extensions/MarkingStructure#Simple-1"),
        ("snortTM", "http://stix.mitre.org/extensions/TestMechanism#Snort-1"),
        ("stix", NS_STIX),
        ("stix-capec", "http://stix.mitre.org/extensions/AP#CAPEC2.7-1"),
        ("stix-ciqaddress", "http://stix.mitre.org/extensions/Address#CIQAddress3.0-1"),
        ("stix-ciqidentity", NS_CIQ_IDENTITY_OLD),
        ("stix-cvrf", "http://stix.mitre.org/extensions/Vulnerability#CVRF-1"),
        ("stix-maec", "http://stix.mitre.org/extensions/Malware#MAEC4.1-1"),
        ("stix-openioc", "http://stix.mitre.org/extensions/TestMechanism#OpenIOC2010-1"),
        ("stix-oval", "http://stix.mitre.org/extensions/TestMechanism#OVAL5.10-1"),
        ("stixCommon", "http://stix.mitre.org/common-1"),
        ("stixVocabs", NS_STIX_VOCABS),
        ("ta", "http://stix.mitre.org/ThreatActor-1"),
        ("tlpMarking", "http://data-marking.mitre.org/extensions/MarkingStructure#TLP-1"),
        ("ttp", "http://stix.mitre.org/TTP-1"),
        ("yaraTM", "http://stix.mitre.org/extensions/TestMechanism#YARA-1"),
        ("xsi", NS_XSI),
    ])
}

// STIX 1.1.1 namespace => schema location
const SCHEMA_LOCATIONS: &[(&str, &str)] = &[
    ("http://data-marking.mitre.org/Marking-1", "http://stix.mitre.org/XMLSchema/data_marking/1.1.1/data_marking.xsd"),
    (
        "http://data-marking.mitre.org/extensions/MarkingStructure#Simple-1",
        "http://stix.mitre.org/XMLSchema/extensions/marking/simple/1.1.1/simple_marking.xsd",
    ),
    (
        "http://data-marking.mitre.org/extensions/MarkingStructure#TLP-1",
        "http://stix.mitre.org/XMLSchema/extensions/marking/tlp/1.1.1/tlp_marking.xsd",
    ),
    (
        "http://data-marking.mitre.org/extensions/MarkingStructure#Terms_Of_Use-1",
        "http://stix.mitre.org/XMLSchema/extensions/marking/terms_of_use/1.0.1/terms_of_use_marking.xsd",
    ),
    ("http://stix.mitre.org/Campaign-1", "http://stix.mitre.org/XMLSchema/campaign/1.1.1/campaign.xsd"),
    (
        "http://stix.mitre.org/CourseOfAction-1",
        "http://stix.mitre.org/XMLSchema/course_of_action/1.1.1/course_of_action.xsd",
    ),
    (
        "http://stix.mitre.org/ExploitTarget-1",
        "http://stix.mitre.org/XMLSchema/exploit_target/1.1.1/exploit_target.xsd",
    ),
    ("http://stix.mitre.org/Incident-1", "http://stix.mitre.org/XMLSchema/incident/1.1.1/incident.xsd"),
    ("http://stix.mitre.org/Indicator-2", "http://stix.mitre.org/XMLSchema/indicator/2.1.1/indicator.xsd"),
    ("http://stix.mitre.org/TTP-1", "http://stix.mitre.org/XMLSchema/ttp/1.1.1/ttp.xsd"),
    (
        "http://stix.mitre.org/ThreatActor-1",
        "http://stix.mitre.org/XMLSchema/threat_actor/1.1.1/threat_actor.xsd",
    ),
    ("http://stix.mitre.org/common-1", "http://stix.mitre.org/XMLSchema/common/1.1.1/stix_common.xsd"),
    (
        "http://stix.mitre.org/default_vocabularies-1",
        "http://stix.mitre.org/XMLSchema/default_vocabularies/1.1.1/stix_default_vocabularies.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/AP#CAPEC2.7-1",
        "http://stix.mitre.org/XMLSchema/extensions/attack_pattern/capec_2.7/1.0.1/capec_2.7_attack_pattern.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/Address#CIQAddress3.0-1",
        "http://stix.mitre.org/XMLSchema/extensions/address/ciq_3.0/1.1.1/ciq_3.0_address.xsd",
    ),
    (
        NS_CIQ_IDENTITY,
        "http://stix.mitre.org/XMLSchema/extensions/identity/ciq_3.0/1.1.1/ciq_3.0_identity.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/Malware#MAEC4.1-1",
        "http://stix.mitre.org/XMLSchema/extensions/malware/maec_4.1/1.0.1/maec_4.1_malware.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/StructuredCOA#Generic-1",
        "http://stix.mitre.org/XMLSchema/extensions/structured_coa/generic/1.1.1/generic_structured_coa.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/TestMechanism#Generic-1",
        "http://stix.mitre.org/XMLSchema/extensions/test_mechanism/generic/1.1.1/generic_test_mechanism.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/TestMechanism#OVAL5.10-1",
        "http://stix.mitre.org/XMLSchema/extensions/test_mechanism/oval_5.10/1.1.1/oval_5.10_test_mechanism.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/TestMechanism#OpenIOC2010-1",
        "http://stix.mitre.org/XMLSchema/extensions/test_mechanism/open_ioc_2010/1.1.1/open_ioc_2010_test_mechanism.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/TestMechanism#Snort-1",
        "http://stix.mitre.org/XMLSchema/extensions/test_mechanism/snort/1.1.1/snort_test_mechanism.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/TestMechanism#YARA-1",
        "http://stix.mitre.org/XMLSchema/extensions/test_mechanism/yara/1.1.1/yara_test_mechanism.xsd",
    ),
    (
        "http://stix.mitre.org/extensions/Vulnerability#CVRF-1",
        "http://stix.mitre.org/XMLSchema/extensions/vulnerability/cvrf_1.1/1.1.1/cvrf_1.1_vulnerability.xsd",
    ),
    (NS_STIX, "http://stix.mitre.org/XMLSchema/core/1.1.1/stix_core.xsd"),
];

/// STIX 1.1 → 1.1.1. Observables embedded in the package are CybOX 2.0.1
/// and move to 2.1 along with it.
pub fn stix_1_1() -> Result<VersionUpdater, RuleError> {
    Ok(VersionUpdater::new(
        SchemaFamily::Stix,
        "1.1",
        "1.1.1",
        VersionScheme::Attribute("version".to_string()),
    )
    .with_namespace(NS_CIQ_IDENTITY_OLD, NS_CIQ_IDENTITY)
    .with_schema_locations(SCHEMA_LOCATIONS.iter().copied())
    .with_vocabulary(
        QName::new(NS_STIX_VOCABS, "AvailabilityLossTypeVocab-1.0"),
        Vocabulary::new(
            "AvailabilityLossTypeVocab-1.1.1",
            "STIX Default Availability Loss Type Vocabulary",
            "http://stix.mitre.org/XMLSchema/default_vocabularies/1.1.1/stix_default_vocabularies.xsd#AvailabilityLossTypeVocab-1.1.1",
        )
        .with_correction("Degredation", "Degradation"),
    )
    .with_version_exception("Indicator", "2.1.1")
    .with_embedded(vec![QName::new(NS_STIX, "Observables")], cybox::cybox_2_0_1()?))
}
