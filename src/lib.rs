// STIX/CybOX document version updater
pub mod document;
pub mod xml;
pub mod schema_version;
pub mod rules;
pub mod vocabulary;
pub mod namespaces;
pub mod scanner;
pub mod duplicates;
pub mod updater;
pub mod pipeline;
pub mod error;
pub mod report;
pub mod reporter;
pub mod registry;
pub mod validation;
pub mod config;
pub mod tables;

// Re-export core types for convenience
pub use document::{Element, NodePath, QName};
pub use schema_version::SchemaVersion;
pub use rules::{DisallowedConstructSpec, NodeSelector, OptionalElementSpec, RuleError, TranslatableFieldSpec};
pub use vocabulary::Vocabulary;
pub use updater::{SchemaFamily, VersionScheme, VersionUpdater};
pub use error::{MigrationError, OffendingNode, UpdateError};
pub use report::{MigrationReport, RemovedFragment, UpdateOutcome, UpdateWarning};
pub use reporter::{MigrationReporter, MigrationSummary, ReportFormat};
pub use registry::{RegistryError, SchemaRegistry, UpdaterKind};
pub use validation::{ValidationError, ValidationReport, ValidationWarning};
pub use config::UpdateOptions;
