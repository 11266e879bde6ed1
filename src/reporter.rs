use serde::{Deserialize, Serialize};

use crate::report::{UpdateOutcome, UpdateWarning};
use crate::validation::ValidationReport;
use crate::xml;

/// Reporter for rendering update outcomes in various formats
pub struct MigrationReporter {
    output_format: ReportFormat,
}

/// Available output formats for update reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Console,
    Json,
    Yaml,
}

/// Serializable view of an update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub source_version: String,
    pub target_version: String,
    pub forced: bool,
    pub removed_fragments: Vec<FragmentSummary>,
    pub identifier_remap: Vec<IdentifierRemap>,
    pub warnings: Vec<UpdateWarning>,
    pub validation: Option<ValidationSummary>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentSummary {
    pub path: String,
    pub rule_id: String,
    pub tag: String,
    /// The removed sub-tree as XML text
    pub xml: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierRemap {
    pub original: String,
    pub replacements: Vec<String>,
}

/// Summary of post-update verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_errors: usize,
    pub is_valid: bool,
}

impl MigrationReporter {
    pub fn new() -> Self {
        Self {
            output_format: ReportFormat::Console,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn generate_summary(
        &self,
        outcome: &UpdateOutcome,
        validation: Option<&ValidationReport>,
    ) -> Result<MigrationSummary, ReportError> {
        let removed_fragments = outcome
            .report
            .removed_fragments
            .iter()
            .map(|fragment| {
                xml::fragment_to_string(&fragment.element, &fragment.scope)
                    .map(|xml| FragmentSummary {
                        path: fragment.path.to_string(),
                        rule_id: fragment.rule_id.clone(),
                        tag: fragment.tag().to_string(),
                        xml,
                    })
                    .map_err(|e| ReportError::SerializationError(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let identifier_remap = outcome
            .report
            .identifier_remap
            .iter()
            .map(|(original, replacements)| IdentifierRemap {
                original: original.clone(),
                replacements: replacements.clone(),
            })
            .collect();

        Ok(MigrationSummary {
            source_version: outcome.source_version.clone(),
            target_version: outcome.target_version.clone(),
            forced: outcome.forced,
            removed_fragments,
            identifier_remap,
            warnings: outcome.warnings.clone(),
            validation: validation.map(|report| ValidationSummary {
                total_errors: report.errors.len(),
                is_valid: report.is_valid,
            }),
            recommendations: self.generate_recommendations(outcome, validation),
        })
    }

    /// Format the summary according to the configured output format
    pub fn format_summary(&self, summary: &MigrationSummary) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => Ok(self.format_console_report(summary)),
            ReportFormat::Json => {
                serde_json::to_string_pretty(summary).map_err(|e| ReportError::SerializationError(e.to_string()))
            }
            ReportFormat::Yaml => {
                serde_yaml::to_string(summary).map_err(|e| ReportError::SerializationError(e.to_string()))
            }
        }
    }

    fn generate_recommendations(&self, outcome: &UpdateOutcome, validation: Option<&ValidationReport>) -> Vec<String> {
        let mut recommendations = Vec::new();

        if !outcome.report.removed_fragments.is_empty() {
            recommendations.push("Review the removed fragments; their content is not present in the output".to_string());
        }
        if !outcome.report.identifier_remap.is_empty() {
            recommendations.push("References to renamed ids still point at the first occurrence".to_string());
        }
        if !outcome.warnings.is_empty() {
            recommendations.push("Check schemaLocation hints that were kept unchanged".to_string());
        }
        if validation.is_some_and(|report| !report.is_valid) {
            recommendations.push("Address verification errors before publishing the document".to_string());
        }

        recommendations
    }

    fn format_console_report(&self, summary: &MigrationSummary) -> String {
        let mut output = String::new();

        output.push_str("=== Document Update Report ===\n\n");
        output.push_str(&format!("Source Version: {}\n", summary.source_version));
        output.push_str(&format!("Target Version: {}\n", summary.target_version));
        output.push_str(&format!("Forced: {}\n", if summary.forced { "yes" } else { "no" }));

        if !summary.removed_fragments.is_empty() {
            output.push_str(&format!("\nRemoved Fragments ({}):\n", summary.removed_fragments.len()));
            for fragment in &summary.removed_fragments {
                output.push_str(&format!("  • {} at {} ({})\n", fragment.tag, fragment.path, fragment.rule_id));
            }
        }

        if !summary.identifier_remap.is_empty() {
            output.push_str("\nRenamed IDs:\n");
            for remap in &summary.identifier_remap {
                output.push_str(&format!("  • {} -> {}\n", remap.original, remap.replacements.join(", ")));
            }
        }

        if !summary.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &summary.warnings {
                output.push_str(&format!("  ⚠ {}\n", warning.message));
            }
        }

        if let Some(validation) = &summary.validation {
            output.push_str(&format!(
                "\nVerification Status: {}\n",
                if validation.is_valid { "VALID" } else { "INVALID" }
            ));
        }

        if !summary.recommendations.is_empty() {
            output.push_str("\nRecommendations:\n");
            for rec in &summary.recommendations {
                output.push_str(&format!("  • {}\n", rec));
            }
        }

        output
    }
}

impl Default for MigrationReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
