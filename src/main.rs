use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use regex::Regex;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cti_migrate::config::{ConfigError, UpdateOptions};
use cti_migrate::reporter::{MigrationReporter, ReportError, ReportFormat};
use cti_migrate::validation::{self, ValidationReport};
use cti_migrate::xml::{self, DocumentError};
use cti_migrate::{RegistryError, SchemaRegistry};

#[derive(Parser, Debug)]
#[command(name = "cti-migrate")]
#[command(about = "Update STIX and CybOX XML documents to a newer schema version")]
struct Args {
    /// Path to the STIX package or CybOX observables document
    file: PathBuf,

    /// Remove constructs the target version forbids and rename duplicate ids
    #[arg(long)]
    force: bool,

    /// Version to update to (e.g., 2.1) - defaults to the newest supported version
    #[arg(long = "to", value_name = "VERSION")]
    to: Option<String>,

    /// Only report whether the document can be updated
    #[arg(long)]
    check: bool,

    /// Verify the updated document before writing it
    #[arg(long)]
    verify: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = FormatArg::Console)]
    format: FormatArg,

    /// Where to write the updated document (default: <name>-updated.xml)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// YAML or JSON file with update options; flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log each update pass
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Console,
    Json,
    Yaml,
}

impl From<FormatArg> for ReportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Console => ReportFormat::Console,
            FormatArg::Json => ReportFormat::Json,
            FormatArg::Yaml => ReportFormat::Yaml,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Updated document failed verification with {} error(s)", .0.errors.len())]
    Verification(ValidationReport),
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("\n❌ Error: {}", e);
        match &e {
            CliError::Verification(report) => {
                for error in &report.errors {
                    eprintln!("  • {} at {}", error.message, error.path);
                    if let Some(fix) = &error.suggested_fix {
                        eprintln!("    ↳ {}", fix);
                    }
                }
            }
            CliError::Registry(RegistryError::Migration(err)) if err.is_recoverable() => {
                eprintln!("\nRe-run with --force to remove the offending content.");
            }
            _ => {}
        }
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(args: &Args) -> Result<(), CliError> {
    let options = match &args.config {
        Some(path) => UpdateOptions::load(path)?,
        None => UpdateOptions::default(),
    }
    .with_force(args.force)
    .with_verify(args.verify)
    .with_target_version(args.to.clone());

    if let Some(target) = &options.target_version {
        validate_version_format(target).map_err(CliError::InvalidArgument)?;
    }

    let text = fs::read_to_string(&args.file).map_err(|source| CliError::Read {
        path: args.file.display().to_string(),
        source,
    })?;
    let mut root = xml::parse(&text)?;

    let registry = SchemaRegistry::new()?;
    let detected = registry.detect(&root)?;
    info!(family = %detected.family, version = ?detected.version, "detected document");

    if args.check {
        registry.check_update(&root, options.target_version.as_deref())?;
        println!("\n=== Update Check ===");
        println!(
            "  ✓ {} {} can be updated",
            detected.family,
            detected.version.as_deref().unwrap_or("")
        );
        return Ok(());
    }

    let outcome = registry.update(&mut root, options.target_version.as_deref(), options.force)?;

    let verification = if options.verify {
        let report = registry
            .final_updater(detected.family, &outcome.target_version)
            .map(|updater| validation::verify(updater, &root))
            .unwrap_or_default();
        if !report.is_valid {
            return Err(CliError::Verification(report));
        }
        Some(report)
    } else {
        None
    };

    let output_file = match &args.output {
        Some(path) => path.clone(),
        None => get_unique_filename(&args.file),
    };
    fs::write(&output_file, xml::to_string(&root)?).map_err(|source| CliError::Write {
        path: output_file.display().to_string(),
        source,
    })?;

    let reporter = MigrationReporter::new().with_format(args.format.into());
    let summary = reporter.generate_summary(&outcome, verification.as_ref())?;
    println!("{}", reporter.format_summary(&summary)?);

    if matches!(args.format, FormatArg::Console) {
        println!("=== Update Complete ===");
        println!("  ✓ Output file: {}", output_file.display());
    }
    Ok(())
}

/// Validates version string format (X.Y or X.Y.Z)
fn validate_version_format(version: &str) -> Result<(), String> {
    let re = Regex::new(r"^\d+\.\d+(\.\d+)?$").map_err(|e| e.to_string())?;
    if re.is_match(version) {
        Ok(())
    } else {
        Err(format!("Invalid version format '{}'. Expected: X.Y or X.Y.Z (e.g., 2.1)", version))
    }
}

// Next to the input, <name>-updated.xml, numbered if that already exists
fn get_unique_filename(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document");
    let dir = input.parent().unwrap_or_else(|| Path::new(""));

    let mut count = 0;
    let mut file_name = dir.join(format!("{}-updated.xml", stem));
    while file_name.exists() {
        count += 1;
        file_name = dir.join(format!("{}-updated-{}.xml", stem, count));
    }

    file_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_unique_filename() {
        let filename = get_unique_filename(Path::new("does-not-exist/package.xml"));
        assert_eq!(filename, Path::new("does-not-exist/package-updated.xml"));
    }

    #[test]
    fn test_get_unique_filename_skips_existing() {
        let dir = std::env::temp_dir().join(format!("cti-migrate-cli-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("observables-updated.xml"), "").unwrap();

        let filename = get_unique_filename(&dir.join("observables.xml"));
        assert_eq!(filename, dir.join("observables-updated-1.xml"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_validate_version_format_valid() {
        assert!(validate_version_format("2.1").is_ok());
        assert!(validate_version_format("2.0.1").is_ok());
        assert!(validate_version_format("1.1.1").is_ok());
    }

    #[test]
    fn test_validate_version_format_invalid() {
        assert!(validate_version_format("v2.1").is_err()); // No prefix allowed
        assert!(validate_version_format("2").is_err()); // Incomplete
        assert!(validate_version_format("latest").is_err());
        assert!(validate_version_format("").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["cti-migrate", "in.xml", "--force", "--to", "2.1", "--format", "json", "-v"]);
        assert!(args.force);
        assert!(args.verbose);
        assert_eq!(args.to.as_deref(), Some("2.1"));
        assert!(matches!(args.format, FormatArg::Json));
        assert_eq!(args.file, PathBuf::from("in.xml"));
    }
}
