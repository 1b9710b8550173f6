//! `validate`: check configuration files without connecting.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::cli::commands::print_json;
use crate::config::ConfigLoader;
use crate::error::{ConfigError, FheGuessError, Severity, ValidationIssue};

#[derive(Debug, Serialize)]
struct FileReport {
    file: PathBuf,
    valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

/// Validates each file and reports every problem found.
///
/// # Errors
///
/// Returns the first file's config error when any file is invalid. With
/// `--strict`, warnings count as errors.
pub fn run(args: &ValidateArgs) -> Result<(), FheGuessError> {
    let loader = ConfigLoader::with_defaults();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error: Option<ConfigError> = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let report = match loader.load(path) {
            Ok(result) => {
                let warnings: Vec<String> = result
                    .warnings
                    .iter()
                    .map(|w| match &w.location {
                        Some(location) => format!("{} at {location}", w.message),
                        None => w.message.clone(),
                    })
                    .collect();
                if args.strict && !warnings.is_empty() && first_error.is_none() {
                    first_error = Some(ConfigError::ValidationError {
                        path: path.display().to_string(),
                        errors: result
                            .warnings
                            .iter()
                            .map(|w| ValidationIssue {
                                path: w.location.clone().unwrap_or_default(),
                                message: w.message.clone(),
                                severity: Severity::Error,
                            })
                            .collect(),
                    });
                }
                FileReport {
                    file: path.clone(),
                    valid: !(args.strict && !warnings.is_empty()),
                    errors: Vec::new(),
                    warnings,
                }
            }
            Err(e) => {
                let errors = match &e {
                    ConfigError::ValidationError { errors, .. } => {
                        errors.iter().map(ToString::to_string).collect()
                    }
                    other => vec![other.to_string()],
                };
                if first_error.is_none() {
                    first_error = Some(e);
                }
                FileReport {
                    file: path.clone(),
                    valid: false,
                    errors,
                    warnings: Vec::new(),
                }
            }
        };
        reports.push(report);
    }

    match args.format {
        OutputFormat::Json => print_json(&reports)?,
        OutputFormat::Human => {
            for report in &reports {
                let mark = if report.valid { "ok" } else { "FAILED" };
                println!("{}: {mark}", report.file.display());
                for error in &report.errors {
                    println!("  {error}");
                }
                for warning in &report.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}
