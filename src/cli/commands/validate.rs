//! `validate` command handler

use serde_json::json;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, DuelJackError, Severity, ValidationIssue};

/// Validate configuration files without starting the engine.
///
/// Every file is checked before the first failure is returned, so one run
/// reports problems across all of them.
///
/// # Errors
///
/// Returns the first file's config error, or a validation error for the
/// first file with warnings under `--strict`.
pub fn run(args: &ValidateArgs) -> Result<(), DuelJackError> {
    let loader = ConfigLoader::default();
    let mut first_failure = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let outcome = loader.load(path).and_then(|result| {
            if args.strict && !result.warnings.is_empty() {
                return Err(ConfigError::ValidationError {
                    path: path.display().to_string(),
                    errors: result
                        .warnings
                        .into_iter()
                        .map(|w| ValidationIssue {
                            path: w.location.unwrap_or_default(),
                            message: w.message,
                            severity: Severity::Warning,
                        })
                        .collect(),
                });
            }
            Ok(result.warnings)
        });

        match (&outcome, args.format) {
            (Ok(warnings), OutputFormat::Human) => {
                for w in warnings {
                    println!(
                        "{}: warning: {} at {}",
                        path.display(),
                        w.message,
                        w.location.as_deref().unwrap_or("<unknown>")
                    );
                }
                println!("{}: ok", path.display());
            }
            (Ok(warnings), OutputFormat::Json) => {
                let warnings: Vec<_> = warnings
                    .iter()
                    .map(|w| json!({ "message": w.message, "location": w.location }))
                    .collect();
                println!(
                    "{}",
                    json!({ "file": path.display().to_string(), "valid": true, "warnings": warnings })
                );
            }
            (Err(e), OutputFormat::Human) => {
                println!("{}: {e}", path.display());
                if let ConfigError::ValidationError { errors, .. } = e {
                    for issue in errors {
                        println!("  {issue}");
                    }
                }
            }
            (Err(e), OutputFormat::Json) => {
                let issues: Vec<_> = match e {
                    ConfigError::ValidationError { errors, .. } => errors
                        .iter()
                        .map(|i| json!({ "path": i.path, "message": i.message }))
                        .collect(),
                    _ => Vec::new(),
                };
                println!(
                    "{}",
                    json!({
                        "file": path.display().to_string(),
                        "valid": false,
                        "error": e.to_string(),
                        "issues": issues,
                    })
                );
            }
        }

        if let Err(e) = outcome {
            first_failure.get_or_insert(e);
        } else {
            tracing::info!(file = %path.display(), "configuration valid");
        }
    }

    first_failure.map_or(Ok(()), |e| Err(e.into()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn args(files: Vec<PathBuf>, strict: bool) -> ValidateArgs {
        ValidateArgs {
            files,
            format: OutputFormat::Json,
            strict,
        }
    }

    #[test]
    fn test_valid_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.yaml");
        std::fs::write(&path, "duel:\n  max_health: 50\n").unwrap();
        assert!(run(&args(vec![path], false)).is_ok());
    }

    #[test]
    fn test_strict_rejects_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warn.yaml");
        std::fs::write(&path, "duel:\n  cooldown: 0s\n").unwrap();
        assert!(run(&args(vec![path.clone()], false)).is_ok());
        let err = run(&args(vec![path], true)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_missing_file_fails_after_checking_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("ok.yaml");
        std::fs::write(&good, "duel: {}\n").unwrap();
        let err = run(&args(vec![dir.path().join("nope.yaml"), good], false)).unwrap_err();
        assert!(matches!(err, DuelJackError::Config(ConfigError::MissingFile { .. })));
    }
}
