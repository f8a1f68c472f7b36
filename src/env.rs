use std::path::Path;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{DEFAULT_ACADEMIC_YEAR, DEFAULT_SEMESTER, Period};

const DEFAULT_DATABASE_URL: &str = "sqlite://gpa_tracker.db?mode=rwc";
const DEFAULT_AUTOSAVE_MS: u64 = 3000;

/// Loads the profile's env files in order and returns the paths that existed.
///
/// Runs before tracing is installed, so callers log the result themselves.
pub fn load_environment() -> Result<Vec<&'static str>, Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("GPA_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    let mut loaded = Vec::new();
    for env_file in env_files {
        if load_env_file(Path::new(env_file))? {
            loaded.push(env_file);
        }
    }

    Ok(loaded)
}

fn load_env_file(path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(false);
    }

    dotenvy::from_filename_override(path)?;
    Ok(true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub autosave_delay: Duration,
    pub default_period: Period,
}

impl Config {
    /// Reads settings from the process environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let autosave_ms = match std::env::var("GPA_AUTOSAVE_MS") {
            Ok(value) => value.trim().parse::<u64>().map_err(|_| {
                AppError::Validation(format!(
                    "GPA_AUTOSAVE_MS must be a whole number of milliseconds, got '{}'",
                    value
                ))
            })?,
            Err(_) => DEFAULT_AUTOSAVE_MS,
        };

        let academic_year = std::env::var("GPA_DEFAULT_YEAR")
            .unwrap_or_else(|_| DEFAULT_ACADEMIC_YEAR.to_string());
        let semester =
            std::env::var("GPA_DEFAULT_SEMESTER").unwrap_or_else(|_| DEFAULT_SEMESTER.to_string());

        Ok(Self {
            database_url,
            autosave_delay: Duration::from_millis(autosave_ms),
            default_period: Period::new(&academic_year, &semester),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [
        "DATABASE_URL",
        "GPA_AUTOSAVE_MS",
        "GPA_DEFAULT_YEAR",
        "GPA_DEFAULT_SEMESTER",
    ];

    #[test]
    #[serial]
    fn defaults_apply_when_unset() {
        temp_env::with_vars_unset(VARS, || {
            let config = Config::from_env().expect("defaults should load");
            assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
            assert_eq!(config.autosave_delay, Duration::from_millis(3000));
            assert_eq!(config.default_period, Period::default());
        });
    }

    #[test]
    #[serial]
    fn reads_overrides() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("sqlite::memory:")),
                ("GPA_AUTOSAVE_MS", Some("250")),
                ("GPA_DEFAULT_YEAR", Some("Year 3")),
                ("GPA_DEFAULT_SEMESTER", Some(" Semester 2 ")),
            ],
            || {
                let config = Config::from_env().expect("overrides should load");
                assert_eq!(config.database_url, "sqlite::memory:");
                assert_eq!(config.autosave_delay, Duration::from_millis(250));
                assert_eq!(config.default_period, Period::new("Year 3", "Semester 2"));
            },
        );
    }

    #[test]
    #[serial]
    fn env_file_overrides_and_missing_file_is_skipped() {
        let path = std::env::temp_dir().join(format!("gpa-tracker-{}.env", std::process::id()));
        std::fs::write(&path, "GPA_DEFAULT_YEAR=\"Year 4\"\n").unwrap();

        temp_env::with_var("GPA_DEFAULT_YEAR", Some("Year 1"), || {
            assert!(load_env_file(&path).unwrap());
            assert_eq!(std::env::var("GPA_DEFAULT_YEAR").unwrap(), "Year 4");
        });
        std::fs::remove_file(&path).unwrap();

        assert!(!load_env_file(&path).unwrap());
    }

    #[test]
    #[serial]
    fn rejects_malformed_autosave_delay() {
        temp_env::with_var("GPA_AUTOSAVE_MS", Some("soon"), || {
            assert!(matches!(Config::from_env(), Err(AppError::Validation(_))));
        });
    }
}
