use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use thiserror::Error;
use tracing::{Span, error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username '{0}' already exists")]
    DuplicateUsername(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown grade: {0}")]
    UnknownGrade(String),

    #[error("Invalid file format: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable kind, recorded as `error.type` on spans.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "storage_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::DuplicateUsername(_) => "duplicate_username",
            AppError::Validation(_) => "validation_error",
            AppError::UnknownGrade(_) => "unknown_grade",
            AppError::Format(_) => "format_error",
            AppError::Io(_) => "io_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
            }
            AppError::Io(err) => {
                error!(error = %message, context = %ctx, io_error = %err, "I/O error");
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal error");
            }
            AppError::InvalidCredentials => {
                warn!(context = %ctx, "Authentication failed");
            }
            AppError::DuplicateUsername(username) => {
                warn!(username = %username, context = %ctx, "Username taken");
            }
            AppError::Validation(msg) | AppError::UnknownGrade(msg) | AppError::Format(msg) => {
                warn!(message = %msg, context = %ctx, kind = self.kind(), "Rejected input");
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
            }
        }

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(self.kind()));
            current_span.record("error.message", tracing::field::display(&message));

            match self {
                AppError::Database(_) | AppError::Internal(_) | AppError::Io(_) => {
                    current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
                }
                _ => {}
            }
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Format(error.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors.iter().map(move |error| {
                    let message = error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into());
                    format!("{}: {}", field, message)
                })
            })
            .collect();
        messages.sort();

        AppError::Validation(messages.join("; "))
    }
}
