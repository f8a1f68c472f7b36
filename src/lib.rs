pub mod auth;
pub mod autosave;
pub mod db;
pub mod env;
pub mod error;
pub mod gpa;
pub mod grades;
pub mod models;
pub mod session;
pub mod telemetry;
pub mod transfer;
#[cfg(test)]
mod test;

pub use error::AppError;
pub use gpa::{GpaSummary, Standing, aggregate};
pub use grades::Grade;
pub use models::{CourseDraft, CourseRecord, GpaSnapshot, NewCourse, Period};
pub use session::Session;
