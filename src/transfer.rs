use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::CourseDraft;

/// The JSON document produced by export and accepted by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub export_date: String,
    pub courses: Vec<CourseDraft>,
}

impl ExportDocument {
    /// Rows without a course name are left out.
    pub fn new<'a, I>(user: &str, courses: I) -> Self
    where
        I: IntoIterator<Item = &'a CourseDraft>,
    {
        Self {
            user: user.to_string(),
            export_date: Utc::now().to_rfc3339(),
            courses: courses
                .into_iter()
                .filter(|draft| !draft.course_name.trim().is_empty())
                .cloned()
                .collect(),
        }
    }
}

pub fn write_export<W: Write>(writer: W, document: &ExportDocument) -> Result<(), AppError> {
    serde_json::to_writer_pretty(writer, document)?;
    Ok(())
}

pub fn read_export<R: Read>(reader: R) -> Result<ExportDocument, AppError> {
    let value: serde_json::Value = serde_json::from_reader(reader)?;

    match value.get("courses") {
        Some(serde_json::Value::Array(_)) => {}
        Some(_) => {
            return Err(AppError::Format(
                "top-level \"courses\" must be a list".to_string(),
            ));
        }
        None => {
            return Err(AppError::Format(
                "missing top-level \"courses\" key".to_string(),
            ));
        }
    }

    Ok(serde_json::from_value(value)?)
}

#[instrument(skip(document), fields(courses = document.courses.len()))]
pub fn export_to_file(path: &Path, document: &ExportDocument) -> Result<(), AppError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_export(&mut writer, document)?;
    writer.flush()?;
    info!("Exported courses to {}", path.display());
    Ok(())
}

#[instrument]
pub fn import_from_file(path: &Path) -> Result<ExportDocument, AppError> {
    let document = read_export(BufReader::new(File::open(path)?))?;
    info!(
        courses = document.courses.len(),
        "Imported courses from {}",
        path.display()
    );
    Ok(document)
}
