use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::gpa::parse_credits;
use crate::grades::Grade;

pub const DEFAULT_ACADEMIC_YEAR: &str = "Year 1";
pub const DEFAULT_SEMESTER: &str = "Semester 1";

/// An academic term: the pair that scopes semester GPA and snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub academic_year: String,
    pub semester: String,
}

impl Period {
    pub fn new(academic_year: &str, semester: &str) -> Self {
        Self {
            academic_year: academic_year.trim().to_string(),
            semester: semester.trim().to_string(),
        }
    }

    pub fn contains(&self, academic_year: Option<&str>, semester: Option<&str>) -> bool {
        academic_year.unwrap_or_default() == self.academic_year
            && semester.unwrap_or_default() == self.semester
    }
}

impl Default for Period {
    fn default() -> Self {
        Self::new(DEFAULT_ACADEMIC_YEAR, DEFAULT_SEMESTER)
    }
}

/// Identity of a stored course row for a given owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CourseKey {
    pub academic_year: String,
    pub semester: String,
    pub course_name: String,
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Missing(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
        Raw::Missing(()) => String::new(),
    })
}

fn default_grade() -> String {
    Grade::A.to_string()
}

/// A course row exactly as entered, before any validation.
///
/// Field names on the wire match the export document (`course`, `code`,
/// `grade`, `credits`, `semester`, `year`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDraft {
    #[serde(rename = "course", default)]
    pub course_name: String,
    #[serde(rename = "code", default)]
    pub course_code: String,
    #[serde(default = "default_grade")]
    pub grade: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub credits: String,
    #[serde(default)]
    pub semester: String,
    #[serde(rename = "year", default, deserialize_with = "text_or_number")]
    pub academic_year: String,
}

impl Default for CourseDraft {
    fn default() -> Self {
        Self {
            course_name: String::new(),
            course_code: String::new(),
            grade: default_grade(),
            credits: String::new(),
            semester: String::new(),
            academic_year: String::new(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CourseDraft {
    pub fn new(course_name: &str, grade: &str, credits: &str) -> Self {
        Self {
            course_name: course_name.to_string(),
            grade: grade.to_string(),
            credits: credits.to_string(),
            ..Self::default()
        }
    }

    pub fn in_period(mut self, period: &Period) -> Self {
        self.academic_year = period.academic_year.clone();
        self.semester = period.semester.clone();
        self
    }

    pub fn with_code(mut self, course_code: &str) -> Self {
        self.course_code = course_code.to_string();
        self
    }

    pub fn validate(&self) -> Result<NewCourse, AppError> {
        let course_name = non_empty(&self.course_name)
            .ok_or_else(|| AppError::Validation("course name is required".to_string()))?;

        let credits = parse_credits(&self.credits).ok_or_else(|| {
            AppError::Validation(format!(
                "credits for '{}' must be a number, got '{}'",
                course_name, self.credits
            ))
        })?;
        if credits <= 0.0 {
            return Err(AppError::Validation(format!(
                "credits for '{}' must be positive",
                course_name
            )));
        }

        let grade: Grade = self.grade.parse()?;

        Ok(NewCourse {
            course_name,
            course_code: non_empty(&self.course_code),
            grade,
            credits,
            semester: non_empty(&self.semester),
            academic_year: non_empty(&self.academic_year),
        })
    }
}

/// A validated course row ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub course_name: String,
    pub course_code: Option<String>,
    pub grade: Grade,
    pub credits: f64,
    pub semester: Option<String>,
    pub academic_year: Option<String>,
}

impl NewCourse {
    pub fn key(&self) -> CourseKey {
        CourseKey {
            academic_year: self.academic_year.clone().unwrap_or_default(),
            semester: self.semester.clone().unwrap_or_default(),
            course_name: self.course_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseRecord {
    pub id: i64,
    pub owner_id: i64,
    pub course_name: String,
    pub course_code: Option<String>,
    pub grade: Grade,
    pub credits: f64,
    pub semester: Option<String>,
    pub academic_year: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCourseRecord {
    pub id: i64,
    pub user_id: i64,
    pub course_name: String,
    pub course_code: Option<String>,
    pub grade: String,
    pub credits: f64,
    pub semester: String,
    pub academic_year: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbCourseRecord> for CourseRecord {
    type Error = AppError;

    fn try_from(db: DbCourseRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: db.id,
            owner_id: db.user_id,
            grade: db.grade.parse()?,
            course_name: db.course_name,
            course_code: db.course_code.as_deref().and_then(non_empty),
            credits: db.credits,
            semester: non_empty(&db.semester),
            academic_year: non_empty(&db.academic_year),
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

impl CourseRecord {
    pub fn key(&self) -> CourseKey {
        CourseKey {
            academic_year: self.academic_year.clone().unwrap_or_default(),
            semester: self.semester.clone().unwrap_or_default(),
            course_name: self.course_name.clone(),
        }
    }

    pub fn to_draft(&self) -> CourseDraft {
        CourseDraft {
            course_name: self.course_name.clone(),
            course_code: self.course_code.clone().unwrap_or_default(),
            grade: self.grade.to_string(),
            credits: self.credits.to_string(),
            semester: self.semester.clone().unwrap_or_default(),
            academic_year: self.academic_year.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct GpaSnapshot {
    pub id: i64,
    pub owner_id: i64,
    pub academic_year: String,
    pub semester: String,
    pub semester_gpa: f64,
    pub cumulative_gpa: f64,
    pub total_credits: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpaSnapshotInput {
    pub semester_gpa: f64,
    pub cumulative_gpa: f64,
    pub total_credits: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub total_courses: i64,
    pub total_credits: f64,
    pub first_course_date: Option<DateTime<Utc>>,
}
