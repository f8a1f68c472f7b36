use crate::{
    auth::{DbUser, User, hash_password, verify_password},
    error::AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use tracing::{info, instrument, warn};

use crate::models::{
    CourseRecord, DbCourseRecord, GpaSnapshot, GpaSnapshotInput, NewCourse, Period, UserStats,
};

const COURSE_COLUMNS: &str = "id, user_id, course_name, course_code, grade, credits, semester, \
     academic_year, created_at, updated_at";

/// Opens the store and applies the embedded schema.
///
/// The pool holds a single long-lived connection: the tracker is single-user,
/// and an in-memory database only lives as long as its connection.
#[instrument]
pub async fn connect(database_url: &str) -> Result<Pool<Sqlite>, AppError> {
    info!("Opening course store");
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[instrument(skip_all, fields(username))]
pub async fn register_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<i64, AppError> {
    info!("Registering new user");

    let existing_user = sqlx::query("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing_user.is_some() {
        return Err(AppError::DuplicateUsername(username.to_string()));
    }

    let password_hash = hash_password(password)?;
    let now = Utc::now();

    let res = sqlx::query(
        "INSERT INTO users (username, password_hash, email, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(email)
    .bind(now)
    .execute(pool)
    .await;

    match res {
        Ok(res) => Ok(res.last_insert_rowid()),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            Err(AppError::DuplicateUsername(username.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<i64, AppError> {
    info!("Authenticating user");
    let user: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    let user_id = match user {
        Some((id, password_hash)) if verify_password(password, &password_hash) => id,
        _ => return Err(AppError::InvalidCredentials),
    };

    let now = Utc::now();
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(user_id)
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, created_at, last_login FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

fn into_records(rows: Vec<DbCourseRecord>) -> Result<Vec<CourseRecord>, AppError> {
    rows.into_iter().map(CourseRecord::try_from).collect()
}

async fn insert_or_update_course<'e, E>(
    executor: E,
    owner_id: i64,
    course: &NewCourse,
    now: DateTime<Utc>,
) -> Result<DbCourseRecord, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, DbCourseRecord>(&format!(
        "INSERT INTO courses
             (user_id, course_name, course_code, grade, credits, semester, academic_year,
              created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (user_id, academic_year, semester, course_name) DO UPDATE
         SET course_code = excluded.course_code,
             grade = excluded.grade,
             credits = excluded.credits,
             updated_at = excluded.updated_at
         RETURNING {}",
        COURSE_COLUMNS
    ))
    .bind(owner_id)
    .bind(&course.course_name)
    .bind(&course.course_code)
    .bind(course.grade.as_str())
    .bind(course.credits)
    .bind(course.semester.as_deref().unwrap_or_default())
    .bind(course.academic_year.as_deref().unwrap_or_default())
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
}

/// Inserts the course, or updates grade, credits and code of the row sharing
/// its identity key (owner, year, semester, name).
#[instrument(skip(pool, course), fields(course = %course.course_name))]
pub async fn upsert_course(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    course: &NewCourse,
) -> Result<CourseRecord, AppError> {
    info!("Upserting course");
    let row = insert_or_update_course(pool, owner_id, course, Utc::now()).await?;
    CourseRecord::try_from(row)
}

/// Swaps the owner's whole course list for `courses` in one transaction.
///
/// Nothing is committed unless every row lands; duplicate identity keys in
/// `courses` collapse onto the last occurrence.
#[instrument(skip(pool, courses), fields(count = courses.len()))]
pub async fn replace_all_courses(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    courses: &[NewCourse],
) -> Result<usize, AppError> {
    info!("Replacing all courses");
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM courses WHERE user_id = ?")
        .bind(owner_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let now = Utc::now();
    for course in courses {
        insert_or_update_course(&mut *tx, owner_id, course, now).await?;
    }

    let (stored,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses WHERE user_id = ?")
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(removed, stored, "Course list replaced");

    Ok(stored as usize)
}

#[instrument]
pub async fn load_courses(
    pool: &Pool<Sqlite>,
    owner_id: i64,
) -> Result<Vec<CourseRecord>, AppError> {
    info!("Loading courses");
    let rows = sqlx::query_as::<_, DbCourseRecord>(&format!(
        "SELECT {} FROM courses WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        COURSE_COLUMNS
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    into_records(rows)
}

#[instrument]
pub async fn load_period_courses(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    period: &Period,
) -> Result<Vec<CourseRecord>, AppError> {
    info!("Loading courses for period");
    let rows = sqlx::query_as::<_, DbCourseRecord>(&format!(
        "SELECT {} FROM courses
         WHERE user_id = ? AND academic_year = ? AND semester = ?
         ORDER BY created_at DESC, id DESC",
        COURSE_COLUMNS
    ))
    .bind(owner_id)
    .bind(&period.academic_year)
    .bind(&period.semester)
    .fetch_all(pool)
    .await?;

    into_records(rows)
}

#[instrument]
pub async fn delete_course(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    course_id: i64,
) -> Result<bool, AppError> {
    info!("Deleting course");
    let result = sqlx::query("DELETE FROM courses WHERE id = ? AND user_id = ?")
        .bind(course_id)
        .bind(owner_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        warn!("No course deleted");
    }

    Ok(result.rows_affected() > 0)
}

#[instrument(skip(pool))]
pub async fn upsert_gpa_snapshot(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    period: &Period,
    snapshot: &GpaSnapshotInput,
) -> Result<GpaSnapshot, AppError> {
    info!("Recording GPA snapshot");
    let now = Utc::now();
    let row = sqlx::query_as::<_, GpaSnapshot>(
        "INSERT INTO gpa_records
             (user_id, academic_year, semester, semester_gpa, cumulative_gpa, total_credits,
              computed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (user_id, academic_year, semester) DO UPDATE
         SET semester_gpa = excluded.semester_gpa,
             cumulative_gpa = excluded.cumulative_gpa,
             total_credits = excluded.total_credits,
             computed_at = excluded.computed_at
         RETURNING id, user_id AS owner_id, academic_year, semester, semester_gpa,
                   cumulative_gpa, total_credits, computed_at",
    )
    .bind(owner_id)
    .bind(&period.academic_year)
    .bind(&period.semester)
    .bind(snapshot.semester_gpa)
    .bind(snapshot.cumulative_gpa)
    .bind(snapshot.total_credits)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

#[instrument]
pub async fn load_gpa_snapshots(
    pool: &Pool<Sqlite>,
    owner_id: i64,
) -> Result<Vec<GpaSnapshot>, AppError> {
    info!("Loading GPA history");
    let rows = sqlx::query_as::<_, GpaSnapshot>(
        "SELECT id, user_id AS owner_id, academic_year, semester, semester_gpa,
                cumulative_gpa, total_credits, computed_at
         FROM gpa_records
         WHERE user_id = ?
         ORDER BY academic_year, semester",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument]
pub async fn get_user_stats(pool: &Pool<Sqlite>, owner_id: i64) -> Result<UserStats, AppError> {
    info!("Computing user stats");
    let (total_courses, total_credits, first_course_date): (
        i64,
        Option<f64>,
        Option<DateTime<Utc>>,
    ) = sqlx::query_as(
        "SELECT COUNT(*), SUM(credits), MIN(created_at) FROM courses WHERE user_id = ?",
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok(UserStats {
        total_courses,
        total_credits: total_credits.unwrap_or_default(),
        first_course_date,
    })
}

#[instrument]
pub async fn total_completed_credits(pool: &Pool<Sqlite>, owner_id: i64) -> Result<f64, AppError> {
    let (total,): (Option<f64>,) =
        sqlx::query_as("SELECT SUM(credits) FROM courses WHERE user_id = ?")
            .bind(owner_id)
            .fetch_one(pool)
            .await?;

    Ok(total.unwrap_or_default())
}
