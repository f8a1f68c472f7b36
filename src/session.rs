//! A logged-in user's working set of course rows.
//!
//! The in-memory [`CourseSet`] is the editing surface; the store only changes
//! through the explicit operations on [`Session`] (and the optional debounced
//! auto-save, which runs the same bulk save in the background).

use std::collections::HashSet;
use std::io::{Read, Write};
use std::time::Duration;

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::{RegisterRequest, User};
use crate::autosave::Debouncer;
use crate::db;
use crate::error::AppError;
use crate::gpa::{GpaSummary, aggregate, summarize};
use crate::grades::Grade;
use crate::models::{
    CourseDraft, CourseKey, CourseRecord, GpaSnapshot, GpaSnapshotInput, NewCourse, Period,
    UserStats,
};
use crate::transfer::{self, ExportDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Matches what the store held when it was last loaded or saved.
    Saved,
    Unsaved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseEntry {
    pub draft: CourseDraft,
    pub state: EntryState,
}

#[derive(Debug, Clone, Default)]
pub struct CourseSet {
    entries: Vec<CourseEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveReport {
    pub saved: usize,
    pub skipped: usize,
}

impl CourseSet {
    pub fn from_records(records: &[CourseRecord]) -> Self {
        Self {
            entries: records
                .iter()
                .map(|record| CourseEntry {
                    draft: record.to_draft(),
                    state: EntryState::Saved,
                })
                .collect(),
        }
    }

    pub fn from_drafts(drafts: Vec<CourseDraft>) -> Self {
        Self {
            entries: drafts
                .into_iter()
                .map(|draft| CourseEntry {
                    draft,
                    state: EntryState::Unsaved,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CourseEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CourseEntry> {
        self.entries.iter()
    }

    pub fn drafts(&self) -> impl Iterator<Item = &CourseDraft> {
        self.entries.iter().map(|entry| &entry.draft)
    }

    pub fn push(&mut self, draft: CourseDraft) -> usize {
        self.entries.push(CourseEntry {
            draft,
            state: EntryState::Unsaved,
        });
        self.entries.len() - 1
    }

    pub fn replace(&mut self, index: usize, draft: CourseDraft) -> Result<(), AppError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| AppError::NotFound(format!("course row {}", index)))?;

        entry.draft = draft;
        entry.state = EntryState::Unsaved;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<CourseDraft, AppError> {
        if index >= self.entries.len() {
            return Err(AppError::NotFound(format!("course row {}", index)));
        }
        Ok(self.entries.remove(index).draft)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Validates every row; rows that fail are logged and counted, never fatal.
    /// Rows sharing an identity key collapse onto the last one.
    pub fn valid_rows(&self) -> (Vec<NewCourse>, usize) {
        let mut valid = Vec::with_capacity(self.entries.len());
        let mut skipped = 0;

        for entry in &self.entries {
            match entry.draft.validate() {
                Ok(course) => valid.push((entry.state, course)),
                Err(err) => {
                    err.log_and_record("skipping course row");
                    skipped += 1;
                }
            }
        }

        let rows = last_per_key(valid)
            .into_iter()
            .map(|(_, course)| course)
            .collect();
        (rows, skipped)
    }

    fn latest_rows(&self) -> Vec<(EntryState, NewCourse)> {
        last_per_key(
            self.entries
                .iter()
                .filter_map(|entry| entry.draft.validate().ok().map(|course| (entry.state, course)))
                .collect(),
        )
    }

    fn unsaved_rows(&self) -> Vec<NewCourse> {
        self.latest_rows()
            .into_iter()
            .filter(|(state, _)| *state == EntryState::Unsaved)
            .map(|(_, course)| course)
            .collect()
    }

    fn period_rows(&self, period: &Period) -> Vec<(Grade, f64)> {
        self.latest_rows()
            .into_iter()
            .map(|(_, course)| course)
            .filter(|course| {
                period.contains(course.academic_year.as_deref(), course.semester.as_deref())
            })
            .map(|course| (course.grade, course.credits))
            .collect()
    }

    fn mark_saved(&mut self) {
        for entry in &mut self.entries {
            if entry.draft.validate().is_ok() {
                entry.state = EntryState::Saved;
            }
        }
    }
}

/// Keeps the last row for each identity key.
fn last_per_key(rows: Vec<(EntryState, NewCourse)>) -> Vec<(EntryState, NewCourse)> {
    let mut seen = HashSet::new();
    let mut kept: Vec<_> = rows
        .into_iter()
        .rev()
        .filter(|(_, course)| seen.insert(course.key()))
        .collect();
    kept.reverse();
    kept
}

/// Persisted rows plus unsaved in-memory rows, with an unsaved row replacing
/// the persisted row that shares its identity key.
pub fn live_rows(persisted: &[CourseRecord], unsaved: &[NewCourse]) -> Vec<(Grade, f64)> {
    let shadowed: HashSet<CourseKey> = unsaved.iter().map(NewCourse::key).collect();

    persisted
        .iter()
        .filter(|record| !shadowed.contains(&record.key()))
        .map(|record| (record.grade, record.credits))
        .chain(unsaved.iter().map(|course| (course.grade, course.credits)))
        .collect()
}

pub struct Session {
    pool: Pool<Sqlite>,
    user: User,
    period: Period,
    courses: CourseSet,
    autosave: Option<Debouncer>,
}

impl Session {
    #[instrument(skip_all, fields(username = %request.username))]
    pub async fn register(pool: &Pool<Sqlite>, request: RegisterRequest) -> Result<Self, AppError> {
        let request = request.validated()?;
        let user_id = db::register_user(
            pool,
            &request.username,
            &request.password,
            request.email.as_deref(),
        )
        .await?;
        info!(user_id, "Account created");

        Self::open(pool, user_id).await
    }

    #[instrument(skip(pool, password))]
    pub async fn login(
        pool: &Pool<Sqlite>,
        username: &str,
        password: &str,
    ) -> Result<Self, AppError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "username and password are required".to_string(),
            ));
        }

        let user_id = db::authenticate_user(pool, username, password).await?;
        Self::open(pool, user_id).await
    }

    async fn open(pool: &Pool<Sqlite>, user_id: i64) -> Result<Self, AppError> {
        let user = db::get_user(pool, user_id).await?;
        let records = db::load_courses(pool, user_id).await?;
        info!(courses = records.len(), "Session opened");

        Ok(Self {
            pool: pool.clone(),
            user,
            period: Period::default(),
            courses: CourseSet::from_records(&records),
            autosave: None,
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn select_period(&mut self, period: Period) {
        self.period = period;
    }

    pub fn courses(&self) -> &CourseSet {
        &self.courses
    }

    /// Every later edit schedules a bulk save once `delay` passes without
    /// further edits.
    pub fn enable_autosave(&mut self, delay: Duration) {
        self.autosave = Some(Debouncer::new(delay));
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.as_ref().is_some_and(Debouncer::is_pending)
    }

    pub fn add_course(&mut self, draft: CourseDraft) -> usize {
        let index = self.courses.push(draft);
        self.touched();
        index
    }

    pub fn update_course(&mut self, index: usize, draft: CourseDraft) -> Result<(), AppError> {
        self.courses.replace(index, draft)?;
        self.touched();
        Ok(())
    }

    pub fn remove_course(&mut self, index: usize) -> Result<CourseDraft, AppError> {
        let draft = self.courses.remove(index)?;
        self.touched();
        Ok(draft)
    }

    pub fn clear(&mut self) {
        self.courses.clear();
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.cancel();
        }
    }

    fn touched(&mut self) {
        let Some(autosave) = self.autosave.as_mut() else {
            return;
        };

        let (rows, _) = self.courses.valid_rows();
        if rows.is_empty() {
            // An empty bulk save would wipe the stored list.
            autosave.cancel();
            return;
        }

        let pool = self.pool.clone();
        let owner_id = self.user.id;
        autosave.trigger(move || async move {
            match db::replace_all_courses(&pool, owner_id, &rows).await {
                Ok(stored) => info!(stored, "Auto-saved courses"),
                Err(err) => err.log_and_record("auto-save"),
            }
        });
    }

    pub fn semester_summary(&self) -> GpaSummary {
        summarize(self.courses.period_rows(&self.period))
    }

    pub fn semester_gpa(&self) -> f64 {
        aggregate(self.courses.period_rows(&self.period))
    }

    /// Cumulative figures across every period, including rows that have not
    /// been saved yet.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn cumulative_summary(&self) -> Result<GpaSummary, AppError> {
        let persisted = db::load_courses(&self.pool, self.user.id).await?;
        let unsaved = self.courses.unsaved_rows();
        Ok(summarize(live_rows(&persisted, &unsaved)))
    }

    pub async fn cumulative_gpa(&self) -> Result<f64, AppError> {
        Ok(self.cumulative_summary().await?.gpa)
    }

    /// Upserts each valid row by identity key. Rows removed from the set stay
    /// in the store; use [`Session::save_all`] to mirror removals.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn save(&mut self) -> Result<SaveReport, AppError> {
        self.cancel_autosave();

        let (rows, skipped) = self.courses.valid_rows();
        for course in &rows {
            db::upsert_course(&self.pool, self.user.id, course).await?;
        }
        self.courses.mark_saved();

        info!(saved = rows.len(), skipped, "Courses saved");
        Ok(SaveReport {
            saved: rows.len(),
            skipped,
        })
    }

    /// Replaces the stored list with the valid rows of the in-memory set.
    /// Fails without touching the store when no row is valid.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn save_all(&mut self) -> Result<SaveReport, AppError> {
        self.cancel_autosave();

        let (rows, skipped) = self.courses.valid_rows();
        if rows.is_empty() {
            return Err(AppError::Validation("no valid courses to save".to_string()));
        }
        let saved = db::replace_all_courses(&self.pool, self.user.id, &rows).await?;
        self.courses.mark_saved();

        Ok(SaveReport { saved, skipped })
    }

    /// Saves, then computes semester and cumulative GPA from the store and
    /// records them against the selected period.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn record_snapshot(&mut self) -> Result<GpaSnapshot, AppError> {
        self.save().await?;

        let period_courses = db::load_period_courses(&self.pool, self.user.id, &self.period).await?;
        let semester = summarize(
            period_courses
                .iter()
                .map(|record| (record.grade, record.credits)),
        );

        let all_courses = db::load_courses(&self.pool, self.user.id).await?;
        let cumulative = summarize(all_courses.iter().map(|record| (record.grade, record.credits)));

        let input = GpaSnapshotInput {
            semester_gpa: semester.gpa,
            cumulative_gpa: cumulative.gpa,
            total_credits: cumulative.total_credits,
        };
        db::upsert_gpa_snapshot(&self.pool, self.user.id, &self.period, &input).await
    }

    pub async fn history(&self) -> Result<Vec<GpaSnapshot>, AppError> {
        db::load_gpa_snapshots(&self.pool, self.user.id).await
    }

    pub async fn stats(&self) -> Result<UserStats, AppError> {
        db::get_user_stats(&self.pool, self.user.id).await
    }

    /// Discards in-memory edits and reloads the stored rows.
    pub async fn reload(&mut self) -> Result<usize, AppError> {
        self.cancel_autosave();
        let records = db::load_courses(&self.pool, self.user.id).await?;
        self.courses = CourseSet::from_records(&records);
        Ok(records.len())
    }

    pub fn export_document(&self) -> ExportDocument {
        ExportDocument::new(&self.user.username, self.courses.drafts())
    }

    pub fn export_to<W: Write>(&self, writer: W) -> Result<(), AppError> {
        transfer::write_export(writer, &self.export_document())
    }

    /// Replaces the in-memory set with the document's rows, all unsaved.
    pub fn import_document(&mut self, document: ExportDocument) -> usize {
        let count = document.courses.len();
        if document.user != self.user.username {
            warn!(
                file_user = %document.user,
                "Importing courses exported by a different user"
            );
        }

        self.courses = CourseSet::from_drafts(document.courses);
        self.touched();
        count
    }

    pub fn import_from<R: Read>(&mut self, reader: R) -> Result<usize, AppError> {
        let document = transfer::read_export(reader)?;
        Ok(self.import_document(document))
    }

    fn cancel_autosave(&mut self) {
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.cancel();
        }
    }

    /// Flushes a pending auto-save before the session goes away.
    pub async fn close(mut self) -> Result<(), AppError> {
        if self.autosave_pending() {
            self.save_all().await?;
        }
        Ok(())
    }
}
