// Curriculum service module
// Atomic create/replace of a course's materials, lessons, quizzes and assignments

use chrono::Utc;
use log::{debug, error, info};
use rusqlite::{params, Transaction, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AssignmentInput, ChapterInput, ItemInput, LessonInput, LessonKind, OptionInput, QuestionInput,
    QuizInput, Requester, DEFAULT_MAX_ATTEMPTS, DEFAULT_PASSING_SCORE, DEFAULT_QUESTION_TYPE,
    DEFAULT_TIME_LIMIT_MINUTES,
};
use crate::services::database::{authorize_owner, DatabaseService};

pub const MISSING_CHAPTERS: &str = "Materials (babs) data is required and must be an array";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Appends the chapters after any existing materials.
    Create,
    /// Drops the existing curriculum and rebuilds it from the chapters.
    Replace,
}

/// Row counts written by one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub chapters: usize,
    pub lessons: usize,
    pub assignments: usize,
    pub quizzes: usize,
    pub questions: usize,
    pub options: usize,
}

/// Rebuilds course curricula inside a single transaction.
pub struct CurriculumReplacer<'a> {
    db: &'a DatabaseService,
}

impl<'a> CurriculumReplacer<'a> {
    pub fn new(db: &'a DatabaseService) -> Self {
        Self { db }
    }

    /// Creates or replaces the curriculum of `course_id`.
    ///
    /// Either every row of the new tree is committed or nothing is: on any
    /// write failure the transaction is rolled back, including the delete
    /// pass of [`BuildMode::Replace`].
    pub fn replace(
        &self,
        course_id: Uuid,
        requester: &Requester,
        chapters: &[ChapterInput],
        mode: BuildMode,
    ) -> Result<BuildSummary, AppError> {
        let mut conn = self.db.lock()?;

        authorize_owner(&conn, course_id, requester)?;

        if mode == BuildMode::Create && chapters.is_empty() {
            return Err(AppError::InvalidInput(MISSING_CHAPTERS.to_string()));
        }

        info!(
            "Building curriculum for course {course_id} ({mode:?}, {} chapter(s))",
            chapters.len()
        );

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(AppError::BuildFailed)?;

        match build(&tx, course_id, chapters, mode) {
            Ok(summary) => {
                tx.commit().map_err(AppError::BuildFailed)?;
                info!("Curriculum for course {course_id} committed: {summary:?}");
                Ok(summary)
            }
            Err(e) => {
                error!("Curriculum build for course {course_id} failed, rolling back: {e}");
                if let Err(rollback_err) = tx.rollback() {
                    error!("Rollback for course {course_id} failed: {rollback_err}");
                }
                Err(AppError::BuildFailed(e))
            }
        }
    }
}

fn build(
    tx: &Transaction<'_>,
    course_id: Uuid,
    chapters: &[ChapterInput],
    mode: BuildMode,
) -> rusqlite::Result<BuildSummary> {
    if mode == BuildMode::Replace {
        purge_materials(tx, course_id)?;
    }

    let first_position: i64 = tx.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM materials WHERE course_id = ?1",
        params![course_id.to_string()],
        |row| row.get(0),
    )?;

    let mut summary = BuildSummary::default();
    for (offset, chapter) in (0_i64..).zip(chapters) {
        write_material(tx, course_id, first_position + offset, chapter, &mut summary)?;
    }

    Ok(summary)
}

/// Deletes every material of a course; foreign keys cascade to details,
/// quizzes, questions and options.
fn purge_materials(tx: &Transaction<'_>, course_id: Uuid) -> rusqlite::Result<usize> {
    let removed = tx.execute(
        "DELETE FROM materials WHERE course_id = ?1",
        params![course_id.to_string()],
    )?;

    debug!("Purged {removed} material(s) of course {course_id}");
    Ok(removed)
}

// ==================== Writers ====================

/// Writes one chapter and all of its items in input order.
pub fn write_material(
    tx: &Transaction<'_>,
    course_id: Uuid,
    position: i64,
    chapter: &ChapterInput,
    summary: &mut BuildSummary,
) -> rusqlite::Result<Uuid> {
    let material_id = Uuid::new_v4();

    tx.prepare_cached(
        "INSERT INTO materials (id, course_id, name, description, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?
    .execute(params![
        material_id.to_string(),
        course_id.to_string(),
        chapter.name,
        chapter.description.as_deref().unwrap_or_default(),
        position,
        Utc::now().to_rfc3339(),
    ])?;

    for (item_position, item) in (0_i64..).zip(&chapter.items) {
        match item {
            ItemInput::Lesson(lesson) => {
                write_lesson_detail(tx, material_id, item_position, &NewLessonDetail::lesson(lesson))?;
                summary.lessons += 1;
            }
            ItemInput::Assignment(assignment) => {
                write_lesson_detail(
                    tx,
                    material_id,
                    item_position,
                    &NewLessonDetail::assignment(assignment),
                )?;
                summary.assignments += 1;
            }
            ItemInput::Quiz(quiz) => {
                write_quiz(tx, course_id, material_id, item_position, quiz)?;
                summary.quizzes += 1;
                summary.questions += quiz.questions.len();
                summary.options += quiz.questions.iter().map(|q| q.options.len()).sum::<usize>();
            }
        }
    }

    summary.chapters += 1;
    Ok(material_id)
}

/// Column values of a `material_details` row with defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLessonDetail<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub kind: LessonKind,
    pub url: &'a str,
    pub is_free: bool,
}

impl<'a> NewLessonDetail<'a> {
    pub fn lesson(input: &'a LessonInput) -> Self {
        Self {
            name: &input.name,
            description: input.description.as_deref().unwrap_or_default(),
            kind: LessonKind::from_lesson_type(input.lesson_type.as_deref()),
            url: input.url.as_deref().unwrap_or_default(),
            is_free: input.is_free.unwrap_or(false),
        }
    }

    pub fn assignment(input: &'a AssignmentInput) -> Self {
        Self {
            name: &input.title,
            description: input.instructions.as_deref().unwrap_or_default(),
            kind: LessonKind::Assignment,
            url: "",
            is_free: false,
        }
    }
}

pub fn write_lesson_detail(
    tx: &Transaction<'_>,
    material_id: Uuid,
    position: i64,
    detail: &NewLessonDetail<'_>,
) -> rusqlite::Result<Uuid> {
    let detail_id = Uuid::new_v4();

    tx.prepare_cached(
        "INSERT INTO material_details
         (id, material_id, name, description, kind, url, is_free, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?
    .execute(params![
        detail_id.to_string(),
        material_id.to_string(),
        detail.name,
        detail.description,
        detail.kind.code(),
        detail.url,
        detail.is_free,
        position,
        Utc::now().to_rfc3339(),
    ])?;

    Ok(detail_id)
}

/// Writes a quiz row, then its questions in input order.
pub fn write_quiz(
    tx: &Transaction<'_>,
    course_id: Uuid,
    material_id: Uuid,
    position: i64,
    quiz: &QuizInput,
) -> rusqlite::Result<Uuid> {
    let quiz_id = Uuid::new_v4();

    tx.prepare_cached(
        "INSERT INTO quizzes
         (id, material_id, course_id, title, description, passing_score, time_limit,
          max_attempts, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?
    .execute(params![
        quiz_id.to_string(),
        material_id.to_string(),
        course_id.to_string(),
        quiz.title,
        quiz.description.as_deref().unwrap_or_default(),
        quiz.passing_score.unwrap_or(DEFAULT_PASSING_SCORE),
        quiz.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_MINUTES),
        quiz.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        position,
        Utc::now().to_rfc3339(),
    ])?;

    for (question_position, question) in (0_i64..).zip(&quiz.questions) {
        write_question(tx, quiz_id, question_position, question)?;
    }

    Ok(quiz_id)
}

/// Writes a question row, then its answer options in input order.
pub fn write_question(
    tx: &Transaction<'_>,
    quiz_id: Uuid,
    position: i64,
    question: &QuestionInput,
) -> rusqlite::Result<Uuid> {
    let question_id = Uuid::new_v4();

    tx.prepare_cached(
        "INSERT INTO quiz_questions (id, quiz_id, question_text, question_type, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?
    .execute(params![
        question_id.to_string(),
        quiz_id.to_string(),
        question.question_text,
        question.question_type.as_deref().unwrap_or(DEFAULT_QUESTION_TYPE),
        position,
        Utc::now().to_rfc3339(),
    ])?;

    for (option_position, option) in (0_i64..).zip(&question.options) {
        write_answer_option(tx, quiz_id, question_id, option_position, option)?;
    }

    Ok(question_id)
}

pub fn write_answer_option(
    tx: &Transaction<'_>,
    quiz_id: Uuid,
    question_id: Uuid,
    position: i64,
    option: &OptionInput,
) -> rusqlite::Result<Uuid> {
    let option_id = Uuid::new_v4();

    tx.prepare_cached(
        "INSERT INTO quiz_answer_options
         (id, question_id, quiz_id, option_text, is_correct, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?
    .execute(params![
        option_id.to_string(),
        question_id.to_string(),
        quiz_id.to_string(),
        option.option_text,
        option.is_correct.unwrap_or(false),
        position,
        Utc::now().to_rfc3339(),
    ])?;

    Ok(option_id)
}
