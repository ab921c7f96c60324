// Database service module
// SQLite storage for courses and their curriculum tree

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Course, CurriculumItem, CurriculumMaterial, LessonDetail, LessonKind, Material, QuestionTree,
    Quiz, QuizAnswerOption, QuizQuestion, QuizTree, Requester,
};
use crate::utils::ensure_parent_dir;

const COURSE_NOT_FOUND: &str = "Course not found or you do not have access to it";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS courses (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_courses_owner ON courses(owner_id);

    CREATE TABLE IF NOT EXISTS materials (
        id TEXT PRIMARY KEY,
        course_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        position INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_materials_course ON materials(course_id, position);

    CREATE TABLE IF NOT EXISTS material_details (
        id TEXT PRIMARY KEY,
        material_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        kind INTEGER NOT NULL CHECK(kind IN (1, 2, 3, 4)),
        url TEXT NOT NULL DEFAULT '',
        is_free INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (material_id) REFERENCES materials(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_details_material ON material_details(material_id, position);

    CREATE TABLE IF NOT EXISTS quizzes (
        id TEXT PRIMARY KEY,
        material_id TEXT NOT NULL,
        course_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        passing_score INTEGER NOT NULL DEFAULT 70,
        time_limit INTEGER NOT NULL DEFAULT 60,
        max_attempts INTEGER NOT NULL DEFAULT 1,
        position INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (material_id) REFERENCES materials(id) ON DELETE CASCADE,
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_quizzes_material ON quizzes(material_id, position);
    CREATE INDEX IF NOT EXISTS idx_quizzes_course ON quizzes(course_id);

    CREATE TABLE IF NOT EXISTS quiz_questions (
        id TEXT PRIMARY KEY,
        quiz_id TEXT NOT NULL,
        question_text TEXT NOT NULL,
        question_type TEXT NOT NULL,
        position INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_questions_quiz ON quiz_questions(quiz_id, position);

    CREATE TABLE IF NOT EXISTS quiz_answer_options (
        id TEXT PRIMARY KEY,
        question_id TEXT NOT NULL,
        quiz_id TEXT NOT NULL,
        option_text TEXT NOT NULL,
        is_correct INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (question_id) REFERENCES quiz_questions(id) ON DELETE CASCADE,
        FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_options_question ON quiz_answer_options(question_id, position);
";

/// Database service
pub struct DatabaseService {
    conn: Mutex<Connection>,
}

impl DatabaseService {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        ensure_parent_dir(path)
            .with_context(|| format!("Failed to create data dir for {}", path.display()))?;

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .context("Failed to set WAL mode")?;

        info!("Opened database at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        let service = Self {
            conn: Mutex::new(conn),
        };

        service.initialize().context("Failed to initialize schema")?;
        Ok(service)
    }

    /// Creates tables and indexes if they are missing.
    pub fn initialize(&self) -> Result<(), AppError> {
        let conn = self.lock()?;

        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;

        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn.lock().map_err(|_| AppError::LockPoisoned)
    }

    // ==================== Courses ====================

    pub fn create_course(
        &self,
        requester: &Requester,
        title: &str,
        description: Option<&str>,
    ) -> Result<Course, AppError> {
        if !requester.is_lecturer() {
            warn!("User {} tried to create a course without lecturer role", requester.user_id);
            return Err(AppError::Unauthorized);
        }

        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Course title is required".to_string()));
        }

        let course = Course {
            id: Uuid::new_v4(),
            owner_id: requester.user_id,
            title: title.to_string(),
            description: description.unwrap_or_default().to_string(),
            created_at: Utc::now(),
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO courses (id, owner_id, title, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                course.id.to_string(),
                course.owner_id.to_string(),
                course.title,
                course.description,
                course.created_at.to_rfc3339(),
            ],
        )?;

        info!("Course {} created by {}", course.id, course.owner_id);
        Ok(course)
    }

    #[cfg(test)]
    pub fn get_course(&self, course_id: Uuid) -> Result<Option<Course>, AppError> {
        let conn = self.lock()?;

        let course = conn
            .query_row(
                "SELECT id, owner_id, title, description, created_at FROM courses WHERE id = ?1",
                params![course_id.to_string()],
                row_to_course,
            )
            .optional()?;

        Ok(course)
    }

    /// Resolves a course the requester owns, failing with `Unauthorized` or `NotFound`.
    pub fn authorize_owner(&self, course_id: Uuid, requester: &Requester) -> Result<Course, AppError> {
        let conn = self.lock()?;
        authorize_owner(&conn, course_id, requester)
    }

    /// Deletes a course; the foreign keys cascade through its whole curriculum.
    pub fn delete_course(&self, course_id: Uuid, requester: &Requester) -> Result<(), AppError> {
        let conn = self.lock()?;
        authorize_owner(&conn, course_id, requester)?;

        conn.execute(
            "DELETE FROM courses WHERE id = ?1",
            params![course_id.to_string()],
        )?;

        info!("Course {course_id} deleted by {}", requester.user_id);
        Ok(())
    }

    // ==================== Curriculum reads ====================

    /// Loads the ordered curriculum of a course, or `None` when the course does not exist.
    pub fn load_curriculum(&self, course_id: Uuid) -> Result<Option<Vec<CurriculumMaterial>>, AppError> {
        let conn = self.lock()?;

        let exists = conn
            .query_row(
                "SELECT 1 FROM courses WHERE id = ?1",
                params![course_id.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if !exists {
            return Ok(None);
        }

        Ok(Some(load_curriculum(&conn, course_id)?))
    }
}

/// Course lookup filtered by both id and owner.
pub fn find_owned_course(
    conn: &Connection,
    course_id: Uuid,
    owner_id: Uuid,
) -> rusqlite::Result<Option<Course>> {
    conn.query_row(
        "SELECT id, owner_id, title, description, created_at
         FROM courses WHERE id = ?1 AND owner_id = ?2",
        params![course_id.to_string(), owner_id.to_string()],
        row_to_course,
    )
    .optional()
}

pub(crate) fn authorize_owner(
    conn: &Connection,
    course_id: Uuid,
    requester: &Requester,
) -> Result<Course, AppError> {
    if !requester.is_lecturer() {
        warn!("User {} is not a lecturer, refusing access to course {course_id}", requester.user_id);
        return Err(AppError::Unauthorized);
    }

    match find_owned_course(conn, course_id, requester.user_id)? {
        Some(course) => Ok(course),
        None => {
            warn!("Course {course_id} not found for owner {}", requester.user_id);
            Err(AppError::NotFound(COURSE_NOT_FOUND.to_string()))
        }
    }
}

pub fn load_curriculum(conn: &Connection, course_id: Uuid) -> rusqlite::Result<Vec<CurriculumMaterial>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, course_id, name, description, position, created_at
         FROM materials WHERE course_id = ?1 ORDER BY position, rowid",
    )?;

    let materials = stmt
        .query_map(params![course_id.to_string()], row_to_material)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    materials
        .into_iter()
        .map(|material| {
            let items = load_material_items(conn, material.id)?;
            Ok(CurriculumMaterial { material, items })
        })
        .collect()
}

fn load_material_items(conn: &Connection, material_id: Uuid) -> rusqlite::Result<Vec<CurriculumItem>> {
    let mut items = Vec::new();

    let mut stmt = conn.prepare_cached(
        "SELECT id, material_id, name, description, kind, url, is_free, position
         FROM material_details WHERE material_id = ?1 ORDER BY position, rowid",
    )?;
    for detail in stmt.query_map(params![material_id.to_string()], row_to_lesson_detail)? {
        let detail = detail?;
        items.push(match detail.kind {
            LessonKind::Assignment => CurriculumItem::Assignment(detail),
            _ => CurriculumItem::Lesson(detail),
        });
    }

    let mut stmt = conn.prepare_cached(
        "SELECT id, material_id, course_id, title, description, passing_score, time_limit,
                max_attempts, position
         FROM quizzes WHERE material_id = ?1 ORDER BY position, rowid",
    )?;
    let quizzes = stmt
        .query_map(params![material_id.to_string()], row_to_quiz)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for quiz in quizzes {
        let questions = load_questions(conn, quiz.id)?;
        items.push(CurriculumItem::Quiz(QuizTree { quiz, questions }));
    }

    // Details and quizzes share one position sequence per material.
    items.sort_by_key(CurriculumItem::position);
    Ok(items)
}

fn load_questions(conn: &Connection, quiz_id: Uuid) -> rusqlite::Result<Vec<QuestionTree>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, quiz_id, question_text, question_type, position
         FROM quiz_questions WHERE quiz_id = ?1 ORDER BY position, rowid",
    )?;
    let questions = stmt
        .query_map(params![quiz_id.to_string()], row_to_question)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare_cached(
        "SELECT id, question_id, quiz_id, option_text, is_correct, position
         FROM quiz_answer_options WHERE question_id = ?1 ORDER BY position, rowid",
    )?;

    questions
        .into_iter()
        .map(|question| {
            let options = stmt
                .query_map(params![question.id.to_string()], row_to_option)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(QuestionTree { question, options })
        })
        .collect()
}

// ==================== Row mapping ====================

fn column_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn column_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn column_kind(row: &Row, idx: usize) -> rusqlite::Result<LessonKind> {
    let code: i32 = row.get(idx)?;
    LessonKind::try_from(code).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, code.into()))
}

fn row_to_course(row: &Row) -> rusqlite::Result<Course> {
    Ok(Course {
        id: column_uuid(row, 0)?,
        owner_id: column_uuid(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        created_at: column_timestamp(row, 4)?,
    })
}

fn row_to_material(row: &Row) -> rusqlite::Result<Material> {
    Ok(Material {
        id: column_uuid(row, 0)?,
        course_id: column_uuid(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        position: row.get(4)?,
        created_at: column_timestamp(row, 5)?,
    })
}

fn row_to_lesson_detail(row: &Row) -> rusqlite::Result<LessonDetail> {
    Ok(LessonDetail {
        id: column_uuid(row, 0)?,
        material_id: column_uuid(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        kind: column_kind(row, 4)?,
        url: row.get(5)?,
        is_free: row.get(6)?,
        position: row.get(7)?,
    })
}

fn row_to_quiz(row: &Row) -> rusqlite::Result<Quiz> {
    Ok(Quiz {
        id: column_uuid(row, 0)?,
        material_id: column_uuid(row, 1)?,
        course_id: column_uuid(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        passing_score: row.get(5)?,
        time_limit: row.get(6)?,
        max_attempts: row.get(7)?,
        position: row.get(8)?,
    })
}

fn row_to_question(row: &Row) -> rusqlite::Result<QuizQuestion> {
    Ok(QuizQuestion {
        id: column_uuid(row, 0)?,
        quiz_id: column_uuid(row, 1)?,
        question_text: row.get(2)?,
        question_type: row.get(3)?,
        position: row.get(4)?,
    })
}

fn row_to_option(row: &Row) -> rusqlite::Result<QuizAnswerOption> {
    Ok(QuizAnswerOption {
        id: column_uuid(row, 0)?,
        question_id: column_uuid(row, 1)?,
        quiz_id: column_uuid(row, 2)?,
        option_text: row.get(3)?,
        is_correct: row.get(4)?,
        position: row.get(5)?,
    })
}
