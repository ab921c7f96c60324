// Data model module
// Persisted curriculum entities and the inbound curriculum payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_PASSING_SCORE: i32 = 70;
pub const DEFAULT_TIME_LIMIT_MINUTES: i32 = 60;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 1;
pub const DEFAULT_QUESTION_TYPE: &str = "multiple_choice";

// ==================== Identity ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Lecturer,
    Student,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lecturer" => Ok(Role::Lecturer),
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Identity of the caller, already resolved by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Uuid,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_lecturer(&self) -> bool {
        self.role == Role::Lecturer
    }
}

// ==================== Persisted entities ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A chapter ("bab") of a course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub description: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// Stored as an integer code: video=1, pdf=2, url=3, assignment=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum LessonKind {
    Video,
    Pdf,
    Url,
    Assignment,
}

impl LessonKind {
    /// Maps a lesson's `lessonType`; anything unrecognised is a plain url lesson.
    pub fn from_lesson_type(lesson_type: Option<&str>) -> Self {
        match lesson_type.map(str::trim) {
            Some("video") => LessonKind::Video,
            Some("pdf") => LessonKind::Pdf,
            _ => LessonKind::Url,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            LessonKind::Video => 1,
            LessonKind::Pdf => 2,
            LessonKind::Url => 3,
            LessonKind::Assignment => 4,
        }
    }
}

impl From<LessonKind> for i32 {
    fn from(kind: LessonKind) -> Self {
        kind.code()
    }
}

impl TryFrom<i32> for LessonKind {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(LessonKind::Video),
            2 => Ok(LessonKind::Pdf),
            3 => Ok(LessonKind::Url),
            4 => Ok(LessonKind::Assignment),
            other => Err(format!("unknown lesson kind code: {other}")),
        }
    }
}

/// Lesson, document or assignment placeholder under a material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonDetail {
    pub id: Uuid,
    pub material_id: Uuid,
    pub name: String,
    pub description: String,
    pub kind: LessonKind,
    pub url: String,
    pub is_free: bool,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quiz {
    pub id: Uuid,
    pub material_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub passing_score: i32,
    pub time_limit: i32,
    pub max_attempts: i32,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizAnswerOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub quiz_id: Uuid,
    pub option_text: String,
    pub is_correct: bool,
    pub position: i64,
}

// ==================== Curriculum read model ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionTree {
    #[serde(flatten)]
    pub question: QuizQuestion,
    pub options: Vec<QuizAnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizTree {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CurriculumItem {
    Lesson(LessonDetail),
    Assignment(LessonDetail),
    Quiz(QuizTree),
}

impl CurriculumItem {
    pub fn position(&self) -> i64 {
        match self {
            CurriculumItem::Lesson(detail) | CurriculumItem::Assignment(detail) => detail.position,
            CurriculumItem::Quiz(tree) => tree.quiz.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurriculumMaterial {
    #[serde(flatten)]
    pub material: Material,
    pub items: Vec<CurriculumItem>,
}

// ==================== Inbound payload ====================

/// One chapter of a curriculum build request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemInput>,
}

/// A content item inside a chapter, tagged by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemInput {
    Lesson(LessonInput),
    Quiz(QuizInput),
    Assignment(AssignmentInput),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LessonInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "lessonType")]
    pub lesson_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "isFree")]
    pub is_free: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "passingScore")]
    pub passing_score: Option<i32>,
    #[serde(
        default,
        alias = "timeLimit",
        alias = "timeLimitMinutes",
        alias = "time_limit_minutes"
    )]
    pub time_limit: Option<i32>,
    #[serde(default, alias = "maxAttempts")]
    pub max_attempts: Option<i32>,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    #[serde(alias = "text")]
    pub question_text: String,
    #[serde(default, rename = "type", alias = "question_type")]
    pub question_type: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionInput {
    #[serde(alias = "text")]
    pub option_text: String,
    #[serde(default, alias = "isCorrect")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentInput {
    pub title: String,
    #[serde(default)]
    pub instructions: Option<String>,
}
