// Materials routes module
// Build and read endpoints for a course curriculum

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use log::debug;
use serde_json::{json, Value};

use super::parse_course_id;
use crate::{
    error::AppError,
    models::{ChapterInput, Requester},
    services::curriculum::{BuildMode, CurriculumReplacer, MISSING_CHAPTERS},
    state::AppState,
};

/// Decodes the `babs` list of a build request.
///
/// `Create` needs at least one chapter, `Replace` accepts an empty list.
pub fn parse_chapters(body: &[u8], mode: BuildMode) -> Result<Vec<ChapterInput>, AppError> {
    let missing = || AppError::InvalidInput(MISSING_CHAPTERS.to_string());

    let mut payload: Value = serde_json::from_slice(body).map_err(|e| {
        debug!("Curriculum payload is not JSON: {e}");
        missing()
    })?;

    let babs = match payload.get_mut("babs").map(Value::take) {
        Some(babs @ Value::Array(_)) => babs,
        _ => return Err(missing()),
    };

    if mode == BuildMode::Create && babs.as_array().is_some_and(Vec::is_empty) {
        return Err(missing());
    }

    serde_json::from_value(babs)
        .map_err(|e| AppError::InvalidInput(format!("Invalid curriculum payload: {e}")))
}

fn build_curriculum(
    state: &AppState,
    requester: &Requester,
    course_id: &str,
    body: &[u8],
    mode: BuildMode,
) -> Result<usize, AppError> {
    let course_id = parse_course_id(course_id)?;

    // Ownership is settled before the payload is looked at.
    state.db.authorize_owner(course_id, requester)?;

    let chapters = parse_chapters(body, mode)?;
    let summary = CurriculumReplacer::new(&state.db).replace(course_id, requester, &chapters, mode)?;

    Ok(summary.chapters)
}

/// Runs a build on the blocking pool; the SQLite transaction holds the connection lock throughout.
async fn spawn_build(
    state: Arc<AppState>,
    requester: Requester,
    course_id: String,
    body: Bytes,
    mode: BuildMode,
) -> Result<usize, AppError> {
    tokio::task::spawn_blocking(move || {
        build_curriculum(&state, &requester, &course_id, &body, mode)
    })
    .await?
}

pub async fn create_materials_handler(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Path(course_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let chapters = spawn_build(state, requester, course_id, body, BuildMode::Create).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": format!("Curriculum created with {chapters} chapter(s)"),
        })),
    ))
}

pub async fn replace_materials_handler(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Path(course_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let chapters = spawn_build(state, requester, course_id, body, BuildMode::Replace).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": format!("Curriculum replaced with {chapters} chapter(s)"),
        })),
    ))
}

pub async fn get_materials_handler(
    State(state): State<Arc<AppState>>,
    _requester: Requester,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course_id = parse_course_id(&course_id)?;

    let materials = state
        .db
        .load_curriculum(course_id)?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(json!({ "success": true, "materials": materials })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{spawn_app, with_identity, TestApp};
    use super::*;
    use crate::models::{CurriculumItem, LessonKind, Role};
    use reqwest::StatusCode;
    use uuid::Uuid;

    async fn send(
        app: &TestApp,
        method: reqwest::Method,
        course_id: &str,
        user: Uuid,
        role: Role,
        body: Value,
    ) -> (StatusCode, Value) {
        let url = app.url(&format!("/courses/{course_id}/materials"));
        let response = with_identity(app.client.request(method, url), user, role)
            .json(&body)
            .send()
            .await
            .unwrap();

        let status = response.status();
        (status, response.json().await.unwrap())
    }

    #[test]
    fn test_parse_chapters_rules() {
        assert!(matches!(
            parse_chapters(br#"{"babs": []}"#, BuildMode::Create),
            Err(AppError::InvalidInput(msg)) if msg == MISSING_CHAPTERS
        ));
        assert!(parse_chapters(br#"{"babs": []}"#, BuildMode::Replace).unwrap().is_empty());
        assert!(parse_chapters(br#"{"babs": {"name": "x"}}"#, BuildMode::Replace).is_err());
        assert!(parse_chapters(br#"{}"#, BuildMode::Replace).is_err());
        assert!(parse_chapters(b"not json", BuildMode::Create).is_err());

        let err = parse_chapters(
            br#"{"babs": [{"name": "Ch1", "items": [{"type": "podcast"}]}]}"#,
            BuildMode::Create,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(msg) if msg.starts_with("Invalid curriculum payload")));
    }

    #[tokio::test]
    async fn test_post_single_lesson() {
        let app = spawn_app().await;
        let owner = Uuid::new_v4();
        let course_id = app.create_course(owner).await;

        let (status, body) = send(
            &app,
            reqwest::Method::POST,
            &course_id.to_string(),
            owner,
            Role::Lecturer,
            json!({"babs": [{"name": "Ch1", "items": [
                {"type": "lesson", "name": "Intro", "lessonType": "video", "url": "http://x/v.mp4", "isFree": true}
            ]}]}),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);

        let tree = app.state.db.load_curriculum(course_id).unwrap().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].material.name, "Ch1");
        assert_eq!(tree[0].items.len(), 1);
        let CurriculumItem::Lesson(detail) = &tree[0].items[0] else {
            panic!("expected lesson");
        };
        assert_eq!(detail.kind, LessonKind::Video);
        assert!(detail.is_free);
        assert_eq!(detail.url, "http://x/v.mp4");
    }

    #[tokio::test]
    async fn test_post_empty_babs_is_rejected() {
        let app = spawn_app().await;
        let owner = Uuid::new_v4();
        let course_id = app.create_course(owner).await;

        let (status, body) = send(
            &app,
            reqwest::Method::POST,
            &course_id.to_string(),
            owner,
            Role::Lecturer,
            json!({"babs": []}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Materials (babs) data is required and must be an array"}));
    }

    #[tokio::test]
    async fn test_put_empty_babs_clears_curriculum() {
        let app = spawn_app().await;
        let owner = Uuid::new_v4();
        let course_id = app.create_course(owner).await;

        let (status, _) = send(
            &app,
            reqwest::Method::POST,
            &course_id.to_string(),
            owner,
            Role::Lecturer,
            json!({"babs": [{"name": "One"}, {"name": "Two"}, {"name": "Three"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(app.state.db.load_curriculum(course_id).unwrap().unwrap().len(), 3);

        let (status, body) = send(
            &app,
            reqwest::Method::PUT,
            &course_id.to_string(),
            owner,
            Role::Lecturer,
            json!({"babs": []}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(app.state.db.load_curriculum(course_id).unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_quiz_with_questions_and_options() {
        let app = spawn_app().await;
        let owner = Uuid::new_v4();
        let course_id = app.create_course(owner).await;

        let (status, _) = send(
            &app,
            reqwest::Method::POST,
            &course_id.to_string(),
            owner,
            Role::Lecturer,
            json!({"babs": [{"name": "Ch1", "items": [{
                "type": "quiz",
                "title": "Basics",
                "questions": [
                    {"text": "Q1", "type": "multiple_choice", "options": [
                        {"text": "a", "is_correct": true}, {"text": "b"}, {"text": "c"}
                    ]},
                    {"text": "Q2", "type": "multiple_choice", "options": [
                        {"text": "d"}, {"text": "e"}, {"text": "f", "is_correct": true}
                    ]}
                ]
            }]}]}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let tree = app.state.db.load_curriculum(course_id).unwrap().unwrap();
        let quizzes: Vec<_> = tree[0]
            .items
            .iter()
            .filter_map(|item| match item {
                CurriculumItem::Quiz(quiz) => Some(quiz),
                _ => None,
            })
            .collect();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].questions.len(), 2);
        for question in &quizzes[0].questions {
            assert_eq!(question.options.len(), 3);
            assert_eq!(question.options.iter().filter(|o| o.is_correct).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_student_is_rejected() {
        let app = spawn_app().await;
        let owner = Uuid::new_v4();
        let course_id = app.create_course(owner).await;

        let (status, body) = send(
            &app,
            reqwest::Method::POST,
            &course_id.to_string(),
            Uuid::new_v4(),
            Role::Student,
            json!({"babs": [{"name": "Ch1"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"error": "Unauthorized"}));
        assert!(app.state.db.load_curriculum(course_id).unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_course_is_not_found_whatever_the_payload() {
        let app = spawn_app().await;
        let course_id = app.create_course(Uuid::new_v4()).await;
        let intruder = Uuid::new_v4();

        for (method, body) in [
            (reqwest::Method::POST, json!({"babs": [{"name": "Ch1"}]})),
            (reqwest::Method::POST, json!({"babs": []})),
            (reqwest::Method::PUT, json!({"babs": "nope"})),
        ] {
            let (status, _) = send(&app, method, &course_id.to_string(), intruder, Role::Lecturer, body).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }

        assert!(app.state.db.load_curriculum(course_id).unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_course_id() {
        let app = spawn_app().await;

        let (status, body) = send(
            &app,
            reqwest::Method::PUT,
            "42abc",
            Uuid::new_v4(),
            Role::Lecturer,
            json!({"babs": []}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid course ID");
    }

    #[tokio::test]
    async fn test_build_failure_reports_details() {
        let app = spawn_app().await;
        let owner = Uuid::new_v4();
        let course_id = app.create_course(owner).await;
        app.state
            .db
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_option BEFORE INSERT ON quiz_answer_options
                 WHEN NEW.option_text = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'option rejected'); END;",
            )
            .unwrap();

        let (status, body) = send(
            &app,
            reqwest::Method::POST,
            &course_id.to_string(),
            owner,
            Role::Lecturer,
            json!({"babs": [
                {"name": "Fine", "items": [{"type": "lesson", "name": "Intro"}]},
                {"name": "Broken", "items": [
                    {"type": "quiz", "title": "Q", "questions": [{"text": "Why?", "options": [{"text": "boom"}]}]}
                ]}
            ]}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to build curriculum");
        assert!(body["details"].as_str().is_some_and(|d| d.contains("option rejected")));
        assert!(app.state.db.load_curriculum(course_id).unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_materials_returns_ordered_tree() {
        let app = spawn_app().await;
        let owner = Uuid::new_v4();
        let course_id = app.create_course(owner).await;

        let (status, _) = send(
            &app,
            reqwest::Method::POST,
            &course_id.to_string(),
            owner,
            Role::Lecturer,
            json!({"babs": [
                {"name": "A", "items": [
                    {"type": "lesson", "name": "lesson1"},
                    {"type": "quiz", "title": "quiz1"},
                    {"type": "assignment", "title": "task1"}
                ]},
                {"name": "B"}
            ]}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let response = with_identity(
            app.client.get(app.url(&format!("/courses/{course_id}/materials"))),
            Uuid::new_v4(),
            Role::Student,
        )
        .send()
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        let materials = body["materials"].as_array().unwrap();
        assert_eq!(materials[0]["name"], "A");
        assert_eq!(materials[1]["name"], "B");

        let kinds: Vec<_> = materials[0]["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, ["lesson", "quiz", "assignment"]);
        assert_eq!(materials[0]["items"][1]["passing_score"], 70);
    }

    #[tokio::test]
    async fn test_get_materials_of_unknown_course() {
        let app = spawn_app().await;

        let response = with_identity(
            app.client.get(app.url(&format!("/courses/{}/materials", Uuid::new_v4()))),
            Uuid::new_v4(),
            Role::Student,
        )
        .send()
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
