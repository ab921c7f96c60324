// Courses routes module
// Course creation and deletion endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::parse_course_id;
use crate::{error::AppError, models::Requester, state::AppState};

#[derive(Debug, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Json(payload): Json<NewCourse>,
) -> Result<impl IntoResponse, AppError> {
    let course = state
        .db
        .create_course(&requester, &payload.title, payload.description.as_deref())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "course": course })),
    ))
}

pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course_id = parse_course_id(&course_id)?;

    state.db.delete_course(course_id, &requester)?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Course deleted" })),
    ))
}
