// HTTP route module
// Handlers exposed to the web frontend

pub mod courses;
pub mod materials;
pub mod session;

use uuid::Uuid;

use crate::error::AppError;

pub use courses::{create_course_handler, delete_course_handler, NewCourse};
pub use materials::{
    create_materials_handler, get_materials_handler, parse_chapters, replace_materials_handler,
};
pub use session::{USER_ID_HEADER, USER_ROLE_HEADER};

pub async fn health_handler() -> &'static str {
    "ok"
}

pub(crate) fn parse_course_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidInput("Invalid course ID".to_string()))
}
