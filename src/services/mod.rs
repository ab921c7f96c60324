// Service module
// Core business logic: storage and curriculum builds

pub mod curriculum;
pub mod database;

pub use curriculum::{
    write_answer_option, write_lesson_detail, write_material, write_question, write_quiz,
    BuildMode, BuildSummary, CurriculumReplacer, NewLessonDetail,
};

pub use database::{find_owned_course, load_curriculum, DatabaseService};
