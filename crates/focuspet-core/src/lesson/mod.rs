mod catalog;
mod validator;

pub use catalog::{Lesson, LessonCatalog, LessonId};
pub use validator::{LearningSession, LessonValidator};
