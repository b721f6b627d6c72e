use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub type LessonId = u32;

/// Static definition of a lesson: how long it is and what it pays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    pub total_pages: u32,
    pub min_study_time_secs: u64,
    pub reward: u64,
}

impl Lesson {
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        total_pages: u32,
        min_study_time_secs: u64,
        reward: u64,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            total_pages,
            min_study_time_secs,
            reward,
        }
    }
}

/// The set of lessons known to the rules engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LessonCatalog {
    lessons: Vec<Lesson>,
}

impl LessonCatalog {
    /// # Errors
    /// See [`LessonCatalog::validate`].
    pub fn new(lessons: Vec<Lesson>) -> Result<Self, ValidationError> {
        let catalog = Self { lessons };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Rejects empty catalogs, duplicate ids, zero-page lessons and lessons
    /// that pay nothing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lessons.is_empty() {
            return Err(ValidationError::invalid("lessons", "catalog is empty"));
        }
        let mut seen = BTreeSet::new();
        for lesson in &self.lessons {
            if !seen.insert(lesson.id) {
                return Err(ValidationError::invalid(
                    "lessons.id",
                    format!("duplicate lesson id {}", lesson.id),
                ));
            }
            if lesson.total_pages == 0 {
                return Err(ValidationError::invalid(
                    "lessons.total_pages",
                    format!("lesson {} has no pages", lesson.id),
                ));
            }
            if lesson.reward == 0 {
                return Err(ValidationError::invalid(
                    "lessons.reward",
                    format!("lesson {} has no reward", lesson.id),
                ));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    /// Look up a lesson or fail with [`ValidationError::UnknownLesson`].
    pub fn require(&self, id: LessonId) -> Result<&Lesson, ValidationError> {
        self.get(id)
            .ok_or(ValidationError::UnknownLesson { lesson_id: id })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lesson> {
        self.lessons.iter()
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

impl Default for LessonCatalog {
    fn default() -> Self {
        Self {
            lessons: vec![
                Lesson::new(1, "What is a blockchain?", 2, 60, 10),
                Lesson::new(2, "Cryptography", 3, 90, 15),
                Lesson::new(3, "Decentralized networks", 3, 120, 20),
                Lesson::new(4, "Cryptocurrency", 4, 150, 25),
                Lesson::new(5, "Smart contracts", 4, 180, 30),
                Lesson::new(6, "DeFi applications", 5, 210, 35),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_six_lessons() {
        let catalog = LessonCatalog::default();
        assert_eq!(catalog.len(), 6);
        assert!(catalog.validate().is_ok());
        let first = catalog.get(1).unwrap();
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.min_study_time_secs, 60);
        assert_eq!(first.reward, 10);
    }

    #[test]
    fn rejects_duplicates_and_empty_lessons() {
        assert!(LessonCatalog::new(vec![]).is_err());
        assert!(LessonCatalog::new(vec![
            Lesson::new(1, "a", 1, 0, 1),
            Lesson::new(1, "b", 1, 0, 1),
        ])
        .is_err());
        assert!(LessonCatalog::new(vec![Lesson::new(1, "a", 0, 0, 1)]).is_err());
    }

    #[test]
    fn require_reports_unknown_lesson() {
        let catalog = LessonCatalog::default();
        assert_eq!(
            catalog.require(99),
            Err(ValidationError::UnknownLesson { lesson_id: 99 })
        );
    }
}
