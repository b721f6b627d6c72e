//! Lesson progression rules.
//!
//! A lesson counts as read only when every page was visited in order and the
//! learner stayed at least the lesson's minimum study time. Going back to an
//! earlier page is always allowed; skipping ahead never is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::{LessonCatalog, LessonId};
use crate::clock::Clock;
use crate::error::{Result, StateConflictError, ValidationError};
use crate::events::Event;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningSession {
    pub lesson_id: LessonId,
    pub start_time: DateTime<Utc>,
    pub current_page: u32,
    pub max_page_reached: u32,
    pub completed: bool,
}

impl LearningSession {
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.start_time).num_seconds().max(0) as u64
    }
}

/// Holds at most one open learning session for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonValidator {
    #[serde(default)]
    session: Option<LearningSession>,
}

impl LessonValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&LearningSession> {
        self.session.as_ref()
    }

    /// Open a session for `lesson_id`.
    ///
    /// Returns `None` when that lesson is already open; the running session
    /// keeps its original start time.
    ///
    /// # Errors
    /// - [`ValidationError::UnknownLesson`] if the lesson is not in the catalog
    /// - [`StateConflictError::SessionConflict`] if another lesson is open
    pub fn start(
        &mut self,
        lesson_id: LessonId,
        catalog: &LessonCatalog,
        clock: &dyn Clock,
    ) -> Result<Option<Event>> {
        catalog.require(lesson_id)?;
        if let Some(open) = &self.session {
            if open.lesson_id == lesson_id {
                return Ok(None);
            }
            return Err(StateConflictError::SessionConflict {
                open_lesson: open.lesson_id,
                requested: lesson_id,
            }
            .into());
        }
        let at = clock.now();
        self.session = Some(LearningSession {
            lesson_id,
            start_time: at,
            current_page: 1,
            max_page_reached: 1,
            completed: false,
        });
        debug!(lesson_id, "learning session started");
        Ok(Some(Event::LessonStarted { lesson_id, at }))
    }

    /// Move to `page`. Revisiting any reached page is fine; only the page
    /// right after the furthest one reached may be opened for the first time.
    pub fn advance_page(
        &mut self,
        lesson_id: LessonId,
        page: u32,
        catalog: &LessonCatalog,
    ) -> Result<&LearningSession> {
        let total_pages = catalog.require(lesson_id)?.total_pages;
        let session = self.open_session_mut(lesson_id)?;
        if page == 0 || page > total_pages {
            return Err(ValidationError::PageOutOfRange { page, total_pages }.into());
        }
        if page > session.max_page_reached + 1 {
            return Err(StateConflictError::NonSequentialProgress {
                requested: page,
                max_reached: session.max_page_reached,
            }
            .into());
        }
        session.current_page = page;
        session.max_page_reached = session.max_page_reached.max(page);
        Ok(session)
    }

    /// Check whether the open session could be completed right now, without
    /// changing anything. Returns the study time in seconds.
    pub fn check_complete(
        &self,
        lesson_id: LessonId,
        catalog: &LessonCatalog,
        clock: &dyn Clock,
    ) -> Result<u64> {
        let lesson = catalog.require(lesson_id)?;
        let session = self.open_session(lesson_id)?;
        let studied_secs = session.elapsed_secs(clock.now());
        if studied_secs < lesson.min_study_time_secs {
            return Err(StateConflictError::StudyTimeTooShort {
                studied_secs,
                required_secs: lesson.min_study_time_secs,
            }
            .into());
        }
        if session.max_page_reached != lesson.total_pages {
            return Err(StateConflictError::IncompletePages {
                reached: session.max_page_reached,
                total: lesson.total_pages,
            }
            .into());
        }
        Ok(studied_secs)
    }

    /// Finish the open session and clear it.
    pub fn complete(
        &mut self,
        lesson_id: LessonId,
        catalog: &LessonCatalog,
        clock: &dyn Clock,
    ) -> Result<Event> {
        let study_time_secs = self.check_complete(lesson_id, catalog, clock)?;
        if let Some(mut finished) = self.session.take() {
            finished.completed = true;
            debug!(?finished, study_time_secs, "learning session completed");
        }
        Ok(Event::LessonCompleted {
            lesson_id,
            study_time_secs,
            at: clock.now(),
        })
    }

    /// Check a restored session against `catalog`.
    ///
    /// # Errors
    /// The lesson is unknown or the page cursor is outside
    /// `1 <= current_page <= max_page_reached <= total_pages`.
    pub fn validate(&self, catalog: &LessonCatalog) -> Result<(), ValidationError> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let total_pages = catalog.require(session.lesson_id)?.total_pages;
        if session.max_page_reached == 0 || session.max_page_reached > total_pages {
            return Err(ValidationError::PageOutOfRange {
                page: session.max_page_reached,
                total_pages,
            });
        }
        if session.current_page == 0 || session.current_page > session.max_page_reached {
            return Err(ValidationError::invalid(
                "lessons.session.current_page",
                format!(
                    "{} is outside 1..={}",
                    session.current_page, session.max_page_reached
                ),
            ));
        }
        if session.completed {
            return Err(ValidationError::invalid(
                "lessons.session.completed",
                "a completed session is never left open",
            ));
        }
        Ok(())
    }

    /// Abandon the open session, if any.
    pub fn close(&mut self) -> Option<LearningSession> {
        self.session.take()
    }

    fn open_session(&self, lesson_id: LessonId) -> Result<&LearningSession> {
        match &self.session {
            None => Err(StateConflictError::NoActiveSession { lesson_id }.into()),
            Some(s) if s.lesson_id != lesson_id => Err(StateConflictError::LessonMismatch {
                open_lesson: s.lesson_id,
                requested: lesson_id,
            }
            .into()),
            Some(s) => Ok(s),
        }
    }

    fn open_session_mut(&mut self, lesson_id: LessonId) -> Result<&mut LearningSession> {
        self.open_session(lesson_id)?;
        self.session
            .as_mut()
            .ok_or_else(|| StateConflictError::NoActiveSession { lesson_id }.into())
    }
}
