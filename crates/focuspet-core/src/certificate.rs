//! Lesson completion certificates.
//!
//! One certificate per (student, lesson). Certificates are bound to the
//! student: there is no transfer operation.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::clock::Clock;
use crate::error::{Result, StateConflictError, ValidationError};
use crate::events::Event;
use crate::ledger::UserId;
use crate::lesson::{Lesson, LessonId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Hex SHA-256 over student, lesson and completion time.
    pub id: String,
    pub student: UserId,
    pub lesson_id: LessonId,
    pub completion_time: DateTime<Utc>,
    pub study_duration_secs: u64,
}

impl Certificate {
    fn fingerprint(student: &UserId, lesson_id: LessonId, at: DateTime<Utc>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(student.as_str().as_bytes());
        hasher.update(lesson_id.to_le_bytes());
        hasher.update(at.timestamp().to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// Self-contained metadata URI: `data:application/json;base64,...`.
    pub fn token_uri(&self, lesson: &Lesson) -> Result<String> {
        let metadata = serde_json::json!({
            "name": format!("Certificate: {}", lesson.title),
            "description": format!(
                "Awarded to {} for completing lesson {}",
                self.student, lesson.id
            ),
            "attributes": [
                { "trait_type": "lesson", "value": lesson.id },
                { "trait_type": "study_duration_secs", "value": self.study_duration_secs },
                { "trait_type": "completed_at", "value": self.completion_time.to_rfc3339() },
            ],
        });
        let json = serde_json::to_vec(&metadata)?;
        Ok(format!("data:application/json;base64,{}", STANDARD.encode(json)))
    }
}

/// A student's certificates, keyed by lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateRegistry {
    certificates: BTreeMap<LessonId, Certificate>,
}

impl CertificateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_certificate(&self, lesson_id: LessonId) -> bool {
        self.certificates.contains_key(&lesson_id)
    }

    pub fn get(&self, lesson_id: LessonId) -> Option<&Certificate> {
        self.certificates.get(&lesson_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Certificate> {
        self.certificates.values()
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Certificates are issued only by the core after an accepted lesson
    /// claim.
    ///
    /// # Errors
    /// [`StateConflictError::CertificateExists`] if the lesson is already
    /// certified for this student.
    pub(crate) fn issue(
        &mut self,
        student: &UserId,
        lesson_id: LessonId,
        study_duration_secs: u64,
        clock: &dyn Clock,
    ) -> Result<Event> {
        if self.has_certificate(lesson_id) {
            return Err(StateConflictError::CertificateExists { lesson_id }.into());
        }
        let at = clock.now();
        let certificate = Certificate {
            id: Certificate::fingerprint(student, lesson_id, at),
            student: student.clone(),
            lesson_id,
            completion_time: at,
            study_duration_secs,
        };
        let certificate_id = certificate.id.clone();
        self.certificates.insert(lesson_id, certificate);
        info!(student = %student, lesson_id, "certificate issued");
        Ok(Event::CertificateIssued {
            user: student.clone(),
            lesson_id,
            certificate_id,
            at,
        })
    }

    /// Check restored certificates all belong to `student` and sit under
    /// their own lesson id.
    pub fn validate(&self, student: &UserId) -> Result<(), ValidationError> {
        for (lesson_id, certificate) in &self.certificates {
            if &certificate.student != student || certificate.lesson_id != *lesson_id {
                return Err(ValidationError::invalid(
                    "certificates",
                    format!(
                        "entry {lesson_id} holds lesson {} for {}",
                        certificate.lesson_id, certificate.student
                    ),
                ));
            }
        }
        Ok(())
    }
}
