use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::types::{AssessmentKind, ContentKind, IdentityId, ProfileId, UserRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Subject {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) course_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Period {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) number: i32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub(crate) starts_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub(crate) ends_at: Option<OffsetDateTime>,
    pub(crate) subject_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Topic {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) period_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Subtopic {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) topic_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Content {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) kind: ContentKind,
    pub(crate) subtopic_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Quiz {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) subtopic_id: Uuid,
    pub(crate) opens_at: Option<OffsetDateTime>,
    pub(crate) closes_at: Option<OffsetDateTime>,
    pub(crate) is_active: bool,
}

/// Evaluations hang off (period, subject) directly instead of a subtopic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Evaluation {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) period_id: Uuid,
    pub(crate) subject_id: Uuid,
    pub(crate) opens_at: Option<OffsetDateTime>,
    pub(crate) closes_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub(crate) struct Enrollment {
    pub(crate) student_id: ProfileId,
    pub(crate) course_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub(crate) struct TeacherAssignment {
    pub(crate) teacher_id: Uuid,
    pub(crate) course_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentProfile {
    pub(crate) id: ProfileId,
    pub(crate) identity_id: Option<IdentityId>,
    pub(crate) full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub(crate) struct IdentityLink {
    pub(crate) profile_id: ProfileId,
    pub(crate) identity_id: IdentityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub(crate) struct AppUser {
    pub(crate) id: IdentityId,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
}

/// One row of `quiz_attempts` or `evaluation_attempts`; the queries alias the
/// assessment foreign key to `assessment_id`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub(crate) struct AttemptRow {
    pub(crate) id: Uuid,
    pub(crate) assessment_id: Uuid,
    pub(crate) student_id: IdentityId,
    pub(crate) grade: Option<f64>,
    pub(crate) completed: bool,
    pub(crate) started_at: Option<OffsetDateTime>,
    pub(crate) finished_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Attempt {
    pub(crate) id: Uuid,
    pub(crate) kind: AssessmentKind,
    pub(crate) assessment_id: Uuid,
    pub(crate) student_id: IdentityId,
    pub(crate) grade: Option<f64>,
    pub(crate) completed: bool,
    pub(crate) started_at: Option<OffsetDateTime>,
    pub(crate) finished_at: Option<OffsetDateTime>,
}

impl AttemptRow {
    pub(crate) fn into_attempt(self, kind: AssessmentKind) -> Attempt {
        Attempt {
            id: self.id,
            kind,
            assessment_id: self.assessment_id,
            student_id: self.student_id,
            grade: self.grade,
            completed: self.completed,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

impl Attempt {
    /// The grade, but only when the attempt may feed aggregation.
    pub(crate) fn usable_grade(&self) -> Option<f64> {
        if self.completed {
            self.grade
        } else {
            None
        }
    }
}
