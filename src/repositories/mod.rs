//! Read access to the school data store.
//!
//! The engine only ever talks to [`AcademicStore`]; the Postgres
//! implementation lives in [`postgres`] and is built from the per-table
//! query modules below.

pub(crate) mod assessments;
pub(crate) mod attempts;
pub(crate) mod courses;
pub(crate) mod enrollments;
pub(crate) mod health;
pub(crate) mod hierarchy;
pub(crate) mod postgres;
pub(crate) mod students;
pub(crate) mod users;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{
    AppUser, Attempt, Content, Course, Enrollment, Evaluation, Period, Quiz, StudentProfile,
    Subject, Subtopic, TeacherAssignment, Topic,
};
use crate::db::relation::{EvaluationChain, QuizChain};
use crate::db::types::{IdentityId, ProfileId};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Database(other),
        }
    }
}

pub(crate) type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub(crate) trait AcademicStore: Send + Sync {
    /// All courses when `ids` is `None`.
    async fn get_courses(&self, ids: Option<&[Uuid]>) -> StoreResult<Vec<Course>>;
    async fn get_subjects(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Subject>>;
    async fn get_periods(&self, subject_ids: &[Uuid]) -> StoreResult<Vec<Period>>;
    async fn get_topics(&self, period_ids: &[Uuid]) -> StoreResult<Vec<Topic>>;
    async fn get_subtopics(&self, topic_ids: &[Uuid]) -> StoreResult<Vec<Subtopic>>;
    async fn get_contents(&self, subtopic_ids: &[Uuid]) -> StoreResult<Vec<Content>>;

    async fn find_course(&self, id: Uuid) -> StoreResult<Option<Course>>;
    async fn find_subject(&self, id: Uuid) -> StoreResult<Option<Subject>>;
    async fn find_period(&self, id: Uuid) -> StoreResult<Option<Period>>;
    async fn find_topic(&self, id: Uuid) -> StoreResult<Option<Topic>>;
    async fn find_subtopic(&self, id: Uuid) -> StoreResult<Option<Subtopic>>;

    async fn get_quizzes(&self, subtopic_ids: &[Uuid]) -> StoreResult<Vec<Quiz>>;
    async fn get_quizzes_by_ids(&self, quiz_ids: &[Uuid]) -> StoreResult<Vec<Quiz>>;
    /// Evaluations attached to any of `period_ids` or any of `subject_ids`.
    async fn get_evaluations(
        &self,
        period_ids: &[Uuid],
        subject_ids: &[Uuid],
    ) -> StoreResult<Vec<Evaluation>>;
    async fn get_evaluations_by_ids(&self, evaluation_ids: &[Uuid])
        -> StoreResult<Vec<Evaluation>>;

    /// Nested fetch: each quiz with subtopic → topic → period → subject → course embedded.
    async fn quiz_chains(&self, quiz_ids: &[Uuid]) -> StoreResult<Vec<QuizChain>>;
    async fn evaluation_chains(&self, evaluation_ids: &[Uuid])
        -> StoreResult<Vec<EvaluationChain>>;

    /// Every attempt, completed or not.
    async fn get_quiz_attempts(
        &self,
        identity_ids: &[IdentityId],
        quiz_ids: &[Uuid],
    ) -> StoreResult<Vec<Attempt>>;
    async fn get_evaluation_attempts(
        &self,
        identity_ids: &[IdentityId],
        evaluation_ids: &[Uuid],
    ) -> StoreResult<Vec<Attempt>>;

    async fn get_enrollments(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Enrollment>>;
    async fn get_enrollments_for_students(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<Vec<Enrollment>>;
    async fn get_profile_identity_map(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<HashMap<ProfileId, IdentityId>>;
    async fn get_students(&self, profile_ids: &[ProfileId]) -> StoreResult<Vec<StudentProfile>>;

    async fn get_teacher_assignments(
        &self,
        teacher: IdentityId,
    ) -> StoreResult<Vec<TeacherAssignment>>;
    async fn get_guardian_students(&self, guardian: IdentityId) -> StoreResult<Vec<ProfileId>>;
    async fn find_user(&self, id: IdentityId) -> StoreResult<Option<AppUser>>;

    async fn ping(&self) -> StoreResult<()>;
}

pub(crate) fn identity_uuids(ids: &[IdentityId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.0).collect()
}

pub(crate) fn profile_uuids(ids: &[ProfileId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.0).collect()
}
