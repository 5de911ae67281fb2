use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    assessments, attempts, courses, enrollments, health, hierarchy, identity_uuids,
    profile_uuids, students, users, AcademicStore, StoreResult,
};
use crate::db::models::{
    AppUser, Attempt, Content, Course, Enrollment, Evaluation, Period, Quiz, StudentProfile,
    Subject, Subtopic, TeacherAssignment, Topic,
};
use crate::db::relation::{EvaluationChain, QuizChain};
use crate::db::types::{AssessmentKind, IdentityId, ProfileId};

#[derive(Clone)]
pub(crate) struct PgAcademicStore {
    pool: PgPool,
}

impl PgAcademicStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AcademicStore for PgAcademicStore {
    async fn get_courses(&self, ids: Option<&[Uuid]>) -> StoreResult<Vec<Course>> {
        Ok(match ids {
            Some(ids) => courses::list_by_ids(&self.pool, ids).await?,
            None => courses::list_all(&self.pool).await?,
        })
    }

    async fn get_subjects(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Subject>> {
        Ok(courses::list_subjects(&self.pool, course_ids).await?)
    }

    async fn get_periods(&self, subject_ids: &[Uuid]) -> StoreResult<Vec<Period>> {
        Ok(hierarchy::list_periods(&self.pool, subject_ids).await?)
    }

    async fn get_topics(&self, period_ids: &[Uuid]) -> StoreResult<Vec<Topic>> {
        Ok(hierarchy::list_topics(&self.pool, period_ids).await?)
    }

    async fn get_subtopics(&self, topic_ids: &[Uuid]) -> StoreResult<Vec<Subtopic>> {
        Ok(hierarchy::list_subtopics(&self.pool, topic_ids).await?)
    }

    async fn get_contents(&self, subtopic_ids: &[Uuid]) -> StoreResult<Vec<Content>> {
        Ok(hierarchy::list_contents(&self.pool, subtopic_ids).await?)
    }

    async fn find_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(courses::find_by_id(&self.pool, id).await?)
    }

    async fn find_subject(&self, id: Uuid) -> StoreResult<Option<Subject>> {
        Ok(courses::find_subject(&self.pool, id).await?)
    }

    async fn find_period(&self, id: Uuid) -> StoreResult<Option<Period>> {
        Ok(hierarchy::find_period(&self.pool, id).await?)
    }

    async fn find_topic(&self, id: Uuid) -> StoreResult<Option<Topic>> {
        Ok(hierarchy::find_topic(&self.pool, id).await?)
    }

    async fn find_subtopic(&self, id: Uuid) -> StoreResult<Option<Subtopic>> {
        Ok(hierarchy::find_subtopic(&self.pool, id).await?)
    }

    async fn get_quizzes(&self, subtopic_ids: &[Uuid]) -> StoreResult<Vec<Quiz>> {
        Ok(assessments::list_quizzes(&self.pool, subtopic_ids).await?)
    }

    async fn get_quizzes_by_ids(&self, quiz_ids: &[Uuid]) -> StoreResult<Vec<Quiz>> {
        Ok(assessments::list_quizzes_by_ids(&self.pool, quiz_ids).await?)
    }

    async fn get_evaluations(
        &self,
        period_ids: &[Uuid],
        subject_ids: &[Uuid],
    ) -> StoreResult<Vec<Evaluation>> {
        Ok(assessments::list_evaluations(&self.pool, period_ids, subject_ids).await?)
    }

    async fn get_evaluations_by_ids(
        &self,
        evaluation_ids: &[Uuid],
    ) -> StoreResult<Vec<Evaluation>> {
        Ok(assessments::list_evaluations_by_ids(&self.pool, evaluation_ids).await?)
    }

    async fn quiz_chains(&self, quiz_ids: &[Uuid]) -> StoreResult<Vec<QuizChain>> {
        Ok(assessments::quiz_chains(&self.pool, quiz_ids).await?)
    }

    async fn evaluation_chains(
        &self,
        evaluation_ids: &[Uuid],
    ) -> StoreResult<Vec<EvaluationChain>> {
        Ok(assessments::evaluation_chains(&self.pool, evaluation_ids).await?)
    }

    async fn get_quiz_attempts(
        &self,
        identity_ids: &[IdentityId],
        quiz_ids: &[Uuid],
    ) -> StoreResult<Vec<Attempt>> {
        let rows =
            attempts::list_quiz_attempts(&self.pool, &identity_uuids(identity_ids), quiz_ids)
                .await?;
        Ok(rows.into_iter().map(|row| row.into_attempt(AssessmentKind::Quiz)).collect())
    }

    async fn get_evaluation_attempts(
        &self,
        identity_ids: &[IdentityId],
        evaluation_ids: &[Uuid],
    ) -> StoreResult<Vec<Attempt>> {
        let rows = attempts::list_evaluation_attempts(
            &self.pool,
            &identity_uuids(identity_ids),
            evaluation_ids,
        )
        .await?;
        Ok(rows.into_iter().map(|row| row.into_attempt(AssessmentKind::Evaluation)).collect())
    }

    async fn get_enrollments(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Enrollment>> {
        Ok(enrollments::list_by_courses(&self.pool, course_ids).await?)
    }

    async fn get_enrollments_for_students(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<Vec<Enrollment>> {
        Ok(enrollments::list_by_students(&self.pool, &profile_uuids(profile_ids)).await?)
    }

    async fn get_profile_identity_map(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<HashMap<ProfileId, IdentityId>> {
        let links = students::list_identity_links(&self.pool, &profile_uuids(profile_ids)).await?;
        Ok(links.into_iter().map(|link| (link.profile_id, link.identity_id)).collect())
    }

    async fn get_students(&self, profile_ids: &[ProfileId]) -> StoreResult<Vec<StudentProfile>> {
        Ok(students::list_by_ids(&self.pool, &profile_uuids(profile_ids)).await?)
    }

    async fn get_teacher_assignments(
        &self,
        teacher: IdentityId,
    ) -> StoreResult<Vec<TeacherAssignment>> {
        Ok(enrollments::list_teacher_assignments(&self.pool, teacher.0).await?)
    }

    async fn get_guardian_students(&self, guardian: IdentityId) -> StoreResult<Vec<ProfileId>> {
        Ok(enrollments::list_guardian_students(&self.pool, guardian.0).await?)
    }

    async fn find_user(&self, id: IdentityId) -> StoreResult<Option<AppUser>> {
        Ok(users::find_by_id(&self.pool, id.0).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(health::ping(&self.pool).await?)
    }
}
