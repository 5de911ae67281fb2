use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::db::models::Attempt;
use crate::db::types::{AssessmentKind, IdentityId};
use crate::repositories::{AcademicStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptFilter {
    /// Only `completed = true`; the only set grade statistics may see.
    Completed,
    /// Everything, for "has this student tried at all".
    Any,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AttemptSet {
    quiz: Vec<Attempt>,
    evaluation: Vec<Attempt>,
}

impl AttemptSet {
    pub(crate) fn new(quiz: Vec<Attempt>, evaluation: Vec<Attempt>) -> Self {
        Self { quiz, evaluation }
    }

    pub(crate) fn quiz(&self) -> impl Iterator<Item = &Attempt> {
        self.quiz.iter()
    }

    pub(crate) fn evaluation(&self) -> impl Iterator<Item = &Attempt> {
        self.evaluation.iter()
    }

    pub(crate) fn all(&self) -> impl Iterator<Item = &Attempt> {
        self.quiz.iter().chain(self.evaluation.iter())
    }

    pub(crate) fn completed(&self) -> Self {
        Self { quiz: completed_only(&self.quiz), evaluation: completed_only(&self.evaluation) }
    }

    pub(crate) fn merge(&mut self, other: AttemptSet) {
        self.quiz.extend(other.quiz);
        self.evaluation.extend(other.evaluation);
    }

    /// Identities with at least one attempt in the set.
    pub(crate) fn students(&self) -> HashSet<IdentityId> {
        self.all().map(|attempt| attempt.student_id).collect()
    }

    pub(crate) fn status(
        &self,
        student: IdentityId,
        kind: AssessmentKind,
        assessment_id: Uuid,
    ) -> AttemptStatus {
        let pool = match kind {
            AssessmentKind::Quiz => &self.quiz,
            AssessmentKind::Evaluation => &self.evaluation,
        };
        let mut status = AttemptStatus::NotStarted;
        for attempt in pool {
            if attempt.student_id != student || attempt.assessment_id != assessment_id {
                continue;
            }
            if attempt.completed {
                return AttemptStatus::Completed;
            }
            status = AttemptStatus::InProgress;
        }
        status
    }
}

fn completed_only(attempts: &[Attempt]) -> Vec<Attempt> {
    attempts.iter().filter(|attempt| attempt.completed).cloned().collect()
}

/// Attempts of `students` on the given assessments.
pub(crate) async fn collect(
    store: &dyn AcademicStore,
    students: &[IdentityId],
    quiz_ids: &[Uuid],
    evaluation_ids: &[Uuid],
    filter: AttemptFilter,
) -> StoreResult<AttemptSet> {
    if students.is_empty() {
        return Ok(AttemptSet::default());
    }

    let (quiz, evaluation) = tokio::try_join!(
        store.get_quiz_attempts(students, quiz_ids),
        store.get_evaluation_attempts(students, evaluation_ids),
    )?;
    let set = AttemptSet::new(quiz, evaluation);

    Ok(match filter {
        AttemptFilter::Completed => set.completed(),
        AttemptFilter::Any => set,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;

    #[tokio::test]
    async fn completed_filter_drops_open_attempts() {
        let store = InMemoryStore::default();
        let course = store.add_course("1° Básico");
        let path = store.add_subject_path(course.id, "Lenguaje");
        let quiz = store.add_quiz(path.subtopic.id, "Vocales");
        let student = store.add_student("Sofía Rojas", true);
        let identity = student.identity_id.expect("identity");
        store.record_quiz_attempt(identity, quiz.id, Some(4.0), true);
        store.record_quiz_attempt(identity, quiz.id, None, false);

        let any = collect(&store, &[identity], &[quiz.id], &[], AttemptFilter::Any)
            .await
            .expect("any");
        let completed = collect(&store, &[identity], &[quiz.id], &[], AttemptFilter::Completed)
            .await
            .expect("completed");

        assert_eq!(any.all().count(), 2);
        assert_eq!(completed.all().count(), 1);
        assert!(completed.all().all(|attempt| attempt.completed));
    }

    #[tokio::test]
    async fn status_tracks_the_furthest_attempt() {
        let store = InMemoryStore::default();
        let student = IdentityId(Uuid::new_v4());
        let (started, finished, untouched) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.record_quiz_attempt(student, started, None, false);
        store.record_quiz_attempt(student, finished, None, false);
        store.record_quiz_attempt(student, finished, Some(3.0), true);

        let set = collect(
            &store,
            &[student],
            &[started, finished, untouched],
            &[],
            AttemptFilter::Any,
        )
        .await
        .expect("collect");

        assert_eq!(set.status(student, AssessmentKind::Quiz, started), AttemptStatus::InProgress);
        assert_eq!(set.status(student, AssessmentKind::Quiz, finished), AttemptStatus::Completed);
        assert_eq!(set.status(student, AssessmentKind::Quiz, untouched), AttemptStatus::NotStarted);
        assert_eq!(
            set.status(student, AssessmentKind::Evaluation, finished),
            AttemptStatus::NotStarted
        );
    }

    #[tokio::test]
    async fn no_students_means_no_store_calls() {
        let store = InMemoryStore::default();
        store.fail_all_reads();

        let set = collect(&store, &[], &[Uuid::new_v4()], &[], AttemptFilter::Any)
            .await
            .expect("collect");
        assert_eq!(set.all().count(), 0);
    }
}
