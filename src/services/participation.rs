use uuid::Uuid;

use crate::db::types::{AssessmentKind, IdentityId};
use crate::services::attempts::{AttemptSet, AttemptStatus};
use crate::services::grading::round_to;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Participation {
    pub(crate) total_enrolled: usize,
    pub(crate) active_count: usize,
    pub(crate) percentage: f64,
}

/// `active / total * 100`, one decimal; zero for an empty cohort.
pub(crate) fn percentage(active: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let active = active.min(total);
    round_to(active as f64 / total as f64 * 100.0, 1)
}

/// A student is active with at least one completed attempt in `attempts`.
/// Enrolled students without an identity are counted but never active.
pub(crate) fn participation(
    enrolled: &[Option<IdentityId>],
    attempts: &AttemptSet,
) -> Participation {
    let finished = attempts.completed().students();
    let active_count = enrolled
        .iter()
        .filter(|identity| identity.is_some_and(|identity| finished.contains(&identity)))
        .count();
    Participation {
        total_enrolled: enrolled.len(),
        active_count,
        percentage: percentage(active_count, enrolled.len()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Progress {
    /// Student × assessment pairs.
    pub(crate) total: usize,
    pub(crate) completed: usize,
    pub(crate) in_progress: usize,
    pub(crate) pending: usize,
}

impl Progress {
    pub(crate) fn add(&mut self, other: Progress) {
        self.total += other.total;
        self.completed += other.completed;
        self.in_progress += other.in_progress;
        self.pending += other.pending;
    }
}

pub(crate) fn progress(
    enrolled: &[Option<IdentityId>],
    assessments: &[(AssessmentKind, Uuid)],
    attempts: &AttemptSet,
) -> Progress {
    let mut progress =
        Progress { total: enrolled.len() * assessments.len(), ..Progress::default() };
    for identity in enrolled {
        for &(kind, assessment_id) in assessments {
            let status = identity
                .map(|identity| attempts.status(identity, kind, assessment_id))
                .unwrap_or(AttemptStatus::NotStarted);
            match status {
                AttemptStatus::Completed => progress.completed += 1,
                AttemptStatus::InProgress => progress.in_progress += 1,
                AttemptStatus::NotStarted => {}
            }
        }
    }
    progress.pending = progress.total - progress.completed;
    progress
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::db::models::Attempt;

    fn quiz_attempt(student: IdentityId, quiz: Uuid, completed: bool) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            kind: AssessmentKind::Quiz,
            assessment_id: quiz,
            student_id: student,
            grade: completed.then_some(4.0),
            completed,
            started_at: Some(datetime!(2025-05-05 09:00 UTC)),
            finished_at: None,
        }
    }

    #[test]
    fn two_of_five_active_is_forty_percent() {
        let quiz = Uuid::new_v4();
        let students: Vec<Option<IdentityId>> =
            (0..5).map(|_| Some(IdentityId(Uuid::new_v4()))).collect();
        let attempts = AttemptSet::new(
            vec![
                quiz_attempt(students[0].expect("id"), quiz, true),
                quiz_attempt(students[1].expect("id"), quiz, true),
                quiz_attempt(students[2].expect("id"), quiz, false),
            ],
            Vec::new(),
        );

        let result = participation(&students, &attempts);

        assert_eq!(result.total_enrolled, 5);
        assert_eq!(result.active_count, 2);
        assert_eq!(result.percentage, 40.0);
    }

    #[test]
    fn empty_cohort_is_zero_not_nan() {
        let result = participation(&[], &AttemptSet::default());

        assert_eq!(result.total_enrolled, 0);
        assert_eq!(result.percentage, 0.0);
    }

    #[test]
    fn unmapped_students_count_but_never_participate() {
        let identity = IdentityId(Uuid::new_v4());
        let attempts =
            AttemptSet::new(vec![quiz_attempt(identity, Uuid::new_v4(), true)], Vec::new());

        let result = participation(&[Some(identity), None, None], &attempts);

        assert_eq!(result.active_count, 1);
        assert_eq!(result.percentage, 33.3);
    }

    #[test]
    fn progress_counts_student_assessment_pairs() {
        let (quiz_a, quiz_b) = (Uuid::new_v4(), Uuid::new_v4());
        let done = IdentityId(Uuid::new_v4());
        let started = IdentityId(Uuid::new_v4());
        let attempts = AttemptSet::new(
            vec![quiz_attempt(done, quiz_a, true), quiz_attempt(started, quiz_a, false)],
            Vec::new(),
        );
        let assessments = [(AssessmentKind::Quiz, quiz_a), (AssessmentKind::Quiz, quiz_b)];

        let result = progress(&[Some(done), Some(started), None], &assessments, &attempts);

        assert_eq!(
            result,
            Progress { total: 6, completed: 1, in_progress: 1, pending: 5 }
        );
    }
}
