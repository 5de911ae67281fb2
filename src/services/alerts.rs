//! Students who need attention.

use uuid::Uuid;

use crate::services::attempts::AttemptSet;
use crate::services::grading::GradeBook;
use crate::services::identity::RosterEntry;

/// Subject averages strictly below this raise a low-performance alert.
/// Distinct from the pass mark: 3.0..3.7 fails without alerting.
pub(crate) const LOW_PERFORMANCE_THRESHOLD: f64 = 3.0;

pub(crate) fn is_low_performance(average: f64) -> bool {
    average < LOW_PERFORMANCE_THRESHOLD
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LowPerformer {
    pub(crate) student: RosterEntry,
    pub(crate) subject_id: Uuid,
    pub(crate) average: f64,
    pub(crate) sample_size: usize,
}

/// One entry per (student, subject) whose average is below the threshold.
/// Students with no graded work in the subject have no average and are left
/// to [`never_attempted`].
pub(crate) fn low_performers(
    roster: &[RosterEntry],
    subject_id: Uuid,
    grade_book: &GradeBook,
) -> Vec<LowPerformer> {
    roster
        .iter()
        .filter_map(|entry| {
            let average = grade_book.subject_average(entry.identity?, subject_id)?;
            is_low_performance(average.average).then(|| LowPerformer {
                student: entry.clone(),
                subject_id,
                average: average.average,
                sample_size: average.sample_size,
            })
        })
        .collect()
}

/// Students with no attempt of any kind, completed or not, in `attempts`.
/// `attempts` must be the unfiltered set for the whole course.
pub(crate) fn never_attempted(roster: &[RosterEntry], attempts: &AttemptSet) -> Vec<RosterEntry> {
    let attempted = attempts.students();
    roster
        .iter()
        .filter(|entry| entry.identity.map_or(true, |identity| !attempted.contains(&identity)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use time::macros::datetime;

    use super::*;
    use crate::db::models::Attempt;
    use crate::db::types::{AssessmentKind, IdentityId, ProfileId};
    use crate::services::grading::BucketKey;

    fn entry(name: &str, identity: Option<IdentityId>) -> RosterEntry {
        RosterEntry { profile: ProfileId(Uuid::new_v4()), name: name.to_string(), identity }
    }

    fn attempt(student: IdentityId, evaluation: Uuid, grade: f64, completed: bool) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            kind: AssessmentKind::Evaluation,
            assessment_id: evaluation,
            student_id: student,
            grade: Some(grade),
            completed,
            started_at: Some(datetime!(2025-06-02 11:00 UTC)),
            finished_at: completed.then_some(datetime!(2025-06-02 11:45 UTC)),
        }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!is_low_performance(3.0));
        assert!(is_low_performance(2.99));
    }

    #[test]
    fn only_averages_below_three_alert() {
        let subject_id = Uuid::new_v4();
        let bucket = BucketKey { subject_id, period_id: Uuid::new_v4() };
        let (quiz_low, quiz_edge) = (Uuid::new_v4(), Uuid::new_v4());
        let low = entry("Bruno", Some(IdentityId(Uuid::new_v4())));
        let edge = entry("Carla", Some(IdentityId(Uuid::new_v4())));
        let quiz = |student: IdentityId, quiz: Uuid, grade: f64| Attempt {
            kind: AssessmentKind::Quiz,
            ..attempt(student, quiz, grade, true)
        };
        let attempts = AttemptSet::new(
            vec![
                // 4.27 * 0.7 = 2.989 → 2.99
                quiz(low.identity.expect("id"), quiz_low, 4.27),
                // quiz average rounds to 4.29; 4.29 * 0.7 = 3.003 → 3.00
                quiz(edge.identity.expect("id"), quiz_edge, 4.2857),
            ],
            Vec::new(),
        );
        let book = GradeBook::build(
            &attempts,
            &HashMap::from([(quiz_low, bucket), (quiz_edge, bucket)]),
            &HashMap::new(),
        );

        let alerts = low_performers(&[low.clone(), edge], subject_id, &book);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].student, low);
        assert_eq!(alerts[0].average, 2.99);
        assert_eq!(alerts[0].sample_size, 1);
    }

    #[test]
    fn open_attempts_still_count_as_attempted() {
        let evaluation = Uuid::new_v4();
        let tried = entry("Diego", Some(IdentityId(Uuid::new_v4())));
        let idle = entry("Elena", Some(IdentityId(Uuid::new_v4())));
        let unlinked = entry("Fabián", None);
        let attempts = AttemptSet::new(
            Vec::new(),
            vec![attempt(tried.identity.expect("id"), evaluation, 0.0, false)],
        );

        let flagged = never_attempted(&[tried, idle.clone(), unlinked.clone()], &attempts);

        assert_eq!(flagged, vec![idle, unlinked]);
    }
}
