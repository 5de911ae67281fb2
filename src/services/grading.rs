//! Final grades per (student, subject, period) and the averages built on them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{Attempt, Period, Subject};
use crate::db::types::IdentityId;
use crate::services::attempts::AttemptSet;

pub(crate) const QUIZ_WEIGHT: f64 = 0.70;
pub(crate) const EVALUATION_WEIGHT: f64 = 0.30;
/// A final grade at or above this passes.
pub(crate) const PASS_THRESHOLD: f64 = 3.7;
pub(crate) const MIN_GRADE: f64 = 0.0;
pub(crate) const MAX_GRADE: f64 = 5.0;

/// Rounds half away from zero after stripping binary noise below 1e-6 of
/// the last kept place, so `4.175000000000001` and `4.174999999999999`
/// both become `4.18`.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let scaled = ((value * factor) * 1e6).round() / 1e6;
    scaled.round() / factor
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean over strictly positive values, two decimals. A zero is "no grade",
/// not a failing grade, and never drags the average down.
pub(crate) fn cohort_average(values: impl IntoIterator<Item = f64>) -> f64 {
    let graded: Vec<f64> = values.into_iter().filter(|value| *value > 0.0).collect();
    mean(&graded).map(|avg| round_to(avg, 2)).unwrap_or(0.0)
}

pub(crate) fn is_passing(final_grade: f64) -> bool {
    final_grade >= PASS_THRESHOLD
}

fn clamp_grade(grade: f64) -> f64 {
    grade.clamp(MIN_GRADE, MAX_GRADE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BucketKey {
    pub(crate) subject_id: Uuid,
    pub(crate) period_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GradeBreakdown {
    pub(crate) quiz_avg: f64,
    pub(crate) eval_grade: f64,
    pub(crate) final_grade: f64,
    pub(crate) pass: bool,
}

impl GradeBreakdown {
    pub(crate) const EMPTY: Self =
        Self { quiz_avg: 0.0, eval_grade: 0.0, final_grade: 0.0, pass: false };
}

/// Missing components count as zero.
pub(crate) fn final_grade(quiz_grades: &[f64], eval_grade: Option<f64>) -> GradeBreakdown {
    let quiz_avg = mean(quiz_grades).map(|avg| round_to(clamp_grade(avg), 2)).unwrap_or(0.0);
    let eval_grade = eval_grade.map(|grade| round_to(clamp_grade(grade), 2)).unwrap_or(0.0);
    let final_grade = round_to(quiz_avg * QUIZ_WEIGHT + eval_grade * EVALUATION_WEIGHT, 2);
    GradeBreakdown { quiz_avg, eval_grade, final_grade, pass: is_passing(final_grade) }
}

/// Orders finished evaluation attempts: later `finished_at` wins, then later
/// `started_at`, then the larger id, so the choice never depends on row order.
fn evaluation_rank(a: &Attempt, b: &Attempt) -> Ordering {
    fn stamp(value: Option<OffsetDateTime>) -> i128 {
        value.map(|at| at.unix_timestamp_nanos()).unwrap_or(i128::MIN)
    }
    stamp(a.finished_at)
        .cmp(&stamp(b.finished_at))
        .then_with(|| stamp(a.started_at).cmp(&stamp(b.started_at)))
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Clone, Default)]
struct BucketGrades<'a> {
    quiz_grades: Vec<f64>,
    evaluation: Option<&'a Attempt>,
}

impl BucketGrades<'_> {
    fn graded_attempts(&self) -> usize {
        self.quiz_grades.len() + usize::from(self.evaluation.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SubjectAverage {
    pub(crate) average: f64,
    /// Completed graded attempts behind the average.
    pub(crate) sample_size: usize,
}

/// Completed, graded attempts grouped by student and (subject, period).
#[derive(Debug, Clone, Default)]
pub(crate) struct GradeBook {
    entries: BTreeMap<(IdentityId, BucketKey), (GradeBreakdown, usize)>,
}

impl GradeBook {
    /// Attempts whose assessment has no bucket (unresolved hierarchy) are
    /// skipped.
    pub(crate) fn build(
        attempts: &AttemptSet,
        quiz_buckets: &HashMap<Uuid, BucketKey>,
        evaluation_buckets: &HashMap<Uuid, BucketKey>,
    ) -> Self {
        let mut grouped: BTreeMap<(IdentityId, BucketKey), BucketGrades<'_>> = BTreeMap::new();

        for attempt in attempts.quiz() {
            let (Some(grade), Some(bucket)) =
                (attempt.usable_grade(), quiz_buckets.get(&attempt.assessment_id))
            else {
                continue;
            };
            grouped.entry((attempt.student_id, *bucket)).or_default().quiz_grades.push(grade);
        }

        for attempt in attempts.evaluation() {
            let (Some(_), Some(bucket)) =
                (attempt.usable_grade(), evaluation_buckets.get(&attempt.assessment_id))
            else {
                continue;
            };
            let slot = &mut grouped.entry((attempt.student_id, *bucket)).or_default().evaluation;
            let newer =
                slot.map_or(true, |current| evaluation_rank(current, attempt) == Ordering::Less);
            if newer {
                *slot = Some(attempt);
            }
        }

        let entries = grouped
            .into_iter()
            .map(|(key, grades)| {
                let breakdown = final_grade(
                    &grades.quiz_grades,
                    grades.evaluation.and_then(Attempt::usable_grade),
                );
                (key, (breakdown, grades.graded_attempts()))
            })
            .collect();

        Self { entries }
    }

    /// Zeros when the student has no completed graded attempt in the bucket.
    pub(crate) fn final_grade(&self, student: IdentityId, bucket: BucketKey) -> GradeBreakdown {
        self.entries
            .get(&(student, bucket))
            .map(|(breakdown, _)| *breakdown)
            .unwrap_or(GradeBreakdown::EMPTY)
    }

    pub(crate) fn has_grades(&self, student: IdentityId, bucket: BucketKey) -> bool {
        self.entries.contains_key(&(student, bucket))
    }

    /// Mean of the student's final grades over the subject's periods that
    /// have at least one completed graded attempt.
    pub(crate) fn subject_average(
        &self,
        student: IdentityId,
        subject_id: Uuid,
    ) -> Option<SubjectAverage> {
        let mut finals = Vec::new();
        let mut sample_size = 0;
        for ((owner, bucket), (breakdown, count)) in &self.entries {
            if *owner == student && bucket.subject_id == subject_id {
                finals.push(breakdown.final_grade);
                sample_size += count;
            }
        }
        mean(&finals).map(|avg| SubjectAverage { average: round_to(avg, 2), sample_size })
    }
}

pub(crate) fn sort_periods(periods: &mut [Period]) {
    periods.sort_by(|a, b| {
        a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name)).then_with(|| a.id.cmp(&b.id))
    });
}

pub(crate) fn sort_subjects(subjects: &mut [Subject]) {
    subjects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}
