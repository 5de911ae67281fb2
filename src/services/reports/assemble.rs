//! Shapes analysed courses into report payloads. Pure; no I/O.

use uuid::Uuid;

use crate::db::types::IdentityId;
use crate::schemas::report::{
    AlertsReport, CourseRef, CourseReport, CourseSummary, LowPerformerEntry, OverallStats,
    ParticipationReport, PeriodRef, PeriodSection, StudentRef, StudentResult, StudentTrackingReport,
    SubjectAverageEntry, SubjectParticipation, SubjectPeriodResult, SubjectRef, SubjectSection,
    SubjectStats,
};
use crate::services::alerts;
use crate::services::grading::{cohort_average, BucketKey, GradeBreakdown};
use crate::services::identity::RosterEntry;
use crate::services::participation::{participation, progress, Progress};

use super::analysis::{CourseAnalysis, SubjectAnalysis};

fn grade_of(
    subject: &SubjectAnalysis,
    identity: Option<IdentityId>,
    period_id: Uuid,
) -> GradeBreakdown {
    let bucket = BucketKey { subject_id: subject.subject.id, period_id };
    identity
        .map(|identity| subject.grade_book.final_grade(identity, bucket))
        .unwrap_or(GradeBreakdown::EMPTY)
}

/// Cohort average of the roster's per-subject averages.
fn subject_average(subject: &SubjectAnalysis, roster: &[RosterEntry]) -> f64 {
    cohort_average(roster.iter().filter_map(|entry| {
        let identity = entry.identity?;
        subject.grade_book.subject_average(identity, subject.subject.id).map(|avg| avg.average)
    }))
}

fn subject_progress(subject: &SubjectAnalysis, enrolled: &[Option<IdentityId>]) -> Progress {
    progress(enrolled, &subject.assessments, &subject.attempts)
}

fn course_average(analysis: &CourseAnalysis) -> f64 {
    cohort_average(
        analysis.subjects.iter().map(|subject| subject_average(subject, &analysis.roster)),
    )
}

pub(crate) fn course_report(analysis: &CourseAnalysis) -> CourseReport {
    let enrolled = analysis.enrolled();
    let subjects = analysis
        .subjects
        .iter()
        .map(|subject| SubjectSection {
            subject: SubjectRef::from_db(&subject.subject),
            periods: subject
                .periods
                .iter()
                .map(|period| PeriodSection {
                    period: PeriodRef::from_db(period),
                    student_results: analysis
                        .roster
                        .iter()
                        .map(|entry| {
                            StudentResult::new(entry, grade_of(subject, entry.identity, period.id))
                        })
                        .collect(),
                })
                .collect(),
            stats: SubjectStats::new(
                subject_progress(subject, &enrolled),
                subject_average(subject, &analysis.roster),
            ),
        })
        .collect();

    CourseReport {
        course: CourseRef::from_db(&analysis.course),
        subjects,
        average: course_average(analysis),
        complete: analysis.complete,
    }
}

fn low_performer_entries(analysis: &CourseAnalysis) -> Vec<LowPerformerEntry> {
    analysis
        .subjects
        .iter()
        .flat_map(|subject| {
            alerts::low_performers(&analysis.roster, subject.subject.id, &subject.grade_book)
                .into_iter()
                .map(|alert| LowPerformerEntry {
                    student: StudentRef::from_roster(&alert.student),
                    subject: SubjectRef::from_db(&subject.subject),
                    average: alert.average,
                    sample_size: alert.sample_size,
                })
        })
        .collect()
}

pub(crate) fn alerts_report(analysis: &CourseAnalysis) -> AlertsReport {
    let never_attempted = alerts::never_attempted(&analysis.roster, &analysis.attempts());
    AlertsReport {
        course: CourseRef::from_db(&analysis.course),
        low_performers: low_performer_entries(analysis),
        never_attempted: never_attempted.iter().map(StudentRef::from_roster).collect(),
        complete: analysis.complete,
    }
}

pub(crate) fn participation_report(analysis: &CourseAnalysis) -> ParticipationReport {
    let enrolled = analysis.enrolled();
    let subjects = analysis
        .subjects
        .iter()
        .map(|subject| {
            let progress = subject_progress(subject, &enrolled);
            SubjectParticipation {
                subject: SubjectRef::from_db(&subject.subject),
                participation: participation(&enrolled, &subject.attempts).into(),
                completed: progress.completed,
                in_progress: progress.in_progress,
                pending: progress.pending,
            }
        })
        .collect();

    ParticipationReport {
        course: CourseRef::from_db(&analysis.course),
        participation: participation(&enrolled, &analysis.attempts()).into(),
        subjects,
        complete: analysis.complete,
    }
}

pub(crate) fn course_summary(analysis: &CourseAnalysis) -> CourseSummary {
    let enrolled = analysis.enrolled();
    let mut pending = Progress::default();
    for subject in &analysis.subjects {
        pending.add(subject_progress(subject, &enrolled));
    }

    CourseSummary {
        course: CourseRef::from_db(&analysis.course),
        participation: participation(&enrolled, &analysis.attempts()).into(),
        average: course_average(analysis),
        subject_averages: analysis
            .subjects
            .iter()
            .map(|subject| SubjectAverageEntry {
                subject: SubjectRef::from_db(&subject.subject),
                average: subject_average(subject, &analysis.roster),
            })
            .collect(),
        low_performer_count: low_performer_entries(analysis).len(),
        never_attempted_count: alerts::never_attempted(&analysis.roster, &analysis.attempts())
            .len(),
        pending_assessments: pending.pending,
        complete: analysis.complete,
    }
}

/// One student's rows across `courses`, which were analysed with a roster of
/// just that student.
pub(crate) fn student_tracking(
    student: &RosterEntry,
    courses: &[CourseAnalysis],
    complete: bool,
) -> StudentTrackingReport {
    let enrolled = [student.identity];
    let mut rows = Vec::new();
    let mut stats = OverallStats::default();
    let mut totals = Progress::default();

    for course in courses {
        for subject in &course.subjects {
            totals.add(subject_progress(subject, &enrolled));
            for period in &subject.periods {
                let graded = student.identity.is_some_and(|identity| {
                    subject.grade_book.has_grades(
                        identity,
                        BucketKey { subject_id: subject.subject.id, period_id: period.id },
                    )
                });
                let grade = grade_of(subject, student.identity, period.id);
                match (graded, grade.pass) {
                    (false, _) => stats.ungraded += 1,
                    (true, true) => stats.passed += 1,
                    (true, false) => stats.failed += 1,
                }
                rows.push(SubjectPeriodResult::new(&subject.subject, period, grade));
            }
        }
    }

    stats.average = cohort_average(rows.iter().map(|row| row.final_grade));
    stats.total_assessments = totals.total;
    stats.completed_assessments = totals.completed;
    stats.in_progress_assessments = totals.in_progress;
    stats.pending_assessments = totals.pending;

    StudentTrackingReport {
        student: StudentRef::from_roster(student),
        courses: courses.iter().map(|course| CourseRef::from_db(&course.course)).collect(),
        per_subject_period: rows,
        overall_stats: stats,
        complete: complete && courses.iter().all(|course| course.complete),
    }
}
