//! Report payloads. Field names are camelCase on the wire.

use serde::Serialize;
use uuid::Uuid;

use crate::core::time::format_optional;
use crate::db::models::{Course, Period, Subject};
use crate::db::types::ProfileId;
use crate::services::catalog::ContentCounts;
use crate::services::grading::GradeBreakdown;
use crate::services::identity::RosterEntry;
use crate::services::participation::{Participation, Progress};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseRef {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) level: Option<String>,
}

impl CourseRef {
    pub(crate) fn from_db(course: &Course) -> Self {
        Self { id: course.id, name: course.name.clone(), level: course.level.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubjectRef {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) course_id: Uuid,
}

impl SubjectRef {
    pub(crate) fn from_db(subject: &Subject) -> Self {
        Self { id: subject.id, name: subject.name.clone(), course_id: subject.course_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PeriodRef {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) number: i32,
    pub(crate) starts_at: Option<String>,
    pub(crate) ends_at: Option<String>,
}

impl PeriodRef {
    pub(crate) fn from_db(period: &Period) -> Self {
        Self {
            id: period.id,
            name: period.name.clone(),
            number: period.number,
            starts_at: format_optional(period.starts_at),
            ends_at: format_optional(period.ends_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentRef {
    pub(crate) id: ProfileId,
    pub(crate) name: String,
}

impl StudentRef {
    pub(crate) fn from_roster(entry: &RosterEntry) -> Self {
        Self { id: entry.profile, name: entry.name.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentResult {
    pub(crate) student: StudentRef,
    pub(crate) quiz_avg: f64,
    pub(crate) eval_grade: f64,
    pub(crate) final_grade: f64,
    pub(crate) pass: bool,
}

impl StudentResult {
    pub(crate) fn new(entry: &RosterEntry, grade: GradeBreakdown) -> Self {
        Self {
            student: StudentRef::from_roster(entry),
            quiz_avg: grade.quiz_avg,
            eval_grade: grade.eval_grade,
            final_grade: grade.final_grade,
            pass: grade.pass,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PeriodSection {
    pub(crate) period: PeriodRef,
    pub(crate) student_results: Vec<StudentResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubjectStats {
    pub(crate) total: usize,
    pub(crate) completed: usize,
    pub(crate) pending: usize,
    pub(crate) average: f64,
}

impl SubjectStats {
    pub(crate) fn new(progress: Progress, average: f64) -> Self {
        Self {
            total: progress.total,
            completed: progress.completed,
            pending: progress.pending,
            average,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubjectSection {
    pub(crate) subject: SubjectRef,
    pub(crate) periods: Vec<PeriodSection>,
    pub(crate) stats: SubjectStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseReport {
    pub(crate) course: CourseRef,
    pub(crate) subjects: Vec<SubjectSection>,
    pub(crate) average: f64,
    /// `false` when some subject could not be built; those are left out.
    pub(crate) complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubjectPeriodResult {
    pub(crate) subject: SubjectRef,
    pub(crate) period: PeriodRef,
    pub(crate) quiz_avg: f64,
    pub(crate) eval_grade: f64,
    pub(crate) final_grade: f64,
    pub(crate) pass: bool,
}

impl SubjectPeriodResult {
    pub(crate) fn new(subject: &Subject, period: &Period, grade: GradeBreakdown) -> Self {
        Self {
            subject: SubjectRef::from_db(subject),
            period: PeriodRef::from_db(period),
            quiz_avg: grade.quiz_avg,
            eval_grade: grade.eval_grade,
            final_grade: grade.final_grade,
            pass: grade.pass,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OverallStats {
    /// Mean of non-zero final grades.
    pub(crate) average: f64,
    pub(crate) passed: usize,
    pub(crate) failed: usize,
    /// Subject-period rows with no completed graded attempt.
    pub(crate) ungraded: usize,
    pub(crate) total_assessments: usize,
    pub(crate) completed_assessments: usize,
    pub(crate) in_progress_assessments: usize,
    pub(crate) pending_assessments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentTrackingReport {
    pub(crate) student: StudentRef,
    pub(crate) courses: Vec<CourseRef>,
    pub(crate) per_subject_period: Vec<SubjectPeriodResult>,
    pub(crate) overall_stats: OverallStats,
    pub(crate) complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LowPerformerEntry {
    pub(crate) student: StudentRef,
    pub(crate) subject: SubjectRef,
    pub(crate) average: f64,
    pub(crate) sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlertsReport {
    pub(crate) course: CourseRef,
    pub(crate) low_performers: Vec<LowPerformerEntry>,
    pub(crate) never_attempted: Vec<StudentRef>,
    pub(crate) complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParticipationStats {
    pub(crate) total_enrolled: usize,
    pub(crate) active_count: usize,
    pub(crate) percentage: f64,
}

impl From<Participation> for ParticipationStats {
    fn from(value: Participation) -> Self {
        Self {
            total_enrolled: value.total_enrolled,
            active_count: value.active_count,
            percentage: value.percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubjectParticipation {
    pub(crate) subject: SubjectRef,
    pub(crate) participation: ParticipationStats,
    pub(crate) completed: usize,
    pub(crate) in_progress: usize,
    pub(crate) pending: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParticipationReport {
    pub(crate) course: CourseRef,
    pub(crate) participation: ParticipationStats,
    pub(crate) subjects: Vec<SubjectParticipation>,
    pub(crate) complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubjectAverageEntry {
    pub(crate) subject: SubjectRef,
    pub(crate) average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseSummary {
    pub(crate) course: CourseRef,
    pub(crate) participation: ParticipationStats,
    pub(crate) average: f64,
    pub(crate) subject_averages: Vec<SubjectAverageEntry>,
    pub(crate) low_performer_count: usize,
    pub(crate) never_attempted_count: usize,
    pub(crate) pending_assessments: usize,
    pub(crate) complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeacherDashboard {
    pub(crate) courses: Vec<CourseSummary>,
    pub(crate) complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContentCountsView {
    pub(crate) video: usize,
    pub(crate) file: usize,
    pub(crate) forum: usize,
}

impl From<ContentCounts> for ContentCountsView {
    fn from(value: ContentCounts) -> Self {
        Self { video: value.video, file: value.file, forum: value.forum }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminCourseSummary {
    #[serde(flatten)]
    pub(crate) summary: CourseSummary,
    pub(crate) quiz_count: usize,
    pub(crate) evaluation_count: usize,
    pub(crate) contents: ContentCountsView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminDashboard {
    pub(crate) courses: Vec<AdminCourseSummary>,
    /// Mean of the non-zero course averages.
    pub(crate) global_average: f64,
    pub(crate) total_enrolled: usize,
    pub(crate) complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GuardianPortal {
    pub(crate) students: Vec<StudentTrackingReport>,
    pub(crate) complete: bool,
}
