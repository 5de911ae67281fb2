//! Report orchestration. Every public report fans out over exactly one axis
//! (subjects, courses or students) and runs everything below it inline.

mod analysis;
mod assemble;

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::config::ReportSettings;
use crate::core::metrics;
use crate::db::models::Course;
use crate::db::types::{AssessmentKind, IdentityId, ProfileId};
use crate::repositories::AcademicStore;
use crate::schemas::report::{
    AdminCourseSummary, AdminDashboard, AlertsReport, CourseReport, GuardianPortal,
    ParticipationReport, StudentTrackingReport, TeacherDashboard,
};
use crate::services::catalog;
use crate::services::fanout::FanOut;
use crate::services::grading::cohort_average;
use crate::services::identity::{self, RosterEntry};
use crate::services::EngineError;

use analysis::{
    analyze_course_inline, analyze_subject, course_roster, course_subjects, CourseAnalysis,
};

#[derive(Clone)]
pub(crate) struct ReportEngine {
    store: Arc<dyn AcademicStore>,
    fanout: FanOut,
    shutdown: CancellationToken,
}

impl ReportEngine {
    pub(crate) fn new(store: Arc<dyn AcademicStore>, settings: ReportSettings) -> Self {
        let shutdown = CancellationToken::new();
        let fanout =
            FanOut::new(settings.max_concurrency, settings.branch_timeout(), shutdown.clone());
        Self { store, fanout, shutdown }
    }

    /// Cancels every report still being built; they fail with
    /// [`EngineError::Cancelled`].
    pub(crate) fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn load_course(&self, course_id: Uuid) -> Result<Course, EngineError> {
        self.store
            .find_course(course_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Course not found".to_string()))
    }

    /// One course, fanned out per subject.
    pub(crate) async fn analyze_course(
        &self,
        course_id: Uuid,
        only_subject: Option<Uuid>,
    ) -> Result<CourseAnalysis, EngineError> {
        let course = self.load_course(course_id).await?;
        let subjects = course_subjects(self.store.as_ref(), course_id, only_subject).await?;
        let roster = Arc::new(course_roster(self.store.as_ref(), course_id).await?);
        let shared_course = Arc::new(course.clone());

        let fan_in = self
            .fanout
            .run("course_subject", subjects, |subject| {
                let store = self.store.clone();
                let course = shared_course.clone();
                let roster = roster.clone();
                let subject = subject.clone();
                async move { analyze_subject(store.as_ref(), &course, subject, &roster).await }
            })
            .await?;

        let complete = fan_in.is_complete();
        let subjects = fan_in.successes().map(|(_, analysis)| analysis).collect();
        let roster = Arc::try_unwrap(roster).unwrap_or_else(|shared| shared.as_ref().clone());
        Ok(CourseAnalysis { course, roster, subjects, complete })
    }

    pub(crate) async fn course_report(
        &self,
        course_id: Uuid,
        only_subject: Option<Uuid>,
    ) -> Result<CourseReport, EngineError> {
        let started = Instant::now();
        let analysis = self.analyze_course(course_id, only_subject).await?;
        let report = assemble::course_report(&analysis);
        metrics::record_report("course", started.elapsed());
        Ok(report)
    }

    pub(crate) async fn alerts_report(
        &self,
        course_id: Uuid,
    ) -> Result<AlertsReport, EngineError> {
        let started = Instant::now();
        let analysis = self.analyze_course(course_id, None).await?;
        let report = assemble::alerts_report(&analysis);
        metrics::record_report("alerts", started.elapsed());
        Ok(report)
    }

    pub(crate) async fn participation_report(
        &self,
        course_id: Uuid,
    ) -> Result<ParticipationReport, EngineError> {
        let started = Instant::now();
        let analysis = self.analyze_course(course_id, None).await?;
        let report = assemble::participation_report(&analysis);
        metrics::record_report("participation", started.elapsed());
        Ok(report)
    }

    /// Per-student tracking, fanned out per enrolled course. `within` keeps
    /// only those of the student's courses; `None` keeps all of them.
    pub(crate) async fn student_report(
        &self,
        profile_id: ProfileId,
        within: Option<&[Uuid]>,
    ) -> Result<StudentTrackingReport, EngineError> {
        let started = Instant::now();
        let (student, courses) = student_scope(self.store.as_ref(), profile_id, within).await?;
        let shared_student = Arc::new(student.clone());

        let fan_in = self
            .fanout
            .run("student_course", courses, |course| {
                let store = self.store.clone();
                let student = shared_student.clone();
                let course = course.clone();
                async move {
                    let roster = vec![student.as_ref().clone()];
                    analyze_course_inline(store.as_ref(), course, Some(roster)).await
                }
            })
            .await?;

        let complete = fan_in.is_complete();
        let analyses: Vec<CourseAnalysis> =
            fan_in.successes().map(|(_, analysis)| analysis).collect();
        let report = assemble::student_tracking(&student, &analyses, complete);
        metrics::record_report("student", started.elapsed());
        Ok(report)
    }

    pub(crate) async fn teacher_dashboard(
        &self,
        teacher: IdentityId,
    ) -> Result<TeacherDashboard, EngineError> {
        let started = Instant::now();
        let mut course_ids: Vec<Uuid> = self
            .store
            .get_teacher_assignments(teacher)
            .await?
            .into_iter()
            .map(|assignment| assignment.course_id)
            .collect();
        course_ids.sort();
        course_ids.dedup();
        if course_ids.is_empty() {
            return Err(EngineError::MissingScope(
                "Teacher has no course assignments".to_string(),
            ));
        }
        let courses = sorted_courses(self.store.get_courses(Some(&course_ids)).await?);

        let fan_in = self
            .fanout
            .run("teacher_course", courses, |course| {
                let store = self.store.clone();
                let course = course.clone();
                async move { analyze_course_inline(store.as_ref(), course, None).await }
            })
            .await?;

        let complete = fan_in.is_complete();
        let courses =
            fan_in.successes().map(|(_, analysis)| assemble::course_summary(&analysis)).collect();
        metrics::record_report("teacher_dashboard", started.elapsed());
        Ok(TeacherDashboard { courses, complete })
    }

    pub(crate) async fn admin_dashboard(&self) -> Result<AdminDashboard, EngineError> {
        let started = Instant::now();
        let courses = sorted_courses(self.store.get_courses(None).await?);

        let fan_in = self
            .fanout
            .run("admin_course", courses, |course| {
                let store = self.store.clone();
                let course = course.clone();
                async move { admin_course_summary(store.as_ref(), course).await }
            })
            .await?;

        let complete = fan_in.is_complete();
        let courses: Vec<AdminCourseSummary> =
            fan_in.successes().map(|(_, summary)| summary).collect();
        let global_average = cohort_average(courses.iter().map(|course| course.summary.average));
        let total_enrolled =
            courses.iter().map(|course| course.summary.participation.total_enrolled).sum();
        metrics::record_report("admin_dashboard", started.elapsed());
        Ok(AdminDashboard { courses, global_average, total_enrolled, complete })
    }

    /// Tracking for every student linked to the guardian, fanned out per
    /// student.
    pub(crate) async fn guardian_portal(
        &self,
        guardian: IdentityId,
    ) -> Result<GuardianPortal, EngineError> {
        let started = Instant::now();
        let mut students = self.store.get_guardian_students(guardian).await?;
        students.sort();
        students.dedup();
        if students.is_empty() {
            return Err(EngineError::MissingScope(
                "No students are linked to this guardian".to_string(),
            ));
        }

        let fan_in = self
            .fanout
            .run("guardian_student", students, |profile_id| {
                let store = self.store.clone();
                let profile_id = *profile_id;
                async move { track_student_inline(store.as_ref(), profile_id).await }
            })
            .await?;

        let complete = fan_in.is_complete();
        let students = fan_in.successes().map(|(_, report)| report).collect();
        metrics::record_report("guardian_portal", started.elapsed());
        Ok(GuardianPortal { students, complete })
    }
}

fn sorted_courses(mut courses: Vec<Course>) -> Vec<Course> {
    courses.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    courses
}

/// The student's roster entry and enrolled courses, in name order, narrowed
/// to `within` when given.
async fn student_scope(
    store: &dyn AcademicStore,
    profile_id: ProfileId,
    within: Option<&[Uuid]>,
) -> Result<(RosterEntry, Vec<Course>), EngineError> {
    if store.get_students(&[profile_id]).await?.is_empty() {
        return Err(EngineError::NotFound("Student not found".to_string()));
    }
    let student = identity::roster(store, &[profile_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::NotFound("Student not found".to_string()))?;

    let mut course_ids: Vec<Uuid> = store
        .get_enrollments_for_students(&[profile_id])
        .await?
        .into_iter()
        .map(|enrollment| enrollment.course_id)
        .filter(|course_id| within.map_or(true, |allowed| allowed.contains(course_id)))
        .collect();
    course_ids.sort();
    course_ids.dedup();
    let courses = if course_ids.is_empty() {
        Vec::new()
    } else {
        sorted_courses(store.get_courses(Some(&course_ids)).await?)
    };
    Ok((student, courses))
}

async fn track_student_inline(
    store: &dyn AcademicStore,
    profile_id: ProfileId,
) -> Result<StudentTrackingReport, EngineError> {
    let (student, courses) = student_scope(store, profile_id, None).await?;
    let mut analyses = Vec::with_capacity(courses.len());
    let mut complete = true;
    for course in courses {
        let course_id = course.id;
        match analyze_course_inline(store, course, Some(vec![student.clone()])).await {
            Ok(analysis) => analyses.push(analysis),
            Err(err) => {
                tracing::warn!(
                    student_id = %student.profile,
                    %course_id,
                    error = %err,
                    "Course left out of student tracking"
                );
                complete = false;
            }
        }
    }
    Ok(assemble::student_tracking(&student, &analyses, complete))
}

async fn admin_course_summary(
    store: &dyn AcademicStore,
    course: Course,
) -> Result<AdminCourseSummary, EngineError> {
    let analysis = analyze_course_inline(store, course, None).await?;
    let subtopic_ids: Vec<Uuid> =
        analysis.subjects.iter().flat_map(|subject| subject.subtopic_ids.iter().copied()).collect();
    let contents = catalog::count_contents(store, &subtopic_ids).await?;
    let count = |kind: AssessmentKind| {
        analysis
            .subjects
            .iter()
            .flat_map(|subject| subject.assessments.iter())
            .filter(|(assessment_kind, _)| *assessment_kind == kind)
            .count()
    };

    Ok(AdminCourseSummary {
        summary: assemble::course_summary(&analysis),
        quiz_count: count(AssessmentKind::Quiz),
        evaluation_count: count(AssessmentKind::Evaluation),
        contents: contents.into(),
    })
}
