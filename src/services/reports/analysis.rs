//! Loads and grades one subject, or a whole course one subject at a time.

use std::collections::HashMap;

use uuid::Uuid;

use crate::db::models::{Course, Period, Subject};
use crate::db::types::{AssessmentKind, IdentityId};
use crate::repositories::{AcademicStore, StoreResult};
use crate::services::attempts::{self, AttemptFilter, AttemptSet};
use crate::services::catalog::{self, AssessmentRef};
use crate::services::grading::{sort_periods, sort_subjects, GradeBook};
use crate::services::hierarchy::HierarchyResolver;
use crate::services::identity::{self, RosterEntry};
use crate::services::EngineError;

#[derive(Debug, Clone)]
pub(crate) struct SubjectAnalysis {
    pub(crate) subject: Subject,
    /// The subject's periods plus any period an evaluation of this subject
    /// hangs off; sorted.
    pub(crate) periods: Vec<Period>,
    pub(crate) grade_book: GradeBook,
    /// Unfiltered attempts by the roster on every quiz under the subject,
    /// resolved or not, and on the evaluations graded here.
    pub(crate) attempts: AttemptSet,
    /// Assessments whose hierarchy resolved into this subject.
    pub(crate) assessments: Vec<AssessmentRef>,
    pub(crate) subtopic_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub(crate) struct CourseAnalysis {
    pub(crate) course: Course,
    pub(crate) roster: Vec<RosterEntry>,
    /// Subject-name order; subjects that failed to load are absent.
    pub(crate) subjects: Vec<SubjectAnalysis>,
    pub(crate) complete: bool,
}

impl CourseAnalysis {
    pub(crate) fn enrolled(&self) -> Vec<Option<IdentityId>> {
        self.roster.iter().map(|entry| entry.identity).collect()
    }

    /// Unfiltered attempts across every analysed subject.
    pub(crate) fn attempts(&self) -> AttemptSet {
        let mut all = AttemptSet::default();
        for subject in &self.subjects {
            all.merge(subject.attempts.clone());
        }
        all
    }
}

pub(crate) async fn course_roster(
    store: &dyn AcademicStore,
    course_id: Uuid,
) -> StoreResult<Vec<RosterEntry>> {
    let enrollments = store.get_enrollments(&[course_id]).await?;
    let profile_ids: Vec<_> = enrollments.iter().map(|enrollment| enrollment.student_id).collect();
    identity::roster(store, &profile_ids).await
}

/// The course's subjects in name order, optionally narrowed to one.
pub(crate) async fn course_subjects(
    store: &dyn AcademicStore,
    course_id: Uuid,
    only: Option<Uuid>,
) -> Result<Vec<Subject>, EngineError> {
    let mut subjects = store.get_subjects(&[course_id]).await?;
    if let Some(subject_id) = only {
        subjects.retain(|subject| subject.id == subject_id);
        if subjects.is_empty() {
            return Err(EngineError::NotFound("Subject not found in course".to_string()));
        }
    }
    sort_subjects(&mut subjects);
    Ok(subjects)
}

pub(crate) async fn analyze_subject(
    store: &dyn AcademicStore,
    course: &Course,
    subject: Subject,
    roster: &[RosterEntry],
) -> Result<SubjectAnalysis, EngineError> {
    let catalog = catalog::load_subject(store, subject).await?;
    let subject_id = catalog.subject.id;

    let mut resolver = HierarchyResolver::new(store);
    resolver.prime(
        &catalog.periods,
        std::slice::from_ref(&catalog.subject),
        std::slice::from_ref(course),
    );
    let catalog_quiz_ids = catalog.quiz_ids();
    let quiz_ancestry = resolver.ancestors_of_quizzes(&catalog_quiz_ids).await?;
    let evaluation_ancestry = resolver.ancestors_of_evaluations(&catalog.evaluation_ids()).await?;

    let mut assessments = Vec::new();
    let mut quiz_buckets = HashMap::new();
    for quiz in &catalog.quizzes {
        if let Some(Ok(ancestors)) = quiz_ancestry.get(&quiz.id) {
            if ancestors.subject.id == subject_id {
                quiz_buckets.insert(quiz.id, ancestors.bucket());
                assessments.push((AssessmentKind::Quiz, quiz.id));
            }
        }
    }

    let mut periods = catalog.periods.clone();
    let mut evaluation_buckets = HashMap::new();
    for evaluation in &catalog.evaluations {
        // An evaluation fetched through one of our periods can still name
        // another subject; it is graded there, not here.
        if let Some(Ok(ancestors)) = evaluation_ancestry.get(&evaluation.id) {
            if ancestors.subject.id == subject_id {
                evaluation_buckets.insert(evaluation.id, ancestors.bucket());
                assessments.push((AssessmentKind::Evaluation, evaluation.id));
                if !periods.iter().any(|period| period.id == ancestors.period.id) {
                    periods.push(ancestors.period.clone());
                }
            }
        }
    }
    sort_periods(&mut periods);

    let mut students: Vec<IdentityId> = roster.iter().filter_map(|entry| entry.identity).collect();
    students.sort();
    students.dedup();
    // Grades only come from assessments that resolved into this subject; any
    // attempt on a quiz found under it still counts as activity.
    let graded_quiz_ids: Vec<Uuid> = quiz_buckets.keys().copied().collect();
    let evaluation_ids: Vec<Uuid> = evaluation_buckets.keys().copied().collect();
    let (graded, attempts) = tokio::try_join!(
        attempts::collect(
            store,
            &students,
            &graded_quiz_ids,
            &evaluation_ids,
            AttemptFilter::Completed,
        ),
        attempts::collect(store, &students, &catalog_quiz_ids, &evaluation_ids, AttemptFilter::Any),
    )?;
    let grade_book = GradeBook::build(&graded, &quiz_buckets, &evaluation_buckets);

    tracing::debug!(
        course_id = %course.id,
        %subject_id,
        periods = periods.len(),
        assessments = assessments.len(),
        students = students.len(),
        "Subject analysed"
    );

    Ok(SubjectAnalysis {
        subtopic_ids: catalog.subtopic_ids(),
        subject: catalog.subject,
        periods,
        grade_book,
        attempts,
        assessments,
    })
}

/// Whole course, subjects one after another. Used inside a fan-out branch,
/// where nesting another fan-out is not allowed. A failing subject is logged
/// and left out.
pub(crate) async fn analyze_course_inline(
    store: &dyn AcademicStore,
    course: Course,
    roster: Option<Vec<RosterEntry>>,
) -> Result<CourseAnalysis, EngineError> {
    let roster = match roster {
        Some(roster) => roster,
        None => course_roster(store, course.id).await?,
    };
    let subjects = course_subjects(store, course.id, None).await?;

    let mut analysed = Vec::with_capacity(subjects.len());
    let mut complete = true;
    for subject in subjects {
        let subject_id = subject.id;
        match analyze_subject(store, &course, subject, &roster).await {
            Ok(analysis) => analysed.push(analysis),
            Err(err) => {
                tracing::warn!(
                    course_id = %course.id,
                    %subject_id,
                    error = %err,
                    "Subject left out of course analysis"
                );
                complete = false;
            }
        }
    }

    Ok(CourseAnalysis { course, roster, subjects: analysed, complete })
}
