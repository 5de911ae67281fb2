//! Walks assessments up to their course.
//!
//! Every lookup first trusts the nested fetch. When an embedded link is
//! missing or disagrees with the child's own foreign key, the resolver drops
//! to direct by-id lookups one level at a time. Direct lookups are cached for
//! the lifetime of the resolver, which is one report branch.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::core::metrics;
use crate::db::models::{Course, Evaluation, Period, Quiz, Subject, Subtopic, Topic};
use crate::db::relation::{
    EvaluationChain, PeriodNode, QuizChain, Related, SubjectNode, SubtopicNode, TopicNode,
};
use crate::repositories::{AcademicStore, StoreResult};
use crate::services::grading::BucketKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum HierarchyLevel {
    Assessment,
    Subtopic,
    Topic,
    Period,
    Subject,
    Course,
}

impl HierarchyLevel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Assessment => "assessment",
            Self::Subtopic => "subtopic",
            Self::Topic => "topic",
            Self::Period => "period",
            Self::Subject => "subject",
            Self::Course => "course",
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuizAncestors {
    pub(crate) quiz_id: Uuid,
    pub(crate) subtopic: Subtopic,
    pub(crate) topic: Topic,
    pub(crate) period: Period,
    pub(crate) subject: Subject,
    pub(crate) course: Course,
}

impl QuizAncestors {
    pub(crate) fn bucket(&self) -> BucketKey {
        BucketKey { subject_id: self.subject.id, period_id: self.period.id }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EvaluationAncestors {
    pub(crate) evaluation_id: Uuid,
    pub(crate) period: Period,
    /// The evaluation's own subject, which may differ from `period.subject_id`.
    pub(crate) subject: Subject,
    pub(crate) course: Course,
}

impl EvaluationAncestors {
    pub(crate) fn bucket(&self) -> BucketKey {
        BucketKey { subject_id: self.subject.id, period_id: self.period.id }
    }

    pub(crate) fn period_subject_mismatch(&self) -> bool {
        self.period.subject_id != self.subject.id
    }
}

/// Whatever was resolved before the walk stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PartialAncestors {
    pub(crate) subtopic: Option<Subtopic>,
    pub(crate) topic: Option<Topic>,
    pub(crate) period: Option<Period>,
    pub(crate) subject: Option<Subject>,
}

impl PartialAncestors {
    /// The resolved ancestor closest to the course.
    pub(crate) fn deepest(&self) -> Option<HierarchyLevel> {
        if self.subject.is_some() {
            Some(HierarchyLevel::Subject)
        } else if self.period.is_some() {
            Some(HierarchyLevel::Period)
        } else if self.topic.is_some() {
            Some(HierarchyLevel::Topic)
        } else if self.subtopic.is_some() {
            Some(HierarchyLevel::Subtopic)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("hierarchy gap at {missing} level")]
pub(crate) struct ResolutionGap {
    pub(crate) missing: HierarchyLevel,
    pub(crate) partial: PartialAncestors,
}

pub(crate) type Resolution<T> = Result<T, ResolutionGap>;

/// Outcome of checking one embedded link against the child's foreign key.
enum Step<N, E> {
    Embedded(E, N),
    Lookup(Uuid),
    Unresolved,
}

fn step<N, E>(
    embedded: Option<N>,
    expected: Option<Uuid>,
    id_of: impl Fn(&N) -> Uuid,
    flatten: impl Fn(&N) -> Option<E>,
) -> Step<N, E> {
    match (embedded, expected) {
        (Some(node), expected) if expected.map_or(true, |id| id == id_of(&node)) => {
            match flatten(&node) {
                Some(entity) => Step::Embedded(entity, node),
                None => Step::Lookup(id_of(&node)),
            }
        }
        (_, Some(id)) => Step::Lookup(id),
        (_, None) => Step::Unresolved,
    }
}

#[derive(Default)]
struct Cache {
    subtopics: HashMap<Uuid, Option<Subtopic>>,
    topics: HashMap<Uuid, Option<Topic>>,
    periods: HashMap<Uuid, Option<Period>>,
    subjects: HashMap<Uuid, Option<Subject>>,
    courses: HashMap<Uuid, Option<Course>>,
}

pub(crate) struct HierarchyResolver<'a> {
    store: &'a dyn AcademicStore,
    cache: Cache,
}

impl<'a> HierarchyResolver<'a> {
    pub(crate) fn new(store: &'a dyn AcademicStore) -> Self {
        Self { store, cache: Cache::default() }
    }

    /// Seeds the by-id caches with rows the caller already loaded.
    pub(crate) fn prime(&mut self, periods: &[Period], subjects: &[Subject], courses: &[Course]) {
        for period in periods {
            self.cache.periods.insert(period.id, Some(period.clone()));
        }
        for subject in subjects {
            self.cache.subjects.insert(subject.id, Some(subject.clone()));
        }
        for course in courses {
            self.cache.courses.insert(course.id, Some(course.clone()));
        }
    }

    /// One entry per requested id; ids the store does not know at all come
    /// back as a gap at the assessment level.
    pub(crate) async fn ancestors_of_quizzes(
        &mut self,
        quiz_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Resolution<QuizAncestors>>> {
        let mut chains: HashMap<Uuid, QuizChain> = self
            .store
            .quiz_chains(quiz_ids)
            .await?
            .into_iter()
            .map(|chain| (chain.id, chain))
            .collect();

        let absent: Vec<Uuid> =
            quiz_ids.iter().copied().filter(|id| !chains.contains_key(id)).collect();
        if !absent.is_empty() {
            metrics::record_hierarchy_fallback(HierarchyLevel::Assessment.as_str());
            for quiz in self.store.get_quizzes_by_ids(&absent).await? {
                chains.insert(quiz.id, bare_quiz_chain(quiz));
            }
        }

        let mut resolved = HashMap::with_capacity(quiz_ids.len());
        for &quiz_id in quiz_ids {
            let resolution = match chains.remove(&quiz_id) {
                Some(chain) => self.walk_quiz(chain).await?,
                None => Err(ResolutionGap {
                    missing: HierarchyLevel::Assessment,
                    partial: PartialAncestors::default(),
                }),
            };
            if let Err(gap) = &resolution {
                tracing::warn!(
                    %quiz_id,
                    missing = %gap.missing,
                    resolved_to = ?gap.partial.deepest(),
                    "Quiz hierarchy is incomplete"
                );
            }
            resolved.insert(quiz_id, resolution);
        }
        Ok(resolved)
    }

    pub(crate) async fn ancestors_of_evaluations(
        &mut self,
        evaluation_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Resolution<EvaluationAncestors>>> {
        let mut chains: HashMap<Uuid, EvaluationChain> = self
            .store
            .evaluation_chains(evaluation_ids)
            .await?
            .into_iter()
            .map(|chain| (chain.id, chain))
            .collect();

        let absent: Vec<Uuid> =
            evaluation_ids.iter().copied().filter(|id| !chains.contains_key(id)).collect();
        if !absent.is_empty() {
            metrics::record_hierarchy_fallback(HierarchyLevel::Assessment.as_str());
            for evaluation in self.store.get_evaluations_by_ids(&absent).await? {
                chains.insert(evaluation.id, bare_evaluation_chain(evaluation));
            }
        }

        let mut resolved = HashMap::with_capacity(evaluation_ids.len());
        for &evaluation_id in evaluation_ids {
            let resolution = match chains.remove(&evaluation_id) {
                Some(chain) => self.walk_evaluation(chain).await?,
                None => Err(ResolutionGap {
                    missing: HierarchyLevel::Assessment,
                    partial: PartialAncestors::default(),
                }),
            };
            match &resolution {
                Ok(ancestors) if ancestors.period_subject_mismatch() => {
                    tracing::warn!(
                        %evaluation_id,
                        period_id = %ancestors.period.id,
                        period_subject_id = %ancestors.period.subject_id,
                        subject_id = %ancestors.subject.id,
                        "Evaluation subject differs from its period's subject"
                    );
                }
                Err(gap) => {
                    tracing::warn!(
                        %evaluation_id,
                        missing = %gap.missing,
                        resolved_to = ?gap.partial.deepest(),
                        "Evaluation hierarchy is incomplete"
                    );
                }
                Ok(_) => {}
            }
            resolved.insert(evaluation_id, resolution);
        }
        Ok(resolved)
    }

    async fn walk_quiz(&mut self, chain: QuizChain) -> StoreResult<Resolution<QuizAncestors>> {
        let mut partial = PartialAncestors::default();

        let (subtopic, topic_node) = match step(
            chain.subtopic.into_first(),
            chain.subtopic_id,
            |node: &SubtopicNode| node.id,
            subtopic_from_node,
        ) {
            Step::Embedded(subtopic, node) => (Some(subtopic), node.topic.into_first()),
            Step::Lookup(id) => (self.subtopic(id).await?, None),
            Step::Unresolved => (None, None),
        };
        let Some(subtopic) = subtopic else {
            return Ok(Err(ResolutionGap { missing: HierarchyLevel::Subtopic, partial }));
        };
        partial.subtopic = Some(subtopic.clone());

        let (topic, period_node) = match step(
            topic_node,
            Some(subtopic.topic_id),
            |node: &TopicNode| node.id,
            topic_from_node,
        ) {
            Step::Embedded(topic, node) => (Some(topic), node.period.into_first()),
            Step::Lookup(id) => (self.topic(id).await?, None),
            Step::Unresolved => (None, None),
        };
        let Some(topic) = topic else {
            return Ok(Err(ResolutionGap { missing: HierarchyLevel::Topic, partial }));
        };
        partial.topic = Some(topic.clone());

        let (period, subject_node) = match step(
            period_node,
            Some(topic.period_id),
            |node: &PeriodNode| node.id,
            PeriodNode::to_period,
        ) {
            Step::Embedded(period, node) => (Some(period), node.subject.into_first()),
            Step::Lookup(id) => (self.period(id).await?, None),
            Step::Unresolved => (None, None),
        };
        let Some(period) = period else {
            return Ok(Err(ResolutionGap { missing: HierarchyLevel::Period, partial }));
        };
        partial.period = Some(period.clone());

        let (subject, course) =
            self.subject_and_course(subject_node, Some(period.subject_id)).await?;
        let Some(subject) = subject else {
            return Ok(Err(ResolutionGap { missing: HierarchyLevel::Subject, partial }));
        };
        partial.subject = Some(subject.clone());
        let Some(course) = course else {
            return Ok(Err(ResolutionGap { missing: HierarchyLevel::Course, partial }));
        };

        Ok(Ok(QuizAncestors { quiz_id: chain.id, subtopic, topic, period, subject, course }))
    }

    async fn walk_evaluation(
        &mut self,
        chain: EvaluationChain,
    ) -> StoreResult<Resolution<EvaluationAncestors>> {
        let mut partial = PartialAncestors::default();

        let (period, period_subject_node) = match step(
            chain.period.into_first(),
            chain.period_id,
            |node: &PeriodNode| node.id,
            PeriodNode::to_period,
        ) {
            Step::Embedded(period, node) => (Some(period), node.subject.into_first()),
            Step::Lookup(id) => (self.period(id).await?, None),
            Step::Unresolved => (None, None),
        };
        let Some(period) = period else {
            return Ok(Err(ResolutionGap { missing: HierarchyLevel::Period, partial }));
        };
        partial.period = Some(period.clone());

        // The evaluation's own subject wins; the period's subject only fills in
        // when the evaluation carries none.
        let (subject_node, expected_subject) = match chain.subject_id {
            Some(id) => (chain.subject.into_first(), Some(id)),
            None => match chain.subject.into_first() {
                Some(node) => (Some(node), None),
                None => (period_subject_node, Some(period.subject_id)),
            },
        };
        let (subject, course) = self.subject_and_course(subject_node, expected_subject).await?;
        let Some(subject) = subject else {
            return Ok(Err(ResolutionGap { missing: HierarchyLevel::Subject, partial }));
        };
        partial.subject = Some(subject.clone());
        let Some(course) = course else {
            return Ok(Err(ResolutionGap { missing: HierarchyLevel::Course, partial }));
        };

        Ok(Ok(EvaluationAncestors { evaluation_id: chain.id, period, subject, course }))
    }

    async fn subject_and_course(
        &mut self,
        subject_node: Option<SubjectNode>,
        expected: Option<Uuid>,
    ) -> StoreResult<(Option<Subject>, Option<Course>)> {
        let subject_id = |node: &SubjectNode| node.id;
        let (subject, course_node) =
            match step(subject_node, expected, subject_id, SubjectNode::to_subject) {
                Step::Embedded(subject, node) => (Some(subject), node.course.into_first()),
                Step::Lookup(id) => (self.subject(id).await?, None),
                Step::Unresolved => (None, None),
            };
        let Some(subject) = subject else {
            return Ok((None, None));
        };

        let course = match step(
            course_node,
            Some(subject.course_id),
            |course: &Course| course.id,
            |course: &Course| Some(course.clone()),
        ) {
            Step::Embedded(course, _) => Some(course),
            Step::Lookup(id) => self.course(id).await?,
            Step::Unresolved => None,
        };
        Ok((Some(subject), course))
    }

    async fn subtopic(&mut self, id: Uuid) -> StoreResult<Option<Subtopic>> {
        if let Some(hit) = self.cache.subtopics.get(&id) {
            return Ok(hit.clone());
        }
        metrics::record_hierarchy_fallback(HierarchyLevel::Subtopic.as_str());
        let row = self.store.find_subtopic(id).await?;
        self.cache.subtopics.insert(id, row.clone());
        Ok(row)
    }

    async fn topic(&mut self, id: Uuid) -> StoreResult<Option<Topic>> {
        if let Some(hit) = self.cache.topics.get(&id) {
            return Ok(hit.clone());
        }
        metrics::record_hierarchy_fallback(HierarchyLevel::Topic.as_str());
        let row = self.store.find_topic(id).await?;
        self.cache.topics.insert(id, row.clone());
        Ok(row)
    }

    async fn period(&mut self, id: Uuid) -> StoreResult<Option<Period>> {
        if let Some(hit) = self.cache.periods.get(&id) {
            return Ok(hit.clone());
        }
        metrics::record_hierarchy_fallback(HierarchyLevel::Period.as_str());
        let row = self.store.find_period(id).await?;
        self.cache.periods.insert(id, row.clone());
        Ok(row)
    }

    async fn subject(&mut self, id: Uuid) -> StoreResult<Option<Subject>> {
        if let Some(hit) = self.cache.subjects.get(&id) {
            return Ok(hit.clone());
        }
        metrics::record_hierarchy_fallback(HierarchyLevel::Subject.as_str());
        let row = self.store.find_subject(id).await?;
        self.cache.subjects.insert(id, row.clone());
        Ok(row)
    }

    async fn course(&mut self, id: Uuid) -> StoreResult<Option<Course>> {
        if let Some(hit) = self.cache.courses.get(&id) {
            return Ok(hit.clone());
        }
        metrics::record_hierarchy_fallback(HierarchyLevel::Course.as_str());
        let row = self.store.find_course(id).await?;
        self.cache.courses.insert(id, row.clone());
        Ok(row)
    }
}

fn subtopic_from_node(node: &SubtopicNode) -> Option<Subtopic> {
    let topic_id = node.topic_id.or_else(|| node.topic.first().map(|topic| topic.id))?;
    Some(Subtopic { id: node.id, name: node.name.clone(), topic_id })
}

fn topic_from_node(node: &TopicNode) -> Option<Topic> {
    let period_id = node.period_id.or_else(|| node.period.first().map(|period| period.id))?;
    Some(Topic { id: node.id, name: node.name.clone(), period_id })
}

fn bare_quiz_chain(quiz: Quiz) -> QuizChain {
    QuizChain {
        id: quiz.id,
        name: quiz.name,
        subtopic_id: Some(quiz.subtopic_id),
        subtopic: Related::Missing,
    }
}

fn bare_evaluation_chain(evaluation: Evaluation) -> EvaluationChain {
    EvaluationChain {
        id: evaluation.id,
        name: evaluation.name,
        period_id: Some(evaluation.period_id),
        subject_id: Some(evaluation.subject_id),
        period: Related::Missing,
        subject: Related::Missing,
    }
}
