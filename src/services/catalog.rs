//! Top-down loading of everything under one subject.

use uuid::Uuid;

use crate::db::models::{Content, Evaluation, Period, Quiz, Subject, Subtopic};
use crate::db::types::{AssessmentKind, ContentKind};
use crate::repositories::{AcademicStore, StoreResult};
use crate::services::grading::sort_periods;

#[derive(Debug, Clone)]
pub(crate) struct SubjectCatalog {
    pub(crate) subject: Subject,
    /// Sorted by number, then name.
    pub(crate) periods: Vec<Period>,
    pub(crate) subtopics: Vec<Subtopic>,
    pub(crate) quizzes: Vec<Quiz>,
    /// Evaluations on any of the subject's periods or naming the subject
    /// directly; the two can disagree, so some may belong elsewhere.
    pub(crate) evaluations: Vec<Evaluation>,
}

impl SubjectCatalog {
    pub(crate) fn quiz_ids(&self) -> Vec<Uuid> {
        self.quizzes.iter().map(|quiz| quiz.id).collect()
    }

    pub(crate) fn evaluation_ids(&self) -> Vec<Uuid> {
        self.evaluations.iter().map(|evaluation| evaluation.id).collect()
    }

    pub(crate) fn subtopic_ids(&self) -> Vec<Uuid> {
        self.subtopics.iter().map(|subtopic| subtopic.id).collect()
    }
}

pub(crate) async fn load_subject(
    store: &dyn AcademicStore,
    subject: Subject,
) -> StoreResult<SubjectCatalog> {
    let mut periods = store.get_periods(&[subject.id]).await?;
    sort_periods(&mut periods);
    let period_ids: Vec<Uuid> = periods.iter().map(|period| period.id).collect();

    let topics = store.get_topics(&period_ids).await?;
    let topic_ids: Vec<Uuid> = topics.iter().map(|topic| topic.id).collect();
    let subtopics = store.get_subtopics(&topic_ids).await?;
    let subtopic_ids: Vec<Uuid> = subtopics.iter().map(|subtopic| subtopic.id).collect();

    let subject_ids = [subject.id];
    let (quizzes, evaluations) = tokio::try_join!(
        store.get_quizzes(&subtopic_ids),
        store.get_evaluations(&period_ids, &subject_ids),
    )?;

    Ok(SubjectCatalog { subject, periods, subtopics, quizzes, evaluations })
}

/// An assessment as progress counting sees it.
pub(crate) type AssessmentRef = (AssessmentKind, Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ContentCounts {
    pub(crate) video: usize,
    pub(crate) file: usize,
    pub(crate) forum: usize,
}

impl ContentCounts {
    pub(crate) fn tally(contents: &[Content]) -> Self {
        let mut counts = Self::default();
        for content in contents {
            match content.kind {
                ContentKind::Video => counts.video += 1,
                ContentKind::File => counts.file += 1,
                ContentKind::Forum => counts.forum += 1,
            }
        }
        counts
    }
}

pub(crate) async fn count_contents(
    store: &dyn AcademicStore,
    subtopic_ids: &[Uuid],
) -> StoreResult<ContentCounts> {
    if subtopic_ids.is_empty() {
        return Ok(ContentCounts::default());
    }
    Ok(ContentCounts::tally(&store.get_contents(subtopic_ids).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;

    #[tokio::test]
    async fn loads_the_subject_tree_in_period_order() {
        let store = InMemoryStore::default();
        let course = store.add_course("5° Básico");
        let subject = store.add_subject(course.id, "Ciencias Naturales");
        let second = store.add_period(subject.id, "Periodo 2", 2);
        let first = store.add_period(subject.id, "Periodo 1", 1);
        let topic = store.add_topic(second.id, "Ecosistemas");
        let subtopic = store.add_subtopic(topic.id, "Cadenas tróficas");
        let quiz = store.add_quiz(subtopic.id, "Quiz cadenas");
        let evaluation = store.add_evaluation(first.id, subject.id, "Prueba 1");
        let other = store.add_subject(course.id, "Arte");
        store.add_evaluation(store.add_period(other.id, "P1", 1).id, other.id, "Ajena");

        let catalog = load_subject(&store, subject).await.expect("catalog");

        let period_ids: Vec<Uuid> = catalog.periods.iter().map(|period| period.id).collect();
        assert_eq!(period_ids, vec![first.id, second.id]);
        assert_eq!(catalog.quiz_ids(), vec![quiz.id]);
        assert_eq!(catalog.evaluation_ids(), vec![evaluation.id]);
        assert_eq!(catalog.subtopic_ids(), vec![subtopic.id]);
    }

    #[tokio::test]
    async fn counts_contents_by_kind() {
        let store = InMemoryStore::default();
        let course = store.add_course("6° Básico");
        let path = store.add_subject_path(course.id, "Música");
        store.add_content(path.subtopic.id, "Ritmo", ContentKind::Video);
        store.add_content(path.subtopic.id, "Partitura", ContentKind::File);
        store.add_content(path.subtopic.id, "Apuntes", ContentKind::File);

        let counts = count_contents(&store, &[path.subtopic.id]).await.expect("counts");

        assert_eq!(counts, ContentCounts { video: 1, file: 2, forum: 0 });
    }
}
