//! Embedded to-one relations as they come back from the nested-fetch queries.
//!
//! Depending on the join path a to-one embed arrives as an object, as a
//! one-element array, or as `null`. Everything past this module sees
//! `Option<T>` only.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{Course, Period, Subject};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum Related<T> {
    One(T),
    Many(Vec<T>),
    Missing,
}

impl<T> Default for Related<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<T> Related<T> {
    pub(crate) fn into_first(self) -> Option<T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.into_iter().next(),
            Self::Missing => None,
        }
    }

    pub(crate) fn first(&self) -> Option<&T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.first(),
            Self::Missing => None,
        }
    }
}

impl<T> From<Option<T>> for Related<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Self::One).unwrap_or(Self::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SubjectNode {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) course_id: Option<Uuid>,
    #[serde(default)]
    pub(crate) course: Related<Course>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PeriodNode {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) number: i32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub(crate) starts_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub(crate) ends_at: Option<OffsetDateTime>,
    pub(crate) subject_id: Option<Uuid>,
    #[serde(default)]
    pub(crate) subject: Related<SubjectNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TopicNode {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) period_id: Option<Uuid>,
    #[serde(default)]
    pub(crate) period: Related<PeriodNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SubtopicNode {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) topic_id: Option<Uuid>,
    #[serde(default)]
    pub(crate) topic: Related<TopicNode>,
}

/// A quiz with its ancestors embedded, as returned by the nested fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuizChain {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) subtopic_id: Option<Uuid>,
    #[serde(default)]
    pub(crate) subtopic: Related<SubtopicNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct EvaluationChain {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) period_id: Option<Uuid>,
    pub(crate) subject_id: Option<Uuid>,
    #[serde(default)]
    pub(crate) period: Related<PeriodNode>,
    #[serde(default)]
    pub(crate) subject: Related<SubjectNode>,
}

impl SubjectNode {
    /// Flattens the node; `None` when the course link is unknown.
    pub(crate) fn to_subject(&self) -> Option<Subject> {
        let course_id = self.course_id.or_else(|| self.course.first().map(|course| course.id))?;
        Some(Subject { id: self.id, name: self.name.clone(), course_id })
    }
}

impl PeriodNode {
    pub(crate) fn to_period(&self) -> Option<Period> {
        let subject_id =
            self.subject_id.or_else(|| self.subject.first().map(|subject| subject.id))?;
        Some(Period {
            id: self.id,
            name: self.name.clone(),
            number: self.number,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            subject_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn course_json(name: &str) -> serde_json::Value {
        json!({"id": Uuid::nil(), "name": name, "level": null})
    }

    #[test]
    fn object_array_and_null_embeds_normalize_the_same_way() {
        let as_object: Related<Course> = serde_json::from_value(course_json("Math")).unwrap();
        let as_array: Related<Course> =
            serde_json::from_value(json!([course_json("Math")])).unwrap();
        let as_null: Related<Course> = serde_json::from_value(json!(null)).unwrap();
        let as_empty: Related<Course> = serde_json::from_value(json!([])).unwrap();

        assert_eq!(as_object.into_first().map(|c| c.name), Some("Math".to_string()));
        assert_eq!(as_array.into_first().map(|c| c.name), Some("Math".to_string()));
        assert!(as_null.into_first().is_none());
        assert!(as_empty.into_first().is_none());
    }

    #[test]
    fn absent_embed_field_defaults_to_missing() {
        let subject: SubjectNode = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "name": "Physics",
            "course_id": null
        }))
        .unwrap();

        assert_eq!(subject.course, Related::Missing);
        assert!(subject.to_subject().is_none());
    }

    #[test]
    fn period_node_takes_subject_from_embed_when_column_missing() {
        let subject_id = Uuid::new_v4();
        let period: PeriodNode = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "name": "Periodo 1",
            "number": 1,
            "starts_at": "2025-02-01T00:00:00Z",
            "subject_id": null,
            "subject": [{"id": subject_id, "name": "Biology", "course_id": Uuid::nil()}]
        }))
        .unwrap();

        let flat = period.to_period().expect("period");
        assert_eq!(flat.subject_id, subject_id);
        assert!(flat.starts_at.is_some());
        assert!(flat.ends_at.is_none());
    }
}
