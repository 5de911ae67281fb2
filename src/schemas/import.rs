use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::types::ContentKind;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ContentImportRequest {
    #[validate(length(min = 1, max = 500, message = "rows must hold 1..500 entries"), nested)]
    pub(crate) rows: Vec<ContentImportRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct ContentImportRow {
    #[validate(length(min = 1, max = 200, message = "topic must not be empty"))]
    pub(crate) topic: String,
    #[validate(length(min = 1, max = 200, message = "subtopic must not be empty"))]
    pub(crate) subtopic: String,
    #[validate(length(min = 1, max = 300, message = "title must not be empty"))]
    pub(crate) title: String,
    pub(crate) kind: ContentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum UnresolvedReason {
    TopicNotFound,
    TopicAmbiguous,
    SubtopicNotFound,
    SubtopicAmbiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResolvedContentRow {
    pub(crate) row: usize,
    pub(crate) topic_id: Uuid,
    pub(crate) subtopic_id: Uuid,
    pub(crate) title: String,
    pub(crate) kind: ContentKind,
    /// Same normalized title already exists under the subtopic, or appears
    /// earlier in the batch.
    pub(crate) duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnresolvedContentRow {
    pub(crate) row: usize,
    pub(crate) topic: String,
    pub(crate) subtopic: String,
    pub(crate) title: String,
    pub(crate) reason: UnresolvedReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContentImportPreview {
    pub(crate) period_id: Uuid,
    pub(crate) resolved: Vec<ResolvedContentRow>,
    pub(crate) unresolved: Vec<UnresolvedContentRow>,
}
