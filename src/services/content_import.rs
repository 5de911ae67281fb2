//! Resolves spreadsheet-style content rows against a period's topic tree.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::db::models::{Subtopic, Topic};
use crate::repositories::AcademicStore;
use crate::schemas::import::{
    ContentImportPreview, ContentImportRow, ResolvedContentRow, UnresolvedContentRow,
    UnresolvedReason,
};
use crate::services::EngineError;

/// Case-insensitive, whitespace-collapsed form used for every name match.
pub(crate) fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn index_by_name<'a, T>(
    items: &'a [T],
    name: impl Fn(&T) -> &str,
) -> HashMap<String, Vec<&'a T>> {
    let mut index: HashMap<String, Vec<&T>> = HashMap::new();
    for item in items {
        index.entry(normalize_name(name(item))).or_default().push(item);
    }
    index
}

fn unique<'a, T>(
    index: &HashMap<String, Vec<&'a T>>,
    raw: &str,
    missing: UnresolvedReason,
    ambiguous: UnresolvedReason,
) -> Result<&'a T, UnresolvedReason> {
    match index.get(&normalize_name(raw)).map(Vec::as_slice) {
        Some([only]) => Ok(*only),
        Some([]) | None => Err(missing),
        Some(_) => Err(ambiguous),
    }
}

/// Read-only: nothing is written, callers get the resolution plan back.
pub(crate) async fn preview(
    store: &dyn AcademicStore,
    period_id: Uuid,
    rows: &[ContentImportRow],
) -> Result<ContentImportPreview, EngineError> {
    store
        .find_period(period_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Period not found".to_string()))?;

    let topics = store.get_topics(&[period_id]).await?;
    let topic_ids: Vec<Uuid> = topics.iter().map(|topic| topic.id).collect();
    let subtopics = store.get_subtopics(&topic_ids).await?;
    let subtopic_ids: Vec<Uuid> = subtopics.iter().map(|subtopic| subtopic.id).collect();
    let contents = store.get_contents(&subtopic_ids).await?;

    let topic_index = index_by_name(&topics, |topic: &Topic| topic.name.as_str());
    let mut subtopics_by_topic: HashMap<Uuid, Vec<Subtopic>> = HashMap::new();
    for subtopic in subtopics {
        subtopics_by_topic.entry(subtopic.topic_id).or_default().push(subtopic);
    }
    let mut seen: HashSet<(Uuid, String)> = contents
        .iter()
        .map(|content| (content.subtopic_id, normalize_name(&content.title)))
        .collect();

    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for (row_number, row) in rows.iter().enumerate() {
        let outcome = unique(
            &topic_index,
            &row.topic,
            UnresolvedReason::TopicNotFound,
            UnresolvedReason::TopicAmbiguous,
        )
        .and_then(|topic| {
            let siblings = subtopics_by_topic.get(&topic.id).map(Vec::as_slice).unwrap_or(&[]);
            let subtopic_index =
                index_by_name(siblings, |subtopic: &Subtopic| subtopic.name.as_str());
            unique(
                &subtopic_index,
                &row.subtopic,
                UnresolvedReason::SubtopicNotFound,
                UnresolvedReason::SubtopicAmbiguous,
            )
            .map(|subtopic| (topic.id, subtopic.id))
        });

        match outcome {
            Ok((topic_id, subtopic_id)) => {
                let duplicate = !seen.insert((subtopic_id, normalize_name(&row.title)));
                resolved.push(ResolvedContentRow {
                    row: row_number,
                    topic_id,
                    subtopic_id,
                    title: row.title.trim().to_string(),
                    kind: row.kind,
                    duplicate,
                });
            }
            Err(reason) => unresolved.push(UnresolvedContentRow {
                row: row_number,
                topic: row.topic.clone(),
                subtopic: row.subtopic.clone(),
                title: row.title.clone(),
                reason,
            }),
        }
    }

    tracing::info!(
        %period_id,
        rows = rows.len(),
        resolved = resolved.len(),
        unresolved = unresolved.len(),
        "Content import preview built"
    );

    Ok(ContentImportPreview { period_id, resolved, unresolved })
}
