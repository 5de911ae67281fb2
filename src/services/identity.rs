//! The only place a student profile id turns into an authentication identity.

use std::collections::{BTreeMap, HashMap};

use crate::db::models::StudentProfile;
use crate::db::types::{IdentityId, ProfileId};
use crate::repositories::{AcademicStore, StoreResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct IdentityMap {
    by_profile: BTreeMap<ProfileId, IdentityId>,
}

impl IdentityMap {
    pub(crate) fn get(&self, profile: ProfileId) -> Option<IdentityId> {
        self.by_profile.get(&profile).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_profile.len()
    }
}

impl From<HashMap<ProfileId, IdentityId>> for IdentityMap {
    fn from(value: HashMap<ProfileId, IdentityId>) -> Self {
        Self { by_profile: value.into_iter().collect() }
    }
}

/// Profiles without a mapping are dropped, not reported as errors; callers
/// treat them as students with zero attempts.
pub(crate) async fn resolve(
    store: &dyn AcademicStore,
    profile_ids: &[ProfileId],
) -> StoreResult<IdentityMap> {
    let mut requested = profile_ids.to_vec();
    requested.sort();
    requested.dedup();

    if requested.is_empty() {
        return Ok(IdentityMap::default());
    }

    let mut map = IdentityMap::from(store.get_profile_identity_map(&requested).await?);
    map.by_profile.retain(|profile, _| requested.binary_search(profile).is_ok());

    let unmapped = requested.len() - map.len();
    if unmapped > 0 {
        tracing::debug!(
            requested = requested.len(),
            unmapped,
            "Some student profiles have no identity mapping"
        );
    }

    Ok(map)
}

/// An enrolled student as the reports see them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RosterEntry {
    pub(crate) profile: ProfileId,
    pub(crate) name: String,
    pub(crate) identity: Option<IdentityId>,
}

/// Roster for `profile_ids`, sorted by name then id. A profile id with no
/// profile row still gets an entry, named after its id.
pub(crate) async fn roster(
    store: &dyn AcademicStore,
    profile_ids: &[ProfileId],
) -> StoreResult<Vec<RosterEntry>> {
    let mut requested = profile_ids.to_vec();
    requested.sort();
    requested.dedup();
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    let (profiles, identities) =
        tokio::try_join!(store.get_students(&requested), resolve(store, &requested))?;
    let names: HashMap<ProfileId, String> = profiles
        .into_iter()
        .map(|StudentProfile { id, full_name, .. }| (id, full_name))
        .collect();

    let mut entries: Vec<RosterEntry> = requested
        .into_iter()
        .map(|profile| RosterEntry {
            profile,
            name: names.get(&profile).cloned().unwrap_or_else(|| profile.to_string()),
            identity: identities.get(profile),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.profile.cmp(&b.profile)));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;

    #[tokio::test]
    async fn unmapped_profiles_are_dropped() {
        let store = InMemoryStore::default();
        let linked = store.add_student("Ana Torres", true);
        let unlinked = store.add_student("Luis Paz", false);

        let map = resolve(&store, &[linked.id, unlinked.id, linked.id]).await.expect("resolve");

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(linked.id), linked.identity_id);
        assert_eq!(map.get(unlinked.id), None);
    }

    #[tokio::test]
    async fn roster_is_sorted_and_keeps_unlinked_students() {
        let store = InMemoryStore::default();
        let zoe = store.add_student("Zoe Muñoz", true);
        let ana = store.add_student("Ana Díaz", false);

        let entries = roster(&store, &[zoe.id, ana.id]).await.expect("roster");

        let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["Ana Díaz", "Zoe Muñoz"]);
        assert_eq!(entries[0].identity, None);
        assert_eq!(entries[1].identity, zoe.identity_id);
    }

    #[tokio::test]
    async fn empty_request_skips_the_store() {
        let store = InMemoryStore::default();
        store.fail_all_reads();

        let map = resolve(&store, &[]).await.expect("resolve");
        assert_eq!(map, IdentityMap::default());
    }
}
