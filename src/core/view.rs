//! Collections, varieties and views.
//!
//! A view fixes an ordered membership and a threshold over one collection.
//! Once any of its groups is tabulated both are locked: an attempted change is
//! reverted in memory and reported as a validation error.

use crate::core::alignment::all_hold;
use crate::core::types::*;
use crate::error::{CorrResult, ValidationError};
use crate::store::{Store, Tracked};
use std::collections::HashSet;
use tracing::{debug, info};

/// `ceil(threshold% * members / 100)`.
pub fn threshold_value(threshold_percent: u32, member_count: usize) -> usize {
    (threshold_percent as usize * member_count).div_ceil(100)
}

pub fn passes_threshold(citation_count: usize, threshold_value: usize) -> bool {
    citation_count >= threshold_value
}

impl View {
    pub fn threshold_value(&self) -> usize {
        threshold_value(self.threshold, self.members.len())
    }
}

pub fn create_collection<S: Store>(store: &mut S, name: &str) -> CorrResult<WordCollection> {
    let mut collection = WordCollection {
        name: name.to_string(),
        ..Default::default()
    };
    store.save(&mut collection)?;
    Ok(collection)
}

/// Adds a variety after checking that its name, short name and abbreviation
/// are all unused in the collection.
pub fn add_variety<S: Store>(
    store: &mut S,
    collection_id: EntityId,
    name: &str,
    short_name: &str,
    abbreviation: &str,
) -> CorrResult<Variety> {
    store.load::<WordCollection>(collection_id)?;
    let mut variety = Variety {
        collection_id,
        name: name.to_string(),
        short_name: short_name.to_string(),
        abbreviation: abbreviation.to_string(),
        ..Default::default()
    };
    validate_variety(store, &variety)?;
    store.save(&mut variety)?;
    Ok(variety)
}

pub fn validate_variety<S: Store>(store: &S, variety: &Variety) -> CorrResult<()> {
    let others: Vec<Variety> = store.list_related(Relation::Collection, variety.collection_id)?;
    for other in others.iter().filter(|o| o.id != variety.id) {
        let clash = if other.name == variety.name {
            Some(("name", &variety.name))
        } else if !variety.short_name.is_empty() && other.short_name == variety.short_name {
            Some(("short name", &variety.short_name))
        } else if !variety.abbreviation.is_empty() && other.abbreviation == variety.abbreviation {
            Some(("abbreviation", &variety.abbreviation))
        } else {
            None
        };
        if let Some((field, value)) = clash {
            return Err(ValidationError::DuplicateVariety {
                field,
                value: value.clone(),
            }
            .into());
        }
    }
    Ok(())
}

pub fn add_entry<S: Store>(store: &mut S, collection_id: EntityId, number: u32, gloss: &str) -> CorrResult<Entry> {
    store.load::<WordCollection>(collection_id)?;
    let mut entry = Entry {
        collection_id,
        number,
        gloss: gloss.to_string(),
        ..Default::default()
    };
    store.save(&mut entry)?;
    Ok(entry)
}

fn validate_view<S: Store>(store: &S, view: &View) -> CorrResult<()> {
    if view.threshold > 100 {
        return Err(ValidationError::ThresholdOutOfRange(view.threshold).into());
    }
    let siblings: Vec<View> = store.list_related(Relation::Collection, view.collection_id)?;
    if siblings.iter().any(|v| v.id != view.id && v.name == view.name) {
        return Err(ValidationError::DuplicateViewName(view.name.clone()).into());
    }
    let varieties: HashSet<EntityId> = store
        .list_related::<Variety>(Relation::Collection, view.collection_id)?
        .into_iter()
        .filter_map(|v| v.id)
        .collect();
    if let Some(&stray) = view.members.iter().find(|m| !varieties.contains(m)) {
        return Err(ValidationError::NotAViewMember {
            variety: stray,
            view: view.id.unwrap_or_default(),
        }
        .into());
    }
    Ok(())
}

pub fn tabulated_group_count<S: Store>(store: &S, view_id: EntityId) -> CorrResult<usize> {
    Ok(store
        .list_related::<Group>(Relation::View, view_id)?
        .iter()
        .filter(|g| g.done)
        .count())
}

/// Creates a view and one alignment per datum of its members.
pub fn create_view<S: Store>(
    store: &mut S,
    collection_id: EntityId,
    name: &str,
    members: Vec<EntityId>,
    threshold: u32,
) -> CorrResult<View> {
    store.load::<WordCollection>(collection_id)?;
    let mut view = View {
        collection_id,
        name: name.to_string(),
        members,
        threshold,
        ..Default::default()
    };
    validate_view(store, &view)?;
    store.with_transaction(|s| {
        let view_id = s.save(&mut view)?;
        let members = view.members.clone();
        for variety in members {
            align_member(s, view_id, variety)?;
        }
        info!(view_id, name = %view.name, "created view");
        Ok(view)
    })
}

/// Saves pending changes to a view.
///
/// Membership or threshold changes on a view with tabulated groups are
/// reverted and reported as [`ValidationError::TabulationLocked`].
pub fn update_view<S: Store>(store: &mut S, view: &Tracked<View>) -> CorrResult<()> {
    let current = view.get();
    let Some(view_id) = current.id else {
        validate_view(store, &current)?;
        view.save(store)?;
        return Ok(());
    };
    let stored: View = store.load(view_id)?;
    let changed = stored.members != current.members || stored.threshold != current.threshold;
    if changed {
        let tabulated = tabulated_group_count(store, view_id)?;
        if tabulated > 0 {
            view.revert();
            return Err(ValidationError::TabulationLocked {
                view: stored.name,
                tabulated,
            }
            .into());
        }
    }
    validate_view(store, &current)?;

    let mut written = current.clone();
    store.with_transaction(|s| {
        s.save(&mut written)?;
        let added: Vec<EntityId> = current
            .members
            .iter()
            .filter(|m| !stored.members.contains(m))
            .copied()
            .collect();
        for variety in added {
            align_member(s, view_id, variety)?;
        }
        for variety in stored.members.iter().filter(|m| !current.members.contains(m)) {
            unalign_member(s, view_id, *variety)?;
        }
        Ok(())
    })?;
    view.mark_saved(written);
    Ok(())
}

/// Gives every datum of `variety_id` an alignment in the view, copying the
/// vector from another view when one exists.
fn align_member<S: Store>(store: &mut S, view_id: EntityId, variety_id: EntityId) -> CorrResult<()> {
    for datum in store.list_related::<Datum>(Relation::Variety, variety_id)? {
        let datum_id = datum.id.unwrap_or_default();
        let existing: Vec<Alignment> = store.list_related(Relation::Datum, datum_id)?;
        if existing.iter().any(|a| a.view_id == view_id) {
            continue;
        }
        let vector = existing
            .first()
            .map(|a| a.vector.clone())
            .unwrap_or_else(|| all_hold(&datum.raw));
        let mut alignment = Alignment {
            view_id,
            datum_id,
            vector,
            ..Default::default()
        };
        store.save(&mut alignment)?;
    }
    debug!(view_id, variety_id, "aligned member data");
    Ok(())
}

fn unalign_member<S: Store>(store: &mut S, view_id: EntityId, variety_id: EntityId) -> CorrResult<()> {
    for datum in store.list_related::<Datum>(Relation::Variety, variety_id)? {
        for alignment in store.list_related::<Alignment>(Relation::Datum, datum.id.unwrap_or_default())? {
            if alignment.view_id == view_id {
                store.delete::<Alignment>(alignment.id.unwrap_or_default())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CorrError;
    use crate::store::MemoryStore;

    fn setup() -> (MemoryStore, EntityId, Vec<EntityId>) {
        let mut store = MemoryStore::new();
        let c = create_collection(&mut store, "Bantu").unwrap().id.unwrap();
        let members = ["Swahili", "Zulu", "Kikuyu"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                add_variety(&mut store, c, name, &name[..3], &format!("V{i}"))
                    .unwrap()
                    .id
                    .unwrap()
            })
            .collect();
        (store, c, members)
    }

    #[test]
    fn threshold_rounds_up() {
        assert_eq!(threshold_value(50, 3), 2);
        assert_eq!(threshold_value(100, 4), 4);
        assert_eq!(threshold_value(0, 9), 0);
        assert_eq!(threshold_value(34, 3), 2);
        assert!(passes_threshold(2, 2));
        assert!(!passes_threshold(1, 2));
    }

    #[test]
    fn variety_collisions_are_reported_by_field() {
        let (mut store, c, _) = setup();
        let err = add_variety(&mut store, c, "Swahili", "X", "Y").unwrap_err();
        assert!(err.to_string().contains("name 'Swahili'"));
        let err = add_variety(&mut store, c, "Other", "Zul", "Y").unwrap_err();
        assert!(err.to_string().contains("short name 'Zul'"));
        let err = add_variety(&mut store, c, "Other", "Oth", "V2").unwrap_err();
        assert!(err.to_string().contains("abbreviation 'V2'"));
    }

    #[test]
    fn duplicate_view_name_is_rejected() {
        let (mut store, c, members) = setup();
        create_view(&mut store, c, "Main", members.clone(), 50).unwrap();
        let err = create_view(&mut store, c, "Main", members, 50).unwrap_err();
        assert!(matches!(
            err,
            CorrError::Validation(ValidationError::DuplicateViewName(_))
        ));
    }

    #[test]
    fn locked_view_reverts_membership_change() {
        let (mut store, c, members) = setup();
        let view = create_view(&mut store, c, "Main", members.clone(), 50).unwrap();
        let view_id = view.id.unwrap();
        let mut group = Group {
            view_id,
            name: "A".into(),
            done: true,
            ..Default::default()
        };
        store.save(&mut group).unwrap();

        let tracked = Tracked::<View>::load(&store, view_id).unwrap();
        tracked.update(|v| v.members.pop());
        let err = update_view(&mut store, &tracked).unwrap_err();
        assert!(matches!(
            err,
            CorrError::Validation(ValidationError::TabulationLocked { tabulated: 1, .. })
        ));
        assert_eq!(tracked.get().members, members);
        assert!(!tracked.is_dirty());
    }

    #[test]
    fn renaming_a_locked_view_is_allowed() {
        let (mut store, c, members) = setup();
        let view_id = create_view(&mut store, c, "Main", members, 50).unwrap().id.unwrap();
        let mut group = Group {
            view_id,
            done: true,
            ..Default::default()
        };
        store.save(&mut group).unwrap();
        let tracked = Tracked::<View>::load(&store, view_id).unwrap();
        tracked.update(|v| v.name = "Renamed".into());
        update_view(&mut store, &tracked).unwrap();
        assert_eq!(store.load::<View>(view_id).unwrap().name, "Renamed");
    }

    #[test]
    fn stray_member_is_rejected() {
        let (mut store, c, mut members) = setup();
        members.push(999);
        let err = create_view(&mut store, c, "Main", members, 50).unwrap_err();
        assert!(matches!(
            err,
            CorrError::Validation(ValidationError::NotAViewMember { variety: 999, .. })
        ));
    }
}
