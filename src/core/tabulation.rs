//! Groups, citations and the tabulate / retabulate cycle.
//!
//! A group starts untabulated. Tabulating it files one citation per placement
//! under a protosegment, cluster and correspondence set, creating whichever of
//! those do not exist yet. Retabulating removes the citations again and
//! cascades through any set or cluster that no longer has a reason to exist.

use crate::core::alignment::aligned_units;
use crate::core::cluster::{create_cluster, create_correspondence_set, reorder_cluster_order};
use crate::core::correspondence::{join_segments, segments_identical};
use crate::core::types::*;
use crate::error::{CorrResult, ValidationError};
use crate::store::Store;
use std::collections::HashMap;
use tracing::{debug, info};

/// Where one segment of a group is filed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub protosegment_id: EntityId,
    pub environment: String,
    pub segments: String,
    pub position: Option<u32>,
}

/// Rows removed by [`retabulate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Retabulation {
    pub citations: usize,
    pub sets: usize,
    pub clusters: usize,
}

pub fn create_group<S: Store>(store: &mut S, view_id: EntityId, entry_id: EntityId, name: &str) -> CorrResult<Group> {
    store.load::<View>(view_id)?;
    store.load::<Entry>(entry_id)?;
    let mut group = Group {
        view_id,
        entry_id,
        name: name.to_string(),
        ..Default::default()
    };
    store.save(&mut group)?;
    Ok(group)
}

/// Moves an alignment into `group_id`, or out of any group with `None`.
/// Neither the old nor the new group may be tabulated.
pub fn assign_alignment<S: Store>(
    store: &mut S,
    alignment_id: EntityId,
    group_id: Option<EntityId>,
) -> CorrResult<Alignment> {
    let mut alignment: Alignment = store.load(alignment_id)?;
    for id in [alignment.group_id, group_id].into_iter().flatten() {
        let group: Group = store.load(id)?;
        if group.view_id != alignment.view_id {
            return Err(ValidationError::WrongView {
                kind: EntityKind::Group,
                id,
                expected: alignment.view_id,
                actual: group.view_id,
            }
            .into());
        }
        if group.done {
            return Err(ValidationError::GroupTabulated(group.name).into());
        }
    }
    alignment.group_id = group_id;
    store.save(&mut alignment)?;
    Ok(alignment)
}

pub fn group_citation_count<S: Store>(store: &S, group_id: EntityId) -> CorrResult<usize> {
    store.count_related::<Citation>(Relation::Group, group_id)
}

/// Aligned units of every member variety in the group, keyed by variety.
fn member_units<S: Store>(store: &S, group: &Group) -> CorrResult<HashMap<EntityId, Vec<String>>> {
    let mut units = HashMap::new();
    for alignment in store.list_related::<Alignment>(Relation::Group, group.id.unwrap_or_default())? {
        let datum: Datum = store.load(alignment.datum_id)?;
        units.insert(datum.variety_id, aligned_units(&datum.raw, &alignment));
    }
    Ok(units)
}

/// Longest aligned form among the group's alignments, in units.
pub fn column_count<S: Store>(store: &S, group_id: EntityId) -> CorrResult<usize> {
    let group: Group = store.load(group_id)?;
    Ok(member_units(store, &group)?.values().map(Vec::len).max().unwrap_or(0))
}

/// Set string for one column of the group, one unit per view member in
/// member order. Members without data or without that column read as `.`.
pub fn correspondence_column<S: Store>(store: &S, group_id: EntityId, column: usize) -> CorrResult<String> {
    let group: Group = store.load(group_id)?;
    let view: View = store.load(group.view_id)?;
    let units = member_units(store, &group)?;
    Ok(join_segments(
        view.members
            .iter()
            .map(|m| units.get(m).and_then(|u| u.get(column))),
    ))
}

/// Files the group under each placement and marks it tabulated.
pub fn tabulate_group<S: Store>(store: &mut S, group_id: EntityId, placements: &[Placement]) -> CorrResult<Vec<Citation>> {
    if placements.is_empty() {
        return Err(ValidationError::Other("nothing to tabulate".into()).into());
    }
    store.with_transaction(|s| {
        let mut group: Group = s.load(group_id)?;
        if group.done {
            return Err(ValidationError::GroupTabulated(group.name).into());
        }

        let mut citations = Vec::with_capacity(placements.len());
        for placement in placements {
            let set_id = file_placement(s, &group, placement)?;
            let mut citation = Citation {
                group_id,
                set_id,
                position: placement.position,
                ..Default::default()
            };
            s.save(&mut citation)?;
            citations.push(citation);
        }

        group.done = true;
        s.save(&mut group)?;
        info!(group_id, citations = citations.len(), "tabulated group");
        Ok(citations)
    })
}

fn file_placement<S: Store>(store: &mut S, group: &Group, placement: &Placement) -> CorrResult<EntityId> {
    let proto_id = placement.protosegment_id;
    let proto: Protosegment = store.load(proto_id)?;
    if proto.view_id != group.view_id {
        return Err(ValidationError::WrongView {
            kind: EntityKind::Protosegment,
            id: proto_id,
            expected: group.view_id,
            actual: proto.view_id,
        }
        .into());
    }

    let existing = store
        .list_related::<Cluster>(Relation::Protosegment, proto_id)?
        .into_iter()
        .find(|c| c.environment == placement.environment);
    let cluster = match existing {
        Some(c) => c,
        None => create_cluster(store, proto_id, &placement.environment)?,
    };
    let cluster_id = cluster.id.unwrap_or_default();

    let existing = store
        .list_related::<CorrespondenceSet>(Relation::Cluster, cluster_id)?
        .into_iter()
        .find(|s| segments_identical(s.segments(), &placement.segments));
    let set = match existing {
        Some(s) => s,
        None => create_correspondence_set(store, cluster_id, &placement.segments)?,
    };
    Ok(set.id.unwrap_or_default())
}

/// Undoes tabulation of a group.
///
/// A set whose only citation was this group's is deleted, and so is its
/// cluster when that set was the cluster's last one. Surviving clusters of
/// the protosegment are renumbered. Runs as one transaction.
pub fn retabulate<S: Store>(store: &mut S, group_id: EntityId) -> CorrResult<Retabulation> {
    store.with_transaction(|s| {
        let mut group: Group = s.load(group_id)?;
        let mut removed = Retabulation::default();

        for citation in s.list_related::<Citation>(Relation::Group, group_id)? {
            let set_id = citation.set_id;
            if s.count_related::<Citation>(Relation::CorrespondenceSet, set_id)? <= 1 {
                let set: CorrespondenceSet = s.load(set_id)?;
                let siblings = s.count_related::<CorrespondenceSet>(Relation::Cluster, set.cluster_id)?;
                if siblings <= 1 {
                    let cluster: Cluster = s.load(set.cluster_id)?;
                    s.delete::<Cluster>(set.cluster_id)?;
                    reorder_cluster_order(s, cluster.protosegment_id)?;
                    removed.clusters += 1;
                    debug!(cluster_id = set.cluster_id, "retabulation removed cluster");
                }
                s.delete::<CorrespondenceSet>(set_id)?;
                removed.sets += 1;
            }
            s.delete::<Citation>(citation.id.unwrap_or_default())?;
            removed.citations += 1;
        }

        group.done = false;
        s.save(&mut group)?;
        info!(
            group_id,
            citations = removed.citations,
            sets = removed.sets,
            clusters = removed.clusters,
            "retabulated group"
        );
        Ok(removed)
    })
}
