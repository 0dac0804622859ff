//! Clusters of correspondence sets under one protosegment.
//!
//! Offering a set to a cluster either folds it into an identical set, moves
//! it in whole, or is refused because some member is not conformable. A
//! cluster left without sets is removed and its siblings renumbered from 1.

use crate::core::types::*;
use crate::error::CorrResult;
use crate::store::Store;
use tracing::{debug, info};

/// What happened when a set was offered to a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// An identical set absorbed the offered one and its citations.
    MergedInto { set_id: EntityId },
    /// The offered set now belongs to the target cluster.
    Moved,
    /// The set was already in the target cluster.
    AlreadyMember,
    /// The first non-conformable member found in the target.
    Rejected { nonconformable: EntityId },
}

impl MergeOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, MergeOutcome::Rejected { .. })
    }
}

/// Totals from folding a whole cluster into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterMerge {
    pub merged: usize,
    pub moved: usize,
    /// Sets left behind because the target refused them.
    pub rejected: Vec<EntityId>,
    pub source_removed: bool,
}

pub(crate) fn append_remarks(into: &mut String, from: &str) {
    let from = from.trim();
    if from.is_empty() {
        return;
    }
    if !into.is_empty() {
        into.push('\n');
    }
    into.push_str(from);
}

pub fn create_cluster<S: Store>(
    store: &mut S,
    protosegment_id: EntityId,
    environment: &str,
) -> CorrResult<Cluster> {
    store.load::<Protosegment>(protosegment_id)?;
    let existing = store.count_related::<Cluster>(Relation::Protosegment, protosegment_id)?;
    let mut cluster = Cluster {
        protosegment_id,
        environment: environment.to_string(),
        order: existing as u32 + 1,
        ..Default::default()
    };
    store.save(&mut cluster)?;
    Ok(cluster)
}

/// Adds a new set at the end of `cluster_id`.
pub fn create_correspondence_set<S: Store>(
    store: &mut S,
    cluster_id: EntityId,
    segments: &str,
) -> CorrResult<CorrespondenceSet> {
    store.load::<Cluster>(cluster_id)?;
    let mut set = CorrespondenceSet::new(cluster_id, segments);
    set.order = next_set_order(store, cluster_id)?;
    store.save(&mut set)?;
    Ok(set)
}

fn next_set_order<S: Store>(store: &S, cluster_id: EntityId) -> CorrResult<u32> {
    let sets: Vec<CorrespondenceSet> = store.list_related(Relation::Cluster, cluster_id)?;
    Ok(sets.iter().map(|s| s.order).max().unwrap_or(0) + 1)
}

/// Offers set `set_id` to cluster `cluster_id`. Runs as one transaction.
pub fn add_correspondence_set<S: Store>(
    store: &mut S,
    cluster_id: EntityId,
    set_id: EntityId,
) -> CorrResult<MergeOutcome> {
    store.with_transaction(|s| offer_set(s, cluster_id, set_id))
}

fn offer_set<S: Store>(store: &mut S, cluster_id: EntityId, set_id: EntityId) -> CorrResult<MergeOutcome> {
    let mut target: Cluster = store.load(cluster_id)?;
    let mut from_set: CorrespondenceSet = store.load(set_id)?;
    let from_cluster_id = from_set.cluster_id;
    if from_cluster_id == cluster_id {
        return Ok(MergeOutcome::AlreadyMember);
    }

    let to_sets: Vec<CorrespondenceSet> = store.list_related(Relation::Cluster, cluster_id)?;
    for to_set in &to_sets {
        if to_set.is_identical(&from_set) {
            let mut to_set = to_set.clone();
            let to_id = to_set.id.unwrap_or_default();
            let citations: Vec<Citation> = store.list_related(Relation::CorrespondenceSet, set_id)?;
            for mut citation in citations {
                citation.set_id = to_id;
                store.save(&mut citation)?;
            }
            append_remarks(&mut to_set.remarks, &from_set.remarks);
            store.save(&mut to_set)?;
            store.delete::<CorrespondenceSet>(set_id)?;
            remove_if_empty(store, from_cluster_id, &mut target)?;
            info!(set_id, into = to_id, cluster_id, "merged identical correspondence set");
            return Ok(MergeOutcome::MergedInto { set_id: to_id });
        }
        if !to_set.is_conformable(&from_set) {
            let nonconformable = to_set.id.unwrap_or_default();
            debug!(set_id, cluster_id, nonconformable, "cluster refused correspondence set");
            return Ok(MergeOutcome::Rejected { nonconformable });
        }
    }

    from_set.order = next_set_order(store, cluster_id)?;
    from_set.cluster_id = cluster_id;
    store.save(&mut from_set)?;
    remove_if_empty(store, from_cluster_id, &mut target)?;
    info!(set_id, cluster_id, "moved correspondence set");
    Ok(MergeOutcome::Moved)
}

/// Deletes `cluster_id` if it has no sets left, handing its remarks to
/// `heir`. Returns whether it was deleted.
fn remove_if_empty<S: Store>(store: &mut S, cluster_id: EntityId, heir: &mut Cluster) -> CorrResult<bool> {
    if store.count_related::<CorrespondenceSet>(Relation::Cluster, cluster_id)? > 0 {
        return Ok(false);
    }
    let emptied: Cluster = store.load(cluster_id)?;
    append_remarks(&mut heir.remarks, &emptied.remarks);
    store.save(heir)?;
    store.delete::<Cluster>(cluster_id)?;
    reorder_cluster_order(store, emptied.protosegment_id)?;
    debug!(cluster_id, "removed empty cluster");
    Ok(true)
}

/// Non-mutating probe: would [`add_correspondence_set`] succeed?
pub fn has_conformable<S: Store>(store: &S, cluster_id: EntityId, set: &CorrespondenceSet) -> CorrResult<bool> {
    let to_sets: Vec<CorrespondenceSet> = store.list_related(Relation::Cluster, cluster_id)?;
    for to_set in to_sets.iter().filter(|t| t.id != set.id) {
        if to_set.is_identical(set) {
            return Ok(true);
        }
        if !to_set.is_conformable(set) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Renumbers the protosegment's clusters 1..k in their stored order, saving
/// only those whose order changed. Returns how many were saved.
pub fn reorder_cluster_order<S: Store>(store: &mut S, protosegment_id: EntityId) -> CorrResult<usize> {
    let clusters: Vec<Cluster> = store.list_related(Relation::Protosegment, protosegment_id)?;
    let mut changed = 0;
    for (i, mut cluster) in clusters.into_iter().enumerate() {
        let order = i as u32 + 1;
        if cluster.order != order {
            cluster.order = order;
            store.save(&mut cluster)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Offers every set of `from_id` to `into_id`. Refused sets stay where they
/// were; an empty source cluster is removed.
pub fn merge_clusters<S: Store>(store: &mut S, from_id: EntityId, into_id: EntityId) -> CorrResult<ClusterMerge> {
    store.with_transaction(|s| {
        let mut summary = ClusterMerge::default();
        if from_id == into_id {
            return Ok(summary);
        }
        let sets: Vec<CorrespondenceSet> = s.list_related(Relation::Cluster, from_id)?;
        if sets.is_empty() {
            let mut target: Cluster = s.load(into_id)?;
            summary.source_removed = remove_if_empty(s, from_id, &mut target)?;
            return Ok(summary);
        }
        for set in sets {
            let set_id = set.id.unwrap_or_default();
            match offer_set(s, into_id, set_id)? {
                MergeOutcome::MergedInto { .. } => summary.merged += 1,
                MergeOutcome::Moved => summary.moved += 1,
                MergeOutcome::AlreadyMember => {}
                MergeOutcome::Rejected { .. } => summary.rejected.push(set_id),
            }
        }
        summary.source_removed = summary.rejected.is_empty();
        Ok(summary)
    })
}

/// Citations reaching this cluster through any of its sets.
pub fn cluster_citation_count<S: Store>(store: &S, cluster_id: EntityId) -> CorrResult<usize> {
    let sets: Vec<CorrespondenceSet> = store.list_related(Relation::Cluster, cluster_id)?;
    let mut total = 0;
    for set in &sets {
        if let Some(id) = set.id {
            total += store.count_related::<Citation>(Relation::CorrespondenceSet, id)?;
        }
    }
    Ok(total)
}
