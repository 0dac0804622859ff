//! Frantz strength scores for tabulated groups.
//!
//! Each citation of a group is weighed by how many citations its cluster and
//! its protosegment gather overall, against a baseline that grows with the
//! logarithm of the number of groups in the view. Scores are recomputed in
//! full every time; nothing is updated incrementally.

use crate::config::CorrConfig;
use crate::core::cluster::cluster_citation_count;
use crate::core::tabulation::group_citation_count;
use crate::core::types::*;
use crate::core::view::passes_threshold;
use crate::core::zone::protosegment_citation_count;
use crate::error::CorrResult;
use crate::store::Store;
use std::collections::HashMap;
use tracing::{debug, info};

/// `round(log10(max(frantz_n, floor) / 100) * 21 + 9)`, never below 1.
pub fn baseline(frantz_n: usize, population_floor: usize) -> u32 {
    let population = frantz_n.max(population_floor) as f64;
    ((population / 100.0).log10() * 21.0 + 9.0).round().max(1.0) as u32
}

/// Adds the contribution of one citation count to a running total.
///
/// The checks are independent rather than chained: with a baseline of 2 or
/// less a count of 2 both earns the full point and pays the 0.5 penalty.
/// Historical scores depend on this.
pub fn accumulate(total: f64, count: usize, baseline: u32) -> f64 {
    let n = baseline as usize;
    let mut total = total;
    if count >= n {
        total += 1.0;
    } else if count > 2 && count < n {
        total += count as f64 / n as f64;
    }
    if count == 2 {
        total -= 0.5;
    }
    if count == 1 {
        total -= 1.0;
    }
    total
}

/// One citation resolved down to its zone.
struct CitedPath {
    cluster_id: EntityId,
    protosegment_id: EntityId,
    symbol: String,
    residue: bool,
}

/// Memoized lookups for one recompute.
struct Resolver<'a, S: Store> {
    store: &'a S,
    residue: &'a str,
    cluster_counts: HashMap<EntityId, usize>,
    proto_counts: HashMap<EntityId, usize>,
    protos: HashMap<EntityId, (String, bool)>,
}

impl<'a, S: Store> Resolver<'a, S> {
    fn new(store: &'a S, residue: &'a str) -> Self {
        Self {
            store,
            residue,
            cluster_counts: HashMap::new(),
            proto_counts: HashMap::new(),
            protos: HashMap::new(),
        }
    }

    fn path(&mut self, citation: &Citation) -> CorrResult<CitedPath> {
        let set: CorrespondenceSet = self.store.load(citation.set_id)?;
        let cluster: Cluster = self.store.load(set.cluster_id)?;
        let protosegment_id = cluster.protosegment_id;
        let (symbol, residue) = match self.protos.get(&protosegment_id) {
            Some(p) => p.clone(),
            None => {
                let proto: Protosegment = self.store.load(protosegment_id)?;
                let zone: Zone = self.store.load(proto.zone_id)?;
                let entry = (proto.symbol, zone.is_residue(self.residue));
                self.protos.insert(protosegment_id, entry.clone());
                entry
            }
        };
        Ok(CitedPath {
            cluster_id: set.cluster_id,
            protosegment_id,
            symbol,
            residue,
        })
    }

    fn cluster_count(&mut self, cluster_id: EntityId) -> CorrResult<usize> {
        if let Some(&n) = self.cluster_counts.get(&cluster_id) {
            return Ok(n);
        }
        let n = cluster_citation_count(self.store, cluster_id)?;
        self.cluster_counts.insert(cluster_id, n);
        Ok(n)
    }

    fn proto_count(&mut self, protosegment_id: EntityId) -> CorrResult<usize> {
        if let Some(&n) = self.proto_counts.get(&protosegment_id) {
            return Ok(n);
        }
        let n = protosegment_citation_count(self.store, protosegment_id)?;
        self.proto_counts.insert(protosegment_id, n);
        Ok(n)
    }
}

/// Tabulated groups of the view that pass its threshold, with citations.
fn qualifying_groups<S: Store>(store: &S, view: &View) -> CorrResult<Vec<(Group, Vec<Citation>)>> {
    let threshold = view.threshold_value();
    let mut out = Vec::new();
    for group in store.list_related::<Group>(Relation::View, view.id.unwrap_or_default())? {
        if !group.done {
            continue;
        }
        let citations: Vec<Citation> = store.list_related(Relation::Group, group.id.unwrap_or_default())?;
        if passes_threshold(citations.len(), threshold) {
            out.push((group, citations));
        }
    }
    Ok(out)
}

/// Recomputes and stores the scores, reconstruction and residue flag of every
/// tabulated group at or above threshold. Returns the number of those groups
/// citing at least one non-residue protosegment, which sets the baseline.
pub fn compute_strength<S: Store>(store: &mut S, view_id: EntityId, config: &CorrConfig) -> CorrResult<usize> {
    let view: View = store.load(view_id)?;
    let groups = qualifying_groups(store, &view)?;
    let residue = config.tabulation.residue_abbreviation.as_str();

    let mut scored = Vec::with_capacity(groups.len());
    let frantz_n;
    {
        let mut resolver = Resolver::new(&*store, residue);
        let mut paths = Vec::with_capacity(groups.len());
        for (group, citations) in groups {
            let resolved = citations
                .iter()
                .map(|c| resolver.path(c))
                .collect::<CorrResult<Vec<_>>>()?;
            paths.push((group, resolved));
        }

        frantz_n = paths
            .iter()
            .filter(|(_, p)| p.iter().any(|c| !c.residue))
            .count();
        let n = baseline(frantz_n, config.frantz.population_floor);
        debug!(view_id, frantz_n, baseline = n, "computing Frantz strength");

        for (mut group, resolved) in paths {
            let pcount = resolved.len();
            if pcount == 0 {
                continue;
            }
            let mut acluster = 0.0;
            let mut aproto = 0.0;
            let mut reconstruction = String::new();
            for path in &resolved {
                acluster = accumulate(acluster, resolver.cluster_count(path.cluster_id)?, n);
                aproto = accumulate(aproto, resolver.proto_count(path.protosegment_id)?, n);
                reconstruction.push_str(&path.symbol);
            }
            group.frantz_cluster = acluster / pcount as f64;
            group.frantz_protosegment = aproto / pcount as f64;
            group.reconstruction = reconstruction;
            group.all_citations_with_residue = resolved.iter().all(|p| p.residue);
            scored.push(group);
        }
    }

    store.with_transaction(|s| {
        for group in scored.iter_mut() {
            s.save(group)?;
        }
        Ok(())
    })?;
    info!(view_id, frantz_n, groups = scored.len(), "stored Frantz strength");
    Ok(frantz_n)
}

/// One row of a view summary.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStrength {
    pub group_id: EntityId,
    pub entry_id: EntityId,
    pub name: String,
    pub citations: usize,
    pub reconstruction: String,
    pub frantz_cluster: f64,
    pub frantz_protosegment: f64,
    pub all_citations_with_residue: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabulationSummary {
    pub threshold_value: usize,
    /// Strongest first.
    pub above: Vec<GroupStrength>,
    pub below: Vec<GroupStrength>,
}

/// Splits the view's tabulated groups by threshold, reporting stored scores.
pub fn summarize_view<S: Store>(store: &S, view_id: EntityId) -> CorrResult<TabulationSummary> {
    let view: View = store.load(view_id)?;
    let threshold_value = view.threshold_value();
    let mut above = Vec::new();
    let mut below = Vec::new();

    for group in store.list_related::<Group>(Relation::View, view_id)? {
        if !group.done {
            continue;
        }
        let group_id = group.id.unwrap_or_default();
        let citations = group_citation_count(store, group_id)?;
        let row = GroupStrength {
            group_id,
            entry_id: group.entry_id,
            name: group.name,
            citations,
            reconstruction: group.reconstruction,
            frantz_cluster: group.frantz_cluster,
            frantz_protosegment: group.frantz_protosegment,
            all_citations_with_residue: group.all_citations_with_residue,
        };
        if passes_threshold(citations, threshold_value) {
            above.push(row);
        } else {
            below.push(row);
        }
    }

    above.sort_by(|a, b| {
        b.frantz_protosegment
            .total_cmp(&a.frantz_protosegment)
            .then(b.frantz_cluster.total_cmp(&a.frantz_cluster))
    });
    Ok(TabulationSummary {
        threshold_value,
        above,
        below,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn accumulator_boundaries() {
        assert_relative_eq!(accumulate(0.0, 1, 10), -1.0);
        assert_relative_eq!(accumulate(0.0, 2, 10), -0.5);
        assert_relative_eq!(accumulate(0.0, 10, 10), 1.0);
        assert_relative_eq!(accumulate(0.0, 5, 10), 0.5);
        assert_relative_eq!(accumulate(0.0, 3, 10), 0.3);
        assert_relative_eq!(accumulate(0.0, 25, 10), 1.0);
    }

    #[test]
    fn accumulator_zero_count_adds_nothing() {
        assert_relative_eq!(accumulate(0.25, 0, 10), 0.25);
    }

    #[test]
    fn accumulator_overlap_at_small_baseline() {
        // Both the full point and the pair penalty apply.
        assert_relative_eq!(accumulate(0.0, 2, 2), 0.5);
        assert_relative_eq!(accumulate(0.0, 1, 1), 0.0);
    }

    #[test]
    fn baseline_is_floored_and_log_scaled() {
        assert_eq!(baseline(0, 50), 3);
        assert_eq!(baseline(50, 50), 3);
        assert_eq!(baseline(100, 50), 9);
        assert_eq!(baseline(200, 50), 15);
        assert_eq!(baseline(1000, 50), 30);
    }

    #[test]
    fn baseline_never_drops_below_one() {
        assert_eq!(baseline(0, 1), 1);
    }
}
