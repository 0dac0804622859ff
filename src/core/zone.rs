// File: src/core/zone.rs
use crate::core::cluster::cluster_citation_count;
use crate::core::types::*;
use crate::error::{CorrResult, ValidationError};
use crate::store::Store;
use tracing::info;

const MANNERS: [(&str, &str); 7] = [
    ("ST", "stop"),
    ("AF", "affricate"),
    ("FR", "fricative"),
    ("NA", "nasal"),
    ("LA", "lateral"),
    ("RH", "rhotic"),
    ("SV", "semivowel"),
];

const PLACES: [(&str, &str); 7] = [
    ("LB", "labial"),
    ("DN", "dental"),
    ("AL", "alveolar"),
    ("PA", "palatal"),
    ("VE", "velar"),
    ("UV", "uvular"),
    ("GL", "glottal"),
];

const HEIGHTS: [(&str, &str); 3] = [("HI", "high"), ("MI", "mid"), ("LO", "low")];
const BACKNESS: [(&str, &str); 3] = [("FR", "front"), ("CE", "central"), ("BA", "back")];

pub const RESIDUE: &str = "RES";

impl Zone {
    /// Place-by-manner consonant cells, height-by-backness vowel cells and
    /// the residue cell at (0, 0).
    pub fn standard_chart() -> Vec<Zone> {
        let mut chart = vec![Zone {
            row: 0,
            column: 0,
            abbreviation: RESIDUE.to_string(),
            name: "residue".to_string(),
            zone_type: ZoneType::Residue,
            ..Default::default()
        }];

        for (r, (m_abbr, m_name)) in MANNERS.iter().enumerate() {
            for (c, (p_abbr, p_name)) in PLACES.iter().enumerate() {
                chart.push(Zone {
                    row: r as u32 + 1,
                    column: c as u32 + 1,
                    abbreviation: format!("{m_abbr}{p_abbr}"),
                    name: format!("{p_name} {m_name}"),
                    zone_type: ZoneType::Consonant,
                    ..Default::default()
                });
            }
        }

        let first_vowel_row = MANNERS.len() as u32 + 1;
        for (r, (h_abbr, h_name)) in HEIGHTS.iter().enumerate() {
            for (c, (b_abbr, b_name)) in BACKNESS.iter().enumerate() {
                chart.push(Zone {
                    row: first_vowel_row + r as u32,
                    column: c as u32 + 1,
                    abbreviation: format!("V{h_abbr}{b_abbr}"),
                    name: format!("{h_name} {b_name} vowel"),
                    zone_type: ZoneType::Vowel,
                    ..Default::default()
                });
            }
        }
        chart
    }

    pub fn is_residue(&self, residue_abbreviation: &str) -> bool {
        self.abbreviation == residue_abbreviation
    }
}

/// Stores the standard chart unless zones already exist. Returns how many
/// zones were added.
pub fn seed_zones<S: Store>(store: &mut S) -> CorrResult<usize> {
    if !store.list_all::<Zone>()?.is_empty() {
        return Ok(0);
    }
    let mut chart = Zone::standard_chart();
    for zone in chart.iter_mut() {
        store.save(zone)?;
    }
    info!(zones = chart.len(), "seeded zone chart");
    Ok(chart.len())
}

pub fn find_zone<S: Store>(store: &S, abbreviation: &str) -> CorrResult<Option<Zone>> {
    Ok(store
        .list_all::<Zone>()?
        .into_iter()
        .find(|z| z.abbreviation == abbreviation))
}

/// Creates a protosegment, refusing a symbol already used in the same zone of
/// the same view.
pub fn create_protosegment<S: Store>(
    store: &mut S,
    view_id: EntityId,
    zone_id: EntityId,
    symbol: &str,
) -> CorrResult<Protosegment> {
    store.load::<View>(view_id)?;
    let zone: Zone = store.load(zone_id)?;
    let clash = store
        .list_related::<Protosegment>(Relation::View, view_id)?
        .into_iter()
        .any(|p| p.zone_id == zone_id && p.symbol == symbol);
    if clash {
        return Err(ValidationError::DuplicateProtosegment {
            symbol: symbol.to_string(),
            zone: zone.abbreviation,
        }
        .into());
    }
    let mut proto = Protosegment {
        view_id,
        zone_id,
        symbol: symbol.to_string(),
        ..Default::default()
    };
    store.save(&mut proto)?;
    Ok(proto)
}

pub fn find_protosegment<S: Store>(
    store: &S,
    view_id: EntityId,
    zone_id: EntityId,
    symbol: &str,
) -> CorrResult<Option<Protosegment>> {
    Ok(store
        .list_related::<Protosegment>(Relation::View, view_id)?
        .into_iter()
        .find(|p| p.zone_id == zone_id && p.symbol == symbol))
}

pub fn protosegment_citation_count<S: Store>(store: &S, protosegment_id: EntityId) -> CorrResult<usize> {
    let mut total = 0;
    for cluster in store.list_related::<Cluster>(Relation::Protosegment, protosegment_id)? {
        if let Some(id) = cluster.id {
            total += cluster_citation_count(store, id)?;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn chart_has_unique_abbreviations_and_one_residue() {
        let chart = Zone::standard_chart();
        let mut abbrs: Vec<&str> = chart.iter().map(|z| z.abbreviation.as_str()).collect();
        abbrs.sort();
        abbrs.dedup();
        assert_eq!(abbrs.len(), chart.len());
        assert_eq!(chart.iter().filter(|z| z.zone_type == ZoneType::Residue).count(), 1);
        assert!(chart.iter().any(|z| z.abbreviation == "STLB" && z.name == "labial stop"));
    }

    #[test]
    fn seeding_twice_adds_nothing() {
        let mut store = MemoryStore::new();
        let n = seed_zones(&mut store).unwrap();
        assert_eq!(n, Zone::standard_chart().len());
        assert_eq!(seed_zones(&mut store).unwrap(), 0);
        let res = find_zone(&store, RESIDUE).unwrap().unwrap();
        assert!(res.is_residue(RESIDUE));
    }

    #[test]
    fn duplicate_symbol_in_zone_is_rejected() {
        let mut store = MemoryStore::new();
        seed_zones(&mut store).unwrap();
        let mut view = View {
            name: "Main".into(),
            ..Default::default()
        };
        let view_id = store.save(&mut view).unwrap();
        let stop = find_zone(&store, "STLB").unwrap().unwrap().id.unwrap();
        let fric = find_zone(&store, "FRLB").unwrap().unwrap().id.unwrap();

        create_protosegment(&mut store, view_id, stop, "p").unwrap();
        create_protosegment(&mut store, view_id, fric, "p").unwrap();
        let err = create_protosegment(&mut store, view_id, stop, "p").unwrap_err();
        assert!(err.to_string().contains("'p' already exists in zone STLB"));
    }
}
