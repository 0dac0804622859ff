// File: src/core/datum.rs
use crate::core::alignment::{extract_vector, fuse_checked};
use crate::core::types::*;
use crate::error::{CorrResult, ValidationError};
use crate::store::Store;
use tracing::debug;

/// Stores a transcription typed with indel and exclude marks.
///
/// The marks are stripped from the stored text and kept as the initial
/// vector of one alignment per view that has the variety as a member.
pub fn add_datum<S: Store>(
    store: &mut S,
    entry_id: EntityId,
    variety_id: EntityId,
    annotated: &str,
) -> CorrResult<(Datum, Vec<Alignment>)> {
    let entry: Entry = store.load(entry_id)?;
    let variety: Variety = store.load(variety_id)?;
    if variety.collection_id != entry.collection_id {
        return Err(ValidationError::Other(format!(
            "variety '{}' and entry {} belong to different collections",
            variety.name, entry.number
        ))
        .into());
    }

    let (raw, vector) = extract_vector(annotated);
    store.with_transaction(|s| {
        let mut datum = Datum {
            entry_id,
            variety_id,
            raw,
            ..Default::default()
        };
        let datum_id = s.save(&mut datum)?;

        let mut alignments = Vec::new();
        for view in s.list_related::<View>(Relation::Collection, entry.collection_id)? {
            if !view.members.contains(&variety_id) {
                continue;
            }
            let mut alignment = Alignment {
                view_id: view.id.unwrap_or_default(),
                datum_id,
                vector: vector.clone(),
                ..Default::default()
            };
            s.save(&mut alignment)?;
            alignments.push(alignment);
        }
        debug!(datum_id, views = alignments.len(), "added datum");
        Ok((datum, alignments))
    })
}

/// Replaces an alignment's vector. The new vector must account for every
/// character of the datum.
pub fn realign<S: Store>(store: &mut S, alignment_id: EntityId, vector: &str) -> CorrResult<Alignment> {
    let mut alignment: Alignment = store.load(alignment_id)?;
    let datum: Datum = store.load(alignment.datum_id)?;
    fuse_checked(&datum.raw, vector)?;
    alignment.vector = vector.to_string();
    store.save(&mut alignment)?;
    Ok(alignment)
}

pub fn set_metathesis<S: Store>(
    store: &mut S,
    alignment_id: EntityId,
    metathesis: Option<Metathesis>,
) -> CorrResult<Alignment> {
    let mut alignment: Alignment = store.load(alignment_id)?;
    alignment.metathesis = metathesis;
    store.save(&mut alignment)?;
    Ok(alignment)
}

/// Text as the user sees it in `view_id`.
pub fn annotated_text<S: Store>(store: &S, datum_id: EntityId, view_id: EntityId) -> CorrResult<String> {
    let datum: Datum = store.load(datum_id)?;
    let alignment = store
        .list_related::<Alignment>(Relation::Datum, datum_id)?
        .into_iter()
        .find(|a| a.view_id == view_id);
    Ok(match alignment {
        Some(a) => crate::core::alignment::fuse(&datum.raw, &a.vector),
        None => datum.raw,
    })
}
