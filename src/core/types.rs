// src/core/types.rs
use crate::store::{Table, Tables};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the store on first save.
pub type EntityId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    WordCollection,
    Variety,
    Entry,
    Datum,
    View,
    Alignment,
    Group,
    Zone,
    Protosegment,
    Cluster,
    CorrespondenceSet,
    Citation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::WordCollection => "word collection",
            EntityKind::Variety => "variety",
            EntityKind::Entry => "entry",
            EntityKind::Datum => "datum",
            EntityKind::View => "view",
            EntityKind::Alignment => "alignment",
            EntityKind::Group => "group",
            EntityKind::Zone => "zone",
            EntityKind::Protosegment => "protosegment",
            EntityKind::Cluster => "cluster",
            EntityKind::CorrespondenceSet => "correspondence set",
            EntityKind::Citation => "citation",
        };
        f.write_str(name)
    }
}

/// Parent links followed by `Store::list_related`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Collection,
    Entry,
    Variety,
    Datum,
    View,
    Group,
    Zone,
    Protosegment,
    Cluster,
    CorrespondenceSet,
}

/// Anything the store can hold. Relationships are ids, never references.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> Option<EntityId>;
    fn set_id(&mut self, id: EntityId);

    /// Foreign key for `relation`, if this kind has one.
    fn parent(&self, relation: Relation) -> Option<EntityId>;

    /// Primary sort key inside `list_related`; ties fall back to id.
    fn ordinal(&self) -> i64 {
        0
    }

    fn table(tables: &Tables) -> &Table<Self>;
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
}

macro_rules! entity {
    ($ty:ident, $table:ident, |$me:ident, $rel:ident| $parent:expr $(, ordinal = $ord:expr)?) => {
        impl Entity for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn id(&self) -> Option<EntityId> {
                self.id
            }

            fn set_id(&mut self, id: EntityId) {
                self.id = Some(id);
            }

            fn parent(&self, $rel: Relation) -> Option<EntityId> {
                #[allow(unused_variables)]
                let $me = self;
                $parent
            }

            $(
                fn ordinal(&self) -> i64 {
                    let $me = self;
                    $ord
                }
            )?

            fn table(tables: &Tables) -> &Table<Self> {
                &tables.$table
            }

            fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
                &mut tables.$table
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordCollection {
    pub id: Option<EntityId>,
    pub name: String,
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variety {
    pub id: Option<EntityId>,
    pub collection_id: EntityId,
    pub name: String,
    pub short_name: String,
    pub abbreviation: String,
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Option<EntityId>,
    pub collection_id: EntityId,
    pub number: u32,
    pub gloss: String,
}

/// Raw transcription for one (entry, variety) pair, with indel and exclude
/// marks already moved into the alignment vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    pub id: Option<EntityId>,
    pub entry_id: EntityId,
    pub variety_id: EntityId,
    pub raw: String,
    pub special_semantics: String,
    pub remarks: String,
}

/// Positional transposition of two spans of grapheme units, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metathesis {
    pub start1: usize,
    pub len1: usize,
    pub start2: usize,
    pub len2: usize,
}

impl Metathesis {
    /// Converts the 1-based legacy encoding, where a first start of 0 or less
    /// means no transposition was recorded.
    pub fn from_legacy(m1: i32, len1: i32, m2: i32, len2: i32) -> Option<Self> {
        if m1 <= 0 || m2 <= 0 || len1 <= 0 || len2 <= 0 {
            return None;
        }
        Some(Self {
            start1: (m1 - 1) as usize,
            len1: len1 as usize,
            start2: (m2 - 1) as usize,
            len2: len2 as usize,
        })
    }

    pub fn to_legacy(self) -> (i32, i32, i32, i32) {
        (
            self.start1 as i32 + 1,
            self.len1 as i32,
            self.start2 as i32 + 1,
            self.len2 as i32,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub id: Option<EntityId>,
    pub view_id: EntityId,
    pub datum_id: EntityId,
    pub vector: String,
    pub group_id: Option<EntityId>,
    pub metathesis: Option<Metathesis>,
}

/// Ordered member varieties and tabulation threshold over one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: Option<EntityId>,
    pub collection_id: EntityId,
    pub name: String,
    pub members: Vec<EntityId>,
    /// Percentage of members a group needs to pass threshold.
    pub threshold: u32,
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Option<EntityId>,
    pub view_id: EntityId,
    pub entry_id: EntityId,
    pub name: String,
    pub reconstruction: String,
    pub frantz_cluster: f64,
    pub frantz_protosegment: f64,
    pub all_citations_with_residue: bool,
    pub done: bool,
    pub remarks: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneType {
    #[default]
    Consonant,
    Vowel,
    Residue,
}

/// One cell of the stylized phonetic chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: Option<EntityId>,
    pub row: u32,
    pub column: u32,
    pub abbreviation: String,
    pub name: String,
    pub zone_type: ZoneType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Protosegment {
    pub id: Option<EntityId>,
    pub view_id: EntityId,
    pub zone_id: EntityId,
    pub symbol: String,
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Option<EntityId>,
    pub protosegment_id: EntityId,
    pub environment: String,
    pub order: u32,
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSet {
    pub id: Option<EntityId>,
    pub cluster_id: EntityId,
    segments: String,
    variety_count: usize,
    pub order: u32,
    pub remarks: String,
}

impl CorrespondenceSet {
    pub fn new(cluster_id: EntityId, segments: &str) -> Self {
        let mut set = Self {
            cluster_id,
            ..Self::default()
        };
        set.set_segments(segments);
        set
    }

    pub fn segments(&self) -> &str {
        &self.segments
    }

    pub fn variety_count(&self) -> usize {
        self.variety_count
    }

    pub fn set_segments(&mut self, segments: &str) {
        self.segments = segments.to_string();
        self.variety_count = crate::core::correspondence::count_varieties(segments);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: Option<EntityId>,
    pub group_id: EntityId,
    pub set_id: EntityId,
    pub position: Option<u32>,
}

entity!(WordCollection, collections, |me, _rel| None);

entity!(Variety, varieties, |me, rel| match rel {
    Relation::Collection => Some(me.collection_id),
    _ => None,
});

entity!(Entry, entries, |me, rel| match rel {
    Relation::Collection => Some(me.collection_id),
    _ => None,
}, ordinal = me.number as i64);

entity!(Datum, data, |me, rel| match rel {
    Relation::Entry => Some(me.entry_id),
    Relation::Variety => Some(me.variety_id),
    _ => None,
});

entity!(View, views, |me, rel| match rel {
    Relation::Collection => Some(me.collection_id),
    _ => None,
});

entity!(Alignment, alignments, |me, rel| match rel {
    Relation::View => Some(me.view_id),
    Relation::Datum => Some(me.datum_id),
    Relation::Group => me.group_id,
    _ => None,
});

entity!(Group, groups, |me, rel| match rel {
    Relation::View => Some(me.view_id),
    Relation::Entry => Some(me.entry_id),
    _ => None,
});

entity!(Zone, zones, |me, _rel| None, ordinal = (me.row as i64) * 1000 + me.column as i64);

entity!(Protosegment, protosegments, |me, rel| match rel {
    Relation::View => Some(me.view_id),
    Relation::Zone => Some(me.zone_id),
    _ => None,
});

entity!(Cluster, clusters, |me, rel| match rel {
    Relation::Protosegment => Some(me.protosegment_id),
    _ => None,
}, ordinal = me.order as i64);

entity!(CorrespondenceSet, sets, |me, rel| match rel {
    Relation::Cluster => Some(me.cluster_id),
    _ => None,
}, ordinal = me.order as i64);

entity!(Citation, citations, |me, rel| match rel {
    Relation::Group => Some(me.group_id),
    Relation::CorrespondenceSet => Some(me.set_id),
    _ => None,
});
