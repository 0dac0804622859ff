//! Structured records for interchange.
//!
//! Every entity renders as a fragment: a tag, ordered string attributes and
//! child fragments. The shape follows the legacy interchange files, including
//! the 1-based metathesis attributes where 0 means none.

use crate::core::types::*;
use crate::error::{CorrError, CorrResult, ValidationError};
use crate::store::Store;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFragment {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocumentFragment>,
}

impl DocumentFragment {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: impl ToString) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn push(&mut self, child: DocumentFragment) {
        self.children.push(child);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DocumentFragment> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn to_json(&self) -> CorrResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CorrError::persistence("rendering fragment", e))
    }

    pub fn from_json(text: &str) -> CorrResult<Self> {
        serde_json::from_str(text).map_err(|e| CorrError::persistence("reading fragment", e))
    }

    /// Like `parsed`, but an absent attribute is `None` rather than an error.
    fn optional<T: std::str::FromStr>(&self, name: &str) -> CorrResult<Option<T>> {
        match self.get(name) {
            Some(_) => self.parsed(name).map(Some),
            None => Ok(None),
        }
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> CorrResult<T> {
        let raw = self
            .get(name)
            .ok_or_else(|| ValidationError::Other(format!("<{}> lacks attribute '{name}'", self.tag)))?;
        raw.parse()
            .map_err(|_| ValidationError::Other(format!("<{}> attribute '{name}' is not valid: {raw}", self.tag)).into())
    }
}

pub trait ToFragment {
    fn to_fragment(&self) -> DocumentFragment;
}

fn with_id(tag: &str, id: Option<EntityId>) -> DocumentFragment {
    let fragment = DocumentFragment::new(tag);
    match id {
        Some(id) => fragment.attr("id", id),
        None => fragment,
    }
}

impl ToFragment for WordCollection {
    fn to_fragment(&self) -> DocumentFragment {
        with_id("collection", self.id)
            .attr("name", &self.name)
            .attr("remarks", &self.remarks)
    }
}

impl ToFragment for Variety {
    fn to_fragment(&self) -> DocumentFragment {
        with_id("variety", self.id)
            .attr("name", &self.name)
            .attr("short-name", &self.short_name)
            .attr("abbreviation", &self.abbreviation)
            .attr("remarks", &self.remarks)
    }
}

impl ToFragment for Entry {
    fn to_fragment(&self) -> DocumentFragment {
        with_id("entry", self.id)
            .attr("number", self.number)
            .attr("gloss", &self.gloss)
    }
}

impl ToFragment for Datum {
    fn to_fragment(&self) -> DocumentFragment {
        with_id("datum", self.id)
            .attr("entry", self.entry_id)
            .attr("variety", self.variety_id)
            .attr("datum", &self.raw)
            .attr("special-semantics", &self.special_semantics)
            .attr("remarks", &self.remarks)
    }
}

impl ToFragment for Alignment {
    fn to_fragment(&self) -> DocumentFragment {
        let (m1, l1, m2, l2) = self.metathesis.map(Metathesis::to_legacy).unwrap_or((0, 0, 0, 0));
        let fragment = with_id("alignment", self.id)
            .attr("datum", self.datum_id)
            .attr("vector", &self.vector)
            .attr("metathesis1", m1)
            .attr("length1", l1)
            .attr("metathesis2", m2)
            .attr("length2", l2);
        match self.group_id {
            Some(g) => fragment.attr("group", g),
            None => fragment,
        }
    }
}

impl Alignment {
    /// Reads an alignment fragment back, for a view supplied by the caller.
    pub fn from_fragment(fragment: &DocumentFragment, view_id: EntityId) -> CorrResult<Self> {
        let legacy = |name: &str| fragment.optional::<i32>(name).map(|v| v.unwrap_or(0));
        Ok(Self {
            id: None,
            view_id,
            datum_id: fragment.parsed("datum")?,
            vector: fragment.get("vector").unwrap_or_default().to_string(),
            group_id: fragment.optional("group")?,
            metathesis: Metathesis::from_legacy(
                legacy("metathesis1")?,
                legacy("length1")?,
                legacy("metathesis2")?,
                legacy("length2")?,
            ),
        })
    }
}

impl ToFragment for View {
    fn to_fragment(&self) -> DocumentFragment {
        let members: Vec<String> = self.members.iter().map(|m| m.to_string()).collect();
        with_id("view", self.id)
            .attr("name", &self.name)
            .attr("threshold", self.threshold)
            .attr("members", members.join(" "))
            .attr("remarks", &self.remarks)
    }
}

impl ToFragment for Group {
    fn to_fragment(&self) -> DocumentFragment {
        with_id("group", self.id)
            .attr("entry", self.entry_id)
            .attr("name", &self.name)
            .attr("reconstruction", &self.reconstruction)
            .attr("frantz-cluster", self.frantz_cluster)
            .attr("frantz-protosegment", self.frantz_protosegment)
            .attr("all-citations-with-residue", self.all_citations_with_residue)
            .attr("done", self.done)
            .attr("remarks", &self.remarks)
    }
}

impl ToFragment for Zone {
    fn to_fragment(&self) -> DocumentFragment {
        let zone_type = match self.zone_type {
            ZoneType::Consonant => "consonant",
            ZoneType::Vowel => "vowel",
            ZoneType::Residue => "residue",
        };
        with_id("zone", self.id)
            .attr("row", self.row)
            .attr("column", self.column)
            .attr("abbreviation", &self.abbreviation)
            .attr("name", &self.name)
            .attr("type", zone_type)
    }
}

impl ToFragment for Protosegment {
    fn to_fragment(&self) -> DocumentFragment {
        with_id("protosegment", self.id)
            .attr("zone", self.zone_id)
            .attr("symbol", &self.symbol)
            .attr("remarks", &self.remarks)
    }
}

impl ToFragment for Cluster {
    fn to_fragment(&self) -> DocumentFragment {
        with_id("cluster", self.id)
            .attr("environment", &self.environment)
            .attr("order", self.order)
            .attr("remarks", &self.remarks)
    }
}

impl ToFragment for CorrespondenceSet {
    fn to_fragment(&self) -> DocumentFragment {
        with_id("correspondence-set", self.id)
            .attr("set", self.segments())
            .attr("order", self.order)
            .attr("remarks", &self.remarks)
    }
}

impl ToFragment for Citation {
    fn to_fragment(&self) -> DocumentFragment {
        let fragment = with_id("citation", self.id)
            .attr("group", self.group_id)
            .attr("set", self.set_id);
        match self.position {
            Some(p) => fragment.attr("position", p),
            None => fragment,
        }
    }
}

/// The whole tree of one view: groups with their alignments, then
/// protosegments with clusters, sets and citations.
pub fn export_view<S: Store>(store: &S, view_id: EntityId) -> CorrResult<DocumentFragment> {
    let view: View = store.load(view_id)?;
    let mut root = view.to_fragment();

    for group in store.list_related::<Group>(Relation::View, view_id)? {
        let mut node = group.to_fragment();
        for alignment in store.list_related::<Alignment>(Relation::Group, group.id.unwrap_or_default())? {
            node.push(alignment.to_fragment());
        }
        root.push(node);
    }

    let mut unassigned = DocumentFragment::new("unassigned");
    for alignment in store.list_related::<Alignment>(Relation::View, view_id)? {
        if alignment.group_id.is_none() {
            unassigned.push(alignment.to_fragment());
        }
    }
    if !unassigned.children.is_empty() {
        root.push(unassigned);
    }

    for proto in store.list_related::<Protosegment>(Relation::View, view_id)? {
        let mut proto_node = proto.to_fragment();
        for cluster in store.list_related::<Cluster>(Relation::Protosegment, proto.id.unwrap_or_default())? {
            let mut cluster_node = cluster.to_fragment();
            for set in store.list_related::<CorrespondenceSet>(Relation::Cluster, cluster.id.unwrap_or_default())? {
                let mut set_node = set.to_fragment();
                for citation in
                    store.list_related::<Citation>(Relation::CorrespondenceSet, set.id.unwrap_or_default())?
                {
                    set_node.push(citation.to_fragment());
                }
                cluster_node.push(set_node);
            }
            proto_node.push(cluster_node);
        }
        root.push(proto_node);
    }
    Ok(root)
}
