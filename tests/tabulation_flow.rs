use approx::assert_relative_eq;
use corr_core::config::{BackendKind, CorrConfig};
use corr_core::core::tabulation::Placement;
use corr_core::core::types::*;
use corr_core::store::Store;
use corr_core::{CorrEngine, CorrError, ValidationError};
use tempfile::TempDir;

struct Demo {
    engine: CorrEngine,
    view: EntityId,
    entry: EntityId,
    varieties: Vec<EntityId>,
}

fn demo(engine: CorrEngine) -> Demo {
    let mut engine = engine;
    let collection = engine.create_collection("Demo").unwrap().id.unwrap();
    let varieties = vec![
        engine.add_variety(collection, "Upland", "Up", "UP").unwrap().id.unwrap(),
        engine.add_variety(collection, "Lowland", "Low", "LO").unwrap().id.unwrap(),
    ];
    let entry = engine.add_entry(collection, 1, "water").unwrap().id.unwrap();
    let view = engine.create_view(collection, "Main", varieties.clone()).unwrap().id.unwrap();
    Demo {
        engine,
        view,
        entry,
        varieties,
    }
}

fn place(proto: &Protosegment, env: &str, segments: &str) -> Placement {
    Placement {
        protosegment_id: proto.id.unwrap(),
        environment: env.to_string(),
        segments: segments.to_string(),
        position: None,
    }
}

fn tabulated_group(d: &mut Demo, name: &str, placements: &[Placement]) -> EntityId {
    let group = d.engine.create_group(d.view, d.entry, name).unwrap().id.unwrap();
    d.engine.tabulate(group, placements).unwrap();
    group
}

#[test]
fn datum_to_export_round() {
    let mut d = demo(CorrEngine::new());
    let (datum, alignments) = d.engine.add_datum(d.entry, d.varieties[0], "ab/c.d").unwrap();
    assert_eq!(datum.raw, "abcd");
    assert_eq!(alignments.len(), 1);
    assert_eq!(alignments[0].vector, "xx/x.x");
    let (_, second) = d.engine.add_datum(d.entry, d.varieties[1], "abcd").unwrap();

    let group = d.engine.create_group(d.view, d.entry, "water").unwrap().id.unwrap();
    for a in alignments.iter().chain(second.iter()) {
        d.engine.assign_alignment(a.id.unwrap(), Some(group)).unwrap();
    }
    assert_eq!(d.engine.correspondence_column(group, 0).unwrap(), "aa");
    assert_eq!(d.engine.correspondence_column(group, 2).unwrap(), "/c");
    assert_eq!(d.engine.correspondence_column(group, 4).unwrap(), "..");

    let proto = d.engine.protosegment(d.view, "STLB", "b").unwrap();
    let again = d.engine.protosegment(d.view, "STLB", "b").unwrap();
    assert_eq!(proto.id, again.id);

    let column = d.engine.correspondence_column(group, 1).unwrap();
    let citations = d.engine.tabulate(group, &[place(&proto, "V_V", &column)]).unwrap();
    assert_eq!(citations.len(), 1);

    let json = d.engine.export_view(d.view).unwrap().to_json().unwrap();
    assert!(json.contains("\"bb\""));
    assert!(json.contains("\"xx/x.x\""));
    assert!(json.contains("\"V_V\""));
}

#[test]
fn frantz_scores_follow_cluster_and_protosegment_counts() {
    let mut d = demo(CorrEngine::new());
    let p = d.engine.protosegment(d.view, "STLB", "p").unwrap();

    let a = tabulated_group(&mut d, "A", &[place(&p, "#_", "pp"), place(&p, "_#", "bb")]);
    let b = tabulated_group(&mut d, "B", &[place(&p, "#_", "pp"), place(&p, "#_", "pp")]);
    // One citation against a threshold value of two.
    let c = tabulated_group(&mut d, "C", &[place(&p, "V_V", "ff")]);

    let frantz_n = d.engine.recompute_strength(d.view).unwrap();
    assert_eq!(frantz_n, 2);

    let store = d.engine.store();
    let a: Group = store.load(a).unwrap();
    let b: Group = store.load(b).unwrap();
    let c: Group = store.load(c).unwrap();
    assert_relative_eq!(a.frantz_cluster, 0.0);
    assert_relative_eq!(a.frantz_protosegment, 1.0);
    assert_relative_eq!(b.frantz_cluster, 1.0);
    assert_relative_eq!(b.frantz_protosegment, 1.0);
    assert_eq!(a.reconstruction, "pp");
    assert!(!a.all_citations_with_residue);
    assert_eq!(c.reconstruction, "");

    let summary = d.engine.summary(d.view).unwrap();
    assert_eq!(summary.threshold_value, 2);
    let names: Vec<&str> = summary.above.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);
    assert_eq!(summary.below.len(), 1);
    assert_eq!(summary.below[0].name, "C");
}

#[test]
fn residue_only_groups_are_flagged_and_left_out_of_the_baseline() {
    let mut d = demo(CorrEngine::new());
    let p = d.engine.protosegment(d.view, "STLB", "p").unwrap();
    let unknown = d.engine.protosegment(d.view, "RES", "?").unwrap();

    tabulated_group(&mut d, "A", &[place(&p, "#_", "pp"), place(&p, "_#", "pp")]);
    let r = tabulated_group(&mut d, "R", &[place(&unknown, "#_", "hh"), place(&unknown, "_#", "xh")]);

    assert_eq!(d.engine.recompute_strength(d.view).unwrap(), 1);
    let r: Group = d.engine.store().load(r).unwrap();
    assert!(r.all_citations_with_residue);
    assert_eq!(r.reconstruction, "??");
}

#[test]
fn retabulation_unlocks_the_view_and_keeps_orders_dense() {
    let mut d = demo(CorrEngine::new());
    let p = d.engine.protosegment(d.view, "STLB", "p").unwrap();
    let a = tabulated_group(&mut d, "A", &[place(&p, "#_", "pp")]);
    let b = tabulated_group(&mut d, "B", &[place(&p, "V_V", "bb")]);
    tabulated_group(&mut d, "C", &[place(&p, "_#", "ff")]);

    let view = d.engine.edit_view(d.view).unwrap();
    view.update(|v| v.threshold = 50);
    let err = d.engine.update_view(&view).unwrap_err();
    assert!(matches!(
        err,
        CorrError::Validation(ValidationError::TabulationLocked { tabulated: 3, .. })
    ));
    assert_eq!(view.get().threshold, 100);

    let removed = d.engine.retabulate(b).unwrap();
    assert_eq!((removed.citations, removed.sets, removed.clusters), (1, 1, 1));
    let clusters: Vec<Cluster> = d
        .engine
        .store()
        .list_related(Relation::Protosegment, p.id.unwrap())
        .unwrap();
    let orders: Vec<(&str, u32)> = clusters.iter().map(|c| (c.environment.as_str(), c.order)).collect();
    assert_eq!(orders, vec![("#_", 1), ("_#", 2)]);

    d.engine.retabulate(a).unwrap();
    let clusters: Vec<Cluster> = d
        .engine
        .store()
        .list_related(Relation::Protosegment, p.id.unwrap())
        .unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!((clusters[0].environment.as_str(), clusters[0].order), ("_#", 1));
}

#[test]
fn merging_clusters_leaves_refused_sets_behind() {
    let mut d = demo(CorrEngine::new());
    let p = d.engine.protosegment(d.view, "STLB", "p").unwrap();
    tabulated_group(&mut d, "A", &[place(&p, "#_", "pp")]);
    tabulated_group(&mut d, "B", &[place(&p, "V_V", "p.")]);
    tabulated_group(&mut d, "C", &[place(&p, "V_V", "bb")]);

    let clusters: Vec<Cluster> = d
        .engine
        .store()
        .list_related(Relation::Protosegment, p.id.unwrap())
        .unwrap();
    let (into, from) = (clusters[0].id.unwrap(), clusters[1].id.unwrap());

    let merge = d.engine.merge_clusters(from, into).unwrap();
    assert_eq!(merge.moved, 1);
    assert_eq!(merge.rejected.len(), 1);
    assert!(!merge.source_removed);
    assert_eq!(d.engine.store().count_related::<CorrespondenceSet>(Relation::Cluster, into).unwrap(), 2);
    assert_eq!(d.engine.store().count_related::<CorrespondenceSet>(Relation::Cluster, from).unwrap(), 1);
}

#[test]
fn identical_set_is_absorbed_with_its_citations() {
    let mut d = demo(CorrEngine::new());
    let p = d.engine.protosegment(d.view, "STLB", "p").unwrap();
    let a = tabulated_group(&mut d, "A", &[place(&p, "#_", "pp")]);
    let b = tabulated_group(&mut d, "B", &[place(&p, "V_V", "pp")]);

    let store = d.engine.store();
    let target = store.list_related::<Citation>(Relation::Group, a).unwrap()[0].set_id;
    let moving = store.list_related::<Citation>(Relation::Group, b).unwrap()[0].set_id;
    let target_cluster = store.load::<CorrespondenceSet>(target).unwrap().cluster_id;

    assert!(d.engine.has_conformable(target_cluster, moving).unwrap());
    let outcome = d.engine.add_correspondence_set(target_cluster, moving).unwrap();
    assert!(outcome.succeeded());

    let store = d.engine.store();
    assert!(store.load::<CorrespondenceSet>(moving).is_err());
    assert_eq!(store.count_related::<Citation>(Relation::CorrespondenceSet, target).unwrap(), 2);
    assert_eq!(store.list_all::<Cluster>().unwrap().len(), 1);
}

#[test]
fn snapshot_backend_persists_between_engines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corr.bin");
    let config = CorrConfig {
        backend: BackendKind::Snapshot { path: path.clone() },
        ..CorrConfig::default()
    };

    let mut d = demo(CorrEngine::with_config(config.clone()).unwrap());
    let p = d.engine.protosegment(d.view, "STLB", "p").unwrap();
    tabulated_group(&mut d, "A", &[place(&p, "#_", "pp"), place(&p, "_#", "pp")]);
    d.engine.recompute_strength(d.view).unwrap();
    d.engine.save().unwrap();
    assert!(path.exists());

    let reopened = CorrEngine::with_config(config).unwrap();
    let groups: Vec<Group> = reopened.store().list_related(Relation::View, d.view).unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].done);
    assert_eq!(groups[0].reconstruction, "pp");
    let zones = reopened.store().list_all::<Zone>().unwrap();
    assert_eq!(zones.len(), d.engine.store().list_all::<Zone>().unwrap().len());
}

#[test]
fn unreadable_snapshot_falls_back_to_an_empty_engine() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corr.bin");
    std::fs::write(&path, b"not a snapshot").unwrap();

    let engine = CorrEngine::from_file_or_new(path.to_str().unwrap());
    assert!(engine.store().list_all::<WordCollection>().unwrap().is_empty());
    assert!(!engine.store().list_all::<Zone>().unwrap().is_empty());
    assert_eq!(engine.config().backend, BackendKind::InMemory);
}

#[test]
fn saving_after_fallback_leaves_the_unreadable_file_alone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corr.bin");
    std::fs::write(&path, b"not a snapshot").unwrap();

    let mut engine = CorrEngine::from_file_or_new(path.to_str().unwrap());
    engine.create_collection("Scratch").unwrap();
    engine.save().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"not a snapshot");
}

#[test]
fn unreadable_snapshot_is_an_error_when_opened_from_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corr.bin");
    std::fs::write(&path, b"not a snapshot").unwrap();
    let config = CorrConfig {
        backend: BackendKind::Snapshot { path },
        ..CorrConfig::default()
    };
    let err = CorrEngine::with_config(config).err().unwrap();
    assert!(matches!(err, CorrError::Persistence { .. }));
}

#[test]
fn configured_threshold_applies_to_new_views() {
    let mut config = CorrConfig::default();
    config.tabulation.default_threshold = 50;
    let d = demo(CorrEngine::with_config(config).unwrap());
    assert_eq!(d.engine.store().load::<View>(d.view).unwrap().threshold, 50);
    assert_eq!(d.engine.summary(d.view).unwrap().threshold_value, 1);
}
