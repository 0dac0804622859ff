use corr_core::config::{BackendKind, CorrConfig};
use corr_core::core::tabulation::Placement;
use corr_core::core::types::{Alignment, Datum, Entry, EntityId, Relation, Variety};
use corr_core::store::Store;
use corr_core::{CorrEngine, CorrError, CorrResult};
use crossterm::style::Stylize;
use crossterm::{cursor::MoveTo, execute, terminal::Clear, terminal::ClearType};
use std::io::{stdin, stdout, Write};
use tracing_subscriber::EnvFilter;

const SNAPSHOT_PATH: &str = "wordcorr.bin";

/// What the console is currently pointed at.
#[derive(Default)]
struct Session {
    collection: Option<EntityId>,
    view: Option<EntityId>,
    last: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut engine = match load_config().and_then(CorrEngine::with_config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("[ERROR] Could not start: {}", e);
            std::process::exit(1);
        }
    };
    let mut session = Session::default();
    if let Ok(collections) = engine.store().list_all::<corr_core::core::types::WordCollection>() {
        session.collection = collections.first().and_then(|c| c.id);
    }

    loop {
        print_ui(&session, &engine);

        let mut input = String::new();
        match stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.first() == Some(&"exit") {
            break;
        }
        session.last = match run(&mut engine, &mut session, &parts) {
            Ok(message) => message,
            Err(e) if e.is_validation() => format!("{}", e.to_string().yellow()),
            Err(e) => format!("{}", e.to_string().red()),
        };
    }

    let BackendKind::Snapshot { path } = &engine.config().backend else {
        return;
    };
    println!("\nSaving...");
    if let Err(e) = engine.save() {
        eprintln!("[ERROR] Could not save: {}", e);
    } else {
        println!("Saved to '{}'", path.display());
    }
}

/// `WORDCORR_CONFIG` names a TOML file; without it the console keeps its
/// snapshot next to the working directory. Environment overrides apply last.
fn load_config() -> CorrResult<CorrConfig> {
    let config = match std::env::var("WORDCORR_CONFIG") {
        Ok(file) => CorrConfig::from_file(file)?,
        Err(_) => CorrConfig {
            backend: BackendKind::Snapshot {
                path: SNAPSHOT_PATH.into(),
            },
            ..CorrConfig::default()
        },
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn run(engine: &mut CorrEngine, session: &mut Session, parts: &[&str]) -> CorrResult<String> {
    match parts {
        [] => Ok(String::new()),
        ["collection", name @ ..] => {
            let c = engine.create_collection(&name.join(" "))?;
            session.collection = c.id;
            session.view = None;
            Ok(format!("collection {} created", c.id.unwrap_or_default()))
        }
        ["variety", name, short, abbr] => {
            let v = engine.add_variety(current(session.collection)?, name, short, abbr)?;
            Ok(format!("variety {} added", v.name))
        }
        ["entry", number, gloss @ ..] => {
            let number = number.parse().map_err(|_| bad("entry number"))?;
            let e = engine.add_entry(current(session.collection)?, number, &gloss.join(" "))?;
            Ok(format!("entry {} '{}' added", e.number, e.gloss))
        }
        ["datum", number, abbr, text] => {
            let entry = find_entry(engine, session, number)?;
            let variety = find_variety(engine, session, abbr)?;
            let (d, alignments) = engine.add_datum(entry, variety, text)?;
            Ok(format!("datum '{}' added with {} alignment(s)", d.raw, alignments.len()))
        }
        ["view", name @ ..] => {
            let collection = current(session.collection)?;
            let members: Vec<EntityId> = engine
                .store()
                .list_related::<Variety>(Relation::Collection, collection)?
                .into_iter()
                .filter_map(|v| v.id)
                .collect();
            let v = engine.create_view(collection, &name.join(" "), members)?;
            session.view = v.id;
            Ok(format!("view '{}' created", v.name))
        }
        ["group", number, name, abbrs @ ..] if !abbrs.is_empty() => {
            let view = current(session.view)?;
            let entry = find_entry(engine, session, number)?;
            let group = engine.create_group(view, entry, name)?;
            let group_id = group.id.unwrap_or_default();
            for abbr in abbrs {
                let variety = find_variety(engine, session, abbr)?;
                let alignment = alignment_for(engine, view, entry, variety)?;
                engine.assign_alignment(alignment, Some(group_id))?;
            }
            Ok(format!("group {} '{}' has {} member(s)", group_id, name, abbrs.len()))
        }
        ["column", group, column] => {
            let group: EntityId = group.parse().map_err(|_| bad("group id"))?;
            let column: usize = column.parse().map_err(|_| bad("column"))?;
            Ok(format!("column {}: {}", column, engine.correspondence_column(group, column)?))
        }
        ["tab", group, zone, symbol, env, column] => {
            let view = current(session.view)?;
            let group: EntityId = group.parse().map_err(|_| bad("group id"))?;
            let column: usize = column.parse().map_err(|_| bad("column"))?;
            let proto = engine.protosegment(view, zone, symbol)?;
            let segments = engine.correspondence_column(group, column)?;
            let placement = Placement {
                protosegment_id: proto.id.unwrap_or_default(),
                environment: env.to_string(),
                segments: segments.clone(),
                position: Some(column as u32),
            };
            engine.tabulate(group, &[placement])?;
            Ok(format!("group {} tabulated under *{} as {}", group, proto.symbol, segments))
        }
        ["retab", group] => {
            let group = group.parse().map_err(|_| bad("group id"))?;
            let removed = engine.retabulate(group)?;
            Ok(format!(
                "removed {} citation(s), {} set(s), {} cluster(s)",
                removed.citations, removed.sets, removed.clusters
            ))
        }
        ["merge", from, into] => {
            let from = from.parse().map_err(|_| bad("cluster id"))?;
            let into = into.parse().map_err(|_| bad("cluster id"))?;
            let merge = engine.merge_clusters(from, into)?;
            Ok(format!(
                "merged {}, moved {}, refused {}",
                merge.merged,
                merge.moved,
                merge.rejected.len()
            ))
        }
        ["strength"] => {
            let view = current(session.view)?;
            let n = engine.recompute_strength(view)?;
            let summary = engine.summary(view)?;
            let mut out = format!("{} group(s) in baseline, threshold {}\n", n, summary.threshold_value);
            for row in &summary.above {
                out.push_str(&format!(
                    "  {:>4} {:<6} *{:<8} cluster {:>6.3}  proto {:>6.3}{}\n",
                    row.group_id,
                    row.name,
                    row.reconstruction,
                    row.frantz_cluster,
                    row.frantz_protosegment,
                    if row.all_citations_with_residue { "  (residue)" } else { "" }
                ));
            }
            if !summary.below.is_empty() {
                out.push_str(&format!("  {} group(s) below threshold", summary.below.len()));
            }
            Ok(out)
        }
        ["export"] => engine.export_view(current(session.view)?)?.to_json(),
        _ => Err(bad(
            "command: collection|variety|entry|datum|view|group|column|tab|retab|merge|strength|export|exit",
        )),
    }
}

fn bad(what: &str) -> CorrError {
    CorrError::Validation(corr_core::ValidationError::Other(format!("invalid {what}")))
}

fn current(id: Option<EntityId>) -> CorrResult<EntityId> {
    id.ok_or_else(|| bad("selection: create a collection and view first"))
}

fn find_entry(engine: &CorrEngine, session: &Session, number: &str) -> CorrResult<EntityId> {
    let number: u32 = number.parse().map_err(|_| bad("entry number"))?;
    engine
        .store()
        .list_related::<Entry>(Relation::Collection, current(session.collection)?)?
        .into_iter()
        .find(|e| e.number == number)
        .and_then(|e| e.id)
        .ok_or_else(|| bad("entry number"))
}

fn find_variety(engine: &CorrEngine, session: &Session, abbr: &str) -> CorrResult<EntityId> {
    engine
        .store()
        .list_related::<Variety>(Relation::Collection, current(session.collection)?)?
        .into_iter()
        .find(|v| v.abbreviation == abbr)
        .and_then(|v| v.id)
        .ok_or_else(|| bad("variety abbreviation"))
}

fn alignment_for(engine: &CorrEngine, view: EntityId, entry: EntityId, variety: EntityId) -> CorrResult<EntityId> {
    let store = engine.store();
    for datum in store.list_related::<Datum>(Relation::Entry, entry)? {
        if datum.variety_id != variety {
            continue;
        }
        let alignments: Vec<Alignment> = store.list_related(Relation::Datum, datum.id.unwrap_or_default())?;
        if let Some(id) = alignments.into_iter().find(|a| a.view_id == view).and_then(|a| a.id) {
            return Ok(id);
        }
    }
    Err(bad("variety: no datum for that entry"))
}

fn print_ui(session: &Session, engine: &CorrEngine) {
    let mut out = stdout();
    let _ = execute!(out, Clear(ClearType::All), MoveTo(0, 0));
    println!("{}", "WordCorr tabulation console".bold());
    println!("---------------------------------------------------------------");
    println!("collection <name> | variety <name> <short> <abbr> | entry <n> <gloss>");
    println!("datum <n> <abbr> <text> | view <name> | group <n> <name> <abbr>...");
    println!("column <group> <i> | tab <group> <zone> <symbol> <env> <i> | retab <group>");
    println!("merge <from> <into> | strength | export | exit\n");

    let view_name = session
        .view
        .and_then(|id| engine.store().load::<corr_core::core::types::View>(id).ok())
        .map(|v| v.name)
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Collection: {}   View: {}",
        session.collection.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
        view_name.green()
    );

    if !session.last.is_empty() {
        println!("\n{}", session.last);
    }
    print!("\n> ");
    let _ = out.flush();
}
