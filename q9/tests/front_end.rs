// q9/tests/front_end.rs
//
// Integration tests for the q9 front-end.
//
// Tests cover:
// - Config file → dataset → cached lookup through `app::open_lookup`
// - Keys and console lines handled strictly in arrival order
// - Console mode toggles reaching the engine
// - Rendering driven by the dispatch loop

use pretty_assertions::assert_eq;
use q9::capture::{Input, KeyEvent};
use q9::{dispatch, render, AppConfig};
use q9_core::{DatasetWriter, ImeEngine, KeyMap, Platform, RecordingInjector, SourceTables};
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("q9_front_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Build a dataset and a config file pointing at it.
fn setup(name: &str) -> (PathBuf, AppConfig) {
    let dir = scratch_dir(name);
    std::fs::write(dir.join("codes.tsv"), "111\t一二三\n120\t馬木\n1\t「」『』\n").unwrap();
    std::fs::write(dir.join("related.tsv"), "木\t林 森\n").unwrap();
    std::fs::write(dir.join("simplified.tsv"), "馬\t马\n").unwrap();
    let tables = SourceTables::read_dir(&dir).unwrap();
    let db = dir.join("q9.redb");
    DatasetWriter::create(&db)
        .unwrap()
        .write(&tables.to_table_lookup())
        .unwrap();

    let config_path = dir.join("q9.toml");
    std::fs::write(
        &config_path,
        format!(
            "dataset_path = {:?}\nlookup_cache_size = 8\ndry_run = true\n",
            db.display().to_string()
        ),
    )
    .unwrap();
    let config = AppConfig::load_or_default(&config_path).unwrap();
    (dir, config)
}

fn engine(config: &AppConfig, rec: &RecordingInjector) -> ImeEngine {
    let lookup = q9::app::open_lookup(&config.base).unwrap();
    let mut engine = ImeEngine::new(
        lookup,
        Box::new(rec.clone()),
        KeyMap::new(Platform::Linux).unwrap(),
        &config.base,
    );
    engine.set_global_input(true);
    engine
}

#[test]
fn config_points_at_cached_dataset() {
    let (dir, config) = setup("config");
    assert!(config.dry_run);
    assert_eq!(config.base.lookup_cache_size, 8);
    let lookup = q9::app::open_lookup(&config.base).unwrap();
    assert_eq!(lookup.candidates_for_code(120), vec!["馬", "木"]);
    assert_eq!(lookup.related_for("木"), vec!["林", "森"]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn keys_and_lines_are_processed_in_arrival_order() {
    let (dir, config) = setup("order");
    let rec = RecordingInjector::new();
    let mut engine = engine(&config, &rec);
    let (tx, rx) = crossbeam_channel::unbounded();

    // KP1 KP2 from capture, "0" from the console, KP2 picks 木
    tx.send(Input::Key(KeyEvent::down(79))).unwrap();
    tx.send(Input::Key(KeyEvent::down(80))).unwrap();
    tx.send(Input::Line("0".into())).unwrap();
    tx.send(Input::Key(KeyEvent::down(80))).unwrap();
    // relate from the console, pick 森 with KP2
    tx.send(Input::Line("+".into())).unwrap();
    tx.send(Input::Key(KeyEvent::down(80))).unwrap();
    tx.send(Input::Line(":q".into())).unwrap();
    tx.send(Input::Key(KeyEvent::down(79))).unwrap();

    let mut frames = Vec::new();
    let summary = dispatch::run(&mut engine, &rx, true, |ctx| frames.push(render::render(ctx)));
    assert_eq!(rec.typed(), "木森");
    assert_eq!(summary.keys_handled, 4);
    assert_eq!(summary.lines, 3);
    assert_eq!(frames.len(), 6);
    // the key after :q was never processed
    assert_eq!(engine.session().code(), "");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn console_toggles_modes() {
    let (dir, config) = setup("toggles");
    let rec = RecordingInjector::new();
    let mut engine = engine(&config, &rec);

    assert!(q9::console::apply_line(&mut engine, ":s"));
    assert!(engine.context().status_text.contains("簡體"));
    assert!(q9::console::apply_line(&mut engine, "1201"));
    assert_eq!(rec.typed(), "马");

    assert!(q9::console::apply_line(&mut engine, ":n"));
    assert!(engine.context().status_text.starts_with("輸入:字母鍵盤"));
    // X X X then C under the letter scheme
    assert!(q9::console::apply_line(&mut engine, "xxxc"));
    assert_eq!(rec.typed(), "马二");

    assert!(q9::console::apply_line(&mut engine, ":v"));
    assert_eq!(render::render(engine.context()), None);
    assert!(!q9::console::apply_line(&mut engine, ":q"));
    let _ = std::fs::remove_dir_all(&dir);
}
