mod common;

use camino::Utf8Path;
use common::{project_with_models, utf8, write};
use qgenlink::mapping::{MappingArtifact, MappingIndex, SourceLocation};
use qgenlink::{BlockId, MemoryConsole};
use std::collections::BTreeSet;
use tempfile::tempdir;

const CTRL_MAPPING: &str = r#"{
  "ctrl.adb": {
    "ctrl/Gain1": { "lines": [12, 13], "symbol": ["gain1_out"] },
    "ctrl/Sub/Sum": { "lines": [13, 20], "symbol": [] }
  },
  "ctrl.ads": {
    "ctrl/Gain1": { "lines": [4], "symbol": ["k"] }
  }
}"#;

const NAV_MAPPING: &str = r#"{
  "nav.adb": {
    "nav/Integrator": { "line": [7] }
  }
}"#;

fn assert_inverse(index: &MappingIndex) {
    for (block, locations) in index.blocks() {
        for loc in locations {
            assert!(
                index.get_blocks(&loc.file, loc.line).contains(block),
                "{block} missing from lines[{loc}]"
            );
        }
    }
    for (loc, blocks) in index.lines() {
        for block in blocks {
            assert!(
                index.get_breakpoints(block.as_str()).contains(loc),
                "{loc} missing from blocks[{block}]"
            );
        }
    }
}

#[test]
fn load_builds_both_directions() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    let project = project_with_models(&root, &["ctrl.mdl"]);
    write(&root.join("generated/ctrl.mdl.json"), CTRL_MAPPING);
    let model = root.join("src/ctrl.mdl");
    let console = MemoryConsole::new();

    let mut index = MappingIndex::new();
    assert!(index.load(&project, &model, &console));
    assert!(console.is_empty());

    let adb = root.join("generated/ctrl.adb");
    let ads = root.join("generated/ctrl.ads");
    let gain: BTreeSet<SourceLocation> = [
        SourceLocation::new(adb.clone(), 12),
        SourceLocation::new(adb.clone(), 13),
        SourceLocation::new(ads.clone(), 4),
    ]
    .into_iter()
    .collect();
    assert_eq!(index.get_breakpoints("ctrl/Gain1"), gain);

    let at_13 = index.get_blocks(&adb, 13);
    assert_eq!(
        at_13,
        [BlockId::from("ctrl/Gain1"), BlockId::from("ctrl/Sub/Sum")]
            .into_iter()
            .collect()
    );
    assert_eq!(index.get_model_file(&adb), Some(model.as_path()));
    assert_eq!(index.get_model_file(&ads), Some(model.as_path()));
    assert_eq!(
        index.get_symbols("ctrl/Gain1"),
        ["gain1_out".to_string(), "k".to_string()].into_iter().collect()
    );
    assert_inverse(&index);
}

#[test]
fn unknown_queries_are_empty() {
    let mut index = MappingIndex::new();
    let artifact: MappingArtifact = serde_json::from_str(CTRL_MAPPING).unwrap();
    index.merge(Utf8Path::new("ctrl.mdl"), &artifact, Utf8Path::new("/gen"));

    assert!(index.get_breakpoints("ctrl/Nope").is_empty());
    // No interpolation to neighbouring lines.
    assert!(index.get_blocks(Utf8Path::new("/gen/ctrl.adb"), 14).is_empty());
    assert!(index.get_blocks(Utf8Path::new("/elsewhere/ctrl.adb"), 12).is_empty());
    assert_eq!(index.get_model_file(Utf8Path::new("/gen/other.adb")), None);
}

#[test]
fn loading_twice_is_idempotent() {
    let artifact: MappingArtifact = serde_json::from_str(CTRL_MAPPING).unwrap();
    let mut once = MappingIndex::new();
    once.merge(Utf8Path::new("ctrl.mdl"), &artifact, Utf8Path::new("/gen"));
    let mut twice = once.clone();
    twice.merge(Utf8Path::new("ctrl.mdl"), &artifact, Utf8Path::new("/gen"));
    assert_eq!(once, twice);
}

#[test]
fn loading_two_models_accumulates() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    let project = project_with_models(&root, &["ctrl.mdl", "nav.mdl"]);
    write(&root.join("generated/ctrl.mdl.json"), CTRL_MAPPING);
    write(&root.join("generated/nav.mdl.json"), NAV_MAPPING);
    let console = MemoryConsole::new();

    let mut index = MappingIndex::new();
    assert!(index.load(&project, &root.join("src/ctrl.mdl"), &console));
    assert!(index.load(&project, &root.join("src/nav.mdl"), &console));

    let nav_adb = root.join("generated/nav.adb");
    assert_eq!(
        index.get_blocks(&nav_adb, 7),
        [BlockId::from("nav/Integrator")].into_iter().collect()
    );
    assert_eq!(index.get_breakpoints("ctrl/Gain1").len(), 3);
    assert_eq!(
        index.get_model_file(&nav_adb),
        Some(root.join("src/nav.mdl").as_path())
    );
    // No cross-contamination between the two models.
    assert!(
        index
            .get_breakpoints("nav/Integrator")
            .iter()
            .all(|loc| loc.file == nav_adb)
    );
    assert_inverse(&index);
}

#[test]
fn missing_artifact_is_reported_and_ignored() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    let project = project_with_models(&root, &["ctrl.mdl"]);
    let console = MemoryConsole::new();

    let mut index = MappingIndex::new();
    assert!(!index.load(&project, &root.join("src/ctrl.mdl"), &console));
    assert!(index.is_empty());
    assert!(console.contains("not found"));
    assert!(console.errors().is_empty());
}

#[test]
fn malformed_artifact_leaves_index_unchanged() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    let project = project_with_models(&root, &["ctrl.mdl", "nav.mdl"]);
    write(&root.join("generated/ctrl.mdl.json"), CTRL_MAPPING);
    write(&root.join("generated/nav.mdl.json"), "{ \"nav.adb\": [1, 2");
    let console = MemoryConsole::new();

    let mut index = MappingIndex::new();
    index.load(&project, &root.join("src/ctrl.mdl"), &console);
    let before = index.clone();
    assert!(!index.load(&project, &root.join("src/nav.mdl"), &console));
    assert_eq!(index, before);
    assert_eq!(console.errors().len(), 1);
    assert!(console.errors()[0].contains("Invalid json"));
}

#[test]
fn parent_components_in_artifact_keys_are_resolved() {
    let artifact: MappingArtifact =
        serde_json::from_str(r#"{ "../generated/./ctrl.adb": { "ctrl/Gain1": { "lines": [3] } } }"#)
            .unwrap();
    let mut index = MappingIndex::new();
    index.merge(
        Utf8Path::new("/p/src/ctrl.mdl"),
        &artifact,
        Utf8Path::new("/p/generated"),
    );

    let adb = Utf8Path::new("/p/generated/ctrl.adb");
    assert_eq!(
        index.get_blocks(adb, 3),
        [BlockId::from("ctrl/Gain1")].into_iter().collect()
    );
    assert_eq!(index.get_model_file(adb), Some(Utf8Path::new("/p/src/ctrl.mdl")));
    assert_eq!(
        index.get_breakpoints("ctrl/Gain1"),
        [SourceLocation::new(adb, 3)].into_iter().collect()
    );
    // Queries are normalized the same way.
    assert_eq!(
        index.get_blocks(Utf8Path::new("/p/src/../generated/ctrl.adb"), 3).len(),
        1
    );
}
