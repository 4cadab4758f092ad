use std::sync::Arc;

use keybind_chain_core::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn document(v: Value) -> ProfileDocument {
    serde_json::from_value(v).unwrap()
}

fn normalize(v: Value) -> Profile {
    let (profile, _) = ProfileNormalizer::new()
        .normalize(&document(v))
        .into_profile()
        .unwrap();
    profile
}

#[test]
fn bare_string_keybind_becomes_a_list() {
    let p = normalize(json!({"builds": {"space": {"keys": {"F1": "FireAll"}}}}));
    assert_eq!(p.builds[SPACE]["F1"], vec!["FireAll"]);
}

#[test]
fn rich_objects_lose_their_display_metadata() {
    let p = normalize(json!({
        "builds": {"space": {"keys": {"F1": [{"command": "FireAll", "name": "Fire All"}]}}}
    }));
    assert_eq!(p.builds[SPACE]["F1"], vec!["FireAll"]);
}

#[test]
fn joined_alias_string_is_split() {
    let p = normalize(json!({"aliases": {"combo": {"commands": "A$$B$$C"}}}));
    assert_eq!(p.aliases["combo"].commands, vec!["A", "B", "C"]);
}

#[test]
fn pre_2_0_document_is_lifted_into_builds() {
    let p = normalize(json!({
        "name": "Ancient",
        "mode": "ground",
        "keys": {"G": "+forward$$+left"},
        "aliases": {"bare": "A$$B"}
    }));
    assert_eq!(p.builds["ground"]["G"], vec!["+forward", "+left"]);
    assert_eq!(p.current_environment, "ground");
    assert_eq!(p.aliases["bare"].commands, vec!["A", "B"]);
}

#[test]
fn null_alias_does_not_abort_the_rest() {
    let log = MemoryLog::new();
    let dyn_log: Arc<dyn CoreLog> = log.clone();
    let n = ProfileNormalizer::new().with_logger(&dyn_log).normalize(&document(json!({
        "builds": {"space": {"keys": {"F1": "FireAll"}}},
        "aliases": {"broken": null, "fine": {"commands": ["A$$B"]}}
    })));

    assert_eq!(n.report.malformed.len(), 1);
    assert_eq!(n.report.malformed[0].location, "aliases.broken");
    assert!(log.contains("malformed entry aliases.broken"));

    let (p, _) = n.into_profile().unwrap();
    assert_eq!(p.aliases["broken"].commands, Vec::<String>::new());
    assert_eq!(p.aliases["fine"].commands, vec!["A", "B"]);
    assert_eq!(p.builds[SPACE]["F1"], vec!["FireAll"]);
}

#[test]
fn normalizing_twice_only_differs_in_last_modified() {
    let input = document(json!({
        "builds": {
            "space": {"keys": {"F1": "A $$ B", "F2": [{"command": "C"}, "", null]}},
            "ground": {"keys": {"G": ["D"]}}
        },
        "aliases": {
            "dynFxSetFXExclusionList_Ground": {"commands": "x"},
            "sto_kb_bindset_enable_ground": {"commands": "bind_laod_file g.txt"}
        },
        "migrationVersion": "1.4"
    }));
    let normalizer = ProfileNormalizer::new();
    let once = normalizer.normalize(&input).document;
    let mut twice = normalizer.normalize(&once).document;

    assert!(!needs_normalization(&once));
    twice.last_modified = once.last_modified.clone();
    assert_eq!(twice, once);
}

#[test]
fn unknown_fields_survive_normalize_and_rewrite() {
    let p = normalize(json!({
        "builds": {"space": {"keys": {"F1": "FireAll"}, "label": "Main ship"}},
        "aliases": {"a": {"commands": "A$$B", "type": "user", "color": "red"}}
    }));
    let out = serde_json::to_value(ProfileDocument::from(p)).unwrap();
    assert_eq!(out["builds"]["space"]["label"], "Main ship");
    assert_eq!(out["aliases"]["a"]["type"], "user");
    assert_eq!(out["aliases"]["a"]["color"], "red");
    assert_eq!(out["aliases"]["a"]["commands"], json!(["A", "B"]));
}

#[test]
fn normalized_profile_round_trips_through_the_wire_format() {
    let p = normalize(json!({
        "builds": {"space": {"keys": {
            "F1": "FireAll$$say \"hi $$ there\"",
            "F2": [{"type": "tray", "parameters": {"tray": 2, "slot": 9}}]
        }}},
        "aliases": {"a": {"commands": "Target_Self", "description": "select me"}}
    }));
    let text = serialize_profile(&p).unwrap();
    assert!(text.contains("# select me\nalias a \"Target_Self\""));

    let parsed = parse_keybind_file(&text);
    assert!(parsed.errors.is_empty());
    assert_eq!(&parsed.keybinds, p.keybinds(SPACE).unwrap());
    assert_eq!(
        parsed.keybinds["F2"],
        vec!["+STOTrayExecByTray 2 9"]
    );
}

#[test]
fn load_normalized_rewrites_only_when_needed() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProfileStore::new(dir.path());
    store
        .save(
            "legacy",
            &document(json!({"builds": {"space": {"keys": {"F1": "FireAll"}}}})),
        )
        .unwrap();

    let normalizer = ProfileNormalizer::new();
    let (doc, report) = load_normalized(&store, "legacy", &normalizer).unwrap();
    assert!(report.is_some_and(|r| r.changed));
    assert!(doc.has_canonical_shapes());

    let on_disk = store.load("legacy").unwrap();
    assert_eq!(on_disk, doc);

    let (again, report) = load_normalized(&store, "legacy", &normalizer).unwrap();
    assert!(report.is_none());
    assert_eq!(again, doc);
}

#[test]
fn store_lists_saved_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProfileStore::new(dir.path().join("nested"));
    let doc = ProfileDocument::from(Profile::new("Main"));
    store.save("main", &doc).unwrap();
    store.save("alt", &doc).unwrap();
    assert_eq!(store.list().unwrap(), vec!["alt", "main"]);
    assert_eq!(
        store.load("missing"),
        Err(StoreError::NotFound("missing".into()))
    );
}
