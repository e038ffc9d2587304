//! Integration tests: diagram → JSON → diagram round-trips and the atomic
//! save contract.

use bsm_core::model::*;
use bsm_core::persist::{self, DiagramData, PersistError};
use pretty_assertions::assert_eq;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A small machine exercising every field kind: flags, colors, behavior
/// text, curved and self-loop transitions, a comment.
fn sample_diagram() -> Diagram {
    let mut d = Diagram::new();

    let mut idle = State::new("Idle", 40.0, 40.0);
    idle.is_initial = true;
    idle.entry_action = "reset_counters()".into();
    idle.description = "waiting for a start signal".into();
    let idle = d.add_state(idle).unwrap();

    let mut running = State::new("Running", 320.0, 40.0);
    running.color = Color::rgb(0xFF, 0xCC, 0x80);
    running.during_action = "tick()".into();
    let running = d.add_state(running).unwrap();

    let mut done = State::new("Done", 320.0, 240.0);
    done.is_final = true;
    done.exit_action = "report()".into();
    let done = d.add_state(done).unwrap();

    d.add_transition(Transition::new(idle, running).with_event("start"))
        .unwrap();

    let mut finish = Transition::new(running, done).with_event("finish");
    finish.condition = "ticks > 10".into();
    finish.action = "ticks = 0".into();
    finish.control_offset_x = 40.0;
    finish.control_offset_y = -12.5;
    d.add_transition(finish).unwrap();

    d.add_transition(Transition::new(running, running).with_event("tick"))
        .unwrap();

    d.add_comment(Comment::new("main loop", 60.0, 220.0));
    d
}

#[test]
fn data_load_data_roundtrip() {
    init_logging();
    let d = sample_diagram();
    let data = d.data();

    let mut reloaded = Diagram::new();
    reloaded.load_data(&data);
    assert_eq!(reloaded.data(), data);
}

#[test]
fn json_roundtrip_is_byte_stable() {
    init_logging();
    let data = sample_diagram().data();
    let json = persist::to_json(&data);
    let parsed = persist::from_json(&json).expect("own output must parse");
    assert_eq!(parsed, data);
    assert_eq!(persist::to_json(&parsed), json, "save → load → save drifts");
}

#[test]
fn orphaned_transitions_are_excluded_from_snapshots() {
    init_logging();
    let mut d = sample_diagram();
    // Remove "Running" directly, without cascading — all three transitions
    // touch it and become orphans.
    let running = d.state_by_name("Running").unwrap();
    d.remove(running);

    let data = d.data();
    assert_eq!(data.states.len(), 2);
    assert!(data.transitions.is_empty());
    assert_eq!(data.comments.len(), 1);
}

#[test]
fn save_and_load_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machine.bsm");

    let data = sample_diagram().data();
    persist::save_file(&path, &data).unwrap();
    assert!(path.exists());
    assert!(
        !dir.path().join("machine.bsm.tmp").exists(),
        "temp file must not survive a successful save"
    );
    assert_eq!(persist::load_file(&path).unwrap(), data);
}

#[test]
fn failed_save_preserves_previous_content() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machine.bsm");

    let first = sample_diagram().data();
    persist::save_file(&path, &first).unwrap();

    // Block the sibling temp file with a directory so the write fails.
    std::fs::create_dir(dir.path().join("machine.bsm.tmp")).unwrap();
    let second = DiagramData::default();
    let err = persist::save_file(&path, &second);
    assert!(matches!(err, Err(PersistError::Write { .. })));

    assert_eq!(
        persist::load_file(&path).unwrap(),
        first,
        "the previous document must survive a failed save"
    );
}

#[test]
fn load_file_reports_missing_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let err = persist::load_file(&dir.path().join("nope.bsm"));
    assert!(matches!(err, Err(PersistError::Read { .. })));
}

#[test]
fn load_file_rejects_invalid_documents() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.bsm");

    std::fs::write(&path, "{ definitely not json").unwrap();
    assert!(matches!(
        persist::load_file(&path),
        Err(PersistError::Malformed(_))
    ));

    std::fs::write(&path, r#"{"states": []}"#).unwrap();
    assert!(matches!(
        persist::load_file(&path),
        Err(PersistError::MissingKey("transitions"))
    ));
}
