//! `.bsm` document persistence.
//!
//! A diagram document is one JSON object with `states`, `transitions`, and
//! `comments` arrays of flat snapshots. Files are UTF-8 (non-ASCII text
//! passes through unescaped) and pretty-printed with a 4-space indent, so
//! documents diff cleanly under version control. Saves go through a sibling
//! temp file plus a rename: the previous document survives any mid-write
//! failure.
//!
//! This layer is purely structural. Semantic validation — name uniqueness,
//! endpoint resolution — happens when the snapshot is loaded into a
//! [`Diagram`](crate::model::Diagram).

use crate::model::{Comment, State, TransitionData};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extension for diagram documents (without the dot).
pub const FILE_EXTENSION: &str = "bsm";

/// Structural failures while reading or writing a document. Callers must
/// leave the open diagram untouched on any of these — parse fully first,
/// mutate after.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("not a diagram document: expected a JSON object")]
    NotAnObject,
    #[error("not a diagram document: missing the required `{0}` key")]
    MissingKey(&'static str),
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The full graph snapshot in its persisted shape. Field order is the
/// serialization order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramData {
    pub states: Vec<State>,
    pub transitions: Vec<TransitionData>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Serialize a snapshot to the document text.
#[must_use]
pub fn to_json(data: &DiagramData) -> String {
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    // Plain structs into an in-memory buffer: serialization cannot fail.
    data.serialize(&mut ser)
        .expect("snapshot structs serialize infallibly");
    String::from_utf8(buf).expect("serde_json emits UTF-8")
}

/// Parse document text into a snapshot. The top-level `states` and
/// `transitions` keys are required; `comments` defaults to empty; unknown
/// keys are ignored so documents written by richer builds still load.
pub fn from_json(text: &str) -> Result<DiagramData, PersistError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(PersistError::NotAnObject)?;
    for key in ["states", "transitions"] {
        if !object.contains_key(key) {
            return Err(PersistError::MissingKey(key));
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Write a document atomically: the text goes to a `.tmp` sibling first and
/// is renamed over the target only once fully written, so an error here
/// never corrupts a previously saved file.
pub fn save_file(path: &Path, data: &DiagramData) -> Result<(), PersistError> {
    let json = to_json(data);

    let mut tmp_name: OsString = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, json.as_bytes()).map_err(|source| PersistError::Write {
        path: tmp.clone(),
        source,
    })?;
    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PersistError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Read and parse a document.
pub fn load_file(path: &Path) -> Result<DiagramData, PersistError> {
    let text = fs::read_to_string(path).map_err(|source| PersistError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&text)
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::STATE_DEFAULT_COLOR;

    fn one_state_data() -> DiagramData {
        DiagramData {
            states: vec![State::new("Idle", 40.0, 80.0)],
            transitions: vec![],
            comments: vec![Comment::new("hello", 10.0, 10.0)],
        }
    }

    #[test]
    fn to_json_uses_four_space_indent_and_key_order() {
        let json = to_json(&one_state_data());
        assert!(json.starts_with("{\n    \"states\""));
        let states_at = json.find("\"states\"").unwrap();
        let transitions_at = json.find("\"transitions\"").unwrap();
        let comments_at = json.find("\"comments\"").unwrap();
        assert!(states_at < transitions_at && transitions_at < comments_at);
    }

    #[test]
    fn non_ascii_text_is_not_escaped() {
        let mut data = one_state_data();
        data.states[0].description = "état d'attente".into();
        assert!(to_json(&data).contains("état d'attente"));
    }

    #[test]
    fn missing_required_keys_are_rejected() {
        assert!(matches!(
            from_json(r#"{"transitions": []}"#),
            Err(PersistError::MissingKey("states"))
        ));
        assert!(matches!(
            from_json(r#"{"states": []}"#),
            Err(PersistError::MissingKey("transitions"))
        ));
        assert!(matches!(from_json("[1, 2]"), Err(PersistError::NotAnObject)));
        assert!(matches!(
            from_json("not json at all"),
            Err(PersistError::Malformed(_))
        ));
    }

    #[test]
    fn states_without_positions_load_as_unplaced() {
        // Assistant proposals may give states no coordinates at all; the
        // merge layer lays those out, so parsing must accept them.
        let data = from_json(r#"{"states": [{"name": "Floating"}], "transitions": []}"#).unwrap();
        assert!(!data.states[0].is_placed());
    }

    #[test]
    fn comments_key_is_optional() {
        let data = from_json(r#"{"states": [], "transitions": []}"#).unwrap();
        assert!(data.comments.is_empty());
    }

    #[test]
    fn unknown_keys_from_richer_builds_are_ignored() {
        // Full-application documents carry simulator-side fields this
        // engine does not model; they must still load.
        let text = r#"
        {
            "states": [
                {"name": "Idle", "x": 0, "y": 0, "is_superstate": false,
                 "sub_fsm_data": {"states": []}, "action_language": "Python"}
            ],
            "transitions": []
        }"#;
        let data = from_json(text).unwrap();
        assert_eq!(data.states.len(), 1);
        assert_eq!(data.states[0].name, "Idle");
        assert_eq!(data.states[0].color, STATE_DEFAULT_COLOR);
    }
}
