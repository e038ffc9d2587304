//! Contracts for out-of-process collaborators.
//!
//! The export side (Simulink-style code generation) only ever consumes an
//! orphan-free [`DiagramData`] snapshot; the assistant side proposes whole
//! snapshots that get merged into the live scene through the normal add
//! operations, grouped so one undo removes the entire contribution.

use crate::scene::DiagramScene;
use bsm_core::model::{DEFAULT_STATE_HEIGHT, DEFAULT_STATE_WIDTH};
use bsm_core::persist::DiagramData;
use std::io;
use std::path::{Path, PathBuf};

/// Failures from an export backend.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("export failed: {0}")]
    Failed(String),
}

/// An external code-generation backend. It receives the snapshot and a
/// model name, owns everything downstream (script generation, subprocess
/// runs), and reports the path of the generated artifact.
pub trait DiagramExporter {
    fn export(
        &mut self,
        data: &DiagramData,
        model_name: &str,
        out_dir: &Path,
    ) -> Result<PathBuf, ExportError>;
}

/// Counts of what a merge actually added or skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub states: usize,
    pub transitions: usize,
    pub comments: usize,
    pub skipped: usize,
}

/// Where auto-layout starts for unplaced proposed states.
const MERGE_ORIGIN: (f64, f64) = (100.0, 100.0);
/// Cell advance beyond the default state size.
const MERGE_GAP: (f64, f64) = (180.0, 120.0);
const MERGE_COLUMNS: usize = 3;

impl DiagramScene {
    /// Merge a proposed snapshot into the live scene inside one macro: a
    /// single undo removes the whole contribution (including the clear,
    /// when `clear_first` is set).
    ///
    /// States whose names clash with existing ones are skipped with a
    /// warning; [unplaced] states (no position in the proposal document)
    /// fall into a left-to-right grid layout. Transitions resolve their
    /// endpoints by name against both merged and pre-existing states.
    ///
    /// [unplaced]: bsm_core::model::State::is_placed
    pub fn merge_diagram_data(&mut self, data: &DiagramData, clear_first: bool) -> MergeReport {
        let mut report = MergeReport::default();
        self.begin_macro("merge proposed diagram");

        if clear_first {
            self.select_all();
            self.delete_selection();
        }

        let mut slot = 0usize;
        for proposed in &data.states {
            let mut state = proposed.clone();
            if !state.is_placed() {
                let col = slot % MERGE_COLUMNS;
                let row = slot / MERGE_COLUMNS;
                state.x = MERGE_ORIGIN.0 + col as f64 * (DEFAULT_STATE_WIDTH + MERGE_GAP.0);
                state.y = MERGE_ORIGIN.1 + row as f64 * (DEFAULT_STATE_HEIGHT + MERGE_GAP.1);
                slot += 1;
            }
            match self.add_state(state) {
                Ok(_) => report.states += 1,
                Err(e) => {
                    log::warn!("merge: skipping state '{}': {e}", proposed.name);
                    report.skipped += 1;
                }
            }
        }

        for proposed in &data.transitions {
            let resolved = match self.diagram().resolve_transition_data(proposed) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!(
                        "merge: skipping transition '{}' -> '{}': {e}",
                        proposed.source,
                        proposed.target
                    );
                    report.skipped += 1;
                    continue;
                }
            };
            match self.add_transition(resolved) {
                Ok(_) => report.transitions += 1,
                Err(e) => {
                    log::warn!(
                        "merge: skipping transition '{}' -> '{}': {e}",
                        proposed.source,
                        proposed.target
                    );
                    report.skipped += 1;
                }
            }
        }

        for comment in &data.comments {
            self.add_comment(comment.clone());
            report.comments += 1;
        }

        self.end_macro();
        report
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bsm_core::model::{State, TransitionData};

    fn proposal(names: &[&str]) -> DiagramData {
        DiagramData {
            states: names.iter().map(|n| State::unplaced(*n)).collect(),
            transitions: vec![],
            comments: vec![],
        }
    }

    #[test]
    fn unplaced_states_fall_into_a_grid() {
        let mut scene = DiagramScene::new();
        let report = scene.merge_diagram_data(&proposal(&["A", "B", "C", "D"]), false);
        assert_eq!(report.states, 4);

        let pos = |name: &str| {
            let id = scene.state_by_name(name).unwrap();
            let s = scene.diagram().state(id).unwrap();
            (s.x, s.y)
        };
        assert_eq!(pos("A"), (100.0, 100.0));
        assert_eq!(pos("B"), (400.0, 100.0));
        assert_eq!(pos("C"), (700.0, 100.0));
        // fourth wraps to the second row
        assert_eq!(pos("D"), (100.0, 280.0));
    }

    #[test]
    fn states_placed_at_the_origin_stay_there() {
        let mut scene = DiagramScene::new();
        let mut data = proposal(&["Floating"]);
        data.states.push(State::new("AtOrigin", 0.0, 0.0));

        let report = scene.merge_diagram_data(&data, false);
        assert_eq!(report.states, 2);

        let pos = |name: &str| {
            let id = scene.state_by_name(name).unwrap();
            let s = scene.diagram().state(id).unwrap();
            (s.x, s.y)
        };
        // a deliberate origin position is a position, not a layout request
        assert_eq!(pos("AtOrigin"), (0.0, 0.0));
        assert_eq!(pos("Floating"), (100.0, 100.0));
    }

    #[test]
    fn clashing_names_are_skipped_and_counted() {
        let mut scene = DiagramScene::new();
        scene.add_state(State::new("A", 40.0, 40.0)).unwrap();

        let report = scene.merge_diagram_data(&proposal(&["A", "B"]), false);
        assert_eq!(report.states, 1);
        assert_eq!(report.skipped, 1);
        // the existing A keeps its position
        let a = scene.state_by_name("A").unwrap();
        assert_eq!(scene.diagram().state(a).unwrap().x, 40.0);
    }

    #[test]
    fn merged_transitions_may_reference_existing_states() {
        let mut scene = DiagramScene::new();
        scene.add_state(State::new("Existing", 40.0, 40.0)).unwrap();

        let mut data = proposal(&["New"]);
        data.transitions.push(TransitionData {
            source: "Existing".into(),
            target: "New".into(),
            event: "link".into(),
            condition: String::new(),
            action: String::new(),
            color: bsm_core::model::TRANSITION_DEFAULT_COLOR,
            description: String::new(),
            control_offset_x: 0.0,
            control_offset_y: 0.0,
        });

        let report = scene.merge_diagram_data(&data, false);
        assert_eq!(report.transitions, 1);
        assert_eq!(scene.diagram().transition_count(), 1);
    }

    #[test]
    fn clear_first_replaces_the_scene_in_one_step() {
        let mut scene = DiagramScene::new();
        scene.add_state(State::new("Old", 10.0, 10.0)).unwrap();

        scene.merge_diagram_data(&proposal(&["New"]), true);
        assert!(scene.state_by_name("Old").is_none());
        assert!(scene.state_by_name("New").is_some());

        // one undo brings Old back and removes New
        scene.undo().unwrap();
        assert!(scene.state_by_name("Old").is_some());
        assert!(scene.state_by_name("New").is_none());
    }
}
