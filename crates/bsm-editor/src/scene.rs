//! The diagram scene: the authoritative in-memory graph plus everything
//! interactive around it — selection, the creation-mode state machine,
//! cascading delete, per-gesture move batching with grid snapping, dirty
//! tracking, and save/load.
//!
//! All structural changes flow through the [`CommandStack`]; the only
//! bypasses are `load_diagram_data` and `new_diagram`, which replace the
//! whole graph and drop the history with it.

use crate::commands::{Command, CommandStack, DEFAULT_MAX_DEPTH, ItemMove, RemovedItem};
use crate::hit;
use bsm_core::ItemId;
use bsm_core::model::{Comment, Diagram, ItemData, ModelError, State, Transition};
use bsm_core::persist::{self, DiagramData, PersistError};
use bsm_core::routing::{Point, Rect, snap};
use smallvec::SmallVec;
use std::path::Path;

/// Grid cell size used when snapping is enabled.
pub const GRID_SIZE: f64 = 20.0;
/// Moves below this Manhattan distance are treated as no movement.
const MOVE_EPSILON: f64 = 0.1;

/// Validation failures surfaced to the user. The rejected operation has
/// changed nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// The scene's interaction mode. One explicit field with one transition
/// table ([`DiagramScene::set_mode`]) instead of mode checks scattered
/// across event handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Select,
    AddState,
    AddTransition,
    AddComment,
}

/// What a click dispatch did, for the shell's status line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    Selected(ItemId),
    SelectionCleared,
    Created(ItemId),
    /// First click of a transition gesture: the source is armed.
    TransitionPending(ItemId),
    /// Comment placement chosen; the shell collects the text and calls
    /// [`DiagramScene::add_comment`], or drops the gesture on empty input.
    CommentPrompt(Point),
    Cancelled,
    Rejected,
}

/// The interactive diagram editor state.
pub struct DiagramScene {
    diagram: Diagram,
    stack: CommandStack,
    selection: Vec<ItemId>,
    mode: Mode,
    pending_transition_source: Option<ItemId>,
    dirty: bool,
    dirty_listener: Option<Box<dyn FnMut(bool)>>,
    snap_to_grid: bool,
    grid_size: f64,
}

impl Default for DiagramScene {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramScene {
    pub fn new() -> Self {
        Self {
            diagram: Diagram::new(),
            stack: CommandStack::new(DEFAULT_MAX_DEPTH),
            selection: Vec::new(),
            mode: Mode::Select,
            pending_transition_source: None,
            dirty: false,
            dirty_listener: None,
            snap_to_grid: true,
            grid_size: GRID_SIZE,
        }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    // ─── Mode machine ─────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch interaction mode. Leaving `AddTransition` drops any armed
    /// source without mutating the graph.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != Mode::AddTransition {
            self.pending_transition_source = None;
        }
        self.mode = mode;
    }

    /// Escape: abandon any pending gesture and return to `Select`.
    pub fn cancel(&mut self) {
        self.pending_transition_source = None;
        self.mode = Mode::Select;
    }

    pub fn pending_transition_source(&self) -> Option<ItemId> {
        self.pending_transition_source
    }

    /// Dispatch one click according to the current mode.
    pub fn handle_click(&mut self, p: Point) -> ClickOutcome {
        match self.mode {
            Mode::Select => match hit::item_at(&self.diagram, p) {
                Some(id) => {
                    self.selection = vec![id];
                    ClickOutcome::Selected(id)
                }
                None => {
                    self.selection.clear();
                    ClickOutcome::SelectionCleared
                }
            },
            Mode::AddState => {
                let name = self.suggest_state_name("State");
                match self.add_state(State::new(name, p.x, p.y)) {
                    Ok(id) => {
                        self.set_mode(Mode::Select);
                        ClickOutcome::Created(id)
                    }
                    Err(_) => ClickOutcome::Rejected,
                }
            }
            Mode::AddTransition => {
                let hit_state = hit::item_at(&self.diagram, p)
                    .filter(|id| self.diagram.state(*id).is_some());
                match (self.pending_transition_source, hit_state) {
                    (None, Some(source)) => {
                        self.pending_transition_source = Some(source);
                        ClickOutcome::TransitionPending(source)
                    }
                    (Some(source), Some(target)) => {
                        self.pending_transition_source = None;
                        self.set_mode(Mode::Select);
                        match self.add_transition(Transition::new(source, target)) {
                            Ok(id) => ClickOutcome::Created(id),
                            Err(_) => ClickOutcome::Rejected,
                        }
                    }
                    (_, None) => {
                        self.cancel();
                        ClickOutcome::Cancelled
                    }
                }
            }
            Mode::AddComment => {
                // Text entry is the shell's dialog; nothing is created
                // until it comes back with non-empty text.
                self.set_mode(Mode::Select);
                ClickOutcome::CommentPrompt(p)
            }
        }
    }

    // ─── Creation ─────────────────────────────────────────────────────

    /// First free `"{base}{N}"`, counting from 1.
    pub fn suggest_state_name(&self, base: &str) -> String {
        let mut n = 1u32;
        loop {
            let name = format!("{base}{n}");
            if self.diagram.state_by_name(&name).is_none() {
                return name;
            }
            n += 1;
        }
    }

    /// Add a state as one undoable command. Empty and duplicate names are
    /// rejected before anything changes.
    pub fn add_state(&mut self, state: State) -> Result<ItemId, SceneError> {
        if state.name.trim().is_empty() {
            return Err(ModelError::EmptyStateName.into());
        }
        if self.diagram.state_by_name(&state.name).is_some() {
            return Err(ModelError::DuplicateStateName(state.name.clone()).into());
        }
        let id = self.diagram.mint_id();
        let description = format!("add state '{}'", state.name);
        self.execute(Command::AddItem {
            id,
            item: ItemData::State(state),
            description,
        });
        self.selection = vec![id];
        Ok(id)
    }

    /// Add a transition as one undoable command. Self-loops are fine; both
    /// endpoints must be live states.
    pub fn add_transition(&mut self, transition: Transition) -> Result<ItemId, SceneError> {
        if self.diagram.state(transition.source).is_none() {
            return Err(ModelError::UnknownEndpoint(transition.source).into());
        }
        if self.diagram.state(transition.target).is_none() {
            return Err(ModelError::UnknownEndpoint(transition.target).into());
        }
        // Snapshot with endpoint names resolved now; redo relinks by name.
        let data = self.diagram.transition_to_data(&transition);
        let id = self.diagram.mint_id();
        let description = format!("add transition {} -> {}", data.source, data.target);
        self.execute(Command::AddItem {
            id,
            item: ItemData::Transition(data),
            description,
        });
        self.selection = vec![id];
        Ok(id)
    }

    pub fn add_comment(&mut self, comment: Comment) -> ItemId {
        let id = self.diagram.mint_id();
        self.execute(Command::AddItem {
            id,
            item: ItemData::Comment(comment),
            description: "add comment".to_string(),
        });
        self.selection = vec![id];
        id
    }

    // ─── Deletion ─────────────────────────────────────────────────────

    /// Delete the selection, expanded with every transition incident to a
    /// selected state, as ONE command — a single undo restores the states
    /// and their transitions together. Returns how many items went.
    pub fn delete_selection(&mut self) -> usize {
        let mut ids: SmallVec<[ItemId; 8]> = SmallVec::new();
        for &id in &self.selection {
            if !ids.contains(&id) {
                ids.push(id);
            }
            if self.diagram.state(id).is_some() {
                for t in self.diagram.transitions_of_state(id) {
                    if !ids.contains(&t) {
                        ids.push(t);
                    }
                }
            }
        }

        let items: Vec<RemovedItem> = ids
            .iter()
            .filter_map(|&id| {
                let index = self.diagram.item_index(id)?;
                let item = self.capture(id)?;
                Some(RemovedItem { id, index, item })
            })
            .collect();
        if items.is_empty() {
            return 0;
        }
        let count = items.len();
        let description = format!("delete {count} item(s)");
        self.execute(Command::RemoveItems { items, description });
        self.selection.clear();
        count
    }

    /// Snapshot an item for a command. Orphaned transitions snapshot with
    /// empty endpoint names; relinking them on undo fails with a warning
    /// instead of losing the rest of the set.
    fn capture(&self, id: ItemId) -> Option<ItemData> {
        if let Some(state) = self.diagram.state(id) {
            return Some(ItemData::State(state.clone()));
        }
        if let Some(t) = self.diagram.transition(id) {
            return Some(ItemData::Transition(self.diagram.transition_to_data(t)));
        }
        self.diagram
            .comment(id)
            .map(|c| ItemData::Comment(c.clone()))
    }

    // ─── Movement ─────────────────────────────────────────────────────

    /// Record one completed drag gesture as ONE command. Targets are
    /// snapped when grid snapping is on; items that barely moved are
    /// dropped; a gesture that moved nothing records nothing.
    pub fn apply_moves(&mut self, moves: &[(ItemId, Point)]) {
        let mut batch: SmallVec<[ItemMove; 4]> = SmallVec::new();
        for &(id, to) in moves {
            let Some(from) = self.diagram.item_position(id) else {
                log::warn!("move: no movable item {id}");
                continue;
            };
            let to = if self.snap_to_grid {
                Point::new(snap(to.x, self.grid_size), snap(to.y, self.grid_size))
            } else {
                to
            };
            if (to.x - from.x).abs() + (to.y - from.y).abs() < MOVE_EPSILON {
                continue;
            }
            batch.push(ItemMove { id, from, to });
        }
        if batch.is_empty() {
            return;
        }
        let description = format!("move {} item(s)", batch.len());
        self.execute(Command::MoveItems {
            moves: batch,
            description,
        });
    }

    /// Translate the whole selection by a delta (arrow keys, drag end).
    pub fn move_selection(&mut self, dx: f64, dy: f64) {
        let moves: Vec<(ItemId, Point)> = self
            .selection
            .iter()
            .filter_map(|&id| {
                self.diagram
                    .item_position(id)
                    .map(|p| (id, Point::new(p.x + dx, p.y + dy)))
            })
            .collect();
        self.apply_moves(&moves);
    }

    pub fn set_snap_to_grid(&mut self, enabled: bool) {
        self.snap_to_grid = enabled;
    }

    pub fn snap_to_grid(&self) -> bool {
        self.snap_to_grid
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    // ─── Properties ───────────────────────────────────────────────────

    /// Replace an item's properties as one undoable command. A state
    /// rename is validated here; a rejected edit changes nothing and
    /// issues no command. Returns whether anything actually differed.
    pub fn edit_properties(&mut self, id: ItemId, new: ItemData) -> Result<bool, SceneError> {
        let Some(old) = self.capture(id) else {
            return Err(ModelError::UnknownItem(id).into());
        };
        if old.kind_name() != new.kind_name() {
            return Err(ModelError::WrongItemKind(id).into());
        }
        if let (ItemData::State(old_state), ItemData::State(new_state)) = (&old, &new)
            && old_state.name != new_state.name
        {
            if new_state.name.trim().is_empty() {
                return Err(ModelError::EmptyStateName.into());
            }
            if let Some(holder) = self.diagram.state_by_name(&new_state.name)
                && holder != id
            {
                return Err(ModelError::DuplicateStateName(new_state.name.clone()).into());
            }
        }
        if old == new {
            return Ok(false);
        }
        let description = format!("edit {}", old.kind_name());
        self.execute(Command::EditProperties {
            id,
            old,
            new,
            description,
        });
        Ok(true)
    }

    // ─── Undo/redo ────────────────────────────────────────────────────

    fn execute(&mut self, command: Command) {
        self.stack.execute(&mut self.diagram, command);
        self.set_dirty(true);
    }

    /// Undo one step, returning its description for the status line.
    pub fn undo(&mut self) -> Option<String> {
        let applied = self.stack.undo(&mut self.diagram)?;
        self.selection.retain(|id| self.diagram.contains(*id));
        self.set_dirty(true);
        Some(applied.description)
    }

    /// Redo one step. A redone add selects its item again, same as the
    /// original creation did.
    pub fn redo(&mut self) -> Option<String> {
        let applied = self.stack.redo(&mut self.diagram)?;
        if applied.inserted.is_empty() {
            self.selection.retain(|id| self.diagram.contains(*id));
        } else {
            self.selection = applied
                .inserted
                .into_iter()
                .filter(|id| self.diagram.contains(*id))
                .collect();
        }
        self.set_dirty(true);
        Some(applied.description)
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    /// Group every command until `end_macro` into one undo step.
    pub fn begin_macro(&mut self, description: &str) {
        self.stack.begin_macro(description);
    }

    pub fn end_macro(&mut self) {
        self.stack.end_macro();
    }

    // ─── Selection ────────────────────────────────────────────────────

    pub fn selected_items(&self) -> &[ItemId] {
        &self.selection
    }

    pub fn set_selection(&mut self, ids: Vec<ItemId>) {
        self.selection = ids;
        self.selection.retain(|id| self.diagram.contains(*id));
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select_all(&mut self) {
        let mut ids: Vec<ItemId> = self.diagram.states().map(|(id, _)| id).collect();
        ids.extend(self.diagram.transitions().map(|(id, _)| id));
        ids.extend(self.diagram.comments().map(|(id, _)| id));
        self.selection = ids;
    }

    // ─── Snapshots, dirty tracking, files ─────────────────────────────

    /// The current graph snapshot, orphan-free (excluded with warnings).
    pub fn diagram_data(&self) -> DiagramData {
        self.diagram.data()
    }

    /// Replace the scene's contents with a snapshot. The undo history and
    /// selection go with the old graph; the result is clean (not dirty).
    pub fn load_diagram_data(&mut self, data: &DiagramData) {
        self.diagram.load_data(data);
        self.stack.clear();
        self.selection.clear();
        self.pending_transition_source = None;
        self.mode = Mode::Select;
        self.set_dirty(false);
    }

    /// Start over with an empty diagram.
    pub fn new_diagram(&mut self) {
        self.load_diagram_data(&DiagramData::default());
    }

    /// Save atomically; the dirty flag clears only after the commit, so a
    /// failed save leaves it set and the user can retry.
    pub fn save_file(&mut self, path: &Path) -> Result<(), PersistError> {
        persist::save_file(path, &self.diagram_data())?;
        self.set_dirty(false);
        Ok(())
    }

    /// Load from disk. The file is parsed fully before anything changes:
    /// a malformed document leaves the open diagram exactly as it was.
    pub fn load_file(&mut self, path: &Path) -> Result<(), PersistError> {
        let data = persist::load_file(path)?;
        self.load_diagram_data(&data);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flip the unsaved-changes flag. The listener fires only when the
    /// value actually changes.
    pub fn set_dirty(&mut self, dirty: bool) {
        if self.dirty == dirty {
            return;
        }
        self.dirty = dirty;
        if let Some(listener) = &mut self.dirty_listener {
            listener(dirty);
        }
    }

    /// Register the modified-status callback (window-title asterisk,
    /// save-prompt plumbing in the shell).
    pub fn on_dirty_changed(&mut self, listener: impl FnMut(bool) + 'static) {
        self.dirty_listener = Some(Box::new(listener));
    }

    // ─── Conveniences ─────────────────────────────────────────────────

    pub fn state_by_name(&self, name: &str) -> Option<ItemId> {
        self.diagram.state_by_name(name)
    }

    /// Union of every item's extent; `None` for an empty diagram.
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.diagram.bounding_rect()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
