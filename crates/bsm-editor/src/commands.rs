//! Undo/redo command stack.
//!
//! Every structural mutation of the diagram is a reversible [`Command`]
//! holding full snapshots: an add records the created item, a remove
//! records everything deleted, a move records old/new position pairs.
//! Undoing a delete reconstructs items from those snapshots — states go
//! back first so transitions can be relinked to their endpoints by name.
//!
//! A command that hits an inconsistency mid-apply (an endpoint name that no
//! longer resolves, an id already taken) logs the problem and skips the
//! affected item; it never panics.

use bsm_core::ItemId;
use bsm_core::model::{Diagram, ItemData};
use bsm_core::routing::Point;
use smallvec::SmallVec;

/// Default undo depth; the stack trims its oldest entry beyond this.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// One old-position/new-position pair inside a [`Command::MoveItems`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemMove {
    pub id: ItemId,
    pub from: Point,
    pub to: Point,
}

/// One deleted item inside a [`Command::RemoveItems`]: its snapshot plus
/// the position it held in its kind's store, so undo re-inserts it exactly
/// where it sat and a delete/undo pair leaves the document byte-identical.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedItem {
    pub id: ItemId,
    pub index: usize,
    pub item: ItemData,
}

/// The outcome of one applied undo or redo step: the command description
/// for the status line, and the ids the step inserted into the diagram —
/// a redone add re-selects its item through this.
#[derive(Debug, Clone)]
pub struct Applied {
    pub description: String,
    pub inserted: Vec<ItemId>,
}

/// A reversible mutation of the diagram.
#[derive(Debug, Clone)]
pub enum Command {
    /// Insert one item under a pre-minted id. Transitions relink their
    /// endpoints by name at apply time.
    AddItem {
        id: ItemId,
        item: ItemData,
        description: String,
    },
    /// Remove a set of items; undo rebuilds them all from snapshots.
    RemoveItems {
        items: Vec<RemovedItem>,
        description: String,
    },
    /// Reposition a batch of items — one completed drag gesture.
    MoveItems {
        moves: SmallVec<[ItemMove; 4]>,
        description: String,
    },
    /// Swap one item's properties between two full snapshots.
    EditProperties {
        id: ItemId,
        old: ItemData,
        new: ItemData,
        description: String,
    },
    /// A group of commands undone and redone as one step.
    Macro {
        commands: Vec<Command>,
        description: String,
    },
}

impl Command {
    pub fn description(&self) -> &str {
        match self {
            Command::AddItem { description, .. }
            | Command::RemoveItems { description, .. }
            | Command::MoveItems { description, .. }
            | Command::EditProperties { description, .. }
            | Command::Macro { description, .. } => description,
        }
    }

    /// Apply the forward direction.
    pub fn redo(&self, diagram: &mut Diagram) {
        match self {
            Command::AddItem { id, item, .. } => {
                let end = match item {
                    ItemData::State(_) => diagram.state_count(),
                    ItemData::Transition(_) => diagram.transition_count(),
                    ItemData::Comment(_) => diagram.comment_count(),
                };
                insert_item(diagram, *id, end, item);
            }
            Command::RemoveItems { items, .. } => {
                for removed in items {
                    if diagram.remove(removed.id).is_none() {
                        log::warn!(
                            "redo remove: {} {} was already gone",
                            removed.item.kind_name(),
                            removed.id
                        );
                    }
                }
            }
            Command::MoveItems { moves, .. } => apply_positions(diagram, moves, |m| m.to),
            Command::EditProperties { id, new, .. } => {
                if let Err(e) = diagram.apply_item_data(*id, new) {
                    log::warn!("redo edit {id}: {e}");
                }
            }
            Command::Macro { commands, .. } => {
                for command in commands {
                    command.redo(diagram);
                }
            }
        }
    }

    /// Apply the inverse direction.
    pub fn undo(&self, diagram: &mut Diagram) {
        match self {
            Command::AddItem { id, item, .. } => {
                if diagram.remove(*id).is_none() {
                    log::warn!("undo add: {} {id} was already gone", item.kind_name());
                }
            }
            Command::RemoveItems { items, .. } => restore_items(diagram, items),
            Command::MoveItems { moves, .. } => apply_positions(diagram, moves, |m| m.from),
            Command::EditProperties { id, old, .. } => {
                if let Err(e) = diagram.apply_item_data(*id, old) {
                    log::warn!("undo edit {id}: {e}");
                }
            }
            Command::Macro { commands, .. } => {
                for command in commands.iter().rev() {
                    command.undo(diagram);
                }
            }
        }
    }

    /// Ids this command inserts when run forward.
    fn inserted_on_redo(&self, out: &mut Vec<ItemId>) {
        match self {
            Command::AddItem { id, .. } => out.push(*id),
            Command::Macro { commands, .. } => {
                for command in commands {
                    command.inserted_on_redo(out);
                }
            }
            _ => {}
        }
    }

    /// Ids this command re-inserts when undone.
    fn inserted_on_undo(&self, out: &mut Vec<ItemId>) {
        match self {
            Command::RemoveItems { items, .. } => out.extend(items.iter().map(|r| r.id)),
            Command::Macro { commands, .. } => {
                for command in commands.iter().rev() {
                    command.inserted_on_undo(out);
                }
            }
            _ => {}
        }
    }
}

/// Insert one snapshot under a known id at a known store position,
/// relinking transition endpoints by their current names.
fn insert_item(diagram: &mut Diagram, id: ItemId, index: usize, item: &ItemData) {
    let result = match item {
        ItemData::State(state) => diagram.restore_state(id, index, state.clone()),
        ItemData::Transition(data) => match diagram.resolve_transition_data(data) {
            Ok(transition) => diagram.restore_transition(id, index, transition),
            Err(e) => {
                log::warn!(
                    "cannot relink transition '{}' -> '{}': {e}",
                    data.source,
                    data.target
                );
                return;
            }
        },
        ItemData::Comment(comment) => diagram.restore_comment(id, index, comment.clone()),
    };
    if let Err(e) = result {
        log::warn!("cannot restore {} {id}: {e}", item.kind_name());
    }
}

/// Rebuild a deleted set: states first so the name index is complete, then
/// comments, then transitions (which relink by name). Each kind goes back
/// in ascending index order so every snapshot lands at the exact position
/// it was removed from.
fn restore_items(diagram: &mut Diagram, items: &[RemovedItem]) {
    restore_kind(diagram, items, |item| matches!(item, ItemData::State(_)));
    restore_kind(diagram, items, |item| matches!(item, ItemData::Comment(_)));
    restore_kind(diagram, items, |item| {
        matches!(item, ItemData::Transition(_))
    });
}

fn restore_kind(diagram: &mut Diagram, items: &[RemovedItem], want: fn(&ItemData) -> bool) {
    let mut batch: Vec<&RemovedItem> = items.iter().filter(|r| want(&r.item)).collect();
    batch.sort_by_key(|r| r.index);
    for removed in batch {
        insert_item(diagram, removed.id, removed.index, &removed.item);
    }
}

fn apply_positions(diagram: &mut Diagram, moves: &[ItemMove], pick: impl Fn(&ItemMove) -> Point) {
    for m in moves {
        let p = pick(m);
        if let Err(e) = diagram.set_item_position(m.id, p.x, p.y) {
            log::warn!("cannot move {}: {e}", m.id);
        }
    }
}

// ─── Stack ────────────────────────────────────────────────────────────────

/// Linear undo/redo history with macro grouping.
///
/// `execute` applies a command and records it; while a macro is open,
/// recorded commands accumulate into one [`Command::Macro`] entry instead,
/// closed out by `end_macro`. An empty macro adds no entry. Undo and redo
/// are unavailable while a macro is open.
#[derive(Debug)]
pub struct CommandStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    max_depth: usize,
    macro_depth: usize,
    macro_commands: Vec<Command>,
    macro_description: String,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth,
            macro_depth: 0,
            macro_commands: Vec::new(),
            macro_description: String::new(),
        }
    }

    /// Apply `command` and record it. Any redoable future is discarded.
    pub fn execute(&mut self, diagram: &mut Diagram, command: Command) {
        command.redo(diagram);
        self.redo_stack.clear();
        if self.macro_depth > 0 {
            self.macro_commands.push(command);
        } else {
            self.push(command);
        }
    }

    fn push(&mut self, command: Command) {
        self.undo_stack.push(command);
        if self.undo_stack.len() > self.max_depth.max(1) {
            self.undo_stack.remove(0);
        }
    }

    /// Open a macro group. Nested calls are flattened into the outermost.
    pub fn begin_macro(&mut self, description: &str) {
        if self.macro_depth == 0 {
            self.macro_commands.clear();
            self.macro_description = description.to_string();
        }
        self.macro_depth += 1;
    }

    /// Close a macro group. When the outermost one closes with commands in
    /// it, they become a single undo entry.
    pub fn end_macro(&mut self) {
        if self.macro_depth == 0 {
            return;
        }
        self.macro_depth -= 1;
        if self.macro_depth == 0 && !self.macro_commands.is_empty() {
            let commands = std::mem::take(&mut self.macro_commands);
            let description = std::mem::take(&mut self.macro_description);
            self.push(Command::Macro {
                commands,
                description,
            });
        }
    }

    /// Undo the most recent command.
    pub fn undo(&mut self, diagram: &mut Diagram) -> Option<Applied> {
        if self.macro_depth > 0 {
            return None;
        }
        let command = self.undo_stack.pop()?;
        command.undo(diagram);
        let mut inserted = Vec::new();
        command.inserted_on_undo(&mut inserted);
        let applied = Applied {
            description: command.description().to_string(),
            inserted,
        };
        self.redo_stack.push(command);
        Some(applied)
    }

    /// Redo the most recently undone command.
    pub fn redo(&mut self, diagram: &mut Diagram) -> Option<Applied> {
        if self.macro_depth > 0 {
            return None;
        }
        let command = self.redo_stack.pop()?;
        command.redo(diagram);
        let mut inserted = Vec::new();
        command.inserted_on_redo(&mut inserted);
        let applied = Applied {
            description: command.description().to_string(),
            inserted,
        };
        self.undo_stack.push(command);
        Some(applied)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Drop the whole history (new/load).
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.macro_depth = 0;
        self.macro_commands.clear();
        self.macro_description.clear();
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bsm_core::model::State;

    fn add_state_command(diagram: &mut Diagram, name: &str) -> Command {
        let id = diagram.mint_id();
        Command::AddItem {
            id,
            item: ItemData::State(State::new(name, 0.0, 0.0)),
            description: format!("add state '{name}'"),
        }
    }

    #[test]
    fn add_undo_redo_roundtrip() {
        let mut diagram = Diagram::new();
        let mut stack = CommandStack::new(DEFAULT_MAX_DEPTH);

        let cmd = add_state_command(&mut diagram, "A");
        stack.execute(&mut diagram, cmd);
        assert_eq!(diagram.state_count(), 1);

        let applied = stack.undo(&mut diagram).unwrap();
        assert_eq!(applied.description, "add state 'A'");
        assert!(applied.inserted.is_empty(), "undoing an add inserts nothing");
        assert_eq!(diagram.state_count(), 0);

        let applied = stack.redo(&mut diagram).unwrap();
        assert_eq!(diagram.state_count(), 1);
        let a = diagram.state_by_name("A").unwrap();
        assert_eq!(applied.inserted, vec![a]);
    }

    #[test]
    fn redo_clears_on_new_action() {
        let mut diagram = Diagram::new();
        let mut stack = CommandStack::new(DEFAULT_MAX_DEPTH);

        let cmd = add_state_command(&mut diagram, "A");
        stack.execute(&mut diagram, cmd);
        stack.undo(&mut diagram);
        assert!(stack.can_redo());

        let cmd = add_state_command(&mut diagram, "B");
        stack.execute(&mut diagram, cmd);
        assert!(!stack.can_redo());
    }

    #[test]
    fn max_depth_trims_oldest() {
        let mut diagram = Diagram::new();
        let mut stack = CommandStack::new(3);

        for i in 0..5 {
            let cmd = add_state_command(&mut diagram, &format!("S{i}"));
            stack.execute(&mut diagram, cmd);
        }

        let mut undone = 0;
        while stack.undo(&mut diagram).is_some() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        // The two oldest states are beyond the history and stay put.
        assert_eq!(diagram.state_count(), 2);
    }

    #[test]
    fn empty_macro_adds_no_entry() {
        let mut stack = CommandStack::new(DEFAULT_MAX_DEPTH);
        stack.begin_macro("nothing");
        stack.end_macro();
        assert!(!stack.can_undo());
    }

    #[test]
    fn macro_groups_commands_into_one_step() {
        let mut diagram = Diagram::new();
        let mut stack = CommandStack::new(DEFAULT_MAX_DEPTH);

        stack.begin_macro("add two");
        let cmd = add_state_command(&mut diagram, "A");
        stack.execute(&mut diagram, cmd);
        let cmd = add_state_command(&mut diagram, "B");
        stack.execute(&mut diagram, cmd);
        assert!(stack.undo(&mut diagram).is_none(), "macro still open");
        stack.end_macro();

        assert_eq!(diagram.state_count(), 2);
        let applied = stack.undo(&mut diagram).unwrap();
        assert_eq!(applied.description, "add two");
        assert_eq!(diagram.state_count(), 0);
        assert!(!stack.can_undo());
    }

    #[test]
    fn undo_of_remove_reinserts_at_original_positions() {
        let mut diagram = Diagram::new();
        let mut stack = CommandStack::new(DEFAULT_MAX_DEPTH);
        for name in ["A", "B", "C", "D"] {
            let cmd = add_state_command(&mut diagram, name);
            stack.execute(&mut diagram, cmd);
        }

        // Remove B and D in one command; survivors shift to A, C.
        let names = ["B", "D"];
        let items: Vec<RemovedItem> = names
            .iter()
            .map(|name| {
                let id = diagram.state_by_name(name).unwrap();
                RemovedItem {
                    id,
                    index: diagram.item_index(id).unwrap(),
                    item: diagram.item_data(id).unwrap(),
                }
            })
            .collect();
        stack.execute(
            &mut diagram,
            Command::RemoveItems {
                items,
                description: "delete 2 item(s)".into(),
            },
        );
        let order = |d: &Diagram| -> Vec<String> {
            d.states().map(|(_, s)| s.name.clone()).collect()
        };
        assert_eq!(order(&diagram), ["A", "C"]);

        let applied = stack.undo(&mut diagram).unwrap();
        assert_eq!(order(&diagram), ["A", "B", "C", "D"]);
        assert_eq!(applied.inserted.len(), 2);
    }
}
