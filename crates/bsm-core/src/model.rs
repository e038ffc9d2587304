//! Core diagram data model.
//!
//! A diagram is a flat collection of three item kinds: **states** (unique,
//! case-sensitive names), **transitions** (non-owning references to their
//! endpoint states), and free-floating **comments**. Stores are insertion
//! ordered so iteration and serialization stay stable; identity is a
//! per-diagram [`ItemId`] that is minted once and never reused.
//!
//! The model enforces the structural invariants (name uniqueness, endpoint
//! resolution on insert) and nothing else — interaction policy such as
//! cascading delete, selection, and undo lives in the editor crate on top.

use crate::id::{IdMinter, ItemId};
use crate::persist::DiagramData;
use crate::routing::{self, CurvePath, Point, Rect};
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::HashMap;

// ─── Defaults ────────────────────────────────────────────────────────────

pub const DEFAULT_STATE_WIDTH: f64 = 120.0;
pub const DEFAULT_STATE_HEIGHT: f64 = 60.0;
/// Width given to comments created in the editor. Documents written by
/// older builds may omit the field entirely; those load as 150 instead.
pub const DEFAULT_COMMENT_WIDTH: f64 = 160.0;

/// Default state fill (material blue 50).
pub const STATE_DEFAULT_COLOR: Color = Color::rgb(0xE3, 0xF2, 0xFD);
/// Default transition stroke (material teal 700).
pub const TRANSITION_DEFAULT_COLOR: Color = Color::rgb(0x00, 0x79, 0x6B);

// ─── Color ───────────────────────────────────────────────────────────────

/// An opaque RGB color, serialized as `"#RRGGBB"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Parse a single hex digit.
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RGB` or `#RRGGBB`; the `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => {
                let r = hex_val(bytes[0])?;
                let g = hex_val(bytes[1])?;
                let b = hex_val(bytes[2])?;
                Some(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 => {
                let r = hex_val(bytes[0])? << 4 | hex_val(bytes[1])?;
                let g = hex_val(bytes[2])? << 4 | hex_val(bytes[3])?;
                let b = hex_val(bytes[4])? << 4 | hex_val(bytes[5])?;
                Some(Self::rgb(r, g, b))
            }
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| D::Error::custom(format!("invalid color `{s}`")))
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────

/// Validation failures raised by the model. These are user-visible; every
/// constructor rejects *before* mutating, so a failed operation leaves the
/// diagram exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("a state named '{0}' already exists")]
    DuplicateStateName(String),
    #[error("state names cannot be empty")]
    EmptyStateName,
    #[error("no state named '{0}'")]
    UnknownStateName(String),
    #[error("no state with id {0}")]
    UnknownEndpoint(ItemId),
    #[error("no item with id {0}")]
    UnknownItem(ItemId),
    #[error("item id {0} is already taken")]
    IdInUse(ItemId),
    #[error("item {0} is not of the expected kind")]
    WrongItemKind(ItemId),
}

// ─── Entities ────────────────────────────────────────────────────────────

fn default_state_width() -> f64 {
    DEFAULT_STATE_WIDTH
}
fn default_state_height() -> f64 {
    DEFAULT_STATE_HEIGHT
}
fn default_state_color() -> Color {
    STATE_DEFAULT_COLOR
}
fn default_transition_color() -> Color {
    TRANSITION_DEFAULT_COLOR
}
/// Older documents may lack the comment `width` field.
fn default_comment_width() -> f64 {
    150.0
}
/// Proposal documents may omit a state's position entirely; it then loads
/// as *unplaced* (NaN) and the merge path lays it out on a grid. Unplaced
/// coordinates never enter a [`Diagram`].
fn unplaced_coord() -> f64 {
    f64::NAN
}

/// One FSM state. Doubles as its own flat snapshot: the struct is exactly
/// the persisted field set, so `clone()` is `get_data()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    #[serde(default = "unplaced_coord")]
    pub x: f64,
    #[serde(default = "unplaced_coord")]
    pub y: f64,
    #[serde(default = "default_state_width")]
    pub width: f64,
    #[serde(default = "default_state_height")]
    pub height: f64,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default = "default_state_color")]
    pub color: Color,
    #[serde(default)]
    pub entry_action: String,
    #[serde(default)]
    pub during_action: String,
    #[serde(default)]
    pub exit_action: String,
    #[serde(default)]
    pub description: String,
}

impl State {
    /// A state with default geometry and styling at the given position.
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            width: DEFAULT_STATE_WIDTH,
            height: DEFAULT_STATE_HEIGHT,
            is_initial: false,
            is_final: false,
            color: STATE_DEFAULT_COLOR,
            entry_action: String::new(),
            during_action: String::new(),
            exit_action: String::new(),
            description: String::new(),
        }
    }

    /// A state with no position yet, for machine-generated proposals. The
    /// merge path assigns a grid slot to every unplaced state it accepts.
    pub fn unplaced(name: impl Into<String>) -> Self {
        Self::new(name, f64::NAN, f64::NAN)
    }

    /// Whether the state carries a real position.
    pub fn is_placed(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Overwrite only the fields that differ from `data` (the name is
    /// handled by [`Diagram::apply_item_data`], which must re-index it).
    /// Returns whether anything changed.
    fn apply_non_name(&mut self, data: &State) -> bool {
        let mut changed = false;
        macro_rules! sync {
            ($field:ident) => {
                if self.$field != data.$field {
                    self.$field = data.$field.clone();
                    changed = true;
                }
            };
        }
        sync!(x);
        sync!(y);
        sync!(width);
        sync!(height);
        sync!(is_initial);
        sync!(is_final);
        sync!(color);
        sync!(entry_action);
        sync!(during_action);
        sync!(exit_action);
        sync!(description);
        changed
    }
}

/// One transition between two states (or a self-loop). Endpoints are
/// [`ItemId`] handles: they survive renames, and they stop resolving when
/// the endpoint state is deleted — such a transition is *orphaned* and is
/// excluded from snapshots with a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub source: ItemId,
    pub target: ItemId,
    pub event: String,
    pub condition: String,
    pub action: String,
    pub color: Color,
    pub description: String,
    /// Perpendicular displacement of the curve midpoint.
    pub control_offset_x: f64,
    /// Tangential displacement of the curve midpoint.
    pub control_offset_y: f64,
}

impl Transition {
    pub fn new(source: ItemId, target: ItemId) -> Self {
        Self {
            source,
            target,
            event: String::new(),
            condition: String::new(),
            action: String::new(),
            color: TRANSITION_DEFAULT_COLOR,
            description: String::new(),
            control_offset_x: 0.0,
            control_offset_y: 0.0,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    /// Display label, composed live: `event [condition] /{action}`, empty
    /// parts omitted, the action clipped to its first line.
    pub fn label(&self) -> String {
        let mut parts: SmallVec<[String; 3]> = SmallVec::new();
        if !self.event.is_empty() {
            parts.push(self.event.clone());
        }
        if !self.condition.is_empty() {
            parts.push(format!("[{}]", self.condition));
        }
        if !self.action.is_empty() {
            let first_line = self.action.lines().next().unwrap_or("");
            let display: String = if first_line.chars().count() > 20 {
                let clipped: String = first_line.chars().take(17).collect();
                format!("{clipped}...")
            } else {
                first_line.to_string()
            };
            parts.push(format!("/{{{display}}}"));
        }
        parts.join(" ")
    }

    /// Apply the editable fields of a snapshot (endpoints are fixed at
    /// creation and never rewritten here). Returns whether anything changed.
    fn apply_editable(&mut self, data: &TransitionData) -> bool {
        let mut changed = false;
        macro_rules! sync {
            ($field:ident) => {
                if self.$field != data.$field {
                    self.$field = data.$field.clone();
                    changed = true;
                }
            };
        }
        sync!(event);
        sync!(condition);
        sync!(action);
        sync!(color);
        sync!(description);
        sync!(control_offset_x);
        sync!(control_offset_y);
        changed
    }
}

/// The flat snapshot of a transition: endpoint ids swapped for state
/// *names*, re-derived live at snapshot time so renames are always
/// reflected. This is the persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionData {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub action: String,
    #[serde(default = "default_transition_color")]
    pub color: Color,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub control_offset_x: f64,
    #[serde(default)]
    pub control_offset_y: f64,
}

/// A free-floating note. Like [`State`], the struct is its own snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub text: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_comment_width")]
    pub width: f64,
}

impl Comment {
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width: DEFAULT_COMMENT_WIDTH,
        }
    }

    fn apply(&mut self, data: &Comment) -> bool {
        let mut changed = false;
        if self.text != data.text {
            self.text = data.text.clone();
            changed = true;
        }
        if self.x != data.x || self.y != data.y {
            self.x = data.x;
            self.y = data.y;
            changed = true;
        }
        if self.width != data.width {
            self.width = data.width;
            changed = true;
        }
        changed
    }

    /// Comments render as a fixed-ratio note box; height tracks width.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.width * 0.4)
    }
}

/// A kind-tagged item snapshot — what the undo layer stores and what
/// heterogeneous operations (delete, clipboard) pass around.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemData {
    State(State),
    Transition(TransitionData),
    Comment(Comment),
}

impl ItemData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ItemData::State(_) => "state",
            ItemData::Transition(_) => "transition",
            ItemData::Comment(_) => "comment",
        }
    }
}

// ─── Diagram ─────────────────────────────────────────────────────────────

/// The in-memory diagram: insertion-ordered stores per item kind, a
/// name→id index for states, and the id minter.
#[derive(Debug, Clone, Default)]
pub struct Diagram {
    states: IndexMap<ItemId, State>,
    transitions: IndexMap<ItemId, Transition>,
    comments: IndexMap<ItemId, Comment>,
    name_index: HashMap<String, ItemId>,
    minter: IdMinter,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.transitions.is_empty() && self.comments.is_empty()
    }

    /// Drop every item. The id minter is deliberately NOT reset, so ids
    /// from before the clear can never collide with ids minted after it.
    pub fn clear(&mut self) {
        self.states.clear();
        self.transitions.clear();
        self.comments.clear();
        self.name_index.clear();
    }

    /// Reserve an id for an item the undo layer will insert later via the
    /// `restore_*` methods. Minted ids are never reused, so reserving one
    /// for an operation that then fails costs nothing.
    pub fn mint_id(&mut self) -> ItemId {
        self.minter.mint()
    }

    // ─── Insertion ────────────────────────────────────────────────────

    /// Add a state under a freshly minted id. Rejects empty or duplicate
    /// names without mutating.
    pub fn add_state(&mut self, state: State) -> Result<ItemId, ModelError> {
        self.validate_state_name(&state.name)?;
        let id = self.minter.mint();
        self.name_index.insert(state.name.clone(), id);
        self.states.insert(id, state);
        Ok(id)
    }

    /// Re-insert a state under an id it previously held, back at the
    /// store position it previously occupied (undo path). Indices past
    /// the end clamp to an append.
    pub fn restore_state(
        &mut self,
        id: ItemId,
        index: usize,
        state: State,
    ) -> Result<(), ModelError> {
        if self.contains(id) {
            return Err(ModelError::IdInUse(id));
        }
        self.validate_state_name(&state.name)?;
        self.name_index.insert(state.name.clone(), id);
        self.states
            .shift_insert(index.min(self.states.len()), id, state);
        Ok(())
    }

    /// Add a transition under a freshly minted id. Both endpoints must
    /// resolve to live states.
    pub fn add_transition(&mut self, transition: Transition) -> Result<ItemId, ModelError> {
        self.validate_endpoints(&transition)?;
        let id = self.minter.mint();
        self.transitions.insert(id, transition);
        Ok(id)
    }

    /// Re-insert a transition under an id it previously held, back at the
    /// store position it previously occupied (undo path).
    pub fn restore_transition(
        &mut self,
        id: ItemId,
        index: usize,
        transition: Transition,
    ) -> Result<(), ModelError> {
        if self.contains(id) {
            return Err(ModelError::IdInUse(id));
        }
        self.validate_endpoints(&transition)?;
        self.transitions
            .shift_insert(index.min(self.transitions.len()), id, transition);
        Ok(())
    }

    pub fn add_comment(&mut self, comment: Comment) -> ItemId {
        let id = self.minter.mint();
        self.comments.insert(id, comment);
        id
    }

    /// Re-insert a comment under an id it previously held, back at the
    /// store position it previously occupied (undo path).
    pub fn restore_comment(
        &mut self,
        id: ItemId,
        index: usize,
        comment: Comment,
    ) -> Result<(), ModelError> {
        if self.contains(id) {
            return Err(ModelError::IdInUse(id));
        }
        self.comments
            .shift_insert(index.min(self.comments.len()), id, comment);
        Ok(())
    }

    fn validate_state_name(&self, name: &str) -> Result<(), ModelError> {
        if name.trim().is_empty() {
            return Err(ModelError::EmptyStateName);
        }
        if self.name_index.contains_key(name) {
            return Err(ModelError::DuplicateStateName(name.to_string()));
        }
        Ok(())
    }

    fn validate_endpoints(&self, transition: &Transition) -> Result<(), ModelError> {
        if !self.states.contains_key(&transition.source) {
            return Err(ModelError::UnknownEndpoint(transition.source));
        }
        if !self.states.contains_key(&transition.target) {
            return Err(ModelError::UnknownEndpoint(transition.target));
        }
        Ok(())
    }

    // ─── Removal ──────────────────────────────────────────────────────

    /// Remove one item by id, whatever its kind, returning its snapshot.
    ///
    /// This is a *per-entity* removal: deleting a state here does NOT drag
    /// its incident transitions along — they become orphans. Cascading
    /// delete is interaction policy and lives in the editor's
    /// `delete_selection`, which expands the set before removal.
    pub fn remove(&mut self, id: ItemId) -> Option<ItemData> {
        if let Some(state) = self.states.shift_remove(&id) {
            self.name_index.remove(&state.name);
            return Some(ItemData::State(state));
        }
        if let Some(transition) = self.transitions.shift_remove(&id) {
            let data = self.transition_to_data(&transition);
            return Some(ItemData::Transition(data));
        }
        if let Some(comment) = self.comments.shift_remove(&id) {
            return Some(ItemData::Comment(comment));
        }
        None
    }

    // ─── Lookup ───────────────────────────────────────────────────────

    pub fn contains(&self, id: ItemId) -> bool {
        self.states.contains_key(&id)
            || self.transitions.contains_key(&id)
            || self.comments.contains_key(&id)
    }

    pub fn state(&self, id: ItemId) -> Option<&State> {
        self.states.get(&id)
    }

    pub fn transition(&self, id: ItemId) -> Option<&Transition> {
        self.transitions.get(&id)
    }

    pub fn comment(&self, id: ItemId) -> Option<&Comment> {
        self.comments.get(&id)
    }

    /// Case-sensitive name lookup.
    pub fn state_by_name(&self, name: &str) -> Option<ItemId> {
        self.name_index.get(name).copied()
    }

    pub fn states(&self) -> impl DoubleEndedIterator<Item = (ItemId, &State)> {
        self.states.iter().map(|(id, s)| (*id, s))
    }

    pub fn transitions(&self) -> impl DoubleEndedIterator<Item = (ItemId, &Transition)> {
        self.transitions.iter().map(|(id, t)| (*id, t))
    }

    pub fn comments(&self) -> impl DoubleEndedIterator<Item = (ItemId, &Comment)> {
        self.comments.iter().map(|(id, c)| (*id, c))
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    /// Position of an item within its kind's store. Captured alongside a
    /// removal snapshot so undo can put the item back where it sat.
    pub fn item_index(&self, id: ItemId) -> Option<usize> {
        self.states
            .get_index_of(&id)
            .or_else(|| self.transitions.get_index_of(&id))
            .or_else(|| self.comments.get_index_of(&id))
    }

    /// Ids of every transition touching `state_id` as source or target.
    pub fn transitions_of_state(&self, state_id: ItemId) -> SmallVec<[ItemId; 4]> {
        self.transitions
            .iter()
            .filter(|(_, t)| t.source == state_id || t.target == state_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Whether a transition still resolves both endpoints.
    pub fn transition_is_live(&self, transition: &Transition) -> bool {
        self.states.contains_key(&transition.source)
            && self.states.contains_key(&transition.target)
    }

    // ─── Snapshots ────────────────────────────────────────────────────

    /// Flat snapshot of one item, name-resolved for transitions. `None`
    /// for unknown ids AND for orphaned transitions (their endpoint names
    /// can no longer be derived).
    pub fn item_data(&self, id: ItemId) -> Option<ItemData> {
        if let Some(state) = self.states.get(&id) {
            return Some(ItemData::State(state.clone()));
        }
        if let Some(t) = self.transitions.get(&id) {
            if !self.transition_is_live(t) {
                return None;
            }
            return Some(ItemData::Transition(self.transition_to_data(t)));
        }
        self.comments.get(&id).map(|c| ItemData::Comment(c.clone()))
    }

    /// Snapshot a transition, deriving endpoint names live. Endpoints that
    /// no longer resolve are rendered as empty names — callers that care
    /// filter with [`Self::transition_is_live`] first.
    pub fn transition_to_data(&self, transition: &Transition) -> TransitionData {
        let name_of = |id: ItemId| {
            self.states
                .get(&id)
                .map(|s| s.name.clone())
                .unwrap_or_default()
        };
        TransitionData {
            source: name_of(transition.source),
            target: name_of(transition.target),
            event: transition.event.clone(),
            condition: transition.condition.clone(),
            action: transition.action.clone(),
            color: transition.color,
            description: transition.description.clone(),
            control_offset_x: transition.control_offset_x,
            control_offset_y: transition.control_offset_y,
        }
    }

    /// Resolve a name-based transition snapshot against the current states.
    pub fn resolve_transition_data(
        &self,
        data: &TransitionData,
    ) -> Result<Transition, ModelError> {
        let source = self
            .state_by_name(&data.source)
            .ok_or_else(|| ModelError::UnknownStateName(data.source.clone()))?;
        let target = self
            .state_by_name(&data.target)
            .ok_or_else(|| ModelError::UnknownStateName(data.target.clone()))?;
        Ok(Transition {
            source,
            target,
            event: data.event.clone(),
            condition: data.condition.clone(),
            action: data.action.clone(),
            color: data.color,
            description: data.description.clone(),
            control_offset_x: data.control_offset_x,
            control_offset_y: data.control_offset_y,
        })
    }

    /// Snapshot the whole diagram in its persisted form. Orphaned
    /// transitions cannot be expressed as name pairs anymore, so each one
    /// is excluded with a warning naming what was dropped.
    pub fn data(&self) -> DiagramData {
        let mut transitions = Vec::with_capacity(self.transitions.len());
        for (id, t) in &self.transitions {
            if self.transition_is_live(t) {
                transitions.push(self.transition_to_data(t));
            } else {
                log::warn!(
                    "excluding orphaned transition {id} ('{}') from snapshot: \
                     an endpoint state no longer exists",
                    t.label()
                );
            }
        }
        DiagramData {
            states: self.states.values().cloned().collect(),
            transitions,
            comments: self.comments.values().cloned().collect(),
        }
    }

    /// Replace the whole diagram with `data`. States go in first so the
    /// name index is complete, then transitions are relinked by name, then
    /// comments. Duplicate names and unresolved endpoints are warned about
    /// and skipped rather than failing the load.
    pub fn load_data(&mut self, data: &DiagramData) {
        self.clear();
        for state in &data.states {
            let mut state = state.clone();
            // Unplaced coordinates stay out of live diagrams.
            if !state.x.is_finite() {
                state.x = 0.0;
            }
            if !state.y.is_finite() {
                state.y = 0.0;
            }
            if let Err(e) = self.add_state(state) {
                log::warn!("skipping state while loading: {e}");
            }
        }
        for t in &data.transitions {
            match self.resolve_transition_data(t) {
                Ok(resolved) => {
                    if let Err(e) = self.add_transition(resolved) {
                        log::warn!(
                            "skipping transition '{}' -> '{}' while loading: {e}",
                            t.source,
                            t.target
                        );
                    }
                }
                Err(e) => log::warn!(
                    "skipping transition '{}' -> '{}' while loading: {e}",
                    t.source,
                    t.target
                ),
            }
        }
        for comment in &data.comments {
            self.add_comment(comment.clone());
        }
    }

    // ─── Mutation ─────────────────────────────────────────────────────

    /// Apply a snapshot to the item it belongs to, field-by-field,
    /// touching only what differs. A state rename is validated first and
    /// re-indexed; a rejected rename changes nothing. Returns whether any
    /// field changed.
    pub fn apply_item_data(&mut self, id: ItemId, data: &ItemData) -> Result<bool, ModelError> {
        match data {
            ItemData::State(new) => {
                let Some(current) = self.states.get(&id) else {
                    return Err(if self.contains(id) {
                        ModelError::WrongItemKind(id)
                    } else {
                        ModelError::UnknownItem(id)
                    });
                };
                let mut changed = false;
                if current.name != new.name {
                    self.rename_state(id, &new.name)?;
                    changed = true;
                }
                // Safe: presence checked above, rename does not remove.
                if let Some(state) = self.states.get_mut(&id) {
                    changed |= state.apply_non_name(new);
                }
                Ok(changed)
            }
            ItemData::Transition(new) => {
                let Some(transition) = self.transitions.get_mut(&id) else {
                    return Err(if self.contains(id) {
                        ModelError::WrongItemKind(id)
                    } else {
                        ModelError::UnknownItem(id)
                    });
                };
                Ok(transition.apply_editable(new))
            }
            ItemData::Comment(new) => {
                let Some(comment) = self.comments.get_mut(&id) else {
                    return Err(if self.contains(id) {
                        ModelError::WrongItemKind(id)
                    } else {
                        ModelError::UnknownItem(id)
                    });
                };
                Ok(comment.apply(new))
            }
        }
    }

    /// Rename a state, keeping the name index synchronized. Transitions
    /// are untouched — they hold ids, and labels derive names live.
    fn rename_state(&mut self, id: ItemId, new_name: &str) -> Result<(), ModelError> {
        if new_name.trim().is_empty() {
            return Err(ModelError::EmptyStateName);
        }
        if let Some(&holder) = self.name_index.get(new_name) {
            if holder != id {
                return Err(ModelError::DuplicateStateName(new_name.to_string()));
            }
            return Ok(());
        }
        let state = self.states.get_mut(&id).ok_or(ModelError::UnknownItem(id))?;
        self.name_index.remove(&state.name);
        state.name = new_name.to_string();
        self.name_index.insert(state.name.clone(), id);
        Ok(())
    }

    /// Current position of a movable item (states and comments).
    pub fn item_position(&self, id: ItemId) -> Option<Point> {
        if let Some(s) = self.states.get(&id) {
            return Some(Point::new(s.x, s.y));
        }
        self.comments.get(&id).map(|c| Point::new(c.x, c.y))
    }

    /// Reposition a movable item. Transition geometry is derived from its
    /// endpoints, so transitions are not movable.
    pub fn set_item_position(&mut self, id: ItemId, x: f64, y: f64) -> Result<(), ModelError> {
        if let Some(s) = self.states.get_mut(&id) {
            s.x = x;
            s.y = y;
            return Ok(());
        }
        if let Some(c) = self.comments.get_mut(&id) {
            c.x = x;
            c.y = y;
            return Ok(());
        }
        if self.transitions.contains_key(&id) {
            return Err(ModelError::WrongItemKind(id));
        }
        Err(ModelError::UnknownItem(id))
    }

    // ─── Geometry ─────────────────────────────────────────────────────

    /// Route a transition's current curve. `None` when the transition is
    /// unknown or orphaned.
    pub fn transition_path(&self, id: ItemId) -> Option<CurvePath> {
        let t = self.transitions.get(&id)?;
        let source = self.states.get(&t.source)?;
        if t.source == t.target {
            return Some(routing::route_self_loop(
                &source.rect(),
                t.control_offset_x,
                t.control_offset_y,
            ));
        }
        let target = self.states.get(&t.target)?;
        Some(routing::route_between(
            &source.rect(),
            &target.rect(),
            t.control_offset_x,
            t.control_offset_y,
        ))
    }

    /// Union of every item's extent (states, comments, and sampled
    /// transition curves). `None` for an empty diagram.
    pub fn bounding_rect(&self) -> Option<Rect> {
        let mut acc: Option<Rect> = None;
        let mut push = |r: Rect| {
            acc = Some(match acc {
                Some(u) => u.united(&r),
                None => r,
            });
        };
        for state in self.states.values() {
            push(state.rect());
        }
        for comment in self.comments.values() {
            push(comment.rect());
        }
        for id in self.transitions.keys() {
            if let Some(path) = self.transition_path(*id) {
                for i in 0..=4 {
                    let p = path.point_at(i as f64 / 4.0);
                    push(Rect::new(p.x, p.y, 0.0, 0.0));
                }
            }
        }
        acc
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
