//! Interactive editing layer for BSM diagrams: the scene manager with its
//! creation-mode state machine, hit-testing, the undo/redo command stack,
//! and the collaborator contracts (export, assistant merge).

pub mod collab;
pub mod commands;
pub mod hit;
pub mod scene;

pub use collab::{DiagramExporter, ExportError, MergeReport};
pub use commands::{Applied, Command, CommandStack, ItemMove, RemovedItem};
pub use scene::{ClickOutcome, DiagramScene, Mode, SceneError};
