//! BSM Designer diagram engine: the data model, transition routing
//! geometry, `.bsm` persistence, and diagram lint.
//!
//! Everything interactive — selection, creation modes, undo/redo, grid
//! snapping — lives in the `bsm-editor` crate on top of this one.

pub mod id;
pub mod lint;
pub mod model;
pub mod persist;
pub mod routing;

pub use id::ItemId;
pub use lint::{LintDiagnostic, LintSeverity, lint_diagram};
pub use model::*;
pub use persist::{DiagramData, FILE_EXTENSION, PersistError};
pub use routing::{CurvePath, Point, Rect};
