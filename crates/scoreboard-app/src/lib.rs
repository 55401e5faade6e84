//! Selection controller wiring navigation, progressive loading and version
//! management into the dashboard's central state machine.

pub mod controller;
pub mod outline;
pub mod selection;

pub use controller::SelectionController;
pub use outline::{ScorecardOutline, SectionLoadState, SectionOutline};
pub use selection::{CloseTarget, Selection};
