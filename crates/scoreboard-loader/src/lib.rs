//! Progressive, generation-guarded loading of a scorecard's nested data.

pub mod events;
pub mod loader;

pub use events::{Generation, ScorecardLoadEvent};
pub use loader::{ProgressiveLoader, ProgressiveLoaderConfig};
