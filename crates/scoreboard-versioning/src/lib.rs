//! Version history and champion-promotion workflow for a selected score.

pub mod manager;

pub use manager::{ChampionStatus, MutationNotice, VersionHistory, VersionManager};
