//! Selection <-> URL mapping and browser history ingestion.

pub mod bridge;
pub mod route;

pub use bridge::{BrowserHistory, NavigationBridge};
pub use route::Route;
