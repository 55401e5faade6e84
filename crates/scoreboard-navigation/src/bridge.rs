use std::sync::{Arc, Mutex};

use crate::route::Route;

/// Browser history surface: `push_state` rewrites the address bar without a
/// reload. Back/forward events arrive as plain path strings and are fed
/// through `NavigationBridge::ingest_external_path`.
pub trait BrowserHistory: Send + Sync {
    fn push_state(&self, path: &str);
}

/// Keeps the address bar in sync with the current route, suppressing
/// redundant pushes (including the echo of a path the browser itself just
/// navigated to).
pub struct NavigationBridge {
    history: Arc<dyn BrowserHistory>,
    current_path: Mutex<Option<String>>,
}

impl NavigationBridge {
    pub fn new(history: Arc<dyn BrowserHistory>) -> Self {
        Self {
            history,
            current_path: Mutex::new(None),
        }
    }

    /// Push the route's canonical path unless the address bar already shows
    /// it. Returns whether a push happened.
    pub fn sync(&self, route: &Route) -> bool {
        let path = route.path();
        let mut current_path = self.current_path.lock().expect("lock current path");
        if current_path.as_deref() == Some(path.as_str()) {
            return false;
        }
        self.history.push_state(&path);
        *current_path = Some(path);
        true
    }

    /// Record a path delivered by a back/forward event and parse it. The
    /// recorded path makes a later `sync` to the same selection a no-op, so
    /// popstate handling never re-pushes the entry it came from.
    pub fn ingest_external_path(&self, path: &str) -> Option<Route> {
        let route = Route::parse(path);
        let mut current_path = self.current_path.lock().expect("lock current path");
        *current_path = route.as_ref().map(Route::path).or_else(|| Some(path.to_owned()));
        route
    }

    pub fn current_path(&self) -> Option<String> {
        self.current_path.lock().expect("lock current path").clone()
    }
}
