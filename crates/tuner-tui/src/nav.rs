//! Navigation shell: which pages exist for the current user and which one
//! is showing.

use tuner_proto::identity::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Now-playing and directory summary.
    Home,
    /// Station browser with the filter bar focused.
    Search,
    /// Station browser.
    Radio,
    /// Stations played this session, most recent first.
    Library,
    /// Directory and player diagnostics.
    Admin,
}

impl Route {
    pub fn title(self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::Search => "search",
            Route::Radio => "radio",
            Route::Library => "your library",
            Route::Admin => "admin dashboard",
        }
    }

    /// Pages that render the station browser.
    pub fn shows_browser(self) -> bool {
        matches!(self, Route::Search | Route::Radio)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub label: &'static str,
    pub route: Route,
    pub hotkey: char,
}

const fn entry(label: &'static str, route: Route, hotkey: char) -> NavEntry {
    NavEntry {
        label,
        route,
        hotkey,
    }
}

/// Sidebar entries for `user`.  The admin dashboard is listed only for users
/// whose role is exactly `admin`.
pub fn nav_entries(user: Option<&User>) -> Vec<NavEntry> {
    let mut entries = vec![
        entry("Home", Route::Home, '1'),
        entry("Search", Route::Search, '2'),
        entry("Radio", Route::Radio, '3'),
        entry("Your Library", Route::Library, '4'),
    ];
    if user.map(User::is_admin).unwrap_or(false) {
        entries.push(entry("Admin Dashboard", Route::Admin, '5'));
    }
    entries
}

pub struct Navigator {
    entries: Vec<NavEntry>,
    current: Route,
}

impl Navigator {
    pub fn new(user: Option<&User>) -> Self {
        Self {
            entries: nav_entries(user),
            current: Route::Home,
        }
    }

    pub fn current(&self) -> Route {
        self.current
    }

    pub fn current_index(&self) -> usize {
        self.entries
            .iter()
            .position(|e| e.route == self.current)
            .unwrap_or(0)
    }

    /// Switch to `route`.  Routes not listed for this user are refused.
    /// Returns true if the page changed.
    pub fn navigate(&mut self, route: Route) -> bool {
        if !self.entries.iter().any(|e| e.route == route) {
            return false;
        }
        let changed = self.current != route;
        self.current = route;
        changed
    }

    pub fn route_for_key(&self, key: char) -> Option<Route> {
        self.entries.iter().find(|e| e.hotkey == key).map(|e| e.route)
    }

    pub fn next(&mut self) -> Route {
        let idx = (self.current_index() + 1) % self.entries.len();
        self.current = self.entries[idx].route;
        self.current
    }

    pub fn prev(&mut self) -> Route {
        let len = self.entries.len();
        let idx = (self.current_index() + len - 1) % len;
        self.current = self.entries[idx].route;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            name: "asha".into(),
            role: role.into(),
        }
    }

    fn routes(entries: &[NavEntry]) -> Vec<Route> {
        entries.iter().map(|e| e.route).collect()
    }

    #[test]
    fn test_admin_entry_only_for_admins() {
        let base = vec![Route::Home, Route::Search, Route::Radio, Route::Library];
        assert_eq!(routes(&nav_entries(None)), base);
        assert_eq!(routes(&nav_entries(Some(&user("listener")))), base);
        assert_eq!(routes(&nav_entries(Some(&user("Admin")))), base);

        let admin = nav_entries(Some(&user("admin")));
        assert_eq!(admin.len(), 5);
        assert_eq!(admin[4].label, "Admin Dashboard");
        assert_eq!(admin[4].route, Route::Admin);
    }

    #[test]
    fn test_navigate_refuses_hidden_routes() {
        let mut nav = Navigator::new(None);
        assert_eq!(nav.current(), Route::Home);
        assert!(!nav.navigate(Route::Admin));
        assert_eq!(nav.current(), Route::Home);

        assert!(nav.navigate(Route::Library));
        assert!(!nav.navigate(Route::Library));
        assert_eq!(nav.current(), Route::Library);

        let mut admin_nav = Navigator::new(Some(&user("admin")));
        assert!(admin_nav.navigate(Route::Admin));
    }

    #[test]
    fn test_cycling_wraps() {
        let mut nav = Navigator::new(None);
        assert_eq!(nav.prev(), Route::Library);
        assert_eq!(nav.next(), Route::Home);
        assert_eq!(nav.next(), Route::Search);
        assert_eq!(nav.route_for_key('3'), Some(Route::Radio));
        assert_eq!(nav.route_for_key('5'), None);
    }
}
