//! Action enum: all user-initiated intents and internal events.

use crate::nav::Route;

/// Unique identifier for a focusable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Sidebar,
    StationBrowser,
    Library,
    HelpOverlay,
    AlertModal,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    /// Toggle the station with this id.
    Select(String),
    Stop,
    Reload,

    // ── Navigation ───────────────────────────────────────────────────────────
    Navigate(Route),
    NextPage,
    PrevPage,
    /// Move keyboard focus between the sidebar and the page.
    FocusNext,

    // ── Filter/search ────────────────────────────────────────────────────────
    OpenFilter,
    CloseFilter,

    // ── UI toggles ───────────────────────────────────────────────────────────
    ToggleHelp,
    DismissAlert,

    // ── System ───────────────────────────────────────────────────────────────
    /// A new core snapshot has been applied to `AppState`.
    StateRefreshed,
    Quit,
}
