pub mod alert;
pub mod help_overlay;
pub mod library;
pub mod pages;
pub mod sidebar;
pub mod station_browser;
