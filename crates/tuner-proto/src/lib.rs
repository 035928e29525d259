pub mod config;
pub mod directory;
pub mod identity;
pub mod platform;
pub mod playback;
pub mod protocol;
pub mod state;
pub mod station;
