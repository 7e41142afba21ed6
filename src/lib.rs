pub mod cli;
pub mod config;
pub mod debug;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod render;
pub mod scheme;
pub mod stream;
pub mod theme;
pub mod watcher;
