pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod registry;
pub mod ui;
