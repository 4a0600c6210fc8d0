pub mod app;
pub mod commands;
pub mod core;
pub mod utils;
