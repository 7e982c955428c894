pub mod app;
pub mod bot;
pub mod cli;
pub mod control;
pub mod error;
pub mod logging;
pub mod settings;
