mod commands;
mod menu;
mod wizard;

pub use commands::{authorize, run_once, run_scheduled};
pub use menu::run_menu;
