mod config;
mod import;
mod menu;
mod query;
mod serve;
mod status;

pub use config::ConfigCommand;
pub use import::ImportArgs;
pub use query::QueryArgs;
pub use serve::ServeArgs;

pub use config::handle_config;
pub use import::handle_import;
pub use menu::{handle_menu, run_menu};
pub use query::handle_query;
pub use serve::handle_serve;
pub use status::handle_status;
