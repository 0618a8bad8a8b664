//! CLI command implementations.

mod config;
mod index;
mod list;
mod rebuild;
mod remove;
mod search;
mod serve;

pub use config::run_config;
pub use index::run_index;
pub use list::run_list;
pub use rebuild::run_rebuild;
pub use remove::run_remove;
pub use search::run_search;
pub use serve::run_serve;
