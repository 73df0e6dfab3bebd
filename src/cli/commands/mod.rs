//! CLI command implementations.

mod clone_voice;
mod config;
mod delete;
mod generate;
mod list;
mod rerender;
mod resume;
mod show;

pub use clone_voice::run_clone_voice;
pub use config::run_config;
pub use delete::run_delete;
pub use generate::run_generate;
pub use list::run_list;
pub use rerender::run_rerender;
pub use resume::run_resume;
pub use show::run_show;

use crate::config::Settings;
use crate::task::{SqliteTaskStore, TaskStore};
use std::sync::Arc;

/// Open the task store without building the full pipeline (commands that
/// only read or delete records do not need API credentials).
fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn TaskStore>> {
    Ok(Arc::new(SqliteTaskStore::new(&settings.sqlite_path())?))
}
