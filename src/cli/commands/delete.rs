//! Delete command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use uuid::Uuid;

/// Run the delete command. Removes the task record; artifact files on
/// disk are removed as well.
pub async fn run_delete(id: Uuid, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    store.delete(id).await?;

    let artifacts = settings.data_dir().join("tasks").join(id.to_string());
    if artifacts.exists() {
        std::fs::remove_dir_all(&artifacts)?;
    }

    Output::success(&format!("Deleted task {}", id));
    Ok(())
}
