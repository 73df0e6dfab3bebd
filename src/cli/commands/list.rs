//! List command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let tasks = store.list().await?;

    if tasks.is_empty() {
        Output::info("No tasks yet. Use 'recast generate <source>' to create one.");
        return Ok(());
    }

    Output::header(&format!("Tasks ({})", tasks.len()));
    println!();
    for task in &tasks {
        Output::task_line(task);
    }

    Ok(())
}
