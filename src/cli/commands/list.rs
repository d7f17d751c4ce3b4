//! List command implementation.

use crate::app::open_store;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let credentials = preflight::check(Operation::Inspect, &settings)?;
    let store = open_store(&settings, &credentials)?;

    match store.list_collections().await {
        Ok(collections) => {
            if collections.is_empty() {
                Output::info("No collections yet. Use 'gigmatch load' to index the knowledge bases.");
            } else {
                Output::header(&format!("Collections ({})", collections.len()));
                println!();

                for info in &collections {
                    let dims = info
                        .dimensions
                        .map(|d| format!("{} dims", d))
                        .unwrap_or_else(|| "empty".to_string());
                    Output::kv(&info.name, &format!("{} documents, {}", info.document_count, dims));
                }

                let total: usize = collections.iter().map(|c| c.document_count).sum();
                println!();
                Output::kv("Total documents", &total.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list collections: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
