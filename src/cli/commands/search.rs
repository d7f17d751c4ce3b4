//! Search command implementation.

use super::open_query_context;
use crate::app::AppContext;
use crate::cli::Output;
use crate::config::Settings;
use crate::knowledge::Domain;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    domain: Domain,
    query: &str,
    limit: usize,
    min_score: Option<f32>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(min_score) = min_score {
        settings.knowledge.min_score = min_score;
    }
    let app = open_query_context(settings).await?;
    let outcome = search(&app, domain, query, limit).await;
    app.shutdown().await?;
    outcome
}

async fn search(app: &AppContext, domain: Domain, query: &str, limit: usize) -> Result<()> {
    let spinner = Output::spinner(&format!("Searching {}...", domain));
    let results = app.knowledge(domain).search(query, Some(limit)).await;
    spinner.finish_and_clear();

    match results {
        Ok(hits) => {
            if hits.is_empty() {
                Output::warning("No records found matching your query.");
            } else {
                Output::success(&format!("Found {} {}", hits.len(), domain));
                for (i, hit) in hits.iter().enumerate() {
                    Output::search_hit(i + 1, hit);
                }
                println!();
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            Err(e.into())
        }
    }
}
