//! Load command implementation.

use super::open_context;
use crate::app::AppContext;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::knowledge::Domain;
use anyhow::Result;

/// Run the load command.
pub async fn run_load(recreate: bool, domain: Option<Domain>, settings: Settings) -> Result<()> {
    let app = open_context(Operation::Load(domain), settings)?;
    let outcome = load(&app, recreate, domain).await;
    app.shutdown().await?;
    outcome
}

async fn load(app: &AppContext, recreate: bool, domain: Option<Domain>) -> Result<()> {
    let what = match domain {
        Some(domain) => format!("{} knowledge base", domain),
        None => "knowledge bases".to_string(),
    };
    let spinner = Output::spinner(&format!("Loading {}...", what));
    let result = app.load_knowledge(recreate, domain).await;
    spinner.finish_and_clear();

    match result {
        Ok(reports) => {
            Output::success(&format!("Loaded {}", what));
            for report in &reports {
                Output::load_report(report);
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to load {}: {}", what, e));
            Err(e.into())
        }
    }
}
