//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod list;
mod load;
mod search;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use list::run_list;
pub use load::run_load;
pub use search::run_search;

use crate::app::AppContext;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;

/// Run pre-flight checks and build the application context.
fn open_context(operation: Operation, settings: Settings) -> anyhow::Result<AppContext> {
    let credentials = match preflight::check(operation, &settings) {
        Ok(credentials) => credentials,
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'gigmatch doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    };
    Ok(AppContext::with_credentials(settings, &credentials)?)
}

/// Open the context and bring both knowledge bases up to date before querying.
async fn open_query_context(settings: Settings) -> anyhow::Result<AppContext> {
    let app = open_context(Operation::Query, settings)?;

    let spinner = Output::spinner("Preparing knowledge bases...");
    let loaded = app.load_knowledge(false, None).await;
    spinner.finish_and_clear();

    match loaded {
        Ok(reports) => {
            for report in reports.iter().filter(|r| r.embedded > 0 || r.removed > 0) {
                Output::load_report(report);
            }
            Ok(app)
        }
        Err(e) => {
            Output::error(&format!("Failed to load knowledge bases: {}", e));
            app.shutdown().await?;
            Err(e.into())
        }
    }
}
