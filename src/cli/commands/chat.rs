//! Interactive chat command with streamed answers.

use super::open_query_context;
use crate::agent::answer_text;
use crate::app::{AgentTarget, AppContext};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use console::style;
use futures::StreamExt;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(target: AgentTarget, settings: Settings) -> Result<()> {
    let app = open_query_context(settings).await?;
    let outcome = chat(&app, target).await;
    app.shutdown().await?;
    outcome
}

async fn chat(app: &AppContext, target: AgentTarget) -> Result<()> {
    let agent_name = app.agent(target).name().to_string();

    println!("\n{}", style("gigmatch chat").bold().cyan());
    println!(
        "{}\n",
        style(format!("Talking to {}. Type your questions, or 'exit' to quit.", agent_name)).dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        print!("\n{} ", style(format!("{}:", agent_name)).cyan().bold());
        stdout.flush()?;

        let answer = answer_text(app.stream_agent(target, input));
        futures::pin_mut!(answer);
        while let Some(text) = answer.next().await {
            match text {
                Ok(text) => {
                    print!("{}", text);
                    stdout.flush()?;
                }
                Err(e) => {
                    println!();
                    Output::error(&format!("Error: {}", e));
                    break;
                }
            }
        }
        println!("\n");
    }

    Ok(())
}
