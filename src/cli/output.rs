//! CLI output formatting utilities.

use crate::agent::{ContentPayload, ContentStage, RunEvent};
use crate::knowledge::{KnowledgeHit, LoadReport};
use crate::scoring::ScoredMatch;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print the outcome of a knowledge base load.
    pub fn load_report(report: &LoadReport) {
        println!(
            "  {} {} ({} records: {} embedded, {} unchanged, {} removed)",
            style("*").cyan(),
            style(&report.collection).bold(),
            report.records,
            report.embedded,
            report.skipped,
            report.removed
        );
    }

    /// Print a knowledge search hit.
    pub fn search_hit(rank: usize, hit: &KnowledgeHit) {
        let name = hit.record.name().unwrap_or("(unnamed)");
        println!(
            "\n{} {}. {} (score: {:.2})",
            style(">>").green(),
            rank,
            style(name).bold(),
            hit.score
        );
        for (key, value) in hit.record.fields() {
            if key == "name" {
                continue;
            }
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("   {}: {}", style(key).dim(), content_preview(&value, 120));
        }
    }

    /// Print the ranking of scored matches.
    pub fn ranking(matches: &[ScoredMatch]) {
        Output::header("Match Scores");
        println!("{}", crate::scoring::render_ranking_table(matches));
    }

    /// Print a streamed run event.
    ///
    /// Final-answer text goes to stdout as it arrives. Tool calls and member
    /// findings are shown dimmed on stderr.
    pub fn run_event(event: &RunEvent) {
        match event {
            RunEvent::Content(chunk) => match (&chunk.stage, &chunk.payload) {
                (ContentStage::FinalAnswer, ContentPayload::Text(text)) => {
                    print!("{}", text);
                    std::io::stdout().flush().ok();
                }
                (ContentStage::Intermediate, ContentPayload::Text(text)) => {
                    eprintln!(
                        "  {} {}",
                        style(format!("[{}]", chunk.agent)).dim(),
                        style(content_preview(text, 160)).dim()
                    );
                }
                (_, ContentPayload::Structured(value)) => {
                    eprintln!("  {} {}", style("[score]").dim(), style(value).dim());
                }
            },
            RunEvent::ToolCallStarted {
                agent,
                name,
                arguments,
            } => {
                eprintln!(
                    "  {} {}({})",
                    style(format!("[{}]", agent)).dim(),
                    style(name).cyan(),
                    style(content_preview(arguments, 100)).dim()
                );
            }
            RunEvent::ToolCallCompleted { .. } | RunEvent::RunStarted { .. } => {}
            RunEvent::RunCompleted { .. } => println!(),
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(spinner_style);
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("short", 10), "short");
        assert_eq!(content_preview("line one\nline two", 100), "line one line two");
        assert_eq!(content_preview("Café Oslo", 4), "Café...");
    }
}
