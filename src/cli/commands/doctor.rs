//! Doctor command - verify credentials, knowledge sources and the vector store.

use crate::app::open_store;
use crate::cli::Output;
use crate::config::{mask, resolve_secret, Credentials, ModelProvider, Settings, StoreProvider};
use crate::knowledge::{load_records, Domain};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("gigmatch doctor");
    println!();
    println!("Checking credentials, knowledge sources and the vector store...\n");

    let mut checks = Vec::new();

    println!("{}", style("Credentials").bold());
    let credential_checks = check_credentials(settings, |var| std::env::var(var).ok());
    print_all(&credential_checks);
    checks.extend(credential_checks);

    println!();

    println!("{}", style("Knowledge Sources").bold());
    let source_checks: Vec<_> = Domain::ALL
        .iter()
        .map(|domain| check_source(*domain, settings))
        .collect();
    print_all(&source_checks);
    checks.extend(source_checks);

    println!();

    println!("{}", style("Vector Store").bold());
    let store_check = check_store(settings).await;
    store_check.print();
    checks.push(store_check);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using gigmatch.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! gigmatch is ready to use.");
    }

    Ok(())
}

fn print_all(checks: &[CheckResult]) {
    for check in checks {
        check.print();
    }
}

/// Check the model and embedding API keys, and Qdrant when selected.
fn check_credentials<F>(settings: &Settings, lookup: F) -> Vec<CheckResult>
where
    F: Fn(&str) -> Option<String>,
{
    let mut results = Vec::new();

    let mut providers = vec![settings.model.provider];
    if settings.embedding.provider != settings.model.provider {
        providers.push(settings.embedding.provider);
    }

    for provider in providers {
        let explicit = match provider {
            ModelProvider::Gemini => settings.credentials.gemini_api_key.as_deref(),
            ModelProvider::OpenAi => settings.credentials.openai_api_key.as_deref(),
        };
        let env_var = provider.api_key_env();
        results.push(
            match resolve_secret(explicit, provider.credential_name(), env_var, &lookup) {
                Ok(key) => CheckResult::ok(env_var, &format!("configured ({})", mask(&key))),
                Err(_) => CheckResult::error(
                    env_var,
                    "not set",
                    &format!("Set with: export {}='...'", env_var),
                ),
            },
        );
    }

    if settings.vector_store.provider == StoreProvider::Qdrant {
        let url = resolve_secret(
            settings.vector_store.qdrant_url.as_deref(),
            "Qdrant URL",
            "QDRANT_URL",
            &lookup,
        );
        results.push(match url {
            Ok(url) => CheckResult::ok("QDRANT_URL", &url),
            Err(_) => CheckResult::error("QDRANT_URL", "not set", "Set with: export QDRANT_URL='https://...'"),
        });
        let key = resolve_secret(
            settings.vector_store.qdrant_api_key.as_deref(),
            "Qdrant API key",
            "QDRANT_API_KEY",
            &lookup,
        );
        results.push(match key {
            Ok(key) => CheckResult::ok("QDRANT_API_KEY", &format!("configured ({})", mask(&key))),
            Err(_) => CheckResult::error("QDRANT_API_KEY", "not set", "Set with: export QDRANT_API_KEY='...'"),
        });
    }

    results
}

/// Check that a knowledge source exists and parses.
fn check_source(domain: Domain, settings: &Settings) -> CheckResult {
    let source = match domain {
        Domain::Artists => &settings.knowledge.artists,
        Domain::Venues => &settings.knowledge.venues,
    };
    let path = Settings::expand_path(&source.path);
    let name = format!("{} ({})", domain, source.collection);
    check_source_path(&name, &path)
}

fn check_source_path(name: &str, path: &Path) -> CheckResult {
    if !path.exists() {
        return CheckResult::error(
            name,
            &format!("{} not found", path.display()),
            "Point knowledge.<domain>.path in the config at a JSON file or directory",
        );
    }
    match load_records(path) {
        Ok(records) => CheckResult::ok(name, &format!("{} records in {}", records.len(), path.display())),
        Err(e) => CheckResult::error(name, &e.to_string(), "Records must be JSON objects"),
    }
}

/// Check that the vector store opens and report its collections.
async fn check_store(settings: &Settings) -> CheckResult {
    let name = format!("{} store", settings.vector_store.provider);
    let credentials = match Credentials::resolve(settings) {
        Ok(credentials) => credentials,
        Err(_) => {
            return CheckResult::warning(&name, "skipped", "Fix the credentials above first");
        }
    };

    let store = match open_store(settings, &credentials) {
        Ok(store) => store,
        Err(e) => return CheckResult::error(&name, &e.to_string(), "Check the vector_store section of the config"),
    };

    match store.list_collections().await {
        Ok(collections) if collections.is_empty() => CheckResult::warning(
            &name,
            "no collections",
            "Index the knowledge bases with: gigmatch load",
        ),
        Ok(collections) => {
            let summary = collections
                .iter()
                .map(|c| format!("{} ({})", c.name, c.document_count))
                .collect::<Vec<_>>()
                .join(", ");
            CheckResult::ok(&name, &summary)
        }
        Err(e) => CheckResult::error(&name, &e.to_string(), "Check that the vector store is reachable"),
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: gigmatch config init",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let settings = Settings::default();
        let checks = check_credentials(&settings, |_| None);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].name, "GEMINIAPI_KEY");
        assert_eq!(checks[0].status, CheckStatus::Error);

        let checks = check_credentials(&settings, |_| Some("gm-test-key-123456".to_string()));
        assert_eq!(checks[0].status, CheckStatus::Ok);
        assert!(!checks[0].message.contains("test-key"));
    }

    #[test]
    fn test_source_checks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("venues.json");

        assert_eq!(check_source_path("venues", &path).status, CheckStatus::Error);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(check_source_path("venues", &path).status, CheckStatus::Error);

        std::fs::write(&path, r#"[{"name": "Blue Room"}, {"name": "Vega"}]"#).unwrap();
        let check = check_source_path("venues", &path);
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.message.starts_with("2 records"));
    }
}
