//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials and knowledge sources are available before
//! starting operations that would otherwise fail midway.

use crate::config::{Credentials, Settings};
use crate::error::{GigmatchError, Result};
use crate::knowledge::Domain;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Loading needs the sources of the domains being loaded.
    Load(Option<Domain>),
    /// Queries bring both knowledge bases up to date first, so they need every source.
    Query,
    /// Inspecting the store needs credentials only.
    Inspect,
}

impl Operation {
    /// Domains whose knowledge source must exist.
    pub fn sources(&self) -> Vec<Domain> {
        match self {
            Operation::Load(Some(domain)) => vec![*domain],
            Operation::Load(None) | Operation::Query => Domain::ALL.to_vec(),
            Operation::Inspect => Vec::new(),
        }
    }
}

/// Run pre-flight checks for the given operation.
///
/// Returns the resolved credentials if all checks pass.
pub fn check(operation: Operation, settings: &Settings) -> Result<Credentials> {
    let credentials = Credentials::resolve(settings)?;
    check_sources(operation, settings)?;
    Ok(credentials)
}

/// Check every knowledge source the operation reads.
pub fn check_sources(operation: Operation, settings: &Settings) -> Result<()> {
    for domain in operation.sources() {
        check_source(settings, domain)?;
    }
    Ok(())
}

/// Check that a domain's knowledge source exists.
pub fn check_source(settings: &Settings, domain: Domain) -> Result<()> {
    let source = match domain {
        Domain::Artists => &settings.knowledge.artists,
        Domain::Venues => &settings.knowledge.venues,
    };
    let path = Settings::expand_path(&source.path);
    if path.exists() {
        Ok(())
    } else {
        Err(GigmatchError::SourceNotFound(path))
    }
}
