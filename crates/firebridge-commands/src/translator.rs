//! Command identifier resolution

use crate::spec::CommandSpec;
use crate::table::COMMANDS;
use firebridge_core::CommandError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of dynamically parsed app launch identifiers
pub const CUSTOM_APP_PREFIX: &str = "custom_app:";

/// One or more dot-separated tokens of `[A-Za-z0-9_]+`
static PACKAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$").expect("valid regex"));

/// Resolution errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Not in the table and not a well-formed `custom_app:` identifier
    #[error("Invalid command: {0:?}")]
    InvalidCommand(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

impl From<ResolveError> for CommandError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidCommand(literal) => CommandError::InvalidCommand(literal),
        }
    }
}

/// Whether `package` is an acceptable Android package name
pub fn is_valid_package(package: &str) -> bool {
    PACKAGE_REGEX.is_match(package)
}

/// Maps command identifiers to [`CommandSpec`]s
///
/// Built once; lookups are read-only and the translator can be shared freely.
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    index: HashMap<&'static str, &'static CommandSpec>,
}

impl Default for CommandTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTranslator {
    /// Index the static command table
    pub fn new() -> Self {
        let index = COMMANDS
            .iter()
            .map(|spec| (&*spec.identifier, spec))
            .collect();
        Self { index }
    }

    /// Resolve an identifier
    ///
    /// Exact table match first, then the `custom_app:<package>` grammar. The
    /// offending literal is returned on failure; no default is substituted.
    pub fn resolve(&self, identifier: &str) -> ResolveResult<CommandSpec> {
        if let Some(spec) = self.index.get(identifier) {
            return Ok((*spec).clone());
        }

        if let Some(package) = identifier.strip_prefix(CUSTOM_APP_PREFIX) {
            if is_valid_package(package) {
                debug!("Resolved custom app launch for {}", package);
                return Ok(CommandSpec::custom_app(
                    identifier.to_string(),
                    package.to_string(),
                ));
            }
            warn!("Rejected custom app identifier with invalid package: {:?}", package);
        } else {
            warn!("Unknown command identifier: {:?}", identifier);
        }

        Err(ResolveError::InvalidCommand(identifier.to_string()))
    }

    /// The fixed vocabulary, in table order
    pub fn identifiers(&self) -> impl Iterator<Item = &'static str> {
        COMMANDS.iter().map(|spec| &*spec.identifier)
    }

    /// The static table entries, in table order
    pub fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }
}
