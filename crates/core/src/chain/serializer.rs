//! Keybind file writer, the inverse of [`crate::chain::parser`].
//!
//! Output layout:
//! ```text
//! # keybind-chain/1
//! # profile: Main
//! # environment: space
//! # generated: 2026-01-01T00:00:00+00:00
//!
//! F1 "FireAll $$ +STOTrayExecByTray 0 1"
//!
//! # fire everything
//! alias attack "FireAll"
//! ```
//! Every chain is wrapped in double quotes, single commands included.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};

use crate::chain::mirror::mirror_chain;
use crate::chain::names::{DefaultNameRules, NameRules};
use crate::chain::tokenizer::{contains_unquoted_separator, join_chain, split_chain};
use crate::core_log::{self, CoreLog};
use crate::profile::model::Profile;

/// First header line of every exported file.
pub const FORMAT_MARKER: &str = "keybind-chain/1";

/// The profile handed to the serializer breaks the canonical contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    InvalidKeyName(String),
    InvalidAliasName(String),
    InvalidCommand {
        owner: String,
        command: String,
        reason: &'static str,
    },
}

impl fmt::Display for SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializeError::InvalidKeyName(k) => write!(f, "key name '{k}' cannot be written"),
            SerializeError::InvalidAliasName(a) => {
                write!(f, "alias name '{a}' cannot be written")
            }
            SerializeError::InvalidCommand {
                owner,
                command,
                reason,
            } => write!(f, "{owner}: command '{command}' {reason}"),
        }
    }
}

impl std::error::Error for SerializeError {}

#[derive(Clone)]
pub struct ChainSerializer {
    environment: Option<String>,
    generated_at: Option<DateTime<Utc>>,
    header: bool,
    rules: Arc<dyn NameRules>,
    logger: Arc<dyn CoreLog>,
}

impl Default for ChainSerializer {
    fn default() -> Self {
        Self {
            environment: None,
            generated_at: None,
            header: true,
            rules: Arc::new(DefaultNameRules::default()),
            logger: core_log::noop(),
        }
    }
}

impl ChainSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment whose keybinds are written. Defaults to the profile's current one.
    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.environment = Some(env.into());
        self
    }

    /// Fixed timestamp for the header (defaults to now).
    pub fn generated_at(mut self, ts: DateTime<Utc>) -> Self {
        self.generated_at = Some(ts);
        self
    }

    pub fn header(mut self, on: bool) -> Self {
        self.header = on;
        self
    }

    /// Naming rules the written names must satisfy. Use the same rules as the
    /// parser that will read the file back.
    pub fn with_rules(mut self, rules: Arc<dyn NameRules>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_logger(mut self, logger: &Arc<dyn CoreLog>) -> Self {
        self.logger = Arc::clone(logger);
        self
    }

    pub fn serialize(&self, profile: &Profile) -> Result<String, SerializeError> {
        let env = self
            .environment
            .as_deref()
            .unwrap_or(&profile.current_environment);
        let mut out = String::new();

        if self.header {
            let ts = self.generated_at.unwrap_or_else(Utc::now);
            out.push_str(&format!("# {FORMAT_MARKER}\n"));
            out.push_str(&format!("# profile: {}\n", one_line(&profile.name)));
            out.push_str(&format!("# environment: {}\n", one_line(env)));
            out.push_str(&format!("# generated: {}\n", ts.to_rfc3339()));
        }

        let mut written_keys = 0;
        match profile.keybinds(env) {
            Some(keys) if !keys.is_empty() => {
                out.push('\n');
                for (key, chain) in keys {
                    self.check_key_name(key)?;
                    if chain.is_empty() {
                        self.logger
                            .debug(&format!("[serialize] skipping '{key}': empty chain"));
                        continue;
                    }
                    let body = if profile.is_key_stabilized(env, key) {
                        chain_body(key, &mirror_chain(chain))?
                    } else {
                        chain_body(key, chain)?
                    };
                    out.push_str(&format!("{key} \"{body}\"\n"));
                    written_keys += 1;
                }
            }
            _ => self
                .logger
                .debug(&format!("[serialize] no keybinds in environment '{env}'")),
        }

        let mut written_aliases = 0;
        if !profile.aliases.is_empty() {
            out.push('\n');
        }
        for (name, alias) in &profile.aliases {
            self.check_alias_name(name)?;
            if alias.commands.is_empty() {
                self.logger
                    .debug(&format!("[serialize] skipping alias '{name}': empty chain"));
                continue;
            }
            let body = if profile.is_alias_stabilized(name) {
                chain_body(name, &mirror_chain(&alias.commands))?
            } else {
                chain_body(name, &alias.commands)?
            };
            if let Some(desc) = alias.description.as_deref() {
                for line in desc.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    out.push_str(&format!("# {line}\n"));
                }
            }
            out.push_str(&format!("alias {name} \"{body}\"\n"));
            written_aliases += 1;
        }

        self.logger.info(&format!(
            "[serialize] '{}' ({env}): {written_keys} keybinds, {written_aliases} aliases",
            profile.name
        ));
        Ok(out)
    }
}

/// Serialize the profile's current environment with default options.
pub fn serialize_profile(profile: &Profile) -> Result<String, SerializeError> {
    ChainSerializer::default().serialize(profile)
}

fn one_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

fn is_writable_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('#')
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'')
}

impl ChainSerializer {
    fn check_key_name(&self, key: &str) -> Result<(), SerializeError> {
        let keyword = ["alias", "bind", "/bind"]
            .iter()
            .any(|k| key.eq_ignore_ascii_case(k));
        if keyword || !is_writable_name(key) || !self.rules.is_valid_key_name(key) {
            return Err(SerializeError::InvalidKeyName(key.to_string()));
        }
        Ok(())
    }

    fn check_alias_name(&self, name: &str) -> Result<(), SerializeError> {
        if !is_writable_name(name) || !self.rules.is_valid_alias_name(name) {
            return Err(SerializeError::InvalidAliasName(name.to_string()));
        }
        Ok(())
    }
}

/// Join a chain for the wire, refusing anything the parser would read back differently.
fn chain_body(owner: &str, commands: &[String]) -> Result<String, SerializeError> {
    let invalid = |command: &str, reason| SerializeError::InvalidCommand {
        owner: owner.to_string(),
        command: command.to_string(),
        reason,
    };

    for c in commands {
        if c.trim().is_empty() {
            return Err(invalid(c, "is empty"));
        }
        if c.contains(['\r', '\n']) {
            return Err(invalid(c, "contains a line break"));
        }
        if c.trim() != c {
            return Err(invalid(c, "has surrounding whitespace"));
        }
        if contains_unquoted_separator(c) {
            return Err(invalid(c, "contains an unquoted chain separator"));
        }
    }

    let body = join_chain(commands);
    if split_chain(&body) != commands {
        let first = commands.first().map(String::as_str).unwrap_or("");
        return Err(invalid(first, "does not survive a reparse (unbalanced quotes?)"));
    }
    Ok(body)
}
