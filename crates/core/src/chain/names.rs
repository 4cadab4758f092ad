//! Key and alias naming rules.
//!
//! The engine only needs a predicate; the rule data (patterns, denylist) is
//! supplied by whoever hosts it. `DefaultNameRules` carries the stock tables.

use std::{collections::HashSet, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MAX_KEY_NAME_LEN: usize = 32;
pub const MAX_ALIAS_NAME_LEN: usize = 50;

static KEY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_+\-\[\]\\;',./`=~]+$").expect("static key pattern")
});

static ALIAS_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static alias pattern"));

/// Built-in game command names an alias must not shadow (lowercase).
pub static RESERVED_ALIAS_NAMES: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "alias",
        "bind",
        "unbind",
        "bind_load_file",
        "bind_save_file",
        "say",
        "team",
        "zone",
        "local",
        "fleet",
        "tell",
        "emote",
        "target",
        "target_enemy_near",
        "target_friend_near",
        "target_self",
        "target_clear",
        "target_teammate",
        "fireall",
        "firephasers",
        "firetorps",
        "firephaserstorps",
        "firemines",
        "power_exec",
        "stotrayexecbytray",
        "trayexecbytray",
        "trayexecbytraywithbackup",
        "throttleadjust",
        "throttleset",
        "fullimpulsetoggle",
        "camreset",
        "camdist",
        "camturntoface",
        "combatlog",
        "screenshot",
        "gensendmessage",
        "forward",
        "backward",
        "left",
        "right",
        "up",
        "down",
        "turnleft",
        "turnright",
        "autoforward",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    Empty,
    TooLong { len: usize, max: usize },
    InvalidCharacters(String),
    Reserved(String),
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::Empty => f.write_str("name is empty"),
            NameError::TooLong { len, max } => write!(f, "name is {len} chars (max {max})"),
            NameError::InvalidCharacters(n) => write!(f, "'{n}' contains invalid characters"),
            NameError::Reserved(n) => write!(f, "'{n}' is a reserved command name"),
        }
    }
}

impl std::error::Error for NameError {}

/// Naming-validation collaborator.
pub trait NameRules: Send + Sync {
    fn check_key_name(&self, name: &str) -> Result<(), NameError>;
    fn check_alias_name(&self, name: &str) -> Result<(), NameError>;

    fn is_valid_key_name(&self, name: &str) -> bool {
        self.check_key_name(name).is_ok()
    }
    fn is_valid_alias_name(&self, name: &str) -> bool {
        self.check_alias_name(name).is_ok()
    }
}

/// Overrides for the stock tables, loaded from JSON by hosts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameRulesConfig {
    /// Regex for key names (anchored by the caller).
    pub key_pattern: Option<String>,
    /// Regex for alias names.
    pub alias_pattern: Option<String>,
    /// Extra reserved alias names (added to the built-ins).
    #[serde(default)]
    pub reserved_aliases: Vec<String>,
    pub max_key_len: Option<usize>,
    pub max_alias_len: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DefaultNameRules {
    key_re: Regex,
    alias_re: Regex,
    reserved: HashSet<String>,
    max_key_len: usize,
    max_alias_len: usize,
}

impl Default for DefaultNameRules {
    fn default() -> Self {
        Self {
            key_re: KEY_NAME_RE.clone(),
            alias_re: ALIAS_NAME_RE.clone(),
            reserved: RESERVED_ALIAS_NAMES.clone(),
            max_key_len: MAX_KEY_NAME_LEN,
            max_alias_len: MAX_ALIAS_NAME_LEN,
        }
    }
}

impl DefaultNameRules {
    pub fn from_config(cfg: &NameRulesConfig) -> Result<Self, String> {
        let mut rules = Self::default();
        if let Some(p) = cfg.key_pattern.as_deref() {
            rules.key_re = Regex::new(p).map_err(|e| format!("key_pattern: {e}"))?;
        }
        if let Some(p) = cfg.alias_pattern.as_deref() {
            rules.alias_re = Regex::new(p).map_err(|e| format!("alias_pattern: {e}"))?;
        }
        rules.reserved.extend(
            cfg.reserved_aliases
                .iter()
                .map(|s| s.trim().to_ascii_lowercase()),
        );
        if let Some(n) = cfg.max_key_len {
            rules.max_key_len = n;
        }
        if let Some(n) = cfg.max_alias_len {
            rules.max_alias_len = n;
        }
        Ok(rules)
    }
}

impl NameRules for DefaultNameRules {
    fn check_key_name(&self, name: &str) -> Result<(), NameError> {
        check_len(name, self.max_key_len)?;
        if !self.key_re.is_match(name) {
            return Err(NameError::InvalidCharacters(name.to_string()));
        }
        Ok(())
    }

    fn check_alias_name(&self, name: &str) -> Result<(), NameError> {
        check_len(name, self.max_alias_len)?;
        if !self.alias_re.is_match(name) {
            return Err(NameError::InvalidCharacters(name.to_string()));
        }
        let bare = name.trim_start_matches('+').to_ascii_lowercase();
        if self.reserved.contains(&bare) {
            return Err(NameError::Reserved(name.to_string()));
        }
        Ok(())
    }
}

fn check_len(name: &str, max: usize) -> Result<(), NameError> {
    let len = name.chars().count();
    if len == 0 {
        return Err(NameError::Empty);
    }
    if len > max {
        return Err(NameError::TooLong { len, max });
    }
    Ok(())
}
