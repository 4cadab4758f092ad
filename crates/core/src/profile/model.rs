//! Canonical in-memory profile.
//!
//! Every command list here is a plain `Vec<String>`. A `Profile` can only be
//! built from a [`ProfileDocument`] whose shapes are already canonical; the
//! conversion fails loudly otherwise, since it means normalization was skipped.

use std::fmt;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::chain::parser::ParseResult;
use crate::profile::stored::{
    AliasRecord, ChainMetadata, ProfileDocument, StoredAlias, StoredBuild, StoredCommands,
};
use crate::profile::versions::CURRENT_VERSION;

pub const SPACE: &str = "space";
pub const GROUND: &str = "ground";

/// Environments every new profile starts with.
pub const ENVIRONMENTS: [&str; 2] = [SPACE, GROUND];

pub type Chain = Vec<String>;
pub type Keybinds = IndexMap<String, Chain>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Alias {
    pub commands: Chain,
    pub description: Option<String>,
    /// Stored `type` tag, carried through untouched.
    pub kind: Option<String>,
    /// Fields of the stored record this model does not know about.
    pub extra: Map<String, Value>,
}

impl Alias {
    pub fn new(commands: Chain) -> Self {
        Self {
            commands,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub description: Option<String>,
    pub current_environment: String,
    /// Environment → key → chain.
    pub builds: IndexMap<String, Keybinds>,
    /// Shared by all environments.
    pub aliases: IndexMap<String, Alias>,
    pub keybind_metadata: IndexMap<String, IndexMap<String, ChainMetadata>>,
    pub alias_metadata: IndexMap<String, ChainMetadata>,
    pub migration_version: Option<String>,
    pub created: Option<String>,
    pub last_modified: Option<String>,
    /// Environment → unknown fields of its stored build (only non-empty ones).
    pub build_extra: IndexMap<String, Map<String, Value>>,
    pub extra: Map<String, Value>,
}

/// A `ProfileDocument` still holds a shape the canonical contract forbids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    LegacyKeys,
    NonCanonicalKeybind { environment: String, key: String },
    NonCanonicalAlias(String),
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractError::LegacyKeys => {
                f.write_str("profile still has pre-2.0 top-level keys; normalize it first")
            }
            ContractError::NonCanonicalKeybind { environment, key } => write!(
                f,
                "keybind {environment}/{key} is not canonical; normalize the profile first"
            ),
            ContractError::NonCanonicalAlias(name) => {
                write!(f, "alias '{name}' is not canonical; normalize the profile first")
            }
        }
    }
}

impl std::error::Error for ContractError {}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Profile {
            name: name.into(),
            description: None,
            current_environment: SPACE.to_string(),
            builds: ENVIRONMENTS
                .iter()
                .map(|e| (e.to_string(), Keybinds::new()))
                .collect(),
            aliases: IndexMap::new(),
            keybind_metadata: IndexMap::new(),
            alias_metadata: IndexMap::new(),
            migration_version: Some(CURRENT_VERSION.to_string()),
            created: Some(now.clone()),
            last_modified: Some(now),
            build_extra: IndexMap::new(),
            extra: Map::new(),
        }
    }

    #[inline]
    pub fn keybinds(&self, environment: &str) -> Option<&Keybinds> {
        self.builds.get(environment)
    }

    pub fn keybinds_mut(&mut self, environment: &str) -> &mut Keybinds {
        self.builds.entry(environment.to_string()).or_default()
    }

    /// Bind `key` in `environment`; replaces any previous chain.
    pub fn set_keybind(&mut self, environment: &str, key: &str, chain: Chain) {
        self.keybinds_mut(environment).insert(key.to_string(), chain);
    }

    pub fn set_alias(&mut self, name: &str, alias: Alias) {
        self.aliases.insert(name.to_string(), alias);
    }

    pub fn is_key_stabilized(&self, environment: &str, key: &str) -> bool {
        self.keybind_metadata
            .get(environment)
            .and_then(|m| m.get(key))
            .is_some_and(|m| m.stabilize_execution_order)
    }

    pub fn is_alias_stabilized(&self, name: &str) -> bool {
        self.alias_metadata
            .get(name)
            .is_some_and(|m| m.stabilize_execution_order)
    }

    pub fn set_key_stabilized(&mut self, environment: &str, key: &str, on: bool) {
        self.keybind_metadata
            .entry(environment.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .stabilize_execution_order = on;
    }

    pub fn set_alias_stabilized(&mut self, name: &str, on: bool) {
        self.alias_metadata
            .entry(name.to_string())
            .or_default()
            .stabilize_execution_order = on;
    }

    /// Merge an imported file into `environment`. Later declarations win.
    ///
    /// Chains the parser collapsed from a mirrored form are flagged so the
    /// export mirrors them again. Returns the number of entries merged.
    pub fn apply_parse_result(&mut self, environment: &str, result: ParseResult) -> usize {
        let mut merged = 0;
        for (key, chain) in result.keybinds {
            let stabilized = result.stabilized_keys.contains(&key);
            self.set_keybind(environment, &key, chain);
            if stabilized || self.is_key_stabilized(environment, &key) {
                self.set_key_stabilized(environment, &key, stabilized);
            }
            merged += 1;
        }
        for (name, commands) in result.aliases {
            let stabilized = result.stabilized_aliases.contains(&name);
            self.aliases.entry(name.clone()).or_default().commands = commands;
            if stabilized || self.is_alias_stabilized(&name) {
                self.set_alias_stabilized(&name, stabilized);
            }
            merged += 1;
        }
        if merged > 0 {
            self.touch();
        }
        merged
    }

    pub fn touch(&mut self) {
        self.last_modified = Some(Utc::now().to_rfc3339());
    }
}

impl TryFrom<ProfileDocument> for Profile {
    type Error = ContractError;

    fn try_from(doc: ProfileDocument) -> Result<Self, Self::Error> {
        if doc.keys.is_some() {
            return Err(ContractError::LegacyKeys);
        }

        let mut builds = IndexMap::with_capacity(doc.builds.len());
        let mut build_extra = IndexMap::new();
        for (env, build) in doc.builds {
            let mut keys = Keybinds::with_capacity(build.keys.len());
            for (key, stored) in &build.keys {
                let Some(cmds) = stored.as_canonical() else {
                    return Err(ContractError::NonCanonicalKeybind {
                        environment: env.clone(),
                        key: key.clone(),
                    });
                };
                keys.insert(key.clone(), cmds.into_iter().map(str::to_string).collect());
            }
            if !build.extra.is_empty() {
                build_extra.insert(env.clone(), build.extra);
            }
            builds.insert(env, keys);
        }

        let mut aliases = IndexMap::with_capacity(doc.aliases.len());
        for (name, stored) in doc.aliases {
            let StoredAlias::Record(record) = stored else {
                return Err(ContractError::NonCanonicalAlias(name));
            };
            let Some(cmds) = record.commands.as_canonical() else {
                return Err(ContractError::NonCanonicalAlias(name));
            };
            let commands = cmds.into_iter().map(str::to_string).collect();
            let alias = Alias {
                commands,
                description: record.description,
                kind: record.kind,
                extra: record.extra,
            };
            aliases.insert(name, alias);
        }

        Ok(Profile {
            name: doc.name.unwrap_or_default(),
            description: doc.description,
            current_environment: doc
                .current_environment
                .unwrap_or_else(|| SPACE.to_string()),
            builds,
            aliases,
            keybind_metadata: doc.keybind_metadata,
            alias_metadata: doc.alias_metadata,
            migration_version: doc.migration_version,
            created: doc.created,
            last_modified: doc.last_modified,
            build_extra,
            extra: doc.extra,
        })
    }
}

impl From<Profile> for ProfileDocument {
    fn from(mut p: Profile) -> Self {
        ProfileDocument {
            name: Some(p.name),
            description: p.description,
            current_environment: Some(p.current_environment),
            mode: None,
            keys: None,
            builds: p
                .builds
                .into_iter()
                .map(|(env, keys)| {
                    let keys = keys
                        .into_iter()
                        .map(|(k, chain)| (k, StoredCommands::canonical(chain)))
                        .collect();
                    let extra = p.build_extra.shift_remove(&env).unwrap_or_default();
                    (env, StoredBuild { keys, extra })
                })
                .collect(),
            aliases: p
                .aliases
                .into_iter()
                .map(|(name, a)| {
                    let record = AliasRecord {
                        commands: StoredCommands::canonical(a.commands),
                        description: a.description,
                        kind: a.kind,
                        extra: a.extra,
                    };
                    (name, StoredAlias::Record(record))
                })
                .collect(),
            keybind_metadata: p.keybind_metadata,
            alias_metadata: p.alias_metadata,
            migration_version: p.migration_version,
            created: p.created,
            last_modified: p.last_modified,
            extra: p.extra,
        }
    }
}
