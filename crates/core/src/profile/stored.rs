//! Stored profile documents of any vintage.
//!
//! Older versions of the tool persisted command lists in several shapes. They
//! are resolved once, here, into explicit variants:
//! - `"FireAll"` or `"A$$B$$C"` → [`StoredCommands::Text`]
//! - `["A", {"command": "B", "text": "..."}]` → [`StoredCommands::List`]
//! - anything else (`null`, numbers, objects) → [`StoredCommands::Malformed`]
//!
//! Everything downstream of the normalizer sees only the canonical shape:
//! `List` of `Plain`, trimmed, non-empty, no unquoted separator.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chain::tokenizer::contains_unquoted_separator;

/// Per-chain flags kept next to keybinds/aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    #[serde(default)]
    pub stabilize_execution_order: bool,
}

/// A command list as found in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum StoredCommands {
    /// A bare command or a legacy `$$`-joined string.
    Text(String),
    List(Vec<StoredCommand>),
    Malformed(Value),
}

/// One element of a stored command list.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredCommand {
    Plain(String),
    /// Rich object: `command` plus display metadata (`text`, `icon`, `type`, ...).
    Rich(Map<String, Value>),
    Malformed(Value),
}

impl Default for StoredCommands {
    fn default() -> Self {
        StoredCommands::List(Vec::new())
    }
}

impl From<Value> for StoredCommands {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => StoredCommands::Text(s),
            Value::Array(items) => {
                StoredCommands::List(items.into_iter().map(StoredCommand::from).collect())
            }
            other => StoredCommands::Malformed(other),
        }
    }
}

impl From<StoredCommands> for Value {
    fn from(c: StoredCommands) -> Self {
        match c {
            StoredCommands::Text(s) => Value::String(s),
            StoredCommands::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            StoredCommands::Malformed(v) => v,
        }
    }
}

impl From<Value> for StoredCommand {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => StoredCommand::Plain(s),
            Value::Object(m) => StoredCommand::Rich(m),
            other => StoredCommand::Malformed(other),
        }
    }
}

impl From<StoredCommand> for Value {
    fn from(c: StoredCommand) -> Self {
        match c {
            StoredCommand::Plain(s) => Value::String(s),
            StoredCommand::Rich(m) => Value::Object(m),
            StoredCommand::Malformed(v) => v,
        }
    }
}

/// True if `cmd` is a valid element of a canonical chain.
pub fn is_canonical_command(cmd: &str) -> bool {
    !cmd.is_empty() && cmd.trim() == cmd && !contains_unquoted_separator(cmd)
}

impl StoredCommands {
    /// Wrap an already-canonical command list.
    pub fn canonical(commands: Vec<String>) -> Self {
        StoredCommands::List(commands.into_iter().map(StoredCommand::Plain).collect())
    }

    /// Borrow the commands if this is already the canonical shape.
    pub fn as_canonical(&self) -> Option<Vec<&str>> {
        let StoredCommands::List(items) = self else {
            return None;
        };
        items
            .iter()
            .map(|c| match c {
                StoredCommand::Plain(s) if is_canonical_command(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    #[inline]
    pub fn is_canonical(&self) -> bool {
        self.as_canonical().is_some()
    }
}

/// Alias entry as found in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum StoredAlias {
    Record(AliasRecord),
    /// Very old documents stored the command list directly.
    Bare(StoredCommands),
    Malformed(Value),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AliasRecord {
    pub commands: StoredCommands,
    pub description: Option<String>,
    /// Internal type tag (`"vfx-alias"` for generated aliases).
    pub kind: Option<String>,
    pub extra: Map<String, Value>,
}

impl From<Value> for StoredAlias {
    fn from(v: Value) -> Self {
        match v {
            Value::Object(mut m) => {
                let commands = m
                    .remove("commands")
                    .map(StoredCommands::from)
                    .unwrap_or_default();
                let description = take_string(&mut m, "description");
                let kind = take_string(&mut m, "type");
                StoredAlias::Record(AliasRecord {
                    commands,
                    description,
                    kind,
                    extra: m,
                })
            }
            v @ (Value::String(_) | Value::Array(_)) => StoredAlias::Bare(StoredCommands::from(v)),
            other => StoredAlias::Malformed(other),
        }
    }
}

/// Remove `key` only if it holds a string; other values stay in `extra`.
fn take_string(m: &mut Map<String, Value>, key: &str) -> Option<String> {
    match m.get(key) {
        Some(Value::String(_)) => match m.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

impl From<StoredAlias> for Value {
    fn from(a: StoredAlias) -> Self {
        match a {
            StoredAlias::Record(r) => {
                let mut m = Map::new();
                m.insert("commands".into(), Value::from(r.commands));
                if let Some(d) = r.description {
                    m.insert("description".into(), Value::String(d));
                }
                if let Some(k) = r.kind {
                    m.insert("type".into(), Value::String(k));
                }
                m.extend(r.extra);
                Value::Object(m)
            }
            StoredAlias::Bare(c) => Value::from(c),
            StoredAlias::Malformed(v) => v,
        }
    }
}

impl StoredAlias {
    pub fn is_canonical(&self) -> bool {
        matches!(self, StoredAlias::Record(r) if r.commands.is_canonical())
    }

    pub fn record(&self) -> Option<&AliasRecord> {
        match self {
            StoredAlias::Record(r) => Some(r),
            _ => None,
        }
    }
}

/// One environment's keybinds as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoredBuild {
    #[serde(default)]
    pub keys: IndexMap<String, StoredCommands>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A persisted profile of unknown vintage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_environment: Option<String>,

    /// Pre-2.0: environment of the flat `keys` map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Pre-2.0: keybinds stored at the top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<IndexMap<String, StoredCommands>>,

    #[serde(default)]
    pub builds: IndexMap<String, StoredBuild>,
    #[serde(default)]
    pub aliases: IndexMap<String, StoredAlias>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub keybind_metadata: IndexMap<String, IndexMap<String, ChainMetadata>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub alias_metadata: IndexMap<String, ChainMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// Unknown fields, kept so a rewrite never loses data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileDocument {
    pub fn from_json(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| format!("deserialize profile: {e}"))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("serialize profile: {e}"))
    }

    /// True if every keybind and alias already has the canonical shape.
    pub fn has_canonical_shapes(&self) -> bool {
        self.keys.is_none()
            && self
                .builds
                .values()
                .all(|b| b.keys.values().all(StoredCommands::is_canonical))
            && self.aliases.values().all(StoredAlias::is_canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resolves_command_shapes() {
        assert_eq!(
            StoredCommands::from(json!("FireAll")),
            StoredCommands::Text("FireAll".into())
        );
        let list = StoredCommands::from(json!(["A", {"command": "B", "icon": "b.png"}, null, 3]));
        let StoredCommands::List(items) = list else {
            panic!("expected list");
        };
        assert!(matches!(items[0], StoredCommand::Plain(_)));
        assert!(matches!(items[1], StoredCommand::Rich(_)));
        assert_eq!(items[2], StoredCommand::Malformed(Value::Null));
        assert_eq!(items[3], StoredCommand::Malformed(json!(3)));
        assert_eq!(
            StoredCommands::from(Value::Null),
            StoredCommands::Malformed(Value::Null)
        );
    }

    #[test]
    fn canonical_check() {
        assert!(StoredCommands::canonical(vec!["A".into(), "say \"x $$ y\"".into()]).is_canonical());
        assert!(StoredCommands::default().is_canonical());
        assert!(!StoredCommands::Text("A".into()).is_canonical());
        assert!(!StoredCommands::from(json!(["A$$B"])).is_canonical());
        assert!(!StoredCommands::from(json!([" A"])).is_canonical());
        assert!(!StoredCommands::from(json!([""])).is_canonical());
    }

    #[test]
    fn alias_shapes_and_roundtrip() {
        let v = json!({"commands": ["A"], "description": "d", "type": "vfx-alias", "x": 1});
        let a = StoredAlias::from(v.clone());
        let r = a.record().unwrap();
        assert_eq!(r.kind.as_deref(), Some("vfx-alias"));
        assert_eq!(r.extra.get("x"), Some(&json!(1)));
        assert_eq!(Value::from(a), v);

        assert!(matches!(StoredAlias::from(json!("A$$B")), StoredAlias::Bare(_)));
        assert!(matches!(StoredAlias::from(Value::Null), StoredAlias::Malformed(_)));
    }

    #[test]
    fn document_keeps_unknown_fields() {
        let text = r#"{
            "name": "Main",
            "builds": {"space": {"keys": {"F1": ["FireAll"]}}},
            "aliases": {},
            "migrationVersion": "2.1.1",
            "theme": "dark"
        }"#;
        let doc = ProfileDocument::from_json(text).unwrap();
        assert!(doc.has_canonical_shapes());
        assert_eq!(doc.extra.get("theme"), Some(&json!("dark")));
        let back: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(back["theme"], json!("dark"));
        assert_eq!(back["builds"]["space"]["keys"]["F1"], json!(["FireAll"]));
    }
}
