//! Versioned migration steps.
//!
//! Each step is tagged with the schema version it brings a document up to and
//! runs only when the document's tag is older. [`canonicalize_shapes`] also
//! runs unconditionally afterwards as a shape guard, so a document carrying
//! the current tag but holding legacy shapes still comes out canonical.

use std::{fmt, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::chain::tokenizer::split_chain;
use crate::core_log::CoreLog;
use crate::profile::model::SPACE;
use crate::profile::stored::{
    AliasRecord, ProfileDocument, StoredAlias, StoredCommand, StoredCommands,
};
use crate::profile::versions::SchemaVersion;
use crate::signature::{CommandCategory, Parameters, build_optimized, params::tray_params_from_map};

static VFX_ALIAS_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^dynFxSetFXExclusionList_").expect("static vfx pattern"));

static BINDSET_ALIAS_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sto_kb_bindset_enable_[A-Za-z0-9_]+$").expect("static bindset pattern")
});

/// Type tag carried by generated VFX suppression aliases.
pub const VFX_ALIAS_TYPE: &str = "vfx-alias";

const LOADER_TYPO: &str = "bind_laod_file";
const LOADER_FIXED: &str = "bind_load_file";

/// An entry the normalizer could not interpret. It was reduced to an empty
/// chain (or dropped from its list) and normalization carried on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    /// Dotted path into the document, e.g. `builds.space.keys.F1[2]`.
    pub location: String,
    pub reason: String,
}

impl fmt::Display for MalformedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.reason)
    }
}

/// Mutable state shared by the steps of one normalization run.
pub struct StepContext<'a> {
    pub malformed: Vec<MalformedEntry>,
    logger: &'a Arc<dyn CoreLog>,
}

impl<'a> StepContext<'a> {
    pub fn new(logger: &'a Arc<dyn CoreLog>) -> Self {
        Self {
            malformed: Vec::new(),
            logger,
        }
    }

    fn malformed(&mut self, location: String, reason: impl Into<String>) {
        let entry = MalformedEntry {
            location,
            reason: reason.into(),
        };
        self.logger.warn(&format!("[normalize] malformed entry {entry}"));
        self.malformed.push(entry);
    }

    fn debug(&self, msg: &str) {
        self.logger.debug(msg);
    }
}

pub struct MigrationStep {
    /// Version a document is at once this step has run.
    pub version: SchemaVersion,
    pub name: &'static str,
    apply: fn(&mut ProfileDocument, &mut StepContext<'_>) -> bool,
}

impl MigrationStep {
    /// Run the step; true if the document changed.
    pub fn apply(&self, doc: &mut ProfileDocument, cx: &mut StepContext<'_>) -> bool {
        (self.apply)(doc, cx)
    }
}

/// All steps, oldest first.
pub const MIGRATIONS: &[MigrationStep] = &[
    MigrationStep {
        version: SchemaVersion::new(2, 0, 0),
        name: "canonical-commands",
        apply: canonicalize_shapes,
    },
    MigrationStep {
        version: SchemaVersion::new(2, 1, 0),
        name: "drop-generated-vfx-aliases",
        apply: drop_vfx_aliases,
    },
    MigrationStep {
        version: SchemaVersion::new(2, 1, 1),
        name: "fix-bindset-loader-spelling",
        apply: fix_bindset_loader,
    },
];

/// Steps that still have to run for a document tagged `from`.
pub fn pending_steps(from: SchemaVersion) -> impl Iterator<Item = &'static MigrationStep> {
    MIGRATIONS.iter().filter(move |s| s.version > from)
}

/// Lift legacy top-level keys and canonicalize every command list.
pub fn canonicalize_shapes(doc: &mut ProfileDocument, cx: &mut StepContext<'_>) -> bool {
    let mut changed = lift_legacy_keys(doc, cx);
    changed |= canonicalize_document(doc, cx);
    changed
}

/// Move pre-2.0 top-level `keys` into `builds[mode]`. Entries already present
/// in `builds` win over the legacy copy.
fn lift_legacy_keys(doc: &mut ProfileDocument, cx: &mut StepContext<'_>) -> bool {
    let mode = doc.mode.take();
    let Some(keys) = doc.keys.take() else {
        return mode.is_some();
    };

    let env = mode
        .as_deref()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| SPACE.to_string());
    cx.debug(&format!(
        "[normalize] lifting {} legacy keybinds into '{env}'",
        keys.len()
    ));

    if doc.current_environment.is_none() {
        doc.current_environment = Some(env.clone());
    }
    let build = doc.builds.entry(env).or_default();
    for (key, stored) in keys {
        build.keys.entry(key).or_insert(stored);
    }
    true
}

/// Rewrite every non-canonical keybind and alias. True if anything changed.
fn canonicalize_document(doc: &mut ProfileDocument, cx: &mut StepContext<'_>) -> bool {
    let mut changed = false;

    for (env, build) in doc.builds.iter_mut() {
        for (key, stored) in build.keys.iter_mut() {
            if stored.is_canonical() {
                continue;
            }
            let location = format!("builds.{env}.keys.{key}");
            *stored = StoredCommands::canonical(canonicalize_commands(stored, &location, cx));
            changed = true;
        }
    }

    for (name, alias) in doc.aliases.iter_mut() {
        if alias.is_canonical() {
            continue;
        }
        let location = format!("aliases.{name}");
        let record = match std::mem::replace(alias, StoredAlias::Malformed(Value::Null)) {
            StoredAlias::Record(mut r) => {
                r.commands = StoredCommands::canonical(canonicalize_commands(
                    &r.commands,
                    &format!("{location}.commands"),
                    cx,
                ));
                r
            }
            StoredAlias::Bare(c) => AliasRecord {
                commands: StoredCommands::canonical(canonicalize_commands(&c, &location, cx)),
                ..AliasRecord::default()
            },
            StoredAlias::Malformed(v) => {
                cx.malformed(location, format!("alias is {}", kind_of(&v)));
                AliasRecord::default()
            }
        };
        *alias = StoredAlias::Record(record);
        changed = true;
    }

    changed
}

/// Reduce any stored shape to trimmed, non-empty, separator-free commands.
pub fn canonicalize_commands(
    stored: &StoredCommands,
    location: &str,
    cx: &mut StepContext<'_>,
) -> Vec<String> {
    match stored {
        StoredCommands::Text(s) => split_chain(s),
        StoredCommands::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (ix, item) in items.iter().enumerate() {
                match item {
                    StoredCommand::Plain(s) => out.extend(split_chain(s)),
                    StoredCommand::Rich(m) => match command_from_rich(m) {
                        Ok(cmd) => out.extend(split_chain(&cmd)),
                        Err(reason) => cx.malformed(format!("{location}[{ix}]"), reason),
                    },
                    StoredCommand::Malformed(Value::Null) => {
                        cx.debug(&format!("[normalize] dropping null at {location}[{ix}]"));
                    }
                    StoredCommand::Malformed(v) => {
                        cx.malformed(format!("{location}[{ix}]"), format!("command is {}", kind_of(v)));
                    }
                }
            }
            out
        }
        StoredCommands::Malformed(v) => {
            cx.malformed(location.to_string(), format!("command list is {}", kind_of(v)));
            Vec::new()
        }
    }
}

/// Command string of a rich legacy entry.
///
/// Entries that lost their `command` field but still describe a tray slot
/// (`type`/`category` = `tray` plus a `parameters` map) are rebuilt.
/// The error says why an entry cannot be turned into a command.
pub fn command_from_rich(m: &Map<String, Value>) -> Result<String, String> {
    if let Some(Value::String(cmd)) = m.get("command") {
        return Ok(cmd.clone());
    }

    let is_tray = ["type", "category"]
        .iter()
        .any(|k| m.get(*k).and_then(Value::as_str) == Some("tray"));
    let params = m.get("parameters").and_then(Value::as_object);
    let Some(params) = params.filter(|_| is_tray) else {
        return Err("object has no command and cannot be rebuilt".into());
    };

    let tray = tray_params_from_map(params).map_err(|e| format!("tray parameters: {e}"))?;
    let id = if tray.backup.is_some() {
        "tray_with_backup"
    } else {
        "tray_exec"
    };
    build_optimized(CommandCategory::Tray, Some(id), &Parameters::Tray(tray))
        .map_err(|e| format!("tray parameters: {e}"))
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// True for aliases the tool generated for VFX suppression.
pub fn is_generated_vfx_alias(name: &str, alias: &StoredAlias) -> bool {
    VFX_ALIAS_NAME_RE.is_match(name)
        || alias
            .record()
            .and_then(|r| r.kind.as_deref())
            .is_some_and(|k| k == VFX_ALIAS_TYPE)
}

fn drop_vfx_aliases(doc: &mut ProfileDocument, cx: &mut StepContext<'_>) -> bool {
    let before = doc.aliases.len();
    doc.aliases.retain(|name, alias| {
        let generated = is_generated_vfx_alias(name, alias);
        if generated {
            cx.debug(&format!("[normalize] removing generated alias '{name}'"));
        }
        !generated
    });
    let aliases = &doc.aliases;
    doc.alias_metadata.retain(|name, _| aliases.contains_key(name));
    doc.aliases.len() != before
}

/// True for the tool's own bindset loader aliases.
pub fn is_bindset_loader_alias(name: &str) -> bool {
    BINDSET_ALIAS_NAME_RE.is_match(name)
}

fn fix_bindset_loader(doc: &mut ProfileDocument, cx: &mut StepContext<'_>) -> bool {
    let mut changed = false;
    for (name, alias) in doc.aliases.iter_mut() {
        if !is_bindset_loader_alias(name) {
            continue;
        }
        let StoredAlias::Record(r) = alias else {
            continue;
        };
        let fixed = match &mut r.commands {
            StoredCommands::Text(s) => fix_spelling(s),
            StoredCommands::List(items) => items
                .iter_mut()
                .map(|c| match c {
                    StoredCommand::Plain(s) => fix_spelling(s),
                    _ => false,
                })
                .fold(false, |acc, f| acc | f),
            StoredCommands::Malformed(_) => false,
        };
        if fixed {
            cx.debug(&format!("[normalize] fixed loader spelling in '{name}'"));
            changed = true;
        }
    }
    changed
}

fn fix_spelling(s: &mut String) -> bool {
    if !s.contains(LOADER_TYPO) {
        return false;
    }
    *s = s.replace(LOADER_TYPO, LOADER_FIXED);
    true
}
