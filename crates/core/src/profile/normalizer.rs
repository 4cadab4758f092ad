//! Profile schema normalizer.
//!
//! Two entry points with different ownership contracts:
//! - [`ProfileNormalizer::normalize`] takes `&ProfileDocument` and returns a
//!   normalized copy; the input is never touched.
//! - [`ProfileNormalizer::normalize_in_place`] mutates the document it is
//!   given. Storage uses this one so it can write the same value back.
//!
//! Normalizing a document that is already at the current version with
//! canonical shapes changes nothing, `lastModified` included.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::chain::tokenizer::{contains_unquoted_separator, split_chain};
use crate::core_log::{self, CoreLog};
use crate::profile::migrations::{
    MalformedEntry, StepContext, canonicalize_shapes, command_from_rich, pending_steps,
};
use crate::profile::model::{ContractError, Profile, SPACE};
use crate::profile::stored::{ProfileDocument, StoredAlias, StoredCommand, StoredCommands};
use crate::profile::versions::{CURRENT_VERSION, SchemaVersion};

/// Diff-based counters for diagnostics. Never used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationStats {
    /// Keybinds/aliases whose stored value changed.
    pub items_migrated: usize,
    /// Entries that held a non-canonical shape before and a canonical one after.
    pub legacy_shapes_removed: usize,
    /// Stored strings that held more than one command.
    pub strings_split: usize,
    pub aliases_removed: usize,
    /// Command elements that could not be interpreted and were dropped.
    pub entries_dropped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationReport {
    /// Version the document was read as (`0.0.0` when untagged or unreadable).
    pub from_version: SchemaVersion,
    pub to_version: SchemaVersion,
    pub applied_steps: Vec<&'static str>,
    /// True if any step or the shape guard changed data.
    pub changed: bool,
    pub stats: MigrationStats,
    pub malformed: Vec<MalformedEntry>,
}

/// Output of the copying entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub document: ProfileDocument,
    pub report: NormalizationReport,
}

impl Normalized {
    /// Canonical profile view of the normalized document.
    pub fn into_profile(self) -> Result<(Profile, NormalizationReport), ContractError> {
        Ok((Profile::try_from(self.document)?, self.report))
    }
}

#[derive(Clone)]
pub struct ProfileNormalizer {
    logger: Arc<dyn CoreLog>,
    now: Option<DateTime<Utc>>,
}

impl Default for ProfileNormalizer {
    fn default() -> Self {
        Self {
            logger: core_log::noop(),
            now: None,
        }
    }
}

impl ProfileNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: &Arc<dyn CoreLog>) -> Self {
        self.logger = Arc::clone(logger);
        self
    }

    /// Fixed clock for `lastModified` (defaults to now).
    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.now = Some(ts);
        self
    }

    /// Normalize a copy of `doc`. The input is left untouched.
    pub fn normalize(&self, doc: &ProfileDocument) -> Normalized {
        let mut document = doc.clone();
        let report = self.normalize_in_place(&mut document);
        Normalized { document, report }
    }

    /// Normalize `doc` itself.
    pub fn normalize_in_place(&self, doc: &mut ProfileDocument) -> NormalizationReport {
        let before = doc.clone();
        let from = self.read_version(doc);
        let mut cx = StepContext::new(&self.logger);
        let mut applied = Vec::new();
        let mut changed = false;

        for step in pending_steps(from) {
            let step_changed = step.apply(doc, &mut cx);
            self.logger.debug(&format!(
                "[normalize] step {} ({}): {}",
                step.version,
                step.name,
                if step_changed { "changed" } else { "no change" }
            ));
            changed |= step_changed;
            applied.push(step.name);
        }

        if canonicalize_shapes(doc, &mut cx) {
            self.logger
                .debug("[normalize] shape guard rewrote non-canonical entries");
            changed = true;
        }

        if from < CURRENT_VERSION {
            doc.migration_version = Some(CURRENT_VERSION.to_string());
        } else if from > CURRENT_VERSION {
            self.logger.warn(&format!(
                "[normalize] profile version {from} is newer than {CURRENT_VERSION}; left as-is"
            ));
        }

        if changed {
            let now = self.now.unwrap_or_else(Utc::now);
            doc.last_modified = Some(now.to_rfc3339());
        }

        let report = NormalizationReport {
            from_version: from,
            to_version: from.max(CURRENT_VERSION),
            applied_steps: applied,
            changed,
            stats: get_migration_report(&before, doc),
            malformed: cx.malformed,
        };
        self.logger.info(&format!(
            "[normalize] '{}' {} -> {}: {} steps, {} migrated, {} malformed",
            doc.name.as_deref().unwrap_or(""),
            report.from_version,
            report.to_version,
            report.applied_steps.len(),
            report.stats.items_migrated,
            report.malformed.len()
        ));
        report
    }

    fn read_version(&self, doc: &ProfileDocument) -> SchemaVersion {
        match doc.migration_version.as_deref() {
            None => SchemaVersion::UNVERSIONED,
            Some(tag) => tag.parse().unwrap_or_else(|e| {
                self.logger
                    .warn(&format!("[normalize] {e}; treating profile as unversioned"));
                SchemaVersion::UNVERSIONED
            }),
        }
    }
}

/// True if normalizing `doc` would rewrite it.
///
/// Only inspects the document: a missing, unreadable, or outdated version
/// tag, or any entry not yet in canonical shape.
pub fn needs_normalization(doc: &ProfileDocument) -> bool {
    let behind = match doc.migration_version.as_deref() {
        None => true,
        Some(tag) => tag
            .parse::<SchemaVersion>()
            .map_or(true, |v| v < CURRENT_VERSION),
    };
    behind || doc.mode.is_some() || !doc.has_canonical_shapes()
}

struct EntryView<'a> {
    canonical: bool,
    commands: Option<&'a StoredCommands>,
}

/// Keybinds as `env/key` and aliases as `alias:name`. Pre-2.0 top-level keys
/// are listed under the environment they will be lifted into.
fn entries(doc: &ProfileDocument) -> IndexMap<String, EntryView<'_>> {
    let mut out = IndexMap::new();
    for (env, build) in &doc.builds {
        for (key, cmds) in &build.keys {
            out.insert(
                format!("{env}/{key}"),
                EntryView {
                    canonical: cmds.is_canonical(),
                    commands: Some(cmds),
                },
            );
        }
    }
    if let Some(keys) = &doc.keys {
        let env = doc
            .mode
            .as_deref()
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| SPACE.to_string());
        for (key, cmds) in keys {
            out.entry(format!("{env}/{key}")).or_insert(EntryView {
                canonical: false,
                commands: Some(cmds),
            });
        }
    }
    for (name, alias) in &doc.aliases {
        let commands = match alias {
            StoredAlias::Record(r) => Some(&r.commands),
            StoredAlias::Bare(c) => Some(c),
            StoredAlias::Malformed(_) => None,
        };
        out.insert(
            format!("alias:{name}"),
            EntryView {
                canonical: alias.is_canonical(),
                commands,
            },
        );
    }
    out
}

fn split_count(s: &str) -> usize {
    usize::from(contains_unquoted_separator(s))
}

fn dropped_count(cmds: Option<&StoredCommands>) -> usize {
    match cmds {
        None | Some(StoredCommands::Malformed(_)) => 1,
        Some(StoredCommands::Text(_)) => 0,
        Some(StoredCommands::List(items)) => items
            .iter()
            .filter(|c| match c {
                StoredCommand::Plain(s) => split_chain(s).is_empty(),
                StoredCommand::Rich(m) => command_from_rich(m).is_err(),
                StoredCommand::Malformed(_) => true,
            })
            .count(),
    }
}

/// Summarize what changed between two versions of a document.
pub fn get_migration_report(before: &ProfileDocument, after: &ProfileDocument) -> MigrationStats {
    let old = entries(before);
    let new = entries(after);
    let mut stats = MigrationStats::default();

    for (id, b) in &old {
        let Some(a) = new.get(id) else {
            if id.starts_with("alias:") {
                stats.aliases_removed += 1;
            }
            continue;
        };

        if !b.canonical || b.commands != a.commands {
            stats.items_migrated += 1;
        }
        if b.canonical || !a.canonical {
            continue;
        }
        stats.legacy_shapes_removed += 1;
        stats.entries_dropped += dropped_count(b.commands);
        stats.strings_split += match b.commands {
            Some(StoredCommands::Text(s)) => split_count(s),
            Some(StoredCommands::List(items)) => items
                .iter()
                .map(|c| match c {
                    StoredCommand::Plain(s) => split_count(s),
                    _ => 0,
                })
                .sum(),
            _ => 0,
        };
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_log::MemoryLog;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn doc(v: Value) -> ProfileDocument {
        serde_json::from_value(v).unwrap()
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()
    }

    fn legacy() -> ProfileDocument {
        doc(json!({
            "name": "Old",
            "builds": {"space": {"keys": {
                "F1": "FireAll",
                "F2": [{"command": "FireAll", "name": "Fire All"}],
                "F3": ["A", null]
            }}},
            "aliases": {
                "combo": {"commands": "A$$B$$C"},
                "dynFxSetFXExclusionList_Space": {"commands": ["x"]},
                "sto_kb_bindset_enable_space": {"commands": ["bind_laod_file a.txt"]}
            },
            "lastModified": "2020-01-01T00:00:00+00:00"
        }))
    }

    #[test]
    fn migrates_legacy_document_to_current() {
        let n = ProfileNormalizer::new().at(ts()).normalize(&legacy());
        let d = &n.document;
        assert_eq!(d.migration_version.as_deref(), Some("2.1.1"));
        assert_eq!(d.last_modified.as_deref(), Some("2026-03-04T05:06:07+00:00"));
        assert!(d.has_canonical_shapes());
        assert!(!d.aliases.contains_key("dynFxSetFXExclusionList_Space"));

        let (p, report) = n.clone().into_profile().unwrap();
        assert_eq!(p.builds[SPACE]["F1"], vec!["FireAll"]);
        assert_eq!(p.builds[SPACE]["F2"], vec!["FireAll"]);
        assert_eq!(p.builds[SPACE]["F3"], vec!["A"]);
        assert_eq!(p.aliases["combo"].commands, vec!["A", "B", "C"]);
        assert_eq!(
            p.aliases["sto_kb_bindset_enable_space"].commands,
            vec!["bind_load_file a.txt"]
        );

        assert_eq!(report.from_version, SchemaVersion::UNVERSIONED);
        assert_eq!(
            report.applied_steps,
            vec![
                "canonical-commands",
                "drop-generated-vfx-aliases",
                "fix-bindset-loader-spelling"
            ]
        );
        assert!(report.changed);
        assert_eq!(
            report.stats,
            MigrationStats {
                items_migrated: 5,
                legacy_shapes_removed: 4,
                strings_split: 1,
                aliases_removed: 1,
                entries_dropped: 1,
            }
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let normalizer = ProfileNormalizer::new().at(ts());
        let once = normalizer.normalize(&legacy()).document;
        let twice = ProfileNormalizer::new().normalize(&once);
        assert_eq!(twice.document, once);
        assert!(!twice.report.changed);
        assert!(twice.report.applied_steps.is_empty());
        assert_eq!(twice.report.stats, MigrationStats::default());
        assert!(!needs_normalization(&once));
    }

    #[test]
    fn copy_contract_leaves_input_untouched() {
        let input = legacy();
        let snapshot = input.clone();
        let _ = ProfileNormalizer::new().normalize(&input);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn in_place_contract_mutates_input() {
        let mut d = legacy();
        let report = ProfileNormalizer::new().at(ts()).normalize_in_place(&mut d);
        assert!(report.changed);
        assert!(d.has_canonical_shapes());
        assert_eq!(d.migration_version.as_deref(), Some("2.1.1"));
    }

    #[test]
    fn version_bump_without_changes_keeps_last_modified() {
        let mut d = doc(json!({
            "builds": {"space": {"keys": {"F1": ["FireAll"]}}},
            "migrationVersion": "2.1.0",
            "lastModified": "2020-01-01T00:00:00+00:00"
        }));
        assert!(needs_normalization(&d));
        let report = ProfileNormalizer::new().normalize_in_place(&mut d);
        assert!(!report.changed);
        assert_eq!(report.applied_steps, vec!["fix-bindset-loader-spelling"]);
        assert_eq!(d.migration_version.as_deref(), Some("2.1.1"));
        assert_eq!(d.last_modified.as_deref(), Some("2020-01-01T00:00:00+00:00"));
    }

    #[test]
    fn shape_guard_runs_at_current_version() {
        let mut d = doc(json!({
            "builds": {"space": {"keys": {"F1": "A$$B"}}},
            "aliases": {"dynFxSetFXExclusionList_Space": {"commands": ["x"]}},
            "migrationVersion": "2.1.1"
        }));
        assert!(needs_normalization(&d));
        let report = ProfileNormalizer::new().normalize_in_place(&mut d);
        assert!(report.applied_steps.is_empty());
        assert!(report.changed);
        assert!(d.has_canonical_shapes());
        // Version-gated steps did not run again.
        assert!(d.aliases.contains_key("dynFxSetFXExclusionList_Space"));
    }

    #[test]
    fn newer_version_is_never_downgraded() {
        let log = MemoryLog::new();
        let dyn_log: Arc<dyn CoreLog> = log.clone();
        let mut d = doc(json!({"migrationVersion": "3.0.0"}));
        let report = ProfileNormalizer::new()
            .with_logger(&dyn_log)
            .normalize_in_place(&mut d);
        assert_eq!(d.migration_version.as_deref(), Some("3.0.0"));
        assert_eq!(report.to_version, SchemaVersion::new(3, 0, 0));
        assert!(log.contains("newer than 2.1.1"));
        assert!(!needs_normalization(&d));
    }

    #[test]
    fn unreadable_version_is_treated_as_unversioned() {
        let log = MemoryLog::new();
        let dyn_log: Arc<dyn CoreLog> = log.clone();
        let mut d = doc(json!({"migrationVersion": "banana", "aliases": {"a": null}}));
        assert!(needs_normalization(&d));
        let report = ProfileNormalizer::new()
            .with_logger(&dyn_log)
            .normalize_in_place(&mut d);
        assert_eq!(report.from_version, SchemaVersion::UNVERSIONED);
        assert_eq!(report.applied_steps.len(), 3);
        assert_eq!(d.migration_version.as_deref(), Some("2.1.1"));
        assert_eq!(report.malformed.len(), 1);
        assert!(log.contains("bad schema version 'banana'"));
        assert!(log.contains("aliases.a: alias is null"));
    }

    #[test]
    fn report_counts_removed_aliases() {
        let before = doc(json!({"aliases": {"a": {"commands": ["A"]}, "b": {"commands": ["B"]}}}));
        let after = doc(json!({"aliases": {"a": {"commands": ["A"]}}}));
        let stats = get_migration_report(&before, &after);
        assert_eq!(stats.aliases_removed, 1);
        assert_eq!(stats.items_migrated, 0);
    }
}
