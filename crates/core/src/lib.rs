//! Core engine for game keybind chains.
//!
//! This crate is UI-agnostic and does no I/O outside of `profile::store`. It exposes:
//! - `chain`: keybind file parser/serializer, quote-aware splitting, mirrored chains, naming rules.
//! - `signature`: command classification, command building, tray range expansion.
//! - `profile`: canonical profile model, legacy stored shapes, schema normalizer, file store.
//! - `core_log::CoreLog`: thin logging trait the host (CLI or app) can implement.
//!
//! Import the `prelude` if you want the most common types in scope.

pub mod core_log;

pub mod chain;
pub mod profile;
pub mod signature;

/// Convenient re-exports for downstream users (CLI/tests).
pub use core_log::CoreLog;

pub mod prelude {
    pub use crate::core_log::{CoreLog, MemoryLog, NoopLog};

    // Wire format
    pub use crate::chain::{
        ChainParser, ChainSerializer, DefaultNameRules, MirrorDetection, NameError, NameRules,
        NameRulesConfig, ParseLineError, ParseLineErrorKind, ParseResult, SerializeError,
        detect_mirrored, generate_mirrored, join_chain, parse_keybind_file, serialize_profile,
        split_chain,
    };

    // Signatures
    pub use crate::signature::{
        BuildError, CommandCategory, Parameters, Signature, TrayParams, TraySlot, build,
        build_optimized, classify, expand_tray_range, expand_tray_range_with_backup,
        expand_whole_tray, expand_whole_tray_with_backup, normalize_active, optimize_command,
        parse_parameters,
    };

    // Profiles
    pub use crate::profile::{
        Alias, CURRENT_VERSION, ContractError, FileProfileStore, GROUND, NormalizationReport,
        Profile, ProfileDocument, ProfileNormalizer, ProfileStore, SPACE, SchemaVersion,
        StoreError, load_normalized, needs_normalization,
    };
}
