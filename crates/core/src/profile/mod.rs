//! Profiles: canonical model, stored shapes, schema migrations, storage.

pub mod migrations;
pub mod model;
pub mod normalizer;
pub mod store;
pub mod stored;
pub mod versions;

pub use migrations::{MIGRATIONS, MalformedEntry, MigrationStep};
pub use model::{Alias, Chain, ContractError, GROUND, Keybinds, Profile, SPACE};
pub use normalizer::{
    MigrationStats, NormalizationReport, Normalized, ProfileNormalizer, get_migration_report,
    needs_normalization,
};
pub use store::{FileProfileStore, ProfileStore, StoreError, load_normalized};
pub use stored::{
    AliasRecord, ChainMetadata, ProfileDocument, StoredAlias, StoredBuild, StoredCommand,
    StoredCommands,
};
pub use versions::{CURRENT_VERSION, SchemaVersion};
