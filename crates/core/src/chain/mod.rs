//! Keybind file wire format: tokenizer, parser, serializer, mirroring, naming.

pub mod mirror;
pub mod names;
pub mod parser;
pub mod serializer;
pub mod tokenizer;

pub use mirror::{
    MirrorDetection, detect_mirrored, detect_mirrored_commands, generate_mirrored, mirror_chain,
};
pub use names::{DefaultNameRules, NameError, NameRules, NameRulesConfig};
pub use parser::{
    ChainParser, CommentLine, ParseLineError, ParseLineErrorKind, ParseResult, parse_keybind_file,
};
pub use serializer::{ChainSerializer, SerializeError, serialize_profile};
pub use tokenizer::{join_chain, split_chain};
