//! Mirrored chains: a chain followed by its own reverse.
//!
//! Toggle keys use this so every press leaves the game in the same state
//! regardless of how many times the chain has run. Detection is purely
//! structural; commands are compared as strings.

use super::tokenizer::{join_chain, split_chain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorDetection {
    Mirrored { original_commands: Vec<String> },
    NotMirrored,
}

impl MirrorDetection {
    #[inline]
    pub fn is_mirrored(&self) -> bool {
        matches!(self, MirrorDetection::Mirrored { .. })
    }

    pub fn original_commands(&self) -> Option<&[String]> {
        match self {
            MirrorDetection::Mirrored { original_commands } => Some(original_commands),
            MirrorDetection::NotMirrored => None,
        }
    }
}

/// `[A, B, C]` → `[A, B, C, C, B, A]`. Empty stays empty.
pub fn mirror_chain<S: AsRef<str>>(chain: &[S]) -> Vec<String> {
    chain
        .iter()
        .chain(chain.iter().rev())
        .map(|c| c.as_ref().to_string())
        .collect()
}

/// `[A, B, C]` → `"A $$ B $$ C $$ C $$ B $$ A"`. Empty input yields `""`.
pub fn generate_mirrored<S: AsRef<str>>(chain: &[S]) -> String {
    join_chain(&mirror_chain(chain))
}

/// Check whether a command list is some chain followed by its reverse.
pub fn detect_mirrored_commands(commands: &[String]) -> MirrorDetection {
    let n = commands.len();
    if n == 0 || n % 2 != 0 {
        return MirrorDetection::NotMirrored;
    }
    let (first, second) = commands.split_at(n / 2);
    if first.iter().eq(second.iter().rev()) {
        MirrorDetection::Mirrored {
            original_commands: first.to_vec(),
        }
    } else {
        MirrorDetection::NotMirrored
    }
}

/// Split a chain string on unquoted separators and check for mirroring.
pub fn detect_mirrored(chain: &str) -> MirrorDetection {
    detect_mirrored_commands(&split_chain(chain))
}
