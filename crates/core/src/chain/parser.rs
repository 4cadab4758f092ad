//! Keybind file parser.
//!
//! Line shapes, tried in order:
//! 1. `# comment`
//! 2. `alias <name> "<chain>"` (also `<& chain &>`)
//! 3. `/bind <key> <command-or-quoted-chain>` (or `bind ...`)
//! 4. `<key> "<chain>"`
//!
//! Anything else is recorded as a [`ParseLineError`] and parsing continues.
//! A key or alias declared twice keeps the later chain.

use std::{fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};

use crate::chain::mirror::{MirrorDetection, detect_mirrored_commands};
use crate::chain::names::{DefaultNameRules, NameError, NameRules};
use crate::chain::tokenizer::split_chain;
use crate::core_log::{self, CoreLog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseLineErrorKind {
    Unrecognized,
    MissingChain,
    UnquotedChain,
    EmptyChain,
    UnterminatedQuote,
    InvalidKeyName(NameError),
    InvalidAliasName(NameError),
}

impl fmt::Display for ParseLineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseLineErrorKind::Unrecognized => f.write_str("unrecognized line"),
            ParseLineErrorKind::MissingChain => f.write_str("missing command chain"),
            ParseLineErrorKind::UnquotedChain => f.write_str("command chain must be quoted"),
            ParseLineErrorKind::EmptyChain => f.write_str("command chain is empty"),
            ParseLineErrorKind::UnterminatedQuote => f.write_str("missing closing quote"),
            ParseLineErrorKind::InvalidKeyName(e) => write!(f, "invalid key name: {e}"),
            ParseLineErrorKind::InvalidAliasName(e) => write!(f, "invalid alias name: {e}"),
        }
    }
}

/// One skipped line, with its original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLineError {
    pub line_number: usize,
    pub text: String,
    pub kind: ParseLineErrorKind,
}

impl fmt::Display for ParseLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line_number, self.kind, self.text)
    }
}

impl std::error::Error for ParseLineError {}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseResult {
    pub keybinds: IndexMap<String, Vec<String>>,
    pub aliases: IndexMap<String, Vec<String>>,
    pub errors: Vec<ParseLineError>,
    pub comments: Vec<CommentLine>,
    /// Keys whose chain was read back from a mirrored form.
    pub stabilized_keys: IndexSet<String>,
    pub stabilized_aliases: IndexSet<String>,
    /// Names declared more than once (the later chain was kept).
    pub duplicates: Vec<String>,
}

impl ParseResult {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keybinds.is_empty() && self.aliases.is_empty()
    }

    #[inline]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

enum Entry<'a> {
    Key(&'a str, Vec<String>),
    Alias(&'a str, Vec<String>),
}

/// Configurable keybind file parser.
#[derive(Clone)]
pub struct ChainParser {
    rules: Arc<dyn NameRules>,
    detect_mirrors: bool,
    logger: Arc<dyn CoreLog>,
}

impl Default for ChainParser {
    fn default() -> Self {
        Self {
            rules: Arc::new(DefaultNameRules::default()),
            detect_mirrors: false,
            logger: core_log::noop(),
        }
    }
}

impl ChainParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, rules: Arc<dyn NameRules>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_logger(mut self, logger: &Arc<dyn CoreLog>) -> Self {
        self.logger = Arc::clone(logger);
        self
    }

    /// Collapse mirrored chains to their first half and report them as stabilized.
    pub fn detect_mirrors(mut self, on: bool) -> Self {
        self.detect_mirrors = on;
        self
    }

    pub fn parse(&self, text: &str) -> ParseResult {
        let mut out = ParseResult::default();

        for (ix, raw) in text.lines().enumerate() {
            let line_number = ix + 1;
            let line = if ix == 0 {
                raw.trim_start_matches('\u{feff}').trim()
            } else {
                raw.trim()
            };

            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                out.comments.push(CommentLine {
                    line_number,
                    text: line.to_string(),
                });
                continue;
            }

            match self.parse_line(line) {
                Ok(Entry::Key(key, chain)) => {
                    let (chain, mirrored) = self.collapse(chain);
                    if out.keybinds.insert(key.to_string(), chain).is_some() {
                        self.logger
                            .debug(&format!("[parse] line {line_number}: '{key}' redeclared"));
                        out.duplicates.push(key.to_string());
                    }
                    if mirrored {
                        out.stabilized_keys.insert(key.to_string());
                    } else {
                        out.stabilized_keys.shift_remove(key);
                    }
                }
                Ok(Entry::Alias(name, chain)) => {
                    let (chain, mirrored) = self.collapse(chain);
                    if out.aliases.insert(name.to_string(), chain).is_some() {
                        self.logger.debug(&format!(
                            "[parse] line {line_number}: alias '{name}' redeclared"
                        ));
                        out.duplicates.push(name.to_string());
                    }
                    if mirrored {
                        out.stabilized_aliases.insert(name.to_string());
                    } else {
                        out.stabilized_aliases.shift_remove(name);
                    }
                }
                Err(kind) => {
                    let err = ParseLineError {
                        line_number,
                        text: raw.to_string(),
                        kind,
                    };
                    self.logger.warn(&format!("[parse] {err}"));
                    out.errors.push(err);
                }
            }
        }

        self.logger.info(&format!(
            "[parse] {} keybinds, {} aliases, {} comments, {} skipped lines",
            out.keybinds.len(),
            out.aliases.len(),
            out.comments.len(),
            out.errors.len()
        ));
        out
    }

    fn collapse(&self, chain: Vec<String>) -> (Vec<String>, bool) {
        if !self.detect_mirrors {
            return (chain, false);
        }
        match detect_mirrored_commands(&chain) {
            MirrorDetection::Mirrored { original_commands } => (original_commands, true),
            MirrorDetection::NotMirrored => (chain, false),
        }
    }

    fn parse_line<'a>(&self, line: &'a str) -> Result<Entry<'a>, ParseLineErrorKind> {
        let (head, rest) = split_word(line);

        if head.eq_ignore_ascii_case("alias") {
            let (name, body) = split_word(rest);
            if name.is_empty() {
                return Err(ParseLineErrorKind::Unrecognized);
            }
            self.rules
                .check_alias_name(name)
                .map_err(ParseLineErrorKind::InvalidAliasName)?;
            return Ok(Entry::Alias(name, extract_chain(body, false)?));
        }

        if head.eq_ignore_ascii_case("/bind") || head.eq_ignore_ascii_case("bind") {
            let (key, body) = split_word(rest);
            if key.is_empty() {
                return Err(ParseLineErrorKind::Unrecognized);
            }
            self.rules
                .check_key_name(key)
                .map_err(ParseLineErrorKind::InvalidKeyName)?;
            return Ok(Entry::Key(key, extract_chain(body, true)?));
        }

        if rest.is_empty() {
            return Err(ParseLineErrorKind::MissingChain);
        }
        self.rules
            .check_key_name(head)
            .map_err(ParseLineErrorKind::InvalidKeyName)?;
        Ok(Entry::Key(head, extract_chain(rest, false)?))
    }
}

/// Parse with the default rules.
pub fn parse_keybind_file(text: &str) -> ParseResult {
    ChainParser::default().parse(text)
}

/// First whitespace-delimited word and the trimmed remainder.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(ix) => (&s[..ix], s[ix..].trim()),
        None => (s, ""),
    }
}

/// Pull the chain out of its outer quoting and split it into commands.
fn extract_chain(body: &str, allow_unquoted: bool) -> Result<Vec<String>, ParseLineErrorKind> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ParseLineErrorKind::MissingChain);
    }

    let inner = if let Some(inner) = strip_outer_quotes(body) {
        inner
    } else if let Some(open) = body.strip_prefix("<&") {
        open.strip_suffix("&>")
            .ok_or(ParseLineErrorKind::UnterminatedQuote)?
    } else if body.starts_with(['"', '\'']) {
        return Err(ParseLineErrorKind::UnterminatedQuote);
    } else if allow_unquoted {
        body
    } else {
        return Err(ParseLineErrorKind::UnquotedChain);
    };

    let chain = split_chain(inner);
    if chain.is_empty() {
        return Err(ParseLineErrorKind::EmptyChain);
    }
    Ok(chain)
}

fn strip_outer_quotes(body: &str) -> Option<&str> {
    let q = body.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    if body.len() < 2 || !body.ends_with(q) {
        return None;
    }
    Some(&body[1..body.len() - 1])
}
