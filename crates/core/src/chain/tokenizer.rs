//! Quote-aware scanning of chain bodies.
//!
//! A chain body is a run of commands joined by `$$`. The separator only counts
//! when it sits outside of quotes, because game messages can legally carry it
//! (`say "a $$ b"`). The scanner works on bytes: every token it cares about is
//! ASCII, so multi-byte UTF-8 sequences are never split.
//!
//! Quote rules:
//! - `"` opens/closes a double-quoted region anywhere.
//! - `'` opens a single-quoted region only at the start of a word, so
//!   apostrophes inside words (`don't`) stay literal.
//! - A backslash escapes the next byte in every state.
//! - A doubled quote (`""`) outside of quotes opens a doubled region only when
//!   it is glued to the next word (`""a`) and a matching `""` follows later.
//!   Followed by whitespace, another quote or the end, it is an empty string.

/// Chain separator literal.
pub const CHAIN_SEPARATOR: &str = "$$";

/// Separator as written between commands in exported files.
pub const WIRE_SEPARATOR: &str = " $$ ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Outside,
    Quoted(u8),
    Doubled(u8),
}

/// Raw scanner output: untrimmed slices between unquoted separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan<'a> {
    pub parts: Vec<&'a str>,
    /// True if the body ended inside a quoted region.
    pub unterminated: bool,
}

impl Scan<'_> {
    /// Number of unquoted separators found.
    #[inline]
    pub fn separators(&self) -> usize {
        self.parts.len().saturating_sub(1)
    }
}

/// Split `body` on every `$$` that sits outside of quotes.
pub fn scan(body: &str) -> Scan<'_> {
    let b = body.as_bytes();
    let mut parts = Vec::new();
    let mut state = QuoteState::Outside;
    let mut start = 0;
    let mut i = 0;

    while i < b.len() {
        let c = b[i];

        if c == b'\\' {
            i += 2;
            continue;
        }

        match state {
            QuoteState::Outside => {
                if c == b'"' || (c == b'\'' && at_word_start(b, i, start)) {
                    if b.get(i + 1) == Some(&c) {
                        let pair = [c, c];
                        if opens_word(b.get(i + 2)) && contains_pair(&b[i + 2..], &pair) {
                            state = QuoteState::Doubled(c);
                        }
                        i += 2;
                        continue;
                    }
                    state = QuoteState::Quoted(c);
                } else if c == b'$' && b.get(i + 1) == Some(&b'$') {
                    parts.push(&body[start..i]);
                    i += 2;
                    start = i;
                    continue;
                }
            }
            QuoteState::Quoted(q) => {
                if c == q {
                    state = QuoteState::Outside;
                }
            }
            QuoteState::Doubled(q) => {
                if c == q && b.get(i + 1) == Some(&q) {
                    state = QuoteState::Outside;
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }

    parts.push(&body[start..]);
    Scan {
        parts,
        unterminated: state != QuoteState::Outside,
    }
}

/// Split a chain body into trimmed, non-empty commands.
///
/// Accepts both the wire form (`A $$ B`) and legacy joined strings (`A$$B`).
pub fn split_chain(body: &str) -> Vec<String> {
    scan(body)
        .parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// True if `command` holds a `$$` outside of quotes.
pub fn contains_unquoted_separator(command: &str) -> bool {
    scan(command).separators() > 0
}

/// Join commands with the wire separator.
pub fn join_chain<S: AsRef<str>>(commands: &[S]) -> String {
    let mut out = String::new();
    for (ix, c) in commands.iter().enumerate() {
        if ix > 0 {
            out.push_str(WIRE_SEPARATOR);
        }
        out.push_str(c.as_ref());
    }
    out
}

#[inline]
fn at_word_start(b: &[u8], i: usize, part_start: usize) -> bool {
    i == part_start || b[i - 1].is_ascii_whitespace()
}

#[inline]
fn opens_word(next: Option<&u8>) -> bool {
    next.is_some_and(|&n| !n.is_ascii_whitespace() && n != b'"' && n != b'\'')
}

#[inline]
fn contains_pair(hay: &[u8], pair: &[u8; 2]) -> bool {
    hay.windows(2).any(|w| w == pair)
}
