//! RFC 1035 master-file parsing, reduced to owner-name extraction.
//!
//! The parser is line-driven: callers feed decompressed text lines and
//! receive at most one [`Record`] per completed entry. It understands the
//! master-format features that affect owner names:
//!
//! - comments (`;` outside quoted strings) and `\` escapes
//! - parenthesized entries spanning multiple lines
//! - `$ORIGIN` and `$TTL` directives (`$INCLUDE` is skipped with a warning)
//! - owner inheritance (entries starting with whitespace)
//! - `@` owners and relative names completed with the origin
//! - TTL and class tokens in either order before the type
//!
//! Malformed entries are skipped; only an unreadable stream or unbalanced
//! parentheses at end of input are fatal.

mod record;

pub use record::{Record, RecordType, TypeFilter};

use tracing::warn;

use crate::error::{Error, Result};

/// Incremental master-file parser.
#[derive(Debug, Default)]
pub struct ZoneParser {
    origin: Option<String>,
    last_owner: Option<String>,
    /// Accumulated entry text while inside parentheses.
    pending: String,
    /// Whether the first physical line of the pending entry began with
    /// whitespace (owner inherited).
    pending_inherits: bool,
    open_parens: usize,
}

impl ZoneParser {
    /// Create a parser with no origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with an initial origin (absolute name).
    pub fn with_origin(origin: &str) -> Self {
        Self {
            origin: Some(origin.to_string()),
            ..Self::default()
        }
    }

    /// Feed one physical line; returns a record when it completes an entry.
    pub fn feed_line(&mut self, line: &str) -> Option<Record> {
        let starts_blank = line.starts_with(' ') || line.starts_with('\t');
        let cleaned = strip_comment_and_parens(line, &mut self.open_parens);

        if self.pending.is_empty() {
            self.pending_inherits = starts_blank;
            self.pending = cleaned;
        } else {
            self.pending.push(' ');
            self.pending.push_str(&cleaned);
        }

        if self.open_parens > 0 {
            return None;
        }

        let entry = std::mem::take(&mut self.pending);
        let inherits = self.pending_inherits;
        self.parse_entry(&entry, inherits)
    }

    /// Check end-of-input state. An entry still waiting for a closing
    /// parenthesis means the stream was truncated.
    pub fn finish(&self) -> Result<()> {
        if self.open_parens > 0 {
            return Err(Error::Zone("unbalanced parentheses at end of input".into()));
        }
        Ok(())
    }

    fn parse_entry(&mut self, entry: &str, inherits: bool) -> Option<Record> {
        let mut tokens = entry.split_whitespace();
        let first = tokens.next()?;

        if let Some(directive) = first.strip_prefix('$') {
            self.handle_directive(directive, tokens.next());
            return None;
        }

        let owner = if inherits {
            match &self.last_owner {
                Some(owner) => owner.clone(),
                // Inherited owner with nothing to inherit from.
                None => return None,
            }
        } else {
            self.resolve_owner(first)?
        };

        // TTL and class may precede the type in either order.
        let rtype = if inherits {
            // The first token was not an owner; reconsider it.
            std::iter::once(first)
                .chain(tokens)
                .find(|t| !is_ttl_token(t) && !is_class_token(t))
        } else {
            tokens.find(|t| !is_ttl_token(t) && !is_class_token(t))
        };
        let rtype = rtype.filter(|t| is_type_token(t))?;

        self.last_owner = Some(owner.clone());
        Some(Record {
            owner,
            rtype: rtype.to_ascii_uppercase(),
        })
    }

    fn handle_directive(&mut self, directive: &str, arg: Option<&str>) {
        match directive.to_ascii_uppercase().as_str() {
            "ORIGIN" => {
                if let Some(origin) = arg {
                    self.origin = Some(origin.to_string());
                }
            }
            "TTL" => {}
            "INCLUDE" => {
                warn!(file = arg.unwrap_or("<missing>"), "$INCLUDE is not supported, skipping");
            }
            other => {
                warn!(directive = other, "unknown directive, skipping");
            }
        }
    }

    fn resolve_owner(&self, token: &str) -> Option<String> {
        if token == "@" {
            return self.origin.clone();
        }
        if token.ends_with('.') {
            return Some(token.to_string());
        }
        // Relative name; without an origin the entry is malformed.
        match self.origin.as_deref() {
            Some(".") => Some(format!("{token}.")),
            Some(origin) => Some(format!("{token}.{origin}")),
            None => None,
        }
    }
}

/// Remove comments, translate parentheses to whitespace, and track paren
/// depth. Quoted strings protect `;`, `(` and `)`; backslash escapes the
/// next character everywhere.
fn strip_comment_and_parens(line: &str, open_parens: &mut usize) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            ';' if !in_quotes => break,
            '(' if !in_quotes => {
                *open_parens += 1;
                out.push(' ');
            }
            ')' if !in_quotes => {
                *open_parens = open_parens.saturating_sub(1);
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// TTL tokens are digits, optionally interleaved with time-unit letters
/// (`3600`, `1h`, `1h30m`).
fn is_ttl_token(token: &str) -> bool {
    if !token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }
    token
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c.to_ascii_lowercase(), 's' | 'm' | 'h' | 'd' | 'w'))
}

/// Class tokens: the RFC classes plus the generic `CLASS###` form.
fn is_class_token(token: &str) -> bool {
    let upper = token.to_ascii_uppercase();
    matches!(upper.as_str(), "IN" | "CH" | "HS" | "CS" | "NONE" | "ANY")
        || (upper.starts_with("CLASS") && upper[5..].chars().all(|c| c.is_ascii_digit()))
}

/// Type tokens: alphanumeric-with-dash mnemonics containing a letter
/// (`A`, `AAAA`, `NSEC3PARAM`, `TYPE65534`).
fn is_type_token(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && token.chars().any(|c| c.is_ascii_alphabetic())
}
