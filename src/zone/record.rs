//! Resource record surface needed by the partitioner.
//!
//! The pipeline only keeps owner names, so a parsed record is just the owner
//! plus the type token used for filtering. Everything else in the entry
//! (TTL, class, rdata) is discarded at parse time.

use std::collections::HashSet;

/// A parsed zone entry, reduced to what partitioning needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Fully-qualified owner name as written (origin applied, case kept).
    pub owner: String,
    /// Record type token, upper-cased (e.g. `A`, `MX`, `TYPE65534`).
    pub rtype: String,
}

/// Record types the filter recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
    Srv,
}

impl RecordType {
    /// Parse a recognized mnemonic; anything else is `None`.
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Some(RecordType::A),
            "AAAA" => Some(RecordType::Aaaa),
            "CNAME" => Some(RecordType::Cname),
            "MX" => Some(RecordType::Mx),
            "TXT" => Some(RecordType::Txt),
            "NS" => Some(RecordType::Ns),
            "SRV" => Some(RecordType::Srv),
            _ => None,
        }
    }
}

/// Record-type filter built from the run parameters.
///
/// An empty filter accepts every record. Unknown mnemonics in the filter are
/// dropped at construction and therefore match nothing.
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    accepted: HashSet<RecordType>,
    /// True when the caller supplied at least one filter entry, recognized
    /// or not. Distinguishes "accept all" from "accept none".
    selective: bool,
}

impl TypeFilter {
    /// Build a filter from mnemonic strings.
    pub fn new<I, S>(mnemonics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = HashSet::new();
        let mut selective = false;
        for m in mnemonics {
            selective = true;
            if let Some(t) = RecordType::from_mnemonic(m.as_ref()) {
                accepted.insert(t);
            }
        }
        Self { accepted, selective }
    }

    /// Whether a record with this type token passes the filter.
    pub fn matches(&self, rtype_token: &str) -> bool {
        if !self.selective {
            return true;
        }
        RecordType::from_mnemonic(rtype_token)
            .map(|t| self.accepted.contains(&t))
            .unwrap_or(false)
    }
}
