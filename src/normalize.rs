//! Owner-name normalization.
//!
//! Owners are folded to lowercase and lose exactly one trailing dot before
//! the optional IDN transform. The transform applies to the full owner name,
//! not per label; zone masters conventionally present fully-qualified owner
//! names and the IDNA processing handles the dots itself.
//!
//! A failed transform skips the record rather than failing the stream.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How owner names are mapped between Unicode and ASCII-compatible encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdnMode {
    /// Convert owners to ASCII Punycode (a-label) form.
    ALabel,
    /// Convert owners to Unicode (u-label) form.
    ULabel,
    /// Leave owners untouched.
    #[default]
    None,
}

impl std::str::FromStr for IdnMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alabel" | "a-label" => Ok(IdnMode::ALabel),
            "ulabel" | "u-label" => Ok(IdnMode::ULabel),
            "none" | "" => Ok(IdnMode::None),
            other => Err(Error::InvalidParams(format!("unknown IDN mode: {other}"))),
        }
    }
}

impl std::fmt::Display for IdnMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdnMode::ALabel => write!(f, "alabel"),
            IdnMode::ULabel => write!(f, "ulabel"),
            IdnMode::None => write!(f, "none"),
        }
    }
}

/// Normalize a raw owner name.
///
/// Returns `None` when the IDN transform rejects the name; such records are
/// skipped by the partitioner. The empty string is a legal result (the root
/// owner `.` normalizes to it) and is dropped later at dedupe.
pub fn normalize_owner(raw: &str, mode: IdnMode) -> Option<String> {
    let lowered = raw.to_lowercase();
    let stripped = lowered.strip_suffix('.').unwrap_or(&lowered);

    match mode {
        IdnMode::None => Some(stripped.to_string()),
        IdnMode::ALabel => idna::domain_to_ascii(stripped).ok(),
        IdnMode::ULabel => {
            let (unicode, result) = idna::domain_to_unicode(stripped);
            result.ok().map(|()| unicode)
        }
    }
}
