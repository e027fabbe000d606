//! Plan fingerprints.
//!
//! A fingerprint is a blake3 digest of a value's JSON encoding, keyed by a
//! domain string so that a snapshot and, say, a stage list with the same bytes
//! never collide. The JSON is streamed straight into the hasher.

use std::fmt;

use blake3::Hasher;
use serde::{Serialize, Serializer};

use crate::error::Result;

/// Number of hex digits shown by the `{:#}` short form.
const SHORT_HEX: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Digest of `value` under `domain`.
    pub fn of<T: Serialize + ?Sized>(domain: &str, value: &T) -> Result<Self> {
        let mut hasher = Hasher::new();
        hasher.update(domain.as_bytes());
        hasher.update(&[0]);
        serde_json::to_writer(&mut hasher, value)?;
        Ok(Self(hasher.finalize().into()))
    }

    /// Leading hex digits, enough to tell plans apart in CLI output.
    pub fn short(&self) -> String {
        format!("{self:#}")
    }
}

/// Full lowercase hex; `{:#}` prints the short form.
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = if f.alternate() { SHORT_HEX / 2 } else { 32 };
        for b in &self.0[..digits] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
