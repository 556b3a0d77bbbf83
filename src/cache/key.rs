//! Request fingerprinting.
//!
//! A raw request (message text plus a [`ContextDescriptor`]) is reduced to a
//! [`KeyFactors`] record and then digested with SHA-256. The record is encoded
//! field by field in a fixed order with length prefixes, so equal records
//! always hash identically and adjacent fields cannot bleed into each other.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

pub const DEFAULT_MOOD: &str = "neutral";
pub const DEFAULT_ENERGY: f64 = 50.0;
pub const ENERGY_BUCKET_WIDTH: f64 = 20.0;

static TRAILING_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,!?;]+$").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ============================================================================
// Fingerprint
// ============================================================================

/// SHA-256 digest of a [`KeyFactors`] record. The cache's only notion of
/// "same request".
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex chars, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<[u8; 32]> for Fingerprint {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

// ============================================================================
// ContextDescriptor
// ============================================================================

/// Situational context that accompanies a message.
///
/// Absent values fall back to a neutral mood and an energy of 50. The
/// `user_id` only takes part in key derivation when `is_user_specific` is set,
/// so shared answers never carry the caller's identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextDescriptor {
    pub mood: Option<String>,
    pub energy: Option<f64>,
    pub state_flags: BTreeSet<String>,
    pub is_user_specific: bool,
    pub user_id: Option<String>,
}

impl ContextDescriptor {
    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.state_flags.insert(flag.into());
        self
    }

    /// Mark the request as user-specific and bind it to `user_id`.
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.is_user_specific = true;
        self.user_id = Some(user_id.into());
        self
    }

    /// Parse a context from loosely-typed JSON.
    ///
    /// `null` yields the default context. Unknown fields are ignored. The
    /// legacy `isDrunk` / `isHigh` toggles become `drunk` / `high` flags.
    pub fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        if !value.is_object() {
            return Err(CacheError::Validation(
                "context must be a JSON object".into(),
            ));
        }
        let raw: RawContext = serde_json::from_value(value.clone())
            .map_err(|e| CacheError::Validation(format!("malformed context: {e}")))?;

        let mut state_flags = raw.state_flags;
        if raw.is_drunk {
            state_flags.insert("drunk".into());
        }
        if raw.is_high {
            state_flags.insert("high".into());
        }
        let ctx = Self {
            mood: raw.mood,
            energy: raw.energy,
            state_flags,
            is_user_specific: raw.is_user_specific,
            user_id: raw.user_id,
        };
        ctx.validate()?;
        Ok(ctx)
    }

    /// Reject energy values that cannot be bucketed.
    pub fn validate(&self) -> Result<()> {
        if let Some(energy) = self.energy {
            if !energy.is_finite() {
                return Err(CacheError::Validation(format!(
                    "energy must be a finite number, got {energy}"
                )));
            }
            if energy < 0.0 {
                return Err(CacheError::Validation(format!(
                    "energy must not be negative, got {energy}"
                )));
            }
        }
        Ok(())
    }
}

/// Wire shape accepted by [`ContextDescriptor::from_value`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawContext {
    mood: Option<String>,
    energy: Option<f64>,
    state_flags: BTreeSet<String>,
    is_user_specific: bool,
    user_id: Option<String>,
    is_drunk: bool,
    is_high: bool,
}

/// Extract a message from loosely-typed JSON, rejecting anything but a string.
pub fn message_from_value(value: &Value) -> Result<&str> {
    value.as_str().ok_or_else(|| {
        CacheError::Validation(format!("message must be a string, got {}", json_type(value)))
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// KeyFactors
// ============================================================================

/// Normalized record a fingerprint is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFactors {
    pub message: String,
    pub mood: String,
    pub energy_bucket: u64,
    pub state_flags: BTreeSet<String>,
    pub user_specific: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl KeyFactors {
    pub fn from_request(message: &str, context: &ContextDescriptor) -> Result<Self> {
        context.validate()?;
        let mood = match context.mood.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => DEFAULT_MOOD.to_string(),
        };
        let user = if context.is_user_specific {
            context.user_id.clone()
        } else {
            None
        };
        Ok(Self {
            message: normalize_message(message),
            mood,
            energy_bucket: energy_bucket(context.energy.unwrap_or(DEFAULT_ENERGY)),
            state_flags: context.state_flags.clone(),
            user_specific: context.is_user_specific,
            user,
        })
    }

    /// Digest the record. Uses length-prefixed encoding so that e.g.
    /// `message="a", mood="bc"` and `message="ab", mood="c"` differ.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        update_str(&mut hasher, &self.message);
        update_str(&mut hasher, &self.mood);
        hasher.update(self.energy_bucket.to_le_bytes());
        hasher.update((self.state_flags.len() as u64).to_le_bytes());
        for flag in &self.state_flags {
            update_str(&mut hasher, flag);
        }
        hasher.update([u8::from(self.user_specific)]);
        match &self.user {
            Some(user) => {
                hasher.update([1u8]);
                update_str(&mut hasher, user);
            }
            None => hasher.update([0u8]),
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Fingerprint(bytes)
    }
}

fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Derive the fingerprint for a raw request.
pub fn derive(message: &str, context: &ContextDescriptor) -> Result<Fingerprint> {
    Ok(KeyFactors::from_request(message, context)?.fingerprint())
}

/// Case-fold, trim, strip trailing `.,!?;` runs, then collapse whitespace.
///
/// The result is trimmed once more so a space left in front of the stripped
/// punctuation does not survive.
pub fn normalize_message(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = TRAILING_PUNCT_RE.replace(lowered.trim(), "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Floor `energy` to a multiple of [`ENERGY_BUCKET_WIDTH`].
pub fn energy_bucket(energy: f64) -> u64 {
    let width = ENERGY_BUCKET_WIDTH as u64;
    ((energy / ENERGY_BUCKET_WIDTH).floor() as u64).saturating_mul(width)
}
