//! Fingerprint command handler.

use anyhow::{Context, Result};

use adaptive_cache::cache::{ContextDescriptor, KeyFactors};

/// Print the key factors and fingerprint a request derives.
pub(crate) fn cmd_fingerprint(
    message: String,
    mood: Option<String>,
    energy: Option<f64>,
    flags: Vec<String>,
    user_specific: bool,
    user_id: Option<String>,
) -> Result<()> {
    let context = ContextDescriptor {
        mood,
        energy,
        state_flags: flags.into_iter().collect(),
        is_user_specific: user_specific,
        user_id,
    };
    let factors = KeyFactors::from_request(&message, &context)
        .with_context(|| "Failed to derive key factors")?;

    println!("{}", serde_json::to_string_pretty(&factors)?);
    println!("{}", factors.fingerprint());
    Ok(())
}
