//! Claim Name Generation
//!
//! Names for persistent-claim volumes submitted without one. The format is
//! `pvc-<component>-<unix seconds>-<0..=9999>`, which keeps names readable and
//! makes concurrent writes for the same component unlikely to collide without
//! any coordination. A collision still surfaces as an `AlreadyExists` error from
//! the store when the claim is provisioned.

use chrono::Utc;
use rand::Rng;

/// Upper bound (exclusive) of the random suffix
pub const CLAIM_SUFFIX_RANGE: u32 = 10_000;

/// Produces claim names for unnamed persistent-claim volumes
pub trait ClaimNameGenerator: Send + Sync {
    fn generate(&self, component_name: &str) -> String;
}

/// Render a claim name from its parts
pub fn format_claim_name(component_name: &str, unix_seconds: i64, suffix: u32) -> String {
    format!("pvc-{}-{}-{}", component_name, unix_seconds, suffix)
}

/// Wall-clock second plus a random suffix
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampClaimNames;

impl ClaimNameGenerator for TimestampClaimNames {
    fn generate(&self, component_name: &str) -> String {
        let suffix = rand::thread_rng().gen_range(0..CLAIM_SUFFIX_RANGE);
        format_claim_name(component_name, Utc::now().timestamp(), suffix)
    }
}

/// Parse a generated claim name back into `(component, seconds, suffix)`
///
/// Returns `None` for names that do not follow the generated format.
pub fn parse_claim_name(claim_name: &str) -> Option<(&str, i64, u32)> {
    let rest = claim_name.strip_prefix("pvc-")?;
    let (rest, suffix) = rest.rsplit_once('-')?;
    let (component, seconds) = rest.rsplit_once('-')?;

    let suffix: u32 = suffix.parse().ok()?;
    let seconds: i64 = seconds.parse().ok()?;
    if component.is_empty() || suffix >= CLAIM_SUFFIX_RANGE {
        return None;
    }

    Some((component, seconds, suffix))
}
