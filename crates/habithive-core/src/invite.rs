//! Join-code generation and validity rules.
//!
//! Codes are 12 lowercase hex characters from 6 bytes of OS randomness.
//! Expiry and exhaustion are checked at redemption time; lapsed invites are
//! left in place rather than deleted. The atomic use-count increment lives
//! in the store; this module owns the pure rules around it.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{ConflictError, Result};
use crate::model::HiveInvite;

/// Length of a rendered invite code in hex characters.
pub const CODE_LEN: usize = 12;

const CODE_BYTES: usize = CODE_LEN / 2;

/// Generate a random invite code from a cryptographically strong source.
pub fn generate_code() -> String {
    let mut bytes = [0u8; CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a code that does not collide with any live code.
///
/// Collisions are vanishingly rare but not impossible; regenerate until the
/// predicate clears.
pub fn generate_unique_code(is_taken: impl Fn(&str) -> bool) -> String {
    loop {
        let code = generate_code();
        if !is_taken(&code) {
            return code;
        }
    }
}

/// Absolute expiry for a TTL given in minutes.
pub fn expiry_for_ttl(now: DateTime<Utc>, ttl_minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(ttl_minutes)
}

/// Check an invite's query-time validity.
///
/// # Errors
/// `Conflict::InviteExpired` when `now` is past the expiry,
/// `Conflict::InviteExhausted` when the use count has reached its limit.
pub fn check_valid(invite: &HiveInvite, now: DateTime<Utc>) -> Result<()> {
    if invite.is_expired(now) {
        return Err(ConflictError::InviteExpired.into());
    }
    if invite.is_exhausted() {
        return Err(ConflictError::InviteExhausted.into());
    }
    Ok(())
}
