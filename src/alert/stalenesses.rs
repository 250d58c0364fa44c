/// Station observation staleness detection.
///
/// WAQI stations normally report hourly, but a station can sit on an old
/// reading for days after a sensor or uplink outage while the API keeps
/// returning it as "latest". The map flags such markers so an old good
/// reading is not mistaken for current air.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, so tests are deterministic.

use chrono::{DateTime, Utc};

/// Returns `true` if `observed_at` (RFC 3339) is older than
/// `max_age_minutes` relative to `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// Returns an error if the timestamp cannot be parsed. Callers should treat
/// parse failures as stale.
pub fn is_stale_at(
    observed_at: &str,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> Result<bool, String> {
    let observed = DateTime::parse_from_rfc3339(observed_at.trim())
        .map_err(|e| format!("invalid observation time '{}': {}", observed_at, e))?
        .with_timezone(&Utc);

    // Readings stamped in the future (clock skew) count as fresh.
    let age_minutes = (now - observed).num_minutes().max(0) as u64;
    Ok(age_minutes > max_age_minutes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
