//! Combines per-signal findings into one bounded risk score.

use crate::email_store::EmailFinding;
use crate::ip_store::IpFinding;

/// Most points a single address can collect from the IP signal, no matter
/// how many sources flag it.
pub const IP_SIGNAL_CAP: u32 = 30;
/// Points per blacklist source hit, before the cap.
pub const IP_HIT_WEIGHT: u32 = 10;
/// Upper bound of the final score.
pub const MAX_RISK_SCORE: u32 = 100;

/// Pure, order-independent aggregation: the email sub-score plus a
/// diminishing-returns IP contribution, clamped to [0, 100].
pub fn aggregate(email: &EmailFinding, ip: &IpFinding) -> u8 {
    let mut score = email.score;
    if ip.blacklisted {
        score += IP_SIGNAL_CAP.min(ip.hits as u32 * IP_HIT_WEIGHT);
    }
    score.min(MAX_RISK_SCORE) as u8
}
