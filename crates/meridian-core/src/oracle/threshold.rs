use crate::config::BPS_DENOMINATOR;

/// Distinct signers needed out of `active_count` at `bps` basis points:
/// `max(1, ceil(active_count × bps / 10000))`.
///
/// Rounding is upward so a fractional share never lowers the bar. At the
/// default 6667 bps this asks for 1, 2 and 3 signers from sets of 1, 2 and 3.
pub fn threshold_count(active_count: usize, bps: u32) -> usize {
    let numerator = active_count as u128 * u128::from(bps);
    let required = numerator.div_ceil(u128::from(BPS_DENOMINATOR));
    usize::try_from(required).unwrap_or(usize::MAX).max(1)
}
