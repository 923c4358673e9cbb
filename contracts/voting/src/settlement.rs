//! Settlement arithmetic, kept free of the contract environment.

use crate::constants::BPS_DENOMINATOR;

/// Position of the leading candidate in `tallies`.
///
/// Candidates are scanned in their stored order and the first one to reach
/// the maximum keeps the lead, so ties resolve to the earliest listed
/// candidate and a round with no votes resolves to the first candidate.
/// Returns `None` only for an empty slate.
pub fn leading_candidate(tallies: &[u32]) -> Option<usize> {
    let mut leader: Option<(usize, u32)> = None;
    for (position, &votes) in tallies.iter().enumerate() {
        if leader.map_or(true, |(_, best)| votes > best) {
            leader = Some((position, votes));
        }
    }
    leader.map(|(position, _)| position)
}

/// Splits `escrow` into `(payout, commission)`.
///
/// The payout is floored; the commission takes the remainder so that
/// `payout + commission == escrow` always holds. The product is split into
/// quotient and remainder parts so any `u128` escrow can be divided.
pub fn split_escrow(escrow: u128, winner_share_bps: u16) -> Option<(u128, u128)> {
    let share = u128::from(winner_share_bps);
    if share > BPS_DENOMINATOR {
        return None;
    }
    let payout = (escrow / BPS_DENOMINATOR) * share
        + (escrow % BPS_DENOMINATOR) * share / BPS_DENOMINATOR;
    let commission = escrow.checked_sub(payout)?;
    Some((payout, commission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_FEE, DEFAULT_WINNER_SHARE_BPS};

    #[test]
    fn leader_is_highest_tally() {
        assert_eq!(leading_candidate(&[1, 3]), Some(1));
        assert_eq!(leading_candidate(&[4, 0, 2]), Some(0));
        assert_eq!(leading_candidate(&[0, 1, 5, 5]), Some(2));
    }

    #[test]
    fn ties_keep_first_listed() {
        assert_eq!(leading_candidate(&[2, 2]), Some(0));
        assert_eq!(leading_candidate(&[1, 3, 3, 0]), Some(1));
    }

    #[test]
    fn no_votes_resolves_to_first() {
        assert_eq!(leading_candidate(&[0, 0, 0]), Some(0));
    }

    #[test]
    fn empty_slate_has_no_leader() {
        assert_eq!(leading_candidate(&[]), None);
    }

    #[test]
    fn split_matches_ninety_ten() {
        // 4 votes at 0.01 = 0.04 -> 0.036 / 0.004
        let escrow = DEFAULT_FEE * 4;
        let (payout, commission) = split_escrow(escrow, DEFAULT_WINNER_SHARE_BPS).unwrap();
        assert_eq!(payout, 36_000_000_000_000_000);
        assert_eq!(commission, 4_000_000_000_000_000);
    }

    #[test]
    fn split_conserves_odd_amounts() {
        let (payout, commission) = split_escrow(7, 9_000).unwrap();
        assert_eq!(payout, 6);
        assert_eq!(commission, 1);
        assert_eq!(payout + commission, 7);
    }

    #[test]
    fn split_of_empty_escrow_is_zero() {
        assert_eq!(split_escrow(0, 9_000), Some((0, 0)));
    }

    #[test]
    fn split_bounds() {
        assert_eq!(split_escrow(100, 10_000), Some((100, 0)));
        assert_eq!(split_escrow(100, 0), Some((0, 100)));
        assert_eq!(split_escrow(100, 10_001), None);
    }

    #[test]
    fn split_handles_full_range_escrow() {
        let (payout, commission) = split_escrow(u128::MAX, 9_000).unwrap();
        assert_eq!(payout, u128::MAX / 10_000 * 9_000 + u128::MAX % 10_000 * 9_000 / 10_000);
        assert_eq!(payout + commission, u128::MAX);
        assert_eq!(split_escrow(u128::MAX, 10_000), Some((u128::MAX, 0)));
    }
}
