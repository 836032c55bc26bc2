#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketInfo {
    pub earned: u32,
    pub available: u32,
    pub redeemed: u32,
}

pub fn ticket_info(rank_index: usize, redeemed: u32) -> TicketInfo {
    let earned = u32::try_from(rank_index).unwrap_or(u32::MAX);
    TicketInfo {
        earned,
        available: earned.saturating_sub(redeemed),
        redeemed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn novice_earns_nothing() {
        let info = ticket_info(0, 0);
        assert_eq!(info.earned, 0);
        assert_eq!(info.available, 0);
    }

    #[test]
    fn available_is_earned_minus_redeemed() {
        assert_eq!(ticket_info(7, 0).available, 7);
        assert_eq!(ticket_info(5, 2).available, 3);
        assert_eq!(ticket_info(5, 5).available, 0);
    }

    #[test]
    fn over_redeemed_never_goes_negative() {
        for rank_index in 0..8usize {
            for redeemed in 0..12u32 {
                let info = ticket_info(rank_index, redeemed);
                let expected = (rank_index as i64 - redeemed as i64).max(0) as u32;
                assert_eq!(info.available, expected);
                assert_eq!(info.redeemed, redeemed);
            }
        }
    }
}
