// Splitting an oversized roster into balanced, independent draft groups.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// The sizing decision behind a split, before any participant is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitPlan {
    /// Most participants a single session can hold given item scarcity.
    pub actual_max_players: usize,
    /// Number of groups the rounding step asked for.
    pub num_groups: usize,
    /// Chunk size used when slicing the shuffled roster.
    pub players_per_group: usize,
}

impl SplitPlan {
    /// Size the split for `roster_size` participants.
    ///
    /// A `target_group_size` of 0 disables splitting: one group holds
    /// everyone. Group size never exceeds the structural ceiling
    /// `pool_size / alliance_size`; when the ceiling bites, the slicing step
    /// produces an extra, smaller trailing group instead.
    pub fn compute(
        roster_size: usize,
        alliance_size: usize,
        pool_size: usize,
        target_group_size: usize,
    ) -> Self {
        let actual_max_players = (pool_size / alliance_size.max(1)).max(1);

        if target_group_size == 0 || roster_size == 0 {
            return SplitPlan {
                actual_max_players,
                num_groups: 1,
                players_per_group: roster_size.max(1),
            };
        }

        let effective_target = target_group_size.min(actual_max_players);
        let num_groups = round_half_up(roster_size, effective_target).max(1);
        let players_per_group = roster_size.div_ceil(num_groups).min(actual_max_players);

        SplitPlan {
            actual_max_players,
            num_groups,
            players_per_group,
        }
    }
}

/// Shuffle `participants` and slice them into groups per [`SplitPlan`].
///
/// Every participant lands in exactly one group, in one contiguous run of
/// the shuffled order. The last group may be smaller than the rest.
pub fn split_groups<T, R: Rng + ?Sized>(
    mut participants: Vec<T>,
    alliance_size: usize,
    pool_size: usize,
    target_group_size: usize,
    rng: &mut R,
) -> Vec<Vec<T>> {
    let plan = SplitPlan::compute(
        participants.len(),
        alliance_size,
        pool_size,
        target_group_size,
    );
    if plan.num_groups == 1 && plan.players_per_group >= participants.len() {
        return vec![participants];
    }

    participants.shuffle(rng);

    let mut groups = Vec::with_capacity(plan.num_groups);
    let mut rest = participants.into_iter().peekable();
    while rest.peek().is_some() {
        groups.push(rest.by_ref().take(plan.players_per_group).collect());
    }
    groups
}

/// `numerator / denominator` rounded to the nearest integer, halves up.
fn round_half_up(numerator: usize, denominator: usize) -> usize {
    (2 * numerator + denominator) / (2 * denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_half_up(10, 4), 3);
        assert_eq!(round_half_up(9, 4), 2);
        assert_eq!(round_half_up(11, 4), 3);
        assert_eq!(round_half_up(1, 4), 0);
    }

    #[test]
    fn plan_ten_players_target_four() {
        // 18 items / 3 per alliance = 6 seats
        let plan = SplitPlan::compute(10, 3, 18, 4);
        assert_eq!(plan.actual_max_players, 6);
        assert_eq!(plan.num_groups, 3);
        assert_eq!(plan.players_per_group, 4);
    }

    #[test]
    fn plan_target_zero_means_one_group() {
        let plan = SplitPlan::compute(40, 3, 18, 0);
        assert_eq!(plan.num_groups, 1);
        assert_eq!(plan.players_per_group, 40);
    }

    #[test]
    fn plan_caps_at_structural_ceiling() {
        // 4 seats available, target 10 is clamped to 4; 9 players round to
        // 2 groups of 5 which would overflow, so chunks are capped at 4.
        let plan = SplitPlan::compute(9, 2, 8, 10);
        assert_eq!(plan.actual_max_players, 4);
        assert_eq!(plan.num_groups, 2);
        assert_eq!(plan.players_per_group, 4);
    }

    #[test]
    fn plan_tiny_roster_still_one_group() {
        let plan = SplitPlan::compute(1, 3, 30, 4);
        assert_eq!(plan.num_groups, 1);
        assert_eq!(plan.players_per_group, 1);
    }

    #[test]
    fn split_ten_into_three_balanced_groups() {
        let mut rng = StdRng::seed_from_u64(7);
        let groups = split_groups((0..10).collect::<Vec<u32>>(), 3, 18, 4, &mut rng);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let mut everyone: Vec<u32> = groups.into_iter().flatten().collect();
        everyone.sort_unstable();
        assert_eq!(everyone, (0..10).collect::<Vec<u32>>());
    }

    #[test]
    fn ceiling_overflow_spawns_extra_group() {
        let mut rng = StdRng::seed_from_u64(1);
        let groups = split_groups((0..9).collect::<Vec<u32>>(), 2, 8, 10, &mut rng);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        assert!(groups.iter().all(|g| g.len() <= 4));
    }

    #[test]
    fn disabled_split_keeps_order() {
        let mut rng = StdRng::seed_from_u64(3);
        let groups = split_groups(vec!["a", "b", "c"], 1, 10, 0, &mut rng);
        assert_eq!(groups, vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn same_seed_same_groups() {
        let a = split_groups((0..12).collect::<Vec<u32>>(), 2, 20, 5, &mut StdRng::seed_from_u64(99));
        let b = split_groups((0..12).collect::<Vec<u32>>(), 2, 20, 5, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
