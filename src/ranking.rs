//! Olympic-style (competition) ranking: tied values share a rank and the next
//! distinct value's rank equals its 1-based position, so [100, 100, 80] ranks
//! as [1, 1, 3], never [1, 1, 2].

#[derive(Debug, Clone)]
pub struct RankableItem<T> {
    pub item: T,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct RankedItem<T> {
    pub item: T,
    pub value: f64,
    pub rank: usize,
}

/// Sort by value and assign competition ranks.
pub fn rank_with_ties<T>(items: Vec<RankableItem<T>>, descending: bool) -> Vec<RankedItem<T>> {
    let mut sorted = items;
    sorted.sort_by(|a, b| {
        let ordering = a
            .value
            .partial_cmp(&b.value)
            .unwrap_or(std::cmp::Ordering::Equal);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });

    let mut result = Vec::with_capacity(sorted.len());
    let mut current_rank = 1;
    let mut previous_value = None;

    for (index, entry) in sorted.into_iter().enumerate() {
        if previous_value.is_some_and(|prev: f64| prev != entry.value) {
            current_rank = index + 1;
        }
        previous_value = Some(entry.value);
        result.push(RankedItem {
            item: entry.item,
            value: entry.value,
            rank: current_rank,
        });
    }

    result
}

/// Everything ranked `<= n`, so ties spanning the boundary are all included;
/// the result may hold more than `n` items. An optional `min_threshold` drops
/// items with `value < min_threshold` before ranking.
pub fn top_n_with_ties<T>(
    items: Vec<RankableItem<T>>,
    n: usize,
    min_threshold: Option<f64>,
) -> Vec<RankedItem<T>> {
    let filtered: Vec<RankableItem<T>> = match min_threshold {
        Some(min) => items.into_iter().filter(|i| i.value >= min).collect(),
        None => items,
    };
    if filtered.is_empty() {
        return Vec::new();
    }

    rank_with_ties(filtered, true)
        .into_iter()
        .filter(|item| item.rank <= n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(values: &[f64]) -> Vec<RankableItem<usize>> {
        values
            .iter()
            .enumerate()
            .map(|(item, &value)| RankableItem { item, value })
            .collect()
    }

    #[test]
    fn ties_share_a_rank_and_the_next_rank_skips() {
        let ranked = rank_with_ties(items(&[100.0, 100.0, 80.0, 80.0, 60.0]), true);
        let ranks: Vec<usize> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3, 3, 5]);
    }

    #[test]
    fn ascending_order_ranks_low_values_first() {
        let ranked = rank_with_ties(items(&[30.0, 10.0, 20.0]), false);
        let values: Vec<f64> = ranked.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![10.0, 20.0, 30.0]);
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn empty_input_ranks_to_nothing() {
        assert!(rank_with_ties(items(&[]), true).is_empty());
        assert!(top_n_with_ties(items(&[]), 3, None).is_empty());
    }

    #[test]
    fn top_n_includes_ties_spanning_the_boundary() {
        // Ranks are 1,1,3,3,3,6: everything ranked <= 3 is returned
        let top = top_n_with_ties(items(&[100.0, 100.0, 80.0, 80.0, 80.0, 60.0]), 3, None);
        assert_eq!(top.len(), 5);
        assert!(top.iter().all(|item| item.rank <= 3));
    }

    #[test]
    fn threshold_is_inclusive_of_the_minimum() {
        let top = top_n_with_ties(items(&[100.0, 50.0, 49.0]), 3, Some(50.0));
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].value, 50.0);
    }

    #[test]
    fn threshold_filtering_everything_yields_empty() {
        assert!(top_n_with_ties(items(&[10.0, 20.0]), 3, Some(100.0)).is_empty());
    }

    #[test]
    fn ranked_scenario_with_three_tied_at_first() {
        // Two tied at rank 1, one at rank 3; top-3 keeps all three
        let top = top_n_with_ties(items(&[300.0, 300.0, 180.0]), 3, Some(1.0));
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[1].rank, 1);
        assert_eq!(top[2].rank, 3);
    }
}
