//! User specific rule ordering

use oneclick_core::UserRuleOrder;
use std::cmp::Ordering;

/// Sort items by the user's ranks
///
/// Ranked items come first in ascending rank. Unranked items follow in
/// their input order. The sort is stable, so items sharing a rank also
/// keep their input order.
pub fn sort_by_user_order<T, F>(items: &mut [T], order: &UserRuleOrder, id: F)
where
    F: Fn(&T) -> &str,
{
    if order.is_empty() {
        return;
    }

    items.sort_by(|a, b| {
        let rank_a = order.get(&id(a).to_lowercase());
        let rank_b = order.get(&id(b).to_lowercase());
        match (rank_a, rank_b) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    });
}

/// Move the item at `old_index` to `new_index`, shifting the items between
pub fn move_item<T>(items: &mut Vec<T>, old_index: usize, new_index: usize) {
    let item = items.remove(old_index);
    items.insert(new_index, item);
}

/// Rank every id by its position
pub fn order_from_positions<'a, I>(ids: I) -> UserRuleOrder
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter()
        .enumerate()
        .map(|(index, id)| (id.to_lowercase(), index as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn order(ranks: &[(&str, i64)]) -> UserRuleOrder {
        ranks.iter().map(|(id, rank)| (id.to_string(), *rank)).collect()
    }

    fn sorted(ids: &[&str], ranks: &[(&str, i64)]) -> Vec<String> {
        let mut items: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        sort_by_user_order(&mut items, &order(ranks), |s| s.as_str());
        items
    }

    #[rstest]
    #[case::ranked_before_unranked(&["a", "b", "c"], &[("b", 0)], &["b", "a", "c"])]
    #[case::ascending_rank(&["a", "b", "c"], &[("a", 2), ("b", 1), ("c", 0)], &["c", "b", "a"])]
    #[case::unranked_keep_input_order(&["d", "c", "b", "a"], &[("a", 5)], &["a", "d", "c", "b"])]
    #[case::equal_ranks_keep_input_order(&["x", "y", "z"], &[("z", 1), ("y", 1), ("x", 1)], &["x", "y", "z"])]
    #[case::no_order(&["b", "a"], &[], &["b", "a"])]
    #[case::case_insensitive_ids(&["A", "B"], &[("b", 0)], &["B", "A"])]
    fn test_sort_by_user_order(
        #[case] ids: &[&str],
        #[case] ranks: &[(&str, i64)],
        #[case] expected: &[&str],
    ) {
        assert_eq!(sorted(ids, ranks), expected);
    }

    #[test]
    fn test_move_item_and_recompute_order() {
        let mut items = vec!["a", "b", "c"];
        move_item(&mut items, 2, 0);
        assert_eq!(items, vec!["c", "a", "b"]);

        let order = order_from_positions(items.iter().copied());
        assert_eq!(order, self::order(&[("c", 0), ("a", 1), ("b", 2)]));
    }

    #[test]
    fn test_move_item_forward() {
        let mut items = vec!["a", "b", "c", "d"];
        move_item(&mut items, 0, 2);
        assert_eq!(items, vec!["b", "c", "a", "d"]);
    }
}
