//! Minimal move plans for reordering host children.

use alloc::{vec, vec::Vec};

/// Returns the indices of a longest strictly increasing subsequence of `seq`.
#[must_use]
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k]: index of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessors = vec![usize::MAX; seq.len()];
    for (index, value) in seq.iter().enumerate() {
        let slot = tails.partition_point(|&tail| seq[tail] < *value);
        if slot > 0 {
            predecessors[index] = tails[slot - 1];
        }
        if slot == tails.len() {
            tails.push(index);
        } else {
            tails[slot] = index;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied().unwrap_or(usize::MAX);
    while cursor != usize::MAX {
        result.push(cursor);
        cursor = predecessors[cursor];
    }
    result.reverse();
    result
}

/// Decides which nodes can stay where they are.
///
/// `positions[i]` is the current index of the node that should end up at
/// index `i`, or `None` for nodes that are not attached yet. The returned mask
/// is `true` for nodes that keep their place; every other node has to be
/// inserted.
#[must_use]
pub fn plan_moves(positions: &[Option<usize>]) -> Vec<bool> {
    let attached: Vec<usize> = positions
        .iter()
        .enumerate()
        .filter_map(|(index, position)| position.map(|_| index))
        .collect();
    let sequence: Vec<usize> = attached
        .iter()
        .filter_map(|&index| positions[index])
        .collect();

    let mut keep = vec![false; positions.len()];
    for lis_index in longest_increasing_subsequence(&sequence) {
        keep[attached[lis_index]] = true;
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lis_of_sorted_input_is_everything() {
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2, 3]), [0, 1, 2, 3]);
        assert!(longest_increasing_subsequence(&[]).is_empty());
    }

    #[test]
    fn lis_picks_a_longest_run() {
        let seq = [3, 0, 1, 4, 2, 5];
        let lis = longest_increasing_subsequence(&seq);
        assert_eq!(lis.len(), 4);
        assert!(lis.windows(2).all(|pair| seq[pair[0]] < seq[pair[1]]));
    }

    #[test]
    fn moving_the_last_node_to_the_front_moves_one_node() {
        // [a, b, c, d] -> [d, a, b, c]
        let keep = plan_moves(&[Some(3), Some(0), Some(1), Some(2)]);
        assert_eq!(keep, [false, true, true, true]);
    }

    #[test]
    fn new_nodes_are_always_inserted() {
        let keep = plan_moves(&[None, Some(0), None, Some(1)]);
        assert_eq!(keep, [false, true, false, true]);
    }

    #[test]
    fn reversal_keeps_a_single_node() {
        let keep = plan_moves(&[Some(2), Some(1), Some(0)]);
        assert_eq!(keep.iter().filter(|kept| **kept).count(), 1);
    }
}
