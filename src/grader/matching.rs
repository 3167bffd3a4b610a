//! Maximum bipartite matching between predicted and ground-truth spans.
//!
//! Candidate edges only connect spans in the same file, so the graph splits
//! into one independent component per path. Each component is solved with
//! augmenting paths (Kuhn's algorithm).

use std::collections::BTreeMap;

use crate::finding::Span;

/// Number of predicted spans that can be paired one-to-one with ground-truth
/// spans they overlap within `tolerance` lines.
pub fn maximum_span_matching(
    predicted: &[Span<'_>],
    ground_truth: &[Span<'_>],
    tolerance: u32,
) -> usize {
    let mut groups: BTreeMap<&str, (Vec<Span<'_>>, Vec<Span<'_>>)> = BTreeMap::new();
    for span in predicted {
        groups.entry(span.path).or_default().0.push(*span);
    }
    for span in ground_truth {
        groups.entry(span.path).or_default().1.push(*span);
    }

    groups
        .values()
        .filter(|(left, right)| !left.is_empty() && !right.is_empty())
        .map(|(left, right)| {
            let adjacency: Vec<Vec<usize>> = left
                .iter()
                .map(|p| {
                    right
                        .iter()
                        .enumerate()
                        .filter(|(_, g)| p.overlaps(g, tolerance))
                        .map(|(j, _)| j)
                        .collect()
                })
                .collect();
            maximum_matching(&adjacency, right.len())
        })
        .sum()
}

/// Size of a maximum matching in a bipartite graph given as adjacency lists
/// from left vertices to right vertex indices.
pub fn maximum_matching(adjacency: &[Vec<usize>], right_count: usize) -> usize {
    let mut match_right: Vec<Option<usize>> = vec![None; right_count];
    let mut size = 0;
    for left in 0..adjacency.len() {
        let mut visited = vec![false; right_count];
        if augment(left, adjacency, &mut visited, &mut match_right) {
            size += 1;
        }
    }
    size
}

fn augment(
    left: usize,
    adjacency: &[Vec<usize>],
    visited: &mut [bool],
    match_right: &mut [Option<usize>],
) -> bool {
    for &right in &adjacency[left] {
        if visited[right] {
            continue;
        }
        visited[right] = true;
        let free = match match_right[right] {
            None => true,
            Some(other) => augment(other, adjacency, visited, match_right),
        };
        if free {
            match_right[right] = Some(left);
            return true;
        }
    }
    false
}
