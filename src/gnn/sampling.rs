//! Negative sampling of non-edges.

use rand::seq::index;
use rand::Rng;
use std::collections::HashSet;

/// Draw up to `count` distinct ordered pairs (s, t), s != t, that are not
/// edges of the graph.
///
/// Fewer pairs are returned when the complement is smaller than `count`.
pub fn negative_sampling<R: Rng + ?Sized>(
    num_nodes: usize,
    edges: &[(usize, usize)],
    count: usize,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    if num_nodes < 2 || count == 0 {
        return Vec::new();
    }

    let existing: HashSet<(usize, usize)> = edges.iter().copied().filter(|(s, t)| s != t).collect();
    let total = num_nodes * (num_nodes - 1);
    let available = total.saturating_sub(existing.len());
    let wanted = count.min(available);
    if wanted == 0 {
        return Vec::new();
    }

    if 2 * available >= total {
        // sparse graph: rejection sampling terminates quickly
        let mut chosen = HashSet::with_capacity(wanted);
        let mut out = Vec::with_capacity(wanted);
        while out.len() < wanted {
            let s = rng.gen_range(0..num_nodes);
            let t = rng.gen_range(0..num_nodes);
            if s == t || existing.contains(&(s, t)) || !chosen.insert((s, t)) {
                continue;
            }
            out.push((s, t));
        }
        return out;
    }

    let complement: Vec<(usize, usize)> = (0..num_nodes)
        .flat_map(|s| (0..num_nodes).map(move |t| (s, t)))
        .filter(|&(s, t)| s != t && !existing.contains(&(s, t)))
        .collect();
    index::sample(rng, complement.len(), wanted)
        .into_iter()
        .map(|i| complement[i])
        .collect()
}
