//! Depth ordering of parent sprites.
//!
//! Box `p` has to be drawn before box `s` unless `s` lies entirely before `p`
//! on some axis (`s.xmax < p.xmin`, same for y and z). When the two boxes
//! overlap on all three axes the one with the smaller sum of bounds goes
//! first. That relation is only a partial order and real scenes can contain
//! cycles; both sorters below always terminate and give a deterministic
//! result for a given input order.
//!
//! Cycles: the stack sorter emits a sprite the second time it is popped, no
//! matter what still precedes it, and a sprite that has been scanned is never
//! offered as a predecessor again. A cycle `A → B → C → A` is therefore cut
//! at the edge that closes back onto the sprite scanned first.

use serde::Deserialize;
use smallvec::SmallVec;

use crate::engine::sprites::WorldBox;

/// Which sorting algorithm the compositor runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SorterKind {
    /// Worklist sorter; near-linear on mostly ordered input.
    #[default]
    Stack,
    /// Plain O(n²) insertion sorter.
    Quadratic,
}

impl SorterKind {
    /// Draw order as indices into `items`.
    pub fn sort<T: AsRef<WorldBox>>(self, items: &[T]) -> Vec<usize> {
        match self {
            SorterKind::Stack => sort_parent_sprites(items),
            SorterKind::Quadratic => sort_parent_sprites_quadratic(items),
        }
    }
}

/// `p` must be drawn before `s`.
#[inline]
fn precedes(p: &WorldBox, s: &WorldBox) -> bool {
    if s.xmax < p.xmin || s.ymax < p.ymin || s.zmax < p.zmin {
        return false;
    }
    !(s.overlaps(p) && s.bound_sum() <= p.bound_sum())
}

/*──────────────────────────── stack sorter ────────────────────────────*/

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Fresh,
    /// Predecessors are queued above it; emit on next pop.
    Compared,
    Returned,
}

const END: usize = usize::MAX;

/// Worklist sorter.
///
/// Sprites are kept in a list ordered by `xmin + ymin`. For the sprite on top
/// of the stack the list is scanned up to `max(xmax, xmin) + max(ymax, ymin)`,
/// which covers every possible predecessor. Without predecessors the sprite
/// is emitted; with a single one that cannot itself have predecessors left,
/// both are emitted; otherwise the sprite is parked and its predecessors are
/// pushed on top, most recently ordered first.
pub fn sort_parent_sprites<T: AsRef<WorldBox>>(items: &[T]) -> Vec<usize> {
    let n = items.len();
    let bx = |i: usize| items[i].as_ref();
    if n < 2 {
        return (0..n).collect();
    }

    let mut mark = vec![Mark::Fresh; n];
    let mut order = vec![0u32; n];
    let mut next_order = 0u32;

    /* first sprite ends up on top of the stack */
    let mut stack: Vec<usize> = Vec::with_capacity(n * 2);
    for i in (0..n).rev() {
        stack.push(i);
        order[i] = next_order;
        next_order += 1;
    }

    /* singly linked list over `sorted`; node `n` is the head sentinel */
    let key = |i: usize| bx(i).xmin as i64 + bx(i).ymin as i64;
    let mut sorted: Vec<usize> = (0..n).collect();
    sorted.sort_by_key(|&i| key(i));
    let mut link: Vec<usize> = (1..=n).collect();
    link[n - 1] = END;
    link.push(0);
    let head = n;

    let mut out = Vec::with_capacity(n);
    let mut preceding: SmallVec<[usize; 16]> = SmallVec::new();
    let mut preceding_prev = head;

    while let Some(s) = stack.pop() {
        match mark[s] {
            Mark::Returned => continue,
            Mark::Compared => {
                out.push(s);
                mark[s] = Mark::Returned;
                continue;
            }
            Mark::Fresh => {}
        }

        let sb = bx(s);
        let ssum = sb.xmax.max(sb.xmin) as i64 + sb.ymax.max(sb.ymin) as i64;

        preceding.clear();
        let mut prev = head;
        let mut node = link[head];
        while node != END && key(sorted[node]) <= ssum {
            let p = sorted[node];
            if p == s {
                // unlink the current sprite, it is never a candidate again
                link[prev] = link[node];
                node = link[prev];
                continue;
            }
            let p_prev = prev;
            prev = node;
            node = link[node];

            if precedes(bx(p), sb) {
                preceding.push(p);
                preceding_prev = p_prev;
            }
        }

        if preceding.is_empty() {
            out.push(s);
            mark[s] = Mark::Returned;
            continue;
        }

        if let [p] = preceding[..] {
            let pb = bx(p);
            if pb.xmax <= sb.xmax && pb.ymax <= sb.ymax && pb.zmax <= sb.zmax {
                mark[p] = Mark::Returned;
                mark[s] = Mark::Returned;
                let victim = link[preceding_prev];
                link[preceding_prev] = link[victim];
                out.push(p);
                out.push(s);
                continue;
            }
        }

        preceding.sort_by(|&a, &b| order[b].cmp(&order[a]));

        mark[s] = Mark::Compared;
        stack.push(s);
        for &p in &preceding {
            order[p] = next_order;
            next_order += 1;
            stack.push(p);
        }
    }

    debug_assert_eq!(out.len(), n);
    out
}

/*─────────────────────────── quadratic sorter ─────────────────────────*/

/// Reference sorter: every sprite is compared with every later one, and each
/// later sprite that must come first is moved in front of it. The moved
/// sprites are compared in turn before the cursor advances.
pub fn sort_parent_sprites_quadratic<T: AsRef<WorldBox>>(items: &[T]) -> Vec<usize> {
    let n = items.len();
    let bx = |i: usize| items[i].as_ref();
    let mut out: Vec<usize> = (0..n).collect();
    let mut done = vec![false; n];

    let mut i = 0;
    while i < n {
        let ps = out[i];
        if done[ps] {
            i += 1;
            continue;
        }
        done[ps] = true;

        for j in i + 1..n {
            let ps2 = out[j];
            if done[ps2] || !precedes(bx(ps2), bx(ps)) {
                continue;
            }
            /* move ps2 in front of the cursor */
            out.copy_within(i..j, i + 1);
            out[i] = ps2;
        }
    }
    out
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;

    /// Box filling one tile cell at ground level.
    fn cell(x: i32, y: i32) -> WorldBox {
        WorldBox {
            xmin: x * 16,
            xmax: x * 16 + 15,
            ymin: y * 16,
            ymax: y * 16 + 15,
            zmin: 0,
            zmax: 15,
        }
    }

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 0 {
            return vec![vec![]];
        }
        let mut all = Vec::new();
        for p in permutations(n - 1) {
            for k in 0..=p.len() {
                let mut q = p.clone();
                q.insert(k, n - 1);
                all.push(q);
            }
        }
        all
    }

    fn sorted_ids(kind: SorterKind, boxes: &[WorldBox]) -> Vec<WorldBox> {
        kind.sort(boxes).into_iter().map(|i| boxes[i]).collect()
    }

    #[test]
    fn chain_is_ordered_for_every_insertion_order() {
        let chain = [cell(0, 0), cell(1, 1), cell(2, 2)];
        for kind in [SorterKind::Stack, SorterKind::Quadratic] {
            for perm in permutations(3) {
                let input: Vec<_> = perm.iter().map(|&i| chain[i]).collect();
                assert_eq!(sorted_ids(kind, &input), chain.to_vec(), "{kind:?} {perm:?}");
            }
        }
    }

    #[test]
    fn stacked_boxes_draw_bottom_first() {
        let low = WorldBox { zmax: 7, ..cell(0, 0) };
        let high = WorldBox { zmin: 8, zmax: 23, ..cell(0, 0) };
        for kind in [SorterKind::Stack, SorterKind::Quadratic] {
            assert_eq!(sorted_ids(kind, &[high, low]), vec![low, high]);
        }
    }

    #[test]
    fn overlapping_boxes_break_ties_by_bound_sum() {
        let a = cell(0, 0);
        let b = WorldBox { xmin: 4, xmax: 19, ..a };
        for kind in [SorterKind::Stack, SorterKind::Quadratic] {
            assert_eq!(sorted_ids(kind, &[b, a]), vec![a, b]);
            assert_eq!(sorted_ids(kind, &[a, b]), vec![a, b]);
        }
    }

    #[test]
    fn disjoint_comparable_pair_is_insertion_independent() {
        let pairs = [(cell(0, 0), cell(1, 0)), (cell(0, 0), cell(0, 3)), (cell(2, 1), cell(5, 4))];
        for (a, b) in pairs {
            for kind in [SorterKind::Stack, SorterKind::Quadratic] {
                assert_eq!(sorted_ids(kind, &[b, a]), vec![a, b]);
                assert_eq!(sorted_ids(kind, &[a, b]), vec![a, b]);
            }
        }
    }

    #[test]
    fn cycle_terminates_deterministically() {
        // three slabs, each one in front of the next on a different axis
        let a = WorldBox { xmin: 0, xmax: 31, ymin: 0, ymax: 9, zmin: 0, zmax: 9 };
        let b = WorldBox { xmin: 20, xmax: 29, ymin: 0, ymax: 31, zmin: 5, zmax: 14 };
        let c = WorldBox { xmin: 0, xmax: 9, ymin: 5, ymax: 14, zmin: 0, zmax: 31 };
        for kind in [SorterKind::Stack, SorterKind::Quadratic] {
            let first = kind.sort(&[a, b, c]);
            let again = kind.sort(&[a, b, c]);
            assert_eq!(first, again);
            let mut seen = first.clone();
            seen.sort();
            assert_eq!(seen, vec![0, 1, 2]);
        }
    }

    #[test]
    fn trivial_inputs() {
        let none: [WorldBox; 0] = [];
        assert!(sort_parent_sprites(&none).is_empty());
        assert_eq!(sort_parent_sprites(&[cell(3, 3)]), vec![0]);
        assert_eq!(sort_parent_sprites_quadratic(&[cell(3, 3)]), vec![0]);
    }

    #[test]
    fn sorter_kind_from_toml_names() {
        #[derive(Deserialize)]
        struct Wrap {
            sorter: SorterKind,
        }
        let w: Wrap = toml::from_str("sorter = \"quadratic\"").unwrap();
        assert_eq!(w.sorter, SorterKind::Quadratic);
    }
}
