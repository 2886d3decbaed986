//! Span-augmented skip list.
//!
//! Nodes live in an arena (`Vec<Option<Node>>`) and are addressed by index;
//! slot 0 is the head sentinel and freed slots are recycled through a free
//! list. The member hash index in the sorted set stores these arena indices,
//! which sidesteps the cyclic-ownership problem a pointer-linked skip list
//! would pose.
//!
//! Every forward pointer carries a span: the number of level-0 nodes it
//! skips, counting its target. Accumulating spans along a search path yields
//! a node's 1-based rank in O(log n).

use std::cmp::Ordering;

use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const MAX_LEVEL: usize = 32;
const BRANCH_PROBABILITY: f64 = 0.25;

/// Arena slot of the head sentinel.
const HEAD: usize = 0;

struct Level {
    forward: Option<usize>,
    span: usize,
}

struct Node {
    member: Bytes,
    score: f64,
    backward: Option<usize>,
    levels: Vec<Level>,
}

impl Node {
    fn new(member: Bytes, score: f64, height: usize) -> Self {
        Self {
            member,
            score,
            backward: None,
            levels: (0..height)
                .map(|_| Level {
                    forward: None,
                    span: 0,
                })
                .collect(),
        }
    }
}

pub(crate) struct SkipList {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    tail: Option<usize>,
    /// Highest level currently in use, in [1, MAX_LEVEL].
    level: usize,
    length: usize,
    rng: SmallRng,
}

impl SkipList {
    pub(crate) fn new() -> Self {
        // The head sentinel carries all MAX_LEVEL slots and no member.
        let head = Node::new(Bytes::new(), 0.0, MAX_LEVEL);
        Self {
            nodes: vec![Some(head)],
            free: Vec::new(),
            tail: None,
            level: 1,
            length: 0,
            rng: SmallRng::from_entropy(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.length
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// First real node on level 0.
    pub(crate) fn first(&self) -> Option<usize> {
        self.node(HEAD).levels[0].forward
    }

    pub(crate) fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub(crate) fn next(&self, id: usize) -> Option<usize> {
        self.node(id).levels[0].forward
    }

    pub(crate) fn prev(&self, id: usize) -> Option<usize> {
        self.node(id).backward
    }

    pub(crate) fn member(&self, id: usize) -> &Bytes {
        &self.node(id).member
    }

    pub(crate) fn score(&self, id: usize) -> f64 {
        self.node(id).score
    }

    fn node(&self, id: usize) -> &Node {
        self.nodes[id].as_ref().expect("arena slot must be live")
    }

    fn node_mut(&mut self, id: usize) -> &mut Node {
        self.nodes[id].as_mut().expect("arena slot must be live")
    }

    fn alloc(&mut self, member: Bytes, score: f64, height: usize) -> usize {
        let node = Node::new(member, score, height);
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, id: usize) {
        self.nodes[id] = None;
        self.free.push(id);
    }

    /// Total order on (score, member). Scores never hold NaN, so the partial
    /// comparison is total here; -0.0 and +0.0 land in the Equal arm and
    /// fall through to the member tiebreak.
    fn key_cmp(score_a: f64, member_a: &[u8], score_b: f64, member_b: &[u8]) -> Ordering {
        score_a
            .partial_cmp(&score_b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| member_a.cmp(member_b))
    }

    /// Geometric height draw: P(height >= h) = p^(h-1), capped at MAX_LEVEL.
    fn random_level(&mut self) -> usize {
        let mut height = 1;
        while height < MAX_LEVEL && self.rng.gen::<f64>() < BRANCH_PROBABILITY {
            height += 1;
        }
        height
    }

    /// Insert a node for (score, member) and return its arena index.
    ///
    /// The caller guarantees no node with this exact (score, member) exists;
    /// the sorted set deletes the old node before re-inserting on a score
    /// change.
    pub(crate) fn insert(&mut self, score: f64, member: Bytes) -> usize {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        let mut x = HEAD;
        for i in (0..self.level).rev() {
            // Each level inherits the rank accumulated above it.
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            loop {
                let node = self.node(x);
                match node.levels[i].forward {
                    Some(next)
                        if Self::key_cmp(
                            self.node(next).score,
                            &self.node(next).member,
                            score,
                            &member,
                        ) == Ordering::Less =>
                    {
                        rank[i] += node.levels[i].span;
                        x = next;
                    }
                    _ => break,
                }
            }
            update[i] = x;
        }

        let height = self.random_level();
        if height > self.level {
            for i in self.level..height {
                rank[i] = 0;
                update[i] = HEAD;
                // A brand-new head pointer spans the whole existing list.
                let length = self.length;
                self.node_mut(HEAD).levels[i].span = length;
            }
            self.level = height;
        }

        let id = self.alloc(member, score, height);
        for i in 0..height {
            let prev_forward = self.node(update[i]).levels[i].forward;
            let prev_span = self.node(update[i]).levels[i].span;

            let node = self.node_mut(id);
            node.levels[i].forward = prev_forward;
            node.levels[i].span = prev_span - (rank[0] - rank[i]);

            let prev = self.node_mut(update[i]);
            prev.levels[i].forward = Some(id);
            prev.levels[i].span = (rank[0] - rank[i]) + 1;
        }

        // Untouched upper levels now skip one more level-0 node.
        for i in height..self.level {
            self.node_mut(update[i]).levels[i].span += 1;
        }

        self.node_mut(id).backward = if update[0] == HEAD {
            None
        } else {
            Some(update[0])
        };
        match self.node(id).levels[0].forward {
            Some(next) => self.node_mut(next).backward = Some(id),
            None => self.tail = Some(id),
        }

        self.length += 1;
        id
    }

    /// Remove the node matching (score, member) exactly. Returns false when
    /// no such node exists.
    pub(crate) fn delete(&mut self, score: f64, member: &[u8]) -> bool {
        let mut update = [HEAD; MAX_LEVEL];

        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                match node.levels[i].forward {
                    Some(next)
                        if Self::key_cmp(
                            self.node(next).score,
                            &self.node(next).member,
                            score,
                            member,
                        ) == Ordering::Less =>
                    {
                        x = next;
                    }
                    _ => break,
                }
            }
            update[i] = x;
        }

        match self.node(x).levels[0].forward {
            Some(target)
                if self.node(target).score == score
                    && self.node(target).member.as_ref() == member =>
            {
                self.unlink(target, &update);
                true
            }
            _ => false,
        }
    }

    fn unlink(&mut self, id: usize, update: &[usize; MAX_LEVEL]) {
        for i in 0..self.level {
            if self.node(update[i]).levels[i].forward == Some(id) {
                // Absorb the outgoing span.
                let span = self.node(id).levels[i].span;
                let forward = self.node(id).levels[i].forward;
                let prev = self.node_mut(update[i]);
                prev.levels[i].span += span;
                prev.levels[i].span -= 1;
                prev.levels[i].forward = forward;
            } else {
                self.node_mut(update[i]).levels[i].span -= 1;
            }
        }

        match self.node(id).levels[0].forward {
            Some(next) => {
                let backward = self.node(id).backward;
                self.node_mut(next).backward = backward;
            }
            None => self.tail = self.node(id).backward,
        }

        while self.level > 1 && self.node(HEAD).levels[self.level - 1].forward.is_none() {
            self.level -= 1;
        }

        self.release(id);
        self.length -= 1;
    }

    /// 1-based rank of (score, member) in ascending order, or None when the
    /// walk never lands on the member.
    ///
    /// The advance comparison is <= rather than the < used by insert and
    /// delete: the accumulated spans must include the target node itself for
    /// the running total to equal its position.
    pub(crate) fn rank(&self, score: f64, member: &[u8]) -> Option<usize> {
        let mut rank = 0usize;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                match node.levels[i].forward {
                    Some(next)
                        if Self::key_cmp(
                            self.node(next).score,
                            &self.node(next).member,
                            score,
                            member,
                        ) != Ordering::Greater =>
                    {
                        rank += node.levels[i].span;
                        x = next;
                    }
                    _ => break,
                }
            }
            if x != HEAD && self.node(x).member.as_ref() == member {
                return Some(rank);
            }
        }
        None
    }

    /// Node holding the given 1-based rank, or None when out of range.
    pub(crate) fn node_by_rank(&self, target: usize) -> Option<usize> {
        if target == 0 || target > self.length {
            return None;
        }
        let mut traversed = 0usize;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                match node.levels[i].forward {
                    Some(next) if traversed + node.levels[i].span <= target => {
                        traversed += node.levels[i].span;
                        x = next;
                    }
                    _ => break,
                }
            }
            if traversed == target {
                return Some(x);
            }
        }
        None
    }

    /// First node with score >= min, or > min when `exclusive`.
    pub(crate) fn first_in_score_range(&self, min: f64, exclusive: bool) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                match node.levels[i].forward {
                    Some(next) => {
                        let s = self.node(next).score;
                        let advance = if exclusive { s <= min } else { s < min };
                        if advance {
                            x = next;
                        } else {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
        self.node(x).levels[0].forward
    }

    /// Last node with score <= max, or < max when `exclusive`.
    pub(crate) fn last_in_score_range(&self, max: f64, exclusive: bool) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                match node.levels[i].forward {
                    Some(next) => {
                        let s = self.node(next).score;
                        let advance = if exclusive { s < max } else { s <= max };
                        if advance {
                            x = next;
                        } else {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
        if x == HEAD {
            None
        } else {
            Some(x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    impl SkipList {
        /// Assert every structural invariant of the list. O(n * level), test
        /// builds only.
        fn check_invariants(&self) {
            // Level-0 chain: strictly ascending keys, correct backward links,
            // node count equals length, tail is the last node.
            let mut count = 0;
            let mut prev: Option<usize> = None;
            let mut x = self.first();
            while let Some(id) = x {
                let node = self.node(id);
                assert_eq!(node.backward, prev, "backward link mismatch");
                if let Some(p) = prev {
                    let pn = self.node(p);
                    assert_eq!(
                        Self::key_cmp(pn.score, &pn.member, node.score, &node.member),
                        Ordering::Less,
                        "level-0 chain is not strictly ascending"
                    );
                }
                count += 1;
                prev = x;
                x = node.levels[0].forward;
            }
            assert_eq!(count, self.length);
            assert_eq!(self.tail, prev);

            // Every level's spans, including the trailing pointer of each
            // chain, sum to the full length.
            for i in 0..self.level {
                let mut sum = 0;
                let mut x = HEAD;
                loop {
                    let node = self.node(x);
                    sum += node.levels[i].span;
                    match node.levels[i].forward {
                        Some(next) => x = next,
                        None => break,
                    }
                }
                assert_eq!(sum, self.length, "span sum mismatch at level {}", i);
            }

            // Span-accumulated rank agrees with level-0 position.
            let mut position = 0;
            let mut x = self.first();
            while let Some(id) = x {
                position += 1;
                let node = self.node(id);
                assert_eq!(
                    self.rank(node.score, &node.member),
                    Some(position),
                    "rank disagrees with level-0 position"
                );
                assert_eq!(self.node_by_rank(position), Some(id));
                x = node.levels[0].forward;
            }

            // The in-use level matches the tallest live node (1 when empty).
            let max_height = self
                .nodes
                .iter()
                .skip(1)
                .flatten()
                .map(|n| n.levels.len())
                .max()
                .unwrap_or(1);
            assert_eq!(self.level, max_height.max(1));
        }
    }

    fn member(i: usize) -> Bytes {
        Bytes::from(format!("member-{:05}", i))
    }

    #[test]
    fn test_insert_ascending_order() {
        let mut list = SkipList::new();
        for i in 0..64 {
            list.insert(i as f64, member(i));
            list.check_invariants();
        }
        assert_eq!(list.len(), 64);
        assert_eq!(list.rank(0.0, &member(0)), Some(1));
        assert_eq!(list.rank(63.0, &member(63)), Some(64));
    }

    #[test]
    fn test_insert_random_order() {
        let mut list = SkipList::new();
        let mut order: Vec<usize> = (0..128).collect();
        order.shuffle(&mut thread_rng());
        for &i in &order {
            list.insert(i as f64, member(i));
        }
        list.check_invariants();
        for i in 0..128 {
            assert_eq!(list.rank(i as f64, &member(i)), Some(i + 1));
        }
    }

    #[test]
    fn test_delete_maintains_spans() {
        let mut list = SkipList::new();
        for i in 0..100 {
            list.insert(i as f64, member(i));
        }
        // Delete every third node, checking structure after each unlink.
        for i in (0..100).step_by(3) {
            assert!(list.delete(i as f64, &member(i)));
            list.check_invariants();
        }
        assert!(!list.delete(0.0, &member(0)));
        assert_eq!(list.len(), 66);
    }

    #[test]
    fn test_delete_requires_exact_key() {
        let mut list = SkipList::new();
        list.insert(1.0, member(1));
        assert!(!list.delete(2.0, &member(1)));
        assert!(!list.delete(1.0, &member(2)));
        assert_eq!(list.len(), 1);
        assert!(list.delete(1.0, &member(1)));
        assert!(list.is_empty());
        list.check_invariants();
    }

    #[test]
    fn test_equal_scores_order_by_member() {
        let mut list = SkipList::new();
        for name in ["delta", "alpha", "charlie", "bravo"] {
            list.insert(5.0, Bytes::from(name));
        }
        list.check_invariants();
        assert_eq!(list.rank(5.0, b"alpha"), Some(1));
        assert_eq!(list.rank(5.0, b"bravo"), Some(2));
        assert_eq!(list.rank(5.0, b"charlie"), Some(3));
        assert_eq!(list.rank(5.0, b"delta"), Some(4));
    }

    #[test]
    fn test_zero_signs_compare_equal() {
        let mut list = SkipList::new();
        list.insert(-0.0, Bytes::from("neg"));
        list.insert(0.0, Bytes::from("pos"));
        // Same score bucket, member tiebreak applies.
        assert_eq!(list.rank(0.0, b"neg"), Some(1));
        assert_eq!(list.rank(-0.0, b"pos"), Some(2));
        assert!(list.delete(0.0, b"neg"));
        list.check_invariants();
    }

    #[test]
    fn test_node_by_rank_bounds() {
        let mut list = SkipList::new();
        assert_eq!(list.node_by_rank(1), None);
        list.insert(1.0, member(1));
        assert_eq!(list.node_by_rank(0), None);
        assert!(list.node_by_rank(1).is_some());
        assert_eq!(list.node_by_rank(2), None);
    }

    #[test]
    fn test_score_range_entry_nodes() {
        let mut list = SkipList::new();
        for i in 0..10 {
            list.insert(i as f64, member(i));
        }

        let id = list.first_in_score_range(3.0, false).unwrap();
        assert_eq!(list.score(id), 3.0);
        let id = list.first_in_score_range(3.0, true).unwrap();
        assert_eq!(list.score(id), 4.0);
        assert_eq!(list.first_in_score_range(9.5, false), None);

        let id = list.last_in_score_range(6.0, false).unwrap();
        assert_eq!(list.score(id), 6.0);
        let id = list.last_in_score_range(6.0, true).unwrap();
        assert_eq!(list.score(id), 5.0);
        assert_eq!(list.last_in_score_range(-1.0, false), None);
    }

    #[test]
    fn test_random_churn_keeps_invariants() {
        let mut rng = thread_rng();
        let mut list = SkipList::new();
        let mut live: Vec<(usize, f64)> = Vec::new();

        for round in 0..2_000 {
            if live.is_empty() || rng.gen_bool(0.6) {
                let i = round;
                let score = rng.gen_range(-1_000.0..1_000.0);
                list.insert(score, member(i));
                live.push((i, score));
            } else {
                let at = rng.gen_range(0..live.len());
                let (i, score) = live.swap_remove(at);
                assert!(list.delete(score, &member(i)));
            }
            if round % 251 == 0 {
                list.check_invariants();
            }
        }
        list.check_invariants();
        assert_eq!(list.len(), live.len());
    }
}
