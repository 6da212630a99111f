use super::{SymbolId, SymbolRange};

/// A disjoint, ordered union of ranges over a single partition.
///
/// Invariants: every range is non-empty, all ranges share one partition, and
/// insertion always restores canonical form — sorted by `low`, with no two
/// ranges overlapping or touching (touching ranges are merged).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SymbolSet {
    ranges: Vec<SymbolRange>,
}

impl SymbolSet {
    pub fn new() -> Self {
        SymbolSet { ranges: Vec::new() }
    }

    pub fn from_range(r: SymbolRange) -> Self {
        SymbolSet { ranges: vec![r] }
    }

    pub fn ranges(&self) -> &[SymbolRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.find_index(id).is_ok()
    }

    /// Binary search for the range containing `id`, or the insertion point.
    fn find_index(&self, id: SymbolId) -> Result<usize, usize> {
        self.ranges.binary_search_by(|r| {
            if id < r.low() {
                std::cmp::Ordering::Greater
            } else if id > r.high() {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        })
    }

    pub fn add_range(&mut self, r: SymbolRange) {
        // Find every existing range that overlaps-or-touches `r`, merge them
        // all into one, then splice the result back in at the right spot.
        let mut merged = r;
        let mut first_touch = None;
        let mut last_touch = None;
        for (i, existing) in self.ranges.iter().enumerate() {
            if existing.adjacent_or_overlaps(merged) {
                merged = merged.merge(*existing);
                if first_touch.is_none() {
                    first_touch = Some(i);
                }
                last_touch = Some(i);
            } else if first_touch.is_some() {
                break;
            }
        }
        match (first_touch, last_touch) {
            (Some(start), Some(end)) => {
                self.ranges.splice(start..=end, std::iter::once(merged));
            }
            _ => {
                let idx = self.ranges.partition_point(|existing| existing.high() < merged.low());
                self.ranges.insert(idx, merged);
            }
        }
    }

    pub fn add(&mut self, id: SymbolId) {
        self.add_range(SymbolRange::single(id));
    }

    pub fn remove_range(&mut self, r: SymbolRange) {
        let mut result = Vec::with_capacity(self.ranges.len());
        for existing in &self.ranges {
            if !existing.overlaps(r) {
                result.push(*existing);
                continue;
            }
            if existing.low() < r.low() {
                result.push(SymbolRange::new(existing.low(), SymbolId::raw_unchecked(r.low().raw() - 1)));
            }
            if existing.high() > r.high() {
                result.push(SymbolRange::new(SymbolId::raw_unchecked(r.high().raw() + 1), existing.high()));
            }
        }
        self.ranges = result;
    }

    pub fn union(&self, other: &SymbolSet) -> SymbolSet {
        let mut out = self.clone();
        for r in other.ranges() {
            out.add_range(*r);
        }
        out
    }

    pub fn intersect(&self, other: &SymbolSet) -> SymbolSet {
        let mut out = SymbolSet::new();
        for a in &self.ranges {
            for b in &other.ranges {
                if a.overlaps(*b) {
                    let low = a.low().max(b.low());
                    let high = a.high().min(b.high());
                    out.add_range(SymbolRange::new(low, high));
                }
            }
        }
        out
    }

    pub fn difference(&self, other: &SymbolSet) -> SymbolSet {
        let mut out = self.clone();
        for r in other.ranges() {
            out.remove_range(*r);
        }
        out
    }

    pub fn intersects(&self, other: &SymbolSet) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            if a.overlaps(b) {
                return true;
            }
            if a.high() < b.low() {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp(n: u32) -> SymbolId {
        SymbolId::from_code_point(n)
    }
    fn r(lo: u32, hi: u32) -> SymbolRange {
        SymbolRange::new(cp(lo), cp(hi))
    }

    #[test]
    fn add_keeps_canonical_form() {
        let mut s = SymbolSet::new();
        s.add_range(r(10, 20));
        s.add_range(r(0, 5));
        s.add_range(r(6, 9)); // touches both sides -> merges into one
        assert_eq!(s.ranges(), &[r(0, 20)]);
    }

    #[test]
    fn add_disjoint_stays_sorted() {
        let mut s = SymbolSet::new();
        s.add_range(r(100, 110));
        s.add_range(r(0, 5));
        s.add_range(r(50, 60));
        assert_eq!(s.ranges(), &[r(0, 5), r(50, 60), r(100, 110)]);
    }

    #[test]
    fn remove_splits_range() {
        let mut s = SymbolSet::new();
        s.add_range(r(0, 20));
        s.remove_range(r(5, 10));
        assert_eq!(s.ranges(), &[r(0, 4), r(11, 20)]);
    }

    #[test]
    fn intersect_and_difference() {
        let mut a = SymbolSet::new();
        a.add_range(r(0, 10));
        let mut b = SymbolSet::new();
        b.add_range(r(5, 15));
        assert_eq!(a.intersect(&b).ranges(), &[r(5, 10)]);
        assert_eq!(a.difference(&b).ranges(), &[r(0, 4)]);
    }

    #[test]
    fn membership_is_log_n() {
        let mut s = SymbolSet::new();
        for i in 0..50 {
            s.add_range(r(i * 10, i * 10 + 3));
        }
        assert!(s.contains(cp(403)));
        assert!(!s.contains(cp(406)));
    }
}
