use super::SymbolId;

/// An inclusive `[low, high]` range over ids within a single partition.
///
/// Construction panics if `low` and `high` fall in different partitions or
/// if `low > high` — a range is never empty and never straddles partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SymbolRange {
    low: SymbolId,
    high: SymbolId,
}

impl SymbolRange {
    pub fn new(low: SymbolId, high: SymbolId) -> Self {
        assert!(low <= high, "symbol range must be non-empty: {low} > {high}");
        assert_eq!(
            low.partition(),
            high.partition(),
            "symbol range must stay within one partition"
        );
        SymbolRange { low, high }
    }

    pub fn single(id: SymbolId) -> Self {
        SymbolRange { low: id, high: id }
    }

    #[inline]
    pub fn low(self) -> SymbolId {
        self.low
    }

    #[inline]
    pub fn high(self) -> SymbolId {
        self.high
    }

    #[inline]
    pub fn len(self) -> u32 {
        self.high.raw() - self.low.raw() + 1
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        false
    }

    #[inline]
    pub fn contains(self, id: SymbolId) -> bool {
        self.low <= id && id <= self.high
    }

    /// Ranges overlap if, by inclusive-endpoint comparison, neither lies
    /// strictly before the other.
    #[inline]
    pub fn overlaps(self, other: SymbolRange) -> bool {
        self.low <= other.high && other.low <= self.high
    }

    /// Two ranges are adjacent (and thus mergeable into one contiguous range)
    /// if they overlap or their endpoints are consecutive ids.
    #[inline]
    pub fn adjacent_or_overlaps(self, other: SymbolRange) -> bool {
        if self.overlaps(other) {
            return true;
        }
        if self.high.raw() + 1 == other.low.raw() {
            return true;
        }
        if other.high.raw() + 1 == self.low.raw() {
            return true;
        }
        false
    }

    /// The union of two overlapping/adjacent ranges. Panics if disjoint.
    pub fn merge(self, other: SymbolRange) -> SymbolRange {
        assert!(self.adjacent_or_overlaps(other), "cannot merge disjoint ranges");
        SymbolRange {
            low: self.low.min(other.low),
            high: self.high.max(other.high),
        }
    }
}

impl std::fmt::Display for SymbolRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "[{}, {}]", self.low, self.high)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp(n: u32) -> SymbolId {
        SymbolId::from_code_point(n)
    }

    #[test]
    fn overlap_is_inclusive_endpoint_comparison() {
        let a = SymbolRange::new(cp(0), cp(10));
        let b = SymbolRange::new(cp(10), cp(20));
        assert!(a.overlaps(b));
        let c = SymbolRange::new(cp(11), cp(20));
        assert!(!a.overlaps(c));
        assert!(a.adjacent_or_overlaps(c));
    }

    #[test]
    #[should_panic]
    fn mixed_partition_range_panics() {
        SymbolRange::new(cp(0), SymbolId::from_lpr_index(0));
    }

    #[test]
    fn merge_adjacent() {
        let a = SymbolRange::new(cp(0), cp(5));
        let b = SymbolRange::new(cp(6), cp(9));
        let m = a.merge(b);
        assert_eq!(m.low(), cp(0));
        assert_eq!(m.high(), cp(9));
    }
}
