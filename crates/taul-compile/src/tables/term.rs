//! Terminal sets used by the FIRST/FOLLOW/PREDICT computation (spec.md
//! §4.4). A terminal for the lexical table is a code point; for the
//! syntactic table it is an LPR id. Both tables additionally predict on
//! the `failure` and `end_of_input` sentinels, which live outside either
//! natural partition, so a [`TermSet`] tracks them as separate flags
//! alongside a [`SymbolSet`] over the rule's natural partition.

use taul_core::{SymbolId, SymbolSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermSet {
    ranges: SymbolSet,
    failure: bool,
    end_of_input: bool,
}

impl TermSet {
    pub fn empty() -> Self {
        TermSet::default()
    }

    pub fn from_ranges(ranges: SymbolSet) -> Self {
        TermSet { ranges, failure: false, end_of_input: false }
    }

    pub fn single(id: SymbolId) -> Self {
        let mut s = TermSet::empty();
        s.ranges.add(id);
        s
    }

    pub fn end_of_input() -> Self {
        TermSet { end_of_input: true, ..Self::empty() }
    }

    pub fn failure() -> Self {
        TermSet { failure: true, ..Self::empty() }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && !self.failure && !self.end_of_input
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        if id.is_failure() {
            return self.failure;
        }
        if id.is_end_of_input() {
            return self.end_of_input;
        }
        self.ranges.contains(id)
    }

    pub fn union(&self, other: &TermSet) -> TermSet {
        TermSet {
            ranges: self.ranges.union(&other.ranges),
            failure: self.failure || other.failure,
            end_of_input: self.end_of_input || other.end_of_input,
        }
    }

    pub fn union_with(&mut self, other: &TermSet) -> bool {
        let merged = self.union(other);
        let changed = merged != *self;
        *self = merged;
        changed
    }

    pub fn overlaps(&self, other: &TermSet) -> bool {
        (self.failure && other.failure)
            || (self.end_of_input && other.end_of_input)
            || self.ranges.intersects(&other.ranges)
    }

    pub fn difference(&self, other: &TermSet) -> TermSet {
        TermSet {
            ranges: self.ranges.difference(&other.ranges),
            failure: self.failure && !other.failure,
            end_of_input: self.end_of_input && !other.end_of_input,
        }
    }

    pub fn ranges(&self) -> &SymbolSet {
        &self.ranges
    }
}

impl std::fmt::Display for TermSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        for r in self.ranges.ranges() {
            parts.push(r.to_string());
        }
        if self.failure {
            parts.push("<failure>".to_string());
        }
        if self.end_of_input {
            parts.push("<end-of-input>".to_string());
        }
        if parts.is_empty() {
            write!(f, "{{}}")
        } else {
            write!(f, "{}", parts.join(" | "))
        }
    }
}
