use std::{
    collections::BTreeMap,
    fmt::Display,
    hash::{Hash, Hasher},
};

use crate::math::traits::Number;

use super::basis::Label;

/**
 * A basic feasible solution: the nonzero values of the basic variables, keyed by label. Nonbasic
 * variables (and degenerate basic ones) are implicitly zero.
 *
 * Two solutions are equal when they have the same label set, whatever the values. Vertex enumeration
 * deduplicates on this.
 */
#[derive(Clone, Debug, Default)]
pub struct BasicFeasibleSolution<T> {
    values: BTreeMap<Label, T>,
}

impl<T: Number> BasicFeasibleSolution<T> {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Stores the value unless it is zero within `eps`.
    pub fn insert(&mut self, label: Label, value: T, eps: f64) {
        if !value.eq_zero(eps) {
            self.values.insert(label, value);
        }
    }

    pub fn value(&self, label: Label) -> T {
        self.values.get(&label).cloned().unwrap_or_else(T::zero)
    }

    pub fn is_defined(&self, label: Label) -> bool {
        self.values.contains_key(&label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Label, &T)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The dense values of `Structural(0..n)`.
    pub fn structural_vector(&self, n: usize) -> Vec<T> {
        (0..n).map(|j| self.value(Label::Structural(j))).collect()
    }

    pub fn slack_vector(&self, m: usize) -> Vec<T> {
        (0..m).map(|i| self.value(Label::Slack(i))).collect()
    }
}

impl<T> PartialEq for BasicFeasibleSolution<T> {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len() && self.values.keys().eq(other.values.keys())
    }
}

impl<T> Eq for BasicFeasibleSolution<T> {}

impl<T> Hash for BasicFeasibleSolution<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.len().hash(state);
        for label in self.values.keys() {
            label.hash(state);
        }
    }
}

impl<T: Display> Display for BasicFeasibleSolution<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (label, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", label, value)?;
        }
        write!(f, "}}")
    }
}
