use std::fmt::Display;

use anyhow::{Result, anyhow};

/**
 * A variable of a linear system. Structural variables are the columns of `A`, every row has one slack
 * variable, and artificial variables are extra columns supplied at construction.
 *
 * Labels are totally ordered: all structural variables, then all slacks, then all artificials.
 * Pivoting rules that break ties "by smallest label" use this order.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Structural(usize),
    Slack(usize),
    Artificial(usize),
}

impl Label {
    pub fn index(&self) -> usize {
        match self {
            Label::Structural(i) | Label::Slack(i) | Label::Artificial(i) => *i,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Label::Structural(_))
    }

    pub fn is_slack(&self) -> bool {
        matches!(self, Label::Slack(_))
    }

    pub fn is_artificial(&self) -> bool {
        matches!(self, Label::Artificial(_))
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Structural(i) => write!(f, "x{}", i),
            Label::Slack(i) => write!(f, "s{}", i),
            Label::Artificial(i) => write!(f, "a{}", i),
        }
    }
}

/**
 * The in/out partition of the labels of a linear system with `num_rows` rows. Every row holds exactly
 * one basic label; every other label is nonbasic. No numbers are involved.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Basis {
    rows: Vec<Label>,
    structural: Vec<Option<usize>>,
    slack: Vec<Option<usize>>,
    artificial: Vec<Option<usize>>,
    blocked: Vec<Label>,
}

impl Basis {
    /// The slack basis: row `i` holds `Slack(i)`.
    pub fn slack_basis(num_rows: usize, num_structural: usize, num_artificial: usize) -> Self {
        Self {
            rows: (0..num_rows).map(Label::Slack).collect(),
            structural: vec![None; num_structural],
            slack: (0..num_rows).map(Some).collect(),
            artificial: vec![None; num_artificial],
            blocked: vec![],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_structural(&self) -> usize {
        self.structural.len()
    }

    pub fn num_artificial(&self) -> usize {
        self.artificial.len()
    }

    pub fn num_labels(&self) -> usize {
        self.structural.len() + self.slack.len() + self.artificial.len()
    }

    pub fn contains(&self, label: Label) -> bool {
        match label {
            Label::Structural(j) => j < self.structural.len(),
            Label::Slack(i) => i < self.slack.len(),
            Label::Artificial(k) => k < self.artificial.len(),
        }
    }

    fn position(&self, label: Label) -> Option<&Option<usize>> {
        match label {
            Label::Structural(j) => self.structural.get(j),
            Label::Slack(i) => self.slack.get(i),
            Label::Artificial(k) => self.artificial.get(k),
        }
    }

    fn position_mut(&mut self, label: Label) -> &mut Option<usize> {
        match label {
            Label::Structural(j) => &mut self.structural[j],
            Label::Slack(i) => &mut self.slack[i],
            Label::Artificial(k) => &mut self.artificial[k],
        }
    }

    pub fn is_member(&self, label: Label) -> bool {
        self.find(label).is_some()
    }

    /// The basic label of `row`.
    pub fn label(&self, row: usize) -> Label {
        self.rows[row]
    }

    pub fn labels(&self) -> &[Label] {
        &self.rows
    }

    /// The row of a basic label.
    pub fn find(&self, label: Label) -> Option<usize> {
        self.position(label).copied().flatten()
    }

    /// All labels in their total order.
    pub fn all_labels(&self) -> impl Iterator<Item = Label> + '_ {
        (0..self.structural.len())
            .map(Label::Structural)
            .chain((0..self.slack.len()).map(Label::Slack))
            .chain((0..self.artificial.len()).map(Label::Artificial))
    }

    /// Position of the label in [`Self::all_labels`].
    pub fn ordinal(&self, label: Label) -> usize {
        match label {
            Label::Structural(j) => j,
            Label::Slack(i) => self.structural.len() + i,
            Label::Artificial(k) => self.structural.len() + self.slack.len() + k,
        }
    }

    pub fn from_ordinal(&self, ordinal: usize) -> Option<Label> {
        let n = self.structural.len();
        let m = self.slack.len();
        if ordinal < n {
            Some(Label::Structural(ordinal))
        } else if ordinal < n + m {
            Some(Label::Slack(ordinal - n))
        } else if ordinal < n + m + self.artificial.len() {
            Some(Label::Artificial(ordinal - n - m))
        } else {
            None
        }
    }

    pub fn nonbasic(&self) -> impl Iterator<Item = Label> + '_ {
        self.all_labels().filter(|label| !self.is_member(*label))
    }

    /**
     * Replaces the basic label of `row` by `entering` and returns the label that left.
     * Panics if `entering` is already basic or not a label of this system.
     */
    pub fn pivot(&mut self, row: usize, entering: Label) -> Label {
        assert!(self.contains(entering), "{} is not a label of this basis", entering);
        assert!(!self.is_member(entering), "{} is already basic", entering);
        let leaving = self.rows[row];
        *self.position_mut(leaving) = None;
        *self.position_mut(entering) = Some(row);
        self.rows[row] = entering;

        #[cfg(debug_assertions)]
        if let Err(e) = self.check() {
            panic!("basis corrupted after pivot on row {}: {}", row, e);
        }

        leaving
    }

    /// Verifies that rows and positions describe the same bijection.
    pub fn check(&self) -> Result<()> {
        for (row, label) in self.rows.iter().enumerate() {
            match self.position(*label) {
                Some(Some(position)) if *position == row => {}
                _ => return Err(anyhow!("row {} holds {}, which does not point back to it", row, label)),
            }
        }
        let basic = self.all_labels().filter(|label| self.is_member(*label)).count();
        if basic != self.rows.len() {
            return Err(anyhow!(
                "{} labels claim to be basic in a basis of {} rows",
                basic,
                self.rows.len()
            ));
        }
        Ok(())
    }

    /// Prevents a label from entering the basis.
    pub fn block(&mut self, label: Label) {
        if !self.blocked.contains(&label) {
            self.blocked.push(label);
        }
    }

    pub fn unblock(&mut self, label: Label) {
        self.blocked.retain(|l| *l != label);
    }

    pub fn is_blocked(&self, label: Label) -> bool {
        self.blocked.contains(&label)
    }
}

impl Display for Basis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (row, label) in self.rows.iter().enumerate() {
            if row > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", label)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use crate::optimisation_algorithms::basis::{Basis, Label};

    #[test]
    fn label_order() {
        assert!(Label::Structural(5) < Label::Slack(0));
        assert!(Label::Slack(5) < Label::Artificial(0));
        assert!(Label::Slack(1) < Label::Slack(2));
    }

    #[test]
    fn pivot_keeps_bijection() {
        let mut basis = Basis::slack_basis(3, 2, 1);
        assert_eq!(basis.label(1), Label::Slack(1));
        assert_eq!(basis.find(Label::Slack(2)), Some(2));
        assert!(!basis.is_member(Label::Structural(0)));

        let leaving = basis.pivot(1, Label::Structural(0));
        assert_eq!(leaving, Label::Slack(1));
        assert_eq!(basis.find(Label::Structural(0)), Some(1));
        assert_eq!(basis.find(Label::Slack(1)), None);

        let leaving = basis.pivot(1, Label::Artificial(0));
        assert_eq!(leaving, Label::Structural(0));
        basis.check().unwrap();
        assert_eq!(basis.nonbasic().collect::<Vec<_>>(), vec![
            Label::Structural(0),
            Label::Structural(1),
            Label::Slack(1)
        ]);
        assert_eq!(basis.to_string(), "[s0, a0, s2]");
    }

    #[test]
    #[should_panic(expected = "already basic")]
    fn pivot_in_basic_label() {
        let mut basis = Basis::slack_basis(2, 2, 0);
        basis.pivot(0, Label::Slack(1));
    }

    #[test]
    fn ordinals() {
        let basis = Basis::slack_basis(2, 3, 1);
        for (i, label) in basis.all_labels().enumerate() {
            assert_eq!(basis.ordinal(label), i);
            assert_eq!(basis.from_ordinal(i), Some(label));
        }
        assert_eq!(basis.from_ordinal(6), None);
    }

    #[test]
    fn blocking() {
        let mut basis = Basis::slack_basis(1, 1, 0);
        basis.block(Label::Structural(0));
        assert!(basis.is_blocked(Label::Structural(0)));
        basis.unblock(Label::Structural(0));
        assert!(!basis.is_blocked(Label::Structural(0)));
    }
}
