use std::collections::HashSet;

use log::{debug, warn};
use strum_macros::{Display, EnumIter};

use crate::math::matrix::Matrix;

use super::{
    basis::Label,
    bfs::BasicFeasibleSolution,
    config::{PivotConfig, Status},
    lp_tableau::{LpTableau, dual_parent_pivot, is_dual_reverse_pivot, is_reverse_pivot, parent_pivot},
    tableau::{PivotNumber, TableauError, TableauOps},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum EnumerationStatus {
    NotStarted,
    Complete,
    Aborted,
    /// The root of the search is not a vertex: `b` has a positive entry, or (dual search) a cost is
    /// negative.
    InfeasibleStart,
}

/// The two trees reverse search can walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Primal,
    Dual,
}

/**
 * Enumerates the vertices of `{y : A y + b <= 0, y >= 0}` by reverse search from the origin, which
 * is a vertex as `b <= 0`.
 *
 * The search tree is the one induced by the simplex method minimising `sum y` with Bland's entering
 * rule and the lexicographic ratio test: every lexicographically feasible basis has a unique parent,
 * and the slack basis is the unique root. The walk keeps only the current tableau and a cursor; it
 * descends through [`is_reverse_pivot`] and climbs back through [`parent_pivot`].
 *
 * Vertices are collected as [`BasicFeasibleSolution`]s, deduplicated by their label set since a
 * degenerate vertex is reached from several bases.
 */
#[derive(Clone, Debug)]
pub struct VertexEnum<T: PivotNumber> {
    root: LpTableau<T>,
    cost: Option<Vec<T>>,
    num_structural: usize,
    status: Status,
    enumeration: EnumerationStatus,
    dual_enumeration: EnumerationStatus,
    vertices: Vec<BasicFeasibleSolution<T>>,
    dual_vertices: Vec<BasicFeasibleSolution<T>>,
    pivots: usize,
}

impl<T: PivotNumber> VertexEnum<T> {
    pub fn new(a: &Matrix<T>, b: &[T], config: PivotConfig, status: Status) -> Result<Self, TableauError> {
        let rhs: Vec<T> = b.iter().map(|x| -x.clone()).collect();
        let root = LpTableau::new(a, &rhs, config)?;
        let start_is_vertex = root.tableau().is_feasible();
        Ok(Self {
            num_structural: a.cols(),
            root,
            cost: None,
            status,
            enumeration: if start_is_vertex {
                EnumerationStatus::NotStarted
            } else {
                EnumerationStatus::InfeasibleStart
            },
            dual_enumeration: EnumerationStatus::NotStarted,
            vertices: vec![],
            dual_vertices: vec![],
            pivots: 0,
        })
    }

    /**
     * As [`VertexEnum::new`], with an objective `c` for the dual search. The slack basis is dual
     * feasible only if `c >= 0`.
     */
    pub fn with_costs(
        a: &Matrix<T>,
        b: &[T],
        c: &[T],
        config: PivotConfig,
        status: Status,
    ) -> Result<Self, TableauError> {
        let mut result = Self::new(a, b, config, status)?;
        let mut costed = result.root.clone();
        costed.set_cost(c.to_vec())?;
        if !result.root.tableau().is_feasible() || !costed.is_dual_feasible()? {
            result.dual_enumeration = EnumerationStatus::InfeasibleStart;
        }
        result.cost = Some(c.to_vec());
        Ok(result)
    }

    /// Runs the primal search, replacing any earlier vertex list.
    pub fn search(&mut self) -> Result<EnumerationStatus, TableauError> {
        if self.enumeration == EnumerationStatus::InfeasibleStart {
            warn!("vertex enumeration needs b <= 0; nothing enumerated");
            return Ok(self.enumeration);
        }
        let mut tab = self.root.clone();
        tab.set_cost(vec![T::one(); self.num_structural])?;
        let (vertices, status) = self.walk(tab, Direction::Primal)?;
        self.vertices = vertices;
        self.enumeration = status;
        Ok(status)
    }

    /// Runs the search over lexicographically dual feasible bases, collecting the dual solutions. Degenerate
    /// `b` and `c` are fine: [`dual_parent_pivot`] perturbs both.
    pub fn dual_search(&mut self) -> Result<EnumerationStatus, TableauError> {
        let Some(cost) = self.cost.clone() else {
            return Err(TableauError::BadDim {
                what: "dual search cost vector",
                expected: self.num_structural,
                found: 0,
            });
        };
        if self.dual_enumeration == EnumerationStatus::InfeasibleStart {
            warn!("dual vertex enumeration needs b <= 0 and c >= 0; nothing enumerated");
            return Ok(self.dual_enumeration);
        }
        let mut tab = self.root.clone();
        tab.set_cost(cost)?;
        let (vertices, status) = self.walk(tab, Direction::Dual)?;
        self.dual_vertices = vertices;
        self.dual_enumeration = status;
        Ok(status)
    }

    fn walk(
        &mut self,
        mut tab: LpTableau<T>,
        direction: Direction,
    ) -> Result<(Vec<BasicFeasibleSolution<T>>, EnumerationStatus), TableauError> {
        let num_rows = tab.num_rows();
        let num_labels = tab.basis().num_labels();
        let mut found = Collector::new();
        found.record(Self::solution(&tab, direction)?);

        let (mut row, mut ordinal) = (0, 0);
        let status = loop {
            if self.status.is_cancelled() {
                debug!("vertex enumeration cancelled after {} pivots", tab.num_pivots());
                break EnumerationStatus::Aborted;
            }
            if tab.config().pivot_limit_reached(tab.num_pivots()) {
                warn!("vertex enumeration stopped at the pivot limit of {}", tab.num_pivots());
                break EnumerationStatus::Aborted;
            }

            // next child after the cursor
            let mut child = None;
            while child.is_none() && row < num_rows {
                while ordinal < num_labels {
                    let Some(label) = tab.basis().from_ordinal(ordinal) else {
                        break;
                    };
                    ordinal += 1;
                    if Self::is_child(&tab, row, label, direction)? {
                        child = Some((row, label));
                        break;
                    }
                }
                if child.is_none() {
                    row += 1;
                    ordinal = 0;
                }
            }
            if let Some((child_row, label)) = child {
                tab.pivot(child_row, label)?;
                found.record(Self::solution(&tab, direction)?);
                (row, ordinal) = (0, 0);
                continue;
            }

            // all children done: back to the parent, resuming after the pivot that led here
            let Some((parent_row, parent_label)) = Self::parent(&tab, direction)? else {
                break EnumerationStatus::Complete;
            };
            let previous = tab.basis().label(parent_row);
            tab.pivot(parent_row, parent_label)?;
            row = parent_row;
            ordinal = tab.basis().ordinal(previous) + 1;
        };

        self.pivots += tab.num_pivots();
        debug!(
            "{:?} vertex enumeration {}: {} vertices, {} pivots",
            direction,
            status,
            found.vertices.len(),
            tab.num_pivots()
        );
        Ok((found.vertices, status))
    }

    fn is_child(tab: &LpTableau<T>, row: usize, label: Label, direction: Direction) -> Result<bool, TableauError> {
        match direction {
            Direction::Primal => is_reverse_pivot(tab, row, label),
            Direction::Dual => is_dual_reverse_pivot(tab, row, label),
        }
    }

    fn parent(tab: &LpTableau<T>, direction: Direction) -> Result<Option<(usize, Label)>, TableauError> {
        match direction {
            Direction::Primal => parent_pivot(tab),
            Direction::Dual => dual_parent_pivot(tab),
        }
    }

    fn solution(tab: &LpTableau<T>, direction: Direction) -> Result<BasicFeasibleSolution<T>, TableauError> {
        match direction {
            Direction::Primal => Ok(tab.get_bfs()),
            Direction::Dual => tab.get_dual_bfs(),
        }
    }

    pub fn status(&self) -> EnumerationStatus {
        self.enumeration
    }

    pub fn dual_status(&self) -> EnumerationStatus {
        self.dual_enumeration
    }

    pub fn vertex_list(&self) -> &[BasicFeasibleSolution<T>] {
        &self.vertices
    }

    pub fn dual_vertex_list(&self) -> &[BasicFeasibleSolution<T>] {
        &self.dual_vertices
    }

    /// The vertices as dense vectors `y`.
    pub fn vertices(&self) -> Vec<Vec<T>> {
        self.vertices
            .iter()
            .map(|bfs| bfs.structural_vector(self.num_structural))
            .collect()
    }

    /// Pivots over all searches run so far.
    pub fn num_pivots(&self) -> usize {
        self.pivots
    }
}

struct Collector<T> {
    seen: HashSet<BasicFeasibleSolution<T>>,
    vertices: Vec<BasicFeasibleSolution<T>>,
}

impl<T: PivotNumber> Collector<T> {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            vertices: vec![],
        }
    }

    fn record(&mut self, bfs: BasicFeasibleSolution<T>) {
        if self.seen.insert(bfs.clone()) {
            self.vertices.push(bfs);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{Rng, SeedableRng, rngs::StdRng};
    use strum::IntoEnumIterator;

    use crate::{
        math::{matrix::Matrix, rational::Rational},
        optimisation_algorithms::{
            basis::Label,
            config::{PivotConfig, Status},
            vertex_enum::{EnumerationStatus, VertexEnum},
        },
    };

    fn r(n: i64) -> Rational {
        Rational::from(n)
    }

    fn cube(d: usize) -> (Matrix<Rational>, Vec<Rational>) {
        let a = Matrix::identity(d);
        (a, vec![r(-1); d])
    }

    #[test]
    #[ntest::timeout(20000)]
    fn hypercube_has_all_corners() {
        for d in 1..=4 {
            let (a, b) = cube(d);
            let mut enumeration = VertexEnum::new(&a, &b, PivotConfig::default(), Status::new()).unwrap();
            assert_eq!(enumeration.search().unwrap(), EnumerationStatus::Complete);
            let vertices = enumeration.vertices();
            assert_eq!(vertices.len(), 1 << d);
            let distinct: HashSet<String> = vertices.iter().map(|v| format!("{:?}", v)).collect();
            assert_eq!(distinct.len(), 1 << d);
            assert!(vertices.iter().flatten().all(|x| *x == r(0) || *x == r(1)));
        }
    }

    #[test]
    #[ntest::timeout(20000)]
    fn float_hypercube() {
        let a = Matrix::<f64>::identity(3);
        let mut enumeration = VertexEnum::new(&a, &[-1.0; 3], PivotConfig::default(), Status::new()).unwrap();
        enumeration.search().unwrap();
        assert_eq!(enumeration.vertex_list().len(), 8);
    }

    #[test]
    fn degenerate_apex_is_reported_once() {
        // a square pyramid: four facets meet at the apex
        let a = Matrix::from_rows(vec![
            vec![r(2), r(0), r(1)],
            vec![r(0), r(2), r(1)],
            vec![r(1), r(0), r(0)],
            vec![r(0), r(1), r(0)],
        ])
        .unwrap();
        let b = vec![r(-2), r(-2), r(-1), r(-1)];
        let mut enumeration = VertexEnum::new(&a, &b, PivotConfig::default(), Status::new()).unwrap();
        enumeration.search().unwrap();
        let vertices = enumeration.vertices();
        assert!(vertices.contains(&vec![r(0), r(0), r(2)]));
        let distinct: HashSet<String> = vertices.iter().map(|v| format!("{:?}", v)).collect();
        assert_eq!(distinct.len(), vertices.len());
    }

    #[test]
    fn positive_rhs_is_rejected() {
        let (a, _) = cube(2);
        let mut enumeration =
            VertexEnum::new(&a, &[r(-1), r(1)], PivotConfig::default(), Status::new()).unwrap();
        assert_eq!(enumeration.search().unwrap(), EnumerationStatus::InfeasibleStart);
        assert!(enumeration.vertex_list().is_empty());
    }

    #[test]
    fn cancelled_search_is_aborted() {
        let (a, b) = cube(3);
        let status = Status::new();
        status.cancel();
        let mut enumeration = VertexEnum::new(&a, &b, PivotConfig::default(), status).unwrap();
        assert_eq!(enumeration.search().unwrap(), EnumerationStatus::Aborted);
        assert_eq!(enumeration.vertex_list().len(), 1);
    }

    #[test]
    fn dual_vertices() {
        // 0 <= y <= 2 written as -y <= 1, y <= 2
        let a = Matrix::from_rows(vec![vec![r(-1)], vec![r(1)]]).unwrap();
        let b = vec![r(-1), r(-2)];
        let mut enumeration =
            VertexEnum::with_costs(&a, &b, &[r(1)], PivotConfig::default(), Status::new()).unwrap();
        assert_eq!(enumeration.dual_search().unwrap(), EnumerationStatus::Complete);
        let dual = enumeration.dual_vertex_list();
        assert_eq!(dual.len(), 2);
        assert_eq!(dual[0].value(Label::Structural(0)), r(1));
        assert_eq!(dual[1].value(Label::Slack(0)), r(1));

        assert_eq!(enumeration.search().unwrap(), EnumerationStatus::Complete);
        assert_eq!(enumeration.vertices(), vec![vec![r(0)], vec![r(2)]]);
    }

    /// The dual vertices as the multipliers `u` of the rows.
    fn multipliers(enumeration: &VertexEnum<Rational>, m: usize) -> HashSet<Vec<Rational>> {
        enumeration
            .dual_vertex_list()
            .iter()
            .map(|bfs| (0..m).map(|i| bfs.value(Label::Slack(i))).collect())
            .collect()
    }

    /// The vertices of `{u >= 0 : -A^T u <= c}` for two rows, from every pair of tight constraints.
    fn two_row_dual_vertices(a: &Matrix<Rational>, c: &[Rational]) -> HashSet<Vec<Rational>> {
        let mut constraints = vec![(vec![r(-1), r(0)], r(0)), (vec![r(0), r(-1)], r(0))];
        for (j, c) in c.iter().enumerate() {
            constraints.push((vec![-a[(0, j)].clone(), -a[(1, j)].clone()], c.clone()));
        }
        let mut vertices = HashSet::new();
        for (i, (g, h)) in constraints.iter().enumerate() {
            for (k, l) in constraints.iter().skip(i + 1) {
                let det = g[0].clone() * &k[1] - &(g[1].clone() * &k[0]);
                if det == r(0) {
                    continue;
                }
                let u = vec![
                    (h.clone() * &k[1] - &(g[1].clone() * l)) / &det,
                    (g[0].clone() * l - &(h.clone() * &k[0])) / &det,
                ];
                let feasible = constraints
                    .iter()
                    .all(|(f, b)| f[0].clone() * &u[0] + &(f[1].clone() * &u[1]) <= *b);
                if feasible {
                    vertices.insert(u);
                }
            }
        }
        vertices
    }

    #[test]
    fn dual_search_with_degenerate_rhs() {
        // -y <= 0: both y = 0 bases are optimal
        let a = Matrix::from_rows(vec![vec![r(-1)]]).unwrap();
        let mut enumeration =
            VertexEnum::with_costs(&a, &[r(0)], &[r(1)], PivotConfig::default(), Status::new()).unwrap();
        assert_eq!(enumeration.dual_search().unwrap(), EnumerationStatus::Complete);
        assert_eq!(multipliers(&enumeration, 1), HashSet::from([vec![r(0)], vec![r(1)]]));
    }

    #[test]
    fn dual_search_with_zero_cost() {
        // the zero cost of y0 makes the basis {y0} a second optimum
        let a = Matrix::from_rows(vec![vec![r(2), r(0), r(-1)]]).unwrap();
        let c = [r(0), r(3), r(2)];
        let mut enumeration =
            VertexEnum::with_costs(&a, &[r(-1)], &c, PivotConfig::default(), Status::new()).unwrap();
        assert_eq!(enumeration.dual_search().unwrap(), EnumerationStatus::Complete);
        assert_eq!(multipliers(&enumeration, 1), HashSet::from([vec![r(0)], vec![r(2)]]));
        assert_eq!(enumeration.dual_vertex_list().len(), 2);

        let a = a.map(|x| x.to_f64());
        let mut enumeration =
            VertexEnum::with_costs(&a, &[-1.0], &[0.0, 3.0, 2.0], PivotConfig::default(), Status::new()).unwrap();
        enumeration.dual_search().unwrap();
        let mut u: Vec<f64> = enumeration
            .dual_vertex_list()
            .iter()
            .map(|bfs| bfs.value(Label::Slack(0)))
            .collect();
        u.sort_by(|x, y| x.total_cmp(y));
        assert_eq!(u, vec![0.0, 2.0]);
    }

    #[test]
    #[ntest::timeout(60000)]
    fn dual_search_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..150 {
            let a = Matrix::from_rows(
                (0..2)
                    .map(|_| (0..3).map(|_| r(rng.gen_range(-3..=3))).collect())
                    .collect(),
            )
            .unwrap();
            let b: Vec<Rational> = (0..2).map(|_| r(-rng.gen_range(0..=2))).collect();
            let c: Vec<Rational> = (0..3).map(|_| r(rng.gen_range(0..=2))).collect();

            let mut enumeration =
                VertexEnum::with_costs(&a, &b, &c, PivotConfig::default(), Status::new()).unwrap();
            assert_eq!(enumeration.dual_search().unwrap(), EnumerationStatus::Complete);
            let found = multipliers(&enumeration, 2);
            assert_eq!(found.len(), enumeration.dual_vertex_list().len());
            assert_eq!(found, two_row_dual_vertices(&a, &c), "A = {}, b = {:?}, c = {:?}", a, b, c);
        }
    }

    #[test]
    fn negative_cost_has_no_dual_root() {
        let a = Matrix::from_rows(vec![vec![r(1)]]).unwrap();
        let mut enumeration =
            VertexEnum::with_costs(&a, &[r(-1)], &[r(-1)], PivotConfig::default(), Status::new()).unwrap();
        assert_eq!(enumeration.dual_search().unwrap(), EnumerationStatus::InfeasibleStart);
    }

    #[test]
    fn status_names() {
        let names: Vec<String> = EnumerationStatus::iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["notstarted", "complete", "aborted", "infeasiblestart"]);
    }
}
