//! Performance ratios and profile curves.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use ndarray::{Array2, ArrayView1};
use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::options::{Compare, ParserOptions, ProfilerOptions};
use crate::parse::{parse_table, Objective, SolverTable};
use crate::{PerfError, Result};

/// Per-solver counts reported after loading.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverSummary {
    pub name: String,
    pub solved: usize,
    pub total: usize,
}

/// Loaded, validated benchmark data and the performance profile built from it.
///
/// Matrices are indexed `[problem, solver]`; a failure is `f64::INFINITY`.
#[derive(Clone, Debug)]
pub struct ProfileData {
    solvers: Vec<String>,
    problems: Vec<String>,
    times: Array2<f64>,
    ratios: Array2<f64>,
    breakpoints: Vec<f64>,
    curves: Vec<Vec<f64>>,
}

impl ProfileData {
    /// Parse every table named by `parser` and build the profile.
    pub fn load(parser: &ParserOptions, profiler: &ProfilerOptions) -> Result<Self> {
        parser.validate()?;
        let tables = parser
            .sources
            .iter()
            .map(|source| parse_table(source, parser))
            .collect::<Result<Vec<_>>>()?;
        let data = Self::from_tables(&tables, parser, profiler.tau)?;
        info!(
            "Loaded {} solvers on {} problems ({} breakpoints)",
            data.solvers.len(),
            data.problems.len(),
            data.breakpoints.len()
        );
        Ok(data)
    }

    /// Build the profile from already parsed tables.
    pub fn from_tables(
        tables: &[SolverTable],
        parser: &ParserOptions,
        tau: Option<f64>,
    ) -> Result<Self> {
        let mut names = HashSet::new();
        for table in tables {
            if !names.insert(table.algname.as_str()) {
                return Err(PerfError::DuplicateSolver(table.algname.clone()));
            }
        }

        let mut universe: BTreeSet<&str> = tables
            .iter()
            .flat_map(|t| t.rows.iter().map(|r| r.problem.as_str()))
            .collect();
        if let Some(subset) = parser.subset.as_ref() {
            let wanted: HashSet<&str> = subset.iter().map(String::as_str).collect();
            universe.retain(|p| wanted.contains(p));
            if universe.is_empty() {
                return Err(PerfError::EmptyIntersection);
            }
            debug!("Subset keeps {} problems", universe.len());
        }
        if universe.is_empty() {
            return Err(PerfError::EmptyIntersection);
        }

        let problems: Vec<String> = universe.iter().map(|p| p.to_string()).collect();
        let index: BTreeMap<&str, usize> = universe
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, i))
            .collect();
        let shape = (problems.len(), tables.len());

        let mut times = Array2::from_elem(shape, f64::INFINITY);
        let mut objectives: Array2<Option<Objective>> = Array2::from_elem(shape, None);
        for (s, table) in tables.iter().enumerate() {
            for row in &table.rows {
                let Some(&p) = index.get(row.problem.as_str()) else {
                    continue;
                };
                if !row.solved {
                    continue;
                }
                let time = row.time.max(parser.mintime);
                if time > parser.maxtime {
                    continue;
                }
                times[[p, s]] = time;
                objectives[[p, s]] = row.objective;
            }
        }

        if parser.compare == Compare::OptimalValues {
            reject_suboptimal(&mut times, &objectives, parser);
        }

        let ratios = performance_ratios(&times);
        let breakpoints = breakpoints(&ratios, tau);
        let curves = (0..tables.len())
            .map(|s| cumulative_fraction(ratios.column(s), &breakpoints))
            .collect();

        Ok(Self {
            solvers: tables.iter().map(|t| t.algname.clone()).collect(),
            problems,
            times,
            ratios,
            breakpoints,
            curves,
        })
    }

    pub fn solvers(&self) -> &[String] {
        &self.solvers
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    /// Time counted for `problem` by `solver`, `None` for a failure.
    pub fn time(&self, problem: usize, solver: usize) -> Option<f64> {
        Some(self.times[[problem, solver]]).filter(|t| t.is_finite())
    }

    /// Performance ratio, `f64::INFINITY` for a failure.
    pub fn ratio(&self, problem: usize, solver: usize) -> f64 {
        self.ratios[[problem, solver]]
    }

    /// Sorted tau values at which some curve changes; always starts at 1.
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// Fraction of problems solved within each breakpoint.
    pub fn curve(&self, solver: usize) -> &[f64] {
        &self.curves[solver]
    }

    pub fn max_tau(&self) -> f64 {
        self.breakpoints.last().copied().unwrap_or(1.0)
    }

    pub fn any_success(&self) -> bool {
        self.times.iter().any(|t| t.is_finite())
    }

    /// Drawing needs every solver to have solved at least one problem.
    pub fn ensure_plottable(&self) -> Result<()> {
        match self.summary().into_iter().find(|s| s.solved == 0) {
            Some(failed) => Err(PerfError::NoSuccess {
                solver: failed.name,
            }),
            None => Ok(()),
        }
    }

    pub fn summary(&self) -> Vec<SolverSummary> {
        self.solvers
            .iter()
            .enumerate()
            .map(|(s, name)| SolverSummary {
                name: name.clone(),
                solved: self.times.column(s).iter().filter(|t| t.is_finite()).count(),
                total: self.problems.len(),
            })
            .collect()
    }
}

/// Drop successes that are infeasible or whose objective is worse than the
/// best feasible one.
fn reject_suboptimal(
    times: &mut Array2<f64>,
    objectives: &Array2<Option<Objective>>,
    parser: &ParserOptions,
) {
    let tol = parser.infeasibility_tolerance;
    let feasible = |obj: &Objective| {
        obj.dual.abs() <= tol && obj.primal.map_or(true, |primal| primal.abs() <= tol)
    };

    for (p, row) in objectives.outer_iter().enumerate() {
        let best = row
            .iter()
            .zip(times.row(p).iter())
            .filter(|(_, t)| t.is_finite())
            .filter_map(|(obj, _)| obj.as_ref())
            .filter(|obj| feasible(obj))
            .map(|obj| OrderedFloat(obj.fval))
            .min()
            .map(|best| best.0);

        for (s, obj) in row.iter().enumerate() {
            let keep = match (obj, best) {
                (Some(obj), Some(best)) => {
                    feasible(obj) && obj.fval - best <= parser.fval_tolerance * best.abs().max(1.0)
                }
                _ => false,
            };
            if !keep {
                times[[p, s]] = f64::INFINITY;
            }
        }
    }
}

fn performance_ratios(times: &Array2<f64>) -> Array2<f64> {
    let mut ratios = Array2::from_elem(times.dim(), f64::INFINITY);
    for (p, row) in times.outer_iter().enumerate() {
        let best = row.iter().copied().fold(f64::INFINITY, f64::min);
        if !best.is_finite() {
            continue;
        }
        for (s, &t) in row.iter().enumerate() {
            if t.is_finite() {
                ratios[[p, s]] = t / best;
            }
        }
    }
    ratios
}

fn breakpoints(ratios: &Array2<f64>, tau: Option<f64>) -> Vec<f64> {
    let mut unique: BTreeSet<OrderedFloat<f64>> = ratios
        .iter()
        .copied()
        .filter(|r| r.is_finite())
        .map(OrderedFloat)
        .collect();
    unique.insert(OrderedFloat(1.0));
    if let Some(tau) = tau {
        unique.retain(|r| r.0 <= tau);
        unique.insert(OrderedFloat(tau));
    }
    unique.into_iter().map(|r| r.0).collect()
}

fn cumulative_fraction(column: ArrayView1<f64>, breakpoints: &[f64]) -> Vec<f64> {
    let total = column.len().max(1) as f64;
    let mut sorted: Vec<f64> = column.iter().copied().filter(|r| r.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut out = Vec::with_capacity(breakpoints.len());
    let mut solved = 0usize;
    for &bp in breakpoints {
        while solved < sorted.len() && sorted[solved] <= bp {
            solved += 1;
        }
        out.push(solved as f64 / total);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Backend, TableSource};
    use crate::parse::parse_str;

    fn tables(texts: &[(&str, &str)], opts: &ParserOptions) -> Vec<SolverTable> {
        texts
            .iter()
            .map(|(name, text)| parse_str(name, text, opts).unwrap())
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn ratios_and_curves() {
        let opts = ParserOptions::default();
        let t = tables(
            &[
                ("A", "P1 c 1\nP2 c 4\nP3 d 1\n"),
                ("B", "P1 c 2\nP2 c 2\nP3 c 5\n"),
            ],
            &opts,
        );
        let data = ProfileData::from_tables(&t, &opts, None).unwrap();
        assert_eq!(data.problems(), ["P1", "P2", "P3"]);
        assert!(approx(data.ratio(0, 0), 1.0));
        assert!(approx(data.ratio(0, 1), 2.0));
        assert!(approx(data.ratio(1, 0), 2.0));
        assert!(data.ratio(2, 0).is_infinite());
        assert!(approx(data.ratio(2, 1), 1.0));

        assert_eq!(data.breakpoints(), [1.0, 2.0]);
        let a = data.curve(0);
        let b = data.curve(1);
        assert!(approx(a[0], 1.0 / 3.0) && approx(a[1], 2.0 / 3.0));
        assert!(approx(b[0], 2.0 / 3.0) && approx(b[1], 1.0));
        assert!(approx(data.max_tau(), 2.0));
    }

    #[test]
    fn missing_problems_count_as_failures() {
        let opts = ParserOptions::default();
        let t = tables(&[("A", "P1 c 1\nP2 c 1\n"), ("B", "P1 c 1\n")], &opts);
        let data = ProfileData::from_tables(&t, &opts, None).unwrap();
        assert_eq!(data.time(1, 1), None);
        let summary = data.summary();
        assert_eq!(summary[1].solved, 1);
        assert_eq!(summary[1].total, 2);
    }

    #[test]
    fn tau_truncates_breakpoints() {
        let opts = ParserOptions::default();
        let t = tables(
            &[("A", "P1 c 1\nP2 c 10\n"), ("B", "P1 c 3\nP2 c 1\n")],
            &opts,
        );
        let data = ProfileData::from_tables(&t, &opts, Some(5.0)).unwrap();
        assert_eq!(data.breakpoints(), [1.0, 3.0, 5.0]);
        assert!(approx(data.curve(0)[2], 0.5));
        assert!(approx(data.curve(1)[2], 1.0));
    }

    #[test]
    fn time_limits() {
        let opts = ParserOptions {
            mintime: 1.0,
            maxtime: 50.0,
            ..ParserOptions::default()
        };
        let t = tables(
            &[("A", "P1 c 0.01\nP2 c 100\n"), ("B", "P1 c 0.5\nP2 c 20\n")],
            &opts,
        );
        let data = ProfileData::from_tables(&t, &opts, None).unwrap();
        assert!(approx(data.ratio(0, 0), 1.0));
        assert!(approx(data.ratio(0, 1), 1.0));
        assert_eq!(data.time(1, 0), None);
        assert!(approx(data.ratio(1, 1), 1.0));
    }

    #[test]
    fn subset_restricts_problems() {
        let mut opts = ParserOptions::default();
        let t = tables(&[("A", "P1 c 1\nP2 c 2\n"), ("B", "P1 c 2\nP2 c 1\n")], &opts);
        opts.subset = Some(vec!["P2".into(), "P9".into()]);
        let data = ProfileData::from_tables(&t, &opts, None).unwrap();
        assert_eq!(data.problems(), ["P2"]);

        opts.subset = Some(vec!["Fantasy".into()]);
        assert!(matches!(
            ProfileData::from_tables(&t, &opts, None),
            Err(PerfError::EmptyIntersection)
        ));
    }

    #[test]
    fn all_failed_loads_but_is_not_plottable() {
        let opts = ParserOptions::default();
        let t = tables(&[("A", "P1 d 1\n"), ("B", "P1 d 2\n")], &opts);
        let data = ProfileData::from_tables(&t, &opts, None).unwrap();
        assert!(!data.any_success());
        assert_eq!(data.breakpoints(), [1.0]);
        assert_eq!(data.curve(0), [0.0]);
        assert!(matches!(
            data.ensure_plottable(),
            Err(PerfError::NoSuccess { .. })
        ));
    }

    #[test]
    fn one_hopeless_solver_blocks_plotting() {
        let opts = ParserOptions::default();
        let t = tables(&[("A", "P1 c 1\n"), ("B", "P1 d 2\n")], &opts);
        let data = ProfileData::from_tables(&t, &opts, None).unwrap();
        assert!(data.any_success());
        match data.ensure_plottable() {
            Err(PerfError::NoSuccess { solver }) => assert_eq!(solver, "B"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_solver_names() {
        let opts = ParserOptions::default();
        let t = tables(&[("A", "P1 c 1\n"), ("A", "P1 c 2\n")], &opts);
        assert!(matches!(
            ProfileData::from_tables(&t, &opts, None),
            Err(PerfError::DuplicateSolver(_))
        ));
    }

    #[test]
    fn optimal_values_reject_worse_objectives() {
        let opts = ParserOptions {
            compare: Compare::OptimalValues,
            ..ParserOptions::default()
        };
        let t = tables(
            &[
                // fast but stuck at a worse objective on P1
                ("A", "P1 c 1 5.0 0 0\nP2 c 1 1.0 0 0\n"),
                // infeasible on P2
                ("B", "P1 c 3 1.0 0 0\nP2 c 2 0.5 1e-2 0\n"),
            ],
            &opts,
        );
        let data = ProfileData::from_tables(&t, &opts, None).unwrap();
        assert_eq!(data.time(0, 0), None);
        assert_eq!(data.time(0, 1), Some(3.0));
        assert_eq!(data.time(1, 0), Some(1.0));
        assert_eq!(data.time(1, 1), None);
    }

    #[test]
    fn optimal_values_tolerate_small_gaps() {
        let opts = ParserOptions {
            compare: Compare::OptimalValues,
            unconstrained: true,
            ..ParserOptions::default()
        };
        let t = tables(
            &[
                ("A", "P1 c 1 100.005 - 0\n"),
                ("B", "P1 c 2 100.0 - 0\n"),
            ],
            &opts,
        );
        let data = ProfileData::from_tables(&t, &opts, None).unwrap();
        assert_eq!(data.time(0, 0), Some(1.0));
        assert!(approx(data.ratio(0, 1), 2.0));
    }

    #[test]
    fn load_reads_embedded_sources() {
        let parser = ParserOptions {
            sources: vec![
                TableSource::Embedded {
                    name: "one",
                    contents: "P1 c 1\nP2 c 2\n",
                },
                TableSource::Embedded {
                    name: "two",
                    contents: "P1 c 2\nP2 d 2\n",
                },
            ],
            ..ParserOptions::default()
        };
        let profiler = ProfilerOptions::for_backend(Backend::Raw);
        let data = ProfileData::load(&parser, &profiler).unwrap();
        assert_eq!(data.solvers(), ["one", "two"]);
        assert!(data.any_success());
    }
}
