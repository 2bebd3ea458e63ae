//! Repeated hill climbing from random starting structures.
//!
//! The controller owns the incumbent: a private copy of the best graph seen so
//! far and its score, initialized from the caller's graph so the search never
//! returns anything worse than its input. Each restart generates a random
//! graph, climbs it to a local optimum and replaces the incumbent only on a
//! strictly better score. At the end the incumbent is copied back into the
//! caller's graph.
//!
//! Randomness is derived from the configured seed alone: restart `i` draws
//! from ChaCha8 stream `i` of that seed. The sequence of candidate graphs is
//! therefore reproducible and does not depend on whether the restarts run
//! sequentially or on the rayon pool.

use bn_types::{BnResult, Dataset, Graph, SearchError};
use crossbeam_channel::Sender;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::SearchConfig;
use crate::hill_climber::{ArcRules, HillClimber};
use crate::markov::MarkovBlanketCorrection;
use crate::oracle::ScoringOracle;
use crate::random_graph::RandomGraphGenerator;
use crate::report::{RunSummary, SearchEvent, SearchReport};

/// Random number generator for restart `run_index`.
pub fn run_rng(seed: i64, run_index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
    rng.set_stream(run_index as u64);
    rng
}

/// Multi-start wrapper around [`HillClimber`].
pub struct RepeatedHillClimber<'a, O: ?Sized> {
    config: SearchConfig,
    oracle: &'a O,
    events: Option<Sender<SearchEvent>>,
}

impl<'a, O: ScoringOracle + ?Sized> RepeatedHillClimber<'a, O> {
    pub fn new(config: SearchConfig, oracle: &'a O) -> Self {
        Self {
            config,
            oracle,
            events: None,
        }
    }

    /// Emit progress events on `tx`. Sends are best-effort.
    pub fn with_events(mut self, tx: Sender<SearchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn emit(&self, event: SearchEvent) {
        if let Some(tx) = &self.events {
            // Receiver may be gone or full; progress is advisory.
            let _ = tx.try_send(event);
        }
    }

    fn rules(&self) -> ArcRules {
        ArcRules::new(self.config.max_parents, self.config.allow_arc_reversal)
    }

    /// Search for a better structure, starting from and writing back into
    /// `graph`.
    ///
    /// Cancellation is checked before every restart and is reported through
    /// [`SearchReport::state`], not as an error. On error `graph` is left
    /// unchanged.
    ///
    /// [`SearchReport::best_score`] is never below the input's score. When the
    /// Markov-blanket correction is enabled it edits the incumbent afterwards
    /// without consulting the oracle, so the returned graph scores
    /// [`SearchReport::final_score`], which may be lower than the input.
    pub fn search(
        &self,
        graph: &mut Graph,
        dataset: &Dataset,
        cancel: &CancellationToken,
    ) -> BnResult<SearchReport> {
        self.config.validate()?;
        if graph.num_nodes() != dataset.num_attributes() {
            return Err(SearchError::DimensionMismatch {
                graph_nodes: graph.num_nodes(),
                attributes: dataset.num_attributes(),
            }
            .into());
        }
        if !graph.is_acyclic() {
            return Err(bn_types::validation_error!("input graph contains a cycle"));
        }

        let climber = HillClimber::new(self.oracle, dataset, self.rules());
        let initial_score = climber.score(graph)?;
        let mut report = SearchReport::new(self.config.clone(), initial_score);

        info!(
            search_id = %report.id,
            oracle = self.oracle.name(),
            runs = self.config.run_count,
            seed = self.config.seed,
            initial_score,
            "starting repeated hill climbing"
        );
        self.emit(SearchEvent::Started {
            id: report.id,
            run_count: self.config.run_count,
            initial_score,
        });

        let mut best = graph.clone();
        let cancelled = if self.config.parallel {
            self.run_parallel(&climber, dataset, cancel, &mut best, &mut report)?
        } else {
            self.run_sequential(&climber, dataset, cancel, &mut best, &mut report)?
        };

        if cancelled {
            warn!(
                search_id = %report.id,
                runs_completed = report.runs_completed(),
                "search cancelled"
            );
            self.emit(SearchEvent::Cancelled {
                runs_completed: report.runs_completed(),
            });
        }

        report.final_score = report.best_score;
        if !cancelled && self.config.apply_markov_blanket_correction {
            let added = MarkovBlanketCorrection::new().apply(&mut best, dataset)?;
            if added > 0 {
                report.final_score = climber.score(&best)?;
            }
            report.markov_blanket_arcs = added;
            debug!(added, "applied Markov blanket correction");
        }

        graph.copy_from(&best)?;

        if cancelled {
            report.mark_cancelled();
        } else {
            report.mark_completed();
        }
        info!(
            search_id = %report.id,
            best_score = report.best_score,
            best_run = ?report.best_run,
            runs_completed = report.runs_completed(),
            "repeated hill climbing finished"
        );
        self.emit(SearchEvent::Finished {
            id: report.id,
            best_score: report.best_score,
        });

        Ok(report)
    }

    /// Generate and climb restart `run_index` in `working`.
    fn run_once(
        &self,
        run_index: usize,
        working: &mut Graph,
        climber: &HillClimber<'_, O>,
        generator: &RandomGraphGenerator,
    ) -> BnResult<RunSummary> {
        self.emit(SearchEvent::RunStarted { run_index });
        let started = Instant::now();

        let mut rng = run_rng(self.config.seed, run_index);
        let generated = generator.generate(working, &mut rng)?;
        let outcome = climber.climb(working)?;

        let summary = RunSummary {
            run_index,
            random_attempts: generated.attempts,
            initial_arcs: generated.arcs,
            final_arcs: working.arc_count(),
            edits_applied: outcome.edits_applied(),
            start_score: outcome.initial_score,
            final_score: outcome.final_score,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            run_index,
            edits = summary.edits_applied,
            score = summary.final_score,
            "restart converged"
        );
        self.emit(SearchEvent::RunFinished(summary.clone()));
        Ok(summary)
    }

    fn generator(&self, dataset: &Dataset) -> RandomGraphGenerator {
        RandomGraphGenerator::new(
            self.rules(),
            dataset.target(),
            self.config.init_as_naive_bayes,
        )
    }

    fn promote(
        &self,
        summary: RunSummary,
        candidate: &Graph,
        best: &mut Graph,
        report: &mut SearchReport,
    ) -> BnResult<()> {
        let run_index = summary.run_index;
        if report.record_run(summary) {
            best.copy_from(candidate)?;
            info!(run_index, score = report.best_score, "new incumbent");
            self.emit(SearchEvent::IncumbentImproved {
                run_index,
                score: report.best_score,
            });
        }
        Ok(())
    }

    /// Returns true if cancellation stopped the loop.
    fn run_sequential(
        &self,
        climber: &HillClimber<'_, O>,
        dataset: &Dataset,
        cancel: &CancellationToken,
        best: &mut Graph,
        report: &mut SearchReport,
    ) -> BnResult<bool> {
        let generator = self.generator(dataset);
        let mut working = Graph::new(best.num_nodes());

        for run_index in 0..self.config.run_count {
            if cancel.is_cancelled() {
                return Ok(true);
            }
            let summary = self.run_once(run_index, &mut working, climber, &generator)?;
            self.promote(summary, &working, best, report)?;
        }
        Ok(false)
    }

    /// Restarts on the rayon pool, folded in run order. A restart that saw
    /// the cancellation flag ends the fold, so the result always matches a
    /// sequential prefix of the runs.
    fn run_parallel(
        &self,
        climber: &HillClimber<'_, O>,
        dataset: &Dataset,
        cancel: &CancellationToken,
        best: &mut Graph,
        report: &mut SearchReport,
    ) -> BnResult<bool> {
        let generator = self.generator(dataset);
        let num_nodes = best.num_nodes();

        let outcomes: Vec<Option<BnResult<(RunSummary, Graph)>>> = (0..self.config.run_count)
            .into_par_iter()
            .map_init(
                || Graph::new(num_nodes),
                |working, run_index| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(
                        self.run_once(run_index, working, climber, &generator)
                            .map(|summary| (summary, working.clone())),
                    )
                },
            )
            .collect();

        for outcome in outcomes {
            match outcome {
                None => return Ok(true),
                Some(result) => {
                    let (summary, candidate) = result?;
                    self.promote(summary, &candidate, best, report)?;
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::FnOracle;
    use crate::report::SearchState;
    use bn_types::{BnError, DirectedArc, ScoreError};
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn arc_set(graph: &Graph) -> BTreeSet<DirectedArc> {
        graph.arcs().into_iter().collect()
    }

    /// Rewards exactly one arc set: score is minus the symmetric difference.
    fn target_oracle(
        target: &[DirectedArc],
    ) -> FnOracle<impl Fn(&Graph, &Dataset) -> Result<f64, ScoreError> + Send + Sync> {
        let target: BTreeSet<DirectedArc> = target.iter().copied().collect();
        FnOracle::new("target", move |graph: &Graph, _: &Dataset| {
            Ok(-(arc_set(graph).symmetric_difference(&target).count() as f64))
        })
    }

    /// Rugged landscape with many local optima.
    fn rugged_oracle() -> FnOracle<impl Fn(&Graph, &Dataset) -> Result<f64, ScoreError> + Send + Sync>
    {
        FnOracle::new("rugged", |graph: &Graph, _: &Dataset| {
            let mut score = 0.0;
            for arc in graph.arcs() {
                let w = ((arc.tail * 7 + arc.head * 13) % 11) as f64 - 5.0;
                score += w;
            }
            for node in 0..graph.num_nodes() {
                if graph.num_parents(node) == 2 {
                    score -= 3.5;
                }
            }
            Ok(score)
        })
    }

    /// Score table over 3 nodes with one parent each. `{2->1}` is a trap: every
    /// legal edit from it scores lower, yet `{0->1, 1->2}` scores higher and
    /// is reached only from starts holding one of its arcs.
    fn trap_oracle() -> FnOracle<impl Fn(&Graph, &Dataset) -> Result<f64, ScoreError> + Send + Sync>
    {
        let table: HashMap<Vec<DirectedArc>, f64> = [
            (vec![DirectedArc::new(0, 1), DirectedArc::new(1, 2)], 10.0),
            (vec![DirectedArc::new(2, 1)], 5.0),
            (vec![DirectedArc::new(0, 1)], 3.0),
            (vec![DirectedArc::new(1, 2)], 3.0),
        ]
        .into_iter()
        .collect();
        FnOracle::new("trap", move |graph: &Graph, _: &Dataset| {
            let key: Vec<DirectedArc> = arc_set(graph).into_iter().collect();
            Ok(table
                .get(&key)
                .copied()
                .unwrap_or(-(graph.arc_count() as f64)))
        })
    }

    fn five_node_target() -> Vec<DirectedArc> {
        vec![
            DirectedArc::new(0, 1),
            DirectedArc::new(0, 2),
            DirectedArc::new(1, 3),
            DirectedArc::new(2, 3),
            DirectedArc::new(3, 4),
        ]
    }

    #[test]
    fn finds_the_rewarded_structure() {
        let target = five_node_target();
        let oracle = target_oracle(&target);
        let data = Dataset::binary(5, 0).unwrap();
        let config = SearchConfig::new()
            .with_max_parents(2)
            .with_run_count(3)
            .with_seed(42);

        let mut graph = Graph::new(5);
        let report = RepeatedHillClimber::new(config, &oracle)
            .search(&mut graph, &data, &CancellationToken::new())
            .unwrap();

        assert_eq!(arc_set(&graph), target.into_iter().collect());
        assert_eq!(report.best_score, 0.0);
        assert_eq!(report.state, SearchState::Completed);
        assert_eq!(report.runs_completed(), 3);
        assert_eq!(report.best_run, Some(0));
    }

    #[test]
    fn later_restart_replaces_trapped_incumbent() {
        let oracle = trap_oracle();
        let data = Dataset::binary(3, 0).unwrap();
        let rules = ArcRules::new(1, false);
        let climber = HillClimber::new(&oracle, &data, rules);
        let generator = RandomGraphGenerator::new(rules, 0, false);
        let run_count = 4;

        // Replay each restart on its own to pick a seed whose first restart
        // lands in the trap and whose global optimum comes from a later one.
        let converged = |seed: i64| -> Vec<(f64, Graph)> {
            (0..run_count)
                .map(|run_index| {
                    let mut graph = Graph::new(3);
                    generator
                        .generate(&mut graph, &mut run_rng(seed, run_index))
                        .unwrap();
                    let outcome = climber.climb(&mut graph).unwrap();
                    (outcome.final_score, graph)
                })
                .collect()
        };
        let (seed, runs) = (0..500)
            .map(|seed| (seed, converged(seed)))
            .find(|(_, runs)| {
                runs[0].0 == 5.0 && runs[1..].iter().any(|(score, _)| *score == 10.0)
            })
            .expect("a seed that traps the first restart");
        let winner = runs
            .iter()
            .position(|(score, _)| *score == 10.0)
            .unwrap();

        for parallel in [false, true] {
            let config = SearchConfig::new()
                .with_max_parents(1)
                .with_run_count(run_count)
                .with_naive_bayes_init(false)
                .with_seed(seed)
                .with_parallel(parallel);
            let (tx, rx) = crossbeam_channel::unbounded();

            let mut graph = Graph::new(3);
            let report = RepeatedHillClimber::new(config, &oracle)
                .with_events(tx)
                .search(&mut graph, &data, &CancellationToken::new())
                .unwrap();

            assert!(report.best_run > Some(0));
            assert_eq!(report.best_run, Some(winner));
            assert_eq!(report.runs[0].final_score, 5.0);
            assert_eq!(report.best_score, 10.0);
            assert_eq!(graph, runs[winner].1);
            assert_eq!(
                arc_set(&graph),
                [DirectedArc::new(0, 1), DirectedArc::new(1, 2)].into_iter().collect()
            );

            let mut improved: Vec<usize> = rx
                .try_iter()
                .filter_map(|event| match event {
                    SearchEvent::IncumbentImproved { run_index, .. } => Some(run_index),
                    _ => None,
                })
                .collect();
            improved.sort_unstable();
            assert_eq!(improved, vec![0, winner]);
        }
    }

    #[test]
    fn never_returns_worse_than_input() {
        let target = five_node_target();
        let oracle = target_oracle(&target);
        let data = Dataset::binary(5, 0).unwrap();
        let config = SearchConfig::new().with_run_count(1).with_max_parents(2);

        // Input is already optimal: no restart can beat it strictly.
        let mut graph = Graph::from_arcs(5, &target).unwrap();
        let before = graph.clone();
        let report = RepeatedHillClimber::new(config, &oracle)
            .search(&mut graph, &data, &CancellationToken::new())
            .unwrap();

        assert_eq!(graph, before);
        assert_eq!(report.best_run, None);
        assert_eq!(report.best_score, report.initial_score);
    }

    #[test]
    fn best_score_dominates_every_run() {
        let oracle = rugged_oracle();
        let data = Dataset::binary(6, 0).unwrap();
        let config = SearchConfig::new()
            .with_run_count(8)
            .with_max_parents(3)
            .with_arc_reversal(true)
            .with_seed(7);
        let mut graph = Graph::new(6);
        let report = RepeatedHillClimber::new(config, &oracle)
            .search(&mut graph, &data, &CancellationToken::new())
            .unwrap();

        assert!(report.best_score >= report.initial_score);
        for run in &report.runs {
            assert!(run.final_score <= report.best_score);
            assert!(run.final_score >= run.start_score);
        }
        assert_eq!(oracle.score(&graph, &data).unwrap(), report.best_score);
        assert!(graph.is_acyclic());
        for node in 0..6 {
            assert!(graph.num_parents(node) <= 3);
        }
    }

    #[test]
    fn same_seed_reproduces_the_graph() {
        let oracle = rugged_oracle();
        let data = Dataset::binary(7, 3).unwrap();
        let config = SearchConfig::new().with_run_count(5).with_seed(123);

        let run = |config: SearchConfig| {
            let mut graph = Graph::new(7);
            RepeatedHillClimber::new(config, &oracle)
                .search(&mut graph, &data, &CancellationToken::new())
                .unwrap();
            serde_json::to_vec(&graph).unwrap()
        };

        let first = run(config.clone());
        let second = run(config.clone());
        let parallel = run(config.with_parallel(true));
        assert_eq!(first, second);
        assert_eq!(first, parallel);
    }

    #[test]
    fn run_streams_are_independent_of_order() {
        use rand::Rng;

        let mut third = run_rng(42, 3);
        let mut first = run_rng(42, 0);
        let x: u64 = third.gen();
        let y: u64 = first.gen();
        assert_eq!(x, run_rng(42, 3).gen::<u64>());
        assert_eq!(y, run_rng(42, 0).gen::<u64>());
        assert_ne!(x, y);

        let mut negative = run_rng(-1, 0);
        assert_eq!(negative.gen::<u64>(), run_rng(-1, 0).gen::<u64>());
        assert_ne!(run_rng(-1, 0).gen::<u64>(), y);
    }

    #[test]
    fn cancelled_before_start_keeps_input() {
        let oracle = rugged_oracle();
        let data = Dataset::binary(5, 0).unwrap();
        let mut graph = Graph::from_arcs(5, &[DirectedArc::new(4, 1)]).unwrap();
        let before = serde_json::to_vec(&graph).unwrap();

        for parallel in [false, true] {
            let config = SearchConfig::new().with_parallel(parallel);
            let report = RepeatedHillClimber::new(config, &oracle)
                .search(&mut graph, &data, &CancellationToken::cancelled())
                .unwrap();

            assert_eq!(report.state, SearchState::Cancelled);
            assert_eq!(report.runs_completed(), 0);
            assert_eq!(serde_json::to_vec(&graph).unwrap(), before);
        }
    }

    #[test]
    fn cancellation_between_runs_keeps_best_so_far() {
        let target = five_node_target();
        let token = CancellationToken::new();
        let calls = AtomicUsize::new(0);
        let trigger = token.clone();
        let target_set: BTreeSet<DirectedArc> = target.iter().copied().collect();
        let oracle = FnOracle::new("cancelling", move |graph: &Graph, _: &Dataset| {
            // Cancel once the first restart is underway.
            if calls.fetch_add(1, Ordering::Relaxed) == 1 {
                trigger.cancel();
            }
            Ok(-(arc_set(graph).symmetric_difference(&target_set).count() as f64))
        });
        let data = Dataset::binary(5, 0).unwrap();
        let config = SearchConfig::new().with_run_count(10).with_max_parents(2);

        let mut graph = Graph::new(5);
        let report = RepeatedHillClimber::new(config, &oracle)
            .search(&mut graph, &data, &token)
            .unwrap();

        assert_eq!(report.state, SearchState::Cancelled);
        assert_eq!(report.runs_completed(), 1);
        assert_eq!(arc_set(&graph), target.into_iter().collect());
    }

    #[test]
    fn scoring_failure_aborts_and_keeps_input() {
        let calls = AtomicUsize::new(0);
        let oracle = FnOracle::new("flaky", |graph: &Graph, _: &Dataset| {
            if calls.fetch_add(1, Ordering::Relaxed) >= 3 {
                return Err(ScoreError::IllConditioned {
                    message: "singular table".into(),
                });
            }
            Ok(graph.arc_count() as f64)
        });
        let data = Dataset::binary(4, 0).unwrap();
        let mut graph = Graph::from_arcs(4, &[DirectedArc::new(0, 1)]).unwrap();
        let before = graph.clone();

        let err = RepeatedHillClimber::new(SearchConfig::new(), &oracle)
            .search(&mut graph, &data, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, BnError::Score(ScoreError::IllConditioned { .. })));
        assert_eq!(graph, before);
    }

    #[test]
    fn invalid_configuration_rejected_before_scoring() {
        let calls = AtomicUsize::new(0);
        let oracle = FnOracle::new("counting", |_: &Graph, _: &Dataset| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(0.0)
        });
        let data = Dataset::binary(3, 0).unwrap();
        let mut graph = Graph::new(3);

        let err = RepeatedHillClimber::new(SearchConfig::new().with_run_count(0), &oracle)
            .search(&mut graph, &data, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            BnError::Search(SearchError::InvalidConfiguration { .. })
        ));

        let err = RepeatedHillClimber::new(SearchConfig::new(), &oracle)
            .search(&mut Graph::new(4), &data, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            BnError::Search(SearchError::DimensionMismatch { .. })
        ));

        let mut cyclic =
            Graph::from_arcs(3, &[DirectedArc::new(0, 1), DirectedArc::new(1, 0)]).unwrap();
        let err = RepeatedHillClimber::new(SearchConfig::new(), &oracle)
            .search(&mut cyclic, &data, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, BnError::Validation(_)));

        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(graph.arc_count(), 0);
    }

    #[test]
    fn markov_blanket_correction_runs_after_search() {
        // Reward only 1 -> 2; nodes 3 and 4 end up disconnected from target 0.
        let oracle = target_oracle(&[DirectedArc::new(1, 2)]);
        let data = Dataset::binary(5, 0).unwrap();
        let config = SearchConfig::new()
            .with_run_count(2)
            .with_naive_bayes_init(false)
            .with_markov_blanket_correction(true);

        let mut graph = Graph::new(5);
        let report = RepeatedHillClimber::new(config, &oracle)
            .search(&mut graph, &data, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.initial_score, -1.0);
        assert_eq!(report.best_score, 0.0);
        assert!(report.best_score >= report.initial_score);
        assert_eq!(report.markov_blanket_arcs, 4);
        // The correction ignores the oracle and can end below the input.
        assert_eq!(report.final_score, -4.0);
        assert!(report.final_score < report.initial_score);
        assert_eq!(oracle.score(&graph, &data).unwrap(), report.final_score);
        for node in 1..5 {
            assert!(MarkovBlanketCorrection::in_blanket(&graph, 0, node));
        }
        assert!(graph.is_acyclic());
    }

    #[test]
    fn events_trace_the_search() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let oracle = target_oracle(&five_node_target());
        let data = Dataset::binary(5, 0).unwrap();
        let config = SearchConfig::new().with_run_count(3).with_seed(42);

        let mut graph = Graph::new(5);
        RepeatedHillClimber::new(config, &oracle)
            .with_events(tx)
            .search(&mut graph, &data, &CancellationToken::new())
            .unwrap();

        let events: Vec<SearchEvent> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(SearchEvent::Started { run_count: 3, .. })));
        assert!(matches!(events.last(), Some(SearchEvent::Finished { .. })));
        let finished = events
            .iter()
            .filter(|e| matches!(e, SearchEvent::RunFinished(_)))
            .count();
        assert_eq!(finished, 3);
        assert!(events
            .iter()
            .any(|e| matches!(e, SearchEvent::IncumbentImproved { run_index: 0, .. })));
    }
}
