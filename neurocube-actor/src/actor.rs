//! The actor loop
//!
//! An actor plays every (instance, brancher, cuber) triple of its role in a
//! fixed order, forever. Each episode pulls fresh parameters from the
//! aggregation server, plays one search and, when the cube was refuted,
//! reports the estimate and (for training roles) the derived examples.

use crate::client::AggregationServer;
use crate::config::{FleetConfig, RewardShaping};
use crate::corpus::Corpus;
use crate::episode::run_episode;
use crate::error::{ActorError, ActorResult};
use crate::protocol::ActorEpisodeReport;
use crate::samples::generate_examples;
use neurocube_ml::{Brancher, Cuber, NeuroQuery};
use neurocube_sat::SolverOptions;
use std::convert::Infallible;
use tracing::{debug, info};

/// Counters of one actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorStats {
    /// Episodes played
    pub episodes: u64,
    /// Episodes that refuted their cube
    pub refuted: u64,
    /// Reports sent
    pub reports: u64,
    /// Training examples sent
    pub examples: u64,
    /// Completed sweeps over the corpus
    pub passes: u64,
}

/// One actor of the fleet.
#[derive(Debug)]
pub struct Actor<S> {
    index: usize,
    server: S,
    inference: NeuroQuery,
    cubers: Vec<Cuber>,
    branchers: Vec<Brancher>,
    corpus: Corpus,
    options: SolverOptions,
    train: bool,
    reward: RewardShaping,
    stats: ActorStats,
}

impl<S: AggregationServer> Actor<S> {
    /// Set up worker `index`: fetch the inference configuration, open the
    /// inference connection on the worker's device and load the corpus.
    pub fn new(index: usize, fleet: &FleetConfig, mut server: S) -> ActorResult<Self> {
        let role = fleet.role(index)?;

        let mut config = server.get_config()?;
        config.dropout_training = false;
        let device = fleet.device_slot(index);
        let inference = NeuroQuery::new(config, device)?;

        let corpus = Corpus::load(&role.dimacs_dir)?;
        info!(
            corpus = %corpus.root().display(),
            device = device.id,
            fraction = device.fraction,
            instances = corpus.len(),
            cubers = role.cubers.len(),
            branchers = role.branchers.len(),
            train = role.train,
            "actor ready"
        );

        Ok(Self {
            index,
            server,
            inference,
            cubers: role.cubers.clone(),
            branchers: role.branchers.clone(),
            corpus,
            options: role.solver,
            train: role.train,
            reward: fleet.reward,
            stats: ActorStats::default(),
        })
    }

    /// Worker index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Counters so far.
    pub fn stats(&self) -> ActorStats {
        self.stats
    }

    /// The inference connection.
    pub fn inference(&self) -> &NeuroQuery {
        &self.inference
    }

    /// Loop over the corpus until an error stops the actor.
    pub fn run(&mut self) -> ActorResult<Infallible> {
        loop {
            self.run_pass()?;
        }
    }

    /// One sweep: every instance, then every brancher, then every cuber.
    pub fn run_pass(&mut self) -> ActorResult<()> {
        for instance in 0..self.corpus.len() {
            for brancher in 0..self.branchers.len() {
                for cuber in 0..self.cubers.len() {
                    self.play_episode(instance, brancher, cuber)?;
                }
            }
        }
        self.stats.passes += 1;
        info!(
            pass = self.stats.passes,
            episodes = self.stats.episodes,
            refuted = self.stats.refuted,
            examples = self.stats.examples,
            "pass complete"
        );
        Ok(())
    }

    /// Play one episode on corpus entry `instance` with the given policies.
    /// Returns whether a report was sent.
    pub fn play_episode(&mut self, instance: usize, brancher: usize, cuber: usize) -> ActorResult<bool> {
        let (Some(entry), Some(brancher), Some(cuber)) = (
            self.corpus.entries().get(instance),
            self.branchers.get(brancher),
            self.cubers.get(cuber),
        ) else {
            return Err(ActorError::NoEpisode {
                instance,
                brancher,
                cuber,
            });
        };

        let weights = self.server.get_weights()?;
        self.inference.set_weights(&weights)?;

        self.stats.episodes += 1;
        let outcome = run_episode(
            &entry.instance,
            &self.options,
            cuber,
            brancher,
            &mut self.inference,
        )?;
        let Some(outcome) = outcome else {
            debug!(
                instance = %entry.id,
                cuber = cuber.name(),
                brancher = brancher.name(),
                "episode produced no refutation"
            );
            return Ok(false);
        };
        self.stats.refuted += 1;

        let examples = if self.train {
            generate_examples(&entry.instance, &self.options, &outcome, &self.reward)
        } else {
            Vec::new()
        };
        debug!(
            instance = %entry.id,
            cuber = cuber.name(),
            brancher = brancher.name(),
            estimate = outcome.estimate,
            examples = examples.len(),
            "episode refuted"
        );

        let n_examples = examples.len() as u64;
        self.server.process_actor_episode(ActorEpisodeReport {
            instance_id: entry.id.clone(),
            cuber_name: cuber.name().to_string(),
            brancher_name: brancher.name().to_string(),
            estimate: outcome.estimate,
            examples,
        })?;
        self.stats.reports += 1;
        self.stats.examples += n_examples;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleConfig;
    use crate::server::{AggregationService, LocalServer, MemorySink};
    use std::sync::Arc;
    use neurocube_ml::{BrancherKind, CuberKind, InferenceConfig, ParameterBlob, PolicyValueNet};
    use std::fs;
    use std::path::Path;

    /// Records every call and serves a fixed snapshot.
    struct Recorder {
        config: InferenceConfig,
        blob: ParameterBlob,
        weight_pulls: usize,
        reports: Vec<ActorEpisodeReport>,
        fail_reports: bool,
    }

    impl Recorder {
        fn new(dropout_training: bool) -> Self {
            let config = InferenceConfig {
                dropout_training,
                ..InferenceConfig::default()
            };
            let net = PolicyValueNet::new(config.network.clone()).unwrap();
            Self {
                blob: ParameterBlob::from_network(1, &net).unwrap(),
                config,
                weight_pulls: 0,
                reports: Vec::new(),
                fail_reports: false,
            }
        }
    }

    impl AggregationServer for Recorder {
        fn get_config(&mut self) -> ActorResult<InferenceConfig> {
            Ok(self.config.clone())
        }

        fn get_weights(&mut self) -> ActorResult<ParameterBlob> {
            self.weight_pulls += 1;
            Ok(self.blob.clone())
        }

        fn process_actor_episode(&mut self, report: ActorEpisodeReport) -> ActorResult<()> {
            if self.fail_reports {
                return Err(ActorError::Server("unavailable".into()));
            }
            self.reports.push(report);
            Ok(())
        }
    }

    fn fleet(dir: &Path, train: bool) -> FleetConfig {
        FleetConfig {
            actors: vec![RoleConfig {
                n: 2,
                train,
                solver: SolverOptions::default(),
                dimacs_dir: dir.to_path_buf(),
                cubers: vec![
                    Cuber::new(CuberKind::None),
                    Cuber::new(CuberKind::Depth { depth: 2 }),
                ],
                branchers: vec![Brancher::new(BrancherKind::Occurrence)],
            }],
            n_gpus: 2,
            gpu_frac: 1.0,
            server_name: "localhost:1".into(),
            reward: RewardShaping::default(),
            max_restarts: 0,
        }
    }

    fn corpus_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        // unsat: every assignment of x1, x2 falsifies a clause
        fs::write(
            dir.path().join("a_unsat.cnf"),
            "p cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n",
        )
        .unwrap();
        fs::write(dir.path().join("b_sat.cnf"), "p cnf 2 1\n1 2 0\n").unwrap();
        dir
    }

    #[test]
    fn test_pass_order_and_reports() {
        let dir = corpus_dir();
        let mut actor = Actor::new(1, &fleet(dir.path(), true), Recorder::new(true)).unwrap();

        assert!(!actor.inference().config().dropout_training);
        assert_eq!(actor.inference().device().id, 1);
        assert_eq!(actor.inference().device().fraction, 1.0);

        actor.run_pass().unwrap();
        let stats = actor.stats();
        assert_eq!(stats.episodes, 4);
        assert_eq!(actor.server.weight_pulls, 4);
        // Only the unsatisfiable instance is refuted, once per cuber.
        assert_eq!(stats.refuted, 2);
        assert_eq!(stats.reports, 2);

        let names: Vec<(&str, &str)> = actor
            .server
            .reports
            .iter()
            .map(|r| (r.instance_id.as_str(), r.cuber_name.as_str()))
            .collect();
        assert_eq!(names, vec![("a_unsat.cnf", "none"), ("a_unsat.cnf", "depth")]);

        // Without a cube the refutation needs no assumption.
        assert!(actor.server.reports[0].examples.is_empty());
        for ex in &actor.server.reports[1].examples {
            assert_eq!(ex.variable_count, 2);
            assert_eq!(ex.constraint_count, 4);
        }
    }

    #[test]
    fn test_non_training_role_sends_no_examples() {
        let dir = corpus_dir();
        let mut actor = Actor::new(0, &fleet(dir.path(), false), Recorder::new(false)).unwrap();
        actor.run_pass().unwrap();
        assert!(actor.server.reports.iter().all(|r| r.examples.is_empty()));
        assert_eq!(actor.stats().examples, 0);
    }

    #[test]
    fn test_absent_outcome_sends_nothing() {
        let dir = corpus_dir();
        let mut actor = Actor::new(0, &fleet(dir.path(), true), Recorder::new(false)).unwrap();
        // b_sat.cnf is the second entry
        assert!(!actor.play_episode(1, 0, 1).unwrap());
        assert!(actor.server.reports.is_empty());
        assert_eq!(actor.server.weight_pulls, 1);
    }

    #[test]
    fn test_episode_outside_schedule() {
        let dir = corpus_dir();
        let mut actor = Actor::new(0, &fleet(dir.path(), true), Recorder::new(false)).unwrap();
        assert!(matches!(
            actor.play_episode(2, 0, 0),
            Err(ActorError::NoEpisode { instance: 2, .. })
        ));
        assert!(matches!(
            actor.play_episode(0, 0, 2),
            Err(ActorError::NoEpisode { cuber: 2, .. })
        ));
        assert_eq!(actor.server.weight_pulls, 0);
        assert_eq!(actor.stats().episodes, 0);
    }

    #[test]
    fn test_pass_against_in_process_service() {
        let dir = corpus_dir();
        let sink = MemorySink::default();
        let service = Arc::new(
            AggregationService::with_fresh_weights(
                InferenceConfig::default(),
                Box::new(sink.clone()),
            )
            .unwrap(),
        );
        let server = LocalServer::new(Arc::clone(&service));
        let mut actor = Actor::new(1, &fleet(dir.path(), true), server).unwrap();

        actor.run_pass().unwrap();
        assert_eq!(service.reports_received(), 2);
        let reports = sink.reports();
        assert!(reports.iter().all(|r| r.instance_id == "a_unsat.cnf"));
        assert_eq!(reports[1].cuber_name, "depth");
    }

    #[test]
    fn test_report_failure_stops_actor() {
        let dir = corpus_dir();
        let mut server = Recorder::new(false);
        server.fail_reports = true;
        let mut actor = Actor::new(0, &fleet(dir.path(), true), server).unwrap();
        assert!(matches!(actor.run(), Err(ActorError::Server(_))));
        assert_eq!(actor.stats().reports, 0);
    }

    #[test]
    fn test_index_without_role() {
        let dir = corpus_dir();
        assert!(matches!(
            Actor::new(2, &fleet(dir.path(), true), Recorder::new(false)),
            Err(ActorError::Config(_))
        ));
    }
}
