//! Fleet configuration
//!
//! One JSON file describes the whole fleet: a list of actor roles, each
//! replicated `n` times, plus device, discovery, reward and supervision
//! settings shared by every actor.
//!
//! ```json
//! {
//!   "actors": [
//!     { "n": 2, "train": true, "dimacs_dir": "data/train",
//!       "solver": { "max_conflicts": 20000, "sat_restart_max": 8 },
//!       "cubers": [{ "kind": "neural", "max_depth": 6, "cutoff": 0.0 }],
//!       "branchers": [{ "kind": "neural" }] }
//!   ],
//!   "n_gpus": 1,
//!   "gpu_frac": 0.5,
//!   "server_name": "aggregator:7050",
//!   "reward": { "v_reward": 1.0, "v_reward_decay": 0.9, "v_reward_decay_steps": 4.0 }
//! }
//! ```

use crate::error::ConfigError;
use neurocube_ml::{Brancher, Cuber, DeviceSlot};
use neurocube_sat::SolverOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One actor role, replicated `n` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Number of actors playing this role
    pub n: usize,
    /// Generate training examples from refuted cubes
    #[serde(default = "default_train")]
    pub train: bool,
    /// Options of every solver the actor creates
    #[serde(default)]
    pub solver: SolverOptions,
    /// Root of the instance corpus
    pub dimacs_dir: PathBuf,
    /// Cube policies, played in order
    pub cubers: Vec<Cuber>,
    /// Branch policies, played in order
    pub branchers: Vec<Brancher>,
}

fn default_train() -> bool {
    true
}

/// Value-target shaping constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardShaping {
    /// Target value at the end of the proof
    pub v_reward: f64,
    /// Decay per `v_reward_decay_steps` steps
    pub v_reward_decay: f64,
    /// Steps per decay period, strictly positive
    pub v_reward_decay_steps: f64,
}

impl Default for RewardShaping {
    fn default() -> Self {
        Self {
            v_reward: 1.0,
            v_reward_decay: 0.9,
            v_reward_decay_steps: 1.0,
        }
    }
}

impl RewardShaping {
    /// Value target `n` steps away from the end of the refutation:
    /// `v_reward * v_reward_decay ^ (n / v_reward_decay_steps)`.
    pub fn compute_v(&self, n: usize) -> f64 {
        self.v_reward * self.v_reward_decay.powf(n as f64 / self.v_reward_decay_steps)
    }
}

/// Default aggregation server name.
pub const DEFAULT_SERVER_NAME: &str = "localhost:7050";

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

fn default_gpu_frac() -> f64 {
    1.0
}

/// The whole fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Actor roles
    pub actors: Vec<RoleConfig>,
    /// Number of accelerator devices
    #[serde(default)]
    pub n_gpus: usize,
    /// Share of the devices the whole fleet may claim
    #[serde(default = "default_gpu_frac")]
    pub gpu_frac: f64,
    /// Aggregation server name, `host` or `host:port`
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Value-target shaping
    #[serde(default)]
    pub reward: RewardShaping,
    /// Relaunches allowed per failed worker
    #[serde(default)]
    pub max_restarts: u32,
}

impl FleetConfig {
    /// Read and validate a fleet file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FleetConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that must hold before any episode runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_actors() == 0 {
            return Err(ConfigError::NoActors);
        }
        let steps = self.reward.v_reward_decay_steps;
        if steps.is_nan() || steps <= 0.0 {
            return Err(ConfigError::DecaySteps(steps));
        }
        if !(0.0..=1.0).contains(&self.gpu_frac) {
            return Err(ConfigError::DeviceFraction(self.gpu_frac));
        }
        let share = self.device_fraction();
        if share > 1.0 {
            return Err(ConfigError::DeviceShare(share));
        }
        for (role, cfg) in self.actors.iter().enumerate() {
            if cfg.n == 0 {
                continue;
            }
            if cfg.cubers.is_empty() {
                return Err(ConfigError::EmptyPolicies {
                    role,
                    what: "cubers",
                });
            }
            if cfg.branchers.is_empty() {
                return Err(ConfigError::EmptyPolicies {
                    role,
                    what: "branchers",
                });
            }
        }
        Ok(())
    }

    /// Total number of actors over all roles.
    pub fn total_actors(&self) -> usize {
        self.actors.iter().map(|r| r.n).sum()
    }

    /// Position of the role that worker `index` plays: the first role whose
    /// running actor count exceeds `index`.
    pub fn role_for_index(&self, index: usize) -> Result<usize, ConfigError> {
        let mut upto = 0;
        for (i, role) in self.actors.iter().enumerate() {
            upto += role.n;
            if index < upto {
                return Ok(i);
            }
        }
        Err(ConfigError::NoRole {
            index,
            total: upto,
        })
    }

    /// Role that worker `index` plays.
    pub fn role(&self, index: usize) -> Result<&RoleConfig, ConfigError> {
        Ok(&self.actors[self.role_for_index(index)?])
    }

    /// Per-actor device share `gpu_frac * n_gpus / total`.
    pub fn device_fraction(&self) -> f64 {
        let total = self.total_actors().max(1) as f64;
        self.gpu_frac * self.n_gpus as f64 / total
    }

    /// Device of worker `index`, round-robin over the devices.
    pub fn device_for_index(&self, index: usize) -> usize {
        if self.n_gpus == 0 {
            0
        } else {
            index % self.n_gpus
        }
    }

    /// Device slot of worker `index`.
    pub fn device_slot(&self, index: usize) -> DeviceSlot {
        DeviceSlot {
            id: self.device_for_index(index),
            fraction: self.device_fraction(),
        }
    }
}
