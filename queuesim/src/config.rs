//! Run and batch configuration.
//!
//! Both structures deserialize from TOML and every top-level field has a
//! default, so a file only needs to name the sections that differ from the
//! standard cafeteria. A per-category table is given in full:
//!
//! ```toml
//! runs = 20
//! seed = 7
//!
//! [run]
//! duration = 1800.0
//!
//! [run.capacities]
//! self_decision = 2
//! assisted_pickup = 2
//! full_menu = 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use queuesim_core::{SimError, SimTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::category::Category;
use crate::error::QueueSimError;

/// One value per category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryValues<T> {
    pub no_service: T,
    pub self_decision: T,
    pub assisted_pickup: T,
    pub full_menu: T,
}

impl<T> CategoryValues<T> {
    pub fn get(&self, category: Category) -> &T {
        match category {
            Category::NoService => &self.no_service,
            Category::SelfDecision => &self.self_decision,
            Category::AssistedPickup => &self.assisted_pickup,
            Category::FullMenu => &self.full_menu,
        }
    }
}

impl<T: Copy> CategoryValues<T> {
    /// Values in [`Category::ALL`] order.
    pub fn to_array(&self) -> [T; 4] {
        Category::ALL.map(|category| *self.get(category))
    }
}

/// One value per queued category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedValues<T> {
    pub self_decision: T,
    pub assisted_pickup: T,
    pub full_menu: T,
}

impl<T> QueuedValues<T> {
    /// `None` for [`Category::NoService`].
    pub fn get(&self, category: Category) -> Option<&T> {
        match category {
            Category::NoService => None,
            Category::SelfDecision => Some(&self.self_decision),
            Category::AssistedPickup => Some(&self.assisted_pickup),
            Category::FullMenu => Some(&self.full_menu),
        }
    }

    pub fn try_map<U, E>(&self, mut f: impl FnMut(Category, &T) -> Result<U, E>) -> Result<QueuedValues<U>, E> {
        Ok(QueuedValues {
            self_decision: f(Category::SelfDecision, &self.self_decision)?,
            assisted_pickup: f(Category::AssistedPickup, &self.assisted_pickup)?,
            full_menu: f(Category::FullMenu, &self.full_menu)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        [
            (Category::SelfDecision, &self.self_decision),
            (Category::AssistedPickup, &self.assisted_pickup),
            (Category::FullMenu, &self.full_menu),
        ]
        .into_iter()
    }
}

/// Parameters of one run. Times are in model units (one unit is one second
/// of simulated time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfiguration {
    /// Number of staff per station.
    pub capacities: QueuedValues<usize>,
    /// Observations at or before this time are discarded.
    pub warm_up: f64,
    /// Measured time after the warm-up; the run stops at `warm_up + duration`.
    pub duration: f64,
    /// Means of the exponential gaps that make up one inter-arrival time.
    /// Each gap is waited out separately, in order.
    pub interarrival_means: Vec<f64>,
    /// Relative choice weights of the categories.
    pub weights: CategoryValues<f64>,
    /// Fixed durations of the consecutive service phases of each station.
    pub service_phases: QueuedValues<Vec<f64>>,
    pub seed: u64,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            capacities: QueuedValues {
                self_decision: 2,
                assisted_pickup: 2,
                full_menu: 4,
            },
            warm_up: 500.0,
            duration: 3600.0,
            interarrival_means: vec![4.0, 3.0],
            weights: CategoryValues {
                no_service: 5.0,
                self_decision: 15.0,
                assisted_pickup: 30.0,
                full_menu: 50.0,
            },
            service_phases: QueuedValues {
                self_decision: vec![4.0],
                assisted_pickup: vec![6.0, 2.0],
                full_menu: vec![4.0, 2.0],
            },
            seed: 2024,
        }
    }
}

impl RunConfiguration {
    /// Check every parameter before a run starts.
    pub fn validate(&self) -> Result<(), SimError> {
        for (category, capacity) in self.capacities.iter() {
            if *capacity == 0 {
                return Err(SimError::invalid_parameter(format!("{category} capacity must be positive")));
            }
        }

        self.warm_up_time()?;
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(SimError::invalid_parameter(format!(
                "duration must be positive and finite, got {}",
                self.duration
            )));
        }
        self.horizon()?;

        if self.interarrival_means.is_empty() {
            return Err(SimError::invalid_parameter("at least one inter-arrival mean is required"));
        }
        if let Some(bad) = self
            .interarrival_means
            .iter()
            .find(|mean| !(mean.is_finite() && **mean > 0.0))
        {
            return Err(SimError::invalid_parameter(format!(
                "inter-arrival means must be positive and finite, got {bad}"
            )));
        }

        let weights = self.weights.to_array();
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(SimError::invalid_parameter(format!(
                "weights must be finite and non-negative, got {bad}"
            )));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(SimError::invalid_parameter("weights sum to zero"));
        }

        for (category, phases) in self.service_phases.iter() {
            for phase in phases {
                SimTime::try_from_secs_f64(*phase).map_err(|_| {
                    SimError::invalid_parameter(format!("{category} service phase {phase} is not a valid duration"))
                })?;
            }
        }
        Ok(())
    }

    pub fn warm_up_time(&self) -> Result<SimTime, SimError> {
        SimTime::try_from_secs_f64(self.warm_up)
            .map_err(|_| SimError::invalid_parameter(format!("warm-up {} is not a valid time", self.warm_up)))
    }

    /// End of the run: `warm_up + duration`.
    pub fn horizon(&self) -> Result<SimTime, SimError> {
        let end = self.warm_up + self.duration;
        SimTime::try_from_secs_f64(end)
            .map_err(|_| SimError::invalid_parameter(format!("horizon {end} is not a valid time")))
    }

    /// Copy of this configuration with another seed.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self { seed, ..self.clone() }
    }
}

/// A batch of independent runs and where its results go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfiguration {
    /// Template for every run; its seed is replaced per run.
    pub run: RunConfiguration,
    pub runs: usize,
    /// Base seed the per-run seeds are derived from.
    pub seed: u64,
    /// Revenue per served customer.
    pub revenue: CategoryValues<f64>,
    /// Per-run results table.
    pub output: PathBuf,
    /// Optional JSON file for the cross-run averages.
    pub summary_json: Option<PathBuf>,
}

impl Default for BatchConfiguration {
    fn default() -> Self {
        Self {
            run: RunConfiguration::default(),
            runs: 100,
            seed: 2024,
            revenue: CategoryValues {
                no_service: 0.0,
                self_decision: 4.0,
                assisted_pickup: 11.0,
                full_menu: 8.9,
            },
            output: PathBuf::from("results.csv"),
            summary_json: None,
        }
    }
}

impl BatchConfiguration {
    pub fn from_toml_str(contents: &str) -> Result<Self, QueueSimError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, QueueSimError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            error!("Failed to read config file '{}': {}", path.display(), source);
            QueueSimError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config = Self::from_toml_str(&contents).inspect_err(|e| {
            error!("Failed to parse config TOML: {}", e);
        })?;
        debug!(path = %path.display(), runs = config.runs, seed = config.seed, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        self.run.validate()?;
        if let Some(bad) = self.revenue.to_array().iter().find(|r| !r.is_finite()) {
            return Err(SimError::invalid_parameter(format!("revenue must be finite, got {bad}")));
        }
        Ok(())
    }
}
