use crate::error::{AcoError, Result};
use crate::utils::{choose_next_city, inverse_distance, length};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Run parameters. Every field has its own default, so a JSON request may
/// name only the ones it wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcoParams {
    /// Ants simulated per generation
    pub ants: usize,
    /// Number of generations
    pub ages: usize,
    /// Evaporation fraction per generation, in [0, 1]
    pub rho: f64,
    /// Pheromone exponent
    pub a: f64,
    /// Attractiveness exponent
    pub b: f64,
    /// Deposit scale per unit of inverse route length
    pub q: f64,
    pub ph_min: f64,
    pub ph_max: f64,
    /// Multiplier on `q` for the end-of-generation deposit along the best
    /// route; 0 turns it off
    pub elite: f64,
    /// Fixed seed for reproducible runs, entropy when absent
    pub seed: Option<u64>,
    /// Print a progress line per generation
    pub verbose: bool,
}

impl Default for AcoParams {
    fn default() -> Self {
        Self {
            ants: 1,
            ages: 1,
            rho: 0.1,
            a: 1.0,
            b: 1.0,
            q: 1.0,
            ph_min: 0.01,
            ph_max: 1.0,
            elite: 0.0,
            seed: None,
            verbose: false,
        }
    }
}

impl AcoParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.rho) {
            return Err(AcoError::parameter("rho", format!("{} is not in [0, 1]", self.rho)));
        }
        for (name, value) in [("a", self.a), ("b", self.b), ("q", self.q), ("elite", self.elite)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AcoError::parameter(name, format!("{value} must be finite and non-negative")));
            }
        }
        if !self.ph_min.is_finite() || self.ph_min < 0.0 {
            return Err(AcoError::parameter(
                "ph_min",
                format!("{} must be finite and non-negative", self.ph_min),
            ));
        }
        if !self.ph_max.is_finite() || self.ph_max < self.ph_min {
            return Err(AcoError::parameter(
                "ph_max",
                format!("{} must be finite and at least ph_min ({})", self.ph_max, self.ph_min),
            ));
        }
        Ok(())
    }

    pub fn with_ants(mut self, ants: usize) -> Self {
        self.ants = ants;
        self
    }

    pub fn with_ages(mut self, ages: usize) -> Self {
        self.ages = ages;
        self
    }

    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn with_weights(mut self, a: f64, b: f64) -> Self {
        self.a = a;
        self.b = b;
        self
    }

    pub fn with_q(mut self, q: f64) -> Self {
        self.q = q;
        self
    }

    pub fn with_bounds(mut self, ph_min: f64, ph_max: f64) -> Self {
        self.ph_min = ph_min;
        self.ph_max = ph_max;
        self
    }

    pub fn with_elite(mut self, elite: f64) -> Self {
        self.elite = elite;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Per-edge pheromone levels, row-major `size x size`.
#[derive(Debug, Clone, PartialEq)]
pub struct PheromoneField {
    size: usize,
    values: Vec<f64>,
}

impl PheromoneField {
    pub fn new(size: usize, initial: f64) -> Self {
        Self {
            size,
            values: vec![initial; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.values[from * self.size + to]
    }

    pub fn set(&mut self, from: usize, to: usize, value: f64) {
        self.values[from * self.size + to] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Adds `q / route_length` to every edge of `route`.
    pub fn deposit(&mut self, route: &[usize], route_length: f64, q: f64) -> Result<()> {
        if !(route_length.is_finite() && route_length > 0.0) {
            return Err(AcoError::ZeroLengthRoute(route_length));
        }
        let amount = q / route_length;
        for edge in route.windows(2) {
            self.values[edge[0] * self.size + edge[1]] += amount;
        }
        Ok(())
    }

    /// Multiplies every entry by `1 - rho`, then clamps into `[ph_min, ph_max]`.
    pub fn evaporate(&mut self, rho: f64, ph_min: f64, ph_max: f64) {
        let keep = 1.0 - rho;
        for v in self.values.iter_mut() {
            *v = (*v * keep).clamp(ph_min, ph_max);
        }
    }
}

/// Shortest route seen so far and its length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRoute {
    pub route: Vec<usize>,
    pub length: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcoMetrics {
    pub generations: usize,
    pub ants: usize,
    /// Routes built and scored
    pub evaluations: usize,
    pub best_length: Option<f64>,
    /// Generation of the last improvement
    pub best_generation: Option<usize>,
    /// Global best length after each generation
    pub best_length_history: Vec<Option<f64>>,
    pub total_time_sec: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub best: Option<BestRoute>,
    pub metrics: AcoMetrics,
}

/// JSON request accepted by [`crate::solve_json`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    pub dist: Vec<Vec<f64>>,
    pub start: usize,
    pub end: usize,
    #[serde(flatten)]
    pub params: AcoParams,
}

/// One ACO run: owns the distances, the derived attractiveness, the
/// pheromone field and the random source, and threads them through every
/// ant of every generation.
pub struct AcoStruct {
    pub dist: Vec<Vec<f64>>,
    pub attract: Vec<Vec<f64>>,
    pub pheromones: PheromoneField,
    pub params: AcoParams,
    pub start: usize,
    pub end: usize,
    /// Vertices every route must visit: all but `end`, always `start`.
    pub vertexes: Vec<usize>,
    pub best: Option<BestRoute>,
    pub best_generation: Option<usize>,
    pub best_length_history: Vec<Option<f64>>,
    pub evaluations: usize,
    rng: ChaCha8Rng,
}

impl AcoStruct {
    pub fn new(dist: Vec<Vec<f64>>, start: usize, end: usize, params: AcoParams) -> Result<Self> {
        params.validate()?;
        let attract = inverse_distance(&dist)?;
        let n = dist.len();
        for (role, index) in [("start", start), ("end", end)] {
            if index >= n {
                return Err(AcoError::VertexOutOfRange { role, index, size: n });
            }
        }

        let vertexes: Vec<usize> = (0..n).filter(|&v| v != end || v == start).collect();
        let rng = match params.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            dist,
            attract,
            pheromones: PheromoneField::new(n, params.ph_max),
            start,
            end,
            vertexes,
            best: None,
            best_generation: None,
            best_length_history: Vec::with_capacity(params.ages),
            evaluations: 0,
            params,
            rng,
        })
    }

    /// Runs `params.ages` generations on the current state and reports the
    /// best route found overall.
    pub fn run_model(&mut self) -> Result<RunReport> {
        let started = Instant::now();
        for generation in 0..self.params.ages {
            self.run_generation(generation)?;
            if self.params.verbose {
                match &self.best {
                    Some(best) => println!("Generation {} best length: {:.4}", generation, best.length),
                    None => println!("Generation {} produced no route", generation),
                }
            }
        }
        let total_time_sec = started.elapsed().as_secs_f64();

        if self.params.verbose {
            if let (Some(best), Some(generation)) = (&self.best, self.best_generation) {
                println!("Best length {:.4} found at generation {}", best.length, generation);
            }
        }

        Ok(RunReport {
            best: self.best.clone(),
            metrics: AcoMetrics {
                generations: self.best_length_history.len(),
                ants: self.params.ants,
                evaluations: self.evaluations,
                best_length: self.best.as_ref().map(|b| b.length),
                best_generation: self.best_generation,
                best_length_history: self.best_length_history.clone(),
                total_time_sec,
            },
        })
    }

    /// One generation: every ant builds, scores and deposits in turn, so
    /// later ants see earlier ants' pheromone. Then the elite deposit and
    /// evaporation.
    pub fn run_generation(&mut self, generation: usize) -> Result<()> {
        for _ in 0..self.params.ants {
            let route = self.construct_route()?;
            let route_length = length(&route, &self.dist);
            self.pheromones.deposit(&route, route_length, self.params.q)?;
            self.evaluations += 1;

            let improved = self.best.as_ref().map_or(true, |best| route_length < best.length);
            if improved {
                self.best = Some(BestRoute {
                    route,
                    length: route_length,
                });
                self.best_generation = Some(generation);
            }
        }

        if self.params.elite > 0.0 {
            if let Some(best) = &self.best {
                self.pheromones
                    .deposit(&best.route, best.length, self.params.q * self.params.elite)?;
            }
        }

        self.pheromones
            .evaporate(self.params.rho, self.params.ph_min, self.params.ph_max);
        self.best_length_history.push(self.best.as_ref().map(|b| b.length));
        Ok(())
    }

    /// Builds one ant's route from `start` through every required vertex,
    /// closed by `end`.
    pub fn construct_route(&mut self) -> Result<Vec<usize>> {
        let mut visited = Vec::with_capacity(self.vertexes.len() + 1);
        visited.push(self.start);
        let mut unvisited: Vec<usize> = self
            .vertexes
            .iter()
            .copied()
            .filter(|&v| v != self.start)
            .collect();

        while !unvisited.is_empty() {
            let next = choose_next_city(
                &visited,
                &unvisited,
                &self.pheromones,
                &self.attract,
                self.params.a,
                self.params.b,
                &mut self.rng,
            )?;
            unvisited.retain(|&v| v != next);
            visited.push(next);
        }

        visited.push(self.end);
        Ok(visited)
    }
}
