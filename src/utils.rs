use crate::error::{AcoError, Result};
use crate::structs::{PheromoneField, RunReport};
use chrono::Utc;
use rand::Rng;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Checks that `dist` is a non-empty square matrix whose off-diagonal
/// entries are finite and strictly positive. The diagonal is not inspected.
pub fn validate_distances(dist: &[Vec<f64>]) -> Result<()> {
    let n = dist.len();
    if n == 0 {
        return Err(AcoError::EmptyMatrix);
    }
    for (i, row) in dist.iter().enumerate() {
        if row.len() != n {
            return Err(AcoError::NotSquare {
                row: i,
                len: row.len(),
                expected: n,
            });
        }
        for (j, &d) in row.iter().enumerate() {
            if i == j {
                continue;
            }
            if !d.is_finite() || d < 0.0 {
                return Err(AcoError::InvalidDistance {
                    from: i,
                    to: j,
                    value: d,
                });
            }
            if d == 0.0 {
                return Err(AcoError::ZeroDistance { from: i, to: j });
            }
        }
    }
    Ok(())
}

/// Attractiveness matrix: `1 / dist[i][j]` off the diagonal, `0` on it.
pub fn inverse_distance(dist: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    validate_distances(dist)?;
    let n = dist.len();
    let mut attract = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                attract[i][j] = 1.0 / dist[i][j];
            }
        }
    }
    Ok(attract)
}

/// Picks the next vertex for an ant standing at the last entry of `visited`.
///
/// Each candidate `j` is scored `pheromone[last][j]^a * attract[last][j]^b`
/// and one is drawn from the normalized scores with a single uniform value
/// from `rng`.
pub fn choose_next_city<R: Rng + ?Sized>(
    visited: &[usize],
    unvisited: &[usize],
    pheromone: &PheromoneField,
    attract: &[Vec<f64>],
    a: f64,
    b: f64,
    rng: &mut R,
) -> Result<usize> {
    if unvisited.is_empty() {
        return Err(AcoError::NoCandidates);
    }
    let last = *visited.last().ok_or(AcoError::NoCandidates)?;

    let weights: Vec<f64> = unvisited
        .iter()
        .map(|&j| pheromone.get(last, j).powf(a) * attract[last][j].powf(b))
        .collect();
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(AcoError::DegenerateDistribution { from: last, total });
    }

    let idx = roulette(&weights, total, rng.gen::<f64>());
    Ok(unvisited[idx])
}

/// Inverse-CDF walk over `weights / total`. Falls back to the last index
/// when rounding leaves `draw` above the accumulated mass.
pub(crate) fn roulette(weights: &[f64], total: f64, draw: f64) -> usize {
    let mut rest = draw;
    for (i, w) in weights.iter().enumerate() {
        let p = w / total;
        if rest < p {
            return i;
        }
        rest -= p;
    }
    weights.len() - 1
}

/// Total cost of walking `route` edge by edge. Routes of fewer than two
/// vertices have length zero.
pub fn length(route: &[usize], dist: &[Vec<f64>]) -> f64 {
    route.windows(2).map(|w| dist[w[0]][w[1]]).sum()
}

/// Appends one timestamped summary line for a finished run.
pub fn log_run_to_csv(path: impl AsRef<Path>, report: &RunReport, vertices: usize) -> std::io::Result<()> {
    let timestamp = Utc::now().to_rfc3339();

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let header = "timestamp,vertices,ants,generations,evaluations,best_length,best_generation,total_time_sec\n";
    if file.metadata()?.len() == 0 {
        file.write_all(header.as_bytes())?;
    }

    let m = &report.metrics;
    let best_length = m.best_length.map(|l| format!("{l:.4}")).unwrap_or_default();
    let best_generation = m.best_generation.map(|g| g.to_string()).unwrap_or_default();
    let record = format!(
        "{},{},{},{},{},{},{},{:.4}\n",
        timestamp,
        vertices,
        m.ants,
        m.generations,
        m.evaluations,
        best_length,
        best_generation,
        m.total_time_sec
    );
    file.write_all(record.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn line4() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, 0.0, 1.0, 2.0],
            vec![2.0, 1.0, 0.0, 1.0],
            vec![3.0, 2.0, 1.0, 0.0],
        ]
    }

    fn positive_matrix(max_n: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
        (1..=max_n).prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0.1f64..100.0, n), n))
    }

    #[test]
    fn inverse_distance_zeroes_diagonal() {
        let attract = inverse_distance(&line4()).unwrap();
        assert_eq!(attract[0][0], 0.0);
        assert_eq!(attract[2][2], 0.0);
        assert_eq!(attract[0][2], 0.5);
        assert!((attract[0][3] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_distance_ignores_diagonal_values() {
        let dist = vec![vec![0.0, 4.0], vec![5.0, f64::NAN]];
        let attract = inverse_distance(&dist).unwrap();
        assert_eq!(attract[1][1], 0.0);
        assert_eq!(attract[1][0], 0.2);
    }

    #[test]
    fn inverse_distance_rejects_zero_off_diagonal() {
        let dist = vec![vec![0.0, 0.0], vec![1.0, 0.0]];
        assert!(matches!(
            inverse_distance(&dist),
            Err(AcoError::ZeroDistance { from: 0, to: 1 })
        ));
    }

    #[test]
    fn validate_rejects_bad_shapes_and_values() {
        assert!(matches!(validate_distances(&[]), Err(AcoError::EmptyMatrix)));
        let ragged = vec![vec![0.0, 1.0], vec![1.0]];
        assert!(matches!(
            validate_distances(&ragged),
            Err(AcoError::NotSquare { row: 1, len: 1, expected: 2 })
        ));
        let negative = vec![vec![0.0, -1.0], vec![1.0, 0.0]];
        assert!(matches!(
            validate_distances(&negative),
            Err(AcoError::InvalidDistance { from: 0, to: 1, .. })
        ));
        let infinite = vec![vec![0.0, 1.0], vec![f64::INFINITY, 0.0]];
        assert!(validate_distances(&infinite).is_err());
    }

    #[test]
    fn length_sums_consecutive_edges() {
        let dist = line4();
        assert_eq!(length(&[0, 1, 2, 3], &dist), 3.0);
        assert_eq!(length(&[0, 2, 1, 3], &dist), 5.0);
        assert_eq!(length(&[2], &dist), 0.0);
        assert_eq!(length(&[], &dist), 0.0);
    }

    #[test]
    fn length_is_order_sensitive_on_asymmetric_matrix() {
        let dist = vec![
            vec![0.0, 1.0, 9.0],
            vec![5.0, 0.0, 1.0],
            vec![1.0, 7.0, 0.0],
        ];
        assert_eq!(length(&[0, 1, 2], &dist), 2.0);
        assert_eq!(length(&[2, 1, 0], &dist), 12.0);
    }

    #[test]
    fn choose_next_city_single_candidate() {
        let attract = inverse_distance(&line4()).unwrap();
        let ph = PheromoneField::new(4, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let next = choose_next_city(&[0, 2], &[1], &ph, &attract, 1.0, 1.0, &mut rng).unwrap();
            assert_eq!(next, 1);
        }
    }

    #[test]
    fn choose_next_city_rejects_empty_candidates() {
        let attract = inverse_distance(&line4()).unwrap();
        let ph = PheromoneField::new(4, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(matches!(
            choose_next_city(&[0], &[], &ph, &attract, 1.0, 1.0, &mut rng),
            Err(AcoError::NoCandidates)
        ));
    }

    #[test]
    fn choose_next_city_rejects_zero_scores() {
        let attract = inverse_distance(&line4()).unwrap();
        let ph = PheromoneField::new(4, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(matches!(
            choose_next_city(&[0], &[1, 2], &ph, &attract, 1.0, 1.0, &mut rng),
            Err(AcoError::DegenerateDistribution { from: 0, .. })
        ));
    }

    #[test]
    fn choose_next_city_prefers_near_vertices() {
        // from 0: weights 1, 1/2, 1/3 with b = 1
        let attract = inverse_distance(&line4()).unwrap();
        let ph = PheromoneField::new(4, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut counts = [0usize; 4];
        for _ in 0..6000 {
            let next = choose_next_city(&[0], &[1, 2, 3], &ph, &attract, 1.0, 1.0, &mut rng).unwrap();
            counts[next] += 1;
        }
        assert_eq!(counts[0], 0);
        assert!(counts[1] > counts[2]);
        assert!(counts[2] > counts[3]);
    }

    #[test]
    fn choose_next_city_zero_b_follows_pheromone_only() {
        let attract = inverse_distance(&line4()).unwrap();
        let mut ph = PheromoneField::new(4, 0.01);
        ph.set(0, 3, 100.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let hits = (0..500)
            .filter(|_| choose_next_city(&[0], &[1, 2, 3], &ph, &attract, 1.0, 0.0, &mut rng).unwrap() == 3)
            .count();
        assert!(hits > 480);
    }

    #[test]
    fn roulette_walks_cumulative_mass() {
        let w = [0.2, 0.3, 0.5];
        assert_eq!(roulette(&w, 1.0, 0.0), 0);
        assert_eq!(roulette(&w, 1.0, 0.19), 0);
        assert_eq!(roulette(&w, 1.0, 0.25), 1);
        assert_eq!(roulette(&w, 1.0, 0.6), 2);
    }

    #[test]
    fn roulette_falls_back_to_last_candidate() {
        // rare path: rounding leaves the draw above the accumulated mass
        let w = [0.2, 0.3, 0.5];
        assert_eq!(roulette(&w, 1.0, 1.0), 2);
        assert_eq!(roulette(&[1.0, 1.0], 3.0, 0.9), 1);
    }

    #[test]
    fn csv_log_writes_header_once() {
        let path = std::env::temp_dir().join(format!("acotsp_log_{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let report = RunReport::default();
        log_run_to_csv(&path, &report, 4).unwrap();
        log_run_to_csv(&path, &report, 4).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,vertices"));
        assert_eq!(lines[1].split(',').count(), 8);
        let _ = std::fs::remove_file(&path);
    }

    proptest! {
        #[test]
        fn prop_inverse_distance_is_involution(dist in positive_matrix(6)) {
            let back = inverse_distance(&inverse_distance(&dist).unwrap()).unwrap();
            for i in 0..dist.len() {
                for j in 0..dist.len() {
                    if i != j {
                        prop_assert!((back[i][j] - dist[i][j]).abs() <= 1e-9 * dist[i][j]);
                    }
                }
            }
        }

        #[test]
        fn prop_symmetric_length_is_reversible(
            dist in positive_matrix(7),
            seed in any::<u64>(),
        ) {
            use rand::seq::SliceRandom;
            let n = dist.len();
            let mut sym = dist.clone();
            for i in 0..n {
                for j in 0..i {
                    sym[i][j] = sym[j][i];
                }
            }
            let mut route: Vec<usize> = (0..n).collect();
            route.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
            let mut reversed = route.clone();
            reversed.reverse();
            let (fwd, back) = (length(&route, &sym), length(&reversed, &sym));
            prop_assert!((fwd - back).abs() <= 1e-9 * fwd.max(1.0));
        }
    }
}
