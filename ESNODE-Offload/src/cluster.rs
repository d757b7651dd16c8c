// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Spatial clustering of fog devices into cells via Lloyd's k-means, plus
/// master election (the member closest to its cell centroid).

/// Centroid movement below this, in both coordinates, counts as converged.
pub const CONVERGENCE_TOL: f64 = 1e-3;
pub const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: usize,
    pub centroid: (f64, f64),
    pub master: Option<String>,
    pub members: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    #[error("cannot cluster an empty device set")]
    Empty,
    #[error("cell count must be at least 1")]
    ZeroCells,
    #[error("cell count {cells} exceeds device count {devices}")]
    TooManyCells { cells: usize, devices: usize },
}

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Partition `points` (device id, position) into `cells` clusters.
///
/// Centroids start uniformly at random inside the points' bounding box, from
/// a `StdRng` seeded with `seed`, so the partition is a pure function of its
/// inputs. Assignment ties go to the lowest centroid index. Empty cells are
/// legal and simply have no master.
pub fn cluster_devices(
    points: &[(String, (f64, f64))],
    cells: usize,
    seed: u64,
) -> Result<Vec<Cell>, ClusterError> {
    if points.is_empty() {
        return Err(ClusterError::Empty);
    }
    if cells == 0 {
        return Err(ClusterError::ZeroCells);
    }
    if cells > points.len() {
        return Err(ClusterError::TooManyCells {
            cells,
            devices: points.len(),
        });
    }

    let min_x = points.iter().map(|p| p.1 .0).fold(f64::INFINITY, f64::min);
    let max_x = points
        .iter()
        .map(|p| p.1 .0)
        .fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.1 .1).fold(f64::INFINITY, f64::min);
    let max_y = points
        .iter()
        .map(|p| p.1 .1)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<(f64, f64)> = (0..cells)
        .map(|_| {
            (
                rng.gen_range(min_x..=max_x),
                rng.gen_range(min_y..=max_y),
            )
        })
        .collect();

    let mut assignment = vec![0usize; points.len()];
    for iteration in 0..MAX_ITERATIONS {
        for (i, point) in points.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f64::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = dist(point.1, *centroid);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            assignment[i] = best;
        }

        let mut moved = false;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let assigned: Vec<(f64, f64)> = points
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| p.1)
                .collect();
            if assigned.is_empty() {
                continue;
            }
            let n = assigned.len() as f64;
            let next = (
                assigned.iter().map(|p| p.0).sum::<f64>() / n,
                assigned.iter().map(|p| p.1).sum::<f64>() / n,
            );
            if (next.0 - centroid.0).abs() > CONVERGENCE_TOL
                || (next.1 - centroid.1).abs() > CONVERGENCE_TOL
            {
                moved = true;
            }
            *centroid = next;
        }

        if !moved {
            tracing::debug!(iterations = iteration + 1, cells, "k-means converged");
            break;
        }
    }

    let result = (0..cells)
        .map(|c| {
            let members: Vec<String> = points
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| p.0.clone())
                .collect();
            let master = points
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .min_by(|(p1, _), (p2, _)| {
                    dist(p1.1, centroids[c])
                        .total_cmp(&dist(p2.1, centroids[c]))
                        .then_with(|| p1.0.cmp(&p2.0))
                })
                .map(|(p, _)| p.0.clone());
            Cell {
                id: c,
                centroid: centroids[c],
                master,
                members,
            }
        })
        .collect();
    Ok(result)
}
