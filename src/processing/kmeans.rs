//! Seeded k-means clustering over embedding vectors.
//!
//! Centroids are initialised with k-means++ and refined with Lloyd iterations under Euclidean
//! distance. The same input, `k`, and seed always produce the same labels.

use rand::{Rng, SeedableRng, rngs::StdRng};

const MAX_ITERATIONS: usize = 300;
const TOLERANCE: f64 = 1e-4;

/// Assign each point a cluster label in `0..k`.
///
/// `k` is capped at the number of points; an empty input or `k == 0` yields no labels.
/// All points must share one dimensionality.
pub(crate) fn cluster(points: &[Vec<f32>], k: usize, seed: u64) -> Vec<usize> {
    let k = k.min(points.len());
    if k == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = initial_centroids(points, k, &mut rng);
    let mut labels = vec![0; points.len()];

    for iteration in 0..MAX_ITERATIONS {
        for (label, point) in labels.iter_mut().zip(points) {
            *label = nearest(point, &centroids).0;
        }

        let updated = recompute_centroids(points, &labels, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| squared_distance(old, new))
            .sum();
        centroids = updated;

        if shift <= TOLERANCE {
            tracing::trace!(iterations = iteration + 1, "k-means converged");
            break;
        }
    }

    for (label, point) in labels.iter_mut().zip(points) {
        *label = nearest(point, &centroids).0;
    }
    labels
}

fn initial_centroids(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(to_f64(&points[rng.gen_range(0..points.len())]));

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|point| nearest(point, &centroids).1)
            .collect();
        let total: f64 = weights.iter().sum();

        let chosen = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            weights
                .iter()
                .position(|weight| {
                    target -= weight;
                    target < 0.0
                })
                .unwrap_or(points.len() - 1)
        } else {
            // Every point coincides with a centroid.
            rng.gen_range(0..points.len())
        };
        centroids.push(to_f64(&points[chosen]));
    }
    centroids
}

fn recompute_centroids(points: &[Vec<f32>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dimension = previous.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dimension]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (sum, value) in sums[label].iter_mut().zip(point) {
            *sum += f64::from(*value);
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), old)| {
            if count == 0 {
                old.clone()
            } else {
                sum.into_iter().map(|value| value / count as f64).collect()
            }
        })
        .collect()
}

/// Index of and squared distance to the closest centroid.
fn nearest(point: &[f32], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (index, centroid) in centroids.iter().enumerate() {
        let distance: f64 = point
            .iter()
            .zip(centroid)
            .map(|(value, center)| (f64::from(*value) - center).powi(2))
            .sum();
        if distance < best.1 {
            best = (index, distance);
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn to_f64(point: &[f32]) -> Vec<f64> {
    point.iter().copied().map(f64::from).collect()
}
