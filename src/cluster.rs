use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::AnalyticsConfig;
use crate::models::{Column, RecordSet, RegionCluster};

const MAX_ITERATIONS: usize = 300;

/// Region x skill occurrence matrix. Rows and columns are sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionProfiles {
    pub regions: Vec<String>,
    pub skills: Vec<String>,
    pub counts: Vec<Vec<f64>>,
}

impl RegionProfiles {
    pub fn build(records: &RecordSet) -> Self {
        let mut per_region: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
        let mut skills: BTreeSet<&str> = BTreeSet::new();

        // regions enter the matrix only through a usable tag
        for record in &records.records {
            for tag in &record.skill_tags {
                let tag = tag.trim();
                if tag.is_empty() {
                    continue;
                }
                let row = per_region.entry(record.region.as_str()).or_default();
                *row.entry(tag).or_insert(0.0) += 1.0;
                skills.insert(tag);
            }
        }

        let skills: Vec<&str> = skills.into_iter().collect();
        let counts = per_region
            .values()
            .map(|row| {
                skills
                    .iter()
                    .map(|skill| row.get(skill).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        RegionProfiles {
            regions: per_region.keys().map(|r| r.to_string()).collect(),
            skills: skills.into_iter().map(str::to_string).collect(),
            counts,
        }
    }

    pub fn count(&self, region: &str, skill: &str) -> Option<f64> {
        let row = self.regions.iter().position(|r| r == region)?;
        let col = self.skills.iter().position(|s| s == skill)?;
        Some(self.counts[row][col])
    }
}

#[derive(Debug, Clone)]
struct Partition {
    labels: Vec<usize>,
    inertia: f64,
}

pub fn cluster_regions(records: &RecordSet, config: &AnalyticsConfig) -> Vec<RegionCluster> {
    if !records.has(Column::Region) || !records.has(Column::SkillTags) {
        debug!("region or skill_tags column absent, skipping clustering");
        return Vec::new();
    }

    let profiles = RegionProfiles::build(records);
    let k = config.n_clusters.min(profiles.regions.len());
    if k == 0 {
        return Vec::new();
    }

    let restarts = config.cluster_restarts.max(1);
    let best = (0..restarts)
        .into_par_iter()
        .map(|restart| kmeans(&profiles.counts, k, config.cluster_seed.wrapping_add(restart as u64)))
        .collect::<Vec<_>>()
        .into_iter()
        .min_by(|a, b| a.inertia.total_cmp(&b.inertia))
        .map(|partition| canonical_labels(&partition.labels))
        .unwrap_or_default();

    let cluster_count = best.iter().max().map_or(0, |max| max + 1);
    let top_skills: Vec<Vec<String>> = (0..cluster_count)
        .map(|cluster| top_skills_for(&profiles, &best, cluster, config.cluster_top_skills))
        .collect();

    info!(
        regions = profiles.regions.len(),
        skills = profiles.skills.len(),
        k,
        clusters = cluster_count,
        "clustered regions"
    );

    profiles
        .regions
        .iter()
        .zip(&best)
        .map(|(region, &cluster_id)| RegionCluster {
            region: region.clone(),
            cluster_id,
            top_skills: top_skills[cluster_id].clone(),
        })
        .collect()
}

fn top_skills_for(profiles: &RegionProfiles, labels: &[usize], cluster: usize, n: usize) -> Vec<String> {
    let mut totals = vec![0.0; profiles.skills.len()];
    for (row, _) in labels.iter().enumerate().filter(|(_, label)| **label == cluster) {
        for (total, count) in totals.iter_mut().zip(&profiles.counts[row]) {
            *total += count;
        }
    }

    let mut ranked: Vec<(usize, f64)> = totals
        .into_iter()
        .enumerate()
        .filter(|(_, total)| *total > 0.0)
        .collect();
    // skills are already in name order, so a stable sort breaks ties alphabetically
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .take(n)
        .map(|(col, _)| profiles.skills[col].clone())
        .collect()
}

/// Renumber clusters by first appearance so ids do not depend on centroid order.
fn canonical_labels(labels: &[usize]) -> Vec<usize> {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    labels
        .iter()
        .map(|label| {
            let next = mapping.len();
            *mapping.entry(*label).or_insert(next)
        })
        .collect()
}

fn kmeans(points: &[Vec<f64>], k: usize, seed: u64) -> Partition {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = init_centroids(points, k, &mut rng);
    let mut labels = vec![usize::MAX; points.len()];

    for iteration in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let nearest = nearest_centroid(point, &centroids).0;
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            debug!(seed, iteration, "k-means converged");
            break;
        }
        centroids = recompute_centroids(points, &labels, &centroids);
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(point, &label)| squared_distance(point, &centroids[label]))
        .sum();
    Partition { labels, inertia }
}

/// k-means++ seeding: each new centre is drawn with probability
/// proportional to its squared distance from the nearest chosen centre.
fn init_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())].clone()];
    while centroids.len() < k {
        let distances: Vec<f64> = points
            .iter()
            .map(|point| nearest_centroid(point, &centroids).1)
            .collect();
        let total: f64 = distances.iter().sum();
        let pick = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            distances
                .iter()
                .position(|d| {
                    target -= d;
                    target < 0.0
                })
                .unwrap_or(points.len() - 1)
        } else {
            rng.gen_range(0..points.len())
        };
        centroids.push(points[pick].clone());
    }
    centroids
}

fn recompute_centroids(points: &[Vec<f64>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dims = points.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dims]; previous.len()];
    let mut sizes = vec![0usize; previous.len()];
    for (point, &label) in points.iter().zip(labels) {
        sizes[label] += 1;
        for (sum, value) in sums[label].iter_mut().zip(point) {
            *sum += value;
        }
    }

    let mut centroids: Vec<Vec<f64>> = sums
        .into_iter()
        .zip(&sizes)
        .zip(previous)
        .map(|((sum, &size), old)| {
            if size == 0 {
                old.clone()
            } else {
                sum.into_iter().map(|v| v / size as f64).collect()
            }
        })
        .collect();

    // An empty cluster takes over the point farthest from its current centre.
    for cluster in (0..centroids.len()).filter(|&c| sizes[c] == 0) {
        let farthest = points
            .iter()
            .zip(labels)
            .map(|(point, &label)| squared_distance(point, &centroids[label]))
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((idx, distance)) = farthest {
            if distance > 0.0 {
                centroids[cluster] = points[idx].clone();
            }
        }
    }
    centroids
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(idx, centroid)| (idx, squared_distance(point, centroid)))
        .fold((0, f64::INFINITY), |best, candidate| {
            if candidate.1 < best.1 {
                candidate
            } else {
                best
            }
        })
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
