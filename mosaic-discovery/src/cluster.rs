//! Greedy tag-similarity clustering
//!
//! Similarity is the Jaccard index of two tag sets. Seeds are taken in
//! ascending id order and absorb every unassigned asset scoring strictly
//! above the threshold. Output depends only on ids, tags and parameters.

use crate::index::TagIndex;
use crate::model::{Asset, AssetId, Cluster};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// |A ∩ B| / |A ∪ B|; two empty sets score 0
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Cluster all assets, stopping once `max_clusters` clusters exist
///
/// Candidates for a seed come from the tag index: an asset sharing no tag
/// with the seed scores 0 and can never exceed a threshold >= 0. For the
/// same reason an untagged asset only ever forms a singleton, so tagged
/// seeds claim the cap first and untagged singletons fill what is left.
/// Clusters are returned in ascending seed order.
pub fn cluster_assets(
    assets: &BTreeMap<AssetId, Asset>,
    tags: &TagIndex,
    threshold: f64,
    max_clusters: usize,
) -> Vec<Cluster> {
    let mut clusters = Vec::new();
    let mut assigned: HashSet<&AssetId> = HashSet::new();
    let (tagged, untagged): (Vec<_>, Vec<_>) = assets.iter().partition(|(_, a)| !a.tags.is_empty());

    for (seed_id, seed) in tagged {
        if clusters.len() >= max_clusters {
            tracing::debug!(max_clusters, unplaced = assets.len() - assigned.len(), "Cluster limit reached");
            break;
        }
        if assigned.contains(seed_id) {
            continue;
        }
        assigned.insert(seed_id);

        let candidates: BTreeSet<&AssetId> = seed
            .tags
            .iter()
            .flat_map(|tag| tags.get(tag).iter())
            .filter(|id| *id != seed_id && !assigned.contains(id))
            .collect();

        let mut members = vec![seed_id.clone()];
        for id in candidates {
            let Some(candidate) = assets.get(id) else {
                continue;
            };
            if jaccard(&seed.tags, &candidate.tags) > threshold {
                assigned.insert(id);
                members.push(id.clone());
            }
        }
        members.sort();

        clusters.push(Cluster {
            seed: seed_id.clone(),
            members,
            threshold,
        });
    }

    let room = max_clusters.saturating_sub(clusters.len());
    clusters.extend(untagged.into_iter().take(room).map(|(id, _)| Cluster {
        seed: id.clone(),
        members: vec![id.clone()],
        threshold,
    }));
    clusters.sort_by(|a, b| a.seed.cmp(&b.seed));

    clusters
}
