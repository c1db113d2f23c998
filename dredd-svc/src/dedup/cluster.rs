//! Union-find clustering of duplicate pairs

use super::DuplicatePair;
use std::collections::HashMap;
use uuid::Uuid;

/// Groups duplicate pairs into connected components. Singletons cannot occur
/// by construction (every id arrives as half of a pair), so every returned
/// cluster has at least two members.
pub fn cluster_pairs(pairs: &[DuplicatePair]) -> Vec<Vec<Uuid>> {
    if pairs.is_empty() {
        return Vec::new();
    }

    let mut uf = UnionFind::default();
    for pair in pairs {
        uf.union(pair.id_a, pair.id_b);
    }

    let mut groups: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let ids: Vec<Uuid> = uf.parent.keys().copied().collect();
    for id in ids {
        let root = uf.find(id);
        groups.entry(root).or_default().push(id);
    }

    groups
        .into_values()
        .filter(|cluster| cluster.len() > 1)
        .collect()
}

#[derive(Default)]
struct UnionFind {
    parent: HashMap<Uuid, Uuid>,
}

impl UnionFind {
    fn find(&mut self, id: Uuid) -> Uuid {
        let parent = *self.parent.entry(id).or_insert(id);
        if parent == id {
            return id;
        }
        let root = self.find(parent);
        // Path compression
        self.parent.insert(id, root);
        root
    }

    fn union(&mut self, a: Uuid, b: Uuid) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent.insert(root_b, root_a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pair(a: Uuid, b: Uuid, sim: f64) -> DuplicatePair {
        DuplicatePair {
            id_a: a,
            id_b: b,
            similarity: sim,
        }
    }

    fn as_sets(clusters: Vec<Vec<Uuid>>) -> BTreeSet<BTreeSet<Uuid>> {
        clusters
            .into_iter()
            .map(|c| c.into_iter().collect())
            .collect()
    }

    #[test]
    fn transitive_pairs_form_one_cluster() {
        let (a, b, c, d, e) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let pairs = vec![pair(a, b, 0.95), pair(b, c, 0.93), pair(d, e, 0.94)];

        let clusters = as_sets(cluster_pairs(&pairs));
        assert_eq!(clusters.len(), 2);

        let abc: BTreeSet<Uuid> = [a, b, c].into_iter().collect();
        let de: BTreeSet<Uuid> = [d, e].into_iter().collect();
        assert!(clusters.contains(&abc));
        assert!(clusters.contains(&de));
    }

    #[test]
    fn clustering_is_order_independent() {
        let ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let pairs = vec![
            pair(ids[0], ids[1], 0.95),
            pair(ids[1], ids[2], 0.94),
            pair(ids[3], ids[4], 0.93),
            pair(ids[4], ids[5], 0.96),
        ];

        let forward = as_sets(cluster_pairs(&pairs));
        let mut reversed = pairs.clone();
        reversed.reverse();
        let backward = as_sets(cluster_pairs(&reversed));

        assert_eq!(forward, backward);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster_pairs(&[]).is_empty());
    }

    #[test]
    fn single_pair_is_one_cluster_of_two() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let clusters = cluster_pairs(&[pair(a, b, 0.99)]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }
}
