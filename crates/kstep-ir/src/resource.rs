use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identifier of a discrete shared resource (a sector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub i64);

impl ResourceId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ResourceId {
    fn from(value: i64) -> Self {
        ResourceId(value)
    }
}

/// Single-crossing reachability between resources.
///
/// Successor lists keep their declared order; the map is read-only once a
/// scenario is validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjacencyMap {
    edges: IndexMap<ResourceId, Vec<ResourceId>>,
}

impl AdjacencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, T)>,
        T: IntoIterator<Item = i64>,
    {
        let mut map = Self::new();
        for (src, targets) in pairs {
            for dst in targets {
                map.add_edge(ResourceId(src), ResourceId(dst));
            }
        }
        map
    }

    /// Add `src -> dst`, keeping successor order and ignoring duplicates.
    pub fn add_edge(&mut self, src: ResourceId, dst: ResourceId) {
        let succ = self.edges.entry(src).or_default();
        if !succ.contains(&dst) {
            succ.push(dst);
        }
    }

    pub fn successors(&self, src: ResourceId) -> &[ResourceId] {
        self.edges.get(&src).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_source(&self, id: ResourceId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &[ResourceId])> {
        self.edges.iter().map(|(src, dst)| (*src, dst.as_slice()))
    }

    /// Every resource mentioned as a source or a target, sorted.
    pub fn domain(&self) -> Vec<ResourceId> {
        let mut all = BTreeSet::new();
        for (src, targets) in &self.edges {
            all.insert(*src);
            all.extend(targets.iter().copied());
        }
        all.into_iter().collect()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.edges.contains_key(&id) || self.edges.values().any(|t| t.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successors_keep_declared_order_and_skip_duplicates() {
        let mut map = AdjacencyMap::new();
        map.add_edge(ResourceId(11), ResourceId(7));
        map.add_edge(ResourceId(11), ResourceId(5));
        map.add_edge(ResourceId(11), ResourceId(7));
        assert_eq!(map.successors(ResourceId(11)), &[ResourceId(7), ResourceId(5)]);
        assert!(map.successors(ResourceId(99)).is_empty());
    }

    #[test]
    fn domain_includes_targets_without_outgoing_edges() {
        let map = AdjacencyMap::from_pairs([(1, vec![0]), (0, vec![2, 4])]);
        assert_eq!(
            map.domain(),
            vec![ResourceId(0), ResourceId(1), ResourceId(2), ResourceId(4)]
        );
        assert!(map.contains(ResourceId(4)));
        assert!(!map.contains_source(ResourceId(4)));
    }

    #[test]
    fn json_uses_integer_keys() {
        let map = AdjacencyMap::from_pairs([(12, vec![15]), (-1, vec![-1])]);
        let text = serde_json::to_string(&map).unwrap();
        assert_eq!(text, r#"{"12":[15],"-1":[-1]}"#);
        let back: AdjacencyMap = serde_json::from_str(&text).unwrap();
        assert_eq!(back, map);
    }
}
