//! Tag and folder indices
//!
//! Rebuilt wholesale for every store generation from the asset map; never
//! updated in place.

use crate::model::{Asset, AssetId, FolderKey, Source, TagEntry};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Inverted index `tag -> asset ids` (ids ascending)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagIndex {
    entries: BTreeMap<String, Vec<AssetId>>,
}

impl TagIndex {
    /// Build from assets iterated in ascending id order
    pub fn build<'a>(assets: impl IntoIterator<Item = &'a Asset>) -> Self {
        let mut entries: BTreeMap<String, Vec<AssetId>> = BTreeMap::new();
        for asset in assets {
            for tag in &asset.tags {
                entries.entry(tag.clone()).or_default().push(asset.id.clone());
            }
        }
        for ids in entries.values_mut() {
            ids.sort();
            ids.dedup();
        }
        Self { entries }
    }

    /// Ids carrying `tag`; the lookup is case-insensitive and ignores `#`
    pub fn get(&self, tag: &str) -> &[AssetId] {
        crate::model::normalize_tag(tag)
            .and_then(|t| self.entries.get(&t))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All tags by asset count descending, ties by tag name ascending
    pub fn popular(&self) -> Vec<TagEntry> {
        let mut out: Vec<TagEntry> = self
            .entries
            .iter()
            .map(|(tag, ids)| TagEntry {
                tag: tag.clone(),
                asset_count: ids.len(),
                asset_ids: ids.clone(),
            })
            .collect();
        out.sort_by(popularity_order);
        out
    }
}

fn popularity_order(a: &TagEntry, b: &TagEntry) -> Ordering {
    b.asset_count
        .cmp(&a.asset_count)
        .then_with(|| a.tag.cmp(&b.tag))
}

/// One folder node; `parent` is an index into the owning tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    pub name: String,
    pub path: Vec<String>,
    pub parent: Option<usize>,
    /// Ordered by name
    pub children: Vec<usize>,
    /// Assets directly in this folder, ordered by title then id
    pub asset_ids: Vec<AssetId>,
}

/// Folder hierarchy of one source, stored as an arena
///
/// Node 0 is the source root. Nodes are only created from asset folder
/// paths, so the tree is acyclic by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderTree {
    pub source: Source,
    pub nodes: Vec<FolderNode>,
    #[serde(skip)]
    by_path: HashMap<Vec<String>, usize>,
}

impl FolderTree {
    fn new(source: Source) -> Self {
        let mut by_path = HashMap::new();
        by_path.insert(Vec::new(), 0);
        Self {
            source,
            nodes: vec![FolderNode {
                name: String::new(),
                path: Vec::new(),
                parent: None,
                children: Vec::new(),
                asset_ids: Vec::new(),
            }],
            by_path,
        }
    }

    fn ensure_path(&mut self, path: &[String]) -> usize {
        let mut current = 0;
        for depth in 1..=path.len() {
            let prefix = &path[..depth];
            current = match self.by_path.get(prefix) {
                Some(&idx) => idx,
                None => {
                    let idx = self.nodes.len();
                    self.nodes.push(FolderNode {
                        name: prefix[depth - 1].clone(),
                        path: prefix.to_vec(),
                        parent: Some(current),
                        children: Vec::new(),
                        asset_ids: Vec::new(),
                    });
                    self.nodes[current].children.push(idx);
                    self.by_path.insert(prefix.to_vec(), idx);
                    idx
                }
            };
        }
        current
    }

    pub fn root(&self) -> &FolderNode {
        &self.nodes[0]
    }

    pub fn node(&self, path: &[String]) -> Option<&FolderNode> {
        self.by_path.get(path).map(|&idx| &self.nodes[idx])
    }

    pub fn children<'a>(&'a self, node: &'a FolderNode) -> impl Iterator<Item = &'a FolderNode> + 'a {
        node.children.iter().map(move |&idx| &self.nodes[idx])
    }

    pub fn parent(&self, node: &FolderNode) -> Option<&FolderNode> {
        node.parent.map(|idx| &self.nodes[idx])
    }
}

/// Per-source folder trees
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderIndex {
    trees: BTreeMap<Source, FolderTree>,
}

impl FolderIndex {
    pub fn build(assets: &BTreeMap<AssetId, Asset>) -> Self {
        let mut trees: BTreeMap<Source, FolderTree> = BTreeMap::new();

        let mut ordered: Vec<&Asset> = assets.values().collect();
        ordered.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });

        for asset in ordered {
            let tree = trees
                .entry(asset.source)
                .or_insert_with(|| FolderTree::new(asset.source));
            let idx = tree.ensure_path(&asset.folder_path);
            tree.nodes[idx].asset_ids.push(asset.id.clone());
        }

        for tree in trees.values_mut() {
            let names: Vec<String> = tree.nodes.iter().map(|n| n.name.clone()).collect();
            for node in &mut tree.nodes {
                node.children
                    .sort_by(|&a, &b| names[a].cmp(&names[b]).then(a.cmp(&b)));
            }
        }

        Self { trees }
    }

    pub fn tree(&self, source: Source) -> Option<&FolderTree> {
        self.trees.get(&source)
    }

    /// Assets directly inside one folder
    pub fn assets_in(&self, source: Source, path: &[String]) -> &[AssetId] {
        self.trees
            .get(&source)
            .and_then(|t| t.node(path))
            .map(|n| n.asset_ids.as_slice())
            .unwrap_or(&[])
    }

    /// Non-root folders holding assets, by direct asset count descending,
    /// ties by key ascending
    pub fn by_size(&self) -> Vec<(FolderKey, &FolderNode)> {
        let mut out: Vec<(FolderKey, &FolderNode)> = self
            .trees
            .iter()
            .flat_map(|(source, tree)| {
                tree.nodes
                    .iter()
                    .skip(1)
                    .filter(|n| !n.asset_ids.is_empty())
                    .map(move |n| (FolderKey::new(*source, n.path.clone()), n))
            })
            .collect();
        out.sort_by(|(ka, a), (kb, b)| {
            b.asset_ids
                .len()
                .cmp(&a.asset_ids.len())
                .then_with(|| ka.cmp(kb))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{normalize_tags, AssetKind, Locator};
    use chrono::{TimeZone, Utc};

    fn asset(source: Source, key: &str, title: &str, folder: &[&str], tags: &[&str]) -> Asset {
        Asset {
            id: AssetId::derive(source, key),
            source,
            kind: AssetKind::Image,
            title: title.to_string(),
            tags: normalize_tags(tags.iter()),
            folder_path: folder.iter().map(|s| s.to_string()).collect(),
            locator: Locator::Url(format!("https://x/{}", key)),
            thumbnail_ref: None,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    fn map(assets: Vec<Asset>) -> BTreeMap<AssetId, Asset> {
        assets.into_iter().map(|a| (a.id.clone(), a)).collect()
    }

    #[test]
    fn test_popular_tags_tie_break() {
        let mut assets = Vec::new();
        for i in 0..5 {
            assets.push(asset(Source::Local, &format!("a{}", i), "x", &[], &["a", "b"]));
        }
        for i in 0..3 {
            assets.push(asset(Source::Local, &format!("c{}", i), "x", &[], &["c"]));
        }
        let assets = map(assets);
        let popular = TagIndex::build(assets.values()).popular();
        let order: Vec<(&str, usize)> = popular.iter().map(|e| (e.tag.as_str(), e.asset_count)).collect();
        assert_eq!(order, vec![("a", 5), ("b", 5), ("c", 3)]);
    }

    #[test]
    fn test_tag_lookup_is_normalized() {
        let assets = map(vec![asset(Source::Local, "k", "x", &[], &["Sky"])]);
        let index = TagIndex::build(assets.values());
        assert_eq!(index.get("#SKY").len(), 1);
        assert!(index.get("sea").is_empty());
    }

    #[test]
    fn test_folder_tree_structure_and_order() {
        let assets = map(vec![
            asset(Source::Local, "1", "zebra", &["trips", "2023"], &[]),
            asset(Source::Local, "2", "apple", &["trips", "2023"], &[]),
            asset(Source::Local, "3", "root file", &[], &[]),
            asset(Source::Local, "4", "x", &["art"], &[]),
            asset(Source::Bookmark, "5", "y", &["trips"], &[]),
        ]);
        let index = FolderIndex::build(&assets);

        let local = index.tree(Source::Local).unwrap();
        let names: Vec<_> = local.children(local.root()).map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["art", "trips"]);

        let year = local.node(&["trips".to_string(), "2023".to_string()]).unwrap();
        let trips = local.parent(year).unwrap();
        assert_eq!(trips.name, "trips");
        let under_trips: Vec<_> = local.children(trips).map(|n| n.name.as_str()).collect();
        assert_eq!(under_trips, vec!["2023"]);
        assert_eq!(local.children(year).count(), 0);

        let titles: Vec<_> = year.asset_ids.iter().map(|id| assets[id].title.as_str()).collect();
        assert_eq!(titles, vec!["apple", "zebra"]);

        // Folders are scoped per source
        assert_eq!(index.assets_in(Source::Bookmark, &["trips".to_string()]).len(), 1);
        assert!(index.assets_in(Source::Local, &["trips".to_string()]).is_empty());
        assert_eq!(index.assets_in(Source::Local, &[]).len(), 1);
    }

    #[test]
    fn test_folders_by_size() {
        let assets = map(vec![
            asset(Source::Local, "1", "a", &["big"], &[]),
            asset(Source::Local, "2", "b", &["big"], &[]),
            asset(Source::Local, "3", "c", &["small"], &[]),
            asset(Source::AssetManager, "4", "d", &["alpha"], &[]),
        ]);
        let index = FolderIndex::build(&assets);
        let order: Vec<String> = index.by_size().iter().map(|(k, _)| k.display()).collect();
        assert_eq!(order, vec!["local:/big", "local:/small", "asset-manager:/alpha"]);
    }
}
