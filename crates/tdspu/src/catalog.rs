//! THREDDS catalog synthesis. Pure: entries in, node tree out.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::{CatalogConfig, DatasetRoot, ServiceConfig};
use crate::grouping::GroupKey;

/// Something to list in a catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CatalogEntry {
    /// A written aggregation document
    Aggregation {
        key: GroupKey,
        location: std::path::PathBuf,
    },
    /// A data directory exposed file by file
    Scan {
        key: GroupKey,
        location: std::path::PathBuf,
    },
}

impl CatalogEntry {
    #[must_use]
    pub fn key(&self) -> &GroupKey {
        match self {
            CatalogEntry::Aggregation { key, .. } | CatalogEntry::Scan { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CatalogNode {
    Dataset {
        name: String,
        id: String,
        url_path: Option<String>,
        children: Vec<CatalogNode>,
    },
    DatasetScan {
        name: String,
        id: String,
        path: String,
        location: String,
        filter: String,
    },
    CatalogRef {
        title: String,
        href: String,
    },
}

/// A whole catalog document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub name: String,
    pub service: ServiceConfig,
    pub dataset_roots: Vec<DatasetRoot>,
    pub nodes: Vec<CatalogNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CatalogLayout {
    #[default]
    Flat,
    /// One parent dataset per distinct value tuple of these facets
    Nested { by: Vec<String> },
}

impl CatalogLayout {
    #[must_use]
    pub fn nested_by(facets: &[String]) -> Self {
        if facets.is_empty() {
            CatalogLayout::Flat
        } else {
            CatalogLayout::Nested {
                by: facets.to_vec(),
            }
        }
    }
}

/// `location` below `root.location`, as a URL path under `root.path`.
fn url_under(root: Option<&DatasetRoot>, location: &Path) -> String {
    let (prefix, rel) = match root {
        Some(root) => match location.strip_prefix(&root.location) {
            Ok(rel) => (root.path.trim_matches('/'), rel),
            Err(_) => ("", location),
        },
        None => ("", location),
    };
    let rel: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if prefix.is_empty() {
        rel.join("/")
    } else if rel.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{}", rel.join("/"))
    }
}

/// Wildcard include filter of a scan: the filter facet values joined by `_`, then `*`.
///
/// Filter facets missing from the key are skipped. With no filter facets the
/// whole key is used.
#[must_use]
pub fn scan_filter(key: &GroupKey, filter_facets: &[String]) -> String {
    let values: Vec<&str> = if filter_facets.is_empty() {
        key.values().collect()
    } else {
        filter_facets.iter().filter_map(|f| key.get(f)).collect()
    };
    format!("{}*", values.join("_"))
}

/// `ordinal` counts earlier scans of the same key; later ones get an ID suffix.
fn entry_node(entry: &CatalogEntry, ordinal: usize, config: &CatalogConfig) -> CatalogNode {
    let name = entry.key().join(&config.separator);
    match entry {
        CatalogEntry::Aggregation { location, .. } => CatalogNode::Dataset {
            id: name.clone(),
            name,
            url_path: Some(url_under(config.ncml_root.as_ref(), location)),
            children: Vec::new(),
        },
        CatalogEntry::Scan { key, location } => CatalogNode::DatasetScan {
            id: match ordinal {
                0 => format!("{name}{}files", config.separator),
                n => format!("{name}{sep}files{sep}{}", n + 1, sep = config.separator),
            },
            name,
            path: url_under(config.data_root.as_ref(), location),
            location: location.display().to_string(),
            filter: scan_filter(key, &config.filter_facets),
        },
    }
}

/// Build the catalog listing `entries`.
///
/// Entries are ordered by key, aggregations before scans, so the result
/// does not depend on input order.
#[must_use]
pub fn build_catalog(name: &str, entries: &[CatalogEntry], layout: &CatalogLayout, config: &CatalogConfig) -> Catalog {
    let mut sorted: Vec<&CatalogEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.key().cmp(b.key()).then_with(|| a.cmp(b)));

    let mut scans: BTreeMap<&GroupKey, usize> = BTreeMap::new();
    let leaves: Vec<(&CatalogEntry, CatalogNode)> = sorted
        .iter()
        .map(|entry| {
            let ordinal = match entry {
                CatalogEntry::Scan { key, .. } => {
                    let seen = scans.entry(key).or_default();
                    *seen += 1;
                    *seen - 1
                }
                CatalogEntry::Aggregation { .. } => 0,
            };
            (*entry, entry_node(entry, ordinal, config))
        })
        .collect();

    let nodes = match layout {
        CatalogLayout::Flat => leaves.into_iter().map(|(_, node)| node).collect(),
        CatalogLayout::Nested { by } => {
            let mut parents: BTreeMap<Vec<String>, Vec<CatalogNode>> = BTreeMap::new();
            for (entry, node) in leaves {
                let values = by
                    .iter()
                    .map(|f| entry.key().get(f).unwrap_or_default().to_string())
                    .collect();
                parents.entry(values).or_default().push(node);
            }
            parents
                .into_iter()
                .map(|(values, children)| {
                    let name = values.join(&config.separator);
                    CatalogNode::Dataset {
                        id: name.clone(),
                        name,
                        url_path: None,
                        children,
                    }
                })
                .collect()
        }
    };

    let has_aggregations = sorted
        .iter()
        .any(|e| matches!(e, CatalogEntry::Aggregation { .. }));
    let has_scans = sorted.iter().any(|e| matches!(e, CatalogEntry::Scan { .. }));
    let dataset_roots = [
        config.ncml_root.as_ref().filter(|_| has_aggregations),
        config.data_root.as_ref().filter(|_| has_scans),
    ]
    .into_iter()
    .flatten()
    .cloned()
    .collect();

    Catalog {
        name: name.to_string(),
        service: config.service.clone(),
        dataset_roots,
        nodes,
    }
}

/// A single scan over the whole data root, including every `*.{extension}` file.
#[must_use]
pub fn root_scan(config: &CatalogConfig, extension: &str) -> Option<CatalogNode> {
    config.data_root.as_ref().map(|root| CatalogNode::DatasetScan {
        name: config.name.clone(),
        id: format!("{}{}files", config.name, config.separator),
        path: root.path.trim_matches('/').to_string(),
        location: root.location.display().to_string(),
        filter: format!("*.{extension}"),
    })
}

/// Partition entries by their value of `facet`.
#[must_use]
pub fn split_catalog(entries: &[CatalogEntry], facet: &str) -> BTreeMap<String, Vec<CatalogEntry>> {
    let mut split: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
    for entry in entries {
        let value = entry.key().get(facet).unwrap_or_default().to_string();
        split.entry(value).or_default().push(entry.clone());
    }
    split
}

/// A catalog holding only references, `(title, href)` in the given order.
#[must_use]
pub fn catalog_refs(name: &str, refs: &[(String, String)], config: &CatalogConfig) -> Catalog {
    Catalog {
        name: name.to_string(),
        service: config.service.clone(),
        dataset_roots: Vec::new(),
        nodes: refs
            .iter()
            .map(|(title, href)| CatalogNode::CatalogRef {
                title: title.clone(),
                href: href.clone(),
            })
            .collect(),
    }
}
