//! Orchestration: inventory, grouping, synthesis, rendering and writing.
//!
//! Fatal conditions (no files, a schema matching nothing) return `Err`.
//! Failures of single outputs are recorded in the [`RunReport`] and the
//! remaining outputs are still written.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::aggregation::synthesize;
use crate::catalog::{CatalogEntry, CatalogLayout, build_catalog, catalog_refs, root_scan, split_catalog};
use crate::config::{CatalogConfig, DatasetRoot, RunConfig};
use crate::error::{Error, Result};
use crate::grouping::{AggregationGroup, FixedFieldIndex, Grouping, group};
use crate::inventory::{Inventory, InventoryOptions, build_inventory};
use crate::output::{PathTemplate, write_atomic};
use crate::reader::ArrayReader;
use crate::render::Renderer;
use crate::report::RunReport;
use crate::walk::FileEnumerator;

/// What the `catalog` run lists and how.
#[derive(Debug, Clone, Default)]
pub struct CatalogRun {
    /// Directory holding previously written aggregation documents
    pub ncml_dir: Option<PathBuf>,
    /// Expose each group's data directory with a datasetScan
    pub scan: bool,
    pub layout: CatalogLayout,
    /// Write one catalog per value of this facet plus a root of references
    pub split_by: Option<String>,
}

impl CatalogRun {
    /// Layout and split facets must be grouping facets.
    pub fn validate(&self, config: &RunConfig) -> Result<()> {
        let facets = &config.grouping.facets;
        if let CatalogLayout::Nested { by } = &self.layout {
            if let Some(unknown) = by.iter().find(|f| !facets.contains(*f)) {
                return Err(Error::unknown_facet(unknown, "catalog nesting (not a grouping facet)"));
            }
        }
        if let Some(split) = &self.split_by {
            if !facets.contains(split) {
                return Err(Error::unknown_facet(split, "catalog split (not a grouping facet)"));
            }
        }
        Ok(())
    }
}

pub struct Pipeline {
    config: RunConfig,
    renderer: Renderer,
    reader: Arc<dyn ArrayReader>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(config: RunConfig, renderer: Renderer, reader: Arc<dyn ArrayReader>) -> Self {
        Self {
            config,
            renderer,
            reader,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Build the inventory of `root` and refuse to go on with nothing usable.
    pub async fn inventory(
        &self,
        root: &Path,
        enumerator: &dyn FileEnumerator,
        read_time: bool,
    ) -> Result<Inventory> {
        let mut options = InventoryOptions::from_config(&self.config);
        if !read_time {
            options = options.without_time();
        }
        let inventory = build_inventory(root, enumerator, self.reader.clone(), &options).await?;
        inventory.ensure_usable()?;
        Ok(inventory)
    }

    fn group_records<'a>(&self, inventory: &'a Inventory, report: &mut RunReport) -> Grouping<'a> {
        let grouping = group(
            &inventory.records,
            self.config.grouping.strategy,
            &self.config.grouping.facets,
            &self.config.fixed(),
        );
        report.groups = grouping.len();
        report.fixed = grouping.fixed.len();
        grouping
    }

    fn document_path(&self, group: &AggregationGroup<'_>, dest: &Path) -> Result<PathBuf> {
        let rel = PathTemplate::new(&self.config.output.ncml).expand(&group.facets())?;
        Ok(dest.join(rel))
    }

    fn write_group(
        &self,
        group: &AggregationGroup<'_>,
        index: &FixedFieldIndex<'_>,
        path: &Path,
        report: &mut RunReport,
    ) -> Result<()> {
        let synthesis = synthesize(
            group,
            index.match_fixed(group),
            &self.config.grouping.aggregation_facets,
            &self.config.catalog.separator,
        );
        let xml = self
            .renderer
            .render(&self.config.output.template, &synthesis.descriptor.context())?;
        write_atomic(path, xml.as_bytes())?;

        for notice in &synthesis.notices {
            report.record_notice(&synthesis.descriptor.name, notice);
        }
        Ok(())
    }

    /// Write one aggregation document per group under `dest`.
    ///
    /// A group whose document path was already taken by an earlier group
    /// is a failure; the earlier document is kept. Returns catalog entries
    /// for the documents that were written.
    pub fn write_aggregations(&self, inventory: &Inventory, dest: &Path, report: &mut RunReport) -> Vec<CatalogEntry> {
        let grouping = self.group_records(inventory, report);
        let index = FixedFieldIndex::build(
            &grouping.fixed,
            self.config.grouping.strategy,
            &self.config.grouping.facets,
            &self.config.match_rules(),
        );

        let mut entries = Vec::new();
        let mut claimed: BTreeMap<PathBuf, String> = BTreeMap::new();
        for group in grouping.iter() {
            let name = group.name(&self.config.catalog.separator);
            let path = match self.document_path(group, dest) {
                Ok(path) => path,
                Err(e) => {
                    report.record_failure(&name, &e);
                    continue;
                }
            };
            if let Some(owner) = claimed.get(&path) {
                let reason = format!("path already written for group {owner}");
                report.record_failure(&name, &Error::output_write(&path, reason));
                continue;
            }
            _ = claimed.insert(path.clone(), name.clone());
            match self.write_group(group, &index, &path, report) {
                Ok(()) => {
                    report.written.push(path.clone());
                    entries.push(CatalogEntry::Aggregation {
                        key: group.key.clone(),
                        location: path,
                    });
                }
                Err(e) => report.record_failure(&name, &e),
            }
        }
        entries
    }

    /// Catalog entries for the groups of `inventory`, without writing documents.
    ///
    /// Aggregation entries are listed only where the document already exists
    /// under `run.ncml_dir`.
    pub fn catalog_entries(&self, inventory: &Inventory, run: &CatalogRun, report: &mut RunReport) -> Vec<CatalogEntry> {
        let grouping = self.group_records(inventory, report);
        let mut entries = Vec::new();
        for group in grouping.iter() {
            let name = group.name(&self.config.catalog.separator);
            if let Some(ncml_dir) = &run.ncml_dir {
                match self.document_path(group, ncml_dir) {
                    Ok(path) if path.is_file() => entries.push(CatalogEntry::Aggregation {
                        key: group.key.clone(),
                        location: path,
                    }),
                    Ok(path) => report.record_notice(&name, &Error::DocumentMissing { path }),
                    Err(e) => report.record_failure(&name, &e),
                }
            }
            if run.scan {
                // Grouping facets may leave out DRS levels, spreading members over directories.
                let dirs: BTreeSet<&Path> = group.members.iter().filter_map(|m| m.path.parent()).collect();
                for dir in dirs {
                    entries.push(CatalogEntry::Scan {
                        key: group.key.clone(),
                        location: dir.to_path_buf(),
                    });
                }
            }
        }
        entries
    }

    fn write_one_catalog(&self, catalog: &crate::catalog::Catalog, path: &Path, report: &mut RunReport) {
        let result = self
            .renderer
            .render(&self.config.catalog.template, catalog)
            .and_then(|xml| write_atomic(path, xml.as_bytes()));
        match result {
            Ok(()) => report.written.push(path.to_path_buf()),
            Err(e) => report.record_failure(&catalog.name, &e),
        }
    }

    /// The catalog configuration with unset dataset roots served from where
    /// the documents and the data actually are.
    ///
    /// A missing `ncml_root` is rooted at `ncml_dir` under the catalog name;
    /// a missing `data_root` at `data_dir` under `{name}{separator}data`.
    #[must_use]
    pub fn catalog_config(&self, ncml_dir: Option<&Path>, data_dir: &Path) -> CatalogConfig {
        let mut cfg = self.config.catalog.clone();
        if cfg.ncml_root.is_none() {
            cfg.ncml_root = ncml_dir.map(|dir| DatasetRoot {
                path: cfg.name.clone(),
                location: dir.to_path_buf(),
            });
        }
        if cfg.data_root.is_none() {
            cfg.data_root = Some(DatasetRoot {
                path: format!("{}{}data", cfg.name, cfg.separator),
                location: data_dir.to_path_buf(),
            });
        }
        cfg
    }

    /// Render and write the catalog(s) for `entries` under `dest`.
    pub fn write_catalogs(
        &self,
        entries: &[CatalogEntry],
        dest: &Path,
        run: &CatalogRun,
        cfg: &CatalogConfig,
        report: &mut RunReport,
    ) {
        let file = &cfg.file;

        let mut root = match &run.split_by {
            None => build_catalog(&cfg.name, entries, &run.layout, cfg),
            Some(facet) => {
                let mut refs = Vec::new();
                for (value, part) in split_catalog(entries, facet) {
                    let name = format!("{}{}{}", cfg.name, cfg.separator, value);
                    let child = build_catalog(&name, &part, &run.layout, cfg);
                    self.write_one_catalog(&child, &dest.join(&value).join(file), report);
                    refs.push((value.clone(), format!("{value}/{file}")));
                }
                catalog_refs(&cfg.name, &refs, cfg)
            }
        };
        if cfg.scan_root {
            root.nodes.extend(root_scan(cfg, &self.config.extension));
            root.dataset_roots.extend(cfg.data_root.iter().cloned());
            root.dataset_roots.dedup();
        }
        self.write_one_catalog(&root, &dest.join(file), report);
    }

    /// Inventory `root` and write aggregation documents, optionally with a catalog.
    pub async fn run_ncml(
        &self,
        root: &Path,
        enumerator: &dyn FileEnumerator,
        dest: &Path,
        catalog: Option<&CatalogRun>,
    ) -> Result<RunReport> {
        if let Some(run) = catalog {
            run.validate(&self.config)?;
        }
        let inventory = self.inventory(root, enumerator, true).await?;
        let mut report = RunReport::from_inventory(&inventory);
        let entries = self.write_aggregations(&inventory, dest, &mut report);
        if let Some(run) = catalog {
            let cfg = self.catalog_config(Some(dest), root);
            self.write_catalogs(&entries, dest, run, &cfg, &mut report);
        }
        Ok(report)
    }

    /// Inventory `root` without reading time axes and write catalogs.
    pub async fn run_catalog(
        &self,
        root: &Path,
        enumerator: &dyn FileEnumerator,
        dest: &Path,
        run: &CatalogRun,
    ) -> Result<RunReport> {
        run.validate(&self.config)?;
        let inventory = self.inventory(root, enumerator, false).await?;
        let mut report = RunReport::from_inventory(&inventory);
        let entries = self.catalog_entries(&inventory, run, &mut report);
        let cfg = self.catalog_config(run.ncml_dir.as_deref(), root);
        self.write_catalogs(&entries, dest, run, &cfg, &mut report);
        Ok(report)
    }
}
