//! Run configuration.
//!
//! ```yaml
//! drs: [project, product, institute, model, experiment, frequency, realm, table, ensemble, version, variable]
//! extension: nc
//! fixed_variables: [areacella, orog, sftlf]
//! exclude:
//!   realm: [seaIce]
//!
//! grouping:
//!   strategy: drs
//!   facets: [project, model, experiment, table, ensemble, variable]
//!   aggregation_facets: []
//!
//! matching:
//!   temporal: [frequency, table]
//!   ignore: [version]
//!   projects:
//!     CMIP5:
//!       ignore: [ensemble]
//!
//! output:
//!   ncml: "{project}/{model}/{project}_{model}_{experiment}_{table}_{ensemble}_{variable}.ncml"
//!   template: esgf.ncml.xml
//!
//! catalog:
//!   name: cmip5
//!   ncml_root: { path: ncml, location: /srv/ncml }
//!   data_root: { path: data, location: /srv/data }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::facet::Drs;
use crate::grouping::{FixedVariables, GroupingStrategy, MatchRules};
use crate::output::PathTemplate;

/// Everything a run needs besides the root directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default = "default_drs")]
    pub drs: Drs,
    /// File extension of candidate data files, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_variable_facet")]
    pub variable_facet: String,
    #[serde(default = "default_project_facet")]
    pub project_facet: String,
    /// Time-invariant variables; their files are attached rather than aggregated
    #[serde(default = "default_fixed_variables")]
    pub fixed_variables: BTreeSet<String>,
    /// Facet values whose files are never read
    #[serde(default)]
    pub exclude: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Upper bound on concurrent metadata reads
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupingConfig {
    #[serde(default)]
    pub strategy: GroupingStrategy,
    /// Facets whose values identify one aggregation document
    #[serde(default = "default_grouping_facets")]
    pub facets: Vec<String>,
    /// Finer partition inside a document, one joinExisting aggregation each
    #[serde(default)]
    pub aggregation_facets: Vec<String>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            strategy: GroupingStrategy::default(),
            facets: default_grouping_facets(),
            aggregation_facets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Facets that distinguish time sampling; fixed files match across them
    #[serde(default = "default_temporal")]
    pub temporal: Vec<String>,
    /// Facets ignored for every project
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
    /// Extra ignored facets keyed by project facet value
    #[serde(default = "default_project_rules")]
    pub projects: BTreeMap<String, ProjectRule>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            temporal: default_temporal(),
            ignore: default_ignore(),
            projects: default_project_rules(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectRule {
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Aggregation document path, relative to the destination directory
    #[serde(default = "default_ncml_template")]
    pub ncml: String,
    /// Renderer template for aggregation documents
    #[serde(default = "default_aggregation_template")]
    pub template: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ncml: default_ncml_template(),
            template: default_aggregation_template(),
        }
    }
}

/// A `datasetRoot` declaration: the URL path prefix served from a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetRoot {
    pub path: String,
    pub location: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Service {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_compound")]
    pub service_type: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "all".to_string(),
            service_type: default_compound(),
            base: String::new(),
            services: vec![
                Service {
                    name: "odap".to_string(),
                    service_type: "OpenDAP".to_string(),
                    base: "/thredds/dodsC/".to_string(),
                },
                Service {
                    name: "http".to_string(),
                    service_type: "HTTPServer".to_string(),
                    base: "/thredds/fileServer/".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_name")]
    pub name: String,
    #[serde(default = "default_catalog_template")]
    pub template: String,
    /// Catalog document name; split catalogs put one per facet-value directory
    #[serde(default = "default_catalog_file")]
    pub file: String,
    /// Joins facet values into dataset names
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Facets whose values, joined by `_`, prefix a datasetScan filter
    #[serde(default = "default_filter_facets")]
    pub filter_facets: Vec<String>,
    #[serde(default)]
    pub nest_by: Vec<String>,
    /// Add one datasetScan over the whole data root
    #[serde(default)]
    pub scan_root: bool,
    #[serde(default)]
    pub service: ServiceConfig,
    pub ncml_root: Option<DatasetRoot>,
    pub data_root: Option<DatasetRoot>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            name: default_catalog_name(),
            template: default_catalog_template(),
            file: default_catalog_file(),
            separator: default_separator(),
            filter_facets: default_filter_facets(),
            nest_by: Vec::new(),
            scan_root: false,
            service: ServiceConfig::default(),
            ncml_root: None,
            data_root: None,
        }
    }
}

fn default_drs() -> Drs {
    Drs::parse("project/product/institute/model/experiment/frequency/realm/table/ensemble/version/variable")
}

fn default_extension() -> String {
    "nc".to_string()
}

fn default_variable_facet() -> String {
    "variable".to_string()
}

fn default_project_facet() -> String {
    "project".to_string()
}

fn default_fixed_variables() -> BTreeSet<String> {
    [
        "areacella", "areacello", "basin", "deptho", "hfgeou", "mrsofc", "orog", "rootd",
        "sftgif", "sftlf", "sftof", "thkcello", "volcello",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_grouping_facets() -> Vec<String> {
    default_drs().facets().to_vec()
}

fn default_temporal() -> Vec<String> {
    vec!["frequency".to_string(), "table".to_string()]
}

fn default_ignore() -> Vec<String> {
    vec!["version".to_string()]
}

fn default_project_rules() -> BTreeMap<String, ProjectRule> {
    BTreeMap::from([(
        "CMIP5".to_string(),
        ProjectRule {
            ignore: vec!["ensemble".to_string()],
        },
    )])
}

fn default_ncml_template() -> String {
    "{project}/{model}/{experiment}/{project}_{product}_{institute}_{model}_{experiment}_{frequency}_{realm}_{table}_{ensemble}_{version}_{variable}.ncml"
        .to_string()
}

fn default_aggregation_template() -> String {
    crate::render::AGGREGATION_TEMPLATE.to_string()
}

fn default_catalog_name() -> String {
    "tdspu".to_string()
}

fn default_catalog_template() -> String {
    crate::render::CATALOG_TEMPLATE.to_string()
}

fn default_catalog_file() -> String {
    "catalog.xml".to_string()
}

fn default_separator() -> String {
    "_".to_string()
}

fn default_filter_facets() -> Vec<String> {
    vec!["variable".to_string(), "table".to_string()]
}

fn default_compound() -> String {
    "Compound".to_string()
}

fn default_concurrency() -> usize {
    8
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            drs: default_drs(),
            extension: default_extension(),
            variable_facet: default_variable_facet(),
            project_facet: default_project_facet(),
            fixed_variables: default_fixed_variables(),
            exclude: BTreeMap::new(),
            grouping: GroupingConfig::default(),
            matching: MatchingConfig::default(),
            output: OutputConfig::default(),
            catalog: CatalogConfig::default(),
            concurrency: default_concurrency(),
        }
    }
}

impl RunConfig {
    /// Parse and validate YAML configuration text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Reject configurations that could only fail later, file by file.
    pub fn validate(&self) -> Result<()> {
        if self.drs.is_empty() {
            return Err(Error::config("drs must name at least one facet"));
        }
        if self.concurrency == 0 {
            return Err(Error::config("concurrency must be greater than 0"));
        }
        if self.grouping.facets.is_empty() {
            return Err(Error::config("grouping.facets must not be empty"));
        }

        self.require_drs(&self.variable_facet, "variable_facet")?;
        for facet in self.exclude.keys() {
            self.require_drs(facet, "exclude")?;
        }
        if self.grouping.strategy == GroupingStrategy::Drs {
            for facet in &self.grouping.facets {
                self.require_drs(facet, "grouping.facets")?;
            }
        }
        for facet in &self.grouping.aggregation_facets {
            self.require_drs(facet, "grouping.aggregation_facets")?;
        }
        for facet in self.catalog.nest_by.iter().chain(&self.catalog.filter_facets) {
            if !self.grouping.facets.contains(facet) {
                return Err(Error::unknown_facet(facet, "catalog (not a grouping facet)"));
            }
        }

        let placeholders = PathTemplate::new(&self.output.ncml).placeholders();
        for facet in &placeholders {
            if !self.drs.contains(facet) && !self.grouping.facets.contains(facet) {
                return Err(Error::unknown_facet(facet, "output.ncml"));
            }
        }
        // Each group needs its own document.
        if let Some(missing) = self.grouping.facets.iter().find(|f| !placeholders.contains(*f)) {
            return Err(Error::config(format!(
                "output.ncml '{}' does not use grouping facet '{missing}'",
                self.output.ncml
            )));
        }
        if self.catalog.file.is_empty() || !PathTemplate::new(&self.catalog.file).placeholders().is_empty() {
            return Err(Error::config("catalog.file must be a plain file name"));
        }
        Ok(())
    }

    fn require_drs(&self, facet: &str, context: &str) -> Result<()> {
        if self.drs.contains(facet) {
            Ok(())
        } else {
            Err(Error::unknown_facet(facet, format!("{context} (DRS is {})", self.drs)))
        }
    }

    #[must_use]
    pub fn fixed(&self) -> FixedVariables {
        FixedVariables::new(&self.variable_facet, self.fixed_variables.iter().cloned())
    }

    #[must_use]
    pub fn match_rules(&self) -> MatchRules {
        MatchRules {
            temporal: self.matching.temporal.clone(),
            ignore: self.matching.ignore.clone(),
            variable_facet: self.variable_facet.clone(),
            project_facet: self.project_facet.clone(),
            projects: self
                .matching
                .projects
                .iter()
                .map(|(project, rule)| (project.clone(), rule.ignore.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RunConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.drs.len(), 11);
        assert!(config.fixed_variables.contains("areacella"));
        assert_eq!(config.grouping.strategy, GroupingStrategy::Drs);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
drs: [project, model, table, variable]
grouping:
  facets: [project, model, table, variable]
output:
  ncml: "{project}/{model}_{table}_{variable}.ncml"
catalog:
  filter_facets: [variable, table]
"#;
        let config = RunConfig::from_yaml(yaml).expect("valid");
        assert_eq!(config.drs.facets(), ["project", "model", "table", "variable"]);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.catalog.separator, "_");
    }

    #[test]
    fn test_unknown_strategy_fails_at_parse() {
        let yaml = r#"
drs: [table, variable]
grouping:
  strategy: by-vibes
  facets: [table, variable]
output:
  ncml: "{table}_{variable}.ncml"
"#;
        let err = RunConfig::from_yaml(yaml).expect_err("unknown strategy");
        let msg = err.to_string();
        assert!(msg.contains("by-vibes"), "{msg}");
        assert!(msg.contains("filename-tokens"), "{msg}");
    }

    #[test]
    fn test_grouping_facet_outside_drs() {
        let yaml = r#"
drs: [table, variable]
grouping:
  facets: [model, variable]
output:
  ncml: "{variable}.ncml"
catalog:
  filter_facets: [variable]
"#;
        let err = RunConfig::from_yaml(yaml).expect_err("model is not in the DRS");
        assert!(matches!(err, Error::UnknownFacet { ref facet, .. } if facet == "model"));
    }

    #[test]
    fn test_output_template_checked() {
        let yaml = r#"
drs: [table, variable]
grouping:
  facets: [table, variable]
output:
  ncml: "{institute}/{variable}.ncml"
catalog:
  filter_facets: []
"#;
        let err = RunConfig::from_yaml(yaml).expect_err("institute unknown");
        assert!(err.to_string().contains("output.ncml"));
    }

    #[test]
    fn test_output_template_must_separate_groups() {
        let yaml = r#"
drs: [table, variable]
grouping:
  facets: [table, variable]
output:
  ncml: "{variable}.ncml"
"#;
        let err = RunConfig::from_yaml(yaml).expect_err("day and mon would share tas.ncml");
        assert_eq!(err.kind(), "ConfigError");
        assert!(err.to_string().contains("grouping facet 'table'"), "{err}");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(RunConfig::from_yaml("drss: [a]").is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let yaml = r#"
drs: [table, variable]
grouping:
  facets: [table, variable]
output:
  ncml: "{table}.ncml"
concurrency: 0
"#;
        assert!(RunConfig::from_yaml(yaml).is_err());
    }
}
