//! Partitioning inventory records into aggregation groups, and attaching
//! time-invariant (fixed) files to the groups they describe.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::facet::{FacetMap, filename_tokens};
use crate::inventory::InventoryRecord;

/// Identity of an aggregation group: grouping facet names paired with values.
///
/// Every key produced in one run uses the same names in the same order, so
/// comparing keys compares their values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    facets: Vec<(String, String)>,
}

impl GroupKey {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            facets: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, facet: &str) -> Option<&str> {
        self.facets
            .iter()
            .find(|(name, _)| name == facet)
            .map(|(_, value)| value.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.facets.iter().map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.facets.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values joined by `separator`, in grouping-facet order.
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        self.values().collect::<Vec<_>>().join(separator)
    }

    #[must_use]
    pub fn to_map(&self) -> FacetMap {
        self.facets.iter().cloned().collect()
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.join("_"))
    }
}

/// Records sharing one [`GroupKey`], sorted by path.
#[derive(Debug, Clone)]
pub struct AggregationGroup<'a> {
    pub key: GroupKey,
    pub members: Vec<&'a InventoryRecord>,
}

impl AggregationGroup<'_> {
    #[must_use]
    pub fn name(&self, separator: &str) -> String {
        self.key.join(separator)
    }

    /// Facet value taken from the group key, else from the first member.
    #[must_use]
    pub fn facet(&self, name: &str) -> Option<&str> {
        self.key
            .get(name)
            .or_else(|| self.members.first().and_then(|m| m.facet(name)))
    }

    /// Lookup table for path templates: first member's facets overlaid by the key.
    #[must_use]
    pub fn facets(&self) -> FacetMap {
        let mut facets = self
            .members
            .first()
            .map(|m| m.facets.clone())
            .unwrap_or_default();
        facets.extend(self.key.to_map());
        facets
    }
}

/// The variable names whose files carry no time axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedVariables {
    facet: String,
    names: BTreeSet<String>,
}

impl FixedVariables {
    pub fn new<I, S>(facet: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            facet: facet.to_string(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_fixed(&self, facets: &FacetMap) -> bool {
        facets
            .get(&self.facet)
            .map(|v| self.names.contains(v))
            .unwrap_or(false)
    }
}

type KeyFn = fn(&InventoryRecord, &[String]) -> GroupKey;

/// A named way of computing a record's group key.
pub struct StrategyDescriptor {
    pub strategy: GroupingStrategy,
    pub name: &'static str,
    pub description: &'static str,
    key: KeyFn,
}

impl std::fmt::Debug for StrategyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

fn drs_key(record: &InventoryRecord, facets: &[String]) -> GroupKey {
    GroupKey::new(facets.iter().map(|name| {
        (
            name.clone(),
            record.facet(name).unwrap_or_default().to_string(),
        )
    }))
}

fn filename_key(record: &InventoryRecord, facets: &[String]) -> GroupKey {
    let mut tokens = filename_tokens(&record.path, facets.len()).into_iter();
    GroupKey::new(
        facets
            .iter()
            .map(|name| (name.clone(), tokens.next().unwrap_or_default())),
    )
}

static STRATEGIES: [StrategyDescriptor; 2] = [
    StrategyDescriptor {
        strategy: GroupingStrategy::Drs,
        name: "drs",
        description: "Group by the values of the named directory facets",
        key: drs_key,
    },
    StrategyDescriptor {
        strategy: GroupingStrategy::FilenameTokens,
        name: "filename-tokens",
        description: "Group by the leading underscore-separated tokens of the file name",
        key: filename_key,
    },
];

/// Selects how group keys are computed. Configured by registry name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupingStrategy {
    #[default]
    Drs,
    FilenameTokens,
}

impl GroupingStrategy {
    /// Look a strategy up by its registered name.
    pub fn from_name(name: &str) -> Result<Self> {
        STRATEGIES
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.strategy)
            .ok_or_else(|| Error::UnknownStrategy {
                name: name.to_string(),
                known: Self::registered().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn registered() -> impl Iterator<Item = &'static str> {
        STRATEGIES.iter().map(|d| d.name)
    }

    #[must_use]
    pub fn descriptor(self) -> &'static StrategyDescriptor {
        match self {
            GroupingStrategy::Drs => &STRATEGIES[0],
            GroupingStrategy::FilenameTokens => &STRATEGIES[1],
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    #[must_use]
    pub fn key(self, record: &InventoryRecord, facets: &[String]) -> GroupKey {
        (self.descriptor().key)(record, facets)
    }
}

impl TryFrom<String> for GroupingStrategy {
    type Error = Error;

    fn try_from(name: String) -> Result<Self> {
        Self::from_name(&name)
    }
}

impl From<GroupingStrategy> for String {
    fn from(strategy: GroupingStrategy) -> String {
        strategy.name().to_string()
    }
}

/// Result of [`group`]: disjoint groups in key order, plus the fixed records.
#[derive(Debug, Default)]
pub struct Grouping<'a> {
    pub groups: BTreeMap<GroupKey, AggregationGroup<'a>>,
    pub fixed: Vec<&'a InventoryRecord>,
}

impl<'a> Grouping<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &AggregationGroup<'a>> {
        self.groups.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Partition time-varying records into groups; set fixed records aside.
///
/// Every non-fixed record lands in exactly one group. Members keep the
/// inventory's path order.
pub fn group<'a>(
    records: &'a [InventoryRecord],
    strategy: GroupingStrategy,
    facets: &[String],
    fixed: &FixedVariables,
) -> Grouping<'a> {
    let mut grouping = Grouping::default();
    for record in records {
        if fixed.is_fixed(&record.facets) {
            grouping.fixed.push(record);
            continue;
        }
        let key = strategy.key(record, facets);
        grouping
            .groups
            .entry(key.clone())
            .or_insert_with(|| AggregationGroup {
                key,
                members: Vec::new(),
            })
            .members
            .push(record);
    }
    for group in grouping.groups.values_mut() {
        group.members.sort_by(|a, b| a.path.cmp(&b.path));
    }
    grouping.fixed.sort_by(|a, b| a.path.cmp(&b.path));

    diagnostics::log_debug!(
        "Grouped records into {groups} groups with {fixed} fixed files",
        groups: grouping.groups.len(),
        fixed: grouping.fixed.len()
    );
    grouping
}

/// Which grouping facets must agree for a fixed file to describe a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRules {
    /// Facets that only distinguish time sampling
    pub temporal: Vec<String>,
    /// Facets ignored for every project
    pub ignore: Vec<String>,
    pub variable_facet: String,
    pub project_facet: String,
    /// Extra ignored facets per project
    pub projects: BTreeMap<String, Vec<String>>,
}

impl MatchRules {
    /// The grouping facets compared for groups of `project`.
    #[must_use]
    pub fn match_facets(&self, grouping_facets: &[String], project: Option<&str>) -> Vec<String> {
        let project_ignore = project
            .and_then(|p| self.projects.get(p))
            .map(Vec::as_slice)
            .unwrap_or_default();
        grouping_facets
            .iter()
            .filter(|f| {
                **f != self.variable_facet
                    && !self.temporal.contains(*f)
                    && !self.ignore.contains(*f)
                    && !project_ignore.contains(*f)
            })
            .cloned()
            .collect()
    }
}

/// Exact-key index over fixed records, one table per distinct facet subset.
#[derive(Debug)]
pub struct FixedFieldIndex<'a> {
    rules: MatchRules,
    strategy: GroupingStrategy,
    grouping_facets: Vec<String>,
    tables: BTreeMap<Vec<String>, BTreeMap<Vec<String>, Vec<&'a InventoryRecord>>>,
}

impl<'a> FixedFieldIndex<'a> {
    /// Index `fixed` under every facet subset the rules can ask for.
    pub fn build(
        fixed: &[&'a InventoryRecord],
        strategy: GroupingStrategy,
        grouping_facets: &[String],
        rules: &MatchRules,
    ) -> Self {
        let subsets: BTreeSet<Vec<String>> = std::iter::once(None)
            .chain(rules.projects.keys().map(|p| Some(p.as_str())))
            .map(|project| rules.match_facets(grouping_facets, project))
            .collect();

        let mut tables = BTreeMap::new();
        for subset in subsets {
            let mut table: BTreeMap<Vec<String>, Vec<&'a InventoryRecord>> = BTreeMap::new();
            for record in fixed {
                let key = strategy.key(record, grouping_facets);
                table
                    .entry(project_values(&key, &subset))
                    .or_default()
                    .push(*record);
            }
            _ = tables.insert(subset, table);
        }

        Self {
            rules: rules.clone(),
            strategy,
            grouping_facets: grouping_facets.to_vec(),
            tables,
        }
    }

    /// Fixed records describing `group`, in path order.
    #[must_use]
    pub fn match_fixed(&self, group: &AggregationGroup<'_>) -> Vec<&'a InventoryRecord> {
        let project = group.facet(&self.rules.project_facet);
        let subset = self.rules.match_facets(&self.grouping_facets, project);
        let Some(table) = self.tables.get(&subset) else {
            return Vec::new();
        };
        table
            .get(&project_values(&group.key, &subset))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn strategy(&self) -> GroupingStrategy {
        self.strategy
    }
}

fn project_values(key: &GroupKey, subset: &[String]) -> Vec<String> {
    subset
        .iter()
        .map(|name| key.get(name).unwrap_or_default().to_string())
        .collect()
}
