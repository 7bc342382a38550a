//! Aggregation synthesis: from a group and its fixed files to the data
//! handed to the aggregation template.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Error;
use crate::facet::{FacetMap, TimeDescriptor};
use crate::grouping::{AggregationGroup, GroupKey};
use crate::inventory::InventoryRecord;

/// Members sharing the values of the aggregation facets, joined along time.
#[derive(Debug, Clone)]
pub struct SubAggregation<'a> {
    pub facets: FacetMap,
    pub members: Vec<&'a InventoryRecord>,
    pub time: Option<TimeDescriptor>,
}

/// Everything one aggregation document says.
#[derive(Debug, Clone)]
pub struct AggregationDescriptor<'a> {
    pub name: String,
    pub key: GroupKey,
    pub aggregations: Vec<SubAggregation<'a>>,
    pub fxs: Vec<&'a InventoryRecord>,
    pub time: Option<TimeDescriptor>,
    /// Bytes of all members plus all attached fixed files
    pub size: u64,
}

/// A descriptor plus the non-fatal conditions met while building it.
#[derive(Debug)]
pub struct Synthesis<'a> {
    pub descriptor: AggregationDescriptor<'a>,
    pub notices: Vec<Error>,
}

/// Time descriptor of an ordered member list.
///
/// Start and units come from the first member; the increment is the
/// difference between the first samples of the first two members.
fn series_time(members: &[&InventoryRecord]) -> Option<TimeDescriptor> {
    let first = members.first().and_then(|m| m.time.as_ref())?;
    let second = members.get(1).and_then(|m| m.time.as_ref()).map(|t| t.first);
    Some(TimeDescriptor::from_samples(&first.units, first.first, second))
}

/// Build the descriptor for `group` with its matched fixed files.
///
/// `aggregation_facets` splits the members into sub-aggregations; empty
/// means a single one holding every member. A group whose increment cannot
/// be derived still synthesizes, with an `InsufficientSamples` notice, or
/// `NoTimeAxis` when its first member has no time coordinate at all.
#[must_use]
pub fn synthesize<'a>(
    group: &AggregationGroup<'a>,
    fixed: Vec<&'a InventoryRecord>,
    aggregation_facets: &[String],
    separator: &str,
) -> Synthesis<'a> {
    let name = group.name(separator);
    let mut notices = Vec::new();

    let time = series_time(&group.members);
    match &time {
        None => notices.push(Error::NoTimeAxis { group: name.clone() }),
        Some(t) if t.increment.is_none() => notices.push(Error::InsufficientSamples {
            group: name.clone(),
        }),
        Some(_) => {}
    }

    let mut partition: BTreeMap<Vec<String>, Vec<&'a InventoryRecord>> = BTreeMap::new();
    for member in &group.members {
        let values = aggregation_facets
            .iter()
            .map(|f| member.facet(f).unwrap_or_default().to_string())
            .collect();
        partition.entry(values).or_default().push(*member);
    }
    let aggregations = partition
        .into_iter()
        .map(|(values, members)| SubAggregation {
            facets: aggregation_facets.iter().cloned().zip(values).collect(),
            time: series_time(&members),
            members,
        })
        .collect();

    let size = group
        .members
        .iter()
        .chain(fixed.iter())
        .map(|r| r.size)
        .sum();

    Synthesis {
        descriptor: AggregationDescriptor {
            name,
            key: group.key.clone(),
            aggregations,
            fxs: fixed,
            time,
            size,
        },
        notices,
    }
}

/// A file as the templates see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub location: String,
    pub size: u64,
    pub modified: String,
    pub ncoords: Option<usize>,
    pub start: Option<f64>,
}

impl From<&InventoryRecord> for FileEntry {
    fn from(record: &InventoryRecord) -> Self {
        Self {
            location: record.path.display().to_string(),
            size: record.size,
            modified: record.modified.to_rfc3339(),
            ncoords: record.time.as_ref().map(|t| t.length),
            start: record.time.as_ref().map(|t| t.first),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationEntry {
    pub facets: FacetMap,
    pub files: Vec<FileEntry>,
    pub time_units: Option<String>,
    pub time_start: Option<f64>,
    pub time_increment: Option<f64>,
}

/// The data dictionary rendered into an aggregation document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationContext {
    pub name: String,
    pub facets: FacetMap,
    pub aggregations: Vec<AggregationEntry>,
    pub fxs: Vec<FileEntry>,
    pub size: u64,
    pub time_units: Option<String>,
    pub time_start: Option<f64>,
    pub time_increment: Option<f64>,
}

fn time_fields(time: Option<&TimeDescriptor>) -> (Option<String>, Option<f64>, Option<f64>) {
    match time {
        Some(t) => (Some(t.units.clone()), Some(t.start), t.increment),
        None => (None, None, None),
    }
}

impl AggregationDescriptor<'_> {
    #[must_use]
    pub fn context(&self) -> AggregationContext {
        let (time_units, time_start, time_increment) = time_fields(self.time.as_ref());
        AggregationContext {
            name: self.name.clone(),
            facets: self.key.to_map(),
            aggregations: self
                .aggregations
                .iter()
                .map(|agg| {
                    let (time_units, time_start, time_increment) = time_fields(agg.time.as_ref());
                    AggregationEntry {
                        facets: agg.facets.clone(),
                        files: agg.members.iter().map(|m| FileEntry::from(*m)).collect(),
                        time_units,
                        time_start,
                        time_increment,
                    }
                })
                .collect(),
            fxs: self.fxs.iter().map(|f| FileEntry::from(*f)).collect(),
            size: self.size,
            time_units,
            time_start,
            time_increment,
        }
    }

    /// Member paths in aggregation order.
    pub fn member_locations(&self) -> impl Iterator<Item = String> + '_ {
        self.aggregations
            .iter()
            .flat_map(|agg| agg.members.iter())
            .map(|m| m.path.display().to_string())
    }
}
