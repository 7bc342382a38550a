//! NcML aggregation and THREDDS catalog generation for trees of climate
//! model output laid out by a Directory Reference Syntax (DRS).
//!
//! The flow is: [`inventory`] the tree, [`grouping`] records into time
//! series, [`aggregation`] synthesis per group, [`render`] through Tera
//! templates, and [`output`] with atomic writes. [`catalog`] builds the
//! THREDDS listing of what was written. [`pipeline`] ties the stages together.

pub mod aggregation;
pub mod catalog;
pub mod config;
pub mod error;
pub mod facet;
pub mod grouping;
pub mod inventory;
pub mod output;
pub mod pipeline;
pub mod reader;
pub mod render;
pub mod report;
pub mod testing;
pub mod walk;

pub use aggregation::{AggregationContext, AggregationDescriptor, Synthesis, synthesize};
pub use catalog::{Catalog, CatalogEntry, CatalogLayout, CatalogNode, build_catalog};
pub use config::RunConfig;
pub use error::{Error, Result};
pub use facet::{Drs, FacetMap, TimeDescriptor, extract_facets};
pub use grouping::{AggregationGroup, FixedFieldIndex, GroupKey, Grouping, GroupingStrategy, group};
pub use inventory::{Inventory, InventoryOptions, InventoryRecord, build_inventory};
pub use pipeline::{CatalogRun, Pipeline};
pub use reader::{ArrayReader, TimeCoordinate, default_reader};
pub use render::{FunctionRegistry, Renderer};
pub use report::RunReport;
pub use walk::{FileEnumerator, ListEnumerator, WalkDirEnumerator};
