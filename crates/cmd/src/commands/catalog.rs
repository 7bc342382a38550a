use std::io::Write;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use tdspu::{CatalogLayout, CatalogRun};

use crate::common::{RunContext, enumerator};

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Root directory laid out by the DRS
    pub root: PathBuf,

    /// Directory receiving the catalog documents
    #[arg(long, short)]
    pub dest: PathBuf,

    /// Directory of aggregation documents written by `ncml`
    #[arg(long)]
    pub ncml: Option<PathBuf>,

    /// Expose every group's data directory with a datasetScan
    #[arg(long)]
    pub scan: bool,

    /// Nest datasets under these grouping facets
    #[arg(long, value_delimiter = ',')]
    pub nest_by: Vec<String>,

    /// One catalog per value of this facet, referenced from a root catalog
    #[arg(long)]
    pub split_by: Option<String>,

    /// Read candidate paths from this file instead of walking (`-` for stdin)
    #[arg(long)]
    pub files_from: Option<String>,

    /// Directory of templates overriding or adding to the built-in ones
    #[arg(long)]
    pub templates: Option<PathBuf>,
}

/// Write catalogs for the groups under `root` without reading time axes.
pub async fn catalog_command(ctx: &RunContext, args: &CatalogArgs, out: &mut dyn Write) -> Result<()> {
    let config = ctx.load_config()?;
    if args.ncml.is_none() && !args.scan {
        bail!("nothing to list: pass --ncml DIR, --scan, or both");
    }
    let nest_by = if args.nest_by.is_empty() {
        &config.catalog.nest_by
    } else {
        &args.nest_by
    };
    let run = CatalogRun {
        ncml_dir: args.ncml.clone(),
        scan: args.scan,
        layout: CatalogLayout::nested_by(nest_by),
        split_by: args.split_by.clone(),
    };

    let pipeline = ctx.pipeline(config, args.templates.as_deref())?;
    let files = enumerator(args.files_from.as_deref())?;
    let report = pipeline
        .run_catalog(&args.root, files.as_ref(), &args.dest, &run)
        .await?;

    write!(out, "{report}")?;
    if ctx.verbose {
        for path in &report.written {
            writeln!(out, "  {}", path.display())?;
        }
    }
    if !report.is_success() {
        bail!("{} catalog outputs failed", report.failures.len());
    }
    Ok(())
}
