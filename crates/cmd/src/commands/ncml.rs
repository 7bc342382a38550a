use std::io::Write;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use tdspu::{CatalogLayout, CatalogRun};

use crate::common::{RunContext, enumerator};

#[derive(Args, Debug, Clone)]
pub struct NcmlArgs {
    /// Root directory laid out by the DRS
    pub root: PathBuf,

    /// Directory receiving the aggregation documents
    #[arg(long, short)]
    pub dest: PathBuf,

    /// Read candidate paths from this file instead of walking (`-` for stdin)
    #[arg(long)]
    pub files_from: Option<String>,

    /// Aggregation template name, overriding the configuration
    #[arg(long)]
    pub template: Option<String>,

    /// Directory of templates overriding or adding to the built-in ones
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Also write a catalog of the written documents
    #[arg(long)]
    pub catalog: bool,

    /// Nest catalog datasets under these grouping facets
    #[arg(long, value_delimiter = ',')]
    pub nest_by: Vec<String>,
}

/// Write one aggregation document per group, then report.
///
/// Fails after printing the report when any single output failed.
pub async fn ncml_command(ctx: &RunContext, args: &NcmlArgs, out: &mut dyn Write) -> Result<()> {
    let mut config = ctx.load_config()?;
    if let Some(template) = &args.template {
        config.output.template = template.clone();
    }
    if !args.nest_by.is_empty() {
        config.catalog.nest_by = args.nest_by.clone();
    }
    let catalog = args.catalog.then(|| CatalogRun {
        layout: CatalogLayout::nested_by(&config.catalog.nest_by),
        ..CatalogRun::default()
    });

    let pipeline = ctx.pipeline(config, args.templates.as_deref())?;
    let files = enumerator(args.files_from.as_deref())?;
    let report = pipeline
        .run_ncml(&args.root, files.as_ref(), &args.dest, catalog.as_ref())
        .await?;

    write!(out, "{report}")?;
    if ctx.verbose {
        for path in &report.written {
            writeln!(out, "  {}", path.display())?;
        }
    }
    if !report.is_success() {
        bail!("{} of {} outputs failed", report.failures.len(), report.failures.len() + report.written.len());
    }
    Ok(())
}
