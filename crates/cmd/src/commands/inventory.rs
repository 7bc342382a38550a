use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::common::{RunContext, enumerator};
use crate::error_utils::ErrorContext;

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    /// Root directory laid out by the DRS
    pub root: PathBuf,

    /// Read candidate paths from this file instead of walking (`-` for stdin)
    #[arg(long)]
    pub files_from: Option<String>,

    /// Do not open files to read their time axis
    #[arg(long)]
    pub no_time: bool,

    /// Print the inventory as JSON
    #[arg(long)]
    pub json: bool,
}

/// List accepted files with their size and time axis, then the rejections.
pub async fn inventory_command(ctx: &RunContext, args: &InventoryArgs, out: &mut dyn Write) -> Result<()> {
    let config = ctx.load_config()?;
    let pipeline = ctx.pipeline(config, None)?;
    let files = enumerator(args.files_from.as_deref())?;

    let inventory = pipeline
        .inventory(&args.root, files.as_ref(), !args.no_time)
        .await?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &inventory).with_context_msg("Failed to encode inventory")?;
        writeln!(out)?;
        return Ok(());
    }

    for record in &inventory.records {
        let time = match &record.time {
            Some(t) => format!("{} x{} from {}", t.units, t.length, t.first),
            None => "-".to_string(),
        };
        writeln!(out, "{}\t{}\t{}", record.path.display(), record.size, time)?;
    }
    for rejection in &inventory.rejected {
        writeln!(out, "# {} {}: {}", rejection.kind, rejection.path.display(), rejection.reason)?;
    }
    if ctx.verbose {
        writeln!(
            out,
            "# {} accepted, {} rejected, {} excluded of {} scanned",
            inventory.records.len(),
            inventory.rejected.len(),
            inventory.excluded,
            inventory.scanned
        )?;
    }
    Ok(())
}
