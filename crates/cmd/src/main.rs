use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use cmd::commands::{
    CatalogArgs, InventoryArgs, NcmlArgs, catalog_command, inventory_command, ncml_command,
};
use cmd::common::RunContext;

/// tdspu publishes trees of climate model output through THREDDS: it
/// groups files by their DRS facets, writes one NcML aggregation per
/// group and catalogs what it wrote.
#[derive(Parser, Debug)]
#[command(name = "tdspu", version)]
struct Cli {
    /// Configuration file (YAML); the CMIP5 layout is used when absent
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// key=value variables substituted into the configuration file.
    /// For example, `{{ key }}` will be replaced with `value`.
    #[arg(short, value_parser = parse_key_val, number_of_values = 1, global = true)]
    vars: Vec<(String, String)>,

    /// Print written paths and summary counts
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the files that would be aggregated, and why others were rejected
    #[clap(visible_alias = "ls")]
    Inventory(InventoryArgs),

    /// Write one NcML aggregation per group of files
    Ncml(NcmlArgs),

    /// Write THREDDS catalogs for aggregations or data directories
    Catalog(CatalogArgs),
}

/// Parse a single key-value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();

    let cli = Cli::parse();
    let ctx = RunContext::new(cli.config, cli.vars).verbose(cli.verbose);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Inventory(args) => inventory_command(&ctx, args, &mut out).await,
        Commands::Ncml(args) => ncml_command(&ctx, args, &mut out).await,
        Commands::Catalog(args) => catalog_command(&ctx, args, &mut out).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        let (k, v) = parse_key_val("root=/data/a=b").expect("pair");
        assert_eq!(k, "root");
        assert_eq!(v, "/data/a=b");
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn test_cli_parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tdspu", "ncml", "/data", "--dest", "/out", "-v", "name=obs", "--nest-by", "model,table",
        ])
        .expect("parses");
        assert_eq!(cli.vars, vec![("name".to_string(), "obs".to_string())]);
        match cli.command {
            Commands::Ncml(args) => {
                assert_eq!(args.nest_by, vec!["model", "table"]);
                assert_eq!(args.dest, PathBuf::from("/out"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
