use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "crosswalk",
    version,
    about = "Map policy text and cloud findings onto Secure Controls Framework controls"
)]
pub struct Cli {
    #[arg(long, global = true, default_value = "crosswalk.toml")]
    pub config: PathBuf,
    #[arg(
        long,
        global = true,
        help = "Catalog file, overriding config and CROSSWALK_CATALOG"
    )]
    pub catalog: Option<PathBuf>,
    #[arg(long, global = true)]
    pub provider: Option<String>,
    #[arg(long, global = true)]
    pub model: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Map a policy snippet or a finding to the most relevant controls")]
    Map {
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long = "top-k")]
        top_k: Option<usize>,
        #[arg(long)]
        persona: Option<String>,
        #[arg(long, value_enum, default_value_t = MapFormat::Text)]
        format: MapFormat,
        #[arg(
            long = "dry-run",
            action = ArgAction::SetTrue,
            help = "Print the prompts instead of calling the model"
        )]
        dry_run: bool,
    },
    #[command(about = "Recommend domains and controls to test for an audit scope document")]
    Scope {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = ScopeFormat::Text)]
        format: ScopeFormat,
    },
    #[command(about = "Map many inputs and rank the controls they hit")]
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long = "top-k")]
        top_k: Option<usize>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        persona: Option<String>,
        #[arg(long, value_enum, default_value_t = BatchFormat::Json)]
        format: BatchFormat,
    },
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    Stats,
    Domains,
    Show { control_id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapFormat {
    Text,
    Json,
    Csv,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchFormat {
    Json,
    Csv,
    Jsonl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_requires_text_or_file() {
        assert!(Cli::try_parse_from(["crosswalk", "map"]).is_err());
        assert!(Cli::try_parse_from(["crosswalk", "map", "--text", "a", "--file", "b"]).is_err());
        let cli = Cli::try_parse_from([
            "crosswalk", "map", "--text", "Laptops are encrypted.", "--top-k", "5", "--format", "csv",
        ])
        .unwrap();
        match cli.command {
            Command::Map {
                text, top_k, format, dry_run, ..
            } => {
                assert_eq!(text.as_deref(), Some("Laptops are encrypted."));
                assert_eq!(top_k, Some(5));
                assert_eq!(format, MapFormat::Csv);
                assert!(!dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "crosswalk", "catalog", "show", "GOV-01", "--catalog", "scf.jsonl",
        ])
        .unwrap();
        assert_eq!(cli.catalog, Some(PathBuf::from("scf.jsonl")));
        assert_eq!(cli.config, PathBuf::from("crosswalk.toml"));
        assert!(matches!(
            cli.command,
            Command::Catalog { command: CatalogCommand::Show { ref control_id } } if control_id == "GOV-01"
        ));
    }

    #[test]
    fn batch_needs_inputs() {
        assert!(Cli::try_parse_from(["crosswalk", "batch"]).is_err());
        let cli = Cli::try_parse_from([
            "crosswalk", "batch", "a.txt", "findings.json", "--concurrency", "4", "--format", "jsonl",
        ])
        .unwrap();
        match cli.command {
            Command::Batch {
                inputs, concurrency, format, ..
            } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(concurrency, Some(4));
                assert_eq!(format, BatchFormat::Jsonl);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
