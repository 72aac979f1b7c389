//! trainconf CLI
//!
//! Entry point for the `trainconf` command-line tool.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use trainconf::logging::init_logging;
use trainconf::{section_hash, ConfigTree, OverrideLayers, Resolver};

#[derive(Parser)]
#[command(name = "trainconf")]
#[command(about = "Resolve and validate training run configuration", version)]
struct Cli {
    /// Log merge and validation details to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OverrideArgs {
    /// Override file (.toml or .json); may be repeated, later files win
    #[arg(long = "config", short = 'c')]
    configs: Vec<PathBuf>,

    /// Single override, e.g. train.epoch=3; applied after all files
    #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
    sets: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration as JSON
    Resolve {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Resolve and report whether the configuration is valid
    Validate {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Print the content hash of the resolved configuration
    Hash {
        #[command(flatten)]
        overrides: OverrideArgs,

        /// Hash only the subtree at this dotted path, e.g. train.ckpt
        #[arg(long)]
        section: Option<String>,
    },

    /// List configurable fields with their types and defaults
    Schema {
        /// Include fields hidden from display surfaces
        #[arg(long)]
        all: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Resolve { overrides } => run_resolve(overrides),
        Commands::Validate { overrides } => run_validate(overrides),
        Commands::Hash { overrides, section } => run_hash(overrides, section),
        Commands::Schema { all, json } => run_schema(all, json),
    }
}

fn resolve(args: OverrideArgs) -> Result<ConfigTree, String> {
    let mut layers = OverrideLayers::new();
    for path in &args.configs {
        layers.push_file(path).map_err(|e| e.to_string())?;
    }
    layers.push_assignments(args.sets.as_slice()).map_err(|e| e.to_string())?;

    let resolver = Resolver::new().map_err(|e| e.to_string())?;
    resolver.resolve(layers.merged()).map_err(|e| e.to_string())
}

fn resolve_or_exit(args: OverrideArgs) -> ConfigTree {
    match resolve(args) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

fn run_resolve(args: OverrideArgs) {
    let tree = resolve_or_exit(args);
    match tree.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing configuration: {}", e);
            process::exit(1);
        }
    }
}

fn run_validate(args: OverrideArgs) {
    let tree = resolve_or_exit(args);
    let parallelism = &tree.policy.parallelism;

    println!("Configuration valid");
    println!();
    println!("  Policy: {}", tree.policy_kind());
    println!("  Model: {}", tree.policy.model_name_or_path);
    println!("  Dataset: {}", tree.train.train_policy.dataset_name());
    println!(
        "  Parallelism: tp={} cp={} pp={} dp_shard={}",
        parallelism.tp_size, parallelism.cp_size, parallelism.pp_size, parallelism.dp_shard_size
    );
    println!("  Output: {}", tree.train.output_dir);
}

fn run_hash(args: OverrideArgs, section: Option<String>) {
    let tree = resolve_or_exit(args);
    let path = section.unwrap_or_default();

    match section_hash(&tree, &path) {
        Some(digest) => println!("{}", digest),
        None => {
            eprintln!("Unknown section: {}", path);
            process::exit(1);
        }
    }
}

fn run_schema(include_hidden: bool, json_output: bool) {
    let resolver = match Resolver::new() {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("Schema error: {}", e);
            process::exit(1);
        }
    };
    let fields = resolver.describe(include_hidden);

    if json_output {
        match serde_json::to_string_pretty(&fields) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing schema: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    for field in &fields {
        let scope = field
            .variant
            .map(|variant| format!(" [{}]", variant))
            .unwrap_or_default();
        println!(
            "{}{}: {} = {}",
            field.path, scope, field.type_name, field.default
        );
        if let Some(help) = field.help {
            println!("    {}", help);
        }
    }
}
