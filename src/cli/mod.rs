//! CLI definitions for cook-conf.
//!
//! The global options feed search-path registration; each subcommand then
//! works on the store the bootstrap produced.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Layered cookbook configuration tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Comma-separated config-file-name stems (e.g. `dev,site`)
    #[arg(short, long, value_delimiter = ',', global = true)]
    pub config: Vec<String>,

    /// Comma-separated global cookbook directories (default: ~/.cookbook)
    #[arg(short = 'C', long, value_delimiter = ',', global = true)]
    pub global_cookbook: Vec<PathBuf>,

    /// Cookbook directory (default: current directory)
    #[arg(long, global = true)]
    pub cookbook: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), build, or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Recipes to load before running a subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RecipeArgs {
    /// Recipe names resolved against the search paths
    #[arg(value_name = "RECIPE")]
    pub recipes: Vec<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the merged configuration
    Show {
        /// Print nested JSON instead of `Conf.key=value` lines
        #[arg(long)]
        json: bool,

        /// Show the encrypted tree instead of the plaintext one
        #[arg(long)]
        encrypted: bool,

        #[command(flatten)]
        recipes: RecipeArgs,
    },

    /// Print one value by dotted path
    Get {
        /// Dotted path such as `ssh.remoteHost`
        path: String,

        /// Look the value up in the encrypted tree
        #[arg(long)]
        encrypted: bool,

        #[command(flatten)]
        recipes: RecipeArgs,
    },

    /// Encrypt a plaintext fragment into a vault
    Encrypt {
        /// Plaintext YAML file
        input: PathBuf,

        /// Vault file to write (must end in `.enc`)
        output: PathBuf,

        /// Encrypt for the configured `vault.recipient` instead of a pass phrase
        #[arg(long)]
        asymmetric: bool,
    },

    /// Decrypt a vault and print its plaintext
    Decrypt {
        /// Vault file (must end in `.enc`)
        file: PathBuf,
    },

    /// Resolve a resource against the search paths
    Resource {
        /// Path relative to a search path, e.g. `templates/nginx.conf`
        partial: String,

        /// Print every match instead of the first
        #[arg(long)]
        all: bool,
    },

    /// Print the resolved options of a command (sh, ssh, scp, rsync)
    Command {
        /// Command name
        kind: String,

        #[command(flatten)]
        recipes: RecipeArgs,
    },
}

impl Command {
    /// Recipes the bootstrap should load for this subcommand.
    pub fn recipes(&self) -> &[String] {
        match self {
            Command::Show { recipes, .. }
            | Command::Get { recipes, .. }
            | Command::Command { recipes, .. } => &recipes.recipes,
            _ => &[],
        }
    }
}
