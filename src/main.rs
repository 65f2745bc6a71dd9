//! cook-conf
//!
//! Loads the configuration of a cookbook (global cookbooks, the working
//! cookbook, named recipes and central stem files) and prints, resolves or
//! encrypts pieces of it.

use anyhow::{Context, Result};
use clap::Parser;
use cook_conf::cli::{Cli, Command};
use cook_conf::commands::{CommandKind, CommandOptions};
use cook_conf::config::{
    AccessTrace, CONF_ROOT, ConfigStore, CookbookLoader, ENCRYPTED_ROOT, Environment, Value,
};
use cook_conf::error::ConfError;
use cook_conf::logging::{LogTarget, init_logging};
use cook_conf::vault::{TerminalPrompt, VaultKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut store = ConfigStore::new(Environment::discover(), Box::new(TerminalPrompt));
    for stem in &cli.config {
        store.add_config_file_name(stem);
    }
    for dir in &cli.global_cookbook {
        store.add_global_cookbook_directory(dir);
    }

    if let Some(path) = init_logging(&LogTarget::parse(&cli.log), cli.verbose, &store.log_file_name())? {
        info!("Logging to {}", path.display());
    }
    info!("Config names: {:?}", store.config_file_names());

    let outcome = bootstrap(&cli, &mut store).and_then(|()| run(cli.command, &mut store));
    if let Err(err) = outcome {
        if let Some(ConfError::MissingKey(missing)) = err.downcast_ref::<ConfError>() {
            store.diagnose(missing).terminate();
        }
        return Err(err);
    }
    Ok(())
}

/// Register and load every cookbook and recipe the command line names.
fn bootstrap(cli: &Cli, store: &mut ConfigStore) -> Result<()> {
    let cookbook = match &cli.cookbook {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("resolving the current directory")?,
    };

    let mut recipe_files: Vec<PathBuf> = Vec::new();
    let hook = |path: &Path| -> anyhow::Result<()> {
        debug!("Recipe file {}", path.display());
        recipe_files.push(path.to_path_buf());
        Ok(())
    };
    let mut loader = CookbookLoader::new(store, hook);
    loader.add_global_cookbooks()?;
    loader.add_cookbook(&cookbook)?;
    for recipe in cli.command.recipes() {
        loader.load_recipe(recipe)?;
    }
    loader.load_central_config_files()?;
    drop(loader);

    info!("Found {} recipe files", recipe_files.len());
    Ok(())
}

fn run(command: Command, store: &mut ConfigStore) -> Result<()> {
    match command {
        Command::Show {
            json, encrypted, ..
        } => {
            let (node, prefix) = if encrypted {
                (store.encrypted(), ENCRYPTED_ROOT)
            } else {
                (store.data(), CONF_ROOT)
            };
            if json {
                let value = Value::Node(node.clone()).to_json();
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", node.rendered(prefix));
            }
        }
        Command::Get {
            path, encrypted, ..
        } => {
            let mut trace = AccessTrace::new();
            let value = if encrypted {
                store.get_encrypted(&mut trace, path.as_str())?
            } else {
                store.get(&mut trace, path.as_str())?
            };
            match value {
                Value::Node(node) => print!("{}", node.rendered(&path)),
                other => println!("{}", other),
            }
        }
        Command::Encrypt {
            input,
            output,
            asymmetric,
        } => {
            let plaintext = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let kind = if asymmetric {
                VaultKind::Asymmetric
            } else {
                VaultKind::Symmetric
            };
            store.encrypt_file(&plaintext, &output, kind)?;
            info!("Encrypted {} into {}", input.display(), output.display());
        }
        Command::Decrypt { file } => {
            print!("{}", store.decrypt_file(&file)?);
        }
        Command::Resource { partial, all } => {
            if all {
                for path in store.each_resource(&partial) {
                    println!("{}", path.display());
                }
            } else {
                println!("{}", store.find_resource(&partial)?.display());
            }
        }
        Command::Command { kind, .. } => {
            let kind: CommandKind = kind.parse()?;
            let mut trace = AccessTrace::new();
            let options = CommandOptions::resolve(store, &mut trace, kind, None)?;
            println!("{}", options.command_line().join(" "));
            println!("timeout={}", options.timeout);
        }
    }
    Ok(())
}
