//! Cookbook and recipe discovery.
//!
//! Load order is the precedence model, since later merges win:
//! 1. **Children** - every subdirectory of a recipe loads before the recipe
//! 2. **Generic** - `<name>.conf` / `<name>.enc` of the recipe directory
//! 3. **Stems** - `<stem>.conf` / `<stem>.enc` per registered stem, in order
//!
//! Recipe files (`.rake`) are never parsed here; their paths go to a
//! [`RecipeHook`] after the directory's fragments are merged.

use super::store::ConfigStore;
use crate::error::{ConfError, ConfResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONF_EXT: &str = "conf";
const ENC_EXT: &str = "enc";
const RECIPE_EXT: &str = "rake";
const COOKBOOK_STEM: &str = "cookbook";
const RECIPES_DIR: &str = "recipes";

/// Receives the path of every recipe file the loader finds.
pub trait RecipeHook {
    fn load_recipe_file(&mut self, path: &Path) -> anyhow::Result<()>;
}

impl<F> RecipeHook for F
where
    F: FnMut(&Path) -> anyhow::Result<()>,
{
    fn load_recipe_file(&mut self, path: &Path) -> anyhow::Result<()> {
        self(path)
    }
}

/// Hook that ignores recipe files.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecipes;

impl RecipeHook for NoRecipes {
    fn load_recipe_file(&mut self, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Walks cookbooks and recipes into a [`ConfigStore`].
pub struct CookbookLoader<'s, H> {
    store: &'s mut ConfigStore,
    hook: H,
}

impl<'s, H: RecipeHook> CookbookLoader<'s, H> {
    pub fn new(store: &'s mut ConfigStore, hook: H) -> Self {
        Self { store, hook }
    }

    pub fn store(&mut self) -> &mut ConfigStore {
        &mut *self.store
    }

    pub fn into_hook(self) -> H {
        self.hook
    }

    /// Load a recipe directory, children first.
    pub fn load_recipe_directory(&mut self, dir: &Path) -> ConfResult<()> {
        for child in subdirectories(dir)? {
            self.load_recipe_directory(&child)?;
        }

        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            return Ok(());
        };
        let name = name.to_string();
        self.load_fragments(dir, &name)?;
        self.load_config_files(dir)?;

        self.trigger_recipe(&dir.join(format!("{name}.{RECIPE_EXT}")))?;
        self.load_recipe_files(dir)
    }

    /// Load the recipe called `name` from every search path that has it,
    /// most recently registered path first.
    pub fn load_recipe(&mut self, name: &str) -> ConfResult<()> {
        let dirs: Vec<PathBuf> = self
            .store
            .recipe_paths()
            .iter()
            .rev()
            .map(|search_path| search_path.join(name))
            .filter(|dir| dir.is_dir())
            .collect();
        if dirs.is_empty() {
            debug!("recipe [{}] not found in any search path", name);
        }
        for dir in dirs {
            info!("Loading recipe [{}] from {}", name, dir.display());
            self.load_recipe_directory(&dir)?;
        }
        Ok(())
    }

    /// Register a cookbook's search paths and load its own fragments.
    pub fn add_cookbook(&mut self, path: &Path) -> ConfResult<()> {
        info!("Loading cookbook: [{}]", path.display());
        self.store.add_recipes_path(path);
        self.store.add_recipes_path(path.join(RECIPES_DIR));
        self.load_fragments(path, COOKBOOK_STEM)?;
        self.trigger_recipe(&path.join(format!("{COOKBOOK_STEM}.{RECIPE_EXT}")))
    }

    /// Add every existing global cookbook, defaulting to `<home>/.cookbook`.
    pub fn add_global_cookbooks(&mut self) -> ConfResult<()> {
        if self.store.global_cookbook_directories().is_empty()
            && let Some(default) = self.store.environment().default_global_cookbook()
        {
            self.store.add_global_cookbook_directory(default);
        }
        let dirs = self.store.global_cookbook_directories().to_vec();
        for dir in dirs.iter().filter(|d| d.is_dir()) {
            info!("Adding global cookbook {}", dir.display());
            self.add_cookbook(dir)?;
        }
        Ok(())
    }

    /// Load the stem fragments found directly in each search path, most
    /// recently registered path first.
    pub fn load_central_config_files(&mut self) -> ConfResult<()> {
        let paths: Vec<PathBuf> = self.store.recipe_paths().iter().rev().cloned().collect();
        for path in paths {
            self.load_config_files(&path)?;
        }
        Ok(())
    }

    /// `<dir>/<stem>.conf` then `<dir>/<stem>.enc`, when present.
    fn load_fragments(&mut self, dir: &Path, stem: &str) -> ConfResult<()> {
        let conf = dir.join(format!("{stem}.{CONF_EXT}"));
        if conf.is_file() {
            self.store.load_file(&conf)?;
        }
        let enc = dir.join(format!("{stem}.{ENC_EXT}"));
        if enc.is_file() {
            self.store.load_encrypted_file(&enc)?;
        }
        Ok(())
    }

    fn load_config_files(&mut self, dir: &Path) -> ConfResult<()> {
        let stems = self.store.config_file_names().to_vec();
        for stem in &stems {
            self.load_fragments(dir, stem)?;
        }
        Ok(())
    }

    fn load_recipe_files(&mut self, dir: &Path) -> ConfResult<()> {
        let stems = self.store.config_file_names().to_vec();
        for stem in &stems {
            self.trigger_recipe(&dir.join(format!("{stem}.{RECIPE_EXT}")))?;
        }
        Ok(())
    }

    fn trigger_recipe(&mut self, path: &Path) -> ConfResult<()> {
        if !path.is_file() {
            return Ok(());
        }
        debug!("Loading recipe file [{}]", path.display());
        self.hook
            .load_recipe_file(path)
            .map_err(|source| ConfError::RecipeLoad {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Subdirectories eligible for recipe loading, sorted by name.
///
/// Hidden entries, names ending in `.` and names that are not valid UTF-8
/// are skipped.
fn subdirectories(dir: &Path) -> ConfResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ConfError::io(dir, e)),
    };
    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfError::io(dir, e))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.starts_with('.') || name.ends_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            children.push(path);
        }
    }
    children.sort();
    Ok(children)
}
