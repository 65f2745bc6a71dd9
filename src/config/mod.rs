//! Layered cookbook configuration.
//!
//! Configuration is assembled from many small YAML fragments spread over
//! cookbook directories:
//! 1. **Global cookbooks** - `~/.cookbook/` unless directories are given
//! 2. **Cookbook** - `cookbook.conf` / `cookbook.enc` of the working cookbook
//! 3. **Recipes** - per recipe directory, children first, then stems
//! 4. **Central stems** - `<stem>.conf` directly inside each search path
//!
//! ## Merge Strategy
//! - Mappings merge recursively, sequences concatenate, scalars are replaced
//! - `.enc` fragments go to a separate encrypted tree
//! - A top-level `missingKey` mapping holds help text, not configuration
//!
//! ## Environment Variables
//! - `HOME` - Location of the default global cookbook
//! - `COOK_AGENT_INFO` - Key directory of the active key-agent session

mod env;
mod files;
mod loader;
mod merge;
mod node;
mod schema;
mod store;
mod trace;

pub use env::{AGENT_INFO_VAR, Environment, GLOBAL_COOKBOOK_DIR};
pub use loader::{CookbookLoader, NoRecipes, RecipeHook};
pub use merge::merge_all;
pub use node::{ConfigNode, Key, KeyPath, Value};
pub use schema::{HELP_KEY, HelpSchema};
pub use store::{ConfigStore, RECIPIENT_PATH, parse_fragment};
pub use trace::{
    AccessFrame, AccessKind, AccessTrace, CONF_ROOT, Cursor, CursorMut, ENCRYPTED_ROOT, MissingKey,
};
