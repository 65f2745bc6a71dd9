//! The configuration store.
//!
//! A [`ConfigStore`] owns the plaintext tree, the encrypted tree and the
//! registration state (config-file-name stems, recipe search paths, global
//! cookbook directories) consulted by the cookbook loader.

use super::env::Environment;
use super::node::{ConfigNode, KeyPath, Value};
use super::schema::{HELP_KEY, HelpSchema};
use super::trace::{AccessTrace, CONF_ROOT, Cursor, CursorMut, ENCRYPTED_ROOT, MissingKey};
use crate::commands::{CommandSelector, install_command_defaults};
use crate::diagnostic::MissingKeyReport;
use crate::error::{ConfError, ConfResult};
use crate::vault::{
    AsymmetricVault, FixedPassphrase, PassphraseCache, PassphrasePrompt, SYMMETRIC_HEADER,
    SymmetricVault, VaultCodec, VaultKind, read_vault,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration key naming the asymmetric vault recipient.
pub const RECIPIENT_PATH: &str = "vault.recipient";

/// Log file name used before any stem is registered.
const NO_CONFIG: &str = "noConfig";

/// Owner of all configuration loaded during bootstrap.
#[derive(Debug)]
pub struct ConfigStore {
    data: ConfigNode,
    encrypted: ConfigNode,
    passphrase: PassphraseCache,
    config_file_names: Vec<String>,
    recipe_paths: Vec<PathBuf>,
    global_cookbooks: Vec<PathBuf>,
    env: Environment,
}

impl ConfigStore {
    /// Create an empty store holding only the built-in help, the `vault`
    /// section and the command-option defaults.
    pub fn new(env: Environment, prompt: Box<dyn PassphrasePrompt>) -> Self {
        let mut store = Self {
            data: ConfigNode::new(),
            encrypted: ConfigNode::new(),
            passphrase: PassphraseCache::new(prompt),
            config_file_names: Vec::new(),
            recipe_paths: Vec::new(),
            global_cookbooks: Vec::new(),
            env,
        };
        store.install_builtin_help();
        store
    }

    /// Store whose vault passphrase is known up front.
    pub fn with_passphrase(env: Environment, passphrase: &str) -> Self {
        Self::new(env, Box::new(FixedPassphrase(passphrase.to_string())))
    }

    fn install_builtin_help(&mut self) {
        self.data.describe(
            "global",
            Some(
                "Global parameters are usually set in the cookbook.conf YAML file\n\
                 contained in the .cookbook directory in your home directory.",
            ),
            None,
        );
        self.data.describe(
            "global.cookbook",
            Some(
                "The cookbook configuration parameter needs to be set to the location of\n\
                 the appropriate cookbook.",
            ),
            Some("where <<value>> is the full path to the appropriate cookbook directory."),
        );
        // The vault section always exists, even if empty.
        self.data.insert("vault", ConfigNode::new());
        if let Err(e) = install_command_defaults(&mut self.data, &CommandSelector::All, None) {
            warn!("could not install command defaults: {}", e);
        }
    }

    pub fn data(&self) -> &ConfigNode {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ConfigNode {
        &mut self.data
    }

    pub fn encrypted(&self) -> &ConfigNode {
        &self.encrypted
    }

    pub fn encrypted_mut(&mut self) -> &mut ConfigNode {
        &mut self.encrypted
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    // Traced access

    /// Traced cursor over the plaintext tree. Starting it resets `trace`.
    pub fn conf<'t>(&self, trace: &'t mut AccessTrace) -> Cursor<'_, 't> {
        Cursor::root(&self.data, trace, CONF_ROOT)
    }

    pub fn conf_mut<'t>(&mut self, trace: &'t mut AccessTrace) -> CursorMut<'_, 't> {
        CursorMut::root(&mut self.data, trace, CONF_ROOT)
    }

    pub fn encrypted_conf<'t>(&self, trace: &'t mut AccessTrace) -> Cursor<'_, 't> {
        Cursor::root(&self.encrypted, trace, ENCRYPTED_ROOT)
    }

    pub fn encrypted_conf_mut<'t>(&mut self, trace: &'t mut AccessTrace) -> CursorMut<'_, 't> {
        CursorMut::root(&mut self.encrypted, trace, ENCRYPTED_ROOT)
    }

    /// Traced lookup of a dotted path in the plaintext tree.
    pub fn get(&self, trace: &mut AccessTrace, path: impl Into<KeyPath>) -> ConfResult<&Value> {
        self.conf(trace).path(path)
    }

    pub fn get_encrypted(
        &self,
        trace: &mut AccessTrace,
        path: impl Into<KeyPath>,
    ) -> ConfResult<&Value> {
        self.encrypted_conf(trace).path(path)
    }

    /// Untraced lookup in the plaintext tree.
    pub fn lookup(&self, path: impl Into<KeyPath>) -> Option<&Value> {
        self.data.lookup(path)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.data.has_key(key)
    }

    pub fn has_encrypted_key(&self, key: &str) -> bool {
        self.encrypted.has_key(key)
    }

    // Loading

    /// Merge a YAML document into the plaintext tree.
    pub fn load_str(&mut self, yaml: &str) -> ConfResult<()> {
        if let Some(node) = parse_fragment(Path::new("<string>"), yaml)? {
            self.data.merge(node)?;
        }
        Ok(())
    }

    /// Merge a plaintext fragment file into the plaintext tree.
    pub fn load_file(&mut self, path: &Path) -> ConfResult<()> {
        debug!("loading configuration file [{}]", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| ConfError::io(path, e))?;
        if let Some(node) = parse_fragment(path, &text)? {
            self.data.merge(node)?;
        }
        Ok(())
    }

    /// Decrypt a vault and merge it into the encrypted tree.
    pub fn load_encrypted_file(&mut self, path: &Path) -> ConfResult<()> {
        debug!("loading encrypted configuration file [{}]", path.display());
        let text = self.decrypt_file(path)?;
        if let Some(node) = parse_fragment(path, &text)? {
            self.encrypted.merge(node)?;
        }
        Ok(())
    }

    /// Write the plaintext tree, or the branch at `branch`, as YAML.
    ///
    /// The branch is re-nested under its keys so the file can be loaded
    /// back as a fragment. Keys of `branch` that do not exist are skipped.
    pub fn save_file(&self, path: &Path, branch: &[&str]) -> ConfResult<()> {
        let mut value = Value::Node(self.data.clone());
        for key in branch {
            if let Value::Node(node) = &value
                && let Some(child) = node.get(key)
            {
                value = child.clone();
            }
        }
        let mut json = value.to_json();
        for key in branch.iter().rev() {
            let mut wrapper = serde_json::Map::new();
            wrapper.insert((*key).to_string(), json);
            json = serde_json::Value::Object(wrapper);
        }
        let yaml = serde_yaml::to_string(&json).map_err(|source| ConfError::Fragment {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, yaml).map_err(|e| ConfError::io(path, e))
    }

    // Registration

    /// Register a config-file-name stem. Any extension is stripped and
    /// repeated stems are ignored.
    pub fn add_config_file_name(&mut self, name: &str) {
        let stem = match name.rfind('.') {
            Some(dot) => &name[..dot],
            None => name,
        };
        if stem.is_empty() || self.config_file_names.iter().any(|n| n == stem) {
            return;
        }
        info!("Adding config name: [{}]", stem);
        self.config_file_names.push(stem.to_string());
    }

    pub fn config_file_names(&self) -> &[String] {
        &self.config_file_names
    }

    /// Stems joined by `-`, or `noConfig` when none are registered.
    pub fn log_file_name(&self) -> String {
        if self.config_file_names.is_empty() {
            NO_CONFIG.to_string()
        } else {
            self.config_file_names.join("-")
        }
    }

    pub fn add_recipes_path(&mut self, path: impl Into<PathBuf>) {
        self.recipe_paths.push(path.into());
    }

    pub fn recipe_paths(&self) -> &[PathBuf] {
        &self.recipe_paths
    }

    pub fn add_global_cookbook_directory(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        info!("Adding global cookbook: [{}]", dir.display());
        self.global_cookbooks.push(dir);
    }

    pub fn global_cookbook_directories(&self) -> &[PathBuf] {
        &self.global_cookbooks
    }

    // Vaults

    /// The vault passphrase, prompting on first use.
    pub fn passphrase(&mut self, confirm: bool) -> ConfResult<&str> {
        self.passphrase.resolve(confirm)
    }

    /// Configured recipient for asymmetric vaults.
    pub fn recipient(&self) -> Option<&str> {
        self.data.lookup(RECIPIENT_PATH).and_then(Value::as_str)
    }

    pub fn asymmetric_vault(&self) -> AsymmetricVault {
        AsymmetricVault::new(self.recipient().map(str::to_string), self.env.key_agent())
    }

    /// Encrypt `plaintext` into the vault at `path`.
    pub fn encrypt_file(&mut self, plaintext: &str, path: &Path, kind: VaultKind) -> ConfResult<()> {
        match kind {
            VaultKind::Asymmetric => self.asymmetric_vault().encode(plaintext, path),
            VaultKind::Symmetric => {
                let passphrase = self.passphrase.resolve(true)?;
                SymmetricVault::new(passphrase).encode(plaintext, path)
            }
        }
    }

    /// Decrypt the vault at `path`, trying the asymmetric codec first.
    ///
    /// A vault that carries the asymmetric header reports the asymmetric
    /// failure. One with the symmetric header falls back to the passphrase
    /// codec, and an unknown header fails before any prompt.
    pub fn decrypt_file(&mut self, path: &Path) -> ConfResult<String> {
        let contents = read_vault(path)?;
        let asymmetric_err = match self.asymmetric_vault().decode(path) {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        match VaultKind::sniff(&contents) {
            Some(VaultKind::Asymmetric) => return Err(asymmetric_err),
            Some(VaultKind::Symmetric) => {}
            None => {
                let header = contents.lines().next().unwrap_or("").trim();
                return Err(ConfError::bad_header(path, SYMMETRIC_HEADER, header));
            }
        }
        debug!(
            "{} is not a recipient vault ({}), trying the pass phrase",
            path.display(),
            asymmetric_err
        );
        let passphrase = self.passphrase.resolve(false)?;
        SymmetricVault::new(passphrase).decode(path)
    }

    // Reporting

    /// Every plaintext leaf as a sorted `Conf.key=value` line.
    pub fn render(&self) -> String {
        self.data.rendered(CONF_ROOT)
    }

    /// Report for a failed traced lookup, using the help of the tree it ran in.
    pub fn diagnose(&self, missing: &MissingKey) -> MissingKeyReport {
        let root = if missing.root_name() == ENCRYPTED_ROOT {
            &self.encrypted
        } else {
            &self.data
        };
        MissingKeyReport::new(missing, root)
    }
}

/// Parse a fragment document.
///
/// Empty documents yield `None`. A top-level `missingKey` mapping becomes the
/// fragment's help schema instead of configuration data.
pub fn parse_fragment(path: &Path, text: &str) -> ConfResult<Option<ConfigNode>> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|source| ConfError::Fragment {
            path: path.to_path_buf(),
            source,
        })?;
    match document {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::Mapping(mut mapping) => {
            let help = mapping.remove(HELP_KEY);
            let mut node = ConfigNode::from_yaml_mapping(mapping);
            if let Some(help) = help {
                node.schema_mut().merge(HelpSchema::from_yaml(&help));
            }
            Ok(Some(node))
        }
        _ => {
            warn!("ignoring non-mapping fragment {}", path.display());
            Err(ConfError::FragmentShape {
                path: path.to_path_buf(),
            })
        }
    }
}
