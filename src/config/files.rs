//! Resource resolution across recipe search paths.
//!
//! Resources (templates, scripts, binaries shipped with cookbooks) resolve
//! first-found-wins in search path registration order, which is the
//! opposite direction to recipe loading.

use super::store::ConfigStore;
use crate::error::{ConfError, ConfResult};
use std::path::PathBuf;

impl ConfigStore {
    /// First `<searchPath>/<partial>` that exists.
    pub fn find_resource(&self, partial: &str) -> ConfResult<PathBuf> {
        self.resource_paths(partial)
            .next()
            .ok_or_else(|| ConfError::ResourceNotFound(partial.to_string()))
    }

    /// Every existing `<searchPath>/<partial>`, in registration order.
    pub fn each_resource(&self, partial: &str) -> Vec<PathBuf> {
        self.resource_paths(partial).collect()
    }

    /// Content of the resource [`find_resource`](Self::find_resource) resolves.
    pub fn read_resource(&self, partial: &str) -> ConfResult<String> {
        let path = self.find_resource(partial)?;
        std::fs::read_to_string(&path).map_err(|e| ConfError::io(&path, e))
    }

    /// Check if a resource exists in any search path.
    pub fn resource_exists(&self, partial: &str) -> bool {
        self.resource_paths(partial).next().is_some()
    }

    fn resource_paths<'a>(&'a self, partial: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        self.recipe_paths()
            .iter()
            .map(move |search_path| search_path.join(partial))
            .filter(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigStore, Environment};
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::create_dir_all(first.join("templates")).unwrap();
        std::fs::create_dir_all(second.join("templates")).unwrap();
        std::fs::write(first.join("templates/nginx.conf"), "first").unwrap();
        std::fs::write(second.join("templates/nginx.conf"), "second").unwrap();
        std::fs::write(second.join("templates/only.txt"), "only").unwrap();

        let mut store = ConfigStore::with_passphrase(Environment::with_dirs(None, None), "pw");
        store.add_recipes_path(first);
        store.add_recipes_path(second);
        (dir, store)
    }

    #[test]
    fn test_find_resource_forward_order() {
        let (_dir, store) = setup();
        assert_eq!(store.read_resource("templates/nginx.conf").unwrap(), "first");
        assert_eq!(store.read_resource("templates/only.txt").unwrap(), "only");
    }

    #[test]
    fn test_each_resource() {
        let (dir, store) = setup();
        assert_eq!(
            store.each_resource("templates/nginx.conf"),
            [
                dir.path().join("first/templates/nginx.conf"),
                dir.path().join("second/templates/nginx.conf"),
            ]
        );
        assert!(store.each_resource("absent").is_empty());
    }

    #[test]
    fn test_missing_resource() {
        let (_dir, store) = setup();
        let err = store.find_resource("templates/absent").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ResourceNotFound);
        assert!(!store.resource_exists("templates/absent"));
    }
}
