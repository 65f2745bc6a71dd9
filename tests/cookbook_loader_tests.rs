//! Integration tests for cookbook bootstrap.
//!
//! Tests the CookbookLoader against real directory trees:
//! - add_global_cookbooks() / add_cookbook() - registration and cookbook fragments
//! - load_recipe() - reverse search path order
//! - load_central_config_files() - stem files directly in search paths
//! - encrypted fragments merged into the encrypted tree

use cook_conf::config::{ConfigStore, CookbookLoader, Environment, NoRecipes, Value};
use cook_conf::vault::{SymmetricVault, VaultCodec};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Store with a fixed pass phrase and no key agent.
fn create_store(home: Option<PathBuf>) -> ConfigStore {
    ConfigStore::with_passphrase(Environment::with_dirs(home, None), "kitchen")
}

fn seq(items: &[&str]) -> Value {
    Value::Seq(items.iter().map(|s| Value::from(*s)).collect())
}

#[test]
fn test_default_global_cookbook_from_home() {
    let home = TempDir::new().unwrap();
    write(
        &home.path().join(".cookbook/cookbook.conf"),
        "global:\n  cookbook: /srv/cookbook\nssh:\n  userId: global\n",
    );

    let mut store = create_store(Some(home.path().to_path_buf()));
    CookbookLoader::new(&mut store, NoRecipes)
        .add_global_cookbooks()
        .unwrap();

    assert_eq!(
        store.lookup("global.cookbook"),
        Some(&Value::from("/srv/cookbook"))
    );
    assert_eq!(store.lookup("ssh.userId"), Some(&Value::from("global")));
    assert_eq!(
        store.recipe_paths(),
        [
            home.path().join(".cookbook"),
            home.path().join(".cookbook/recipes")
        ]
    );
}

#[test]
fn test_missing_global_cookbook_is_skipped() {
    let home = TempDir::new().unwrap();
    let mut store = create_store(Some(home.path().to_path_buf()));
    CookbookLoader::new(&mut store, NoRecipes)
        .add_global_cookbooks()
        .unwrap();
    assert!(store.recipe_paths().is_empty());

    let mut store = create_store(None);
    CookbookLoader::new(&mut store, NoRecipes)
        .add_global_cookbooks()
        .unwrap();
    assert!(store.global_cookbook_directories().is_empty());
}

#[test]
fn test_explicit_global_cookbooks_replace_default() {
    let home = TempDir::new().unwrap();
    write(&home.path().join(".cookbook/cookbook.conf"), "from: home\n");
    let shared = TempDir::new().unwrap();
    write(&shared.path().join("cookbook.conf"), "from: shared\n");

    let mut store = create_store(Some(home.path().to_path_buf()));
    store.add_global_cookbook_directory(shared.path());
    CookbookLoader::new(&mut store, NoRecipes)
        .add_global_cookbooks()
        .unwrap();
    assert_eq!(store.lookup("from"), Some(&Value::from("shared")));
}

#[test]
fn test_load_recipe_consults_later_paths_first() {
    let p1 = TempDir::new().unwrap();
    let p2 = TempDir::new().unwrap();
    write(&p1.path().join("x/x.conf"), "origin: p1\nlist: [p1]\n");
    write(&p2.path().join("x/x.conf"), "origin: p2\nlist: [p2]\n");

    let mut store = create_store(None);
    store.add_recipes_path(p1.path());
    store.add_recipes_path(p2.path());
    CookbookLoader::new(&mut store, NoRecipes)
        .load_recipe("x")
        .unwrap();

    assert_eq!(store.lookup("list"), Some(&seq(&["p2", "p1"])));
    assert_eq!(store.lookup("origin"), Some(&Value::from("p1")));
}

#[test]
fn test_unknown_recipe_is_not_an_error() {
    let p1 = TempDir::new().unwrap();
    let mut store = create_store(None);
    store.add_recipes_path(p1.path());
    CookbookLoader::new(&mut store, NoRecipes)
        .load_recipe("absent")
        .unwrap();
}

#[test]
fn test_full_bootstrap_precedence() {
    let home = TempDir::new().unwrap();
    write(
        &home.path().join(".cookbook/cookbook.conf"),
        "ssh:\n  userId: global\n  remoteHost: global.example.org\n",
    );
    let cookbook = TempDir::new().unwrap();
    write(
        &cookbook.path().join("cookbook.conf"),
        "ssh:\n  userId: deploy\n",
    );
    write(
        &cookbook.path().join("recipes/web/web.conf"),
        "web:\n  port: 80\n  modules: [core]\n",
    );
    write(
        &cookbook.path().join("recipes/web/dev.conf"),
        "web:\n  port: 8080\n  modules: [debug]\n",
    );
    write(
        &cookbook.path().join("recipes/web/nginx/nginx.conf"),
        "web:\n  modules: [nginx]\n",
    );
    write(
        &cookbook.path().join("dev.conf"),
        "ssh:\n  remoteHost: dev.example.org\n",
    );

    let mut store = create_store(Some(home.path().to_path_buf()));
    store.add_config_file_name("dev");
    let mut recipes = Vec::new();
    {
        let mut loader = CookbookLoader::new(&mut store, |path: &Path| -> anyhow::Result<()> {
            recipes.push(path.to_path_buf());
            Ok(())
        });
        loader.add_global_cookbooks().unwrap();
        loader.add_cookbook(cookbook.path()).unwrap();
        loader.load_recipe("web").unwrap();
        loader.load_central_config_files().unwrap();
    }

    assert_eq!(store.lookup("ssh.userId"), Some(&Value::from("deploy")));
    assert_eq!(
        store.lookup("ssh.remoteHost"),
        Some(&Value::from("dev.example.org"))
    );
    assert_eq!(store.lookup("web.port"), Some(&Value::Int(8080)));
    assert_eq!(
        store.lookup("web.modules"),
        Some(&seq(&["nginx", "core", "debug"]))
    );
    assert!(recipes.is_empty());
}

#[test]
fn test_central_files_visit_paths_in_reverse() {
    let p1 = TempDir::new().unwrap();
    let p2 = TempDir::new().unwrap();
    write(&p1.path().join("site.conf"), "site: p1\norder: [p1]\n");
    write(&p2.path().join("site.conf"), "site: p2\norder: [p2]\n");
    write(&p2.path().join("cookbook.conf"), "ignored: true\n");

    let mut store = create_store(None);
    store.add_config_file_name("site.conf");
    store.add_recipes_path(p1.path());
    store.add_recipes_path(p2.path());
    CookbookLoader::new(&mut store, NoRecipes)
        .load_central_config_files()
        .unwrap();

    assert_eq!(store.lookup("order"), Some(&seq(&["p2", "p1"])));
    assert_eq!(store.lookup("site"), Some(&Value::from("p1")));
    assert!(!store.has_key("ignored"));
}

#[test]
fn test_encrypted_fragment_goes_to_encrypted_tree() {
    let cookbook = TempDir::new().unwrap();
    let vault = cookbook.path().join("recipes/db/db.enc");
    fs::create_dir_all(vault.parent().unwrap()).unwrap();
    SymmetricVault::new("kitchen")
        .encode("db:\n  password: hunter2\n", &vault)
        .unwrap();
    write(&cookbook.path().join("recipes/db/db.conf"), "db:\n  user: app\n");

    let mut store = create_store(None);
    {
        let mut loader = CookbookLoader::new(&mut store, NoRecipes);
        loader.add_cookbook(cookbook.path()).unwrap();
        loader.load_recipe("db").unwrap();
    }

    assert_eq!(store.lookup("db.user"), Some(&Value::from("app")));
    assert!(store.lookup("db.password").is_none());
    assert_eq!(
        store.encrypted().lookup("db.password"),
        Some(&Value::from("hunter2"))
    );
}

#[test]
fn test_type_conflict_aborts_bootstrap() {
    let cookbook = TempDir::new().unwrap();
    write(&cookbook.path().join("cookbook.conf"), "deploy: plain\n");
    write(
        &cookbook.path().join("recipes/web/web.conf"),
        "deploy:\n  target: staging\n",
    );

    let mut store = create_store(None);
    let mut loader = CookbookLoader::new(&mut store, NoRecipes);
    loader.add_cookbook(cookbook.path()).unwrap();
    let err = loader.load_recipe("web").unwrap_err();
    assert_eq!(err.code(), cook_conf::error::ErrorCode::TypeConflict);
}

#[test]
fn test_recipe_hook_sees_cookbook_and_recipe_files() {
    let cookbook = TempDir::new().unwrap();
    write(&cookbook.path().join("cookbook.rake"), "");
    write(&cookbook.path().join("recipes/web/web.rake"), "");
    write(&cookbook.path().join("recipes/web/dev.rake"), "");

    let mut store = create_store(None);
    store.add_config_file_name("dev");
    let mut seen: Vec<PathBuf> = Vec::new();
    {
        let mut loader = CookbookLoader::new(&mut store, |path: &Path| -> anyhow::Result<()> {
            seen.push(path.to_path_buf());
            Ok(())
        });
        loader.add_cookbook(cookbook.path()).unwrap();
        loader.load_recipe("web").unwrap();
    }
    assert_eq!(
        seen,
        [
            cookbook.path().join("cookbook.rake"),
            cookbook.path().join("recipes/web/web.rake"),
            cookbook.path().join("recipes/web/dev.rake"),
        ]
    );
}
