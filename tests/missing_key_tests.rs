//! Integration tests for missing-key diagnostics.
//!
//! A traced lookup that misses yields a `MissingKey` carrying the access
//! trace; the store turns it into a report using the help schema that
//! fragments declare under `missingKey`.

use cook_conf::commands::{CommandKind, CommandOptions};
use cook_conf::config::{AccessTrace, ConfigStore, CookbookLoader, Environment, NoRecipes};
use cook_conf::error::{ConfError, ErrorCode};
use std::fs;
use tempfile::TempDir;

const SSH_HELP: &str = r#"
missingKey:
  ssh:
    message: SSH settings for the build host.
    remoteHost:
      message: Host every ssh command connects to.
      valueMessage: where <<value>> is the build host name.
"#;

fn create_store() -> ConfigStore {
    ConfigStore::with_passphrase(Environment::with_dirs(None, None), "kitchen")
}

fn expect_missing(err: ConfError) -> Box<cook_conf::config::MissingKey> {
    match err {
        ConfError::MissingKey(missing) => missing,
        other => panic!("expected a missing key, got {other}"),
    }
}

#[test]
fn test_report_collects_help_general_first() {
    let mut store = create_store();
    store.load_str(SSH_HELP).unwrap();

    let mut trace = AccessTrace::new();
    let err = store
        .conf(&mut trace)
        .enter("ssh")
        .and_then(|mut ssh| ssh.get_str("remoteHost").map(str::to_string))
        .unwrap_err();
    let missing = expect_missing(err);
    assert_eq!(missing.path(), "Conf.ssh");
    assert_eq!(missing.key(), "remoteHost");

    let report = store.diagnose(&missing);
    assert_eq!(
        report.messages(),
        [
            "SSH settings for the build host.",
            "Host every ssh command connects to."
        ]
    );
    assert_eq!(
        report.value_message(),
        Some("where <<value>> is the build host name.")
    );
    assert_eq!(report.template(), "ssh:\n  remoteHost: <<value>>");

    let text = report.render();
    assert!(text.contains("Could not find the key [remoteHost]"));
    assert!(text.contains("in the configuration path [Conf.ssh]"));
    assert!(text.contains("Please ensure your configuration contains the following lines"));
    let general = text.find("SSH settings").unwrap();
    let specific = text.find("Host every ssh").unwrap();
    assert!(general < specific);
}

#[test]
fn test_report_without_help_is_bare() {
    let store = create_store();
    let mut trace = AccessTrace::new();
    let missing = expect_missing(store.get(&mut trace, "deploy.target").unwrap_err());
    assert_eq!(missing.path(), "Conf");
    assert_eq!(missing.key(), "deploy");

    let report = store.diagnose(&missing);
    assert!(!report.has_help());
    let text = report.render();
    assert!(text.contains("Could not find the key [deploy]"));
    assert!(!text.contains("Please ensure"));
}

#[test]
fn test_builtin_cookbook_help() {
    let mut store = create_store();
    store.load_str("global:\n  user: chef\n").unwrap();

    let mut trace = AccessTrace::new();
    let missing = expect_missing(store.get(&mut trace, "global.cookbook").unwrap_err());
    let report = store.diagnose(&missing);
    assert_eq!(report.path(), "Conf.global");
    assert_eq!(report.messages().len(), 2);
    assert!(report.messages()[0].contains("Global parameters"));
    assert!(report.value_message().unwrap().contains("cookbook directory"));
}

#[test]
fn test_help_from_cookbook_fragment() {
    let cookbook = TempDir::new().unwrap();
    fs::write(cookbook.path().join("cookbook.conf"), SSH_HELP).unwrap();

    let mut store = create_store();
    CookbookLoader::new(&mut store, NoRecipes)
        .add_cookbook(cookbook.path())
        .unwrap();
    assert!(!store.has_key("missingKey"));

    let mut trace = AccessTrace::new();
    let err = CommandOptions::resolve(&mut store, &mut trace, CommandKind::Ssh, None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingKey);
    let missing = expect_missing(err);
    assert_eq!(missing.path(), "Conf.ssh");

    let report = store.diagnose(&missing);
    // userId is checked before remoteHost and has no help of its own.
    assert_eq!(report.key(), "userId");
    assert_eq!(report.messages(), ["SSH settings for the build host."]);
    assert_eq!(report.value_message(), None);
}

#[test]
fn test_encrypted_tree_reports_its_own_root() {
    let mut store = create_store();
    store.encrypted_mut().merge_yaml_str("db: {user: app}").unwrap();

    let mut trace = AccessTrace::new();
    let missing = expect_missing(store.get_encrypted(&mut trace, "db.password").unwrap_err());
    assert_eq!(missing.root_name(), "EncryptedConf");
    assert_eq!(missing.path(), "EncryptedConf.db");
    assert_eq!(store.diagnose(&missing).key(), "password");
}

#[test]
fn test_sibling_lookups_do_not_accumulate() {
    let mut store = create_store();
    store
        .load_str("ssh:\n  userId: deploy\n  remoteHost: build.example.org\n")
        .unwrap();

    let mut trace = AccessTrace::new();
    let mut ssh = store.conf(&mut trace).enter("ssh").unwrap();
    assert_eq!(ssh.get_str("userId").unwrap(), "deploy");
    assert_eq!(ssh.get_str("remoteHost").unwrap(), "build.example.org");
    let missing = expect_missing(ssh.get("remotePort").unwrap_err());
    assert_eq!(missing.path(), "Conf.ssh");
    assert_eq!(missing.key(), "remotePort");
}
