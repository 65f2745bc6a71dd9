//! Process environment consulted during bootstrap.

use crate::vault::KeyAgent;
use std::path::PathBuf;

/// Variable naming the active key-agent session's key directory.
pub const AGENT_INFO_VAR: &str = "COOK_AGENT_INFO";

/// Directory name of the per-user global cookbook.
pub const GLOBAL_COOKBOOK_DIR: &str = ".cookbook";

/// Home directory and key-agent session visible to the store.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Home directory (None when unknown or empty)
    pub home: Option<PathBuf>,
    /// Key directory of the active key-agent session, if any
    pub agent_session: Option<PathBuf>,
}

impl Environment {
    /// Discover the environment from the running process.
    pub fn discover() -> Self {
        let home = dirs::home_dir().filter(|h| !h.as_os_str().is_empty());
        let agent_session = std::env::var_os(AGENT_INFO_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            home,
            agent_session,
        }
    }

    /// Create an environment with explicit locations.
    pub fn with_dirs(home: Option<PathBuf>, agent_session: Option<PathBuf>) -> Self {
        Self {
            home,
            agent_session,
        }
    }

    /// `<home>/.cookbook`, when the home location is known.
    pub fn default_global_cookbook(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join(GLOBAL_COOKBOOK_DIR))
    }

    /// Key agent for the active session, if one is running.
    pub fn key_agent(&self) -> Option<KeyAgent> {
        self.agent_session.clone().map(KeyAgent::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_global_cookbook() {
        let env = Environment::with_dirs(Some(PathBuf::from("/home/cook")), None);
        assert_eq!(
            env.default_global_cookbook(),
            Some(PathBuf::from("/home/cook/.cookbook"))
        );
        assert!(env.key_agent().is_none());
    }

    #[test]
    fn test_no_home_no_global_cookbook() {
        let env = Environment::with_dirs(None, Some(PathBuf::from("/tmp/agent")));
        assert!(env.default_global_cookbook().is_none());
        assert!(env.key_agent().is_some());
    }
}
