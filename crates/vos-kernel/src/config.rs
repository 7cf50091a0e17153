// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Kernel configuration, loadable from TOML

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{KernelError, KernelResult};

/// Permission enforcement switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityPolicy {
    /// Check permission bits at all
    pub enforce_permissions: bool,
    /// uid 0 passes every bit check
    pub root_bypass_permissions: bool,
    /// Require execute on each directory traversed
    pub enforce_search_permission: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            enforce_permissions: true,
            root_bypass_permissions: true,
            enforce_search_permission: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KernelConfig {
    pub hostname: String,
    pub root_password: String,
    /// Installed with mode 4755 instead of 755
    pub setuid_programs: Vec<String>,
    /// Source of `/sbin/init`
    pub init_source: String,
    /// Where `Kernel::save` writes
    pub snapshot_path: Option<PathBuf>,
    pub security: SecurityPolicy,
    /// Programs installed into `/bin`, name to source text
    pub programs: BTreeMap<String, String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            root_password: "password".to_string(),
            setuid_programs: vec!["su".to_string(), "sudo".to_string(), "passwd".to_string()],
            init_source: String::new(),
            snapshot_path: None,
            security: SecurityPolicy::default(),
            programs: BTreeMap::new(),
        }
    }
}

impl KernelConfig {
    pub fn from_toml_str(text: &str) -> KernelResult<Self> {
        toml::from_str(text).map_err(|e| KernelError::Config(e.to_string()))
    }

    pub fn from_path(path: &Path) -> KernelResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> KernelResult<String> {
        toml::to_string_pretty(self).map_err(|e| KernelError::Config(e.to_string()))
    }

    pub fn is_setuid_program(&self, name: &str) -> bool {
        self.setuid_programs.iter().any(|p| p == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.hostname, "localhost");
        assert!(config.security.enforce_permissions);
        assert!(config.is_setuid_program("passwd"));
        assert!(!config.is_setuid_program("cat"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = KernelConfig::from_toml_str(
            r#"
hostname = "blackhat"
setuid-programs = ["ping"]

[security]
root-bypass-permissions = false

[programs]
hello = "print('hello')"
"#,
        )
        .expect("config should parse");
        assert_eq!(config.hostname, "blackhat");
        assert_eq!(config.root_password, "password");
        assert!(!config.security.root_bypass_permissions);
        assert!(config.security.enforce_search_permission);
        assert_eq!(config.programs.get("hello").map(String::as_str), Some("print('hello')"));
        assert!(config.is_setuid_program("ping"));
        assert!(!config.is_setuid_program("su"));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "hostname = \"box\"").expect("write");
        let config = KernelConfig::from_path(file.path()).expect("load");
        assert_eq!(config.hostname, "box");

        let round = KernelConfig::from_toml_str(&config.to_toml_string().expect("render"))
            .expect("reparse");
        assert_eq!(round, config);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            KernelConfig::from_toml_str("hostname = 5"),
            Err(KernelError::Config(_))
        ));
    }
}
