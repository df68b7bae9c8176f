//! `gopa.toml` package manifest.
//!
//! Grounded in `original_source/gopa_lang/packages.py`'s manifest handling,
//! which falls back to a hand-rolled key=value parser only when the `toml`
//! import is unavailable; that fallback exists purely to work around the
//! Python stdlib's lack of a built-in TOML parser; the real dependency is
//! `toml`, which this crate uses unconditionally.

use std::path::Path;

use serde::Deserialize;

use crate::error::GopaError;

fn default_entry() -> String {
    "src/main.gopa".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_entry")]
    pub entry: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl Manifest {
    pub fn parse(source: &str) -> Result<Manifest, GopaError> {
        toml::from_str(source)
            .map_err(|e| GopaError::File {
                message: format!("failed to parse manifest: {e}"),
            })
    }

    pub fn load(path: &Path) -> Result<Manifest, GopaError> {
        let source = std::fs::read_to_string(path).map_err(|e| GopaError::File {
            message: format!("failed to read manifest {}: {e}", path.display()),
        })?;
        Manifest::parse(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_and_version_default_when_absent() {
        let manifest = Manifest::parse("name = \"demo\"\n").unwrap();
        assert_eq!(manifest.entry, "src/main.gopa");
        assert_eq!(manifest.version, "1.0.0");
        assert!(manifest.permissions.is_empty());
    }

    #[test]
    fn permissions_list_is_parsed() {
        let manifest = Manifest::parse(
            "name = \"demo\"\nversion = \"2.1.0\"\npermissions = [\"network\", \"files\"]\n",
        )
        .unwrap();
        assert_eq!(manifest.permissions, vec!["network", "files"]);
    }
}
