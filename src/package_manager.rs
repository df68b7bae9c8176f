//! Package install/use, grounded in `original_source/gopa_lang/packages.py`.
//!
//! `use_package` resolves a package name to a parsed statement list rather
//! than executing it itself, so this module never needs to know about
//! `Interpreter` — the caller runs the returned statements in its own scope,
//! the same way `packages.py::_load_gopa_file` runs loaded statements
//! through the live interpreter it was handed.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::ast::Stmt;
use crate::error::GopaError;
use crate::lexer::Lexer;
use crate::manifest::Manifest;
use crate::parser;
use crate::permissions::Permissions;

const BUNDLED_STDLIB: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/stdlib");

pub struct LoadedPackage {
    pub version: String,
    pub manifest: Manifest,
}

pub struct PackageManager {
    packages_dir: PathBuf,
    loaded: HashMap<String, LoadedPackage>,
}

impl PackageManager {
    pub fn new() -> Result<Self, GopaError> {
        let packages_dir = dirs::home_dir()
            .ok_or_else(|| GopaError::File {
                message: "could not determine home directory".to_string(),
            })?
            .join(".gopa_packages");
        fs::create_dir_all(&packages_dir).map_err(|e| GopaError::File {
            message: format!("failed to create {}: {e}", packages_dir.display()),
        })?;
        Ok(PackageManager {
            packages_dir,
            loaded: HashMap::new(),
        })
    }

    pub fn install(&self, permissions: &Permissions, package_name: &str) -> Result<(), GopaError> {
        permissions.check_packages()?;

        if package_name.starts_with("./")
            || package_name.starts_with("../")
            || PathBuf::from(package_name).is_absolute()
        {
            self.install_local(package_name)
        } else {
            self.install_registry(package_name)
        }
    }

    fn install_local(&self, path: &str) -> Result<(), GopaError> {
        let source_path = fs::canonicalize(path).map_err(|_| GopaError::File {
            message: format!("package path not found: {path}"),
        })?;

        let manifest_path = source_path.join("gopa.toml");
        if !manifest_path.exists() {
            return Err(GopaError::File {
                message: format!("manifest not found: {}", manifest_path.display()),
            });
        }
        let manifest = Manifest::load(&manifest_path)?;

        let target_dir = self
            .packages_dir
            .join(&manifest.name)
            .join(&manifest.version);
        fs::create_dir_all(&target_dir).map_err(|e| GopaError::File {
            message: format!("failed to create {}: {e}", target_dir.display()),
        })?;

        let source_src = source_path.join("src");
        if source_src.exists() {
            copy_dir_recursive(&source_src, &target_dir.join("src"))?;
        } else {
            for entry in fs::read_dir(&source_path).map_err(|e| GopaError::File {
                message: e.to_string(),
            })? {
                let entry = entry.map_err(|e| GopaError::File {
                    message: e.to_string(),
                })?;
                if entry.file_name() == "gopa.toml" {
                    continue;
                }
                let dest = target_dir.join(entry.file_name());
                if entry.path().is_dir() {
                    copy_dir_recursive(&entry.path(), &dest)?;
                } else {
                    fs::copy(entry.path(), &dest).map_err(|e| GopaError::File {
                        message: e.to_string(),
                    })?;
                }
            }
        }

        fs::copy(&manifest_path, target_dir.join("gopa.toml")).map_err(|e| GopaError::File {
            message: e.to_string(),
        })?;

        log::info!("installed {} v{}", manifest.name, manifest.version);
        Ok(())
    }

    fn install_registry(&self, package_name: &str) -> Result<(), GopaError> {
        let registry_url = std::env::var("REGISTRY_URL").unwrap_or_default();
        if registry_url.is_empty() {
            return Err(GopaError::File {
                message: "registry URL not configured; set REGISTRY_URL".to_string(),
            });
        }
        Err(GopaError::File {
            message: format!(
                "registry installation not implemented; use a local path: ./{package_name}"
            ),
        })
    }

    /// Resolves `package_name` to parsed statements, checking the package's
    /// declared permission requirements against what the running program was
    /// granted. Bundled stdlib packages are tried before user-installed ones.
    pub fn use_package(
        &mut self,
        permissions: &Permissions,
        package_name: &str,
    ) -> Result<Vec<Stmt>, GopaError> {
        permissions.check_packages()?;

        let stdlib_path = PathBuf::from(BUNDLED_STDLIB).join(format!("{package_name}.gopa"));
        if stdlib_path.exists() {
            return load_gopa_file(&stdlib_path);
        }

        let package_dir = self.packages_dir.join(package_name);
        if !package_dir.exists() {
            return Err(GopaError::File {
                message: format!("package '{package_name}' not found; install it first"),
            });
        }

        let mut versions: Vec<String> = fs::read_dir(&package_dir)
            .map_err(|e| GopaError::File {
                message: e.to_string(),
            })?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        versions.sort();
        versions.reverse();
        let version = versions.into_iter().next().ok_or_else(|| GopaError::File {
            message: format!("no version found for package '{package_name}'"),
        })?;

        let version_dir = package_dir.join(&version);
        let manifest_path = version_dir.join("gopa.toml");
        let manifest = Manifest::load(&manifest_path)?;

        for perm in &manifest.permissions {
            let granted = match perm.as_str() {
                "network" => permissions.network,
                "files" => permissions.files,
                "graphics" => permissions.graphics,
                "sound" => permissions.sound,
                "python_ffi" => permissions.python_ffi,
                _ => true,
            };
            if !granted {
                return Err(GopaError::PermissionDenied {
                    message: format!("package '{package_name}' requires '{perm}' permission"),
                });
            }
        }

        let entry_path = version_dir.join(&manifest.entry);
        if !entry_path.exists() {
            return Err(GopaError::File {
                message: format!("entry file not found: {}", entry_path.display()),
            });
        }

        let stmts = load_gopa_file(&entry_path)?;
        self.loaded.insert(
            package_name.to_string(),
            LoadedPackage { version, manifest },
        );
        Ok(stmts)
    }
}

fn load_gopa_file(path: &PathBuf) -> Result<Vec<Stmt>, GopaError> {
    let source = fs::read_to_string(path).map_err(|e| GopaError::File {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    let tokens = Lexer::tokenize(&source)?;
    parser::parse(tokens)
}

fn copy_dir_recursive(from: &std::path::Path, to: &std::path::Path) -> Result<(), GopaError> {
    fs::create_dir_all(to).map_err(|e| GopaError::File {
        message: e.to_string(),
    })?;
    for entry in fs::read_dir(from).map_err(|e| GopaError::File {
        message: e.to_string(),
    })? {
        let entry = entry.map_err(|e| GopaError::File {
            message: e.to_string(),
        })?;
        let dest = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|e| GopaError::File {
                message: e.to_string(),
            })?;
        }
    }
    Ok(())
}
