//! Capability-based permission sandbox.
//!
//! Each Gopa program runs with an explicit, immutable set of capabilities
//! granted up front (by the CLI's `--perm` flag, the REPL, or the test
//! runner). Anything not granted is denied outright rather than prompted for.

use crate::error::GopaError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Permissions {
    pub network: bool,
    pub files: bool,
    pub graphics: bool,
    pub sound: bool,
    pub packages: bool,
    pub python_ffi: bool,
    pub server: bool,
    pub timers: bool,
    pub cron: bool,
    pub state: bool,
}

impl Permissions {
    /// All capabilities denied, except `packages`, which defaults to granted
    /// (matches `permissions.py`'s `Permissions.__init__`).
    pub fn none() -> Self {
        Permissions {
            packages: true,
            ..Default::default()
        }
    }

    /// Every capability granted. Used by the `gopa test` conformance runner.
    pub fn all() -> Self {
        Permissions {
            network: true,
            files: true,
            graphics: true,
            sound: true,
            packages: true,
            python_ffi: true,
            server: true,
            timers: true,
            cron: true,
            state: true,
        }
    }

    /// Parses a comma-separated capability list, e.g. `"files,network,timers"`.
    /// Unknown tokens are ignored, matching the permissive parsing in
    /// `permissions.py::parse_permissions`. Accepts both `python` and
    /// `python_ffi` as spellings for the Python-FFI capability.
    pub fn parse(spec: &str) -> Self {
        let mut perms = Permissions::none();
        for token in spec.split(',') {
            match token.trim() {
                "network" => perms.network = true,
                "files" => perms.files = true,
                "graphics" => perms.graphics = true,
                "sound" => perms.sound = true,
                "packages" => perms.packages = true,
                "python" | "python_ffi" => perms.python_ffi = true,
                "server" => perms.server = true,
                "timers" => perms.timers = true,
                "cron" => perms.cron = true,
                "state" => perms.state = true,
                _ => {}
            }
        }
        perms
    }

    pub fn check_network(&self) -> Result<(), GopaError> {
        self.require(self.network, "network")
    }

    pub fn check_files(&self) -> Result<(), GopaError> {
        self.require(self.files, "files")
    }

    pub fn check_graphics(&self) -> Result<(), GopaError> {
        self.require(self.graphics, "graphics")
    }

    pub fn check_sound(&self) -> Result<(), GopaError> {
        self.require(self.sound, "sound")
    }

    pub fn check_packages(&self) -> Result<(), GopaError> {
        self.require(self.packages, "packages")
    }

    pub fn check_python_ffi(&self) -> Result<(), GopaError> {
        self.require(self.python_ffi, "python_ffi")
    }

    pub fn check_server(&self) -> Result<(), GopaError> {
        self.require(self.server, "server")
    }

    /// Timers are granted either directly or as a side effect of the
    /// graphics capability (animation loops need timers without asking
    /// twice), matching `permissions.py::check_timers`.
    pub fn check_timers(&self) -> Result<(), GopaError> {
        self.require(self.timers || self.graphics, "timers")
    }

    /// Cron is granted either directly or by the (more general) timers
    /// capability, matching `permissions.py::check_cron`.
    pub fn check_cron(&self) -> Result<(), GopaError> {
        self.require(self.cron || self.timers, "cron")
    }

    pub fn check_state(&self) -> Result<(), GopaError> {
        self.require(self.state, "state")
    }

    fn require(&self, granted: bool, name: &'static str) -> Result<(), GopaError> {
        if granted {
            Ok(())
        } else {
            Err(GopaError::PermissionDenied {
                message: format!("'{name}' permission is required for this operation"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packages_granted_by_default() {
        let perms = Permissions::none();
        assert!(perms.check_packages().is_ok());
        assert!(perms.check_network().is_err());
    }

    #[test]
    fn graphics_implies_timers() {
        let perms = Permissions::parse("graphics");
        assert!(perms.check_timers().is_ok());
        assert!(perms.check_cron().is_err());
    }

    #[test]
    fn timers_implies_cron() {
        let perms = Permissions::parse("timers");
        assert!(perms.check_cron().is_ok());
    }

    #[test]
    fn server_independent_of_graphics() {
        let perms = Permissions::parse("graphics");
        assert!(perms.check_server().is_err());
    }

    #[test]
    fn python_alias_accepted() {
        let perms = Permissions::parse("python");
        assert!(perms.check_python_ffi().is_ok());
    }
}
