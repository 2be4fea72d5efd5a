//! Base system installation via debootstrap.

use std::path::{Path, PathBuf};

use crate::errors::OsforgeResult;
use crate::util::process::{self, ToolInvocation};

/// Archive areas enabled for every bootstrap run.
const BOOTSTRAP_COMPONENTS: &str = "main,restricted,universe,multiverse";

/// Parameters for one debootstrap run.
///
/// `arch` and `mirror` fall back to debootstrap's own defaults when
/// unset; `include` adds packages on top of the base set. `script`
/// names an alternate bootstrap script, the fourth positional in
/// debootstrap's `<suite> <target> [<mirror> [<script>]]` grammar.
#[derive(Debug, Clone)]
pub struct BootstrapSpec {
    pub suite: String,
    pub target: PathBuf,
    pub arch: Option<String>,
    pub mirror: Option<String>,
    pub script: Option<PathBuf>,
    pub include: Vec<String>,
}

enum TarballMode<'a> {
    Direct,
    Make(&'a Path),
    Unpack(&'a Path),
}

impl BootstrapSpec {
    pub fn new(suite: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            suite: suite.into(),
            target: target.into(),
            arch: None,
            mirror: None,
            script: None,
            include: Vec::new(),
        }
    }

    /// Install the base system straight into the target directory.
    pub fn run(&self) -> OsforgeResult<()> {
        self.execute(TarballMode::Direct)
    }

    /// Install the base system and also write a tarball of the
    /// downloaded packages, for later [`unpack_tarball`](Self::unpack_tarball) runs.
    pub fn make_tarball(&self, tarball: &Path) -> OsforgeResult<()> {
        self.execute(TarballMode::Make(tarball))
    }

    /// Install the base system from a previously made tarball,
    /// skipping the package download.
    pub fn unpack_tarball(&self, tarball: &Path) -> OsforgeResult<()> {
        self.execute(TarballMode::Unpack(tarball))
    }

    fn execute(&self, mode: TarballMode<'_>) -> OsforgeResult<()> {
        let invocation = self.invocation(mode);
        tracing::info!(
            suite = %self.suite,
            target = %self.target.display(),
            command = %invocation.command_line(),
            "bootstrapping base system"
        );
        process::run(&invocation)?;
        Ok(())
    }

    fn invocation(&self, mode: TarballMode<'_>) -> ToolInvocation {
        let mut invocation = ToolInvocation::new("debootstrap").arg("--verbose");
        match mode {
            TarballMode::Direct => {}
            TarballMode::Make(tarball) => {
                invocation = invocation.arg(format!("--make-tarball={}", tarball.display()));
            }
            TarballMode::Unpack(tarball) => {
                invocation = invocation.arg(format!("--unpack-tarball={}", tarball.display()));
            }
        }
        invocation = invocation.arg(format!("--components={BOOTSTRAP_COMPONENTS}"));
        if let Some(arch) = &self.arch {
            invocation = invocation.arg(format!("--arch={arch}"));
        }
        if !self.include.is_empty() {
            invocation = invocation.arg(format!("--include={}", self.include.join(",")));
        }
        invocation = invocation.arg(&self.suite).arg(&self.target);
        match (&self.mirror, &self.script) {
            (Some(mirror), Some(script)) => {
                invocation = invocation.arg(mirror).arg(script);
            }
            (Some(mirror), None) => invocation = invocation.arg(mirror),
            (None, Some(script)) => {
                // an empty mirror argument keeps debootstrap's default
                // while holding the script in the fourth slot
                invocation = invocation.arg("").arg(script);
            }
            (None, None) => {}
        }
        invocation
    }
}
