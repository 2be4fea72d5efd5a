//! Wrappers over the cluster manager's `gnt-*` tools.
//!
//! A provisioning host is one node of a larger cluster. These helpers
//! ask the master for inventory and push commands or files across the
//! node set, for hooks that keep every node's provisioning inputs in
//! step.

use std::io;
use std::path::Path;

use crate::errors::{ExecError, OsforgeResult};
use crate::util::process::{self, ToolInvocation};

/// Instances known to the cluster, one line per instance with the
/// requested `columns`.
pub fn instance_list(columns: &[&str]) -> Result<Vec<String>, ExecError> {
    run_list(list_invocation("gnt-instance", columns))
}

/// Nodes of the cluster, one line per node with the requested
/// `columns`.
pub fn node_list(columns: &[&str]) -> Result<Vec<String>, ExecError> {
    run_list(list_invocation("gnt-node", columns))
}

/// Hostname of the current master node.
pub fn cluster_master() -> Result<String, ExecError> {
    let output = process::run(&ToolInvocation::new("gnt-cluster").arg("getmaster"))?;
    Ok(output.stdout.trim().to_string())
}

/// Run a shell command on every node, or only on `nodes` when given.
/// Returns the combined remote output.
pub fn cluster_command(command: &str, nodes: &[&str]) -> Result<String, ExecError> {
    tracing::info!(command, nodes = nodes.len(), "running cluster-wide command");
    let output = process::run(&command_invocation(command, nodes))?;
    Ok(output.stdout.trim().to_string())
}

/// Copy a local file to the same path on every node, or only on
/// `nodes` when given.
pub fn cluster_copyfile(file: &Path, nodes: &[&str]) -> OsforgeResult<()> {
    if !file.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", file.display()),
        )
        .into());
    }
    tracing::info!(file = %file.display(), nodes = nodes.len(), "copying file to cluster nodes");
    process::run(&copyfile_invocation(file, nodes))?;
    Ok(())
}

fn run_list(invocation: ToolInvocation) -> Result<Vec<String>, ExecError> {
    let output = process::run(&invocation)?;
    Ok(output.stdout.trim().lines().map(str::to_string).collect())
}

fn list_invocation(tool: &str, columns: &[&str]) -> ToolInvocation {
    ToolInvocation::new(tool)
        .arg("list")
        .arg("--no-headers")
        .arg(format!("--output={}", columns.join(",")))
}

fn command_invocation(command: &str, nodes: &[&str]) -> ToolInvocation {
    node_flags(ToolInvocation::new("gnt-cluster").arg("command"), nodes).arg(command)
}

fn copyfile_invocation(file: &Path, nodes: &[&str]) -> ToolInvocation {
    node_flags(ToolInvocation::new("gnt-cluster").arg("copyfile"), nodes).arg(file)
}

fn node_flags(invocation: ToolInvocation, nodes: &[&str]) -> ToolInvocation {
    nodes
        .iter()
        .fold(invocation, |inv, node| inv.arg(format!("--node={node}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OsforgeError;

    #[test]
    fn test_list_invocations() {
        assert_eq!(
            list_invocation("gnt-instance", &["name"]).command_line(),
            "gnt-instance list --no-headers --output=name"
        );
        assert_eq!(
            list_invocation("gnt-node", &["name", "dtotal", "dfree"]).command_line(),
            "gnt-node list --no-headers --output=name,dtotal,dfree"
        );
    }

    #[test]
    fn test_command_targets_named_nodes() {
        assert_eq!(
            command_invocation("uptime", &["node1", "node2"]).command_line(),
            "gnt-cluster command --node=node1 --node=node2 uptime"
        );
        // no --node flags addresses every node
        assert_eq!(
            command_invocation("uptime", &[]).command_line(),
            "gnt-cluster command uptime"
        );
    }

    #[test]
    fn test_copyfile_invocation() {
        assert_eq!(
            copyfile_invocation(Path::new("/etc/hosts"), &["node2"]).command_line(),
            "gnt-cluster copyfile --node=node2 /etc/hosts"
        );
    }

    #[test]
    fn test_copyfile_rejects_missing_file() {
        let err = cluster_copyfile(Path::new("/osforge/no/such/file"), &[]).unwrap_err();
        match err {
            OsforgeError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
