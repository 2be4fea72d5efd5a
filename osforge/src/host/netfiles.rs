//! Guest network identity files: hosts, hostname, interfaces.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{ExecError, OsforgeResult};
use crate::util::process::{self, ToolInvocation};

/// Render the guest `/etc/hosts` for `fqdn`.
///
/// The short alias is the fqdn up to the first dot. The IPv6
/// boilerplate matches what ifupdown-based images expect.
pub fn render_hosts(fqdn: &str) -> String {
    let alias = fqdn.split_once('.').map_or(fqdn, |(short, _)| short);
    let mut out = String::new();
    out.push_str("127.0.0.1\t\tlocalhost.localdomain\t\tlocalhost\n");
    out.push_str(&format!("127.0.0.1\t\t{fqdn}\t\t{alias}\n"));
    out.push_str("fe00::0\t\tip6-localnet\n");
    out.push_str("ff00::0\t\tip6-mcastprefix\n");
    out.push_str("ff02::1\t\tip6-allnodes\n");
    out.push_str("ff02::2\t\tip6-allrouters\n");
    out.push_str("ff02::3\t\tip6-allhosts\n");
    out
}

/// Write `etc/hosts` and `etc/hostname` under `root`.
pub fn write_hosts(root: &Path, fqdn: &str) -> OsforgeResult<()> {
    let etc = root.join("etc");
    fs::create_dir_all(&etc)?;
    let hosts_path = etc.join("hosts");
    tracing::debug!(path = %hosts_path.display(), fqdn, "writing hosts file");
    fs::write(&hosts_path, render_hosts(fqdn))?;
    fs::write(etc.join("hostname"), format!("{fqdn}\n"))?;
    Ok(())
}

/// Render an ifupdown `interfaces` file with loopback plus `count`
/// DHCP ethernet stanzas.
pub fn render_interfaces(count: u32) -> String {
    let mut out = String::from("auto lo\niface lo inet loopback\n\n");
    for i in 0..count {
        out.push_str(&format!("auto eth{i}\niface eth{i} inet dhcp\n\n"));
    }
    out
}

/// Write `etc/network/interfaces` under `root`. Returns the path
/// written.
pub fn write_interfaces(root: &Path, count: u32) -> OsforgeResult<PathBuf> {
    let network = root.join("etc/network");
    fs::create_dir_all(&network)?;
    let path = network.join("interfaces");
    tracing::debug!(path = %path.display(), count, "writing interfaces file");
    fs::write(&path, render_interfaces(count))?;
    Ok(path)
}

/// The provisioning host's own fully qualified name, for guests that
/// inherit it.
pub fn hostname_fqdn() -> Result<String, ExecError> {
    let output = process::run(&ToolInvocation::new("hostname").arg("--fqdn"))?;
    let fqdn = output.stdout.trim();
    if fqdn.is_empty() {
        return Err(ExecError::unexpected_output(
            "hostname",
            "empty output for --fqdn",
        ));
    }
    Ok(fqdn.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_hosts_golden() {
        let expected = "\
127.0.0.1\t\tlocalhost.localdomain\t\tlocalhost
127.0.0.1\t\tweb1.example.com\t\tweb1
fe00::0\t\tip6-localnet
ff00::0\t\tip6-mcastprefix
ff02::1\t\tip6-allnodes
ff02::2\t\tip6-allrouters
ff02::3\t\tip6-allhosts
";
        assert_eq!(render_hosts("web1.example.com"), expected);
    }

    #[test]
    fn test_render_hosts_undotted_name_is_its_own_alias() {
        let rendered = render_hosts("standalone");
        assert!(rendered.contains("127.0.0.1\t\tstandalone\t\tstandalone\n"));
    }

    #[test]
    fn test_write_hosts_writes_hostname_too() {
        let dir = tempfile::tempdir().unwrap();
        write_hosts(dir.path(), "web1.example.com").unwrap();
        let hostname = fs::read_to_string(dir.path().join("etc/hostname")).unwrap();
        assert_eq!(hostname, "web1.example.com\n");
        let hosts = fs::read_to_string(dir.path().join("etc/hosts")).unwrap();
        assert!(hosts.contains("web1.example.com\t\tweb1\n"));
    }

    #[test]
    fn test_render_interfaces_counts() {
        assert_eq!(
            render_interfaces(0),
            "auto lo\niface lo inet loopback\n\n"
        );
        let two = render_interfaces(2);
        assert!(two.contains("auto eth0\niface eth0 inet dhcp\n\n"));
        assert!(two.contains("auto eth1\niface eth1 inet dhcp\n\n"));
        assert!(!two.contains("eth2"));
    }

    #[test]
    fn test_write_interfaces_creates_network_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_interfaces(dir.path(), 1).unwrap();
        assert_eq!(path, dir.path().join("etc/network/interfaces"));
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("auto lo\n"));
    }
}
