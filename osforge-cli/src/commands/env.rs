//! Show the orchestrator environment as this process sees it.

use clap::Args;
use comfy_table::{Table, presets};
use osforge::InstanceEnv;

#[derive(Args, Debug)]
pub struct EnvArgs {}

pub fn execute(_args: EnvArgs) -> anyhow::Result<()> {
    let instance = InstanceEnv::from_env()?;

    println!("instance: {}", instance.instance_name);
    for (label, value) in [
        ("api version", &instance.api_version),
        ("os", &instance.instance_os),
        ("hypervisor", &instance.hypervisor),
        ("debug level", &instance.debug_level),
    ] {
        println!("{label}: {}", value.as_deref().unwrap_or("-"));
    }

    let mut disks = Table::new();
    disks.load_preset(presets::UTF8_FULL);
    disks.set_header(vec!["DISK", "PATH", "ACCESS", "FRONTEND"]);
    for disk in &instance.disks {
        disks.add_row(vec![
            disk.index.to_string(),
            disk.path.clone().unwrap_or_else(|| "-".to_string()),
            disk.access.clone().unwrap_or_else(|| "-".to_string()),
            disk.frontend_type.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{disks}");

    let mut nics = Table::new();
    nics.load_preset(presets::UTF8_FULL);
    nics.set_header(vec!["NIC", "MAC", "IP", "BRIDGE", "FRONTEND"]);
    for nic in &instance.nics {
        nics.add_row(vec![
            nic.index.to_string(),
            nic.mac.clone().unwrap_or_else(|| "-".to_string()),
            nic.ip.clone().unwrap_or_else(|| "-".to_string()),
            nic.bridge.clone().unwrap_or_else(|| "-".to_string()),
            nic.frontend_type.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{nics}");
    Ok(())
}
