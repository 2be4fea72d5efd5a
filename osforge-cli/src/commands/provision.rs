//! Destructive end-to-end provisioning of real block devices.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Args;
use osforge::host::netfiles;
use osforge::util::process::{self, ToolInvocation};
use osforge::util::running_as_root;
use osforge::{
    BootstrapSpec, CleanupStack, Disk, FilesystemGateway, InstanceEnv, OsProfile, PartitionSpec,
    SfdiskTable, ToolGateway, gateway, write_fstab,
};

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Partition spec, disk:slot:size:fstype[:path] (repeatable)
    #[arg(long = "disk", value_name = "SPEC")]
    pub disks: Vec<String>,

    /// Block device for each disk ordinal (repeatable)
    #[arg(long = "device", value_name = "PATH")]
    pub devices: Vec<PathBuf>,

    /// Take device paths and the instance name from the orchestrator
    /// environment
    #[arg(long)]
    pub from_env: bool,

    /// Profile JSON supplying suite/arch/packages/disks defaults
    #[arg(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Directory the new root is mounted under
    #[arg(long, value_name = "DIR", default_value = "/mnt/osforge")]
    pub target: PathBuf,

    /// Suite to bootstrap (e.g. noble)
    #[arg(long)]
    pub suite: Option<String>,

    /// Architecture passed to debootstrap
    #[arg(long)]
    pub arch: Option<String>,

    /// Mirror URL passed to debootstrap
    #[arg(long)]
    pub mirror: Option<String>,

    /// Alternate debootstrap script, passed after the mirror
    #[arg(long, value_name = "PATH")]
    pub bootstrap_script: Option<PathBuf>,

    /// Extra package to include (repeatable)
    #[arg(long = "include", value_name = "PACKAGE")]
    pub include: Vec<String>,

    /// Package tarball cache: unpacked when present, created when missing
    #[arg(long, value_name = "PATH")]
    pub tarball: Option<PathBuf>,

    /// Hostname written into the guest (default: this host's fqdn, or
    /// the orchestrator's instance name with --from-env)
    #[arg(long)]
    pub hostname: Option<String>,

    /// Number of DHCP ethernet stanzas written to the guest
    #[arg(long, default_value_t = 1)]
    pub interfaces: u32,

    /// Script copied into the new root and run through chroot
    #[arg(long, value_name = "PATH")]
    pub chroot_script: Option<PathBuf>,

    /// fsck passes over each filesystem after formatting
    #[arg(long, default_value_t = 0)]
    pub fsck_passes: u32,
}

pub fn execute(args: ProvisionArgs) -> anyhow::Result<()> {
    let profile = match &args.profile {
        Some(path) => Some(OsProfile::load(path)?),
        None => None,
    };

    let instance = if args.from_env {
        Some(InstanceEnv::from_env()?)
    } else {
        None
    };

    // resolution order: flags, then profile, then orchestrator env
    let spec_strings: Vec<String> = if !args.disks.is_empty() {
        args.disks.clone()
    } else if let Some(profile) = &profile {
        profile.disks.clone()
    } else {
        bail!("no partition specs: pass --disk or --profile");
    };
    let specs: Vec<PartitionSpec> = spec_strings
        .iter()
        .map(|raw| raw.parse().with_context(|| format!("--disk {raw}")))
        .collect::<anyhow::Result<_>>()?;

    let devices: Vec<PathBuf> = if !args.devices.is_empty() {
        args.devices.clone()
    } else if let Some(instance) = &instance {
        instance.disk_paths()?.iter().map(PathBuf::from).collect()
    } else {
        bail!("no target devices: pass --device or --from-env");
    };

    let suite = args
        .suite
        .clone()
        .or_else(|| profile.as_ref().map(|p| p.suite.clone()))
        .context("no suite: pass --suite or --profile")?;
    let hostname = match &args.hostname {
        Some(name) => name.clone(),
        None => match &instance {
            Some(instance) => instance.instance_name.clone(),
            None => netfiles::hostname_fqdn()?,
        },
    };
    let tarball = args
        .tarball
        .clone()
        .or_else(|| profile.as_ref().and_then(|p| p.tarball_path.clone()));
    let chroot_script = args.chroot_script.clone().or_else(|| {
        profile
            .as_ref()
            .and_then(|p| p.chroot_script.as_ref().map(PathBuf::from))
    });

    let mut bootstrap = BootstrapSpec::new(suite, &args.target);
    bootstrap.arch = args
        .arch
        .clone()
        .or_else(|| profile.as_ref().map(|p| p.arch.clone()));
    bootstrap.mirror = args.mirror.clone();
    bootstrap.script = args.bootstrap_script.clone();
    bootstrap.include = args.include.clone();
    if let Some(profile) = &profile {
        bootstrap.include.extend(profile.packages.iter().cloned());
    }

    // group partition requests onto their devices
    let mut by_ordinal: BTreeMap<u32, Vec<&PartitionSpec>> = BTreeMap::new();
    for spec in &specs {
        by_ordinal.entry(spec.disk).or_default().push(spec);
    }
    if let Some(highest) = by_ordinal.keys().next_back()
        && *highest as usize >= devices.len()
    {
        bail!(
            "spec references disk {} but only {} device(s) given",
            highest,
            devices.len()
        );
    }

    // everything up to here only resolved arguments; the destructive
    // phase starts now
    if !running_as_root() {
        bail!("provision rewrites partition tables and must run as root");
    }

    let table = Arc::new(SfdiskTable::new());
    let gateway = ToolGateway::new();
    let mut cleanup = CleanupStack::new();

    let mut disks: Vec<Disk> = Vec::with_capacity(by_ordinal.len());
    for (ordinal, specs) in &by_ordinal {
        let device = &devices[*ordinal as usize];
        let mut disk = Disk::open_for_overwrite(*ordinal, device, table.clone())?;
        for spec in specs {
            disk.add_partition(spec.slot, &spec.size, spec.fstype, spec.mount_path.as_deref())
                .with_context(|| format!("disk {} slot {}", spec.disk, spec.slot))?;
        }
        disk.commit(&gateway)?;
        let unmap_device = device.clone();
        cleanup.defer(format!("unmap {}", device.display()), move || {
            gateway::unmap_partitions(&unmap_device)?;
            Ok(())
        });
        disks.push(disk);
    }

    if args.fsck_passes > 0 {
        for disk in &disks {
            for partition in disk.partitions() {
                if let Some(entry) = partition.table_entry() {
                    gateway.check_filesystem(&entry.node, partition.fstype(), args.fsck_passes)?;
                }
            }
        }
    }

    mount_all(&disks, &args.target, &mut cleanup)?;

    match &tarball {
        Some(path) if path.exists() => bootstrap.unpack_tarball(path)?,
        Some(path) => bootstrap.make_tarball(path)?,
        None => bootstrap.run()?,
    }

    write_fstab(&args.target, &disks)?;
    netfiles::write_hosts(&args.target, &hostname)?;
    netfiles::write_interfaces(&args.target, args.interfaces)?;

    if let Some(script) = &chroot_script {
        run_chroot_script(&args.target, script)?;
    }

    cleanup.run();
    tracing::info!(
        hostname,
        target = %args.target.display(),
        disks = disks.len(),
        "provisioning finished"
    );
    println!("{hostname} provisioned on {} disk(s)", disks.len());
    Ok(())
}

/// Mount every partition that carries a path, parents before children,
/// and register the matching umounts.
fn mount_all(disks: &[Disk], target: &Path, cleanup: &mut CleanupStack) -> anyhow::Result<()> {
    let mut mounts: Vec<(&str, &Path)> = disks
        .iter()
        .flat_map(|disk| disk.partitions())
        .filter_map(|p| Some((p.mount_path()?, p.device_node()?)))
        .collect();
    // "/" must come first whatever its slot
    mounts.sort_by_key(|(path, _)| Path::new(path).components().count());

    for (mount_path, node) in mounts {
        let mount_point = target.join(mount_path.trim_start_matches('/'));
        fs::create_dir_all(&mount_point)?;
        gateway::mount(node, &mount_point)?;
        let umount_point = mount_point.clone();
        cleanup.defer(format!("umount {}", mount_point.display()), move || {
            gateway::umount(&umount_point)?;
            Ok(())
        });
    }
    Ok(())
}

/// Copy `script` into `<target>/tmp` and run it inside the chroot.
fn run_chroot_script(target: &Path, script: &Path) -> anyhow::Result<()> {
    let name = script
        .file_name()
        .with_context(|| format!("chroot script has no file name: {}", script.display()))?;
    let tmp = target.join("tmp");
    fs::create_dir_all(&tmp)?;
    let staged = tmp.join(name);
    fs::copy(script, &staged)
        .with_context(|| format!("copying {} into the new root", script.display()))?;
    fs::set_permissions(&staged, fs::Permissions::from_mode(0o755))?;

    let inner = format!("/tmp/{}", name.to_string_lossy());
    tracing::info!(script = %inner, "running chroot script");
    process::run_in_chroot(target, &ToolInvocation::new(inner))?;
    Ok(())
}
