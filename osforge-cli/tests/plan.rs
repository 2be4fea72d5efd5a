//! Integration tests for the plan subcommand.

use predicates::prelude::*;

mod common;
use common::osforge;

#[test]
fn test_plan_prints_layout_and_fstab() {
    osforge()
        .args([
            "plan",
            "--disk",
            "0:1:4g:ext4:/",
            "--disk",
            "0:2:512m:swap",
            "--disk",
            "0:3:1g+:ext3:/var",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("/dev/vda1"))
        .stdout(predicate::str::contains("(grow)"))
        .stdout(predicate::str::contains("fstab preview:"))
        .stdout(predicate::str::contains(
            "/dev/vda3\t\t/var\t\text3\tdefaults\t0\t2",
        ));
}

#[test]
fn test_plan_multiple_disks_use_ordinal_letters() {
    osforge()
        .args(["plan", "--disk", "0:1:2g:ext4:/", "--disk", "1:1:1g:ext4:/srv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/dev/vda1"))
        .stdout(predicate::str::contains("/dev/vdb1"));
}

#[test]
fn test_plan_rejects_malformed_spec() {
    osforge()
        .args(["plan", "--disk", "not-a-spec"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed disk spec"));
}

#[test]
fn test_plan_rejects_duplicate_slot() {
    osforge()
        .args(["plan", "--disk", "0:1:1g:ext4:/", "--disk", "0:1:1g:ext3:/var"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("slot 1 already in use"));
}

#[test]
fn test_plan_respects_device_size() {
    osforge()
        .args(["plan", "--disk", "0:1:8g:ext4:/", "--device-size", "4g"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("free"));
}

#[test]
fn test_plan_requires_a_disk_spec() {
    osforge().arg("plan").assert().failure();
}
