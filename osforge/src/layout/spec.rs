//! The compact `disk:slot:size:fstype[:path]` specification string.

use std::str::FromStr;

use crate::errors::SpecError;
use crate::layout::fstype::FsKind;

/// One parsed partition request from a disk specification string.
///
/// `disk` groups requests onto a device (0-based ordinal in the device
/// list); `slot` is the partition's number in the 4-entry table. The
/// size token is kept raw: the owning disk parses it against device
/// constraints when the partition is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub disk: u32,
    pub slot: u32,
    pub size: String,
    pub fstype: FsKind,
    pub mount_path: Option<String>,
}

impl PartitionSpec {
    /// Parse a `disk:slot:size:fstype[:path]` string.
    ///
    /// Non-swap partitions must carry an absolute mount path; swap
    /// partitions must not carry one.
    pub fn parse(spec: &str) -> Result<Self, SpecError> {
        let malformed = || SpecError::MalformedSpec(spec.to_string());

        let fields: Vec<&str> = spec.split(':').collect();
        if fields.len() < 4 || fields.len() > 5 {
            return Err(malformed());
        }

        let disk: u32 = fields[0].parse().map_err(|_| malformed())?;
        let slot: u32 = fields[1].parse().map_err(|_| malformed())?;
        let size = fields[2].to_string();
        let fstype: FsKind = fields[3].parse()?;
        let mount_path = fields.get(4).map(|p| p.to_string());

        match &mount_path {
            None if !fstype.is_swap() => return Err(SpecError::MissingMountPath),
            Some(path) if fstype.is_swap() => {
                return Err(SpecError::InvalidMountPath(path.clone()));
            }
            Some(path) if !path.starts_with('/') => {
                return Err(SpecError::InvalidMountPath(path.clone()));
            }
            _ => {}
        }

        Ok(Self {
            disk,
            slot,
            size,
            fstype,
            mount_path,
        })
    }
}

impl FromStr for PartitionSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_spec() {
        let spec = PartitionSpec::parse("0:1:10g:ext4:/").unwrap();
        assert_eq!(spec.disk, 0);
        assert_eq!(spec.slot, 1);
        assert_eq!(spec.size, "10g");
        assert_eq!(spec.fstype, FsKind::Ext4);
        assert_eq!(spec.mount_path.as_deref(), Some("/"));
    }

    #[test]
    fn test_parse_swap_without_path() {
        let spec = PartitionSpec::parse("1:2:512m:swap").unwrap();
        assert_eq!(spec.disk, 1);
        assert_eq!(spec.fstype, FsKind::Swap);
        assert!(spec.mount_path.is_none());
    }

    #[test]
    fn test_parse_keeps_size_token_raw() {
        // the parser carries the token untouched; the disk rejects it
        let spec = PartitionSpec::parse("0:1:banana:ext4:/data").unwrap();
        assert_eq!(spec.size, "banana");
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        for spec in ["", "0:1:10g", "0:1:10g:ext4:/:extra"] {
            assert!(
                matches!(
                    PartitionSpec::parse(spec),
                    Err(SpecError::MalformedSpec(_))
                ),
                "{spec:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_disk_or_slot() {
        assert!(matches!(
            PartitionSpec::parse("a:1:10g:ext4:/"),
            Err(SpecError::MalformedSpec(_))
        ));
        assert!(matches!(
            PartitionSpec::parse("0:one:10g:ext4:/"),
            Err(SpecError::MalformedSpec(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_fstype() {
        assert!(matches!(
            PartitionSpec::parse("0:1:10g:ntfs:/"),
            Err(SpecError::UnsupportedFilesystem(_))
        ));
    }

    #[test]
    fn test_parse_requires_path_for_non_swap() {
        assert!(matches!(
            PartitionSpec::parse("0:1:10g:ext4"),
            Err(SpecError::MissingMountPath)
        ));
    }

    #[test]
    fn test_parse_rejects_path_on_swap() {
        assert!(matches!(
            PartitionSpec::parse("0:2:512m:swap:/mnt"),
            Err(SpecError::InvalidMountPath(_))
        ));
    }

    #[test]
    fn test_parse_rejects_relative_path() {
        for spec in ["0:1:10g:ext4:data", "0:1:10g:ext4:"] {
            assert!(
                matches!(
                    PartitionSpec::parse(spec),
                    Err(SpecError::InvalidMountPath(_))
                ),
                "{spec:?} should fail on path"
            );
        }
    }

    #[test]
    fn test_from_str_matches_parse() {
        let parsed: PartitionSpec = "0:3:1g+:ext3:/var".parse().unwrap();
        assert_eq!(parsed, PartitionSpec::parse("0:3:1g+:ext3:/var").unwrap());
    }
}
