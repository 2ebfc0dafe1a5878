//! Volume metadata lookup.
//!
//! The frame checks need the volume UUID o2locktop prints in its title line
//! and the volume's inode count, which bounds every row's inode. Both come
//! from standard tools (`o2info`, `df`) run on this machine or on the first
//! cluster node.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::remote::{shell_quote, Host};

/// Failures that make a run impossible to start.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("you must input the mount point")]
    MissingMountPoint,
    #[error("can't get the max inode for {mount_point}: {reason}")]
    MaxInode { mount_point: String, reason: String },
    #[error("can't get the uuid for {mount_point}: {reason}")]
    VolumeUuid { mount_point: String, reason: String },
}

/// Identity and size of the monitored volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeInfo {
    pub uuid: String,
    pub max_inode: u64,
}

/// Resolve the volume behind `mount_point` on `host`.
pub fn resolve(host: &Host, mount_point: &str) -> Result<VolumeInfo, SetupError> {
    let uuid = volume_uuid(host, mount_point)?;
    let max_inode = max_inode(host, mount_point)?;
    info!(host = host.name(), mount_point, uuid = %uuid, max_inode, "resolved volume");
    Ok(VolumeInfo { uuid, max_inode })
}

fn volume_uuid(host: &Host, mount_point: &str) -> Result<String, SetupError> {
    let fail = |reason: String| {
        error!("can't get the uuid according to the mount_point: {reason}");
        SetupError::VolumeUuid {
            mount_point: mount_point.to_string(),
            reason,
        }
    };
    let output = host
        .run(&format!("o2info --volinfo {}", shell_quote(mount_point)))
        .map_err(|e| fail(format!("{e:#}")))?;
    parse_uuid(&output).ok_or_else(|| fail("no UUID in o2info output".to_string()))
}

fn max_inode(host: &Host, mount_point: &str) -> Result<u64, SetupError> {
    let fail = |reason: String| {
        error!("can't get the max inode according to the mount_point: {reason}");
        SetupError::MaxInode {
            mount_point: mount_point.to_string(),
            reason,
        }
    };
    let output = host
        .run("df -P -i")
        .map_err(|e| fail(format!("{e:#}")))?;
    parse_max_inode(&output, mount_point)
        .ok_or_else(|| fail(format!("{mount_point} not found in df output")))
}

/// Pull the UUID out of `o2info --volinfo` output.
pub fn parse_uuid(volinfo: &str) -> Option<String> {
    volinfo
        .lines()
        .find(|line| line.contains("UUID"))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
}

/// Pull the inode count for `mount_point` out of `df -P -i` output.
pub fn parse_max_inode(df: &str, mount_point: &str) -> Option<u64> {
    df.lines().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.last() != Some(&mount_point) {
            return None;
        }
        tokens.get(1)?.parse().ok()
    })
}
