//! Free space on the volume holding the data directory.

use std::path::{Path, PathBuf};

use log::debug;
use sysinfo::Disks;
use thiserror::Error;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("cannot resolve {}: {source}", .path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no mounted volume contains {}", .0.display())]
    NoVolume(PathBuf),
}

pub trait DiskSpaceProbe {
    /// Free megabytes on the volume holding `path`.
    fn free_mb(&mut self, path: &Path) -> Result<u64, DiskError>;
}

/// Probe backed by the system mount table.
#[derive(Debug, Default)]
pub struct SystemDiskProbe;

impl DiskSpaceProbe for SystemDiskProbe {
    fn free_mb(&mut self, path: &Path) -> Result<u64, DiskError> {
        let path = path.canonicalize().map_err(|source| DiskError::Resolve {
            path: path.to_path_buf(),
            source,
        })?;
        let disks = Disks::new_with_refreshed_list();

        let disk = containing_volume(&path, disks.list(), |disk| disk.mount_point())
            .ok_or_else(|| DiskError::NoVolume(path.clone()))?;

        let free = disk.available_space() / BYTES_PER_MB;
        debug!(
            "{} is on {} with {} MB free",
            path.display(),
            disk.mount_point().display(),
            free
        );
        Ok(free)
    }
}

/// Probe reporting a constant, for the simulator and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedDiskProbe(pub u64);

impl DiskSpaceProbe for FixedDiskProbe {
    fn free_mb(&mut self, _path: &Path) -> Result<u64, DiskError> {
        Ok(self.0)
    }
}

/// The volume whose mount point is the longest prefix of `path`.
fn containing_volume<'a, T>(
    path: &Path,
    volumes: &'a [T],
    mount_point: impl Fn(&T) -> &Path,
) -> Option<&'a T> {
    volumes
        .iter()
        .filter(|volume| path.starts_with(mount_point(volume)))
        .max_by_key(|volume| mount_point(volume).as_os_str().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_mount_wins() {
        let mounts = ["/", "/home", "/home/pi/usb"];
        let best = |path: &str| {
            containing_volume(Path::new(path), &mounts, |m| Path::new(*m)).copied()
        };

        assert_eq!(best("/home/pi/usb/data"), Some("/home/pi/usb"));
        assert_eq!(best("/home/pi/data"), Some("/home"));
        assert_eq!(best("/var/log"), Some("/"));
        // Prefix matching is per component, not per character
        assert_eq!(best("/homework"), Some("/"));
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let mut probe = SystemDiskProbe;
        assert!(matches!(
            probe.free_mb(Path::new("/definitely/not/here")),
            Err(DiskError::Resolve { .. })
        ));
    }

    #[test]
    fn test_fixed_probe() {
        assert_eq!(FixedDiskProbe(512).free_mb(Path::new("/")).unwrap(), 512);
    }
}
