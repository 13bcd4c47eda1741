use std::collections::HashMap;
use std::net::Ipv4Addr;

use log::{error, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::shares::net_use::{self, mounted_drives, mounted_shares_mapping};
use crate::shares::net_view::{disk_shares, net_view};
use crate::shares::smb::{unmount_drive, Credentials, MountOptions, SmbShare};
use crate::shares::{with_status, Share};
use crate::utils::cmd::Shell;
use crate::utils::drive::{available_drive_letters, logical_disks, DriveLetter};
use crate::utils::mountable::Mountable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted(DriveLetter),
    /// The drive was already mapped and the user kept the existing mapping.
    Declined(DriveLetter),
}

pub struct FalseMount<S: Shell> {
    pub settings: Settings,
    shell: S,
}

impl<S: Shell> FalseMount<S> {
    pub fn new(settings: Settings, shell: S) -> Self {
        Self { settings, shell }
    }

    pub fn shell(&self) -> &dyn Shell {
        &self.shell
    }

    /// Lower-cased remote path to drive. Empty if `net use` fails.
    pub fn get_mounted_shares_mapping(&self) -> HashMap<String, DriveLetter> {
        match net_use::net_use(&self.shell) {
            Ok(entries) => mounted_shares_mapping(&entries),
            Err(e) => {
                warn!("Failed to read mapped drives: {e}");
                HashMap::new()
            }
        }
    }

    pub fn list_shares(&self, address: Ipv4Addr) -> Result<Vec<Share>> {
        let shares = net_view(&self.shell, address).inspect_err(|e| {
            error!("Failed to list shares on server {address}: {e}");
        })?;
        let mapping = self.get_mounted_shares_mapping();
        Ok(with_status(address, disk_shares(shares), &mapping))
    }

    pub fn mounted_drives(&self) -> Result<Vec<DriveLetter>> {
        Ok(mounted_drives(&net_use::net_use(&self.shell)?))
    }

    pub fn used_drive_letters(&self) -> Result<Vec<DriveLetter>> {
        let mut used = logical_disks(&self.shell)?;
        used.extend(self.get_mounted_shares_mapping().into_values());
        used.sort();
        used.dedup();
        Ok(used)
    }

    pub fn available_drive_letters(&self) -> Result<Vec<DriveLetter>> {
        Ok(available_drive_letters(&self.used_drive_letters()?))
    }

    /// Mounts `\\address\share` on `drive`. If the drive already carries a
    /// network mapping, `confirm` decides whether it gets replaced.
    pub fn mount_share<C>(
        &self,
        address: Ipv4Addr,
        share: &str,
        drive: Option<DriveLetter>,
        credentials: Option<Credentials>,
        confirm: C,
    ) -> Result<MountOutcome>
    where
        C: FnOnce(DriveLetter) -> bool,
    {
        let drive = drive
            .or(self.settings.default_drive)
            .ok_or(Error::NoDriveLetter)?;
        let mapped = self
            .get_mounted_shares_mapping()
            .into_values()
            .any(|d| d == drive);

        if mapped {
            if !confirm(drive) {
                info!("Keeping existing mapping on {drive}");
                return Ok(MountOutcome::Declined(drive));
            }
            unmount_drive(&self.shell, drive)?;
        } else if logical_disks(&self.shell)?.contains(&drive) {
            return Err(Error::DriveInUse(drive));
        }

        let options = MountOptions {
            credentials,
            persistent: self.settings.persistent,
        };
        SmbShare::new(address, share).mount(&self.shell, drive, &options)?;
        Ok(MountOutcome::Mounted(drive))
    }

    pub fn unmount_drive(&self, drive: DriveLetter) -> Result<()> {
        unmount_drive(&self.shell, drive)
    }

    /// Unmounts whichever drive `\\address\share` is mapped on.
    pub fn unmount_share(&self, address: Ipv4Addr, share: &str) -> Result<DriveLetter> {
        let share = SmbShare::new(address, share);
        let path = share.get_mount_path();
        let drive = self
            .get_mounted_shares_mapping()
            .get(&path.to_lowercase())
            .copied()
            .ok_or(Error::NotMounted(path))?;
        share.unmount(&self.shell, drive)?;
        Ok(drive)
    }

    /// Credentials configured for `server`, with the password resolved.
    pub fn credentials_for(&self, server: &str) -> Result<Option<Credentials>> {
        self.settings
            .credentials_for(server)
            .map(|c| c.resolve(&self.shell))
            .transpose()
    }
}
