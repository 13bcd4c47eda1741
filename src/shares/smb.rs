use std::net::Ipv4Addr;

use log::info;
use secstr::SecUtf8;

use crate::error::Result;
use crate::utils::cmd::{run_cmd_checked, CommandLine, Shell};
use crate::utils::drive::DriveLetter;
use crate::utils::mountable::Mountable;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: Option<SecUtf8>,
}

#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    pub credentials: Option<Credentials>,
    /// `None` leaves the `net use` default in place.
    pub persistent: Option<bool>,
}

/// A disk share on an SMB server, addressed by IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbShare {
    pub address: Ipv4Addr,
    pub name: String,
}

impl SmbShare {
    pub fn new(address: Ipv4Addr, name: &str) -> Self {
        Self {
            address,
            name: name.to_string(),
        }
    }
}

/// `net use X: /delete /y`
pub fn unmount_drive(shell: &dyn Shell, drive: DriveLetter) -> Result<()> {
    let cmd = CommandLine::new("net")
        .arg("use")
        .arg(drive.to_string())
        .arg("/delete")
        .arg("/y");
    run_cmd_checked(shell, &cmd)?;
    info!("Unmounted {drive}");
    Ok(())
}

impl Mountable for SmbShare {
    type Options = MountOptions;

    fn mount(&self, shell: &dyn Shell, drive: DriveLetter, options: &MountOptions) -> Result<()> {
        let path = self.get_mount_path();
        let mut cmd = CommandLine::new("net")
            .arg("use")
            .arg(drive.to_string())
            .arg(path.as_str());
        if let Some(credentials) = &options.credentials {
            if let Some(password) = &credentials.password {
                cmd = cmd.secret_arg(password.clone());
            }
            cmd = cmd.arg(format!("/user:{}", credentials.user));
        }
        if let Some(persistent) = options.persistent {
            cmd = cmd.arg(if persistent {
                "/persistent:yes"
            } else {
                "/persistent:no"
            });
        }
        run_cmd_checked(shell, &cmd)?;
        info!("Mounted {path} to {drive}");
        Ok(())
    }

    fn unmount(&self, shell: &dyn Shell, drive: DriveLetter) -> Result<()> {
        unmount_drive(shell, drive)
    }

    fn get_mount_path(&self) -> String {
        format!("\\\\{}\\{}", self.address, self.name)
    }
}
