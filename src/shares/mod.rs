use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use crate::utils::drive::DriveLetter;

pub mod net_use;
pub mod net_view;
pub mod smb;

use net_view::NetViewEntry;
use smb::SmbShare;
use crate::utils::mountable::Mountable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountStatus {
    Mounted(DriveLetter),
    NotMounted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub name: String,
    pub status: MountStatus,
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            MountStatus::Mounted(drive) => write!(f, "{} - Mounted on {}", self.name, drive),
            MountStatus::NotMounted => write!(f, "{} - Not Mounted", self.name),
        }
    }
}

/// Pairs each share of `address` with the drive it is mapped on, if any.
pub fn with_status(
    address: Ipv4Addr,
    shares: Vec<NetViewEntry>,
    mapping: &HashMap<String, DriveLetter>,
) -> Vec<Share> {
    shares
        .into_iter()
        .map(|entry| {
            let remote = SmbShare::new(address, &entry.name)
                .get_mount_path()
                .to_lowercase();
            let status = match mapping.get(&remote) {
                Some(drive) => MountStatus::Mounted(*drive),
                None => MountStatus::NotMounted,
            };
            Share {
                name: entry.name,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    use super::net_view::{NetViewEntry, ShareKind};
    use super::{with_status, MountStatus, Share};
    use crate::utils::drive::DriveLetter;

    #[test]
    fn test_display() {
        let z = DriveLetter::new('Z').unwrap();
        let mounted = Share {
            name: "media".to_string(),
            status: MountStatus::Mounted(z),
        };
        let unmounted = Share {
            name: "Backup".to_string(),
            status: MountStatus::NotMounted,
        };
        assert_eq!(mounted.to_string(), "media - Mounted on Z:");
        assert_eq!(unmounted.to_string(), "Backup - Not Mounted");
    }

    #[test]
    fn test_status_ignores_case() {
        let mut mapping = HashMap::new();
        mapping.insert(
            "\\\\10.0.0.2\\photos".to_string(),
            DriveLetter::new('P').unwrap(),
        );
        let shares = vec![
            NetViewEntry {
                name: "Photos".to_string(),
                kind: ShareKind::Disk,
            },
            NetViewEntry {
                name: "music".to_string(),
                kind: ShareKind::Disk,
            },
        ];
        let shares = with_status(Ipv4Addr::new(10, 0, 0, 2), shares, &mapping);
        assert_eq!(
            shares[0].status,
            MountStatus::Mounted(DriveLetter::new('P').unwrap())
        );
        assert_eq!(shares[1].status, MountStatus::NotMounted);
    }
}
