use crate::error::Result;
use crate::utils::cmd::Shell;
use crate::utils::drive::DriveLetter;

pub trait Mountable {
    type Options;

    fn mount(&self, shell: &dyn Shell, drive: DriveLetter, options: &Self::Options) -> Result<()>;
    fn unmount(&self, shell: &dyn Shell, drive: DriveLetter) -> Result<()>;
    fn get_mount_path(&self) -> String;
}
