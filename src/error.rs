use std::path::PathBuf;

use crate::utils::drive::DriveLetter;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("\"{command}\" failed ({}): {stderr}", exit_code(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to run \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("service discovery failed: {0}")]
    Discovery(#[from] mdns_sd::Error),

    #[error("failed to read config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigFormat(#[from] serde_yaml::Error),

    #[error("server {0} was not found")]
    UnknownServer(String),

    #[error("server {0} has no IPv4 address")]
    NoAddress(String),

    #[error("share {0} is not mounted")]
    NotMounted(String),

    #[error("drive {0} is a local disk")]
    DriveInUse(DriveLetter),

    #[error("no drive letter selected")]
    NoDriveLetter,

    #[error("invalid drive letter \"{0}\"")]
    InvalidDriveLetter(String),

    #[error("invalid server entry \"{0}\"")]
    InvalidServer(String),

    #[error("password lookup failed: {0}")]
    Password(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
