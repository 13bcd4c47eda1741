use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use etcetera::BaseStrategy;
use log::debug;
use secstr::SecUtf8;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst};

use crate::discovery::SMB_SERVICE_TYPE;
use crate::error::{Error, Result};
use crate::shares::smb::Credentials;
use crate::utils::cmd::{run_cmd_checked, CommandLine, Shell};
use crate::utils::drive::DriveLetter;

pub const APP_NAME: &str = "false_mount";

trait Password {
    fn get_password(&self, shell: &dyn Shell) -> Result<SecUtf8>;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlainPassword {
    value: SecUtf8,
}

impl Password for PlainPassword {
    fn get_password(&self, _shell: &dyn Shell) -> Result<SecUtf8> {
        Ok(self.value.clone())
    }
}

/// Reads the password from the first line a command prints. Arguments are
/// split on whitespace; quote an argument that contains spaces.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PasswordCommand {
    command: String,
}

impl Password for PasswordCommand {
    fn get_password(&self, shell: &dyn Shell) -> Result<SecUtf8> {
        let cmd = CommandLine::parse(&self.command)
            .ok_or_else(|| Error::Password("empty password command".to_string()))?;
        let output = run_cmd_checked(shell, &cmd)?;
        match output.lines().next().map(str::trim) {
            Some(line) if !line.is_empty() => Ok(SecUtf8::from(line.to_string())),
            _ => Err(Error::Password(format!("{} printed nothing", cmd.program()))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum PasswordOptions {
    #[serde(rename = "plain")]
    Plain(PlainPassword),
    #[serde(rename = "command")]
    Command(PasswordCommand),
}

impl Password for PasswordOptions {
    fn get_password(&self, shell: &dyn Shell) -> Result<SecUtf8> {
        match self {
            Self::Plain(p) => p.get_password(shell),
            Self::Command(p) => p.get_password(shell),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CredentialOptions {
    pub user: String,
    #[serde(default)]
    pub password: Option<PasswordOptions>,
}

impl CredentialOptions {
    /// Without a configured password source the user is asked on the terminal.
    pub fn resolve(&self, shell: &dyn Shell) -> Result<Credentials> {
        let password = match &self.password {
            Some(pwo) => pwo.get_password(shell)?,
            None => {
                let pw = rpassword::prompt_password(format!("Enter password for {}: ", self.user))?;
                SecUtf8::from(pw)
            }
        };
        Ok(Credentials {
            user: self.user.clone(),
            password: Some(password),
        })
    }
}

/// A server that is known without mDNS. Written either as a map or as
/// `name=ip[,ip...]`, or as just `ip`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StaticServer {
    pub name: String,
    pub addresses: Vec<Ipv4Addr>,
}

impl FromStr for StaticServer {
    type Err = Error;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || Error::InvalidServer(value.to_string());
        let (name, addresses) = match value.split_once('=') {
            Some((name, addresses)) => (name.trim(), addresses),
            None => (value.trim(), value),
        };
        if name.is_empty() {
            return Err(invalid());
        }
        let addresses = addresses
            .split(',')
            .map(|a| a.trim().parse::<Ipv4Addr>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            addresses,
        })
    }
}

impl fmt::Display for StaticServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses: Vec<String> = self.addresses.iter().map(|a| a.to_string()).collect();
        write!(f, "{}={}", self.name, addresses.join(","))
    }
}

#[serde_with::serde_as]
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Settings {
    pub service_type: String,
    /// Seconds
    pub scan_timeout: u64,
    pub log_file: Option<PathBuf>,
    pub persistent: Option<bool>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub default_drive: Option<DriveLetter>,
    #[serde_as(as = "Vec<PickFirst<(_, DisplayFromStr)>>")]
    pub servers: Vec<StaticServer>,
    pub credentials: HashMap<String, CredentialOptions>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_type: SMB_SERVICE_TYPE.to_string(),
            scan_timeout: 5,
            log_file: Some(PathBuf::from("smb_discovery.log")),
            persistent: None,
            default_drive: None,
            servers: vec![],
            credentials: HashMap::new(),
        }
    }
}

impl FromStr for Settings {
    type Err = Error;

    fn from_str(config: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(config)?)
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let file = File::open(path).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }

    /// An explicit path has to exist. The per-user default is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => {
                debug!("Using config {}", path.display());
                Self::from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout)
    }

    pub fn static_server(&self, name: &str) -> Option<&StaticServer> {
        self.servers.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// The configured name of the static server listing `address`.
    pub fn server_name_for(&self, address: Ipv4Addr) -> Option<&str> {
        self.servers
            .iter()
            .find(|s| s.addresses.contains(&address))
            .map(|s| s.name.as_str())
    }

    pub fn credentials_for(&self, server: &str) -> Option<&CredentialOptions> {
        self.credentials.get(server).or_else(|| {
            self.credentials
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(server))
                .map(|(_, c)| c)
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join(APP_NAME).join("config.yaml"))
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    use include_dir::{include_dir, Dir};

    use super::{Password, Settings, StaticServer};
    use crate::discovery::SMB_SERVICE_TYPE;
    use crate::utils::cmd::testing::CannedShell;
    use crate::utils::drive::DriveLetter;

    #[test]
    fn test_configs() {
        static DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/test/configs");
        for config in DIR.files() {
            println!("Testing {:?}", config.path());
            Settings::from_str(config.contents_utf8().unwrap()).unwrap();
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_str("{}").unwrap();
        assert_eq!(settings.service_type, SMB_SERVICE_TYPE);
        assert_eq!(settings.scan_timeout, 5);
        assert_eq!(
            settings.log_file.unwrap().to_str(),
            Some("smb_discovery.log")
        );
        assert!(settings.servers.is_empty());
        assert!(settings.default_drive.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = include_str!("../test/configs/99-full.yaml");
        let settings = Settings::from_str(config).unwrap();

        assert_eq!(settings.scan_timeout, 10);
        assert!(settings.log_file.is_none());
        assert_eq!(settings.persistent, Some(true));
        assert_eq!(settings.default_drive, DriveLetter::new('s'));

        assert_eq!(settings.servers.len(), 3);
        assert_eq!(settings.servers[0].name, "office");
        assert_eq!(
            settings.servers[0].addresses,
            vec![Ipv4Addr::new(10, 1, 1, 5), Ipv4Addr::new(10, 1, 1, 6)]
        );
        assert_eq!(settings.servers[1].name, "10.1.1.7");
        assert_eq!(settings.servers[2].name, "archive");
        assert!(settings.static_server("OFFICE").is_some());

        let shell = CannedShell::default();
        let nas = settings.credentials_for("nas").unwrap();
        assert_eq!(nas.user, "alice");
        let pw = nas.password.clone().unwrap().get_password(&shell).unwrap();
        assert_eq!(pw.unsecure(), "mypassword");

        let shell = CannedShell::default().with("pass show smb/office", "s3cret\nmetadata\n");
        let office = settings.credentials_for("Office").unwrap();
        let credentials = office.resolve(&shell).unwrap();
        assert_eq!(credentials.user, "WORKGROUP\\bob");
        assert_eq!(credentials.password.unwrap().unsecure(), "s3cret");
    }

    #[test]
    fn test_password_command_output_required() {
        let settings = Settings::from_str(include_str!("../test/configs/99-full.yaml")).unwrap();
        let shell = CannedShell::default().with("pass show smb/office", "\n");
        let office = settings.credentials_for("office").unwrap();
        assert!(office.resolve(&shell).is_err());
    }

    #[test]
    fn test_static_server_from_str() {
        let server = StaticServer::from_str("nas = 192.168.1.20, 192.168.1.21").unwrap();
        assert_eq!(server.name, "nas");
        assert_eq!(server.addresses.len(), 2);
        assert_eq!(server.to_string(), "nas=192.168.1.20,192.168.1.21");

        let bare = StaticServer::from_str("192.168.1.30").unwrap();
        assert_eq!(bare.name, "192.168.1.30");
        assert_eq!(bare.addresses, vec![Ipv4Addr::new(192, 168, 1, 30)]);

        assert!(StaticServer::from_str("nas").is_err());
        assert!(StaticServer::from_str("=10.0.0.1").is_err());
        assert!(StaticServer::from_str("nas=10.0.0.300").is_err());
    }

    #[test]
    fn test_server_name_for() {
        let settings = Settings::from_str(include_str!("../test/configs/99-full.yaml")).unwrap();
        assert_eq!(settings.server_name_for(Ipv4Addr::new(10, 1, 1, 6)), Some("office"));
        assert_eq!(settings.server_name_for(Ipv4Addr::new(10, 1, 1, 7)), Some("10.1.1.7"));
        assert_eq!(settings.server_name_for(Ipv4Addr::new(10, 9, 9, 9)), None);
    }

    #[test]
    fn test_invalid_drive() {
        assert!(Settings::from_str("default_drive: \"1:\"").is_err());
    }
}
