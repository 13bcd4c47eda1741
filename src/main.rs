use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use log::{debug, error, info, warn, LevelFilter};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};

use app::{FalseMount, MountOutcome};
use config::{CredentialOptions, Settings};
use discovery::{Discovery, ServerListener, ServerMap};
use error::{Error, Result};
use utils::cmd::SystemShell;
use utils::drive::DriveLetter;

mod app;
mod config;
mod discovery;
mod error;
mod shares;
mod utils;

fn parse_drive(s: &str) -> std::result::Result<DriveLetter, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

#[derive(Parser)]
#[command(version, about = "Find SMB shares on the local network and map them to drive letters", long_about = None)]
struct Cli {
    /// Config file. Defaults to <config dir>/false_mount/config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with = "verbose")]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn level(&self) -> LevelFilter {
        match (self.verbose, self.quiet) {
            (0, 0) => LevelFilter::Info,
            (0, 1) => LevelFilter::Warn,
            (0, _) => LevelFilter::Error,
            (1, _) => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Browse for servers advertising SMB shares
    Scan {
        /// Seconds to listen, overrides the config
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Keep listening and redraw the list on every change
        #[arg(short, long)]
        watch: bool,
    },
    /// List the disk shares of a server and where they are mounted
    Shares { server: String },
    /// Map a share to a drive letter
    Mount {
        server: String,
        share: String,
        #[arg(value_parser = parse_drive)]
        drive: Option<DriveLetter>,
        #[arg(short, long)]
        user: Option<String>,
        /// Replace an existing mapping on the drive without asking
        #[arg(short, long)]
        yes: bool,
        #[arg(long)]
        persistent: Option<bool>,
    },
    /// Remove a drive mapping
    #[command(group(ArgGroup::new("target").required(true).args(["drive", "server"])))]
    Unmount {
        #[arg(value_parser = parse_drive, conflicts_with_all = ["server", "share"])]
        drive: Option<DriveLetter>,
        #[arg(long, requires = "share")]
        server: Option<String>,
        #[arg(long, requires = "server")]
        share: Option<String>,
    },
    /// Show mounted network drives and free drive letters
    Drives,
}

fn init_logging(level: LevelFilter, log_file: Option<&Path>) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let mut file_error = None;
    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Info, Config::default(), file)),
            Err(e) => file_error = Some((path.to_path_buf(), e)),
        }
    }
    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to set up logging: {e}");
    }
    if let Some((path, e)) = file_error {
        warn!("Not logging to {}: {e}", path.display());
    }
}

fn print_servers(servers: &ServerMap) {
    println!("Servers with SMB Shares Found");
    if servers.is_empty() {
        println!("  (none)");
    }
    for (name, addresses) in servers {
        let addresses: Vec<String> = addresses.iter().map(|a| a.to_string()).collect();
        println!("  {name:<30} {}", addresses.join(", "));
    }
}

fn confirm_unmount(drive: DriveLetter) -> bool {
    print!("The drive letter {drive} is already in use. Would you like to unmount it? [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"),
        Err(_) => false,
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ResolvedServer {
    /// Configured or advertised name, used to look up credentials
    name: String,
    address: Ipv4Addr,
}

/// A server argument is an IPv4 address, a configured server or an
/// advertised mDNS name. The first address wins.
fn resolve_server(settings: &Settings, server: &str) -> Result<ResolvedServer> {
    if let Ok(address) = server.parse::<Ipv4Addr>() {
        let name = settings.server_name_for(address).unwrap_or(server);
        return Ok(ResolvedServer {
            name: name.to_string(),
            address,
        });
    }
    if let Some(known) = settings.static_server(server) {
        let address = known
            .addresses
            .first()
            .copied()
            .ok_or_else(|| Error::NoAddress(server.to_string()))?;
        return Ok(ResolvedServer {
            name: known.name.clone(),
            address,
        });
    }
    info!("Looking for {server} on the network");
    let discovery = Discovery::new(&settings.service_type)?;
    let (name, addresses) = discovery.resolve(server, settings.scan_timeout())?;
    debug!("{name} resolved to {addresses:?}");
    let address = addresses
        .first()
        .copied()
        .ok_or_else(|| Error::NoAddress(server.to_string()))?;
    Ok(ResolvedServer { name, address })
}

fn seed_listener<F>(listener: &mut ServerListener<F>, settings: &Settings)
where
    F: FnMut(&ServerMap),
{
    for server in &settings.servers {
        listener.insert_static(&server.name, &server.addresses);
    }
}

fn scan(settings: &Settings, timeout: Option<u64>, watch: bool) -> Result<()> {
    let discovery = Discovery::new(&settings.service_type)?;
    let mut listener = ServerListener::new(|servers: &ServerMap| {
        if watch {
            println!();
            print_servers(servers);
        }
    });
    seed_listener(&mut listener, settings);
    if watch {
        // Static servers are known before the first event arrives
        print_servers(listener.servers());
        discovery.scan(&mut listener, None)?;
    } else {
        let timeout = timeout.map_or(settings.scan_timeout(), Duration::from_secs);
        discovery.scan(&mut listener, Some(timeout))?;
        print_servers(listener.servers());
    }
    Ok(())
}

/// Credentials are keyed by the resolved name, falling back to the argument
/// as typed.
fn credential_key<'a>(settings: &Settings, resolved: &'a ResolvedServer, server: &'a str) -> &'a str {
    if settings.credentials_for(&resolved.name).is_some() {
        &resolved.name
    } else {
        server
    }
}

fn run(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Scan { timeout, watch } => scan(&settings, timeout, watch),
        Commands::Shares { server } => {
            let ResolvedServer { name, address } = resolve_server(&settings, &server)?;
            let app = FalseMount::new(settings, SystemShell);
            let shares = app.list_shares(address)?;
            println!("SMB Shares on {name} ({address})");
            for share in shares {
                println!("  {share}");
            }
            Ok(())
        }
        Commands::Mount {
            server,
            share,
            drive,
            user,
            yes,
            persistent,
        } => {
            let resolved = resolve_server(&settings, &server)?;
            let mut app = FalseMount::new(settings, SystemShell);
            if persistent.is_some() {
                app.settings.persistent = persistent;
            }
            let key = credential_key(&app.settings, &resolved, &server);
            let credentials = match user {
                Some(user) => {
                    let password = app
                        .settings
                        .credentials_for(key)
                        .filter(|c| c.user == user)
                        .and_then(|c| c.password.clone());
                    Some(CredentialOptions { user, password }.resolve(app.shell())?)
                }
                None => app.credentials_for(key)?,
            };
            let outcome = app.mount_share(resolved.address, &share, drive, credentials, |drive| {
                yes || confirm_unmount(drive)
            })?;
            match outcome {
                MountOutcome::Mounted(drive) => {
                    println!("Share {share} mounted to {drive} successfully.")
                }
                MountOutcome::Declined(drive) => println!("Left {drive} as it was."),
            }
            Ok(())
        }
        Commands::Unmount {
            drive,
            server,
            share,
        } => {
            let app = FalseMount::new(settings, SystemShell);
            let drive = match (drive, server, share) {
                (Some(drive), _, _) => {
                    app.unmount_drive(drive)?;
                    drive
                }
                (None, Some(server), Some(share)) => {
                    let resolved = resolve_server(&app.settings, &server)?;
                    app.unmount_share(resolved.address, &share)?
                }
                _ => return Err(Error::NoDriveLetter),
            };
            println!("Unmounted {drive}");
            Ok(())
        }
        Commands::Drives => {
            let app = FalseMount::new(settings, SystemShell);
            let mounted: Vec<String> = app.mounted_drives()?.iter().map(|d| d.to_string()).collect();
            let available: Vec<String> = app
                .available_drive_letters()?
                .iter()
                .map(|d| d.to_string())
                .collect();
            println!("Mounted:   {}", mounted.join(" "));
            println!("Available: {}", available.join(" "));
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(cli.level(), None);
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let log_file = cli.log_file.clone().or_else(|| settings.log_file.clone());
    init_logging(cli.level(), log_file.as_deref());
    debug!("{:?}", settings);

    match run(cli, settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
