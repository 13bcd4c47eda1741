use std::collections::HashMap;

use crate::error::Result;
use crate::utils::cmd::{run_cmd_checked, CommandLine, Shell};
use crate::utils::drive::DriveLetter;

const NETWORK: &str = "Microsoft Windows Network";

/// One connection listed by `net use`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetUseEntry {
    pub status: String,
    pub local: Option<DriveLetter>,
    pub remote: String,
}

impl NetUseEntry {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("OK")
    }
}

fn as_drive(token: &str) -> Option<DriveLetter> {
    if token.len() == 2 && token.ends_with(':') {
        token.parse().ok()
    } else {
        None
    }
}

fn parse_row(line: &str) -> Option<NetUseEntry> {
    let start = line.find("\\\\")?;
    // Remote paths may contain spaces; they run up to the network column
    let end = line[start..]
        .find(NETWORK)
        .map_or(line.len(), |i| start + i);
    let remote = line[start..end].trim();
    let head: Vec<&str> = line[..start].split_whitespace().collect();
    let local = head.iter().find_map(|t| as_drive(t));
    let status = match head.first() {
        Some(first) if as_drive(first).is_none() => first.to_string(),
        _ => String::new(),
    };
    Some(NetUseEntry {
        status,
        local,
        remote: remote.to_string(),
    })
}

pub fn parse_net_use(output: &str) -> Vec<NetUseEntry> {
    let lines: Vec<&str> = output.lines().collect();
    lines
        .iter()
        .enumerate()
        .filter(|(i, line)| {
            // Long remote paths push the network name onto its own line
            line.contains(NETWORK)
                || lines
                    .get(i + 1)
                    .is_some_and(|next| next.trim() == NETWORK)
        })
        .filter_map(|(_, line)| parse_row(line))
        .collect()
}

/// Lower-cased remote path to the drive it is mapped on.
pub fn mounted_shares_mapping(entries: &[NetUseEntry]) -> HashMap<String, DriveLetter> {
    entries
        .iter()
        .filter_map(|e| e.local.map(|drive| (e.remote.to_lowercase(), drive)))
        .collect()
}

pub fn mounted_drives(entries: &[NetUseEntry]) -> Vec<DriveLetter> {
    entries
        .iter()
        .filter(|e| e.is_ok())
        .filter_map(|e| e.local)
        .collect()
}

pub fn net_use(shell: &dyn Shell) -> Result<Vec<NetUseEntry>> {
    let output = run_cmd_checked(shell, &CommandLine::new("net").arg("use"))?;
    Ok(parse_net_use(&output))
}
