use std::net::Ipv4Addr;

use crate::error::Result;
use crate::utils::cmd::{run_cmd_checked, CommandLine, Shell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Disk,
    Print,
    Ipc,
    Device,
}

impl ShareKind {
    fn from_keyword(token: &str) -> Option<Self> {
        match token {
            "Disk" => Some(Self::Disk),
            "Print" => Some(Self::Print),
            "IPC" => Some(Self::Ipc),
            "Device" => Some(Self::Device),
            _ => None,
        }
    }
}

/// One row of `net view \\server`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetViewEntry {
    pub name: String,
    pub kind: ShareKind,
}

/// Whitespace separated tokens with their byte offsets.
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut out = vec![];
    let mut start = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push((s, &line[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => (),
        }
    }
    if let Some(s) = start {
        out.push((s, &line[s..]));
    }
    out
}

fn is_noise(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty()
        || line.starts_with("---")
        || line.starts_with("Shared resources")
        || line.starts_with("Share name")
        || line.starts_with("The command")
}

fn parse_row(line: &str) -> Option<NetViewEntry> {
    let candidates: Vec<(usize, ShareKind)> = tokens(line)
        .into_iter()
        .skip(1)
        .filter_map(|(offset, token)| ShareKind::from_keyword(token).map(|k| (offset, k)))
        .collect();
    // The type column is normally separated from the name by padding
    let (offset, kind) = candidates
        .iter()
        .find(|(offset, _)| line[..*offset].ends_with("  "))
        .or(candidates.first())
        .copied()?;
    let name = line[..offset].trim();
    if name.is_empty() {
        return None;
    }
    Some(NetViewEntry {
        name: name.to_string(),
        kind,
    })
}

pub fn parse_net_view(output: &str) -> Vec<NetViewEntry> {
    output
        .lines()
        .filter(|line| !is_noise(line))
        .filter_map(parse_row)
        .collect()
}

pub fn disk_shares(entries: Vec<NetViewEntry>) -> Vec<NetViewEntry> {
    entries
        .into_iter()
        .filter(|e| e.kind == ShareKind::Disk)
        .collect()
}

pub fn net_view(shell: &dyn Shell, address: Ipv4Addr) -> Result<Vec<NetViewEntry>> {
    let cmd = CommandLine::new("net")
        .arg("view")
        .arg(format!("\\\\{address}"));
    let output = run_cmd_checked(shell, &cmd)?;
    Ok(parse_net_view(&output))
}
