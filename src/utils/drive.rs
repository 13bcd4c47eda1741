use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::utils::cmd::{run_cmd_checked, CommandLine, Shell};

/// A Windows drive letter, stored upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriveLetter(char);

impl DriveLetter {
    pub fn new(letter: char) -> Option<Self> {
        letter
            .is_ascii_alphabetic()
            .then(|| Self(letter.to_ascii_uppercase()))
    }

    pub fn letter(&self) -> char {
        self.0
    }

    pub fn all() -> impl Iterator<Item = DriveLetter> {
        ('A'..='Z').map(DriveLetter)
    }
}

impl FromStr for DriveLetter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let letter = trimmed.strip_suffix(':').unwrap_or(trimmed);
        let mut chars = letter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c).ok_or_else(|| Error::InvalidDriveLetter(s.to_string())),
            _ => Err(Error::InvalidDriveLetter(s.to_string())),
        }
    }
}

impl fmt::Display for DriveLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.0)
    }
}

/// Reads `wmic logicaldisk get name`. Every line with a colon is a drive.
pub fn parse_logical_disks(output: &str) -> Vec<DriveLetter> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.contains(':'))
        .filter_map(|line| line.parse().ok())
        .collect()
}

pub fn logical_disks(shell: &dyn Shell) -> crate::error::Result<Vec<DriveLetter>> {
    let cmd = CommandLine::new("wmic")
        .arg("logicaldisk")
        .arg("get")
        .arg("name");
    let output = run_cmd_checked(shell, &cmd)?;
    Ok(parse_logical_disks(&output))
}

pub fn available_drive_letters(used: &[DriveLetter]) -> Vec<DriveLetter> {
    DriveLetter::all().filter(|d| !used.contains(d)).collect()
}
