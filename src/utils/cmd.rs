use std::fmt;
use std::process::Command;

use log::{debug, info};
use secstr::SecUtf8;

use crate::error::{Error, Result};

const REDACTED: &str = "****";

#[derive(Debug, Clone)]
enum Arg {
    Plain(String),
    Secret(SecUtf8),
}

/// A program plus its argument vector. Secret arguments are passed to the
/// program but never shown by `Display`.
#[derive(Debug, Clone)]
pub struct CommandLine {
    program: String,
    args: Vec<Arg>,
}

impl CommandLine {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: vec![],
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    pub fn secret_arg(mut self, arg: SecUtf8) -> Self {
        self.args.push(Arg::Secret(arg));
        self
    }

    /// Splits a configured command string on whitespace. Text inside single
    /// or double quotes stays one argument, and the quotes are dropped. There
    /// are no escapes or variables.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = split_words(line).into_iter();
        let program = parts.next()?;
        Some(parts.fold(Self::new(&program), |cmd, part| cmd.arg(part)))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|arg| match arg {
            Arg::Plain(s) => s.as_str(),
            Arg::Secret(s) => s.unsecure(),
        })
    }
}

fn split_words(line: &str) -> Vec<String> {
    let mut words = vec![];
    let mut word: Option<String> = None;
    let mut quote = None;
    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => word.get_or_insert_with(String::new).push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                if word.is_none() {
                    word = Some(String::new());
                }
            }
            (None, c) if c.is_whitespace() => words.extend(word.take()),
            (None, c) => word.get_or_insert_with(String::new).push(c),
        }
    }
    words.extend(word);
    words
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            match arg {
                Arg::Plain(s) => write!(f, " {s}")?,
                Arg::Secret(_) => write!(f, " {REDACTED}")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait Shell {
    fn run(&self, cmd: &CommandLine) -> std::io::Result<CommandOutput>;
}

/// Runs commands as child processes of this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl Shell for SystemShell {
    fn run(&self, cmd: &CommandLine) -> std::io::Result<CommandOutput> {
        let output = Command::new(cmd.program()).args(cmd.args()).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub fn run_cmd(shell: &dyn Shell, cmd: &CommandLine) -> Result<CommandOutput> {
    info!("Calling \"{}\"", cmd);
    shell.run(cmd).map_err(|source| Error::Spawn {
        command: cmd.to_string(),
        source,
    })
}

/// Like [`run_cmd`], but a non-zero exit status is an error. Returns stdout.
pub fn run_cmd_checked(shell: &dyn Shell, cmd: &CommandLine) -> Result<String> {
    let output = run_cmd(shell, cmd)?;
    if !output.success {
        let stderr = output.stderr.trim();
        // net.exe reports some errors on stdout
        let stderr = if stderr.is_empty() {
            output.stdout.trim()
        } else {
            stderr
        };
        return Err(Error::CommandFailed {
            command: cmd.to_string(),
            code: output.code,
            stderr: stderr.to_string(),
        });
    }
    debug!("{} returned {} bytes", cmd.program(), output.stdout.len());
    Ok(output.stdout)
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::{CommandLine, CommandOutput, Shell};

    /// Replays canned output keyed by the rendered command line.
    #[derive(Default)]
    pub struct CannedShell {
        outputs: RefCell<HashMap<String, CommandOutput>>,
        calls: RefCell<Vec<String>>,
    }

    impl CannedShell {
        pub fn with(self, cmd: &str, stdout: &str) -> Self {
            self.set(cmd, stdout);
            self
        }

        pub fn failing(self, cmd: &str, code: i32, stderr: &str) -> Self {
            self.outputs.borrow_mut().insert(
                cmd.to_string(),
                CommandOutput {
                    success: false,
                    code: Some(code),
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }

        pub fn set(&self, cmd: &str, stdout: &str) {
            self.outputs.borrow_mut().insert(
                cmd.to_string(),
                CommandOutput {
                    success: true,
                    code: Some(0),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                },
            );
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl Shell for CannedShell {
        fn run(&self, cmd: &CommandLine) -> std::io::Result<CommandOutput> {
            let line = cmd.to_string();
            self.calls.borrow_mut().push(line.clone());
            let output = self.outputs.borrow().get(&line).cloned();
            output.ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("no output for {line}"))
            })
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use secstr::SecUtf8;

    use super::testing::CannedShell;
    use super::{run_cmd_checked, CommandLine};
    use crate::error::Error;

    #[test]
    fn test_secret_is_redacted() {
        let cmd = CommandLine::new("net")
            .arg("use")
            .secret_arg(SecUtf8::from_str("hunter2").unwrap())
            .arg("/user:alice");

        assert_eq!(cmd.to_string(), "net use **** /user:alice");
        let args: Vec<&str> = cmd.args().collect();
        assert_eq!(args, vec!["use", "hunter2", "/user:alice"]);
    }

    #[test]
    fn test_parse() {
        let cmd = CommandLine::parse("  pass show  smb/nas ").unwrap();
        assert_eq!(cmd.program(), "pass");
        assert_eq!(cmd.to_string(), "pass show smb/nas");
        assert!(CommandLine::parse("   ").is_none());
    }

    #[test]
    fn test_parse_quoted() {
        let cmd = CommandLine::parse("pass show \"smb/my share\"").unwrap();
        assert_eq!(cmd.args().collect::<Vec<_>>(), vec!["show", "smb/my share"]);

        let cmd = CommandLine::parse("'/opt/vault tools/get' 'it''s' \"\" x").unwrap();
        assert_eq!(cmd.program(), "/opt/vault tools/get");
        assert_eq!(cmd.args().collect::<Vec<_>>(), vec!["its", "", "x"]);
    }

    #[test]
    fn test_checked_failure() {
        let shell = CannedShell::default().failing("net use", 2, "System error 53 has occurred.\n");
        let err = run_cmd_checked(&shell, &CommandLine::new("net").arg("use")).unwrap_err();
        match err {
            Error::CommandFailed {
                command,
                code,
                stderr,
            } => {
                assert_eq!(command, "net use");
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "System error 53 has occurred.");
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn test_spawn_failure() {
        let shell = CannedShell::default();
        let err = run_cmd_checked(&shell, &CommandLine::new("wmic")).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert_eq!(shell.calls(), vec!["wmic".to_string()]);
    }
}
