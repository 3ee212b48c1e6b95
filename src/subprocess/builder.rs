use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::error::ProcessError;

/// How to launch the server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl ServerCommand {
    /// Parse a shell-style launch line such as `java -Xmx4G -jar server.jar nogui`
    pub fn parse(launch_command: &str) -> Result<Self, ProcessError> {
        let words = shell_words::split(launch_command)
            .map_err(|e| ProcessError::InvalidCommand(format!("{launch_command}: {e}")))?;
        Self::from_words(words)
    }

    /// Build from an already split argument vector
    pub fn from_words<I, S>(words: I) -> Result<Self, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words = words.into_iter().map(Into::into);
        let program = words
            .next()
            .filter(|program| !program.trim().is_empty())
            .ok_or_else(|| ProcessError::InvalidCommand("empty launch command".to_string()))?;
        Ok(ServerCommandBuilder::new(&program).args(words).build())
    }

    /// Command line for log output
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|word| shell_words::quote(word).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Tokio command with all three standard streams piped
    pub(crate) fn to_piped_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

pub struct ServerCommandBuilder {
    command: ServerCommand,
}

impl ServerCommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            command: ServerCommand {
                program: program.to_string(),
                args: Vec::new(),
                env: HashMap::new(),
                working_dir: None,
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn build(self) -> ServerCommand {
        self.command
    }
}
