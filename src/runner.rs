//! Boundary towards the host's command-line tooling.
//!
//! Everything that shells out goes through a [`CommandRunner`] so the engine,
//! the hotspot backends and the parsers can be exercised without the real
//! tools. Invocations are blocking and carry no timeout of their own.

use std::process::Command;

use tracing::debug;

use crate::encoding;
use crate::error::{NetConfigError, Result};

/// Captured result of one external program invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    /// Set when the program could not be started at all.
    pub spawn_error: Option<String>,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        CommandOutput {
            stdout: stdout.into(),
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(stderr: impl Into<Vec<u8>>) -> Self {
        CommandOutput {
            stderr: stderr.into(),
            success: false,
            ..Default::default()
        }
    }

    /// Stdout normalized to UTF-8.
    pub fn text(&self) -> Result<String> {
        encoding::normalize(&self.stdout)
    }

    /// Best human-readable explanation of what the program said.
    pub fn diagnostic(&self) -> String {
        if let Some(ref err) = self.spawn_error {
            return err.clone();
        }
        let stderr = encoding::normalize_lossy(&self.stderr);
        if !stderr.trim().is_empty() {
            return stderr.trim().to_string();
        }
        encoding::normalize_lossy(&self.stdout).trim().to_string()
    }
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> CommandOutput;
}

/// Runs real processes on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
        debug!("Executing: {}", command_line(program, args));
        match Command::new(program).args(args).output() {
            Ok(output) => CommandOutput {
                stdout: output.stdout,
                stderr: output.stderr,
                success: output.status.success(),
                spawn_error: None,
            },
            Err(e) => CommandOutput {
                spawn_error: Some(format!("Failed to execute {}: {}", program, e)),
                ..Default::default()
            },
        }
    }
}

pub fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Runs a command that must succeed and returns its decoded stdout.
pub fn run_text(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> Result<String> {
    let output = runner.run(program, args);
    if !output.success {
        return Err(NetConfigError::CommandFailed {
            command: command_line(program, args),
            detail: output.diagnostic(),
        });
    }
    output.text()
}

/// Runs a mutating command; only success matters.
pub fn run_checked(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> Result<()> {
    let output = runner.run(program, args);
    if output.success {
        Ok(())
    } else {
        Err(NetConfigError::CommandFailed {
            command: command_line(program, args),
            detail: output.diagnostic(),
        })
    }
}

/// Quotes a value as a PowerShell single-quoted string literal.
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Runs a PowerShell script with UTF-8 console output.
pub fn run_powershell(runner: &dyn CommandRunner, script: &str) -> Result<String> {
    let script = format!(
        "[Console]::OutputEncoding = [System.Text.Encoding]::UTF8; {}",
        script.trim()
    );
    run_text(
        runner,
        "powershell",
        &["-NoProfile", "-NonInteractive", "-Command", &script],
    )
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    enum Matcher {
        Prefix(String),
        Script(String),
    }

    impl Matcher {
        fn matches(&self, program: &str, line: &str, args: &[&str]) -> bool {
            match self {
                Matcher::Prefix(prefix) => line.starts_with(prefix.as_str()),
                Matcher::Script(fragment) => {
                    program == "powershell"
                        && args.last().is_some_and(|script| script.contains(fragment.as_str()))
                }
            }
        }
    }

    /// Answers scripted command lines and records every invocation.
    /// Unscripted commands fail as if the tool were missing.
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: Mutex<HashMap<String, CommandOutput>>,
        patterns: Mutex<Vec<(Matcher, CommandOutput)>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, line: &str, output: CommandOutput) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(line.to_string(), output);
            self
        }

        pub fn on_ok(self, line: &str, stdout: &str) -> Self {
            self.on(line, CommandOutput::ok(stdout))
        }

        /// Answers every command line starting with `prefix` that has no
        /// exact script. Earlier patterns win.
        pub fn on_prefix(self, prefix: &str, output: CommandOutput) -> Self {
            self.patterns
                .lock()
                .unwrap()
                .push((Matcher::Prefix(prefix.to_string()), output));
            self
        }

        /// Answers PowerShell scripts containing `fragment`.
        pub fn on_script(self, fragment: &str, output: CommandOutput) -> Self {
            self.patterns
                .lock()
                .unwrap()
                .push((Matcher::Script(fragment.to_string()), output));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| c.starts_with(prefix))
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
            let line = command_line(program, args);
            self.calls.lock().unwrap().push(line.clone());
            if let Some(output) = self.responses.lock().unwrap().get(&line) {
                return output.clone();
            }
            self.patterns
                .lock()
                .unwrap()
                .iter()
                .find(|(matcher, _)| matcher.matches(program, &line, args))
                .map(|(_, output)| output.clone())
                .unwrap_or_else(|| CommandOutput {
                    spawn_error: Some(format!("not scripted: {}", line)),
                    ..Default::default()
                })
        }
    }
}
