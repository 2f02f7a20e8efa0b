// src/exec/command.rs

//! Shell command task.

use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::dag::{Task, TaskContext};

/// Runs `cmd` through the platform shell; a non-zero exit fails the task.
///
/// The child sees `DAGRUN_TASK` and `DAGRUN_GENERATION` in its environment.
/// Its output is captured and logged at debug level.
#[derive(Debug, Clone)]
pub struct CommandTask {
    cmd: String,
}

impl CommandTask {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    fn shell_command(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }
}

impl Task for CommandTask {
    fn run(&self, ctx: &TaskContext<'_>) -> Result<()> {
        info!(
            task = %ctx.name(),
            generation = ctx.generation(),
            cmd = %self.cmd,
            "starting task process"
        );

        let output = self
            .shell_command()
            .env("DAGRUN_TASK", ctx.name())
            .env("DAGRUN_GENERATION", ctx.generation().to_string())
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawning process for task '{}'", ctx.name()))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(task = %ctx.name(), "stdout: {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(task = %ctx.name(), "stderr: {}", line);
        }

        if !output.status.success() {
            match output.status.code() {
                Some(code) => bail!("command `{}` exited with status {code}", self.cmd),
                None => bail!("command `{}` was terminated by a signal", self.cmd),
            }
        }
        Ok(())
    }
}
