// src/procedures/command.rs

//! Shell command procedure.

use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::BoxFuture;
use crate::errors::ProcedureError;
use crate::procedure::{ExecutionContext, Procedure};

/// Runs `cmd` through the platform shell.
///
/// stdout and stderr are consumed line by line and logged at debug level.
/// Cancellation kills the child process. A non-zero exit status is recorded
/// as an execution error.
#[derive(Debug, Clone)]
pub struct CommandProcedure {
    name: String,
    cmd: String,
}

impl CommandProcedure {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn run(&self, ctx: &ExecutionContext) -> Result<()> {
        info!(procedure = %self.name, cmd = %self.cmd, "starting command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for procedure '{}'", self.name))?;

        if let Some(stdout) = child.stdout.take() {
            let name = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(procedure = %name, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let name = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(procedure = %name, "stderr: {}", line);
                }
            });
        }

        tokio::select! {
            status = child.wait() => {
                let status = status
                    .with_context(|| format!("waiting for process of procedure '{}'", self.name))?;
                let code = status.code().unwrap_or(-1);
                info!(
                    procedure = %self.name,
                    exit_code = code,
                    success = status.success(),
                    "command exited"
                );
                if !status.success() {
                    return Err(anyhow!("command '{}' exited with code {}", self.cmd, code));
                }
            }
            _ = ctx.cancelled() => {
                info!(procedure = %self.name, "cancellation requested; killing process");
                if let Err(err) = child.kill().await {
                    warn!(
                        procedure = %self.name,
                        error = %err,
                        "failed to kill child process on cancellation"
                    );
                }
            }
        }

        Ok(())
    }
}

impl Procedure for CommandProcedure {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(&self, ctx: ExecutionContext) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match self.run(&ctx).await {
                Ok(()) => ctx.finish(Vec::new()),
                Err(err) => ctx.finish(vec![ProcedureError::execution(err)]),
            }
        })
    }
}
