use crossbeam::channel::SendTimeoutError;
use log::{info, warn};
use std::io::BufRead;
use std::thread;

use super::{TaskContext, TaskStats};
use crate::command::RemoteCommand;
use crate::error::{HubError, HubResult};

/// Queue one remote command. A full channel is waited out in slices so that
/// shutdown can interrupt; the command is never dropped otherwise.
pub fn forward_command(ctx: &TaskContext, command: RemoteCommand) -> HubResult<()> {
    let timeout = ctx.hub.settings().remote_send_timeout();
    let mut pending = command;
    loop {
        match ctx.hub.remote_commands.send_timeout(pending, timeout) {
            Ok(()) => {
                TaskStats::bump(&ctx.stats.commands_queued);
                return Ok(());
            }
            Err(SendTimeoutError::Timeout(back)) => {
                if ctx.stats.is_shutdown() {
                    return Err(HubError::ShutdownRequested(ctx.hub.remote_commands.name()));
                }
                warn!("[NETWORK] remote-command queue full, still waiting");
                pending = back;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                return Err(HubError::Disconnected(ctx.hub.remote_commands.name()))
            }
        }
    }
}

/// Reads one command per line. Blank lines and `#` comments are skipped, and
/// malformed lines are logged and counted.
pub fn spawn_command_thread<R>(input: R, ctx: TaskContext) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        info!("[NETWORK] command reader started");
        for line in input.lines() {
            if ctx.stats.is_shutdown() {
                break;
            }
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("[NETWORK] input closed: {e}");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match trimmed.parse::<RemoteCommand>() {
                Ok(command) => {
                    match forward_command(&ctx, command) {
                        Ok(()) => {}
                        Err(e @ HubError::ShutdownRequested(_)) => {
                            info!("[NETWORK] {command} dropped: {e}");
                            break;
                        }
                        Err(e) => {
                            warn!("[NETWORK] {command} not delivered: {e}");
                            break;
                        }
                    }
                }
                Err(e) => {
                    TaskStats::bump(&ctx.stats.rejected_lines);
                    warn!("[NETWORK] rejected '{trimmed}': {e}");
                }
            }
        }
        info!("[NETWORK] command reader stopped");
    })
}
