//! Thin wrapper around `tokio::process` for the external programs the pipeline drives.

use std::ffi::OsStr;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use nirvana_assets_shared::{AssetsError, Result};

/// Run `program args...` to completion with inherited stdout/stderr.
///
/// A spawn failure is reported with status -1; a non-zero exit with the
/// process exit code.
pub(crate) async fn run_tool<I, S>(program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    debug!(?command, "spawning external tool");

    let status = command
        .status()
        .await
        .map_err(|e| AssetsError::tool(program, -1, format!("failed to spawn: {e}")))?;

    if !status.success() {
        return Err(AssetsError::tool(
            program,
            status.code().unwrap_or(-1),
            "exited unsuccessfully",
        ));
    }

    Ok(())
}

/// Whether `program args...` starts and exits zero. Output is discarded.
pub(crate) async fn probe_tool<I, S>(program: &str, args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
