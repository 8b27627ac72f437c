//! Runs the external tools the collaborators delegate to.

use std::ffi::OsStr;
use std::path::Path;

use tokio::process::Command;

use super::error::LibraryError;

/// Run `program` with `args`, returning its stdout on success.
///
/// A program that cannot be started maps to `LibraryError::Spawn`; a non-zero
/// exit maps to `LibraryError::Command` carrying the trimmed stderr.
pub(crate) async fn run<I, S>(program: &Path, args: I) -> Result<String, LibraryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_name(program);
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| LibraryError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(LibraryError::Command {
            tool,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("command")
        .to_string()
}
