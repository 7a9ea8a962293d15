use std::{
    io::{self, Read},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
};

use snafu::ResultExt as _;
use tracing::{debug, error};

use crate::error::{Io, QueryError};

/// Runs a command to completion and returns its standard output as lines.
///
/// Both standard output and standard error are always fully drained, and the child is always waited on, before this
/// returns. When the command does not exit successfully, everything it wrote is logged before the error is returned.
pub(crate) fn run_command(program: &str, args: &[String]) -> Result<Vec<String>, QueryError> {
    let command_line = describe(program, args);

    debug!(command = %command_line, "Spawning memory query command.");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context(Io { command: &command_line })?;

    let (stdout, stderr) = match drain(&mut child) {
        Ok(drained) => drained,
        Err(e) => {
            // The pipes are no longer being read, so the child could block forever on a full one.
            let _ = child.kill();
            let _ = child.wait();
            return Err(wait_error(command_line, e));
        }
    };

    let status = match child.wait() {
        Ok(status) => status,
        Err(e) => return Err(wait_error(command_line, e)),
    };

    if !status.success() {
        log_child_output(&command_line, status, &stdout, &stderr);
        return Err(QueryError::ChildProcessFailed {
            command: command_line,
            exit_code: exit_code(status),
        });
    }

    Ok(String::from_utf8_lossy(&stdout).lines().map(str::to_owned).collect())
}

/// Reads standard output and standard error of the child to the end.
///
/// Standard error is read on a scoped thread so that neither pipe can fill up while the other is being read.
fn drain(child: &mut Child) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    thread::scope(|scope| {
        let stderr_reader = scope.spawn(move || read_all(stderr));
        let stdout = read_all(stdout);
        let stderr = stderr_reader
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "standard error reader panicked"))?;

        Ok((stdout?, stderr?))
    })
}

fn read_all<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn wait_error(command: String, error: io::Error) -> QueryError {
    if error.kind() == io::ErrorKind::Interrupted {
        QueryError::Interrupted {
            command,
            detail: error.to_string(),
        }
    } else {
        QueryError::Io { command, source: error }
    }
}

/// Returns the exit code of a failed child, using the shell convention of `128 + signal` for a child killed by a
/// signal, and `-1` when neither is available.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;

        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

fn describe(program: &str, args: &[String]) -> String {
    let mut command_line = program.to_string();
    for arg in args {
        command_line.push(' ');
        if arg.contains(' ') {
            command_line.push('"');
            command_line.push_str(arg);
            command_line.push('"');
        } else {
            command_line.push_str(arg);
        }
    }
    command_line
}

fn log_child_output(command_line: &str, status: ExitStatus, stdout: &[u8], stderr: &[u8]) {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    error!(
        command = %command_line,
        status = %status,
        stdout = %stdout.trim_end(),
        stderr = %stderr.trim_end(),
        "Memory query command failed."
    );
}
