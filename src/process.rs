//! Child processes with a hard deadline.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

#[derive(Debug)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Stdout followed by stderr.
    pub output: String,
    pub timed_out: bool,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// `Some(bytes)` per chunk read, `None` once the pipe hits EOF.
type Chunk = (Stream, Option<Vec<u8>>);

fn drain<R: Read + Send + 'static>(pipe: Option<R>, stream: Stream, tx: Sender<Chunk>) {
    let Some(mut pipe) = pipe else {
        let _ = tx.send((stream, None));
        return;
    };
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send((stream, Some(buf[..n].to_vec()))).is_err() {
                        return;
                    }
                }
            }
        }
        let _ = tx.send((stream, None));
    });
}

#[derive(Default)]
struct Collected {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    open: usize,
}

impl Collected {
    /// Read chunks until both pipes close or `deadline` passes. Returns
    /// whether both pipes closed.
    fn until(&mut self, rx: &Receiver<Chunk>, deadline: Instant) -> bool {
        while self.open > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((Stream::Stdout, Some(bytes))) => self.stdout.extend(bytes),
                Ok((Stream::Stderr, Some(bytes))) => self.stderr.extend(bytes),
                Ok((_, None)) => self.open -= 1,
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return true,
            }
        }
        true
    }

    fn into_output(mut self) -> String {
        self.stdout.append(&mut self.stderr);
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_group(child: &Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: plain syscall on the process group `isolate` created.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// Kill the child and anything it left running in its process group.
fn kill(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// Run `cmd` to completion or until `timeout` elapses, killing its process
/// group in the latter case. The deadline also bounds reading the pipes, so
/// a background grandchild holding stdout cannot stall the caller.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> io::Result<ProcessOutput> {
    let deadline = Instant::now() + timeout;
    isolate(&mut cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let (tx, rx) = mpsc::channel();
    drain(child.stdout.take(), Stream::Stdout, tx.clone());
    drain(child.stderr.take(), Stream::Stderr, tx);
    let mut collected = Collected {
        open: 2,
        ..Default::default()
    };

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            kill(&mut child);
            return Ok(ProcessOutput {
                exit_code: None,
                success: false,
                output: String::new(),
                timed_out: true,
            });
        }
        Err(e) => {
            kill(&mut child);
            return Err(e);
        }
    };

    if !collected.until(&rx, deadline) {
        tracing::warn!("child exited but its pipes stayed open past the deadline");
        kill(&mut child);
        return Ok(ProcessOutput {
            exit_code: status.code(),
            success: false,
            output: collected.into_output(),
            timed_out: true,
        });
    }

    Ok(ProcessOutput {
        exit_code: status.code(),
        success: status.success(),
        output: collected.into_output(),
        timed_out: false,
    })
}

/// `120s`, `1m30s` style rendering for timeout messages.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 60, secs % 60) {
        (0, s) => format!("{s}s"),
        (m, s) => format!("{m}m{s}s"),
    }
}
