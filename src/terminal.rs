//! The operator's terminal: prompt, line assembly from stdin, the message
//! area under the prompt, and the window-resize flag. Also the readiness
//! wait the session loop blocks in.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, info};

use crate::error::Result;

pub struct Terminal {
    prompt: String,
    partial: Vec<u8>,
    resized: Arc<AtomicBool>,
    out: Box<dyn Write>,
}

impl Terminal {
    /// Terminal on stdout, with the resize flag hooked to SIGWINCH.
    pub fn new(prompt: &str) -> Result<Self> {
        let terminal = Terminal::with_output(prompt, Box::new(io::stdout()));
        signal_hook::flag::register(signal_hook::consts::SIGWINCH, Arc::clone(&terminal.resized))?;
        Ok(terminal)
    }

    pub fn with_output(prompt: &str, out: Box<dyn Write>) -> Self {
        Terminal {
            prompt: prompt.to_string(),
            partial: Vec::new(),
            resized: Arc::new(AtomicBool::new(false)),
            out,
        }
    }

    pub fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
    }

    /// True once after each resize.
    pub fn take_resize(&self) -> bool {
        self.resized.swap(false, Ordering::Relaxed)
    }

    pub fn show_prompt(&mut self) -> Result<()> {
        write!(self.out, "\r\x1b[K{}", self.prompt)?;
        self.out.write_all(&self.partial)?;
        self.out.flush()?;
        Ok(())
    }

    /// Prints a message above the prompt and redraws the half-typed line.
    pub fn message(&mut self, text: &str) -> Result<()> {
        info!("{}", text);
        write!(self.out, "\r\x1b[K{}\n", text)?;
        self.show_prompt()
    }

    /// Adds raw input and returns every line it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            match b {
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.partial).trim_end_matches('\r').to_string();
                    self.partial.clear();
                    lines.push(line);
                }
                // backspace and delete
                0x08 | 0x7f => {
                    self.partial.pop();
                }
                _ => self.partial.push(b),
            }
        }
        lines
    }

    /// Reads whatever stdin has ready. `None` means end of input.
    pub fn read_lines(&mut self) -> Result<Option<Vec<String>>> {
        let mut buf = [0u8; 8192];
        let n = loop {
            match io::stdin().read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            debug!("end of terminal input");
            return Ok(None);
        }
        Ok(Some(self.feed(&buf[..n])))
    }
}

/// What woke the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    /// A signal arrived; nothing is readable yet.
    Interrupted,
    TimedOut,
    Sources { terminal: bool, server: bool },
}

/// Blocks until stdin or the server socket is readable.
pub fn wait_ready(server: Option<BorrowedFd<'_>>, timeout_ms: i32) -> Result<Ready> {
    let stdin = io::stdin();
    let mut fds = vec![stdin.as_fd()];
    fds.extend(server);
    match poll_readable(&fds, timeout_ms)? {
        None => Ok(Ready::Interrupted),
        Some(ready) if !ready.iter().any(|r| *r) => Ok(Ready::TimedOut),
        Some(ready) => Ok(Ready::Sources {
            terminal: ready[0],
            server: ready.get(1).copied().unwrap_or(false),
        }),
    }
}

/// `poll(2)` for readability. `None` when the wait was interrupted.
/// A negative timeout waits forever.
pub fn poll_readable(fds: &[BorrowedFd<'_>], timeout_ms: i32) -> Result<Option<Vec<bool>>> {
    let mut poll_fds: Vec<PollFd<'_>> = fds
        .iter()
        .map(|fd| PollFd::new(*fd, PollFlags::POLLIN))
        .collect();
    let timeout = if timeout_ms < 0 {
        PollTimeout::NONE
    } else {
        PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::MAX)
    };
    match poll(&mut poll_fds, timeout) {
        Ok(_) => {}
        Err(Errno::EINTR) => return Ok(None),
        Err(e) => return Err(io::Error::from(e).into()),
    }
    let wake = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
    Ok(Some(
        poll_fds
            .iter()
            .map(|p| p.revents().is_some_and(|r| r.intersects(wake)))
            .collect(),
    ))
}
