use anyhow::{Context, Result};
use log::{debug, info};
use std::io::{self, BufRead, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// How often a pending terminal read looks at the interrupt flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared Ctrl-C flag. Cloning hands out another view of the same flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Installs the process-wide Ctrl-C handler. Can only be done once.
    pub fn install() -> Result<Self> {
        let interrupt = Self::default();
        let flag = Arc::clone(&interrupt.flag);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .context("Failed to install the Ctrl-C handler")?;
        debug!("Ctrl-C handler installed");
        Ok(interrupt)
    }

    #[cfg(test)]
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Line-buffered terminal input that gives up with `ErrorKind::Interrupted`
/// once the interrupt flag is raised, even while a read is pending.
///
/// Lines are read on a detached thread. It stays blocked on stdin after the
/// reader is dropped, which is harmless since nothing else reads stdin.
pub struct TerminalInput {
    lines: Receiver<io::Result<String>>,
    interrupt: Interrupt,
    buf: Vec<u8>,
    pos: usize,
}

impl TerminalInput {
    pub fn stdin(interrupt: Interrupt) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            loop {
                let mut line = String::new();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });
        Self::from_channel(rx, interrupt)
    }

    fn from_channel(lines: Receiver<io::Result<String>>, interrupt: Interrupt) -> Self {
        Self {
            lines,
            interrupt,
            buf: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for TerminalInput {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for TerminalInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos >= self.buf.len() {
            if self.interrupt.is_set() {
                info!("Interrupted while waiting for input");
                return Err(io::ErrorKind::Interrupted.into());
            }
            match self.lines.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    self.buf = line?.into_bytes();
                    self.pos = 0;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(&[]),
            }
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}
