//! Process-wide stdout redirection
//!
//! [`StdoutTee::install`] is the one place where the process's standard output
//! is swapped. File descriptor 1 is pointed at a pipe whose read end is
//! drained by a pump thread into an [`Interceptor`]; the interceptor mirrors
//! to a duplicate of the original descriptor. [`StdoutTee::close`] puts the
//! original descriptor back.
//!
//! Because the swap happens at the descriptor level, output from `print!`,
//! from C libraries and from child processes that inherit stdout is all
//! captured alike. Children still running at close time delay it; see
//! [`StdoutTee::close`].

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::error::TeeError;
use crate::tee::{Interceptor, TeeOptions};

#[cfg(unix)]
use std::os::fd::{AsRawFd, OwnedFd};

/// Set while a `StdoutTee` owns the stdout descriptor
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Read size of the pump thread
#[cfg(unix)]
const PUMP_CHUNK: usize = 8 * 1024;

/// Whether stdout is currently redirected by a [`StdoutTee`]
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

/// Installed stdout tee
///
/// Dropping it without calling [`close`](Self::close) restores stdout as
/// well, logging any error instead of returning it.
pub struct StdoutTee {
    tee: Arc<Interceptor>,
    #[cfg(unix)]
    saved_stdout: Option<OwnedFd>,
    pump: Option<JoinHandle<Result<(), TeeError>>>,
}

impl StdoutTee {
    /// Redirect this process's stdout through a new interceptor
    ///
    /// Fails with [`TeeError::AlreadyInstalled`] if another `StdoutTee` is
    /// active. The log file is opened before stdout is touched, so a failure
    /// leaves stdout as it was.
    pub fn install(options: &TeeOptions) -> Result<Self, TeeError> {
        if INSTALLED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TeeError::AlreadyInstalled);
        }

        let installed = Self::redirect(options);
        match &installed {
            Ok(_) => info!(log = %options.log_file.display(), "Stdout tee installed"),
            Err(_) => INSTALLED.store(false, Ordering::SeqCst),
        }
        installed
    }

    /// Interceptor receiving everything written to stdout
    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.tee
    }

    /// Restore the original stdout and close the interceptor
    ///
    /// Output already written to stdout is drained and emitted first,
    /// including an unterminated last line.
    ///
    /// Draining ends when every write end of the pipe is closed. A child
    /// process that inherited stdout and is still running keeps one open, so
    /// this call (and `Drop`) blocks until that child exits or closes its
    /// stdout. Wait for such children before closing.
    pub fn close(mut self) -> Result<(), TeeError> {
        self.restore()
    }

    #[cfg(not(unix))]
    fn redirect(_options: &TeeOptions) -> Result<Self, TeeError> {
        Err(TeeError::Unsupported)
    }

    #[cfg(not(unix))]
    fn restore(&mut self) -> Result<(), TeeError> {
        Ok(())
    }

    #[cfg(unix)]
    fn redirect(options: &TeeOptions) -> Result<Self, TeeError> {
        let _ = io::stdout().flush();

        let saved = sys::dup_cloexec(libc::STDOUT_FILENO).map_err(TeeError::Redirect)?;
        let console = sys::dup_cloexec(saved.as_raw_fd()).map_err(TeeError::Redirect)?;
        let tee = Arc::new(Interceptor::new(
            options,
            Box::new(std::fs::File::from(console)),
        )?);

        let (read_end, write_end) = sys::pipe_cloexec().map_err(TeeError::Redirect)?;
        let pump = spawn_pump(std::fs::File::from(read_end), Arc::clone(&tee))
            .map_err(TeeError::Redirect)?;

        if let Err(e) = sys::dup2(write_end.as_raw_fd(), libc::STDOUT_FILENO) {
            // Dropping the only write end lets the pump see EOF
            drop(write_end);
            let _ = pump.join();
            return Err(TeeError::Redirect(e));
        }
        drop(write_end);

        Ok(Self {
            tee,
            saved_stdout: Some(saved),
            pump: Some(pump),
        })
    }

    #[cfg(unix)]
    fn restore(&mut self) -> Result<(), TeeError> {
        let Some(saved) = self.saved_stdout.take() else {
            return Ok(());
        };

        let _ = io::stdout().flush();
        if let Err(e) = sys::dup2(saved.as_raw_fd(), libc::STDOUT_FILENO) {
            self.saved_stdout = Some(saved);
            return Err(TeeError::Redirect(e));
        }
        drop(saved);

        // fd 1 no longer refers to the pipe, so the pump ends once it is drained
        let pumped = match self.pump.take() {
            Some(handle) => handle.join().unwrap_or(Err(TeeError::PumpPanicked)),
            None => Ok(()),
        };
        let closed = self.tee.close().map(drop);
        INSTALLED.store(false, Ordering::SeqCst);
        info!("Stdout tee removed");

        pumped.and(closed)
    }
}

impl Drop for StdoutTee {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "Failed to restore stdout");
        }
    }
}

/// Copy everything arriving on the pipe into the interceptor
///
/// A write error does not stop the loop: the pipe must keep draining or
/// writers to stdout would block. The first error is returned at EOF.
#[cfg(unix)]
fn spawn_pump(
    mut source: std::fs::File,
    tee: Arc<Interceptor>,
) -> io::Result<JoinHandle<Result<(), TeeError>>> {
    use std::io::Read;

    std::thread::Builder::new()
        .name("servertee-pump".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; PUMP_CHUNK];
            let mut first_error = None;
            loop {
                match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Err(e) = tee.write_bytes(&buf[..n]) {
                            if first_error.is_none() {
                                warn!(error = %e, "Failed to tee stdout output");
                                first_error = Some(e);
                            }
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(TeeError::Redirect(e)),
                }
            }
            first_error.map_or(Ok(()), Err)
        })
}

#[cfg(unix)]
mod sys {
    use std::io;
    use std::os::fd::{FromRawFd, OwnedFd, RawFd};

    fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
        if ret == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret)
        }
    }

    /// Duplicate `fd` with close-on-exec set, so children never inherit it
    pub fn dup_cloexec(fd: RawFd) -> io::Result<OwnedFd> {
        let new = cvt(unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) })?;
        Ok(unsafe { OwnedFd::from_raw_fd(new) })
    }

    /// Create a pipe whose ends are both close-on-exec
    pub fn pipe_cloexec() -> io::Result<(OwnedFd, OwnedFd)> {
        let mut fds = [0 as libc::c_int; 2];
        cvt(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        for fd in [fds[0], fds[1]] {
            cvt(unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) })?;
        }
        Ok((read, write))
    }

    /// Point `dst` at the file `src` refers to (the result is inheritable)
    pub fn dup2(src: RawFd, dst: RawFd) -> io::Result<()> {
        loop {
            match cvt(unsafe { libc::dup2(src, dst) }) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other.map(drop),
            }
        }
    }
}
