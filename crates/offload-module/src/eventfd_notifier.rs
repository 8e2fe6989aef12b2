//! `EventFdNotifier`: default `Notifier` implementation.
//!
//! Writes to an eventfd so an external event loop polling the descriptor
//! learns that a parked request completed. Several `notify()` calls before
//! the loop reads collapse into one readable event (eventfd counter
//! semantics). `clear()` reads the counter back to zero.

use offload_core::error::{OffloadError, Result};
use offload_core::Notifier;

use nix::errno::Errno;

use std::os::unix::io::RawFd;

pub struct EventFdNotifier {
    fd: RawFd,
    owned: bool, // true if we created the fd (close on drop)
}

impl EventFdNotifier {
    /// Wrap an existing eventfd created with `EFD_NONBLOCK | EFD_CLOEXEC`.
    ///
    /// The caller keeps ownership; the fd is not closed on drop.
    pub fn new(eventfd: RawFd) -> Self {
        Self { fd: eventfd, owned: false }
    }

    /// Create a new non-blocking eventfd owned by the notifier.
    pub fn create() -> Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(OffloadError::Notification(Errno::last() as i32));
        }
        Ok(Self { fd, owned: true })
    }

    /// Descriptor for the caller's event loop to poll.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Whether a notification is waiting to be read.
    pub fn is_signalled(&self) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, 0) };
        if ret < 0 {
            return Err(OffloadError::Notification(Errno::last() as i32));
        }
        Ok(ret > 0 && (pfd.revents & libc::POLLIN) != 0)
    }
}

impl Notifier for EventFdNotifier {
    fn notify(&self) -> Result<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = Errno::last();
            // Counter would overflow: a signal is already pending.
            if errno == Errno::EAGAIN {
                return Ok(());
            }
            return Err(OffloadError::Notification(errno as i32));
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut val: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd,
                &mut val as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = Errno::last();
            // Nothing pending.
            if errno == Errno::EAGAIN {
                return Ok(());
            }
            return Err(OffloadError::Notification(errno as i32));
        }
        Ok(())
    }
}

impl Drop for EventFdNotifier {
    fn drop(&mut self) {
        if self.owned && self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}
