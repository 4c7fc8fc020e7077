//! Wake-up primitives between producer and consumer
//!
//! All signals are auto-reset: a wait consumes every notification that
//! arrived before it, so a burst of writes costs the consumer one wake.

use crate::{PlatformUtils, Result, SharedMemoryError};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Notification channel used by the ring's two sides
pub trait Signal: Send + Sync {
    /// Block until notified or until `timeout` elapses; `true` means notified
    fn wait_timeout(&self, timeout: Duration) -> Result<bool>;

    /// Wake the waiting side
    fn notify(&self) -> Result<()>;
}

/// In-process auto-reset event
#[derive(Debug, Default)]
pub struct LocalSignal {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl LocalSignal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Signal for LocalSignal {
    fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while !*pending {
            if self.cond.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        Ok(std::mem::replace(&mut *pending, false))
    }

    fn notify(&self) -> Result<()> {
        *self.pending.lock() = true;
        self.cond.notify_one();
        Ok(())
    }
}

/// Named cross-process event.
///
/// A POSIX semaphore on Unix and an auto-reset event object on Windows.
pub struct NamedSignal {
    name: String,
    raw: imp::RawSignal,
    is_creator: bool,
}

// Safety: the OS object is thread-safe; the handle is never mutated after open.
unsafe impl Send for NamedSignal {}
unsafe impl Sync for NamedSignal {}

impl NamedSignal {
    /// Create the signal, or attach to it if it already exists
    pub fn create(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let raw = imp::RawSignal::create(&PlatformUtils::object_name(&name))?;
        Ok(Self {
            name,
            raw,
            is_creator: true,
        })
    }

    /// Open a signal some other process created
    pub fn open(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let raw = imp::RawSignal::open(&PlatformUtils::object_name(&name))?;
        Ok(Self {
            name,
            raw,
            is_creator: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_creator(&self) -> bool {
        self.is_creator
    }
}

impl Signal for NamedSignal {
    fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        self.raw.wait_timeout(timeout)
    }

    fn notify(&self) -> Result<()> {
        self.raw.notify()
    }
}

impl Drop for NamedSignal {
    fn drop(&mut self) {
        self.raw.close(&PlatformUtils::object_name(&self.name), self.is_creator);
    }
}

impl std::fmt::Debug for NamedSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedSignal")
            .field("name", &self.name)
            .field("is_creator", &self.is_creator)
            .finish()
    }
}

fn c_name(name: &str) -> Result<std::ffi::CString> {
    std::ffi::CString::new(name)
        .map_err(|_| SharedMemoryError::SignalUnavailable(format!("invalid signal name {:?}", name)))
}

#[cfg(unix)]
mod imp {
    use super::*;
    use std::io;

    pub struct RawSignal {
        sem: *mut libc::sem_t,
    }

    impl RawSignal {
        pub fn create(name: &str) -> Result<Self> {
            let c_name = c_name(name)?;
            let sem = unsafe {
                libc::sem_open(
                    c_name.as_ptr(),
                    libc::O_CREAT,
                    (libc::S_IRUSR | libc::S_IWUSR) as libc::c_uint,
                    0 as libc::c_uint,
                )
            };
            Self::checked(sem, name)
        }

        pub fn open(name: &str) -> Result<Self> {
            let c_name = c_name(name)?;
            let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
            Self::checked(sem, name)
        }

        fn checked(sem: *mut libc::sem_t, name: &str) -> Result<Self> {
            if sem == libc::SEM_FAILED {
                let err = io::Error::last_os_error();
                return Err(SharedMemoryError::SignalUnavailable(format!("sem_open {}: {}", name, err)));
            }
            Ok(Self { sem })
        }

        pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
            let signalled = wait_once(self.sem, timeout)?;
            if signalled {
                // Fold posts that piled up while the consumer was busy
                while unsafe { libc::sem_trywait(self.sem) } == 0 {}
            }
            Ok(signalled)
        }

        pub fn notify(&self) -> Result<()> {
            if unsafe { libc::sem_post(self.sem) } != 0 {
                let err = io::Error::last_os_error();
                return Err(SharedMemoryError::SignalUnavailable(format!("sem_post: {}", err)));
            }
            Ok(())
        }

        pub fn close(&mut self, name: &str, unlink: bool) {
            unsafe { libc::sem_close(self.sem) };
            if unlink {
                if let Ok(c_name) = c_name(name) {
                    unsafe { libc::sem_unlink(c_name.as_ptr()) };
                }
            }
        }
    }

    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            fn wait_once(sem: *mut libc::sem_t, timeout: Duration) -> Result<bool> {
                let deadline = realtime_deadline(timeout)?;
                loop {
                    if unsafe { libc::sem_timedwait(sem, &deadline) } == 0 {
                        return Ok(true);
                    }
                    let err = io::Error::last_os_error();
                    match err.raw_os_error() {
                        Some(libc::EINTR) => continue,
                        Some(libc::ETIMEDOUT) => return Ok(false),
                        _ => return Err(SharedMemoryError::SignalUnavailable(format!("sem_timedwait: {}", err))),
                    }
                }
            }
        } else {
            fn wait_once(sem: *mut libc::sem_t, timeout: Duration) -> Result<bool> {
                const POLL_INTERVAL: Duration = Duration::from_millis(1);

                let deadline = Instant::now() + timeout;
                loop {
                    if unsafe { libc::sem_trywait(sem) } == 0 {
                        return Ok(true);
                    }
                    let err = io::Error::last_os_error();
                    match err.raw_os_error() {
                        Some(libc::EAGAIN) | Some(libc::EINTR) => {}
                        _ => return Err(SharedMemoryError::SignalUnavailable(format!("sem_trywait: {}", err))),
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    std::thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn realtime_deadline(timeout: Duration) -> Result<libc::timespec> {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) } != 0 {
            return Err(SharedMemoryError::Io(io::Error::last_os_error()));
        }

        let nanos = ts.tv_nsec as u64 + u64::from(timeout.subsec_nanos());
        ts.tv_sec += timeout.as_secs() as libc::time_t + (nanos / 1_000_000_000) as libc::time_t;
        ts.tv_nsec = (nanos % 1_000_000_000) as _;
        Ok(ts)
    }
}

#[cfg(windows)]
mod imp {
    use super::*;
    use winapi::shared::minwindef::FALSE;
    use winapi::shared::winerror::WAIT_TIMEOUT;
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::synchapi::{CreateEventA, OpenEventA, SetEvent, WaitForSingleObject};
    use winapi::um::winbase::WAIT_OBJECT_0;
    use winapi::um::winnt::{EVENT_MODIFY_STATE, HANDLE, SYNCHRONIZE};

    pub struct RawSignal {
        handle: HANDLE,
    }

    impl RawSignal {
        pub fn create(name: &str) -> Result<Self> {
            let c_name = c_name(name)?;
            // Auto-reset, initially unsignalled
            let handle = unsafe { CreateEventA(std::ptr::null_mut(), FALSE, FALSE, c_name.as_ptr()) };
            Self::checked(handle, name)
        }

        pub fn open(name: &str) -> Result<Self> {
            let c_name = c_name(name)?;
            let handle = unsafe { OpenEventA(EVENT_MODIFY_STATE | SYNCHRONIZE, FALSE, c_name.as_ptr()) };
            Self::checked(handle, name)
        }

        fn checked(handle: HANDLE, name: &str) -> Result<Self> {
            if handle.is_null() {
                let err = std::io::Error::last_os_error();
                return Err(SharedMemoryError::SignalUnavailable(format!("event {}: {}", name, err)));
            }
            Ok(Self { handle })
        }

        pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
            let millis = timeout.as_millis().min(u128::from(u32::MAX - 1)) as u32;
            match unsafe { WaitForSingleObject(self.handle, millis) } {
                WAIT_OBJECT_0 => Ok(true),
                WAIT_TIMEOUT => Ok(false),
                _ => {
                    let err = std::io::Error::last_os_error();
                    Err(SharedMemoryError::SignalUnavailable(format!("WaitForSingleObject: {}", err)))
                }
            }
        }

        pub fn notify(&self) -> Result<()> {
            if unsafe { SetEvent(self.handle) } == 0 {
                let err = std::io::Error::last_os_error();
                return Err(SharedMemoryError::SignalUnavailable(format!("SetEvent: {}", err)));
            }
            Ok(())
        }

        pub fn close(&mut self, _name: &str, _unlink: bool) {
            unsafe { CloseHandle(self.handle) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_local_signal_times_out() {
        let signal = LocalSignal::new();
        let started = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)).unwrap());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_local_signal_coalesces() {
        let signal = LocalSignal::new();
        signal.notify().unwrap();
        signal.notify().unwrap();
        assert!(signal.wait_timeout(Duration::from_millis(10)).unwrap());
        assert!(!signal.wait_timeout(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_local_signal_wakes_other_thread() {
        let signal = Arc::new(LocalSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || signal.wait_timeout(Duration::from_secs(5)).unwrap())
        };
        std::thread::sleep(Duration::from_millis(10));
        signal.notify().unwrap();
        assert!(waiter.join().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_named_signal_across_handles() {
        let name = PlatformUtils::generate_region_name("ovl_sig");
        let producer = NamedSignal::create(name.as_str()).unwrap();
        let consumer = NamedSignal::open(name.as_str()).unwrap();
        assert!(producer.is_creator());
        assert!(!consumer.is_creator());

        assert!(!consumer.wait_timeout(Duration::from_millis(5)).unwrap());

        producer.notify().unwrap();
        producer.notify().unwrap();
        producer.notify().unwrap();
        assert!(consumer.wait_timeout(Duration::from_millis(100)).unwrap());
        assert!(!consumer.wait_timeout(Duration::from_millis(5)).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_named_signal_open_missing_fails() {
        let name = PlatformUtils::generate_region_name("ovl_none");
        assert!(matches!(
            NamedSignal::open(name.as_str()),
            Err(SharedMemoryError::SignalUnavailable(_))
        ));
    }
}
