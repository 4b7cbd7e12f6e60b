// Semdev path backend
// fd ownership, readiness polling, frame decoding

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use crate::device::DeviceId;
use crate::frame::RawEvent;

use super::DeviceOpener;

/// Poll flags that mean the device is gone.
const DISCONNECT_FLAGS: libc::c_short = libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;

/// What one poll round produced for one device.
#[derive(Debug)]
pub struct BackendBatch {
    pub device: DeviceId,
    pub events: Vec<RawEvent>,
    /// The fd reported removal; the caller must retire the device.
    pub gone: bool,
}

struct BackendDevice {
    id: DeviceId,
    path: PathBuf,
    /// None while suspended.
    handle: Option<evdev::Device>,
}

/// Owns the opened evdev handles, multiplexes readability onto one epoll
/// fd, and decodes kernel events into raw records.
pub struct PathBackend {
    opener: Box<dyn DeviceOpener>,
    devices: Vec<BackendDevice>,
    epoll_fd: RawFd,
    timer_fd: RawFd,
}

impl PathBackend {
    pub fn new(opener: Box<dyn DeviceOpener>) -> io::Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epoll_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let timer_fd = unsafe {
            libc::timerfd_create(
                libc::CLOCK_MONOTONIC,
                libc::TFD_NONBLOCK | libc::TFD_CLOEXEC,
            )
        };
        if timer_fd < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(epoll_fd) };
            return Err(err);
        }
        let backend = Self {
            opener,
            devices: Vec::new(),
            epoll_fd,
            timer_fd,
        };
        backend.epoll_register(timer_fd)?;
        Ok(backend)
    }

    /// The single fd the host waits on: readable when a device has data or
    /// a timer is due.
    pub fn fd(&self) -> RawFd {
        self.epoll_fd
    }

    fn epoll_register(&self, fd: RawFd) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: fd as u64,
        };
        let rc = unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_ADD, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn epoll_unregister(&self, fd: RawFd) {
        unsafe {
            libc::epoll_ctl(
                self.epoll_fd,
                libc::EPOLL_CTL_DEL,
                fd,
                std::ptr::null_mut(),
            );
        }
    }

    /// Arm the timer wakeup for an absolute monotonic deadline in ms, or
    /// disarm it.
    pub fn arm_timer(&self, deadline_ms: Option<u64>) {
        let spec = match deadline_ms {
            Some(ms) => libc::itimerspec {
                it_interval: libc::timespec {
                    tv_sec: 0,
                    tv_nsec: 0,
                },
                it_value: libc::timespec {
                    tv_sec: (ms / 1000) as libc::time_t,
                    tv_nsec: ((ms % 1000) * 1_000_000) as libc::c_long,
                },
            },
            None => libc::itimerspec {
                it_interval: libc::timespec {
                    tv_sec: 0,
                    tv_nsec: 0,
                },
                it_value: libc::timespec {
                    tv_sec: 0,
                    tv_nsec: 0,
                },
            },
        };
        unsafe {
            libc::timerfd_settime(self.timer_fd, libc::TFD_TIMER_ABSTIME, &spec, std::ptr::null_mut());
        }
    }

    fn drain_timer_fd(&self) {
        let mut buf = [0u8; 8];
        unsafe {
            libc::read(self.timer_fd, buf.as_mut_ptr() as *mut libc::c_void, 8);
        }
    }

    /// Open a device node through the restricted opener. The caller
    /// describes the device, then hands the handle back via `track`.
    pub fn open(&mut self, path: &Path) -> io::Result<evdev::Device> {
        self.opener.open(path)
    }

    pub fn track(&mut self, id: DeviceId, path: PathBuf, handle: evdev::Device) -> io::Result<()> {
        self.epoll_register(handle.as_raw_fd())?;
        self.devices.push(BackendDevice {
            id,
            path,
            handle: Some(handle),
        });
        Ok(())
    }

    pub fn untrack(&mut self, id: DeviceId) {
        if let Some(pos) = self.devices.iter().position(|d| d.id == id) {
            let entry = self.devices.remove(pos);
            if let Some(handle) = entry.handle {
                self.epoll_unregister(handle.as_raw_fd());
                self.opener.close(handle);
            }
        }
    }

    /// Close every fd and stop tracking everything. Returns the device
    /// paths in their original add order so the context can re-open them
    /// on resume.
    pub fn drain_all(&mut self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(self.devices.len());
        for entry in std::mem::take(&mut self.devices) {
            paths.push(entry.path);
            if let Some(handle) = entry.handle {
                self.epoll_unregister(handle.as_raw_fd());
                self.opener.close(handle);
            }
        }
        paths
    }

    /// Non-blocking sweep of every tracked fd. `now` stamps the decoded
    /// records with the context's monotonic clock.
    pub fn poll(&mut self, now: u64) -> io::Result<Vec<BackendBatch>> {
        let mut poll_fds: Vec<libc::pollfd> = Vec::with_capacity(self.devices.len());
        let mut indexes: Vec<usize> = Vec::with_capacity(self.devices.len());
        for (idx, entry) in self.devices.iter().enumerate() {
            if let Some(handle) = &entry.handle {
                poll_fds.push(libc::pollfd {
                    fd: handle.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                });
                indexes.push(idx);
            }
        }
        self.drain_timer_fd();
        if poll_fds.is_empty() {
            return Ok(Vec::new());
        }

        let rc = unsafe { libc::poll(poll_fds.as_mut_ptr(), poll_fds.len() as libc::nfds_t, 0) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // a signal mid-poll is a quiet round, not a failure
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(Vec::new());
            }
            return Err(err);
        }

        let mut batches = Vec::new();
        let mut gone_ids: Vec<DeviceId> = Vec::new();
        for (poll_idx, pfd) in poll_fds.iter().enumerate() {
            let entry_idx = indexes[poll_idx];
            let id = self.devices[entry_idx].id;

            if pfd.revents & DISCONNECT_FLAGS != 0 {
                log::info!("device {} disconnected", self.devices[entry_idx].path.display());
                gone_ids.push(id);
                batches.push(BackendBatch {
                    device: id,
                    events: Vec::new(),
                    gone: true,
                });
                continue;
            }
            if pfd.revents & libc::POLLIN == 0 {
                continue;
            }

            let handle = match self.devices[entry_idx].handle.as_mut() {
                Some(h) => h,
                None => continue,
            };
            let mut events = Vec::new();
            let mut gone = false;
            match handle.fetch_events() {
                Ok(iter) => {
                    for ev in iter {
                        events.push(RawEvent::new(now, ev.event_type().0, ev.code(), ev.value()));
                    }
                }
                Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => {}
                Err(e) => {
                    if e.raw_os_error() != Some(libc::ENODEV) {
                        log::error!("read error on device {}: {}", id.0, e);
                    }
                    gone = true;
                }
            }
            if gone {
                gone_ids.push(id);
            }
            batches.push(BackendBatch {
                device: id,
                events,
                gone,
            });
        }

        for id in gone_ids {
            self.untrack(id);
        }
        Ok(batches)
    }
}

impl Drop for PathBackend {
    fn drop(&mut self) {
        let ids: Vec<DeviceId> = self.devices.iter().map(|d| d.id).collect();
        for id in ids {
            self.untrack(id);
        }
        unsafe {
            libc::close(self.timer_fd);
            libc::close(self.epoll_fd);
        }
    }
}

/// List input device nodes via udev, sorted for a stable enumeration
/// order.
pub fn enumerate_input_nodes() -> io::Result<Vec<PathBuf>> {
    let mut enumerator = udev::Enumerator::new()?;
    enumerator.match_subsystem("input")?;
    let mut nodes: Vec<PathBuf> = enumerator
        .scan_devices()?
        .filter_map(|d| d.devnode().map(PathBuf::from))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("event"))
                .unwrap_or(false)
        })
        .collect();
    nodes.sort();
    nodes.dedup();
    Ok(nodes)
}
