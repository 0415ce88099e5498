//! Keyboard device access for the hook helper (Linux).
//!
//! Public API:
//! - `discover_keyboard()` picks a `/dev/input/event*` node
//! - `KeyboardDevice` opens, grabs, reads and mirrors key events, and
//!   releases the device (ungrab, then close) on `release()` or drop

use anyhow::{Context, Result};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, InputEventKind, Key};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::helper::KeyStream;

const INPUT_DIR: &str = "/dev/input";
const FALLBACK_DEVICE: &str = "/dev/input/event0";

/// What discovery learned about one event node.
#[derive(Debug, Clone)]
pub struct DeviceProbe {
    pub path: PathBuf,
    pub name: String,
    pub has_keys: bool,
}

/// Pick the keyboard among probed devices: a name mentioning a keyboard
/// first, then anything with key events, then `event0`.
pub fn choose_keyboard(probes: &[DeviceProbe]) -> PathBuf {
    let named = probes.iter().find(|p| {
        let name = p.name.to_lowercase();
        name.contains("keyboard") || name.contains("kbd")
    });
    named
        .or_else(|| probes.iter().find(|p| p.has_keys))
        .map(|p| p.path.clone())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DEVICE))
}

/// Probe every event node; nodes that fail to open are logged and skipped.
pub fn probe_devices() -> Vec<DeviceProbe> {
    let entries = match std::fs::read_dir(INPUT_DIR) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot list {INPUT_DIR}: {e}");
            return Vec::new();
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"))
        })
        .collect();
    paths.sort();

    let mut probes = Vec::new();
    for path in paths {
        match Device::open(&path) {
            Ok(device) => {
                let probe = DeviceProbe {
                    name: device.name().unwrap_or_default().to_string(),
                    has_keys: device.supported_events().contains(EventType::KEY),
                    path,
                };
                debug!(path = %probe.path.display(), name = %probe.name, has_keys = probe.has_keys, "probed input device");
                probes.push(probe);
            }
            Err(e) => debug!(path = %path.display(), "skipping input device: {e}"),
        }
    }
    probes
}

pub fn discover_keyboard() -> PathBuf {
    let path = choose_keyboard(&probe_devices());
    info!(path = %path.display(), "keyboard device selected");
    path
}

/// An opened keyboard with optional exclusive grab and passthrough.
pub struct KeyboardDevice {
    path: PathBuf,
    device: Option<Device>,
    grabbed: bool,
    passthrough: Option<VirtualDevice>,
}

impl KeyboardDevice {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let device = Device::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        info!(path = %path.display(), name = device.name().unwrap_or("?"), "keyboard opened");
        Ok(Self {
            path,
            device: Some(device),
            grabbed: false,
            passthrough: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }

    /// Try an exclusive grab. On success, keys that are not intercepted are
    /// re-emitted through a virtual keyboard. Contention leaves the device in
    /// shared mode with a warning.
    pub fn grab(&mut self) -> bool {
        let Some(device) = self.device.as_mut() else {
            return false;
        };
        let passthrough = match build_passthrough(device) {
            Ok(virt) => virt,
            Err(e) => {
                warn!("virtual keyboard unavailable, not grabbing: {e:#}");
                return false;
            }
        };
        match device.grab() {
            Ok(()) => {
                info!(path = %self.path.display(), "keyboard grabbed");
                self.grabbed = true;
                self.passthrough = Some(passthrough);
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), "exclusive grab failed, running shared: {e}");
                false
            }
        }
    }

    /// Block until the next batch of key events; returns `(code, value)`
    /// pairs with value 1 for press, 0 for release and 2 for repeat.
    pub fn fetch_keys(&mut self) -> Result<Vec<(u32, i32)>> {
        let device = self.device.as_mut().context("device already released")?;
        let events = device.fetch_events().context("reading key events")?;
        Ok(events
            .filter_map(|ev| match ev.kind() {
                InputEventKind::Key(key) => Some((u32::from(key.code()), ev.value())),
                _ => None,
            })
            .collect())
    }

    /// Like `fetch_keys`, but gives up after `timeout`. An empty batch means
    /// nothing arrived or a signal interrupted the wait.
    pub fn poll_keys(&mut self, timeout: Duration) -> Result<Vec<(u32, i32)>> {
        let ready = {
            let device = self.device.as_ref().context("device already released")?;
            // SAFETY: `device` keeps the descriptor open for the whole poll
            let fd = unsafe { BorrowedFd::borrow_raw(device.as_raw_fd()) };
            let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
            let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
            match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(n) => n > 0,
                Err(Errno::EINTR) => false,
                Err(e) => return Err(e).context("waiting for key events"),
            }
        };
        if ready {
            self.fetch_keys()
        } else {
            Ok(Vec::new())
        }
    }

    /// Re-emit a key event through the virtual keyboard.
    pub fn forward(&mut self, code: u32, value: i32) {
        let Some(virt) = self.passthrough.as_mut() else {
            return;
        };
        let Ok(code) = u16::try_from(code) else {
            return;
        };
        let event = InputEvent::new(EventType::KEY, code, value);
        if let Err(e) = virt.emit(&[event]) {
            warn!(code, "passthrough failed: {e}");
        }
    }

    /// Ungrab, then close. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            if self.grabbed {
                if let Err(e) = device.ungrab() {
                    warn!("ungrab failed: {e}");
                }
                self.grabbed = false;
            }
            self.passthrough.take();
            drop(device);
            info!(path = %self.path.display(), "keyboard released");
        }
    }
}

impl KeyStream for KeyboardDevice {
    fn next_keys(&mut self, timeout: Duration) -> Result<Vec<(u32, i32)>> {
        self.poll_keys(timeout)
    }

    fn forward(&mut self, code: u32, value: i32) {
        KeyboardDevice::forward(self, code, value);
    }

    fn release(&mut self) {
        KeyboardDevice::release(self);
    }
}

impl Drop for KeyboardDevice {
    fn drop(&mut self) {
        self.release();
    }
}

fn build_passthrough(device: &Device) -> Result<VirtualDevice> {
    let keys: AttributeSet<Key> = match device.supported_keys() {
        Some(supported) => supported.iter().collect(),
        None => AttributeSet::new(),
    };
    let virt = VirtualDeviceBuilder::new()?
        .name("q9 passthrough keyboard")
        .with_keys(&keys)?
        .build()?;
    Ok(virt)
}
