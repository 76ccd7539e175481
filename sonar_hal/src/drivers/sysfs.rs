//! Linux sysfs GPIO driver.
//!
//! Uses the `/sys/class/gpio` interface: pins are exported through
//! `export`, configured through `gpioN/direction` and driven through
//! `gpioN/value`. Value files stay open for the lifetime of the driver so a
//! step only costs one `pwrite`.

use parking_lot::Mutex;
use sonar_common::hal::config::ScannerConfig;
use sonar_common::hal::driver::{DigitalIo, HalError, PinId};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// udev may need a moment to fix permissions on a freshly exported pin.
const EXPORT_SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Open value file of an exported pin.
struct PinHandle {
    value: File,
}

/// Pin backend over the sysfs GPIO interface.
pub struct SysfsGpio {
    root: PathBuf,
    pins: Mutex<HashMap<PinId, PinHandle>>,
}

impl SysfsGpio {
    /// Backend rooted at [`SYSFS_GPIO_ROOT`].
    pub fn new() -> Self {
        Self::with_root(SYSFS_GPIO_ROOT)
    }

    /// Backend rooted at `root` (tests point this at a temp dir).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pins: Mutex::new(HashMap::new()),
        }
    }

    fn pin_dir(&self, pin: PinId) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    /// Export `pin` unless already exported, then wait for its files.
    fn export(&self, pin: PinId) -> Result<(), HalError> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            fs::write(self.root.join("export"), pin.to_string()).map_err(|e| gpio_err(pin, e))?;
            debug!("Exported GPIO {}", pin);
        }

        let deadline = Instant::now() + EXPORT_SETTLE_TIMEOUT;
        let direction = dir.join("direction");
        while !is_writable(&direction) {
            if Instant::now() >= deadline {
                return Err(HalError::Gpio {
                    pin,
                    reason: format!("{} not writable after export", direction.display()),
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }

    fn configure(&self, pin: PinId, direction: &str) -> Result<(), HalError> {
        self.export(pin)?;
        let dir = self.pin_dir(pin);
        fs::write(dir.join("direction"), direction).map_err(|e| gpio_err(pin, e))?;

        let value = OpenOptions::new()
            .read(true)
            .write(direction != "in")
            .open(dir.join("value"))
            .map_err(|e| gpio_err(pin, e))?;
        self.pins.lock().insert(pin, PinHandle { value });
        debug!("GPIO {} configured as {}", pin, direction);
        Ok(())
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

fn gpio_err(pin: PinId, e: io::Error) -> HalError {
    HalError::Gpio {
        pin,
        reason: e.to_string(),
    }
}

fn is_writable(path: &Path) -> bool {
    OpenOptions::new().write(true).open(path).is_ok()
}

fn not_configured(pin: PinId) -> HalError {
    HalError::Gpio {
        pin,
        reason: "pin not configured".to_string(),
    }
}

impl DigitalIo for SysfsGpio {
    fn name(&self) -> &'static str {
        "sysfs"
    }

    fn configure_output(&self, pin: PinId) -> Result<(), HalError> {
        // "low" sets direction and level atomically.
        self.configure(pin, "low")
    }

    fn configure_input(&self, pin: PinId) -> Result<(), HalError> {
        self.configure(pin, "in")
    }

    fn write(&self, pin: PinId, level: bool) -> Result<(), HalError> {
        let mut pins = self.pins.lock();
        let handle = pins.get_mut(&pin).ok_or_else(|| not_configured(pin))?;
        handle
            .value
            .seek(SeekFrom::Start(0))
            .and_then(|_| handle.value.write_all(if level { b"1" } else { b"0" }))
            .map_err(|e| gpio_err(pin, e))
    }

    fn read(&self, pin: PinId) -> Result<bool, HalError> {
        let mut pins = self.pins.lock();
        let handle = pins.get_mut(&pin).ok_or_else(|| not_configured(pin))?;
        let mut buf = [0u8; 1];
        handle
            .value
            .seek(SeekFrom::Start(0))
            .and_then(|_| handle.value.read_exact(&mut buf))
            .map_err(|e| gpio_err(pin, e))?;
        Ok(buf[0] == b'1')
    }

    fn release(&self) -> Result<(), HalError> {
        let pins: Vec<PinId> = self.pins.lock().drain().map(|(pin, _)| pin).collect();
        for pin in pins {
            if let Err(e) = fs::write(self.root.join("unexport"), pin.to_string()) {
                warn!("Failed to unexport GPIO {}: {}", pin, e);
            }
        }
        info!("sysfs GPIO pins released");
        Ok(())
    }
}

/// Factory function to create a sysfs backend.
pub fn create_driver(_config: &ScannerConfig) -> Result<Arc<dyn DigitalIo>, HalError> {
    let root = Path::new(SYSFS_GPIO_ROOT);
    if !root.exists() {
        return Err(HalError::InitFailed(format!(
            "{} not available on this system",
            root.display()
        )));
    }
    Ok(Arc::new(SysfsGpio::new()))
}
