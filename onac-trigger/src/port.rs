//! Single-byte trigger output for the neuroimaging recorder.
//!
//! The protocol is one ASCII byte per event at 9600 baud with no framing and
//! no acknowledgement. Callers decide *when* a byte goes out; these types only
//! deliver it.

use onac_core::{Error, Result, TriggerCode};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BAUD: u32 = 9600;

pub trait TriggerPort {
    /// Writes one code byte and flushes it to the device.
    fn write_code(&mut self, code: TriggerCode) -> Result<()>;

    /// True when bytes actually leave the process.
    fn is_live(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<P: TriggerPort + ?Sized> TriggerPort for Box<P> {
    fn write_code(&mut self, code: TriggerCode) -> Result<()> {
        (**self).write_code(code)
    }

    fn is_live(&self) -> bool {
        (**self).is_live()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// List available serial ports
pub fn list_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

pub struct SerialTrigger {
    name: String,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTrigger {
    /// Open the trigger line, e.g. `/dev/ttyUSB0` or `COM4`.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;
        info!(port = port_name, baud_rate, "serial trigger port open");
        Ok(Self {
            name: port_name.to_string(),
            port: Some(port),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TriggerPort for SerialTrigger {
    fn write_code(&mut self, code: TriggerCode) -> Result<()> {
        let port = self.port.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                format!("trigger port {} is closed", self.name),
            ))
        })?;
        port.write_all(&[code.byte()])?;
        port.flush()?;
        debug!(%code, "trigger written");
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            port.flush()?;
            info!(port = %self.name, "serial trigger port closed");
        }
        Ok(())
    }
}

/// Drops every code. Used when no port is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrigger;

impl TriggerPort for NullTrigger {
    fn write_code(&mut self, code: TriggerCode) -> Result<()> {
        debug!(%code, "trigger dropped (no port)");
        Ok(())
    }
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Keeps every written code, optionally stamped by a clock. Clones share the log.
#[derive(Clone, Default)]
pub struct RecordingTrigger {
    sent: Arc<Mutex<Vec<(TriggerCode, u64)>>>,
    clock: Option<Clock>,
    fail_after: Option<usize>,
    closed: Arc<Mutex<bool>>,
}

impl RecordingTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps each code with `clock()` at write time.
    pub fn with_clock(clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            clock: Some(Arc::new(clock)),
            ..Self::default()
        }
    }

    /// Fails every write after the first `n`, like a dropped cable.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn sent(&self) -> Vec<(TriggerCode, u64)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn codes(&self) -> Vec<TriggerCode> {
        self.sent().into_iter().map(|(c, _)| c).collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TriggerPort for RecordingTrigger {
    fn write_code(&mut self, code: TriggerCode) -> Result<()> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        if self.fail_after.is_some_and(|n| sent.len() >= n) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "trigger line disconnected",
            )));
        }
        let at = self.clock.as_ref().map_or(0, |c| c());
        sent.push((code, at));
        Ok(())
    }

    fn is_live(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<()> {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner()) = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn recording_trigger_shares_log_between_clones() {
        let now = Arc::new(AtomicU64::new(0));
        let clock = Arc::clone(&now);
        let rec = RecordingTrigger::with_clock(move || clock.load(Ordering::SeqCst));
        let mut port = rec.clone();

        port.write_code(TriggerCode::SESSION_START).unwrap();
        now.store(2_000, Ordering::SeqCst);
        port.write_code(TriggerCode::from_char('C').unwrap()).unwrap();

        let sent = rec.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], (TriggerCode::SESSION_START, 0));
        assert_eq!(sent[1].0.as_char(), 'C');
        assert_eq!(sent[1].1, 2_000);
    }

    #[test]
    fn failing_port_reports_io_error() {
        let mut port = RecordingTrigger::new().failing_after(1);
        assert!(port.write_code(TriggerCode::SESSION_START).is_ok());
        let err = port.write_code(TriggerCode::SESSION_START).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(port.codes().len(), 1);
    }

    #[test]
    fn close_is_observable() {
        let rec = RecordingTrigger::new();
        let mut port = rec.clone();
        port.close().unwrap();
        assert!(rec.is_closed());
    }

    #[test]
    fn null_trigger_is_not_live() {
        let mut port = NullTrigger;
        assert!(port.write_code(TriggerCode::RESTING_START).is_ok());
        assert!(!port.is_live());
    }

    #[test]
    fn opening_a_missing_port_fails() {
        assert!(SerialTrigger::open("/dev/onac-does-not-exist", DEFAULT_BAUD).is_err());
    }
}
