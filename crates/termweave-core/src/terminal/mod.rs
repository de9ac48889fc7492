//! Terminal driver contract and scoped acquisition.
//!
//! The dispatcher treats the terminal as a single scoped resource: it is put
//! into managed mode when a [`System`](crate::System) is created and handed
//! back in its default mode when the system is dropped, whichever way the
//! drop happens. Input decoding and painting live above this layer.

mod headless;
#[cfg(unix)]
mod process;

use std::io;
use std::time::Duration;

pub use headless::HeadlessTerminal;
#[cfg(unix)]
pub use process::ProcessTerminal;

use crate::config::TerminalMode;
use crate::error::{Result, WeaveError};
use crate::logging::targets;

/// Something read from the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalInput {
    /// Raw bytes, undecoded.
    Bytes(Vec<u8>),
    /// The terminal was resized.
    Resize {
        /// New width in columns.
        width: u16,
        /// New height in rows.
        height: u16,
    },
}

/// Minimal terminal interface used by the dispatcher.
pub trait TerminalDriver {
    /// Switch the terminal into `mode`.
    fn enter_managed_mode(&mut self, mode: &TerminalMode) -> io::Result<()>;

    /// Restore the terminal to the state it had before
    /// [`enter_managed_mode`](Self::enter_managed_mode).
    fn leave_managed_mode(&mut self) -> io::Result<()>;

    /// Current `(width, height)` in cells.
    fn dimensions(&self) -> (u16, u16);

    /// Wait up to `timeout` for input. `Duration::ZERO` only checks.
    fn read_input(&mut self, timeout: Duration) -> Option<TerminalInput>;
}

/// RAII guard that holds a driver in managed mode and releases it on drop.
pub struct TerminalGuard {
    driver: Option<Box<dyn TerminalDriver>>,
}

impl TerminalGuard {
    /// Put `driver` into `mode` and take ownership of it.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::TerminalInit`] if the driver cannot enter the
    /// mode. The driver is dropped without a release call in that case.
    pub fn acquire(mut driver: Box<dyn TerminalDriver>, mode: &TerminalMode) -> Result<Self> {
        driver
            .enter_managed_mode(mode)
            .map_err(WeaveError::TerminalInit)?;
        tracing::info!(target: targets::TERMINAL, ?mode, "terminal acquired");
        Ok(Self {
            driver: Some(driver),
        })
    }

    /// Access the wrapped driver.
    ///
    /// # Panics
    ///
    /// Panics if the guard was already released.
    pub fn driver(&self) -> &dyn TerminalDriver {
        self.driver
            .as_deref()
            .expect("terminal already released from guard")
    }

    /// Mutable access to the wrapped driver.
    ///
    /// # Panics
    ///
    /// Panics if the guard was already released.
    pub fn driver_mut(&mut self) -> &mut dyn TerminalDriver {
        self.driver
            .as_deref_mut()
            .expect("terminal already released from guard")
    }

    /// Release the terminal now, reporting failure instead of logging it.
    pub fn release(mut self) -> Result<()> {
        match self.driver.take() {
            Some(mut driver) => {
                driver
                    .leave_managed_mode()
                    .map_err(WeaveError::TerminalRestore)?;
                tracing::info!(target: targets::TERMINAL, "terminal released");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.as_mut() {
            match driver.leave_managed_mode() {
                Ok(()) => tracing::info!(target: targets::TERMINAL, "terminal released"),
                Err(err) => {
                    tracing::warn!(target: targets::TERMINAL, %err, "failed to restore terminal")
                }
            }
        }
    }
}
