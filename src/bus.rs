//! Exclusive access to the SPI bus shared by the touch controller and the
//! display.
//!
//! The XPT2046 wants a much slower SPI clock than a display panel does. Every
//! raw read therefore switches the bus to the touch configuration, asserts the
//! touch chip-select, transfers, deasserts and puts the shared configuration
//! back. Bus configurations are applied through
//! [`embassy_embedded_hal::SetConfig`], which the HAL SPI drivers implement
//! and which `SpiDeviceWithConfig` uses for the same purpose.
//!
//! When a non-touch user of the bus (usually the display driver) is already
//! inside a larger transaction it marks that with an [`OuterTransaction`]
//! token. While any token is outstanding, a touch read only toggles
//! chip-select and leaves the bus configuration alone.

use crate::error::Error;
use core::fmt::{self, Debug};
#[cfg(feature = "defmt")]
use defmt::Format;
use embassy_embedded_hal::SetConfig;
use embedded_hal::{digital::OutputPin, spi::SpiBus};

/// The bus configurations switched between around every touch read.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, PartialEq)]
pub struct BusConfig<C> {
    /// Applied while talking to the XPT2046, typically a clock of 2.5 MHz or
    /// less.
    pub touch: C,
    /// Put back after every touch read, i.e. the display's configuration.
    pub shared: C,
}

impl<C> BusConfig<C> {
    /// Creates the pair of bus configurations.
    pub const fn new(touch: C, shared: C) -> Self {
        Self { touch, shared }
    }
}

/// Marks an enclosing non-touch transaction on the bus.
///
/// Obtained from [`BusSession::begin_outer()`] and handed back to
/// [`BusSession::end_outer()`].
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug)]
#[must_use = "an outer transaction stays open until the token is returned"]
pub struct OuterTransaction {
    _private: (),
}

/// A touch controller attached to a shared SPI bus.
pub struct BusSession<Spi: SetConfig, Cs> {
    /// The SPI bus
    spi: Spi,
    /// The touch controller chip-select, active low
    cs: Cs,
    config: BusConfig<Spi::Config>,
    /// Number of outstanding [`OuterTransaction`] tokens
    outer: u8,
    /// Set when `begin()` switched to the touch configuration
    restore: bool,
}

// Bus configurations are not required to implement `Debug`.
impl<Spi: SetConfig + Debug, Cs: Debug> Debug for BusSession<Spi, Cs> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSession")
            .field("spi", &self.spi)
            .field("cs", &self.cs)
            .field("outer", &self.outer)
            .field("restore", &self.restore)
            .finish_non_exhaustive()
    }
}

impl<Spi, SpiError, Cs, CsError> BusSession<Spi, Cs>
where
    Spi: SpiBus<u8, Error = SpiError> + SetConfig,
    Cs: OutputPin<Error = CsError>,
    SpiError: Debug,
    CsError: Debug,
{
    /// Creates a session. The bus is expected to be in the shared
    /// configuration.
    pub fn new(spi: Spi, cs: Cs, config: BusConfig<Spi::Config>) -> Self {
        Self {
            spi,
            cs,
            config,
            outer: 0,
            restore: false,
        }
    }

    /// Switches the bus to the touch configuration and selects the touch
    /// controller.
    pub fn begin(&mut self) -> Result<(), Error<SpiError, CsError>> {
        if self.outer == 0 {
            self.spi
                .set_config(&self.config.touch)
                .map_err(|_e| Error::Config)?;
            self.restore = true;
        }
        let selected = self.cs.set_low().map_err(Error::ChipSelect);
        if selected.is_err() {
            let restored = self.restore_shared();
            return selected.and(restored);
        }
        Ok(())
    }

    /// Deselects the touch controller and gives the bus back.
    ///
    /// Chip-select is released and the shared configuration restored even
    /// when flushing the bus fails. The first error is returned.
    pub fn end(&mut self) -> Result<(), Error<SpiError, CsError>> {
        let flushed = self.spi.flush().map_err(Error::Spi);
        let deselected = self.cs.set_high().map_err(Error::ChipSelect);
        let restored = self.restore_shared();
        flushed.and(deselected).and(restored)
    }

    fn restore_shared(&mut self) -> Result<(), Error<SpiError, CsError>> {
        if !core::mem::take(&mut self.restore) {
            return Ok(());
        }
        self.spi
            .set_config(&self.config.shared)
            .map_err(|_e| Error::Config)
    }

    /// Runs one full-duplex transfer bracketed by [`Self::begin()`] and
    /// [`Self::end()`].
    pub fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Error<SpiError, CsError>> {
        self.begin()?;
        let transferred = self.spi.transfer(read, write).map_err(Error::Spi);
        let ended = self.end();
        transferred?;
        ended
    }

    /// Opens an enclosing transaction for a non-touch user of the bus.
    pub fn begin_outer(&mut self) -> OuterTransaction {
        self.outer = self.outer.saturating_add(1);
        OuterTransaction { _private: () }
    }

    /// Closes an enclosing transaction opened by [`Self::begin_outer()`].
    pub fn end_outer(&mut self, token: OuterTransaction) {
        let OuterTransaction { _private } = token;
        self.outer = self.outer.saturating_sub(1);
    }

    /// Returns true while a non-touch transaction encloses touch reads.
    pub fn in_outer_transaction(&self) -> bool {
        self.outer > 0
    }

    /// Gives back the bus and the chip-select pin.
    pub fn release(self) -> (Spi, Cs) {
        (self.spi, self.cs)
    }
}
