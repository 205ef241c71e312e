//! The Xpt2046 touch panel driver.
//!
//! The driver is for the XPT2046 Resistive Touch Screen Controller sharing an
//! SPI bus with a display panel.
//!
//! The driver provides the location in pixels of touches made to the touch
//! screen connected to the XPT2046, as well as the raw measurements it is
//! derived from.
//!
//! Essentially, the XPT2046 is a ADC (analog to digital converter) that can be
//! commanded to measure the voltage across one of its resistive plates. The
//! driver uses four of these measurements: X-Position and Y-Position, which
//! locate the touch on the panel, and Z1-Position and Z2-Position, which
//! together give a crude estimate of how hard the panel is pressed.
//!
//! The driver determines the touch location in pixels by measuring, filtering
//! and transforming X-Position and Y-Position. Filtering is done because a
//! finger settling on a resistive panel bounces and because various sources
//! introduce noise into individual measurements (see [`crate::filter`] and
//! [`crate::touch`]). Transforming is done because the touch panel and display
//! panel may not be aligned and do not share a resolution (see
//! [`crate::calibration`] and [`crate::mapper`]).
//!
//! Information on the operation of the XPT2046 Touch Screen Controller can be
//! found in the XPT2046 data sheet
//! (<https://www.snapeda.com/parts/XPT2046/Xptek/datasheet/>).

use crate::{
    bus::{BusConfig, BusSession, OuterTransaction},
    calibration::{CalibrationParameters, Transform},
    clock::Clock,
    error::Error,
    touch::TouchState,
};
use core::fmt::Debug;
#[cfg(feature = "defmt")]
use defmt::Format;
use embassy_embedded_hal::SetConfig;
use embedded_graphics::geometry::Size;
use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiBus};

/// Convenience enums and functions for working with the XPT2046 Control Byte.
///
/// The XPT2046 Control Byte consists of one start bit (S), three channel select
/// bits (A2-A0), one 12-bit/8-bit ADC conversion select bit (MODE), one
/// single-ended/differential select bit (SER/DER) and two power down mode
/// select bits (PD1-PD0).
///
/// A conversion starts with the control byte. Its 12-bit result is clocked
/// out over the next two bytes: the first byte carries a busy bit followed by
/// the seven most significant bits, the second the five least significant
/// bits followed by three zero bits. The control byte for the next conversion
/// can be sent together with the second byte of the current one.
pub(crate) mod control_byte {
    #[cfg(feature = "defmt")]
    use defmt::Format;

    /// Selects the channel to be measured by the measurement.
    ///
    /// The data sheet names the position channels after the axis they
    /// locate, not after the plate driven to measure them: X-Position is
    /// sensed on the Y plate and Y-Position on the X plate.
    #[cfg_attr(feature = "defmt", derive(Format))]
    #[derive(Debug, Clone, Copy)]
    pub enum ChannelSelect {
        /// Make the X-Position measurement of the touch panel.
        XPosition = 0b101,
        /// Make the Y-Position measurement of the touch panel.
        YPosition = 0b001,
        /// Make the Z1-Position measurement of the touch panel.
        ///
        /// According to page 20 of the XPT2046 data sheet, the Z1-Position
        /// measurement along with the Z2-Position measurement are collectively
        /// known as the Pressure-Position measurements.
        Z1Position = 0b011,
        /// Make the Z2-Position measurement of the touch panel.
        Z2Position = 0b100,
    }

    /// Selects the ADC precision for the measurement.
    ///
    /// The 8-bit mode (MODE = 1) is never used.
    #[cfg_attr(feature = "defmt", derive(Format))]
    #[derive(Debug)]
    pub enum ADCModeSelect {
        /// Make the measurement with 12-bits of ADC precision.
        Bits12 = 0b0,
    }

    /// Selects a duel-ended (differential) reference for the measurement.
    ///
    /// Position and pressure are always measured ratiometrically, so the
    /// single-ended reference (SER/DER = 1) is never used.
    #[cfg_attr(feature = "defmt", derive(Format))]
    #[derive(Debug)]
    pub enum SerDerSelect {
        Der = 0b0,
    }

    /// Selects the power down mode entered between conversions.
    ///
    /// Only PD1-PD0 = 00 is used: the controller powers down between
    /// conversions and keeps PENIRQ enabled.
    #[cfg_attr(feature = "defmt", derive(Format))]
    #[derive(Debug)]
    pub enum PowerDownSelect {
        PenIrq = 0b00,
    }

    /// Builds a X2046 Control Byte.
    pub const fn build_control_byte(
        channel: ChannelSelect,
        adc_mode: ADCModeSelect,
        ser_der: SerDerSelect,
        power_down: PowerDownSelect,
    ) -> u8 {
        (0b1 << 7)
            | ((channel as u8) << 4)
            | ((adc_mode as u8) << 3)
            | ((ser_der as u8) << 2)
            | (power_down as u8)
    }

    impl ChannelSelect {
        /// Converts the [`ChannelSelect`] value into the control byte used
        /// for it: a 12-bit differential measurement that leaves PENIRQ
        /// enabled afterwards.
        pub const fn into_control_byte(self) -> u8 {
            build_control_byte(
                self,
                ADCModeSelect::Bits12,
                SerDerSelect::Der,
                PowerDownSelect::PenIrq,
            )
        }
    }
}

const X: u8 = control_byte::ChannelSelect::XPosition.into_control_byte();
const Y: u8 = control_byte::ChannelSelect::YPosition.into_control_byte();
const Z1: u8 = control_byte::ChannelSelect::Z1Position.into_control_byte();
const Z2: u8 = control_byte::ChannelSelect::Z2Position.into_control_byte();

// Four back-to-back conversions per axis. The first three only let the ADC
// input settle and are discarded; the fourth conversion of X-Position is read
// from bytes 7-8 and of Y-Position from bytes 15-16.
const READ_XY_TX_BUF: [u8; 17] = [X, 0, X, 0, X, 0, X, 0, Y, 0, Y, 0, Y, 0, Y, 0, 0];

// Z1 is read from bytes 1-2 while Z2 is started, Z2 from bytes 3-4. Both are
// read as 16-bit words and shifted down by three.
const READ_Z_TX_BUF: [u8; 5] = [Z1, 0, Z2, 0, 0];

/// A pressure reading of exactly this value means the plates are not in
/// contact.
const NO_CONTACT_PRESSURE: i16 = 4095;

/// Pressure estimate combined from the Z1-Position and Z2-Position
/// measurements. Zero means no touch; larger is firmer.
pub type Pressure = i16;

/// Uncalibrated touch panel coordinates in XPT2046 measurement units
/// (0-4095).
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub x: u16,
    pub y: u16,
}

impl RawSample {
    /// Creates a sample from raw X-Position and Y-Position values.
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Returns true when neither axis differs from `other` by more than
    /// `deadband`.
    pub fn agrees_with(&self, other: &RawSample, deadband: u16) -> bool {
        self.x.abs_diff(other.x) <= deadband && self.y.abs_diff(other.y) <= deadband
    }

    /// Returns the point halfway between `self` and `other`, rounded down.
    pub fn midpoint(&self, other: &RawSample) -> RawSample {
        let mid = |a: u16, b: u16| ((u32::from(a) + u32::from(b)) >> 1) as u16;
        RawSample {
            x: mid(self.x, other.x),
            y: mid(self.y, other.y),
        }
    }
}

/// Driver configuration.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Pressure threshold used by [`Xpt2046::touch()`].
    pub touch_threshold: u16,
    /// Pressure threshold used while sampling the calibration targets.
    pub calibration_threshold: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            touch_threshold: 600,
            calibration_threshold: 350,
        }
    }
}

/// The Xpt2046 driver.
///
/// The driver owns the touch controller's view of the SPI bus, the delay and
/// clock used for debouncing, the calibration parameters and the state of the
/// last accepted touch.
#[derive(Debug)]
pub struct Xpt2046<Spi: SetConfig, Cs, Delay, Clk> {
    /// The SPI bus and touch chip-select
    pub(crate) bus: BusSession<Spi, Cs>,
    pub(crate) delay: Delay,
    pub(crate) clock: Clk,
    /// Size of the display in pixels
    pub(crate) display_size: Size,
    pub(crate) config: Config,
    /// Calibration parameters for transforming raw samples into display pixel positions.
    pub(crate) calibration: CalibrationParameters,
    pub(crate) state: TouchState,
}

impl<Spi, SpiError, Cs, CsError, Delay, Clk> Xpt2046<Spi, Cs, Delay, Clk>
where
    Spi: SpiBus<u8, Error = SpiError> + SetConfig,
    Cs: OutputPin<Error = CsError>,
    SpiError: Debug,
    CsError: Debug,
    Delay: DelayNs,
    Clk: Clock,
{
    /// Creates a driver for a display of `display_size` pixels.
    ///
    /// `bus_config` holds the SPI configuration used for touch reads and the
    /// one put back after each read, see [`crate::bus`].
    ///
    /// Until [`Self::set_calibration()`] is called or a calibration is run,
    /// the driver assumes the touch panel spans the full ADC range in the
    /// same orientation as the display.
    pub fn new(
        spi: Spi,
        cs: Cs,
        bus_config: BusConfig<Spi::Config>,
        delay: Delay,
        clock: Clk,
        display_size: Size,
        config: Config,
    ) -> Self {
        Self {
            bus: BusSession::new(spi, cs, bus_config),
            delay,
            clock,
            display_size,
            config,
            calibration: CalibrationParameters::estimate(Transform::default()),
            state: TouchState::default(),
        }
    }

    /// Reset the driver.
    pub fn init(&mut self) -> Result<(), Error<SpiError, CsError>> {
        // Make a throwaway position measurement so that the power down bits
        // leave PENIRQ enabled.
        _ = self.read_raw_xy()?;

        self.state = TouchState::default();

        Ok(())
    }

    /// Returns the configuration the driver was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the display size the driver maps touches onto.
    pub fn display_size(&self) -> Size {
        self.display_size
    }

    /// Updates the display size, e.g. after rotating the display.
    ///
    /// Calibration parameters are tied to a display orientation and should be
    /// replaced as well.
    pub fn set_display_size(&mut self, display_size: Size) {
        self.display_size = display_size;
    }

    /// Returns the calibration parameters in use.
    pub fn calibration(&self) -> &CalibrationParameters {
        &self.calibration
    }

    /// Sets the calibration parameters used by [`Self::get_touch()`].
    ///
    /// This can be used to restore parameters exported after an earlier
    /// calibration run.
    pub fn set_calibration(&mut self, calibration: CalibrationParameters) {
        #[cfg(feature = "defmt")]
        defmt::debug!("calibration set: {:?}", calibration);

        self.calibration = calibration;
    }

    /// Marks the start of a larger transaction by another user of the bus.
    ///
    /// Touch reads made before the token is handed back to
    /// [`Self::end_outer_transaction()`] leave the bus configuration alone.
    pub fn begin_outer_transaction(&mut self) -> OuterTransaction {
        self.bus.begin_outer()
    }

    /// Marks the end of a transaction started by
    /// [`Self::begin_outer_transaction()`].
    pub fn end_outer_transaction(&mut self, token: OuterTransaction) {
        self.bus.end_outer(token)
    }

    /// Returns the measurements of X-Position and Y-Position.
    ///
    /// Each axis is converted four times and only the last conversion is
    /// kept. The controller always answers, so an untouched panel yields
    /// meaningless values; use [`Self::read_raw_pressure()`] to tell.
    pub fn read_raw_xy(&mut self) -> Result<RawSample, Error<SpiError, CsError>> {
        let mut rx_buf = [0; READ_XY_TX_BUF.len()];
        self.bus.transfer(&mut rx_buf, &READ_XY_TX_BUF)?;

        let x = (u16::from(rx_buf[7]) << 5) | u16::from((rx_buf[8] >> 3) & 0x1f);
        let y = (u16::from(rx_buf[15]) << 5) | u16::from((rx_buf[16] >> 3) & 0x1f);

        #[cfg(feature = "defmt")]
        defmt::trace!("raw x,y = {},{}", x, y);

        Ok(RawSample { x, y })
    }

    /// Returns the touch pressure estimated as `4095 + Z1 - Z2`.
    ///
    /// When the plates are not in contact the two measurements are equal;
    /// that reading is reported as `0` rather than `4095`.
    pub fn read_raw_pressure(&mut self) -> Result<Pressure, Error<SpiError, CsError>> {
        let mut rx_buf = [0; READ_Z_TX_BUF.len()];
        self.bus.transfer(&mut rx_buf, &READ_Z_TX_BUF)?;

        let z1 = (u16::from_be_bytes([rx_buf[1], rx_buf[2]]) >> 3) as i16;
        let z2 = (u16::from_be_bytes([rx_buf[3], rx_buf[4]]) >> 3) as i16;
        let pressure = NO_CONTACT_PRESSURE + z1 - z2;

        if pressure == NO_CONTACT_PRESSURE {
            Ok(0)
        } else {
            Ok(pressure)
        }
    }

    /// Releases the bus, chip-select, delay and clock.
    pub fn release(self) -> (Spi, Cs, Delay, Clk) {
        let (spi, cs) = self.bus.release();
        (spi, cs, self.delay, self.clock)
    }
}
