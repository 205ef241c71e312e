//! Error definitions for the crate.
//!
//! Missing or unstable touches are not errors. They are reported as `None`
//! (or a zero sample count) by the read operations. The errors here only
//! cover failures of the hardware the driver talks to.

use core::fmt::Debug;
#[cfg(feature = "defmt")]
use defmt::Format;

/// The error returned when talking to the touch controller fails.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, PartialEq)]
pub enum Error<SpiError, CsError> {
    /// SPI error
    Spi(SpiError),
    /// Chip-select pin error
    ChipSelect(CsError),
    /// The SPI bus rejected a configuration
    Config,
}

/// The error returned when an error occurs in
/// [`run_calibration()`](crate::calibration_run::run_calibration).
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, PartialEq)]
pub enum CalibrationRunError<SpiError, CsError, DTError>
where
    DTError: Debug,
{
    /// An error occurred in the touch panel driver.
    Touch(Error<SpiError, CsError>),
    /// An error occurred in the display panel driver.
    DrawTarget(DTError),
    /// The cancellation hook asked the calibration to stop.
    Cancelled,
}

impl<SpiError, CsError, DTError> From<Error<SpiError, CsError>>
    for CalibrationRunError<SpiError, CsError, DTError>
where
    DTError: Debug,
{
    fn from(e: Error<SpiError, CsError>) -> Self {
        CalibrationRunError::Touch(e)
    }
}
