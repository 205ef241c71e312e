//! Calibrated touch readings.
//!
//! [`Xpt2046::get_touch()`] makes several debounced readings, accepts the
//! touch if any of them succeeded and maps the last successful one onto the
//! display. After a touch is accepted, the next 50 ms use the lowest pressure
//! threshold so that a finger still resting on the panel is not dropped by a
//! caller asking for a firm press.

use crate::{
    clock::Clock,
    driver::{RawSample, Xpt2046},
    error::Error,
};
use core::fmt::Debug;
#[cfg(feature = "defmt")]
use defmt::Format;
use embassy_embedded_hal::SetConfig;
use embedded_graphics::geometry::Point;
use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiBus};

/// Lowest pressure threshold a touch reading will use.
pub const MIN_THRESHOLD: u16 = 20;

/// Number of debounced readings combined into one touch.
pub const ATTEMPTS: u8 = 5;

/// How long after an accepted touch the threshold stays at
/// [`MIN_THRESHOLD`].
pub const SETTLE_WINDOW_MS: u64 = 50;

/// An accepted touch.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    /// Touch position in display pixels.
    pub point: Point,
    /// How many of the [`ATTEMPTS`] debounced readings succeeded (1-5).
    /// Higher means a steadier touch.
    pub samples: u8,
}

/// State kept between touch readings.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TouchState {
    /// Last touch position accepted by [`Xpt2046::get_touch()`]
    last_press: Option<Point>,
    /// Clock time at which the settle window closes
    settle_deadline: Option<u64>,
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
    /// Returns the calibrated touch position, or `None` if the panel is not
    /// touched.
    ///
    /// `threshold` is the pressure a touch must exceed. It is raised to
    /// [`MIN_THRESHOLD`] if lower, and ignored in favour of
    /// [`MIN_THRESHOLD`] within [`SETTLE_WINDOW_MS`] of the previous
    /// accepted touch.
    ///
    /// A touch mapping outside the display is reported as `None`.
    pub fn get_touch(&mut self, threshold: u16) -> Result<Option<Touch>, Error<SpiError, CsError>> {
        let threshold = self.effective_threshold(threshold);

        let mut samples = 0;
        let mut raw: Option<RawSample> = None;
        for _ in 0..ATTEMPTS {
            if let Some(sample) = self.validated_read(threshold)? {
                samples += 1;
                raw = Some(sample);
            }
        }

        let Some(raw) = raw else {
            self.state.settle_deadline = None;
            return Ok(None);
        };

        self.state.settle_deadline = Some(self.clock.now_ms() + SETTLE_WINDOW_MS);

        let point = self.calibration.map(raw, self.display_size);
        if !crate::mapper::is_on_display(point, self.display_size) {
            #[cfg(feature = "defmt")]
            defmt::debug!("touch {:?} maps off the display to {:?}", raw, point);

            return Ok(None);
        }

        self.state.last_press = Some(point);
        Ok(Some(Touch { point, samples }))
    }

    /// Returns the calibrated touch position using the configured
    /// [`touch_threshold`](crate::driver::Config::touch_threshold).
    pub fn touch(&mut self) -> Result<Option<Touch>, Error<SpiError, CsError>> {
        self.get_touch(self.config.touch_threshold)
    }

    /// Returns the position of the last accepted touch.
    pub fn last_touch(&self) -> Option<Point> {
        self.state.last_press
    }

    /// Returns true while the reduced threshold after a touch applies.
    pub fn in_settle_window(&mut self) -> bool {
        match self.state.settle_deadline {
            Some(deadline) => deadline > self.clock.now_ms(),
            None => false,
        }
    }

    fn effective_threshold(&mut self, requested: u16) -> u16 {
        if self.in_settle_window() {
            MIN_THRESHOLD
        } else {
            requested.max(MIN_THRESHOLD)
        }
    }
}
