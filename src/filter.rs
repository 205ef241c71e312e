//! Debouncing of single touch readings.
//!
//! A finger pressing a resistive panel does not make clean contact: the
//! pressure ramps up over a few milliseconds and the position wanders while
//! it does. Noise coupled into the panel can also produce a convincing single
//! position measurement with nobody touching it. A reading is only accepted
//! once the pressure has stopped rising, is above the threshold twice, and two
//! position measurements taken a few milliseconds apart agree.

use crate::{
    clock::Clock,
    driver::{Pressure, RawSample, Xpt2046},
    error::Error,
};
use core::fmt::Debug;
use embassy_embedded_hal::SetConfig;
use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiBus};

/// Largest difference, in XPT2046 measurement units, allowed between the two
/// position measurements of one reading.
pub const DEADBAND: u16 = 20;

fn is_pressed(pressure: Pressure, threshold: u16) -> bool {
    i32::from(pressure) > i32::from(threshold)
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
    /// Makes one debounced reading of the touch position.
    ///
    /// Returns `None` when the panel is not pressed harder than `threshold`,
    /// when contact is lost during the reading, or when the two position
    /// measurements disagree by more than [`DEADBAND`]. Otherwise returns the
    /// average of the two measurements.
    ///
    /// This blocks until the pressure stops rising.
    pub fn validated_read(
        &mut self,
        threshold: u16,
    ) -> Result<Option<RawSample>, Error<SpiError, CsError>> {
        let mut pressure: Pressure = 1;
        let mut previous: Pressure = 0;
        while pressure > previous {
            previous = pressure;
            pressure = self.read_raw_pressure()?;
            self.delay.delay_ms(1);
        }

        if !is_pressed(pressure, threshold) {
            return Ok(None);
        }

        let first = self.read_raw_xy()?;

        self.delay.delay_ms(1);
        if !is_pressed(self.read_raw_pressure()?, threshold) {
            return Ok(None);
        }

        self.delay.delay_ms(2);
        let second = self.read_raw_xy()?;

        if !first.agrees_with(&second, DEADBAND) {
            #[cfg(feature = "defmt")]
            defmt::trace!("unstable touch: {:?} vs {:?}", first, second);

            return Ok(None);
        }

        Ok(Some(first.midpoint(&second)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{driver, Bench};

    #[test]
    fn accepts_samples_within_deadband() {
        let bench = Bench::new();
        bench.set_pressure(1000);
        let mut touch = driver(&bench);

        for (dx, dy) in [(0, 0), (20, 0), (0, 20), (20, 20)] {
            bench.queue_positions(&[(2000, 1500), (2000 + dx, 1500 - dy)]);
            assert_eq!(
                touch.validated_read(350).unwrap(),
                Some(RawSample::new(2000 + dx / 2, 1500 - dy / 2))
            );
        }
    }

    #[test]
    fn rejects_samples_outside_deadband() {
        let bench = Bench::new();
        bench.set_pressure(1000);
        let mut touch = driver(&bench);

        for (dx, dy) in [(21, 0), (0, 21), (300, 300)] {
            bench.queue_positions(&[(2000, 1500), (2000 + dx, 1500 + dy)]);
            assert_eq!(touch.validated_read(350).unwrap(), None);
        }
        assert_eq!(bench.xy_reads(), 6);
    }

    #[test]
    fn rejects_light_touch_without_sampling_position() {
        let bench = Bench::new();
        bench.set_pressure(350);
        let mut touch = driver(&bench);

        assert_eq!(touch.validated_read(350).unwrap(), None);
        assert_eq!(bench.xy_reads(), 0);
    }

    #[test]
    fn waits_for_pressure_to_stop_rising() {
        let bench = Bench::new();
        bench.queue_pressures(&[400, 800, 1200, 1100]);
        bench.set_pressure(1100);
        bench.set_position(100, 200);
        let mut touch = driver(&bench);

        assert_eq!(
            touch.validated_read(1000).unwrap(),
            Some(RawSample::new(100, 200))
        );
        // Four reads to see the ramp level off, one to confirm contact.
        assert_eq!(bench.z_reads(), 5);
    }

    #[test]
    fn rejects_contact_lost_between_samples() {
        let bench = Bench::new();
        bench.queue_pressures(&[900, 900, 0]);
        bench.set_pressure(900);
        let mut touch = driver(&bench);

        assert_eq!(touch.validated_read(350).unwrap(), None);
        assert_eq!(bench.xy_reads(), 1);
    }

    #[test]
    fn reading_takes_a_few_milliseconds() {
        let bench = Bench::new();
        bench.set_pressure(1000);
        let mut touch = driver(&bench);

        touch.validated_read(350).unwrap();
        // Two ramp polls of 1 ms, then 1 ms and 2 ms between samples.
        assert_eq!(bench.now_ms(), 5);
    }
}
