#![doc(html_root_url = "https://docs.rs/xpt2046-touch")]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_variables,
    unreachable_code,
    unused_comparisons,
    unused_must_use
)]
#![cfg_attr(not(test), no_std)]

//! A platform agnostic Rust driver for the XPT2046 resistive touch screen
//! controller, based on the
//! [`embedded-hal`](https://github.com/rust-embedded/embedded-hal) traits.
//!
//! The driver reads debounced touch positions from an XPT2046 that shares an
//! SPI bus with a display, and maps them onto display pixels using parameters
//! found by touching a target near each corner of the display.
//!
//! ```ignore
//! // `spi` is the HAL's bus driver, shared with the display.
//! let bus_config = BusConfig::new(
//!     spi::Config::default().with_frequency(Rate::from_khz(2500)),
//!     spi::Config::default().with_frequency(Rate::from_mhz(40)),
//! );
//! let mut touch = Xpt2046::new(
//!     spi,
//!     touch_cs,
//!     bus_config,
//!     delay,
//!     EmbassyClock,
//!     Size::new(240, 320),
//!     Config::default(),
//! );
//! touch.init()?;
//!
//! let style = CalibrationStyle::new(Rgb565::WHITE, Rgb565::BLACK, 15);
//! let parameters = run_calibration(&mut touch, &mut display, &style)?;
//! store(parameters.export());
//!
//! loop {
//!     if let Some(Touch { point, .. }) = touch.get_touch(600)? {
//!         // ...
//!     }
//! }
//! ```

pub mod bus;
pub mod calibration;
pub mod calibration_run;
pub mod clock;
pub mod driver;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod touch;

#[cfg(test)]
mod testing;

pub use crate::{
    bus::{BusConfig, OuterTransaction},
    calibration::{CalibrationParameters, Transform},
    calibration_run::{run_calibration, run_calibration_with_cancel, CalibrationStyle},
    clock::Clock,
    driver::{Config, Pressure, RawSample, Xpt2046},
    error::{CalibrationRunError, Error},
    touch::Touch,
};

/// Re-exported from
/// [embedded_graphics](https://docs.rs/embedded-graphics/latest/embedded_graphics/index.html)
/// for convenience.
pub use embedded_graphics::geometry::{Point, Size};
