//! Functions for running the touch screen calibration procedure.
//!
//! The procedure shows a target near each corner of the display in turn and
//! averages eight debounced readings while the user touches it. The only
//! requirement on the display panel is that its driver implements the
//! [embedded-graphics-core's](https://crates.io/crates/embedded-graphics-core)
//! [DrawTarget](https://docs.rs/embedded-graphics-core/latest/embedded_graphics_core/draw_target/trait.DrawTarget.html)
//! trait with an Error type implementing the Debug trait.

use crate::{
    calibration::{calculate_calibration_parameters, CalibrationParameters, Corner, CornerSamples},
    clock::Clock,
    driver::{RawSample, Xpt2046},
    error::{CalibrationRunError, Error},
};
use core::fmt::Debug;
#[cfg(feature = "defmt")]
use defmt::Format;
use embassy_embedded_hal::SetConfig;
use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Point, Size},
    pixelcolor::PixelColor,
    primitives::{Circle, Line, Primitive, PrimitiveStyle, Rectangle},
    Drawable,
};
use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiBus};

/// Number of debounced readings averaged per corner.
pub const SAMPLES_PER_CORNER: u32 = 8;

/// Pause before sampling the next corner, giving the user time to lift their
/// finger off the previous target.
pub const RELEASE_PAUSE_MS: u32 = 1000;

/// Appearance of the calibration targets.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStyle<C> {
    /// Colour of the targets.
    pub foreground: C,
    /// Colour the target areas are cleared to.
    pub background: C,
    /// Width and height of a target in pixels.
    pub target_size: u32,
}

impl<C: PixelColor> CalibrationStyle<C> {
    /// Creates a style drawing `target_size` pixel targets in `foreground`
    /// on `background`.
    pub const fn new(foreground: C, background: C, target_size: u32) -> Self {
        Self {
            foreground,
            background,
            target_size,
        }
    }
}

/// The step of the procedure being shown.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Show the target at a corner and sample it.
    Corner(Corner),
    /// Clear the last target.
    Clear,
}

impl Phase {
    const FIRST: Phase = Phase::Corner(Corner::TopLeft);

    fn next(self) -> Option<Phase> {
        match self {
            Phase::Corner(Corner::TopLeft) => Some(Phase::Corner(Corner::BottomLeft)),
            Phase::Corner(Corner::BottomLeft) => Some(Phase::Corner(Corner::TopRight)),
            Phase::Corner(Corner::TopRight) => Some(Phase::Corner(Corner::BottomRight)),
            Phase::Corner(Corner::BottomRight) => Some(Phase::Clear),
            Phase::Clear => None,
        }
    }
}

/// Runs the touch screen calibration procedure.
///
/// The new parameters are installed in `touch` and returned; call
/// [`CalibrationParameters::export()`] on them to store them.
///
/// This blocks until every corner has been touched. Use
/// [`run_calibration_with_cancel()`] to be able to give up.
pub fn run_calibration<Spi, SpiError, Cs, CsError, Delay, Clk, DT, DTError>(
    touch: &mut Xpt2046<Spi, Cs, Delay, Clk>,
    draw_target: &mut DT,
    style: &CalibrationStyle<DT::Color>,
) -> Result<CalibrationParameters, CalibrationRunError<SpiError, CsError, DTError>>
where
    Spi: SpiBus<u8, Error = SpiError> + SetConfig,
    Cs: OutputPin<Error = CsError>,
    SpiError: Debug,
    CsError: Debug,
    Delay: DelayNs,
    Clk: Clock,
    DT: DrawTarget<Error = DTError>,
    DTError: Debug,
{
    run_calibration_with_cancel(touch, draw_target, style, || false)
}

/// Runs the touch screen calibration procedure until it completes or `cancel`
/// returns true.
///
/// `cancel` is polled before every reading attempt. When it returns true the
/// targets are cleared, the calibration in use is left unchanged and
/// [`CalibrationRunError::Cancelled`] is returned.
pub fn run_calibration_with_cancel<Spi, SpiError, Cs, CsError, Delay, Clk, DT, DTError, F>(
    touch: &mut Xpt2046<Spi, Cs, Delay, Clk>,
    draw_target: &mut DT,
    style: &CalibrationStyle<DT::Color>,
    mut cancel: F,
) -> Result<CalibrationParameters, CalibrationRunError<SpiError, CsError, DTError>>
where
    Spi: SpiBus<u8, Error = SpiError> + SetConfig,
    Cs: OutputPin<Error = CsError>,
    SpiError: Debug,
    CsError: Debug,
    Delay: DelayNs,
    Clk: Clock,
    DT: DrawTarget<Error = DTError>,
    DTError: Debug,
    F: FnMut() -> bool,
{
    let display_size = touch.display_size();
    let threshold = touch.config().calibration_threshold;
    let mut samples = CornerSamples::default();

    let mut phase = Some(Phase::FIRST);
    while let Some(current) = phase {
        clear_targets(draw_target, display_size, style).map_err(CalibrationRunError::DrawTarget)?;

        if let Phase::Corner(corner) = current {
            let origin = corner.target_origin(display_size, style.target_size);
            draw_target_cross(draw_target, origin, style).map_err(CalibrationRunError::DrawTarget)?;

            if current != Phase::FIRST {
                touch.delay.delay_ms(RELEASE_PAUSE_MS);
            }

            match sample_corner(touch, threshold, &mut cancel)? {
                Some(sample) => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("{:?} measured at {:?}", corner, sample);

                    samples.set(corner, sample);
                }
                None => {
                    clear_targets(draw_target, display_size, style)
                        .map_err(CalibrationRunError::DrawTarget)?;
                    return Err(CalibrationRunError::Cancelled);
                }
            }
        }

        phase = current.next();
    }

    let parameters = calculate_calibration_parameters(&samples, display_size, style.target_size);
    touch.set_calibration(parameters);

    Ok(parameters)
}

/// Averages [`SAMPLES_PER_CORNER`] debounced readings, waiting as long as it
/// takes for each. Returns `None` if cancelled.
fn sample_corner<Spi, SpiError, Cs, CsError, Delay, Clk, F>(
    touch: &mut Xpt2046<Spi, Cs, Delay, Clk>,
    threshold: u16,
    cancel: &mut F,
) -> Result<Option<RawSample>, Error<SpiError, CsError>>
where
    Spi: SpiBus<u8, Error = SpiError> + SetConfig,
    Cs: OutputPin<Error = CsError>,
    SpiError: Debug,
    CsError: Debug,
    Delay: DelayNs,
    Clk: Clock,
    F: FnMut() -> bool,
{
    let mut x = 0u32;
    let mut y = 0u32;
    for _ in 0..SAMPLES_PER_CORNER {
        let sample = loop {
            if cancel() {
                return Ok(None);
            }
            if let Some(sample) = touch.validated_read(threshold)? {
                break sample;
            }
        };
        x += u32::from(sample.x);
        y += u32::from(sample.y);
    }
    Ok(Some(RawSample::new(
        (x / SAMPLES_PER_CORNER) as u16,
        (y / SAMPLES_PER_CORNER) as u16,
    )))
}

/// Fills the squares of all four corner targets with the background colour.
fn clear_targets<DT>(
    draw_target: &mut DT,
    display_size: Size,
    style: &CalibrationStyle<DT::Color>,
) -> Result<(), DT::Error>
where
    DT: DrawTarget,
{
    let side = style.target_size + 2;
    for corner in Corner::ALL {
        Rectangle::new(
            corner.target_origin(display_size, style.target_size),
            Size::new(side, side),
        )
        .into_styled(PrimitiveStyle::with_fill(style.background))
        .draw(draw_target)?;
    }
    Ok(())
}

/// Draws a cross in a circle filling the target square at `origin`.
fn draw_target_cross<DT>(
    draw_target: &mut DT,
    origin: Point,
    style: &CalibrationStyle<DT::Color>,
) -> Result<(), DT::Error>
where
    DT: DrawTarget,
{
    let size = style.target_size as i32;
    let center = origin + Point::new(size / 2, size / 2);
    let stroke = PrimitiveStyle::with_stroke(style.foreground, 1);

    Line::new(
        Point::new(center.x, origin.y),
        Point::new(center.x, origin.y + size),
    )
    .into_styled(stroke)
    .draw(draw_target)?;
    Line::new(
        Point::new(origin.x, center.y),
        Point::new(origin.x + size, center.y),
    )
    .into_styled(stroke)
    .draw(draw_target)?;

    let radius = (size / 4 + size / 8) as u32;
    Circle::with_center(center, 2 * radius + 1)
        .into_styled(stroke)
        .draw(draw_target)?;

    Ok(())
}
