//! Calibration parameters and the four-corner calibration calculation.
//!
//! The transform from touch panel to display is modelled as an independent
//! offset and scale per axis, plus a possible swap of the axes and a possible
//! mirroring of each axis. It is derived from the raw samples measured while
//! the user touches a target near each corner of the display (see
//! [`crate::calibration_run`]).

use crate::driver::RawSample;
#[cfg(feature = "defmt")]
use defmt::Format;
use embedded_graphics::geometry::{Point, Size};

/// Full-scale value of a 12-bit XPT2046 measurement.
const ADC_SPAN: u16 = 4095;

/// Number of values in the exported parameter layout.
pub const EXPORT_LEN: usize = 5;

/// Orientation of the touch panel relative to the display.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Transform {
    /// The raw X axis runs along the display's Y axis and vice versa.
    pub rotate: bool,
    /// Display x decreases as the raw value increases.
    pub invert_x: bool,
    /// Display y decreases as the raw value increases.
    pub invert_y: bool,
}

impl Transform {
    /// Creates a transform from its three flags.
    pub const fn new(rotate: bool, invert_x: bool, invert_y: bool) -> Self {
        Self {
            rotate,
            invert_x,
            invert_y,
        }
    }

    /// Packs the flags as bit 0 (rotate), bit 1 (invert x), bit 2 (invert y).
    pub const fn bits(&self) -> u16 {
        (self.rotate as u16) | ((self.invert_x as u16) << 1) | ((self.invert_y as u16) << 2)
    }

    /// Unpacks flags packed by [`Self::bits()`]. Other bits are ignored.
    pub const fn from_bits(bits: u16) -> Self {
        Self {
            rotate: bits & 0b001 != 0,
            invert_x: bits & 0b010 != 0,
            invert_y: bits & 0b100 != 0,
        }
    }
}

/// Parameters transforming raw samples into display positions.
///
/// `x0`/`y0` are the raw values at the display's left/top edge, `x_span` and
/// `y_span` the raw distance to the opposite edge. All four are at least 1,
/// so the spans can always be divided by.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationParameters {
    x0: u16,
    x_span: u16,
    y0: u16,
    y_span: u16,
    transform: Transform,
}

impl CalibrationParameters {
    /// Creates parameters, replacing any zero value by 1.
    pub const fn new(x0: u16, x_span: u16, y0: u16, y_span: u16, transform: Transform) -> Self {
        const fn non_zero(v: u16) -> u16 {
            if v == 0 {
                1
            } else {
                v
            }
        }
        Self {
            x0: non_zero(x0),
            x_span: non_zero(x_span),
            y0: non_zero(y0),
            y_span: non_zero(y_span),
            transform,
        }
    }

    /// Returns parameters assuming the touch panel spans the full ADC range
    /// on both axes, oriented as given by `transform`.
    ///
    /// This is only a coarse estimate, good enough to let the user reach
    /// whatever starts the calibration. Real panels rarely reach either end
    /// of the range.
    pub const fn estimate(transform: Transform) -> Self {
        Self::new(0, ADC_SPAN, 0, ADC_SPAN, transform)
    }

    /// Loads parameters in the layout produced by [`Self::export()`].
    pub const fn import(values: [u16; EXPORT_LEN]) -> Self {
        Self::new(
            values[0],
            values[1],
            values[2],
            values[3],
            Transform::from_bits(values[4]),
        )
    }

    /// Returns the parameters as `[x0, x_span, y0, y_span, flags]`, suitable
    /// for storing and later passing to [`Self::import()`].
    pub const fn export(&self) -> [u16; EXPORT_LEN] {
        [
            self.x0,
            self.x_span,
            self.y0,
            self.y_span,
            self.transform.bits(),
        ]
    }

    /// Raw value at the display's left edge.
    pub const fn x0(&self) -> u16 {
        self.x0
    }

    /// Raw distance from the left to the right display edge.
    pub const fn x_span(&self) -> u16 {
        self.x_span
    }

    /// Raw value at the display's top edge.
    pub const fn y0(&self) -> u16 {
        self.y0
    }

    /// Raw distance from the top to the bottom display edge.
    pub const fn y_span(&self) -> u16 {
        self.y_span
    }

    /// Orientation of the touch panel relative to the display.
    pub const fn transform(&self) -> Transform {
        self.transform
    }
}

/// The corners of the display, in the order they are calibrated.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

impl Corner {
    /// All corners, in calibration order.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::BottomLeft,
        Corner::TopRight,
        Corner::BottomRight,
    ];

    /// Returns the top-left pixel of the square holding this corner's target.
    ///
    /// The square is `target_size` wide and inset by half of that from both
    /// display edges, so the target's centre is `target_size` pixels in from
    /// each edge.
    pub fn target_origin(self, display_size: Size, target_size: u32) -> Point {
        let size = target_size as i32;
        let near = size / 2;
        let far_x = display_size.width as i32 - size - size / 2;
        let far_y = display_size.height as i32 - size - size / 2;
        match self {
            Corner::TopLeft => Point::new(near, near),
            Corner::BottomLeft => Point::new(near, far_y),
            Corner::TopRight => Point::new(far_x, near),
            Corner::BottomRight => Point::new(far_x, far_y),
        }
    }
}

/// The raw sample measured at each corner target.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CornerSamples {
    pub top_left: RawSample,
    pub bottom_left: RawSample,
    pub top_right: RawSample,
    pub bottom_right: RawSample,
}

impl CornerSamples {
    /// Returns the sample measured at `corner`.
    pub fn get(&self, corner: Corner) -> RawSample {
        match corner {
            Corner::TopLeft => self.top_left,
            Corner::BottomLeft => self.bottom_left,
            Corner::TopRight => self.top_right,
            Corner::BottomRight => self.bottom_right,
        }
    }

    /// Records the sample measured at `corner`.
    pub fn set(&mut self, corner: Corner, sample: RawSample) {
        match corner {
            Corner::TopLeft => self.top_left = sample,
            Corner::BottomLeft => self.bottom_left = sample,
            Corner::TopRight => self.top_right = sample,
            Corner::BottomRight => self.bottom_right = sample,
        }
    }
}

fn mean(a: u16, b: u16) -> i32 {
    (i32::from(a) + i32::from(b)) / 2
}

/// Distance the raw extents must be pushed outwards so they correspond to the
/// display edges rather than the target centres, which sit `target_size`
/// pixels in from each edge. Computed at 8x resolution.
fn edge_offset(min: i32, max: i32, display_extent: u32, target_size: u32) -> i32 {
    let inner = display_extent as i32 - 2 * target_size as i32;
    if inner <= 0 {
        return 0;
    }
    ((max * 8 - min * 8) / inner * target_size as i32) / 8
}

fn to_parameter(v: i32) -> u16 {
    v.clamp(1, i32::from(u16::MAX)) as u16
}

/// Calculates calibration parameters from the raw samples measured at the four
/// corner targets.
///
/// Going from the top-left to the bottom-left target only moves along the
/// display's y axis. If the raw x value changes more than the raw y value
/// between the two, the panel's axes are swapped relative to the display.
/// The extents of each axis are then averaged from the two targets sharing a
/// display edge, flipped if they run backwards and extended from the targets
/// out to the display edges.
pub fn calculate_calibration_parameters(
    samples: &CornerSamples,
    display_size: Size,
    target_size: u32,
) -> CalibrationParameters {
    let tl = samples.get(Corner::TopLeft);
    let bl = samples.get(Corner::BottomLeft);
    let tr = samples.get(Corner::TopRight);
    let br = samples.get(Corner::BottomRight);

    let rotate = tl.x.abs_diff(bl.x) > tl.y.abs_diff(bl.y);

    let (mut x0, mut x1, mut y0, mut y1) = if rotate {
        (
            mean(tl.y, bl.y),
            mean(tr.y, br.y),
            mean(tl.x, tr.x),
            mean(bl.x, br.x),
        )
    } else {
        (
            mean(tl.x, bl.x),
            mean(tr.x, br.x),
            mean(tl.y, tr.y),
            mean(bl.y, br.y),
        )
    };

    let invert_x = x0 > x1;
    if invert_x {
        core::mem::swap(&mut x0, &mut x1);
    }
    let invert_y = y0 > y1;
    if invert_y {
        core::mem::swap(&mut y0, &mut y1);
    }

    let x_offset = edge_offset(x0, x1, display_size.width, target_size);
    let y_offset = edge_offset(y0, y1, display_size.height, target_size);
    x0 -= x_offset;
    x1 += x_offset;
    y0 -= y_offset;
    y1 += y_offset;

    // An origin extrapolated below the ADC range is stored as 1; the span is
    // measured from the stored origin so the far edge stays where it was.
    let x0 = to_parameter(x0);
    let y0 = to_parameter(y0);
    let parameters = CalibrationParameters::new(
        x0,
        to_parameter(x1 - i32::from(x0)),
        y0,
        to_parameter(y1 - i32::from(y0)),
        Transform::new(rotate, invert_x, invert_y),
    );

    #[cfg(feature = "defmt")]
    {
        defmt::debug!("measured (touch) corner samples: {:?}", samples);
        defmt::debug!("calculated calibration parameters: {:?}", parameters);
    }

    parameters
}
