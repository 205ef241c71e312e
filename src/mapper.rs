//! Mapping of raw touch samples onto display pixels.

use crate::{calibration::CalibrationParameters, driver::RawSample};
use embedded_graphics::geometry::{Point, Size};

impl CalibrationParameters {
    /// Transforms a raw sample into a display position.
    ///
    /// The raw axes are swapped first if the calibration found them rotated,
    /// then each axis is offset and scaled to the display, then mirrored if the
    /// calibration found it inverted. Integer division truncates towards zero;
    /// the result is not clipped to the display, only saturated to the range
    /// of a [`Point`] coordinate.
    pub fn map(&self, raw: RawSample, display_size: Size) -> Point {
        let (along_x, along_y) = if self.transform().rotate {
            (raw.y, raw.x)
        } else {
            (raw.x, raw.y)
        };

        let transform = self.transform();
        let x = scale(along_x, self.x0(), self.x_span(), display_size.width, transform.invert_x);
        let y = scale(along_y, self.y0(), self.y_span(), display_size.height, transform.invert_y);

        Point::new(x, y)
    }
}

fn scale(raw: u16, origin: u16, span: u16, extent: u32, invert: bool) -> i32 {
    let extent = i64::from(extent);
    let mut v = (i64::from(raw) - i64::from(origin)) * extent / i64::from(span);
    if invert {
        v = extent - v;
    }
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Returns true if `point` is a pixel of a display of `display_size`.
pub fn is_on_display(point: Point, display_size: Size) -> bool {
    point.x >= 0
        && point.y >= 0
        && (point.x as u32) < display_size.width
        && (point.y as u32) < display_size.height
}
