//! The millisecond clock used to time the post-touch settle window.

/// A monotonic millisecond clock.
///
/// The value only has to increase; its origin is irrelevant. A 64-bit
/// counter is used so that the settle window never has to deal with
/// wrap-around.
pub trait Clock {
    /// Returns the milliseconds elapsed since some fixed point in the past.
    fn now_ms(&mut self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now_ms(&mut self) -> u64 {
        T::now_ms(self)
    }
}

/// A [`Clock`] reading the embassy time driver.
#[cfg(feature = "embassy-time")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbassyClock;

#[cfg(feature = "embassy-time")]
impl Clock for EmbassyClock {
    fn now_ms(&mut self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}
