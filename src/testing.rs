//! Test doubles for the hardware around the driver.
//!
//! A [`Bench`] holds the state shared by a simulated XPT2046 on an SPI bus,
//! its chip-select pin, a delay and a millisecond clock. Delays advance the
//! clock, so timing-dependent behaviour can be checked deterministically.

use crate::{
    bus::BusConfig,
    clock::Clock,
    driver::{Config, RawSample, Xpt2046},
};
use core::convert::Infallible;
use embassy_embedded_hal::SetConfig;
use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point, Size},
    pixelcolor::Rgb565,
    Pixel,
};
use embedded_hal::{
    delay::DelayNs,
    digital::{self, OutputPin},
    spi::{self, ErrorKind, SpiBus},
};
use std::{cell::RefCell, collections::VecDeque, rc::Rc};

const DISPLAY_FREQUENCY: u32 = 40_000_000;
const TOUCH_FREQUENCY: u32 = 2_500_000;

pub type TestDriver = Xpt2046<FakeController, FakeChipSelect, FakeDelay, FakeClock>;

/// Touch reads at 2.5 MHz on a bus otherwise clocked at 40 MHz.
pub fn bus_config() -> BusConfig<u32> {
    BusConfig::new(TOUCH_FREQUENCY, DISPLAY_FREQUENCY)
}

/// A driver for a 240x320 display wired to `bench`.
pub fn driver(bench: &Bench) -> TestDriver {
    Xpt2046::new(
        bench.controller(),
        bench.chip_select(),
        bus_config(),
        bench.delay(),
        bench.clock(),
        Size::new(240, 320),
        Config::default(),
    )
}

#[derive(Debug, Default)]
struct BenchState {
    frequency_log: Vec<u32>,
    selected: bool,
    chip_select_log: Vec<bool>,
    deselected_transfers: usize,
    fail_transfers: bool,
    fail_configs: bool,
    pressures: VecDeque<i16>,
    pressure: i16,
    positions: VecDeque<RawSample>,
    position: RawSample,
    xy_reads: usize,
    z_reads: usize,
    now_ns: u64,
}

/// Shared state of the simulated hardware.
#[derive(Debug, Clone)]
pub struct Bench(Rc<RefCell<BenchState>>);

impl Bench {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(BenchState::default())))
    }

    pub fn controller(&self) -> FakeController {
        FakeController(self.clone())
    }

    pub fn chip_select(&self) -> FakeChipSelect {
        FakeChipSelect(self.clone())
    }

    pub fn delay(&self) -> FakeDelay {
        FakeDelay(self.clone())
    }

    pub fn clock(&self) -> FakeClock {
        FakeClock(self.clone())
    }

    /// Pressure reported once the queued pressures run out.
    pub fn set_pressure(&self, pressure: i16) {
        self.0.borrow_mut().pressure = pressure;
    }

    /// Pressures reported by the next Z reads, in order.
    pub fn queue_pressures(&self, pressures: &[i16]) {
        self.0.borrow_mut().pressures.extend(pressures.iter().copied());
    }

    /// Position reported once the queued positions run out.
    pub fn set_position(&self, x: u16, y: u16) {
        self.0.borrow_mut().position = RawSample { x, y };
    }

    /// Positions reported by the next X,Y reads, in order.
    pub fn queue_positions(&self, positions: &[(u16, u16)]) {
        self.0
            .borrow_mut()
            .positions
            .extend(positions.iter().map(|&(x, y)| RawSample { x, y }));
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.0.borrow_mut().fail_transfers = fail;
    }

    pub fn fail_configs(&self, fail: bool) {
        self.0.borrow_mut().fail_configs = fail;
    }

    /// Frequencies applied through [`SetConfig`], in order.
    pub fn frequency_log(&self) -> Vec<u32> {
        self.0.borrow().frequency_log.clone()
    }

    pub fn chip_select_log(&self) -> Vec<bool> {
        self.0.borrow().chip_select_log.clone()
    }

    pub fn deselected_transfers(&self) -> usize {
        self.0.borrow().deselected_transfers
    }

    pub fn xy_reads(&self) -> usize {
        self.0.borrow().xy_reads
    }

    pub fn z_reads(&self) -> usize {
        self.0.borrow().z_reads
    }

    pub fn now_ms(&self) -> u64 {
        self.0.borrow().now_ns / 1_000_000
    }

    pub fn advance_ms(&self, ms: u64) {
        self.0.borrow_mut().now_ns += ms * 1_000_000;
    }
}

/// Splits a pressure into the Z1 and Z2 measurements the driver combines as
/// `4095 + Z1 - Z2`.
fn z_measurements(pressure: i16) -> (u16, u16) {
    if pressure >= 4095 {
        ((pressure - 4095) as u16, 0)
    } else {
        (0, (4095 - pressure) as u16)
    }
}

/// Writes a 12-bit conversion the way the XPT2046 clocks it out after a
/// byte-aligned control byte: 7 bits in the first byte, 5 in the second.
fn put_conversion(rx: &mut [u8], index: usize, value: u16) {
    rx[index] = (value >> 5) as u8;
    rx[index + 1] = ((value & 0x1f) << 3) as u8;
}

/// A simulated XPT2046 behind an SPI bus.
#[derive(Debug)]
pub struct FakeController(Bench);

impl spi::ErrorType for FakeController {
    type Error = ErrorKind;
}

impl SpiBus<u8> for FakeController {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        words.fill(0);
        Ok(())
    }

    fn write(&mut self, _words: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.0 .0.borrow_mut();
        if state.fail_transfers {
            return Err(ErrorKind::Other);
        }
        if !state.selected {
            state.deselected_transfers += 1;
        }
        read.fill(0);
        match write.first() {
            Some(0xd0) if read.len() == 17 => {
                state.xy_reads += 1;
                let position = match state.positions.pop_front() {
                    Some(position) => position,
                    None => state.position,
                };
                put_conversion(read, 7, position.x);
                put_conversion(read, 15, position.y);
            }
            Some(0xb0) if read.len() == 5 => {
                state.z_reads += 1;
                let pressure = match state.pressures.pop_front() {
                    Some(pressure) => pressure,
                    None => state.pressure,
                };
                let (z1, z2) = z_measurements(pressure);
                read[1..3].copy_from_slice(&(z1 << 3).to_be_bytes());
                read[3..5].copy_from_slice(&(z2 << 3).to_be_bytes());
            }
            _ => {}
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        words.fill(0);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Configurations are plain SCLK frequencies in Hz.
impl SetConfig for FakeController {
    type Config = u32;
    type ConfigError = ErrorKind;

    fn set_config(&mut self, config: &Self::Config) -> Result<(), Self::ConfigError> {
        let mut state = self.0 .0.borrow_mut();
        if state.fail_configs {
            return Err(ErrorKind::Other);
        }
        state.frequency_log.push(*config);
        Ok(())
    }
}

/// The touch chip-select pin. Logs `false` when asserted.
#[derive(Debug)]
pub struct FakeChipSelect(Bench);

impl digital::ErrorType for FakeChipSelect {
    type Error = Infallible;
}

impl OutputPin for FakeChipSelect {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0 .0.borrow_mut();
        state.selected = true;
        state.chip_select_log.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0 .0.borrow_mut();
        state.selected = false;
        state.chip_select_log.push(true);
        Ok(())
    }
}

/// A delay that advances the bench clock instead of waiting.
#[derive(Debug)]
pub struct FakeDelay(Bench);

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0 .0.borrow_mut().now_ns += u64::from(ns);
    }
}

#[derive(Debug)]
pub struct FakeClock(Bench);

impl Clock for FakeClock {
    fn now_ms(&mut self) -> u64 {
        self.0.now_ms()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFault;

/// A display that records every pixel drawn on it.
#[derive(Debug)]
pub struct RecordingDisplay {
    size: Size,
    pub pixels: Vec<(Point, Rgb565)>,
    pub fail: bool,
}

impl RecordingDisplay {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            pixels: Vec::new(),
            fail: false,
        }
    }

    pub fn count(&self, color: Rgb565) -> usize {
        self.pixels.iter().filter(|(_, c)| *c == color).count()
    }
}

impl OriginDimensions for RecordingDisplay {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for RecordingDisplay {
    type Color = Rgb565;
    type Error = DisplayFault;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        if self.fail {
            return Err(DisplayFault);
        }
        self.pixels
            .extend(pixels.into_iter().map(|Pixel(point, color)| (point, color)));
        Ok(())
    }
}
