//! Adafruit DC & Stepper Motor HAT driver.
//!
//! The HAT is a PCA9685 16-channel PWM controller. Each DC motor uses three
//! channels: one PWM channel for speed and two logic inputs for direction.

use {
    crate::{I2cBus, LinuxI2c, MotorError},
    base::log,
    std::{thread, time::Duration},
};

// PCA9685 registers
const MODE1: u8 = 0x00;
const MODE2: u8 = 0x01;
const PRESCALE: u8 = 0xFE;
const LED0_ON_L: u8 = 0x06;
const ALL_LED_ON_L: u8 = 0xFA;

// MODE1/MODE2 bits
const RESTART: u8 = 0x80;
const SLEEP: u8 = 0x10;
const ALLCALL: u8 = 0x01;
const OUTDRV: u8 = 0x04;

const OSCILLATOR_HZ: f32 = 25_000_000.0;
const PWM_FREQUENCY_HZ: f32 = 1600.0;

// a channel value of 4096 sets the full-on/full-off bit
const FULL: u16 = 4096;

// oscillator settle time after mode changes
const SETTLE: Duration = Duration::from_millis(5);

pub const DEFAULT_ADDRESS: u16 = 0x60;
pub const DEFAULT_BUS: u8 = 1;

/// Minimal PCA9685 register interface.
pub struct Pca9685<B> {
    bus: B,
}

impl<B: I2cBus> Pca9685<B> {
    /// Reset all channels, wake the oscillator and set the PWM frequency.
    pub fn new(bus: B, frequency_hz: f32) -> Result<Self, MotorError> {
        let mut pca = Self { bus };
        pca.set_all(0, 0)?;
        pca.write_register(MODE2, OUTDRV)?;
        pca.write_register(MODE1, ALLCALL)?;
        thread::sleep(SETTLE);

        let mode1 = pca.read_register(MODE1)? & !SLEEP;
        pca.write_register(MODE1, mode1)?;
        thread::sleep(SETTLE);

        pca.set_frequency(frequency_hz)?;
        Ok(pca)
    }

    pub fn set_frequency(&mut self, frequency_hz: f32) -> Result<(), MotorError> {
        let prescale = prescale_for(frequency_hz);
        let old_mode = self.read_register(MODE1)?;
        self.write_register(MODE1, (old_mode & 0x7F) | SLEEP)?;
        self.write_register(PRESCALE, prescale)?;
        self.write_register(MODE1, old_mode)?;
        thread::sleep(SETTLE);
        self.write_register(MODE1, old_mode | RESTART)
    }

    /// Program the on/off tick counts of one channel.
    pub fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), MotorError> {
        if channel > 15 {
            return Err(MotorError::Config(format!("no PWM channel {}", channel)));
        }
        let base = LED0_ON_L + 4 * channel;
        self.bus.write(&[
            base,
            (on & 0xFF) as u8,
            (on >> 8) as u8,
            (off & 0xFF) as u8,
            (off >> 8) as u8,
        ])
    }

    pub fn set_all(&mut self, on: u16, off: u16) -> Result<(), MotorError> {
        self.bus.write(&[
            ALL_LED_ON_L,
            (on & 0xFF) as u8,
            (on >> 8) as u8,
            (off & 0xFF) as u8,
            (off >> 8) as u8,
        ])
    }

    /// Drive a channel as a digital output.
    pub fn set_pin(&mut self, channel: u8, high: bool) -> Result<(), MotorError> {
        if high {
            self.set_pwm(channel, FULL, 0)
        } else {
            self.set_pwm(channel, 0, FULL)
        }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), MotorError> {
        self.bus.write(&[register, value])
    }

    fn read_register(&mut self, register: u8) -> Result<u8, MotorError> {
        let mut value = [0u8; 1];
        self.bus.write_read(&[register], &mut value)?;
        Ok(value[0])
    }

    pub fn into_bus(self) -> B {
        self.bus
    }
}

fn prescale_for(frequency_hz: f32) -> u8 {
    let value = OSCILLATOR_HZ / 4096.0 / frequency_hz - 1.0;
    (value + 0.5).floor().clamp(3.0, 255.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Release,
}

// pwm, in2, in1 channels of a HAT motor port
#[derive(Debug, Clone, Copy)]
struct MotorPins {
    pwm: u8,
    in1: u8,
    in2: u8,
}

const M1: MotorPins = MotorPins { pwm: 8, in1: 10, in2: 9 };
const M2: MotorPins = MotorPins { pwm: 13, in1: 11, in2: 12 };

/// Configuration for the Motor HAT.
#[derive(Clone, Debug)]
pub struct HatConfig {
    bus: u8,
    address: u16,
    left_trim: i16,
    right_trim: i16,
}

impl Default for HatConfig {
    fn default() -> Self {
        Self {
            bus: DEFAULT_BUS,
            address: DEFAULT_ADDRESS,
            left_trim: 0,
            right_trim: 0,
        }
    }
}

impl HatConfig {
    /// Set the I2C bus number (`/dev/i2c-<bus>`).
    pub fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    /// Set the HAT's I2C address.
    pub fn with_address(mut self, address: u16) -> Self {
        self.address = address;
        self
    }

    /// Speed offset added to the left motor.
    ///
    /// Without encoder feedback the robot pulls to one side when one motor
    /// spins faster; a small negative trim on the faster side compensates.
    pub fn with_left_trim(mut self, trim: i16) -> Self {
        self.left_trim = trim;
        self
    }

    /// Speed offset added to the right motor.
    pub fn with_right_trim(mut self, trim: i16) -> Self {
        self.right_trim = trim;
        self
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn left_trim(&self) -> i16 {
        self.left_trim
    }

    pub fn right_trim(&self) -> i16 {
        self.right_trim
    }

    fn validate(&self) -> Result<(), MotorError> {
        for trim in [self.left_trim, self.right_trim] {
            if !(-255..=255).contains(&trim) {
                return Err(MotorError::Config(format!("trim {} outside -255..=255", trim)));
            }
        }
        if self.address > 0x7F {
            return Err(MotorError::Config(format!(
                "i2c address {:#x} is not a 7-bit address",
                self.address
            )));
        }
        Ok(())
    }
}

/// Two DC motors on ports M1 (left) and M2 (right) of a Motor HAT.
pub struct MotorHat<B> {
    pwm: Pca9685<B>,
    left_trim: i16,
    right_trim: i16,
}

impl MotorHat<LinuxI2c> {
    /// Open the HAT on the configured Linux I2C bus.
    pub fn open(config: &HatConfig) -> Result<Self, MotorError> {
        config.validate()?;
        let bus = LinuxI2c::open(config.bus(), config.address())?;
        Self::with_bus(bus, config)
    }
}

impl<B: I2cBus> MotorHat<B> {
    /// Initialize the controller on `bus` and release both motors.
    pub fn with_bus(bus: B, config: &HatConfig) -> Result<Self, MotorError> {
        config.validate()?;
        let mut hat = Self {
            pwm: Pca9685::new(bus, PWM_FREQUENCY_HZ)?,
            left_trim: config.left_trim(),
            right_trim: config.right_trim(),
        };
        hat.release()?;
        log::info!(
            "motor hat ready (left trim {}, right trim {})",
            hat.left_trim,
            hat.right_trim
        );
        Ok(hat)
    }

    /// Set both motor speeds (trim applied) and directions.
    pub fn drive(&mut self, speed: u8, left: Direction, right: Direction) -> Result<(), MotorError> {
        self.set_speed(M1, trimmed(speed, self.left_trim))?;
        self.set_speed(M2, trimmed(speed, self.right_trim))?;
        self.run(M1, left)?;
        self.run(M2, right)
    }

    /// Let both motors coast.
    pub fn release(&mut self) -> Result<(), MotorError> {
        self.run(M1, Direction::Release)?;
        self.run(M2, Direction::Release)
    }

    fn set_speed(&mut self, pins: MotorPins, speed: u8) -> Result<(), MotorError> {
        self.pwm.set_pwm(pins.pwm, 0, speed as u16 * 16)
    }

    fn run(&mut self, pins: MotorPins, direction: Direction) -> Result<(), MotorError> {
        match direction {
            Direction::Forward => {
                self.pwm.set_pin(pins.in2, false)?;
                self.pwm.set_pin(pins.in1, true)
            }
            Direction::Backward => {
                self.pwm.set_pin(pins.in1, false)?;
                self.pwm.set_pin(pins.in2, true)
            }
            Direction::Release => {
                self.pwm.set_pin(pins.in1, false)?;
                self.pwm.set_pin(pins.in2, false)
            }
        }
    }

    pub fn into_bus(self) -> B {
        self.pwm.into_bus()
    }
}

fn trimmed(speed: u8, trim: i16) -> u8 {
    (speed as i16 + trim).clamp(0, 255) as u8
}
