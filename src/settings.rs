//! Configuration value types for the BME280.
//!
//! Every register field is modelled as a closed enumeration carrying its
//! register encoding, so adding or validating a value is a data change
//! rather than a control-flow change.

/// Oversampling settings for Temperature, Pressure, and Humidity.
///
/// Higher oversampling rates increase accuracy (reduce noise) but lead to
/// longer measurement times and higher power consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    /// No measurement performed. Used to disable a specific channel.
    Skipped = 0,
    /// 1x Oversampling (default).
    #[default]
    X1 = 1,
    /// 2x Oversampling.
    X2 = 2,
    /// 4x Oversampling.
    X4 = 3,
    /// 8x Oversampling.
    X8 = 4,
    /// 16x Oversampling. Maximum precision, longest conversion.
    X16 = 5,
}

impl Oversampling {
    /// The 3-bit register code for this setting.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Maps a raw sample count (0, 1, 2, 4, 8 or 16) to its setting.
    ///
    /// Returns `None` for counts outside the legal set; the caller decides
    /// whether to reject or fall back to [`Oversampling::Skipped`].
    pub fn from_sample_count(count: u8) -> Option<Self> {
        match count {
            0 => Some(Oversampling::Skipped),
            1 => Some(Oversampling::X1),
            2 => Some(Oversampling::X2),
            4 => Some(Oversampling::X4),
            8 => Some(Oversampling::X8),
            16 => Some(Oversampling::X16),
            _ => None,
        }
    }

    /// Creates an instance from a 3-bit register field (helpful when
    /// parsing registers read back from the device).
    ///
    /// The device treats the reserved codes 6 and 7 as 16x.
    pub fn from_bits(value: u8) -> Self {
        match value & 0x07 {
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            5..=7 => Oversampling::X16,
            _ => Oversampling::Skipped,
        }
    }
}

/// Grouped oversampling settings for all three measurement channels.
///
/// Use `Oversampling::Skipped` to disable channels that are not relevant
/// for your application (saves time and energy).
#[derive(Default, Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OversamplingConfig {
    /// Temperature oversampling.
    pub temp_osrs: Oversampling,
    /// Humidity oversampling.
    pub hum_osrs: Oversampling,
    /// Pressure oversampling.
    pub pres_osrs: Oversampling,
}

impl OversamplingConfig {
    /// Returns `true` if all three channels are set to `Skipped`.
    ///
    /// This is used internally to determine if a forced measurement command
    /// needs to be sent or if the sensor should remain idle.
    pub fn is_all_skipped(&self) -> bool {
        self.temp_osrs == Oversampling::Skipped
            && self.hum_osrs == Oversampling::Skipped
            && self.pres_osrs == Oversampling::Skipped
    }
}

/// Power mode of the sensor (ctrl_meas bits [1:0]).
///
/// In `Forced` mode the device performs a single conversion and returns to
/// `Sleep` on its own; the caller must re-issue `Forced` before every
/// reading when doing periodic single-shot sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// No measurements, lowest power. Registers remain readable.
    #[default]
    Sleep = 0b00,
    /// Single conversion cycle, then automatic return to Sleep.
    Forced = 0b01,
    /// Continuous conversion with the configured standby time in between.
    Normal = 0b11,
}

impl Mode {
    /// The 2-bit register code for this mode.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Maps a raw 2-bit register field to a mode.
    ///
    /// Returns `None` for the reserved code 0b10 (the hardware treats it as
    /// Forced, but it is not part of the documented set).
    pub fn from_bits(value: u8) -> Option<Self> {
        match value & 0x03 {
            0b00 => Some(Mode::Sleep),
            0b01 => Some(Mode::Forced),
            0b11 => Some(Mode::Normal),
            _ => None,
        }
    }
}

/// Standby duration between two conversions in Normal mode (config bits [7:5]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StandbyTime {
    /// 0.5 ms
    #[default]
    Ms0_5 = 0b000,
    /// 62.5 ms
    Ms62_5 = 0b001,
    /// 125 ms
    Ms125 = 0b010,
    /// 250 ms
    Ms250 = 0b011,
    /// 500 ms
    Ms500 = 0b100,
    /// 1000 ms
    Ms1000 = 0b101,
    /// 10 ms
    Ms10 = 0b110,
    /// 20 ms
    Ms20 = 0b111,
}

impl StandbyTime {
    /// The 3-bit register code for this standby duration.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Maps a raw 3-bit register field to a standby duration.
    pub fn from_bits(value: u8) -> Self {
        match value & 0x07 {
            0b001 => StandbyTime::Ms62_5,
            0b010 => StandbyTime::Ms125,
            0b011 => StandbyTime::Ms250,
            0b100 => StandbyTime::Ms500,
            0b101 => StandbyTime::Ms1000,
            0b110 => StandbyTime::Ms10,
            0b111 => StandbyTime::Ms20,
            _ => StandbyTime::Ms0_5,
        }
    }
}

/// Coefficient of the IIR low-pass filter (config bits [4:2]).
///
/// The filter smooths short-term disturbances in the pressure and
/// temperature readings (slamming doors, gusts of wind). It has no effect
/// on humidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IirFilter {
    /// Filter disabled.
    #[default]
    Off = 0b000,
    /// Coefficient 2.
    X2 = 0b001,
    /// Coefficient 4.
    X4 = 0b010,
    /// Coefficient 8.
    X8 = 0b011,
    /// Coefficient 16. Strongest smoothing, slowest step response.
    X16 = 0b100,
}

impl IirFilter {
    /// The 3-bit register code for this coefficient.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Maps a raw 3-bit register field to a filter coefficient.
    ///
    /// The reserved codes 5..7 behave like coefficient 16.
    pub fn from_bits(value: u8) -> Self {
        match value & 0x07 {
            0b001 => IirFilter::X2,
            0b010 => IirFilter::X4,
            0b011 => IirFilter::X8,
            0b100..=0b111 => IirFilter::X16,
            _ => IirFilter::Off,
        }
    }
}

/// Complete sensor configuration used for setup.
#[derive(Default, Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Oversampling settings for T, P and H.
    pub osrs_config: OversamplingConfig,
    /// Power mode to enter once the remaining settings are applied.
    pub mode: Mode,
    /// Standby time between conversions (Normal mode only).
    pub standby: StandbyTime,
    /// IIR filter setting for noise suppression.
    pub iir_filter: IirFilter,
    /// Enables the 3-wire SPI interface (config bit 0).
    pub spi3w_enabled: bool,
}

/// Convenience builder for assembling a [`Config`].
#[derive(Default)]
pub struct Bme280Builder {
    config: Config,
}

impl Bme280Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the temperature oversampling.
    pub fn temp_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.temp_osrs = os;
        self
    }

    /// Sets the humidity oversampling.
    pub fn hum_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.hum_osrs = os;
        self
    }

    /// Sets the pressure oversampling.
    pub fn pres_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.pres_osrs = os;
        self
    }

    /// Sets the power mode entered at the end of configuration.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the standby time used in Normal mode.
    pub fn standby_time(mut self, standby: StandbyTime) -> Self {
        self.config.standby = standby;
        self
    }

    /// Sets the IIR filter coefficient.
    pub fn iir_filter(mut self, filter: IirFilter) -> Self {
        self.config.iir_filter = filter;
        self
    }

    /// Enables or disables the 3-wire SPI interface.
    pub fn spi3w(mut self, enabled: bool) -> Self {
        self.config.spi3w_enabled = enabled;
        self
    }

    /// Finalizes the builder and returns the `Config` object.
    pub fn build(self) -> Config {
        self.config
    }
}
