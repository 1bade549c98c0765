//! Demo: Basic environmental monitoring with the BME280 on an STM32F407.
//!
//! This demo shows:
//! 1. **Initialization**: Setting up I2C and the BME280 driver.
//! 2. **Configuration**: Setting oversampling, standby time and the IIR filter.
//! 3. **Data Processing**: Reading measurements and manually formatting the
//!    fixed-point data for logging.
//!
//! Not a cargo example target — the repository's `examples/` directory holds
//! unrelated reference material, so this file lives under `demos/` and is
//! meant to be dropped into a firmware project as-is.

#![no_main]
#![no_std]
#![deny(unsafe_code)]

// The driver is independent of logging frameworks.
// We use defmt explicitly in the demo code only.
use bme280_driver::*;
use defmt_rtt as _;
use panic_probe as _;
use stm32f4xx_hal::{self as hal, prelude::*};

#[cortex_m_rt::entry]
fn main() -> ! {
    // --- 1. Hardware Setup ---
    let dp = hal::pac::Peripherals::take().unwrap();
    let clock_cfg = hal::rcc::Config::default().sysclk(168.MHz());
    let mut rcc = dp.RCC.freeze(clock_cfg);

    // Setup I2C1 (SCL on PB6, SDA on PB7)
    let gpiob = dp.GPIOB.split(&mut rcc);
    let scl = gpiob.pb6.into_open_drain_output();
    let sda = gpiob.pb7.into_open_drain_output();

    let i2c = hal::i2c::I2c1::new(
        dp.I2C1,
        (scl, sda),
        hal::i2c::Mode::Standard {
            frequency: 100.kHz().into(),
        },
        &mut rcc,
    );

    // Setup a delay provider (TIM6) used by the driver for internal timings
    let mut delay = dp.TIM6.delay_us(&mut rcc);

    // --- 2. Driver Initialization ---
    // Instantiate the driver with the default I2C address (0x76 or 0x77)
    let bme280 = Bme280::new(i2c, 0x76);

    // Initialize the sensor (performs a soft-reset and reads calibration data)
    let mut bme280 = bme280
        .init(&mut delay)
        .expect("Failed to initialize BME280");

    // Make sure we are actually talking to a humidity-capable part
    match bme280.identify().expect("Failed to read chip ID") {
        DeviceKind::Bme280 => defmt::println!("BME280 detected"),
        DeviceKind::Bmp280 => defmt::println!("BMP280 detected (no humidity)"),
        DeviceKind::Unknown(id) => defmt::panic!("Unknown chip ID {=u8:#x}", id),
    }

    // --- 3. Sensor Configuration ---
    // Weather-station style settings: 1x oversampling everywhere, filter off.
    // The sensor stays in Sleep; read_new_data() forces one conversion per call.
    let config = Bme280Builder::new()
        .temp_oversampling(Oversampling::X1)
        .hum_oversampling(Oversampling::X1)
        .pres_oversampling(Oversampling::X1)
        .iir_filter(IirFilter::Off)
        .standby_time(StandbyTime::Ms1000)
        .mode(Mode::Sleep)
        .build();

    bme280
        .configure_sensor(&config)
        .expect("Failed to configure sensor");

    // --- 4. Measurement Loop ---
    loop {
        // Trigger a forced measurement and wait for completion.
        let data = bme280
            .read_new_data(&mut delay)
            .expect("Failed to read data");

        // --- Data Formatting & Logging ---
        // Since the driver uses fixed-point arithmetic, we use helper methods
        // to separate integral and decimal parts for human-readable output.

        let temp = data.temp.split();
        let hum = data.hum.split();
        let pres = data.pres.split();

        defmt::println!("Temperature: {}.{} °C", temp.0, temp.1);
        defmt::println!("Humidity:    {}.{} %", hum.0, hum.1);
        defmt::println!("Pressure:    {}.{} Pa", pres.0, pres.1);
        defmt::println!("");

        // Wait 5 seconds before the next measurement cycle
        delay.delay_ms(5000);
    }
}
