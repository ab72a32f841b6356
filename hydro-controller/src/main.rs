use clap::Parser;
use dht22::Dht22;
use ds18b20::ReadoutResolution;
use embedded_hal::digital::OutputPin;
use embedded_onewire::BitBangOneWire;
use hydro_controller::{
    Channel, ConfigStore, Controller, ControllerConfig, FileStore, Polarity, Quantity,
    Relay, RemoteLink, SensorCache, SensorPoller, SharedController, WaterProbe,
    sht30::Sht30,
    time::{format_time_of_day, local_time_of_day, parse_time_of_day},
};
use linux_embedded_hal::{
    CdevPin, Delay, I2cdev, SpidevDevice,
    gpio_cdev::{Chip, LineRequestFlags},
    spidev::{SpiModeFlags, Spidev, SpidevOptions},
};
use nrf24l01::Nrf24;
use std::{
    fmt::Debug,
    io,
    path::PathBuf,
    process::ExitCode,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

/// Hydroponic enclosure controller
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// GPIO character device (e.g., /dev/gpiochip0)
    #[arg(long, default_value = "/dev/gpiochip0")]
    gpiochip: String,
    /// Relay lines for lights, pump, heater and fan
    #[arg(long, value_delimiter = ',', num_args = 4, default_values_t = [14, 12, 13, 15])]
    relays: Vec<u32>,
    /// Relays are energised by a high level
    #[arg(long)]
    active_high: bool,
    /// DS18B20 1-Wire data line, bit-banged (needs microsecond GPIO timing)
    #[arg(long, default_value_t = 16)]
    onewire_line: u32,
    /// DS18B20 resolution in bits
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u8).range(9..=12))]
    resolution: u8,
    /// DHT22 data line, bit-banged (needs microsecond GPIO timing)
    #[arg(long, default_value_t = 17)]
    dht22_line: u32,
    /// I2C bus of the SHT30 (e.g., /dev/i2c-1)
    #[arg(long, default_value = "/dev/i2c-1")]
    i2c: String,
    /// SPI device of the nRF24L01 (e.g., /dev/spidev0.0)
    #[arg(long, default_value = "/dev/spidev0.0")]
    spi: String,
    /// nRF24L01 CE line
    #[arg(long, default_value_t = 6)]
    nrf_ce_line: u32,
    /// Persisted controller configuration
    #[arg(long, default_value = "hydro-config.bin")]
    config: PathBuf,
    /// Lights on (HH:MM)
    #[arg(long, value_parser = time_arg)]
    lights_start: Option<u32>,
    /// Lights off (HH:MM)
    #[arg(long, value_parser = time_arg)]
    lights_end: Option<u32>,
    /// Pump run time per period, seconds
    #[arg(long)]
    pump_on: Option<u32>,
    /// Pump period, seconds
    #[arg(long)]
    pump_period: Option<u32>,
    /// Heater setpoint, °C
    #[arg(long)]
    setpoint: Option<f32>,
    /// Drive the pump from table humidity
    #[arg(long)]
    humidity_mode: Option<bool>,
    /// Humidity-mode threshold, %
    #[arg(long)]
    humidity_threshold: Option<f32>,
    /// Control tick, milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
    /// Status report interval, seconds
    #[arg(long, default_value_t = 5)]
    status_interval: u64,
}

fn time_arg(s: &str) -> Result<u32, String> {
    parse_time_of_day(s).ok_or_else(|| format!("expected HH:MM, got {:?}", s))
}

fn request_line(
    chip: &mut Chip,
    line: u32,
    flags: LineRequestFlags,
    level: u8,
    consumer: &str,
) -> Result<CdevPin, linux_embedded_hal::gpio_cdev::Error> {
    let handle = chip.get_line(line)?.request(flags, level, consumer)?;
    CdevPin::new(handle)
}

fn open_drain(
    chip: &mut Chip,
    line: u32,
    consumer: &str,
) -> Result<CdevPin, linux_embedded_hal::gpio_cdev::Error> {
    request_line(
        chip,
        line,
        LineRequestFlags::OUTPUT | LineRequestFlags::OPEN_DRAIN,
        1,
        consumer,
    )
}

fn open_spi(path: &str) -> io::Result<SpidevDevice> {
    let mut spi = Spidev::open(path)?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(10_000_000)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options)?;
    Ok(SpidevDevice(spi))
}

/// Log an optional peripheral's start-up failure and carry on without it.
fn optional<T, E: Debug>(what: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("{}: initialization failed: {:?}", what, e);
            None
        }
    }
}

fn apply_overrides<P: OutputPin>(args: &Args, shared: &SharedController<P>) {
    shared.lock(|c| {
        let current = c.config();
        if args.lights_start.is_some() || args.lights_end.is_some() {
            let start = args.lights_start.unwrap_or(current.lights_start_s);
            let end = args.lights_end.unwrap_or(current.lights_end_s);
            if !c.set_light_schedule(start, end) {
                log::warn!("lights schedule rejected");
            }
        }
        if args.pump_on.is_some() || args.pump_period.is_some() {
            let on = args.pump_on.unwrap_or(current.pump_on_sec);
            let period = args.pump_period.unwrap_or(current.pump_period_sec);
            if !c.set_pump_timing(on, period) {
                log::warn!("pump timing {}/{} s rejected", on, period);
            }
        }
        if let Some(setpoint) = args.setpoint {
            if !c.set_heater_setpoint(setpoint) {
                log::warn!("heater setpoint {} °C rejected", setpoint);
            }
        }
        if let Some(threshold) = args.humidity_threshold {
            if !c.set_humidity_threshold(threshold) {
                log::warn!("humidity threshold {} % rejected", threshold);
            }
        }
        if let Some(enabled) = args.humidity_mode {
            if let Err(e) = c.set_humidity_mode(enabled) {
                log::error!("pump relay: {:?}", e);
            }
        }
    });
}

fn report<P: OutputPin>(cache: &SensorCache, shared: &SharedController<P>) {
    let readings = cache.snapshot();
    let (states, config) = shared.lock(|c| (Channel::ALL.map(|ch| c.is_on(ch)), c.config()));
    let clock = local_time_of_day().map_or_else(|| "--:--".to_string(), format_time_of_day);
    let channels = Channel::ALL
        .iter()
        .zip(states)
        .map(|(ch, on)| format!("{} {}", ch.name(), if on { "ON" } else { "OFF" }))
        .collect::<Vec<_>>()
        .join(", ");
    log::info!(
        "[{}] {} | pump {} mode | setpoint {:.1} °C",
        clock,
        channels,
        if config.humidity_mode { "humidity" } else { "timer" },
        config.heater_setpoint_c
    );
    for q in Quantity::ALL {
        match readings.reading(q) {
            Some(v) => log::info!("  {}: {:.2}", q.name(), v),
            None => log::info!("  {}: SENSOR FAILED", q.name()),
        }
    }
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();

    let mut chip = match Chip::new(&args.gpiochip) {
        Ok(chip) => chip,
        Err(e) => {
            log::error!("{}: {}", args.gpiochip, e);
            return ExitCode::FAILURE;
        }
    };

    let polarity = if args.active_high {
        Polarity::ActiveHigh
    } else {
        Polarity::ActiveLow
    };
    let off_level = if args.active_high { 0 } else { 1 };
    let mut relays = Vec::with_capacity(4);
    for (line, channel) in args.relays.iter().zip(Channel::ALL) {
        match request_line(&mut chip, *line, LineRequestFlags::OUTPUT, off_level, channel.name()) {
            Ok(pin) => relays.push(Relay::new(pin, polarity)),
            Err(e) => {
                log::error!("{} relay on line {}: {}", channel.name(), line, e);
                return ExitCode::FAILURE;
            }
        }
    }
    let Ok(relays) = <[_; 4]>::try_from(relays) else {
        log::error!("expected four relay lines");
        return ExitCode::FAILURE;
    };

    let mut store = FileStore::new(&args.config);
    let config = store.load().unwrap_or_else(|e| {
        log::warn!("{}, using defaults", e);
        ControllerConfig::default()
    });
    let mut controller = Controller::new(&config, relays);
    if let Err(e) = controller.all_off() {
        log::error!("relays: {:?}", e);
        return ExitCode::FAILURE;
    }
    let shared = SharedController::new(controller);
    apply_overrides(&args, &shared);

    // Optional sensors
    let resolution = ReadoutResolution::try_from(args.resolution).unwrap_or_default();
    let water = optional("DS18B20", open_drain(&mut chip, args.onewire_line, "ds18b20")).and_then(
        |pin| {
            let bus = BitBangOneWire::new(pin, Delay);
            let mut probe = WaterProbe::<_, _, 8>::new(bus, Delay, resolution);
            optional("DS18B20", probe.begin()).map(|_| probe)
        },
    );
    let table = optional("SHT30", I2cdev::new(&args.i2c)).and_then(|i2c| {
        let mut sht = Sht30::new(i2c, Delay);
        optional("SHT30", sht.begin()).map(|_| sht)
    });
    let air = optional("DHT22", open_drain(&mut chip, args.dht22_line, "dht22")).and_then(|pin| {
        let mut dht = Dht22::new(pin, Delay);
        optional("DHT22", dht.begin()).map(|_| dht)
    });
    let remote = optional("nRF24L01 SPI", open_spi(&args.spi))
        .zip(optional(
            "nRF24L01 CE",
            request_line(&mut chip, args.nrf_ce_line, LineRequestFlags::OUTPUT, 0, "nrf24-ce"),
        ))
        .and_then(|(spi, ce)| optional("nRF24L01", RemoteLink::begin(Nrf24::new(spi, ce, Delay))));
    if water.is_some() || air.is_some() {
        log::warn!(
            "DS18B20 and DHT22 are bit-banged through cdev GPIO with sleeping delays; \
             reliable slot timing needs a real-time kernel or a dedicated timing HAL"
        );
    }
    let mut poller = SensorPoller::new(water, table, air, remote);

    let cache = SensorCache::new();
    let running = AtomicBool::new(true);
    let tick = Duration::from_millis(args.tick_ms);
    let status_interval = Duration::from_secs(args.status_interval);
    let start = Instant::now();
    log::info!("controller running");

    thread::scope(|s| {
        s.spawn(|| {
            while running.load(Ordering::Relaxed) {
                report(&cache, &shared);
                thread::sleep(status_interval);
            }
        });

        let code = loop {
            let now_ms = start.elapsed().as_millis() as u32;
            poller.refresh_all(&cache, now_ms);

            let now_secs = start.elapsed().as_secs() as u32;
            if let Err(e) = shared.tick(&cache, now_secs, local_time_of_day()) {
                log::error!("relay write failed: {:?}", e);
                if let Err(e) = shared.lock(|c| c.all_off()) {
                    log::error!("relays: {:?}", e);
                }
                break ExitCode::FAILURE;
            }
            if let Some(config) = shared.take_dirty() {
                if let Err(e) = store.save(&config) {
                    log::warn!("{}", e);
                }
            }
            thread::sleep(tick);
        };
        running.store(false, Ordering::Relaxed);
        code
    })
}
