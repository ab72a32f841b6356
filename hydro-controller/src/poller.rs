use crate::{
    cache::{Quantity, SensorCache},
    sources::{ClimateSensor, RemoteSource, WaterTemperatureSensor},
};

/// Minimum time between two polls of the same source.
pub const SENSOR_INTERVAL_MS: u32 = 30_000;

/// Remote values not refreshed for this many poll intervals are invalidated.
pub const REMOTE_STALE_INTERVALS: u32 = 3;

const WATER_RANGE_C: (f32, f32) = (-50.0, 80.0);
const PH_RANGE: (f32, f32) = (0.0, 14.0);

/// Rate limiter on a millisecond clock. The first call always passes.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval_ms: u32,
    last: Option<u32>,
}

impl Throttle {
    /// Allow one pass per `interval_ms`.
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last: None,
        }
    }

    /// Whether a pass is due at `now_ms`; a due pass restarts the interval.
    pub fn ready(&mut self, now_ms: u32) -> bool {
        match self.last {
            Some(last) if now_ms.wrapping_sub(last) < self.interval_ms => false,
            _ => {
                self.last = Some(now_ms);
                true
            }
        }
    }
}

/// What a refresh did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Throttled, no I/O performed.
    Skipped,
    /// Fresh values stored.
    Stored,
    /// Nothing usable received; the cache was left alone.
    Ignored,
    /// The read failed and a valid value was invalidated.
    Invalidated,
    /// The read failed and the value was already invalid.
    Failed,
}

/// Owns the sensor drivers and refreshes the cache from them.
///
/// Each refresh is throttled per source. The driver I/O runs without holding the cache
/// lock; only the store or invalidate takes it. A source that is absent (failed to
/// initialise) counts as a failed read.
pub struct SensorPoller<W, T, A, R> {
    water: Option<W>,
    table: Option<T>,
    air: Option<A>,
    remote: Option<R>,
    water_throttle: Throttle,
    table_throttle: Throttle,
    air_throttle: Throttle,
    remote_throttle: Throttle,
    remote_stale_ms: u32,
    /// Last accepted pH and TDS packets.
    remote_seen: [Option<u32>; 2],
}

fn invalidate(cache: &SensorCache, quantities: &[Quantity]) -> PollOutcome {
    let mut outcome = PollOutcome::Failed;
    for &q in quantities {
        if cache.invalidate(q) {
            outcome = PollOutcome::Invalidated;
        }
    }
    outcome
}

impl<W, T, A, R> SensorPoller<W, T, A, R>
where
    W: WaterTemperatureSensor,
    T: ClimateSensor,
    A: ClimateSensor,
    R: RemoteSource,
{
    /// Poller over whichever sources initialised.
    pub fn new(water: Option<W>, table: Option<T>, air: Option<A>, remote: Option<R>) -> Self {
        let throttle = Throttle::new(SENSOR_INTERVAL_MS);
        Self {
            water,
            table,
            air,
            remote,
            water_throttle: throttle,
            table_throttle: throttle,
            air_throttle: throttle,
            remote_throttle: throttle,
            remote_stale_ms: SENSOR_INTERVAL_MS * REMOTE_STALE_INTERVALS,
            remote_seen: [None; 2],
        }
    }

    /// Use `interval_ms` between polls of each source instead of [`SENSOR_INTERVAL_MS`].
    pub fn with_interval(mut self, interval_ms: u32) -> Self {
        let throttle = Throttle::new(interval_ms);
        self.water_throttle = throttle;
        self.table_throttle = throttle;
        self.air_throttle = throttle;
        self.remote_throttle = throttle;
        self.remote_stale_ms = interval_ms.saturating_mul(REMOTE_STALE_INTERVALS);
        self
    }

    /// Refresh the water temperature. Readings outside (-50, 80) °C count as failures.
    pub fn refresh_water_temperature(&mut self, cache: &SensorCache, now_ms: u32) -> PollOutcome {
        if !self.water_throttle.ready(now_ms) {
            return PollOutcome::Skipped;
        }
        let reading = self
            .water
            .as_mut()
            .and_then(|w| w.water_temperature(now_ms))
            .filter(|t| *t > WATER_RANGE_C.0 && *t < WATER_RANGE_C.1);
        match reading {
            Some(t) => {
                cache.store(Quantity::WaterTemperature, t);
                log::info!("water temperature {:.2} °C", t);
                PollOutcome::Stored
            }
            None => invalidate(cache, &[Quantity::WaterTemperature]),
        }
    }

    /// Refresh the table humidity.
    pub fn refresh_table_humidity(&mut self, cache: &SensorCache, now_ms: u32) -> PollOutcome {
        if !self.table_throttle.ready(now_ms) {
            return PollOutcome::Skipped;
        }
        match self.table.as_mut().and_then(|s| s.climate(now_ms)) {
            Some(c) => {
                cache.store(Quantity::TableHumidity, c.humidity);
                log::info!("table humidity {:.2} %", c.humidity);
                PollOutcome::Stored
            }
            None => invalidate(cache, &[Quantity::TableHumidity]),
        }
    }

    /// Refresh the room air temperature and humidity together.
    pub fn refresh_air(&mut self, cache: &SensorCache, now_ms: u32) -> PollOutcome {
        if !self.air_throttle.ready(now_ms) {
            return PollOutcome::Skipped;
        }
        match self.air.as_mut().and_then(|s| s.climate(now_ms)) {
            Some(c) => {
                cache.store(Quantity::AirTemperature, c.temperature);
                cache.store(Quantity::AirHumidity, c.humidity);
                log::info!("room air {:.2} °C, {:.2} % RH", c.temperature, c.humidity);
                PollOutcome::Stored
            }
            None => invalidate(cache, &[Quantity::AirTemperature, Quantity::AirHumidity]),
        }
    }

    /// Refresh pH and TDS from the remote nodes.
    ///
    /// A missing packet or an implausible value (pH outside (0, 14), negative TDS)
    /// leaves the cached value alone until it is stale: a quantity with no accepted
    /// packet for [`REMOTE_STALE_INTERVALS`] poll intervals is invalidated.
    pub fn refresh_remote_nodes(&mut self, cache: &SensorCache, now_ms: u32) -> PollOutcome {
        if !self.remote_throttle.ready(now_ms) {
            return PollOutcome::Skipped;
        }
        let Some(remote) = self.remote.as_mut() else {
            return invalidate(cache, &[Quantity::Ph, Quantity::Tds]);
        };
        let values = remote.receive();
        let fresh = [
            values.ph.filter(|v| *v > PH_RANGE.0 && *v < PH_RANGE.1),
            values.tds.filter(|v| *v >= 0.0),
        ];
        let mut outcome = PollOutcome::Ignored;
        for ((quantity, value), seen) in [Quantity::Ph, Quantity::Tds]
            .into_iter()
            .zip(fresh)
            .zip(self.remote_seen.iter_mut())
        {
            match value {
                Some(v) => {
                    cache.store(quantity, v);
                    log::info!("{} {:.2}", quantity.name(), v);
                    *seen = Some(now_ms);
                    if outcome != PollOutcome::Invalidated {
                        outcome = PollOutcome::Stored;
                    }
                }
                None => {
                    let stale = seen.is_some_and(|t| now_ms.wrapping_sub(t) >= self.remote_stale_ms);
                    if stale {
                        *seen = None;
                        if cache.invalidate(quantity) {
                            outcome = PollOutcome::Invalidated;
                        }
                    }
                }
            }
        }
        outcome
    }

    /// Refresh every source that is due.
    pub fn refresh_all(&mut self, cache: &SensorCache, now_ms: u32) {
        self.refresh_water_temperature(cache, now_ms);
        self.refresh_table_humidity(cache, now_ms);
        self.refresh_air(cache, now_ms);
        self.refresh_remote_nodes(cache, now_ms);
    }
}
