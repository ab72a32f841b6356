use core::cell::RefCell;
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

/// Value stored for a quantity that has no valid reading.
pub const SENSOR_INVALID: f32 = -999.0;

/// Readings at or below this value are invalid.
pub const VALIDITY_FLOOR: f32 = -100.0;

/// A cached sensor quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// Nutrient water temperature (DS18B20), °C.
    WaterTemperature,
    /// Grow table relative humidity (SHT30), %.
    TableHumidity,
    /// Room air temperature (DHT22), °C.
    AirTemperature,
    /// Room air relative humidity (DHT22), %.
    AirHumidity,
    /// Remote pH node.
    Ph,
    /// Remote TDS node, ppm.
    Tds,
}

impl Quantity {
    /// Every cached quantity, in report order.
    pub const ALL: [Quantity; 6] = [
        Quantity::WaterTemperature,
        Quantity::TableHumidity,
        Quantity::AirTemperature,
        Quantity::AirHumidity,
        Quantity::Ph,
        Quantity::Tds,
    ];

    /// Short label used in logs and status reports.
    pub fn name(&self) -> &'static str {
        match self {
            Quantity::WaterTemperature => "water temperature",
            Quantity::TableHumidity => "table humidity",
            Quantity::AirTemperature => "air temperature",
            Quantity::AirHumidity => "air humidity",
            Quantity::Ph => "pH",
            Quantity::Tds => "TDS",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// A copy of every cached value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readings([f32; 6]);

impl Default for Readings {
    fn default() -> Self {
        Self::new()
    }
}

impl Readings {
    const fn new() -> Self {
        Readings([SENSOR_INVALID; 6])
    }

    /// Raw cached value, [`SENSOR_INVALID`] if never read or failed.
    pub fn value(&self, quantity: Quantity) -> f32 {
        self.0[quantity.index()]
    }

    /// Whether the cached value is a usable reading.
    pub fn is_valid(&self, quantity: Quantity) -> bool {
        self.value(quantity) > VALIDITY_FLOOR
    }

    /// The cached value if it is valid.
    pub fn reading(&self, quantity: Quantity) -> Option<f32> {
        let value = self.value(quantity);
        (value > VALIDITY_FLOOR).then_some(value)
    }
}

/// Latest sensor values, shared between the acquisition and reporting contexts.
///
/// Every access takes the one lock for the duration of a memory touch; no reference
/// into the cache outlives the call and no I/O runs under it.
pub struct SensorCache {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Readings>>,
}

impl Default for SensorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorCache {
    /// A cache with every quantity invalid.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Readings::new())),
        }
    }

    /// Record a fresh value.
    pub fn store(&self, quantity: Quantity, value: f32) {
        self.inner
            .lock(|r| r.borrow_mut().0[quantity.index()] = value);
    }

    /// Mark a quantity invalid.
    ///
    /// # Returns
    /// `true` only on the valid to invalid transition, which is logged once. Repeated
    /// failures of an already invalid quantity return `false` silently.
    pub fn invalidate(&self, quantity: Quantity) -> bool {
        let was_valid = self.inner.lock(|r| {
            let mut r = r.borrow_mut();
            let was_valid = r.is_valid(quantity);
            r.0[quantity.index()] = SENSOR_INVALID;
            was_valid
        });
        if was_valid {
            log::warn!("{} sensor failed", quantity.name());
        }
        was_valid
    }

    /// Raw cached value, see [`Readings::value`].
    pub fn value(&self, quantity: Quantity) -> f32 {
        self.inner.lock(|r| r.borrow().value(quantity))
    }

    /// See [`Readings::is_valid`].
    pub fn is_valid(&self, quantity: Quantity) -> bool {
        self.inner.lock(|r| r.borrow().is_valid(quantity))
    }

    /// See [`Readings::reading`].
    pub fn reading(&self, quantity: Quantity) -> Option<f32> {
        self.inner.lock(|r| r.borrow().reading(quantity))
    }

    /// Every value under a single lock.
    pub fn snapshot(&self) -> Readings {
        self.inner.lock(|r| *r.borrow())
    }
}
