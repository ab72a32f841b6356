/*! # hydro-controller
 *
 * Sensor acquisition and relay control for a hydroponic enclosure.
 *
 * The acquisition context owns the sensor drivers through a [`SensorPoller`], which
 * refreshes the shared [`SensorCache`] at a throttled cadence. Once per tick the
 * [`Controller`] turns the cached readings into on/off decisions for the lights, pump,
 * heater and fan relays. A reporting context reads the cache and the controller state
 * concurrently; both sides go through a lock.
 */

pub mod cache;
pub mod config;
pub mod control;
pub mod poller;
pub mod sht30;
pub mod sources;
pub mod time;

pub use cache::{Quantity, Readings, SENSOR_INVALID, SensorCache};
pub use config::{CONFIG_MAGIC, ConfigError, ConfigStore, ControllerConfig, FileStore};
pub use control::{
    Channel, ChannelState, ControlPolicy, Controller, Polarity, Relay, SharedController,
    TickInputs,
};
pub use poller::{PollOutcome, SensorPoller, Throttle};
pub use sources::{
    Climate, ClimateSensor, RemoteLink, RemoteSource, RemoteValues, WaterProbe,
    WaterTemperatureSensor,
};
