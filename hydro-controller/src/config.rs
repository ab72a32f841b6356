use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

/// Sentinel at the start of a stored record, "HYDS".
pub const CONFIG_MAGIC: u32 = 0x4859_4453;

/// Size of the stored record.
pub const CONFIG_RECORD_LEN: usize = 41;

const SECONDS_PER_DAY: u32 = 86_400;
const MAX_PUMP_PERIOD_SEC: u32 = 7_200;

/// Persisted controller settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    /// Lights on, seconds since midnight.
    pub lights_start_s: u32,
    /// Lights off, seconds since midnight.
    pub lights_end_s: u32,
    /// Pump run time per period in timer mode.
    pub pump_on_sec: u32,
    /// Pump cycle length in timer mode.
    pub pump_period_sec: u32,
    /// Heater target water temperature, °C.
    pub heater_setpoint_c: f32,
    /// Table humidity below which the pump runs in humidity mode, %.
    pub humidity_threshold: f32,
    /// Pump driven by table humidity instead of the timer.
    pub humidity_mode: bool,
    /// Shortest pump run in humidity mode.
    pub min_pump_run_sec: u32,
    /// Shortest pump rest in humidity mode.
    pub min_pump_off_sec: u32,
    /// Longest pump rest in humidity mode before a run is forced.
    pub max_pump_off_sec: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lights_start_s: 8 * 3600,
            lights_end_s: 20 * 3600,
            pump_on_sec: 45,
            pump_period_sec: 600,
            heater_setpoint_c: 15.0,
            humidity_threshold: 60.0,
            humidity_mode: false,
            min_pump_run_sec: 30,
            min_pump_off_sec: 600,
            max_pump_off_sec: 3600,
        }
    }
}

/// Lights window bounds are both within a day.
pub fn valid_light_schedule(start_s: u32, end_s: u32) -> bool {
    start_s < SECONDS_PER_DAY && end_s < SECONDS_PER_DAY
}

/// `0 < on < period <= 2 h`.
pub fn valid_pump_timing(on_sec: u32, period_sec: u32) -> bool {
    on_sec > 0 && on_sec < period_sec && period_sec <= MAX_PUMP_PERIOD_SEC
}

/// Setpoint strictly between -40 and 80 °C.
pub fn valid_setpoint(celsius: f32) -> bool {
    celsius > -40.0 && celsius < 80.0
}

/// Threshold between 0 and 100 %.
pub fn valid_humidity_threshold(percent: f32) -> bool {
    (0.0..=100.0).contains(&percent)
}

/// Minimum run between 5 s and 5 min.
pub fn valid_min_run(seconds: u32) -> bool {
    (5..=300).contains(&seconds)
}

/// Minimum rest between 1 min and 1 h.
pub fn valid_min_off(seconds: u32) -> bool {
    (60..=3600).contains(&seconds)
}

/// Maximum rest between 5 min and 2 h.
pub fn valid_max_off(seconds: u32) -> bool {
    (300..=7200).contains(&seconds)
}

struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl RecordReader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    fn bool(&mut self) -> bool {
        self.take::<1>()[0] != 0
    }
}

impl ControllerConfig {
    /// Encode as the fixed little-endian record: magic, lights start/end, pump on/period,
    /// setpoint, threshold, mode byte, min run, min off, max off.
    pub fn encode(&self) -> [u8; CONFIG_RECORD_LEN] {
        let mut out = [0; CONFIG_RECORD_LEN];
        let mut pos = 0;
        let mut put = |bytes: &[u8]| {
            out[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
        };
        put(&CONFIG_MAGIC.to_le_bytes());
        put(&self.lights_start_s.to_le_bytes());
        put(&self.lights_end_s.to_le_bytes());
        put(&self.pump_on_sec.to_le_bytes());
        put(&self.pump_period_sec.to_le_bytes());
        put(&self.heater_setpoint_c.to_le_bytes());
        put(&self.humidity_threshold.to_le_bytes());
        put(&[self.humidity_mode as u8]);
        put(&self.min_pump_run_sec.to_le_bytes());
        put(&self.min_pump_off_sec.to_le_bytes());
        put(&self.max_pump_off_sec.to_le_bytes());
        out
    }

    /// Overlay a stored record on the current values.
    ///
    /// Fields outside their accepted range are skipped and keep the current value.
    ///
    /// # Errors
    /// [`ConfigError::Size`] or [`ConfigError::Magic`] if the record is not a config
    /// record; nothing is applied.
    pub fn apply_record(&mut self, record: &[u8]) -> Result<(), ConfigError> {
        if record.len() != CONFIG_RECORD_LEN {
            return Err(ConfigError::Size(record.len()));
        }
        let mut r = RecordReader {
            bytes: record,
            pos: 0,
        };
        let magic = r.u32();
        if magic != CONFIG_MAGIC {
            return Err(ConfigError::Magic(magic));
        }

        let (start, end) = (r.u32(), r.u32());
        if valid_light_schedule(start, end) {
            self.lights_start_s = start;
            self.lights_end_s = end;
        }
        let (on, period) = (r.u32(), r.u32());
        if valid_pump_timing(on, period) {
            self.pump_on_sec = on;
            self.pump_period_sec = period;
        }
        let setpoint = r.f32();
        if valid_setpoint(setpoint) {
            self.heater_setpoint_c = setpoint;
        }
        let threshold = r.f32();
        if valid_humidity_threshold(threshold) {
            self.humidity_threshold = threshold;
        }
        self.humidity_mode = r.bool();
        let min_run = r.u32();
        if valid_min_run(min_run) {
            self.min_pump_run_sec = min_run;
        }
        let min_off = r.u32();
        if valid_min_off(min_off) {
            self.min_pump_off_sec = min_off;
        }
        let max_off = r.u32();
        if valid_max_off(max_off) {
            self.max_pump_off_sec = max_off;
        }
        Ok(())
    }

    /// Defaults overlaid with a stored record.
    pub fn from_record(record: &[u8]) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_record(record)?;
        Ok(config)
    }
}

/// Errors loading or saving the config record.
#[derive(Debug)]
pub enum ConfigError {
    /// The record has the wrong length.
    Size(usize),
    /// The record does not start with [`CONFIG_MAGIC`].
    Magic(u32),
    /// Storage errors.
    Io(io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Size(len) => {
                write!(f, "config size mismatch: {} vs {}", len, CONFIG_RECORD_LEN)
            }
            ConfigError::Magic(magic) => write!(f, "invalid config magic {:#010x}", magic),
            ConfigError::Io(e) => write!(f, "config storage: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Backing storage for the config record.
pub trait ConfigStore {
    /// Load the stored configuration.
    fn load(&mut self) -> Result<ControllerConfig, ConfigError>;

    /// Persist `config`.
    fn save(&mut self, config: &ControllerConfig) -> Result<(), ConfigError>;
}

/// Config record kept in a single file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store backed by `path`; the file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileStore {
    fn load(&mut self) -> Result<ControllerConfig, ConfigError> {
        let record = fs::read(&self.path)?;
        let config = ControllerConfig::from_record(&record)?;
        log::info!("config loaded from {}", self.path.display());
        Ok(config)
    }

    fn save(&mut self, config: &ControllerConfig) -> Result<(), ConfigError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, config.encode())?;
        fs::rename(&tmp, &self.path)?;
        log::info!("config saved to {}", self.path.display());
        Ok(())
    }
}
