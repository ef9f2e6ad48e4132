use crate::constants::{DEFAULT_RESYNC_ATTEMPTS, DEFAULT_RESYNC_BACKOFF_MS};

/// Represents the reporting mode of the SDS011 sensor.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum ReportingMode {
    /// In Active mode, the sensor automatically reports data.
    Active,
    /// In Query mode, the sensor only reports data when queried.
    Query,
}

impl ReportingMode {
    /// Value carried in the MODE command payload.
    pub fn as_byte(self) -> u8 {
        match self {
            ReportingMode::Active => 0x00,
            ReportingMode::Query => 0x01,
        }
    }
}

/// Represents the unique identifier of the SDS011 sensor.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct DeviceID {
    /// The first byte of the device ID.
    pub id1: u8,
    /// The second byte of the device ID.
    pub id2: u8,
}

impl Default for DeviceID {
    /// Returns the broadcast device id, `0xFFFF`.
    fn default() -> DeviceID {
        DeviceID {
            id1: 0xff,
            id2: 0xff,
        }
    }
}

/// Configuration settings for the SDS011 sensor session.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Config {
    /// The device ID commands are addressed to.
    pub id: DeviceID,
    /// The reporting mode applied by `init`.
    pub mode: ReportingMode,
    /// Number of single-byte reads spent hunting for a frame header.
    pub resync_attempts: usize,
    /// Backoff after a read that returned no byte, in milliseconds.
    pub resync_backoff_ms: u32,
    /// Reject response frames whose checksum or tail byte do not match.
    ///
    /// Off by default: the sensor's frames are accepted once the header is
    /// found and ten bytes have been read.
    pub verify_checksum: bool,
}

impl Config {
    /// Creates a new `Config` instance with default resync settings.
    ///
    /// # Arguments
    ///
    /// * `id` - The `DeviceID` for the sensor.
    /// * `mode` - The `ReportingMode` for the sensor.
    pub fn new(id: DeviceID, mode: ReportingMode) -> Config {
        Config {
            id,
            mode,
            ..Config::default()
        }
    }
    /// Sets the device ID for the configuration.
    pub fn id(mut self, id: DeviceID) -> Self {
        self.id = id;
        self
    }
    /// Sets the reporting mode for the configuration.
    pub fn mode(mut self, mode: ReportingMode) -> Self {
        self.mode = mode;
        self
    }
    /// Sets the resync budget and the backoff applied after empty reads.
    ///
    /// # Arguments
    ///
    /// * `attempts` - Maximum number of single-byte reads per header search.
    /// * `backoff_ms` - Delay after each read that produced no byte.
    pub fn resync(mut self, attempts: usize, backoff_ms: u32) -> Self {
        self.resync_attempts = attempts;
        self.resync_backoff_ms = backoff_ms;
        self
    }
    /// Enables or disables strict response validation.
    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }
}

/// Provides default configuration values for the SDS011 sensor.
impl Default for Config {
    /// Returns the default configuration.
    ///
    /// The default configuration uses a device ID of `0xFFFF`, `Query` mode,
    /// a resync budget of 100 reads with 100 ms backoff and lenient frame
    /// validation.
    fn default() -> Config {
        Config {
            id: DeviceID::default(),
            mode: ReportingMode::Query,
            resync_attempts: DEFAULT_RESYNC_ATTEMPTS,
            resync_backoff_ms: DEFAULT_RESYNC_BACKOFF_MS,
            verify_checksum: false,
        }
    }
}

/// Timing of the polling and averaging loop run by `Monitor`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Number of queries averaged per cycle.
    pub readings_per_cycle: usize,
    /// Wait after each query, in milliseconds.
    pub reading_interval_ms: u32,
    /// Put the sensor to sleep between cycles that produced an average.
    pub sleep_between_cycles: bool,
    /// How long the sensor sleeps between cycles.
    pub sleep_duration_ms: u32,
    /// Wait between cycles when sleeping is disabled.
    pub pause_ms: u32,
    /// Wait after a cycle without a single valid reading.
    pub retry_delay_ms: u32,
    /// Consecutive cycles allowed to fail on the transport before giving up.
    pub max_transport_failures: usize,
}

impl MonitorConfig {
    pub fn readings_per_cycle(mut self, readings: usize) -> Self {
        self.readings_per_cycle = readings;
        self
    }
    pub fn reading_interval_ms(mut self, ms: u32) -> Self {
        self.reading_interval_ms = ms;
        self
    }
    /// Enables sleeping between cycles for `duration_ms`, or disables it.
    pub fn sleep_between_cycles(mut self, enabled: bool, duration_ms: u32) -> Self {
        self.sleep_between_cycles = enabled;
        self.sleep_duration_ms = duration_ms;
        self
    }
    pub fn pause_ms(mut self, ms: u32) -> Self {
        self.pause_ms = ms;
        self
    }
    pub fn retry_delay_ms(mut self, ms: u32) -> Self {
        self.retry_delay_ms = ms;
        self
    }
    pub fn max_transport_failures(mut self, failures: usize) -> Self {
        self.max_transport_failures = failures;
        self
    }
}

impl Default for MonitorConfig {
    /// 15 readings two seconds apart, then one minute of sensor sleep.
    fn default() -> Self {
        MonitorConfig {
            readings_per_cycle: 15,
            reading_interval_ms: 2_000,
            sleep_between_cycles: true,
            sleep_duration_ms: 60_000,
            pause_ms: 2_000,
            retry_delay_ms: 5_000,
            max_transport_failures: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sensor_factory_settings() {
        let config = Config::default();
        assert_eq!(config.id, DeviceID { id1: 0xff, id2: 0xff });
        assert_eq!(config.mode, ReportingMode::Query);
        assert_eq!(config.resync_attempts, 100);
        assert_eq!(config.resync_backoff_ms, 100);
        assert!(!config.verify_checksum);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = Config::new(DeviceID { id1: 0x12, id2: 0x34 }, ReportingMode::Active)
            .resync(10, 5)
            .verify_checksum(true);
        assert_eq!(config.id.id1, 0x12);
        assert_eq!(config.mode, ReportingMode::Active);
        assert_eq!(config.resync_attempts, 10);
        assert_eq!(config.resync_backoff_ms, 5);
        assert!(config.verify_checksum);
    }

    #[test]
    fn monitor_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.readings_per_cycle, 15);
        assert_eq!(config.reading_interval_ms, 2_000);
        assert!(config.sleep_between_cycles);
        assert_eq!(config.sleep_duration_ms, 60_000);

        let config = config
            .sleep_between_cycles(false, 0)
            .reading_interval_ms(500)
            .pause_ms(750)
            .retry_delay_ms(1_000);
        assert!(!config.sleep_between_cycles);
        assert_eq!(config.reading_interval_ms, 500);
        assert_eq!(config.pause_ms, 750);
        assert_eq!(config.retry_delay_ms, 1_000);
    }

    #[test]
    fn mode_bytes() {
        assert_eq!(ReportingMode::Active.as_byte(), 0);
        assert_eq!(ReportingMode::Query.as_byte(), 1);
    }
}
