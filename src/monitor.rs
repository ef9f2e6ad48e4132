use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, ReadReady, Write};
use log::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::Error;
use crate::response::Reading;
use crate::Sds011;

/// Gauges published after each measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gauge {
    Pm25,
    Pm10,
}

impl Gauge {
    pub fn name(self) -> &'static str {
        match self {
            Gauge::Pm25 => "sds011_pm25",
            Gauge::Pm10 => "sds011_pm10",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Gauge::Pm25 => "PM2.5 particulate matter in µg/m³",
            Gauge::Pm10 => "PM10 particulate matter in µg/m³",
        }
    }
}

/// Destination for averaged readings, e.g. a metrics exporter.
pub trait MetricsSink {
    fn set_gauge(&mut self, gauge: Gauge, value: f32);
}

impl<T: MetricsSink + ?Sized> MetricsSink for &mut T {
    fn set_gauge(&mut self, gauge: Gauge, value: f32) {
        (**self).set_gauge(gauge, value)
    }
}

/// Sink used when publishing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn set_gauge(&mut self, _gauge: Gauge, _value: f32) {}
}

/// Mean of the valid readings taken during one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Average {
    pub pm2_5: f32,
    pub pm10: f32,
    pub samples: usize,
}

#[derive(Default)]
struct Accumulator {
    pm2_5: f32,
    pm10: f32,
    samples: usize,
}

impl Accumulator {
    fn push(&mut self, reading: Reading) {
        self.pm2_5 += reading.pm2_5;
        self.pm10 += reading.pm10;
        self.samples += 1;
    }

    fn average(&self) -> Option<Average> {
        if self.samples == 0 {
            return None;
        }
        let n = self.samples as f32;
        Some(Average {
            pm2_5: self.pm2_5 / n,
            pm10: self.pm10 / n,
            samples: self.samples,
        })
    }
}

/// Polls the sensor in cycles, averages each cycle and publishes the result.
///
/// The monitor owns the sensor session and the sink; `into_parts` hands both
/// back once `run` returns so the serial port can be released. It does not
/// configure the sensor: call [`Sds011::init`] before `run`.
pub struct Monitor<S, D, M> {
    sensor: Sds011<S, D>,
    sink: M,
    config: MonitorConfig,
}

impl<S, D, M> Monitor<S, D, M>
where
    S: Read + ReadReady + Write,
    D: DelayNs,
    M: MetricsSink,
{
    pub fn new(sensor: Sds011<S, D>, sink: M, config: MonitorConfig) -> Self {
        Self {
            sensor,
            sink,
            config,
        }
    }

    pub fn sensor(&mut self) -> &mut Sds011<S, D> {
        &mut self.sensor
    }

    pub fn into_parts(self) -> (Sds011<S, D>, M) {
        (self.sensor, self.sink)
    }

    /// Wakes the sensor, takes `readings_per_cycle` samples and publishes
    /// their mean.
    ///
    /// Returns `Ok(None)` if not a single sample was valid, in which case
    /// nothing is published.
    pub async fn run_cycle(&mut self) -> Result<Option<Average>, Error<S::Error>> {
        self.sensor.set_sleep(false).await?;

        let mut acc = Accumulator::default();
        for _ in 0..self.config.readings_per_cycle {
            match self.sensor.query_data().await? {
                Some(reading) => {
                    debug!(
                        "PM2.5: {:.1} µg/m³, PM10: {:.1} µg/m³",
                        reading.pm2_5, reading.pm10
                    );
                    acc.push(reading);
                }
                None => debug!("Invalid reading received"),
            }
            self.sensor.pause(self.config.reading_interval_ms).await?;
        }

        let average = acc.average();
        if let Some(avg) = average {
            self.sink.set_gauge(Gauge::Pm25, avg.pm2_5);
            self.sink.set_gauge(Gauge::Pm10, avg.pm10);
            info!(
                "AVERAGE: PM2.5: {:.1} µg/m³, PM10: {:.1} µg/m³ (from {} readings)",
                avg.pm2_5, avg.pm10, avg.samples
            );
        }
        Ok(average)
    }

    /// Runs cycles until the session's stop flag is raised.
    ///
    /// Expects a sensor already brought up with [`Sds011::init`].
    ///
    /// A cycle that fails on the transport is retried after `retry_delay_ms`;
    /// more than `max_transport_failures` failures in a row end the loop with
    /// that error. Cancellation ends it with `Ok(())`.
    pub async fn run(&mut self) -> Result<(), Error<S::Error>> {
        let mut failures = 0;
        while !self.sensor.is_stopped() {
            match self.cycle_and_rest().await {
                Ok(()) => failures = 0,
                Err(Error::Cancelled) => break,
                Err(Error::Io(e)) => {
                    failures += 1;
                    if failures > self.config.max_transport_failures {
                        error!(
                            "Giving up after {} consecutive transport failures: {:?}",
                            failures, e
                        );
                        return Err(Error::Io(e));
                    }
                    warn!(
                        "Transport failure ({}/{}): {:?}, retrying",
                        failures, self.config.max_transport_failures, e
                    );
                    match self.sensor.pause(self.config.retry_delay_ms).await {
                        Err(Error::Cancelled) => break,
                        other => other?,
                    }
                }
                Err(e) => return Err(e),
            }
        }
        info!("Monitor stopped");
        Ok(())
    }

    async fn cycle_and_rest(&mut self) -> Result<(), Error<S::Error>> {
        match self.run_cycle().await? {
            Some(_) if self.config.sleep_between_cycles => {
                debug!(
                    "Going to sleep for {} ms",
                    self.config.sleep_duration_ms
                );
                self.sensor.set_sleep(true).await?;
                self.sensor.pause(self.config.sleep_duration_ms).await
            }
            Some(_) => {
                debug!("Continuing measurements (sleep disabled)");
                self.sensor.pause(self.config.pause_ms).await
            }
            None => {
                warn!("No valid readings in this cycle, retrying");
                self.sensor.pause(self.config.retry_delay_ms).await
            }
        }
    }
}
