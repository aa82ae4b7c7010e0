use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use crate::error::RegistryError;
use crate::registry::{Counter, DataKey, DataRegistry, Gauge, UpdateInfo};

/// Most header entries a station row prints.
pub const MAX_ROW_LEN: usize = 16;

#[derive(Clone, Copy, Debug, Default)]
pub struct AirData {
    /// hPa
    pub pressure: f32,
    /// °C
    pub temperature: f32,
}

/// Registry of everything the measurement station reports, plus the raw
/// acquisition statistics it keeps. No wind quantities are derived here.
pub struct Station {
    registry: DataRegistry,
    row: Vec<DataKey>,
    air: Arc<RwLock<AirData>>,
    samples_min: Counter,
    samples_max: Counter,
    measurements: Counter,
    air_updates: UpdateInfo,
    sample_updates: UpdateInfo,
}

impl Station {
    pub fn new(header: &str) -> Result<Station, RegistryError> {
        let air = Arc::new(RwLock::new(AirData::default()));
        let samples_min = Counter::new();
        let samples_max = Counter::new();
        let measurements = Counter::new();

        let mut registry = DataRegistry::new();
        let pressure = air.clone();
        registry.register("pressure", Gauge::new(move || read(&pressure).pressure, 2))?;
        let temperature = air.clone();
        registry.register(
            "temperature",
            Gauge::new(move || read(&temperature).temperature, 3),
        )?;
        registry.register("samples_min", samples_min.clone())?;
        registry.register("samples_max", samples_max.clone())?;
        registry.register("measurements", measurements.clone())?;

        let row = registry.resolve(header, ',', MAX_ROW_LEN)?;

        Ok(Station {
            registry,
            row,
            air,
            samples_min,
            samples_max,
            measurements,
            air_updates: UpdateInfo::default(),
            sample_updates: UpdateInfo::default(),
        })
    }

    pub fn record_air(&mut self, data: AirData, now: Instant) {
        *self.air.write().unwrap_or_else(PoisonError::into_inner) = data;
        self.air_updates.updated(now);
    }

    pub fn record_samples(&mut self, samples: &[u16], now: Instant) {
        let min = samples.iter().copied().min().unwrap_or(0);
        let max = samples.iter().copied().max().unwrap_or(0);
        self.samples_min.set(u32::from(min));
        self.samples_max.set(u32::from(max));
        self.measurements.increment();
        self.sample_updates.updated(now);
    }

    pub fn registry(&self) -> &DataRegistry {
        &self.registry
    }

    pub fn air_updates(&self) -> &UpdateInfo {
        &self.air_updates
    }

    pub fn sample_updates(&self) -> &UpdateInfo {
        &self.sample_updates
    }

    /// Names of the row columns.
    pub fn header(&self) -> String {
        self.row
            .iter()
            .filter_map(|&key| self.registry.name(key))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn row(&self) -> String {
        self.registry.render_row(&self.row, ',')
    }
}

fn read(air: &RwLock<AirData>) -> AirData {
    *air.read().unwrap_or_else(PoisonError::into_inner)
}
