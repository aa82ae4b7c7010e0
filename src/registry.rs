//! Named sensor quantities for logging and printing.
//!
//! Quantities are registered under short stable keys. A comma separated
//! header such as `"pressure,temperature"` resolves to an ordered list of
//! keys once, and each row is then rendered in that order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::RegistryError;

pub const MAX_KEY_LEN: usize = 16;

/// A readable sensor value.
pub trait Quantity: Send + Sync {
    fn value(&self) -> f32;

    fn render(&self) -> String {
        format!("{:.4}", self.value())
    }
}

/// A float read through a closure and printed with fixed precision.
pub struct Gauge<F> {
    read: F,
    precision: usize,
}

impl<F> Gauge<F>
where
    F: Fn() -> f32 + Send + Sync,
{
    pub fn new(read: F, precision: usize) -> Gauge<F> {
        Gauge { read, precision }
    }
}

impl<F> Quantity for Gauge<F>
where
    F: Fn() -> f32 + Send + Sync,
{
    fn value(&self) -> f32 {
        (self.read)()
    }

    fn render(&self) -> String {
        format!("{:.*}", self.precision, self.value())
    }
}

/// An integer quantity shared with its producer.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    count: Arc<AtomicU32>,
}

impl Counter {
    pub fn new() -> Counter {
        Counter::default()
    }

    pub fn set(&self, value: u32) {
        self.count.store(value, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Quantity for Counter {
    fn value(&self) -> f32 {
        self.get() as f32
    }

    fn render(&self) -> String {
        self.get().to_string()
    }
}

/// Handle to a registered quantity, valid for the registry that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataKey(usize);

struct Entry {
    name: String,
    quantity: Box<dyn Quantity>,
}

#[derive(Default)]
pub struct DataRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, DataKey>,
}

impl DataRegistry {
    pub fn new() -> DataRegistry {
        DataRegistry::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        quantity: impl Quantity + 'static,
    ) -> Result<DataKey, RegistryError> {
        let valid = !name.is_empty()
            && name.len() <= MAX_KEY_LEN
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if !valid {
            return Err(RegistryError::InvalidKey(name.to_owned()));
        }
        if self.index.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_owned()));
        }

        let key = DataKey(self.entries.len());
        self.entries.push(Entry {
            name: name.to_owned(),
            quantity: Box::new(quantity),
        });
        self.index.insert(name.to_owned(), key);
        Ok(key)
    }

    pub fn key(&self, name: &str) -> Option<DataKey> {
        self.index.get(name).copied()
    }

    pub fn name(&self, key: DataKey) -> Option<&str> {
        self.entries.get(key.0).map(|entry| entry.name.as_str())
    }

    pub fn value(&self, key: DataKey) -> Option<f32> {
        self.entries.get(key.0).map(|entry| entry.quantity.value())
    }

    pub fn render(&self, key: DataKey) -> Option<String> {
        self.entries.get(key.0).map(|entry| entry.quantity.render())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a delimited header into keys, keeping at most `max` of them.
    /// Empty fields are skipped; unknown names are an error.
    pub fn resolve(&self, header: &str, delim: char, max: usize) -> Result<Vec<DataKey>, RegistryError> {
        header
            .split(delim)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .take(max)
            .map(|name| {
                self.key(name)
                    .ok_or_else(|| RegistryError::Unknown(name.to_owned()))
            })
            .collect()
    }

    pub fn render_row(&self, keys: &[DataKey], delim: char) -> String {
        keys.iter()
            .filter_map(|&key| self.render(key))
            .collect::<Vec<_>>()
            .join(&delim.to_string())
    }
}

/// Bookkeeping of when a sensor last produced data.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateInfo {
    last: Option<Instant>,
    interval: f32,
    count: u32,
}

impl UpdateInfo {
    pub fn updated(&mut self, now: Instant) {
        if let Some(last) = self.last {
            self.interval = now.saturating_duration_since(last).as_secs_f32();
        }
        self.last = Some(now);
        self.count = self.count.wrapping_add(1);
    }

    pub fn last(&self) -> Option<Instant> {
        self.last
    }

    /// Seconds between the last two updates.
    pub fn interval(&self) -> f32 {
        self.interval
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn registry() -> DataRegistry {
        let mut registry = DataRegistry::new();
        registry
            .register("pressure", Gauge::new(|| 1013.254, 2))
            .unwrap();
        registry
            .register("temperature", Gauge::new(|| 21.5, 3))
            .unwrap();
        registry
    }

    #[test]
    fn resolves_header_in_order() {
        let registry = registry();
        let keys = registry.resolve("temperature, pressure", ',', 6).unwrap();
        assert_eq!(
            keys,
            vec![
                registry.key("temperature").unwrap(),
                registry.key("pressure").unwrap()
            ]
        );
        assert_eq!(registry.render_row(&keys, ','), "21.500,1013.25");
    }

    #[test]
    fn header_is_truncated_to_max() {
        let registry = registry();
        let keys = registry.resolve("pressure,temperature,pressure", ',', 2).unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let registry = registry();
        assert_eq!(
            registry.resolve("pressure,gyro_x", ',', 6),
            Err(RegistryError::Unknown("gyro_x".to_owned()))
        );
    }

    #[test]
    fn keys_are_validated() {
        let mut registry = registry();
        assert_eq!(
            registry.register("pressure", Counter::new()),
            Err(RegistryError::Duplicate("pressure".to_owned()))
        );
        for name in ["", "Pressure", "air pressure", "a_very_long_quantity_name"] {
            assert_eq!(
                registry.register(name, Counter::new()),
                Err(RegistryError::InvalidKey(name.to_owned()))
            );
        }
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn counter_renders_as_integer() {
        let mut registry = DataRegistry::new();
        let counter = Counter::new();
        let key = registry.register("measurements", counter.clone()).unwrap();
        counter.increment();
        counter.increment();
        assert_eq!(registry.render(key).as_deref(), Some("2"));
        assert_eq!(registry.value(key), Some(2.0));
    }

    #[test]
    fn update_interval() {
        let start = Instant::now();
        let mut info = UpdateInfo::default();
        info.updated(start);
        assert_eq!(info.count(), 1);
        assert_eq!(info.interval(), 0.0);

        info.updated(start + Duration::from_millis(500));
        assert_eq!(info.count(), 2);
        assert!((info.interval() - 0.5).abs() < 1e-6);
    }
}
