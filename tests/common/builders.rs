//! Test data builders for creating test objects

use serialvis_rs::config::{AppConfig, TimingConfig};
use serialvis_rs::Sample;

/// Builder for creating test configs with fast timing
pub struct ConfigBuilder {
    port: String,
    baud_rate: u32,
    interval_ms: u64,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            port: "/dev/mock0".to_string(),
            baud_rate: 9600,
            interval_ms: 20,
        }
    }

    pub fn port(mut self, port: &str) -> Self {
        self.port = port.to_string();
        self
    }

    /// Base interval used for read timeout, retry interval and error pause
    pub fn interval_ms(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    pub fn build(self) -> AppConfig {
        let mut config = AppConfig::for_port(self.port, self.baud_rate);
        config.timing = TimingConfig::uniform(self.interval_ms);
        config
    }
}

/// Samples `(i, i * 10)` for `i` in `0..n`, plus the lines that encode them
pub fn sample_lines(n: usize) -> (Vec<Sample>, Vec<String>) {
    (0..n)
        .map(|i| {
            let sample = Sample::new(i as f64, i as f64 * 10.0);
            (sample, format!("{} {}", sample.x, sample.y))
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new().port("/dev/mock9").interval_ms(5).build();

        assert_eq!(config.port.name, "/dev/mock9");
        assert_eq!(config.timing.retry_interval_ms, 5);
        assert!(config.validate().is_ok());
    }
}
