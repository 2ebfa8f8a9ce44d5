// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use serde::Serialize;
use std::time::{Duration, Instant};

/// Session statistics collected while processing units
#[derive(Debug, Clone, Serialize)]
pub struct SessionMetrics {
    /// Codec family the session ran
    pub family: String,
    /// Units processed successfully
    pub units_processed: u64,
    /// Units the hardware rejected; the session carried on after each
    pub units_failed: u64,
    /// Units reported as key frames
    pub key_frames: u64,
    /// Stride changes submitted to the encoder
    pub reconfigurations: u64,
    /// Bytes handed to the hardware
    pub bytes_in: u64,
    /// Bytes produced by the hardware
    pub bytes_out: u64,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Average throughput in units per second
    pub throughput_fps: f64,
    /// Minimum per-unit latency in microseconds
    pub latency_min_us: u64,
    /// Maximum per-unit latency in microseconds
    pub latency_max_us: u64,
    /// Average per-unit latency in microseconds
    pub latency_avg_us: u64,
    /// 50th percentile (median) latency in microseconds
    pub latency_p50_us: u64,
    /// 95th percentile latency in microseconds
    pub latency_p95_us: u64,
    /// 99th percentile latency in microseconds
    pub latency_p99_us: u64,
}

/// Collector for per-unit latency and byte counts
pub struct MetricsCollector {
    family: String,
    start_time: Instant,
    latencies_us: Vec<u64>,
    failed: u64,
    key_frames: u64,
    reconfigurations: u64,
    bytes_in: u64,
    bytes_out: u64,
}

impl MetricsCollector {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            start_time: Instant::now(),
            latencies_us: Vec::new(),
            failed: 0,
            key_frames: 0,
            reconfigurations: 0,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Record one successfully processed unit
    pub fn record_unit(&mut self, latency: Duration, bytes_in: usize, bytes_out: usize, key_frame: bool) {
        self.latencies_us.push(latency.as_micros() as u64);
        self.bytes_in += bytes_in as u64;
        self.bytes_out += bytes_out as u64;
        if key_frame {
            self.key_frames += 1;
        }
    }

    /// Record a unit the hardware rejected
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn record_reconfiguration(&mut self) {
        self.reconfigurations += 1;
    }

    pub fn units_processed(&self) -> u64 {
        self.latencies_us.len() as u64
    }

    pub fn units_failed(&self) -> u64 {
        self.failed
    }

    /// Finalize and calculate all metrics
    pub fn finalize(&mut self) -> SessionMetrics {
        let duration = self.start_time.elapsed();
        let duration_secs = duration.as_secs_f64();
        let units_processed = self.units_processed();

        let throughput_fps = if duration_secs > 0.0 {
            units_processed as f64 / duration_secs
        } else {
            0.0
        };

        self.latencies_us.sort_unstable();
        let (min_us, max_us, avg_us) = match (self.latencies_us.first(), self.latencies_us.last()) {
            (Some(&min), Some(&max)) => {
                let sum: u64 = self.latencies_us.iter().sum();
                (min, max, sum / units_processed)
            }
            _ => (0, 0, 0),
        };

        SessionMetrics {
            family: self.family.clone(),
            units_processed,
            units_failed: self.failed,
            key_frames: self.key_frames,
            reconfigurations: self.reconfigurations,
            bytes_in: self.bytes_in,
            bytes_out: self.bytes_out,
            duration_ms: duration.as_millis() as u64,
            throughput_fps,
            latency_min_us: min_us,
            latency_max_us: max_us,
            latency_avg_us: avg_us,
            latency_p50_us: self.percentile(50.0),
            latency_p95_us: self.percentile(95.0),
            latency_p99_us: self.percentile(99.0),
        }
    }

    /// Percentile of the sorted latency data
    fn percentile(&self, p: f64) -> u64 {
        if self.latencies_us.is_empty() {
            return 0;
        }

        let len = self.latencies_us.len();
        let idx = ((p / 100.0) * (len - 1) as f64).round() as usize;
        self.latencies_us[idx.min(len - 1)]
    }

    /// Print metrics in human-readable format
    pub fn print_text(&mut self) {
        let metrics = self.finalize();
        println!("\n=== {} Session ===", metrics.family);
        println!("Units processed:   {}", metrics.units_processed);
        if metrics.units_failed > 0 {
            println!("Units failed:      {}", metrics.units_failed);
        }
        println!("Key frames:        {}", metrics.key_frames);
        if metrics.reconfigurations > 0 {
            println!("Reconfigurations:  {}", metrics.reconfigurations);
        }
        println!(
            "Bytes in/out:      {} / {} ({:.2} MB out)",
            metrics.bytes_in,
            metrics.bytes_out,
            metrics.bytes_out as f64 / 1_048_576.0
        );
        println!(
            "Duration:          {:.2} s",
            metrics.duration_ms as f64 / 1000.0
        );
        println!("Throughput:        {:.2} fps", metrics.throughput_fps);

        if metrics.units_processed > 0 {
            println!("\nLatency Statistics (us):");
            println!("  Min:    {}", metrics.latency_min_us);
            println!("  Max:    {}", metrics.latency_max_us);
            println!("  Avg:    {}", metrics.latency_avg_us);
            println!("  P50:    {}", metrics.latency_p50_us);
            println!("  P95:    {}", metrics.latency_p95_us);
            println!("  P99:    {}", metrics.latency_p99_us);
        }
    }

    /// Print metrics in JSON format
    pub fn print_json(&mut self) -> Result<(), serde_json::Error> {
        let metrics = self.finalize();
        let json = serde_json::to_string_pretty(&metrics)?;
        println!("{}", json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_calculation() {
        let mut collector = MetricsCollector::new("H.264 decode");

        for i in 0..=10 {
            collector.record_unit(Duration::from_micros(i * 10), 100, 0, i == 0);
        }

        let metrics = collector.finalize();
        assert_eq!(metrics.latency_p50_us, 50);
        assert_eq!(metrics.latency_p95_us, 100);
        assert_eq!(metrics.latency_min_us, 0);
        assert_eq!(metrics.latency_max_us, 100);
        assert_eq!(metrics.latency_avg_us, 50);
        assert_eq!(metrics.key_frames, 1);
        assert_eq!(metrics.bytes_in, 1100);
    }

    #[test]
    fn test_failures_are_not_units() {
        let mut collector = MetricsCollector::new("H.264 encode");
        collector.record_unit(Duration::from_micros(900), 1000, 40, true);
        collector.record_failure();
        collector.record_reconfiguration();

        let metrics = collector.finalize();
        assert_eq!(metrics.units_processed, 1);
        assert_eq!(metrics.units_failed, 1);
        assert_eq!(metrics.reconfigurations, 1);
    }

    #[test]
    fn test_empty_metrics() {
        let mut collector = MetricsCollector::new("JPEG encode");
        let metrics = collector.finalize();

        assert_eq!(metrics.units_processed, 0);
        assert_eq!(metrics.bytes_out, 0);
        assert_eq!(metrics.latency_min_us, 0);
        assert_eq!(metrics.latency_p99_us, 0);
        assert!(metrics.throughput_fps >= 0.0);
    }
}
