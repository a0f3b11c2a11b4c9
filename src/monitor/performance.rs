//! Load-time, stall and memory-pressure history.
use serde::Serialize;

use crate::capability::HeapUsage;
use crate::ring::RingBuffer;

const LOAD_HISTORY: usize = 10;
const STALL_HISTORY: usize = 20;
const MEMORY_HISTORY: usize = 20;

const HEAP_PRESSURE_RATIO: f64 = 0.8;
const LOW_DEVICE_MEMORY_GB: f64 = 2.0;

/// Point-in-time performance summary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PerformanceSample {
    pub memory_pressure_high: bool,
    /// Mean of the retained load samples, `None` before the first load.
    pub average_recent_load_ms: Option<f64>,
    pub stall_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryReading {
    pub heap: HeapUsage,
    pub timestamp_ms: u64,
}

/// Bounded performance history for one playback session.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    loads: RingBuffer<u64>,
    stalls: RingBuffer<u64>,
    memory: RingBuffer<MemoryReading>,
    device_memory_gb: Option<f64>,
}

impl PerformanceMonitor {
    /// `device_memory_gb` is the fallback pressure signal when no heap
    /// readings exist.
    pub fn new(device_memory_gb: Option<f64>) -> Self {
        Self {
            loads: RingBuffer::new(LOAD_HISTORY),
            stalls: RingBuffer::new(STALL_HISTORY),
            memory: RingBuffer::new(MEMORY_HISTORY),
            device_memory_gb,
        }
    }

    pub fn record_load(&mut self, load_ms: u64) {
        self.loads.push(load_ms);
    }

    pub fn record_stall(&mut self, timestamp_ms: u64) {
        self.stalls.push(timestamp_ms);
    }

    pub fn record_memory(&mut self, heap: HeapUsage, timestamp_ms: u64) {
        self.memory.push(MemoryReading { heap, timestamp_ms });
    }

    pub fn set_device_memory(&mut self, device_memory_gb: Option<f64>) {
        self.device_memory_gb = device_memory_gb;
    }

    pub fn latest_memory(&self) -> Option<&MemoryReading> {
        self.memory.latest()
    }

    pub fn sample(&self) -> PerformanceSample {
        let average_recent_load_ms = if self.loads.is_empty() {
            None
        } else {
            let total: u64 = self.loads.iter().sum();
            Some(total as f64 / self.loads.len() as f64)
        };
        PerformanceSample {
            memory_pressure_high: self.memory_pressure_high(),
            average_recent_load_ms,
            stall_count: self.stalls.len(),
        }
    }

    fn memory_pressure_high(&self) -> bool {
        match self.memory.latest().and_then(|reading| reading.heap.ratio()) {
            Some(ratio) => ratio > HEAP_PRESSURE_RATIO,
            None => self
                .device_memory_gb
                .map_or(false, |gb| gb < LOW_DEVICE_MEMORY_GB),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap(used: u64, limit: u64) -> HeapUsage {
        HeapUsage {
            used_bytes: used,
            limit_bytes: limit,
        }
    }

    #[test]
    fn load_average_covers_last_ten() {
        let mut monitor = PerformanceMonitor::new(None);
        assert_eq!(monitor.sample().average_recent_load_ms, None);
        monitor.record_load(10_000);
        for _ in 0..10 {
            monitor.record_load(1_000);
        }
        assert_eq!(monitor.sample().average_recent_load_ms, Some(1_000.0));
    }

    #[test]
    fn stall_history_is_bounded() {
        let mut monitor = PerformanceMonitor::new(None);
        for ts in 0..25 {
            monitor.record_stall(ts);
        }
        assert_eq!(monitor.sample().stall_count, 20);
    }

    #[test]
    fn heap_ratio_drives_pressure() {
        let mut monitor = PerformanceMonitor::new(Some(1.0));
        monitor.record_memory(heap(50, 100), 0);
        assert!(!monitor.sample().memory_pressure_high);
        monitor.record_memory(heap(81, 100), 1);
        assert!(monitor.sample().memory_pressure_high);
    }

    #[test]
    fn device_memory_is_fallback_signal() {
        assert!(PerformanceMonitor::new(Some(1.0)).sample().memory_pressure_high);
        assert!(!PerformanceMonitor::new(Some(4.0)).sample().memory_pressure_high);
        assert!(!PerformanceMonitor::new(None).sample().memory_pressure_high);
    }
}
