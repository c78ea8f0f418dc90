/// Smoothing factor for the CPU-usage moving average.
pub const CPU_SMOOTHING: f64 = 0.1;

/// Wall-clock stopwatch with millisecond readout.
///
/// Uses `Instant` natively and `Date.now()` in the browser, where `Instant`
/// is unavailable.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    #[cfg(not(target_arch = "wasm32"))]
    start: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    start: f64,
}

impl Stopwatch {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn start() -> Self {
        Stopwatch {
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn start() -> Self {
        Stopwatch {
            start: js_sys::Date::now(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    #[cfg(target_arch = "wasm32")]
    pub fn elapsed_ms(&self) -> f64 {
        (js_sys::Date::now() - self.start).max(0.0)
    }
}

/// Exponential moving average of execution time, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuMeter {
    average: f64,
}

impl CpuMeter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&mut self, elapsed_ms: f64) {
        self.average = CPU_SMOOTHING * elapsed_ms + (1.0 - CPU_SMOOTHING) * self.average;
    }

    /// Record the time since `watch` was started.
    #[inline]
    pub fn stop(&mut self, watch: Stopwatch) {
        self.record(watch.elapsed_ms());
    }

    pub fn average_ms(&self) -> f64 {
        self.average
    }

    pub fn reset(&mut self) {
        self.average = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema() {
        let mut meter = CpuMeter::new();
        meter.record(10.0);
        assert!((meter.average_ms() - 1.0).abs() < 1e-12);
        meter.record(10.0);
        assert!((meter.average_ms() - 1.9).abs() < 1e-12);
        meter.reset();
        assert_eq!(meter.average_ms(), 0.0);
    }

    #[test]
    fn test_stopwatch_non_negative() {
        let watch = Stopwatch::start();
        assert!(watch.elapsed_ms() >= 0.0);
    }
}
