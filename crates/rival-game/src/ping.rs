// ping.rs -- round-trip time measurement
//
// Periodic game-stat pings, matched to their pongs through an
// insertion-ordered outstanding list with TTL eviction. The pong packet
// carries no correlation id, so the oldest live probe wins. Jitter is the
// mean absolute deviation of the sample window from its minimum.

use std::collections::VecDeque;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingStats {
    pub min: i64,
    pub avg: i64,
    pub max: i64,
    pub samples: usize,
}

#[derive(Debug)]
pub struct PingMeter {
    samples: VecDeque<i64>,
    max_samples: usize,
    timeout_ms: i64,
    outstanding: VecDeque<(u64, i64)>,
}

impl PingMeter {
    pub fn new(max_samples: usize, timeout_ms: i64) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            timeout_ms,
            outstanding: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.outstanding.clear();
    }

    fn evict_expired(&mut self, now: i64) {
        while let Some(&(_, sent)) = self.outstanding.front() {
            if now - sent > self.timeout_ms {
                self.outstanding.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record an outbound probe; returns its correlation id.
    pub fn probe_sent(&mut self, now: i64) -> u64 {
        self.evict_expired(now);
        let id: u64 = rand::thread_rng().gen();
        self.outstanding.push_back((id, now));
        id
    }

    /// Match an inbound pong to the oldest live probe. Returns the sample,
    /// or None for a pong with no live probe (late beyond timeout).
    pub fn pong_received(&mut self, now: i64) -> Option<i64> {
        self.evict_expired(now);
        let (_, sent) = self.outstanding.pop_front()?;
        let rtt = (now - sent).max(0);
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt);
        Some(rtt)
    }

    pub fn ping(&self) -> i64 {
        self.stats().avg
    }

    /// Mean absolute deviation from the window minimum. Zero until there
    /// are at least two samples.
    pub fn jitter(&self) -> i64 {
        if self.samples.len() < 2 {
            return 0;
        }
        let min = self.samples.iter().copied().min().unwrap_or(0);
        let dev: i64 = self.samples.iter().map(|s| s - min).sum();
        dev / self.samples.len() as i64
    }

    pub fn stats(&self) -> PingStats {
        if self.samples.is_empty() {
            return PingStats { min: 0, avg: 0, max: 0, samples: 0 };
        }
        let min = self.samples.iter().copied().min().unwrap();
        let max = self.samples.iter().copied().max().unwrap();
        let avg = self.samples.iter().sum::<i64>() / self.samples.len() as i64;
        PingStats { min, avg, max, samples: self.samples.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_pong_sample() {
        let mut meter = PingMeter::new(10, 2000);
        meter.probe_sent(0);
        assert_eq!(meter.pong_received(80), Some(80));
        assert_eq!(meter.ping(), 80);
    }

    #[test]
    fn test_no_probe_no_sample() {
        let mut meter = PingMeter::new(10, 2000);
        assert_eq!(meter.pong_received(100), None);
        assert_eq!(meter.stats().samples, 0);
    }

    #[test]
    fn test_timed_out_probe_evicted() {
        let mut meter = PingMeter::new(10, 2000);
        meter.probe_sent(0);
        assert_eq!(meter.pong_received(5000), None);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut meter = PingMeter::new(3, 10_000);
        for i in 0..6 {
            meter.probe_sent(i * 100);
            meter.pong_received(i * 100 + 50 + i);
        }
        assert_eq!(meter.stats().samples, 3);
    }

    #[test]
    fn test_stats_and_jitter() {
        let mut meter = PingMeter::new(10, 10_000);
        for rtt in [80i64, 90, 100] {
            let t = rtt * 10;
            meter.probe_sent(t);
            meter.pong_received(t + rtt);
        }
        let stats = meter.stats();
        assert_eq!(stats.min, 80);
        assert_eq!(stats.max, 100);
        assert_eq!(stats.avg, 90);
        // deviations from min: 0 + 10 + 20 over 3 samples
        assert_eq!(meter.jitter(), 10);
    }
}
