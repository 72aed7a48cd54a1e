// debug_log.rs -- bounded in-memory debug ring
//
// Debug channels append here when enabled; nothing touches disk until the
// operator runs `save`. The ring holds at most 400 entries.

use std::io::Write;
use std::path::{Path, PathBuf};

use rival_common::ring::Ring;

const RING_CAPACITY: usize = 400;

#[derive(Debug)]
pub struct DebugLog {
    ring: Ring<(i64, String)>,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugLog {
    pub fn new() -> Self {
        Self { ring: Ring::new(RING_CAPACITY) }
    }

    pub fn push(&mut self, now: i64, message: String) {
        self.ring.push((now, message));
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Flush the ring to a date-stamped file under `dir`. The ring keeps
    /// its entries; `save` may be called repeatedly.
    pub fn save(&self, dir: &Path, name: Option<&str>) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let stamp = chrono::Local::now().format("%Y-%m-%d-%H%M%S");
        let path = dir.join(format!("{}-{}.log", name.unwrap_or("rival"), stamp));
        let mut file = std::fs::File::create(&path)?;
        for (at, line) in self.ring.iter() {
            writeln!(file, "[{:>10}ms] {}", at, line)?;
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_at_400() {
        let mut log = DebugLog::new();
        for i in 0..500 {
            log.push(i, format!("entry {}", i));
        }
        assert_eq!(log.len(), 400);
    }

    #[test]
    fn test_save_writes_entries() {
        let mut log = DebugLog::new();
        log.push(1, "first".into());
        log.push(2, "second".into());
        let dir = std::env::temp_dir().join(format!("rival-debug-test-{}", std::process::id()));
        let path = log.save(&dir, Some("t")).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("first"));
        assert!(text.contains("second"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
