//! Process health probe reported after each dispatch batch.

use std::fmt;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;

/// Memory pressure snapshot, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryReport {
    pub free: u64,
    pub total: u64,
}

impl MemoryReport {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free)
    }

    pub fn free_pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.free as f64 * 100.0 / self.total as f64
    }
}

impl fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "free={} bytes ({:.1}%) used={} bytes total={} bytes",
            self.free,
            self.free_pct(),
            self.used(),
            self.total
        )
    }
}

#[async_trait]
pub trait ResourceProbe: Send + Sync + 'static {
    async fn sample(&self) -> io::Result<MemoryReport>;
}

/// Reads `MemAvailable` and `MemTotal` from `/proc/meminfo`.
pub struct ProcMeminfo {
    path: PathBuf,
}

impl Default for ProcMeminfo {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/proc/meminfo"),
        }
    }
}

impl ProcMeminfo {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResourceProbe for ProcMeminfo {
    async fn sample(&self) -> io::Result<MemoryReport> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        parse_meminfo(&text).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: MemTotal/MemAvailable missing", self.path.display()),
            )
        })
    }
}

fn parse_meminfo(text: &str) -> Option<MemoryReport> {
    let mut total = None;
    let mut free = None;
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let slot = match parts.next() {
            Some("MemTotal:") => &mut total,
            Some("MemAvailable:") => &mut free,
            _ => continue,
        };
        let kib: u64 = parts.next()?.parse().ok()?;
        *slot = Some(kib * 1024);
    }
    Some(MemoryReport {
        free: free?,
        total: total?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "MemTotal:         512000 kB\n\
                          MemFree:           10000 kB\n\
                          MemAvailable:     128000 kB\n\
                          Buffers:            2048 kB\n";

    #[test]
    fn parses_available_and_total() {
        let report = parse_meminfo(SAMPLE).unwrap();
        assert_eq!(report.total, 512_000 * 1024);
        assert_eq!(report.free, 128_000 * 1024);
        assert_eq!(report.used(), 384_000 * 1024);
        assert!((report.free_pct() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn incomplete_meminfo_is_rejected() {
        assert_eq!(parse_meminfo("MemTotal: 1 kB\n"), None);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let probe = ProcMeminfo::at("/nonexistent/envirovisor/meminfo");
        assert!(probe.sample().await.is_err());
    }
}
