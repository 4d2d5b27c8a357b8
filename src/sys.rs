//! Host telemetry samples: CPU tick counters, memory, load average.
//!
//! CPU ticks come straight from `/proc/stat` because the exposition reports
//! raw monotonic tick counters, not derived percentages. Memory and load
//! average go through sysinfo.

use std::io;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("failed to read /proc/stat: {0}")]
    ProcStat(#[from] io::Error),

    #[error("malformed /proc/stat cpu line: '{0}'")]
    CpuLine(String),
}

/// Aggregate CPU times in ticks since boot, from the `cpu` summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuSample {
    pub user: u64,
    pub system: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemSample {
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadAvgSample {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
    pub timestamp_ms: i64,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `cpu  user nice system idle iowait irq softirq ...`
fn parse_cpu_line(line: &str, timestamp_ms: i64) -> Result<CpuSample, SampleError> {
    let malformed = || SampleError::CpuLine(line.to_string());

    let mut fields = line.split_whitespace();
    if fields.next() != Some("cpu") {
        return Err(malformed());
    }

    let mut ticks = [0u64; 7];
    for slot in &mut ticks {
        *slot = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(malformed)?;
    }

    Ok(CpuSample {
        user: ticks[0],
        system: ticks[2],
        iowait: ticks[4],
        irq: ticks[5],
        softirq: ticks[6],
        timestamp_ms,
    })
}

pub fn cpu_sample() -> Result<CpuSample, SampleError> {
    let stat = std::fs::read_to_string("/proc/stat")?;
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| SampleError::CpuLine(String::new()))?;
    parse_cpu_line(line, now_ms())
}

pub fn mem_sample() -> MemSample {
    let mut system = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
    );
    system.refresh_memory();
    MemSample {
        used_bytes: system.used_memory(),
        free_bytes: system.free_memory(),
        timestamp_ms: now_ms(),
    }
}

pub fn load_avg_sample() -> LoadAvgSample {
    let load = System::load_average();
    LoadAvgSample {
        one: load.one,
        five: load.five,
        fifteen: load.fifteen,
        timestamp_ms: now_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cpu_line_picks_the_right_columns() {
        let line = "cpu  74608 2520 24433 1117073 6176 4054 0 0 0 0";
        let sample = parse_cpu_line(line, 1000).unwrap();

        assert_eq!(sample.user, 74608);
        assert_eq!(sample.system, 24433);
        assert_eq!(sample.iowait, 6176);
        assert_eq!(sample.irq, 4054);
        assert_eq!(sample.softirq, 0);
        assert_eq!(sample.timestamp_ms, 1000);
    }

    #[test]
    fn parse_cpu_line_rejects_per_core_lines() {
        assert!(parse_cpu_line("cpu0 1 2 3 4 5 6 7", 0).is_err());
    }

    #[test]
    fn parse_cpu_line_rejects_truncated_input() {
        assert!(parse_cpu_line("cpu 1 2 3", 0).is_err());
    }

    #[test]
    fn live_cpu_sample_reads_proc_stat() {
        // /proc/stat exists on any Linux host this daemon targets.
        let sample = cpu_sample().unwrap();
        assert!(sample.timestamp_ms > 0);
    }
}
