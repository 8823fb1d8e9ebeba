//! Linux idle/CPU/memory sampling.
//!
//! Idle time prefers `xprintidle` (desktop sessions with a display); when
//! that's unavailable it falls back to `who -u` — no logged-in session is
//! treated as fully idle, matching the original headless-server heuristic.
//! CPU is a two-sample delta over `/proc/stat`; memory comes from
//! `/proc/meminfo`. Every read degrades to zero/`None` rather than erroring:
//! a dead telemetry field should never stop a heartbeat from being sent.

use std::io::Read;
use std::process::Command;
use std::time::Duration;

use super::{Probe, Sample};

pub struct LinuxProbe {
    has_display: bool,
}

impl LinuxProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            has_display: std::env::var_os("DISPLAY").is_some(),
        }
    }
}

impl Probe for LinuxProbe {
    fn sample(&self) -> Sample {
        Sample {
            idle_seconds: idle_seconds(self.has_display),
            cpu_usage: cpu_percent(),
            memory_usage: memory_percent(),
        }
    }
}

fn idle_seconds(has_display: bool) -> u64 {
    if has_display {
        if let Some(ms) = xprintidle_ms() {
            return ms / 1000;
        }
    }

    if no_one_logged_in() {
        // The original treats a headless, session-less server as fully
        // idle by reporting a large sentinel (999 minutes); we report an
        // idle time well past any realistic shutdown threshold instead.
        return 86_400;
    }

    0
}

fn xprintidle_ms() -> Option<u64> {
    let output = Command::new("xprintidle").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()?.trim().parse().ok()
}

fn no_one_logged_in() -> bool {
    let Ok(output) = Command::new("who").arg("-u").output() else {
        return false;
    };
    output.status.success() && output.stdout.iter().all(u8::is_ascii_whitespace)
}

fn read_proc_stat_sample() -> Option<(u64, u64)> {
    let mut contents = String::new();
    std::fs::File::open("/proc/stat").ok()?.read_to_string(&mut contents).ok()?;
    let first_line = contents.lines().next()?;
    let values: Vec<u64> = first_line
        .split_whitespace()
        .skip(1)
        .filter_map(|v| v.parse().ok())
        .collect();
    let idle = *values.get(3)?;
    let total = values.iter().sum();
    Some((idle, total))
}

fn cpu_percent() -> Option<f64> {
    let (idle1, total1) = read_proc_stat_sample()?;
    std::thread::sleep(Duration::from_millis(500));
    let (idle2, total2) = read_proc_stat_sample()?;

    let total_delta = total2.saturating_sub(total1);
    if total_delta == 0 {
        return Some(0.0);
    }
    let idle_delta = idle2.saturating_sub(idle1);
    #[allow(clippy::cast_precision_loss)]
    let busy_fraction = 1.0 - (idle_delta as f64 / total_delta as f64);
    Some((busy_fraction * 100.0).clamp(0.0, 100.0))
}

fn memory_percent() -> Option<f64> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    let mut total_kb = None;
    let mut available_kb = None;

    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total_kb = parse_meminfo_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available_kb = parse_meminfo_kb(rest);
        }
    }

    let total = total_kb?;
    let available = available_kb?;
    if total == 0 {
        return Some(0.0);
    }
    #[allow(clippy::cast_precision_loss)]
    let used_fraction = 1.0 - (available as f64 / total as f64);
    Some((used_fraction * 100.0).clamp(0.0, 100.0))
}

fn parse_meminfo_kb(field: &str) -> Option<u64> {
    field.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_meminfo_kb_reads_leading_integer() {
        assert_eq!(parse_meminfo_kb("  16384000 kB"), Some(16_384_000));
    }

    #[test]
    fn parse_meminfo_kb_rejects_garbage() {
        assert_eq!(parse_meminfo_kb("not a number"), None);
    }
}
