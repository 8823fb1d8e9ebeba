//! macOS idle sampling via `ioreg -c IOHIDSystem`'s `HIDIdleTime` field
//! (nanoseconds since the last HID event), mirroring the original agent
//! exactly. CPU and memory sampling have no `/proc`-equivalent on macOS in
//! this agent, so both are reported absent.

use std::process::Command;

use super::{Probe, Sample};

pub struct MacosProbe;

impl Probe for MacosProbe {
    fn sample(&self) -> Sample {
        Sample {
            idle_seconds: idle_seconds().unwrap_or(0),
            cpu_usage: None,
            memory_usage: None,
        }
    }
}

fn idle_seconds() -> Option<u64> {
    let output = Command::new("ioreg").args(["-c", "IOHIDSystem"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;

    for line in text.lines() {
        if let Some(idx) = line.find("HIDIdleTime") {
            let rest = &line[idx..];
            let ns: u64 = rest.split('=').nth(1)?.trim().parse().ok()?;
            return Some(ns / 1_000_000_000);
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_hid_idle_time_line() {
        let line = r#"    "HIDIdleTime" = 123456789000"#;
        let idx = line.find("HIDIdleTime").unwrap();
        let rest = &line[idx..];
        let ns: u64 = rest.split('=').nth(1).unwrap().trim().parse().unwrap();
        assert_eq!(ns / 1_000_000_000, 123);
    }
}
