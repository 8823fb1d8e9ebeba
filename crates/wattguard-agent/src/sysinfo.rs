//! System identity used at registration: hostname, OS name/version, MAC
//! fingerprint, and a best-effort primary IP.
//!
//! There is no cross-platform stdlib or well-established crate in this
//! stack for MAC address or primary-IP discovery, so both fall back to the
//! same manual-read-per-platform approach the original agent uses for CPU
//! and memory sampling.

use std::net::UdpSocket;

pub fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_owned())
}

#[must_use]
pub fn os_type() -> &'static str {
    std::env::consts::OS
}

pub fn os_version() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/version").ok().map(|s| s.trim().to_owned())
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_owned())
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "ver"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_owned())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// Best-effort primary outbound IP, found by opening a UDP socket toward a
/// well-known public address and reading the local endpoint it bound to. No
/// packet is ever sent (UDP `connect` just selects a route).
pub fn primary_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

/// First non-loopback MAC address found under `/sys/class/net` on Linux.
/// macOS and Windows fall back to parsing the relevant system tool's output.
pub fn mac_address() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let entries = std::fs::read_dir("/sys/class/net").ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name == "lo" {
                continue;
            }
            let addr_path = entry.path().join("address");
            if let Ok(addr) = std::fs::read_to_string(addr_path) {
                let addr = addr.trim();
                if !addr.is_empty() && addr != "00:00:00:00:00:00" {
                    return Some(addr.to_owned());
                }
            }
        }
        None
    }
    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("ifconfig").arg("en0").output().ok()?;
        let text = String::from_utf8(output.stdout).ok()?;
        text.lines()
            .find_map(|line| line.trim().strip_prefix("ether "))
            .map(str::to_owned)
    }
    #[cfg(target_os = "windows")]
    {
        let output = std::process::Command::new("getmac").args(["/fo", "csv", "/nh"]).output().ok()?;
        let text = String::from_utf8(output.stdout).ok()?;
        text.lines().next()?.split(',').next().map(|s| s.trim_matches('"').to_owned())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}
