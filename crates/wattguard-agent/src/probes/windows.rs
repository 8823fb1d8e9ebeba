//! Windows idle sampling via `GetLastInputInfo`/`GetTickCount`, mirroring
//! the original agent's `ctypes.windll.user32.GetLastInputInfo` call.
//!
//! This is the one place in the agent that needs `unsafe`: both functions
//! are plain Win32 calls with no safe wrapper, and `LASTINPUTINFO` must be
//! initialized with its own size before the call per the Win32 contract.

use windows_sys::Win32::System::SystemInformation::GetTickCount;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

use super::{Probe, Sample};

pub struct WindowsProbe;

impl Probe for WindowsProbe {
    fn sample(&self) -> Sample {
        Sample {
            idle_seconds: idle_seconds().unwrap_or(0),
            cpu_usage: None,
            memory_usage: None,
        }
    }
}

fn idle_seconds() -> Option<u64> {
    let mut info = LASTINPUTINFO {
        cbSize: u32::try_from(std::mem::size_of::<LASTINPUTINFO>()).ok()?,
        dwTime: 0,
    };

    // SAFETY: `info` is a valid, correctly-sized `LASTINPUTINFO` the call
    // fills in; `GetTickCount` takes no arguments and cannot fail.
    let ok = unsafe { GetLastInputInfo(&mut info) };
    if ok == 0 {
        return None;
    }
    // SAFETY: no preconditions.
    let now = unsafe { GetTickCount() };

    Some(u64::from(now.wrapping_sub(info.dwTime)) / 1000)
}
