//! Elevated-privilege detection.

/// Whether the process runs with the privileges raw sockets need.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        #[allow(unsafe_code)]
        unsafe {
            libc::geteuid() == 0
        }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Platform-appropriate hint shown when privileges are missing.
pub fn privilege_hint() -> &'static str {
    if cfg!(unix) {
        "Root privileges required. Please run with sudo."
    } else {
        "Administrator privileges required. Please run an elevated shell."
    }
}
