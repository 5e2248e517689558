//! Platform detection for live camera sources

use std::env;

/// Platform information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformInfo {
    /// macOS (Darwin)
    MacOS,

    /// Raspberry Pi (detected via /proc/device-tree)
    RaspberryPi,

    /// Generic Linux
    Linux,
}

/// Detects current platform
pub fn detect_platform() -> PlatformInfo {
    match env::consts::OS {
        "macos" => PlatformInfo::MacOS,
        "linux" if is_raspberry_pi() => PlatformInfo::RaspberryPi,
        _ => PlatformInfo::Linux,
    }
}

fn is_raspberry_pi() -> bool {
    std::path::Path::new("/proc/device-tree/model").exists()
        || std::path::Path::new("/sys/firmware/devicetree/base/model").exists()
}

/// Capture device used when the configuration names none
pub fn default_device(platform: PlatformInfo) -> &'static str {
    match platform {
        PlatformInfo::MacOS => "0",
        PlatformInfo::RaspberryPi => "/base/axi/pcie@1000120000/rp1/i2c@88000/imx219@10",
        PlatformInfo::Linux => "/dev/video0",
    }
}

/// GStreamer source element for a device on this platform
pub fn source_element(platform: PlatformInfo, device: &str) -> String {
    match platform {
        PlatformInfo::MacOS => format!("avfvideosrc device-index={}", device),
        PlatformInfo::RaspberryPi => format!("libcamerasrc camera-name=\"{}\"", device),
        PlatformInfo::Linux => format!("v4l2src device={}", device),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_platform() {
        let platform = detect_platform();
        assert!(matches!(
            platform,
            PlatformInfo::MacOS | PlatformInfo::Linux | PlatformInfo::RaspberryPi
        ));
    }

    #[test]
    fn test_source_elements() {
        assert_eq!(
            source_element(PlatformInfo::Linux, default_device(PlatformInfo::Linux)),
            "v4l2src device=/dev/video0"
        );
        assert_eq!(
            source_element(PlatformInfo::MacOS, "1"),
            "avfvideosrc device-index=1"
        );
        assert!(source_element(PlatformInfo::RaspberryPi, "imx219").starts_with("libcamerasrc"));
    }
}
