//! Port discovery.
//!
//! Candidates whose OS description mentions a known USB-UART bridge or the
//! board itself are preferred. When nothing matches, a static list for the
//! host platform is used instead.

use crate::transport::PortCandidate;

/// Lower-case substrings identifying the device's USB bridge.
pub const DEVICE_KEYWORDS: &[&str] = &[
    "esp32",
    "cp210",
    "ch340",
    "ftdi",
    "usb-serial",
    "silicon labs",
];

/// Short platform tag reported by `/serial/status`.
pub fn platform_tag() -> &'static str {
    std::env::consts::OS
}

/// Static fallback ports for the given platform tag.
pub fn fallback_ports(platform: &str) -> &'static [&'static str] {
    match platform {
        "linux" => &["/dev/ttyUSB0", "/dev/ttyUSB1", "/dev/ttyACM0", "/dev/ttyACM1"],
        "windows" => &["COM3", "COM4", "COM5", "COM6"],
        "macos" => &["/dev/cu.usbserial-0001", "/dev/cu.SLAB_USBtoUART"],
        _ => &[],
    }
}

/// `true` if the candidate's name or description mentions a known keyword.
pub fn matches_device(candidate: &PortCandidate) -> bool {
    let haystack = format!("{} {}", candidate.name, candidate.description).to_lowercase();
    DEVICE_KEYWORDS.iter().any(|k| haystack.contains(k))
}

/// Pick the port to connect to.
///
/// Returns the first keyword match among `candidates`, else the first
/// platform fallback, else `None`.
pub fn select_port(candidates: &[PortCandidate], platform: &str) -> Option<String> {
    if let Some(found) = candidates.iter().find(|c| matches_device(c)) {
        return Some(found.name.clone());
    }
    fallback_ports(platform).first().map(|p| p.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, description: &str) -> PortCandidate {
        PortCandidate {
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        assert!(matches_device(&candidate(
            "/dev/ttyUSB3",
            "CP2102 USB to UART Bridge Controller Silicon Labs"
        )));
        assert!(matches_device(&candidate("COM7", "USB-SERIAL CH340")));
        assert!(!matches_device(&candidate("/dev/ttyS0", "PCI serial port")));
    }

    #[test]
    fn first_matching_candidate_wins() {
        let candidates = vec![
            candidate("/dev/ttyS0", ""),
            candidate("/dev/ttyUSB2", "FTDI FT232R"),
            candidate("/dev/ttyUSB3", "CP2102"),
        ];
        assert_eq!(
            select_port(&candidates, "linux").as_deref(),
            Some("/dev/ttyUSB2")
        );
    }

    #[test]
    fn falls_back_to_platform_list() {
        let candidates = vec![candidate("/dev/ttyS0", "")];
        assert_eq!(
            select_port(&candidates, "linux").as_deref(),
            Some("/dev/ttyUSB0")
        );
        assert_eq!(select_port(&[], "windows").as_deref(), Some("COM3"));
        assert_eq!(select_port(&[], "plan9"), None);
    }
}
