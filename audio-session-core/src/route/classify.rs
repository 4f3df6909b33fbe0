//! Name-based device classification.
//!
//! Platform APIs that expose a transport type (MMDevice enumerator
//! strings, CoreAudio transport properties) are always preferred; these
//! heuristics are the shared fallback for hosts that only hand out a
//! display name.

use crate::models::device::DeviceKind;

const BLUETOOTH_PATTERNS: &[&str] = &[
    "airpods",
    "bluetooth",
    "bluez",
    "wh-1000xm",
    "quietcomfort",
    "galaxy buds",
    "freebuds",
    "jabra",
    "beats",
    "wireless",
];

const WIRED_HEADSET_PATTERNS: &[&str] = &["headphone", "headset", "earphone", "line out"];

const BUILT_IN_PATTERNS: &[&str] = &["built-in", "builtin", "internal", "macbook"];

/// True when the display name suggests a Bluetooth endpoint.
pub fn is_bluetooth_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    BLUETOOTH_PATTERNS.iter().any(|p| lower.contains(p))
}

/// True when the name indicates the voice-link (SCO/HFP) flavor of a
/// Bluetooth endpoint rather than the media (A2DP) flavor.
pub fn is_hands_free_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("hands-free") || lower.contains("handsfree") || lower.contains("hfp") || lower.contains("sco")
}

/// Classify a device from its display name alone.
///
/// Bluetooth inputs are always the voice link: A2DP has no microphone
/// path, so a Bluetooth device exposing capture must be on HFP.
pub fn classify_name(name: &str, is_input: bool) -> DeviceKind {
    let lower = name.to_lowercase();

    if is_bluetooth_name(&lower) {
        if is_input || is_hands_free_name(&lower) {
            return DeviceKind::BluetoothSco;
        }
        return DeviceKind::BluetoothA2dp;
    }
    if lower.contains("usb") {
        return DeviceKind::Usb;
    }
    if WIRED_HEADSET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return DeviceKind::WiredHeadset;
    }
    if BUILT_IN_PATTERNS.iter().any(|p| lower.contains(p)) {
        return if is_input {
            DeviceKind::BuiltInMic
        } else {
            DeviceKind::BuiltInSpeaker
        };
    }

    DeviceKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bluetooth_output_is_a2dp_unless_hands_free() {
        assert_eq!(
            classify_name("AirPods Pro", false),
            DeviceKind::BluetoothA2dp
        );
        assert_eq!(
            classify_name("Headset (Jabra Evolve2 Hands-Free)", false),
            DeviceKind::BluetoothSco
        );
    }

    #[test]
    fn bluetooth_input_is_always_sco() {
        assert_eq!(classify_name("AirPods Pro", true), DeviceKind::BluetoothSco);
    }

    #[test]
    fn wired_and_built_in() {
        assert_eq!(
            classify_name("External Headphones", false),
            DeviceKind::WiredHeadset
        );
        assert_eq!(
            classify_name("MacBook Pro Microphone", true),
            DeviceKind::BuiltInMic
        );
        assert_eq!(
            classify_name("Built-in Output", false),
            DeviceKind::BuiltInSpeaker
        );
    }

    #[test]
    fn unknown_names_map_to_other() {
        assert_eq!(classify_name("Loopback Cable XZ-9", true), DeviceKind::Other);
    }
}
