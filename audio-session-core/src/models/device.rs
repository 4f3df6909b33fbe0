use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portable classification of an audio endpoint.
///
/// Backends map their native device-type enumeration into this closed
/// set. Native types with no portable equivalent become `Other`; the
/// native string is preserved in [`AudioDevice::native_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    BuiltInMic,
    BuiltInSpeaker,
    WiredHeadset,
    /// Bluetooth voice link (SCO/HFP): bidirectional, voice quality.
    BluetoothSco,
    /// Bluetooth media output (A2DP): one-way, high fidelity.
    BluetoothA2dp,
    Usb,
    Other,
}

impl DeviceKind {
    pub fn is_bluetooth(self) -> bool {
        matches!(self, Self::BluetoothSco | Self::BluetoothA2dp)
    }
}

/// An audio endpoint at a moment in time.
///
/// Immutable snapshot value, owned by the [`RouteSnapshot`] that contains
/// it. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Opaque platform endpoint id.
    pub id: String,
    pub kind: DeviceKind,
    pub display_name: String,
    /// Hardware address, when the platform exposes one (Bluetooth MAC).
    pub address: Option<String>,
    /// The platform's own type string, kept for diagnostics when `kind`
    /// is `Other`.
    pub native_kind: Option<String>,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, kind: DeviceKind, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            display_name: display_name.into(),
            address: None,
            native_kind: None,
        }
    }
}

/// The active audio route: current inputs, outputs, and hands-free state.
///
/// Produced fresh on every query or route-change event. Consumers detect
/// transitions by comparing successive snapshots with [`same_route`];
/// `captured_at` is excluded from that comparison.
///
/// [`same_route`]: RouteSnapshot::same_route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub inputs: Vec<AudioDevice>,
    pub outputs: Vec<AudioDevice>,
    /// Whether the Bluetooth voice link (SCO) is currently engaged.
    /// Independent of a media-only (A2DP) output being connected.
    pub hands_free_link_active: bool,
    /// Whether a hands-free capable device is present at all.
    pub hands_free_link_available: bool,
    pub captured_at: DateTime<Utc>,
}

impl RouteSnapshot {
    /// Build a freshly-stamped snapshot from device lists.
    ///
    /// `hands_free_link_available` is derived from the lists; the voice
    /// link can only be active while a hands-free device is present.
    pub fn new(
        inputs: Vec<AudioDevice>,
        outputs: Vec<AudioDevice>,
        hands_free_link_active: bool,
    ) -> Self {
        let hands_free_link_available = inputs
            .iter()
            .chain(outputs.iter())
            .any(|d| d.kind == DeviceKind::BluetoothSco);
        Self {
            inputs,
            outputs,
            hands_free_link_active: hands_free_link_active && hands_free_link_available,
            hands_free_link_available,
            captured_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            hands_free_link_active: false,
            hands_free_link_available: false,
            captured_at: Utc::now(),
        }
    }

    /// Value comparison ignoring the capture timestamp.
    pub fn same_route(&self, other: &Self) -> bool {
        self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.hands_free_link_active == other.hands_free_link_active
            && self.hands_free_link_available == other.hands_free_link_available
    }

    pub fn has_output(&self, kind: DeviceKind) -> bool {
        self.outputs.iter().any(|d| d.kind == kind)
    }

    pub fn has_input(&self, kind: DeviceKind) -> bool {
        self.inputs.iter().any(|d| d.kind == kind)
    }
}
