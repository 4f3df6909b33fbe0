//! Windows audio device enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list capture (microphone) and render
//! (speaker/headphone) endpoints and classify them into the portable
//! `DeviceKind` set. Bluetooth endpoints enumerate under `BTHENUM`; the
//! HFP (voice link) flavor is told apart from A2DP by the endpoint name
//! Windows assigns to hands-free render endpoints.

use windows::core::*;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::StructuredStorage::PropVariantClear;
use windows::Win32::System::Com::*;
use windows::Win32::System::Variant::*;

use audio_session_core::models::device::{AudioDevice, DeviceKind, RouteSnapshot};
use audio_session_core::models::error::AudioError;
use audio_session_core::route::classify;

/// Audio device catalog over the Windows MMDevice API.
pub struct DeviceCatalog {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceCatalog {
    /// Create a new catalog.
    ///
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|e| {
                    AudioError::DeviceUnavailable(format!("failed to create enumerator: {}", e))
                })?;
            Ok(Self { enumerator })
        }
    }

    /// List active capture (microphone) endpoints.
    pub fn list_inputs(&self) -> Result<Vec<AudioDevice>, AudioError> {
        self.list_endpoints(eCapture)
    }

    /// List active render (output) endpoints.
    pub fn list_outputs(&self) -> Result<Vec<AudioDevice>, AudioError> {
        self.list_endpoints(eRender)
    }

    /// Build a full route snapshot from the current endpoint lists.
    pub fn snapshot(&self, hands_free_engaged: bool) -> Result<RouteSnapshot, AudioError> {
        let inputs = self.list_inputs()?;
        let outputs = self.list_outputs()?;
        Ok(RouteSnapshot::new(inputs, outputs, hands_free_engaged))
    }

    /// Default capture endpoint id.
    pub fn default_input_id(&self) -> Result<String, AudioError> {
        self.default_endpoint_id(eCapture)
    }

    /// Default render endpoint id.
    pub fn default_output_id(&self) -> Result<String, AudioError> {
        self.default_endpoint_id(eRender)
    }

    /// First HFP capture endpoint, if any hands-free link is up.
    pub fn hands_free_input(&self) -> Result<Option<AudioDevice>, AudioError> {
        Ok(self
            .list_inputs()?
            .into_iter()
            .find(|d| d.kind == DeviceKind::BluetoothSco))
    }

    /// First non-Bluetooth capture endpoint (the "phone mic" path).
    pub fn built_in_input(&self) -> Result<Option<AudioDevice>, AudioError> {
        Ok(self
            .list_inputs()?
            .into_iter()
            .find(|d| !d.kind.is_bluetooth()))
    }

    fn default_endpoint_id(&self, flow: EDataFlow) -> Result<String, AudioError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(flow, eConsole)
                .map_err(|_| AudioError::DeviceUnavailable("no default endpoint".into()))?;
            let id = device
                .GetId()
                .map_err(|e| AudioError::DeviceUnavailable(format!("GetId failed: {}", e)))?;
            Ok(id.to_string().unwrap_or_default())
        }
    }

    fn list_endpoints(&self, flow: EDataFlow) -> Result<Vec<AudioDevice>, AudioError> {
        let is_input = flow == eCapture;
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| {
                    AudioError::DeviceUnavailable(format!("EnumAudioEndpoints failed: {}", e))
                })?;

            let count = collection
                .GetCount()
                .map_err(|e| AudioError::DeviceUnavailable(format!("GetCount failed: {}", e)))?;

            let mut devices = Vec::new();
            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(_) => continue,
                };
                let id = match device.GetId() {
                    Ok(id) => id.to_string().unwrap_or_default(),
                    Err(_) => continue,
                };

                let name =
                    read_property(&device, &PKEY_Device_FriendlyName).unwrap_or_else(|| format!("Device {}", i));
                let enumerator_name = read_property(&device, &PKEY_Device_EnumeratorName);

                let kind = classify_endpoint(&name, enumerator_name.as_deref(), is_input);

                devices.push(AudioDevice {
                    id,
                    kind,
                    display_name: name,
                    address: None,
                    native_kind: enumerator_name,
                });
            }
            Ok(devices)
        }
    }
}

/// Map an endpoint to the portable kind set.
///
/// The enumerator name is authoritative for the bus (BTHENUM, USB);
/// within Bluetooth, inputs are always the voice link and render
/// endpoints are A2DP unless Windows named them as hands-free.
fn classify_endpoint(name: &str, enumerator_name: Option<&str>, is_input: bool) -> DeviceKind {
    match enumerator_name {
        Some(bus) if bus.contains("BTHENUM") || bus.contains("BTHLEENUM") => {
            if is_input || classify::is_hands_free_name(name) {
                DeviceKind::BluetoothSco
            } else {
                DeviceKind::BluetoothA2dp
            }
        }
        Some(bus) if bus.contains("USB") => DeviceKind::Usb,
        _ => {
            // The name heuristics are the fallback for buses the
            // enumerator string does not identify. Unrecognized
            // endpoints stay `Other`, with the bus string preserved by
            // the caller.
            let lower = name.to_lowercase();
            match classify::classify_name(name, is_input) {
                DeviceKind::Other if is_input && lower.contains("microphone") => {
                    DeviceKind::BuiltInMic
                }
                DeviceKind::Other if !is_input && lower.contains("speaker") => {
                    DeviceKind::BuiltInSpeaker
                }
                kind => kind,
            }
        }
    }
}

/// Read a string property from a device's property store.
fn read_property(device: &IMMDevice, key: &PROPERTYKEY) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;

        let mut prop = std::mem::zeroed::<PROPVARIANT>();
        store.GetValue(key, &mut prop).ok()?;

        let value = if prop.Anonymous.Anonymous.vt == VT_LPWSTR {
            let pwsz = prop.Anonymous.Anonymous.Anonymous.pwszVal;
            if !pwsz.is_null() {
                let len = (0..).take_while(|&i| *pwsz.offset(i) != 0).count();
                Some(String::from_utf16_lossy(std::slice::from_raw_parts(
                    pwsz, len,
                )))
            } else {
                None
            }
        } else {
            None
        };

        PropVariantClear(&mut prop).ok();
        value
    }
}
