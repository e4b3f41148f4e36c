//! Accessory Surface
//!
//! What the home-automation framework sees: a television with one input per
//! activity, a speaker, and five characteristics wired to the platform.
//!
//! # Characteristics
//!
//! | Variant      | get                      | set                          |
//! |--------------|--------------------------|------------------------------|
//! | `Power`      | an activity is running   | power off / restart activity |
//! | `Selector`   | running activity id      | switch activity              |
//! | `RemoteKey`  | -                        | press mapped button          |
//! | `Mute`       | always `false`           | toggle mute                  |
//! | `VolumeStep` | -                        | volume up / down             |
//!
//! Each variant is resolved to its closures once, in
//! [`bind_characteristic`]; nothing inspects the characteristic afterwards.

use std::fmt;

use futures::future::{BoxFuture, FutureExt};

use crate::catalog::{ActivityId, ButtonFunction, Catalog};
use crate::dispatcher::{CommandError, SwitchOutcome};
use crate::platform::HarmonyPlatform;
use crate::transport::HubTransport;

/// Manufacturer reported in the accessory information
pub const MANUFACTURER: &str = "Harmony";

/// Characteristics the accessory exposes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Television on/off
    Power,
    /// Selected input (activity id)
    Selector,
    /// Remote control key
    RemoteKey,
    /// Speaker mute
    Mute,
    /// Relative volume step
    VolumeStep,
}

impl Characteristic {
    /// Every characteristic, in binding order
    pub const ALL: [Self; 5] = [
        Self::Power,
        Self::Selector,
        Self::RemoteKey,
        Self::Mute,
        Self::VolumeStep,
    ];
}

/// Value carried by a characteristic
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharacteristicValue {
    /// Boolean characteristic
    Bool(bool),
    /// Integer characteristic
    Int(i64),
}

impl CharacteristicValue {
    /// Read as a boolean; integers are true when non-zero
    pub fn as_bool(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(i) => i != 0,
        }
    }

    /// Read as an integer; booleans map to 0 and 1
    pub fn as_int(self) -> i64 {
        match self {
            Self::Bool(b) => i64::from(b),
            Self::Int(i) => i,
        }
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

/// State change pushed to the framework outside of a direct get
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateUpdate {
    /// Characteristic that changed
    pub characteristic: Characteristic,
    /// New value
    pub value: CharacteristicValue,
}

/// Remote key codes sent by the framework
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteKey {
    /// Code 0
    Rewind,
    /// Code 1
    FastForward,
    /// Code 2
    NextTrack,
    /// Code 3
    PreviousTrack,
    /// Code 4
    ArrowUp,
    /// Code 5
    ArrowDown,
    /// Code 6
    ArrowLeft,
    /// Code 7
    ArrowRight,
    /// Code 8
    Select,
    /// Code 9
    Back,
    /// Code 10
    Exit,
    /// Code 11
    PlayPause,
    /// Code 15
    Information,
}

impl RemoteKey {
    /// Decode a framework key code
    pub fn from_code(code: i64) -> Option<Self> {
        let key = match code {
            0 => Self::Rewind,
            1 => Self::FastForward,
            2 => Self::NextTrack,
            3 => Self::PreviousTrack,
            4 => Self::ArrowUp,
            5 => Self::ArrowDown,
            6 => Self::ArrowLeft,
            7 => Self::ArrowRight,
            8 => Self::Select,
            9 => Self::Back,
            10 => Self::Exit,
            11 => Self::PlayPause,
            15 => Self::Information,
            _ => return None,
        };
        Some(key)
    }

    /// Decode a key by name, as typed on a control line
    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name.to_ascii_lowercase().as_str() {
            "rewind" => Self::Rewind,
            "fastforward" | "fast_forward" | "ff" => Self::FastForward,
            "next" | "nexttrack" | "next_track" => Self::NextTrack,
            "previous" | "prev" | "previoustrack" | "previous_track" => Self::PreviousTrack,
            "up" => Self::ArrowUp,
            "down" => Self::ArrowDown,
            "left" => Self::ArrowLeft,
            "right" => Self::ArrowRight,
            "select" | "ok" => Self::Select,
            "back" => Self::Back,
            "exit" | "home" => Self::Exit,
            "play" | "pause" | "playpause" | "play_pause" => Self::PlayPause,
            "info" | "information" | "menu" => Self::Information,
            _ => return None,
        };
        Some(key)
    }

    /// Hub button the key triggers
    pub fn button_function(self) -> ButtonFunction {
        match self {
            Self::ArrowUp => ButtonFunction::DirectionUp,
            Self::ArrowDown => ButtonFunction::DirectionDown,
            Self::ArrowLeft => ButtonFunction::DirectionLeft,
            Self::ArrowRight => ButtonFunction::DirectionRight,
            Self::Select => ButtonFunction::Select,
            Self::PlayPause => ButtonFunction::Play,
            Self::Information => ButtonFunction::Menu,
            Self::Back => ButtonFunction::Return,
            Self::Exit => ButtonFunction::Home,
            Self::Rewind => ButtonFunction::Rewind,
            Self::FastForward => ButtonFunction::FastForward,
            Self::NextTrack => ButtonFunction::SkipForward,
            Self::PreviousTrack => ButtonFunction::SkipBackward,
        }
    }
}

/// Direction of a relative volume step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeDirection {
    /// Code 0
    Increment,
    /// Code 1
    Decrement,
}

impl VolumeDirection {
    /// Decode a framework volume selector; anything but 1 raises volume
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            Self::Decrement
        } else {
            Self::Increment
        }
    }

    /// Hub button the step triggers
    pub fn button_function(self) -> ButtonFunction {
        match self {
            Self::Increment => ButtonFunction::VolumeUp,
            Self::Decrement => ButtonFunction::VolumeDown,
        }
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Accessory information service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessoryInformation {
    /// Manufacturer
    pub manufacturer: String,
    /// Model (accessory name)
    pub model: String,
    /// Serial number (hub address)
    pub serial_number: String,
}

/// Television service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelevisionService {
    /// Service id, `M{main activity id}`
    pub id: String,
    /// Display name
    pub name: String,
    /// Input shown when nothing runs
    pub default_input: ActivityId,
}

/// One selectable input
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSource {
    /// Input identifier (activity id)
    pub identifier: ActivityId,
    /// Display name (activity label)
    pub name: String,
    /// Service subtype, `{label} Activity`
    pub subtype: String,
}

/// How the speaker accepts volume changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeControl {
    /// Up/down steps only
    Relative,
}

/// Television speaker service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeakerService {
    /// Service id, `V{main activity id}`
    pub id: String,
    /// Service subtype, `{name} Volume`
    pub subtype: String,
    /// Volume control type
    pub volume_control: VolumeControl,
}

/// Services registered for the accessory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessoryLayout {
    /// Information service
    pub information: AccessoryInformation,
    /// Television service
    pub television: TelevisionService,
    /// One input per activity, in catalog order
    pub inputs: Vec<InputSource>,
    /// Speaker linked to the television
    pub speaker: SpeakerService,
}

impl AccessoryLayout {
    /// Lay out the accessory for `catalog`
    pub fn build(name: &str, hub_host: &str, catalog: &Catalog) -> Self {
        let main = catalog.main_activity_id();

        let inputs = catalog
            .activities()
            .iter()
            .map(|activity| InputSource {
                identifier: activity.id,
                name: activity.label.clone(),
                subtype: format!("{} Activity", activity.label),
            })
            .collect();

        Self {
            information: AccessoryInformation {
                manufacturer: MANUFACTURER.to_string(),
                model: name.to_string(),
                serial_number: hub_host.to_string(),
            },
            television: TelevisionService {
                id: format!("M{main}"),
                name: name.to_string(),
                default_input: main,
            },
            inputs,
            speaker: SpeakerService {
                id: format!("V{main}"),
                subtype: format!("{name} Volume"),
                volume_control: VolumeControl::Relative,
            },
        }
    }

    /// Input for an activity id
    pub fn input(&self, id: ActivityId) -> Option<&InputSource> {
        self.inputs.iter().find(|input| input.identifier == id)
    }
}

// =============================================================================
// Bindings
// =============================================================================

/// Reads a characteristic
pub type GetFn = Box<dyn Fn() -> BoxFuture<'static, CharacteristicValue> + Send + Sync>;

/// Writes a characteristic
pub type SetFn =
    Box<dyn Fn(CharacteristicValue) -> BoxFuture<'static, Result<(), CommandError>> + Send + Sync>;

/// Get/set hooks bound to one characteristic
pub struct CharacteristicBinding {
    /// Characteristic the hooks serve
    pub characteristic: Characteristic,
    /// Read hook, if readable
    pub get: Option<GetFn>,
    /// Write hook, if writable
    pub set: Option<SetFn>,
}

impl CharacteristicBinding {
    /// Run the read hook
    pub async fn read(&self) -> Option<CharacteristicValue> {
        match &self.get {
            Some(get) => Some(get().await),
            None => None,
        }
    }

    /// Run the write hook; unwritable characteristics ignore the value
    pub async fn write(&self, value: CharacteristicValue) -> Result<(), CommandError> {
        match &self.set {
            Some(set) => set(value).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for CharacteristicBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacteristicBinding")
            .field("characteristic", &self.characteristic)
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

/// Bind every characteristic to `platform`
pub fn bind_characteristics<T: HubTransport + 'static>(
    platform: &HarmonyPlatform<T>,
) -> Vec<CharacteristicBinding> {
    Characteristic::ALL
        .iter()
        .map(|characteristic| bind_characteristic(*characteristic, platform))
        .collect()
}

/// Bind one characteristic to `platform`
pub fn bind_characteristic<T: HubTransport + 'static>(
    characteristic: Characteristic,
    platform: &HarmonyPlatform<T>,
) -> CharacteristicBinding {
    let (get, set): (Option<GetFn>, Option<SetFn>) = match characteristic {
        Characteristic::Power => {
            let reader = platform.clone();
            let writer = platform.clone();
            (
                Some(Box::new(move || {
                    let platform = reader.clone();
                    async move {
                        CharacteristicValue::Bool(platform.current_activity(false).await.power())
                    }
                    .boxed()
                })),
                Some(Box::new(move |value: CharacteristicValue| {
                    let platform = writer.clone();
                    async move { switch_result(platform.set_power(value.as_bool()).await) }.boxed()
                })),
            )
        }
        Characteristic::Selector => {
            let reader = platform.clone();
            let writer = platform.clone();
            (
                Some(Box::new(move || {
                    let platform = reader.clone();
                    async move {
                        let current = platform.current_activity(false).await;
                        CharacteristicValue::Int(current.selector_value())
                    }
                    .boxed()
                })),
                Some(Box::new(move |value: CharacteristicValue| {
                    let platform = writer.clone();
                    async move {
                        switch_result(platform.select_activity(ActivityId(value.as_int())).await)
                    }
                    .boxed()
                })),
            )
        }
        Characteristic::RemoteKey => {
            let writer = platform.clone();
            (
                None,
                Some(Box::new(move |value: CharacteristicValue| {
                    let platform = writer.clone();
                    async move {
                        let Some(key) = RemoteKey::from_code(value.as_int()) else {
                            tracing::warn!(code = value.as_int(), "Unsupported remote key");
                            return Ok(());
                        };
                        platform.press_remote_key(key).await.map(|_| ())
                    }
                    .boxed()
                })),
            )
        }
        Characteristic::Mute => {
            let writer = platform.clone();
            (
                Some(Box::new(|| async { CharacteristicValue::Bool(false) }.boxed())),
                Some(Box::new(move |_: CharacteristicValue| {
                    let platform = writer.clone();
                    async move { platform.toggle_mute().await.map(|_| ()) }.boxed()
                })),
            )
        }
        Characteristic::VolumeStep => {
            let writer = platform.clone();
            (
                None,
                Some(Box::new(move |value: CharacteristicValue| {
                    let platform = writer.clone();
                    async move {
                        let direction = VolumeDirection::from_code(value.as_int());
                        platform.step_volume(direction).await.map(|_| ())
                    }
                    .boxed()
                })),
            )
        }
    };

    CharacteristicBinding {
        characteristic,
        get,
        set,
    }
}

/// Abandoned switches are logged, not escalated
fn switch_result(outcome: Option<SwitchOutcome>) -> Result<(), CommandError> {
    match outcome {
        Some(SwitchOutcome::Failed(e)) => Err(e),
        _ => Ok(()),
    }
}
