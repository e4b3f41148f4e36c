//! Activity Catalog
//!
//! Decodes the hub's engine configuration into the ordered list of selectable
//! activities, each carrying the button functions it supports.
//!
//! The hub declares buttons as a tree of control groups, each holding named
//! functions with an opaque `action` payload. Only a fixed set of
//! (group, function) pairs is recognised; see [`ButtonFunction::from_control`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discovery::DiscoveryError;
use crate::protocol::lenient_i64;

/// Prefix applied to activity labels in development mode
pub const DEV_LABEL_PREFIX: &str = "DEV";

/// Hub-assigned activity identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub i64);

impl ActivityId {
    /// Reserved "everything off" activity
    pub const OFF: Self = Self(-1);

    /// Whether this is the reserved off id
    pub fn is_off(self) -> bool {
        self == Self::OFF
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical button functions the accessory can trigger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonFunction {
    /// Volume group
    Mute,
    /// Volume group
    VolumeDown,
    /// Volume group
    VolumeUp,
    /// Basic navigation group
    DirectionDown,
    /// Basic navigation group
    DirectionLeft,
    /// Basic navigation group
    DirectionRight,
    /// Basic navigation group
    DirectionUp,
    /// Basic navigation group
    Select,
    /// Basic transport group
    Stop,
    /// Basic transport group
    Play,
    /// Basic transport group
    Rewind,
    /// Basic transport group
    Pause,
    /// Basic transport group
    FastForward,
    /// DVD navigation group (declared as `Return` or `Back`)
    Return,
    /// DVD navigation group
    Menu,
    /// Extended transport group
    SkipBackward,
    /// Extended transport group
    SkipForward,
    /// Game controls group
    Home,
}

impl ButtonFunction {
    /// Map a declared (control group, function) pair onto a canonical function
    pub fn from_control(group: &str, function: &str) -> Option<Self> {
        let mapped = match (group, function) {
            ("Volume", "Mute") => Self::Mute,
            ("Volume", "VolumeDown") => Self::VolumeDown,
            ("Volume", "VolumeUp") => Self::VolumeUp,
            ("NavigationBasic", "DirectionDown") => Self::DirectionDown,
            ("NavigationBasic", "DirectionLeft") => Self::DirectionLeft,
            ("NavigationBasic", "DirectionRight") => Self::DirectionRight,
            ("NavigationBasic", "DirectionUp") => Self::DirectionUp,
            ("NavigationBasic", "Select") => Self::Select,
            ("TransportBasic", "Stop") => Self::Stop,
            ("TransportBasic", "Play") => Self::Play,
            ("TransportBasic", "Rewind") => Self::Rewind,
            ("TransportBasic", "Pause") => Self::Pause,
            ("TransportBasic", "FastForward") => Self::FastForward,
            ("NavigationDVD", "Return" | "Back") => Self::Return,
            ("NavigationDVD", "Menu") => Self::Menu,
            ("TransportExtended", "SkipBackward") => Self::SkipBackward,
            ("TransportExtended", "SkipForward") => Self::SkipForward,
            ("GameType3", "Home") => Self::Home,
            _ => return None,
        };
        Some(mapped)
    }
}

/// Button function → opaque hub action payload
pub type ButtonMap = HashMap<ButtonFunction, Value>;

/// A selectable hub activity
#[derive(Clone, Debug, PartialEq)]
pub struct Activity {
    /// Hub-assigned id (never [`ActivityId::OFF`])
    pub id: ActivityId,
    /// Display label, dev-mode prefixed when configured
    pub label: String,
    /// Supported buttons; absent entries are unsupported
    pub buttons: ButtonMap,
}

impl Activity {
    /// Action payload for a button, if this activity supports it
    pub fn action(&self, function: ButtonFunction) -> Option<&Value> {
        self.buttons.get(&function)
    }
}

/// How the main activity was chosen
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MainActivitySelection {
    /// The configured label matched exactly one activity
    Configured,
    /// No unique match; the first activity was used instead
    Fallback {
        /// Label that was asked for, if any
        requested: Option<String>,
    },
}

/// Options that shape catalog decoding
#[derive(Clone, Debug, Default)]
pub struct CatalogOptions {
    /// Prefix labels with [`DEV_LABEL_PREFIX`]
    pub dev_mode: bool,
    /// Label (after prefixing) of the activity to treat as main
    pub main_activity: Option<String>,
}

/// Ordered list of selectable activities plus the chosen main activity
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    activities: Vec<Activity>,
    main: ActivityId,
}

impl Catalog {
    /// Decode the `data` block of an engine config reply
    pub fn from_config(
        config: &Value,
        options: &CatalogOptions,
    ) -> Result<(Self, MainActivitySelection), DiscoveryError> {
        let entries = config
            .get("activity")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                DiscoveryError::MalformedConfig("config has no activity list".to_string())
            })?;

        let activities: Vec<Activity> = entries
            .iter()
            .filter_map(|entry| decode_activity(entry, options.dev_mode))
            .collect();

        Self::from_activities(activities, options.main_activity.as_deref())
    }

    /// Build a catalog from already decoded activities
    pub fn from_activities(
        activities: Vec<Activity>,
        main_label: Option<&str>,
    ) -> Result<(Self, MainActivitySelection), DiscoveryError> {
        let activities: Vec<Activity> = activities
            .into_iter()
            .filter(|activity| !activity.id.is_off())
            .collect();

        let first = activities.first().ok_or(DiscoveryError::EmptyCatalog)?.id;

        let matches: Vec<ActivityId> = match main_label {
            Some(label) => activities
                .iter()
                .filter(|activity| activity.label == label)
                .map(|activity| activity.id)
                .collect(),
            None => Vec::new(),
        };

        let (main, selection) = match matches.as_slice() {
            [only] => (*only, MainActivitySelection::Configured),
            _ => {
                tracing::warn!(
                    requested = ?main_label,
                    matches = matches.len(),
                    fallback = %first,
                    "No unique main activity matches configuration, defaulting to first one"
                );
                (
                    first,
                    MainActivitySelection::Fallback {
                        requested: main_label.map(str::to_string),
                    },
                )
            }
        };

        Ok((Self { activities, main }, selection))
    }

    /// Selectable activities in hub order
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    /// Look up an activity by id
    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.iter().find(|activity| activity.id == id)
    }

    /// Whether `id` is a selectable activity
    pub fn contains(&self, id: ActivityId) -> bool {
        self.get(id).is_some()
    }

    /// Id of the main activity
    pub fn main_activity_id(&self) -> ActivityId {
        self.main
    }

    /// The main activity
    pub fn main_activity(&self) -> Option<&Activity> {
        self.get(self.main)
    }
}

fn decode_activity(entry: &Value, dev_mode: bool) -> Option<Activity> {
    let Some(id) = entry.get("id").and_then(lenient_i64).map(ActivityId) else {
        tracing::warn!(entry = %entry, "Skipping activity without a usable id");
        return None;
    };
    if id.is_off() {
        return None;
    }

    let raw_label = entry.get("label").and_then(Value::as_str).unwrap_or_default();
    let label = if dev_mode {
        format!("{DEV_LABEL_PREFIX}{raw_label}")
    } else {
        raw_label.to_string()
    };

    let mut buttons = ButtonMap::new();
    let groups = entry
        .get("controlGroup")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for group in groups {
        let group_name = group.get("name").and_then(Value::as_str).unwrap_or_default();
        let functions = group
            .get("function")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for function in functions {
            let function_name = function
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let (Some(mapped), Some(action)) = (
                ButtonFunction::from_control(group_name, function_name),
                function.get("action"),
            ) else {
                continue;
            };
            tracing::debug!(activity = %label, button = ?mapped, "Mapping button");
            buttons.insert(mapped, action.clone());
        }
    }

    Some(Activity { id, label, buttons })
}
