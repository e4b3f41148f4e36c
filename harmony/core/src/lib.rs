//! Harmony Core - Hub Session and Activity-State Engine for harmony-tv
//!
//! This crate keeps one Logitech Harmony hub and one television-style
//! accessory in step: it discovers the hub's activities, keeps a persistent
//! session open, tracks the running activity, dispatches switches and button
//! presses, and polls in the background for changes made elsewhere.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                   Accessory framework / daemon                   │
//! │        get/set hooks (accessory)      StateUpdate channel ▲      │
//! └───────────────────┬───────────────────────────────────────┼──────┘
//!                     │                                       │
//! ┌───────────────────┴───────────────────────────────────────┴──────┐
//! │                          HarmonyPlatform                          │
//! │  ┌──────────┐  ┌────────────┐  ┌──────────────┐  ┌─────────────┐  │
//! │  │ Catalog  │  │  Tracker   │  │  Dispatcher  │  │  Scheduler  │  │
//! │  └──────────┘  └─────┬──────┘  └──────┬───────┘  └─────────────┘  │
//! │                      └───── HubSession ─────┘                     │
//! │                      (transport + state)                          │
//! └────────────────────────────────┬─────────────────────────────────┘
//!                                  │ correlated request / reply
//!                        ┌─────────┴─────────┐
//!                        │   HubTransport    │  WebSocket / in-process
//!                        └───────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use harmony_core::{discover, load_config, HarmonyPlatform};
//!
//! let config = load_config()?;
//! let discovery = discover(&config).await?;
//! let (platform, mut updates) = HarmonyPlatform::launch(&config, discovery).await;
//!
//! while let Some(update) = updates.recv().await {
//!     // forward to the accessory framework
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`protocol`]: Hub request/reply envelopes and command names
//! - [`transport`]: Correlated request channel (WebSocket, in-process)
//! - [`discovery`]: One-shot hub identity and catalog discovery
//! - [`catalog`]: Activities and their button maps
//! - [`session`]: Owned transport plus cached state
//! - [`tracker`]: Current activity with a freshness window
//! - [`dispatcher`]: Activity switches with busy retry, button presses
//! - [`scheduler`]: Pausable background refresh
//! - [`platform`]: Orchestration of the above
//! - [`accessory`]: Layout and characteristic bindings
//! - [`config`]: TOML / environment / CLI configuration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accessory;
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod platform;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod tracker;
pub mod transport;

// Re-exports for convenience
pub use accessory::{
    bind_characteristic, bind_characteristics, AccessoryLayout, Characteristic,
    CharacteristicBinding, CharacteristicValue, RemoteKey, StateUpdate, VolumeDirection,
};
pub use catalog::{
    Activity, ActivityId, ButtonFunction, ButtonMap, Catalog, CatalogOptions,
    MainActivitySelection,
};
pub use discovery::{connect, discover, fetch_identity, Discovery, DiscoveryError, HubIdentity};
pub use dispatcher::{plan_switch, CommandDispatcher, CommandError, SwitchOutcome};
pub use platform::{HarmonyPlatform, PlatformOptions};
pub use protocol::{HubRequest, HubResponse};
pub use scheduler::RefreshScheduler;
pub use session::{CurrentActivity, HubSession, SessionState};
pub use tracker::ActivityTracker;
pub use transport::{HubTransport, InProcessHub, TransportError, WebSocketSession};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, PlatformConfig, PlatformToml,
};
