//! Metronome: real-time metrics broadcast service.
//!
//! A hub process samples a set of metric plugins on a fixed cadence and
//! streams the aggregate to every connected WebSocket subscriber. The
//! [`client`] module holds the subscriber side.

pub mod client;
pub mod config;
pub mod http;
pub mod hub;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod plugins;
pub mod updater;
pub mod wire;

pub use client::{Client, ClientConfig, ClientEvent};
pub use config::schema::MetronomeConfig;
pub use http::HttpServer;
pub use hub::Hub;
pub use lifecycle::{Service, Shutdown};
pub use plugins::{MetricPlugin, PluginRegistry};
pub use wire::{Frame, Snapshot, Status};
