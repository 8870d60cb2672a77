//! # Checkpointer
//!
//! Cluster-resident checkpoint orchestrator. Given a running pod's container, asks
//! the local node agent for a CRIU checkpoint tar, bakes it into a new container
//! image with Kaniko, and returns the image reference. Runs as a DaemonSet pod on
//! every node; a request for a container on another node is forwarded there.
//!
//! ## Architecture
//!
//! ```text
//! HTTP Surface (C9) ──▶ Router (C8) ──locally──▶ Job Manager (C6)
//!                             │                         │
//!                        forwards to peer          Strategy (C5)
//!                                                  ┌─────┴─────┐
//!                                          Stdin variant   Filesystem variant
//!                                                  └─────┬─────┘
//!                              Node-Agent Client (C1) ───┤
//!                              Pod Controller (C2)  ─────┤
//!                              Build Context (C3)   ─────┤
//!                              Dockerfile Renderer (C4) ─┘
//! ```
//!
//! Async runs are tracked in-memory (C6) and persisted to the Result Store (C7)
//! once complete.

pub mod build_context;
pub mod config;
pub mod dockerfile;
pub mod error;
pub mod http;
pub mod kubelet;
pub mod manager;
pub mod model;
pub mod pod_controller;
pub mod proxy;
pub mod store;
pub mod strategy;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use kubelet::NodeAgentClient;
pub use manager::JobManager;
pub use model::{CheckpointEntry, CheckpointParams, ContainerRef, Failure, TrackingHandle};
pub use pod_controller::PodController;
pub use proxy::Router;
pub use store::ResultStore;
pub use strategy::Strategy;
