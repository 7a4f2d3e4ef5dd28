//! Tether connectors - typed clients for the upstream providers.
//!
//! # Architecture
//!
//! ```text
//!   WHOOP (OAuth 2.0)          Limitless (API key)
//!          ↑                          ↑
//! ┌─────────────────────────────────────────┐
//! │        tether core (Executor)            │
//! │  - Valid token / key per request         │
//! │  - Single 401-triggered retry            │
//! │  - Cursor pagination                     │
//! └─────────────────────────────────────────┘
//!          ↑                          ↑
//!    WhoopClient                LimitlessClient
//!          ↓                          ↓
//!    WhoopMetric                LimitlessEvent
//! ```
//!
//! Clients fetch raw records through the core; transformers map them into the
//! normalized shapes stored downstream.

pub mod limitless;
pub mod stack;
pub mod whoop;
pub mod window;

pub use limitless::{LimitlessClient, LimitlessEvent};
pub use stack::Stack;
pub use whoop::{WhoopClient, WhoopDataType, WhoopMetric};
pub use window::FetchWindow;
