//! Caseflow realtime transport
//!
//! A single authenticated socket per process, fanned out into typed
//! sub-streams:
//! - Wire protocol with a closed set of message kinds
//! - Bounded reconnection after abnormal closes
//! - Token/connection reconciliation timer
//! - Pluggable connectors (WebSocket in production, channels in tests)
//!
//! # Example
//!
//! ```rust,ignore
//! use caseflow_realtime::{
//!     EventFilter, MemoryTokenStore, RealtimeClient, RealtimeConfig, WsConnector,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tokens = Arc::new(MemoryTokenStore::new(Some("jwt".into())));
//! let client = RealtimeClient::new(RealtimeConfig::default(), Arc::new(WsConnector), tokens);
//! client.connect().await?;
//! client.subscribe_to_case(caseflow_model::CaseId(10));
//!
//! let mut tasks = client.task_events(EventFilter::case(caseflow_model::CaseId(10)));
//! while let Some(message) = tasks.recv().await {
//!     println!("{}", message.kind);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod status;
pub mod stream;
pub mod token;
pub mod transport;

pub use client::{Broadcaster, RealtimeClient};
pub use config::RealtimeConfig;
pub use error::TransportError;
pub use message::{
    Category, ChangeKind, ControlMessage, InboundMessage, MessageKind, OutboundMessage,
    ASSIGNMENT_PREFIX,
};
pub use status::{ConnectionStatus, MAX_RETRIES_REACHED};
pub use stream::{EventFilter, EventStream};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{
    Connection, Connector, Frame, WsConnector, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS,
};
