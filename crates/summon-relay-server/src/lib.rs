//! # summon-relay-server
//!
//! Processing and MCP surface for the summon result relay.
//!
//! This crate provides:
//! - `ResultProcessor` for typed parsing and creature/model side effects
//! - `ResultRelay`, the handle shared by the server and the CLI
//! - MCP JSON-RPC protocol handling and tool implementations

pub mod mcp;
pub mod processor;
pub mod relay;
pub mod tools;
pub mod transport;

pub use processor::{CreatureRegistration, ModelExtraction, ResultProcessor};
pub use relay::{FetchedResult, ProcessingReport, ResultRelay, SubmitReceipt};

use std::sync::Arc;
use summon_relay_core::Result;

pub const SERVER_NAME: &str = "summon-relay";

/// Summon relay MCP server
pub struct RelayServer {
    relay: Arc<ResultRelay>,
}

impl RelayServer {
    /// Create a new server over the given relay
    pub fn new(relay: impl Into<Arc<ResultRelay>>) -> Self {
        Self {
            relay: relay.into(),
        }
    }

    /// Run the server on stdio transport
    pub async fn run_stdio(self) -> Result<()> {
        transport::stdio::run(self).await
    }

    pub fn relay(&self) -> &ResultRelay {
        &self.relay
    }

    pub fn name(&self) -> &str {
        SERVER_NAME
    }

    pub fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }
}
