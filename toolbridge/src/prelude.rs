//! Prelude module for convenient imports.
//!
//! ```rust
//! use toolbridge::prelude::*;
//!
//! let options = TransportOptions::host_process("calculator-server --stdio");
//! let builder = ClientBuilder::new("calculator").request_timeout(std::time::Duration::from_secs(5));
//! # let _ = (options, builder);
//! ```

// Core types
pub use toolbridge_core::prelude::*;

// Client types
pub use toolbridge_client::{
    Client, ClientBuilder, ClientConfig, ClientEvent, ClientState, ServerConfig, ToolCall,
};

// Transport types
pub use toolbridge_transport::{
    AnyTransport, LocalProcessHost, MemoryTransport, ProcessHost, Transport, TransportOptions,
};
