//! I/O utilities for bidirectional relay.
//!
//! This module provides the relay shared by garrow-server and garrow-client.

mod relay;

pub use relay::{RelayEnd, RelayOptions, RelayReport, Side, pipe, relay};
