//! The utcp prelude.
//!
//! Re-exports the types most callers need. Use `use utcp::prelude::*;` to
//! bring them all into scope.

pub use crate::{
    Auth,
    CallTemplate,
    CliCallTemplate,
    CommandStep,
    // Protocol contract
    CommunicationProtocol,
    DirectCallTemplate,
    HttpCallTemplate,
    HttpMethod,
    JsonObject,
    RegisterManualResult,
    SseCallTemplate,
    StreamableHttpCallTemplate,
    TextCallTemplate,
    // Tool essentials
    Tool,
    ToolStream,
    // The client and its configuration
    UtcpClient,
    UtcpClientConfig,
    // Error handling
    UtcpError,
    UtcpManual,
    UtcpResult,
};
