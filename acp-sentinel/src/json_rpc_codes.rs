//! JSON-RPC 2.0 error codes
//!
//! Standard codes from https://www.jsonrpc.org/specification#error_object plus
//! the implementation-defined codes ACP reserves in the server error range.

/// Parse error - Invalid JSON was received
pub const PARSE_ERROR: i32 = -32700;

/// Invalid Request - The JSON sent is not a valid Request object
pub const INVALID_REQUEST: i32 = -32600;

/// Method not found - The method does not exist / is not available
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Invalid params - Invalid method parameter(s)
pub const INVALID_PARAMS: i32 = -32602;

/// Internal error - Internal JSON-RPC error
pub const INTERNAL_ERROR: i32 = -32603;

/// ACP: the agent requires `authenticate` before this request
pub const AUTH_REQUIRED: i32 = -32000;

/// ACP: the referenced resource (file, session, terminal) does not exist
pub const RESOURCE_NOT_FOUND: i32 = -32002;
