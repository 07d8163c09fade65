//! Typed payloads of the Agent Client Protocol.
//!
//! These are the `params` and `result` bodies carried inside JSON-RPC frames.
//! Field names follow the wire's camelCase convention through serde
//! attributes; enums use the protocol's snake_case discriminators.

pub mod content;
pub mod handshake;
pub mod ids;
pub mod methods;
pub mod session;
pub mod session_update;
pub mod tool_surface;

pub use content::{
    AudioContent, ContentBlock, EmbeddedResource, EmbeddedResourceContents, ExtensionContent,
    ExtensionContentError, ImageContent, ResourceLink, TextContent, STANDARD_CONTENT_KINDS,
};
pub use handshake::{
    AgentCapabilities, AuthMethod, AuthenticateRequest, AuthenticateResponse, ClientCapabilities,
    FileSystemCapability, Implementation, InitializeRequest, InitializeResponse, McpCapabilities,
    PromptCapabilities,
};
pub use ids::{
    AuthMethodId, PermissionOptionId, ProtocolVersion, RequestId, SessionId, SessionModeId,
    TerminalId, ToolCallId,
};
pub use session::{
    CancelNotification, EnvVariable, HttpHeader, LoadSessionRequest, LoadSessionResponse,
    McpServer, McpTransportKind, NewSessionRequest, NewSessionResponse, PromptRequest,
    PromptResponse, SessionMode, SessionModeState, SetSessionModeRequest, SetSessionModeResponse,
    StopReason,
};
pub use session_update::{
    AvailableCommand, AvailableCommandsUpdate, ContentChunk, CurrentModeUpdate, Plan, PlanEntry,
    PlanEntryPriority, PlanEntryStatus, SessionNotification, SessionUpdate,
};
pub use tool_surface::{
    CreateTerminalRequest, CreateTerminalResponse, Diff, EmbeddedTerminal, KillTerminalResponse,
    PermissionOption, PermissionOptionKind, ReadTextFileRequest, ReadTextFileResponse,
    ReleaseTerminalResponse, RequestPermissionOutcome, RequestPermissionRequest,
    RequestPermissionResponse, SelectedPermissionOutcome, TerminalExitStatus,
    TerminalOutputResponse, TerminalRequest, ToolCall, ToolCallContent, ToolCallLocation,
    ToolCallStatus, ToolCallUpdate, ToolKind, WaitForTerminalExitResponse, WrappedContent,
    WriteTextFileRequest, WriteTextFileResponse,
};
