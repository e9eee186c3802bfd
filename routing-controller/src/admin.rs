//! Admin Transport (spec.md §4.4, §6): a request/reply client used to
//! drive the target forwarder. The concrete wire format is an external
//! collaborator and out of scope here; this module defines the request
//! and response shapes and the blocking trait the scheduler sends
//! through.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    Create,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlUrl {
    pub is_final: bool,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDesc {
    pub name: String,
    pub xml_url: XmlUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub target_router: String,
    pub kind: CommandKind,
    pub entity_desc: Option<EntityDesc>,
    pub entity_name: Option<String>,
}

/// `kind = Ok` means success; any other kind is a transient failure that
/// the scheduler logs and retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    Ok,
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub kind: ResponseKind,
    pub message: String,
}

impl CommandResponse {
    pub fn ok() -> Self {
        CommandResponse {
            kind: ResponseKind::Ok,
            message: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind == ResponseKind::Ok
    }
}

/// Request/reply client with a single in-flight request slot per caller.
/// `send_request` blocks the calling thread for up to `timeout` and must
/// never panic or raise on timeout — it returns `None` instead (spec.md
/// §4.4). This is expected to block a real OS thread, not an async task
/// (spec.md §5): the scheduler's single worker thread is occupied for the
/// duration of the call.
pub trait AdminTransport: Send + Sync {
    fn send_request(&self, request: &CommandRequest, timeout: Duration) -> Option<CommandResponse>;
}
