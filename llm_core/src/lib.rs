//! Conversation model, generative backend access, the streaming chat relay,
//! document ingestion and the client that consumes the relay.

pub mod backend;
pub mod client;
pub mod conversation;
pub mod error;
pub mod event;
pub mod gemini;
pub mod ingest;
pub mod model;
pub mod relay;
pub mod speech;
pub mod sse;

pub use backend::{ApiKey, CompletionRequest, FileState, Fragment, FragmentStream, GenerativeBackend, RemoteFile};
pub use error::{IngestionError, RelayError};
pub use event::StreamEvent;
pub use gemini::{GeminiBackend, GeminiConfig};
pub use ingest::{IngestionGate, IngestionPolicy, PDF_MIME};
pub use model::{FailureKind, FileRef, Message, Session, DEFAULT_VOICE, PREBUILT_VOICES};
pub use relay::{ChatRelayRequest, Relay, RelaySettings};
