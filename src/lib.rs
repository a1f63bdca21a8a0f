//! Hearth chat client core
//!
//! Session and message state for a chat client talking to a remote chat
//! service: an HTTP transport, an in-memory message log, a session registry,
//! and a controller that keeps all three consistent while the user sends,
//! switches, creates and deletes.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod registry;
pub mod state_machine;
pub mod store;
pub mod transport;

pub use config::ClientConfig;
pub use controller::{ConversationController, Intent, NullRenderer, Outcome, Renderer, SendOutcome};
pub use error::{ChatError, ErrorKind};
pub use model::{LocalRef, Message, MessageId, MessageStatus, Sender, Session, SessionId};
pub use transport::{ChatReply, ChatTransport, HttpTransport, LoggingTransport, ServiceStatus};
