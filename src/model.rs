//! Domain types shared by the store, registry, and transport

mod message;
mod session;

pub use message::{
    escape_html, unescape_html, LocalRef, Message, MessageId, MessageStatus, Sender,
};
pub use session::{Session, SessionId};
