//! Conversation controller state machine
//!
//! Pure state transitions in the Elm style: `transition` maps a state and an
//! event to a new state plus the effects the controller must carry out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ControllerContext, ControllerState, Phase, SwitchTarget};
pub use transition::{transition, TransitionError, TransitionResult};
