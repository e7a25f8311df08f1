//! The delegation-and-streaming runtime.
//!
//! A tree of [`Runner`]s, each holding its own conversation with the model:
//!
//! 1. **Receive** a message via [`Runner::send_message`]
//! 2. **Stream** a completion, forwarding content as it arrives
//! 3. **If tool calls**: run them (a delegation tool spawns and drives a
//!    child Runner), append the results, and request another completion
//! 4. **Otherwise** return the finalized [`TurnResult`]
//!
//! Every Runner publishes [`RunnerEvent`]s on its own channel; children
//! relay theirs upward, so a subscriber on the root sees the whole active
//! subtree as one ordered stream.

pub mod channel;
pub mod conversation;
pub mod delegation;
pub mod notes;
pub mod prompts;
pub mod roles;
pub mod runner;
pub mod session;
pub mod stream_event;
pub mod waiting;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use delegation::{ChildFactory, DelegationDescriptor, SpawnContext};
pub use notes::{AttachNotesTool, NotesLog, NotesView, NOTES_ATTACHED};
pub use roles::{DelegationRule, RoleRecipe, RoleRegistry, RunnerFactory};
pub use runner::{Runner, RunnerBuilder, RunnerSettings};
pub use session::{Choice, ToolCallRecord, TurnResult};
pub use stream_event::{HandoffDirection, RunnerEvent};
pub use waiting::{BusySignal, Transition, Trigger, WaitingState, WaitingTracker};
