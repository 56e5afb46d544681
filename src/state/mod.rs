//! State machine driving testnets from gathering to serving.

pub mod machine;
pub mod messages;
pub mod ticker;

pub use machine::{StateMachine, MSG_QUEUE_SIZE};
pub use messages::MachineMessage;
pub use ticker::{TimeoutInfo, TimeoutTicker};
