//! Messaging between the scan thread and the composing layer
//!
//! - **Commands**: requests sent to the scan thread (imperative, targeted)
//! - **Events**: things the scanner did (past tense, broadcast)
//!
//! ```text
//! ┌──────────┐  ScanCommand  ┌─────────────┐  ScanEvent  ┌───────────┐
//! │ UI / CLI │ ────────────> │ scan thread │ ──────────> │ Event Bus │ ──> subscribers
//! └──────────┘               └─────────────┘             └───────────┘
//! ```
pub mod bus;
pub mod commands;
pub mod events;

pub use bus::{EventBus, SubscriberId};
pub use commands::ScanCommand;
pub use events::ScanEvent;
