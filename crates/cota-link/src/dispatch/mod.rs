//! Command dispatch.
//!
//! Producers push [`CommandEnvelope`]s through a [`CommandSender`]. A single
//! worker thread owns the transmitter, takes commands one at a time (a pending
//! `QUIT` always first), runs the operation registered for each tag, and
//! publishes one [`ResultEnvelope`] per command. Consumers read results
//! through a [`ResultReceiver`].

mod command;
mod errors;
pub(crate) mod queue;
mod registry;
mod result;
mod worker;

pub use command::{Args, CommandEnvelope, CommandKind};
pub use errors::{DispatchError, HandlerError, QueueError};
pub use queue::CommandSender;
pub(crate) use registry::handler_for;
pub use result::{ResultData, ResultEnvelope, ResultReceiver};
pub use worker::{CommandTarget, DispatcherHandle};
pub(crate) use worker::Dispatcher;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
