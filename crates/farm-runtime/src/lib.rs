#![deny(warnings)]

//! Game state engine and tick scheduler for Farmstead.
//!
//! [`Session`] owns the state and exposes every player operation.
//! [`spawn`] moves a session onto a tokio task that refreshes readiness once
//! per tick and serves operations sent through a [`SessionHandle`].

pub mod clock;
pub mod scheduler;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{spawn, RuntimeError, Scheduler, SessionHandle};
pub use session::{PlotStatus, Rejection, Session, TickReport};
