//! Note-mutation orchestration on top of the Cardano protocol core.
//!
//! - [`service::NoteChainService`] drives build -> sign -> assemble ->
//!   submit for a note and records the resulting proof.
//! - [`in_flight::InFlightRegistry`] keeps at most one unsubmitted
//!   transaction per wallet address.
//! - [`poller::ConfirmationPoller`] flips pending proofs to confirmed in the
//!   background.

pub mod error;
pub mod in_flight;
pub mod poller;
pub mod service;

pub use error::PipelineError;
pub use in_flight::{InFlightRegistry, Reservation};
pub use poller::{ConfirmationPoller, PollSummary};
pub use service::{BuildRequest, NoteChainService, SubmitOutcome};
