//! # Meridian Relayer
//!
//! The off-chain participants of a Meridian deployment, written against the
//! in-process state machines of `meridian-core`:
//!
//! - [`ValidatorAgent`]: attests observed source-chain roots to the oracle
//!   through a [`SigningService`].
//! - [`OutboundBatch`]: commits sent messages to a sorted-pair merkle root and
//!   hands out per-message [`Delivery`] proofs.
//! - [`Relayer`]: drains the destination bridge's queue, delivering, retrying
//!   and dequeuing.
//!
//! Transport (watching chains, submitting transactions) belongs to the host.

pub mod batch;
pub mod error;
pub mod relayer;
pub mod signer;

pub use batch::{Delivery, OutboundBatch};
pub use error::RelayerError;
pub use relayer::{RelayReport, Relayer, RelayerConfig};
pub use signer::{Attestation, SigningService, ValidatorAgent};
