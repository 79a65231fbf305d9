use super::{BridgeError, MessageBridge};
use crate::events::Event;
use crate::oracle::ProofVerifier;
use crate::types::context::{CallContext, Payout};
use crate::types::message::{Message, MessageStatus};
use alloy_primitives::{Address, Bytes, B256, U256};
use tracing::info;

/// What `send_message` recorded, plus the overpayment to hand back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReceipt {
    pub hash: B256,
    pub nonce: u64,
    pub fee: U256,
    pub refund: Payout,
}

impl<O: ProofVerifier> MessageBridge<O> {
    /// Create an outbound message paid for by `ctx.value`.
    ///
    /// A zero `gas_limit` selects the default. Anything sent above the fee is
    /// returned in [`SendReceipt::refund`]; the nonce is consumed before the
    /// hash is recorded against it.
    pub fn send_message(
        &mut self,
        ctx: &CallContext,
        dest_chain_id: u64,
        target: Address,
        data: Bytes,
        gas_limit: u64,
    ) -> Result<SendReceipt, BridgeError> {
        let _guard = self.lock.try_enter().ok_or(BridgeError::Reentrant)?;
        self.check_not_paused()?;

        if dest_chain_id == 0 || dest_chain_id == self.chain_id {
            return Err(BridgeError::InvalidDestination {
                chain_id: dest_chain_id,
            });
        }
        if !self.destinations.is_empty() && !self.destinations.contains(&dest_chain_id) {
            return Err(BridgeError::ChainNotSupported {
                chain_id: dest_chain_id,
            });
        }

        let gas_limit = self.fees.resolve_gas_limit(gas_limit)?;
        let fee = self.fees.fee(dest_chain_id, gas_limit);
        if ctx.value < fee {
            return Err(BridgeError::InsufficientFee {
                provided: ctx.value,
                required: fee,
            });
        }

        let nonce = self.outbound_nonce;
        self.outbound_nonce += 1;

        let message = Message {
            nonce,
            source_chain_id: self.chain_id,
            dest_chain_id,
            sender: ctx.caller,
            target,
            data,
            gas_limit,
            timestamp: ctx.timestamp,
        };
        let hash = message.hash();

        self.sent_hashes.insert(nonce, hash);
        self.statuses.insert(
            hash,
            MessageStatus {
                sent: true,
                ..MessageStatus::default()
            },
        );
        self.accumulated_fees += fee;

        info!(%hash, nonce, dest_chain_id, sender = %ctx.caller, %target, gas_limit, %fee, "Message sent");
        self.events.emit(Event::MessageSent {
            hash,
            nonce,
            dest_chain_id,
            sender: ctx.caller,
            target,
            data: message.data.clone(),
            gas_limit,
            fee,
        });
        self.sent.insert(nonce, message);

        Ok(SendReceipt {
            hash,
            nonce,
            fee,
            refund: Payout::new(ctx.caller, ctx.value - fee),
        })
    }
}
