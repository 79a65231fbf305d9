//! Relayer driver: drains the bridge's work queue into deliveries.
//!
//! The relayer keeps the message bodies and proofs it learned from outbound
//! batches, keyed by hash. Each pass walks the bridge queue and for every hash
//! it can serve either delivers it, retries a recorded failure, or drops it
//! when another relayer already delivered it or the bridge refused it.

use crate::batch::Delivery;
use crate::error::RelayerError;
use alloy_primitives::{Address, B256};
use anyhow::Context;
use meridian_core::oracle::ProofVerifier;
use meridian_core::{
    BridgeError, CallContext, CallExecutor, ExecutionOutcome, MessageBridge, OracleError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

fn default_max_attempts() -> u32 {
    3
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// Allow-listed address the relayer submits from.
    pub address: Address,
    /// Deliveries that have failed this many times are abandoned.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl RelayerConfig {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            max_attempts: default_max_attempts(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, RelayerError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| RelayerError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RelayerError> {
        if self.max_attempts == 0 {
            return Err(RelayerError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// What one pass over the queue did, by message hash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub executed: Vec<B256>,
    pub failed: Vec<(B256, String)>,
    /// Delivered by someone else first.
    pub skipped: Vec<B256>,
    /// Root not finalized yet; left queued.
    pub awaiting_root: Vec<B256>,
    /// Out of attempts; dequeued without success.
    pub abandoned: Vec<B256>,
    /// Queued but no delivery known to this relayer.
    pub unknown: Vec<B256>,
    /// Refused by the bridge for reasons specific to the message (bad proof,
    /// wrong destination, stale block); dequeued.
    pub rejected: Vec<(B256, String)>,
}

pub struct Relayer {
    config: RelayerConfig,
    deliveries: HashMap<B256, Delivery>,
}

impl Relayer {
    pub fn new(config: RelayerConfig) -> Self {
        Self {
            config,
            deliveries: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn pending(&self) -> usize {
        self.deliveries.len()
    }

    pub fn knows(&self, hash: &B256) -> bool {
        self.deliveries.contains_key(hash)
    }

    /// Remember `delivery` and put its hash on the bridge queue. Returns false
    /// if the hash was already queued.
    pub fn enqueue<O: ProofVerifier>(
        &mut self,
        bridge: &mut MessageBridge<O>,
        delivery: Delivery,
        now: u64,
    ) -> Result<bool, RelayerError> {
        let hash = delivery.hash();
        let queued = bridge.queue_message(&self.context(now), hash)?;
        self.deliveries.insert(hash, delivery);
        Ok(queued)
    }

    /// One pass over the bridge queue.
    ///
    /// Successful, already-delivered, rejected and abandoned messages are
    /// dequeued. Failures stay queued for the next pass. Only a bridge error
    /// that is not about the individual message (paused, not allow-listed,
    /// reentrant) stops the pass.
    pub fn process_queue<O: ProofVerifier, E: CallExecutor>(
        &mut self,
        bridge: &mut MessageBridge<O>,
        executor: &mut E,
        now: u64,
    ) -> anyhow::Result<RelayReport> {
        let ctx = self.context(now);
        let mut report = RelayReport::default();

        for hash in bridge.queued_messages().to_vec() {
            let Some(delivery) = self.deliveries.get(&hash) else {
                report.unknown.push(hash);
                continue;
            };

            let prior = bridge.message_status(&hash).cloned().unwrap_or_default();
            if prior.is_retryable() && prior.attempts >= self.config.max_attempts {
                warn!(%hash, attempts = prior.attempts, "Abandoning message");
                self.finish(bridge, &ctx, hash)?;
                report.abandoned.push(hash);
                continue;
            }

            let result = if prior.is_retryable() {
                bridge.retry_message(&ctx, &delivery.message, executor)
            } else {
                bridge.execute_message(
                    &ctx,
                    &delivery.message,
                    &delivery.proof,
                    delivery.block_number,
                    executor,
                )
            };

            match result {
                Ok(ExecutionOutcome::Executed { .. }) => {
                    self.finish(bridge, &ctx, hash)?;
                    report.executed.push(hash);
                }
                Ok(ExecutionOutcome::Failed { reason }) => {
                    report.failed.push((hash, reason));
                }
                Err(BridgeError::MessageAlreadyExecuted { .. }) => {
                    debug!(%hash, "Message already delivered elsewhere");
                    self.finish(bridge, &ctx, hash)?;
                    report.skipped.push(hash);
                }
                Err(BridgeError::Oracle(OracleError::StateRootNotFinalized { .. })) => {
                    report.awaiting_root.push(hash);
                }
                Err(
                    err @ (BridgeError::Paused
                    | BridgeError::UnauthorizedRelayer { .. }
                    | BridgeError::Reentrant),
                ) => {
                    return Err(err).with_context(|| format!("Failed to relay message {hash}"));
                }
                Err(err) => {
                    warn!(%hash, error = %err, "Message rejected by the bridge");
                    self.finish(bridge, &ctx, hash)?;
                    report.rejected.push((hash, err.to_string()));
                }
            }
        }

        info!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            awaiting_root = report.awaiting_root.len(),
            rejected = report.rejected.len(),
            "Relay pass complete"
        );
        Ok(report)
    }

    fn context(&self, now: u64) -> CallContext {
        CallContext::new(self.config.address, now)
    }

    fn finish<O: ProofVerifier>(
        &mut self,
        bridge: &mut MessageBridge<O>,
        ctx: &CallContext,
        hash: B256,
    ) -> anyhow::Result<()> {
        bridge
            .dequeue_message(ctx, hash)
            .with_context(|| format!("Failed to dequeue message {hash}"))?;
        self.deliveries.remove(&hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::OutboundBatch;
    use alloy_primitives::{Bytes, U256};
    use hex_literal::hex;
    use meridian_core::{
        BridgeConfig, BridgeOracle, CallOutcome, Message, OracleConfig, RegistryConfig, ValidatorKey,
        ValidatorRegistry,
    };

    const OWNER: Address = Address::repeat_byte(0xEE);
    const RELAYER: Address = Address::repeat_byte(0xAA);
    const SOURCE: u64 = 31337;
    const DEST: u64 = 5;
    const BLOCK: u64 = 40;

    fn batch(count: u8) -> OutboundBatch {
        let registry = ValidatorRegistry::new(RegistryConfig::new(OWNER)).unwrap();
        let oracle = BridgeOracle::new(OracleConfig::new(OWNER), registry).unwrap();
        let mut source = MessageBridge::new(BridgeConfig::new(OWNER, SOURCE), oracle).unwrap();
        let fee = source.estimate_fee(DEST, 0).unwrap();
        for n in 0..count {
            let ctx = CallContext::new(Address::repeat_byte(n + 1), 1).with_value(fee);
            source
                .send_message(&ctx, DEST, Address::repeat_byte(0x22), Bytes::from(vec![n]), 0)
                .unwrap();
        }
        OutboundBatch::from_bridge(&source, 0..u64::from(count)).unwrap()
    }

    /// Destination bridge with one validator; `finalize` attests the batch root.
    fn destination(relayers: Vec<Address>) -> (MessageBridge, ValidatorKey) {
        let key = ValidatorKey::from_bytes(&[1; 32]).unwrap();
        let mut registry = ValidatorRegistry::new(RegistryConfig::new(OWNER)).unwrap();
        registry
            .register(
                &CallContext::new(key.address(), 0),
                key.public_key(),
                U256::from(1_000_000_000_000_000_000u128),
            )
            .unwrap();
        let mut oracle_config = OracleConfig::new(OWNER);
        oracle_config.supported_chains = vec![SOURCE];
        let oracle = BridgeOracle::new(oracle_config, registry).unwrap();
        let mut config = BridgeConfig::new(OWNER, DEST);
        config.relayers = relayers;
        (MessageBridge::new(config, oracle).unwrap(), key)
    }

    fn finalize(bridge: &mut MessageBridge, key: &ValidatorKey, root: B256) {
        let signature = key.sign_state_root(SOURCE, BLOCK, &root).unwrap();
        bridge
            .oracle_mut()
            .submit_threshold_signature(&CallContext::new(RELAYER, 0), SOURCE, BLOCK, root, &[signature])
            .unwrap();
    }

    fn relayer() -> Relayer {
        Relayer::new(RelayerConfig::new(RELAYER))
    }

    fn succeed(_: Address, _: &[u8], _: u64) -> CallOutcome {
        CallOutcome::Success {
            output: Bytes::new(),
            gas_used: 30_000,
        }
    }

    fn revert(_: Address, _: &[u8], _: u64) -> CallOutcome {
        CallOutcome::Revert {
            output: Bytes::new(),
            gas_used: 30_000,
        }
    }

    #[test]
    fn test_process_queue_delivers_and_dequeues() {
        let batch = batch(3);
        let (mut bridge, key) = destination(vec![RELAYER]);
        finalize(&mut bridge, &key, batch.root());

        let mut relayer = relayer();
        for delivery in batch.deliveries(BLOCK).unwrap() {
            assert!(relayer.enqueue(&mut bridge, delivery, 10).unwrap());
        }
        assert_eq!(bridge.queue_length(), 3);

        let report = relayer.process_queue(&mut bridge, &mut succeed, 11).unwrap();
        assert_eq!(report.executed.len(), 3);
        assert_eq!(bridge.queue_length(), 0);
        assert_eq!(relayer.pending(), 0);
        for message in batch.messages() {
            assert!(bridge.message_status(&message.hash()).unwrap().executed);
        }
    }

    #[test]
    fn test_unfinalized_root_stays_queued() {
        let batch = batch(1);
        let (mut bridge, key) = destination(vec![RELAYER]);
        let mut relayer = relayer();
        let delivery = batch.deliveries(BLOCK).unwrap().remove(0);
        let hash = delivery.hash();
        relayer.enqueue(&mut bridge, delivery, 10).unwrap();

        let report = relayer.process_queue(&mut bridge, &mut succeed, 11).unwrap();
        assert_eq!(report.awaiting_root, vec![hash]);
        assert!(bridge.is_queued(&hash));

        finalize(&mut bridge, &key, batch.root());
        let report = relayer.process_queue(&mut bridge, &mut succeed, 12).unwrap();
        assert_eq!(report.executed, vec![hash]);
    }

    #[test]
    fn test_failures_retry_then_abandon() {
        let batch = batch(1);
        let (mut bridge, key) = destination(vec![RELAYER]);
        finalize(&mut bridge, &key, batch.root());
        let mut relayer = relayer();
        let hash = batch.messages()[0].hash();
        relayer
            .enqueue(&mut bridge, batch.delivery(&hash, BLOCK).unwrap(), 10)
            .unwrap();

        for pass in 1..=3u32 {
            let report = relayer.process_queue(&mut bridge, &mut revert, 10 + u64::from(pass)).unwrap();
            assert_eq!(report.failed, vec![(hash, "reverted without reason".to_string())]);
            assert_eq!(bridge.message_status(&hash).unwrap().attempts, pass);
        }

        let report = relayer.process_queue(&mut bridge, &mut succeed, 20).unwrap();
        assert_eq!(report.abandoned, vec![hash]);
        assert!(!bridge.is_queued(&hash));
        assert!(bridge.message_status(&hash).unwrap().failed);
    }

    #[test]
    fn test_failed_message_recovers_on_retry() {
        let batch = batch(1);
        let (mut bridge, key) = destination(vec![RELAYER]);
        finalize(&mut bridge, &key, batch.root());
        let mut relayer = relayer();
        let delivery = batch.deliveries(BLOCK).unwrap().remove(0);
        let hash = delivery.hash();
        relayer.enqueue(&mut bridge, delivery, 10).unwrap();

        relayer.process_queue(&mut bridge, &mut revert, 11).unwrap();
        let report = relayer.process_queue(&mut bridge, &mut succeed, 12).unwrap();
        assert_eq!(report.executed, vec![hash]);
        let status = bridge.message_status(&hash).unwrap();
        assert!(status.executed && !status.failed);
        assert_eq!(status.attempts, 2);
    }

    #[test]
    fn test_race_loser_skips_and_dequeues() {
        let other = Address::repeat_byte(0xBB);
        let batch = batch(2);
        let (mut bridge, key) = destination(vec![RELAYER, other]);
        finalize(&mut bridge, &key, batch.root());

        let mut relayer = relayer();
        for delivery in batch.deliveries(BLOCK).unwrap() {
            relayer.enqueue(&mut bridge, delivery, 10).unwrap();
        }

        // The competing relayer lands the first message directly
        let first: &Message = &batch.messages()[0];
        bridge
            .execute_message(
                &CallContext::new(other, 11),
                first,
                &batch.proof(&first.hash()).unwrap(),
                BLOCK,
                &mut succeed,
            )
            .unwrap();

        let report = relayer.process_queue(&mut bridge, &mut succeed, 12).unwrap();
        assert_eq!(report.skipped, vec![first.hash()]);
        assert_eq!(report.executed, vec![batch.messages()[1].hash()]);
        assert_eq!(bridge.queue_length(), 0);
    }

    #[test]
    fn test_bad_proof_does_not_block_later_messages() {
        let batch = batch(2);
        let (mut bridge, key) = destination(vec![RELAYER]);
        finalize(&mut bridge, &key, batch.root());
        let mut relayer = relayer();

        let mut deliveries = batch.deliveries(BLOCK).unwrap();
        deliveries[0].proof = vec![B256::repeat_byte(0x99)];
        let (bad, good) = (deliveries[0].hash(), deliveries[1].hash());
        for delivery in deliveries {
            relayer.enqueue(&mut bridge, delivery, 10).unwrap();
        }

        let report = relayer.process_queue(&mut bridge, &mut succeed, 11).unwrap();
        assert_eq!(report.executed, vec![good]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, bad);
        assert_eq!(report.rejected[0].1, BridgeError::InvalidProof { hash: bad }.to_string());
        assert_eq!(bridge.queue_length(), 0);
        assert_eq!(relayer.pending(), 0);
        assert!(bridge.message_status(&bad).is_none());
    }

    #[test]
    fn test_unknown_hashes_are_left_alone() {
        let (mut bridge, _) = destination(vec![RELAYER]);
        let stray = B256::repeat_byte(0x77);
        bridge.queue_message(&CallContext::new(RELAYER, 0), stray).unwrap();

        let report = relayer().process_queue(&mut bridge, &mut succeed, 1).unwrap();
        assert_eq!(report.unknown, vec![stray]);
        assert!(bridge.is_queued(&stray));
    }

    #[test]
    fn test_paused_bridge_stops_the_pass() {
        let batch = batch(1);
        let (mut bridge, key) = destination(vec![RELAYER]);
        finalize(&mut bridge, &key, batch.root());
        let mut relayer = relayer();
        relayer
            .enqueue(&mut bridge, batch.deliveries(BLOCK).unwrap().remove(0), 10)
            .unwrap();

        bridge.pause(&CallContext::new(OWNER, 11)).unwrap();
        let err = relayer.process_queue(&mut bridge, &mut succeed, 12).unwrap_err();
        assert_eq!(err.downcast_ref::<BridgeError>(), Some(&BridgeError::Paused));
        assert_eq!(relayer.pending(), 1);
    }

    #[test]
    fn test_unlisted_relayer_cannot_enqueue() {
        let batch = batch(1);
        let (mut bridge, _) = destination(vec![]);
        assert!(matches!(
            relayer().enqueue(&mut bridge, batch.deliveries(BLOCK).unwrap().remove(0), 10),
            Err(RelayerError::Bridge(BridgeError::UnauthorizedRelayer { .. }))
        ));
    }

    #[test]
    fn test_config_defaults_max_attempts() {
        let config =
            RelayerConfig::from_json_str(r#"{"address":"0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}"#).unwrap();
        assert_eq!(config.address, Address::new(hex!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")));
        assert_eq!(config, RelayerConfig::new(RELAYER));
    }

    #[test]
    fn test_config_rejects_zero_attempts_and_bad_json() {
        assert!(matches!(
            RelayerConfig::from_json_str(
                r#"{"address":"0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","max_attempts":0}"#
            ),
            Err(RelayerError::InvalidConfig(_))
        ));
        assert!(matches!(
            RelayerConfig::from_json_str(r#"{"max_attempts":2}"#),
            Err(RelayerError::InvalidConfig(_))
        ));
    }
}
