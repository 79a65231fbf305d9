//! Quorum-approved slashing.
//!
//! A proposal starts with its proposer as the first approval. Once the number
//! of distinct approvals reaches [`SlashQuorum::required`] for the current
//! active-set size, the target loses `slash_bps` of its stake. A proposal
//! whose target is no longer active by then is closed without slashing.

use super::{RegistryError, ValidatorRegistry};
use crate::config::BPS_DENOMINATOR;
use crate::events::Event;
use crate::types::context::CallContext;
use crate::types::validator::SlashProposal;
use alloy_primitives::{Address, B256, U256};
use tracing::{debug, info, warn};

/// Result of executing a slash against its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlashOutcome {
    pub amount: U256,
    pub remaining: U256,
    pub deactivated: bool,
}

impl ValidatorRegistry {
    /// Open a slash proposal against `target`, returning its id. Executes at
    /// once if the quorum is a single approval.
    pub fn propose_slash(
        &mut self,
        ctx: &CallContext,
        target: Address,
        reason: B256,
    ) -> Result<u64, RegistryError> {
        let proposer = ctx.caller;
        self.check_active(&proposer)?;
        if target == proposer {
            return Err(RegistryError::CannotSlashSelf);
        }
        self.check_active(&target)?;

        let id = self.next_proposal_id;
        self.next_proposal_id += 1;
        self.proposals.insert(
            id,
            SlashProposal {
                id,
                proposer,
                target,
                reason,
                approvals: vec![proposer],
                executed: false,
                created_at: ctx.timestamp,
            },
        );

        info!(proposal_id = id, %proposer, %target, %reason, "Slash proposed");
        self.events.emit(Event::SlashProposed {
            proposal_id: id,
            proposer,
            target,
            reason,
        });

        self.try_execute_slash(id);
        Ok(id)
    }

    /// Add the caller's approval. Returns true if this approval executed the
    /// slash, false if quorum is still short or the proposal was voided.
    pub fn approve_slash(&mut self, ctx: &CallContext, proposal_id: u64) -> Result<bool, RegistryError> {
        let approver = ctx.caller;
        self.check_active(&approver)?;

        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(RegistryError::ProposalNotFound { id: proposal_id })?;
        if proposal.executed {
            return Err(RegistryError::ProposalAlreadyExecuted { id: proposal_id });
        }
        if proposal.target == approver {
            return Err(RegistryError::CannotSlashSelf);
        }
        if proposal.has_approved(&approver) {
            return Err(RegistryError::AlreadyApproved {
                id: proposal_id,
                approver,
            });
        }

        proposal.approvals.push(approver);
        let approvals = proposal.approval_count() as u32;

        debug!(proposal_id, %approver, approvals, "Slash approved");
        self.events.emit(Event::SlashApproved {
            proposal_id,
            approver,
            approvals,
        });

        Ok(self.try_execute_slash(proposal_id).is_some())
    }

    pub fn slash_proposal(&self, proposal_id: u64) -> Option<&SlashProposal> {
        self.proposals.get(&proposal_id)
    }

    /// Approvals a proposal needs right now.
    pub fn required_slash_approvals(&self) -> usize {
        self.slash_quorum.required(self.active.len())
    }

    fn try_execute_slash(&mut self, proposal_id: u64) -> Option<SlashOutcome> {
        let required = self.required_slash_approvals();
        let proposal = self.proposals.get_mut(&proposal_id)?;
        if proposal.executed || proposal.approval_count() < required {
            return None;
        }
        proposal.executed = true;
        let target = proposal.target;

        let slash_bps = U256::from(self.slash_bps);
        let minimum = self.minimum_stake;
        let Some(validator) = self.validators.get_mut(&target).filter(|v| v.active) else {
            // Target left the active set after the proposal opened
            warn!(proposal_id, validator = %target, "Slash voided, target no longer active");
            return None;
        };

        let amount = validator.stake * slash_bps / U256::from(BPS_DENOMINATOR);
        validator.stake -= amount;
        validator.slash_count += 1;
        let remaining = validator.stake;
        let deactivated = remaining < minimum;

        self.total_staked -= amount;
        self.slashed_total += amount;
        if deactivated {
            self.deactivate(&target);
        }

        info!(
            proposal_id,
            validator = %target,
            %amount,
            %remaining,
            deactivated,
            "Validator slashed"
        );
        self.events.emit(Event::ValidatorSlashed {
            proposal_id,
            validator: target,
            amount,
            remaining,
            deactivated,
        });

        Some(SlashOutcome {
            amount,
            remaining,
            deactivated,
        })
    }
}
