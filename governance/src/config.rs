//! Governance configuration and constants

use serde::{Deserialize, Serialize};

use crate::error::{GovernanceError, Result};
use crate::types::Address;

/// Voting window of every proposal (7 days).
pub const PROPOSAL_DURATION: u64 = 7 * 86_400;

/// Share of total supply (percent) required to execute a proposal.
pub const DEFAULT_MAJORITY_PERCENTAGE: u8 = 15;

/// Highest majority percentage a Change proposal may request.
pub const MAX_MAJORITY_PERCENTAGE: u8 = 30;

/// Tenths of a percent of total supply minted to a newly added merchant.
pub const DEFAULT_MINT_MULTIPLIER: u8 = 10;

pub const MAX_MINT_MULTIPLIER: u8 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Account the engine holds deposits and withdrawn treasury funds under.
    pub governance_account: Address,
    pub majority_percentage: u8,
    pub mint_multiplier: u8,
}

impl GovernanceConfig {
    pub fn new(governance_account: Address) -> Self {
        Self {
            governance_account,
            ..Self::default()
        }
    }

    /// Majority must lie in 1..=100, the mint multiplier in 0..=100.
    pub fn validate(&self) -> Result<()> {
        if self.majority_percentage == 0 || self.majority_percentage > 100 {
            return Err(GovernanceError::InvalidPercentage(self.majority_percentage));
        }
        if self.mint_multiplier > MAX_MINT_MULTIPLIER {
            return Err(GovernanceError::InvalidMintMultiplier(self.mint_multiplier));
        }
        Ok(())
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            governance_account: Address::repeat_byte(0xd0),
            majority_percentage: DEFAULT_MAJORITY_PERCENTAGE,
            mint_multiplier: DEFAULT_MINT_MULTIPLIER,
        }
    }
}
