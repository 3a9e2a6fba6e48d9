//! Read-only view of legacy v1 deposit accounts
//!
//! The v1 program is an external predecessor; its deposits are referenced
//! by address, never mutated. Only the fields the migrator consumes are
//! modelled here.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{account_info::AccountInfo, pubkey::Pubkey};

use crate::error::StakingError;

/// Seed prefix the v1 program uses for deposit PDAs
pub const V1_DEPOSIT_SEED: &[u8] = b"deposit";

/// Discriminator of v1 deposit accounts
pub const V1_DEPOSIT_DISCRIMINATOR: [u8; 8] = [0x8d, 0x27, 0x4c, 0xe0, 0x61, 0xb9, 0x3a, 0xf5];

/// A single legacy deposit.
/// PDA (v1 program): ["deposit", v1_pool, owner, id_le]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy)]
pub struct V1Deposit {
    pub discriminator: [u8; 8],
    pub owner: Pubkey,
    pub pool: Pubkey,
    pub value: u64,
    pub weight: u128,
    pub locked_from: u64,
    pub locked_until: u64,
    pub is_yield: bool,
}

impl V1Deposit {
    pub const LEN: usize = 8 + 32 + 32 + 8 + 16 + 8 + 8 + 1;

    pub fn is_initialized(&self) -> bool {
        self.discriminator == V1_DEPOSIT_DISCRIMINATOR
    }

    /// Derive the deposit PDA under the v1 program
    pub fn derive_pda(
        v1_program: &Pubkey,
        v1_pool: &Pubkey,
        owner: &Pubkey,
        id: u64,
    ) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[
                V1_DEPOSIT_SEED,
                v1_pool.as_ref(),
                owner.as_ref(),
                &id.to_le_bytes(),
            ],
            v1_program,
        )
    }

    /// Load and validate a deposit account for `(owner, id)` against the
    /// pool's configured v1 references.
    pub fn load_checked(
        account: &AccountInfo,
        v1_program: &Pubkey,
        v1_pool: &Pubkey,
        owner: &Pubkey,
        id: u64,
    ) -> Result<Self, StakingError> {
        if account.owner != v1_program {
            return Err(StakingError::InvalidAccountOwner);
        }
        let (expected, _) = Self::derive_pda(v1_program, v1_pool, owner, id);
        if *account.key != expected {
            return Err(StakingError::InvalidPda);
        }
        let data = account
            .try_borrow_data()
            .map_err(|_| StakingError::NotInitialized)?;
        let deposit =
            V1Deposit::try_from_slice(&data).map_err(|_| StakingError::NotInitialized)?;
        if !deposit.is_initialized() {
            return Err(StakingError::NotInitialized);
        }
        if deposit.owner != *owner || deposit.pool != *v1_pool {
            return Err(StakingError::InvalidPda);
        }
        Ok(deposit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_size() {
        let deposit = V1Deposit {
            discriminator: V1_DEPOSIT_DISCRIMINATOR,
            owner: Pubkey::new_unique(),
            pool: Pubkey::new_unique(),
            value: 1000,
            weight: 2_000_000_000,
            locked_from: 100,
            locked_until: 200,
            is_yield: false,
        };
        let serialized = borsh::to_vec(&deposit).unwrap();
        assert_eq!(serialized.len(), V1Deposit::LEN);
    }
}
