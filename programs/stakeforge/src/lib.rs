//! StakeForge: multi-pool staking with lock-weighted yield distribution
//!
//! Users deposit pool tokens; a factory-held emission is split across
//! pools by weight and distributed to stakers through a rewards-per-weight
//! accumulator. Locking a stake up to two years scales its weight up to
//! 2x; claimed yield either compounds into a max-lock stake of the
//! reward-token pool or is minted immediately as an escrow token. Legacy
//! v1 stakes can be referenced for a reward bonus and materialised once
//! matured.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo, entrypoint, entrypoint::ProgramResult, msg,
    program_error::ProgramError, pubkey::Pubkey,
};

pub mod error;
pub mod events;
pub mod instructions;
pub mod math;
pub mod state;
pub mod v1;

use instructions::*;

solana_program::declare_id!("3vKoozJvfVVcLwnma11MPZU3VH1vbv73Zp5ri7neK85E");

/// One entry of a batch unstake.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnstakeItem {
    pub stake_id: u64,
    pub value: u64,
}

/// Program instructions
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub enum StakingInstruction {
    /// Initialize the factory holding the global emission schedule
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account (PDA: ["factory", reward_mint])
    /// 1. `[]` Reward token mint (Token 2022)
    /// 2. `[]` Escrow token mint (Token 2022)
    /// 3. `[writable, signer]` Authority/payer
    /// 4. `[]` System program
    InitializeFactory {
        reward_per_second: u64,
        seconds_per_update: u32,
        end_time: u64,
    },

    /// Register a pool and add its weight to the emission split
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account (PDA: ["pool", factory, pool_token])
    /// 2. `[]` Pool token mint
    /// 3. `[]` Reward token mint
    /// 4. `[writable]` Token vault (PDA: ["token_vault", pool])
    /// 5. `[writable]` Reward vault (PDA: ["reward_vault", pool])
    /// 6. `[writable, signer]` Factory authority/payer
    /// 7. `[]` System program
    /// 8. `[]` Token 2022 program
    RegisterPool {
        weight: u32,
        is_flash_pool: bool,
        v1_program: Pubkey,
        v1_pool: Pubkey,
        v1_stake_max_period: u64,
    },

    /// Change a pool's emission weight (authority only)
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[signer]` Factory authority
    ChangePoolWeight { new_weight: u32 },

    /// Apply the periodic 3% emission decay (permissionless crank)
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    UpdateRewardPerSecond,

    /// Move the emission end time (authority only)
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[signer]` Factory authority
    SetEndTime { end_time: u64 },

    /// Configure the privileged revenue vault (authority only)
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[signer]` Factory authority
    SetVault { vault: Pubkey },

    /// Stake tokens with no lock
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` User record (PDA: ["user", pool, owner])
    /// 3. `[writable]` Token vault
    /// 4. `[writable]` User token account
    /// 5. `[]` Pool token mint
    /// 6. `[writable, signer]` User/owner
    /// 7. `[]` System program
    /// 8. `[]` Token 2022 program
    StakeFlexible { value: u64 },

    /// Stake tokens locked until `locked_until` (0 stakes flexible)
    ///
    /// Accounts: as for `StakeFlexible`
    StakeAndLock { value: u64, locked_until: u64 },

    /// Withdraw from the flexible balance
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` User record
    /// 3. `[writable]` Token vault
    /// 4. `[writable]` User token account
    /// 5. `[writable]` Pool token mint
    /// 6. `[writable, signer]` User/owner
    /// 7. `[]` System program
    /// 8. `[]` Token 2022 program
    UnstakeFlexible { value: u64 },

    /// Unstake part or all of an expired locked stake
    ///
    /// Accounts: as for `UnstakeFlexible`
    UnstakeLocked { stake_id: u64, value: u64 },

    /// Unstake several stakes of one kind, paid out in a single transfer
    /// or mint
    ///
    /// Accounts: as for `UnstakeFlexible`
    UnstakeLockedMultiple {
        items: Vec<UnstakeItem>,
        is_yield: bool,
    },

    /// Extend a stake's lock
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` User record
    /// 3. `[writable, signer]` User/owner
    /// 4. `[]` System program
    UpdateStakeLock { stake_id: u64, locked_until: u64 },

    /// Claim accrued yield, either as escrow tokens or compounded into a
    /// max-lock stake of the reward-token pool
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` User record
    /// 3. `[writable, signer]` User/owner
    /// 4. `[]` System program
    /// 5. `[]` Token 2022 program
    /// With `use_escrow`:
    /// 6. `[writable]` Escrow mint
    /// 7. `[writable]` User escrow token account
    /// Compounding on a non-reward pool:
    /// 6. `[writable]` Reward-token pool account
    /// 7. `[writable]` User record on the reward-token pool
    ClaimRewards { use_escrow: bool },

    /// Claim accrued vault revenue
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` User record
    /// 3. `[writable]` Pool reward vault
    /// 4. `[writable]` User reward token account
    /// 5. `[]` Reward mint
    /// 6. `[writable, signer]` User/owner
    /// 7. `[]` System program
    /// 8. `[]` Token 2022 program
    ClaimVaultRewards,

    /// Advance the pool's yield accumulator (permissionless crank)
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    Sync,

    /// Move all aggregates of the signer's record to a fresh record
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` Source user record
    /// 3. `[writable]` Destination user record (PDA: ["user", pool, to])
    /// 4. `[writable, signer]` User/owner
    /// 5. `[]` System program
    MigrateUser { to: Pubkey },

    /// Receive external revenue from the configured vault
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` Pool reward vault
    /// 3. `[writable]` Vault's reward token account
    /// 4. `[]` Reward mint
    /// 5. `[writable, signer]` Vault authority
    /// 6. `[]` Token 2022 program
    ReceiveVaultRewards { amount: u64 },

    /// Ingest locked v1 stakes for a reward bonus
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` User record
    /// 3. `[writable, signer]` User/owner
    /// 4. `[]` System program
    /// 5... `[]` One v1 deposit account per id, in order
    MigrateV1Stakes { ids: Vec<u64> },

    /// Materialise a matured v1 stake into a real stake
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` User record
    /// 3. `[writable, signer]` User/owner
    /// 4. `[]` System program
    /// 5. `[]` V1 deposit account
    FillV1Stake { position: u64 },

    /// Mint the reward token for one matured v1 yield deposit
    ///
    /// Accounts: as for `MintV1YieldMultiple`
    MintV1Yield { id: u64 },

    /// Mint the reward token for matured v1 yield deposits
    ///
    /// Accounts:
    /// 0. `[writable]` Factory account
    /// 1. `[writable]` Pool account
    /// 2. `[writable]` User record
    /// 3. `[writable]` Reward mint
    /// 4. `[writable]` User reward token account
    /// 5. `[writable, signer]` User/owner
    /// 6. `[]` System program
    /// 7. `[]` Token 2022 program
    /// 8... `[]` One v1 deposit account per id, in order
    MintV1YieldMultiple { ids: Vec<u64> },
}

#[cfg(not(feature = "no-entrypoint"))]
entrypoint!(process_instruction);

/// Program entrypoint
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    if program_id != &crate::id() {
        return Err(ProgramError::IncorrectProgramId);
    }

    let instruction = StakingInstruction::try_from_slice(instruction_data)
        .map_err(|_| ProgramError::InvalidInstructionData)?;

    match instruction {
        StakingInstruction::InitializeFactory {
            reward_per_second,
            seconds_per_update,
            end_time,
        } => {
            msg!("Instruction: InitializeFactory");
            process_initialize_factory(
                program_id,
                accounts,
                reward_per_second,
                seconds_per_update,
                end_time,
            )
        }
        StakingInstruction::RegisterPool {
            weight,
            is_flash_pool,
            v1_program,
            v1_pool,
            v1_stake_max_period,
        } => {
            msg!("Instruction: RegisterPool (weight={})", weight);
            process_register_pool(
                program_id,
                accounts,
                weight,
                is_flash_pool,
                v1_program,
                v1_pool,
                v1_stake_max_period,
            )
        }
        StakingInstruction::ChangePoolWeight { new_weight } => {
            msg!("Instruction: ChangePoolWeight (new_weight={})", new_weight);
            process_change_pool_weight(program_id, accounts, new_weight)
        }
        StakingInstruction::UpdateRewardPerSecond => {
            msg!("Instruction: UpdateRewardPerSecond");
            process_update_reward_per_second(program_id, accounts)
        }
        StakingInstruction::SetEndTime { end_time } => {
            msg!("Instruction: SetEndTime (end_time={})", end_time);
            process_set_end_time(program_id, accounts, end_time)
        }
        StakingInstruction::SetVault { vault } => {
            msg!("Instruction: SetVault");
            process_set_vault(program_id, accounts, vault)
        }
        StakingInstruction::StakeFlexible { value } => {
            msg!("Instruction: StakeFlexible (value={})", value);
            process_stake_flexible(program_id, accounts, value)
        }
        StakingInstruction::StakeAndLock {
            value,
            locked_until,
        } => {
            msg!(
                "Instruction: StakeAndLock (value={}, until={})",
                value,
                locked_until
            );
            process_stake_and_lock(program_id, accounts, value, locked_until)
        }
        StakingInstruction::UnstakeFlexible { value } => {
            msg!("Instruction: UnstakeFlexible (value={})", value);
            process_unstake_flexible(program_id, accounts, value)
        }
        StakingInstruction::UnstakeLocked { stake_id, value } => {
            msg!(
                "Instruction: UnstakeLocked (stake={}, value={})",
                stake_id,
                value
            );
            process_unstake_locked(program_id, accounts, stake_id, value)
        }
        StakingInstruction::UnstakeLockedMultiple { items, is_yield } => {
            msg!(
                "Instruction: UnstakeLockedMultiple ({} items, yield={})",
                items.len(),
                is_yield
            );
            process_unstake_locked_multiple(program_id, accounts, items, is_yield)
        }
        StakingInstruction::UpdateStakeLock {
            stake_id,
            locked_until,
        } => {
            msg!(
                "Instruction: UpdateStakeLock (stake={}, until={})",
                stake_id,
                locked_until
            );
            process_update_stake_lock(program_id, accounts, stake_id, locked_until)
        }
        StakingInstruction::ClaimRewards { use_escrow } => {
            msg!("Instruction: ClaimRewards (escrow={})", use_escrow);
            process_claim_rewards(program_id, accounts, use_escrow)
        }
        StakingInstruction::ClaimVaultRewards => {
            msg!("Instruction: ClaimVaultRewards");
            process_claim_vault_rewards(program_id, accounts)
        }
        StakingInstruction::Sync => {
            msg!("Instruction: Sync");
            process_sync(program_id, accounts)
        }
        StakingInstruction::MigrateUser { to } => {
            msg!("Instruction: MigrateUser");
            process_migrate_user(program_id, accounts, to)
        }
        StakingInstruction::ReceiveVaultRewards { amount } => {
            msg!("Instruction: ReceiveVaultRewards (amount={})", amount);
            process_receive_vault_rewards(program_id, accounts, amount)
        }
        StakingInstruction::MigrateV1Stakes { ids } => {
            msg!("Instruction: MigrateV1Stakes ({} ids)", ids.len());
            process_migrate_v1_stakes(program_id, accounts, ids)
        }
        StakingInstruction::FillV1Stake { position } => {
            msg!("Instruction: FillV1Stake (position={})", position);
            process_fill_v1_stake(program_id, accounts, position)
        }
        StakingInstruction::MintV1Yield { id } => {
            msg!("Instruction: MintV1Yield (id={})", id);
            process_mint_v1_yield(program_id, accounts, vec![id])
        }
        StakingInstruction::MintV1YieldMultiple { ids } => {
            msg!("Instruction: MintV1YieldMultiple ({} ids)", ids.len());
            process_mint_v1_yield(program_id, accounts, ids)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_serialization() {
        let instruction = StakingInstruction::InitializeFactory {
            reward_per_second: 1_000_000,
            seconds_per_update: 1_209_600,
            end_time: 1_800_000_000,
        };
        let serialized = borsh::to_vec(&instruction).unwrap();
        let deserialized: StakingInstruction =
            BorshDeserialize::try_from_slice(&serialized).unwrap();

        match deserialized {
            StakingInstruction::InitializeFactory {
                reward_per_second,
                seconds_per_update,
                end_time,
            } => {
                assert_eq!(reward_per_second, 1_000_000);
                assert_eq!(seconds_per_update, 1_209_600);
                assert_eq!(end_time, 1_800_000_000);
            }
            _ => panic!("Wrong instruction type"),
        }
    }

    #[test]
    fn test_batch_unstake_serialization() {
        let instruction = StakingInstruction::UnstakeLockedMultiple {
            items: vec![
                UnstakeItem {
                    stake_id: 0,
                    value: 100,
                },
                UnstakeItem {
                    stake_id: 3,
                    value: 250,
                },
            ],
            is_yield: true,
        };
        let serialized = borsh::to_vec(&instruction).unwrap();
        let deserialized: StakingInstruction =
            BorshDeserialize::try_from_slice(&serialized).unwrap();

        match deserialized {
            StakingInstruction::UnstakeLockedMultiple { items, is_yield } => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].stake_id, 3);
                assert_eq!(items[1].value, 250);
                assert!(is_yield);
            }
            _ => panic!("Wrong instruction type"),
        }
    }

    #[test]
    fn test_stake_and_lock_serialization() {
        let instruction = StakingInstruction::StakeAndLock {
            value: 5_000,
            locked_until: 1_750_000_000,
        };
        let serialized = borsh::to_vec(&instruction).unwrap();
        let deserialized: StakingInstruction =
            BorshDeserialize::try_from_slice(&serialized).unwrap();

        match deserialized {
            StakingInstruction::StakeAndLock {
                value,
                locked_until,
            } => {
                assert_eq!(value, 5_000);
                assert_eq!(locked_until, 1_750_000_000);
            }
            _ => panic!("Wrong instruction type"),
        }
    }
}
