//! Structured binary log events emitted via sol_log_data
//!
//! Each record is an 8-byte discriminator followed by the borsh-encoded
//! payload. Discriminators are sha256("event:<Name>")[..8].

use borsh::BorshSerialize;
use solana_program::{log::sol_log_data, pubkey::Pubkey};

use crate::state::Pool;

pub const STAKED_FLEXIBLE_DISCRIMINATOR: [u8; 8] = [0x31, 0xa7, 0x0c, 0x88, 0x5e, 0xd2, 0x49, 0xbf];
pub const STAKED_LOCKED_DISCRIMINATOR: [u8; 8] = [0x7d, 0x12, 0xe6, 0x3b, 0x90, 0x44, 0xab, 0x2c];
pub const UNSTAKED_FLEXIBLE_DISCRIMINATOR: [u8; 8] =
    [0x9e, 0x55, 0x21, 0xc7, 0x0a, 0xf3, 0x68, 0xd4];
pub const UNSTAKED_LOCKED_DISCRIMINATOR: [u8; 8] = [0x4b, 0xc9, 0x7f, 0x02, 0xe1, 0x8a, 0x36, 0x5d];
pub const LOCK_EXTENDED_DISCRIMINATOR: [u8; 8] = [0xd0, 0x6e, 0x94, 0x5a, 0x27, 0xb1, 0xcc, 0x13];
pub const SYNCED_DISCRIMINATOR: [u8; 8] = [0x62, 0x38, 0xde, 0x91, 0x4c, 0x07, 0xf5, 0xa8];
pub const REWARDS_PROCESSED_DISCRIMINATOR: [u8; 8] =
    [0x85, 0xfa, 0x43, 0x6d, 0xb9, 0x20, 0x1e, 0xc6];
pub const REWARDS_CLAIMED_DISCRIMINATOR: [u8; 8] = [0x1c, 0x83, 0xb5, 0xe9, 0x72, 0x5f, 0x0d, 0x94];
pub const VAULT_REWARDS_CLAIMED_DISCRIMINATOR: [u8; 8] =
    [0xee, 0x40, 0x19, 0xa2, 0x8c, 0x67, 0xd3, 0x0b];
pub const USER_MIGRATED_DISCRIMINATOR: [u8; 8] = [0x57, 0x2d, 0xf8, 0x14, 0xa0, 0xce, 0x6b, 0x39];
pub const POOL_REGISTERED_DISCRIMINATOR: [u8; 8] = [0xb3, 0x96, 0x0e, 0xd7, 0x58, 0x2a, 0x81, 0xf4];
pub const POOL_WEIGHT_CHANGED_DISCRIMINATOR: [u8; 8] =
    [0x2a, 0xc4, 0x67, 0x3f, 0xdb, 0x95, 0x10, 0xe8];
pub const REWARD_PER_SECOND_UPDATED_DISCRIMINATOR: [u8; 8] =
    [0x74, 0x0b, 0xd9, 0x82, 0x36, 0xef, 0xa5, 0x41];
pub const END_TIME_UPDATED_DISCRIMINATOR: [u8; 8] = [0xc8, 0x51, 0x2e, 0xb6, 0x9d, 0x03, 0x7a, 0xf0];
pub const VAULT_SET_DISCRIMINATOR: [u8; 8] = [0x09, 0xe4, 0x8b, 0x50, 0x17, 0xc2, 0xfd, 0x66];
pub const VAULT_REWARDS_RECEIVED_DISCRIMINATOR: [u8; 8] =
    [0x6f, 0xb8, 0x53, 0x0d, 0xe2, 0x79, 0x24, 0x9a];
pub const V1_STAKES_MIGRATED_DISCRIMINATOR: [u8; 8] =
    [0x43, 0x1f, 0xaa, 0x75, 0x08, 0xd6, 0xb2, 0xcd];
pub const V1_STAKE_FILLED_DISCRIMINATOR: [u8; 8] = [0xfb, 0x6a, 0x30, 0xc1, 0x94, 0x5e, 0x07, 0x28];
pub const V1_YIELD_MINTED_DISCRIMINATOR: [u8; 8] = [0x16, 0xcd, 0x78, 0x4e, 0xbb, 0x32, 0x99, 0x05];

fn emit<T: BorshSerialize>(discriminator: &[u8; 8], event: &T) {
    if let Ok(payload) = borsh::to_vec(event) {
        sol_log_data(&[discriminator, &payload]);
    }
}

#[derive(BorshSerialize)]
pub struct StakedFlexible {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub value: u64,
}

#[derive(BorshSerialize)]
pub struct StakedLocked {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub stake_id: u64,
    pub value: u64,
    pub locked_until: u64,
}

#[derive(BorshSerialize)]
pub struct UnstakedFlexible {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub value: u64,
}

#[derive(BorshSerialize)]
pub struct UnstakedLocked {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub stake_id: u64,
    pub value: u64,
    pub minted: bool,
}

#[derive(BorshSerialize)]
pub struct LockExtended {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub stake_id: u64,
    pub locked_until: u64,
}

#[derive(BorshSerialize)]
pub struct Synced {
    pub pool: Pubkey,
    pub yield_rewards_per_weight: u128,
    pub last_yield_distribution: u64,
}

#[derive(BorshSerialize)]
pub struct RewardsProcessed {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub pending_yield: u64,
    pub pending_revenue: u64,
}

#[derive(BorshSerialize)]
pub struct RewardsClaimed {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub value: u64,
    pub use_escrow: bool,
}

#[derive(BorshSerialize)]
pub struct VaultRewardsClaimed {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub value: u64,
}

#[derive(BorshSerialize)]
pub struct UserMigrated {
    pub pool: Pubkey,
    pub from: Pubkey,
    pub to: Pubkey,
}

#[derive(BorshSerialize)]
pub struct PoolRegistered {
    pub factory: Pubkey,
    pub pool: Pubkey,
    pub pool_token: Pubkey,
    pub weight: u32,
}

#[derive(BorshSerialize)]
pub struct PoolWeightChanged {
    pub factory: Pubkey,
    pub pool: Pubkey,
    pub from: u32,
    pub to: u32,
}

#[derive(BorshSerialize)]
pub struct RewardPerSecondUpdated {
    pub factory: Pubkey,
    pub reward_per_second: u64,
}

#[derive(BorshSerialize)]
pub struct EndTimeUpdated {
    pub factory: Pubkey,
    pub end_time: u64,
}

#[derive(BorshSerialize)]
pub struct VaultSet {
    pub factory: Pubkey,
    pub vault: Pubkey,
}

#[derive(BorshSerialize)]
pub struct VaultRewardsReceived {
    pub pool: Pubkey,
    pub amount: u64,
}

#[derive(BorshSerialize)]
pub struct V1StakesMigrated {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub ids: Vec<u64>,
}

#[derive(BorshSerialize)]
pub struct V1StakeFilled {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub position: u64,
    pub stake_id: u64,
}

#[derive(BorshSerialize)]
pub struct V1YieldMinted {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub ids: Vec<u64>,
    pub value: u64,
}

/// Build the weight-change event from the pool's current state. The weight
/// field is overwritten before the event is formed, so `from` reports the
/// value already in place.
pub fn pool_weight_changed(pool: &Pool, pool_address: &Pubkey, requested: u32) -> PoolWeightChanged {
    PoolWeightChanged {
        factory: pool.factory,
        pool: *pool_address,
        from: pool.weight,
        to: requested,
    }
}

pub fn emit_staked_flexible(event: &StakedFlexible) {
    emit(&STAKED_FLEXIBLE_DISCRIMINATOR, event);
}

pub fn emit_staked_locked(event: &StakedLocked) {
    emit(&STAKED_LOCKED_DISCRIMINATOR, event);
}

pub fn emit_unstaked_flexible(event: &UnstakedFlexible) {
    emit(&UNSTAKED_FLEXIBLE_DISCRIMINATOR, event);
}

pub fn emit_unstaked_locked(event: &UnstakedLocked) {
    emit(&UNSTAKED_LOCKED_DISCRIMINATOR, event);
}

pub fn emit_lock_extended(event: &LockExtended) {
    emit(&LOCK_EXTENDED_DISCRIMINATOR, event);
}

pub fn emit_synced(event: &Synced) {
    emit(&SYNCED_DISCRIMINATOR, event);
}

pub fn emit_rewards_processed(event: &RewardsProcessed) {
    emit(&REWARDS_PROCESSED_DISCRIMINATOR, event);
}

pub fn emit_rewards_claimed(event: &RewardsClaimed) {
    emit(&REWARDS_CLAIMED_DISCRIMINATOR, event);
}

pub fn emit_vault_rewards_claimed(event: &VaultRewardsClaimed) {
    emit(&VAULT_REWARDS_CLAIMED_DISCRIMINATOR, event);
}

pub fn emit_user_migrated(event: &UserMigrated) {
    emit(&USER_MIGRATED_DISCRIMINATOR, event);
}

pub fn emit_pool_registered(event: &PoolRegistered) {
    emit(&POOL_REGISTERED_DISCRIMINATOR, event);
}

pub fn emit_pool_weight_changed(event: &PoolWeightChanged) {
    emit(&POOL_WEIGHT_CHANGED_DISCRIMINATOR, event);
}

pub fn emit_reward_per_second_updated(event: &RewardPerSecondUpdated) {
    emit(&REWARD_PER_SECOND_UPDATED_DISCRIMINATOR, event);
}

pub fn emit_end_time_updated(event: &EndTimeUpdated) {
    emit(&END_TIME_UPDATED_DISCRIMINATOR, event);
}

pub fn emit_vault_set(event: &VaultSet) {
    emit(&VAULT_SET_DISCRIMINATOR, event);
}

pub fn emit_vault_rewards_received(event: &VaultRewardsReceived) {
    emit(&VAULT_REWARDS_RECEIVED_DISCRIMINATOR, event);
}

pub fn emit_v1_stakes_migrated(event: &V1StakesMigrated) {
    emit(&V1_STAKES_MIGRATED_DISCRIMINATOR, event);
}

pub fn emit_v1_stake_filled(event: &V1StakeFilled) {
    emit(&V1_STAKE_FILLED_DISCRIMINATOR, event);
}

pub fn emit_v1_yield_minted(event: &V1YieldMinted) {
    emit(&V1_YIELD_MINTED_DISCRIMINATOR, event);
}
