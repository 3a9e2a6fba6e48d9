//! Account state structures and the reward-accounting engine
//!
//! All engine methods take `now` in whole seconds so tests drive time
//! directly; instruction processors read it from the Clock sysvar.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::error::StakingError;
use crate::math::{
    self, lock_weight, pool_emission, reward_per_weight, v1_to_v2_weight, weight_to_reward,
    MAX_LOCK, WEIGHT_MULT, YEAR_WEIGHT_MULT,
};

/// Seed prefixes for PDAs
pub const FACTORY_SEED: &[u8] = b"factory";
pub const POOL_SEED: &[u8] = b"pool";
pub const USER_SEED: &[u8] = b"user";
pub const TOKEN_VAULT_SEED: &[u8] = b"token_vault";
pub const REWARD_VAULT_SEED: &[u8] = b"reward_vault";

/// Account discriminators
pub const FACTORY_DISCRIMINATOR: [u8; 8] = [0xf4, 0x3a, 0x91, 0x6c, 0x2e, 0xd8, 0x05, 0xb7];
pub const POOL_DISCRIMINATOR: [u8; 8] = [0xc1, 0x58, 0x7a, 0x2f, 0x93, 0x0b, 0xe4, 0x6d];
pub const USER_RECORD_DISCRIMINATOR: [u8; 8] = [0xa9, 0x14, 0x6e, 0xd3, 0x48, 0xbc, 0x27, 0x5a];

/// Re-entry guard states held in `Pool::guard`
pub const GUARD_IDLE: u8 = 0;
pub const GUARD_ENTERED: u8 = 1;

/// Emission registry and decay schedule.
/// PDA: ["factory", reward_mint]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Factory {
    /// Discriminator for account type identification
    pub discriminator: [u8; 8],

    /// Admin authority (pool registration, weights, end time, vault)
    pub authority: Pubkey,

    /// Native reward token mint; the factory PDA is its mint authority
    pub reward_mint: Pubkey,

    /// Escrowed reward token mint; the factory PDA is its mint authority
    pub escrow_mint: Pubkey,

    /// Privileged revenue vault allowed to push external rewards
    pub vault: Pubkey,

    /// Current emission rate in reward-token units per second
    pub reward_per_second: u64,

    /// Sum of registered pool weights
    pub total_weight: u32,

    /// Minimum interval between emission decay updates
    pub seconds_per_update: u32,

    /// Timestamp of the last emission decay update
    pub last_ratio_update: u64,

    /// Emission stops accruing past this timestamp
    pub end_time: u64,

    /// PDA bump seed
    pub bump: u8,

    /// Reserved space for future upgrades
    pub _reserved: [u8; 64],
}

impl Factory {
    /// Size of the account in bytes
    pub const LEN: usize = 8 + // discriminator
        32 + // authority
        32 + // reward_mint
        32 + // escrow_mint
        32 + // vault
        8 +  // reward_per_second
        4 +  // total_weight
        4 +  // seconds_per_update
        8 +  // last_ratio_update
        8 +  // end_time
        1 +  // bump
        64; // reserved

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        authority: Pubkey,
        reward_mint: Pubkey,
        escrow_mint: Pubkey,
        reward_per_second: u64,
        seconds_per_update: u32,
        last_ratio_update: u64,
        end_time: u64,
        bump: u8,
    ) -> Self {
        Self {
            discriminator: FACTORY_DISCRIMINATOR,
            authority,
            reward_mint,
            escrow_mint,
            vault: Pubkey::default(),
            reward_per_second,
            total_weight: 0,
            seconds_per_update,
            last_ratio_update,
            end_time,
            bump,
            _reserved: [0u8; 64],
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.discriminator == FACTORY_DISCRIMINATOR
    }

    /// Derive factory PDA
    pub fn derive_pda(reward_mint: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[FACTORY_SEED, reward_mint.as_ref()], program_id)
    }

    /// True iff the emission rate is due for its periodic decay.
    pub fn should_update_ratio(&self, now: u64) -> bool {
        now <= self.end_time
            && now >= self.last_ratio_update.saturating_add(self.seconds_per_update as u64)
    }

    /// Apply the 3% geometric decay to the emission rate.
    pub fn update_reward_per_second(&mut self, now: u64) -> Result<(), StakingError> {
        if !self.should_update_ratio(now) {
            return Err(StakingError::TooSoon);
        }
        self.reward_per_second = ((self.reward_per_second as u128
            * math::EMISSION_DECAY_NUMERATOR as u128)
            / math::EMISSION_DECAY_DENOMINATOR as u128) as u64;
        self.last_ratio_update = now;
        Ok(())
    }
}

/// A single staking position. Tombstoned (fully zeroed) entries keep their
/// list position so stake ids never shift.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stake {
    /// Staked value in pool-token units
    pub value: u64,

    /// Lock start; 0 for entries whose lock was never engaged
    pub locked_from: u64,

    /// Lock end; unstakeable strictly after this timestamp
    pub locked_until: u64,

    /// Created by the engine from a claimed reward; minted on unstake
    pub is_yield: bool,
}

impl Stake {
    /// Serialized size of one entry
    pub const LEN: usize = 8 + 8 + 8 + 1;

    pub fn is_tombstone(&self) -> bool {
        self.value == 0
    }

    /// Weight contributed by this entry.
    pub fn weight(&self) -> Result<u128, StakingError> {
        if self.is_yield {
            YEAR_WEIGHT_MULT
                .checked_mul(self.value as u128)
                .ok_or(StakingError::MathOverflow)
        } else {
            lock_weight(self.value, self.locked_from, self.locked_until)
        }
    }
}

/// Ingested v1 weight, keyed by the legacy deposit id.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct V1StakeWeight {
    pub id: u64,
    pub weight: u128,
}

impl V1StakeWeight {
    pub const LEN: usize = 8 + 16;
}

/// Per-user bookkeeping for one pool.
/// PDA: ["user", pool, owner]
///
/// The account is resized as the vectors grow; entry positions are
/// permanent identifiers.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct UserRecord {
    /// Discriminator for account type identification
    pub discriminator: [u8; 8],

    /// Owner of this record
    pub owner: Pubkey,

    /// Pool this record belongs to
    pub pool: Pubkey,

    /// Unlocked holdings; weighted at WEIGHT_MULT, not part of `stakes`
    pub flexible_balance: u64,

    /// Sum of stake weights, excluding any v1 bonus
    pub total_weight: u128,

    /// Checkpoint: effective_weight * yield_rewards_per_weight / SCALE
    /// at the end of the last operation
    pub sub_yield_rewards: u128,

    /// Checkpoint against the vault accumulator
    pub sub_vault_rewards: u128,

    /// Crystallised, not-yet-claimed yield
    pub pending_yield: u64,

    /// Crystallised, not-yet-claimed vault revenue
    pub pending_revenue: u64,

    /// PDA bump seed
    pub bump: u8,

    /// Ordered stake list; tombstones keep positions stable
    pub stakes: Vec<Stake>,

    /// Ingested v1 deposit ids; consumed slots are zeroed in place
    pub v1_stake_ids: Vec<u64>,

    /// v1 weights by deposit id; drives the reward bonus and the
    /// double-ingestion guard
    pub v1_stake_weights: Vec<V1StakeWeight>,

    /// v1 yield deposits already minted
    pub v1_yield_minted: Vec<u64>,
}

impl UserRecord {
    /// Serialized size of a record with empty vectors
    pub const BASE_LEN: usize = 8 + // discriminator
        32 + // owner
        32 + // pool
        8 +  // flexible_balance
        16 + // total_weight
        16 + // sub_yield_rewards
        16 + // sub_vault_rewards
        8 +  // pending_yield
        8 +  // pending_revenue
        1 +  // bump
        4 + 4 + 4 + 4; // vector length prefixes

    pub fn new(owner: Pubkey, pool: Pubkey, bump: u8) -> Self {
        Self {
            discriminator: USER_RECORD_DISCRIMINATOR,
            owner,
            pool,
            flexible_balance: 0,
            total_weight: 0,
            sub_yield_rewards: 0,
            sub_vault_rewards: 0,
            pending_yield: 0,
            pending_revenue: 0,
            bump,
            stakes: Vec::new(),
            v1_stake_ids: Vec::new(),
            v1_stake_weights: Vec::new(),
            v1_yield_minted: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.discriminator == USER_RECORD_DISCRIMINATOR
    }

    /// Derive user record PDA
    pub fn derive_pda(pool: &Pubkey, owner: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[USER_SEED, pool.as_ref(), owner.as_ref()], program_id)
    }

    /// Exact serialized size of the current contents.
    pub fn serialized_size(&self) -> usize {
        Self::BASE_LEN
            + self.stakes.len() * Stake::LEN
            + self.v1_stake_ids.len() * 8
            + self.v1_stake_weights.len() * V1StakeWeight::LEN
            + self.v1_yield_minted.len() * 8
    }

    /// Ingested v1 weight for a deposit id; 0 when never ingested.
    pub fn v1_weight_of(&self, id: u64) -> u128 {
        self.v1_stake_weights
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.weight)
            .unwrap_or(0)
    }

    /// Bonus weight from ingested v1 stakes, translated to v2 terms.
    ///
    /// Iterates the id slots and looks weights up by the value each slot
    /// holds, mirroring the consumed-slot semantics of the id list.
    pub fn v1_bonus_weight(&self) -> Result<u128, StakingError> {
        let mut bonus: u128 = 0;
        for id in &self.v1_stake_ids {
            let translated = v1_to_v2_weight(self.v1_weight_of(*id))?;
            bonus = bonus
                .checked_add(translated)
                .ok_or(StakingError::MathOverflow)?;
        }
        Ok(bonus)
    }

    /// Weight used for reward computation: stored weight plus v1 bonus.
    pub fn effective_weight(&self) -> Result<u128, StakingError> {
        self.total_weight
            .checked_add(self.v1_bonus_weight()?)
            .ok_or(StakingError::MathOverflow)
    }

    pub fn get_stake(&self, stake_id: usize) -> Result<&Stake, StakingError> {
        self.stakes.get(stake_id).ok_or(StakingError::StakeNotFound)
    }

    pub fn get_stakes_length(&self) -> usize {
        self.stakes.len()
    }

    pub fn get_v1_stake_id(&self, position: usize) -> Option<u64> {
        self.v1_stake_ids.get(position).copied()
    }

    /// Position of a v1 id in the slot list, by linear scan.
    ///
    /// Returns 0 both for "found at position 0" and "not found"; callers
    /// cannot tell the two apart. Kept as the legacy surface behaves.
    pub fn get_v1_stake_position(&self, id: u64) -> u64 {
        for (position, slot) in self.v1_stake_ids.iter().enumerate() {
            if *slot == id {
                return position as u64;
            }
        }
        0
    }

    /// Sum of live stake values plus the flexible balance.
    pub fn balance_of(&self) -> Result<u64, StakingError> {
        let mut total = self.flexible_balance;
        for stake in &self.stakes {
            total = total
                .checked_add(stake.value)
                .ok_or(StakingError::MathOverflow)?;
        }
        Ok(total)
    }

    /// True when the record has never accrued anything it could lose in a
    /// migration.
    pub fn is_pristine(&self) -> bool {
        self.total_weight == 0
            && self.v1_stake_ids.is_empty()
            && self.pending_yield == 0
            && self.pending_revenue == 0
    }
}

/// Per-pool state.
/// PDA: ["pool", factory, pool_token_mint]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Pool {
    /// Discriminator for account type identification
    pub discriminator: [u8; 8],

    /// Owning factory
    pub factory: Pubkey,

    /// Mint of the staked token
    pub pool_token: Pubkey,

    /// PDA token account holding deposits
    pub token_vault: Pubkey,

    /// PDA token account holding vault-injected reward tokens
    pub reward_vault: Pubkey,

    /// Share of the factory emission: pool.weight / factory.total_weight
    pub weight: u32,

    /// Flash pool marker
    pub is_flash_pool: bool,

    /// Timestamp up to which yield has been distributed
    pub last_yield_distribution: u64,

    /// Cumulative emitted reward per unit weight, scaled by SCALE
    pub yield_rewards_per_weight: u128,

    /// Cumulative vault revenue per unit weight, scaled by SCALE
    pub vault_rewards_per_weight: u128,

    /// Sum of user total_weights (v1 bonuses excluded)
    pub global_weight: u128,

    /// Deposited value plus owed (claimed-but-unstaked) yield value
    pub pool_token_reserve: u64,

    /// Program owning legacy v1 deposit accounts
    pub v1_program: Pubkey,

    /// Legacy v1 pool this pool may ingest stakes from
    pub v1_pool: Pubkey,

    /// Latest v1 lock start eligible for migration
    pub v1_stake_max_period: u64,

    /// Re-entry guard, persisted across external CPIs
    pub guard: u8,

    /// PDA bump seed
    pub bump: u8,

    /// Reserved space for future upgrades
    pub _reserved: [u8; 64],
}

impl Pool {
    /// Size of the account in bytes
    pub const LEN: usize = 8 + // discriminator
        32 + // factory
        32 + // pool_token
        32 + // token_vault
        32 + // reward_vault
        4 +  // weight
        1 +  // is_flash_pool
        8 +  // last_yield_distribution
        16 + // yield_rewards_per_weight
        16 + // vault_rewards_per_weight
        16 + // global_weight
        8 +  // pool_token_reserve
        32 + // v1_program
        32 + // v1_pool
        8 +  // v1_stake_max_period
        1 +  // guard
        1 +  // bump
        64; // reserved

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        factory: Pubkey,
        pool_token: Pubkey,
        token_vault: Pubkey,
        reward_vault: Pubkey,
        weight: u32,
        is_flash_pool: bool,
        init_time: u64,
        v1_program: Pubkey,
        v1_pool: Pubkey,
        v1_stake_max_period: u64,
        bump: u8,
    ) -> Self {
        Self {
            discriminator: POOL_DISCRIMINATOR,
            factory,
            pool_token,
            token_vault,
            reward_vault,
            weight,
            is_flash_pool,
            last_yield_distribution: init_time,
            yield_rewards_per_weight: 0,
            vault_rewards_per_weight: 0,
            global_weight: 0,
            pool_token_reserve: 0,
            v1_program,
            v1_pool,
            v1_stake_max_period,
            guard: GUARD_IDLE,
            bump,
            _reserved: [0u8; 64],
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.discriminator == POOL_DISCRIMINATOR
    }

    /// Derive pool PDA
    pub fn derive_pda(factory: &Pubkey, pool_token: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[POOL_SEED, factory.as_ref(), pool_token.as_ref()],
            program_id,
        )
    }

    /// Derive deposit vault PDA
    pub fn derive_token_vault_pda(pool: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[TOKEN_VAULT_SEED, pool.as_ref()], program_id)
    }

    /// Derive vault-reward custody PDA
    pub fn derive_reward_vault_pda(pool: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[REWARD_VAULT_SEED, pool.as_ref()], program_id)
    }

    /// The pool whose staked token is the reward token itself.
    pub fn is_reward_pool(&self, factory: &Factory) -> bool {
        self.pool_token == factory.reward_mint
    }

    /// Advance the yield accumulator to `now`.
    ///
    /// The decay check runs before the reward integral, so the first
    /// second after a decay already accrues at the decayed rate.
    pub fn sync(&mut self, factory: &mut Factory, now: u64) -> Result<(), StakingError> {
        if factory.should_update_ratio(now) {
            factory.update_reward_per_second(now)?;
        }

        let end = factory.end_time;
        if self.last_yield_distribution >= end {
            return Ok(());
        }
        if now <= self.last_yield_distribution {
            return Ok(());
        }
        if self.global_weight == 0 {
            self.last_yield_distribution = now;
            return Ok(());
        }

        let cap = now.min(end);
        let elapsed = cap - self.last_yield_distribution;
        let reward = pool_emission(
            elapsed,
            factory.reward_per_second,
            self.weight,
            factory.total_weight,
        )?;
        self.yield_rewards_per_weight = self
            .yield_rewards_per_weight
            .checked_add(reward_per_weight(reward, self.global_weight)?)
            .ok_or(StakingError::MathOverflow)?;
        self.last_yield_distribution = cap;
        Ok(())
    }

    /// Crystallise the user's accrued yield and vault revenue into the
    /// pending fields. Callers must refresh the checkpoints via
    /// [`Pool::refresh_reward_checkpoints`] once the operation's weight
    /// changes are applied.
    pub fn process_rewards(&self, user: &mut UserRecord) -> Result<(u64, u64), StakingError> {
        let effective = user.effective_weight()?;

        let yield_total = weight_to_reward(effective, self.yield_rewards_per_weight)?;
        let pending_yield = yield_total
            .checked_sub(user.sub_yield_rewards)
            .ok_or(StakingError::MathOverflow)?;

        let vault_total = weight_to_reward(effective, self.vault_rewards_per_weight)?;
        let pending_revenue = vault_total
            .checked_sub(user.sub_vault_rewards)
            .ok_or(StakingError::MathOverflow)?;

        let pending_yield = u64::try_from(pending_yield).map_err(|_| StakingError::MathOverflow)?;
        let pending_revenue =
            u64::try_from(pending_revenue).map_err(|_| StakingError::MathOverflow)?;

        user.pending_yield = user
            .pending_yield
            .checked_add(pending_yield)
            .ok_or(StakingError::MathOverflow)?;
        user.pending_revenue = user
            .pending_revenue
            .checked_add(pending_revenue)
            .ok_or(StakingError::MathOverflow)?;
        Ok((pending_yield, pending_revenue))
    }

    /// Reset both checkpoints from the user's post-operation effective
    /// weight. The final step of every mutating operation.
    pub fn refresh_reward_checkpoints(&self, user: &mut UserRecord) -> Result<(), StakingError> {
        let effective = user.effective_weight()?;
        user.sub_yield_rewards = weight_to_reward(effective, self.yield_rewards_per_weight)?;
        user.sub_vault_rewards = weight_to_reward(effective, self.vault_rewards_per_weight)?;
        Ok(())
    }

    fn add_user_weight(&mut self, user: &mut UserRecord, weight: u128) -> Result<(), StakingError> {
        user.total_weight = user
            .total_weight
            .checked_add(weight)
            .ok_or(StakingError::MathOverflow)?;
        self.global_weight = self
            .global_weight
            .checked_add(weight)
            .ok_or(StakingError::MathOverflow)?;
        Ok(())
    }

    fn remove_user_weight(
        &mut self,
        user: &mut UserRecord,
        weight: u128,
    ) -> Result<(), StakingError> {
        user.total_weight = user
            .total_weight
            .checked_sub(weight)
            .ok_or(StakingError::MathOverflow)?;
        self.global_weight = self
            .global_weight
            .checked_sub(weight)
            .ok_or(StakingError::MathOverflow)?;
        Ok(())
    }

    fn add_reserve(&mut self, value: u64) -> Result<(), StakingError> {
        self.pool_token_reserve = self
            .pool_token_reserve
            .checked_add(value)
            .ok_or(StakingError::MathOverflow)?;
        Ok(())
    }

    fn remove_reserve(&mut self, value: u64) -> Result<(), StakingError> {
        self.pool_token_reserve = self
            .pool_token_reserve
            .checked_sub(value)
            .ok_or(StakingError::MathOverflow)?;
        Ok(())
    }

    /// Credit a measured flexible deposit.
    pub fn deposit_flexible(
        &mut self,
        user: &mut UserRecord,
        added_value: u64,
    ) -> Result<(), StakingError> {
        if added_value == 0 {
            return Err(StakingError::ZeroValue);
        }
        user.flexible_balance = user
            .flexible_balance
            .checked_add(added_value)
            .ok_or(StakingError::MathOverflow)?;
        let weight = (added_value as u128)
            .checked_mul(WEIGHT_MULT)
            .ok_or(StakingError::MathOverflow)?;
        self.add_user_weight(user, weight)?;
        self.add_reserve(added_value)
    }

    /// Credit a measured locked deposit; returns the new stake id.
    pub fn deposit_locked(
        &mut self,
        user: &mut UserRecord,
        added_value: u64,
        locked_until: u64,
        now: u64,
    ) -> Result<usize, StakingError> {
        if added_value == 0 {
            return Err(StakingError::ZeroValue);
        }
        if locked_until <= now || locked_until - now > MAX_LOCK {
            return Err(StakingError::InvalidLock);
        }
        let stake = Stake {
            value: added_value,
            locked_from: now,
            locked_until,
            is_yield: false,
        };
        let weight = stake.weight()?;
        let stake_id = user.stakes.len();
        user.stakes.push(stake);
        self.add_user_weight(user, weight)?;
        self.add_reserve(added_value)?;
        Ok(stake_id)
    }

    /// Debit a flexible withdrawal.
    pub fn withdraw_flexible(
        &mut self,
        user: &mut UserRecord,
        value: u64,
    ) -> Result<(), StakingError> {
        if value == 0 {
            return Err(StakingError::ZeroValue);
        }
        if user.flexible_balance < value {
            return Err(StakingError::InsufficientBalance);
        }
        user.flexible_balance -= value;
        let weight = (value as u128)
            .checked_mul(WEIGHT_MULT)
            .ok_or(StakingError::MathOverflow)?;
        self.remove_user_weight(user, weight)?;
        self.remove_reserve(value)
    }

    /// Remove `value` from the stake at `stake_id`, tombstoning it when
    /// fully drained. Returns whether the drained value is yield (minted
    /// on the way out) rather than vault-held.
    pub fn unstake_locked(
        &mut self,
        user: &mut UserRecord,
        stake_id: usize,
        value: u64,
        now: u64,
    ) -> Result<bool, StakingError> {
        if value == 0 {
            return Err(StakingError::ZeroValue);
        }
        let stake = *user.get_stake(stake_id)?;
        if now <= stake.locked_until {
            return Err(StakingError::StillLocked);
        }
        if stake.value < value {
            return Err(StakingError::ValueExceedsStake);
        }

        let old_weight = stake.weight()?;
        let remaining = stake.value - value;
        let entry = &mut user.stakes[stake_id];
        if remaining == 0 {
            *entry = Stake::default();
        } else {
            entry.value = remaining;
        }
        let new_weight = user.stakes[stake_id].weight()?;

        self.remove_user_weight(user, old_weight - new_weight)?;
        self.remove_reserve(value)?;
        Ok(stake.is_yield)
    }

    /// Extend the lock of an existing stake.
    pub fn extend_stake_lock(
        &mut self,
        user: &mut UserRecord,
        stake_id: usize,
        new_locked_until: u64,
        now: u64,
    ) -> Result<(), StakingError> {
        let stake = *user.get_stake(stake_id)?;
        if stake.is_tombstone() {
            return Err(StakingError::StakeNotFound);
        }
        if new_locked_until <= now || new_locked_until <= stake.locked_until {
            return Err(StakingError::InvalidLockExtension);
        }
        if stake.locked_from == 0 {
            if new_locked_until - now > MAX_LOCK {
                return Err(StakingError::InvalidLockExtension);
            }
        } else if new_locked_until - stake.locked_from > MAX_LOCK {
            return Err(StakingError::InvalidLockExtension);
        }

        let old_weight = stake.weight()?;
        let entry = &mut user.stakes[stake_id];
        if entry.locked_from == 0 {
            entry.locked_from = now;
        }
        entry.locked_until = new_locked_until;
        let new_weight = user.stakes[stake_id].weight()?;

        if new_weight >= old_weight {
            self.add_user_weight(user, new_weight - old_weight)?;
        } else {
            self.remove_user_weight(user, old_weight - new_weight)?;
        }
        Ok(())
    }

    /// Open the max-lock yield stake that compounds a claimed reward.
    /// The value is owed, not transferred, so the reserve grows without a
    /// deposit; unstaking mints it.
    pub fn stake_claimed_yield(
        &mut self,
        user: &mut UserRecord,
        value: u64,
        now: u64,
    ) -> Result<usize, StakingError> {
        let stake = Stake {
            value,
            locked_from: now,
            locked_until: now.checked_add(MAX_LOCK).ok_or(StakingError::MathOverflow)?,
            is_yield: true,
        };
        let weight = stake.weight()?;
        let stake_id = user.stakes.len();
        user.stakes.push(stake);
        self.add_user_weight(user, weight)?;
        self.add_reserve(value)?;
        Ok(stake_id)
    }

    /// Record an ingested v1 stake. The value stays in the v1 pool; only
    /// the translated weight participates in reward computation, as a
    /// bonus outside the stored weight fields.
    pub fn ingest_v1_stake(
        &mut self,
        user: &mut UserRecord,
        id: u64,
        v1_weight: u128,
        v1_locked_from: u64,
        v1_is_yield: bool,
    ) -> Result<(), StakingError> {
        if v1_is_yield || v1_locked_from == 0 || v1_locked_from > self.v1_stake_max_period {
            return Err(StakingError::V1StakeRejected);
        }
        if user.v1_weight_of(id) != 0 {
            return Err(StakingError::AlreadyMigrated);
        }
        user.v1_stake_ids.push(id);
        user.v1_stake_weights.push(V1StakeWeight {
            id,
            weight: v1_weight,
        });
        Ok(())
    }

    /// Materialise a matured v1 stake into a real stake at `position`.
    pub fn fill_v1_stake(
        &mut self,
        user: &mut UserRecord,
        position: usize,
        v1_value: u64,
        v1_locked_from: u64,
        v1_locked_until: u64,
        now: u64,
    ) -> Result<usize, StakingError> {
        let id = user
            .get_v1_stake_id(position)
            .ok_or(StakingError::StakeNotFound)?;
        if user.v1_weight_of(id) == 0 {
            return Err(StakingError::AlreadyMigrated);
        }
        if now <= v1_locked_until {
            return Err(StakingError::StillLocked);
        }

        let stake = Stake {
            value: v1_value,
            locked_from: v1_locked_from,
            locked_until: v1_locked_until,
            is_yield: false,
        };
        let weight = stake.weight()?;
        let stake_id = user.stakes.len();
        user.stakes.push(stake);
        self.add_user_weight(user, weight)?;
        self.add_reserve(v1_value)?;

        user.v1_stake_ids[position] = 0;
        if let Some(entry) = user.v1_stake_weights.iter_mut().find(|e| e.id == id) {
            entry.weight = 0;
        }
        Ok(stake_id)
    }

    /// Record that a matured v1 yield deposit has been minted out.
    pub fn record_v1_yield_minted(
        &mut self,
        user: &mut UserRecord,
        id: u64,
        v1_locked_until: u64,
        v1_is_yield: bool,
        now: u64,
    ) -> Result<(), StakingError> {
        if !v1_is_yield {
            return Err(StakingError::V1StakeRejected);
        }
        if now <= v1_locked_until {
            return Err(StakingError::StillLocked);
        }
        if user.v1_yield_minted.contains(&id) {
            return Err(StakingError::AlreadyMigrated);
        }
        user.v1_yield_minted.push(id);
        Ok(())
    }

    /// Move a user's aggregates wholesale into a pristine destination
    /// record, tombstoning the source stakes.
    ///
    /// The v1 id slots are cleared without being copied, so any v1 bonus
    /// is lost in migration; the weights table stays behind, keeping the
    /// double-ingestion guard armed.
    pub fn migrate_user(
        &self,
        source: &mut UserRecord,
        destination: &mut UserRecord,
    ) -> Result<(), StakingError> {
        if !destination.is_pristine() {
            return Err(StakingError::DestinationNotEmpty);
        }

        destination.flexible_balance = source.flexible_balance;
        destination.total_weight = source.total_weight;
        destination.sub_yield_rewards = source.sub_yield_rewards;
        destination.sub_vault_rewards = source.sub_vault_rewards;
        destination.pending_yield = source.pending_yield;
        destination.pending_revenue = source.pending_revenue;
        destination.stakes = source.stakes.clone();

        for stake in source.stakes.iter_mut() {
            *stake = Stake::default();
        }
        source.flexible_balance = 0;
        source.total_weight = 0;
        source.sub_yield_rewards = 0;
        source.sub_vault_rewards = 0;
        source.pending_yield = 0;
        source.pending_revenue = 0;
        source.v1_stake_ids.clear();
        Ok(())
    }

    /// Distribute externally-injected revenue over the current weight.
    pub fn receive_vault_rewards(&mut self, amount: u64) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroValue);
        }
        self.vault_rewards_per_weight = self
            .vault_rewards_per_weight
            .checked_add(reward_per_weight(amount as u128, self.global_weight)?)
            .ok_or(StakingError::MathOverflow)?;
        Ok(())
    }

    /// Projected (yield, revenue) claimable by `user` at `now`, advancing
    /// the yield accumulator virtually at the current emission rate.
    pub fn pending_rewards(
        &self,
        factory: &Factory,
        user: &UserRecord,
        now: u64,
    ) -> Result<(u64, u64), StakingError> {
        let mut yield_rpw = self.yield_rewards_per_weight;
        let end = factory.end_time;
        if self.global_weight > 0 && self.last_yield_distribution < end {
            let cap = now.min(end);
            if cap > self.last_yield_distribution {
                let elapsed = cap - self.last_yield_distribution;
                let reward = pool_emission(
                    elapsed,
                    factory.reward_per_second,
                    self.weight,
                    factory.total_weight,
                )?;
                yield_rpw = yield_rpw
                    .checked_add(reward_per_weight(reward, self.global_weight)?)
                    .ok_or(StakingError::MathOverflow)?;
            }
        }

        let effective = user.effective_weight()?;
        let pending_yield = weight_to_reward(effective, yield_rpw)?
            .checked_sub(user.sub_yield_rewards)
            .ok_or(StakingError::MathOverflow)?
            .checked_add(user.pending_yield as u128)
            .ok_or(StakingError::MathOverflow)?;
        let pending_revenue = weight_to_reward(effective, self.vault_rewards_per_weight)?
            .checked_sub(user.sub_vault_rewards)
            .ok_or(StakingError::MathOverflow)?
            .checked_add(user.pending_revenue as u128)
            .ok_or(StakingError::MathOverflow)?;

        Ok((
            u64::try_from(pending_yield).map_err(|_| StakingError::MathOverflow)?,
            u64::try_from(pending_revenue).map_err(|_| StakingError::MathOverflow)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::REWARD_PER_WEIGHT_MULT;

    const INIT: u64 = 1_000_000;
    const R: u64 = 1_000;

    fn factory_fixture(reward_per_second: u64, total_weight: u32, end_time: u64) -> Factory {
        let mut factory = Factory::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            reward_per_second,
            u32::MAX,
            INIT,
            end_time,
            255,
        );
        factory.total_weight = total_weight;
        factory
    }

    fn pool_fixture(weight: u32) -> Pool {
        Pool::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            weight,
            false,
            INIT,
            Pubkey::default(),
            Pubkey::default(),
            0,
            255,
        )
    }

    fn user_fixture() -> UserRecord {
        UserRecord::new(Pubkey::new_unique(), Pubkey::new_unique(), 255)
    }

    #[test]
    fn test_factory_size() {
        let factory = factory_fixture(R, 200, u64::MAX);
        let serialized = borsh::to_vec(&factory).unwrap();
        assert_eq!(serialized.len(), Factory::LEN);
    }

    #[test]
    fn test_pool_size() {
        let pool = pool_fixture(200);
        let serialized = borsh::to_vec(&pool).unwrap();
        assert_eq!(serialized.len(), Pool::LEN);
    }

    #[test]
    fn test_user_record_size_tracks_contents() {
        let mut user = user_fixture();
        assert_eq!(
            borsh::to_vec(&user).unwrap().len(),
            user.serialized_size()
        );

        user.stakes.push(Stake::default());
        user.stakes.push(Stake::default());
        user.v1_stake_ids.push(7);
        user.v1_stake_weights.push(V1StakeWeight { id: 7, weight: 1 });
        user.v1_yield_minted.push(9);
        assert_eq!(
            borsh::to_vec(&user).unwrap().len(),
            user.serialized_size()
        );
    }

    #[test]
    fn test_single_flexible_staker_accrues_full_emission() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        assert_eq!(alice.total_weight, 100 * WEIGHT_MULT);
        assert_eq!(pool.global_weight, 100 * WEIGHT_MULT);
        assert_eq!(pool.pool_token_reserve, 100);

        let (pending, _) = pool
            .pending_rewards(&factory, &alice, INIT + 10)
            .unwrap();
        assert_eq!(pending, 10 * R);

        pool.sync(&mut factory, INIT + 10).unwrap();
        let (yielded, revenue) = pool.process_rewards(&mut alice).unwrap();
        assert_eq!(yielded, 10 * R);
        assert_eq!(revenue, 0);
        assert_eq!(alice.pending_yield, 10 * R);
    }

    #[test]
    fn test_two_stakers_with_lock_split() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();
        let mut bob = user_fixture();

        pool.deposit_flexible(&mut alice, 10).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();

        pool.sync(&mut factory, INIT + 50).unwrap();
        pool.process_rewards(&mut bob).unwrap();
        pool.deposit_locked(&mut bob, 5_000, INIT + 50 + MAX_LOCK, INIT + 50)
            .unwrap();
        pool.refresh_reward_checkpoints(&mut bob).unwrap();
        assert_eq!(bob.total_weight, 5_000 * 2 * WEIGHT_MULT);

        pool.sync(&mut factory, INIT + 200).unwrap();
        let (alice_yield, _) = pool.process_rewards(&mut alice).unwrap();
        let (bob_yield, _) = pool.process_rewards(&mut bob).unwrap();

        // Alice: 50R alone, then 150R at 10e6 / 10_010e6 of the weight
        assert_eq!(alice_yield, 50_149);
        // Bob: 150R at 10_000e6 / 10_010e6 of the weight
        assert_eq!(bob_yield, 149_850);
        // Conservation modulo truncation
        let emitted = 200 * R;
        assert!(alice_yield + bob_yield <= emitted);
        assert!(emitted - (alice_yield + bob_yield) <= 2);
    }

    #[test]
    fn test_lock_extension_engages_lock_from_now() {
        // A stake whose lock was never engaged (locked_from == 0) starts
        // its period at extension time.
        let start = 1_000u64;
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        let stake = Stake {
            value: 100,
            locked_from: 0,
            locked_until: start + 11,
            is_yield: false,
        };
        let weight = stake.weight().unwrap();
        user.stakes.push(stake);
        user.total_weight = weight;
        pool.global_weight = weight;

        let now = start + 10;
        pool.extend_stake_lock(&mut user, 0, now + MAX_LOCK, now).unwrap();

        let updated = user.stakes[0];
        assert_eq!(updated.locked_from, now);
        assert_eq!(updated.locked_until, now + MAX_LOCK);
        assert_eq!(user.total_weight, 100 * 2 * WEIGHT_MULT);
        assert_eq!(pool.global_weight, 100 * 2 * WEIGHT_MULT);
    }

    #[test]
    fn test_lock_extension_bounded_by_lock_start() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        pool.deposit_locked(&mut user, 100, INIT + 11, INIT).unwrap();
        pool.refresh_reward_checkpoints(&mut user).unwrap();

        pool.sync(&mut factory, INIT + 10).unwrap();

        // The period is anchored at locked_from, not at extension time
        assert_eq!(
            pool.extend_stake_lock(&mut user, 0, INIT + 10 + MAX_LOCK, INIT + 10),
            Err(StakingError::InvalidLockExtension)
        );

        pool.extend_stake_lock(&mut user, 0, INIT + MAX_LOCK, INIT + 10)
            .unwrap();
        let updated = user.stakes[0];
        assert_eq!(updated.locked_from, INIT);
        assert_eq!(user.total_weight, 100 * 2 * WEIGHT_MULT);

        // Must strictly grow
        assert_eq!(
            pool.extend_stake_lock(&mut user, 0, INIT + MAX_LOCK, INIT + 20),
            Err(StakingError::InvalidLockExtension)
        );
    }

    #[test]
    fn test_compound_claim_opens_yield_stake() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();

        pool.deposit_locked(&mut alice, 100, INIT + MAX_LOCK, INIT).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        assert_eq!(pool.pool_token_reserve, 100);

        let now = INIT + 100;
        pool.sync(&mut factory, now).unwrap();
        pool.process_rewards(&mut alice).unwrap();
        let accrued = alice.pending_yield;
        assert_eq!(accrued, 100 * R);

        alice.pending_yield = 0;
        let stake_id = pool.stake_claimed_yield(&mut alice, accrued, now).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();

        assert_eq!(stake_id, 1);
        let stake = alice.stakes[stake_id];
        assert_eq!(stake.value, accrued);
        assert_eq!(stake.locked_from, now);
        assert_eq!(stake.locked_until, now + MAX_LOCK);
        assert!(stake.is_yield);
        assert_eq!(pool.pool_token_reserve, 100 + accrued);
        assert_eq!(
            pool.global_weight,
            100 * 2 * WEIGHT_MULT + YEAR_WEIGHT_MULT * accrued as u128
        );
    }

    #[test]
    fn test_emission_stops_at_end_time() {
        let end = INIT + 100;
        let mut factory = factory_fixture(R, 200, end);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();

        pool.sync(&mut factory, end + 40).unwrap();
        let rpw_at_end = pool.yield_rewards_per_weight;
        assert_eq!(pool.last_yield_distribution, end);

        pool.sync(&mut factory, end + 500).unwrap();
        assert_eq!(pool.yield_rewards_per_weight, rpw_at_end);

        let (pending_late, _) = pool
            .pending_rewards(&factory, &alice, end + 1_000)
            .unwrap();
        assert_eq!(pending_late, 100 * R);
    }

    #[test]
    fn test_decay_applies_before_integration() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        factory.seconds_per_update = 100;
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();

        // The decay lands before the interval is integrated, so the whole
        // 100s window already pays the decayed rate
        pool.sync(&mut factory, INIT + 100).unwrap();
        assert_eq!(factory.reward_per_second, R * 97 / 100);

        let (pending, _) = pool.process_rewards(&mut alice).unwrap();
        assert_eq!(pending, 100 * (R * 97 / 100));
    }

    #[test]
    fn test_ratio_update_too_soon() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        factory.seconds_per_update = 100;

        assert_eq!(
            factory.update_reward_per_second(INIT + 99),
            Err(StakingError::TooSoon)
        );
        factory.update_reward_per_second(INIT + 100).unwrap();
        assert_eq!(factory.reward_per_second, 970);
        assert_eq!(factory.last_ratio_update, INIT + 100);

        // Past end_time the schedule is frozen
        factory.end_time = INIT + 150;
        assert_eq!(
            factory.update_reward_per_second(INIT + 250),
            Err(StakingError::TooSoon)
        );
    }

    #[test]
    fn test_sync_idempotent() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();

        pool.deposit_flexible(&mut alice, 42).unwrap();
        pool.sync(&mut factory, INIT + 30).unwrap();
        let rpw = pool.yield_rewards_per_weight;
        let last = pool.last_yield_distribution;

        pool.sync(&mut factory, INIT + 30).unwrap();
        assert_eq!(pool.yield_rewards_per_weight, rpw);
        assert_eq!(pool.last_yield_distribution, last);
    }

    #[test]
    fn test_sync_with_no_weight_skips_interval() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);

        pool.sync(&mut factory, INIT + 500).unwrap();
        assert_eq!(pool.yield_rewards_per_weight, 0);
        assert_eq!(pool.last_yield_distribution, INIT + 500);

        // A staker arriving later earns nothing retroactively
        let mut alice = user_fixture();
        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        pool.sync(&mut factory, INIT + 510).unwrap();
        let (pending, _) = pool.process_rewards(&mut alice).unwrap();
        assert_eq!(pending, 10 * R);
    }

    #[test]
    fn test_checkpoint_invariant_after_operations() {
        let mut factory = factory_fixture(R, 1_000, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        assert_eq!(
            alice.sub_yield_rewards,
            alice.total_weight * pool.yield_rewards_per_weight / REWARD_PER_WEIGHT_MULT
        );

        pool.sync(&mut factory, INIT + 77).unwrap();
        pool.process_rewards(&mut alice).unwrap();
        pool.deposit_locked(&mut alice, 900, INIT + 77 + MAX_LOCK / 2, INIT + 77)
            .unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        assert_eq!(
            alice.sub_yield_rewards,
            alice.total_weight * pool.yield_rewards_per_weight / REWARD_PER_WEIGHT_MULT
        );

        pool.sync(&mut factory, INIT + 154).unwrap();
        pool.process_rewards(&mut alice).unwrap();
        pool.withdraw_flexible(&mut alice, 40).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        assert_eq!(
            alice.sub_yield_rewards,
            alice.total_weight * pool.yield_rewards_per_weight / REWARD_PER_WEIGHT_MULT
        );
        assert_eq!(pool.global_weight, alice.total_weight);
    }

    #[test]
    fn test_identical_histories_earn_identically() {
        let mut factory = factory_fixture(1_001, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();
        let mut bob = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        pool.deposit_flexible(&mut bob, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut bob).unwrap();

        pool.sync(&mut factory, INIT + 33).unwrap();
        let (a, _) = pool.process_rewards(&mut alice).unwrap();
        let (b, _) = pool.process_rewards(&mut bob).unwrap();
        assert!(a.abs_diff(b) <= 1);
    }

    #[test]
    fn test_distribution_conserves_emission() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();
        let mut bob = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        pool.deposit_flexible(&mut bob, 300).unwrap();
        pool.refresh_reward_checkpoints(&mut bob).unwrap();

        pool.sync(&mut factory, INIT + 10).unwrap();
        let (a, _) = pool.process_rewards(&mut alice).unwrap();
        let (b, _) = pool.process_rewards(&mut bob).unwrap();
        assert_eq!(a, 2_500);
        assert_eq!(b, 7_500);
        assert_eq!(a + b, 10 * R);
    }

    #[test]
    fn test_unstake_locked_guards() {
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        pool.deposit_locked(&mut user, 500, INIT + 1_000, INIT).unwrap();

        assert_eq!(
            pool.unstake_locked(&mut user, 0, 100, INIT + 1_000),
            Err(StakingError::StillLocked)
        );
        assert_eq!(
            pool.unstake_locked(&mut user, 0, 0, INIT + 1_001),
            Err(StakingError::ZeroValue)
        );
        assert_eq!(
            pool.unstake_locked(&mut user, 0, 501, INIT + 1_001),
            Err(StakingError::ValueExceedsStake)
        );
        assert_eq!(
            pool.unstake_locked(&mut user, 1, 1, INIT + 1_001),
            Err(StakingError::StakeNotFound)
        );
    }

    #[test]
    fn test_partial_unstake_preserves_positions() {
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        pool.deposit_locked(&mut user, 500, INIT + 100, INIT).unwrap();
        pool.deposit_locked(&mut user, 700, INIT + 100, INIT).unwrap();

        pool.unstake_locked(&mut user, 0, 200, INIT + 101).unwrap();
        assert_eq!(user.stakes[0].value, 300);

        pool.unstake_locked(&mut user, 0, 300, INIT + 101).unwrap();
        assert!(user.stakes[0].is_tombstone());
        assert_eq!(user.stakes.len(), 2);
        assert_eq!(user.stakes[1].value, 700);
        assert_eq!(pool.pool_token_reserve, 700);

        // A drained position never pays again
        assert_eq!(
            pool.unstake_locked(&mut user, 0, 1, INIT + 101),
            Err(StakingError::ValueExceedsStake)
        );
    }

    #[test]
    fn test_unstake_yield_stake_reports_mint() {
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        let id = pool.stake_claimed_yield(&mut user, 1_000, INIT).unwrap();
        assert_eq!(pool.pool_token_reserve, 1_000);

        let minted = pool
            .unstake_locked(&mut user, id, 1_000, INIT + MAX_LOCK + 1)
            .unwrap();
        assert!(minted);
        assert_eq!(pool.pool_token_reserve, 0);
        assert_eq!(user.total_weight, 0);
        assert_eq!(pool.global_weight, 0);
    }

    #[test]
    fn test_withdraw_flexible_guards() {
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        pool.deposit_flexible(&mut user, 100).unwrap();
        assert_eq!(
            pool.withdraw_flexible(&mut user, 0),
            Err(StakingError::ZeroValue)
        );
        assert_eq!(
            pool.withdraw_flexible(&mut user, 101),
            Err(StakingError::InsufficientBalance)
        );
        pool.withdraw_flexible(&mut user, 100).unwrap();
        assert_eq!(user.flexible_balance, 0);
        assert_eq!(user.total_weight, 0);
    }

    #[test]
    fn test_invalid_lock_bounds() {
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        assert_eq!(
            pool.deposit_locked(&mut user, 100, INIT, INIT),
            Err(StakingError::InvalidLock)
        );
        assert_eq!(
            pool.deposit_locked(&mut user, 100, INIT + MAX_LOCK + 1, INIT),
            Err(StakingError::InvalidLock)
        );
        pool.deposit_locked(&mut user, 100, INIT + MAX_LOCK, INIT).unwrap();
    }

    #[test]
    fn test_vault_rewards_parallel_accumulator() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();

        pool.receive_vault_rewards(500).unwrap();
        pool.sync(&mut factory, INIT + 10).unwrap();

        let (yielded, revenue) = pool.process_rewards(&mut alice).unwrap();
        assert_eq!(yielded, 10 * R);
        assert_eq!(revenue, 500);
        assert_eq!(alice.pending_revenue, 500);
    }

    #[test]
    fn test_vault_rewards_require_weight() {
        let mut pool = pool_fixture(200);
        assert_eq!(
            pool.receive_vault_rewards(500),
            Err(StakingError::NoStakedWeight)
        );
    }

    #[test]
    fn test_vault_rewards_not_retroactive() {
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();
        let mut bob = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        pool.receive_vault_rewards(500).unwrap();

        pool.deposit_flexible(&mut bob, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut bob).unwrap();

        let (_, alice_revenue) = pool.process_rewards(&mut alice).unwrap();
        let (_, bob_revenue) = pool.process_rewards(&mut bob).unwrap();
        assert_eq!(alice_revenue, 500);
        assert_eq!(bob_revenue, 0);
    }

    #[test]
    fn test_v1_bonus_only_affects_rewards() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        pool.v1_stake_max_period = u64::MAX;
        let mut alice = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();

        pool.ingest_v1_stake(&mut alice, 7, 10_000_000, INIT - 100, false)
            .unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();

        // Stored weights untouched, effective weight carries w * 3
        assert_eq!(alice.total_weight, 100 * WEIGHT_MULT);
        assert_eq!(pool.global_weight, 100 * WEIGHT_MULT);
        assert_eq!(
            alice.effective_weight().unwrap(),
            100 * WEIGHT_MULT + 30_000_000
        );

        pool.sync(&mut factory, INIT + 10).unwrap();
        let (pending, _) = pool.process_rewards(&mut alice).unwrap();
        // 130e6 effective weight against a 100e6 denominator
        assert_eq!(pending, 13_000);
    }

    #[test]
    fn test_v1_ingestion_guards() {
        let mut pool = pool_fixture(200);
        pool.v1_stake_max_period = INIT;
        let mut user = user_fixture();

        assert_eq!(
            pool.ingest_v1_stake(&mut user, 1, 500, 0, false),
            Err(StakingError::V1StakeRejected)
        );
        assert_eq!(
            pool.ingest_v1_stake(&mut user, 1, 500, INIT + 1, false),
            Err(StakingError::V1StakeRejected)
        );
        assert_eq!(
            pool.ingest_v1_stake(&mut user, 1, 500, INIT - 1, true),
            Err(StakingError::V1StakeRejected)
        );

        pool.ingest_v1_stake(&mut user, 1, 500, INIT - 1, false).unwrap();
        assert_eq!(
            pool.ingest_v1_stake(&mut user, 1, 500, INIT - 1, false),
            Err(StakingError::AlreadyMigrated)
        );
    }

    #[test]
    fn test_fill_v1_stake_materialises_value() {
        let mut pool = pool_fixture(200);
        pool.v1_stake_max_period = u64::MAX;
        let mut user = user_fixture();

        pool.ingest_v1_stake(&mut user, 7, 777_000_000, 100, false).unwrap();
        let bonus = user.v1_bonus_weight().unwrap();
        assert_eq!(bonus, 777_000_000 * 3);

        assert_eq!(
            pool.fill_v1_stake(&mut user, 0, 500, 100, 5_000, 5_000),
            Err(StakingError::StillLocked)
        );

        let stake_id = pool.fill_v1_stake(&mut user, 0, 500, 100, 5_000, 6_000).unwrap();
        let stake = user.stakes[stake_id];
        assert_eq!(stake.value, 500);
        assert_eq!(stake.locked_from, 100);
        assert_eq!(stake.locked_until, 5_000);
        assert!(!stake.is_yield);
        assert_eq!(user.total_weight, stake.weight().unwrap());
        assert_eq!(pool.global_weight, user.total_weight);
        assert_eq!(pool.pool_token_reserve, 500);

        // The slot is consumed and the bonus is gone
        assert_eq!(user.v1_stake_ids[0], 0);
        assert_eq!(user.v1_bonus_weight().unwrap(), 0);
        assert_eq!(
            pool.fill_v1_stake(&mut user, 0, 500, 100, 5_000, 6_000),
            Err(StakingError::AlreadyMigrated)
        );
    }

    #[test]
    fn test_mint_v1_yield_guards() {
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        assert_eq!(
            pool.record_v1_yield_minted(&mut user, 3, 5_000, false, 6_000),
            Err(StakingError::V1StakeRejected)
        );
        assert_eq!(
            pool.record_v1_yield_minted(&mut user, 3, 5_000, true, 5_000),
            Err(StakingError::StillLocked)
        );
        pool.record_v1_yield_minted(&mut user, 3, 5_000, true, 6_000).unwrap();
        assert_eq!(
            pool.record_v1_yield_minted(&mut user, 3, 5_000, true, 6_000),
            Err(StakingError::AlreadyMigrated)
        );
    }

    #[test]
    fn test_v1_stake_position_is_ambiguous_at_zero() {
        let mut pool = pool_fixture(200);
        pool.v1_stake_max_period = u64::MAX;
        let mut user = user_fixture();

        pool.ingest_v1_stake(&mut user, 5, 100, 10, false).unwrap();

        // Found at position 0 and not-found both report 0
        assert_eq!(user.get_v1_stake_position(5), 0);
        assert_eq!(user.get_v1_stake_position(99), 0);
    }

    #[test]
    fn test_migrate_user_moves_aggregates() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();
        let mut bob = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.deposit_locked(&mut alice, 50, INIT + MAX_LOCK, INIT).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        pool.sync(&mut factory, INIT + 10).unwrap();
        pool.process_rewards(&mut alice).unwrap();

        let moved_weight = alice.total_weight;
        let moved_pending = alice.pending_yield;
        let moved_sub = alice.sub_yield_rewards;
        assert!(moved_pending > 0);

        pool.migrate_user(&mut alice, &mut bob).unwrap();

        assert_eq!(bob.flexible_balance, 100);
        assert_eq!(bob.total_weight, moved_weight);
        assert_eq!(bob.pending_yield, moved_pending);
        assert_eq!(bob.sub_yield_rewards, moved_sub);
        assert_eq!(bob.stakes.len(), 2);
        assert_eq!(bob.stakes[1].value, 50);

        assert_eq!(alice.flexible_balance, 0);
        assert_eq!(alice.total_weight, 0);
        assert_eq!(alice.pending_yield, 0);
        assert!(alice.stakes.iter().all(Stake::is_tombstone));

        // Global weight is untouched by the move
        assert_eq!(pool.global_weight, bob.total_weight);
    }

    #[test]
    fn test_migrate_user_requires_pristine_destination() {
        let mut pool = pool_fixture(200);
        let mut alice = user_fixture();
        let mut bob = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.deposit_flexible(&mut bob, 1).unwrap();

        assert_eq!(
            pool.migrate_user(&mut alice, &mut bob),
            Err(StakingError::DestinationNotEmpty)
        );
    }

    #[test]
    fn test_migrate_user_loses_v1_bonus() {
        let mut factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        pool.v1_stake_max_period = u64::MAX;
        let mut alice = user_fixture();
        let mut bob = user_fixture();

        pool.deposit_flexible(&mut alice, 100).unwrap();
        pool.ingest_v1_stake(&mut alice, 7, 10_000_000, INIT - 1, false).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        pool.sync(&mut factory, INIT + 10).unwrap();
        pool.process_rewards(&mut alice).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();

        pool.migrate_user(&mut alice, &mut bob).unwrap();

        // The id slots do not travel and are cleared at the source
        assert!(bob.v1_stake_ids.is_empty());
        assert!(alice.v1_stake_ids.is_empty());
        assert_eq!(bob.effective_weight().unwrap(), bob.total_weight);

        // The checkpoint was taken with the bonus, so the destination is
        // underwater against it until the accumulator catches up
        assert_eq!(
            pool.process_rewards(&mut bob),
            Err(StakingError::MathOverflow)
        );
    }

    #[test]
    fn test_pending_rewards_view_matches_process() {
        let mut factory = factory_fixture(R, 500, u64::MAX);
        let mut pool = pool_fixture(125);
        let mut alice = user_fixture();

        pool.deposit_flexible(&mut alice, 321).unwrap();
        pool.refresh_reward_checkpoints(&mut alice).unwrap();
        pool.receive_vault_rewards(99).unwrap();

        let now = INIT + 1_234;
        let (view_yield, view_revenue) =
            pool.pending_rewards(&factory, &alice, now).unwrap();

        pool.sync(&mut factory, now).unwrap();
        let (yielded, revenue) = pool.process_rewards(&mut alice).unwrap();
        assert_eq!(view_yield, yielded);
        assert_eq!(view_revenue, revenue);
    }

    #[test]
    fn test_balance_of_counts_live_values() {
        let mut pool = pool_fixture(200);
        let mut user = user_fixture();

        pool.deposit_flexible(&mut user, 40).unwrap();
        pool.deposit_locked(&mut user, 60, INIT + 100, INIT).unwrap();
        assert_eq!(user.balance_of().unwrap(), 100);

        pool.unstake_locked(&mut user, 0, 60, INIT + 101).unwrap();
        assert_eq!(user.balance_of().unwrap(), 40);
    }

    #[test]
    fn test_reward_pool_detection() {
        let factory = factory_fixture(R, 200, u64::MAX);
        let mut pool = pool_fixture(200);
        assert!(!pool.is_reward_pool(&factory));
        pool.pool_token = factory.reward_mint;
        assert!(pool.is_reward_pool(&factory));
    }
}
