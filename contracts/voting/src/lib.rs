#![cfg_attr(not(feature = "std"), no_std, no_main)]

pub mod settlement;

pub mod constants {
    /// One whole native token in minor units (18 decimals).
    pub const UNIT: u128 = 1_000_000_000_000_000_000;

    /// Fee per ballot: 0.01 token.
    pub const DEFAULT_FEE: u128 = UNIT / 100;

    /// Voting window: 3 days in milliseconds.
    pub const DEFAULT_VOTING_WINDOW_MS: u64 = 3 * 24 * 60 * 60 * 1_000;

    /// Winner's share of a round's escrow: 90% = 9 000 BPS.
    pub const DEFAULT_WINNER_SHARE_BPS: u16 = 9_000;

    pub const BPS_DENOMINATOR: u128 = 10_000;

    pub const MIN_CANDIDATES: usize = 2;
}

/// # Voting
///
/// Fee-paid voting rounds with escrowed payouts.
///
/// The owner opens rounds under caller-chosen indices, each with a fixed slate
/// of candidates. Anyone except a candidate voting for themselves may cast one
/// ballot per round by paying exactly the configured fee. Once the voting
/// window has elapsed the round is settled: the leading candidate receives the
/// winner's share of the round's escrow and the rest stays in the contract as
/// commission the owner can withdraw.
///
/// Escrow of open rounds and settled commission share one native balance but
/// are accounted separately; only commission is ever withdrawable.
#[ink::contract]
mod voting {
    use crate::constants::*;
    use crate::settlement;
    use ink::prelude::vec::Vec;
    use ink::storage::Mapping;

    pub type RoundIndex = u32;

    // =========================================================================
    // CONFIGURATION
    // =========================================================================

    /// Who may call `finish_round`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(
        feature = "std",
        derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
    )]
    pub enum SettlementPolicy {
        /// Any account, once the deadline has passed.
        Anyone,
        OwnerOnly,
    }

    /// Fixed at construction; there is no setter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(
        feature = "std",
        derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
    )]
    pub struct VotingConfig {
        pub fee: Balance,
        pub voting_window: Timestamp,
        pub winner_share_bps: u16,
        pub settlement: SettlementPolicy,
    }

    impl Default for VotingConfig {
        fn default() -> Self {
            Self {
                fee: DEFAULT_FEE,
                voting_window: DEFAULT_VOTING_WINDOW_MS,
                winner_share_bps: DEFAULT_WINNER_SHARE_BPS,
                settlement: SettlementPolicy::Anyone,
            }
        }
    }

    impl VotingConfig {
        fn validate(&self) -> Result<(), Error> {
            if self.fee == 0
                || self.voting_window == 0
                || u128::from(self.winner_share_bps) > BPS_DENOMINATOR
            {
                return Err(Error::InvalidConfig);
            }
            Ok(())
        }
    }

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(
        feature = "std",
        derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
    )]
    pub struct Round {
        candidates: Vec<AccountId>,
        deadline: Timestamp,
        /// Fees collected so far; zero once settled.
        escrow: Balance,
        votes_cast: u32,
        finished: bool,
        winner: Option<AccountId>,
    }

    /// Read-only snapshot returned by `get_round_info`.
    /// `vote_counts[i]` is the tally of `candidates[i]`.
    #[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub struct RoundInfo {
        pub candidates: Vec<AccountId>,
        pub vote_counts: Vec<u32>,
        pub deadline: Timestamp,
        pub escrow: Balance,
        pub votes_cast: u32,
        pub finished: bool,
        pub winner: Option<AccountId>,
    }

    #[ink(storage)]
    pub struct Voting {
        owner: AccountId,
        config: VotingConfig,

        rounds: Mapping<RoundIndex, Round>,
        tallies: Mapping<(RoundIndex, AccountId), u32>,
        voters: Mapping<(RoundIndex, AccountId), bool>,
        round_count: u32,

        // Escrow summed over open rounds
        total_escrow: Balance,
        // Settled commission, withdrawable by the owner
        free_balance: Balance,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[ink(event)]
    pub struct RoundCreated {
        #[ink(topic)]
        index: RoundIndex,
        deadline: Timestamp,
        candidates: Vec<AccountId>,
    }

    #[ink(event)]
    pub struct VoteCast {
        #[ink(topic)]
        index: RoundIndex,
        #[ink(topic)]
        voter: AccountId,
        candidate: AccountId,
        escrow: Balance,
    }

    #[ink(event)]
    pub struct RoundFinished {
        #[ink(topic)]
        index: RoundIndex,
        #[ink(topic)]
        winner: AccountId,
        payout: Balance,
        commission: Balance,
    }

    #[ink(event)]
    pub struct Withdrawal {
        #[ink(topic)]
        to: AccountId,
        amount: Balance,
        remaining: Balance,
    }

    // =========================================================================
    // ERRORS
    // =========================================================================

    #[derive(Debug, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub enum Error {
        Unauthorized,
        InvalidCandidateCount,
        DuplicateCandidate,
        RoundExists,
        RoundNotFound,
        VotingClosed,
        WrongFee,
        SelfVoteProhibited,
        UnknownCandidate,
        AlreadyVoted,
        VotingStillOpen,
        AlreadyFinished,
        InsufficientBalance,
        TransferFailed,
        Overflow,
        InvalidConfig,
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl Voting {
        /// Deploys with the default fee, window and split. The deployer
        /// becomes the owner.
        #[ink(constructor)]
        pub fn new() -> Self {
            Self::init(VotingConfig::default())
        }

        #[ink(constructor)]
        pub fn with_config(config: VotingConfig) -> Result<Self, Error> {
            config.validate()?;
            Ok(Self::init(config))
        }

        fn init(config: VotingConfig) -> Self {
            Self {
                owner: Self::env().caller(),
                config,
                rounds: Mapping::default(),
                tallies: Mapping::default(),
                voters: Mapping::default(),
                round_count: 0,
                total_escrow: 0,
                free_balance: 0,
            }
        }

        // =================================================================
        // ROUND REGISTRY
        // =================================================================

        /// Opens round `index` with the given slate. Voting closes
        /// `voting_window` after the current block timestamp.
        ///
        /// Indices are chosen by the owner and may be sparse, but an index
        /// can only be used once.
        #[ink(message)]
        pub fn create_round(
            &mut self,
            index: RoundIndex,
            candidates: Vec<AccountId>,
        ) -> Result<(), Error> {
            self.only_owner()?;

            if candidates.len() < MIN_CANDIDATES {
                return Err(Error::InvalidCandidateCount);
            }
            if has_duplicates(&candidates) {
                return Err(Error::DuplicateCandidate);
            }
            if self.rounds.contains(index) {
                return Err(Error::RoundExists);
            }

            let deadline = self
                .env()
                .block_timestamp()
                .checked_add(self.config.voting_window)
                .ok_or(Error::Overflow)?;
            let round_count = self.round_count.checked_add(1).ok_or(Error::Overflow)?;

            let round = Round {
                candidates,
                deadline,
                escrow: 0,
                votes_cast: 0,
                finished: false,
                winner: None,
            };
            self.rounds.insert(index, &round);
            self.round_count = round_count;

            self.env().emit_event(RoundCreated {
                index,
                deadline,
                candidates: round.candidates,
            });

            Ok(())
        }

        #[ink(message)]
        pub fn get_round_info(&self, index: RoundIndex) -> Result<RoundInfo, Error> {
            let round = self.rounds.get(index).ok_or(Error::RoundNotFound)?;
            let vote_counts = self.tallies_of(index, &round);

            Ok(RoundInfo {
                candidates: round.candidates,
                vote_counts,
                deadline: round.deadline,
                escrow: round.escrow,
                votes_cast: round.votes_cast,
                finished: round.finished,
                winner: round.winner,
            })
        }

        #[ink(message)]
        pub fn get_round_count(&self) -> u32 {
            self.round_count
        }

        // =================================================================
        // BALLOT LEDGER
        // =================================================================

        /// Casts the caller's single ballot in round `index`.
        ///
        /// The transferred value must equal the configured fee exactly; it
        /// becomes part of the round's escrow. Checks run in a fixed order so
        /// that a call violating several preconditions always reports the
        /// same error.
        #[ink(message, payable)]
        pub fn cast_vote(&mut self, index: RoundIndex, candidate: AccountId) -> Result<(), Error> {
            let caller = self.env().caller();
            let mut round = self.rounds.get(index).ok_or(Error::RoundNotFound)?;

            if self.env().block_timestamp() >= round.deadline {
                return Err(Error::VotingClosed);
            }

            let paid = self.env().transferred_value();
            if paid != self.config.fee {
                return Err(Error::WrongFee);
            }
            if candidate == caller {
                return Err(Error::SelfVoteProhibited);
            }
            if !round.candidates.contains(&candidate) {
                return Err(Error::UnknownCandidate);
            }
            if self.voters.contains((index, caller)) {
                return Err(Error::AlreadyVoted);
            }

            let votes = self
                .tallies
                .get((index, candidate))
                .unwrap_or(0)
                .checked_add(1)
                .ok_or(Error::Overflow)?;
            round.votes_cast = round.votes_cast.checked_add(1).ok_or(Error::Overflow)?;
            round.escrow = round.escrow.checked_add(paid).ok_or(Error::Overflow)?;
            let total_escrow = self.total_escrow.checked_add(paid).ok_or(Error::Overflow)?;

            self.tallies.insert((index, candidate), &votes);
            self.voters.insert((index, caller), &true);
            self.rounds.insert(index, &round);
            self.total_escrow = total_escrow;

            self.env().emit_event(VoteCast {
                index,
                voter: caller,
                candidate,
                escrow: round.escrow,
            });

            Ok(())
        }

        #[ink(message)]
        pub fn has_voted(&self, index: RoundIndex, voter: AccountId) -> bool {
            self.voters.contains((index, voter))
        }

        #[ink(message)]
        pub fn get_votes(&self, index: RoundIndex, candidate: AccountId) -> u32 {
            self.tallies.get((index, candidate)).unwrap_or(0)
        }

        fn tallies_of(&self, index: RoundIndex, round: &Round) -> Vec<u32> {
            round
                .candidates
                .iter()
                .map(|candidate| self.tallies.get((index, *candidate)).unwrap_or(0))
                .collect()
        }

        // =================================================================
        // SETTLEMENT
        // =================================================================

        /// Settles round `index` and returns the winner.
        ///
        /// The winner is paid before any state is written. If the transfer
        /// fails the round stays open and settlement can be retried.
        #[ink(message)]
        pub fn finish_round(&mut self, index: RoundIndex) -> Result<AccountId, Error> {
            if self.config.settlement == SettlementPolicy::OwnerOnly {
                self.only_owner()?;
            }

            let mut round = self.rounds.get(index).ok_or(Error::RoundNotFound)?;
            if round.finished {
                return Err(Error::AlreadyFinished);
            }
            if self.env().block_timestamp() < round.deadline {
                return Err(Error::VotingStillOpen);
            }

            let tallies = self.tallies_of(index, &round);
            // Unreachable for stored rounds, which always hold at least two candidates
            let winner = settlement::leading_candidate(&tallies)
                .and_then(|position| round.candidates.get(position).copied())
                .ok_or(Error::InvalidCandidateCount)?;

            let escrow = round.escrow;
            let (payout, commission) =
                settlement::split_escrow(escrow, self.config.winner_share_bps)
                    .ok_or(Error::Overflow)?;
            let total_escrow = self.total_escrow.checked_sub(escrow).ok_or(Error::Overflow)?;
            let free_balance = self
                .free_balance
                .checked_add(commission)
                .ok_or(Error::Overflow)?;

            if payout > 0 {
                self.env()
                    .transfer(winner, payout)
                    .map_err(|_| Error::TransferFailed)?;
            }

            round.escrow = 0;
            round.finished = true;
            round.winner = Some(winner);
            self.rounds.insert(index, &round);
            self.total_escrow = total_escrow;
            self.free_balance = free_balance;

            self.env().emit_event(RoundFinished {
                index,
                winner,
                payout,
                commission,
            });

            Ok(winner)
        }

        // =================================================================
        // TREASURY
        // =================================================================

        /// Pays `amount` of settled commission to the owner.
        #[ink(message)]
        pub fn withdraw(&mut self, amount: Balance) -> Result<(), Error> {
            self.only_owner()?;

            let remaining = self
                .free_balance
                .checked_sub(amount)
                .ok_or(Error::InsufficientBalance)?;

            self.env()
                .transfer(self.owner, amount)
                .map_err(|_| Error::TransferFailed)?;
            self.free_balance = remaining;

            self.env().emit_event(Withdrawal {
                to: self.owner,
                amount,
                remaining,
            });

            Ok(())
        }

        /// Escrow of open rounds plus withdrawable commission.
        #[ink(message)]
        pub fn get_contract_balance(&self) -> Balance {
            self.total_escrow.saturating_add(self.free_balance)
        }

        #[ink(message)]
        pub fn get_free_balance(&self) -> Balance {
            self.free_balance
        }

        #[ink(message)]
        pub fn get_total_escrow(&self) -> Balance {
            self.total_escrow
        }

        // =================================================================
        // VIEW FUNCTIONS
        // =================================================================

        #[ink(message)]
        pub fn owner(&self) -> AccountId {
            self.owner
        }

        #[ink(message)]
        pub fn config(&self) -> VotingConfig {
            self.config
        }

        // =================================================================
        // ACCESS CONTROL
        // =================================================================

        fn only_owner(&self) -> Result<(), Error> {
            if self.env().caller() != self.owner {
                return Err(Error::Unauthorized);
            }
            Ok(())
        }
    }

    fn has_duplicates(candidates: &[AccountId]) -> bool {
        candidates
            .iter()
            .enumerate()
            .any(|(i, candidate)| candidates[i + 1..].contains(candidate))
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================

}
