//! Client-driven round lifecycle.
//!
//! Every caller (HTTP request, background scheduler, or another process
//! sharing the same database) evaluates the lifecycle against the store.
//! Convergence relies on the store's uniqueness constraints: deterministic
//! round ids collapse concurrent round creation, and the leaderboard's
//! unique `post_id` collapses concurrent winner resolution.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{GameMode, RoundEntity},
        round_store::RoundStore,
        storage::StorageResult,
    },
    metrics::OperationMetrics,
    state::{
        phase::RoundPhase,
        winner::{self, WinningPost},
    },
};

/// Snapshot of a mode's current round after one lifecycle evaluation.
#[derive(Debug, Clone)]
pub struct RoundStatus {
    /// Live row of the mode.
    pub round: RoundEntity,
    /// Phase of `round` at evaluation time.
    pub phase: RoundPhase,
    /// End of the preparation window following `round`.
    pub preparation_ends_at: SystemTime,
    /// Present once the round left the active phase and has at least one post.
    pub winner: Option<WinningPost>,
}

/// Per-instance lifecycle controller.
///
/// Holds a latch remembering, per mode, the round whose winner this instance
/// already resolved on entering preparation. The latch only suppresses
/// duplicate work from this instance; other instances rely on the store.
pub struct RoundLifecycle {
    preparation: Duration,
    resolved: DashMap<GameMode, String>,
    metrics: Arc<OperationMetrics>,
}

impl RoundLifecycle {
    /// Controller using a preparation window of `preparation`.
    pub fn new(preparation: Duration, metrics: Arc<OperationMetrics>) -> Self {
        Self {
            preparation,
            resolved: DashMap::new(),
            metrics,
        }
    }

    /// Configured preparation window.
    pub fn preparation(&self) -> Duration {
        self.preparation
    }

    /// Evaluate the lifecycle of `mode` at `now` and return the current round.
    ///
    /// Retires rows past their preparation window, settles duplicate active
    /// rows, creates the next round when none is live and resolves the winner
    /// the first time this instance sees the round in preparation.
    pub async fn tick(
        &self,
        store: &dyn RoundStore,
        mode: GameMode,
        now: SystemTime,
    ) -> StorageResult<RoundStatus> {
        self.metrics
            .observe("round.tick", self.evaluate(store, mode, now))
            .await
    }

    /// End every active round of `mode` and open a fresh one immediately.
    pub async fn force_rollover(
        &self,
        store: &dyn RoundStore,
        mode: GameMode,
        now: SystemTime,
    ) -> StorageResult<RoundEntity> {
        for round in store.active_rounds(mode).await? {
            self.retire(store, &round, now).await?;
        }
        let round = self.open_next_round(store, mode, now).await?;
        info!(game_mode = %mode, round_id = %round.id, "forced round rollover");
        Ok(round)
    }

    async fn evaluate(
        &self,
        store: &dyn RoundStore,
        mode: GameMode,
        now: SystemTime,
    ) -> StorageResult<RoundStatus> {
        let candidates = store.active_rounds(mode).await?;
        self.advance(store, mode, candidates, now).await
    }

    /// Move `mode` forward from the active rows read in `candidates`.
    ///
    /// The next round is numbered after the highest row retired here, so two
    /// actors retiring the same round insert the same successor and the
    /// loser adopts it.
    async fn advance(
        &self,
        store: &dyn RoundStore,
        mode: GameMode,
        candidates: Vec<RoundEntity>,
        now: SystemTime,
    ) -> StorageResult<RoundStatus> {
        let mut live = Vec::new();
        let mut last_retired = None;
        for round in candidates {
            if round.phase_at(now, self.preparation) == RoundPhase::Ended {
                self.retire(store, &round, now).await?;
                last_retired = last_retired.max(Some(round.round_number));
            } else {
                live.push(round);
            }
        }

        let round = match self.settle_duplicates(store, live, now).await? {
            Some(round) => round,
            None => match last_retired {
                Some(number) => self.open_round(store, mode, number + 1, now).await?,
                None => self.open_next_round(store, mode, now).await?,
            },
        };

        let phase = round.phase_at(now, self.preparation);
        let winner = match phase {
            RoundPhase::Active => None,
            _ => {
                self.resolve_once(store, &round, now).await?;
                winner::winner_for_round(store, &round.id).await?
            }
        };

        Ok(RoundStatus {
            preparation_ends_at: round.preparation_ends_at(self.preparation),
            round,
            phase,
            winner,
        })
    }

    /// Keep the newest live row and retire the rest.
    async fn settle_duplicates(
        &self,
        store: &dyn RoundStore,
        mut live: Vec<RoundEntity>,
        now: SystemTime,
    ) -> StorageResult<Option<RoundEntity>> {
        live.sort_by(|a, b| {
            b.round_number
                .cmp(&a.round_number)
                .then(b.created_at.cmp(&a.created_at))
        });
        let mut rows = live.into_iter();
        let current = rows.next();
        for stale in rows {
            warn!(
                round_id = %stale.id,
                "multiple active rounds for one mode; retiring the older row"
            );
            self.retire(store, &stale, now).await?;
        }
        Ok(current)
    }

    /// Resolve the winner of a finished round if nobody did, then flag it
    /// ended. A failed resolution leaves the row active for the next tick.
    async fn retire(
        &self,
        store: &dyn RoundStore,
        round: &RoundEntity,
        now: SystemTime,
    ) -> StorageResult<()> {
        if round.winner_id.is_none() && now >= round.end_time {
            self.metrics
                .observe("round.resolve", winner::resolve(store, &round.id, now))
                .await?;
        }

        store.end_round(round.id.clone()).await?;
        debug!(round_id = %round.id, "round retired");
        Ok(())
    }

    /// Open the round following the highest number ever issued for `mode`.
    /// Used on cold start and for forced rollovers.
    async fn open_next_round(
        &self,
        store: &dyn RoundStore,
        mode: GameMode,
        now: SystemTime,
    ) -> StorageResult<RoundEntity> {
        let next = store
            .latest_round_number(mode)
            .await?
            .map_or(1, |latest| latest + 1);
        self.open_round(store, mode, next, now).await
    }

    /// Insert round `number` of `mode`, adopting the row created by a
    /// concurrent actor when the insert loses the race.
    async fn open_round(
        &self,
        store: &dyn RoundStore,
        mode: GameMode,
        number: u64,
        now: SystemTime,
    ) -> StorageResult<RoundEntity> {
        let round = RoundEntity::open(mode, number, now);

        match store.insert_round(round.clone()).await {
            Ok(()) => {
                info!(
                    game_mode = %mode,
                    round_id = %round.id,
                    round_number = number,
                    "opened round"
                );
                Ok(round)
            }
            Err(err) if err.is_conflict() => {
                debug!(round_id = %round.id, "round created concurrently; adopting it");
                store.find_round(round.id.clone()).await?.ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve the winner once per round for this instance. A failure releases
    /// the latch so the next evaluation retries.
    async fn resolve_once(
        &self,
        store: &dyn RoundStore,
        round: &RoundEntity,
        now: SystemTime,
    ) -> StorageResult<()> {
        if !self.claim(round) {
            return Ok(());
        }

        let outcome = self
            .metrics
            .observe("round.resolve", winner::resolve(store, &round.id, now))
            .await;
        if let Err(err) = outcome {
            self.release(round);
            return Err(err);
        }
        Ok(())
    }

    fn claim(&self, round: &RoundEntity) -> bool {
        match self.resolved.entry(round.game_mode) {
            Entry::Occupied(mut entry) => {
                if entry.get() == &round.id {
                    false
                } else {
                    entry.insert(round.id.clone());
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(round.id.clone());
                true
            }
        }
    }

    fn release(&self, round: &RoundEntity) {
        self.resolved
            .remove_if(&round.game_mode, |_, id| id == &round.id);
    }
}
