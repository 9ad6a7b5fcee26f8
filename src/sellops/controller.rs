//! `SellOpsController` — the per-wallet slow/fast loop pair (spec §4.2),
//! grounded on the teacher's `run_exit_monitor` interval-loop idiom but
//! generalised into a stateful controller with a lifecycle instead of a bare
//! spawned function.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, ChartFeed, PriceFeed, SwapExecutor};
use crate::config::DaemonConfig;
use crate::evaluation::EvaluationEngine;
use crate::hub::coordinator::{HubCoordinator, RunOptions};
use crate::hub::events::{HudEventSink, HudPayload};
use crate::sellops::autopsy::{run_autopsy, AutopsyReport};
use crate::sellops::trailing::{now_ms, TrailingAction, TrailingStopState};
use crate::store::Store;
use crate::strategy::document::StrategyBook;
use crate::tx_monitor::{TxContext, TxMonitor};
use crate::types::{PositionSummary, Recommendation, Side, WalletSpec};

/// Shared, per-tradeUuid state the fast loop consults and mutates (spec §3
/// "Cost-basis cache" row; spec §5 names `trailingState`/`costUsd` as the
/// only state shared between the two loops).
struct SharedState {
    trailing: HashMap<String, TrailingStopState>,
    /// avgCostUsd per tradeUuid, populated each slow tick from the
    /// evaluation's pnl view (or the position's entry price as a fallback).
    cost_usd: HashMap<String, f64>,
    /// Most recently observed position summary per tradeUuid, so the fast
    /// loop has the token amount and mint without re-reading the store.
    positions: HashMap<String, PositionSummary>,
    last_evaluation: HashMap<String, crate::evaluation::snapshot::EvaluationSnapshot>,
    last_action_ms: HashMap<String, i64>,
    reported_closed: HashSet<String>,
}

/// Controls one wallet's slow (evaluation) and fast (trailing-stop) loops.
pub struct SellOpsController {
    wallet: WalletSpec,
    config: Arc<DaemonConfig>,
    book: Arc<StrategyBook>,
    store: Arc<dyn Store>,
    price_feed: Arc<dyn PriceFeed>,
    evaluation_engine: Arc<EvaluationEngine>,
    swap_executor: Arc<dyn SwapExecutor>,
    hud: Arc<dyn HudEventSink>,
    hub_coordinator: Arc<HubCoordinator>,
    tx_monitor: Arc<TxMonitor>,
    state: Arc<RwLock<SharedState>>,
    shutdown: Arc<Notify>,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl SellOpsController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallet: WalletSpec,
        config: Arc<DaemonConfig>,
        book: Arc<StrategyBook>,
        store: Arc<dyn Store>,
        price_feed: Arc<dyn PriceFeed>,
        chart_feed: Arc<dyn ChartFeed>,
        chain_client: Arc<dyn ChainClient>,
        swap_executor: Arc<dyn SwapExecutor>,
        hud: Arc<dyn HudEventSink>,
        hub_coordinator: Arc<HubCoordinator>,
    ) -> Self {
        let evaluation_engine = Arc::new(EvaluationEngine::new(
            Arc::clone(&store),
            chart_feed,
            Arc::clone(&book),
            config.coin_freshness_ms,
            config.pool_freshness_ms,
            config.events_freshness_ms,
            config.risk_freshness_ms,
        ));
        let tx_monitor = Arc::new(TxMonitor::new(chain_client, Arc::clone(&store), Arc::clone(&hud)));

        Self {
            wallet,
            config,
            book,
            store,
            price_feed,
            evaluation_engine,
            swap_executor,
            hud,
            hub_coordinator,
            tx_monitor,
            state: Arc::new(RwLock::new(SharedState {
                trailing: HashMap::new(),
                cost_usd: HashMap::new(),
                positions: HashMap::new(),
                last_evaluation: HashMap::new(),
                last_action_ms: HashMap::new(),
                reported_closed: HashSet::new(),
            })),
            shutdown: Arc::new(Notify::new()),
            handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Start the slow and fast loops as background tasks.
    pub fn start(self: &Arc<Self>) {
        let slow = Arc::clone(self);
        let slow_handle = tokio::spawn(async move { slow.run_slow_loop().await });

        let fast = Arc::clone(self);
        let fast_handle = tokio::spawn(async move { fast.run_fast_loop().await });

        self.handles.lock().unwrap().push(slow_handle);
        self.handles.lock().unwrap().push(fast_handle);

        info!(wallet = %self.wallet.alias, "sellops controller started");
    }

    /// Signal both loops to stop and wait for them to finish.
    pub async fn stop(&self, reason: &str) {
        info!(wallet = %self.wallet.alias, reason, "sellops controller stopping");
        self.shutdown.notify_waiters();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
    }

    // ── Slow loop ────────────────────────────────────────────────────────

    async fn run_slow_loop(self: Arc<Self>) {
        let period = Duration::from_millis(self.config.slow_loop_ms.max(1_000));
        let mut ticker = interval(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.notified() => {
                    debug!(wallet = %self.wallet.alias, "slow loop shutting down");
                    return;
                }
            }

            if let Err(e) = self.slow_tick().await {
                warn!(wallet = %self.wallet.alias, error = %e, "slow loop tick failed");
            }
        }
    }

    async fn slow_tick(&self) -> crate::error::Result<()> {
        let wallet_id = self.wallet.wallet_id.unwrap_or_default();
        let open_positions = self.store.load_open_positions(wallet_id).await?;
        let open_uuids: HashSet<String> = open_positions.iter().map(|p| p.trade_uuid.clone()).collect();

        self.detect_and_report_closures(&open_uuids);
        self.prune_stale_state(&open_uuids);

        for position in &open_positions {
            let snapshot = self
                .evaluation_engine
                .evaluate(&self.wallet.alias, position)
                .await?;

            self.store.insert_evaluation(&snapshot).await?;

            let trailing_config = self.trailing_config_for(&snapshot);
            let avg_cost_usd = snapshot
                .pnl
                .as_ref()
                .map(|p| p.avg_cost_usd)
                .filter(|c| *c > 0.0)
                .unwrap_or(position.entry_price_usd);

            {
                let mut state = self.state.write();
                state
                    .last_evaluation
                    .insert(position.trade_uuid.clone(), snapshot.clone());
                state
                    .positions
                    .insert(position.trade_uuid.clone(), position.clone());
                state.cost_usd.insert(position.trade_uuid.clone(), avg_cost_usd);
                state
                    .trailing
                    .entry(position.trade_uuid.clone())
                    .or_insert_with(|| {
                        TrailingStopState::new(position.trade_uuid.clone(), trailing_config)
                    });
            }

            self.hud.emit(HudPayload::Evaluation(Box::new(snapshot.clone())));

            if let Some(recommendation) = snapshot.recommendation {
                self.maybe_act(position, recommendation).await;
            }
        }

        Ok(())
    }

    /// Resolve the trailing-stop config for the strategy the snapshot
    /// selected, falling back to `StrategyKind::Flash`'s defaults when no
    /// strategy was attached (should not happen in practice since
    /// `EvaluationEngine::evaluate` always runs the decision engine first).
    fn trailing_config_for(
        &self,
        snapshot: &crate::evaluation::snapshot::EvaluationSnapshot,
    ) -> crate::strategy::document::TrailingStopConfig {
        use crate::strategy::document::StrategyKind;
        let kind = snapshot
            .strategy
            .as_ref()
            .and_then(|s| {
                [StrategyKind::Flash, StrategyKind::Hybrid, StrategyKind::Campaign]
                    .into_iter()
                    .find(|k| self.book.get(*k).strategy_id == s.id)
            })
            .unwrap_or(StrategyKind::Flash);
        self.book.get(kind).defaults.trailing_stop
    }

    /// Prune `trailing`/`cost_usd`/`positions` entries for tradeUuids no
    /// longer present in the open-position view (spec §4.5 slow loop step 3).
    fn prune_stale_state(&self, currently_open: &HashSet<String>) {
        let mut state = self.state.write();
        state.trailing.retain(|uuid, _| currently_open.contains(uuid));
        state.cost_usd.retain(|uuid, _| currently_open.contains(uuid));
        state.positions.retain(|uuid, _| currently_open.contains(uuid));
    }

    fn detect_and_report_closures(&self, currently_open: &HashSet<String>) {
        let mut state = self.state.write();
        let previously_tracked: Vec<String> = state.last_evaluation.keys().cloned().collect();

        for trade_uuid in previously_tracked {
            if currently_open.contains(&trade_uuid) {
                continue;
            }
            if state.reported_closed.contains(&trade_uuid) {
                continue;
            }

            let last_snapshot = state.last_evaluation.get(&trade_uuid).cloned();
            let last_position = state.positions.get(&trade_uuid).cloned();
            if let Some(snapshot) = &last_snapshot {
                let position = last_position.unwrap_or_else(|| PositionSummary {
                    position_id: 0,
                    wallet_id: self.wallet.wallet_id.unwrap_or_default(),
                    mint: snapshot.mint.clone(),
                    trade_uuid: trade_uuid.clone(),
                    strategy_name: None,
                    opened_at: snapshot.created_at,
                    last_trade_at: snapshot.created_at,
                    current_token_amount: 0.0,
                    entry_price_usd: 0.0,
                    entry_price_sol: 0.0,
                    source: "closed".to_string(),
                });
                let report: AutopsyReport = run_autopsy(&position, Some(snapshot));
                self.hud.emit(HudPayload::Autopsy(Box::new(report)));
            }

            state.reported_closed.insert(trade_uuid.clone());
            state.trailing.remove(&trade_uuid);
            state.cost_usd.remove(&trade_uuid);
            state.positions.remove(&trade_uuid);
            state.last_evaluation.remove(&trade_uuid);
            state.last_action_ms.remove(&trade_uuid);
        }
    }

    async fn maybe_act(
        &self,
        position: &crate::types::PositionSummary,
        recommendation: Recommendation,
    ) {
        if self.config.observe_only {
            return;
        }
        if recommendation == Recommendation::Hold {
            return;
        }
        if recommendation == Recommendation::Trim && !self.config.allow_trim {
            return;
        }

        let now = now_ms();
        {
            let mut state = self.state.write();
            if let Some(last) = state.last_action_ms.get(&position.trade_uuid) {
                if now - last < self.config.decision_debounce_ms as i64 {
                    return;
                }
            }
            state.last_action_ms.insert(position.trade_uuid.clone(), now);
        }

        let (sell_amount, reason) = match recommendation {
            Recommendation::Exit => (position.current_token_amount, "strategy_exit"),
            Recommendation::Trim => (
                position.current_token_amount * (self.config.trim_pct / 100.0),
                "strategy_trim",
            ),
            Recommendation::Hold => return,
        };

        self.submit_sell_and_monitor(&position.mint, &position.trade_uuid, sell_amount, reason)
            .await;
    }

    /// Submit a sell through the hub coordinator's namespace-serialised
    /// `swap` path and, on success, start a best-effort `txMonitor` job for
    /// the returned txid (spec §4.5: "Sell submissions go through the hub
    /// coordinator's swap path; ... a txMonitor job is started for it with a
    /// 120 s timeout — failure to start the monitor is logged, never fatal").
    async fn submit_sell_and_monitor(&self, mint: &str, trade_uuid: &str, amount: f64, reason: &'static str) {
        let wallet_alias = self.wallet.alias.clone();
        let wallet_pubkey = self.wallet.pubkey.clone();
        let mint_owned = mint.to_string();
        let swap_executor = Arc::clone(&self.swap_executor);

        let payload = serde_json::json!({
            "walletAlias": wallet_alias,
            "mint": mint,
            "tradeUuid": trade_uuid,
            "reason": reason,
        });

        let result = self
            .hub_coordinator
            .run("swap", payload, RunOptions::default(), move || async move {
                let submission = swap_executor.submit_sell(&wallet_pubkey, &mint_owned, amount).await?;
                Ok(serde_json::json!({"txid": submission.txid, "quote": submission.quote}))
            })
            .await;

        match result {
            Ok(value) => {
                let txid = value.get("txid").and_then(|v| v.as_str()).map(str::to_string);
                let quote = value.get("quote").cloned().filter(|v| !v.is_null());
                info!(
                    wallet = %self.wallet.alias,
                    mint = %mint,
                    trade_uuid = %trade_uuid,
                    reason,
                    txid = txid.as_deref().unwrap_or(""),
                    "sell submitted"
                );
                if let Some(txid) = txid {
                    self.start_tx_monitor(txid, mint, trade_uuid, amount, quote).await;
                }
            }
            Err(e) => warn!(
                wallet = %self.wallet.alias,
                mint = %mint,
                trade_uuid = %trade_uuid,
                reason,
                error = %e,
                "sell submission failed"
            ),
        }
    }

    /// Start a detached `txMonitor` job for `txid`. Failure to start it is
    /// logged and swallowed, never surfaced to the caller.
    async fn start_tx_monitor(
        &self,
        txid: String,
        mint: &str,
        trade_uuid: &str,
        size: f64,
        swap_quote: Option<serde_json::Value>,
    ) {
        let tx_monitor = Arc::clone(&self.tx_monitor);
        let context = TxContext {
            wallet_id: self.wallet.wallet_id.unwrap_or_default(),
            wallet_alias: self.wallet.alias.clone(),
            mint: mint.to_string(),
            trade_uuid: trade_uuid.to_string(),
            side: Side::Sell,
            size,
        };
        let txid_owned = txid.clone();

        let payload = serde_json::json!({"txid": txid});
        let options = RunOptions {
            detached: true,
            timeout_ms: Some(self.config.monitor_timeout_ms),
        };

        let result = self
            .hub_coordinator
            .run("txMonitor", payload, options, move || async move {
                let outcome = tx_monitor.watch(&txid, &context, swap_quote).await?;
                Ok(serde_json::json!({"outcome": outcome.status_category()}))
            })
            .await;

        if let Err(e) = result {
            warn!(
                wallet = %self.wallet.alias,
                txid = %txid_owned,
                mint = %mint,
                trade_uuid = %trade_uuid,
                error = %e,
                "failed to start tx monitor job"
            );
        }
    }

    // ── Fast loop ────────────────────────────────────────────────────────

    async fn run_fast_loop(self: Arc<Self>) {
        let period = Duration::from_millis(self.config.fast_loop_ms.max(1_000));
        let mut ticker = interval(period);
        let mut last_heartbeat_ms = 0i64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.notified() => {
                    debug!(wallet = %self.wallet.alias, "fast loop shutting down");
                    return;
                }
            }

            self.fast_tick(&mut last_heartbeat_ms).await;
        }
    }

    async fn fast_tick(&self, last_heartbeat_ms: &mut i64) {
        // Step 1: build the mint set from positions with a positive token
        // amount, deduped by mint.
        let (trade_uuids, mints): (Vec<String>, Vec<String>) = {
            let state = self.state.read();
            let mut seen_mints = HashSet::new();
            state
                .positions
                .iter()
                .filter(|(_, p)| p.current_token_amount > 0.0)
                .filter(|(_, p)| seen_mints.insert(p.mint.clone()))
                .map(|(uuid, p)| (uuid.clone(), p.mint.clone()))
                .unzip()
        };

        if trade_uuids.is_empty() {
            self.maybe_emit_heartbeat(last_heartbeat_ms, "trailing_stop_idle", 0, 0, 0, 0);
            return;
        }

        // Step 3: fetch current prices in one batch call.
        let prices: HashMap<String, f64> = match self.price_feed.get_prices_usd(&mints).await {
            Ok(results) => results.into_iter().filter_map(|(m, p)| p.map(|p| (m, p))).collect(),
            Err(e) => {
                warn!(wallet = %self.wallet.alias, error = %e, "batch price fetch failed");
                HashMap::new()
            }
        };

        let now = now_ms();
        let mut active_stops = 0usize;
        let mut stale_price_skips = 0usize;
        let mut missing_cost_skips = 0usize;

        // Step 4: per position, check cost basis + fresh price, then feed
        // the trailing-stop state machine.
        for (trade_uuid, mint) in trade_uuids.iter().zip(mints.iter()) {
            let Some(&price) = prices.get(mint) else {
                stale_price_skips += 1;
                continue;
            };

            let cost_usd = {
                let state = self.state.read();
                state.cost_usd.get(trade_uuid).copied()
            };
            let Some(cost_usd) = cost_usd.filter(|c| *c > 0.0) else {
                missing_cost_skips += 1;
                continue;
            };

            let action = {
                let mut state = self.state.write();
                let Some(trail) = state.trailing.get_mut(trade_uuid) else {
                    continue;
                };
                let action = trail.on_price(cost_usd, price, now);
                if trail.active {
                    active_stops += 1;
                }
                action
            };

            match action {
                TrailingAction::None => {}
                TrailingAction::HardStop | TrailingAction::TrailBreach => {
                    let reason = match action {
                        TrailingAction::HardStop => "stop_loss",
                        TrailingAction::TrailBreach => "trailing_stop",
                        TrailingAction::None => unreachable!(),
                    };
                    info!(
                        wallet = %self.wallet.alias,
                        mint = %mint,
                        trade_uuid = %trade_uuid,
                        reason,
                        "trailing stop triggered"
                    );
                    if !self.config.observe_only {
                        let amount = {
                            let state = self.state.read();
                            state
                                .positions
                                .get(trade_uuid)
                                .map(|p| p.current_token_amount)
                                .unwrap_or(0.0)
                        };
                        if amount > 0.0 {
                            self.submit_sell_and_monitor(mint, trade_uuid, amount, reason).await;
                        } else {
                            warn!(
                                wallet = %self.wallet.alias,
                                mint = %mint,
                                trade_uuid = %trade_uuid,
                                "no known token amount for full-exit sell, skipping"
                            );
                        }
                    }
                }
            }
        }

        let category = if active_stops > 0 { "trailing_stop_armed" } else { "trailing_stop" };
        self.maybe_emit_heartbeat(
            last_heartbeat_ms,
            category,
            trade_uuids.len(),
            active_stops,
            stale_price_skips,
            missing_cost_skips,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn maybe_emit_heartbeat(
        &self,
        last_heartbeat_ms: &mut i64,
        category: &'static str,
        watched: usize,
        active_stops: usize,
        stale_price_skips: usize,
        missing_cost_skips: usize,
    ) {
        let now = now_ms();
        if now - *last_heartbeat_ms < self.config.heartbeat_throttle_ms as i64 {
            return;
        }
        *last_heartbeat_ms = now;
        self.hud.emit(HudPayload::TrailingStopHeartbeat {
            wallet_alias: self.wallet.alias.clone(),
            category,
            watched_mints: watched,
            active_stops,
            stale_price_skips,
            missing_cost_skips,
            at: Utc::now(),
        });
    }
}
