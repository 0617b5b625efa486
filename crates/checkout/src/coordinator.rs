//! Order coordinator: drives one checkout attempt end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use common::{CartId, IdempotencyToken, OrderAttemptId};
use inventory::{InventoryApi, ReduceRequest, RestoreRequest};
use inventory_client::{InventoryClient, ReduceOutcome, RestoreOutcome, RetryPolicy};

use crate::attempt::{CheckoutPhase, OrderAttempt};
use crate::error::{AbortReason, CheckoutError, CheckoutOutcome, Result};
use crate::ledger::ReservationLedger;
use crate::reservation::{ReservationEntry, ReservationState};
use crate::services::{
    CartLine, CartProvider, ChargeOutcome, OrderStatus, OrderStore, PaymentProvider,
};

/// Cooperative cancellation signal for one checkout attempt.
///
/// Checked at the protocol's safe points: before each line reservation and
/// before the charge. Committed reservations are always compensated first;
/// cancellation never short-circuits that. Once payment is captured the
/// flag is ignored and the attempt finalizes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag with no cancellation requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates order placement against the inventory store and the
/// collaborator services.
///
/// The coordinator reserves stock line by line under ledger-tracked tokens,
/// then creates the order and charges payment. Any refusal, outage, or
/// cancellation after the first committed line runs compensation before the
/// attempt may abort. The attempt is driven synchronously within the
/// request; there is no background completion.
pub struct OrderCoordinator<A, L, C, P, O>
where
    A: InventoryApi,
    L: ReservationLedger,
    C: CartProvider,
    P: PaymentProvider,
    O: OrderStore,
{
    client: InventoryClient<A>,
    ledger: L,
    carts: C,
    payments: P,
    orders: O,
    compensation_retry: RetryPolicy,
}

impl<A, L, C, P, O> OrderCoordinator<A, L, C, P, O>
where
    A: InventoryApi,
    L: ReservationLedger,
    C: CartProvider,
    P: PaymentProvider,
    O: OrderStore,
{
    /// Creates a new order coordinator.
    pub fn new(client: InventoryClient<A>, ledger: L, carts: C, payments: P, orders: O) -> Self {
        Self {
            client,
            ledger,
            carts,
            payments,
            orders,
            compensation_retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry schedule used for compensation restores.
    pub fn with_compensation_retry(mut self, retry: RetryPolicy) -> Self {
        self.compensation_retry = retry;
        self
    }

    /// Places an order for the cart's current contents.
    ///
    /// Returns `Ok` with the business outcome, finalized or aborted; `Err`
    /// is reserved for validation failures and infrastructure errors. By
    /// the time an `Err` surfaces, anything already committed has been
    /// through compensation.
    #[tracing::instrument(skip(self, cancel), fields(cart_id = %cart_id))]
    pub async fn place_order(&self, cart_id: CartId, cancel: CancelFlag) -> Result<CheckoutOutcome> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let checkout_start = Instant::now();

        // 1. Load and validate the cart
        let snapshot = self
            .carts
            .get_cart(cart_id)
            .await?
            .ok_or(CheckoutError::CartNotFound(cart_id))?;
        if snapshot.lines.is_empty() {
            return Err(CheckoutError::EmptyCart(cart_id));
        }
        // The total prices the cart as listed; reservations work on the
        // merged lines, one token per position.
        let total = snapshot.total();
        let lines = merge_lines(snapshot.lines)?;

        let mut attempt = OrderAttempt::new(cart_id, lines, total);
        tracing::info!(
            attempt_id = %attempt.attempt_id,
            line_count = attempt.lines.len(),
            total = %attempt.total,
            "checkout attempt started"
        );

        // 2. Reserve every line under the attempt's derived tokens
        attempt.advance(CheckoutPhase::Reserving);
        match self.reserve_lines(&attempt, &cancel).await {
            Ok(None) => {}
            Ok(Some(reason)) => {
                let stuck = self.compensate(&mut attempt).await;
                return Ok(self.abort(&mut attempt, reason, stuck, checkout_start).await);
            }
            Err(err) => {
                self.compensate(&mut attempt).await;
                return Err(err);
            }
        }
        attempt.advance(CheckoutPhase::Reserved);

        // 3. Create the durable order record
        if cancel.is_cancelled() {
            let stuck = self.compensate(&mut attempt).await;
            return Ok(self
                .abort(&mut attempt, AbortReason::Cancelled, stuck, checkout_start)
                .await);
        }
        let order_id = match self.orders.create_order(cart_id, attempt.total).await {
            Ok(order_id) => order_id,
            Err(err) => {
                self.compensate(&mut attempt).await;
                return Err(err.into());
            }
        };
        attempt.order_id = Some(order_id);

        // 4. Charge payment
        attempt.advance(CheckoutPhase::PaymentPending);
        if cancel.is_cancelled() {
            let stuck = self.compensate(&mut attempt).await;
            return Ok(self
                .abort(&mut attempt, AbortReason::Cancelled, stuck, checkout_start)
                .await);
        }
        match self.payments.charge(order_id, attempt.total).await {
            Ok(ChargeOutcome::Paid { payment_id }) => {
                // 5. Finalize. Cancellation after capture is ignored; a
                // paid order stands even if the status write lags behind.
                if let Err(err) = self.orders.mark_status(order_id, OrderStatus::Confirmed).await {
                    tracing::error!(
                        %order_id,
                        error = %err,
                        "paid order could not be marked confirmed"
                    );
                }
                attempt.advance(CheckoutPhase::Finalized);

                metrics::counter!("checkout_finalized").increment(1);
                let duration = checkout_start.elapsed().as_secs_f64();
                metrics::histogram!("checkout_duration_seconds").record(duration);
                tracing::info!(
                    attempt_id = %attempt.attempt_id,
                    %order_id,
                    payment_id,
                    duration,
                    "checkout finalized"
                );

                Ok(CheckoutOutcome::Finalized {
                    attempt_id: attempt.attempt_id,
                    order_id,
                    payment_id,
                })
            }
            Ok(ChargeOutcome::Declined { reason }) => {
                let stuck = self.compensate(&mut attempt).await;
                let reason = AbortReason::PaymentDeclined { reason };
                Ok(self.abort(&mut attempt, reason, stuck, checkout_start).await)
            }
            Err(err) => {
                // No definitive answer is not payment: the stock goes back.
                let stuck = self.compensate(&mut attempt).await;
                let reason = AbortReason::PaymentUnavailable { detail: err.to_string() };
                Ok(self.abort(&mut attempt, reason, stuck, checkout_start).await)
            }
        }
    }

    /// Returns the ledger entries for an attempt, in begin order.
    pub async fn reservations(
        &self,
        order_attempt_id: OrderAttemptId,
    ) -> Result<Vec<ReservationEntry>> {
        Ok(self.ledger.entries_for_attempt(order_attempt_id).await?)
    }

    /// Delivers one reduce per line, recording each in the ledger.
    ///
    /// Returns `Ok(None)` when every line committed, `Ok(Some(reason))`
    /// when a line was refused or the buyer cancelled, `Err` when the
    /// ledger itself failed mid-flight.
    async fn reserve_lines(
        &self,
        attempt: &OrderAttempt,
        cancel: &CancelFlag,
    ) -> Result<Option<AbortReason>> {
        for line in &attempt.lines {
            if cancel.is_cancelled() {
                tracing::info!(
                    attempt_id = %attempt.attempt_id,
                    "cancellation observed before line reservation"
                );
                return Ok(Some(AbortReason::Cancelled));
            }

            let entry = self
                .ledger
                .begin(
                    attempt.attempt_id,
                    line.product_id.clone(),
                    line.variant_key.clone(),
                    line.quantity,
                )
                .await?;

            let outcome = self
                .client
                .reduce(ReduceRequest {
                    token: entry.token.clone(),
                    product_id: line.product_id.clone(),
                    variant_key: line.variant_key.clone(),
                    quantity: line.quantity,
                })
                .await;

            match outcome {
                ReduceOutcome::Committed | ReduceOutcome::AlreadyApplied => {
                    self.ledger.mark_committed(&entry.token).await?;
                }
                ReduceOutcome::InsufficientStock => {
                    self.ledger.mark_failed(&entry.token).await?;
                    return Ok(Some(AbortReason::OutOfStock {
                        product_id: line.product_id.clone(),
                        variant_key: line.variant_key.clone(),
                    }));
                }
                ReduceOutcome::Unavailable => {
                    self.ledger.mark_failed(&entry.token).await?;
                    return Ok(Some(AbortReason::InventoryUnavailable {
                        product_id: line.product_id.clone(),
                        variant_key: line.variant_key.clone(),
                    }));
                }
            }
        }

        Ok(None)
    }

    /// Restores the attempt's reservations, newest first.
    ///
    /// Never fails: a restore that cannot be confirmed within the retry
    /// budget leaves its token on the stuck list for operator escalation.
    /// Pending entries are resolved here too, in case a ledger write was
    /// lost between the reduce and its mark.
    async fn compensate(&self, attempt: &mut OrderAttempt) -> Vec<IdempotencyToken> {
        attempt.advance(CheckoutPhase::Compensating);
        metrics::counter!("checkout_compensations_total").increment(1);

        let entries = match self.ledger.entries_for_attempt(attempt.attempt_id).await {
            Ok(entries) => entries,
            Err(err) => {
                // Cannot even enumerate: every line token goes on the
                // stuck list so nothing is silently lost.
                tracing::error!(
                    attempt_id = %attempt.attempt_id,
                    error = %err,
                    "cannot list reservations for compensation"
                );
                let stuck: Vec<IdempotencyToken> = attempt
                    .lines
                    .iter()
                    .map(|line| {
                        IdempotencyToken::derive(
                            attempt.attempt_id,
                            &line.product_id,
                            &line.variant_key,
                        )
                    })
                    .collect();
                metrics::counter!("checkout_compensation_stuck").increment(stuck.len() as u64);
                return stuck;
            }
        };

        let mut stuck = Vec::new();
        for entry in entries.iter().rev() {
            let confirmed = match entry.state {
                ReservationState::Committed | ReservationState::Pending => {
                    self.compensate_entry(entry).await
                }
                ReservationState::Failed | ReservationState::Compensated => continue,
            };
            if !confirmed {
                stuck.push(entry.token.clone());
            }
        }

        if !stuck.is_empty() {
            metrics::counter!("checkout_compensation_stuck").increment(stuck.len() as u64);
            tracing::error!(
                attempt_id = %attempt.attempt_id,
                stuck = stuck.len(),
                "compensation could not confirm every restore"
            );
        }
        stuck
    }

    /// Restores one reservation; true once the ledger reflects the result.
    async fn compensate_entry(&self, entry: &ReservationEntry) -> bool {
        match self.restore_with_retry(entry).await {
            RestoreOutcome::Committed | RestoreOutcome::AlreadyApplied => {
                let marked = if entry.state == ReservationState::Pending {
                    // The reduce had applied though its mark was lost.
                    match self.ledger.mark_committed(&entry.token).await {
                        Ok(()) => self.ledger.mark_compensated(&entry.token).await,
                        Err(err) => Err(err),
                    }
                } else {
                    self.ledger.mark_compensated(&entry.token).await
                };
                if let Err(err) = marked {
                    // The stock is back; only the ledger record is behind.
                    tracing::error!(
                        token = %entry.token,
                        error = %err,
                        "restored reservation could not be marked compensated"
                    );
                    return false;
                }
                true
            }
            RestoreOutcome::NotFound => {
                if entry.state == ReservationState::Pending {
                    // Never reduced; nothing to give back.
                    if let Err(err) = self.ledger.mark_failed(&entry.token).await {
                        tracing::error!(
                            token = %entry.token,
                            error = %err,
                            "unreduced reservation could not be marked failed"
                        );
                        return false;
                    }
                    return true;
                }
                tracing::error!(
                    token = %entry.token,
                    "restore found no reduction to undo for a committed reservation"
                );
                false
            }
            RestoreOutcome::Unavailable => {
                tracing::warn!(
                    token = %entry.token,
                    "restore unconfirmed within the retry budget"
                );
                false
            }
        }
    }

    /// Delivers restores under the entry's token until one resolves or the
    /// budget runs out.
    async fn restore_with_retry(&self, entry: &ReservationEntry) -> RestoreOutcome {
        let mut delivery = 1;
        loop {
            let outcome = self
                .client
                .restore(RestoreRequest {
                    token: entry.token.clone(),
                    product_id: entry.product_id.clone(),
                    variant_key: entry.variant_key.clone(),
                    quantity: entry.quantity,
                })
                .await;

            if outcome != RestoreOutcome::Unavailable {
                return outcome;
            }
            if self.compensation_retry.is_exhausted(delivery) {
                return RestoreOutcome::Unavailable;
            }
            tokio::time::sleep(self.compensation_retry.delay_for(delivery)).await;
            delivery += 1;
        }
    }

    /// Cancels the order record if one exists and closes the attempt.
    async fn abort(
        &self,
        attempt: &mut OrderAttempt,
        reason: AbortReason,
        stuck: Vec<IdempotencyToken>,
        checkout_start: Instant,
    ) -> CheckoutOutcome {
        if let Some(order_id) = attempt.order_id {
            if let Err(err) = self.orders.mark_status(order_id, OrderStatus::Cancelled).await {
                tracing::error!(
                    %order_id,
                    error = %err,
                    "aborted order could not be marked cancelled"
                );
            }
        }
        attempt.advance(CheckoutPhase::Aborted);

        metrics::counter!("checkout_aborted", "reason" => reason.label()).increment(1);
        metrics::histogram!("checkout_duration_seconds")
            .record(checkout_start.elapsed().as_secs_f64());
        tracing::warn!(
            attempt_id = %attempt.attempt_id,
            %reason,
            stuck = stuck.len(),
            "checkout aborted"
        );

        CheckoutOutcome::Aborted {
            attempt_id: attempt.attempt_id,
            order_id: attempt.order_id,
            reason,
            stuck,
        }
    }
}

/// Validates quantities and merges duplicate (product, variant) lines.
///
/// Tokens are derived per (attempt, product, variant), so a cart listing a
/// variant twice reserves once with the summed quantity.
fn merge_lines(lines: Vec<CartLine>) -> Result<Vec<CartLine>> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                variant_key: line.variant_key,
            });
        }
        match merged
            .iter_mut()
            .find(|m| m.product_id == line.product_id && m.variant_key == line.variant_key)
        {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line),
        }
    }
    Ok(merged)
}
