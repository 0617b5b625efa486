//! Checkout: order placement over reserved inventory.
//!
//! The [`OrderCoordinator`] drives one attempt at a time through reserve,
//! order creation, and payment, recording every reservation in a
//! [`ReservationLedger`] before the stock moves. Refusals, outages, and
//! cancellations funnel through synchronous compensation: committed
//! reductions are restored under their original tokens before the attempt
//! aborts, and restores that cannot be confirmed are reported as stuck
//! rather than dropped.
//!
//! Cart, payment, and order collaborators sit behind traits in
//! [`services`]; the in-memory implementations back the default wiring and
//! the tests, and the ledger also ships a PostgreSQL implementation.

pub mod attempt;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod money;
pub mod reservation;
pub mod services;

pub use attempt::{CheckoutPhase, OrderAttempt};
pub use coordinator::{CancelFlag, OrderCoordinator};
pub use error::{AbortReason, CheckoutError, CheckoutOutcome, Result};
pub use ledger::{InMemoryReservationLedger, LedgerError, PgReservationLedger, ReservationLedger};
pub use money::Money;
pub use reservation::{ReservationEntry, ReservationState};
pub use services::{
    CartLine, CartProvider, CartSnapshot, ChargeOutcome, CollaboratorError, InMemoryCartProvider,
    InMemoryOrderStore, InMemoryPaymentProvider, OrderRecord, OrderStatus, OrderStore,
    PaymentProvider,
};
