//! Single-writer actor around a [`SettlementEngine`].
//!
//! The engine moves into one tokio task. Callers hold a cloneable
//! [`SaleHandle`] and submit requests over a bounded `mpsc` queue; each
//! request carries a `oneshot` for its reply. The task handles one
//! request to completion before reading the next, so no two mutations
//! ever interleave and every caller is priced against the state left by
//! the previous request.

use chrono::{DateTime, Utc};
use tokensale_ledger::LedgerSnapshot;
use tokensale_types::constants::SALE_ACTOR_QUEUE_DEPTH;
use tokensale_types::{
    AccountId, Amount, BuyReceipt, CloseReceipt, PriceBreakdown, Result, SaleError, SaleId,
    SaleInfo, SellReceipt,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::engine::SettlementEngine;
use crate::sink::EventSink;
use crate::transfer::ValueTransfer;

enum Command {
    Quote {
        quantity: Amount,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<Amount>>,
    },
    Buy {
        caller: AccountId,
        quantity: Amount,
        paid: Amount,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<BuyReceipt>>,
    },
    Sell {
        caller: AccountId,
        quantity: Amount,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<SellReceipt>>,
    },
    Info {
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<SaleInfo>>,
    },
    Breakdown {
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<PriceBreakdown>>,
    },
    EndSale {
        caller: AccountId,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<CloseReceipt>>,
    },
    Deposit {
        from: AccountId,
        amount: Amount,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<Amount>>,
    },
    BalanceOf {
        account: AccountId,
        reply: oneshot::Sender<Amount>,
    },
    Snapshot {
        reply: oneshot::Sender<LedgerSnapshot>,
    },
    Audit {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable front door to a running sale.
#[derive(Debug, Clone)]
pub struct SaleHandle {
    sale_id: SaleId,
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Quote { .. } => "Quote",
            Self::Buy { .. } => "Buy",
            Self::Sell { .. } => "Sell",
            Self::Info { .. } => "Info",
            Self::Breakdown { .. } => "Breakdown",
            Self::EndSale { .. } => "EndSale",
            Self::Deposit { .. } => "Deposit",
            Self::BalanceOf { .. } => "BalanceOf",
            Self::Snapshot { .. } => "Snapshot",
            Self::Audit { .. } => "Audit",
        };
        f.write_str(name)
    }
}

/// Move `engine` into a task.
///
/// The task runs until every [`SaleHandle`] is dropped, then yields the
/// engine back through the returned [`JoinHandle`].
pub fn spawn_sale<T, E>(
    engine: SettlementEngine<T, E>,
) -> (SaleHandle, JoinHandle<SettlementEngine<T, E>>)
where
    T: ValueTransfer + 'static,
    E: EventSink + 'static,
{
    let (tx, rx) = mpsc::channel(SALE_ACTOR_QUEUE_DEPTH);
    let handle = SaleHandle {
        sale_id: engine.sale_id(),
        tx,
    };
    let task = tokio::spawn(run(engine, rx));
    (handle, task)
}

async fn run<T, E>(
    mut engine: SettlementEngine<T, E>,
    mut rx: mpsc::Receiver<Command>,
) -> SettlementEngine<T, E>
where
    T: ValueTransfer,
    E: EventSink,
{
    tracing::debug!(sale_id = %engine.sale_id(), "sale actor started");
    while let Some(command) = rx.recv().await {
        // A dropped reply receiver means the caller stopped waiting; the
        // request has still been applied.
        match command {
            Command::Quote { quantity, now, reply } => {
                let _ = reply.send(engine.quote(quantity, now));
            }
            Command::Buy {
                caller,
                quantity,
                paid,
                now,
                reply,
            } => {
                let _ = reply.send(engine.buy(caller, quantity, paid, now));
            }
            Command::Sell {
                caller,
                quantity,
                now,
                reply,
            } => {
                let _ = reply.send(engine.sell(caller, quantity, now));
            }
            Command::Info { now, reply } => {
                let _ = reply.send(engine.info(now));
            }
            Command::Breakdown { now, reply } => {
                let _ = reply.send(engine.price_breakdown(now));
            }
            Command::EndSale { caller, now, reply } => {
                let _ = reply.send(engine.end_sale(caller, now));
            }
            Command::Deposit {
                from,
                amount,
                now,
                reply,
            } => {
                let _ = reply.send(engine.deposit_reserve(from, amount, now));
            }
            Command::BalanceOf { account, reply } => {
                let _ = reply.send(engine.balance_of(account));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(engine.snapshot());
            }
            Command::Audit { reply } => {
                let _ = reply.send(engine.audit());
            }
        }
    }
    tracing::debug!(sale_id = %engine.sale_id(), "sale actor stopped");
    engine
}

fn stopped() -> SaleError {
    SaleError::Internal("sale actor stopped".into())
}

impl SaleHandle {
    #[must_use]
    pub fn sale_id(&self) -> SaleId {
        self.sale_id
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn quote(&self, quantity: Amount, now: DateTime<Utc>) -> Result<Amount> {
        self.request(|reply| Command::Quote { quantity, now, reply }).await?
    }

    pub async fn buy(
        &self,
        caller: AccountId,
        quantity: Amount,
        paid: Amount,
        now: DateTime<Utc>,
    ) -> Result<BuyReceipt> {
        self.request(|reply| Command::Buy {
            caller,
            quantity,
            paid,
            now,
            reply,
        })
        .await?
    }

    pub async fn sell(
        &self,
        caller: AccountId,
        quantity: Amount,
        now: DateTime<Utc>,
    ) -> Result<SellReceipt> {
        self.request(|reply| Command::Sell {
            caller,
            quantity,
            now,
            reply,
        })
        .await?
    }

    pub async fn info(&self, now: DateTime<Utc>) -> Result<SaleInfo> {
        self.request(|reply| Command::Info { now, reply }).await?
    }

    pub async fn price_breakdown(&self, now: DateTime<Utc>) -> Result<PriceBreakdown> {
        self.request(|reply| Command::Breakdown { now, reply }).await?
    }

    pub async fn end_sale(&self, caller: AccountId, now: DateTime<Utc>) -> Result<CloseReceipt> {
        self.request(|reply| Command::EndSale { caller, now, reply }).await?
    }

    pub async fn deposit_reserve(
        &self,
        from: AccountId,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<Amount> {
        self.request(|reply| Command::Deposit {
            from,
            amount,
            now,
            reply,
        })
        .await?
    }

    pub async fn balance_of(&self, account: AccountId) -> Result<Amount> {
        self.request(|reply| Command::BalanceOf { account, reply }).await
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn audit(&self) -> Result<()> {
        self.request(|reply| Command::Audit { reply }).await?
    }
}
