//! The settlement engine: one sale, one writer.
//!
//! Every request follows the same shape:
//! 1. Prepare a ledger plan: the ledger runs its checks (liveness,
//!    quantity, cap, balances), then prices the request with the active
//!    [`PricingStrategy`], then runs the payment and liquidity checks
//! 2. Move value out through [`ValueTransfer`] (refund, payout, sweep)
//! 3. Commit the plan, update the reserve auditor
//! 4. Emit the event
//!
//! A failure at step 1 or 2 returns the error with the ledger untouched.
//! The engine holds `&mut self` from prepare to commit, so the plan is
//! always current when step 3 runs.

use chrono::{DateTime, Utc};
use tokensale_ledger::{LedgerSnapshot, SaleLedger};
use tokensale_pricing::{PricingStrategy, build_strategy};
use tokensale_types::constants::{ENGINE_NAME, VERSION};
use tokensale_types::{
    AccountId, Amount, BuyReceipt, CloseReceipt, PriceBreakdown, Result, SaleConfig, SaleError,
    SaleEvent, SaleEventRecord, SaleId, SaleInfo, SaleParams, SellReceipt, TradeSide,
};
use tracing::{debug, error, info, warn};

use crate::price_watch::PriceWatch;
use crate::sink::EventSink;
use crate::supply_conservation::SupplyConservation;
use crate::transfer::ValueTransfer;

/// Owns a [`SaleLedger`] exclusively and is the only path that mutates it.
pub struct SettlementEngine<T, E> {
    ledger: SaleLedger,
    strategy: Box<dyn PricingStrategy>,
    transfer: T,
    sink: E,
    watch: PriceWatch,
    supply: SupplyConservation,
    next_sequence: u64,
}

impl<T: ValueTransfer, E: EventSink> SettlementEngine<T, E> {
    /// Validate `config` and open a new sale created at `created_at`.
    ///
    /// # Errors
    /// `Configuration` for an invalid config.
    pub fn new(
        config: &SaleConfig,
        created_at: DateTime<Utc>,
        transfer: T,
        sink: E,
    ) -> Result<Self> {
        let params = config.resolve()?;
        Self::from_params(SaleId::new(), &params, created_at, transfer, sink)
    }

    /// Open a sale from already-validated parameters.
    ///
    /// A non-zero `initial_reserve` is recorded as an owner deposit and
    /// emitted as the first event.
    pub fn from_params(
        sale_id: SaleId,
        params: &SaleParams,
        created_at: DateTime<Utc>,
        transfer: T,
        sink: E,
    ) -> Result<Self> {
        let strategy = build_strategy(&params.pricing);
        let ledger = SaleLedger::open(
            sale_id,
            params,
            strategy.sale_cap(params.total_supply),
            created_at,
        )?;
        let initial_price = strategy.spot_price(&ledger.pricing_context(created_at))?;

        let mut supply = SupplyConservation::new();
        supply.record_inflow(params.initial_reserve);

        info!(
            engine = ENGINE_NAME,
            version = VERSION,
            %sale_id,
            owner = %params.owner,
            strategy = strategy.name(),
            total_supply = %params.total_supply,
            sale_allocation = %params.sale_allocation,
            %initial_price,
            "sale opened"
        );

        let mut engine = Self {
            ledger,
            strategy,
            transfer,
            sink,
            watch: PriceWatch::new(params.price_change_threshold_bps, initial_price),
            supply,
            next_sequence: 0,
        };
        if !params.initial_reserve.is_zero() {
            engine.emit(
                created_at,
                SaleEvent::ReserveDeposited {
                    from: params.owner,
                    amount: params.initial_reserve,
                },
            );
        }
        Ok(engine)
    }

    // =====================================================================
    // Reads
    // =====================================================================

    /// What `buy` would charge for `quantity` right now.
    ///
    /// Also a price poll: may emit `PriceUpdated`.
    ///
    /// # Errors
    /// `InvalidQuantity`, `ExceedsSaleLimit`, or `ArithmeticOverflow`.
    pub fn quote(&mut self, quantity: Amount, now: DateTime<Utc>) -> Result<Amount> {
        if quantity.is_zero() {
            return Err(SaleError::InvalidQuantity);
        }
        self.ledger.reserve_capacity(quantity)?;
        let ctx = self.ledger.pricing_context(now);
        let cost = self.strategy.quote(&ctx, TradeSide::Buy, quantity)?;
        debug!(sale_id = %self.ledger.sale_id(), %quantity, %cost, "quote");
        self.poll_price(now)?;
        Ok(cost)
    }

    /// Current price, balances and age. Also a price poll.
    pub fn info(&mut self, now: DateTime<Utc>) -> Result<SaleInfo> {
        let ctx = self.ledger.pricing_context(now);
        let current_price = self.poll_price(now)?;
        Ok(SaleInfo {
            current_price,
            sale_token_balance: self.ledger.sale_token_balance(),
            reserve_balance: self.ledger.reserve_balance(),
            time_since_creation_secs: ctx.elapsed().num_seconds(),
            sale_ended: self.ledger.is_ended(now),
        })
    }

    /// Decomposition of the current price.
    pub fn price_breakdown(&self, now: DateTime<Utc>) -> Result<PriceBreakdown> {
        self.strategy.breakdown(&self.ledger.pricing_context(now))
    }

    // =====================================================================
    // Buy / Sell
    // =====================================================================

    /// Buy `quantity` tokens, paying `paid`. Any overpayment is refunded
    /// through [`ValueTransfer`] before the purchase commits.
    ///
    /// # Errors
    /// `SaleEnded`, `InvalidQuantity`, `ExceedsSaleLimit`,
    /// `InsufficientInventory`, `InsufficientPayment`, or `TransferFailed`
    /// if the refund did not go through.
    pub fn buy(
        &mut self,
        caller: AccountId,
        quantity: Amount,
        paid: Amount,
        now: DateTime<Utc>,
    ) -> Result<BuyReceipt> {
        self.try_buy(caller, quantity, paid, now).inspect_err(|err| {
            warn!(
                sale_id = %self.ledger.sale_id(),
                buyer = %caller,
                %quantity,
                %paid,
                %err,
                "buy rejected"
            );
        })
    }

    fn try_buy(
        &mut self,
        caller: AccountId,
        quantity: Amount,
        paid: Amount,
        now: DateTime<Utc>,
    ) -> Result<BuyReceipt> {
        let strategy = &self.strategy;
        let plan = self.ledger.prepare_purchase(caller, quantity, paid, now, |ctx| {
            strategy.quote(ctx, TradeSide::Buy, quantity)
        })?;

        if !plan.refund().is_zero() {
            self.send(caller, plan.refund())?;
        }

        let receipt = self.ledger.commit_purchase(plan)?;
        self.supply.record_inflow(receipt.cost);
        info!(
            sale_id = %self.ledger.sale_id(),
            buyer = %caller,
            quantity = %receipt.quantity,
            cost = %receipt.cost,
            refund = %receipt.refund,
            reserve = %self.ledger.reserve_balance(),
            "tokens purchased"
        );
        self.emit(
            now,
            SaleEvent::TokensPurchased {
                buyer: caller,
                quantity: receipt.quantity,
                cost: receipt.cost,
            },
        );
        Ok(receipt)
    }

    /// Sell `quantity` tokens back to the sale for reserve currency.
    ///
    /// # Errors
    /// `SaleEnded`, `InvalidQuantity`, `InsufficientBalance`,
    /// `InsufficientLiquidity`, or `TransferFailed` if the payout did not
    /// go through.
    pub fn sell(
        &mut self,
        caller: AccountId,
        quantity: Amount,
        now: DateTime<Utc>,
    ) -> Result<SellReceipt> {
        self.try_sell(caller, quantity, now).inspect_err(|err| {
            warn!(
                sale_id = %self.ledger.sale_id(),
                seller = %caller,
                %quantity,
                %err,
                "sell rejected"
            );
        })
    }

    fn try_sell(
        &mut self,
        caller: AccountId,
        quantity: Amount,
        now: DateTime<Utc>,
    ) -> Result<SellReceipt> {
        let strategy = &self.strategy;
        let plan = self.ledger.prepare_sale(caller, quantity, now, |ctx| {
            strategy.quote(ctx, TradeSide::Sell, quantity)
        })?;

        self.send(caller, plan.proceeds())?;

        let receipt = self.ledger.commit_sale(plan)?;
        self.supply.record_outflow(receipt.proceeds);
        info!(
            sale_id = %self.ledger.sale_id(),
            seller = %caller,
            quantity = %receipt.quantity,
            proceeds = %receipt.proceeds,
            reserve = %self.ledger.reserve_balance(),
            "tokens sold"
        );
        self.emit(
            now,
            SaleEvent::TokensSold {
                seller: caller,
                quantity: receipt.quantity,
                proceeds: receipt.proceeds,
            },
        );
        Ok(receipt)
    }

    // =====================================================================
    // Admin
    // =====================================================================

    /// Close the sale and sweep its tokens and reserve to the owner.
    ///
    /// # Errors
    /// `NotOwner`, `SaleEnded` if already closed, or `TransferFailed` if
    /// the reserve sweep did not go through.
    pub fn end_sale(&mut self, caller: AccountId, now: DateTime<Utc>) -> Result<CloseReceipt> {
        let result = self.try_end_sale(caller, now);
        if let Err(err) = &result {
            warn!(sale_id = %self.ledger.sale_id(), %caller, %err, "end sale rejected");
        }
        result
    }

    fn try_end_sale(&mut self, caller: AccountId, now: DateTime<Utc>) -> Result<CloseReceipt> {
        let plan = self.ledger.prepare_close(caller)?;
        if !plan.reserve_swept().is_zero() {
            self.send(plan.owner(), plan.reserve_swept())?;
        }
        let owner = plan.owner();
        let receipt = self.ledger.commit_close(plan)?;
        self.supply.record_outflow(receipt.reserve_swept);
        info!(
            sale_id = %self.ledger.sale_id(),
            %owner,
            tokens_swept = %receipt.tokens_swept,
            reserve_swept = %receipt.reserve_swept,
            "sale closed"
        );
        self.emit(
            now,
            SaleEvent::SaleClosed {
                owner,
                tokens_swept: receipt.tokens_swept,
                reserve_swept: receipt.reserve_swept,
            },
        );
        Ok(receipt)
    }

    /// Add reserve liquidity. Returns the new reserve balance.
    ///
    /// # Errors
    /// `NotOwner` (owner-only policy), `SaleEnded`, or `InvalidQuantity`.
    pub fn deposit_reserve(
        &mut self,
        from: AccountId,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<Amount> {
        let reserve = self
            .ledger
            .deposit_reserve(from, amount, now)
            .inspect_err(|err| {
                warn!(sale_id = %self.ledger.sale_id(), %from, %amount, %err, "deposit rejected");
            })?;
        self.supply.record_inflow(amount);
        info!(sale_id = %self.ledger.sale_id(), %from, %amount, %reserve, "reserve deposited");
        self.emit(now, SaleEvent::ReserveDeposited { from, amount });
        Ok(reserve)
    }

    /// Check token conservation and the reserve ledger.
    ///
    /// # Errors
    /// `SupplyInvariantViolation`.
    pub fn audit(&self) -> Result<()> {
        self.supply.verify(&self.ledger).inspect_err(|err| {
            error!(sale_id = %self.ledger.sale_id(), %err, "conservation audit failed");
        })
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    #[must_use]
    pub fn sale_id(&self) -> SaleId {
        self.ledger.sale_id()
    }

    #[must_use]
    pub fn ledger(&self) -> &SaleLedger {
        &self.ledger
    }

    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    #[must_use]
    pub fn balance_of(&self, account: AccountId) -> Amount {
        self.ledger.balance_of(account)
    }

    #[must_use]
    pub fn holders(&self) -> Vec<(AccountId, Amount)> {
        self.ledger.holders()
    }

    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }

    #[must_use]
    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut T {
        &mut self.transfer
    }

    #[must_use]
    pub fn sink(&self) -> &E {
        &self.sink
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn send(&mut self, to: AccountId, amount: Amount) -> Result<()> {
        self.transfer
            .transfer(to, amount)
            .map_err(|err| SaleError::TransferFailed {
                to,
                amount,
                reason: err.reason,
            })
    }

    /// Evaluate the spot price and report it if it moved materially.
    fn poll_price(&mut self, now: DateTime<Utc>) -> Result<Amount> {
        let current = self.strategy.spot_price(&self.ledger.pricing_context(now))?;
        if let Some(previous) = self.watch.observe(current) {
            debug!(sale_id = %self.ledger.sale_id(), %previous, %current, "price moved");
            self.emit(now, SaleEvent::PriceUpdated { previous, current });
        }
        Ok(current)
    }

    fn emit(&mut self, at: DateTime<Utc>, event: SaleEvent) {
        let record = SaleEventRecord {
            sale_id: self.ledger.sale_id(),
            sequence: self.next_sequence,
            at,
            event,
        };
        self.next_sequence += 1;
        self.sink.emit(record);
    }
}

impl<T, E> std::fmt::Debug for SettlementEngine<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("ledger", &self.ledger)
            .field("strategy", &self.strategy)
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}
