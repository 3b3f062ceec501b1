//! The sale ledger: token inventory, reserve pool and sale-window state.
//!
//! Every mutating operation is split in two:
//!
//! 1. `prepare_*` runs every check, prices the request through the
//!    caller's pricing function and computes the post-state into a plan.
//!    It borrows the ledger immutably, so a rejected request cannot leave
//!    a trace.
//! 2. `commit_*` writes the plan's values. The only way it fails is a
//!    stale plan: one prepared before some other mutation committed.
//!
//! The settlement engine performs the outbound value transfer between the
//! two steps; if the transfer fails the plan is dropped and the ledger is
//! exactly as it was.

use chrono::{DateTime, TimeDelta, Utc};
use tokensale_types::{
    AccountId, Amount, BuyReceipt, CloseReceipt, DepositPolicy, PricingContext, Result,
    SaleError, SaleId, SaleParams, SellReceipt,
};

use crate::TokenBalances;

/// State of one token sale.
///
/// Quantities only move between three places: the sale's own inventory,
/// holder balances (the owner's retained allocation included) and the
/// reserve pool. Nothing is ever minted or burned after [`SaleLedger::open`].
#[derive(Debug, Clone)]
pub struct SaleLedger {
    pub(crate) sale_id: SaleId,
    pub(crate) owner: AccountId,
    pub(crate) total_supply: Amount,
    pub(crate) sale_token_balance: Amount,
    pub(crate) reserve_balance: Amount,
    pub(crate) sold_cumulative: Amount,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) sale_duration: Option<TimeDelta>,
    pub(crate) sale_cap: Option<Amount>,
    pub(crate) deposit_policy: DepositPolicy,
    pub(crate) sale_ended: bool,
    pub(crate) holders: TokenBalances,
    /// Number of committed mutations; plans are bound to the revision
    /// they were prepared against.
    pub(crate) revision: u64,
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// A fully validated purchase, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a plan has no effect until committed"]
pub struct PurchasePlan {
    buyer: AccountId,
    quantity: Amount,
    cost: Amount,
    refund: Amount,
    buyer_balance: Amount,
    sale_token_balance: Amount,
    reserve_balance: Amount,
    sold_cumulative: Amount,
    revision: u64,
}

impl PurchasePlan {
    pub fn buyer(&self) -> AccountId {
        self.buyer
    }

    pub fn quantity(&self) -> Amount {
        self.quantity
    }

    pub fn cost(&self) -> Amount {
        self.cost
    }

    /// Overpayment owed back to the buyer.
    pub fn refund(&self) -> Amount {
        self.refund
    }
}

/// A fully validated sell-back, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a plan has no effect until committed"]
pub struct SalePlan {
    seller: AccountId,
    quantity: Amount,
    proceeds: Amount,
    seller_balance: Amount,
    sale_token_balance: Amount,
    reserve_balance: Amount,
    sold_cumulative: Amount,
    revision: u64,
}

impl SalePlan {
    pub fn seller(&self) -> AccountId {
        self.seller
    }

    pub fn quantity(&self) -> Amount {
        self.quantity
    }

    /// Reserve currency owed to the seller.
    pub fn proceeds(&self) -> Amount {
        self.proceeds
    }
}

/// A validated close: sweep everything the sale holds to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a plan has no effect until committed"]
pub struct ClosePlan {
    owner: AccountId,
    tokens_swept: Amount,
    reserve_swept: Amount,
    owner_balance: Amount,
    revision: u64,
}

impl ClosePlan {
    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn tokens_swept(&self) -> Amount {
        self.tokens_swept
    }

    pub fn reserve_swept(&self) -> Amount {
        self.reserve_swept
    }
}

fn ensure_positive(quantity: Amount) -> Result<()> {
    if quantity.is_zero() {
        return Err(SaleError::InvalidQuantity);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SaleLedger
// ---------------------------------------------------------------------------

impl SaleLedger {
    /// Open a sale: the owner keeps `total_supply - sale_allocation`, the
    /// sale holds `sale_allocation`, and `initial_reserve` seeds the pool.
    ///
    /// `sale_cap` is the cumulative limit imposed by the pricing strategy,
    /// if it has one.
    ///
    /// # Errors
    /// `Configuration` if the allocation exceeds the supply.
    pub fn open(
        sale_id: SaleId,
        params: &SaleParams,
        sale_cap: Option<Amount>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let retained = params
            .total_supply
            .checked_sub(params.sale_allocation)
            .ok_or_else(|| {
                SaleError::Configuration(format!(
                    "sale_allocation {} exceeds total_supply {}",
                    params.sale_allocation, params.total_supply
                ))
            })?;

        let mut holders = TokenBalances::new();
        holders.set(params.owner, retained);

        tracing::debug!(
            %sale_id,
            owner = %params.owner,
            total_supply = %params.total_supply,
            sale_allocation = %params.sale_allocation,
            initial_reserve = %params.initial_reserve,
            "sale ledger opened"
        );

        Ok(Self {
            sale_id,
            owner: params.owner,
            total_supply: params.total_supply,
            sale_token_balance: params.sale_allocation,
            reserve_balance: params.initial_reserve,
            sold_cumulative: Amount::ZERO,
            created_at,
            sale_duration: params.sale_duration,
            sale_cap,
            deposit_policy: params.deposit_policy,
            sale_ended: false,
            holders,
            revision: 0,
        })
    }

    // -- Liveness -----------------------------------------------------------

    /// `true` once the configured window has passed (`now - createdAt > limit`).
    #[must_use]
    pub fn window_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.sale_duration
            .is_some_and(|limit| now.signed_duration_since(self.created_at) > limit)
    }

    /// Closed by the owner or lapsed.
    #[must_use]
    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        self.sale_ended || self.window_lapsed(now)
    }

    /// # Errors
    /// `SaleEnded` if the owner closed the sale or its window lapsed.
    pub fn check_active(&self, now: DateTime<Utc>) -> Result<()> {
        if self.is_ended(now) {
            return Err(SaleError::SaleEnded);
        }
        Ok(())
    }

    /// # Errors
    /// `ExceedsSaleLimit` if selling `quantity` more would pass the cap.
    pub fn reserve_capacity(&self, quantity: Amount) -> Result<()> {
        let Some(cap) = self.sale_cap else {
            return Ok(());
        };
        let after = self
            .sold_cumulative
            .checked_add(quantity)
            .ok_or(SaleError::overflow("sold cumulative"))?;
        if after > cap {
            return Err(SaleError::ExceedsSaleLimit {
                requested: quantity,
                remaining: cap.saturating_sub(self.sold_cumulative),
            });
        }
        Ok(())
    }

    /// Checks a buy must pass before it is priced.
    ///
    /// # Errors
    /// `SaleEnded`, `InvalidQuantity`, `ExceedsSaleLimit`, or
    /// `InsufficientInventory`, in that order.
    pub fn check_buy(&self, quantity: Amount, now: DateTime<Utc>) -> Result<()> {
        self.check_active(now)?;
        ensure_positive(quantity)?;
        self.reserve_capacity(quantity)?;
        if quantity > self.sale_token_balance {
            return Err(SaleError::InsufficientInventory {
                requested: quantity,
                available: self.sale_token_balance,
            });
        }
        Ok(())
    }

    /// Observable state handed to the pricing strategy.
    #[must_use]
    pub fn pricing_context(&self, now: DateTime<Utc>) -> PricingContext {
        PricingContext {
            total_supply: self.total_supply,
            sold_cumulative: self.sold_cumulative,
            reserve_balance: self.reserve_balance,
            created_at: self.created_at,
            now,
        }
    }

    // -- Buy ----------------------------------------------------------------

    /// Validate a purchase of `quantity` against `paid`. `price` is asked
    /// for the cost only after the buy checks pass.
    ///
    /// # Errors
    /// Any [`check_buy`](Self::check_buy) error, any pricing error,
    /// `InvalidQuantity` if the request prices to zero, then
    /// `InsufficientPayment`.
    pub fn prepare_purchase(
        &self,
        buyer: AccountId,
        quantity: Amount,
        paid: Amount,
        now: DateTime<Utc>,
        price: impl FnOnce(&PricingContext) -> Result<Amount>,
    ) -> Result<PurchasePlan> {
        self.check_buy(quantity, now)?;
        let cost = price(&self.pricing_context(now))?;
        // Tokens never leave the sale without reserve coming in.
        ensure_positive(cost)?;
        let refund = paid
            .checked_sub(cost)
            .ok_or(SaleError::InsufficientPayment { required: cost, paid })?;

        Ok(PurchasePlan {
            buyer,
            quantity,
            cost,
            refund,
            buyer_balance: self.holders.credited(buyer, quantity)?,
            sale_token_balance: self.sale_token_balance.saturating_sub(quantity),
            reserve_balance: self
                .reserve_balance
                .checked_add(cost)
                .ok_or(SaleError::overflow("reserve balance"))?,
            sold_cumulative: self
                .sold_cumulative
                .checked_add(quantity)
                .ok_or(SaleError::overflow("sold cumulative"))?,
            revision: self.revision,
        })
    }

    /// # Errors
    /// `Internal` if the ledger changed since the plan was prepared.
    pub fn commit_purchase(&mut self, plan: PurchasePlan) -> Result<BuyReceipt> {
        self.ensure_current(plan.revision, "purchase")?;
        self.holders.set(plan.buyer, plan.buyer_balance);
        self.sale_token_balance = plan.sale_token_balance;
        self.reserve_balance = plan.reserve_balance;
        self.sold_cumulative = plan.sold_cumulative;
        self.revision += 1;
        Ok(BuyReceipt {
            quantity: plan.quantity,
            cost: plan.cost,
            refund: plan.refund,
        })
    }

    // -- Sell ---------------------------------------------------------------

    /// Validate a sell-back of `quantity`. `price` is asked for the
    /// proceeds only after the seller's balance is confirmed.
    ///
    /// # Errors
    /// `SaleEnded`, `InvalidQuantity`, `InsufficientBalance`, any pricing error,
    /// `InvalidQuantity` if the request prices to zero, then
    /// `InsufficientLiquidity`.
    pub fn prepare_sale(
        &self,
        seller: AccountId,
        quantity: Amount,
        now: DateTime<Utc>,
        price: impl FnOnce(&PricingContext) -> Result<Amount>,
    ) -> Result<SalePlan> {
        self.check_active(now)?;
        ensure_positive(quantity)?;
        let seller_balance = self.holders.debited(seller, quantity)?;
        let proceeds = price(&self.pricing_context(now))?;
        // Tokens never come back without reserve going out.
        ensure_positive(proceeds)?;
        let reserve_balance =
            self.reserve_balance
                .checked_sub(proceeds)
                .ok_or(SaleError::InsufficientLiquidity {
                    needed: proceeds,
                    available: self.reserve_balance,
                })?;

        Ok(SalePlan {
            seller,
            quantity,
            proceeds,
            seller_balance,
            sale_token_balance: self
                .sale_token_balance
                .checked_add(quantity)
                .ok_or(SaleError::overflow("sale token balance"))?,
            reserve_balance,
            // Sells beyond what the sale ever sold (the owner's retained
            // allocation) floor at zero.
            sold_cumulative: self.sold_cumulative.saturating_sub(quantity),
            revision: self.revision,
        })
    }

    /// # Errors
    /// `Internal` if the ledger changed since the plan was prepared.
    pub fn commit_sale(&mut self, plan: SalePlan) -> Result<SellReceipt> {
        self.ensure_current(plan.revision, "sale")?;
        self.holders.set(plan.seller, plan.seller_balance);
        self.sale_token_balance = plan.sale_token_balance;
        self.reserve_balance = plan.reserve_balance;
        self.sold_cumulative = plan.sold_cumulative;
        self.revision += 1;
        Ok(SellReceipt {
            quantity: plan.quantity,
            proceeds: plan.proceeds,
        })
    }

    // -- Admin --------------------------------------------------------------

    /// Add reserve currency to the pool. Token balances are untouched.
    ///
    /// Returns the new reserve balance.
    ///
    /// # Errors
    /// `NotOwner` under [`DepositPolicy::OwnerOnly`] for anyone but the
    /// owner, `SaleEnded`, or `InvalidQuantity` for a zero deposit.
    pub fn deposit_reserve(
        &mut self,
        from: AccountId,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<Amount> {
        if self.deposit_policy == DepositPolicy::OwnerOnly && from != self.owner {
            return Err(SaleError::NotOwner { caller: from });
        }
        self.check_active(now)?;
        ensure_positive(amount)?;
        self.reserve_balance = self
            .reserve_balance
            .checked_add(amount)
            .ok_or(SaleError::overflow("reserve deposit"))?;
        self.revision += 1;
        Ok(self.reserve_balance)
    }

    /// Validate closing the sale.
    ///
    /// Closing is allowed after the window lapsed, but only once.
    ///
    /// # Errors
    /// `NotOwner` unless `caller` is the owner; `SaleEnded` if already closed.
    pub fn prepare_close(&self, caller: AccountId) -> Result<ClosePlan> {
        if caller != self.owner {
            return Err(SaleError::NotOwner { caller });
        }
        if self.sale_ended {
            return Err(SaleError::SaleEnded);
        }
        Ok(ClosePlan {
            owner: self.owner,
            tokens_swept: self.sale_token_balance,
            reserve_swept: self.reserve_balance,
            owner_balance: self.holders.credited(self.owner, self.sale_token_balance)?,
            revision: self.revision,
        })
    }

    /// # Errors
    /// `Internal` if the ledger changed since the plan was prepared.
    pub fn commit_close(&mut self, plan: ClosePlan) -> Result<CloseReceipt> {
        self.ensure_current(plan.revision, "close")?;
        self.holders.set(plan.owner, plan.owner_balance);
        self.sale_token_balance = Amount::ZERO;
        self.reserve_balance = Amount::ZERO;
        self.sale_ended = true;
        self.revision += 1;
        Ok(CloseReceipt {
            tokens_swept: plan.tokens_swept,
            reserve_swept: plan.reserve_swept,
        })
    }

    fn ensure_current(&self, plan_revision: u64, kind: &str) -> Result<()> {
        if plan_revision != self.revision {
            return Err(SaleError::Internal(format!(
                "stale {kind} plan: prepared at revision {plan_revision}, ledger at {}",
                self.revision
            )));
        }
        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    #[must_use]
    pub fn sale_id(&self) -> SaleId {
        self.sale_id
    }

    #[must_use]
    pub fn owner(&self) -> AccountId {
        self.owner
    }

    #[must_use]
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    #[must_use]
    pub fn sale_token_balance(&self) -> Amount {
        self.sale_token_balance
    }

    #[must_use]
    pub fn reserve_balance(&self) -> Amount {
        self.reserve_balance
    }

    #[must_use]
    pub fn sold_cumulative(&self) -> Amount {
        self.sold_cumulative
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn sale_duration(&self) -> Option<TimeDelta> {
        self.sale_duration
    }

    #[must_use]
    pub fn sale_cap(&self) -> Option<Amount> {
        self.sale_cap
    }

    #[must_use]
    pub fn deposit_policy(&self) -> DepositPolicy {
        self.deposit_policy
    }

    /// Closed by the owner (a lapsed window does not set this).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sale_ended
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Tokens held by `account` outside the sale.
    #[must_use]
    pub fn balance_of(&self, account: AccountId) -> Amount {
        self.holders.balance(account)
    }

    /// All non-zero holders, ordered by account id.
    #[must_use]
    pub fn holders(&self) -> Vec<(AccountId, Amount)> {
        self.holders.holders()
    }

    /// Holder balances plus the sale's inventory.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the sum does not fit.
    pub fn token_supply(&self) -> Result<Amount> {
        self.holders
            .total()?
            .checked_add(self.sale_token_balance)
            .ok_or(SaleError::overflow("token supply"))
    }

    /// # Errors
    /// `SupplyInvariantViolation` if holders plus inventory differ from
    /// the fixed total supply.
    pub fn verify_conservation(&self) -> Result<()> {
        let actual = self.token_supply()?;
        if actual != self.total_supply {
            return Err(SaleError::SupplyInvariantViolation {
                reason: format!(
                    "{}: token balances sum to {actual}, total supply is {} \
                     (sale inventory={}, holders={})",
                    self.sale_id,
                    self.total_supply,
                    self.sale_token_balance,
                    self.holders.len(),
                ),
            });
        }
        Ok(())
    }
}
