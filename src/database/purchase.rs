use chrono::Utc;
use diesel::{
    BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl,
};
use tracing::{error, info, warn};

use crate::database::models::{
    CoinPackage, CoinPurchase, NewCoinPurchase, STATUS_COMPLETED, STATUS_FAILED, STATUS_PENDING,
};
use crate::database::{discount, idgen, wallet};
use crate::errors::EconomyError;
use crate::gateway::{CheckoutSession, PaymentGateway, WebhookEvent, WebhookOutcome};

/// What applying one webhook delivery did. Only `Completed` and `Failed`
/// mutate anything; the rest are informational and the handler acknowledges
/// them all the same.
#[derive(Debug)]
pub enum SettlementOutcome {
    Completed(CoinPurchase),
    Failed(CoinPurchase),
    /// The purchase is already in a terminal state; duplicate delivery.
    AlreadyApplied { purchase_id: i64, status: String },
    /// No purchase matches the event's identifiers.
    NotFound,
    /// Event type that settles nothing.
    Ignored,
}

/// Creates the PENDING purchase and the gateway checkout session for it. The
/// discount, if any, is validated here and its bonus pinned on the row so
/// settlement credits exactly what this preview promised.
pub fn open_purchase(
    conn: &mut PgConnection,
    gateway: &PaymentGateway,
    req_user_id: &str,
    req_package_id: i64,
    discount_code: Option<&str>,
) -> Result<(CoinPurchase, CheckoutSession), EconomyError> {
    conn.transaction::<_, EconomyError, _>(|conn| {
        let package = {
            use crate::schema::coin_packages::dsl::*;
            coin_packages
                .filter(id.eq(req_package_id).and(is_active.eq(true)))
                .first::<CoinPackage>(conn)
                .optional()?
                .ok_or(EconomyError::PackageNotFound)?
        };

        let pinned_discount = match discount_code {
            Some(code_str) => {
                let (code, preview) = discount::validate(conn, code_str, req_package_id, req_user_id)?;
                Some((code.id, preview.bonus_coins))
            }
            None => None,
        };
        let (discount_code_id, discount_bonus) = pinned_discount.map_or((None, 0), |(id, b)| (Some(id), b));

        let order_id = idgen::order_id();
        let session = gateway.create_checkout_session(&order_id, package.price, &package.currency);
        let now = Utc::now().naive_utc();

        let purchase = {
            use crate::schema::coin_purchases::dsl::coin_purchases;
            diesel::insert_into(coin_purchases)
                .values(NewCoinPurchase {
                    id: idgen::next(),
                    user_id: req_user_id,
                    package_id: package.id,
                    coins: package.coins,
                    bonus_coins: package.bonus_coins,
                    total_coins: package.total_coins() + discount_bonus,
                    amount: package.price,
                    currency: &package.currency,
                    order_id: &order_id,
                    transaction_id: None,
                    session_id: Some(&session.session_id),
                    status: STATUS_PENDING,
                    discount_code_id,
                    discount_bonus,
                    payment_gateway: gateway.name(),
                    created_at: now,
                    updated_at: now,
                })
                .get_result::<CoinPurchase>(conn)?
        };
        Ok((purchase, session))
    })
}

fn find_for_update(conn: &mut PgConnection, event: &WebhookEvent) -> Result<Option<CoinPurchase>, EconomyError> {
    use crate::schema::coin_purchases::dsl::*;
    if let Some(tid) = event.transaction_id.as_deref() {
        let found = coin_purchases
            .filter(transaction_id.eq(tid))
            .for_update()
            .first::<CoinPurchase>(conn)
            .optional()?;
        if found.is_some() {
            return Ok(found);
        }
    }
    // checkout-creation and webhook time can disagree on which identifier the
    // gateway uses; fall back to the session id recorded when the purchase
    // was opened
    if let Some(sid) = event.session_id.as_deref() {
        let found = coin_purchases
            .filter(session_id.eq(sid))
            .for_update()
            .first::<CoinPurchase>(conn)
            .optional()?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

/// Applies one normalized webhook event. The status guard and every mutation
/// it protects run in one transaction over a row locked `FOR UPDATE`, so of
/// two concurrent deliveries exactly one settles and the other observes the
/// terminal state and no-ops.
pub fn apply_webhook(conn: &mut PgConnection, event: &WebhookEvent) -> Result<SettlementOutcome, EconomyError> {
    if event.outcome == WebhookOutcome::Ignored {
        return Ok(SettlementOutcome::Ignored);
    }
    conn.transaction::<_, EconomyError, _>(|conn| {
        let purchase = match find_for_update(conn, event)? {
            Some(p) => p,
            None => return Ok(SettlementOutcome::NotFound),
        };
        if purchase.status != STATUS_PENDING {
            return Ok(SettlementOutcome::AlreadyApplied {
                purchase_id: purchase.id,
                status: purchase.status,
            });
        }

        let now = Utc::now().naive_utc();
        use crate::schema::coin_purchases::dsl::*;
        match event.outcome {
            WebhookOutcome::Succeeded => {
                let updated = diesel::update(coin_purchases.filter(id.eq(purchase.id)))
                    .set((
                        status.eq(STATUS_COMPLETED),
                        transaction_id.eq(event
                            .transaction_id
                            .as_deref()
                            .or(purchase.transaction_id.as_deref())),
                        payment_data.eq(Some(event.raw.clone())),
                        updated_at.eq(now),
                    ))
                    .get_result::<CoinPurchase>(conn)?;

                wallet::credit(conn, &updated.user_id, updated.total_coins, 0)?;
                if let Some(code_id) = updated.discount_code_id {
                    discount::redeem(conn, code_id, updated.id, &updated.user_id, updated.discount_bonus)?;
                }
                Ok(SettlementOutcome::Completed(updated))
            }
            WebhookOutcome::Failed => {
                let updated = diesel::update(coin_purchases.filter(id.eq(purchase.id)))
                    .set((
                        status.eq(STATUS_FAILED),
                        failure_reason.eq(event.failure_reason.as_deref().unwrap_or("payment failed")),
                        payment_data.eq(Some(event.raw.clone())),
                        updated_at.eq(now),
                    ))
                    .get_result::<CoinPurchase>(conn)?;
                Ok(SettlementOutcome::Failed(updated))
            }
            WebhookOutcome::Ignored => unreachable!(),
        }
    })
}

/// Full settlement of one delivery: apply the event, then issue the reward
/// code for a completed purchase. Reward issuance is best-effort and runs
/// after the settlement transaction committed; its failure is logged and
/// never unwinds the settlement.
pub fn settle(conn: &mut PgConnection, event: &WebhookEvent) -> Result<SettlementOutcome, EconomyError> {
    let outcome = apply_webhook(conn, event)?;
    match &outcome {
        SettlementOutcome::Completed(purchase) => {
            info!(purchase_id = purchase.id, coins = purchase.total_coins, "purchase settled");
            if let Err(e) = discount::issue_reward(conn, &purchase.user_id, purchase.amount) {
                error!(purchase_id = purchase.id, "reward code issuance failed: {e}");
            }
        }
        SettlementOutcome::Failed(purchase) => {
            info!(purchase_id = purchase.id, "purchase failed");
        }
        SettlementOutcome::AlreadyApplied { purchase_id, status } => {
            info!(purchase_id, status = status.as_str(), "duplicate webhook delivery, no-op");
        }
        SettlementOutcome::NotFound => {
            warn!(
                transaction_id = event.transaction_id.as_deref().unwrap_or(""),
                session_id = event.session_id.as_deref().unwrap_or(""),
                "webhook for unknown purchase"
            );
        }
        SettlementOutcome::Ignored => {}
    }
    Ok(outcome)
}

pub fn purchases_for(
    conn: &mut PgConnection,
    req_user_id: &str,
    page: i64,
    per_page: i64,
) -> Result<Vec<CoinPurchase>, EconomyError> {
    use crate::schema::coin_purchases::dsl::*;
    let rows = coin_purchases
        .filter(user_id.eq(req_user_id))
        .order(created_at.desc())
        .offset(page * per_page)
        .limit(per_page)
        .load::<CoinPurchase>(conn)?;
    Ok(rows)
}

pub fn active_packages(conn: &mut PgConnection) -> Result<Vec<CoinPackage>, EconomyError> {
    use crate::schema::coin_packages::dsl::*;
    let rows = coin_packages
        .filter(is_active.eq(true))
        .order(sort_order.asc())
        .load::<CoinPackage>(conn)?;
    Ok(rows)
}
