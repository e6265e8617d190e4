use chrono::{Duration, NaiveDateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error};
use diesel::{
    BoolExpressionMethods, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl,
};
use serde::Serialize;
use tracing::warn;

use crate::database::models::{
    CoinPackage, DiscountCode, NewDiscountCode, NewDiscountRedemption, CODE_TYPE_REWARD, DISCOUNT_FIXED,
    DISCOUNT_PERCENTAGE,
};
use crate::database::idgen;
use crate::errors::EconomyError;

const REWARD_PERCENT: i64 = 5;
const REWARD_VALIDITY_DAYS: i64 = 30;
const REWARD_CODE_ATTEMPTS: u32 = 5;

/// Successful validation result: what a purchase with this code would credit.
#[derive(Serialize, Debug, PartialEq)]
pub struct DiscountPreview {
    pub bonus_coins: i64,
    pub package_total: i64,
    pub grand_total: i64,
}

/// Bonus coins a code grants on top of a package. Integer arithmetic only;
/// both branches floor, so a code can never over-credit by rounding.
///
/// FIXED codes hold a discount in minor currency units. It converts to coins
/// at the package's price-per-coin ratio; multiplying first keeps the whole
/// expression exact until the single final floor.
pub fn compute_bonus(code: &DiscountCode, package: &CoinPackage) -> i64 {
    match code.discount_type.as_str() {
        DISCOUNT_PERCENTAGE => package.coins * code.discount_value / 100,
        DISCOUNT_FIXED if package.price > 0 => code.discount_value * package.coins / package.price,
        _ => 0,
    }
}

/// The stateless validation rules, ordered and short-circuiting. Split out of
/// [`validate`] so the rule sequence is checkable without a database; the two
/// lookups it cannot do itself arrive as arguments.
pub fn check_code(
    code: &DiscountCode,
    already_used_by_user: bool,
    now: NaiveDateTime,
) -> Result<(), EconomyError> {
    if !code.is_active {
        return Err(EconomyError::InactiveCode);
    }
    if let Some(expires_at) = code.expires_at {
        if expires_at <= now {
            return Err(EconomyError::ExpiredCode);
        }
    }
    if code.is_one_time_use && already_used_by_user {
        return Err(EconomyError::AlreadyUsed);
    }
    if let Some(max) = code.max_redemptions {
        if code.current_redemptions >= max {
            return Err(EconomyError::MaxRedemptions);
        }
    }
    Ok(())
}

fn load_code(conn: &mut PgConnection, input: &str) -> Result<Option<DiscountCode>, Error> {
    use crate::schema::discount_codes::dsl::*;
    discount_codes
        .filter(code.eq(input.to_uppercase()))
        .first::<DiscountCode>(conn)
        .optional()
}

fn user_has_redeemed(conn: &mut PgConnection, code_id: i64, req_user_id: &str) -> Result<bool, Error> {
    use crate::schema::discount_redemptions::dsl::*;
    discount_redemptions
        .filter(discount_code_id.eq(code_id).and(user_id.eq(req_user_id)))
        .count()
        .get_result::<i64>(conn)
        .map(|n| n > 0)
}

/// Validates `code_str` against `package_id` for `user_id` with no side
/// effects, returning either the preview or the first failing rule's kind.
pub fn validate(
    conn: &mut PgConnection,
    code_str: &str,
    req_package_id: i64,
    req_user_id: &str,
) -> Result<(DiscountCode, DiscountPreview), EconomyError> {
    let code = load_code(conn, code_str)?.ok_or(EconomyError::InvalidCode)?;
    let already_used = user_has_redeemed(conn, code.id, req_user_id)?;
    check_code(&code, already_used, Utc::now().naive_utc())?;

    let package = {
        use crate::schema::coin_packages::dsl::*;
        coin_packages
            .filter(id.eq(req_package_id).and(is_active.eq(true)))
            .first::<CoinPackage>(conn)
            .optional()?
            .ok_or(EconomyError::InvalidCode)?
    };
    if let Some(min) = code.min_purchase_amount {
        if package.price < min {
            return Err(EconomyError::MinPurchaseNotMet);
        }
    }

    let bonus_coins = compute_bonus(&code, &package);
    let package_total = package.total_coins();
    let preview = DiscountPreview {
        bonus_coins,
        package_total,
        grand_total: package_total + bonus_coins,
    };
    Ok((code, preview))
}

/// Records one redemption: audit row plus counter bump, both inside the
/// caller's settlement transaction so coins and redemption commit together.
pub fn redeem(
    conn: &mut PgConnection,
    code_id: i64,
    req_purchase_id: i64,
    req_user_id: &str,
    bonus_awarded: i64,
) -> Result<(), Error> {
    {
        use crate::schema::discount_redemptions::dsl::*;
        diesel::insert_into(discount_redemptions)
            .values(NewDiscountRedemption {
                id: idgen::next(),
                discount_code_id: code_id,
                purchase_id: req_purchase_id,
                user_id: req_user_id,
                bonus_coins_awarded: bonus_awarded,
                created_at: Utc::now().naive_utc(),
            })
            .execute(conn)?;
    }
    {
        use crate::schema::discount_codes::dsl::*;
        diesel::update(discount_codes.filter(id.eq(code_id)))
            .set(current_redemptions.eq(current_redemptions + 1))
            .execute(conn)?;
    }
    Ok(())
}

/// Creates the one-time REWARD code a completed purchase earns: a FIXED
/// discount worth 5% of the purchase amount, valid 30 days. Retries with a
/// fresh code string if the generated one collides.
pub fn issue_reward(
    conn: &mut PgConnection,
    req_user_id: &str,
    purchase_amount: i64,
) -> Result<DiscountCode, Error> {
    let value = purchase_amount * REWARD_PERCENT / 100;
    let now = Utc::now().naive_utc();
    let mut attempt = 0;
    loop {
        let code_str = idgen::reward_code();
        let res = {
            use crate::schema::discount_codes::dsl::*;
            diesel::insert_into(discount_codes)
                .values(NewDiscountCode {
                    id: idgen::next(),
                    code: &code_str,
                    discount_type: DISCOUNT_FIXED,
                    discount_value: value,
                    code_type: CODE_TYPE_REWARD,
                    owner_id: Some(req_user_id),
                    is_one_time_use: true,
                    max_redemptions: None,
                    current_redemptions: 0,
                    min_purchase_amount: None,
                    expires_at: Some(now + Duration::days(REWARD_VALIDITY_DAYS)),
                    is_active: true,
                    created_at: now,
                })
                .get_result::<DiscountCode>(conn)
        };
        match res {
            Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
                if attempt < REWARD_CODE_ATTEMPTS =>
            {
                attempt += 1;
                warn!(code = code_str.as_str(), attempt, "reward code collision, regenerating");
            }
            other => return other,
        }
    }
}

/// A code as the owner sees it, with the lifecycle flags computed at read time.
#[derive(Serialize, Debug)]
pub struct OwnedCode {
    #[serde(flatten)]
    pub code: DiscountCode,
    pub is_expired: bool,
    pub is_used_by_user: bool,
    pub is_maxed_out: bool,
}

pub fn codes_owned_by(conn: &mut PgConnection, req_user_id: &str) -> Result<Vec<OwnedCode>, Error> {
    let codes = {
        use crate::schema::discount_codes::dsl::*;
        discount_codes
            .filter(owner_id.eq(req_user_id))
            .order(created_at.desc())
            .load::<DiscountCode>(conn)?
    };
    let now = Utc::now().naive_utc();
    codes
        .into_iter()
        .map(|c| {
            let is_used_by_user = user_has_redeemed(conn, c.id, req_user_id)?;
            Ok(OwnedCode {
                is_expired: c.expires_at.map(|e| e <= now).unwrap_or(false),
                is_used_by_user,
                is_maxed_out: c.max_redemptions.map(|m| c.current_redemptions >= m).unwrap_or(false),
                code: c,
            })
        })
        .collect()
}

pub fn latest_reward(conn: &mut PgConnection, req_user_id: &str) -> Result<Option<DiscountCode>, Error> {
    use crate::schema::discount_codes::dsl::*;
    discount_codes
        .filter(owner_id.eq(req_user_id).and(code_type.eq(CODE_TYPE_REWARD)))
        .order(created_at.desc())
        .first::<DiscountCode>(conn)
        .optional()
}
