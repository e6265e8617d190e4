use diesel::{Connection, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl};

use crate::database::models::{NewWallet, Wallet};
use crate::errors::EconomyError;

// creates the wallet row if missing, on conflict does nothing
fn init_wallet(conn: &mut PgConnection, req_user_id: &str) -> Result<(), diesel::result::Error> {
    use crate::schema::wallets::dsl::*;
    diesel::insert_into(wallets)
        .values(NewWallet {
            user_id: req_user_id,
            balance: 0,
            total_earned: 0,
            total_spent: 0,
        })
        .on_conflict(user_id)
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Returns the user's wallet, creating an empty one on first access.
pub fn get_or_create(conn: &mut PgConnection, req_user_id: &str) -> Result<Wallet, EconomyError> {
    conn.transaction::<_, EconomyError, _>(|conn| {
        init_wallet(conn, req_user_id)?;
        use crate::schema::wallets::dsl::*;
        let wallet = wallets.filter(user_id.eq(req_user_id)).first::<Wallet>(conn)?;
        Ok(wallet)
    })
}

/// Adds `amount` coins to the wallet, creating it if needed. `earned_delta`
/// tracks coins the user earned (creator gift income) as opposed to bought.
/// Credits never fail for balance reasons; callers must pass non-negative
/// amounts.
pub fn credit(
    conn: &mut PgConnection,
    req_user_id: &str,
    amount: i64,
    earned_delta: i64,
) -> Result<Wallet, EconomyError> {
    debug_assert!(amount >= 0 && earned_delta >= 0);
    init_wallet(conn, req_user_id)?;
    use crate::schema::wallets::dsl::*;
    let wallet = diesel::update(wallets.filter(user_id.eq(req_user_id)))
        .set((
            balance.eq(balance + amount),
            total_earned.eq(total_earned + earned_delta),
        ))
        .get_result::<Wallet>(conn)?;
    Ok(wallet)
}

/// Removes `amount` coins from the wallet. The balance check and the decrement
/// are one conditional UPDATE, so two concurrent debits can never jointly
/// overdraw: the row predicate `balance >= amount` is re-evaluated under the
/// row lock and the loser matches zero rows.
pub fn debit(conn: &mut PgConnection, req_user_id: &str, amount: i64) -> Result<Wallet, EconomyError> {
    debug_assert!(amount >= 0);
    use crate::schema::wallets::dsl::*;
    let updated = diesel::update(
        wallets
            .filter(user_id.eq(req_user_id))
            .filter(balance.ge(amount)),
    )
    .set((
        balance.eq(balance - amount),
        total_spent.eq(total_spent + amount),
    ))
    .get_result::<Wallet>(conn)
    .optional()?;
    // a missing wallet debits like an empty one
    updated.ok_or(EconomyError::InsufficientBalance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use diesel::result::Error;
    use std::ops::DerefMut;

    #[test]
    fn test_credit_then_debit() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let w = credit(conn, "wallet_user_1", 100, 0).unwrap();
            assert_eq!(w.balance, 100);
            assert_eq!(w.total_earned, 0);

            let w = debit(conn, "wallet_user_1", 30).unwrap();
            assert_eq!(w.balance, 70);
            assert_eq!(w.total_spent, 30);
            Ok(())
        });
    }

    #[test]
    fn test_debit_insufficient_leaves_balance() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            credit(conn, "wallet_user_2", 50, 0).unwrap();

            let res = debit(conn, "wallet_user_2", 100);
            assert!(matches!(res, Err(EconomyError::InsufficientBalance)));

            let w = get_or_create(conn.deref_mut(), "wallet_user_2").unwrap();
            assert_eq!(w.balance, 50);
            Ok(())
        });
    }

    #[test]
    fn test_debit_missing_wallet() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let res = debit(conn, "wallet_user_missing", 1);
            assert!(matches!(res, Err(EconomyError::InsufficientBalance)));
            Ok(())
        });
    }

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let a = get_or_create(conn.deref_mut(), "wallet_user_3").unwrap();
            assert_eq!(a.balance, 0);
            let b = get_or_create(conn.deref_mut(), "wallet_user_3").unwrap();
            assert_eq!(a, b);
            Ok(())
        });
    }

    // test_transaction on a single connection cannot exhibit the debit race,
    // so this one commits real rows over two pooled connections and cleans up
    // after itself.
    #[test]
    fn test_concurrent_debits_cannot_overdraw() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();
        let uid = format!("wallet_race_{}", database::idgen::next());

        credit(pool.get().unwrap().deref_mut(), &uid, 100, 0).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let pool = pool.clone();
                let uid = uid.clone();
                std::thread::spawn(move || debit(pool.get().unwrap().deref_mut(), &uid, 100))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // the conditional UPDATE re-checks `balance >= amount` under the row
        // lock, so exactly one of the two debits can win
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results.iter().filter(|r| matches!(r, Err(EconomyError::InsufficientBalance))).count(),
            1
        );

        let w = get_or_create(pool.get().unwrap().deref_mut(), &uid).unwrap();
        assert_eq!(w.balance, 0);
        assert_eq!(w.total_spent, 100);

        use crate::schema::wallets::dsl::*;
        diesel::delete(wallets.filter(user_id.eq(&uid)))
            .execute(pool.get().unwrap().deref_mut())
            .unwrap();
    }

    #[test]
    fn test_earned_tracking() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            // bought coins do not count as earned, gift income does
            credit(conn, "wallet_user_4", 500, 0).unwrap();
            let w = credit(conn, "wallet_user_4", 70, 70).unwrap();
            assert_eq!(w.balance, 570);
            assert_eq!(w.total_earned, 70);
            Ok(())
        });
    }
}
