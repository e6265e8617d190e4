use chrono::Utc;
use diesel::{
    BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl,
};

use crate::database::models::{Gift, GiftTransaction, NewGiftTransaction};
use crate::database::{creators, idgen, wallet};
use crate::errors::EconomyError;

/// Creator share of a gift's price; the platform keeps the rest.
const CREATOR_SHARE_PERCENT: i64 = 70;

pub fn creator_amount(coin_price: i64) -> i64 {
    coin_price * CREATOR_SHARE_PERCENT / 100
}

/// Moves coins from sender to receiver for one gift: debit the full price,
/// credit the creator's share, record the transaction — all or nothing.
/// `coin_amount` on the record is the price the sender paid, not the net.
pub fn send_gift(
    conn: &mut PgConnection,
    sender_id: &str,
    receiver_id: &str,
    req_gift_id: i64,
    stream_id: Option<&str>,
    message: Option<&str>,
) -> Result<GiftTransaction, EconomyError> {
    conn.transaction::<_, EconomyError, _>(|conn| {
        let gift = {
            use crate::schema::gifts::dsl::*;
            gifts
                .filter(id.eq(req_gift_id).and(is_active.eq(true)))
                .first::<Gift>(conn)
                .optional()?
                .ok_or(EconomyError::GiftNotFound)?
        };
        if sender_id == receiver_id {
            return Err(EconomyError::SelfGift);
        }
        if !creators::is_approved_creator(conn, receiver_id)? {
            return Err(EconomyError::ReceiverNotCreator);
        }

        wallet::debit(conn, sender_id, gift.coin_price)?;
        let earned = creator_amount(gift.coin_price);
        wallet::credit(conn, receiver_id, earned, earned)?;

        use crate::schema::gift_transactions::dsl::gift_transactions;
        let record = diesel::insert_into(gift_transactions)
            .values(NewGiftTransaction {
                id: idgen::next(),
                sender_id,
                receiver_id,
                gift_id: gift.id,
                coin_amount: gift.coin_price,
                stream_id,
                message,
                created_at: Utc::now().naive_utc(),
            })
            .get_result::<GiftTransaction>(conn)?;
        Ok(record)
    })
}

pub fn active_gifts(conn: &mut PgConnection) -> Result<Vec<Gift>, EconomyError> {
    use crate::schema::gifts::dsl::*;
    let rows = gifts
        .filter(is_active.eq(true))
        .order(sort_order.asc())
        .load::<Gift>(conn)?;
    Ok(rows)
}

pub fn gifts_sent(
    conn: &mut PgConnection,
    req_user_id: &str,
    page: i64,
    per_page: i64,
) -> Result<Vec<GiftTransaction>, EconomyError> {
    use crate::schema::gift_transactions::dsl::*;
    let rows = gift_transactions
        .filter(sender_id.eq(req_user_id))
        .order(created_at.desc())
        .offset(page * per_page)
        .limit(per_page)
        .load::<GiftTransaction>(conn)?;
    Ok(rows)
}

pub fn gifts_received(
    conn: &mut PgConnection,
    req_user_id: &str,
    page: i64,
    per_page: i64,
) -> Result<Vec<GiftTransaction>, EconomyError> {
    use crate::schema::gift_transactions::dsl::*;
    let rows = gift_transactions
        .filter(receiver_id.eq(req_user_id))
        .order(created_at.desc())
        .offset(page * per_page)
        .limit(per_page)
        .load::<GiftTransaction>(conn)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::database::models::CREATOR_APPROVED;
    use diesel::result::Error;
    use std::ops::DerefMut;

    fn seed_gift(conn: &mut PgConnection, price: i64) -> i64 {
        use crate::schema::gifts::dsl;
        let new_id = idgen::next();
        diesel::insert_into(dsl::gifts)
            .values((
                dsl::id.eq(new_id),
                dsl::name.eq("Rose"),
                dsl::coin_price.eq(price),
                dsl::is_active.eq(true),
                dsl::sort_order.eq(0),
            ))
            .execute(conn)
            .unwrap();
        new_id
    }

    fn seed_creator(conn: &mut PgConnection, req_user_id: &str, creator_status: &str) {
        use crate::schema::creator_profiles::dsl;
        diesel::insert_into(dsl::creator_profiles)
            .values((dsl::user_id.eq(req_user_id), dsl::status.eq(creator_status)))
            .execute(conn)
            .unwrap();
    }

    #[test]
    fn test_commission_split() {
        assert_eq!(creator_amount(100), 70);
        assert_eq!(creator_amount(99), 69);
        assert_eq!(creator_amount(1), 0);
    }

    #[test]
    fn test_send_gift_moves_coins() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let gift_id = seed_gift(conn, 100);
            seed_creator(conn, "creator_1", CREATOR_APPROVED);
            wallet::credit(conn, "fan_1", 250, 0).unwrap();

            let tx = send_gift(conn, "fan_1", "creator_1", gift_id, Some("stream_9"), Some("gg")).unwrap();
            assert_eq!(tx.coin_amount, 100);
            assert_eq!(tx.stream_id.as_deref(), Some("stream_9"));

            let sender = wallet::get_or_create(conn.deref_mut(), "fan_1").unwrap();
            assert_eq!(sender.balance, 150);
            assert_eq!(sender.total_spent, 100);

            let receiver = wallet::get_or_create(conn.deref_mut(), "creator_1").unwrap();
            assert_eq!(receiver.balance, 70);
            assert_eq!(receiver.total_earned, 70);

            assert_eq!(gifts_sent(conn.deref_mut(), "fan_1", 0, 10).unwrap().len(), 1);
            assert_eq!(gifts_received(conn.deref_mut(), "creator_1", 0, 10).unwrap().len(), 1);
            Ok(())
        });
    }

    #[test]
    fn test_insufficient_balance_aborts_whole_transfer() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let gift_id = seed_gift(conn, 100);
            seed_creator(conn, "creator_2", CREATOR_APPROVED);
            wallet::credit(conn, "fan_2", 50, 0).unwrap();

            let res = send_gift(conn, "fan_2", "creator_2", gift_id, None, None);
            assert!(matches!(res, Err(EconomyError::InsufficientBalance)));

            let sender = wallet::get_or_create(conn.deref_mut(), "fan_2").unwrap();
            assert_eq!(sender.balance, 50);
            let receiver = wallet::get_or_create(conn.deref_mut(), "creator_2").unwrap();
            assert_eq!(receiver.balance, 0);
            assert!(gifts_received(conn.deref_mut(), "creator_2", 0, 10).unwrap().is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_self_gift_rejected() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let gift_id = seed_gift(conn, 100);
            seed_creator(conn, "creator_3", CREATOR_APPROVED);
            wallet::credit(conn, "creator_3", 500, 0).unwrap();

            let res = send_gift(conn, "creator_3", "creator_3", gift_id, None, None);
            assert!(matches!(res, Err(EconomyError::SelfGift)));
            let w = wallet::get_or_create(conn.deref_mut(), "creator_3").unwrap();
            assert_eq!(w.balance, 500);
            Ok(())
        });
    }

    #[test]
    fn test_receiver_must_be_approved_creator() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let gift_id = seed_gift(conn, 100);
            seed_creator(conn, "applicant_1", "PENDING");
            wallet::credit(conn, "fan_3", 500, 0).unwrap();

            let res = send_gift(conn, "fan_3", "applicant_1", gift_id, None, None);
            assert!(matches!(res, Err(EconomyError::ReceiverNotCreator)));

            // no profile row at all behaves the same
            let res = send_gift(conn, "fan_3", "no_profile", gift_id, None, None);
            assert!(matches!(res, Err(EconomyError::ReceiverNotCreator)));
            Ok(())
        });
    }

    #[test]
    fn test_inactive_gift_not_sendable() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            use crate::schema::gifts::dsl;
            let gift_id = seed_gift(conn, 100);
            diesel::update(dsl::gifts.filter(dsl::id.eq(gift_id)))
                .set(dsl::is_active.eq(false))
                .execute(conn)
                .unwrap();
            seed_creator(conn, "creator_4", CREATOR_APPROVED);

            let res = send_gift(conn, "fan_4", "creator_4", gift_id, None, None);
            assert!(matches!(res, Err(EconomyError::GiftNotFound)));
            assert!(active_gifts(conn.deref_mut()).unwrap().is_empty());
            Ok(())
        });
    }
}
