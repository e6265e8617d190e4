use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_FAILED: &str = "FAILED";

pub const DISCOUNT_PERCENTAGE: &str = "PERCENTAGE";
pub const DISCOUNT_FIXED: &str = "FIXED";

pub const CODE_TYPE_PROMO: &str = "PROMO";
pub const CODE_TYPE_REWARD: &str = "REWARD";

pub const CREATOR_APPROVED: &str = "APPROVED";

#[derive(Queryable, Serialize, Debug, PartialEq)]
pub struct Wallet {
    pub user_id: String,
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::wallets)]
pub struct NewWallet<'a> {
    pub user_id: &'a str,
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct CoinPackage {
    pub id: i64,
    pub coins: i64,
    pub bonus_coins: i64,
    pub price: i64,
    pub currency: String,
    pub is_active: bool,
    pub sort_order: i32,
}

impl CoinPackage {
    pub fn total_coins(&self) -> i64 {
        self.coins + self.bonus_coins
    }
}

#[derive(Queryable, Serialize, Debug)]
pub struct CoinPurchase {
    pub id: i64,
    pub user_id: String,
    pub package_id: i64,
    pub coins: i64,
    pub bonus_coins: i64,
    pub total_coins: i64,
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub transaction_id: Option<String>,
    pub session_id: Option<String>,
    pub status: String,
    pub discount_code_id: Option<i64>,
    pub discount_bonus: i64,
    pub payment_gateway: String,
    #[serde(skip_serializing)]
    pub payment_data: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::coin_purchases)]
pub struct NewCoinPurchase<'a> {
    pub id: i64,
    pub user_id: &'a str,
    pub package_id: i64,
    pub coins: i64,
    pub bonus_coins: i64,
    pub total_coins: i64,
    pub amount: i64,
    pub currency: &'a str,
    pub order_id: &'a str,
    pub transaction_id: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub status: &'a str,
    pub discount_code_id: Option<i64>,
    pub discount_bonus: i64,
    pub payment_gateway: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct DiscountCode {
    pub id: i64,
    pub code: String,
    pub discount_type: String,
    pub discount_value: i64,
    pub code_type: String,
    pub owner_id: Option<String>,
    pub is_one_time_use: bool,
    pub max_redemptions: Option<i32>,
    pub current_redemptions: i32,
    pub min_purchase_amount: Option<i64>,
    pub expires_at: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::discount_codes)]
pub struct NewDiscountCode<'a> {
    pub id: i64,
    pub code: &'a str,
    pub discount_type: &'a str,
    pub discount_value: i64,
    pub code_type: &'a str,
    pub owner_id: Option<&'a str>,
    pub is_one_time_use: bool,
    pub max_redemptions: Option<i32>,
    pub current_redemptions: i32,
    pub min_purchase_amount: Option<i64>,
    pub expires_at: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Debug)]
pub struct DiscountRedemption {
    pub id: i64,
    pub discount_code_id: i64,
    pub purchase_id: i64,
    pub user_id: String,
    pub bonus_coins_awarded: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::discount_redemptions)]
pub struct NewDiscountRedemption<'a> {
    pub id: i64,
    pub discount_code_id: i64,
    pub purchase_id: i64,
    pub user_id: &'a str,
    pub bonus_coins_awarded: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct Gift {
    pub id: i64,
    pub name: String,
    pub coin_price: i64,
    pub is_active: bool,
    pub sort_order: i32,
}

#[derive(Queryable, Serialize, Debug)]
pub struct GiftTransaction {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub gift_id: i64,
    pub coin_amount: i64,
    pub stream_id: Option<String>,
    pub message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::gift_transactions)]
pub struct NewGiftTransaction<'a> {
    pub id: i64,
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub gift_id: i64,
    pub coin_amount: i64,
    pub stream_id: Option<&'a str>,
    pub message: Option<&'a str>,
    pub created_at: NaiveDateTime,
}
