use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Queryable)]
pub struct User {
    pub user_id: String,
    pub email: Option<String>,
    pub balance: BigDecimal,
    pub last_withdraw: NaiveDateTime,
    pub auto_withdraw_is_enabled: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable)]
pub struct PaymentPage {
    pub user_id: String,
    pub preferable_currency: String,
    pub minimum_donate_sum: BigDecimal,
    pub message_max_length: i32,
    pub bio: String,
    pub button_text: String,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable)]
pub struct Settings {
    pub user_id: String,
    pub email_is_enabled: bool,
    pub pop_up_is_enabled: bool,
}

#[derive(Queryable)]
pub struct Payment {
    pub id: i64,
    pub from_user: Option<String>,
    pub from_name: String,
    pub to_user: String,
    pub message: String,
    pub money: BigDecimal,
    pub currency: String,
    pub credited_value: BigDecimal,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: String,
    pub money: BigDecimal,
    pub method: String,
    pub additional_info: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable)]
pub struct CashRegister {
    pub id: i16,
    pub amount: BigDecimal,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::payments)]
pub struct NewPayment {
    pub id: i64,
    pub from_user: Option<String>,
    pub from_name: String,
    pub to_user: String,
    pub message: String,
    pub money: BigDecimal,
    pub currency: String,
    pub credited_value: BigDecimal,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::withdrawals)]
pub struct NewWithdrawal {
    pub id: i64,
    pub user_id: String,
    pub money: BigDecimal,
    pub method: String,
    pub additional_info: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}
