use crate::database::{idgen, models};
use crate::database::models::{NewPayment, NewWithdrawal};
use bigdecimal::BigDecimal;
use diesel::result::Error;
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl};

// creates user row with a zero balance, on conflict does nothing
pub fn ensure_user(conn: &mut PgConnection, req_user_id: &str) -> Result<bool, Error> {
    use crate::schema::users::dsl::*;
    diesel::insert_into(users)
        .values((
            user_id.eq(req_user_id),
            balance.eq(BigDecimal::from(0)),
            last_withdraw.eq(chrono::Utc::now().naive_utc()),
            auto_withdraw_is_enabled.eq(false),
            created_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .on_conflict(user_id)
        .do_nothing()
        .execute(conn)
        .map(|res| res > 0)
}

// get-or-create of the payment page plus the notification settings row
pub fn ensure_payment_page(conn: &mut PgConnection, req_user_id: &str) -> Result<models::PaymentPage, Error> {
    ensure_user(conn, req_user_id)?;
    {
        use crate::schema::payment_pages::dsl::*;
        diesel::insert_into(payment_pages)
            .values((user_id.eq(req_user_id), created_at.eq(chrono::Utc::now().naive_utc())))
            .on_conflict(user_id)
            .do_nothing()
            .execute(conn)?;
    }
    {
        use crate::schema::settings::dsl::*;
        diesel::insert_into(settings)
            .values(user_id.eq(req_user_id))
            .on_conflict(user_id)
            .do_nothing()
            .execute(conn)?;
    }
    {
        use crate::schema::payment_pages::dsl::*;
        payment_pages
            .filter(user_id.eq(req_user_id))
            .first::<models::PaymentPage>(conn)
    }
}

#[derive(PartialEq, Debug)]
pub enum WithdrawCommit {
    Committed { withdrawal_id: i64 },
    InsufficientBalance,
}

// final step of a settlement: debits the user, books the withdrawal and
// credits the commission to the cash register, all in one transaction
pub fn commit_withdrawal(
    conn: &mut PgConnection,
    req_user_id: &str,
    requested_native: &BigDecimal,
    debit_native: &BigDecimal,
    net_usd: &BigDecimal,
    commission_usd: &BigDecimal,
    req_method: &str,
    req_additional_info: Option<serde_json::Value>,
) -> Result<WithdrawCommit, Error> {
    conn.transaction::<_, Error, _>(|conn| {
        // lock the user row, then re-check sufficiency under the lock
        let user = {
            use crate::schema::users::dsl::*;
            users
                .filter(user_id.eq(req_user_id))
                .for_update()
                .first::<models::User>(conn)
        }?;
        if requested_native > &user.balance {
            return Ok(WithdrawCommit::InsufficientBalance);
        }

        let settled_at = chrono::Utc::now().naive_utc();
        let balance_after = user.balance.clone() - debit_native.clone();
        {
            use crate::schema::users::dsl::*;
            diesel::update(users.filter(user_id.eq(req_user_id)))
                .set((balance.eq(balance_after), last_withdraw.eq(settled_at)))
                .execute(conn)?;
        }

        let withdrawal_id = idgen::next();
        {
            use crate::schema::withdrawals::dsl::*;
            let new_withdrawal = NewWithdrawal {
                id: withdrawal_id,
                user_id: req_user_id.to_string(),
                money: net_usd.clone(),
                method: req_method.to_string(),
                additional_info: req_additional_info,
                created_at: settled_at,
            };
            diesel::insert_into(withdrawals).values(&new_withdrawal).execute(conn)?;
        }
        {
            // serialized increment, no read-modify-write in application code
            use crate::schema::cash_register::dsl::*;
            diesel::update(cash_register.filter(id.eq(1i16)))
                .set(amount.eq(amount + commission_usd.clone()))
                .execute(conn)?;
        }

        Ok(WithdrawCommit::Committed { withdrawal_id })
    })
}

// credits the receiver and books the immutable payment record
pub fn record_donation(
    conn: &mut PgConnection,
    req_from_user: Option<&str>,
    req_from_name: &str,
    req_to_user: &str,
    req_message: &str,
    req_money: &BigDecimal,
    req_currency: &str,
    req_credited_value: &BigDecimal,
) -> Result<i64, Error> {
    if let Some(sender) = req_from_user {
        ensure_user(conn, sender)?;
    }

    conn.transaction::<_, Error, _>(|conn| {
        let receiver = {
            use crate::schema::users::dsl::*;
            users
                .filter(user_id.eq(req_to_user))
                .for_update()
                .first::<models::User>(conn)
        }?;

        let balance_after = receiver.balance.clone() + req_credited_value.clone();
        {
            use crate::schema::users::dsl::*;
            diesel::update(users.filter(user_id.eq(req_to_user)))
                .set(balance.eq(balance_after))
                .execute(conn)?;
        }

        let payment_id = idgen::next();
        {
            use crate::schema::payments::dsl::*;
            let new_payment = NewPayment {
                id: payment_id,
                from_user: req_from_user.map(str::to_string),
                from_name: req_from_name.to_string(),
                to_user: req_to_user.to_string(),
                message: req_message.to_string(),
                money: req_money.clone(),
                currency: req_currency.to_string(),
                credited_value: req_credited_value.clone(),
                created_at: chrono::Utc::now().naive_utc(),
            };
            diesel::insert_into(payments).values(&new_payment).execute(conn)?;
        }

        Ok(payment_id)
    })
}

// flips auto-withdraw participation for a user
pub fn set_auto_withdraw(conn: &mut PgConnection, req_user_id: &str, enabled: bool) -> Result<bool, Error> {
    use crate::schema::users::dsl::*;
    diesel::update(users.filter(user_id.eq(req_user_id)))
        .set(auto_withdraw_is_enabled.eq(enabled))
        .execute(conn)
        .map(|res| res > 0)
}
