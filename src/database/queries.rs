use crate::database::models;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::{result::Error, BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl};

#[derive(PartialEq, Debug)]
pub enum UserBalance {
    Ok(UserBalanceValues),
    NotFound,
}

#[derive(PartialEq, Debug)]
pub struct UserBalanceValues {
    pub currency: String,
    pub balance: BigDecimal,
}

pub fn load_balance(conn: &mut PgConnection, req_user_id: &str) -> Result<UserBalance, Error> {
    conn.transaction::<_, Error, _>(|conn| {
        let user = {
            use crate::schema::users::dsl::*;
            users
                .filter(user_id.eq(req_user_id))
                .first::<models::User>(conn)
                .optional()
        }?;
        let user = match user {
            Some(user) => user,
            None => return Ok(UserBalance::NotFound),
        };
        // the balance is denominated in the page currency; users who never
        // received a donation have no page yet and default to USD
        let page = {
            use crate::schema::payment_pages::dsl::*;
            payment_pages
                .filter(user_id.eq(req_user_id))
                .first::<models::PaymentPage>(conn)
                .optional()
        }?;
        let currency = page
            .map(|page| page.preferable_currency)
            .unwrap_or_else(|| "USD".to_string());
        Ok(UserBalance::Ok(UserBalanceValues {
            currency,
            balance: user.balance,
        }))
    })
}

pub fn load_payment_page(conn: &mut PgConnection, req_user_id: &str) -> Result<Option<models::PaymentPage>, Error> {
    use crate::schema::payment_pages::dsl::*;
    payment_pages
        .filter(user_id.eq(req_user_id))
        .first::<models::PaymentPage>(conn)
        .optional()
}

#[derive(PartialEq, Debug)]
pub struct NotifyTarget {
    pub email: Option<String>,
    pub email_is_enabled: bool,
    pub pop_up_is_enabled: bool,
}

pub fn load_notify_target(conn: &mut PgConnection, req_user_id: &str) -> Result<NotifyTarget, Error> {
    let user_email = {
        use crate::schema::users::dsl::*;
        users
            .filter(user_id.eq(req_user_id))
            .select(email)
            .first::<Option<String>>(conn)
    }?;
    let prefs = {
        use crate::schema::settings::dsl::*;
        settings
            .filter(user_id.eq(req_user_id))
            .first::<models::Settings>(conn)
            .optional()
    }?;
    Ok(NotifyTarget {
        email: user_email,
        email_is_enabled: prefs.as_ref().map(|p| p.email_is_enabled).unwrap_or(true),
        pop_up_is_enabled: prefs.as_ref().map(|p| p.pop_up_is_enabled).unwrap_or(true),
    })
}

// users due for the auto-withdraw sweep: opted in, past the cooldown and
// holding something worth settling
pub fn sweep_candidates(conn: &mut PgConnection, cutoff: NaiveDateTime) -> Result<Vec<models::User>, Error> {
    use crate::schema::users::dsl::*;
    users
        .filter(auto_withdraw_is_enabled.eq(true))
        .filter(last_withdraw.lt(cutoff))
        .filter(balance.gt(BigDecimal::from(0)))
        .order(user_id.asc())
        .load::<models::User>(conn)
}

pub fn list_payments(conn: &mut PgConnection, req_user_id: &str) -> Result<Vec<models::Payment>, Error> {
    use crate::schema::payments::dsl::*;
    payments
        .filter(to_user.eq(req_user_id).or(from_user.eq(req_user_id)))
        .order(created_at.desc())
        .load::<models::Payment>(conn)
}

pub fn list_withdrawals(conn: &mut PgConnection, req_user_id: &str) -> Result<Vec<models::Withdrawal>, Error> {
    use crate::schema::withdrawals::dsl::*;
    withdrawals
        .filter(user_id.eq(req_user_id))
        .order(created_at.desc())
        .load::<models::Withdrawal>(conn)
}

pub fn cash_register_amount(conn: &mut PgConnection) -> Result<BigDecimal, Error> {
    use crate::schema::cash_register::dsl::*;
    cash_register
        .filter(id.eq(1i16))
        .first::<models::CashRegister>(conn)
        .map(|register| register.amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::database::mutations;
    use bigdecimal::BigDecimal;
    use diesel::result::Error;

    #[test]
    #[ignore = "needs a local postgres with DATABASE_URL set"]
    fn test_load_balance() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            assert_eq!(load_balance(conn, "test_load_balance")?, UserBalance::NotFound);

            mutations::ensure_payment_page(conn, "test_load_balance")?;
            mutations::record_donation(
                conn,
                None,
                "Anonymous",
                "test_load_balance",
                "hello",
                &BigDecimal::from(100),
                "USD",
                &BigDecimal::from(100),
            )?;

            let balance = load_balance(conn, "test_load_balance")?;
            assert_eq!(
                balance,
                UserBalance::Ok(UserBalanceValues {
                    currency: "USD".to_string(),
                    balance: BigDecimal::from(100),
                })
            );
            Ok(())
        });
    }

    #[test]
    #[ignore = "needs a local postgres with DATABASE_URL set"]
    fn test_sweep_candidates_eligibility() {
        dotenvy::dotenv().ok();
        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            for uid in ["test_sweep_on", "test_sweep_off", "test_sweep_recent"] {
                mutations::ensure_payment_page(conn, uid)?;
                mutations::record_donation(
                    conn,
                    None,
                    "Anonymous",
                    uid,
                    "hi",
                    &BigDecimal::from(50),
                    "USD",
                    &BigDecimal::from(50),
                )?;
            }
            mutations::set_auto_withdraw(conn, "test_sweep_on", true)?;
            mutations::set_auto_withdraw(conn, "test_sweep_recent", true)?;

            // one opted-in user is past the cooldown, the other withdrew
            // recently and must wait it out
            let now = chrono::Utc::now().naive_utc();
            {
                use crate::schema::users::dsl::*;
                diesel::update(users.filter(user_id.eq("test_sweep_on")))
                    .set(last_withdraw.eq(now - chrono::Duration::days(31)))
                    .execute(conn)?;
                diesel::update(users.filter(user_id.eq("test_sweep_recent")))
                    .set(last_withdraw.eq(now - chrono::Duration::days(2)))
                    .execute(conn)?;
            }

            let cutoff = now - chrono::Duration::days(30);
            let due = sweep_candidates(conn, cutoff)?;
            assert!(due.iter().any(|u| u.user_id == "test_sweep_on"));
            assert!(!due.iter().any(|u| u.user_id == "test_sweep_off"));
            assert!(!due.iter().any(|u| u.user_id == "test_sweep_recent"));
            Ok(())
        });
    }
}
