use std::ops::DerefMut;

use actix_web::web;
use bigdecimal::BigDecimal;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::database::queries;
use crate::notify::Notifier;
use crate::rates::RateConverter;
use crate::settlement::{self, SettleOutcome};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const AUTO_WITHDRAW_COOLDOWN_DAYS: i64 = 30;

// 90% of the held balance goes into each automatic settlement
fn sweep_amount(balance: &BigDecimal) -> BigDecimal {
    balance * BigDecimal::new(9.into(), 1)
}

/// Hourly loop settling balances for users opted into automatic withdrawal
/// whose last withdrawal is past the cooldown. Runs for the lifetime of the
/// server.
pub async fn auto_withdraw_sweep(
    db: Pool<ConnectionManager<PgConnection>>,
    rates: RateConverter,
    notifier: Notifier,
) {
    let mut interval = interval(SWEEP_INTERVAL);

    // skip the immediate tick on startup
    interval.tick().await;

    loop {
        interval.tick().await;
        run_sweep(&db, &rates, &notifier).await;
    }
}

pub async fn run_sweep(
    db: &Pool<ConnectionManager<PgConnection>>,
    rates: &RateConverter,
    notifier: &Notifier,
) {
    let mut conn = match db.get() {
        Ok(conn) => conn,
        Err(e) => {
            error!("sweep: failed to get db connection: {e}");
            return;
        }
    };

    let cutoff = chrono::Utc::now().naive_utc() - chrono::Duration::days(AUTO_WITHDRAW_COOLDOWN_DAYS);
    let due = web::block(move || queries::sweep_candidates(conn.deref_mut(), cutoff)).await;
    let due = match due {
        Ok(Ok(due)) => due,
        Ok(Err(e)) => {
            error!("sweep: candidate scan failed: {e}");
            return;
        }
        Err(e) => {
            error!("sweep: candidate scan failed: {e}");
            return;
        }
    };

    info!("sweep: {} user(s) due for auto-withdraw", due.len());

    // sequential, and one user's failure never aborts the rest
    for user in due {
        let money = sweep_amount(&user.balance);
        let res = settlement::settle_withdrawal(
            db,
            rates,
            notifier,
            user.user_id.clone(),
            money,
            "auto".to_string(),
            None,
        )
        .await;
        match res {
            Ok(SettleOutcome::Settled { withdrawal_id, .. }) => {
                info!("sweep: settled {withdrawal_id} for {}", user.user_id);
            }
            Ok(SettleOutcome::InsufficientBalance) => {
                info!("sweep: skipped {}: insufficient balance", user.user_id);
            }
            Ok(SettleOutcome::BelowMinimumPayout) => {
                info!("sweep: skipped {}: below minimum payout", user.user_id);
            }
            Err(e) => {
                error!("sweep: settlement failed for {}: {e}", user.user_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sweep_amount() {
        assert_eq!(sweep_amount(&BigDecimal::from(100)), BigDecimal::from(90));
        assert_eq!(
            sweep_amount(&BigDecimal::from_str("33.33").unwrap()),
            BigDecimal::from_str("29.997").unwrap()
        );
    }
}
