use std::ops::DerefMut;
use std::str::FromStr;

use actix_request_identifier::RequestId;
use actix_web::{get, post, web, HttpResponse};
use bigdecimal::{BigDecimal, Signed, Zero};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use serde::Deserialize;
use tracing::{error, instrument};

use crate::database::{mutations, queries};
use crate::donation::{self, DonationRequest};
use crate::notify::Notifier;
use crate::rates::{self, RateConverter};
use crate::{responses, settlement};

type DbPool = Pool<ConnectionManager<PgConnection>>;

#[get("/balance/{user_id}")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn balance_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    user_id: web::Path<String>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = user_id.clone();
    let mut conn = db.get()?;

    let query_user_id = user_id.clone();
    web::block(move || queries::load_balance(conn.deref_mut(), query_user_id.as_str()).map_err(anyhow::Error::from))
        .await
        .unwrap_or_else(|e| {
            error!("{e}");
            Err(e.into())
        })
        .map(|balance| responses::user_balance_data_http_response(balance, user_id.as_str()))
        .map_err(Into::into)
}

#[get("/page/{user_id}")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn page_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    user_id: web::Path<String>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    // the page is public and created with defaults on first sight
    web::block(move || mutations::ensure_payment_page(conn.deref_mut(), user_id.as_str()).map_err(anyhow::Error::from))
        .await
        .unwrap_or_else(|e| {
            error!("{e}");
            Err(e.into())
        })
        .map(responses::payment_page_http_response)
        .map_err(Into::into)
}

#[get("/payments/{user_id}")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn payments_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    user_id: web::Path<String>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    web::block(move || queries::list_payments(conn.deref_mut(), user_id.as_str()).map_err(anyhow::Error::from))
        .await
        .unwrap_or_else(|e| {
            error!("{e}");
            Err(e.into())
        })
        .map(responses::payments_http_response)
        .map_err(Into::into)
}

#[get("/withdrawals/{user_id}")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn withdrawals_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    user_id: web::Path<String>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    web::block(move || queries::list_withdrawals(conn.deref_mut(), user_id.as_str()).map_err(anyhow::Error::from))
        .await
        .unwrap_or_else(|e| {
            error!("{e}");
            Err(e.into())
        })
        .map(responses::withdrawals_http_response)
        .map_err(Into::into)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonateInput {
    pub to_user: String,
    #[serde(default)]
    pub from_user: String,
    #[serde(default)]
    pub from_name: String,
    pub money: String,
    pub currency: String,
    #[serde(default)]
    pub message: String,
}

#[post("/donate")]
#[instrument(skip(db, curr, notifier, donate_request), fields(request_id = request_id.as_str()))]
pub async fn donate_handler(
    db: web::Data<DbPool>,
    curr: web::Data<RateConverter>,
    notifier: web::Data<Notifier>,
    request_id: RequestId,
    donate_request: web::Json<DonateInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    if donate_request.to_user.is_empty() {
        return Ok(responses::bad_parameter_http_response("to_user"));
    }
    if !rates::is_currency_code(&donate_request.currency) {
        return Ok(responses::bad_parameter_http_response("currency"));
    }
    let req_money = match BigDecimal::from_str(donate_request.money.as_str()) {
        Ok(req_money) if !req_money.is_negative() && !req_money.is_zero() => req_money,
        _ => return Ok(responses::bad_parameter_http_response("money")),
    };

    let donate_request = donate_request.into_inner();
    let req = DonationRequest {
        to_user: donate_request.to_user,
        from_user: if donate_request.from_user.is_empty() {
            None
        } else {
            Some(donate_request.from_user)
        },
        from_name: if donate_request.from_name.is_empty() {
            "Anonymous".to_string()
        } else {
            donate_request.from_name
        },
        money: req_money,
        currency: donate_request.currency,
        message: donate_request.message,
    };

    donation::accept_donation(&db, &curr, &notifier, req)
        .await
        .map(responses::donation_http_response)
        .map_err(|e| {
            error!("{e}");
            e.into()
        })
}

// platform-wide commission total, for the operators
#[get("/cash-register")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn cash_register_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    web::block(move || queries::cash_register_amount(conn.deref_mut()).map_err(anyhow::Error::from))
        .await
        .unwrap_or_else(|e| {
            error!("{e}");
            Err(e.into())
        })
        .map(responses::cash_register_http_response)
        .map_err(Into::into)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoWithdrawInput {
    pub user_id: String,
    pub enabled: bool,
}

#[post("/auto-withdraw")]
#[instrument(skip(db, auto_withdraw_request), fields(request_id = request_id.as_str()))]
pub async fn auto_withdraw_handler(
    db: web::Data<DbPool>,
    request_id: RequestId,
    auto_withdraw_request: web::Json<AutoWithdrawInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    if auto_withdraw_request.user_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("user_id"));
    }

    let mut conn = db.get()?;
    web::block(move || {
        mutations::set_auto_withdraw(
            conn.deref_mut(),
            auto_withdraw_request.user_id.as_str(),
            auto_withdraw_request.enabled,
        )
        .map_err(anyhow::Error::from)
    })
    .await
    .unwrap_or_else(|e| {
        error!("{e}");
        Err(e.into())
    })
    .map(|updated| {
        if updated {
            responses::ok_http_response()
        } else {
            responses::user_not_found_http_response()
        }
    })
    .map_err(Into::into)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawInput {
    pub user_id: String,
    pub money: String,
    pub method: String,
    #[serde(default)]
    pub additional_info: String,
}

// additional info is optional, but when present it must be a json object
// (payout account details keyed by field name), not a bare scalar or array
fn parse_additional_info(raw: &str) -> Result<Option<serde_json::Value>, ()> {
    if raw.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) if json.is_object() => Ok(Some(json)),
        _ => Err(()),
    }
}

#[post("/withdraw")]
#[instrument(skip(db, curr, notifier, withdraw_request), fields(request_id = request_id.as_str()))]
pub async fn withdraw_handler(
    db: web::Data<DbPool>,
    curr: web::Data<RateConverter>,
    notifier: web::Data<Notifier>,
    request_id: RequestId,
    withdraw_request: web::Json<WithdrawInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    if withdraw_request.user_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("user_id"));
    }
    if withdraw_request.method.is_empty() {
        return Ok(responses::bad_parameter_http_response("method"));
    }
    let req_money = match BigDecimal::from_str(withdraw_request.money.as_str()) {
        Ok(req_money) if !req_money.is_negative() && !req_money.is_zero() => req_money,
        _ => return Ok(responses::bad_parameter_http_response("money")),
    };

    let req_additional_info = match parse_additional_info(withdraw_request.additional_info.as_str()) {
        Ok(info) => info,
        Err(_) => return Ok(responses::bad_parameter_http_response("additional_info")),
    };

    let user_id = withdraw_request.user_id.clone();
    settlement::settle_withdrawal(
        &db,
        &curr,
        &notifier,
        user_id.clone(),
        req_money,
        withdraw_request.method.clone(),
        req_additional_info,
    )
    .await
    .map(|outcome| responses::withdrawal_http_response(user_id.as_str(), outcome))
    .map_err(|e| {
        error!("{e}");
        e.into()
    })
}
