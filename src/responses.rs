use actix_web::HttpResponse;
use bigdecimal::Signed;
use serde::Serialize;

use crate::database::models;
use crate::database::queries::UserBalance;
use crate::donation::DonationOutcome;
use crate::settlement::SettleOutcome;

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenericOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<UserBalanceData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PaymentPageData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payments: Option<Vec<PaymentData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donation: Option<DonationData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawal: Option<WithdrawalData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<WithdrawalRecordData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_register: Option<CashRegisterData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashRegisterData {
    pub amount: String,
    pub currency: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRecordData {
    pub id: String,
    pub user_id: String,
    pub money: String,
    pub method: String,
    pub created_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationData {
    pub payment_id: String,
    pub credited_value: String,
    pub currency: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBalanceData {
    pub user_id: String,
    pub currency: String,
    pub value: String,
    pub is_overdraft: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPageData {
    pub user_id: String,
    pub preferable_currency: String,
    pub minimum_donate_sum: String,
    pub message_max_length: i32,
    pub bio: String,
    pub button_text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user: Option<String>,
    pub from_name: String,
    pub to_user: String,
    pub message: String,
    pub money: String,
    pub currency: String,
    pub credited_value: String,
    pub created_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalData {
    pub id: String,
    pub user_id: String,
    pub net_value: String,
    pub currency: String,
    pub net_value_usd: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

fn json_http_response(data: GenericOutput) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/json")
        .body(serde_json::to_string(&data).unwrap())
}

fn error_http_response(code: &'static str, parameter: Option<String>) -> HttpResponse {
    json_http_response(GenericOutput {
        error: Some(ErrorData { code, parameter }),
        ..Default::default()
    })
}

pub fn cash_register_http_response(amount: bigdecimal::BigDecimal) -> HttpResponse {
    json_http_response(GenericOutput {
        cash_register: Some(CashRegisterData {
            amount: amount.to_string(),
            currency: crate::settlement::SETTLEMENT_CURRENCY.to_string(),
        }),
        ..Default::default()
    })
}

pub fn ok_http_response() -> HttpResponse {
    json_http_response(GenericOutput::default())
}

pub fn bad_parameter_http_response(field: &str) -> HttpResponse {
    error_http_response("bad_parameter", Some(field.to_string()))
}

pub fn user_not_found_http_response() -> HttpResponse {
    error_http_response("user_not_found", None)
}

pub fn user_balance_data_http_response(balance: UserBalance, user_id: &str) -> HttpResponse {
    match balance {
        UserBalance::Ok(balance) => json_http_response(GenericOutput {
            balance: Some(UserBalanceData {
                user_id: user_id.to_string(),
                currency: balance.currency,
                value: balance.balance.to_string(),
                is_overdraft: balance.balance.is_negative(),
            }),
            ..Default::default()
        }),
        UserBalance::NotFound => user_not_found_http_response(),
    }
}

pub fn payment_page_http_response(page: models::PaymentPage) -> HttpResponse {
    json_http_response(GenericOutput {
        page: Some(PaymentPageData {
            user_id: page.user_id,
            preferable_currency: page.preferable_currency,
            minimum_donate_sum: page.minimum_donate_sum.to_string(),
            message_max_length: page.message_max_length,
            bio: page.bio,
            button_text: page.button_text,
        }),
        ..Default::default()
    })
}

fn payment_data(payment: models::Payment) -> PaymentData {
    PaymentData {
        id: payment.id.to_string(),
        from_user: payment.from_user,
        from_name: payment.from_name,
        to_user: payment.to_user,
        message: payment.message,
        money: payment.money.to_string(),
        currency: payment.currency,
        credited_value: payment.credited_value.to_string(),
        created_at: payment.created_at.to_string(),
    }
}

pub fn payments_http_response(payments: Vec<models::Payment>) -> HttpResponse {
    json_http_response(GenericOutput {
        payments: Some(payments.into_iter().map(payment_data).collect()),
        ..Default::default()
    })
}

pub fn withdrawals_http_response(withdrawals: Vec<models::Withdrawal>) -> HttpResponse {
    json_http_response(GenericOutput {
        withdrawals: Some(
            withdrawals
                .into_iter()
                .map(|withdrawal| WithdrawalRecordData {
                    id: withdrawal.id.to_string(),
                    user_id: withdrawal.user_id,
                    money: withdrawal.money.to_string(),
                    method: withdrawal.method,
                    created_at: withdrawal.created_at.to_string(),
                })
                .collect(),
        ),
        ..Default::default()
    })
}

pub fn donation_http_response(outcome: DonationOutcome) -> HttpResponse {
    match outcome {
        DonationOutcome::Accepted {
            payment_id,
            credited_value,
            currency,
        } => json_http_response(GenericOutput {
            donation: Some(DonationData {
                payment_id: payment_id.to_string(),
                credited_value: credited_value.to_string(),
                currency,
            }),
            ..Default::default()
        }),
        DonationOutcome::MessageTooLong => error_http_response("message_too_long", None),
        DonationOutcome::BelowMinimumDonation => error_http_response("below_minimum_donation", None),
    }
}

pub fn withdrawal_http_response(user_id: &str, outcome: SettleOutcome) -> HttpResponse {
    match outcome {
        SettleOutcome::Settled {
            withdrawal_id,
            net_usd,
            net_native,
            currency,
        } => json_http_response(GenericOutput {
            withdrawal: Some(WithdrawalData {
                id: withdrawal_id.to_string(),
                user_id: user_id.to_string(),
                net_value: net_native.to_string(),
                currency,
                net_value_usd: net_usd.to_string(),
            }),
            ..Default::default()
        }),
        SettleOutcome::InsufficientBalance => error_http_response("insufficient_balance", None),
        SettleOutcome::BelowMinimumPayout => error_http_response("below_minimum_payout", None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct_for_the_two_withdrawal_rejections() {
        let insufficient = serde_json::to_value(GenericOutput {
            error: Some(ErrorData {
                code: "insufficient_balance",
                parameter: None,
            }),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(insufficient["error"]["code"], "insufficient_balance");
        assert!(insufficient.get("balance").is_none());
    }
}
