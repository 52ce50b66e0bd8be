// Request validation module
// Validates token addresses, amounts, standing-order pairs and market-maker
// options of an incoming quote request before any sampling is done
//
// Numan Thabit 2025 Nov

use crate::config::QuoteOptions;
use crate::errors::AggrError;
use crate::market::StandingOrder;
use num::{BigUint, Zero};
use tracing::warn;

const ADDRESS_BYTES: usize = 20;

/// Accumulated validation errors of one request.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    firm_without_taker: bool,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && !self.firm_without_taker
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// `InvalidFirmQuoteRequest` takes precedence over other problems.
    pub fn into_result(self) -> Result<(), AggrError> {
        if self.firm_without_taker {
            return Err(AggrError::InvalidFirmQuoteRequest);
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            warn!(errors = ?self.errors, "rejecting invalid quote request");
            Err(AggrError::InvalidRequest(self.errors.join("; ")))
        }
    }
}

/// Whether `token` is a 0x-prefixed 20-byte hex address.
pub fn is_token_address(token: &str) -> bool {
    token
        .strip_prefix("0x")
        .and_then(|hex_part| hex::decode(hex_part).ok())
        .is_some_and(|bytes| bytes.len() == ADDRESS_BYTES)
}

/// Validate one quote request: `orders` define the pair, `amount` is the target.
pub fn validate_quote_request(
    orders: &[StandingOrder],
    amount: &BigUint,
    opts: &QuoteOptions,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    validate_orders(&mut result, orders);

    if amount.is_zero() {
        result.add_error("amount must be positive".to_string());
    }
    if opts.num_samples == 0 {
        result.add_error("num_samples must be positive".to_string());
    }

    if let Some(rfq) = opts.rfq_enabled() {
        if !rfq.is_indicative && rfq.taker_address.is_none() {
            result.firm_without_taker = true;
        }
        if let Some(taker) = &rfq.taker_address {
            if !is_token_address(taker) {
                result.add_error(format!("invalid taker address {taker}"));
            }
        }
    }
    result
}

fn validate_orders(result: &mut ValidationResult, orders: &[StandingOrder]) {
    let Some(first) = orders.first() else {
        return;
    };
    for token in [&first.maker_token, &first.taker_token] {
        if !is_token_address(token) {
            result.add_error(format!("invalid token address {token}"));
        }
    }
    if first.maker_token.eq_ignore_ascii_case(&first.taker_token) {
        result.add_error("maker and taker tokens must differ".to_string());
    }
    for order in orders {
        if !order.maker_token.eq_ignore_ascii_case(&first.maker_token)
            || !order.taker_token.eq_ignore_ascii_case(&first.taker_token)
        {
            result.add_error(format!("order {} trades a different pair", order.id));
        }
        if order.maker_amount.is_zero() || order.taker_amount.is_zero() {
            result.add_error(format!("order {} has a zero amount", order.id));
        }
    }
}
