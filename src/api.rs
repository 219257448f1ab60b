// 11.0: command api. an http layer deserializes one `LedgerCommand` per request,
// hands it to `Engine::execute` and serializes the `ApiResponse` back. errors carry
// a stable code plus the kind, so status mapping needs no variant matching.

use crate::engine::Engine;
use crate::error::{ErrorKind, LedgerError, LedgerResult};
use crate::requests::{
    BankTransferRequest, ClosePositionRequest, CreateP2POrderRequest, OpenPositionRequest, SpotOrderRequest,
    TransferPaymentRequest, WalletTransferRequest,
};
use crate::types::{P2POrderId, Role, UserId, WalletId, WalletType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerCommand {
    RegisterUser {
        name: String,
        role: Role,
        #[serde(default)]
        merchant_price: Option<Decimal>,
    },
    OpenWallet {
        user_id: UserId,
        wallet_type: WalletType,
    },
    SetMerchantPrice {
        merchant_id: UserId,
        price: Decimal,
    },
    Deposit {
        wallet_id: WalletId,
        amount: Decimal,
    },
    Withdraw {
        wallet_id: WalletId,
        amount: Decimal,
    },
    OpenBankAccount {
        user_id: UserId,
        account_number: String,
        #[serde(default)]
        initial_balance: Decimal,
    },
    CloseBankAccount {
        user_id: UserId,
        account_number: String,
    },
    Buy(SpotOrderRequest),
    Sell(SpotOrderRequest),
    OpenPosition(OpenPositionRequest),
    ClosePosition(ClosePositionRequest),
    #[serde(rename = "create_p2p_order")]
    CreateP2POrder(CreateP2POrderRequest),
    #[serde(rename = "cancel_p2p_order")]
    CancelP2POrder {
        order_id: P2POrderId,
        user_id: UserId,
    },
    TransferPayment(TransferPaymentRequest),
    ConfirmAndRelease {
        order_id: P2POrderId,
        confirmer_id: UserId,
    },
    BankTransfer(BankTransferRequest),
    WalletTransfer(WalletTransferRequest),

    // read only
    Wallets {
        user_id: UserId,
    },
    OpenPositions {
        user_id: UserId,
    },
    #[serde(rename = "p2p_orders")]
    P2POrders {
        user_id: UserId,
    },
}

impl LedgerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::RegisterUser { .. } => "register_user",
            LedgerCommand::OpenWallet { .. } => "open_wallet",
            LedgerCommand::SetMerchantPrice { .. } => "set_merchant_price",
            LedgerCommand::Deposit { .. } => "deposit",
            LedgerCommand::Withdraw { .. } => "withdraw",
            LedgerCommand::OpenBankAccount { .. } => "open_bank_account",
            LedgerCommand::CloseBankAccount { .. } => "close_bank_account",
            LedgerCommand::Buy(_) => "buy",
            LedgerCommand::Sell(_) => "sell",
            LedgerCommand::OpenPosition(_) => "open_position",
            LedgerCommand::ClosePosition(_) => "close_position",
            LedgerCommand::CreateP2POrder(_) => "create_p2p_order",
            LedgerCommand::CancelP2POrder { .. } => "cancel_p2p_order",
            LedgerCommand::TransferPayment(_) => "transfer_payment",
            LedgerCommand::ConfirmAndRelease { .. } => "confirm_and_release",
            LedgerCommand::BankTransfer(_) => "bank_transfer",
            LedgerCommand::WalletTransfer(_) => "wallet_transfer",
            LedgerCommand::Wallets { .. } => "wallets",
            LedgerCommand::OpenPositions { .. } => "open_positions",
            LedgerCommand::P2POrders { .. } => "p2p_orders",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&LedgerError> for ApiError {
    fn from(error: &LedgerError) -> Self {
        Self {
            code: error.code().to_string(),
            kind: error.kind(),
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ApiResponse {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
        }
    }

    fn from_result<T: Serialize>(result: LedgerResult<T>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(data) => Self::success(data),
                Err(e) => Self::failure(ApiError {
                    code: "unserializable_result".to_string(),
                    kind: ErrorKind::InvalidState,
                    message: e.to_string(),
                    retryable: false,
                }),
            },
            Err(error) => Self::failure(ApiError::from(&error)),
        }
    }
}

impl Engine {
    pub fn execute(&self, command: LedgerCommand) -> ApiResponse {
        debug!(op = command.name(), "executing command");
        match command {
            LedgerCommand::RegisterUser {
                name,
                role,
                merchant_price,
            } => ApiResponse::from_result(self.register_user(&name, role, merchant_price)),
            LedgerCommand::OpenWallet { user_id, wallet_type } => {
                ApiResponse::from_result(self.open_wallet(user_id, wallet_type))
            }
            LedgerCommand::SetMerchantPrice { merchant_id, price } => {
                ApiResponse::from_result(self.set_merchant_price(merchant_id, price))
            }
            LedgerCommand::Deposit { wallet_id, amount } => ApiResponse::from_result(self.deposit(wallet_id, amount)),
            LedgerCommand::Withdraw { wallet_id, amount } => ApiResponse::from_result(self.withdraw(wallet_id, amount)),
            LedgerCommand::OpenBankAccount {
                user_id,
                account_number,
                initial_balance,
            } => ApiResponse::from_result(self.open_bank_account(user_id, &account_number, initial_balance)),
            LedgerCommand::CloseBankAccount { user_id, account_number } => {
                ApiResponse::from_result(self.close_bank_account(user_id, &account_number))
            }
            LedgerCommand::Buy(request) => ApiResponse::from_result(self.buy(&request)),
            LedgerCommand::Sell(request) => ApiResponse::from_result(self.sell(&request)),
            LedgerCommand::OpenPosition(request) => ApiResponse::from_result(self.open_position(&request)),
            LedgerCommand::ClosePosition(request) => ApiResponse::from_result(self.close_position(&request)),
            LedgerCommand::CreateP2POrder(request) => ApiResponse::from_result(self.create_p2p_order(&request)),
            LedgerCommand::CancelP2POrder { order_id, user_id } => {
                ApiResponse::from_result(self.cancel_p2p_order(order_id, user_id))
            }
            LedgerCommand::TransferPayment(request) => ApiResponse::from_result(self.transfer_payment(&request)),
            LedgerCommand::ConfirmAndRelease { order_id, confirmer_id } => {
                ApiResponse::from_result(self.confirm_and_release(order_id, confirmer_id))
            }
            LedgerCommand::BankTransfer(request) => ApiResponse::from_result(self.bank_transfer(&request)),
            LedgerCommand::WalletTransfer(request) => ApiResponse::from_result(self.wallet_transfer(&request)),
            LedgerCommand::Wallets { user_id } => ApiResponse::from_result(self.wallets(user_id)),
            LedgerCommand::OpenPositions { user_id } => ApiResponse::from_result(self.open_positions(user_id)),
            LedgerCommand::P2POrders { user_id } => ApiResponse::from_result(self.p2p_orders_for(user_id)),
        }
    }

    /// JSON in, JSON out. A body that does not parse is answered with a
    /// validation error, never a panic.
    pub fn execute_json(&self, body: &str) -> String {
        let response = match serde_json::from_str::<LedgerCommand>(body) {
            Ok(command) => self.execute(command),
            Err(e) => ApiResponse::failure(ApiError {
                code: "invalid_request".to_string(),
                kind: ErrorKind::Validation,
                message: e.to_string(),
                retryable: false,
            }),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"ok":false,"error":{{"code":"unserializable_result","kind":"invalid_state","message":"{e}","retryable":false}}}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use serde_json::json;

    fn call(engine: &Engine, body: serde_json::Value) -> ApiResponse {
        let raw = engine.execute_json(&body.to_string());
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_command_round_trip_through_json() {
        let engine = Engine::new(LedgerConfig::default()).unwrap();

        let registered = call(&engine, json!({"op": "register_user", "name": "alice", "role": "normal"}));
        assert!(registered.ok);
        let data = registered.data.unwrap();
        assert_eq!(data["user"]["name"], "alice");
        let spot_id = data["wallets"][1]["id"].as_u64().unwrap();

        let deposit = call(&engine, json!({"op": "deposit", "wallet_id": spot_id, "amount": "500"}));
        assert!(deposit.ok);

        let bought = call(
            &engine,
            json!({"op": "buy", "user_id": 1, "wallet_id": spot_id, "symbol": "btc/usdt", "units": "2", "price": "100"}),
        );
        assert!(bought.ok, "{bought:?}");
        assert_eq!(bought.data.unwrap()["holding"]["symbol"], "BTC");
    }

    #[test]
    fn test_errors_carry_code_and_kind() {
        let engine = Engine::new(LedgerConfig::default()).unwrap();
        call(&engine, json!({"op": "register_user", "name": "alice", "role": "normal"}));

        let response = call(
            &engine,
            json!({"op": "open_position", "user_id": 1, "wallet_id": 1, "symbol": "BTC", "side": "long",
                   "margin": "10", "entry_price": "100", "leverage": "6"}),
        );
        assert!(!response.ok);
        let error = response.error.unwrap();
        assert_eq!(error.code, "invalid_leverage");
        assert_eq!(error.kind, ErrorKind::Validation);
        assert!(!error.retryable);
    }

    #[test]
    fn test_garbage_is_a_validation_error() {
        let engine = Engine::new(LedgerConfig::default()).unwrap();
        let raw = engine.execute_json(r#"{"op": "teleport"}"#);
        let response: ApiResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(response.error.unwrap().code, "invalid_request");
    }

    #[test]
    fn test_p2p_op_names() {
        let command: LedgerCommand = serde_json::from_value(json!({
            "op": "create_p2p_order", "user_id": 1, "merchant_id": 2, "side": "buy", "crypto_units": "3"
        }))
        .unwrap();
        assert_eq!(command.name(), "create_p2p_order");
        let back = serde_json::to_value(&command).unwrap();
        assert_eq!(back["op"], "create_p2p_order");
    }
}
