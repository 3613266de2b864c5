//! NEM (NIS) node HTTP client.

use super::{LedgerClient, LedgerError};
use crate::domain::{
    BalanceSnapshot, DepositAccount, LedgerAddress, TransferOutcome, MICRO_PER_UNIT,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Transaction type of a plain transfer.
pub const TRANSFER_TYPE: i64 = 257;
/// Mainnet network byte (0x68) with transaction version 1.
pub const TRANSFER_VERSION: i64 = 0x6800_0001;
/// Seconds a transaction stays valid after its timestamp.
pub const DEADLINE_SECS: i64 = 60 * 60;
/// `code` value of a successful announce.
const ANNOUNCE_SUCCESS: i64 = 1;

/// Ledger client speaking the NIS JSON API.
#[derive(Debug, Clone)]
pub struct NemLedgerClient {
    client: Client,
    base_url: String,
    history_url: String,
}

impl NemLedgerClient {
    /// Create a client whose requests are bounded by `timeout`.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Network(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            history_url: base_url.clone(),
            base_url,
        })
    }

    /// Send historical balance queries to a node with history enabled.
    pub fn with_history_url(mut self, history_url: String) -> Self {
        self.history_url = history_url;
        self
    }

    async fn get_json(
        &self,
        base_url: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, LedgerError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(LedgerError::Protocol(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                path,
                body
            )));
        }
        parse_body(&body)
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, LedgerError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        // The node reports rejections as JSON bodies on error statuses, which
        // are relayed to the user rather than treated as protocol failures.
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            warn!("announce returned HTTP {}", status.as_u16());
        }
        parse_body(&body)
    }
}

#[async_trait]
impl LedgerClient for NemLedgerClient {
    async fn chain_height(&self) -> Result<u64, LedgerError> {
        let response = self.get_json(&self.base_url, "/chain/height", &[]).await?;
        parse_height(&response)
    }

    async fn generate_account(&self) -> Result<DepositAccount, LedgerError> {
        let response = self
            .get_json(&self.base_url, "/account/generate", &[])
            .await?;
        parse_account(response)
    }

    async fn historical_balance(
        &self,
        address: &LedgerAddress,
        blocks_back: u64,
    ) -> Result<BalanceSnapshot, LedgerError> {
        let height = self.chain_height().await?.saturating_sub(blocks_back);
        debug!(
            "Fetching balance for address={}, height={}, blocks_back={}",
            address, height, blocks_back
        );

        let response = self
            .get_json(
                &self.history_url,
                "/account/historical/get",
                &[
                    ("address", address.to_string()),
                    ("startHeight", height.to_string()),
                    ("endHeight", height.to_string()),
                    ("increment", "1".to_string()),
                ],
            )
            .await?;
        parse_historical(&response)
    }

    async fn node_time(&self) -> Result<i64, LedgerError> {
        let response = self
            .get_json(&self.base_url, "/node/extended-info", &[])
            .await?;
        parse_node_time(&response)
    }

    async fn submit_transfer(
        &self,
        source: &DepositAccount,
        destination: &LedgerAddress,
        amount: i64,
        fee: i64,
    ) -> Result<TransferOutcome, LedgerError> {
        let timestamp = self.node_time().await?;
        let payload = transfer_request(source, destination, amount, fee, timestamp);
        let response = self
            .post_json("/transaction/prepare-announce", &payload)
            .await?;
        parse_announce(response)
    }
}

fn transport_error(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::Network(format!("request timed out: {}", err))
    } else {
        LedgerError::Network(err.to_string())
    }
}

fn parse_body(body: &str) -> Result<Value, LedgerError> {
    serde_json::from_str(body).map_err(|e| LedgerError::Protocol(format!("invalid JSON: {}", e)))
}

fn parse_height(response: &Value) -> Result<u64, LedgerError> {
    response
        .get("height")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| LedgerError::Protocol("Missing height field".to_string()))
}

fn parse_account(response: Value) -> Result<DepositAccount, LedgerError> {
    serde_json::from_value(response)
        .map_err(|e| LedgerError::Protocol(format!("Invalid account: {}", e)))
}

fn parse_historical(response: &Value) -> Result<BalanceSnapshot, LedgerError> {
    let entry = response
        .get("data")
        .and_then(|v| v.as_array())
        .and_then(|data| data.first())
        .ok_or_else(|| LedgerError::Protocol("Missing historical data".to_string()))?;

    let balance_micro = entry
        .get("balance")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| LedgerError::Protocol("Missing balance field".to_string()))?;
    let height = entry
        .get("height")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| LedgerError::Protocol("Missing height field".to_string()))?;

    Ok(BalanceSnapshot {
        balance_micro,
        height,
    })
}

fn parse_node_time(response: &Value) -> Result<i64, LedgerError> {
    response
        .pointer("/nisInfo/currentTime")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| LedgerError::Protocol("Missing nisInfo.currentTime field".to_string()))
}

fn parse_announce(response: Value) -> Result<TransferOutcome, LedgerError> {
    if !response.is_object() {
        return Err(LedgerError::Protocol(
            "Expected object announce response".to_string(),
        ));
    }

    let succeeded = response.get("code").and_then(|v| v.as_i64()) == Some(ANNOUNCE_SUCCESS);
    let tx_hash = response
        .pointer("/transactionHash/data")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let ledger_message = response
        .get("message")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(TransferOutcome {
        succeeded,
        tx_hash,
        ledger_message,
        raw: response,
    })
}

fn transfer_request(
    source: &DepositAccount,
    destination: &LedgerAddress,
    amount: i64,
    fee: i64,
    timestamp: i64,
) -> Value {
    serde_json::json!({
        "transaction": {
            "timeStamp": timestamp,
            "amount": amount * MICRO_PER_UNIT,
            "fee": fee * MICRO_PER_UNIT,
            "recipient": destination.as_str(),
            "type": TRANSFER_TYPE,
            "deadline": timestamp + DEADLINE_SECS,
            "version": TRANSFER_VERSION,
            "signer": source.public_key,
        },
        "privateKey": source.private_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> DepositAccount {
        DepositAccount::new(
            LedgerAddress::new("TSOURCE".to_string()),
            "c5f5".to_string(),
            "0a1b".to_string(),
        )
    }

    #[test]
    fn test_transfer_request_wire_format() {
        let request = transfer_request(
            &account(),
            &LedgerAddress::new("TDEST".to_string()),
            5,
            2,
            1_000,
        );
        let tx = &request["transaction"];
        assert_eq!(tx["amount"], 5_000_000);
        assert_eq!(tx["fee"], 2_000_000);
        assert_eq!(tx["timeStamp"], 1_000);
        assert_eq!(tx["deadline"], 4_600);
        assert_eq!(tx["type"], 257);
        assert_eq!(tx["version"], 1_744_830_465i64);
        assert_eq!(tx["recipient"], "TDEST");
        assert_eq!(tx["signer"], "c5f5");
        assert_eq!(request["privateKey"], "0a1b");
    }

    #[test]
    fn test_parse_historical_valid() {
        let response = serde_json::json!({
            "data": [{"balance": 12_500_000, "height": 100, "vestedBalance": 0}]
        });
        let snapshot = parse_historical(&response).unwrap();
        assert_eq!(snapshot.balance_micro, 12_500_000);
        assert_eq!(snapshot.height, 100);
    }

    #[test]
    fn test_parse_historical_empty_is_protocol_error() {
        let err = parse_historical(&serde_json::json!({"data": []})).unwrap_err();
        assert!(matches!(err, LedgerError::Protocol(_)));
    }

    #[test]
    fn test_parse_announce_success() {
        let outcome = parse_announce(serde_json::json!({
            "type": 1,
            "code": 1,
            "message": "SUCCESS",
            "transactionHash": {"data": "abcd"}
        }))
        .unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.tx_hash.as_deref(), Some("abcd"));
        assert_eq!(outcome.ledger_message.as_deref(), Some("SUCCESS"));
    }

    #[test]
    fn test_parse_announce_failure_keeps_payload() {
        let payload = serde_json::json!({
            "timeStamp": 1,
            "error": "Internal Server Error",
            "message": "FAILURE_INSUFFICIENT_BALANCE",
            "status": 500
        });
        let outcome = parse_announce(payload.clone()).unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.raw, payload);
    }

    #[test]
    fn test_malformed_body_is_protocol_error() {
        let err = parse_body("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, LedgerError::Protocol(_)));
    }

    #[test]
    fn test_parse_node_time() {
        let response = serde_json::json!({"nisInfo": {"currentTime": 73_000_000}});
        assert_eq!(parse_node_time(&response).unwrap(), 73_000_000);
        assert!(parse_node_time(&serde_json::json!({})).is_err());
    }
}
