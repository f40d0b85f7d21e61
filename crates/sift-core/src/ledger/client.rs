//! HTTP client for the ledger REST API
//!
//! Blocking on purpose: a dedup run is a single-threaded batch job and every
//! call (page fetch, delete) waits for its answer before the next one.
//!
//! Every response wraps its payload in `{"objects": ...}`.

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::error::{Error, Result};
use crate::models::{
    AccountId, LedgerAccount, LedgerRecord, NewAccount, NewLedgerTransaction, RawScalar,
    TransactionId,
};

use super::{AccountDirectory, DeletionSink, TransactionSink, TransactionSource};

pub const USER_AGENT: &str = concat!("sift/", env!("CARGO_PKG_VERSION"));

/// Transaction status the ledger uses for "open"
const STATUS_OPEN: u16 = 100;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    objects: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountBody<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    currency: String,
    status: u16,
    import_type: &'a str,
    account_number: &'a str,
}

/// Ledger REST client
pub struct LedgerClient {
    http: Client,
    base_url: String,
    token: String,
    page_size: usize,
    reopen_before_delete: bool,
}

impl LedgerClient {
    pub fn new(config: &LedgerConfig, token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            page_size: config.page_size.max(1),
            reopen_before_delete: config.reopen_before_delete,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send with auth, mapping connect/timeout failures to `Unreachable`
    /// and non-success statuses to `Api`
    fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request
            .header("Authorization", &self.token)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    Error::Unreachable {
                        url: url.to_string(),
                        source: e,
                    }
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: extract_error_message(&body),
        })
    }

    fn objects<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
        let text = response.text()?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let envelope: Envelope<T> = serde_json::from_str(&text)?;
        Ok(envelope.objects)
    }

    /// Fetch one page of an account's transactions
    pub fn fetch_page(&self, account: &AccountId, offset: usize) -> Result<Vec<LedgerRecord>> {
        let url = self.url("CheckAccountTransaction");
        debug!("GET {} account={} offset={}", url, account, offset);

        let request = self.http.get(&url).query(&[
            ("checkAccount[id]", account.to_string()),
            ("checkAccount[objectName]", "CheckAccount".to_string()),
            ("offset", offset.to_string()),
            ("limit", self.page_size.to_string()),
        ]);
        let response = self.send(request, &url)?;
        Ok(Self::objects::<Vec<LedgerRecord>>(response)?.unwrap_or_default())
    }

    /// Set a transaction's status back to open
    pub fn reopen_transaction(&self, id: &TransactionId) -> Result<()> {
        let url = self.url(&format!("CheckAccountTransaction/{}", id));
        debug!("PUT {} status={}", url, STATUS_OPEN);
        self.send(self.http.put(&url).json(&json!({ "status": STATUS_OPEN })), &url)?;
        Ok(())
    }
}

impl TransactionSource for LedgerClient {
    /// Page through all transactions until a short page
    fn fetch_all(&self, account: &AccountId) -> Result<Vec<LedgerRecord>> {
        info!("Fetching transactions for account ID {}", account);
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_page(account, offset)?;
            let fetched = page.len();
            all.extend(page);
            offset += fetched;
            if fetched < self.page_size {
                break;
            }
        }

        info!("Total transactions fetched for account {}: {}", account, all.len());
        Ok(all)
    }
}

impl AccountDirectory for LedgerClient {
    fn list_accounts(&self) -> Result<Vec<LedgerAccount>> {
        let url = self.url("CheckAccount");
        debug!("GET {}", url);
        let response = self.send(self.http.get(&url), &url)?;
        Ok(Self::objects::<Vec<LedgerAccount>>(response)?.unwrap_or_default())
    }

    fn create_account(&self, account: &NewAccount) -> Result<LedgerAccount> {
        let url = self.url("CheckAccount");
        debug!("POST {} name={}", url, account.name);
        let body = CreateAccountBody {
            name: &account.name,
            kind: "online",
            currency: account.currency.to_uppercase(),
            status: STATUS_OPEN,
            import_type: "CSV",
            account_number: &account.account_number,
        };
        let response = self.send(self.http.post(&url).json(&body), &url)?;
        Self::objects::<LedgerAccount>(response)?.ok_or_else(|| Error::AccountCreation {
            name: account.name.clone(),
            reason: "response contained no account".into(),
        })
    }
}

impl DeletionSink for LedgerClient {
    fn delete(&self, id: &TransactionId) -> Result<()> {
        if self.reopen_before_delete {
            self.reopen_transaction(id)?;
        }
        let url = self.url(&format!("CheckAccountTransaction/{}", id));
        debug!("DELETE {}", url);
        self.send(self.http.delete(&url), &url)?;
        Ok(())
    }
}

impl TransactionSink for LedgerClient {
    fn create_transaction(&self, transaction: &NewLedgerTransaction) -> Result<TransactionId> {
        let url = self.url("CheckAccountTransaction");
        debug!("POST {} amount={}", url, transaction.amount);
        let body = json!({
            "checkAccount": {
                "id": transaction.account_id.as_str(),
                "objectName": "CheckAccount",
            },
            "status": STATUS_OPEN,
            "entryDate": transaction.entry_date.format(DATETIME_FORMAT).to_string(),
            "valueDate": transaction.value_date.format(DATETIME_FORMAT).to_string(),
            "amount": transaction.amount.to_string(),
            "payeePayerName": transaction.payee_payer_name,
            "paymtPurpose": transaction.purpose,
        });
        let response = self.send(self.http.post(&url).json(&body), &url)?;

        #[derive(Deserialize)]
        struct Created {
            id: RawScalar,
        }
        let created = Self::objects::<Created>(response)?
            .ok_or_else(|| Error::InvalidData("ledger returned no created transaction".into()))?;
        Ok(TransactionId(created.id.to_text()))
    }
}

/// Pull `error.message` out of an API error body, else return the body
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer, page_size: usize) -> LedgerClient {
        let config = LedgerConfig {
            base_url: server.base_url(),
            page_size,
            ..LedgerConfig::default()
        };
        LedgerClient::new(&config, "test-token").unwrap()
    }

    fn tx_json(id: u32) -> serde_json::Value {
        json!({
            "id": id.to_string(),
            "objectName": "CheckAccountTransaction",
            "create": "2024-03-01T10:00:00+01:00",
            "entryDate": "2024-03-01T00:00:00+01:00",
            "amount": "-42.00",
            "paymtPurpose": "Rent"
        })
    }

    #[test]
    fn test_fetch_all_pages_until_short_page() {
        let server = MockServer::start();

        let page1 = server.mock(|when, then| {
            when.method(GET)
                .path("/CheckAccountTransaction")
                .query_param("checkAccount[id]", "7")
                .query_param("offset", "0")
                .query_param("limit", "2")
                .header("Authorization", "test-token");
            then.status(200)
                .json_body(json!({ "objects": [tx_json(1), tx_json(2)] }));
        });
        let page2 = server.mock(|when, then| {
            when.method(GET)
                .path("/CheckAccountTransaction")
                .query_param("offset", "2");
            then.status(200).json_body(json!({ "objects": [tx_json(3)] }));
        });

        let records = client(&server, 2).fetch_all(&AccountId::from("7")).unwrap();

        page1.assert();
        page2.assert();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].display_id(), "3");
    }

    #[test]
    fn test_fetch_all_full_last_page_asks_once_more() {
        let server = MockServer::start();
        let page1 = server.mock(|when, then| {
            when.method(GET)
                .path("/CheckAccountTransaction")
                .query_param("offset", "0");
            then.status(200)
                .json_body(json!({ "objects": [tx_json(1), tx_json(2)] }));
        });
        let page2 = server.mock(|when, then| {
            when.method(GET)
                .path("/CheckAccountTransaction")
                .query_param("offset", "2");
            then.status(200).json_body(json!({ "objects": [] }));
        });

        let records = client(&server, 2).fetch_all(&AccountId::from("7")).unwrap();
        page1.assert();
        page2.assert();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_empty_account_is_not_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/CheckAccountTransaction");
            then.status(200).json_body(json!({ "objects": [] }));
        });

        let records = client(&server, 100).fetch_all(&AccountId::from("7")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_unreachable_ledger_is_distinguishable() {
        let config = LedgerConfig {
            // nothing listens on port 9 (discard) on test machines
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..LedgerConfig::default()
        };
        let client = LedgerClient::new(&config, "t").unwrap();
        let err = client.fetch_all(&AccountId::from("7")).unwrap_err();
        assert!(err.is_unreachable(), "unexpected error: {}", err);
    }

    #[test]
    fn test_api_error_message_extracted() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/CheckAccountTransaction");
            then.status(401)
                .json_body(json!({ "error": { "message": "Authentication required", "code": null } }));
        });

        let err = client(&server, 100)
            .fetch_all(&AccountId::from("7"))
            .unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Authentication required");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_delete_transaction() {
        let server = MockServer::start();
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/CheckAccountTransaction/42");
            then.status(200).json_body(json!({ "objects": [null] }));
        });

        client(&server, 100).delete(&TransactionId::from("42")).unwrap();
        delete.assert();
    }

    #[test]
    fn test_delete_failure_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/CheckAccountTransaction/42");
            then.status(400)
                .json_body(json!({ "error": { "message": "Transaction is booked" } }));
        });

        let err = client(&server, 100)
            .delete(&TransactionId::from("42"))
            .unwrap_err();
        assert!(err.to_string().contains("Transaction is booked"));
    }

    #[test]
    fn test_reopen_before_delete() {
        let server = MockServer::start();
        let reopen = server.mock(|when, then| {
            when.method(PUT)
                .path("/CheckAccountTransaction/42")
                .json_body(json!({ "status": 100 }));
            then.status(200).json_body(json!({ "objects": { "id": "42" } }));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/CheckAccountTransaction/42");
            then.status(200).json_body(json!({ "objects": [null] }));
        });

        let config = LedgerConfig {
            base_url: server.base_url(),
            reopen_before_delete: true,
            ..LedgerConfig::default()
        };
        let client = LedgerClient::new(&config, "t").unwrap();
        client.delete(&TransactionId::from("42")).unwrap();

        reopen.assert();
        delete.assert();
    }

    #[test]
    fn test_list_and_create_accounts() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/CheckAccount");
            then.status(200).json_body(json!({ "objects": [
                { "id": "1", "name": "Kasse", "type": "register", "currency": "EUR" },
                { "id": "2", "name": "Wise (EUR, BE00)", "type": "online", "currency": "EUR" }
            ]}));
        });
        let create = server.mock(|when, then| {
            when.method(POST).path("/CheckAccount").json_body(json!({
                "name": "Wise (USD, 123)",
                "type": "online",
                "currency": "USD",
                "status": 100,
                "importType": "CSV",
                "accountNumber": "123"
            }));
            then.status(201).json_body(json!({ "objects":
                { "id": "3", "name": "Wise (USD, 123)", "type": "online", "currency": "USD" }
            }));
        });

        let client = client(&server, 100);
        let accounts = client.list_accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts[0].is_register());

        let created = client
            .create_account(&NewAccount {
                name: "Wise (USD, 123)".into(),
                currency: "usd".into(),
                account_number: "123".into(),
            })
            .unwrap();
        create.assert();
        assert_eq!(created.account_id(), AccountId::from("3"));
    }

    #[test]
    fn test_create_account_without_objects_is_creation_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/CheckAccount");
            then.status(201).json_body(json!({ "total": 0 }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/CheckAccount");
            then.status(200).json_body(json!({ "objects": null }));
        });

        let client = client(&server, 100);
        assert!(client.list_accounts().unwrap().is_empty());

        let err = client
            .create_account(&NewAccount {
                name: "Wise (EUR, BE00)".into(),
                currency: "EUR".into(),
                account_number: "BE00".into(),
            })
            .unwrap_err();
        match err {
            Error::AccountCreation { name, reason } => {
                assert_eq!(name, "Wise (EUR, BE00)");
                assert!(reason.contains("no account"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_extract_error_message_falls_back_to_body() {
        assert_eq!(extract_error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"nope"}}"#),
            "nope"
        );
    }
}
