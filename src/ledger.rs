//! The `ledger` module wraps the transaction indexer and the price ticker:
//! paged wallet transaction history, current wallet balance, and spot
//! exchange rates. Pure I/O adapters with no business logic.

use chrono::NaiveDate;
use config::Settings;
use records::{WalletTransaction, BASE_UNITS_PER_COIN};
use reqwest;
use result::{Error, Result};
use serde_json::Value;

pub const PAGE_SIZE: usize = 100;

pub struct LedgerClient {
    client: reqwest::Client,
    indexer_url: String,
    indexer_key: Option<String>,
    rates_url: String,
}

impl LedgerClient {
    pub fn new(settings: &Settings) -> LedgerClient {
        LedgerClient {
            client: reqwest::Client::new(),
            indexer_url: settings.indexer_url.clone(),
            indexer_key: settings.indexer_key.clone(),
            rates_url: settings.rates_url.clone(),
        }
    }

    /// Lazy paged transaction history for a wallet, bounded by the given
    /// dates when present. Pages are fetched on demand as the iterator is
    /// consumed.
    pub fn transaction_pages(
        &self,
        wallet: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> TransactionPages {
        TransactionPages {
            client: self,
            wallet: wallet.to_string(),
            from,
            to,
            page: 1,
            done: false,
        }
    }

    /// Full transaction history for a wallet, flattened from the paged
    /// sequence. The first failing page fails the whole fetch.
    pub fn transactions(
        &self,
        wallet: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<WalletTransaction>> {
        let mut all = Vec::new();
        for page in self.transaction_pages(wallet, from, to) {
            all.extend(page?);
        }
        Ok(all)
    }

    fn transactions_page(
        &self,
        wallet: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        page: u32,
    ) -> Result<Vec<WalletTransaction>> {
        let key = self.require_key()?;
        let url = transactions_url(&self.indexer_url, wallet, from, to, page);
        let mut response = self.client.get(&url).header("project_id", key).send()?;
        if !response.status().is_success() {
            return Err(Error::UpstreamFetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json()?)
    }

    /// Current wallet balance in display units.
    pub fn balance(&self, wallet: &str) -> Result<f64> {
        let key = self.require_key()?;
        let url = format!("{}/addresses/{}", self.indexer_url, wallet);
        let mut response = self.client.get(&url).header("project_id", key).send()?;
        if !response.status().is_success() {
            return Err(Error::UpstreamFetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let body: Value = response.json()?;
        parse_balance(&body)
    }

    /// Latest spot rate for one asset against one currency.
    pub fn spot_rate(&self, asset_id: &str, vs_currency: &str) -> Result<f64> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.rates_url, asset_id, vs_currency
        );
        let mut response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(Error::UpstreamFetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let body: Value = response.json()?;
        parse_rate(&body, asset_id, vs_currency)
    }

    fn require_key(&self) -> Result<&str> {
        match self.indexer_key {
            Some(ref key) => Ok(key.as_str()),
            None => Err(Error::UpstreamFetch(
                "indexer key not configured".to_string(),
            )),
        }
    }
}

/// Iterator over pages of wallet transactions. A short page ends the
/// sequence; an error is yielded once and ends it too.
pub struct TransactionPages<'a> {
    client: &'a LedgerClient,
    wallet: String,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    page: u32,
    done: bool,
}

impl<'a> Iterator for TransactionPages<'a> {
    type Item = Result<Vec<WalletTransaction>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self
            .client
            .transactions_page(&self.wallet, self.from, self.to, self.page)
        {
            Ok(batch) => {
                if batch.len() < PAGE_SIZE {
                    self.done = true;
                }
                self.page += 1;
                if batch.is_empty() {
                    None
                } else {
                    Some(Ok(batch))
                }
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn transactions_url(
    base: &str,
    wallet: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    page: u32,
) -> String {
    let mut url = format!(
        "{}/addresses/{}/transactions?page={}&count={}",
        base, wallet, page, PAGE_SIZE
    );
    if let Some(from) = from {
        url.push_str(&format!("&from={}", from.format("%Y-%m-%d")));
    }
    if let Some(to) = to {
        url.push_str(&format!("&to={}", to.format("%Y-%m-%d")));
    }
    url
}

fn parse_balance(body: &Value) -> Result<f64> {
    let base_units = body["balance"]
        .as_str()
        .and_then(|balance| balance.parse::<u64>().ok())
        .ok_or_else(|| {
            Error::UpstreamFetch(format!("unexpected balance payload: {}", body))
        })?;
    Ok(base_units as f64 / BASE_UNITS_PER_COIN)
}

fn parse_rate(body: &Value, asset_id: &str, vs_currency: &str) -> Result<f64> {
    body[asset_id][vs_currency].as_f64().ok_or_else(|| {
        Error::UpstreamFetch(format!(
            "no {}/{} rate in payload: {}",
            asset_id, vs_currency, body
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transactions_url_without_bounds() {
        assert_eq!(
            transactions_url("http://indexer.test", "addr1q0", None, None, 1),
            "http://indexer.test/addresses/addr1q0/transactions?page=1&count=100"
        );
    }

    #[test]
    fn test_transactions_url_with_bounds() {
        let url = transactions_url(
            "http://indexer.test",
            "addr1q0",
            Some(NaiveDate::from_ymd(2023, 1, 1)),
            Some(NaiveDate::from_ymd(2024, 1, 1)),
            3,
        );
        assert_eq!(
            url,
            "http://indexer.test/addresses/addr1q0/transactions?page=3&count=100&from=2023-01-01&to=2024-01-01"
        );
    }

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_balance(&json!({"balance": "42000000"})).unwrap(), 42.0);
        assert_matches!(
            parse_balance(&json!({"balance": 42})),
            Err(Error::UpstreamFetch(_))
        );
        assert_matches!(parse_balance(&json!({})), Err(Error::UpstreamFetch(_)));
    }

    #[test]
    fn test_parse_rate() {
        let body = json!({"cardano": {"usd": 0.38}});
        assert_eq!(parse_rate(&body, "cardano", "usd").unwrap(), 0.38);
        assert_matches!(
            parse_rate(&body, "cardano", "eur"),
            Err(Error::UpstreamFetch(_))
        );
    }

    #[test]
    fn test_missing_indexer_key_is_upstream_error() {
        let client = LedgerClient {
            client: reqwest::Client::new(),
            indexer_url: "http://indexer.test".to_string(),
            indexer_key: None,
            rates_url: "http://rates.test".to_string(),
        };
        assert_matches!(client.balance("addr1q0"), Err(Error::UpstreamFetch(_)));
    }
}
