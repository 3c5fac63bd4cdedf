//! Invoices created through a Frappe/ERPNext style resource API.
//!
//! Customers are created on first use; items must already exist in the invoicing system.
//! Invoices are submitted directly (`docstatus = 1`) and their document name is stored as the
//! invoice id.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use jiff::{civil::Date, tz::TimeZone};
use reqwest::{Client, Method, RequestBuilder, StatusCode, header::AUTHORIZATION};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    clock::Clock,
    domain::{history::HistoryService, invoices::InvoicesService},
};

use super::{InvoiceData, InvoiceError, InvoiceProvider};

const SALES_INVOICE: &str = "Sales%20Invoice";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestInvoiceConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,

    /// Customers are named `{customer_prefix}{userid}`.
    pub customer_prefix: String,
    pub customer_group: String,
    pub territory: String,

    /// Account tax rows are booked on.
    pub tax_account: String,
    pub timeout: Duration,
}

impl Default for RestInvoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            customer_prefix: "user-".to_string(),
            customer_group: "Individual".to_string(),
            territory: "All Territories".to_string(),
            tax_account: "VAT - SC".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct RestInvoiceProvider {
    http: Client,
    config: RestInvoiceConfig,
    history: Arc<dyn HistoryService>,
    invoices: Arc<dyn InvoicesService>,
    clock: Arc<dyn Clock>,
}

impl RestInvoiceProvider {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(
        config: RestInvoiceConfig,
        history: Arc<dyn HistoryService>,
        invoices: Arc<dyn InvoicesService>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, InvoiceError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            config,
            history,
            invoices,
            clock,
        })
    }

    fn url(&self, resource: &str) -> String {
        format!(
            "{}/api/resource/{resource}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url).header(
            AUTHORIZATION,
            format!("token {}:{}", self.config.api_key, self.config.api_secret),
        )
    }

    /// Fetch a document; `None` when it does not exist.
    async fn fetch(&self, url: &str) -> Result<Option<Value>, InvoiceError> {
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        if Self::validate_response(status, &body, url) {
            Ok(Some(body))
        } else {
            Err(InvoiceError::Rejected {
                url: url.to_string(),
            })
        }
    }

    /// Create a document and return its name.
    async fn insert(&self, url: &str, document: &Value) -> Result<String, InvoiceError> {
        let response = self.request(Method::POST, url).json(document).send().await?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        if !Self::validate_response(status, &body, url) {
            return Err(InvoiceError::Rejected {
                url: url.to_string(),
            });
        }

        Ok(document_name(&body).unwrap_or_default().to_string())
    }

    async fn ensure_customer(&self, userid: u64) -> Result<String, InvoiceError> {
        let name = format!("{}{userid}", self.config.customer_prefix);

        if self
            .fetch(&self.url(&format!("Customer/{name}")))
            .await?
            .is_some()
        {
            return Ok(name);
        }

        let customer = json!({
            "name": name,
            "customer_name": name,
            "customer_type": "Individual",
            "customer_group": self.config.customer_group,
            "territory": self.config.territory,
        });

        self.insert(&self.url("Customer"), &customer).await?;

        info!(customer = %name, "invoicing customer created");

        Ok(name)
    }

    async fn item_exists(&self, item_code: &str) -> Result<bool, InvoiceError> {
        Ok(self
            .fetch(&self.url(&format!("Item/{item_code}")))
            .await?
            .is_some())
    }

    /// The sales invoice document for `data`.
    ///
    /// Lines carrying tax are sent at their net rate with one tax row per rate; otherwise lines
    /// are sent at the price charged. Credit lines become a discount on the grand total.
    pub fn prepare_json_invoice_data(
        &self,
        data: &InvoiceData,
        customer: &str,
        posting_date: Date,
    ) -> Value {
        let items: Vec<Value> = data
            .lines
            .iter()
            .map(|line| {
                json!({
                    "item_code": line.item_code,
                    "item_name": line.item_name,
                    "qty": 1,
                    "rate": if data.taxes_included { line.net } else { line.gross },
                })
            })
            .collect();

        let mut tax_by_rate: BTreeMap<Option<Decimal>, Decimal> = BTreeMap::new();

        if data.taxes_included {
            for line in data.lines.iter().filter(|line| line.tax > Decimal::ZERO) {
                *tax_by_rate.entry(line.tax_percentage).or_default() += line.tax;
            }
        }

        let taxes: Vec<Value> = tax_by_rate
            .into_iter()
            .map(|(rate, amount)| {
                json!({
                    "charge_type": "Actual",
                    "account_head": self.config.tax_account,
                    "description": rate
                        .map_or_else(|| "VAT".to_string(), |rate| format!("VAT {rate}%")),
                    "tax_amount": amount,
                })
            })
            .collect();

        json!({
            "customer": customer,
            "currency": data.currency,
            "posting_date": posting_date.to_string(),
            "set_posting_time": 1,
            "docstatus": 1,
            "remarks": format!("Checkout {}", data.identifier),
            "items": items,
            "taxes": taxes,
            "apply_discount_on": "Grand Total",
            "discount_amount": data.discount,
        })
    }

    /// Whether the invoicing system accepted a request and answered with a document.
    pub fn validate_response(status: StatusCode, body: &Value, url: &str) -> bool {
        if !status.is_success() {
            let exception = body.get("exc_type").and_then(Value::as_str);

            error!(%status, url, exception, "invoicing request rejected");
            return false;
        }

        if document_name(body).is_none_or(str::is_empty) {
            error!(url, "invoicing response without a document");
            return false;
        }

        true
    }
}

fn document_name(body: &Value) -> Option<&str> {
    body.pointer("/data/name").and_then(Value::as_str)
}

#[async_trait]
impl InvoiceProvider for RestInvoiceProvider {
    fn name(&self) -> &'static str {
        "erpnext"
    }

    async fn create_invoice(&self, identifier: u64) -> Result<bool, InvoiceError> {
        if self.invoices.get_for_identifier(identifier).await?.is_some() {
            return Ok(true);
        }

        let records = self.history.list_for_identifier(identifier).await?;

        let Some(data) = InvoiceData::from_records(identifier, &records) else {
            return Ok(false);
        };

        let customer = self.ensure_customer(data.userid).await?;

        for line in &data.lines {
            if !self.item_exists(&line.item_code).await? {
                return Err(InvoiceError::UnknownItem(line.item_code.clone()));
            }
        }

        let posting_date = self.clock.now().to_zoned(TimeZone::UTC).date();
        let document = self.prepare_json_invoice_data(&data, &customer, posting_date);

        let invoice_id = self.insert(&self.url(SALES_INVOICE), &document).await?;

        self.invoices
            .record_invoice(identifier, &invoice_id, self.name())
            .await?;

        info!(identifier, %invoice_id, "invoice created");

        Ok(true)
    }
}

impl std::fmt::Debug for RestInvoiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestInvoiceProvider")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use shopcart::settings::CartSettings;
    use testresult::TestResult;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    use crate::{catalog::InMemoryCatalog, invoicing::InvoiceLine, test::helpers::TestShop};

    use super::*;

    fn provider(shop: &TestShop, base_url: String) -> TestResult<RestInvoiceProvider> {
        let config = RestInvoiceConfig {
            base_url,
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            ..RestInvoiceConfig::default()
        };

        Ok(RestInvoiceProvider::new(
            config,
            shop.store.clone(),
            shop.store.clone(),
            shop.clock.clone(),
        )?)
    }

    async fn purchase(shop: &TestShop) -> TestResult<u64> {
        let id = shop.paid_purchase(7, 1, dec!(30)).await?;

        Ok(HistoryService::get(&*shop.store, id).await?.identifier)
    }

    fn data(taxes_included: bool) -> InvoiceData {
        InvoiceData {
            identifier: 500,
            userid: 7,
            currency: "EUR".to_string(),
            taxes_included,
            lines: vec![
                InvoiceLine {
                    item_code: "mod_booking-option-1".to_string(),
                    item_name: "Yoga".to_string(),
                    gross: dec!(119),
                    net: dec!(100),
                    tax: dec!(19),
                    tax_percentage: Some(dec!(19)),
                },
                InvoiceLine {
                    item_code: "mod_booking-option-2".to_string(),
                    item_name: "Pilates".to_string(),
                    gross: dec!(107),
                    net: dec!(100),
                    tax: dec!(7),
                    tax_percentage: Some(dec!(7)),
                },
            ],
            discount: dec!(10),
        }
    }

    #[tokio::test]
    async fn taxed_lines_are_sent_net_with_tax_rows() -> TestResult {
        let shop = TestShop::new(CartSettings::default(), InMemoryCatalog::new())?;
        let provider = provider(&shop, "http://invoicing.test/".to_string())?;

        let document =
            provider.prepare_json_invoice_data(&data(true), "user-7", Date::new(2026, 1, 1)?);

        assert_eq!(document["posting_date"], "2026-01-01");
        assert_eq!(document["items"][0]["rate"], json!(dec!(100)));
        assert_eq!(document["taxes"][0]["description"], "VAT 7%");
        assert_eq!(document["taxes"][1]["tax_amount"], json!(dec!(19)));
        assert_eq!(document["discount_amount"], json!(dec!(10)));
        assert_eq!(provider.url(SALES_INVOICE), "http://invoicing.test/api/resource/Sales%20Invoice");

        Ok(())
    }

    #[tokio::test]
    async fn untaxed_lines_are_sent_as_charged() -> TestResult {
        let shop = TestShop::new(CartSettings::default(), InMemoryCatalog::new())?;
        let provider = provider(&shop, "http://invoicing.test".to_string())?;

        let document =
            provider.prepare_json_invoice_data(&data(false), "user-7", Date::new(2026, 1, 1)?);

        assert_eq!(document["items"][1]["rate"], json!(dec!(107)));
        assert_eq!(document["taxes"], json!([]));

        Ok(())
    }

    #[test]
    fn responses_need_success_and_a_document() {
        let url = "http://invoicing.test/api/resource/Customer";

        assert!(RestInvoiceProvider::validate_response(
            StatusCode::OK,
            &json!({"data": {"name": "user-7"}}),
            url
        ));
        assert!(!RestInvoiceProvider::validate_response(
            StatusCode::EXPECTATION_FAILED,
            &json!({"exc_type": "ValidationError"}),
            url
        ));
        assert!(!RestInvoiceProvider::validate_response(
            StatusCode::OK,
            &json!({"data": {}}),
            url
        ));
    }

    #[test]
    fn rejections_without_an_exception_type_are_rejections() {
        let url = "http://invoicing.test/api/resource/Sales Invoice";

        assert!(!RestInvoiceProvider::validate_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({"message": "boom"}),
            url
        ));
        assert!(!RestInvoiceProvider::validate_response(
            StatusCode::FORBIDDEN,
            &Value::Null,
            url
        ));
    }

    #[tokio::test]
    async fn creates_customer_then_invoice() -> TestResult {
        let server = MockServer::start().await;
        let shop = TestShop::new(CartSettings::default(), InMemoryCatalog::new())?;
        let identifier = purchase(&shop).await?;

        Mock::given(method("GET"))
            .and(path("/api/resource/Customer/user-7"))
            .and(header("Authorization", "token key:secret"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/resource/Customer"))
            .and(body_partial_json(json!({"customer_name": "user-7"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"name": "user-7"}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Item/mod_booking-option-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"name": "mod_booking-option-1"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/resource/Sales%20Invoice"))
            .and(body_partial_json(json!({"customer": "user-7", "docstatus": 1})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"name": "ACC-SINV-0001"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&shop, server.uri())?;

        assert!(provider.create_invoice(identifier).await?);
        // Already recorded, nothing is sent again.
        assert!(provider.create_invoice(identifier).await?);

        let invoice = shop
            .store
            .get_for_identifier(identifier)
            .await?
            .ok_or("no invoice")?;
        assert_eq!(invoice.invoice_id, "ACC-SINV-0001");
        assert_eq!(invoice.provider, "erpnext");

        Ok(())
    }

    #[tokio::test]
    async fn missing_items_fail_before_the_invoice() -> TestResult {
        let server = MockServer::start().await;
        let shop = TestShop::new(CartSettings::default(), InMemoryCatalog::new())?;
        let identifier = purchase(&shop).await?;

        Mock::given(method("GET"))
            .and(path("/api/resource/Customer/user-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"name": "user-7"}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/resource/Item/mod_booking-option-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/resource/Sales%20Invoice"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider(&shop, server.uri())?;

        assert!(matches!(
            provider.create_invoice(identifier).await,
            Err(InvoiceError::UnknownItem(code)) if code == "mod_booking-option-1"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn rejected_invoices_are_errors() -> TestResult {
        let server = MockServer::start().await;
        let shop = TestShop::new(CartSettings::default(), InMemoryCatalog::new())?;
        let identifier = purchase(&shop).await?;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"name": "x"}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/resource/Sales%20Invoice"))
            .respond_with(
                ResponseTemplate::new(417).set_body_json(json!({"exc_type": "ValidationError"})),
            )
            .mount(&server)
            .await;

        let provider = provider(&shop, server.uri())?;

        assert!(matches!(
            provider.create_invoice(identifier).await,
            Err(InvoiceError::Rejected { .. })
        ));
        assert!(shop.store.get_for_identifier(identifier).await?.is_none());

        Ok(())
    }
}
