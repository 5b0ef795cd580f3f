// src/edgar/facts.rs
use std::sync::Arc;

use crate::aggregate::parse_filing_date;
use crate::edgar::client::EdgarClient;
use crate::edgar::filing::Cik;
use crate::edgar::models::{CompanyFacts, FactPoint};
use crate::records::{FinancialSnapshot, SharesOutstandingPoint};
use crate::utils::error::EdgarError;

/// Concepts that carry the shares-outstanding count, most specific first.
const SHARES_OUTSTANDING_CONCEPTS: &[(&str, &str)] = &[
    ("dei", "EntityCommonStockSharesOutstanding"),
    ("us-gaap", "CommonStockSharesOutstanding"),
    ("us-gaap", "SharesOutstanding"),
];

const GAAP: &str = "us-gaap";
const MONEY: &str = "USD";
const PER_SHARE: &str = "USD/shares";

/// Reads the XBRL company-facts endpoint.
pub struct FactsClient {
    client: Arc<EdgarClient>,
}

impl FactsClient {
    pub fn new(client: Arc<EdgarClient>) -> Self {
        Self { client }
    }

    pub async fn company_facts(&self, cik: Cik) -> Result<CompanyFacts, EdgarError> {
        let url = self.client.company_facts_url(cik)?;
        self.client.get_json(&url).await
    }

    /// Full shares-outstanding series, oldest period first.
    pub async fn shares_outstanding(&self, cik: Cik) -> Result<Vec<SharesOutstandingPoint>, EdgarError> {
        let facts = self.company_facts(cik).await?;
        let series = shares_outstanding_series(&facts)?;
        tracing::info!(
            "{} shares-outstanding points for {} ({})",
            series.len(),
            cik,
            facts.entity_name
        );
        Ok(series)
    }

    pub async fn latest_shares_outstanding(&self, cik: Cik) -> Result<Option<SharesOutstandingPoint>, EdgarError> {
        Ok(self.shares_outstanding(cik).await?.pop())
    }

    /// Latest value of each key financial concept.
    pub async fn key_financials(&self, cik: Cik) -> Result<FinancialSnapshot, EdgarError> {
        let facts = self.company_facts(cik).await?;
        let snapshot = financial_snapshot(&facts);
        tracing::info!("Key financials for {} ({})", cik, facts.entity_name);
        Ok(snapshot)
    }
}

/// Builds the key-financials snapshot from a company-facts document.
/// Money concepts are read in USD, earnings per share in USD per share.
pub fn financial_snapshot(facts: &CompanyFacts) -> FinancialSnapshot {
    let money = |concept: &str| latest_value(facts, concept, MONEY);
    let per_share = |concept: &str| latest_value(facts, concept, PER_SHARE);

    let operating_cash_flow = money("NetCashProvidedByUsedInOperatingActivities");
    let capital_expenditures = money("PaymentsToAcquirePropertyPlantAndEquipment");

    FinancialSnapshot {
        entity_name: facts.entity_name.clone(),
        total_assets: money("Assets"),
        total_liabilities: money("Liabilities"),
        stockholders_equity: money("StockholdersEquity"),
        revenue: money("Revenues"),
        net_income: money("NetIncomeLoss"),
        operating_income: money("OperatingIncomeLoss"),
        gross_profit: money("GrossProfit"),
        ebit: money("EarningsBeforeInterestAndTaxes"),
        ebitda: money("EarningsBeforeInterestTaxesDepreciationAndAmortization"),
        eps_basic: per_share("EarningsPerShareBasic"),
        eps_diluted: per_share("EarningsPerShareDiluted"),
        free_cash_flow: operating_cash_flow
            .zip(capital_expenditures)
            .map(|(cash_flow, capex)| cash_flow - capex),
        operating_cash_flow,
        capital_expenditures,
    }
}

// Latest period end wins; a later filing of the same period wins over an earlier one.
fn latest_value(facts: &CompanyFacts, concept: &str, unit: &str) -> Option<f64> {
    let points = facts.facts.get(GAAP)?.get(concept)?.units.get(unit)?;
    points
        .iter()
        .filter(|point| point.val.is_finite())
        .filter_map(|point| {
            let end = parse_filing_date(&point.end)?;
            let filed = point.filed.as_deref().and_then(parse_filing_date);
            Some((end, filed, point.val))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, _, value)| value)
}

/// Picks the first concept present, takes its first unit, and returns the
/// points sorted by period end. Points with an unparseable end date or a
/// negative value are skipped.
pub fn shares_outstanding_series(facts: &CompanyFacts) -> Result<Vec<SharesOutstandingPoint>, EdgarError> {
    let concept = SHARES_OUTSTANDING_CONCEPTS
        .iter()
        .find_map(|(taxonomy, name)| {
            facts
                .facts
                .get(*taxonomy)
                .and_then(|concepts| concepts.get(*name))
                .filter(|concept| !concept.units.is_empty())
                .map(|concept| (*name, concept))
        });

    let Some((name, concept)) = concept else {
        return Err(EdgarError::Parse(format!(
            "no shares-outstanding concept for {}",
            facts.entity_name
        )));
    };

    let Some((unit, points)) = concept.units.iter().next() else {
        return Ok(Vec::new());
    };
    tracing::debug!("Using {} ({}) with {} points", name, unit, points.len());

    let mut series: Vec<SharesOutstandingPoint> = points.iter().filter_map(to_point).collect();
    series.sort_by(|a, b| a.end_date.cmp(&b.end_date));
    Ok(series)
}

fn to_point(point: &FactPoint) -> Option<SharesOutstandingPoint> {
    let end_date = parse_filing_date(&point.end)?;
    if !point.val.is_finite() || point.val < 0.0 {
        return None;
    }
    Some(SharesOutstandingPoint {
        end_date,
        value: point.val.round() as u64,
        form: point.form.clone(),
        filed_date: point.filed.as_deref().and_then(parse_filing_date),
        fiscal_year: point.fy,
        fiscal_period: point.fp.clone(),
        accession_number: point.accn.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::client::ClientConfig;
    use chrono::NaiveDate;
    use httpmock::{Method::GET, MockServer};
    use std::time::Duration;

    const FACTS: &str = r#"{
        "cik": 1838359,
        "entityName": "Rigetti Computing, Inc.",
        "facts": {
            "dei": {
                "EntityCommonStockSharesOutstanding": {
                    "label": "Entity Common Stock, Shares Outstanding",
                    "units": {
                        "shares": [
                            {"end": "2023-11-06", "val": 142000000, "accn": "0001838359-23-000040", "fy": 2023, "fp": "Q3", "form": "10-Q", "filed": "2023-11-09"},
                            {"end": "2023-05-05", "val": 127000000, "accn": "0001838359-23-000020", "fy": 2023, "fp": "Q1", "form": "10-Q", "filed": "2023-05-11"},
                            {"end": "2024-03-11", "val": 164000000, "accn": "0001838359-24-000010", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2024-03-14"}
                        ]
                    }
                }
            },
            "us-gaap": {
                "CommonStockSharesOutstanding": {
                    "units": {"shares": [{"end": "2022-12-31", "val": 1}]}
                }
            }
        }
    }"#;

    #[test]
    fn series_prefers_dei_and_sorts_by_end() {
        let facts: CompanyFacts = serde_json::from_str(FACTS).unwrap();
        let series = shares_outstanding_series(&facts).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].end_date, NaiveDate::from_ymd_opt(2023, 5, 5).unwrap());
        assert_eq!(series[2].value, 164_000_000);
        assert_eq!(series[2].form.as_deref(), Some("10-K"));
        assert_eq!(series[2].filed_date, NaiveDate::from_ymd_opt(2024, 3, 14));
    }

    #[test]
    fn falls_back_to_us_gaap_concept() {
        let facts: CompanyFacts = serde_json::from_str(
            r#"{"entityName": "X", "facts": {"us-gaap": {"SharesOutstanding": {"units": {"shares": [{"end": "2021-12-31", "val": 500.4}]}}}}}"#,
        )
        .unwrap();
        let series = shares_outstanding_series(&facts).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, 500);
    }

    #[test]
    fn missing_concepts_are_an_error() {
        let facts: CompanyFacts = serde_json::from_str(r#"{"entityName": "X", "facts": {}}"#).unwrap();
        assert!(matches!(shares_outstanding_series(&facts), Err(EdgarError::Parse(_))));
    }

    const FINANCIALS: &str = r#"{
        "entityName": "Rigetti Computing, Inc.",
        "facts": {
            "us-gaap": {
                "Assets": {"units": {"USD": [
                    {"end": "2023-12-31", "val": 300000000, "filed": "2024-03-14"},
                    {"end": "2024-06-30", "val": 280000000, "filed": "2024-08-08"},
                    {"end": "2022-12-31", "val": 350000000, "filed": "2023-03-30"}
                ]}},
                "NetIncomeLoss": {"units": {"USD": [
                    {"end": "2024-06-30", "val": -12000000, "filed": "2024-08-08"},
                    {"end": "2024-06-30", "val": -12500000, "filed": "2024-11-07"}
                ]}},
                "EarningsPerShareBasic": {"units": {"USD/shares": [{"end": "2024-06-30", "val": -0.07}]}},
                "NetCashProvidedByUsedInOperatingActivities": {"units": {"USD": [{"end": "2024-06-30", "val": -30000000}]}},
                "PaymentsToAcquirePropertyPlantAndEquipment": {"units": {"USD": [{"end": "2024-06-30", "val": 2000000}]}},
                "Revenues": {"units": {"EUR": [{"end": "2024-06-30", "val": 1}]}}
            }
        }
    }"#;

    #[test]
    fn snapshot_takes_latest_value_per_concept() {
        let facts: CompanyFacts = serde_json::from_str(FINANCIALS).unwrap();
        let snapshot = financial_snapshot(&facts);

        assert_eq!(snapshot.entity_name, "Rigetti Computing, Inc.");
        assert_eq!(snapshot.total_assets, Some(280_000_000.0));
        assert_eq!(snapshot.net_income, Some(-12_500_000.0));
        assert_eq!(snapshot.eps_basic, Some(-0.07));
        assert_eq!(snapshot.free_cash_flow, Some(-32_000_000.0));
    }

    #[test]
    fn unreported_concepts_stay_empty() {
        let facts: CompanyFacts = serde_json::from_str(FINANCIALS).unwrap();
        let snapshot = financial_snapshot(&facts);

        assert_eq!(snapshot.total_liabilities, None);
        assert_eq!(snapshot.eps_diluted, None);
        // Only reported in EUR.
        assert_eq!(snapshot.revenue, None);

        let without_capex: CompanyFacts = serde_json::from_str(
            r#"{"entityName": "X", "facts": {"us-gaap": {"NetCashProvidedByUsedInOperatingActivities": {"units": {"USD": [{"end": "2024-06-30", "val": 5}]}}}}}"#,
        )
        .unwrap();
        let snapshot = financial_snapshot(&without_capex);
        assert_eq!(snapshot.operating_cash_flow, Some(5.0));
        assert_eq!(snapshot.free_cash_flow, None);
    }

    #[tokio::test]
    async fn key_financials_reads_the_facts_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/xbrl/companyfacts/CIK0001838359.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(FINANCIALS);
        });

        let config = ClientConfig::new("Test test@example.com")
            .with_min_request_interval(Duration::ZERO)
            .with_base_url(&server.base_url())
            .unwrap();
        let facts = FactsClient::new(Arc::new(EdgarClient::new(config).unwrap()));

        let snapshot = facts.key_financials(Cik::new(1838359)).await.unwrap();
        assert_eq!(snapshot.capital_expenditures, Some(2_000_000.0));
        mock.assert();
    }

    #[tokio::test]
    async fn latest_point_comes_from_the_facts_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/xbrl/companyfacts/CIK0001838359.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(FACTS);
        });

        let config = ClientConfig::new("Test test@example.com")
            .with_min_request_interval(Duration::ZERO)
            .with_base_url(&server.base_url())
            .unwrap();
        let facts = FactsClient::new(Arc::new(EdgarClient::new(config).unwrap()));

        let latest = facts.latest_shares_outstanding(Cik::new(1838359)).await.unwrap().unwrap();
        assert_eq!(latest.value, 164_000_000);
        assert_eq!(latest.fiscal_period.as_deref(), Some("FY"));
        mock.assert();
    }
}
