// src/extractors/insider.rs
use roxmltree::{Document, Node};

use crate::aggregate::parse_filing_date;
use crate::edgar::filing::FilingReference;
use crate::extractors::xml::{parse_decimal, NsScope};
use crate::records::{InsiderReport, Issuer, ReportingOwner, TransactionCode, TransactionRecord, NOT_REPORTED};
use crate::utils::error::ExtractError;

const ROOT: &str = "ownershipDocument";
const AMOUNTS: &str = "transactionAmounts";

/// Reads a Form 4 `ownershipDocument`: issuer, every reporting owner, and
/// both the non-derivative and derivative transaction tables.
pub fn extract_insider(xml: &str, filing: &FilingReference) -> Result<InsiderReport, ExtractError> {
    let doc = Document::parse(xml)?;
    let scope = NsScope::of_root(&doc);
    let root = doc.root_element();

    if root.tag_name().name() != ROOT {
        return Err(ExtractError::Parse(format!(
            "expected <{}> root, found <{}>",
            ROOT,
            root.tag_name().name()
        )));
    }

    let issuer = Issuer {
        cik: text_or_missing(&scope, root, &["issuer", "issuerCik"]),
        name: text_or_missing(&scope, root, &["issuer", "issuerName"]),
        ticker: text_or_missing(&scope, root, &["issuer", "issuerTradingSymbol"]),
    };

    let owners: Vec<ReportingOwner> = scope
        .children(root, "reportingOwner")
        .map(|node| reporting_owner(&scope, node))
        .collect();

    let owner_name = if owners.is_empty() {
        NOT_REPORTED.to_string()
    } else {
        owners.iter().map(|o| o.name.as_str()).collect::<Vec<_>>().join("; ")
    };

    let base = RowContext {
        filing,
        issuer: &issuer,
        owner_name: &owner_name,
    };

    let mut transactions: Vec<TransactionRecord> = scope
        .descendants(root, "nonDerivativeTransaction")
        .map(|node| transaction(&scope, node, &base, false))
        .collect();
    transactions.extend(
        scope
            .descendants(root, "derivativeTransaction")
            .map(|node| transaction(&scope, node, &base, true)),
    );

    if transactions.is_empty() {
        return Err(ExtractError::NoRecords("transactions"));
    }

    tracing::debug!(
        "Extracted {} transactions for {} from {}",
        transactions.len(),
        issuer.ticker,
        filing.accession_number
    );

    Ok(InsiderReport {
        issuer,
        owners,
        transactions,
    })
}

struct RowContext<'a> {
    filing: &'a FilingReference,
    issuer: &'a Issuer,
    owner_name: &'a str,
}

fn text_or_missing(scope: &NsScope, node: Node, path: &[&str]) -> String {
    scope.text(node, path).unwrap_or_else(|| NOT_REPORTED.to_string())
}

/// Relationship flags are written as "1"/"0" or "true"/"false".
fn flag(scope: &NsScope, node: Node, path: &[&str]) -> bool {
    scope
        .text(node, path)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn number(scope: &NsScope, node: Node, path: &[&str]) -> Option<f64> {
    scope.text(node, path).and_then(|raw| parse_decimal(&raw))
}

/// XML dates may carry a timezone suffix ("2024-03-01-05:00").
fn date(scope: &NsScope, node: Node, path: &[&str]) -> Option<chrono::NaiveDate> {
    let raw = scope.text(node, path)?;
    parse_filing_date(raw.get(..10).unwrap_or(&raw))
}

fn reporting_owner(scope: &NsScope, node: Node) -> ReportingOwner {
    ReportingOwner {
        cik: text_or_missing(scope, node, &["reportingOwnerId", "rptOwnerCik"]),
        name: text_or_missing(scope, node, &["reportingOwnerId", "rptOwnerName"]),
        is_director: flag(scope, node, &["reportingOwnerRelationship", "isDirector"]),
        is_officer: flag(scope, node, &["reportingOwnerRelationship", "isOfficer"]),
        is_ten_percent_owner: flag(scope, node, &["reportingOwnerRelationship", "isTenPercentOwner"]),
        is_other: flag(scope, node, &["reportingOwnerRelationship", "isOther"]),
        officer_title: scope.text(node, &["reportingOwnerRelationship", "officerTitle"]),
    }
}

fn transaction(scope: &NsScope, node: Node, ctx: &RowContext, is_derivative: bool) -> TransactionRecord {
    let code = scope
        .text(node, &["transactionCoding", "transactionCode"])
        .map(|c| TransactionCode::from_code(&c))
        .unwrap_or(TransactionCode::Missing);

    let shares = number(scope, node, &[AMOUNTS, "transactionShares", "value"]);
    let price = number(scope, node, &[AMOUNTS, "transactionPricePerShare", "value"]);
    let acquired_disposed = text_or_missing(scope, node, &[AMOUNTS, "transactionAcquiredDisposedCode", "value"]);

    let (exercise_price, expiration_date, underlying_security_title, underlying_shares) = if is_derivative {
        (
            number(scope, node, &["conversionOrExercisePrice", "value"]),
            date(scope, node, &["expirationDate", "value"]),
            scope.text(node, &["underlyingSecurity", "underlyingSecurityTitle", "value"]),
            number(scope, node, &["underlyingSecurity", "underlyingSecurityShares", "value"]),
        )
    } else {
        (None, None, None, None)
    };

    TransactionRecord {
        accession_number: ctx.filing.accession_number.clone(),
        filing_date: ctx.filing.filing_date,
        issuer_cik: ctx.issuer.cik.clone(),
        issuer_ticker: ctx.issuer.ticker.clone(),
        owner_name: ctx.owner_name.to_string(),
        security_title: text_or_missing(scope, node, &["securityTitle", "value"]),
        transaction_date: date(scope, node, &["transactionDate", "value"]),
        transaction_code: code,
        shares,
        price_per_share: price,
        acquired_disposed_code: acquired_disposed,
        shares_owned_after: number(
            scope,
            node,
            &["postTransactionAmounts", "sharesOwnedFollowingTransaction", "value"],
        ),
        ownership_type: text_or_missing(scope, node, &["ownershipNature", "directOrIndirectOwnership", "value"]),
        is_derivative,
        exercise_price,
        expiration_date,
        underlying_security_title,
        underlying_shares,
    }
}
