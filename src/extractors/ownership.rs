// src/extractors/ownership.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::edgar::filing::FilingReference;
use crate::extractors::strategy::{self, Confidence, FieldMatch, FieldRule, Strategy};
use crate::extractors::text::document_text;
use crate::records::OwnershipRecord;

// Cover pages repeat a "CUSIP No. <id>" banner; the id may sit on the next line.
static BANNER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"CUSIP(?:\s*(?:NO\.?|NUMBER|#))?\s*[:.]?\s*[0-9A-Z]{0,8}\d[0-9A-Z]*")
        .expect("Failed to compile BANNER_RE")
});

static NAME_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"NAMES?\s+OF\s+REPORTING\s+PERSONS?").expect("Failed to compile NAME_LABEL_RE"));

const NAME_SCAN_LINES: usize = 3;

// Patterns run against upper-cased text. A gap without letters between label
// and number keeps "SEE ITEM 4" style notes from being read as values.
const NUMBER: &str = r"(\d+(?:\.\d+)?)";
const COUNT: &str = r"(\d[\d,]*)";
const GAP: &str = r"[^0-9A-Z]{0,40}?";

static PERCENT_RULE: Lazy<FieldRule<f64>> = Lazy::new(|| {
    let row = r"PERCENT(?:AGE)?\s+OF\s+CLASS\s+REPRESENTED\s+BY\s+AMOUNT\s+IN\s+ROW\s*\(?\s*\d{1,2}\s*\)?";
    FieldRule::new(
        "ownership_percent",
        vec![
            Strategy::new(
                "item_row_reference",
                Confidence::Anchored,
                &format!(r"\(?1[13]\)?[.:]?\s*{row}{GAP}{NUMBER}"),
            ),
            Strategy::new("row_reference", Confidence::Labelled, &format!(r"{row}{GAP}{NUMBER}")),
            Strategy::new(
                "percent_of_class",
                Confidence::Labelled,
                &format!(r"PERCENT(?:AGE)?\s+OF\s+CLASS[^:\n]{{0,40}}:\s*{NUMBER}"),
            ),
            Strategy::new(
                "percent_near_label",
                Confidence::Labelled,
                &format!(r"(?s)PERCENT(?:AGE)?\s+OF\s+CLASS.{{0,200}}?{NUMBER}\s*%"),
            ),
            Strategy::new(
                "trailing_number",
                Confidence::Fallback,
                &format!(r"{NUMBER}\s*%?\s*(?:\(\d\))?\s*$"),
            ),
        ],
        strategy::percent,
    )
});

static SHARES_RULE: Lazy<FieldRule<u64>> = Lazy::new(|| {
    let aggregate = r"AGGREGATE\s+AMOUNT\s+BENEFICIALLY\s+OWNED";
    FieldRule::new(
        "shares_owned",
        vec![
            Strategy::new(
                "item_aggregate_amount",
                Confidence::Anchored,
                &format!(r"\(?(?:9|11)\)?[.:]?\s*{aggregate}\s+BY\s+EACH\s+REPORTING\s+PERSON{GAP}{COUNT}"),
            ),
            Strategy::new(
                "amount_owned",
                Confidence::Labelled,
                &format!(r"AMOUNT\s+BENEFICIALLY\s+OWNED\s*:\s*{COUNT}"),
            ),
            Strategy::new(
                "aggregate_amount",
                Confidence::Labelled,
                &format!(r"{aggregate}(?:\s+BY\s+EACH\s+REPORTING\s+PERSON)?{GAP}{COUNT}"),
            ),
            Strategy::new(
                "trailing_number",
                Confidence::Fallback,
                r"(\d{1,3}(?:,\d{3})+|\d+)\s*(?:\(\d\))?\s*$",
            ),
        ],
        strategy::share_count,
    )
});

static SOURCE_RULE: Lazy<FieldRule<String>> = Lazy::new(|| {
    FieldRule::new(
        "source_of_funds",
        vec![
            Strategy::new(
                "item_source",
                Confidence::Anchored,
                r"\(?4\)?[.:]?\s*SOURCE\s+OF\s+FUNDS[^\n]*\n\s*([A-Z]{2})\b",
            ),
            Strategy::new(
                "source_label",
                Confidence::Labelled,
                r"(?s)SOURCE\s+OF\s+FUNDS.{0,200}?\b(BK|AF|WC|PF|OO|SC)\b",
            ),
        ],
        strategy::fund_source,
    )
});

fn voting_rule(field: &'static str, kind: &str, items: &str) -> FieldRule<u64> {
    let label = format!(r"{kind}\s+VOTING\s+POWER");
    FieldRule::new(
        field,
        vec![
            Strategy::new(
                "item_voting_power",
                Confidence::Anchored,
                &format!(r"\(?(?:{items})\)?[.:]?\s*{label}{GAP}{COUNT}"),
            ),
            Strategy::new("voting_power_label", Confidence::Labelled, &format!(r"{label}{GAP}{COUNT}")),
        ],
        strategy::share_count,
    )
}

static SOLE_VOTING_RULE: Lazy<FieldRule<u64>> = Lazy::new(|| voting_rule("sole_voting_power", "SOLE", "5|7"));
static SHARED_VOTING_RULE: Lazy<FieldRule<u64>> = Lazy::new(|| voting_rule("shared_voting_power", "SHARED", "6|8"));

/// Field values resolved from one cover-page segment.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverFields {
    pub percent: Option<FieldMatch<f64>>,
    pub shares: Option<FieldMatch<u64>>,
    pub source_of_funds: Option<FieldMatch<String>>,
    pub sole_voting_power: Option<FieldMatch<u64>>,
    pub shared_voting_power: Option<FieldMatch<u64>>,
}

impl CoverFields {
    /// Names of the fields only the fallback strategy could resolve.
    pub fn review_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        let mut check = |field: &str, confidence: Option<Confidence>| {
            if confidence == Some(Confidence::Fallback) {
                flags.push(field.to_string());
            }
        };
        check(PERCENT_RULE.field, self.percent.as_ref().map(|m| m.confidence));
        check(SHARES_RULE.field, self.shares.as_ref().map(|m| m.confidence));
        check(SOURCE_RULE.field, self.source_of_funds.as_ref().map(|m| m.confidence));
        check(SOLE_VOTING_RULE.field, self.sole_voting_power.as_ref().map(|m| m.confidence));
        check(SHARED_VOTING_RULE.field, self.shared_voting_power.as_ref().map(|m| m.confidence));
        flags
    }
}

/// What the extractor needs to know about the filing a document came from.
pub struct OwnershipContext<'a> {
    pub filing: &'a FilingReference,
    pub subject_ticker: &'a str,
    pub document_url: &'a str,
}

/// Heuristic reader for Schedule 13D / 13G cover pages.
///
/// The document is flattened to upper-cased text, split at each CUSIP banner,
/// and every segment that names a reporting person and carries a percent or a
/// share count becomes one [`OwnershipRecord`]. Extraction is pure: the same
/// document always yields the same records.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoverPageExtractor;

impl CoverPageExtractor {
    pub fn new() -> Self {
        CoverPageExtractor
    }

    pub fn extract(&self, content: &str, ctx: &OwnershipContext) -> Vec<OwnershipRecord> {
        let text = document_text(content).to_uppercase();
        let mut records = Vec::new();

        for segment in split_cover_pages(&text) {
            let Some(investor_name) = reporting_person(segment) else {
                continue;
            };
            let fields = self.fields(segment);
            if fields.percent.is_none() && fields.shares.is_none() {
                tracing::debug!("No percent or share count for '{}', skipping segment", investor_name);
                continue;
            }

            let review_flags = fields.review_flags();
            if !review_flags.is_empty() {
                tracing::info!(
                    "{} in {}: low-confidence fields {:?}",
                    investor_name,
                    ctx.filing.accession_number,
                    review_flags
                );
            }

            records.push(OwnershipRecord {
                investor_name,
                subject_ticker: ctx.subject_ticker.to_string(),
                form_type: ctx.filing.form_type.clone(),
                filing_date: ctx.filing.filing_date,
                accession_number: ctx.filing.accession_number.clone(),
                source_of_funds: fields.source_of_funds.map(|m| m.value),
                ownership_percent: fields.percent.map(|m| m.value),
                shares_owned: fields.shares.map(|m| m.value),
                sole_voting_power: fields.sole_voting_power.map(|m| m.value),
                shared_voting_power: fields.shared_voting_power.map(|m| m.value),
                document_url: ctx.document_url.to_string(),
                review_flags,
            });
        }

        records
    }

    /// Resolves every field of one (upper-cased) segment.
    pub fn fields(&self, segment: &str) -> CoverFields {
        CoverFields {
            percent: PERCENT_RULE.resolve(segment),
            shares: SHARES_RULE.resolve(segment),
            source_of_funds: SOURCE_RULE.resolve(segment),
            sole_voting_power: SOLE_VOTING_RULE.resolve(segment),
            shared_voting_power: SHARED_VOTING_RULE.resolve(segment),
        }
    }
}

/// Splits flattened text at each CUSIP banner. Text before the first banner
/// is kept as its own segment; segments without a reporting person are
/// discarded later.
pub fn split_cover_pages(text: &str) -> Vec<&str> {
    BANNER_RE.split(text).filter(|s| !s.trim().is_empty()).collect()
}

// Start of the next numbered cover item, e.g. "(2)", "2." or "(12) TYPE".
static ITEM_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(?\d{1,2}\)?(?:[.\s]|$)").expect("Failed to compile ITEM_MARKER_RE"));

const COVER_LABELS: &[&str] = &[
    "CHECK THE APPROPRIATE BOX",
    "SEC USE ONLY",
    "CITIZENSHIP",
    "PLACE OF ORGANIZATION",
    "SOURCE OF FUNDS",
    "VOTING POWER",
    "DISPOSITIVE POWER",
    "AGGREGATE AMOUNT",
];

/// Reporting person named by a cover page.
///
/// The text after the label on the same line is the name. Only when the label
/// line carries nothing else are the next few lines scanned, stopping at the
/// next numbered item.
pub fn reporting_person(segment: &str) -> Option<String> {
    let label = NAME_LABEL_RE.find(segment)?;
    let rest = &segment[label.end()..];
    let (same_line, following) = rest.split_once('\n').unwrap_or((rest, ""));

    let inline = same_line
        .trim()
        .trim_start_matches("(S)")
        .trim_start_matches([':', '.', '-'])
        .trim();
    if !inline.is_empty() && !is_identification_line(inline) {
        return accept_name(inline);
    }

    following
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !is_identification_line(line))
        .take_while(|line| !is_cover_label(line))
        .take(NAME_SCAN_LINES)
        .find_map(accept_name)
}

fn is_identification_line(line: &str) -> bool {
    line.starts_with("I.R.S.")
        || line.starts_with("S.S. OR I.R.S.")
        || line.contains("IDENTIFICATION NO")
        || line.contains("(ENTITIES ONLY)")
}

fn is_cover_label(line: &str) -> bool {
    ITEM_MARKER_RE.is_match(line)
        || NAME_LABEL_RE.is_match(line)
        || COVER_LABELS.iter().any(|label| line.contains(label))
}

fn accept_name(candidate: &str) -> Option<String> {
    let name = candidate.trim().trim_end_matches(['.', ',']).trim();
    let starts_alphanumeric = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    if name.chars().count() < 3 || !starts_alphanumeric || is_cover_label(name) {
        return None;
    }
    Some(name.to_string())
}
