use super::MatchedRecord;
use crate::record::{AMOUNT_FIELD, Record, STATUS_FIELD};

/// Exact comparison of the raw cell text. No trimming, case folding or
/// numeric parsing: `"100"` and `"100.00"` differ.
///
/// A field missing on both sides counts as equal.
fn field_matches(internal: &Record, provider: &Record, field: &str) -> bool {
    internal.get(field) == provider.get(field)
}

pub fn annotate(internal: &Record, provider: &Record) -> MatchedRecord {
    MatchedRecord {
        record: internal.clone(),
        matched_amount: field_matches(internal, provider, AMOUNT_FIELD),
        matched_status: field_matches(internal, provider, STATUS_FIELD),
        provider_amount: provider.get(AMOUNT_FIELD).map(ToOwned::to_owned),
        provider_status: provider.get(STATUS_FIELD).map(ToOwned::to_owned),
    }
}
