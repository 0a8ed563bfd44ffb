//! Reconciling an internal ledger against a provider statement by transaction reference.

mod matching;

use crate::Result;
use crate::codec::RecordCodec;
use crate::record::{
    MATCHED_AMOUNT_FIELD, MATCHED_STATUS_FIELD, PROVIDER_AMOUNT_FIELD, PROVIDER_STATUS_FIELD,
    Record, RecordCollection,
};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;

/// Shown instead of reconciling when either side has no records.
pub const MISSING_INPUT_MESSAGE: &str =
    "Please upload both Internal and Provider CSV files to reconcile.";

/// An internal record whose reference also appears in the provider statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRecord {
    pub record: Record,
    pub matched_amount: bool,
    pub matched_status: bool,
    pub provider_amount: Option<String>,
    pub provider_status: Option<String>,
}

impl MatchedRecord {
    /// Flatten into a plain record: the internal fields followed by the annotations.
    pub fn to_record(&self) -> Record {
        let mut record = self.record.clone();
        record.insert(MATCHED_AMOUNT_FIELD, self.matched_amount.to_string());
        record.insert(MATCHED_STATUS_FIELD, self.matched_status.to_string());
        record.insert(
            PROVIDER_AMOUNT_FIELD,
            self.provider_amount.clone().unwrap_or_default(),
        );
        record.insert(
            PROVIDER_STATUS_FIELD,
            self.provider_status.clone().unwrap_or_default(),
        );
        record
    }

    pub fn is_full_match(&self) -> bool {
        self.matched_amount && self.matched_status
    }
}

/// Same field order as [`MatchedRecord::to_record`], with the flags as booleans
/// and absent provider values as null.
impl Serialize for MatchedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let flattened = self.to_record();
        let mut map = serializer.serialize_map(Some(flattened.len()))?;
        for (key, value) in flattened.iter() {
            match key {
                MATCHED_AMOUNT_FIELD => map.serialize_entry(key, &self.matched_amount)?,
                MATCHED_STATUS_FIELD => map.serialize_entry(key, &self.matched_status)?,
                PROVIDER_AMOUNT_FIELD => map.serialize_entry(key, &self.provider_amount)?,
                PROVIDER_STATUS_FIELD => map.serialize_entry(key, &self.provider_status)?,
                _ => map.serialize_entry(key, value)?,
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Matched,
    OnlyInternal,
    OnlyProvider,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Matched, Bucket::OnlyInternal, Bucket::OnlyProvider];

    /// File name the bucket is exported under.
    pub fn filename(self) -> &'static str {
        match self {
            Bucket::Matched => "matched.csv",
            Bucket::OnlyInternal => "only_internal.csv",
            Bucket::OnlyProvider => "only_provider.csv",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub matched: Vec<MatchedRecord>,
    pub only_internal: Vec<Record>,
    pub only_provider: Vec<Record>,
}

impl ReconciliationResult {
    pub fn len(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::Matched => self.matched.len(),
            Bucket::OnlyInternal => self.only_internal.len(),
            Bucket::OnlyProvider => self.only_provider.len(),
        }
    }

    /// The bucket as plain records, ready to be serialized.
    pub fn records(&self, bucket: Bucket) -> RecordCollection {
        match bucket {
            Bucket::Matched => self.matched.iter().map(MatchedRecord::to_record).collect(),
            Bucket::OnlyInternal => self.only_internal.clone(),
            Bucket::OnlyProvider => self.only_provider.clone(),
        }
    }

    /// Every reference appears on both sides with identical amount and status.
    pub fn is_clean(&self) -> bool {
        self.only_internal.is_empty()
            && self.only_provider.is_empty()
            && self.matched.iter().all(MatchedRecord::is_full_match)
    }
}

pub struct ReconcileConfig {
    pub internal_path: PathBuf,
    pub provider_path: PathBuf,
}

impl ReconcileConfig {
    pub fn new(internal_path: impl Into<PathBuf>, provider_path: impl Into<PathBuf>) -> Self {
        ReconcileConfig {
            internal_path: internal_path.into(),
            provider_path: provider_path.into(),
        }
    }

    pub fn read(&self, codec: &impl RecordCodec) -> Result<ReconcileInputs> {
        Ok(ReconcileInputs {
            internal: crate::read_records(&self.internal_path, codec)?,
            provider: crate::read_records(&self.provider_path, codec)?,
        })
    }
}

#[derive(Debug, Default)]
pub struct ReconcileInputs {
    pub internal: RecordCollection,
    pub provider: RecordCollection,
}

impl ReconcileInputs {
    /// Reconcile both sides, refusing to run when either of them is empty.
    pub fn reconcile(&self) -> Result<ReconciliationResult> {
        if self.internal.is_empty() || self.provider.is_empty() {
            anyhow::bail!(MISSING_INPUT_MESSAGE);
        }
        Ok(reconcile(&self.internal, &self.provider))
    }
}

/// Records keyed by reference. A later row with the same reference replaces
/// the earlier one but keeps the position where the reference first appeared.
struct ReferenceIndex<'a> {
    positions: HashMap<Option<&'a str>, usize>,
    entries: Vec<(Option<&'a str>, &'a Record)>,
}

impl<'a> ReferenceIndex<'a> {
    fn build(records: &'a [Record]) -> Self {
        let mut index = ReferenceIndex {
            positions: HashMap::with_capacity(records.len()),
            entries: Vec::with_capacity(records.len()),
        };
        let mut replaced = 0;
        for record in records {
            let reference = record.reference();
            match index.positions.entry(reference) {
                Entry::Occupied(entry) => {
                    index.entries[*entry.get()].1 = record;
                    replaced += 1;
                }
                Entry::Vacant(entry) => {
                    entry.insert(index.entries.len());
                    index.entries.push((reference, record));
                }
            }
        }
        if replaced > 0 {
            tracing::debug!("{replaced} row(s) replaced by a later row with the same reference");
        }
        index
    }

    fn get(&self, reference: Option<&str>) -> Option<&'a Record> {
        self.positions
            .get(&reference)
            .map(|&position| self.entries[position].1)
    }

    fn contains(&self, reference: Option<&str>) -> bool {
        self.positions.contains_key(&reference)
    }
}

/// Partition both sides into matched, internal-only and provider-only records.
pub fn reconcile(internal: &[Record], provider: &[Record]) -> ReconciliationResult {
    let internal_index = ReferenceIndex::build(internal);
    let provider_index = ReferenceIndex::build(provider);

    let mut result = ReconciliationResult::default();

    for &(reference, internal_record) in &internal_index.entries {
        match provider_index.get(reference) {
            Some(provider_record) => result
                .matched
                .push(matching::annotate(internal_record, provider_record)),
            None => result.only_internal.push(internal_record.clone()),
        }
    }

    for &(reference, provider_record) in &provider_index.entries {
        if !internal_index.contains(reference) {
            result.only_provider.push(provider_record.clone());
        }
    }

    tracing::debug!(
        "reconciled {} internal and {} provider rows: {} matched, {} only internal, {} only provider",
        internal.len(),
        provider.len(),
        result.matched.len(),
        result.only_internal.len(),
        result.only_provider.len()
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CsvCodec, RecordCodec};

    fn parse_records(source: &str) -> RecordCollection {
        CsvCodec::default().parse(source.trim_start()).unwrap()
    }

    fn format_record(record: &Record) -> String {
        record
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn count_results(result: &ReconciliationResult) -> (usize, usize, usize) {
        (
            result.matched.len(),
            result.only_internal.len(),
            result.only_provider.len(),
        )
    }

    fn format_results(result: &ReconciliationResult) -> String {
        let mut output = String::new();
        for bucket in Bucket::ALL {
            for record in result.records(bucket) {
                output.push_str(&format!("; {bucket:?}\n"));
                output.push_str(&format_record(&record));
                output.push('\n');
            }
        }
        output
    }

    #[test]
    fn reconcile_all_match() {
        let internal = parse_records(
            r#"
transaction_reference,amount,status
T1,100,settled
T2,50,pending
"#,
        );
        let provider = parse_records(
            r#"
transaction_reference,amount,status
T2,50,pending
T1,100,settled
"#,
        );
        let result = reconcile(&internal, &provider);

        assert_eq!(count_results(&result), (2, 0, 0));
        assert!(result.is_clean());
        insta::assert_snapshot!(format_results(&result), @r"
        ; Matched
        transaction_reference=T1 amount=100 status=settled matched_amount=true matched_status=true provider_amount=100 provider_status=settled
        ; Matched
        transaction_reference=T2 amount=50 status=pending matched_amount=true matched_status=true provider_amount=50 provider_status=pending
        ");
    }

    #[test]
    fn reconcile_mixed_scenario() {
        let internal = parse_records(
            r#"
transaction_reference,amount,status,customer
T1,100,settled,alice
T2,50,pending,bob
T3,75,settled,carol
"#,
        );
        let provider = parse_records(
            r#"
transaction_reference,amount,status
T4,20,settled
T3,75.00,settled
T1,100,failed
"#,
        );
        let result = reconcile(&internal, &provider);

        assert_eq!(count_results(&result), (2, 1, 1));
        assert!(!result.is_clean());
        insta::assert_snapshot!(format_results(&result), @r"
        ; Matched
        transaction_reference=T1 amount=100 status=settled customer=alice matched_amount=true matched_status=false provider_amount=100 provider_status=failed
        ; Matched
        transaction_reference=T3 amount=75 status=settled customer=carol matched_amount=false matched_status=true provider_amount=75.00 provider_status=settled
        ; OnlyInternal
        transaction_reference=T2 amount=50 status=pending customer=bob
        ; OnlyProvider
        transaction_reference=T4 amount=20 status=settled
        ");
    }

    #[test]
    fn reconcile_disjoint_sets() {
        let internal = parse_records("transaction_reference,amount,status\nA,10,settled\n");
        let provider = parse_records("transaction_reference,amount,status\nB,20,pending\n");
        let result = reconcile(&internal, &provider);

        assert!(result.matched.is_empty());
        assert_eq!(result.only_internal, internal);
        assert_eq!(result.only_provider, provider);
    }

    #[test]
    fn reconcile_exact_mismatch_detection() {
        let internal = parse_records("transaction_reference,amount,status\nT1,100,settled\n");
        let provider = parse_records("transaction_reference,amount,status\nT1,100.00,settled\n");
        let result = reconcile(&internal, &provider);

        let matched = &result.matched[0];
        assert!(!matched.matched_amount);
        assert!(matched.matched_status);
        assert_eq!(matched.provider_amount.as_deref(), Some("100.00"));
    }

    #[test]
    fn reconcile_duplicate_reference_last_write_wins() {
        let internal = parse_records(
            r#"
transaction_reference,amount
X,1
X,2
"#,
        );
        let provider = parse_records("transaction_reference,amount,status\nX,2,ok\n");
        let result = reconcile(&internal, &provider);

        assert_eq!(count_results(&result), (1, 0, 0));
        assert_eq!(result.matched[0].record.get("amount"), Some("2"));
        assert!(result.matched[0].matched_amount);
    }

    #[test]
    fn reconcile_duplicate_reference_keeps_first_position() {
        let internal = parse_records(
            r#"
transaction_reference,amount
A,1
B,2
A,3
"#,
        );
        let provider = parse_records("transaction_reference,amount\nC,9\n");
        let result = reconcile(&internal, &provider);

        insta::assert_snapshot!(format_results(&result), @r"
        ; OnlyInternal
        transaction_reference=A amount=3
        ; OnlyInternal
        transaction_reference=B amount=2
        ; OnlyProvider
        transaction_reference=C amount=9
        ");
    }

    #[test]
    fn reconcile_missing_reference_matches_missing_reference() {
        let internal = parse_records("amount,status\n10,settled\n");
        let provider = parse_records("amount,status\n99,pending\n");
        let result = reconcile(&internal, &provider);

        assert_eq!(count_results(&result), (1, 0, 0));
        assert!(!result.matched[0].matched_amount);
    }

    #[test]
    fn reconcile_missing_reference_differs_from_empty_reference() {
        let internal = parse_records("amount,status\n10,settled\n");
        let provider = parse_records("transaction_reference,amount,status\n,10,settled\n");
        let result = reconcile(&internal, &provider);

        assert_eq!(count_results(&result), (0, 1, 1));
    }

    #[test]
    fn reconcile_missing_compared_fields_count_as_match() {
        let internal = parse_records("transaction_reference\nT1\n");
        let provider = parse_records("transaction_reference\nT1\n");
        let result = reconcile(&internal, &provider);

        assert!(result.matched[0].is_full_match());
        assert_eq!(result.matched[0].provider_amount, None);
    }

    #[test]
    fn reconcile_partition_is_complete() {
        let internal = parse_records(
            r#"
transaction_reference,amount,status
A,1,s
B,2,s
C,3,s
D,4,s
"#,
        );
        let provider = parse_records(
            r#"
transaction_reference,amount,status
C,3,s
E,5,s
A,9,s
F,6,s
"#,
        );
        let result = reconcile(&internal, &provider);

        assert_eq!(result.matched.len() + result.only_internal.len(), internal.len());
        assert_eq!(result.matched.len() + result.only_provider.len(), provider.len());

        for record in &internal {
            let in_matched = result.matched.iter().filter(|m| m.record == *record).count();
            let in_only = result.only_internal.iter().filter(|r| *r == record).count();
            assert_eq!(in_matched + in_only, 1);
        }
        for record in &provider {
            let in_matched = result
                .matched
                .iter()
                .filter(|m| m.record.reference() == record.reference())
                .count();
            let in_only = result.only_provider.iter().filter(|r| *r == record).count();
            assert_eq!(in_matched + in_only, 1);
        }
    }

    #[test]
    fn reconcile_is_deterministic() {
        let internal = parse_records("transaction_reference,amount\nA,1\nB,2\nC,3\n");
        let provider = parse_records("transaction_reference,amount\nC,3\nD,4\nA,1\n");

        assert_eq!(
            reconcile(&internal, &provider),
            reconcile(&internal, &provider)
        );
    }

    #[test]
    fn reconcile_empty_both() {
        let result = reconcile(&[], &[]);
        assert_eq!(count_results(&result), (0, 0, 0));
    }

    #[test]
    fn inputs_refuse_empty_side() {
        let inputs = ReconcileInputs {
            internal: parse_records("transaction_reference\nA\n"),
            provider: Vec::new(),
        };
        let error = inputs.reconcile().unwrap_err();
        assert_eq!(error.to_string(), MISSING_INPUT_MESSAGE);
    }

    #[test]
    fn matched_record_annotations_overwrite_in_place() {
        let internal = parse_records("matched_amount,transaction_reference,amount\nstale,T1,5\n");
        let provider = parse_records("transaction_reference,amount\nT1,5\n");
        let result = reconcile(&internal, &provider);

        let record = result.matched[0].to_record();
        assert_eq!(
            format_record(&record),
            "matched_amount=true transaction_reference=T1 amount=5 matched_status=true provider_amount=5 provider_status="
        );
    }

    #[test]
    fn matched_record_serializes_flags_as_booleans() {
        let internal = parse_records("transaction_reference,amount,status\nT1,5,ok\n");
        let provider = parse_records("transaction_reference,amount\nT1,6\n");
        let result = reconcile(&internal, &provider);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "matched": [{
                    "transaction_reference": "T1",
                    "amount": "5",
                    "status": "ok",
                    "matched_amount": false,
                    "matched_status": false,
                    "provider_amount": "6",
                    "provider_status": null
                }],
                "onlyInternal": [],
                "onlyProvider": []
            })
        );
    }

    #[test]
    fn annotation_named_columns_keep_their_position() {
        let internal =
            parse_records("matched_amount,transaction_reference,amount\nyes,T1,5\n");
        let provider = parse_records("transaction_reference,amount\nT1,5\n");
        let result = reconcile(&internal, &provider);

        let json = serde_json::to_string(&result.matched[0]).unwrap();
        assert_eq!(
            json,
            r#"{"matched_amount":true,"transaction_reference":"T1","amount":"5","matched_status":true,"provider_amount":"5","provider_status":null}"#
        );

        let flattened = result.matched[0].to_record();
        assert_eq!(
            flattened.keys().collect::<Vec<_>>(),
            [
                "matched_amount",
                "transaction_reference",
                "amount",
                "matched_status",
                "provider_amount",
                "provider_status"
            ]
        );
    }

    #[test]
    fn exported_buckets_round_trip() {
        let internal = parse_records("transaction_reference,amount,status\nT1,5,ok\nT2,7,ok\n");
        let provider = parse_records("transaction_reference,amount,status\nT1,5.0,ok\nT3,1,ok\n");
        let result = reconcile(&internal, &provider);
        let codec = CsvCodec::default();

        for bucket in Bucket::ALL {
            let records = result.records(bucket);
            let text = codec.serialize(&records).unwrap();
            assert_eq!(codec.parse(&text).unwrap(), records, "{bucket:?}");
        }
        assert_eq!(
            result.records(Bucket::Matched)[0].get("matched_amount"),
            Some("false")
        );
    }
}
