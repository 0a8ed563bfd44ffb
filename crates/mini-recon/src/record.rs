use serde::ser::{Serialize, SerializeMap, Serializer};

/// Join key shared by both inputs.
pub const REFERENCE_FIELD: &str = "transaction_reference";
pub const AMOUNT_FIELD: &str = "amount";
pub const STATUS_FIELD: &str = "status";

pub const MATCHED_AMOUNT_FIELD: &str = "matched_amount";
pub const MATCHED_STATUS_FIELD: &str = "matched_status";
pub const PROVIDER_AMOUNT_FIELD: &str = "provider_amount";
pub const PROVIDER_STATUS_FIELD: &str = "provider_status";

pub type RecordCollection = Vec<Record>;

/// A single row: field names mapped to raw cell text, in column order.
///
/// The first insertion of a name fixes its position; inserting it again
/// replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The join key, or `None` when the row has no reference column.
    pub fn reference(&self) -> Option<&str> {
        self.get(REFERENCE_FIELD)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_position() {
        let mut record: Record = [("transaction_reference", "T1"), ("amount", "10")]
            .into_iter()
            .collect();
        record.insert("status", "settled");
        record.insert("transaction_reference", "T2");

        assert_eq!(
            record.keys().collect::<Vec<_>>(),
            ["transaction_reference", "amount", "status"]
        );
        assert_eq!(record.reference(), Some("T2"));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn missing_field_is_none() {
        let record: Record = [("amount", "10")].into_iter().collect();
        assert_eq!(record.reference(), None);
        assert_eq!(record.get("status"), None);
    }

    #[test]
    fn serializes_in_column_order() {
        let record: Record = [("b", "2"), ("a", "1")].into_iter().collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"b":"2","a":"1"}"#);
    }
}
