//! Filter, sort, and pagination descriptors for `/search` endpoints.
//!
//! Filter and sort descriptors travel as base64-encoded JSON in a single
//! query-string value each. The URL-safe alphabet without padding is used,
//! so an encoded descriptor only contains `[A-Za-z0-9_-]` and never needs
//! escaping. Empty descriptors are omitted from the request entirely so the
//! server falls back to its own default ordering and no filtering.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

// ── Filter descriptor ────────────────────────────────────────────────

/// Comparison applied by a single filter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterMode {
    Equal,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    In,
}

/// How the server should interpret the filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterDataType {
    Text,
    Number,
    Date,
    Boolean,
    Enum,
}

/// A predicate on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterField {
    pub mode: FilterMode,
    pub data_type: FilterDataType,
    pub value: serde_json::Value,
}

impl FilterField {
    pub fn new(mode: FilterMode, data_type: FilterDataType, value: impl Into<serde_json::Value>) -> Self {
        Self {
            mode,
            data_type,
            value: value.into(),
        }
    }
}

/// Field name -> predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterDescriptor(BTreeMap<String, FilterField>);

impl FilterDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, predicate: FilterField) -> Self {
        self.0.insert(field.into(), predicate);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, predicate: FilterField) -> Option<FilterField> {
        self.0.insert(field.into(), predicate)
    }

    pub fn remove(&mut self, field: &str) -> Option<FilterField> {
        self.0.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&FilterField> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterField)> {
        self.0.iter()
    }

    pub fn encode(&self) -> Result<String, Error> {
        encode_descriptor(self)
    }

    pub fn decode(encoded: &str) -> Result<Self, Error> {
        decode_descriptor(encoded)
    }
}

// ── Sort descriptor ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordered list of sort keys; earlier entries take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortDescriptor(Vec<SortField>);

impl SortDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Asc)
    }

    pub fn desc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Desc)
    }

    /// Append a sort key. A field that is already present is moved to the end.
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let field = field.into();
        self.0.retain(|s| s.field != field);
        self.0.push(SortField { field, direction });
        self
    }

    pub fn fields(&self) -> &[SortField] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self) -> Result<String, Error> {
        encode_descriptor(self)
    }

    pub fn decode(encoded: &str) -> Result<Self, Error> {
        decode_descriptor(encoded)
    }
}

// ── Encoding ─────────────────────────────────────────────────────────

/// Serialize to JSON, then URL-safe base64 without padding.
pub fn encode_descriptor<T: Serialize + ?Sized>(descriptor: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(descriptor).map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Reverse of [`encode_descriptor`]. Trailing `=` padding is tolerated.
pub fn decode_descriptor<T: DeserializeOwned>(encoded: &str) -> Result<T, Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| Error::Encoding(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Encoding(format!("invalid JSON: {e}")))
}

// ── Page query ───────────────────────────────────────────────────────

/// Everything a `/search` request carries. Also used as a cache-key
/// parameter, so it is `Serialize` and compared structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// 0-based.
    pub page_index: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortDescriptor>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            filter: None,
            sort: None,
        }
    }
}

impl PageQuery {
    pub fn page(page_index: u32, page_size: u32) -> Self {
        Self {
            page_index,
            page_size,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: FilterDescriptor) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortDescriptor) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Query-string pairs. Empty filter/sort descriptors are left out.
    pub fn to_params(&self) -> Result<Vec<(&'static str, String)>, Error> {
        let mut params = vec![
            ("pageIndex", self.page_index.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            params.push(("filter", filter.encode()?));
        }
        if let Some(sort) = self.sort.as_ref().filter(|s| !s.is_empty()) {
            params.push(("sort", sort.encode()?));
        }
        Ok(params)
    }
}

// ── Paginated result ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page_index: u32,
    pub page_size: u32,
}

/// Envelope returned by `/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pages: Vec<PageInfo>,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub total_page: u64,
    #[serde(default)]
    pub page_index: u32,
    #[serde(default)]
    pub page_size: u32,
}

impl<T> Paginated<T> {
    /// The safe shape rendered before the first fetch resolves.
    pub fn empty(page_index: u32, page_size: u32) -> Self {
        Self {
            data: Vec::new(),
            pages: Vec::new(),
            total_size: 0,
            total_page: 0,
            page_index,
            page_size,
        }
    }

    /// `ceil(total_size / page_size)`, 0 for a zero page size.
    pub fn page_count(total_size: u64, page_size: u32) -> u64 {
        if page_size == 0 {
            return 0;
        }
        total_size.div_ceil(u64::from(page_size))
    }

    /// Whether the envelope satisfies its size invariants.
    pub fn is_consistent(&self) -> bool {
        let within_page = u64::try_from(self.data.len()).unwrap_or(u64::MAX) <= u64::from(self.page_size);
        within_page && self.total_page == Self::page_count(self.total_size, self.page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample_filter() -> FilterDescriptor {
        FilterDescriptor::new()
            .with(
                "name",
                FilterField::new(FilterMode::Contains, FilterDataType::Text, "Nouvel An 🎉 新年"),
            )
            .with(
                "entry_date",
                FilterField::new(
                    FilterMode::Between,
                    FilterDataType::Date,
                    json!(["2025-01-01", "2025-12-31"]),
                ),
            )
            .with(
                "account",
                FilterField::new(
                    FilterMode::In,
                    FilterDataType::Enum,
                    json!({ "ids": ["a", "b"], "nested": { "deep": [1, 2.5, null, true] } }),
                ),
            )
    }

    #[test]
    fn filter_round_trips_nested_and_unicode_values() {
        let filter = sample_filter();
        let encoded = filter.encode().unwrap();
        assert_eq!(FilterDescriptor::decode(&encoded).unwrap(), filter);
    }

    #[test]
    fn encoded_value_has_no_query_delimiters() {
        let encoded = sample_filter().encode().unwrap();
        assert!(
            encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "unexpected character in {encoded}"
        );
    }

    #[test]
    fn filter_wire_shape_is_camel_case() {
        let filter = FilterDescriptor::new().with(
            "amount",
            FilterField::new(FilterMode::Gte, FilterDataType::Number, 100),
        );
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            value,
            json!({ "amount": { "mode": "gte", "dataType": "number", "value": 100 } })
        );
    }

    #[test]
    fn sort_round_trips_and_keeps_order() {
        let sort = SortDescriptor::new().desc("entry_date").asc("name");
        let decoded = SortDescriptor::decode(&sort.encode().unwrap()).unwrap();
        assert_eq!(decoded, sort);
        assert_eq!(decoded.fields()[0].field, "entry_date");
    }

    #[test]
    fn sort_then_moves_existing_field_to_end() {
        let sort = SortDescriptor::new().asc("name").asc("code").desc("name");
        let fields: Vec<_> = sort.fields().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["code", "name"]);
        assert_eq!(sort.fields()[1].direction, SortDirection::Desc);
    }

    #[test]
    fn decode_tolerates_padding_and_rejects_garbage() {
        let sort = SortDescriptor::new().asc("name");
        let padded = format!("{}==", sort.encode().unwrap());
        assert_eq!(SortDescriptor::decode(&padded).unwrap(), sort);
        assert!(matches!(
            SortDescriptor::decode("%%%"),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn empty_descriptors_are_omitted_from_params() {
        let query = PageQuery::page(2, 25)
            .with_filter(FilterDescriptor::new())
            .with_sort(SortDescriptor::new());
        let params = query.to_params().unwrap();
        assert_eq!(
            params,
            vec![("pageIndex", "2".to_owned()), ("pageSize", "25".to_owned())]
        );
    }

    #[test]
    fn non_empty_descriptors_are_encoded_into_params() {
        let filter = sample_filter();
        let query = PageQuery::default().with_filter(filter.clone());
        let params = query.to_params().unwrap();
        let (_, encoded) = params.iter().find(|(k, _)| *k == "filter").unwrap();
        assert_eq!(FilterDescriptor::decode(encoded).unwrap(), filter);
        assert!(!params.iter().any(|(k, _)| *k == "sort"));
    }

    #[test]
    fn paginated_page_count_rounds_up() {
        assert_eq!(Paginated::<()>::page_count(0, 10), 0);
        assert_eq!(Paginated::<()>::page_count(10, 10), 1);
        assert_eq!(Paginated::<()>::page_count(11, 10), 2);
        assert_eq!(Paginated::<()>::page_count(5, 0), 0);
    }

    #[test]
    fn paginated_deserializes_sparse_envelope() {
        let page: Paginated<serde_json::Value> =
            serde_json::from_value(json!({ "data": [], "totalSize": 0 })).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_page, 0);
        assert!(page.pages.is_empty());
    }

    #[test]
    fn paginated_consistency_checks_invariants() {
        let mut page = Paginated {
            data: vec![1, 2, 3],
            pages: Vec::new(),
            total_size: 23,
            total_page: 3,
            page_index: 0,
            page_size: 10,
        };
        assert!(page.is_consistent());
        page.total_page = 2;
        assert!(!page.is_consistent());
    }
}
