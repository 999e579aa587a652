use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// MetadataValue – a single cell of a non-text column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a CSV reader would infer.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use MetadataValue::*;
        fn rank(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Text form used for id lookups and token parsing; `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            MetadataValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// ReportRecord – one row of the report dataset
// ---------------------------------------------------------------------------

/// A single X-ray report: free text, the image it describes, and any
/// remaining columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    pub text: String,
    /// Image location. Raw column value after loading, an existing file
    /// after [`resolve_image_paths`](super::loader::resolve_image_paths).
    pub image_path: Option<PathBuf>,
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl ReportRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_path: None,
            metadata: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReportDataset – the loaded table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDataset {
    pub records: Vec<ReportRecord>,
    /// Metadata column names in file order (excludes text and path columns).
    pub column_names: Vec<String>,
}

impl ReportDataset {
    pub fn from_records(records: Vec<ReportRecord>, column_names: Vec<String>) -> Self {
        Self {
            records,
            column_names,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// New dataset holding the rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> ReportDataset {
        ReportDataset {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            column_names: self.column_names.clone(),
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.text.as_str())
    }

    pub fn image_paths(&self) -> impl Iterator<Item = &Path> {
        self.records.iter().filter_map(|r| r.image_path.as_deref())
    }

    /// Text of a metadata column for one row.
    pub fn field_text(&self, row: usize, column: &str) -> Option<String> {
        self.records
            .get(row)?
            .metadata
            .get(column)
            .and_then(MetadataValue::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> ReportDataset {
        let records = (0..4)
            .map(|i| {
                let mut r = ReportRecord::new(format!("report {i}"));
                r.metadata.insert("id".into(), MetadataValue::Integer(i));
                r
            })
            .collect();
        ReportDataset::from_records(records, vec!["id".into()])
    }

    #[test]
    fn select_keeps_requested_order() {
        let ds = dataset();
        let sub = ds.select(&[3, 0]);
        let texts: Vec<&str> = sub.texts().collect();
        assert_eq!(texts, ["report 3", "report 0"]);
        assert_eq!(sub.column_names, ds.column_names);
    }

    #[test]
    fn field_text_skips_nulls() {
        let mut ds = dataset();
        ds.records[1]
            .metadata
            .insert("id".into(), MetadataValue::Null);
        assert_eq!(ds.field_text(0, "id").as_deref(), Some("0"));
        assert_eq!(ds.field_text(1, "id"), None);
        assert_eq!(ds.field_text(9, "id"), None);
    }

    #[test]
    fn values_of_different_kinds_order_by_kind() {
        let mut values = vec![
            MetadataValue::String("a".into()),
            MetadataValue::Integer(3),
            MetadataValue::Null,
            MetadataValue::Float(0.5),
            MetadataValue::Bool(true),
        ];
        values.sort();
        assert_eq!(values[0], MetadataValue::Null);
        assert_eq!(values[4], MetadataValue::String("a".into()));
    }
}
