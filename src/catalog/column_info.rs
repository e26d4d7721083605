//! Column information and metadata structures.

use crate::types::{Decimals, FieldType};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub column_name: String,
    pub column_type: FieldType,
    /// Display length; defaults to the width of `column_type`
    pub max_length: u32,
    pub decimals: Decimals,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(column_name: impl Into<String>, column_type: FieldType) -> Self {
        Self {
            column_name: column_name.into(),
            column_type,
            max_length: column_type.default_length(),
            decimals: column_type.default_decimals(),
            nullable: true,
        }
    }

    pub fn with_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    /// A fixed scale of `NOT_FIXED_DEC` or more is stored as `NotFixed`
    pub fn with_decimals(mut self, decimals: Decimals) -> Self {
        self.decimals = Decimals::from_raw(decimals.as_raw());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_defaults() {
        let col = ColumnInfo::new("price", FieldType::NewDecimal);
        assert_eq!(col.max_length, 11);
        assert_eq!(col.decimals, Decimals::Fixed(0));
        assert!(col.nullable);

        let col = ColumnInfo::new("ratio", FieldType::Double)
            .with_length(10)
            .not_null();
        assert_eq!(col.max_length, 10);
        assert_eq!(col.decimals, Decimals::NotFixed);
        assert!(!col.nullable);
    }

    #[test]
    fn test_with_decimals_normalises_scale() {
        let col = ColumnInfo::new("amount", FieldType::NewDecimal).with_decimals(Decimals::Fixed(2));
        assert_eq!(col.decimals, Decimals::Fixed(2));

        let col = ColumnInfo::new("amount", FieldType::NewDecimal).with_decimals(Decimals::Fixed(30));
        assert_eq!(col.decimals, Decimals::Fixed(30));

        for raw in [31, 40] {
            let col =
                ColumnInfo::new("ratio", FieldType::Double).with_decimals(Decimals::Fixed(raw));
            assert_eq!(col.decimals, Decimals::NotFixed);
            assert!(!col.decimals.is_fixed());
        }
    }
}
