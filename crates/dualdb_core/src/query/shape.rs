//! Select-list classification.

use crate::schema::EntitySchema;

/// Which kinds of fields an explicit select list names.
///
/// "Id" is the identity field, or the hash field of a composite key.
/// Backends use the shape to decide which key fields must be rebuilt from
/// the record locator and whether the key can share a select clause with
/// ordinary attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectShape {
    /// Empty select list: every field.
    All,
    /// Only the id.
    IdOnly,
    /// Only the range key.
    RangeOnly,
    /// Only non-key fields.
    OthersOnly,
    /// The id and the range key.
    IdAndRange,
    /// The id and non-key fields.
    IdAndOthers,
    /// The range key and non-key fields.
    RangeAndOthers,
    /// The id, the range key and non-key fields.
    IdRangeAndOthers,
}

impl SelectShape {
    /// Classifies a select list.
    pub fn classify(schema: &EntitySchema, selected: &[String]) -> Self {
        if selected.is_empty() {
            return Self::All;
        }

        let id = schema.id_field().name();
        let range = schema.range_field().map(|f| f.name());
        let has_id = selected.iter().any(|s| s == id);
        let has_range = range.is_some_and(|r| selected.iter().any(|s| s == r));
        let has_others = selected
            .iter()
            .any(|s| s != id && Some(s.as_str()) != range);

        match (has_id, has_range, has_others) {
            (true, false, false) => Self::IdOnly,
            (false, true, false) => Self::RangeOnly,
            (false, false, true) => Self::OthersOnly,
            (true, true, false) => Self::IdAndRange,
            (true, false, true) => Self::IdAndOthers,
            (false, true, true) => Self::RangeAndOthers,
            (true, true, true) => Self::IdRangeAndOthers,
            (false, false, false) => Self::All,
        }
    }

    /// Returns true if the id is part of the result.
    pub fn includes_id(self) -> bool {
        matches!(
            self,
            Self::All
                | Self::IdOnly
                | Self::IdAndRange
                | Self::IdAndOthers
                | Self::IdRangeAndOthers
        )
    }

    /// Returns true if the range key is part of the result.
    pub fn includes_range(self) -> bool {
        matches!(
            self,
            Self::All
                | Self::RangeOnly
                | Self::IdAndRange
                | Self::RangeAndOthers
                | Self::IdRangeAndOthers
        )
    }

    /// Returns true if non-key fields are part of the result.
    pub fn includes_others(self) -> bool {
        matches!(
            self,
            Self::All
                | Self::OthersOnly
                | Self::IdAndOthers
                | Self::RangeAndOthers
                | Self::IdRangeAndOthers
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualdb_codec::FieldType;

    fn schema() -> EntitySchema {
        EntitySchema::builder("item")
            .hash_key("id", FieldType::Long)
            .range_key("name", FieldType::String)
            .field("price", FieldType::Double)
            .field("stock", FieldType::Int)
            .build()
            .unwrap()
    }

    fn classify(fields: &[&str]) -> SelectShape {
        let selected: Vec<String> = fields.iter().map(|s| s.to_string()).collect();
        SelectShape::classify(&schema(), &selected)
    }

    #[test]
    fn every_category_is_reachable() {
        assert_eq!(classify(&[]), SelectShape::All);
        assert_eq!(classify(&["id"]), SelectShape::IdOnly);
        assert_eq!(classify(&["name"]), SelectShape::RangeOnly);
        assert_eq!(classify(&["price", "stock"]), SelectShape::OthersOnly);
        assert_eq!(classify(&["name", "id"]), SelectShape::IdAndRange);
        assert_eq!(classify(&["id", "price"]), SelectShape::IdAndOthers);
        assert_eq!(classify(&["name", "stock"]), SelectShape::RangeAndOthers);
        assert_eq!(
            classify(&["stock", "name", "id"]),
            SelectShape::IdRangeAndOthers
        );
    }

    #[test]
    fn identity_schemas_never_select_a_range() {
        let schema = EntitySchema::builder("person")
            .identity("name", FieldType::String)
            .field("age", FieldType::Int)
            .build()
            .unwrap();
        let shape = SelectShape::classify(&schema, &["name".to_string(), "age".to_string()]);
        assert_eq!(shape, SelectShape::IdAndOthers);
        assert!(!shape.includes_range());
    }

    #[test]
    fn inclusion_flags() {
        assert!(SelectShape::All.includes_id());
        assert!(SelectShape::All.includes_others());
        assert!(!SelectShape::OthersOnly.includes_id());
        assert!(SelectShape::RangeAndOthers.includes_range());
        assert!(!SelectShape::IdAndRange.includes_others());
    }
}
