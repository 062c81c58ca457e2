//! Header matching between the original and uploaded sheets.

use std::collections::HashMap;

/// Original field name → position of that field in the uploaded header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldIndexMap {
    positions: HashMap<String, usize>,
}

impl FieldIndexMap {
    pub fn get(&self, field: &str) -> Option<usize> {
        self.positions.get(field).copied()
    }

    /// Uploaded position for each original column, in original order.
    /// `None` if any field has no entry.
    pub fn project(&self, original_fields: &[String]) -> Option<Vec<usize>> {
        original_fields.iter().map(|field| self.get(field)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOutcome {
    Matched(FieldIndexMap),
    /// Positions, within the original header, of fields the uploaded header lacks.
    Mismatch { missing_columns: Vec<usize> },
}

/// Checks that every original field occurs in the uploaded header.
///
/// Uploaded columns the original does not name are ignored. When the uploaded
/// header repeats a name, the first occurrence is used.
pub fn match_fields(original_fields: &[String], uploaded_fields: &[String]) -> SchemaOutcome {
    let mut uploaded_positions: HashMap<&str, usize> = HashMap::with_capacity(uploaded_fields.len());
    for (idx, field) in uploaded_fields.iter().enumerate() {
        uploaded_positions.entry(field.as_str()).or_insert(idx);
    }

    let missing_columns = original_fields
        .iter()
        .enumerate()
        .filter(|(_, field)| !uploaded_positions.contains_key(field.as_str()))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    if !missing_columns.is_empty() {
        return SchemaOutcome::Mismatch { missing_columns };
    }

    let positions = original_fields
        .iter()
        .filter_map(|field| {
            uploaded_positions
                .get(field.as_str())
                .map(|idx| (field.clone(), *idx))
        })
        .collect();
    SchemaOutcome::Matched(FieldIndexMap { positions })
}
