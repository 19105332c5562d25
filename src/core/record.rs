use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::model::{DocumentType, Field};

/// A finalized extraction record. Immutable; produced by [`DocumentBuilder`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentData {
    document_type: DocumentType,
    values: BTreeMap<Field, String>,
}

impl DocumentData {
    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    /// Every field of the type in table order, set or not.
    pub fn fields(&self) -> impl Iterator<Item = (Field, Option<&str>)> + '_ {
        self.document_type
            .fields()
            .iter()
            .map(move |field| (*field, self.get(*field)))
    }

    pub fn set_count(&self) -> usize {
        self.values.len()
    }

    pub fn completeness(&self) -> u8 {
        completeness(self.document_type, self.values.len())
    }
}

/// `{}` lists the set fields on one line; `{:#}` lists every field, one per line.
impl fmt::Display for DocumentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "{}{{", self.document_type)?;
            for (field, value) in self.fields() {
                writeln!(f, "{}='{}'", field, value.unwrap_or("-"))?;
            }
            write!(f, "}}")
        } else {
            write!(f, "{}{{", self.document_type)?;
            for (field, value) in self.fields() {
                if let Some(value) = value {
                    write!(f, " {field}='{value}'")?;
                }
            }
            write!(f, " }}")
        }
    }
}

fn completeness(document_type: DocumentType, set: usize) -> u8 {
    let total = document_type.fields().len();
    if total == 0 {
        return 0;
    }
    (set.min(total) * 100 / total) as u8
}

/// Mutable field slots for one record under construction.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    document_type: DocumentType,
    values: BTreeMap<Field, String>,
}

impl DocumentBuilder {
    pub fn new(document_type: DocumentType) -> Self {
        Self {
            document_type,
            values: BTreeMap::new(),
        }
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    /// Stores a trimmed value, replacing any previous one. Blank values
    /// leave the slot untouched. Returns whether the slot was written.
    ///
    /// Panics if `field` does not belong to this document type.
    pub fn set(&mut self, field: Field, value: impl AsRef<str>) -> bool {
        assert!(
            self.document_type.has_field(field),
            "field {field} is not part of {}",
            self.document_type
        );
        let value = value.as_ref().trim();
        if value.is_empty() {
            return false;
        }
        self.values.insert(field, value.to_string());
        true
    }

    /// Like [`set`](Self::set) but only writes an unset slot.
    pub fn set_if_empty(&mut self, field: Field, value: impl AsRef<str>) -> bool {
        if self.is_set(field) {
            return false;
        }
        self.set(field, value)
    }

    /// Copies fields from `source` into slots that are still unset.
    ///
    /// Panics if `source` is a different document type.
    pub fn fill_empty_fields(&mut self, source: &DocumentData) {
        self.assert_same_type(source);
        for (field, value) in &source.values {
            self.values
                .entry(*field)
                .or_insert_with(|| value.clone());
        }
    }

    /// Overwrites every slot that is set in `source`.
    ///
    /// Panics if `source` is a different document type.
    pub fn fill_fields(&mut self, source: &DocumentData) {
        self.assert_same_type(source);
        for (field, value) in &source.values {
            self.values.insert(*field, value.clone());
        }
    }

    pub fn missing_fields(&self) -> Vec<Field> {
        self.document_type
            .fields()
            .iter()
            .copied()
            .filter(|field| !self.is_set(*field))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.values.len() == self.document_type.fields().len()
    }

    pub fn completeness(&self) -> u8 {
        completeness(self.document_type, self.values.len())
    }

    /// Finalized copy of the current state; the builder stays usable.
    pub fn snapshot(&self) -> DocumentData {
        DocumentData {
            document_type: self.document_type,
            values: self.values.clone(),
        }
    }

    pub fn build(self) -> DocumentData {
        DocumentData {
            document_type: self.document_type,
            values: self.values,
        }
    }

    fn assert_same_type(&self, source: &DocumentData) {
        assert_eq!(
            self.document_type, source.document_type,
            "cannot merge {} fields into a {} record",
            source.document_type, self.document_type
        );
    }
}
