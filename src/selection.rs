//! Ordered sheet → columns selection.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The columns chosen for translation in one sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSelection {
    pub sheet: String,
    pub columns: Vec<String>,
}

/// Mapping from sheet name to the ordered, de-duplicated columns to translate.
///
/// Insertion order is kept both in memory and in the persisted JSON object, so
/// sheets are processed in the order the user picked them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    entries: Vec<SheetSelection>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `columns` for `sheet`, replacing any previous choice for that sheet
    /// while keeping its position.
    pub fn insert<I, S>(&mut self, sheet: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sheet = sheet.into();
        let mut unique: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if !unique.contains(&column) {
                unique.push(column);
            }
        }

        match self.entries.iter_mut().find(|e| e.sheet == sheet) {
            Some(entry) => entry.columns = unique,
            None => self.entries.push(SheetSelection {
                sheet,
                columns: unique,
            }),
        }
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with_sheet<I, S>(mut self, sheet: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(sheet, columns);
        self
    }

    pub fn columns(&self, sheet: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.sheet == sheet)
            .map(|e| e.columns.as_slice())
    }

    pub fn sheets(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.sheet.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SheetSelection> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SelectionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.sheet, &entry.columns)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SelectionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SelectionVisitor;

        impl<'de> Visitor<'de> for SelectionVisitor {
            type Value = SelectionSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of sheet names to column lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut selection = SelectionSet::new();
                while let Some((sheet, columns)) = access.next_entry::<String, Vec<String>>()? {
                    selection.insert(sheet, columns);
                }
                Ok(selection)
            }
        }

        deserializer.deserialize_map(SelectionVisitor)
    }
}
