//! Tabular data source: a `;`-separated UTF-8 table with a header row.
//!
//! Each data row becomes one card. Column types are inferred per column so
//! macros can substitute typed values into spec fields.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::foundation::error::{CardforgeError, CardforgeResult};

/// One typed cell of the data table.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// Empty cell.
    Missing,
}

impl CellValue {
    /// Raw typed value, used when a macro exactly matches a whole string.
    pub fn to_value(&self) -> Value {
        match self {
            CellValue::Int(i) => Value::from(*i),
            CellValue::Float(f) => Value::from(*f),
            CellValue::Str(s) => Value::from(s.clone()),
            CellValue::Missing => Value::Null,
        }
    }

    /// Text rendering, used for substring substitution inside larger strings.
    ///
    /// Floats keep one decimal even when integral so a float column renders
    /// consistently (`2` stays `2.0`). Missing cells render empty.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            CellValue::Str(s) => s.clone(),
            CellValue::Missing => String::new(),
        }
    }
}

/// One record: column name to typed cell, in header order.
///
/// Header order matters: substring macro substitution walks columns in this
/// order, which pins the result when one substitution produces another
/// column's token.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataRow {
    cells: Vec<(String, CellValue)>,
}

impl DataRow {
    pub fn new(cells: Vec<(String, CellValue)>) -> Self {
        Self { cells }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cell)| cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColumnType {
    Int,
    Float,
    Str,
}

/// Parsed table: header plus typed rows.
#[derive(Clone, Debug, Default)]
pub struct DataTable {
    header: Vec<String>,
    rows: Vec<DataRow>,
}

impl DataTable {
    /// Read and type a `;`-separated table from a file.
    pub fn from_path(path: &Path) -> CardforgeResult<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| CardforgeError::data(format!("reading {}: {e}", path.display())))?;
        Self::from_reader(file)
            .map_err(|e| CardforgeError::data(format!("parsing {}: {e}", path.display())))
    }

    /// Read and type a `;`-separated table from any reader.
    pub fn from_reader<R: Read>(reader: R) -> CardforgeResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = csv_reader
            .headers()
            .map_err(|e| CardforgeError::data(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        if header.is_empty() || header.iter().all(|h| h.is_empty()) {
            return Err(CardforgeError::data("missing header row"));
        }

        let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| CardforgeError::data(e.to_string()))?;
            let row = (0..header.len())
                .map(|i| match record.get(i) {
                    None | Some("") => None,
                    Some(field) => Some(field.to_string()),
                })
                .collect();
            raw_rows.push(row);
        }

        Ok(Self::type_columns(header, raw_rows))
    }

    /// Infer one type per column and convert every cell to it.
    fn type_columns(header: Vec<String>, raw_rows: Vec<Vec<Option<String>>>) -> Self {
        let types: Vec<ColumnType> = (0..header.len())
            .map(|col| infer_column_type(raw_rows.iter().filter_map(|row| row[col].as_deref())))
            .collect();

        let rows = raw_rows
            .into_iter()
            .map(|raw| {
                let cells = header
                    .iter()
                    .zip(raw)
                    .zip(&types)
                    .map(|((name, field), col_type)| {
                        let cell = match field {
                            None => CellValue::Missing,
                            Some(text) => match col_type {
                                ColumnType::Int => text
                                    .trim()
                                    .parse::<i64>()
                                    .map(CellValue::Int)
                                    .unwrap_or(CellValue::Missing),
                                ColumnType::Float => text
                                    .trim()
                                    .parse::<f64>()
                                    .map(CellValue::Float)
                                    .unwrap_or(CellValue::Missing),
                                ColumnType::Str => CellValue::Str(text),
                            },
                        };
                        (name.clone(), cell)
                    })
                    .collect();
                DataRow::new(cells)
            })
            .collect();

        Self { header, rows }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Narrowest numeric type that fits every non-empty cell, else strings.
fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut seen_any = false;
    let mut all_int = true;
    let mut all_float = true;
    for cell in cells {
        seen_any = true;
        let trimmed = cell.trim();
        if trimmed.parse::<i64>().is_err() {
            all_int = false;
        }
        if trimmed.parse::<f64>().is_err() {
            all_float = false;
        }
    }
    if !seen_any || (!all_int && !all_float) {
        ColumnType::Str
    } else if all_int {
        ColumnType::Int
    } else {
        ColumnType::Float
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(body: &str) -> DataTable {
        DataTable::from_reader(body.as_bytes()).unwrap()
    }

    #[test]
    fn integer_columns_stay_integers() {
        let t = table("name;hp\ngoblin;7\ndragon;12\n");
        assert_eq!(t.len(), 2);
        assert_eq!(
            t.rows()[0].get("hp"),
            Some(&CellValue::Int(7)),
        );
        assert_eq!(
            t.rows()[1].get("name"),
            Some(&CellValue::Str("dragon".to_string())),
        );
    }

    #[test]
    fn mixed_numeric_column_widens_to_float() {
        let t = table("cost\n1\n2.5\n");
        assert_eq!(t.rows()[0].get("cost"), Some(&CellValue::Float(1.0)));
        assert_eq!(t.rows()[1].get("cost"), Some(&CellValue::Float(2.5)));
    }

    #[test]
    fn one_non_numeric_cell_makes_the_column_strings() {
        let t = table("v\n1\nx\n3\n");
        assert_eq!(t.rows()[0].get("v"), Some(&CellValue::Str("1".to_string())));
        assert_eq!(t.rows()[2].get("v"), Some(&CellValue::Str("3".to_string())));
    }

    #[test]
    fn empty_cells_are_missing_in_any_column() {
        let t = table("name;hp\n;3\nslime;\n");
        assert_eq!(t.rows()[0].get("name"), Some(&CellValue::Missing));
        assert_eq!(t.rows()[1].get("hp"), Some(&CellValue::Missing));
    }

    #[test]
    fn short_rows_fill_missing_cells() {
        let t = table("a;b;c\n1;2\n");
        assert_eq!(t.rows()[0].get("c"), Some(&CellValue::Missing));
    }

    #[test]
    fn row_preserves_header_order() {
        let t = table("z;a;m\n1;2;3\n");
        let names: Vec<&str> = t.rows()[0].columns().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(DataTable::from_reader("".as_bytes()).is_err());
    }

    #[test]
    fn float_text_keeps_one_decimal_when_integral() {
        assert_eq!(CellValue::Float(2.0).to_text(), "2.0");
        assert_eq!(CellValue::Float(1.5).to_text(), "1.5");
        assert_eq!(CellValue::Int(2).to_text(), "2");
        assert_eq!(CellValue::Missing.to_text(), "");
    }
}
