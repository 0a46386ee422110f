//! Category attribute tables and ordered field records
//!
//! A [`CategoryTable`] maps integer category ids to a name, an alias, a
//! display colour and any number of derived columns (areas, zonal
//! statistics). Rows are kept sorted by id and ids are unique.
//!
//! Tables round-trip through `;`-delimited text files with at least the
//! `Id`, `Name` and `Alias` columns.

use crate::errors::{GridError, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Column delimiter of table files
pub const DELIMITER: char = ';';

/// 20-colour categorical palette
pub const TAB20: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896",
    "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7",
    "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

/// Insertion-ordered key/value record
///
/// Used for table columns beyond the fixed ones and for member metadata in
/// collection catalogs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedFields {
    entries: Vec<(String, Value)>,
}

impl OrderedFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place or appending.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`OrderedFields::insert`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Numeric value of `key`, if present and numeric
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every entry of `other`, overwriting shared keys
    pub fn extend(&mut self, other: &OrderedFields) {
        for (key, value) in other.iter() {
            self.insert(key, value.clone());
        }
    }
}

/// Render a field value as plain text (strings unquoted, null empty)
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        Value::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::from(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::from(f)
    } else {
        Value::from(raw)
    }
}

/// Split one table line on the delimiter. Quoted cells keep their text
/// verbatim (`""` is a literal quote); unquoted cells are trimmed.
fn split_record(line: &str) -> std::result::Result<Vec<String>, &'static str> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    cell.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => cell.push(ch),
            }
            continue;
        }
        match ch {
            '"' if !quoted && cell.trim().is_empty() => {
                cell.clear();
                quoted = true;
                in_quotes = true;
            }
            c if c == DELIMITER => {
                cells.push(finish_cell(std::mem::take(&mut cell), quoted));
                quoted = false;
            }
            _ if quoted && ch.is_whitespace() => {}
            _ if quoted => return Err("text after a closing quote"),
            _ => cell.push(ch),
        }
    }
    if in_quotes {
        return Err("unterminated quoted cell");
    }
    cells.push(finish_cell(cell, quoted));
    Ok(cells)
}

fn finish_cell(cell: String, quoted: bool) -> String {
    if quoted {
        cell
    } else {
        cell.trim().to_string()
    }
}

/// Append one delimited record, quoting cells that need it
fn push_record(out: &mut String, cells: &[String]) -> Result<()> {
    for (i, cell) in cells.iter().enumerate() {
        if cell.contains(['\n', '\r']) {
            return Err(GridError::Generic(format!(
                "table cell '{}' contains a line break",
                cell.escape_default()
            )));
        }
        if i > 0 {
            out.push(DELIMITER);
        }
        if cell.contains([DELIMITER, '"']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
    Ok(())
}

/// One category of a table
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub id: u32,
    pub name: String,
    pub alias: String,
    /// Display colour; empty until the owning table assigns one
    pub color: String,
    /// Derived columns (areas, statistics, custom attributes)
    pub fields: OrderedFields,
}

impl CategoryRow {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            alias: alias.into(),
            color: String::new(),
            fields: OrderedFields::new(),
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Attribute table of a categorical grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTable {
    rows: Vec<CategoryRow>,
}

impl CategoryTable {
    /// Build a normalized table: text trimmed, rows sorted by id, missing
    /// colours filled from the palette.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DuplicateCategory`] when an id appears twice.
    pub fn new(rows: Vec<CategoryRow>) -> Result<Self> {
        let mut rows = rows;
        for row in &mut rows {
            row.name = row.name.trim().to_string();
            row.alias = row.alias.trim().to_string();
            row.color = row.color.trim().to_string();
        }
        rows.sort_by_key(|row| row.id);
        if let Some(pair) = rows.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(GridError::DuplicateCategory { id: pair[0].id });
        }
        for (i, row) in rows.iter_mut().enumerate() {
            if row.color.is_empty() {
                row.color = TAB20[i % TAB20.len()].to_string();
            }
        }
        Ok(Self { rows })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rows(&self) -> &[CategoryRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ids in ascending order
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        self.rows.iter().map(|row| row.id).collect()
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&CategoryRow> {
        self.rows
            .binary_search_by_key(&id, |row| row.id)
            .ok()
            .map(|i| &self.rows[i])
    }

    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn max_id(&self) -> Option<u32> {
        self.rows.last().map(|row| row.id)
    }

    /// Keep only the rows whose id is in `present`
    pub fn retain_ids(&mut self, present: &BTreeSet<u32>) {
        self.rows.retain(|row| present.contains(&row.id));
    }

    /// Reassign every colour from the palette, in id order
    pub fn set_palette_colors(&mut self) {
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.color = TAB20[i % TAB20.len()].to_string();
        }
    }

    /// Colour steps as (id, colour) in id order. Ids between two rows take
    /// the colour of the next row up; see [`crate::config::ViewSpec::color_of`].
    #[must_use]
    pub fn color_ramp(&self) -> Vec<(u32, String)> {
        self.rows
            .iter()
            .map(|row| (row.id, row.color.clone()))
            .collect()
    }

    /// Set a derived column on the row with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::CategoryNotFound`] for an unknown id.
    pub fn set_field(&mut self, id: u32, key: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .rows
            .binary_search_by_key(&id, |row| row.id)
            .map_err(|_| GridError::CategoryNotFound { id })?;
        self.rows[index].fields.insert(key, value);
        Ok(())
    }

    /// Names of the derived columns, in first-seen order
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.fields.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.to_string());
                }
            }
        }
        names
    }

    /// Union of several tables; for repeated ids the last table wins.
    #[must_use]
    pub fn union<'a>(tables: impl IntoIterator<Item = &'a CategoryTable>) -> Self {
        let mut rows: Vec<CategoryRow> = Vec::new();
        for table in tables {
            for row in &table.rows {
                match rows.iter_mut().find(|r| r.id == row.id) {
                    Some(existing) => *existing = row.clone(),
                    None => rows.push(row.clone()),
                }
            }
        }
        rows.sort_by_key(|row| row.id);
        Self { rows }
    }

    /// Load a `;`-delimited table file.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, when `Id`, `Name` or `Alias` is missing, on
    /// malformed rows, or on duplicate ids.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let Some((header_index, header)) = lines.next() else {
            return Err(GridError::parse(path, 1, "empty table file"));
        };
        let columns =
            split_record(header).map_err(|e| GridError::parse(path, header_index + 1, e))?;
        let find = |name: &str| -> Result<usize> {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| GridError::MissingColumn {
                    column: name.to_string(),
                })
        };
        let id_col = find("Id")?;
        let name_col = find("Name")?;
        let alias_col = find("Alias")?;
        let color_col = columns.iter().position(|c| c == "Color");

        let mut rows = Vec::new();
        for (index, line) in lines {
            let line_no = index + 1;
            let cells = split_record(line).map_err(|e| GridError::parse(path, line_no, e))?;
            if cells.len() != columns.len() {
                return Err(GridError::parse(
                    path,
                    line_no,
                    format!("expected {} columns, found {}", columns.len(), cells.len()),
                ));
            }
            let id = cells[id_col].parse::<u32>().map_err(|_| {
                GridError::parse(path, line_no, format!("invalid category id '{}'", cells[id_col]))
            })?;
            let mut row = CategoryRow::new(id, cells[name_col].as_str(), cells[alias_col].as_str());
            if let Some(c) = color_col {
                row.color.clone_from(&cells[c]);
            }
            for (i, column) in columns.iter().enumerate() {
                if i == id_col || i == name_col || i == alias_col || Some(i) == color_col {
                    continue;
                }
                row.fields.insert(column.as_str(), parse_value(&cells[i]));
            }
            rows.push(row);
        }
        debug!(path = %path.display(), rows = rows.len(), "read category table");
        Self::new(rows)
    }

    /// Write the table as a `;`-delimited file. Cells holding the
    /// delimiter or a double quote are quoted.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors and on values containing a line break.
    pub fn write(&self, path: &Path) -> Result<PathBuf> {
        let extra = self.field_names();
        let mut out = String::new();
        let mut header = vec!["Id".to_string(), "Name".into(), "Alias".into(), "Color".into()];
        header.extend(extra.iter().cloned());
        push_record(&mut out, &header)?;
        for row in &self.rows {
            let mut cells = vec![
                row.id.to_string(),
                row.name.clone(),
                row.alias.clone(),
                row.color.clone(),
            ];
            cells.extend(
                extra
                    .iter()
                    .map(|key| row.fields.get(key).map(render_value).unwrap_or_default()),
            );
            push_record(&mut out, &cells)?;
        }
        fs::write(path, out)?;
        debug!(path = %path.display(), rows = self.rows.len(), "wrote category table");
        Ok(path.to_path_buf())
    }

    /// Area of interest / exclusion zone table
    #[must_use]
    pub fn aoi() -> Self {
        Self {
            rows: vec![
                CategoryRow::new(1, "Area of Interest", "AOI").with_color("magenta"),
                CategoryRow::new(2, "Exclusion Zone", "EZ").with_color("silver"),
            ],
        }
    }

    /// Local drain direction table (numeric keypad convention)
    #[must_use]
    pub fn ldd() -> Self {
        let entries = [
            ("South-west", "1-SW", "#8c564b"),
            ("South", "2-S", "#9edae5"),
            ("South-east", "3-SE", "#98df8a"),
            ("West", "4-W", "#dbdb8d"),
            ("Center", "5-C", "#d62728"),
            ("East", "6-E", "#ff7f0e"),
            ("North-west", "7-NW", "#1f77b4"),
            ("North", "8-N", "#f7b6d2"),
            ("North-east", "9-NE", "#98df8a"),
        ];
        let rows = entries
            .iter()
            .zip(1u32..)
            .map(|(&(name, alias, color), id)| CategoryRow::new(id, name, alias).with_color(color))
            .collect();
        Self { rows }
    }

    /// Three-class change table
    #[must_use]
    pub fn lulc_change() -> Self {
        Self {
            rows: vec![
                CategoryRow::new(1, "Retraction", "Rtr").with_color("tab:purple"),
                CategoryRow::new(2, "Stable", "Stb").with_color("tab:orange"),
                CategoryRow::new(3, "Expansion", "Exp").with_color("tab:red"),
            ],
        }
    }

    /// Zone table for the given distinct ids, named after `varname` and
    /// aliased after `varalias`.
    #[must_use]
    pub fn zones(ids: &BTreeSet<u32>, varname: &str, varalias: &str) -> Self {
        let rows = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                CategoryRow::new(id, format!("{varname} {id}"), format!("{varalias}{id}"))
                    .with_color(TAB20[i % TAB20.len()])
            })
            .collect();
        Self { rows }
    }
}
