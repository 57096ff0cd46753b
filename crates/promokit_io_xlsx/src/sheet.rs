//! Worksheet part model.
//!
//! A worksheet is kept as three pieces: the verbatim markup before
//! `<sheetData>`, an editable row/cell grid, and the verbatim markup after
//! `</sheetData>`. Cells keep their original attributes (style index `s`,
//! type `t`, ...) and raw inner XML until they are overwritten, so values,
//! formulas and formatting of untouched cells survive a round trip.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use crate::conf::TUP_SHEET_ELEMENTS_UNSHARED;
use crate::package::{derive_prefix, escape_xml};
use crate::spec::{EnumCellValue, SpecCellAddress, XlsxError};
use crate::util::{derive_column_letters, parse_cell_address};

static RE_DIMENSION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"(<(?:\w+:)?dimension\s+ref=")[^"]*(")"#));

////////////////////////////////////////////////////////////////////////////////
// #region SheetModel

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSheetCell {
    /// Attributes other than `r`, in document order.
    pub attrs: Vec<(String, String)>,
    /// Raw XML between `<c>` and `</c>`.
    pub inner_xml: String,
}

impl SpecSheetCell {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSheetRow {
    /// Attributes other than `r` and `spans`.
    pub attrs: Vec<(String, String)>,
    pub cells: BTreeMap<u32, SpecSheetCell>,
}

/// Editable worksheet XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XlsxSheetXml {
    c_head: String,
    c_tail: String,
    c_prefix: String,
    rows: BTreeMap<u32, SpecSheetRow>,
}

impl XlsxSheetXml {
    pub fn parse(c_xml: &str) -> Result<Self, XlsxError> {
        let mut reader = Reader::from_str(c_xml);
        reader.config_mut().trim_text(false);

        loop {
            let event = reader.read_event()?;
            let n_pos_after = reader.buffer_position() as usize;
            match event {
                Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                    let c_prefix = derive_prefix(e.name().as_ref());
                    let n_pos_head = derive_tag_start(c_xml, n_pos_after)?;
                    let (rows, n_pos_tail) = parse_sheet_data(&mut reader, c_xml)?;
                    return Ok(Self {
                        c_head: c_xml[..n_pos_head].to_string(),
                        c_tail: c_xml[n_pos_tail..].to_string(),
                        c_prefix,
                        rows,
                    });
                }
                Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                    let c_prefix = derive_prefix(e.name().as_ref());
                    let n_pos_head = derive_tag_start(c_xml, n_pos_after)?;
                    return Ok(Self {
                        c_head: c_xml[..n_pos_head].to_string(),
                        c_tail: c_xml[n_pos_after..].to_string(),
                        c_prefix,
                        rows: BTreeMap::new(),
                    });
                }
                Event::Eof => {
                    return Err(XlsxError::Package(
                        "worksheet part has no sheetData element".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }

    /// Re-assemble the worksheet part, refreshing `<dimension>`.
    pub fn to_xml(&self) -> Result<String, XlsxError> {
        let p = &self.c_prefix;
        let mut c_out = String::with_capacity(self.c_head.len() + self.c_tail.len() + 64 * self.rows.len());
        c_out.push_str(&self.derive_head_with_dimension()?);

        if self.rows.is_empty() {
            c_out.push_str(&format!("<{p}sheetData/>"));
        } else {
            c_out.push_str(&format!("<{p}sheetData>"));
            for (n_row, row) in &self.rows {
                c_out.push_str(&format!("<{p}row r=\"{n_row}\""));
                push_attrs(&mut c_out, &row.attrs);
                if row.cells.is_empty() {
                    c_out.push_str("/>");
                    continue;
                }
                c_out.push('>');
                for (n_col, cell) in &row.cells {
                    c_out.push_str(&format!(
                        "<{p}c r=\"{}{n_row}\"",
                        derive_column_letters(*n_col)
                    ));
                    push_attrs(&mut c_out, &cell.attrs);
                    if cell.inner_xml.is_empty() {
                        c_out.push_str("/>");
                    } else {
                        c_out.push('>');
                        c_out.push_str(&cell.inner_xml);
                        c_out.push_str(&format!("</{p}c>"));
                    }
                }
                c_out.push_str(&format!("</{p}row>"));
            }
            c_out.push_str(&format!("</{p}sheetData>"));
        }

        c_out.push_str(&self.c_tail);
        Ok(c_out)
    }

    fn derive_head_with_dimension(&self) -> Result<String, XlsxError> {
        let re_dimension = RE_DIMENSION
            .as_ref()
            .map_err(|err| XlsxError::Package(err.to_string()))?;
        let c_ref = self.derive_dimension_ref();
        Ok(re_dimension
            .replace(&self.c_head, |caps: &regex::Captures<'_>| {
                format!("{}{}{}", &caps[1], c_ref, &caps[2])
            })
            .into_owned())
    }

    fn derive_dimension_ref(&self) -> String {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (n_row, row) in &self.rows {
            for n_col in row.cells.keys() {
                bounds = Some(match bounds {
                    None => (*n_row, *n_row, *n_col, *n_col),
                    Some((r0, r1, c0, c1)) => {
                        (r0.min(*n_row), r1.max(*n_row), c0.min(*n_col), c1.max(*n_col))
                    }
                });
            }
        }
        match bounds {
            None => "A1".to_string(),
            Some((r0, r1, c0, c1)) if r0 == r1 && c0 == c1 => {
                SpecCellAddress::new(r0, c0).to_string()
            }
            Some((r0, r1, c0, c1)) => format!(
                "{}:{}",
                SpecCellAddress::new(r0, c0),
                SpecCellAddress::new(r1, c1)
            ),
        }
    }

    pub fn cell(&self, address: SpecCellAddress) -> Option<&SpecSheetCell> {
        self.rows
            .get(&address.n_row)
            .and_then(|row| row.cells.get(&address.n_col))
    }

    /// Decode the value at `address`; `l_shared_strings` resolves `t="s"`.
    pub fn read_value(
        &self,
        address: SpecCellAddress,
        l_shared_strings: &[String],
    ) -> Result<EnumCellValue, XlsxError> {
        match self.cell(address) {
            Some(cell) => decode_cell_value(cell, l_shared_strings),
            None => Ok(EnumCellValue::None),
        }
    }

    /// Replace the value at `address`, keeping the cell's style.
    pub fn write_value(&mut self, address: SpecCellAddress, value: &EnumCellValue) {
        let p = self.c_prefix.clone();
        let cell = self
            .rows
            .entry(address.n_row)
            .or_default()
            .cells
            .entry(address.n_col)
            .or_default();

        cell.attrs.retain(|(k, _)| k != "t" && k != "cm" && k != "vm");
        let (c_type, c_inner) = encode_cell_value(value, &p);
        if let Some(c_type) = c_type {
            cell.attrs.push(("t".to_string(), c_type.to_string()));
        }
        cell.inner_xml = c_inner;
    }

    /// Drop every row, including row-level formatting.
    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    /// Highest row holding a value or formula; `0` for an empty sheet.
    pub fn n_row_max_used(&self) -> u32 {
        self.rows
            .iter()
            .rev()
            .find(|(_, row)| row.cells.values().any(is_cell_with_content))
            .map(|(n_row, _)| *n_row)
            .unwrap_or(0)
    }

    /// Highest row holding a value or formula in column `n_col`.
    pub fn n_row_max_used_in_column(&self, n_col: u32) -> u32 {
        self.rows
            .iter()
            .rev()
            .find(|(_, row)| row.cells.get(&n_col).is_some_and(is_cell_with_content))
            .map(|(n_row, _)| *n_row)
            .unwrap_or(0)
    }

    /// Strip markup that cannot be shared with a copy of this sheet.
    ///
    /// Clears `tabSelected` and removes drawing, legacy drawing, picture,
    /// embedded object, control and table references. Hyperlinks and print
    /// settings stay.
    pub fn prepare_for_copy(&mut self) -> Result<(), XlsxError> {
        self.c_head = self
            .c_head
            .replace(" tabSelected=\"1\"", "")
            .replace(" tabSelected=\"true\"", "");
        self.c_tail = strip_elements(&self.c_tail, &TUP_SHEET_ELEMENTS_UNSHARED)?;
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parsing

/// Offset of the `<` opening the tag that ends at `n_pos_after`.
fn derive_tag_start(c_xml: &str, n_pos_after: usize) -> Result<usize, XlsxError> {
    c_xml[..n_pos_after]
        .rfind('<')
        .ok_or_else(|| XlsxError::Package("cannot locate tag start".to_string()))
}

fn parse_sheet_data(
    reader: &mut Reader<&[u8]>,
    c_xml: &str,
) -> Result<(BTreeMap<u32, SpecSheetRow>, usize), XlsxError> {
    let mut rows = BTreeMap::new();
    let mut n_row_prev = 0u32;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let (n_row, attrs) = parse_row_start(&e, n_row_prev)?;
                let cells = parse_row_cells(reader, c_xml, n_row)?;
                rows.insert(n_row, SpecSheetRow { attrs, cells });
                n_row_prev = n_row;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let (n_row, attrs) = parse_row_start(&e, n_row_prev)?;
                rows.insert(
                    n_row,
                    SpecSheetRow {
                        attrs,
                        cells: BTreeMap::new(),
                    },
                );
                n_row_prev = n_row;
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                return Ok((rows, reader.buffer_position() as usize));
            }
            Event::Eof => {
                return Err(XlsxError::Package("sheetData is not closed".to_string()));
            }
            _ => {}
        }
    }
}

fn parse_row_start(
    e: &BytesStart<'_>,
    n_row_prev: u32,
) -> Result<(u32, Vec<(String, String)>), XlsxError> {
    let mut n_row: Option<u32> = None;
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let c_key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let c_value = attr.unescape_value()?.into_owned();
        match c_key.as_str() {
            "r" => {
                n_row = Some(c_value.trim().parse().map_err(|_| {
                    XlsxError::Package(format!("row has a non-numeric index {c_value:?}"))
                })?)
            }
            "spans" => {}
            _ => attrs.push((c_key, c_value)),
        }
    }
    Ok((n_row.unwrap_or(n_row_prev + 1), attrs))
}

fn parse_row_cells(
    reader: &mut Reader<&[u8]>,
    c_xml: &str,
    n_row: u32,
) -> Result<BTreeMap<u32, SpecSheetCell>, XlsxError> {
    let mut cells = BTreeMap::new();
    let mut n_col_prev = 0u32;

    loop {
        let event = reader.read_event()?;
        let n_pos_after = reader.buffer_position() as usize;
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let (n_col, attrs) = parse_cell_start(&e, n_row, n_col_prev)?;
                let n_pos_end_after = skip_to_matching_end(reader)?;
                let n_pos_end = derive_tag_start(c_xml, n_pos_end_after)?;
                cells.insert(
                    n_col,
                    SpecSheetCell {
                        attrs,
                        inner_xml: c_xml[n_pos_after..n_pos_end].to_string(),
                    },
                );
                n_col_prev = n_col;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let (n_col, attrs) = parse_cell_start(&e, n_row, n_col_prev)?;
                cells.insert(
                    n_col,
                    SpecSheetCell {
                        attrs,
                        inner_xml: String::new(),
                    },
                );
                n_col_prev = n_col;
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => return Ok(cells),
            Event::Eof => {
                return Err(XlsxError::Package(format!("row {n_row} is not closed")));
            }
            _ => {}
        }
    }
}

fn parse_cell_start(
    e: &BytesStart<'_>,
    n_row: u32,
    n_col_prev: u32,
) -> Result<(u32, Vec<(String, String)>), XlsxError> {
    let mut n_col: Option<u32> = None;
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let c_key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let c_value = attr.unescape_value()?.into_owned();
        if c_key == "r" {
            let address = parse_cell_address(&c_value)?;
            if address.n_row != n_row {
                return Err(XlsxError::Package(format!(
                    "cell {c_value} is stored under row {n_row}"
                )));
            }
            n_col = Some(address.n_col);
        } else {
            attrs.push((c_key, c_value));
        }
    }
    Ok((n_col.unwrap_or(n_col_prev + 1), attrs))
}

/// Consume events up to the end tag closing the current element; return the
/// offset just past that end tag.
fn skip_to_matching_end(reader: &mut Reader<&[u8]>) -> Result<usize, XlsxError> {
    let mut n_depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(_) => n_depth += 1,
            Event::End(_) if n_depth == 0 => return Ok(reader.buffer_position() as usize),
            Event::End(_) => n_depth -= 1,
            Event::Eof => {
                return Err(XlsxError::Package("unexpected end of worksheet".to_string()));
            }
            _ => {}
        }
    }
}

/// Remove every element (with its subtree) whose local name is listed.
///
/// The fragment may close elements it never opened (`</worksheet>`), so it is
/// parsed under a synthetic root with end-name checks off.
fn strip_elements(c_fragment: &str, l_names: &[&str]) -> Result<String, XlsxError> {
    const C_ROOT: &str = "<_>";
    let c_wrapped = format!("{C_ROOT}{c_fragment}");
    let c_fragment = c_wrapped.as_str();
    let mut reader = Reader::from_str(c_fragment);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;

    let mut l_ranges: Vec<(usize, usize)> = Vec::new();
    loop {
        let event = reader.read_event()?;
        let n_pos_after = reader.buffer_position() as usize;
        match event {
            Event::Empty(e) if is_listed(e.local_name().as_ref(), l_names) => {
                l_ranges.push((derive_tag_start(c_fragment, n_pos_after)?, n_pos_after));
            }
            Event::Start(e) if is_listed(e.local_name().as_ref(), l_names) => {
                let n_pos_start = derive_tag_start(c_fragment, n_pos_after)?;
                let n_pos_end = skip_to_matching_end(&mut reader)?;
                l_ranges.push((n_pos_start, n_pos_end));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut c_out = String::with_capacity(c_fragment.len());
    let mut n_pos = 0usize;
    for (n_start, n_end) in l_ranges {
        c_out.push_str(&c_fragment[n_pos..n_start]);
        n_pos = n_end;
    }
    c_out.push_str(&c_fragment[n_pos..]);
    Ok(c_out[C_ROOT.len()..].to_string())
}

fn is_listed(v_local: &[u8], l_names: &[&str]) -> bool {
    l_names.iter().any(|name| name.as_bytes() == v_local)
}

fn push_attrs(c_out: &mut String, attrs: &[(String, String)]) {
    for (c_key, c_value) in attrs {
        c_out.push_str(&format!(" {c_key}=\"{}\"", escape_xml(c_value)));
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellCodec

#[derive(Debug, Default)]
struct SpecCellContent {
    formula: Option<String>,
    value: Option<String>,
    inline: Option<String>,
}

fn parse_cell_content(c_inner: &str) -> Result<SpecCellContent, XlsxError> {
    let mut content = SpecCellContent::default();
    if c_inner.is_empty() {
        return Ok(content);
    }

    let mut reader = Reader::from_str(c_inner);
    reader.config_mut().trim_text(false);
    // 0 = none, 1 = formula, 2 = value, 3 = inline text
    let mut n_target = 0u8;
    let mut n_depth_phonetic = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"f" => {
                    n_target = 1;
                    content.formula.get_or_insert_with(String::new);
                }
                b"v" => {
                    n_target = 2;
                    content.value.get_or_insert_with(String::new);
                }
                b"rPh" => n_depth_phonetic += 1,
                b"t" if n_depth_phonetic == 0 => {
                    n_target = 3;
                    content.inline.get_or_insert_with(String::new);
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"f" => {
                    content.formula.get_or_insert_with(String::new);
                }
                b"is" => {
                    content.inline.get_or_insert_with(String::new);
                }
                _ => {}
            },
            Event::Text(e) => {
                let c_text = e.unescape()?;
                let slot = match n_target {
                    1 => content.formula.as_mut(),
                    2 => content.value.as_mut(),
                    3 => content.inline.as_mut(),
                    _ => None,
                };
                if let Some(slot) = slot {
                    slot.push_str(&c_text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"rPh" => n_depth_phonetic = n_depth_phonetic.saturating_sub(1),
                b"f" | b"v" | b"t" => n_target = 0,
                b"is" => {
                    content.inline.get_or_insert_with(String::new);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(content)
}

fn is_cell_with_content(cell: &SpecSheetCell) -> bool {
    match parse_cell_content(&cell.inner_xml) {
        Ok(content) => {
            content.formula.is_some() || content.value.is_some() || content.inline.is_some()
        }
        Err(_) => !cell.inner_xml.is_empty(),
    }
}

fn decode_cell_value(
    cell: &SpecSheetCell,
    l_shared_strings: &[String],
) -> Result<EnumCellValue, XlsxError> {
    let content = parse_cell_content(&cell.inner_xml)?;
    if let Some(c_formula) = content.formula.filter(|f| !f.is_empty()) {
        return Ok(EnumCellValue::Formula(c_formula));
    }

    let value = match cell.attr("t").unwrap_or("n") {
        "s" => content
            .value
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|n_idx| l_shared_strings.get(n_idx).cloned())
            .map(EnumCellValue::String),
        "inlineStr" => content.inline.map(EnumCellValue::String),
        "str" | "e" | "d" => content.value.map(EnumCellValue::String),
        "b" => content.value.map(|v| {
            let c_value = v.trim();
            EnumCellValue::Boolean(c_value == "1" || c_value.eq_ignore_ascii_case("true"))
        }),
        _ => content
            .value
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(EnumCellValue::Number),
    };
    Ok(value.unwrap_or(EnumCellValue::None))
}

/// `(t attribute, inner XML)` for a value.
fn encode_cell_value(value: &EnumCellValue, p: &str) -> (Option<&'static str>, String) {
    match value {
        EnumCellValue::None => (None, String::new()),
        EnumCellValue::String(s) => {
            let c_space = if s.trim() != s || s.contains('\n') {
                " xml:space=\"preserve\""
            } else {
                ""
            };
            (
                Some("inlineStr"),
                format!("<{p}is><{p}t{c_space}>{}</{p}t></{p}is>", escape_xml(s)),
            )
        }
        EnumCellValue::Number(n) => (None, format!("<{p}v>{n}</{p}v>")),
        EnumCellValue::Boolean(b) => (Some("b"), format!("<{p}v>{}</{p}v>", u8::from(*b))),
        EnumCellValue::Formula(f) => (
            None,
            format!("<{p}f>{}</{p}f>", escape_xml(f.trim_start_matches('='))),
        ),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const C_SHEET_XML: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        r#"<dimension ref="A1:C3"/>"#,
        r#"<sheetViews><sheetView tabSelected="1" workbookViewId="0"/></sheetViews>"#,
        r#"<sheetData>"#,
        r#"<row r="1" spans="1:3" ht="20" customHeight="1">"#,
        r#"<c r="A1" s="3" t="s"><v>0</v></c><c r="B1" s="4"><v>12.5</v></c>"#,
        r#"</row>"#,
        r#"<row r="2"><c r="A2" t="inlineStr"><is><t>Tom &amp; Jerry</t></is></c>"#,
        r#"<c r="C2"><f>B1*2</f><v>25</v></c></row>"#,
        r#"<row r="3"><c r="A3" s="5"/></row>"#,
        r#"</sheetData>"#,
        r#"<mergeCells count="1"><mergeCell ref="A1:B1"/></mergeCells>"#,
        r#"<drawing r:id="rId2"/><legacyDrawing r:id="rId3"/>"#,
        r#"<tableParts count="1"><tablePart r:id="rId4"/></tableParts>"#,
        r#"</worksheet>"#,
    );

    fn addr(c: &str) -> SpecCellAddress {
        parse_cell_address(c).unwrap()
    }

    #[test]
    fn test_read_values_of_every_cell_kind() {
        let sheet = XlsxSheetXml::parse(C_SHEET_XML).unwrap();
        let l_shared = vec!["Label".to_string()];

        assert_eq!(
            sheet.read_value(addr("A1"), &l_shared).unwrap(),
            EnumCellValue::String("Label".to_string())
        );
        assert_eq!(
            sheet.read_value(addr("B1"), &l_shared).unwrap(),
            EnumCellValue::Number(12.5)
        );
        assert_eq!(
            sheet.read_value(addr("A2"), &l_shared).unwrap(),
            EnumCellValue::String("Tom & Jerry".to_string())
        );
        assert_eq!(
            sheet.read_value(addr("C2"), &l_shared).unwrap(),
            EnumCellValue::Formula("B1*2".to_string())
        );
        assert_eq!(sheet.read_value(addr("A3"), &l_shared).unwrap(), EnumCellValue::None);
        assert_eq!(sheet.read_value(addr("Z9"), &l_shared).unwrap(), EnumCellValue::None);
    }

    #[test]
    fn test_untouched_sheet_round_trips_except_spans() {
        let sheet = XlsxSheetXml::parse(C_SHEET_XML).unwrap();
        let c_out = sheet.to_xml().unwrap();
        assert_eq!(c_out, C_SHEET_XML.replace(r#" spans="1:3""#, ""));
    }

    #[test]
    fn test_write_value_keeps_style_and_updates_dimension() {
        let mut sheet = XlsxSheetXml::parse(C_SHEET_XML).unwrap();
        sheet.write_value(addr("A1"), &EnumCellValue::String(" padded ".to_string()));
        sheet.write_value(addr("D5"), &EnumCellValue::Number(7.0));
        sheet.write_value(addr("B2"), &EnumCellValue::Boolean(true));

        let c_out = sheet.to_xml().unwrap();
        assert!(c_out.contains(
            r#"<c r="A1" s="3" t="inlineStr"><is><t xml:space="preserve"> padded </t></is></c>"#
        ));
        assert!(c_out.contains(r#"<c r="B2" t="b"><v>1</v></c><c r="C2">"#));
        assert!(c_out.contains(r#"<row r="5"><c r="D5"><v>7</v></c></row>"#));
        assert!(c_out.contains(r#"<dimension ref="A1:D5"/>"#));

        let reparsed = XlsxSheetXml::parse(&c_out).unwrap();
        assert_eq!(
            reparsed.read_value(addr("A1"), &[]).unwrap(),
            EnumCellValue::String(" padded ".to_string())
        );
        assert_eq!(reparsed.n_row_max_used(), 5);
    }

    #[test]
    fn test_max_used_row_ignores_style_only_cells() {
        let sheet = XlsxSheetXml::parse(C_SHEET_XML).unwrap();
        assert_eq!(sheet.n_row_max_used(), 2);
        assert_eq!(sheet.n_row_max_used_in_column(1), 2);
        assert_eq!(sheet.n_row_max_used_in_column(3), 2);
        assert_eq!(sheet.n_row_max_used_in_column(4), 0);
    }

    #[test]
    fn test_prepare_for_copy_strips_unshared_parts() {
        let mut sheet = XlsxSheetXml::parse(C_SHEET_XML).unwrap();
        sheet.prepare_for_copy().unwrap();
        let c_out = sheet.to_xml().unwrap();

        assert!(!c_out.contains("tabSelected"));
        assert!(!c_out.contains("<drawing"));
        assert!(!c_out.contains("legacyDrawing"));
        assert!(!c_out.contains("tablePart"));
        assert!(c_out.contains(r#"<mergeCell ref="A1:B1"/>"#));
        assert!(c_out.ends_with("</mergeCells></worksheet>"));
    }

    #[test]
    fn test_empty_sheet_data_and_clear_rows() {
        let mut sheet = XlsxSheetXml::parse(crate::conf::C_XML_WORKSHEET_EMPTY).unwrap();
        assert_eq!(sheet.n_row_max_used(), 0);
        sheet.write_value(addr("B2"), &EnumCellValue::Formula("=SUM(A1:A3)".to_string()));
        let c_out = sheet.to_xml().unwrap();
        assert!(c_out.contains(r#"<sheetData><row r="2"><c r="B2"><f>SUM(A1:A3)</f></c></row></sheetData>"#));
        assert!(c_out.contains(r#"<dimension ref="B2"/>"#));

        sheet.clear_rows();
        assert!(sheet.to_xml().unwrap().contains("<sheetData/>"));
    }
}
