//! Template-preserving workbook editor.
//!
//! `XlsxWorkbook` loads an existing `.xlsx`, lets callers copy and delete
//! sheets and write cells, and serializes back to bytes. Parts that are never
//! touched are written back unchanged, so styles, column widths, merges and
//! conditional formats of the template survive.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::conf::{
    C_CONTENT_TYPE_WORKSHEET, C_DIR_WORKSHEETS, C_PART_CALC_CHAIN, C_PART_CONTENT_TYPES,
    C_PART_SHARED_STRINGS, C_PART_WORKBOOK, C_PART_WORKBOOK_RELS, C_REL_TYPE_CALC_CHAIN,
    C_REL_TYPE_WORKSHEET, C_XML_WORKSHEET_EMPTY, N_NROWS_EXCEL_MAX, TUP_REL_TYPES_SHAREABLE,
};
use crate::package::{
    SpecContentTypes, SpecRelationship, SpecSheetRemoval, SpecWorkbookSheet, XlsxPackage,
    derive_next_rel_id, derive_rels_part_path, parse_active_tab, parse_relationships,
    parse_shared_strings, parse_workbook_sheets, resolve_part_path, rewrite_workbook_xml,
    write_relationships,
};
use crate::sheet::XlsxSheetXml;
use crate::spec::{EnumCellValue, SpecCellAddress, SpecXlsxReport, XlsxError};
use crate::tabular::derive_cell_grid;
use crate::util::{
    coerce_cell_value, convert_text_to_cell_value, is_same_sheet_name, parse_cell_address,
    parse_column_letters, validate_sheet_name,
};

/// In-memory workbook loaded from a template.
#[derive(Debug, Clone)]
pub struct XlsxWorkbook {
    package: XlsxPackage,
    l_sheets: Vec<SpecWorkbookSheet>,
    l_rels: Vec<SpecRelationship>,
    content_types: SpecContentTypes,
    l_shared_strings: Vec<String>,
    /// Worksheet models edited so far, keyed by part path.
    dict_sheet_models: BTreeMap<String, XlsxSheetXml>,
    if_recalc_flagged: bool,
}

impl XlsxWorkbook {
    ////////////////////////////////////////////////////////////////////////////
    // #region Loading

    /// Load a workbook from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, XlsxError> {
        let path = path.as_ref();
        let v_bytes = std::fs::read(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => XlsxError::FileNotFound(path.to_path_buf()),
            _ => XlsxError::Io(err),
        })?;
        let workbook = Self::from_bytes(&v_bytes)?;
        debug!(path = %path.display(), sheets = workbook.l_sheets.len(), "workbook opened");
        Ok(workbook)
    }

    pub fn from_bytes(v_bytes: &[u8]) -> Result<Self, XlsxError> {
        let package = XlsxPackage::from_bytes(v_bytes)?;
        let l_sheets = parse_workbook_sheets(package.require_part(C_PART_WORKBOOK)?)?;
        let l_rels = match package.part(C_PART_WORKBOOK_RELS) {
            Some(v_xml) => parse_relationships(v_xml)?,
            None => Vec::new(),
        };
        let content_types = SpecContentTypes::parse(package.require_part(C_PART_CONTENT_TYPES)?)?;
        let l_shared_strings = match package.part(C_PART_SHARED_STRINGS) {
            Some(v_xml) => parse_shared_strings(v_xml)?,
            None => Vec::new(),
        };

        Ok(Self {
            package,
            l_sheets,
            l_rels,
            content_types,
            l_shared_strings,
            dict_sheet_models: BTreeMap::new(),
            if_recalc_flagged: false,
        })
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Sheets

    /// Sheet names in tab order.
    pub fn list_sheets(&self) -> Vec<String> {
        self.l_sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    /// Sheet the workbook opens on (`workbookView/@activeTab`).
    pub fn active_sheet(&self) -> Result<Option<String>, XlsxError> {
        let n_idx = parse_active_tab(self.package.require_part(C_PART_WORKBOOK)?)?;
        Ok(self
            .l_sheets
            .get(n_idx)
            .or_else(|| self.l_sheets.first())
            .map(|sheet| sheet.name.clone()))
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.find_sheet_idx(name).is_some()
    }

    /// Copy `source` to a new sheet `new_name` appended after the last tab.
    ///
    /// Values, formulas, styles, column widths, row heights, merges,
    /// conditional formats and data validations are copied. Drawings, tables,
    /// comments and embedded objects are not.
    pub fn duplicate_sheet(&mut self, source: &str, new_name: &str) -> Result<(), XlsxError> {
        let n_idx_source = self.require_sheet_idx(source)?;
        if self.has_sheet(new_name) {
            return Err(XlsxError::DuplicateName(new_name.to_string()));
        }
        validate_sheet_name(new_name)?;

        let c_part_source = self.sheet_part_path(n_idx_source)?;
        let mut model = self.sheet_model_at(&c_part_source)?.into_owned();
        model.prepare_for_copy()?;
        let l_rels_kept: Vec<SpecRelationship> =
            match self.package.part(&derive_rels_part_path(&c_part_source)) {
                Some(v_xml) => parse_relationships(v_xml)?
                    .into_iter()
                    .filter(|rel| TUP_REL_TYPES_SHAREABLE.contains(&rel.type_uri.as_str()))
                    .collect(),
                None => Vec::new(),
            };

        self.flag_recalc_on_load()?;
        self.append_sheet(new_name, model, &l_rels_kept)?;
        debug!(source, sheet = new_name, "sheet duplicated");
        Ok(())
    }

    /// Delete every listed sheet that exists; absent names are ignored.
    ///
    /// Returns the names actually removed. The last remaining sheet is never
    /// removed since a workbook needs at least one.
    pub fn remove_sheets<S: AsRef<str>>(&mut self, l_names: &[S]) -> Result<Vec<String>, XlsxError> {
        let mut l_removed = Vec::new();
        for name in l_names {
            let name = name.as_ref();
            let Some(n_idx) = self.find_sheet_idx(name) else {
                debug!(sheet = name, "sheet not present; nothing to remove");
                continue;
            };
            if self.l_sheets.len() == 1 {
                warn!(sheet = name, "refusing to remove the only sheet of the workbook");
                continue;
            }
            l_removed.push(self.remove_sheet_at(n_idx)?);
        }
        Ok(l_removed)
    }

    /// Create (or replace) `name` holding `l_rows` from `A1`.
    ///
    /// Each cell is written with its own type, so text such as `00042` stays
    /// text and blank header cells stay blank.
    pub fn create_sheet_from_tabular(
        &mut self,
        name: &str,
        l_rows: &[Vec<EnumCellValue>],
    ) -> Result<(), XlsxError> {
        validate_sheet_name(name)?;
        validate_row_span(1, l_rows.len())?;

        let mut model = XlsxSheetXml::parse(C_XML_WORKSHEET_EMPTY)?;
        write_grid(&mut model, 1, l_rows);

        self.flag_recalc_on_load()?;
        if let Some(n_idx) = self.find_sheet_idx(name) {
            self.remove_sheet_at(n_idx)?;
        }
        self.append_sheet(name, model, &[])?;
        debug!(sheet = name, rows = l_rows.len(), "sheet created from tabular data");
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Cells

    pub fn read_cell(&self, sheet: &str, address: &str) -> Result<EnumCellValue, XlsxError> {
        let address = parse_cell_address(address)?;
        let n_idx = self.require_sheet_idx(sheet)?;
        let model = self.sheet_model_at(&self.sheet_part_path(n_idx)?)?;
        model.read_value(address, &self.l_shared_strings)
    }

    /// Write `value` as given (no coercion), keeping the cell's style.
    pub fn write_cell(
        &mut self,
        sheet: &str,
        address: &str,
        value: &EnumCellValue,
    ) -> Result<(), XlsxError> {
        let address = parse_cell_address(address)?;
        let model = self.sheet_model_mut(sheet)?;
        model.write_value(address, value);
        Ok(())
    }

    /// Append the rows of `df` below the last used row.
    ///
    /// With `if_include_header_once` the first row of `df` is a header and
    /// is dropped when the sheet already has content. Column names are never
    /// written. Returns the number of rows written.
    pub fn append_rows(
        &mut self,
        sheet: &str,
        df: &DataFrame,
        if_include_header_once: bool,
    ) -> Result<usize, XlsxError> {
        let n_idx = self.require_sheet_idx(sheet)?;
        let n_row_max = self.sheet_model_at(&self.sheet_part_path(n_idx)?)?.n_row_max_used();

        let mut l_grid = derive_cell_grid(df)?;
        if n_row_max > 0 && if_include_header_once && !l_grid.is_empty() {
            l_grid.remove(0);
        }
        validate_row_span(n_row_max + 1, l_grid.len())?;

        let model = self.sheet_model_mut(sheet)?;
        write_grid(model, n_row_max + 1, &l_grid);
        debug!(sheet, start_row = n_row_max + 1, rows = l_grid.len(), "rows appended");
        Ok(l_grid.len())
    }

    /// Delete all rows then paste the rows of `df` from `A1`; nulls are
    /// skipped and column names are not written.
    pub fn overwrite_sheet(&mut self, sheet: &str, df: &DataFrame) -> Result<usize, XlsxError> {
        self.require_sheet_idx(sheet)?;
        let l_grid = derive_cell_grid(df)?;
        validate_row_span(1, l_grid.len())?;

        let model = self.sheet_model_mut(sheet)?;
        model.clear_rows();
        write_grid(model, 1, &l_grid);
        debug!(sheet, rows = l_grid.len(), "sheet overwritten");
        Ok(l_grid.len())
    }

    /// Write `l_values` downward from `start`, each coerced to a number when
    /// it parses as one.
    pub fn write_column_from_sequence<S: AsRef<str>>(
        &mut self,
        sheet: &str,
        start: &str,
        l_values: &[S],
    ) -> Result<SpecXlsxReport, XlsxError> {
        let address_start = parse_cell_address(start)?;
        validate_row_span(address_start.n_row, l_values.len())?;

        let model = self.sheet_model_mut(sheet)?;
        let mut report = SpecXlsxReport::default();
        for (n_offset, c_value) in l_values.iter().enumerate() {
            let address = address_start.offset_rows(n_offset as u32);
            model.write_value(address, &convert_text_to_cell_value(c_value.as_ref()));
            report.cells.push(address.to_string());
        }
        debug!(sheet, start, values = l_values.len(), "column written");
        Ok(report)
    }

    /// Text of every cell in `column` from row 1 to its last used row, joined
    /// by `\n`. Blank cells contribute empty lines.
    pub fn read_column_as_text(&self, sheet: &str, column: &str) -> Result<String, XlsxError> {
        let n_col = parse_column_letters(column)?;
        let n_idx = self.require_sheet_idx(sheet)?;
        let model = self.sheet_model_at(&self.sheet_part_path(n_idx)?)?;

        let n_row_last = model.n_row_max_used_in_column(n_col);
        let mut l_lines = Vec::with_capacity(n_row_last as usize);
        for n_row in 1..=n_row_last {
            let value = model.read_value(SpecCellAddress::new(n_row, n_col), &self.l_shared_strings)?;
            l_lines.push(value.to_text());
        }
        Ok(l_lines.join("\n"))
    }

    /// Write each key of `dict_values` that has an address in
    /// `dict_address_by_key`. Keys without an address are skipped and
    /// reported as warnings. Every address is validated before any write.
    pub fn write_key_value_batch(
        &mut self,
        sheet: &str,
        dict_values: &BTreeMap<String, EnumCellValue>,
        dict_address_by_key: &BTreeMap<String, String>,
    ) -> Result<SpecXlsxReport, XlsxError> {
        self.require_sheet_idx(sheet)?;

        let mut report = SpecXlsxReport::default();
        let mut l_planned: Vec<(SpecCellAddress, EnumCellValue)> = Vec::new();
        for (key, value) in dict_values {
            match dict_address_by_key.get(key) {
                Some(c_address) => {
                    l_planned.push((parse_cell_address(c_address)?, coerce_cell_value(value)))
                }
                None => {
                    warn!(sheet, key = %key, "no cell mapping for key; value skipped");
                    report.warn(format!("No cell mapping for key {key:?}; value skipped."));
                }
            }
        }

        let model = self.sheet_model_mut(sheet)?;
        for (address, value) in &l_planned {
            model.write_value(*address, value);
            report.cells.push(address.to_string());
        }
        Ok(report)
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Output

    /// Encode the current in-memory state as `.xlsx` bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, XlsxError> {
        let mut package = self.package.clone();
        for (c_part, model) in &self.dict_sheet_models {
            package.set_part(c_part, model.to_xml()?.into_bytes());
        }
        package.to_bytes()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), XlsxError> {
        std::fs::write(path.as_ref(), self.serialize()?)?;
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Internals

    /// Exact match first, then Excel's case-insensitive match.
    fn find_sheet_idx(&self, name: &str) -> Option<usize> {
        self.l_sheets
            .iter()
            .position(|sheet| sheet.name == name)
            .or_else(|| {
                self.l_sheets
                    .iter()
                    .position(|sheet| is_same_sheet_name(&sheet.name, name))
            })
    }

    fn require_sheet_idx(&self, name: &str) -> Result<usize, XlsxError> {
        self.find_sheet_idx(name)
            .ok_or_else(|| XlsxError::SheetNotFound(name.to_string()))
    }

    fn sheet_part_path(&self, n_idx: usize) -> Result<String, XlsxError> {
        let sheet = &self.l_sheets[n_idx];
        self.l_rels
            .iter()
            .find(|rel| rel.id == sheet.rel_id)
            .map(|rel| resolve_part_path("xl", &rel.target))
            .ok_or_else(|| {
                XlsxError::Package(format!(
                    "sheet {:?} has no workbook relationship {}",
                    sheet.name, sheet.rel_id
                ))
            })
    }

    fn sheet_model_at(&self, c_part: &str) -> Result<Cow<'_, XlsxSheetXml>, XlsxError> {
        if let Some(model) = self.dict_sheet_models.get(c_part) {
            return Ok(Cow::Borrowed(model));
        }
        Ok(Cow::Owned(parse_sheet_part(&self.package, c_part)?))
    }

    /// Editable model of `sheet`; marks the workbook for recalculation.
    fn sheet_model_mut(&mut self, sheet: &str) -> Result<&mut XlsxSheetXml, XlsxError> {
        let n_idx = self.require_sheet_idx(sheet)?;
        let c_part = self.sheet_part_path(n_idx)?;
        self.flag_recalc_on_load()?;

        match self.dict_sheet_models.entry(c_part) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let model = parse_sheet_part(&self.package, entry.key())?;
                Ok(entry.insert(model))
            }
        }
    }

    /// Drop the calculation chain and force a full recalculation on open.
    fn flag_recalc_on_load(&mut self) -> Result<(), XlsxError> {
        if self.if_recalc_flagged {
            return Ok(());
        }
        self.package.remove_part(C_PART_CALC_CHAIN);
        self.l_rels.retain(|rel| rel.type_uri != C_REL_TYPE_CALC_CHAIN);
        self.content_types.remove_override(C_PART_CALC_CHAIN);
        self.if_recalc_flagged = true;
        self.sync_workbook_parts(None)
    }

    fn sync_workbook_parts(&mut self, removal: Option<&SpecSheetRemoval>) -> Result<(), XlsxError> {
        let v_workbook_xml = rewrite_workbook_xml(
            self.package.require_part(C_PART_WORKBOOK)?,
            &self.l_sheets,
            removal,
        )?;
        self.package.set_part(C_PART_WORKBOOK, v_workbook_xml);
        self.package
            .set_part(C_PART_WORKBOOK_RELS, write_relationships(&self.l_rels));
        self.package
            .set_part(C_PART_CONTENT_TYPES, self.content_types.to_xml());
        Ok(())
    }

    fn append_sheet(
        &mut self,
        name: &str,
        model: XlsxSheetXml,
        l_sheet_rels: &[SpecRelationship],
    ) -> Result<(), XlsxError> {
        let mut n_file = 1usize;
        while self
            .package
            .has_part(&format!("{C_DIR_WORKSHEETS}/sheet{n_file}.xml"))
        {
            n_file += 1;
        }
        let c_part = format!("{C_DIR_WORKSHEETS}/sheet{n_file}.xml");
        let c_rel_id = derive_next_rel_id(&self.l_rels);
        let n_sheet_id = self.l_sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;

        self.package.set_part(&c_part, model.to_xml()?.into_bytes());
        if !l_sheet_rels.is_empty() {
            self.package
                .set_part(&derive_rels_part_path(&c_part), write_relationships(l_sheet_rels));
        }
        self.dict_sheet_models.insert(c_part.clone(), model);
        self.content_types
            .set_override(&c_part, C_CONTENT_TYPE_WORKSHEET);
        self.l_rels.push(SpecRelationship {
            id: c_rel_id.clone(),
            type_uri: C_REL_TYPE_WORKSHEET.to_string(),
            target: format!("worksheets/sheet{n_file}.xml"),
            target_mode: None,
        });
        self.l_sheets.push(SpecWorkbookSheet {
            name: name.to_string(),
            sheet_id: n_sheet_id,
            rel_id: c_rel_id,
            state: None,
        });
        self.sync_workbook_parts(None)
    }

    fn remove_sheet_at(&mut self, n_idx: usize) -> Result<String, XlsxError> {
        self.flag_recalc_on_load()?;
        let c_part = self.sheet_part_path(n_idx).ok();
        let sheet = self.l_sheets.remove(n_idx);

        if let Some(c_part) = c_part {
            self.package.remove_part(&c_part);
            self.package.remove_part(&derive_rels_part_path(&c_part));
            self.content_types.remove_override(&c_part);
            self.dict_sheet_models.remove(&c_part);
        }
        self.l_rels.retain(|rel| rel.id != sheet.rel_id);
        self.sync_workbook_parts(Some(&SpecSheetRemoval {
            n_idx,
            name: sheet.name.clone(),
        }))?;
        debug!(sheet = %sheet.name, "sheet removed");
        Ok(sheet.name)
    }

    // #endregion
}

fn parse_sheet_part(package: &XlsxPackage, c_part: &str) -> Result<XlsxSheetXml, XlsxError> {
    let v_xml = package.require_part(c_part)?;
    let c_xml = std::str::from_utf8(v_xml)
        .map_err(|err| XlsxError::Package(format!("{c_part} is not UTF-8: {err}")))?;
    XlsxSheetXml::parse(c_xml)
}

fn write_grid(model: &mut XlsxSheetXml, n_row_start: u32, l_grid: &[Vec<EnumCellValue>]) {
    for (n_offset, l_row) in l_grid.iter().enumerate() {
        let n_row = n_row_start + n_offset as u32;
        for (idx_col, value) in l_row.iter().enumerate() {
            if value.is_none() {
                continue;
            }
            model.write_value(SpecCellAddress::new(n_row, idx_col as u32 + 1), value);
        }
    }
}

fn validate_row_span(n_row_start: u32, n_rows: usize) -> Result<(), XlsxError> {
    let n_row_end = n_row_start as u64 + n_rows as u64;
    if n_rows > 0 && n_row_end - 1 > N_NROWS_EXCEL_MAX as u64 {
        return Err(XlsxError::invalid_address(
            &SpecCellAddress::new(n_row_start, 1).to_string(),
            format!("{n_rows} rows do not fit below row {n_row_start}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, DataFrame};
    use rust_xlsxwriter::{Format, Workbook};

    fn build_template() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let fmt_bold = Format::new().set_bold();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Base").unwrap();
        sheet.write_string_with_format(0, 0, "Promo", &fmt_bold).unwrap();
        sheet.write_number(1, 1, 5.0).unwrap();
        sheet.write_formula(2, 1, "=B2*2").unwrap();
        sheet.set_column_width(0, 30).unwrap();

        let sheet = workbook.add_worksheet();
        sheet.set_name("SQL").unwrap();
        sheet.write_string(0, 0, "select *").unwrap();
        sheet.write_string(2, 0, "where qualify_start=''").unwrap();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Items").unwrap();
        sheet.write_string(0, 0, "Article").unwrap();
        sheet.write_string(1, 0, "A-0").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    /// Raw upload rows: header, then two articles. `C1` is blank.
    fn df_articles() -> DataFrame {
        let text = |c: &str| Some(c.to_string());
        DataFrame::new(vec![
            Column::new("column_1".into(), vec![text("Article"), text("00042"), text("A-2")]),
            Column::new("column_2".into(), vec![text("Qty"), text("4"), None]),
            Column::new("column_3".into(), vec![None, text("note"), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_open_missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = XlsxWorkbook::open(dir.path().join("absent.xlsx")).unwrap_err();
        assert!(matches!(err, XlsxError::FileNotFound(_)));
    }

    #[test]
    fn test_duplicate_sheet_copies_content_and_style() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        workbook.duplicate_sheet("Base", "Promo_Qual").unwrap();
        assert_eq!(workbook.list_sheets(), vec!["Base", "SQL", "Items", "Promo_Qual"]);

        let reopened = XlsxWorkbook::from_bytes(&workbook.serialize().unwrap()).unwrap();
        assert_eq!(
            reopened.read_cell("Promo_Qual", "A1").unwrap(),
            EnumCellValue::String("Promo".to_string())
        );
        assert_eq!(
            reopened.read_cell("Promo_Qual", "B3").unwrap(),
            EnumCellValue::Formula("B2*2".to_string())
        );

        let model_base = reopened.sheet_model_at("xl/worksheets/sheet1.xml").unwrap();
        let model_copy = reopened.sheet_model_at("xl/worksheets/sheet4.xml").unwrap();
        let c_style = |m: &XlsxSheetXml| {
            m.cell(SpecCellAddress::new(1, 1))
                .and_then(|c| c.attr("s").map(str::to_string))
        };
        assert!(c_style(model_base.as_ref()).is_some());
        assert_eq!(c_style(model_base.as_ref()), c_style(model_copy.as_ref()));
        assert!(model_copy.to_xml().unwrap().contains("<cols>"));
    }

    #[test]
    fn test_active_sheet_follows_workbook_view() {
        let workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        assert_eq!(workbook.active_sheet().unwrap().as_deref(), Some("Base"));

        let mut template = Workbook::new();
        template.add_worksheet().set_name("Notes").unwrap();
        let sheet = template.add_worksheet();
        sheet.set_name("Form").unwrap();
        sheet.set_active(true);
        let workbook = XlsxWorkbook::from_bytes(&template.save_to_buffer().unwrap()).unwrap();
        assert_eq!(workbook.active_sheet().unwrap().as_deref(), Some("Form"));
    }

    #[test]
    fn test_duplicate_sheet_errors() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        assert!(matches!(
            workbook.duplicate_sheet("Nope", "X"),
            Err(XlsxError::SheetNotFound(_))
        ));
        assert!(matches!(
            workbook.duplicate_sheet("Base", "sql"),
            Err(XlsxError::DuplicateName(_))
        ));
        assert!(matches!(
            workbook.duplicate_sheet("Base", "a/b"),
            Err(XlsxError::InvalidSheetName { .. })
        ));
        assert_eq!(workbook.list_sheets().len(), 3);
    }

    #[test]
    fn test_write_and_read_cells() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        workbook
            .write_cell("Base", "D4", &EnumCellValue::String("01/15/2024 - 01/29/2024".into()))
            .unwrap();
        workbook.write_cell("Base", "$E$5", &EnumCellValue::Number(25.0)).unwrap();

        assert!(matches!(
            workbook.write_cell("Base", "5E", &EnumCellValue::None),
            Err(XlsxError::InvalidAddress { .. })
        ));
        assert!(matches!(
            workbook.read_cell("Missing", "A1"),
            Err(XlsxError::SheetNotFound(_))
        ));

        let reopened = XlsxWorkbook::from_bytes(&workbook.serialize().unwrap()).unwrap();
        assert_eq!(
            reopened.read_cell("Base", "D4").unwrap(),
            EnumCellValue::String("01/15/2024 - 01/29/2024".to_string())
        );
        assert_eq!(reopened.read_cell("Base", "E5").unwrap(), EnumCellValue::Number(25.0));
        assert_eq!(reopened.read_cell("Base", "B2").unwrap(), EnumCellValue::Number(5.0));

        let c_workbook_xml =
            String::from_utf8(reopened.package.part(C_PART_WORKBOOK).unwrap().to_vec()).unwrap();
        assert!(c_workbook_xml.contains("fullCalcOnLoad=\"1\""));
    }

    #[test]
    fn test_remove_sheets_is_idempotent() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        let l_removed = workbook.remove_sheets(&["SQL", "Ghost"]).unwrap();
        assert_eq!(l_removed, vec!["SQL"]);
        assert_eq!(workbook.list_sheets(), vec!["Base", "Items"]);

        let v_first = workbook.serialize().unwrap();
        let mut reopened = XlsxWorkbook::from_bytes(&v_first).unwrap();
        assert!(reopened.remove_sheets(&["SQL"]).unwrap().is_empty());
        assert_eq!(reopened.list_sheets(), vec!["Base", "Items"]);
        assert!(!reopened.package.has_part("xl/worksheets/sheet2.xml"));
    }

    #[test]
    fn test_remove_sheets_keeps_last_sheet() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        let l_removed = workbook.remove_sheets(&["Base", "SQL", "Items"]).unwrap();
        assert_eq!(l_removed, vec!["Base", "SQL"]);
        assert_eq!(workbook.list_sheets(), vec!["Items"]);
    }

    #[test]
    fn test_write_column_from_sequence_coerces_numbers() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        let report = workbook
            .write_column_from_sequence("Base", "B2", &["100", "abc", "3.5"])
            .unwrap();
        assert_eq!(report.cells, vec!["B2", "B3", "B4"]);

        assert_eq!(workbook.read_cell("Base", "B2").unwrap(), EnumCellValue::Number(100.0));
        assert_eq!(
            workbook.read_cell("Base", "B3").unwrap(),
            EnumCellValue::String("abc".to_string())
        );
        assert_eq!(workbook.read_cell("Base", "B4").unwrap(), EnumCellValue::Number(3.5));
    }

    #[test]
    fn test_read_column_as_text_keeps_blank_lines() {
        let workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        assert_eq!(
            workbook.read_column_as_text("SQL", "A").unwrap(),
            "select *\n\nwhere qualify_start=''"
        );
        assert_eq!(workbook.read_column_as_text("SQL", "C").unwrap(), "");
    }

    #[test]
    fn test_append_rows_drops_header_on_non_empty_sheet() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        let n_rows = workbook.append_rows("Items", &df_articles(), true).unwrap();
        assert_eq!(n_rows, 2);

        assert_eq!(
            workbook.read_cell("Items", "A3").unwrap(),
            EnumCellValue::String("00042".to_string())
        );
        assert_eq!(
            workbook.read_cell("Items", "B3").unwrap(),
            EnumCellValue::String("4".to_string())
        );
        assert_eq!(workbook.read_cell("Items", "B4").unwrap(), EnumCellValue::None);
        assert_eq!(
            workbook.read_column_as_text("Items", "A").unwrap(),
            "Article\nA-0\n00042\nA-2"
        );
    }

    #[test]
    fn test_append_rows_writes_header_on_empty_sheet() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        workbook.overwrite_sheet("Items", &DataFrame::empty()).unwrap();
        assert_eq!(workbook.append_rows("Items", &df_articles(), true).unwrap(), 3);
        assert_eq!(
            workbook.read_column_as_text("Items", "A").unwrap(),
            "Article\n00042\nA-2"
        );
    }

    #[test]
    fn test_overwrite_sheet_replaces_all_rows() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        workbook.overwrite_sheet("Items", &df_articles()).unwrap();

        assert_eq!(
            workbook.read_column_as_text("Items", "A").unwrap(),
            "Article\n00042\nA-2"
        );
        assert_eq!(
            workbook.read_cell("Items", "B2").unwrap(),
            EnumCellValue::String("4".to_string())
        );
        assert_eq!(workbook.read_cell("Items", "B3").unwrap(), EnumCellValue::None);
    }

    #[test]
    fn test_create_sheet_from_tabular_replaces_existing() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        let l_rows = derive_cell_grid(&df_articles()).unwrap();
        workbook.create_sheet_from_tabular("Raw", &[vec![EnumCellValue::Number(1.0)]]).unwrap();
        workbook.create_sheet_from_tabular("Raw", &l_rows).unwrap();
        assert_eq!(workbook.list_sheets(), vec!["Base", "SQL", "Items", "Raw"]);

        let reopened = XlsxWorkbook::from_bytes(&workbook.serialize().unwrap()).unwrap();
        assert_eq!(
            reopened.read_column_as_text("Raw", "A").unwrap(),
            "Article\n00042\nA-2"
        );
        assert_eq!(
            reopened.read_cell("Raw", "B1").unwrap(),
            EnumCellValue::String("Qty".to_string())
        );
        assert_eq!(reopened.read_cell("Raw", "C1").unwrap(), EnumCellValue::None);
        assert_eq!(
            reopened.read_cell("Raw", "C2").unwrap(),
            EnumCellValue::String("note".to_string())
        );
    }

    #[test]
    fn test_write_key_value_batch_reports_unmapped_keys() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        let dict_values = BTreeMap::from([
            ("MetricA".to_string(), EnumCellValue::String("100".to_string())),
            ("MetricB".to_string(), EnumCellValue::String("n/a".to_string())),
            ("Unknown".to_string(), EnumCellValue::String("1".to_string())),
        ]);
        let dict_address = BTreeMap::from([
            ("MetricA".to_string(), "F10".to_string()),
            ("MetricB".to_string(), "F11".to_string()),
        ]);

        let report = workbook
            .write_key_value_batch("Base", &dict_values, &dict_address)
            .unwrap();
        assert_eq!(report.cells, vec!["F10", "F11"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Unknown"));
        assert_eq!(workbook.read_cell("Base", "F10").unwrap(), EnumCellValue::Number(100.0));
        assert_eq!(
            workbook.read_cell("Base", "F11").unwrap(),
            EnumCellValue::String("n/a".to_string())
        );
    }

    #[test]
    fn test_write_key_value_batch_validates_before_writing() {
        let mut workbook = XlsxWorkbook::from_bytes(&build_template()).unwrap();
        let dict_values = BTreeMap::from([
            ("a".to_string(), EnumCellValue::Number(1.0)),
            ("b".to_string(), EnumCellValue::Number(2.0)),
        ]);
        let dict_address = BTreeMap::from([
            ("a".to_string(), "G1".to_string()),
            ("b".to_string(), "not-a-cell".to_string()),
        ]);
        assert!(workbook
            .write_key_value_batch("Base", &dict_values, &dict_address)
            .is_err());
        assert_eq!(workbook.read_cell("Base", "G1").unwrap(), EnumCellValue::None);
    }
}
