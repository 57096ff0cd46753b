//! OOXML package access: ZIP parts, relationships, content types and the
//! workbook sheet index.
//!
//! Parts are held as raw bytes keyed by their package path (no leading `/`).
//! Only the parts the workbook layer edits are ever re-encoded; everything
//! else (styles, themes, drawings, custom XML) round-trips byte-for-byte.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::conf::{
    C_NS_PACKAGE_RELATIONSHIPS, C_PART_CONTENT_TYPES, TUP_WORKBOOK_ELEMENTS_AFTER_CALC_PR,
};
use crate::spec::XlsxError;

////////////////////////////////////////////////////////////////////////////////
// #region Package

/// In-memory ZIP container of workbook parts.
#[derive(Debug, Clone, Default)]
pub struct XlsxPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl XlsxPackage {
    /// Inflate every part of an XLSX archive.
    pub fn from_bytes(v_bytes: &[u8]) -> Result<Self, XlsxError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(v_bytes))?;
        let mut parts = BTreeMap::new();
        for idx in 0..archive.len() {
            let mut file = archive.by_index(idx)?;
            if file.is_dir() {
                continue;
            }
            let c_name = normalize_part_name(file.name()).to_string();
            let mut v_buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut v_buf)?;
            parts.insert(c_name, v_buf);
        }

        if !parts.contains_key(C_PART_CONTENT_TYPES) {
            return Err(XlsxError::Package(format!(
                "archive has no {C_PART_CONTENT_TYPES} part"
            )));
        }
        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .get(normalize_part_name(name))
            .map(|v| v.as_slice())
    }

    /// Like [`Self::part`] but a missing part is a package error.
    pub fn require_part(&self, name: &str) -> Result<&[u8], XlsxError> {
        self.part(name)
            .ok_or_else(|| XlsxError::Package(format!("missing part {name}")))
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(normalize_part_name(name))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn set_part(&mut self, name: &str, v_bytes: Vec<u8>) {
        self.parts
            .insert(normalize_part_name(name).to_string(), v_bytes);
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(normalize_part_name(name))
    }

    /// Deflate the package. `[Content_Types].xml` is always the first entry.
    pub fn to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let l_names = std::iter::once(C_PART_CONTENT_TYPES).chain(
            self.parts
                .keys()
                .map(String::as_str)
                .filter(|name| *name != C_PART_CONTENT_TYPES),
        );
        for c_name in l_names {
            let Some(v_bytes) = self.parts.get(c_name) else {
                continue;
            };
            zip.start_file(c_name, options)?;
            zip.write_all(v_bytes)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

fn normalize_part_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_part_path(c_base_dir: &str, c_target: &str) -> String {
    if let Some(c_abs) = c_target.strip_prefix('/') {
        return c_abs.to_string();
    }
    let mut l_segments: Vec<&str> = c_base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for c_seg in c_target.split('/') {
        match c_seg {
            "" | "." => {}
            ".." => {
                l_segments.pop();
            }
            _ => l_segments.push(c_seg),
        }
    }
    l_segments.join("/")
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`.
pub fn derive_rels_part_path(c_part: &str) -> String {
    match c_part.rsplit_once('/') {
        Some((c_dir, c_file)) => format!("{c_dir}/_rels/{c_file}.rels"),
        None => format!("_rels/{c_part}.rels"),
    }
}

pub(crate) fn escape_xml(c_text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(c_text)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Relationships

/// One `<Relationship>` entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecRelationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl SpecRelationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"))
    }
}

pub fn parse_relationships(v_xml: &[u8]) -> Result<Vec<SpecRelationship>, XlsxError> {
    let mut reader = Reader::from_reader(v_xml);
    reader.config_mut().trim_text(true);
    let mut v_buf = Vec::new();
    let mut l_rels = Vec::new();

    loop {
        match reader.read_event_into(&mut v_buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut rel = SpecRelationship::default();
                for attr in e.attributes() {
                    let attr = attr?;
                    let c_value = attr.unescape_value()?.into_owned();
                    match attr.key.local_name().as_ref() {
                        b"Id" => rel.id = c_value,
                        b"Type" => rel.type_uri = c_value,
                        b"Target" => rel.target = c_value,
                        b"TargetMode" => rel.target_mode = Some(c_value),
                        _ => {}
                    }
                }
                l_rels.push(rel);
            }
            Event::Eof => break,
            _ => {}
        }
        v_buf.clear();
    }
    Ok(l_rels)
}

pub fn write_relationships(l_rels: &[SpecRelationship]) -> Vec<u8> {
    let mut c_xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
    c_xml.push_str(&format!(
        "<Relationships xmlns=\"{C_NS_PACKAGE_RELATIONSHIPS}\">"
    ));
    for rel in l_rels {
        c_xml.push_str(&format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"",
            escape_xml(&rel.id),
            escape_xml(&rel.type_uri),
            escape_xml(&rel.target)
        ));
        if let Some(c_mode) = &rel.target_mode {
            c_xml.push_str(&format!(" TargetMode=\"{}\"", escape_xml(c_mode)));
        }
        c_xml.push_str("/>");
    }
    c_xml.push_str("</Relationships>");
    c_xml.into_bytes()
}

/// Smallest `rIdN` not yet used in `l_rels`.
pub fn derive_next_rel_id(l_rels: &[SpecRelationship]) -> String {
    let mut n_idx = 1usize;
    loop {
        let c_candidate = format!("rId{n_idx}");
        if !l_rels.iter().any(|rel| rel.id == c_candidate) {
            return c_candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ContentTypes

/// Parsed `[Content_Types].xml`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecContentTypes {
    /// `(extension, content type)` pairs.
    pub l_defaults: Vec<(String, String)>,
    /// `(part name with leading '/', content type)` pairs.
    pub l_overrides: Vec<(String, String)>,
}

impl SpecContentTypes {
    pub fn parse(v_xml: &[u8]) -> Result<Self, XlsxError> {
        let mut reader = Reader::from_reader(v_xml);
        reader.config_mut().trim_text(true);
        let mut v_buf = Vec::new();
        let mut out = Self::default();

        loop {
            match reader.read_event_into(&mut v_buf)? {
                Event::Start(e) | Event::Empty(e) => {
                    let c_local = e.local_name();
                    let if_default = c_local.as_ref() == b"Default";
                    let if_override = c_local.as_ref() == b"Override";
                    if if_default || if_override {
                        let mut c_key = String::new();
                        let mut c_type = String::new();
                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.local_name().as_ref() {
                                b"Extension" | b"PartName" => {
                                    c_key = attr.unescape_value()?.into_owned()
                                }
                                b"ContentType" => c_type = attr.unescape_value()?.into_owned(),
                                _ => {}
                            }
                        }
                        if if_default {
                            out.l_defaults.push((c_key, c_type));
                        } else {
                            out.l_overrides.push((c_key, c_type));
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            v_buf.clear();
        }
        Ok(out)
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut c_xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        c_xml.push_str(
            "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
        );
        for (c_ext, c_type) in &self.l_defaults {
            c_xml.push_str(&format!(
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape_xml(c_ext),
                escape_xml(c_type)
            ));
        }
        for (c_part, c_type) in &self.l_overrides {
            c_xml.push_str(&format!(
                "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                escape_xml(c_part),
                escape_xml(c_type)
            ));
        }
        c_xml.push_str("</Types>");
        c_xml.into_bytes()
    }

    pub fn set_override(&mut self, c_part: &str, c_type: &str) {
        let c_name = format!("/{}", normalize_part_name(c_part));
        match self.l_overrides.iter_mut().find(|(name, _)| *name == c_name) {
            Some(entry) => entry.1 = c_type.to_string(),
            None => self.l_overrides.push((c_name, c_type.to_string())),
        }
    }

    pub fn remove_override(&mut self, c_part: &str) {
        let c_name = format!("/{}", normalize_part_name(c_part));
        self.l_overrides.retain(|(name, _)| *name != c_name);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SharedStrings

/// Plain text of every `<si>` entry, rich-text runs concatenated and phonetic
/// runs skipped.
pub fn parse_shared_strings(v_xml: &[u8]) -> Result<Vec<String>, XlsxError> {
    let mut reader = Reader::from_reader(v_xml);
    reader.config_mut().trim_text(false);
    let mut v_buf = Vec::new();
    let mut l_strings = Vec::new();
    let mut c_current: Option<String> = None;
    let mut n_depth_phonetic = 0usize;
    let mut if_in_text = false;

    loop {
        match reader.read_event_into(&mut v_buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => c_current = Some(String::new()),
                b"rPh" => n_depth_phonetic += 1,
                b"t" => if_in_text = n_depth_phonetic == 0,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => l_strings.push(String::new()),
            Event::Text(e) if if_in_text => {
                if let Some(c_text) = c_current.as_mut() {
                    c_text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) if if_in_text => {
                if let Some(c_text) = c_current.as_mut() {
                    c_text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => l_strings.push(c_current.take().unwrap_or_default()),
                b"rPh" => n_depth_phonetic = n_depth_phonetic.saturating_sub(1),
                b"t" => if_in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        v_buf.clear();
    }
    Ok(l_strings)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorkbookIndex

/// One `<sheet>` entry of `xl/workbook.xml`, in tab order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecWorkbookSheet {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    /// `hidden` / `veryHidden`; `None` means visible.
    pub state: Option<String>,
}

/// A sheet removed from the tab list, identified by its former position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetRemoval {
    pub n_idx: usize,
    pub name: String,
}

pub fn parse_workbook_sheets(v_xml: &[u8]) -> Result<Vec<SpecWorkbookSheet>, XlsxError> {
    let mut reader = Reader::from_reader(v_xml);
    reader.config_mut().trim_text(true);
    let mut v_buf = Vec::new();
    let mut l_sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut v_buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut sheet = SpecWorkbookSheet {
                    name: String::new(),
                    sheet_id: 0,
                    rel_id: String::new(),
                    state: None,
                };
                for attr in e.attributes() {
                    let attr = attr?;
                    let c_value = attr.unescape_value()?.into_owned();
                    match attr.key.local_name().as_ref() {
                        b"name" => sheet.name = c_value,
                        b"sheetId" => sheet.sheet_id = c_value.trim().parse().unwrap_or(0),
                        b"id" => sheet.rel_id = c_value,
                        b"state" => sheet.state = Some(c_value),
                        _ => {}
                    }
                }
                if sheet.name.is_empty() || sheet.rel_id.is_empty() {
                    return Err(XlsxError::Package(
                        "workbook sheet entry lacks a name or relationship id".to_string(),
                    ));
                }
                l_sheets.push(sheet);
            }
            Event::Eof => break,
            _ => {}
        }
        v_buf.clear();
    }
    Ok(l_sheets)
}

/// Tab index of the first `workbookView`'s `activeTab`; `0` when absent.
pub fn parse_active_tab(v_xml: &[u8]) -> Result<usize, XlsxError> {
    let mut reader = Reader::from_reader(v_xml);
    let mut v_buf = Vec::new();
    loop {
        match reader.read_event_into(&mut v_buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"workbookView" => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"activeTab" {
                        return Ok(attr.unescape_value()?.trim().parse().unwrap_or(0));
                    }
                }
                return Ok(0);
            }
            Event::Start(e) if e.local_name().as_ref() == b"sheets" => return Ok(0),
            Event::Eof => return Ok(0),
            _ => {}
        }
        v_buf.clear();
    }
}

/// Re-encode `xl/workbook.xml` with the given tab list.
///
/// Always forces `fullCalcOnLoad`. With `removal` set, sheet-scoped defined
/// names of the removed tab are dropped, later `localSheetId`s shift down,
/// global names pointing at the removed sheet are dropped and the view's
/// `activeTab`/`firstSheet` are clamped.
pub fn rewrite_workbook_xml(
    v_xml: &[u8],
    l_sheets: &[SpecWorkbookSheet],
    removal: Option<&SpecSheetRemoval>,
) -> Result<Vec<u8>, XlsxError> {
    let mut reader = Reader::from_reader(v_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(v_xml.len() + 256));
    let mut v_buf = Vec::new();
    let mut c_prefix = String::new();
    let mut if_calc_pr_written = false;

    loop {
        {
            let event = reader.read_event_into(&mut v_buf)?;
            match &event {
                Event::Start(e) if e.local_name().as_ref() == b"workbook" => {
                    c_prefix = derive_prefix(e.name().as_ref());
                    writer.write_event(event.borrow())?;
                }
                Event::Start(e) if e.local_name().as_ref() == b"sheets" => {
                    writer.write_event(event.borrow())?;
                    let c_rel_key = skip_sheet_entries(&mut reader)?;
                    write_sheet_entries(&mut writer, l_sheets, &c_prefix, &c_rel_key)?;
                    writer.write_event(Event::End(BytesEnd::new(format!("{c_prefix}sheets"))))?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"sheets" => {
                    writer.write_event(Event::Start(e.borrow()))?;
                    write_sheet_entries(&mut writer, l_sheets, &c_prefix, "r:id")?;
                    writer.write_event(Event::End(BytesEnd::new(format!("{c_prefix}sheets"))))?;
                }
                Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                    let c_formula = read_text_until_end(&mut reader, b"definedName")?;
                    if let Some(elem) = plan_defined_name(e, &c_formula, removal)? {
                        let c_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        writer.write_event(Event::Start(elem))?;
                        writer.write_event(Event::Text(BytesText::new(&c_formula)))?;
                        writer.write_event(Event::End(BytesEnd::new(c_name)))?;
                    }
                }
                Event::Empty(e) if e.local_name().as_ref() == b"workbookView" => {
                    let elem = rebuild_workbook_view(e, l_sheets, removal)?;
                    writer.write_event(Event::Empty(elem))?;
                }
                Event::Start(e) if e.local_name().as_ref() == b"workbookView" => {
                    let elem = rebuild_workbook_view(e, l_sheets, removal)?;
                    writer.write_event(Event::Start(elem))?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"calcPr" => {
                    writer.write_event(Event::Empty(rebuild_calc_pr(e)?))?;
                    if_calc_pr_written = true;
                }
                Event::Start(e) if e.local_name().as_ref() == b"calcPr" => {
                    writer.write_event(Event::Start(rebuild_calc_pr(e)?))?;
                    if_calc_pr_written = true;
                }
                Event::Start(e) | Event::Empty(e)
                    if !if_calc_pr_written
                        && TUP_WORKBOOK_ELEMENTS_AFTER_CALC_PR
                            .iter()
                            .any(|name| name.as_bytes() == e.local_name().as_ref()) =>
                {
                    write_default_calc_pr(&mut writer, &c_prefix)?;
                    if_calc_pr_written = true;
                    writer.write_event(event.borrow())?;
                }
                Event::End(e) if e.local_name().as_ref() == b"workbook" => {
                    if !if_calc_pr_written {
                        write_default_calc_pr(&mut writer, &c_prefix)?;
                        if_calc_pr_written = true;
                    }
                    writer.write_event(event.borrow())?;
                }
                Event::Eof => break,
                _ => writer.write_event(event.borrow())?,
            }
        }
        v_buf.clear();
    }
    Ok(writer.into_inner())
}

pub(crate) fn derive_prefix(v_qname: &[u8]) -> String {
    match v_qname.iter().position(|b| *b == b':') {
        Some(n_idx) => String::from_utf8_lossy(&v_qname[..=n_idx]).into_owned(),
        None => String::new(),
    }
}

/// Consume the original `<sheet>` children; return the qualified name of
/// their relationship-id attribute.
fn skip_sheet_entries(reader: &mut Reader<&[u8]>) -> Result<String, XlsxError> {
    let mut v_buf = Vec::new();
    let mut c_rel_key: Option<String> = None;
    loop {
        match reader.read_event_into(&mut v_buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if c_rel_key.is_none() {
                    for attr in e.attributes() {
                        let attr = attr?;
                        if attr.key.local_name().as_ref() == b"id" {
                            c_rel_key = Some(String::from_utf8_lossy(attr.key.as_ref()).into_owned());
                        }
                    }
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"sheets" => break,
            Event::Eof => {
                return Err(XlsxError::Package(
                    "workbook <sheets> element is not closed".to_string(),
                ));
            }
            _ => {}
        }
        v_buf.clear();
    }
    Ok(c_rel_key.unwrap_or_else(|| "r:id".to_string()))
}

fn write_sheet_entries(
    writer: &mut Writer<Vec<u8>>,
    l_sheets: &[SpecWorkbookSheet],
    c_prefix: &str,
    c_rel_key: &str,
) -> Result<(), XlsxError> {
    for sheet in l_sheets {
        let mut elem = BytesStart::new(format!("{c_prefix}sheet"));
        elem.push_attribute(("name", sheet.name.as_str()));
        elem.push_attribute(("sheetId", sheet.sheet_id.to_string().as_str()));
        if let Some(c_state) = &sheet.state {
            elem.push_attribute(("state", c_state.as_str()));
        }
        elem.push_attribute((c_rel_key, sheet.rel_id.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    Ok(())
}

fn read_text_until_end(reader: &mut Reader<&[u8]>, v_local: &[u8]) -> Result<String, XlsxError> {
    let mut v_buf = Vec::new();
    let mut c_text = String::new();
    loop {
        match reader.read_event_into(&mut v_buf)? {
            Event::Text(e) => c_text.push_str(&e.unescape()?),
            Event::CData(e) => c_text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(e) if e.local_name().as_ref() == v_local => break,
            Event::Eof => {
                return Err(XlsxError::Package(format!(
                    "element <{}> is not closed",
                    String::from_utf8_lossy(v_local)
                )));
            }
            _ => {}
        }
        v_buf.clear();
    }
    Ok(c_text)
}

/// `None` drops the name; otherwise the (possibly re-indexed) start tag.
fn plan_defined_name(
    e: &BytesStart<'_>,
    c_formula: &str,
    removal: Option<&SpecSheetRemoval>,
) -> Result<Option<BytesStart<'static>>, XlsxError> {
    let mut n_local: Option<usize> = None;
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"localSheetId" {
            n_local = attr.unescape_value()?.trim().parse().ok();
        }
    }

    let Some(removal) = removal else {
        return Ok(Some(e.clone().into_owned()));
    };
    match n_local {
        Some(n) if n == removal.n_idx => return Ok(None),
        None if is_formula_referencing_sheet(c_formula, &removal.name) => return Ok(None),
        _ => {}
    }

    let mut elem = e.clone().into_owned();
    elem.clear_attributes();
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"localSheetId" {
            if let Some(n) = n_local {
                let n_new = if n > removal.n_idx { n - 1 } else { n };
                elem.push_attribute(("localSheetId", n_new.to_string().as_str()));
            }
        } else {
            elem.push_attribute(attr);
        }
    }
    Ok(Some(elem))
}

fn rebuild_workbook_view(
    e: &BytesStart<'_>,
    l_sheets: &[SpecWorkbookSheet],
    removal: Option<&SpecSheetRemoval>,
) -> Result<BytesStart<'static>, XlsxError> {
    let mut elem = e.clone().into_owned();
    let Some(removal) = removal else {
        return Ok(elem);
    };

    let n_last = l_sheets.len().saturating_sub(1);
    elem.clear_attributes();
    for attr in e.attributes() {
        let attr = attr?;
        let v_key = attr.key.local_name();
        if v_key.as_ref() == b"activeTab" || v_key.as_ref() == b"firstSheet" {
            let n_old: usize = attr.unescape_value()?.trim().parse().unwrap_or(0);
            let n_new = if n_old > removal.n_idx {
                n_old - 1
            } else if n_old == removal.n_idx {
                0
            } else {
                n_old
            };
            let c_key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            elem.push_attribute((c_key.as_str(), n_new.min(n_last).to_string().as_str()));
        } else {
            elem.push_attribute(attr);
        }
    }
    Ok(elem)
}

fn rebuild_calc_pr(e: &BytesStart<'_>) -> Result<BytesStart<'static>, XlsxError> {
    let mut elem = e.clone().into_owned();
    elem.clear_attributes();
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() != b"fullCalcOnLoad" {
            elem.push_attribute(attr);
        }
    }
    elem.push_attribute(("fullCalcOnLoad", "1"));
    Ok(elem)
}

fn write_default_calc_pr(writer: &mut Writer<Vec<u8>>, c_prefix: &str) -> Result<(), XlsxError> {
    let mut elem = BytesStart::new(format!("{c_prefix}calcPr"));
    elem.push_attribute(("fullCalcOnLoad", "1"));
    writer.write_event(Event::Empty(elem))?;
    Ok(())
}

/// Whether a defined-name formula references `c_sheet` (`Name!` or `'Name'!`).
pub fn is_formula_referencing_sheet(c_formula: &str, c_sheet: &str) -> bool {
    let c_formula = c_formula.to_lowercase();
    let c_sheet = c_sheet.to_lowercase();

    let c_quoted = format!("'{}'!", c_sheet.replace('\'', "''"));
    if c_formula.contains(&c_quoted) {
        return true;
    }

    let c_plain = format!("{c_sheet}!");
    c_formula.match_indices(&c_plain).any(|(n_idx, _)| {
        c_formula[..n_idx]
            .chars()
            .next_back()
            .is_none_or(|ch| !(ch.is_alphanumeric() || ch == '_' || ch == '.'))
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
