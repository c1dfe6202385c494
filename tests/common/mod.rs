#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

pub const SORIANA_WIDTH: usize = 22;
pub const WALMART_WIDTH: usize = 97;
pub const CHEDRAUI_WIDTH: usize = 18;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a positional export with synthetic `H0..Hn` headers.
    pub fn write_export(&self, name: &str, width: usize, rows: &[Vec<String>]) -> PathBuf {
        self.write(name, &export_csv(width, rows))
    }

    /// Writes `grid` (header row first) as a single-sheet XLSX workbook.
    pub fn write_workbook(&self, name: &str, grid: &[Vec<String>]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, workbook_bytes(grid)).expect("write workbook");
        path
    }
}

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

/// Spreadsheet column letters for a zero-based index (0 -> A, 26 -> AA).
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ascii letters")
}

/// Minimal XLSX package. Empty cells are left out of the sheet, the way
/// spreadsheet tools save them; numeric-looking cells are stored as numbers.
pub fn workbook_bytes(grid: &[Vec<String>]) -> Vec<u8> {
    use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row_idx, row) in grid.iter().enumerate() {
        let r = row_idx + 1;
        sheet.push_str(&format!(r#"<row r="{r}">"#));
        for (col_idx, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let cell_ref = format!("{}{r}", column_letters(col_idx));
            if value.parse::<f64>().is_ok() {
                sheet.push_str(&format!(r#"<c r="{cell_ref}"><v>{value}</v></c>"#));
            } else {
                let escaped = value
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;");
                sheet.push_str(&format!(
                    r#"<c r="{cell_ref}" t="inlineStr"><is><t>{escaped}</t></is></c>"#
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, contents) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("xl/workbook.xml", WORKBOOK_XML),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ] {
        writer.start_file(name, options).expect("start zip entry");
        writer
            .write_all(contents.as_bytes())
            .expect("write zip entry");
    }
    writer.finish().expect("finish workbook").into_inner()
}

pub fn export_csv(width: usize, rows: &[Vec<String>]) -> String {
    let mut text = (0..width)
        .map(|i| format!("H{i}"))
        .collect::<Vec<_>>()
        .join(",");
    text.push('\n');
    for row in rows {
        assert_eq!(row.len(), width, "fixture row width");
        text.push_str(&row.join(","));
        text.push('\n');
    }
    text
}

fn blank(width: usize) -> Vec<String> {
    vec![String::new(); width]
}

fn num(value: f64) -> String {
    value.to_string()
}

#[derive(Debug, Clone)]
pub struct SorianaRow {
    pub restockable: &'static str,
    pub code: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub store_id: &'static str,
    pub store: &'static str,
    pub city: &'static str,
    pub state: &'static str,
    pub format: &'static str,
    pub sales: [f64; 4],
    pub boxes: f64,
    pub days: f64,
}

impl Default for SorianaRow {
    fn default() -> Self {
        Self {
            restockable: "SI",
            code: "7501039120000.0",
            description: "ACEITE COMESTIBLE NUTRIOLI 400 ML",
            category: "ACEITES",
            store_id: "101",
            store: "SORIANA CENTRO",
            city: "GUADALAJARA",
            state: "JALISCO",
            format: "HIPER",
            sales: [1.0, 2.0, 3.0, 4.0],
            boxes: 10.0,
            days: 12.0,
        }
    }
}

impl SorianaRow {
    pub fn cells(&self) -> Vec<String> {
        let mut row = blank(SORIANA_WIDTH);
        row[0] = self.restockable.to_string();
        row[2] = self.code.to_string();
        row[3] = self.description.to_string();
        row[4] = self.category.to_string();
        row[5] = self.store_id.to_string();
        row[6] = self.store.to_string();
        row[7] = self.city.to_string();
        row[8] = self.state.to_string();
        row[9] = self.format.to_string();
        for (offset, value) in self.sales.iter().enumerate() {
            row[15 + offset] = num(*value);
        }
        row[19] = num(self.boxes);
        row[21] = num(self.days);
        row
    }
}

#[derive(Debug, Clone)]
pub struct WalmartRow {
    pub code: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub state: &'static str,
    pub store: &'static str,
    pub format: &'static str,
    pub days: f64,
    pub on_hand: f64,
    pub sales: [f64; 4],
    pub sell_out: f64,
}

impl Default for WalmartRow {
    fn default() -> Self {
        Self {
            code: "750100.0",
            description: "ACEITE NUTRIOLI 946M",
            category: "ACEITES",
            state: "JALISCO",
            store: "WM GUADALAJARA",
            format: "SC",
            days: 20.0,
            on_hand: 5.0,
            sales: [2.0, 2.0, 2.0, 2.0],
            sell_out: 100.0,
        }
    }
}

impl WalmartRow {
    pub fn cells(&self) -> Vec<String> {
        let mut row = blank(WALMART_WIDTH);
        row[0] = self.code.to_string();
        row[4] = self.description.to_string();
        row[5] = self.category.to_string();
        row[7] = self.state.to_string();
        row[15] = self.store.to_string();
        row[16] = self.format.to_string();
        row[33] = num(self.days);
        row[42] = num(self.on_hand);
        for (offset, value) in self.sales.iter().enumerate() {
            row[73 + offset] = num(*value);
        }
        row[96] = num(self.sell_out);
        row
    }
}

#[derive(Debug, Clone)]
pub struct ChedrauiRow {
    pub state: &'static str,
    pub store_id: &'static str,
    pub store: &'static str,
    pub description: &'static str,
    pub inventory: f64,
    pub last_week: f64,
    pub reported_average: f64,
    pub days: f64,
}

impl Default for ChedrauiRow {
    fn default() -> Self {
        Self {
            state: "VERACRUZ",
            store_id: "7",
            store: "CHEDRAUI XALAPA",
            description: "ACEITE NUTRIOLI 850",
            inventory: 12.0,
            last_week: 3.0,
            reported_average: 2.5,
            days: 10.0,
        }
    }
}

impl ChedrauiRow {
    pub fn cells(&self) -> Vec<String> {
        let mut row = blank(CHEDRAUI_WIDTH);
        row[3] = self.state.to_string();
        row[8] = self.store_id.to_string();
        row[9] = self.store.to_string();
        row[11] = self.description.to_string();
        row[12] = num(self.inventory);
        row[14] = num(self.last_week);
        row[16] = num(self.reported_average);
        row[17] = num(self.days);
        row
    }
}

/// Three Walmart stores across two states plus one excluded format.
pub fn walmart_rows() -> Vec<Vec<String>> {
    vec![
        WalmartRow {
            store: "WM GUADALAJARA",
            sell_out: 300.0,
            ..WalmartRow::default()
        }
        .cells(),
        WalmartRow {
            store: "WM ZAPOPAN",
            description: "PASTA CODO NUTRIOLI 200GR",
            category: "PASTAS",
            on_hand: -4.0,
            sales: [0.0; 4],
            sell_out: 50.0,
            ..WalmartRow::default()
        }
        .cells(),
        WalmartRow {
            state: "SONORA",
            store: "WM HERMOSILLO",
            description: "ACEITE SABROSANO 850ML",
            days: 40.0,
            sell_out: 125.5,
            ..WalmartRow::default()
        }
        .cells(),
        WalmartRow {
            store: "BODEGA CENTRO",
            format: "BAE",
            sell_out: 999.0,
            ..WalmartRow::default()
        }
        .cells(),
    ]
}
