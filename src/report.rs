//! Capped, line-oriented text summary of a view table for sharing.

use crate::table::ViewTable;

pub const ELLIPSIS: &str = "...";
const ENTRY_SEPARATOR: &str = "-";

/// Renders tables through per-entry line templates. A `{A|B}` placeholder
/// is replaced by the row's value in the first column named `A` or `B`;
/// a column that cannot be found renders as an empty string.
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter<'a> {
    lines: &'a [String],
}

impl<'a> ReportFormatter<'a> {
    pub fn new(lines: &'a [String]) -> Self {
        Self { lines }
    }

    pub fn format(&self, table: &ViewTable, title: &str, cap: usize) -> String {
        let mut out = vec![format!("*{} ({})*", title.trim(), table.len())];
        for row in 0..table.len().min(cap) {
            if self.lines.is_empty() {
                out.push(plain_entry(table, row));
                out.push(ENTRY_SEPARATOR.to_string());
            } else {
                out.extend(self.lines.iter().map(|line| fill(line, table, row)));
            }
        }
        if table.len() > cap {
            out.push(ELLIPSIS.to_string());
        }
        out.join("\n")
    }
}

fn plain_entry(table: &ViewTable, row: usize) -> String {
    (0..table.headers.len())
        .map(|col| {
            table
                .cell(row, col)
                .map(|cell| cell.display())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn fill(template: &str, table: &ViewTable, row: usize) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        output.push_str(&rest[..start]);
        let aliases = rest[start + 1..start + len].split('|').collect::<Vec<_>>();
        if let Some(cell) = table
            .column_index(&aliases)
            .and_then(|col| table.cell(row, col))
        {
            output.push_str(&cell.display());
        }
        rest = &rest[start + len + 1..];
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn stores(count: usize) -> ViewTable {
        let mut table = ViewTable::new(["TIENDA", "DESC", "CAJAS"]);
        for idx in 0..count {
            table.push(vec![
                Cell::text(format!("STORE {idx}")),
                Cell::text("ACEITE"),
                Cell::count(idx as f64),
            ]);
        }
        table
    }

    fn lines() -> Vec<String> {
        vec![
            "🏢 {TIENDA}".to_string(),
            "📦 {DESC|DESCRIPCION} {LOTE}".to_string(),
            "-".to_string(),
        ]
    }

    #[test]
    fn header_carries_title_and_total() {
        let lines = lines();
        let text = ReportFormatter::new(&lines).format(&stores(2), "SORIANA", 40);
        let expected = "*SORIANA (2)*\n🏢 STORE 0\n📦 ACEITE \n-\n🏢 STORE 1\n📦 ACEITE \n-";
        assert_eq!(text, expected);
    }

    #[test]
    fn truncates_at_cap_with_ellipsis() {
        let lines = lines();
        let text = ReportFormatter::new(&lines).format(&stores(45), "WALMART", 40);
        assert!(text.starts_with("*WALMART (45)*"));
        assert_eq!(text.matches("🏢").count(), 40);
        assert!(text.ends_with("\n..."));
    }

    #[test]
    fn exactly_cap_rows_has_no_ellipsis() {
        let lines = lines();
        let text = ReportFormatter::new(&lines).format(&stores(40), "X", 40);
        assert!(!text.ends_with(ELLIPSIS));
    }

    #[test]
    fn missing_columns_render_empty() {
        let lines = vec!["[{NOPE}] {CAJAS} {unterminated".to_string()];
        let text = ReportFormatter::new(&lines).format(&stores(1), "T", 40);
        assert_eq!(text, "*T (1)*\n[] 0.0 {unterminated");
    }

    #[test]
    fn without_templates_rows_are_joined() {
        let text = ReportFormatter::default().format(&stores(1), "FRESKO", 40);
        assert_eq!(text, "*FRESKO (1)*\nSTORE 0 | ACEITE | 0.0\n-");
    }
}
