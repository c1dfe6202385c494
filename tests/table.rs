use retail_manager::table::{Cell, ViewTable, format_currency, format_grouped};

fn text_table(headers: &[&str], rows: &[&[&str]]) -> ViewTable {
    let mut table = ViewTable::new(headers.iter().copied());
    for row in rows {
        table.push(row.iter().map(|value| Cell::text(*value)).collect());
    }
    table
}

#[test]
fn render_aligns_text_columns_left() {
    let table = text_table(&["no", "tienda"], &[&["A1", "Centro"], &["B2", "Norte"]]);

    let rendered = table.render();
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(
        lines,
        vec!["no  tienda", "---  ------", "A1  Centro", "B2  Norte"]
    );
}

#[test]
fn render_normalizes_control_characters() {
    let table = text_table(&["desc"], &[&["ACEITE\nNUTRIOLI\t850"]]);

    let rendered = table.render();
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "ACEITE NUTRIOLI 850");
}

#[test]
fn render_counts_accents_as_single_columns() {
    let table = text_table(
        &["categoría", "estado"],
        &[&["pastas", "\u{1b}[31mNEG\u{1b}[0m"]],
    );

    let rendered = table.render();
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "categoría  estado");
    assert_eq!(lines[2], "pastas     \u{1b}[31mNEG\u{1b}[0m");
}

#[test]
fn view_table_right_aligns_money_and_counts() {
    let mut table = ViewTable::new(["TIENDA", "SELL OUT"]);
    table.push(vec![Cell::text("CENTRO"), Cell::Currency(1234.5)]);
    table.push(vec![Cell::text("NORTE"), Cell::Currency(-20.0)]);

    let rendered = table.render();
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "TIENDA  SELL OUT");
    assert_eq!(lines[2], "CENTRO  $1,234.50");
    assert_eq!(lines[3], "NORTE     -$20.00");
}

#[test]
fn number_formatting_rounds_half_away_from_zero() {
    assert_eq!(format_grouped(2.5, 0), "3");
    assert_eq!(format_grouped(-2.5, 0), "-3");
    assert_eq!(format_grouped(1_000_000.0, 1), "1,000,000.0");
    assert_eq!(format_currency(0.0), "$0.00");
    assert_eq!(Cell::count(12.0).display(), "12.0");
    assert_eq!(Cell::decimal(1.0 / 3.0).display(), "0.33");
}
