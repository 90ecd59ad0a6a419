//! CSV rendering with spreadsheet formula-injection guards.

fn needs_formula_guard(value: &str) -> bool {
    matches!(
        value.chars().next(),
        Some('=' | '+' | '-' | '@' | '\t' | '\r')
    )
}

/// Prefixes cells a spreadsheet would evaluate as a formula with `'`.
pub fn guard_cell(value: &str) -> String {
    if needs_formula_guard(value) {
        format!("'{}", value)
    } else {
        value.to_string()
    }
}

/// Writes a header and rows into a CSV string, guarding every cell.
pub fn render_csv<I>(header: &[&str], rows: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row.iter().map(|cell| guard_cell(cell)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_formula_prefixes() {
        assert_eq!(guard_cell("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(guard_cell("@cmd"), "'@cmd");
        assert_eq!(guard_cell("plain"), "plain");
    }

    #[test]
    fn renders_quoted_rows() {
        let csv = render_csv(
            &["User", "Email"],
            vec![vec!["Ana \"A\"".to_string(), "=evil".to_string()]],
        )
        .unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("\"User\",\"Email\""));
        assert_eq!(lines.next(), Some("\"Ana \"\"A\"\"\",\"'=evil\""));
    }
}
