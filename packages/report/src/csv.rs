//! CSV rendering of report tables.

use std::io::Write;

use aoi_map_report_models::{LayerDetailTable, MatrixTable, SummaryRow, SummaryTable};

use crate::ReportError;

const SUMMARY_HEADERS: [&str; 5] = [
    "area",
    "area_km2",
    "population",
    "total_elements",
    "population_density",
];

/// Writes the summary, total row last.
///
/// # Errors
///
/// Returns [`ReportError`] if writing fails.
pub fn write_summary<W: Write>(writer: W, table: &SummaryTable) -> Result<(), ReportError> {
    let mut csv = ::csv::Writer::from_writer(writer);
    csv.write_record(SUMMARY_HEADERS)?;

    for row in table.rows.iter().chain(std::iter::once(&table.total)) {
        csv.write_record(summary_record(row))?;
    }

    csv.flush()?;
    Ok(())
}

fn summary_record(row: &SummaryRow) -> [String; 5] {
    [
        row.name.clone(),
        format!("{:.4}", row.area_km2),
        row.population.to_string(),
        row.total_elements.to_string(),
        format!("{:.2}", row.population_density),
    ]
}

/// Writes one layer's matched features. The first column is the
/// resolved label, followed by the table's property columns.
///
/// # Errors
///
/// Returns [`ReportError`] if writing fails.
pub fn write_layer_detail<W: Write>(
    writer: W,
    table: &LayerDetailTable,
) -> Result<(), ReportError> {
    let mut csv = ::csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push("label");
    header.extend(table.columns.iter().map(String::as_str));
    csv.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.label.as_deref().unwrap_or(""));
        record.extend(row.values.iter().map(|value| value.as_deref().unwrap_or("")));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes an areas × layers matrix.
///
/// # Errors
///
/// Returns [`ReportError`] if writing fails.
pub fn write_matrix<W: Write, T: ToString>(
    writer: W,
    table: &MatrixTable<T>,
) -> Result<(), ReportError> {
    let mut csv = ::csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push("area".to_string());
    header.extend(table.columns.iter().cloned());
    csv.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.area.clone());
        record.extend(row.values.iter().map(ToString::to_string));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{analyzed, localidad, registry};
    use crate::{project_layer_counts, project_layer_detail, project_summary};

    fn render(write: impl FnOnce(&mut Vec<u8>) -> Result<(), ReportError>) -> String {
        let mut buffer = Vec::new();
        write(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn summary_csv() {
        let entries = vec![
            analyzed(1, "norte", 2.0, 100, vec![localidad("A", 100)]),
            analyzed(2, "sur, centro", 2.0, 300, vec![localidad("B", 300)]),
        ];
        let table = project_summary(&entries);

        let csv = render(|buffer| write_summary(buffer, &table));

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "area,area_km2,population,total_elements,population_density"
        );
        assert_eq!(lines[1], "norte,2.0000,100,1,50.00");
        assert_eq!(lines[2], "\"sur, centro\",2.0000,300,1,150.00");
        assert_eq!(lines[3], "Total,4.0000,400,2,100.00");
    }

    #[test]
    fn layer_detail_csv_leaves_missing_cells_empty() {
        let entry = analyzed(
            1,
            "norte",
            1.0,
            0,
            vec![
                localidad("Uno", 10),
                localidad("Dos", 20).with_property("AMBITO", "Rural"),
            ],
        );
        let table = project_layer_detail(&entry, &registry(), "localidades").unwrap();

        let csv = render(|buffer| write_layer_detail(buffer, &table));

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("label,"));
        assert!(lines[1].starts_with("Uno,"));
        assert!(lines[1].ends_with(','));
        assert!(lines[2].ends_with(",Rural"));
    }

    #[test]
    fn matrix_csv() {
        let entries = vec![analyzed(1, "norte", 1.0, 0, vec![localidad("A", 1)])];
        let table = project_layer_counts(&entries, &["localidades", "anp"]);

        let csv = render(|buffer| write_matrix(buffer, &table));

        assert_eq!(csv, "area,localidades,anp\nnorte,1,0\n");
    }
}
