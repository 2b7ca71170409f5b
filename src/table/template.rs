use crate::ml::schema::SchemaVariant;
use crate::table::Table;

/// Example rows in the upload schema, offered to users as a starting point
const TEMPLATE_ROWS: [[&str; 5]; 3] = [
    ["9.8", "CRITICAL", "Web Servers", "1", "HIGH"],
    ["7.5", "HIGH", "Databases", "0", "MEDIUM"],
    ["5.3", "MEDIUM", "General", "0", "LOW"],
];

/// Downloadable template table for the given schema variant
pub fn template_table(variant: SchemaVariant) -> Table {
    let columns = variant.required_columns();
    let mut table = Table::new(columns.iter().map(|c| c.to_string()).collect());

    for row in TEMPLATE_ROWS {
        // Template cells follow the canonical column order
        let cells = row.iter().take(columns.len()).map(|c| c.to_string()).collect();
        table.push_row(cells);
    }

    table
}
