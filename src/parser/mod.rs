pub mod nodes;
pub mod ratings;

use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::table::RatingTable;

/// Two-pass scan: markup → flattened table nodes → hero/role table.
pub fn parse(markup: &str) -> Result<RatingTable, ScrapeError> {
    let nodes = nodes::flatten_tables(markup)?;
    let table = ratings::collect(&nodes)?;
    if table.is_empty() {
        warn!("No hero links found in {} table nodes", nodes.len());
    }
    info!(
        "Parsed {} table nodes into {} heroes ({} ratings)",
        nodes.len(),
        table.len(),
        table.entry_count()
    );
    Ok(table)
}
