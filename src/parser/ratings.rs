use tracing::debug;

use super::nodes::Node;
use crate::error::ScrapeError;
use crate::table::{RatingEntry, RatingTable};

/// Header tokens carrying the star indicator and the role label. Bound to the
/// wiki layout as observed; there is no format version to check against.
const SCORE_TOKEN: usize = 1;
const CATEGORY_TOKEN: usize = 4;

/// Score attributed to links seen before the first header.
pub const UNRATED: i32 = -1;

/// Role and score from the most recent header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub category: String,
    pub score: i32,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            category: String::new(),
            score: UNRATED,
        }
    }
}

impl Cursor {
    /// Decode header text such as `"Rated ★★★ as a Carry"`. Tokens are split
    /// on single spaces with empty fields kept, so runs of spaces shift the
    /// indices exactly as they do on the page.
    pub fn from_header(text: &str) -> Result<Self, ScrapeError> {
        let tokens: Vec<&str> = text.split(' ').collect();
        if tokens.len() <= CATEGORY_TOKEN {
            return Err(ScrapeError::MalformedHeaderFormat {
                text: text.to_string(),
                tokens: tokens.len(),
            });
        }

        let width = tokens[SCORE_TOKEN].chars().count();
        Ok(Self {
            category: tokens[CATEGORY_TOKEN].trim_end().to_string(),
            score: i32::try_from(width).unwrap_or(i32::MAX),
        })
    }

    fn entry(&self) -> RatingEntry {
        RatingEntry::new(self.category.clone(), self.score)
    }
}

/// Fold the node sequence into a table. Each header replaces the cursor;
/// each titled link takes a copy of the cursor as it stands.
pub fn collect(nodes: &[Node]) -> Result<RatingTable, ScrapeError> {
    let (_, table) = nodes.iter().try_fold(
        (Cursor::default(), RatingTable::new()),
        |(cursor, mut table), node| {
            let cursor = match node {
                Node::Header(text) => {
                    let next = Cursor::from_header(text)?;
                    debug!(category = %next.category, score = next.score, "header");
                    next
                }
                Node::Link { title: Some(name) } if !name.is_empty() => {
                    table.record(name, cursor.entry());
                    cursor
                }
                _ => cursor,
            };
            Ok::<_, ScrapeError>((cursor, table))
        },
    )?;
    Ok(table)
}
