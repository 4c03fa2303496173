use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer as XmlWriter};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::ScrapeError;
use crate::table::{RatingEntry, RatingTable};

const FILE_PREFIX: &str = "HeroRoles_";
const FILE_EXTENSION: &str = "xml";

/// `HeroRoles_YYYYMMDD_HHMM.xml` in UTC. Zero-padded, so names sort in time
/// order. Two writes in the same minute map to the same name and the later
/// one replaces the earlier.
pub fn file_name(at: DateTime<Utc>) -> String {
    format!("{}{}.{}", FILE_PREFIX, at.format("%Y%m%d_%H%M"), FILE_EXTENSION)
}

/// Persists roles tables under a timestamped name.
pub struct RolesWriter {
    default_dir: PathBuf,
}

impl RolesWriter {
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
        }
    }

    pub fn write(&self, table: RatingTable, output_dir: Option<&Path>) -> Result<PathBuf, ScrapeError> {
        self.write_at(table, output_dir, Utc::now())
    }

    /// Sort every hero's ratings, encode, and move the finished document into
    /// place. The target directory must already exist.
    pub fn write_at(
        &self,
        mut table: RatingTable,
        output_dir: Option<&Path>,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, ScrapeError> {
        let dir = output_dir.unwrap_or(self.default_dir.as_path());
        let path = dir.join(file_name(at));

        table.sort_by_score();
        let xml = encode(&table)?;

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| ScrapeError::io(dir, e))?;
        staged
            .write_all(&xml)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| ScrapeError::io(staged.path(), e))?;
        staged
            .persist(&path)
            .map_err(|e| ScrapeError::io(&path, e.error))?;

        info!("Wrote {} heroes to {}", table.len(), path.display());
        Ok(path)
    }
}

fn emit<'a>(w: &mut XmlWriter<Vec<u8>>, event: Event<'a>) -> Result<(), ScrapeError> {
    w.write_event(event)
        .map_err(|e| ScrapeError::Encode(e.to_string()))
}

/// `<HeroList><Hero Name=".."><Roles><Role Type=".." Rating=".."/>...`
/// Entries are written in the order they are held.
pub fn encode(table: &RatingTable) -> Result<Vec<u8>, ScrapeError> {
    let mut w = XmlWriter::new_with_indent(Vec::new(), b' ', 2);

    emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    emit(&mut w, Event::Start(BytesStart::new("HeroList")))?;

    for (hero, entries) in table.iter() {
        emit(&mut w, Event::Start(BytesStart::new("Hero").with_attributes([("Name", hero)])))?;
        if entries.is_empty() {
            emit(&mut w, Event::Empty(BytesStart::new("Roles")))?;
        } else {
            emit(&mut w, Event::Start(BytesStart::new("Roles")))?;
            for entry in entries {
                let rating = entry.score.to_string();
                let role = BytesStart::new("Role")
                    .with_attributes([("Type", entry.category.as_str()), ("Rating", rating.as_str())]);
                emit(&mut w, Event::Empty(role))?;
            }
            emit(&mut w, Event::End(BytesEnd::new("Roles")))?;
        }
        emit(&mut w, Event::End(BytesEnd::new("Hero")))?;
    }

    emit(&mut w, Event::End(BytesEnd::new("HeroList")))?;
    Ok(w.into_inner())
}

/// Load a document written by [`RolesWriter`]. Role order is kept as stored.
pub fn read_table(path: &Path) -> Result<RatingTable, ScrapeError> {
    let xml = std::fs::read_to_string(path).map_err(|e| ScrapeError::io(path, e))?;
    decode(&xml)
}

pub fn decode(xml: &str) -> Result<RatingTable, ScrapeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut table = RatingTable::new();
    let mut hero: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"Hero" => {
                    let name = attribute(&e, "Name")?;
                    table.insert_empty(&name);
                    hero = Some(name);
                }
                b"Role" => {
                    let Some(name) = hero.as_deref() else {
                        return Err(ScrapeError::MalformedDocument(
                            "Role outside of a Hero element".into(),
                        ));
                    };
                    let category = attribute(&e, "Type")?;
                    let rating = attribute(&e, "Rating")?;
                    let score = rating.trim().parse::<i32>().map_err(|_| {
                        ScrapeError::MalformedDocument(format!("bad Rating {:?} for {}", rating, name))
                    })?;
                    table.record(name, RatingEntry::new(category, score));
                }
                _ => {}
            },
            Ok(Event::End(e)) if e.name().as_ref() == b"Hero" => hero = None,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ScrapeError::MalformedDocument(format!(
                    "at byte {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(table)
}

fn attribute(e: &BytesStart, key: &str) -> Result<String, ScrapeError> {
    let malformed = |detail: String| ScrapeError::MalformedDocument(detail);
    let attr = e
        .try_get_attribute(key)
        .map_err(|err| malformed(err.to_string()))?
        .ok_or_else(|| {
            malformed(format!(
                "{} is missing {}",
                String::from_utf8_lossy(e.name().as_ref()),
                key
            ))
        })?;
    attr.unescape_value()
        .map(|v| v.into_owned())
        .map_err(|err| malformed(err.to_string()))
}
