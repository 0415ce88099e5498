//! Persistent character dataset backed by `redb`.
//!
//! The dataset is produced once by `q9-tools build` from tab separated source
//! files and then opened read-only by the engine.
//!
//! Source files (UTF-8, `#` starts a comment line):
//! - `codes.tsv`      - `code<TAB>characters`
//! - `related.tsv`    - `char<TAB>space separated list`
//! - `readings.tsv`   - `char<TAB>primary reading<TAB>secondary reading`
//! - `simplified.tsv` - `traditional<TAB>simplified`
//!
//! Only `codes.tsv` is required.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::lookup::{order_homophones, Lookup, TableLookup};
use crate::utils::{char_len, split_chars, split_list};

const CANDIDATES: redb::TableDefinition<u32, &'static str> =
    redb::TableDefinition::new("candidates");
const RELATED: redb::TableDefinition<&'static str, &'static str> =
    redb::TableDefinition::new("related");
const READINGS: redb::TableDefinition<&'static str, (&'static str, &'static str)> =
    redb::TableDefinition::new("readings");
const BY_READING: redb::TableDefinition<&'static str, &'static str> =
    redb::TableDefinition::new("by_reading");
const SIMPLIFIED: redb::TableDefinition<&'static str, &'static str> =
    redb::TableDefinition::new("simplified");

/// Rows parsed from the TSV source directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTables {
    pub codes: Vec<(u32, String)>,
    pub related: Vec<(String, String)>,
    pub readings: Vec<(String, String, String)>,
    pub simplified: Vec<(String, String)>,
}

impl SourceTables {
    /// Read every source file found in `dir`.
    pub fn read_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let codes_path = dir.join("codes.tsv");
        if !codes_path.exists() {
            bail!("missing {}", codes_path.display());
        }

        let mut tables = SourceTables::default();
        tables.codes = parse_codes(&read_source(&codes_path)?)
            .with_context(|| format!("parsing {}", codes_path.display()))?;

        if let Some(text) = read_optional(&dir.join("related.tsv"))? {
            tables.related = parse_pairs(&text).context("parsing related.tsv")?;
        }
        if let Some(text) = read_optional(&dir.join("readings.tsv"))? {
            tables.readings = parse_readings(&text).context("parsing readings.tsv")?;
        }
        if let Some(text) = read_optional(&dir.join("simplified.tsv"))? {
            tables.simplified = parse_pairs(&text).context("parsing simplified.tsv")?;
        }
        Ok(tables)
    }

    /// Build the in-memory tables. Later rows override earlier ones.
    pub fn to_table_lookup(&self) -> TableLookup {
        let mut table = TableLookup::new();
        for (code, chars) in &self.codes {
            table.insert_code(*code, chars);
        }
        for (ch, list) in &self.related {
            table.insert_related(ch, list);
        }
        for (ch, primary, secondary) in &self.readings {
            table.insert_reading(ch, primary, secondary);
        }
        for (traditional, simplified) in &self.simplified {
            table.insert_simplified(traditional, simplified);
        }
        table
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        warn!("optional dataset source {} not found", path.display());
        return Ok(None);
    }
    read_source(path).map(Some)
}

/// Data lines of a TSV file with their 1-based line numbers.
fn data_lines(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|(n, line)| (n, line.split('\t').collect()))
}

fn parse_codes(text: &str) -> Result<Vec<(u32, String)>> {
    let mut rows = Vec::new();
    for (n, fields) in data_lines(text) {
        if fields.len() < 2 {
            bail!("line {n}: expected code and characters");
        }
        let code: u32 = fields[0]
            .trim()
            .parse()
            .with_context(|| format!("line {n}: bad code {:?}", fields[0]))?;
        rows.push((code, fields[1].trim().to_string()));
    }
    Ok(rows)
}

fn parse_pairs(text: &str) -> Result<Vec<(String, String)>> {
    let mut rows = Vec::new();
    for (n, fields) in data_lines(text) {
        if fields.len() < 2 {
            bail!("line {n}: expected two columns");
        }
        rows.push((fields[0].trim().to_string(), fields[1].to_string()));
    }
    Ok(rows)
}

fn parse_readings(text: &str) -> Result<Vec<(String, String, String)>> {
    let mut rows = Vec::new();
    for (n, fields) in data_lines(text) {
        if fields.len() < 2 {
            bail!("line {n}: expected character and reading");
        }
        let secondary = fields.get(2).map(|s| s.trim()).unwrap_or("");
        rows.push((
            fields[0].trim().to_string(),
            fields[1].trim().to_string(),
            secondary.to_string(),
        ));
    }
    Ok(rows)
}

/// Counts reported after a dataset build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetStats {
    pub codes: usize,
    pub related: usize,
    pub readings: usize,
    pub simplified: usize,
}

/// Writes a complete dataset in one transaction.
pub struct DatasetWriter {
    db: redb::Database,
    path: PathBuf,
}

impl DatasetWriter {
    /// Create (or truncate) the database file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("replacing {}", path.display()))?;
        }
        let db = redb::Database::create(path)
            .with_context(|| format!("creating dataset {}", path.display()))?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Write all tables from an in-memory lookup.
    pub fn write(&self, table: &TableLookup) -> Result<DatasetStats> {
        let txn = self.db.begin_write()?;
        {
            let mut candidates = txn.open_table(CANDIDATES)?;
            for (code, chars) in &table.codes {
                candidates.insert(*code, chars.as_str())?;
            }
            let mut related = txn.open_table(RELATED)?;
            for (ch, list) in &table.related {
                related.insert(ch.as_str(), list.as_str())?;
            }
            let mut readings = txn.open_table(READINGS)?;
            for (ch, (primary, secondary)) in &table.readings {
                readings.insert(ch.as_str(), (primary.as_str(), secondary.as_str()))?;
            }
            let mut by_reading = txn.open_table(BY_READING)?;
            for (reading, chars) in &table.by_reading {
                if !chars.is_empty() {
                    by_reading.insert(reading.as_str(), chars.join(" ").as_str())?;
                }
            }
            let mut simplified = txn.open_table(SIMPLIFIED)?;
            for (traditional, simple) in &table.simplified {
                simplified.insert(traditional.as_str(), simple.as_str())?;
            }
        }
        txn.commit()?;

        let stats = DatasetStats {
            codes: table.codes.len(),
            related: table.related.len(),
            readings: table.readings.len(),
            simplified: table.simplified.len(),
        };
        info!(path = %self.path.display(), ?stats, "dataset written");
        Ok(stats)
    }
}

/// Read-only lookup over a dataset written by `DatasetWriter`.
pub struct RedbLookup {
    db: redb::Database,
    path: PathBuf,
}

impl RedbLookup {
    /// Open an existing dataset. A missing or unreadable file is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("dataset not found: {}", path.display());
        }
        let db = redb::Database::open(path)
            .with_context(|| format!("opening dataset {}", path.display()))?;
        {
            let txn = db.begin_read()?;
            txn.open_table(CANDIDATES)
                .with_context(|| format!("{} has no candidate table", path.display()))?;
        }
        info!(path = %path.display(), "dataset opened");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Row counts of the stored tables.
    pub fn stats(&self) -> Result<DatasetStats> {
        use redb::ReadableTableMetadata;

        let txn = self.db.begin_read()?;
        Ok(DatasetStats {
            codes: txn.open_table(CANDIDATES)?.len()? as usize,
            related: txn.open_table(RELATED)?.len()? as usize,
            readings: txn.open_table(READINGS)?.len()? as usize,
            simplified: txn.open_table(SIMPLIFIED)?.len()? as usize,
        })
    }

    /// The first `limit` codes in ascending order with their raw character
    /// strings.
    pub fn first_codes(&self, limit: usize) -> Result<Vec<(u32, String)>> {
        use redb::ReadableTable;

        let txn = self.db.begin_read()?;
        let table = txn.open_table(CANDIDATES)?;
        let mut rows = Vec::new();
        for entry in table.iter()?.take(limit) {
            let (code, chars) = entry?;
            rows.push((code.value(), chars.value().to_string()));
        }
        Ok(rows)
    }

    fn code_text(&self, code: u32) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CANDIDATES)?;
        Ok(table.get(code)?.map(|v| v.value().to_string()))
    }

    fn text_entry(
        &self,
        def: redb::TableDefinition<&'static str, &'static str>,
        key: &str,
    ) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(def)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn try_homophones(&self, ch: &str) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let readings = txn.open_table(READINGS)?;
        let Some((primary, secondary)) = readings.get(ch)?.map(|v| {
            let (p, s) = v.value();
            (p.to_string(), s.to_string())
        }) else {
            return Ok(Vec::new());
        };

        let by_reading = txn.open_table(BY_READING)?;
        let siblings = by_reading
            .get(primary.as_str())?
            .map(|v| split_list(v.value()))
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(siblings.len());
        for sibling in siblings {
            if let Some(v) = readings.get(sibling.as_str())? {
                let (_, s) = v.value();
                rows.push((sibling.clone(), s.to_string()));
            }
        }
        Ok(order_homophones(
            &secondary,
            rows.iter().map(|(c, s)| (c.as_str(), s.as_str())),
        ))
    }
}

impl Lookup for RedbLookup {
    fn candidates_for_code(&self, code: u32) -> Vec<String> {
        match self.code_text(code) {
            Ok(Some(text)) => split_chars(&text),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(code, "candidate lookup failed: {e:#}");
                Vec::new()
            }
        }
    }

    fn related_for(&self, ch: &str) -> Vec<String> {
        match self.text_entry(RELATED, ch) {
            Ok(list) => list.map(|l| split_list(&l)).unwrap_or_default(),
            Err(e) => {
                error!(ch, "related lookup failed: {e:#}");
                Vec::new()
            }
        }
    }

    fn homophones_for(&self, ch: &str) -> Vec<String> {
        if char_len(ch) != 1 {
            return Vec::new();
        }
        self.try_homophones(ch).unwrap_or_else(|e| {
            error!(ch, "homophone lookup failed: {e:#}");
            Vec::new()
        })
    }

    fn simplify(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in split_chars(text) {
            match self.text_entry(SIMPLIFIED, &c) {
                Ok(Some(s)) => out.push_str(&s),
                Ok(None) => out.push_str(&c),
                Err(e) => {
                    error!("simplify failed: {e:#}");
                    return text.to_string();
                }
            }
        }
        out
    }
}
