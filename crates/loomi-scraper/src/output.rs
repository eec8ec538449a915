//! CSV persistence of [`ProductRecord`]s and the resume cache built from it.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use csv::ByteRecord;
use loomi_core::{ProductRecord, CSV_COLUMNS};

use crate::error::ScraperError;

fn io_error(path: &Path, source: io::Error) -> ScraperError {
    ScraperError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// A previous run's output, as read for resuming.
#[derive(Debug, Default)]
pub struct ExistingOutput {
    /// Rows that parse under the current schema.
    pub records: Vec<ProductRecord>,
    /// Rows that do not, realigned to the current column order and written
    /// back unchanged.
    pub carried: Vec<ByteRecord>,
    /// `product_url` of every row, parsed or not.
    pub product_urls: HashSet<String>,
}

impl ExistingOutput {
    #[must_use]
    pub fn rows(&self) -> usize {
        self.records.len() + self.carried.len()
    }
}

/// Reads a previous run's output. A missing file yields no rows.
///
/// Every row contributes its `product_url` to the resume set, read by header
/// name from the raw row. Rows that do not deserialize into a
/// [`ProductRecord`] (an older writer, a hand edit) are kept as raw fields so
/// the next write does not drop them.
///
/// # Errors
///
/// Returns [`ScraperError::Io`] if the file exists but cannot be opened, or
/// [`ScraperError::Csv`] if it cannot be read as CSV.
pub fn load_existing(path: &Path) -> Result<ExistingOutput, ScraperError> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ExistingOutput::default()),
        Err(e) => return Err(io_error(path, e)),
    };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = reader.byte_headers()?.clone();
    let positions: Vec<Option<usize>> = CSV_COLUMNS
        .iter()
        .map(|column| headers.iter().position(|h| h == column.as_bytes()))
        .collect();
    let url_column = headers.iter().position(|h| h == b"product_url");

    let mut existing = ExistingOutput::default();
    for row in reader.byte_records() {
        let row = row?;
        if let Some(url) = url_column.and_then(|i| row.get(i)) {
            let url = String::from_utf8_lossy(url).trim().to_string();
            if !url.is_empty() {
                existing.product_urls.insert(url);
            }
        }

        match row.deserialize::<ProductRecord>(Some(&headers)) {
            Ok(record) => existing.records.push(record),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "keeping unparsed row as-is");
                existing.carried.push(realign(&positions, &row));
            }
        }
    }
    if !existing.carried.is_empty() {
        tracing::warn!(
            path = %path.display(),
            rows = existing.carried.len(),
            "existing output has rows in an older format; they are carried over unchanged"
        );
    }
    Ok(existing)
}

/// `row` reordered into [`CSV_COLUMNS`] order; columns the file lacks are empty.
fn realign(positions: &[Option<usize>], row: &ByteRecord) -> ByteRecord {
    positions
        .iter()
        .map(|pos| pos.and_then(|i| row.get(i)).unwrap_or_default())
        .collect()
}

/// Stable-sorts by `(style_id, color_name)` and keeps the first record per key.
#[must_use]
pub fn dedupe(mut records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    records.sort_by(|a, b| a.dedup_key().cmp(&b.dedup_key()));
    records.dedup_by(|later, first| later.dedup_key() == first.dedup_key());
    records
}

/// Writes `records`, then the `carried` rows, to `path` under the fixed
/// header, creating parent directories. The header is written even when
/// there are no rows.
///
/// # Errors
///
/// Returns [`ScraperError::Io`] or [`ScraperError::Csv`] on write failure.
pub fn write_records(
    path: &Path,
    records: &[ProductRecord],
    carried: &[ByteRecord],
) -> Result<(), ScraperError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(CSV_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    for row in carried {
        writer.write_byte_record(row)?;
    }
    writer.flush().map_err(|e| io_error(path, e))?;
    Ok(())
}

/// Removes `path` if present.
///
/// # Errors
///
/// Returns [`ScraperError::Io`] for failures other than the file being absent.
pub fn remove_if_exists(path: &Path) -> Result<(), ScraperError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loomi_core::{ScrapeStatus, SCHEMA_VERSION};

    fn record(style_id: &str, color: &str, title: &str) -> ProductRecord {
        ProductRecord {
            style_id: style_id.to_string(),
            style_slug: format!("{style_id}-slug"),
            color_id: format!("{style_id}-{color}"),
            color_name: color.to_string(),
            image_url: String::new(),
            gallery_image_urls: "https://cdn/a.jpg|https://cdn/b.jpg".to_string(),
            product_url: format!("https://shop.example.com/products/{style_id}"),
            brand_name: "Brand".to_string(),
            source_site: "shop.example.com".to_string(),
            product_title: title.to_string(),
            category: "Tops".to_string(),
            is_apparel: true,
            price_raw: "$10.00".to_string(),
            price: Some(10.0),
            currency: "USD".to_string(),
            materials_raw_or_page_text: "cotton".to_string(),
            materials_snippet: "cotton".to_string(),
            scrape_status: ScrapeStatus::Ok,
            schema_version: SCHEMA_VERSION,
        }
    }

    #[test]
    fn dedupe_keeps_first_in_stable_order() {
        let records = vec![
            record("b", "Red", "first b/red"),
            record("a", "Blue", "a/blue"),
            record("b", "Red", "second b/red"),
            record("a", "Azure", "a/azure"),
        ];
        let out = dedupe(records);
        let titles: Vec<&str> = out.iter().map(|r| r.product_title.as_str()).collect();
        assert_eq!(titles, vec!["a/azure", "a/blue", "first b/red"]);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let existing = load_existing(&dir.path().join("absent.csv")).unwrap();
        assert_eq!(existing.rows(), 0);
        assert!(existing.product_urls.is_empty());
    }

    #[test]
    fn written_rows_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let mut missing_price = record("c", "Green", "no price");
        missing_price.price = None;
        missing_price.price_raw = String::new();
        missing_price.scrape_status = ScrapeStatus::MissingPrice;

        write_records(&path, &[record("a", "Blue", "t"), missing_price.clone()], &[]).unwrap();
        let existing = load_existing(&path).unwrap();
        assert_eq!(existing.records.len(), 2);
        assert!(existing.carried.is_empty());
        assert_eq!(existing.records[1], missing_price);
        assert!(existing
            .product_urls
            .contains("https://shop.example.com/products/a"));
    }

    #[test]
    fn empty_output_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_records(&path, &[], &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), CSV_COLUMNS.join(","));
    }

    #[test]
    fn rows_in_an_older_format_survive_a_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.csv");
        let old_row = "abc,old,abc-x,Indigo,,,https://shop.example.com/products/old,Brand,\
                       shop.example.com,Old Tee,Tops,True,$48.00,48.0,USD,cotton,cotton,ok,1";
        fs::write(&path, format!("{}\n{old_row}\n", CSV_COLUMNS.join(","))).unwrap();

        let existing = load_existing(&path).unwrap();
        assert!(existing.records.is_empty());
        assert_eq!(existing.carried.len(), 1);
        assert!(existing
            .product_urls
            .contains("https://shop.example.com/products/old"));

        write_records(&path, &[record("a", "Blue", "t")], &existing.carried).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(old_row), "{text}");
        assert!(text.contains("https://shop.example.com/products/a"));
    }

    #[test]
    fn short_rows_are_padded_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.csv");
        write_records(&path, &[record("a", "Blue", "t")], &[]).unwrap();
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("not,enough,columns\n");
        fs::write(&path, text).unwrap();

        let existing = load_existing(&path).unwrap();
        assert_eq!(existing.records.len(), 1);
        assert_eq!(existing.carried.len(), 1);
        assert_eq!(existing.carried[0].len(), CSV_COLUMNS.len());
        assert_eq!(existing.carried[0].get(0), Some(&b"not"[..]));
    }

    #[test]
    fn reordered_columns_are_realigned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reordered.csv");
        fs::write(
            &path,
            "product_url,style_id\nhttps://shop.example.com/products/z,zz\n",
        )
        .unwrap();

        let existing = load_existing(&path).unwrap();
        assert!(existing
            .product_urls
            .contains("https://shop.example.com/products/z"));
        let row = &existing.carried[0];
        assert_eq!(row.get(0), Some(&b"zz"[..]));
        assert_eq!(row.get(6), Some(&b"https://shop.example.com/products/z"[..]));
        assert_eq!(row.get(1), Some(&b""[..]));
    }

    #[test]
    fn remove_if_exists_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.csv.partial");
        remove_if_exists(&path).unwrap();
        fs::write(&path, "x").unwrap();
        remove_if_exists(&path).unwrap();
        assert!(!path.exists());
    }
}
