//! CSV batch parsing.
//!
//! Expected header: `email,first_name,site,tags` (`first_name` and `tags`
//! optional; column order free). Tags within a cell are `;`-separated.
//! Row-level problems — blank email, missing site, in-file duplicates — are
//! collected as [`RowError`]s so one bad row never sinks a batch.

use std::collections::HashMap;

use crate::{Error, Result};

/// Hard cap on data rows per batch; bigger exports should be split upstream.
pub const MAX_ROWS: usize = 50_000;

/// One accepted CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
  /// 1-based line number (header = 1, first data row = 2).
  pub line:       usize,
  pub email:      String,
  pub first_name: Option<String>,
  pub site:       String,
  pub tags:       Vec<String>,
}

/// A row the parser refused, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
  pub line:    usize,
  pub message: String,
}

/// Result of parsing a whole batch.
#[derive(Debug, Clone)]
pub struct ParsedBatch {
  pub records:    Vec<ImportRecord>,
  pub errors:     Vec<RowError>,
  /// Data rows seen, accepted or not (excludes the header).
  pub total_rows: usize,
}

/// Parse a CSV export into records plus per-row errors.
pub fn parse_batch(input: &str) -> Result<ParsedBatch> {
  // Spreadsheet exports often lead with a UTF-8 BOM.
  let input = input.strip_prefix('\u{feff}').unwrap_or(input);

  let mut reader = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .flexible(true)
    .from_reader(input.as_bytes());

  let headers = reader.headers()?.clone();
  let column = |name: &'static str| -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
  };

  let email_col = column("email").ok_or(Error::MissingColumn("email"))?;
  let site_col = column("site").ok_or(Error::MissingColumn("site"))?;
  let name_col = column("first_name");
  let tags_col = column("tags");

  let mut records = Vec::new();
  let mut errors = Vec::new();
  let mut total_rows = 0usize;
  // Lowercased email -> first line that used it, for in-file duplicates.
  let mut seen: HashMap<String, usize> = HashMap::new();

  for (i, row) in reader.records().enumerate() {
    let line = i + 2;
    total_rows += 1;

    if total_rows > MAX_ROWS {
      errors.push(RowError {
        line,
        message: format!("batch exceeds {MAX_ROWS} rows; split the export"),
      });
      break;
    }

    let row = match row {
      Ok(row) => row,
      Err(e) => {
        errors.push(RowError { line, message: format!("unreadable row: {e}") });
        continue;
      }
    };

    let email = row.get(email_col).unwrap_or("").trim();
    if email.is_empty() {
      errors.push(RowError { line, message: "missing email".into() });
      continue;
    }
    if !email.contains('@') {
      errors.push(RowError {
        line,
        message: format!("not an email address: {email:?}"),
      });
      continue;
    }

    let site = row.get(site_col).unwrap_or("").trim();
    if site.is_empty() {
      errors.push(RowError { line, message: "missing site".into() });
      continue;
    }

    let key = email.to_ascii_lowercase();
    if let Some(first_line) = seen.get(&key) {
      errors.push(RowError {
        line,
        message: format!("duplicate of line {first_line}"),
      });
      continue;
    }
    seen.insert(key, line);

    let first_name = name_col
      .and_then(|c| row.get(c))
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_owned);

    let tags = tags_col
      .and_then(|c| row.get(c))
      .map(|cell| {
        cell
          .split(';')
          .map(str::trim)
          .filter(|t| !t.is_empty())
          .map(str::to_owned)
          .collect()
      })
      .unwrap_or_default();

    records.push(ImportRecord {
      line,
      email: email.to_owned(),
      first_name,
      site: site.to_owned(),
      tags,
    });
  }

  Ok(ParsedBatch { records, errors, total_rows })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_a_well_formed_batch() {
    let csv = "email,first_name,site,tags\n\
               sarah.green@example.com,Sarah,mailchimp_import,new_site_tag\n\
               new.gardener@gmail.com,Julian,mailchimp_import,subscriber;urban\n";

    let batch = parse_batch(csv).unwrap();
    assert!(batch.errors.is_empty());
    assert_eq!(batch.total_rows, 2);
    assert_eq!(batch.records.len(), 2);

    let julian = &batch.records[1];
    assert_eq!(julian.line, 3);
    assert_eq!(julian.email, "new.gardener@gmail.com");
    assert_eq!(julian.first_name.as_deref(), Some("Julian"));
    assert_eq!(julian.tags, vec![
      "subscriber".to_string(),
      "urban".to_string()
    ]);
  }

  #[test]
  fn header_order_is_free_and_case_insensitive() {
    let csv = "Site,Email\nfarm.site,sarah@x.com\n";
    let batch = parse_batch(csv).unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].site, "farm.site");
    assert!(batch.records[0].tags.is_empty());
  }

  #[test]
  fn missing_required_column_is_a_batch_error() {
    let csv = "email,first_name\nsarah@x.com,Sarah\n";
    assert!(matches!(
      parse_batch(csv),
      Err(Error::MissingColumn("site"))
    ));
  }

  #[test]
  fn bad_rows_are_collected_not_fatal() {
    let csv = "email,site\n\
               ,farm.site\n\
               not-an-email,farm.site\n\
               sarah@x.com,\n\
               sarah@x.com,farm.site\n";

    let batch = parse_batch(csv).unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.errors.len(), 3);
    assert_eq!(batch.errors[0].message, "missing email");
    assert!(batch.errors[1].message.starts_with("not an email"));
    assert_eq!(batch.errors[2].message, "missing site");
  }

  #[test]
  fn in_file_duplicates_are_flagged_case_insensitively() {
    let csv = "email,site\n\
               sarah@x.com,farm.site\n\
               SARAH@X.COM,micro.site\n";

    let batch = parse_batch(csv).unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].line, 3);
    assert_eq!(batch.errors[0].message, "duplicate of line 2");
  }

  #[test]
  fn strips_a_leading_bom() {
    let csv = "\u{feff}email,site\nsarah@x.com,farm.site\n";
    let batch = parse_batch(csv).unwrap();
    assert_eq!(batch.records.len(), 1);
  }
}
