use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use std::io::Cursor;
use std::str::FromStr;

use crate::models::{Application, ApplicationStatus};

/// Raw row as it appears in the upload template.
#[derive(Debug, Deserialize)]
pub struct CsvApplicationRow {
    #[serde(rename = "Job ID")]
    pub job_id: String,
    #[serde(rename = "Job Title")]
    pub job_title: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Application Date")]
    pub application_date: String,
    #[serde(rename = "Status")]
    pub status: String,
}

/// Row after validation, ready to insert.
#[derive(Debug, Clone)]
pub struct ParsedApplicationRow {
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    pub applied_on: NaiveDate,
    pub status: ApplicationStatus,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|_| format!("Invalid date '{}' (expected YYYY-MM-DD)", raw))
}

/// Parses the admin upload. All rows are validated before anything is
/// inserted, so one bad row rejects the whole file with its line number.
pub fn parse_applications_csv(data: &[u8]) -> Result<Vec<ParsedApplicationRow>, String> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(data));

    let mut rows = Vec::new();

    for (idx, record) in reader.deserialize::<CsvApplicationRow>().enumerate() {
        // +2: one for the header line, one for zero-indexing
        let line = idx + 2;
        let row = record.map_err(|e| format!("Row {}: {}", line, e))?;

        if row.job_title.trim().is_empty() {
            return Err(format!("Row {}: Job Title is required", line));
        }
        if row.company.trim().is_empty() {
            return Err(format!("Row {}: Company is required", line));
        }

        let applied_on = parse_date(&row.application_date)
            .map_err(|e| format!("Row {}: {}", line, e))?;
        let status = ApplicationStatus::from_str(&row.status)
            .map_err(|e| format!("Row {}: {}", line, e))?;

        rows.push(ParsedApplicationRow {
            job_id: row.job_id.trim().to_string(),
            job_title: row.job_title.trim().to_string(),
            company: row.company.trim().to_string(),
            applied_on,
            status,
        });
    }

    if rows.is_empty() {
        return Err("CSV contains no data rows".to_string());
    }

    Ok(rows)
}

/// Export mirrors the import columns so a download can be re-uploaded.
pub fn write_applications_csv(applications: &[Application]) -> Result<String, String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(["Job ID", "Job Title", "Company", "Application Date", "Status"])
        .map_err(|e| e.to_string())?;

    for app in applications {
        let date = app
            .applied_at
            .try_to_rfc3339_string()
            .unwrap_or_default()
            .chars()
            .take(10)
            .collect::<String>();

        writer
            .write_record([
                app.job_id.as_str(),
                app.job_title.as_str(),
                app.company.as_str(),
                date.as_str(),
                app.status.as_str(),
            ])
            .map_err(|e| e.to_string())?;
    }

    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Job ID,Job Title,Company,Application Date,Status
J-1001,Backend Engineer,Acme,2025-02-01,applied
J-1002,Data Analyst,Globex,2025-02-02,in_review
J-1003,SRE,Initech,2025-02-03,interviewing
J-1004,Platform Engineer,Umbrella,2025-02-04,rejected
J-1005,Rust Developer,Hooli,2025-02-05,offer
";

    #[test]
    fn parses_five_row_template() {
        let rows = parse_applications_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].job_title, "Backend Engineer");
        assert_eq!(rows[4].status, ApplicationStatus::Offer);
    }

    #[test]
    fn rejects_unknown_status_with_line_number() {
        let bad = "\
Job ID,Job Title,Company,Application Date,Status
J-1,Engineer,Acme,2025-02-01,ghosted
";
        let err = parse_applications_csv(bad.as_bytes()).unwrap_err();
        assert!(err.starts_with("Row 2:"), "{}", err);
        assert!(err.contains("ghosted"));
    }

    #[test]
    fn rejects_bad_date_and_missing_company() {
        let bad_date = "\
Job ID,Job Title,Company,Application Date,Status
J-1,Engineer,Acme,02-2025-01,applied
";
        assert!(parse_applications_csv(bad_date.as_bytes()).is_err());

        let no_company = "\
Job ID,Job Title,Company,Application Date,Status
J-1,Engineer,,2025-02-01,applied
";
        let err = parse_applications_csv(no_company.as_bytes()).unwrap_err();
        assert!(err.contains("Company"));
    }

    #[test]
    fn accepts_us_style_dates() {
        let us = "\
Job ID,Job Title,Company,Application Date,Status
J-1,Engineer,Acme,02/01/2025,applied
";
        let rows = parse_applications_csv(us.as_bytes()).unwrap();
        assert_eq!(rows[0].applied_on.to_string(), "2025-02-01");
    }

    #[test]
    fn empty_file_rejected() {
        let empty = "Job ID,Job Title,Company,Application Date,Status\n";
        assert!(parse_applications_csv(empty.as_bytes()).is_err());
    }
}
