use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use doicheck_core::{BibEntry, ProgressMap, similarity, year_matches};
use thiserror::Error;

use crate::buckets::{Checked, ReportBuckets};

pub const REPORT_FILE_NAME: &str = "doi_verification_report.txt";
pub const CSV_FILE_NAME: &str = "doi_verification_results.csv";

const CSV_HEADER: &str = "cite_key,entry_type,bib_title,bib_date,doi,format_valid,resolves,status_code,crossref_title,crossref_year,title_similarity,year_match,error\n";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where the two report artifacts were written.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub text: PathBuf,
    pub csv: PathBuf,
}

/// Render both reports and write them into `output_dir` (created if missing).
pub fn write_reports(
    entries: &[BibEntry],
    progress: &ProgressMap,
    output_dir: &Path,
) -> Result<ReportPaths, ReportError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ReportError::Io { path, source }
    };

    std::fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;

    let paths = ReportPaths {
        text: output_dir.join(REPORT_FILE_NAME),
        csv: output_dir.join(CSV_FILE_NAME),
    };
    let text = export_text(entries, progress, &generated_timestamp());
    std::fs::write(&paths.text, text).map_err(io_err(&paths.text))?;
    std::fs::write(&paths.csv, export_csv(entries, progress)).map_err(io_err(&paths.csv))?;

    tracing::info!(text = %paths.text.display(), csv = %paths.csv.display(), "wrote reports");
    Ok(paths)
}

fn rule(c: char) -> String {
    std::iter::repeat_n(c, 70).collect()
}

fn section_header(out: &mut String, title: &str) {
    let thin = rule('-');
    let _ = write!(out, "\n{thin}\n{title}\n{thin}\n");
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

/// The narrative report: counts first, then one section per non-empty
/// problem bucket.
pub fn export_text(entries: &[BibEntry], progress: &ProgressMap, generated: &str) -> String {
    let b = ReportBuckets::new(entries, progress);
    let mut out = String::new();

    out.push_str("DOI VERIFICATION REPORT\n");
    let _ = writeln!(out, "Generated: {generated}");
    out.push_str(&rule('='));
    out.push_str("\n\n");

    let summary = [
        ("Total entries", b.total),
        ("Entries with DOI", b.with_doi()),
        ("Entries without DOI", b.no_doi.len()),
        ("DOIs checked", b.checked()),
        ("DOIs valid", b.valid.len()),
        ("DOIs not found (404)", b.not_found.len()),
        ("Invalid DOI format", b.invalid_format.len()),
        ("Other errors", b.other_errors.len()),
        ("Title mismatches", b.title_mismatch.len()),
        ("Year mismatches", b.year_mismatch.len()),
    ];
    for (label, count) in summary {
        let _ = writeln!(out, "{label}: {count}");
    }
    out.push('\n');

    if !b.unchecked.is_empty() {
        let _ = writeln!(
            out,
            "Note: {} DOIs not yet checked (run with --resume to continue)\n",
            b.unchecked.len()
        );
    }

    if !b.not_found.is_empty() {
        section_header(&mut out, "DOIs NOT FOUND (404) - likely typos or incorrect DOIs");
        for Checked { entry, result } in &b.not_found {
            let _ = writeln!(out, "\n  [{}]", entry.key);
            let _ = writeln!(out, "  Title: {}", or_na(entry.title()));
            let _ = writeln!(out, "  DOI:   {}", result.cleaned_doi);
        }
    }

    if !b.invalid_format.is_empty() {
        section_header(&mut out, "INVALID DOI FORMAT");
        for Checked { entry, result } in &b.invalid_format {
            let _ = writeln!(out, "\n  [{}]", entry.key);
            let _ = writeln!(out, "  Title: {}", or_na(entry.title()));
            let _ = writeln!(out, "  DOI:   {}", result.original_doi);
        }
    }

    if !b.title_mismatch.is_empty() {
        section_header(&mut out, "TITLE MISMATCHES - DOI may point to wrong article");
        for Checked { entry, result } in &b.title_mismatch {
            let _ = writeln!(out, "\n  [{}]", entry.key);
            let _ = writeln!(out, "  Bib title:      {}", or_na(entry.title()));
            let _ = writeln!(out, "  CrossRef title: {}", or_na(result.crossref_title.as_deref()));
            let _ = writeln!(out, "  DOI:            {}", result.cleaned_doi);
        }
    }

    if !b.year_mismatch.is_empty() {
        section_header(&mut out, "YEAR MISMATCHES - may indicate wrong edition/version");
        for Checked { entry, result } in &b.year_mismatch {
            let _ = writeln!(out, "\n  [{}]", entry.key);
            let _ = writeln!(out, "  Title:          {}", or_na(entry.title()));
            let _ = writeln!(out, "  Bib date:       {}", or_na(entry.bib_date()));
            let _ = writeln!(out, "  CrossRef year:  {}", or_na(result.crossref_year.as_deref()));
            let _ = writeln!(out, "  DOI:            {}", result.cleaned_doi);
        }
    }

    if !b.other_errors.is_empty() {
        section_header(&mut out, "OTHER ERRORS - connection issues, timeouts, etc.");
        for Checked { entry, result } in &b.other_errors {
            let _ = writeln!(out, "\n  [{}]", entry.key);
            let _ = writeln!(out, "  DOI:   {}", result.cleaned_doi);
            let _ = writeln!(out, "  Error: {}", result.error.as_deref().unwrap_or("Unknown"));
        }
    }

    out.push('\n');
    out.push_str(&rule('='));
    out.push_str("\nEnd of report\n");
    out
}

fn csv_escape(s: &str) -> String {
    if s.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// One row per entry that has a DOI and a checkpointed result, in
/// document order.
pub fn export_csv(entries: &[BibEntry], progress: &ProgressMap) -> String {
    let mut out = String::from(CSV_HEADER);

    for entry in entries {
        let Some(doi) = entry.doi() else {
            continue;
        };
        let Some(r) = progress.get(&entry.key) else {
            continue;
        };

        let bib_title = entry.title().unwrap_or("");
        let bib_date = entry.bib_date().unwrap_or("");
        let cr_title = r.crossref_title.as_deref().unwrap_or("");
        let cr_year = r.crossref_year.as_deref().unwrap_or("");

        let title_sim = if !bib_title.is_empty() && !cr_title.is_empty() {
            format!("{:.2}", similarity(bib_title, cr_title))
        } else {
            String::new()
        };
        let year_match = match year_matches(entry.bib_date(), r.crossref_year.as_deref()) {
            Some(true) => "yes",
            Some(false) => "no",
            None => "",
        };
        let cleaned = if r.cleaned_doi.is_empty() {
            doi
        } else {
            r.cleaned_doi.as_str()
        };
        let status = r.status_code.map(|s| s.to_string()).unwrap_or_default();

        let row = [
            csv_escape(&entry.key),
            csv_escape(&entry.entry_type),
            csv_escape(bib_title),
            csv_escape(bib_date),
            csv_escape(cleaned),
            r.format_valid.to_string(),
            r.resolves.to_string(),
            status,
            csv_escape(cr_title),
            csv_escape(cr_year),
            title_sim,
            year_match.to_string(),
            csv_escape(r.error.as_deref().unwrap_or("")),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Current UTC time as `YYYY-MM-DD HH:MM`.
pub fn generated_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let (y, m, d) = days_to_ymd(secs / 86_400);
    let minutes = (secs % 86_400) / 60;
    format!("{:04}-{:02}-{:02} {:02}:{:02}", y, m, d, minutes / 60, minutes % 60)
}

/// Convert days since Unix epoch to (year, month, day).
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    // Simplified civil calendar conversion
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doicheck_core::{VerificationResult, parse_bib};

    const BIB: &str = r#"
@article{good, title = {Democracy in Crisis}, date = {2021-03}, doi = {10.1234/good}}
@article{wrong, title = {Democracy in Crisis}, year = 2019, doi = {10.1234/wrong}}
@article{gone, title = {Lost Paper}, doi = {10.1234/gone}}
@article{typo, title = {Typo, with comma}, doi = {doi 10.12/x}}
@article{slow, title = {Slow}, doi = {10.1234/slow}}
@book{plain, title = {No identifier}}
@article{later, title = {Later}, doi = {10.1234/later}}
"#;

    fn result(doi: &str) -> VerificationResult {
        VerificationResult {
            original_doi: doi.into(),
            cleaned_doi: doi.into(),
            format_valid: true,
            resolves: false,
            status_code: None,
            crossref_title: None,
            crossref_year: None,
            crossref_type: None,
            error: None,
        }
    }

    fn progress() -> ProgressMap {
        let mut p = ProgressMap::new();
        let mut good = result("10.1234/good");
        good.resolves = true;
        good.status_code = Some(200);
        good.crossref_title = Some("Democracy in crisis".into());
        good.crossref_year = Some("2021".into());
        p.insert("good".into(), good);

        let mut wrong = result("10.1234/wrong");
        wrong.resolves = true;
        wrong.status_code = Some(200);
        wrong.crossref_title = Some("Something Else Entirely".into());
        wrong.crossref_year = Some("2020".into());
        p.insert("wrong".into(), wrong);

        let mut gone = result("10.1234/gone");
        gone.status_code = Some(404);
        gone.error = Some("DOI not found (404)".into());
        p.insert("gone".into(), gone);

        let mut typo = result("doi 10.12/x");
        typo.format_valid = false;
        typo.error = Some("Invalid DOI format".into());
        p.insert("typo".into(), typo);

        let mut slow = result("10.1234/slow");
        slow.error = Some("Request timeout".into());
        p.insert("slow".into(), slow);
        p
    }

    #[test]
    fn test_csv_escape_quotes() {
        assert_eq!(csv_escape(r#"He said "hi""#), r#""He said ""hi""""#);
    }

    #[test]
    fn test_csv_escape_comma() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
    }

    #[test]
    fn test_csv_escape_newline() {
        assert_eq!(csv_escape("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn test_csv_escape_clean() {
        assert_eq!(csv_escape("plain"), "plain");
    }

    #[test]
    fn test_days_to_ymd_epoch() {
        assert_eq!(days_to_ymd(0), (1970, 1, 1));
    }

    #[test]
    fn test_days_to_ymd_leap_year() {
        // 2024-02-29 is day 19782
        assert_eq!(days_to_ymd(19782), (2024, 2, 29));
    }

    #[test]
    fn test_generated_timestamp_shape() {
        let ts = generated_timestamp();
        assert_eq!(ts.len(), 16);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[13..14], ":");
    }

    #[test]
    fn test_text_summary_counts() {
        let entries = parse_bib(BIB);
        let text = export_text(&entries, &progress(), "2026-01-01 00:00");
        assert!(text.starts_with("DOI VERIFICATION REPORT\nGenerated: 2026-01-01 00:00\n"));
        assert!(text.contains("Total entries: 7\n"));
        assert!(text.contains("Entries with DOI: 6\n"));
        assert!(text.contains("Entries without DOI: 1\n"));
        assert!(text.contains("DOIs checked: 5\n"));
        assert!(text.contains("DOIs valid: 2\n"));
        assert!(text.contains("DOIs not found (404): 1\n"));
        assert!(text.contains("Invalid DOI format: 1\n"));
        assert!(text.contains("Other errors: 1\n"));
        assert!(text.contains("Title mismatches: 1\n"));
        assert!(text.contains("Year mismatches: 1\n"));
        assert!(text.contains("Note: 1 DOIs not yet checked"));
        assert!(text.ends_with("End of report\n"));
    }

    #[test]
    fn test_text_sections_in_order() {
        let entries = parse_bib(BIB);
        let text = export_text(&entries, &progress(), "now");
        let order = [
            "DOIs NOT FOUND (404)",
            "INVALID DOI FORMAT",
            "TITLE MISMATCHES",
            "YEAR MISMATCHES",
            "OTHER ERRORS",
        ];
        let positions: Vec<usize> = order.iter().map(|s| text.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        // Invalid-format section shows the DOI as written in the bib file.
        assert!(text.contains("DOI:   doi 10.12/x"));
        assert!(text.contains("CrossRef title: Something Else Entirely"));
        assert!(text.contains("Bib date:       2019"));
        assert!(text.contains("Error: Request timeout"));
    }

    #[test]
    fn test_text_omits_empty_sections() {
        let entries = parse_bib(BIB);
        let text = export_text(&entries, &ProgressMap::new(), "now");
        assert!(text.contains("DOIs checked: 0\n"));
        assert!(!text.contains("OTHER ERRORS"));
        assert!(!text.contains("INVALID DOI FORMAT"));
        assert!(text.contains("Note: 6 DOIs not yet checked"));
    }

    #[test]
    fn test_csv_rows() {
        let entries = parse_bib(BIB);
        let csv = export_csv(&entries, &progress());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.trim_end());
        // 5 checked entries; `plain` has no DOI and `later` is unchecked.
        assert_eq!(lines.len(), 6);
        assert_eq!(
            lines[1],
            "good,ARTICLE,Democracy in Crisis,2021-03,10.1234/good,true,true,200,Democracy in crisis,2021,1.00,yes,"
        );
        assert!(lines[2].starts_with("wrong,ARTICLE,Democracy in Crisis,2019,10.1234/wrong,true,true,200,Something Else Entirely,2020,"));
        assert!(lines[2].ends_with(",no,"));
        assert_eq!(
            lines[3],
            "gone,ARTICLE,Lost Paper,,10.1234/gone,true,false,404,,,,,DOI not found (404)"
        );
        assert!(lines[4].starts_with("typo,ARTICLE,\"Typo, with comma\","));
        assert!(lines[4].ends_with(",false,false,,,,,,Invalid DOI format"));
    }

    #[test]
    fn test_write_reports_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("reports");
        let entries = parse_bib(BIB);
        let paths = write_reports(&entries, &progress(), &out).unwrap();
        assert_eq!(paths.text, out.join(REPORT_FILE_NAME));
        assert!(paths.text.exists());
        assert!(paths.csv.exists());
        let csv = std::fs::read_to_string(&paths.csv).unwrap();
        assert_eq!(csv, export_csv(&entries, &progress()));
    }
}
