use std::io::Write;
use std::path::Path;
use std::time::Duration;

use doicheck_core::VerificationResult;
use doicheck_reporting::ReportPaths;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Counts printed right after parsing.
pub fn print_parse_summary(
    w: &mut dyn Write,
    bib_name: &str,
    total: usize,
    with_doi: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "Parsing {}...", bib_name.bold())?;
    } else {
        writeln!(w, "Parsing {}...", bib_name)?;
    }
    writeln!(w, "  Total entries:     {}", total)?;
    writeln!(w, "  Entries with DOI:  {}", with_doi)?;
    writeln!(w, "  Entries w/o DOI:   {}", total - with_doi)?;
    Ok(())
}

/// What the verify loop is about to do.
pub struct Plan<'a> {
    pub already_done: usize,
    pub remaining: usize,
    pub delay: Duration,
    pub mailto: Option<&'a str>,
    pub progress_path: &'a Path,
}

pub fn print_plan(w: &mut dyn Write, plan: &Plan<'_>, color: ColorMode) -> std::io::Result<()> {
    if plan.already_done > 0 {
        writeln!(w)?;
        writeln!(w, "  Already verified:  {}", plan.already_done)?;
    }
    writeln!(w, "  Remaining:         {}", plan.remaining)?;

    if plan.remaining == 0 {
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{}", "All DOIs already verified!".green())?;
        } else {
            writeln!(w, "All DOIs already verified!")?;
        }
        return Ok(());
    }

    writeln!(w)?;
    writeln!(
        w,
        "  Estimated time: ~{} at {}s delay",
        estimate(plan.remaining, plan.delay),
        plan.delay.as_secs_f64()
    )?;
    match plan.mailto {
        Some(email) => writeln!(w, "  Using polite pool with: {}", email)?,
        None => {
            let tip = "  Tip: Use --email your@uni.edu for CrossRef's polite pool (faster)";
            if color.enabled() {
                writeln!(w, "{}", tip.dimmed())?;
            } else {
                writeln!(w, "{}", tip)?;
            }
        }
    }
    writeln!(w)?;
    writeln!(w, "  Progress saved to: {}", plan.progress_path.display())?;
    writeln!(w, "  You can stop anytime (Ctrl+C) and resume with --resume")?;
    writeln!(w)?;
    Ok(())
}

/// `remaining * delay`, as hours with one decimal above an hour, else
/// whole minutes.
pub fn estimate(remaining: usize, delay: Duration) -> String {
    let minutes = remaining as f64 * delay.as_secs_f64() / 60.0;
    let hours = minutes / 60.0;
    if hours > 1.0 {
        format!("{:.1} hours", hours)
    } else {
        format!("{:.0} minutes", minutes)
    }
}

/// The `[n/total] (pct%) key: doi` prefix of a per-entry line.
pub fn progress_prefix(position: usize, total: usize, key: &str, cleaned_doi: &str) -> String {
    let pct = if total == 0 {
        100.0
    } else {
        position as f64 / total as f64 * 100.0
    };
    let doi: String = cleaned_doi.chars().take(60).collect();
    format!("[{}/{}] ({:.1}%) {}: {}", position, total, pct, key, doi)
}

/// One completed entry: progress prefix followed by its outcome marker.
pub fn print_result(
    w: &mut dyn Write,
    position: usize,
    total: usize,
    key: &str,
    result: &VerificationResult,
    color: ColorMode,
) -> std::io::Result<()> {
    let prefix = progress_prefix(position, total, key, &result.cleaned_doi);
    if result.resolves {
        if color.enabled() {
            writeln!(w, "  {} {}", prefix, "OK".green())?;
        } else {
            writeln!(w, "  {} OK", prefix)?;
        }
    } else if result.is_not_found() {
        if color.enabled() {
            writeln!(w, "  {} {}", prefix, "NOT FOUND".red())?;
        } else {
            writeln!(w, "  {} NOT FOUND", prefix)?;
        }
    } else if !result.format_valid {
        if color.enabled() {
            writeln!(w, "  {} {}", prefix, "BAD FORMAT".yellow())?;
        } else {
            writeln!(w, "  {} BAD FORMAT", prefix)?;
        }
    } else {
        let error = result.error.as_deref().unwrap_or("ERROR");
        if color.enabled() {
            writeln!(w, "  {} {}", prefix, error.yellow())?;
        } else {
            writeln!(w, "  {} {}", prefix, error)?;
        }
    }
    Ok(())
}

pub fn print_interrupted(
    w: &mut dyn Write,
    saved: usize,
    bib_path: &Path,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(
            w,
            "  {} Progress saved ({} DOIs verified).",
            "Interrupted!".bold().yellow(),
            saved
        )?;
    } else {
        writeln!(w, "  Interrupted! Progress saved ({} DOIs verified).", saved)?;
    }
    writeln!(w, "  Resume with: doicheck {} --resume", bib_path.display())?;
    Ok(())
}

pub fn print_report_paths(
    w: &mut dyn Write,
    paths: &ReportPaths,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{} {}", "Report:".bold(), paths.text.display())?;
        writeln!(w, "{}    {}", "CSV:".bold(), paths.csv.display())?;
    } else {
        writeln!(w, "Report: {}", paths.text.display())?;
        writeln!(w, "CSV:    {}", paths.csv.display())?;
    }
    Ok(())
}
