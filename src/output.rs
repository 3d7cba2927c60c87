//! Output rendering and persistence for graded exams.
//!
//! Supports LaTeX documents, JSON dumps and a CSV summary. Every artifact is
//! rendered in memory first so a failure never leaves a partial output
//! directory behind.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ExamConfig;
use crate::grading::types::StudentResult;
use crate::loader::Page;
use crate::pipeline::{Gradebook, run};
use crate::report::{Report, latex};
use crate::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Tex,
    Json,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Tex => "tex",
            Format::Json => "json",
        }
    }
}

/// How the report is turned into files.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub format: Format,
    pub split: bool,
    pub results_per_page: usize,
    pub options: BTreeMap<String, String>,
}

/// A rendered file, not yet written.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: String,
}

/// One CSV row per student.
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    surname: &'a str,
    given_name: &'a str,
    weighted: f64,
    max_points: f64,
    raw_grade: f64,
    transformed: f64,
    normalized: f64,
    rank: usize,
}

/// Logs every student's result using Rust's debug pretty-print format.
pub fn print_pretty(results: &[StudentResult]) {
    for result in results {
        debug!("{:#?}", result);
    }
}

/// Serializes a report as pretty-printed JSON.
pub fn to_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Writes the summary of `results` as CSV, header first.
pub fn summary_csv(results: &[StudentResult]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    for r in results {
        writer.serialize(SummaryRow {
            surname: &r.student.surname,
            given_name: &r.student.given_name,
            weighted: r.weighted,
            max_points: r.max_points,
            raw_grade: r.raw_grade,
            transformed: r.transformed,
            normalized: r.normalized,
            rank: r.rank,
        })?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV summary: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn render_one(report: &Report, settings: &RenderSettings, per_page: usize) -> Result<String> {
    match settings.format {
        Format::Tex => latex::render(report, &settings.options, per_page)
            .context("rendering LaTeX document"),
        Format::Json => to_json(report),
    }
}

/// File name for a student's own document, free of path separators.
fn student_file_name(report: &Report, extension: &str) -> String {
    let stem = report
        .students
        .first()
        .map(|s| format!("{}_{}", s.header.student.surname, s.header.student.given_name))
        .unwrap_or_else(|| "student".to_string());
    let stem: String = stem
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{stem}.{extension}")
}

/// Renders every artifact of a run.
pub fn render(gradebook: &Gradebook, settings: &RenderSettings) -> Result<Vec<Artifact>> {
    let extension = settings.format.extension();
    let mut artifacts = Vec::new();

    if settings.split {
        for single in gradebook.report.split() {
            artifacts.push(Artifact {
                file_name: student_file_name(&single, extension),
                contents: render_one(&single, settings, 1)?,
            });
        }
    } else {
        artifacts.push(Artifact {
            file_name: format!("out.{extension}"),
            contents: render_one(&gradebook.report, settings, settings.results_per_page)?,
        });
    }

    artifacts.push(Artifact {
        file_name: "summary.csv".to_string(),
        contents: summary_csv(&gradebook.results)?,
    });

    Ok(artifacts)
}

/// Writes artifacts into `outdir`, creating it if needed.
///
/// On failure the files already written by this call are removed, and so is
/// `outdir` when this call created it.
pub fn write_artifacts(outdir: &Path, artifacts: &[Artifact]) -> Result<()> {
    let created = !outdir.exists();
    fs::create_dir_all(outdir)
        .with_context(|| format!("creating output directory '{}'", outdir.display()))?;

    let mut written: Vec<PathBuf> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = outdir.join(&artifact.file_name);
        debug!(path = %path.display(), bytes = artifact.contents.len(), "Writing artifact");
        if let Err(e) = fs::write(&path, &artifact.contents) {
            written.push(path.clone());
            discard(outdir, created, &written);
            return Err(e).with_context(|| format!("writing '{}'", path.display()));
        }
        written.push(path);
    }

    info!(outdir = %outdir.display(), files = artifacts.len(), "Output written");
    Ok(())
}

fn discard(outdir: &Path, created: bool, written: &[PathBuf]) {
    warn!(outdir = %outdir.display(), files = written.len(), "Removing partial output");
    if created {
        let _ = fs::remove_dir_all(outdir);
        return;
    }
    for path in written {
        let _ = fs::remove_file(path);
    }
}

/// Grades `pages`, renders the report and writes it into `outdir`.
///
/// Rendering happens before the first write, so a grading or rendering error
/// leaves `outdir` untouched.
pub fn publish(
    pages: &[Page],
    exam_name: &str,
    config: &ExamConfig,
    transform: &Transform,
    settings: &RenderSettings,
    outdir: &Path,
) -> Result<Gradebook> {
    let gradebook = run(pages, exam_name, config, transform)?;
    print_pretty(&gradebook.results);

    let artifacts = render(&gradebook, settings)?;
    write_artifacts(outdir, &artifacts)?;

    Ok(gradebook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn gradebook() -> Gradebook {
        let page = Page::from_rows(
            "Pb1",
            &[
                vec!["Barème", "1", "2"],
                vec!["", "2", "3"],
                vec![],
                vec![],
                vec!["Nom", "Prénom", "1", "2"],
                vec!["Doe", "Jane", "4", "4"],
                vec!["Roe", "Rick", "2", "2"],
            ],
        );
        run(&[page], "DS1", &ExamConfig::default(), &Transform::identity()).unwrap()
    }

    fn settings(format: Format, split: bool) -> RenderSettings {
        RenderSettings {
            format,
            split,
            results_per_page: 3,
            options: ExamConfig::default().render_options(),
        }
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&gradebook().results);
    }

    #[test]
    fn test_summary_csv_header_once() {
        let csv = summary_csv(&gradebook().results).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("surname,given_name,weighted"));
        assert_eq!(lines[1], "Doe,Jane,5.0,5.0,20.0,20.0,20.0,1");
    }

    #[test]
    fn test_combined_render() {
        let artifacts = render(&gradebook(), &settings(Format::Tex, false)).unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["out.tex", "summary.csv"]);
    }

    #[test]
    fn test_split_render() {
        let artifacts = render(&gradebook(), &settings(Format::Json, true)).unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["Doe_Jane.json", "Roe_Rick.json", "summary.csv"]);

        let doc: serde_json::Value = serde_json::from_str(&artifacts[0].contents).unwrap();
        assert_eq!(doc["students"].as_array().unwrap().len(), 1);
        assert_eq!(doc["students"][0]["header"]["rank"], 1);
    }

    #[test]
    fn test_write_artifacts_creates_directory() {
        let dir = env::temp_dir().join("exam_stats_test_write_artifacts");
        let _ = fs::remove_dir_all(&dir);

        let artifacts = vec![Artifact {
            file_name: "out.tex".to_string(),
            contents: "hello".to_string(),
        }];
        write_artifacts(&dir, &artifacts).unwrap();

        assert_eq!(fs::read_to_string(dir.join("out.tex")).unwrap(), "hello");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_write_removes_earlier_files() {
        let dir = env::temp_dir().join("exam_stats_test_failed_write");
        let _ = fs::remove_dir_all(&dir);

        let artifacts = vec![
            Artifact {
                file_name: "out.tex".to_string(),
                contents: "hello".to_string(),
            },
            Artifact {
                file_name: "no_such_dir/summary.csv".to_string(),
                contents: "a,b".to_string(),
            },
        ];

        assert!(write_artifacts(&dir, &artifacts).is_err());
        assert!(!dir.exists());
    }

    #[test]
    fn test_failed_write_keeps_existing_directory() {
        let dir = env::temp_dir().join("exam_stats_test_failed_write_existing");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("notes.txt"), "keep me").unwrap();

        let artifacts = vec![
            Artifact {
                file_name: "out.tex".to_string(),
                contents: "hello".to_string(),
            },
            Artifact {
                file_name: "no_such_dir/summary.csv".to_string(),
                contents: "a,b".to_string(),
            },
        ];

        assert!(write_artifacts(&dir, &artifacts).is_err());
        assert!(!dir.join("out.tex").exists());
        assert_eq!(fs::read_to_string(dir.join("notes.txt")).unwrap(), "keep me");
        fs::remove_dir_all(&dir).unwrap();
    }
}
