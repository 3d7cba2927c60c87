//! Reading spreadsheet pages and turning them into a scale plus raw scores.
//!
//! One page is one problem. Pages come in as CSV exports of the spreadsheet
//! sheets; the problem takes the file stem as its name.

pub mod scale;
pub mod scores;

use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{GradeError, Result};
use crate::grading::types::{RawScore, Scale, StudentId};

pub use scale::{ScaleFragment, load_scale};
pub use scores::{PageScores, load_scores};

/// A raw grid of cells for one problem.
#[derive(Debug, Clone)]
pub struct Page {
    pub name: String,
    rows: Vec<Vec<String>>,
}

impl Page {
    pub fn from_rows<S: AsRef<str>>(name: impl Into<String>, rows: &[Vec<S>]) -> Self {
        Self {
            name: name.into(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.as_ref().to_string()).collect())
                .collect(),
        }
    }

    /// Reads a headerless CSV grid. Rows may have different lengths.
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> csv::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            name: name.into(),
            rows,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Trimmed cell content, `""` when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.row(row).get(col).map(|c| c.trim()).unwrap_or("")
    }
}

/// Parses a numeric cell, accepting a comma as decimal separator.
/// Returns `None` for anything that is not a finite number.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Reads one page from a CSV file.
pub fn read_page(path: &Path) -> Result<Page> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("page")
        .to_string();
    let file = fs::File::open(path)?;
    Page::from_reader(name, file).map_err(|source| GradeError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Expands directories into their `*.csv` files (sorted by name), then keeps
/// the first `limit` pages when `limit > 0`.
pub fn page_paths(inputs: &[PathBuf], limit: i64) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in fs::read_dir(input)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                    found.push(path);
                }
            }
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }

    if limit > 0 {
        paths.truncate(limit as usize);
    }

    if paths.is_empty() {
        return Err(GradeError::EmptyInput("no page to read".to_string()));
    }

    Ok(paths)
}

#[tracing::instrument(skip(inputs), fields(inputs = inputs.len()))]
pub fn read_pages(inputs: &[PathBuf], limit: i64) -> Result<Vec<Page>> {
    let paths = page_paths(inputs, limit)?;
    let mut pages = Vec::with_capacity(paths.len());

    for path in &paths {
        let page = read_page(path)?;
        debug!(path = %path.display(), rows = page.row_count(), "Page read");
        pages.push(page);
    }

    Ok(pages)
}

/// Everything read from the input, before any check across pages.
#[derive(Debug, Clone)]
pub struct LoadedExam {
    pub scale: Scale,
    pub scores: Vec<RawScore>,
    /// Students in order of first appearance.
    pub students: Vec<StudentId>,
    pub problems: Vec<String>,
    pub identity_fields: [String; 2],
    pub max_questions: usize,
}

/// Runs the scale and score loaders over every page.
#[tracing::instrument(skip_all, fields(pages = pages.len()))]
pub fn load_exam(pages: &[Page], scores_header_row: usize) -> Result<LoadedExam> {
    if pages.is_empty() {
        return Err(GradeError::EmptyInput("no page to read".to_string()));
    }

    let mut scale = Scale::default();
    let mut scores = Vec::new();
    let mut students = Vec::new();
    let mut seen = HashSet::new();
    let mut problems: Vec<String> = Vec::new();
    let mut identity_fields: Option<[String; 2]> = None;
    let mut max_questions = 0;

    for page in pages {
        if problems.contains(&page.name) {
            return Err(GradeError::DuplicateProblem(page.name.clone()));
        }
        let fragment = load_scale(page)?;
        let page_scores = load_scores(page, &fragment, scores_header_row)?;

        debug!(
            problem = %fragment.problem,
            questions = fragment.questions.len(),
            total = fragment.total,
            students = page_scores.students.len(),
            "Page loaded"
        );

        max_questions = max_questions.max(fragment.questions.len());
        problems.push(fragment.problem.clone());
        for question in fragment.questions {
            scale.push(question);
        }

        if identity_fields.is_none() {
            identity_fields = Some(page_scores.identity_fields);
        }
        for student in page_scores.students {
            if seen.insert(student.clone()) {
                students.push(student);
            }
        }
        scores.extend(page_scores.scores);
    }

    info!(
        problems = problems.len(),
        questions = scale.len(),
        students = students.len(),
        "Exam loaded"
    );

    Ok(LoadedExam {
        scale,
        scores,
        students,
        problems,
        identity_fields: identity_fields.unwrap_or_default(),
        max_questions,
    })
}
