//! LaTeX rendering of a [`Report`].

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use crate::config::DEFAULT_RENDER_OPTIONS;
use crate::report::assemble::{ProblemTable, Report, StudentReport};

/// Escapes the characters LaTeX treats specially in text mode.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn option<'a>(options: &'a BTreeMap<String, String>, name: &str) -> &'a str {
    options.get(name).map(String::as_str).unwrap_or_else(|| {
        DEFAULT_RENDER_OPTIONS
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .unwrap_or("")
    })
}

/// Renders a complete document, `per_page` students per page.
pub fn render(
    report: &Report,
    options: &BTreeMap<String, String>,
    per_page: usize,
) -> Result<String, fmt::Error> {
    let mut out = String::new();

    writeln!(
        out,
        r"\documentclass[{}]{{article}}",
        option(options, "latex_documentclass_options")
    )?;
    writeln!(out, r"\usepackage[utf8]{{inputenc}}")?;
    writeln!(out, r"\usepackage[T1]{{fontenc}}")?;
    writeln!(
        out,
        r"\usepackage[{}]{{geometry}}",
        option(options, "latex_geometry_options")
    )?;
    writeln!(out, r"\pagestyle{{empty}}")?;
    writeln!(out, r"\setlength{{\parindent}}{{0pt}}")?;
    writeln!(out, r"\begin{{document}}")?;
    writeln!(out, r"\{}", option(options, "latex_font_size"))?;

    let columns = report.metadata.max_questions;
    for (i, page) in report.students.chunks(per_page.max(1)).enumerate() {
        if i > 0 {
            writeln!(out, r"\newpage")?;
        }
        for student in page {
            render_student(&mut out, student, columns)?;
        }
    }

    writeln!(out, r"\end{{document}}")?;
    Ok(out)
}

fn render_student(out: &mut String, student: &StudentReport, columns: usize) -> fmt::Result {
    let h = &student.header;
    writeln!(
        out,
        r"\textbf{{{}}} \hfill \textbf{{{}}} \hfill rank: {} \hfill grade: {:.2} \hfill mean: {:.2} \hfill std: {:.2}\\",
        escape(&h.exam_name),
        escape(&h.student.to_string()),
        h.rank,
        h.grade,
        h.class_mean,
        h.class_std,
    )?;

    let synthesis: Vec<String> = student
        .synthesis
        .iter()
        .map(|line| escape(&line.to_string()))
        .collect();
    writeln!(out, r"{}\\[2pt]", synthesis.join(r" \quad "))?;

    for table in &student.tables {
        render_table(out, table, columns)?;
    }
    writeln!(out, r"\vspace{{1em}}")?;
    writeln!(out)
}

fn render_table(out: &mut String, table: &ProblemTable, columns: usize) -> fmt::Result {
    // Tables are padded to the widest problem so they line up.
    let width = columns.max(table.questions.len());
    let pad = width - table.questions.len();

    let row = |name: &str, cells: Vec<String>| -> String {
        let mut cells = cells;
        cells.extend(std::iter::repeat_n(String::new(), pad));
        format!(r"{} & {} \\", name, cells.join(" & "))
    };

    writeln!(out, r"\begin{{tabular}}{{l|*{{{width}}}{{c}}}}")?;
    writeln!(
        out,
        "{}",
        row(
            &escape(&table.problem),
            table.questions.iter().map(|q| escape(&q.label)).collect()
        )
    )?;
    writeln!(out, r"\hline")?;
    writeln!(
        out,
        "{}",
        row("scale", table.questions.iter().map(|q| format!("{}", q.scale)).collect())
    )?;
    writeln!(
        out,
        "{}",
        row("on paper", table.questions.iter().map(|q| format!("{}", q.on_paper)).collect())
    )?;
    writeln!(
        out,
        "{}",
        row("weighted", table.questions.iter().map(|q| format!("{:.2}", q.weighted)).collect())
    )?;
    writeln!(
        out,
        "{}",
        row(
            "class success",
            table
                .questions
                .iter()
                .map(|q| format!(r"{:.0}\%", q.class_success * 100.0))
                .collect()
        )
    )?;
    writeln!(out, r"\end{{tabular}}\\[2pt]")
}
