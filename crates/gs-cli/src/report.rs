//! Console output for the grid and the search results.

use std::io::{self, Write};

use gs_optimizer::{format_params, CvResults, ParamGrid, ParameterValue};

const LINE_WIDTH: usize = 80;
const INDENT: &str = "    ";

fn format_values(values: &[ParameterValue]) -> String {
    let body = values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{body}]")
}

/// Dict-literal rendering of the grid. Falls back to one entry per line,
/// indented by four spaces, when a single line would be wider than 80.
pub fn format_grid(grid: &ParamGrid) -> String {
    let entries: Vec<String> = grid
        .iter()
        .map(|(name, values)| format!("'{name}': {}", format_values(values)))
        .collect();

    let single = format!("{{{}}}", entries.join(", "));
    if single.len() <= LINE_WIDTH || entries.len() < 2 {
        return single;
    }

    let mut out = String::from("{");
    for (i, entry) in entries.iter().enumerate() {
        if i == 0 {
            out.push_str(&INDENT[1..]);
        } else {
            out.push_str(",\n");
            out.push_str(INDENT);
        }
        out.push_str(entry);
    }
    out.push('}');
    out
}

pub fn print_grid<W: Write>(grid: &ParamGrid, out: &mut W) -> io::Result<()> {
    writeln!(out, "Grid Search Over: ")?;
    writeln!(out, "{}", format_grid(grid))
}

/// Best line, then one `mean (std) with: params` row per candidate in
/// enumeration order.
pub fn print_results<W: Write>(results: &CvResults, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "Best: {:.6} using {}",
        results.best_score(),
        format_params(results.best_params())
    )?;
    for candidate in results.candidates() {
        writeln!(
            out,
            "{:.6} ({:.6}) with: {}",
            candidate.mean_test_score,
            candidate.std_test_score,
            format_params(&candidate.params)
        )?;
    }
    Ok(())
}
