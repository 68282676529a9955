use crate::research::Review;
use crate::session::Exported;

pub fn estimate(max_iterations: usize) -> String {
    format!(
        "This will take approximately {} seconds...",
        max_iterations * 20
    )
}

pub fn progress_line(label: &str, fraction: f32) -> String {
    format!("[{:>3.0}%] {}", fraction * 100.0, label)
}

pub fn print_progress(label: &str, fraction: f32) {
    eprintln!("{}", progress_line(label, fraction));
}

/// One line about the export of a finished search, if exports are enabled.
pub fn export_status<T>(
    exported: &Exported<T>,
    describe: impl FnOnce(&T) -> String,
) -> Option<String> {
    match exported {
        Some(Ok(written)) => Some(format!("Saved {}", describe(written))),
        Some(Err(err)) => Some(format!("Export failed: {}", err)),
        None => None,
    }
}

/// Metrics, numbered search queries, then the findings.
pub fn review_summary(review: &Review) -> String {
    let metadata = &review.metadata;
    let iterations = metadata
        .total_iterations
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        format!("Searches performed: {}", metadata.searches_performed.len()),
        format!("Tool uses: {}", metadata.tool_uses),
        format!("Iterations: {}", iterations),
    ];

    if !metadata.searches_performed.is_empty() {
        lines.push("\nSearch queries used:".to_string());
        lines.extend(
            metadata
                .searches_performed
                .iter()
                .enumerate()
                .map(|(i, query)| format!("{}. {}", i + 1, query)),
        );
    }

    lines.push(format!("\nLiterature review:\n\n{}", review.findings));
    lines.join("\n") + "\n"
}
