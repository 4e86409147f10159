use std::time::Duration;

use crate::event::CapturedException;

/// Generic notice shown to the end user after a capture. Location and trace
/// are only included when `debug` is enabled.
pub fn format_failure_notice(err: &CapturedException, debug: bool) -> String {
    let mut output = String::new();
    output.push_str("An error occurred\n\n");
    output.push_str(&format!("{}: {}\n", err.kind, err.message));

    if debug {
        if let (Some(file), Some(line)) = (&err.file, err.line) {
            output.push_str(&format!("\n{}:{}\n", file, line));
        }
        if !err.trace.is_empty() {
            output.push('\n');
            for (i, frame) in err.trace.iter().enumerate() {
                output.push_str(&format!(
                    "#{} {}({}): {}()\n",
                    i, frame.file, frame.line, frame.function
                ));
            }
        }
    }

    output.push_str("\nThe error has been logged.\n");
    output
}

/// Format a duration as `1.2s` or `3m 4s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let total = secs.round() as u64;
        format!("{}m {}s", total / 60, total % 60)
    }
}
