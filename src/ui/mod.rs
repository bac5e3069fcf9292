//! What the user sees: the command listing, failure diagnostics and the
//! verbose dump of captured output.

pub mod icons;

use console::style;

use crate::commands::Capture;
use crate::errors::DispatchError;
use crate::registry::CommandInfo;

/// Render the listing printed when a command can't be resolved.
///
/// ```text
/// Available commands:
///   chain_id: Get the chain ID of a chain from cast.
///   get: Print the value stored under a context key.
/// ```
pub fn render_listing(commands: &[CommandInfo]) -> String {
    let mut out = String::from("Available commands:\n");
    for cmd in commands {
        out.push_str(&format!("  {}: {}\n", cmd.name, cmd.description));
    }
    out
}

/// Render the output and error streams a command captured.
pub fn render_capture(command: &str, capture: &Capture) -> String {
    format!(
        "{command} - OUT:\n{}\n--\n{command} - ERR:\n{}\n",
        capture.stdout.trim_end(),
        capture.stderr.trim_end(),
    )
}

/// Print a dispatch failure to stderr.
pub fn report_error(err: &DispatchError, verbose: bool) {
    eprint!("{}", render_error(err, verbose));
}

/// Render a dispatch failure followed by whatever helps the user act on
/// it: the tool output a command captured, or the command listing.
pub fn render_error(err: &DispatchError, verbose: bool) -> String {
    let mut out = format!("{}{} {}\n", icons::CROSS, style("Error:").red().bold(), err);

    if let DispatchError::Command { command, source } = err
        && let Some((stdout, stderr)) = source.captured()
    {
        if verbose {
            out.push_str(&render_capture(command, &Capture::new(stdout, stderr)));
        } else {
            for stream in [stdout, stderr] {
                if !stream.trim().is_empty() {
                    out.push_str(stream.trim_end());
                    out.push('\n');
                }
            }
        }
    }

    if let Some(listing) = err.listing() {
        out.push_str(&render_listing(listing));
    }
    out
}

/// Print config warnings before running anything.
pub fn report_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{}{}", icons::WARN, style(warning).yellow());
    }
}
