//! Terminal output helpers shared by the commands.

use colored::{ColoredString, Colorize};
use tenancy::Outcome;

/// Neutral status line.
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Something the operator should read before continuing.
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Goes to stderr.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Indented secondary detail.
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Bold title with an underline rule.
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// `[n/total]` prefix for batch progress.
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

/// Outcome symbol in its color.
pub fn outcome_symbol(outcome: Outcome) -> ColoredString {
    let symbol = outcome.symbol();
    match outcome {
        Outcome::Deleted | Outcome::Created | Outcome::Updated => symbol.green(),
        Outcome::AlreadyAbsent | Outcome::ConflictSkipped => symbol.dimmed(),
        Outcome::Blocked | Outcome::Failed => symbol.red(),
        Outcome::WouldRun => symbol.cyan(),
        Outcome::NotAttempted => symbol.yellow(),
    }
}

/// Shorten a resource name for the summary table.
pub fn truncate(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        name.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = name.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("bookverse", 20), "bookverse");
        assert_eq!(truncate("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(
            truncate("bookverse-npm-dev-local", 15),
            "bookverse-np..."
        );
    }

    #[test]
    fn test_truncate_edge_cases() {
        assert_eq!(truncate("test", 3), "...");
        assert_eq!(truncate("", 10), "");
    }
}
