use crate::scenarios::TestResult;
use colored::*;

pub fn print_test_summary(results: &[TestResult]) {
    for result in results {
        let marker = if result.passed {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("{} {}: {}", marker, result.name.bold(), result.details);
    }

    let passed = results.iter().filter(|r| r.passed).count();
    println!("\n{} of {} scenarios passed", passed, results.len());
}
