// src/exec/output.rs

use crate::errors::CountFailure;

/// Parse the count tool's stdout into a list of counts.
///
/// The output is whitespace separated non-negative integers, normally a
/// single `"3\n"`. Several integers are kept in order; each one becomes its
/// own status update downstream.
pub fn parse_counts(stdout: &str) -> Result<Vec<u64>, CountFailure> {
    let mut counts = Vec::new();

    for token in stdout.split_whitespace() {
        let count = token.parse::<u64>().map_err(|e| {
            CountFailure::QueryOutputMalformed(format!("token {token:?} is not a count: {e}"))
        })?;
        counts.push(count);
    }

    if counts.is_empty() {
        return Err(CountFailure::QueryOutputMalformed(
            "no count in output".to_string(),
        ));
    }

    Ok(counts)
}
