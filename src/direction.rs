//! Direction-string parsing (§6): `"xx,y"` -> `[[0, 0], [1]]`.
//!
//! An axis combination is a comma-separated list of factors, each factor a
//! run of `x`/`y`/`z` characters (axis 0/1/2); an empty factor denotes the
//! identity (no velocity operator for that position in the chain). Any
//! character outside `xyz,` aborts with a configuration error, matching the
//! "illegal character aborts the job" requirement.

use crate::error::{KpmError, KpmResult};

fn axis_of(c: char) -> KpmResult<usize> {
    match c {
        'x' => Ok(0),
        'y' => Ok(1),
        'z' => Ok(2),
        other => Err(KpmError::config(format!(
            "illegal character '{other}' in direction string"
        ))),
    }
}

/// Parse a direction string into one axis list per comma-separated factor.
pub fn parse_direction(spec: &str) -> KpmResult<Vec<Vec<usize>>> {
    spec.split(',')
        .map(|factor| factor.chars().map(axis_of).collect())
        .collect()
}
