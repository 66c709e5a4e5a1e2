//! CLI surface and the validated federation size configuration.
use std::path::PathBuf;

use clap::Parser;

use libfed_base::{err, Result};

/// `libfed <scenario-file> --num-libraries <N^2> --num-borrowers <M>
/// [--log-level <LEVEL>]`.
///
/// Replaces the reference design's positional `argc != 3` check and derived
/// `(N^3)/2` borrower count with explicit, `clap`-validated flags
/// (`spec.md` §9 Open Questions).
#[derive(Parser, Debug)]
#[command(name = "libfed", about = "Distributed library federation simulator")]
pub struct Cli {
    /// Path to the scenario file.
    pub scenario: PathBuf,

    /// Number of library processes. Must be a perfect square (a grid side
    /// `N` must exist).
    #[arg(long = "num-libraries")]
    pub num_libraries: u32,

    /// Number of borrower processes.
    #[arg(long = "num-borrowers")]
    pub num_borrowers: u32,

    /// `tracing-subscriber` env-filter directive, e.g. `info` or `libfed=debug`.
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn federation_config(&self) -> Result<FederationConfig> {
        FederationConfig::new(self.num_libraries, self.num_borrowers)
    }
}

/// The validated `(num_libraries, num_borrowers)` pair that drives process
/// counts and grid sizing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FederationConfig {
    pub num_libraries: u32,
    pub num_borrowers: u32,
    pub grid_side: u32,
}

impl FederationConfig {
    pub fn new(num_libraries: u32, num_borrowers: u32) -> Result<Self> {
        if num_borrowers == 0 {
            return Err(err("num-borrowers must be at least 1"));
        }
        if num_libraries == 0 {
            return Err(err("num-libraries must be at least 1"));
        }
        let grid_side = square_root_if_perfect(num_libraries)
            .ok_or_else(|| err(format!("num-libraries ({num_libraries}) is not a perfect square")))?;
        Ok(FederationConfig { num_libraries, num_borrowers, grid_side })
    }
}

/// `Some(sqrt(n))` if `n` is a perfect square, `None` otherwise.
fn square_root_if_perfect(n: u32) -> Option<u32> {
    let approx = (n as f64).sqrt().round() as u32;
    (approx * approx == n).then_some(approx)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_perfect_square() {
        let cfg = FederationConfig::new(9, 4).unwrap();
        assert_eq!(cfg.grid_side, 3);
    }

    #[test]
    fn rejects_non_square() {
        assert!(FederationConfig::new(8, 4).is_err());
    }

    #[test]
    fn rejects_zero_borrowers() {
        assert!(FederationConfig::new(4, 0).is_err());
    }
}
