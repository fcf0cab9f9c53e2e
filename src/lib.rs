//! Algtest - runner for the tpm2-algtest container suite
//!
//! Drives the `tpm2-algtest` image against a local TPM, collects its output
//! under one directory and zips it for submission. Keygen results for RSA
//! only disclose `n`, `e` and one prime `p`; the private halves are
//! reconstructed here before archiving.
//!
//! ## Flow
//!
//! ```text
//! quicktest ─┐
//! keygen ────┼─→ out/ ─→ Keygen_RSA_*_keys.csv += q, d ─→ out.zip
//! perf ──────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use algtest::batch::compute_rsa_privates;
//! use algtest::keys::Euclid;
//! use std::path::Path;
//!
//! let report = compute_rsa_privates(Path::new("out/Keygen_RSA_2048_keys.csv"), &Euclid).unwrap();
//! println!("{} keys reconstructed", report.reconstructed);
//! ```

pub mod archive;
pub mod batch;
pub mod cli;
pub mod error;
pub mod keys;
pub mod runner;
pub mod table;

pub use error::{AlgtestError, Result};
pub use keys::{reconstruct, Euclid, KeyArithmetic, RowOutcome};
pub use table::{Row, Table};
