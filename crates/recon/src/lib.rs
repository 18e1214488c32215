//! `polecheck-recon`: pole QC reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded JSON documents, returns the pole
//! model, span diffs, fiber reconciliation and QC verdicts.
//! No CLI or IO dependencies.

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fiber_compare;
pub mod kmz;
pub mod model;
pub mod overlay;
pub mod parse;
pub mod qc;
pub mod rules;
pub mod spans;
pub mod summary;

pub use config::QcConfig;
pub use diff::compare_designs;
pub use engine::{parse_input, parse_kmz, run, QcInput};
pub use error::QcError;
pub use fiber_compare::process_fiber_comparison_data;
pub use kmz::{kmz_from_feature_collection, match_kmz_to_poles};
pub use model::{QcCheckResult, QcReport, QcResults, QcRule, QcStatus};
pub use overlay::{EditOverlay, EXPORT_FILE_NAME};
pub use parse::{extract_pole_data, extract_project_info, validate_pole_data};
pub use qc::run_qc_checks;
pub use spans::{identify_spans_in_layer, match_spans_between_layers};
