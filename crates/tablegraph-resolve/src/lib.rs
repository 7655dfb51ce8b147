//! Tablegraph resolution pipeline
//!
//! Ties the other crates together for the column-injection side:
//!
//! ```text
//! table labels ──► normalize ──► label cache ──► SPARQL (stale only)
//!                                   │
//!                                   ▼
//!                            disambiguation ──► RowMatch per row
//!                                   │
//!          entity ids ──► claim cache ──► entity fetch (stale only)
//!                                   │
//!                                   ▼
//!                          usage aggregation ──► ranked PropertyStat list
//! ```
//!
//! Resolution is best-effort end to end: a row with no match comes back
//! unresolved, a failed batch contributes nothing, and nothing here ever
//! turns a partial result into a hard failure.

pub mod disambig;
pub mod pipeline;
pub mod rank;

pub use disambig::{disambiguate, resolve_rows, Disambiguation, TypeScore};
pub use pipeline::Resolver;
pub use rank::{property_coverage, rank_stats};
