//! # Route Modules
//!
//! - [`exchanges`] — holder-facing exchange lifecycle (request, finalize)
//! - [`offers`] — vendor-facing offer submission and completion
//! - [`inspection`] — credential verification for relying parties
//! - [`disclosures`] — request-template management

pub mod disclosures;
pub mod exchanges;
pub mod inspection;
pub mod offers;
