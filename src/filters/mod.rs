//! Format filters
//!
//! Record decoders built on the stream API: `csv`, `tsv` and `ltsv`
//! turn lines into arrays, and the `number` string method parses a
//! single field.

pub mod csv;

use tracing::debug;

use crate::runtime::error::RtResult;
use crate::runtime::namespace::{self, Namespace};
use crate::runtime::value::{CFunc, Value};

/// Where an export is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// The namespace passed to [`init`]
    Target,
    /// The built-in `string` namespace, as a method
    StringMethod,
}

/// A native function exported by a filter module.
#[derive(Debug, Clone)]
pub struct FilterExport {
    /// Binding name (e.g., "csv")
    pub name: &'static str,
    /// Signature shown in listings
    pub signature: &'static str,
    pub scope: ExportScope,
    pub func: CFunc,
}

/// Every export of the filter modules.
pub fn exports() -> Vec<FilterExport> {
    vec![
        FilterExport {
            name: "csv",
            signature: "() -> stream",
            scope: ExportScope::Target,
            func: csv::csv,
        },
        FilterExport {
            name: "tsv",
            signature: "() -> stream",
            scope: ExportScope::Target,
            func: csv::tsv,
        },
        FilterExport {
            name: "ltsv",
            signature: "() -> stream",
            scope: ExportScope::Target,
            func: csv::ltsv,
        },
        FilterExport {
            name: "number",
            signature: "(self: string) -> number",
            scope: ExportScope::StringMethod,
            func: csv::str_number,
        },
    ]
}

/// Bind the filter functions into `ns` and the string methods into the
/// `string` namespace.
pub fn init(ns: &Namespace) -> RtResult<()> {
    let strings = namespace::string();
    for export in exports() {
        match export.scope {
            ExportScope::Target => ns.define_func(export.name, export.func)?,
            // Methods are shared by every caller of `init` on this thread.
            ExportScope::StringMethod => strings.set(export.name, Value::from_cfunc(export.func)),
        }
        debug!(name = export.name, signature = export.signature, "filter registered");
    }
    Ok(())
}

#[cfg(test)]
mod tests;
