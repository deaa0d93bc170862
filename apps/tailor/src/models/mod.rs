pub mod document;

pub use document::{DocumentKind, DocumentRecord, Template};
