//! manuscript-index — the in-memory registry behind manuscript's compiler.
//!
//! Scans a writing project for markdown documents, reads each document's
//! front matter (inline `---` block or a sibling `.yml` file), and keeps two
//! lookups over the result:
//!
//! - **by path** — one [`FileRecord`] per indexed file, keyed by its
//!   normalized path
//! - **by id** — every path that declared a given `id:` in its metadata;
//!   more than one owner means the id is ambiguous
//!
//! The compiler resolves `{id}` include directives through [`FileIndex`],
//! and the CLI renders [`tree::build_tree`] over [`FileIndex::keys`].

pub mod error;
pub mod index;
pub mod metadata;
pub mod path;
pub mod tree;

pub use error::IndexError;
pub use index::{FileIndex, FileRecord};
pub use metadata::Metadata;
pub use path::normalize;
