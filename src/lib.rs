//! # ttar
//!
//! Plain-text archives of small directory trees.
//!
//! A ttar archive stores regular text files, directories and symbolic links
//! as a line-oriented text stream, so test fixtures can be committed and
//! reviewed as ordinary diffs.
//!
//! ## Format
//!
//! ```text
//! Directory: fixtures
//! Mode: 755
//! # ttar - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//! Path: fixtures/cmdline
//! Lines: 1
//! vimNULLBYTEtest.goNULLBYTEEOF
//! Mode: 644
//! # ttar - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//! Path: fixtures/self
//! SymlinkTo: cmdline
//! # ttar - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//! ```
//!
//! - `Lines: n` is followed by exactly `n` content lines, whatever they contain.
//! - NUL bytes in content are written as `NULLBYTE`.
//! - A file that does not end in a newline gets `EOF` appended to its last line.
//! - `#` lines between records are comments.
//!
//! Source files may not contain `NULLBYTE` or `EOF` themselves; encoding
//! such a file fails.
//!
//! ## Trust model
//!
//! Archive paths are used as they are. Absolute paths and `..` components
//! are not rejected, and there are no size limits. Only extract archives you
//! trust.
//!
//! Symlinks and mode strings make this crate Unix only.

pub mod archive;
pub mod command;
pub mod decoder;
pub mod encoder;
pub mod extract;
pub mod list;
pub mod mode;

pub use archive::{ArchiveError, Entry, Header};
pub use command::{Operation, Options};
pub use decoder::{Decoder, RecordSink};
pub use encoder::Encoder;
pub use extract::Extractor;
pub use list::Inventory;
pub use mode::{ReadMode, UnixModeAdapter, WriteMode};
