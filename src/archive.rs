//! Record grammar, content escaping and archive error types

use std::ffi::OsStr;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

// Header keywords
pub const PATH_PREFIX: &[u8] = b"Path: ";
pub const LINES_PREFIX: &[u8] = b"Lines: ";
pub const DIRECTORY_PREFIX: &[u8] = b"Directory: ";
pub const SYMLINK_PREFIX: &[u8] = b"SymlinkTo: ";
pub const MODE_PREFIX: &[u8] = b"Mode: ";
pub const COMMENT_PREFIX: u8 = b'#';

/// Separator written after every record
pub const DIVIDER: &str =
    "# ttar - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -";

// Reserved content tokens
pub const NULL_TOKEN: &[u8] = b"NULLBYTE";
pub const EOF_TOKEN: &[u8] = b"EOF";

/// One header line of a ttar stream, borrowed from the line it was parsed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header<'a> {
    /// `Path: <p>` opens a file or symlink record
    Path(&'a Path),
    /// `Lines: <n>` announces a content block of `n` lines
    Lines(usize),
    /// `Directory: <p>`
    Directory(&'a Path),
    /// `SymlinkTo: <target>`
    SymlinkTo(&'a Path),
    /// `Mode: <m>`
    Mode(&'a str),
    /// Divider or any other `#` line
    Comment,
    /// Blank line between records
    Blank,
}

impl<'a> Header<'a> {
    /// Parse a header line (without its line terminator).
    ///
    /// Keywords are tested in a fixed precedence: `Path`, `Lines`, `Directory`,
    /// `SymlinkTo`, `Mode`, then comments. Returns `None` for anything else,
    /// including an empty `Path:`/`Directory:` value, a `Lines:` value that is
    /// not a plain run of decimal digits, or a mode that is not valid UTF-8.
    pub fn parse(line: &'a [u8]) -> Option<Self> {
        if let Some(rest) = line.strip_prefix(PATH_PREFIX) {
            return non_empty_path(rest).map(Header::Path);
        }
        if let Some(rest) = line.strip_prefix(LINES_PREFIX) {
            if rest.is_empty() || !rest.iter().all(u8::is_ascii_digit) {
                return None;
            }
            let count = std::str::from_utf8(rest).ok()?.parse::<usize>().ok()?;
            return Some(Header::Lines(count));
        }
        if let Some(rest) = line.strip_prefix(DIRECTORY_PREFIX) {
            return non_empty_path(rest).map(Header::Directory);
        }
        if let Some(rest) = line.strip_prefix(SYMLINK_PREFIX) {
            return Some(Header::SymlinkTo(bytes_to_path(rest)));
        }
        if let Some(rest) = line.strip_prefix(MODE_PREFIX) {
            return std::str::from_utf8(rest).ok().map(Header::Mode);
        }
        if line.first() == Some(&COMMENT_PREFIX) {
            return Some(Header::Comment);
        }
        if line.is_empty() {
            return Some(Header::Blank);
        }
        None
    }
}

/// `None` for an empty header value
fn non_empty_path(bytes: &[u8]) -> Option<&Path> {
    (!bytes.is_empty()).then(|| bytes_to_path(bytes))
}

/// Borrow raw header bytes as a path
pub fn bytes_to_path(bytes: &[u8]) -> &Path {
    Path::new(OsStr::from_bytes(bytes))
}

/// Write `<keyword><value>\n`
pub fn write_header<W: Write>(sink: &mut W, keyword: &[u8], value: &[u8]) -> io::Result<()> {
    sink.write_all(keyword)?;
    sink.write_all(value)?;
    sink.write_all(b"\n")
}

pub fn write_divider<W: Write>(sink: &mut W) -> io::Result<()> {
    sink.write_all(DIVIDER.as_bytes())?;
    sink.write_all(b"\n")
}

/// Return the first reserved token found in `data`, if any
pub fn find_reserved_token(data: &[u8]) -> Option<&'static str> {
    [("NULLBYTE", NULL_TOKEN), ("EOF", EOF_TOKEN)]
        .into_iter()
        .find(|(_, token)| contains(data, token))
        .map(|(name, _)| name)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Number of content lines a file occupies in the stream.
///
/// Every newline ends one line. A non-empty file without a final newline
/// gets one more line, which carries the `EOF` marker.
pub fn count_lines(data: &[u8]) -> usize {
    let newlines = data.iter().filter(|&&b| b == b'\n').count();
    if needs_eof_marker(data) {
        newlines + 1
    } else {
        newlines
    }
}

pub fn needs_eof_marker(data: &[u8]) -> bool {
    data.last().is_some_and(|&b| b != b'\n')
}

/// Replace every NUL byte with the `NULLBYTE` token
pub fn escape_content(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == 0 {
            out.extend_from_slice(NULL_TOKEN);
        } else {
            out.push(b);
        }
    }
    out
}

/// Replace every `NULLBYTE` token with a NUL byte
pub fn unescape_content(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len());
    let mut rest = line;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix(NULL_TOKEN) {
            out.push(0);
            rest = tail;
        } else {
            out.push(rest[0]);
            rest = &rest[1..];
        }
    }
    out
}

/// Decode one content line into the bytes it contributes to the file.
///
/// A line ending in `EOF` is the last line of a file without a trailing
/// newline: the marker is dropped and no newline is added.
pub fn decode_content_line(line: &[u8]) -> Vec<u8> {
    let mut bytes = unescape_content(line);
    if bytes.ends_with(EOF_TOKEN) {
        bytes.truncate(bytes.len() - EOF_TOKEN.len());
    } else {
        bytes.push(b'\n');
    }
    bytes
}

/// Strip trailing slashes from a directory path, keeping a bare `/`
pub fn trim_trailing_slashes(path: &Path) -> &Path {
    let bytes = path.as_os_str().as_bytes();
    let mut end = bytes.len();
    while end > 1 && bytes[end - 1] == b'/' {
        end -= 1;
    }
    bytes_to_path(&bytes[..end])
}

/// One inventory entry produced by listing an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File {
        path: PathBuf,
        lines: usize,
        mode: Option<String>,
    },
    Directory {
        path: PathBuf,
        mode: Option<String>,
    },
    Symlink {
        path: PathBuf,
        target: PathBuf,
    },
}

impl Entry {
    pub fn path(&self) -> &Path {
        match self {
            Entry::File { path, .. } | Entry::Directory { path, .. } | Entry::Symlink { path, .. } => path,
        }
    }

    pub fn mode(&self) -> Option<&str> {
        match self {
            Entry::File { mode, .. } | Entry::Directory { mode, .. } => mode.as_deref(),
            Entry::Symlink { .. } => None,
        }
    }

    pub(crate) fn set_mode(&mut self, new_mode: &str) {
        match self {
            Entry::File { mode, .. } | Entry::Directory { mode, .. } => {
                *mode = Some(new_mode.to_string())
            }
            Entry::Symlink { .. } => {}
        }
    }

    /// Write the display line: `path`, `path/` or `path -> target`
    pub fn write_line<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Entry::File { path, .. } => {
                out.write_all(path.as_os_str().as_bytes())?;
            }
            Entry::Directory { path, .. } => {
                out.write_all(path.as_os_str().as_bytes())?;
                out.write_all(b"/")?;
            }
            Entry::Symlink { path, target } => {
                out.write_all(path.as_os_str().as_bytes())?;
                out.write_all(b" -> ")?;
                out.write_all(target.as_os_str().as_bytes())?;
            }
        }
        out.write_all(b"\n")
    }
}

/// Fatal conditions of the ttar format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// Bad or conflicting command-line usage
    Usage(String),

    /// A source path or the archive itself does not exist
    InputNotFound { path: PathBuf, cwd: PathBuf },

    /// A source file contains a reserved token that cannot be escaped
    UnsupportedContent { path: PathBuf, token: &'static str },

    /// A source entry is neither a file, a directory nor a symlink
    UnsupportedFileType { path: PathBuf },

    /// A line outside a content block is not a known header
    MalformedArchive { line_number: usize, line: String },

    /// The stream ended inside a content block
    TruncatedContent { path: PathBuf, missing: usize },

    /// A mode string that cannot be applied
    InvalidMode { path: PathBuf, mode: String },
}

impl ArchiveError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            ArchiveError::InputNotFound { .. }
            | ArchiveError::UnsupportedContent { .. }
            | ArchiveError::UnsupportedFileType { .. } => 2,
            ArchiveError::Usage(_)
            | ArchiveError::MalformedArchive { .. }
            | ArchiveError::TruncatedContent { .. }
            | ArchiveError::InvalidMode { .. } => 1,
        }
    }
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Usage(msg) => {
                write!(f, "{}", msg)
            }
            ArchiveError::InputNotFound { path, cwd } => {
                write!(f, "{}: file not found (in {})", path.display(), cwd.display())
            }
            ArchiveError::UnsupportedContent { path, token } => {
                write!(f, "{} contains the reserved token '{}' and cannot be archived", path.display(), token)
            }
            ArchiveError::UnsupportedFileType { path } => {
                write!(f, "{} is not a regular file, directory or symlink", path.display())
            }
            ArchiveError::MalformedArchive { line_number, line } => {
                write!(f, "Unknown keyword on line {}: '{}'", line_number, line)
            }
            ArchiveError::TruncatedContent { path, missing } => {
                write!(f, "Archive ended {} line(s) short inside the content of {}", missing, path.display())
            }
            ArchiveError::InvalidMode { path, mode } => {
                write!(f, "Invalid mode '{}' for {}", mode, path.display())
            }
        }
    }
}

impl std::error::Error for ArchiveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse_keywords() {
        assert_eq!(Header::parse(b"Path: dir/file.txt"), Some(Header::Path(Path::new("dir/file.txt"))));
        assert_eq!(Header::parse(b"Lines: 12"), Some(Header::Lines(12)));
        assert_eq!(Header::parse(b"Directory: dir"), Some(Header::Directory(Path::new("dir"))));
        assert_eq!(Header::parse(b"SymlinkTo: ../target"), Some(Header::SymlinkTo(Path::new("../target"))));
        assert_eq!(Header::parse(b"Mode: 644"), Some(Header::Mode("644")));
        assert_eq!(Header::parse(DIVIDER.as_bytes()), Some(Header::Comment));
        assert_eq!(Header::parse(b""), Some(Header::Blank));
    }

    #[test]
    fn test_header_parse_rejects_unknown() {
        assert_eq!(Header::parse(b"Size: 3"), None);
        assert_eq!(Header::parse(b"path: lower"), None);
        assert_eq!(Header::parse(b"Lines: many"), None);
        assert_eq!(Header::parse(b"Lines: -1"), None);
        assert_eq!(Header::parse(b"Lines: +2"), None);
        assert_eq!(Header::parse(b"Lines: 2 "), None);
        assert_eq!(Header::parse(b"Lines:  2"), None);
        assert_eq!(Header::parse(b"Lines: "), None);
        assert_eq!(Header::parse(b" # indented comment"), None);
    }

    #[test]
    fn test_header_parse_rejects_empty_paths() {
        assert_eq!(Header::parse(b"Path: "), None);
        assert_eq!(Header::parse(b"Directory: "), None);
    }

    #[test]
    fn test_header_path_keeps_spaces() {
        assert_eq!(Header::parse(b"Path: a file "), Some(Header::Path(Path::new("a file "))));
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"a\nb\nc\n"), 3);
        assert_eq!(count_lines(b"a\nb"), 2);
        assert_eq!(count_lines(b"\n\n"), 2);
        assert_eq!(count_lines(b"x"), 1);
    }

    #[test]
    fn test_escape_nul() {
        assert_eq!(escape_content(b"a\x00b\n"), b"aNULLBYTEb\n");
        assert_eq!(escape_content(b"\x00\x00"), b"NULLBYTENULLBYTE");
        assert_eq!(unescape_content(b"aNULLBYTEb"), b"a\x00b");
        assert_eq!(unescape_content(b"NULLBYTENULLBYTE"), b"\x00\x00");
        assert_eq!(unescape_content(b"NULLBYT"), b"NULLBYT");
    }

    #[test]
    fn test_decode_content_line() {
        assert_eq!(decode_content_line(b"plain"), b"plain\n");
        assert_eq!(decode_content_line(b"lastEOF"), b"last");
        assert_eq!(decode_content_line(b"aNULLBYTEEOF"), b"a\x00");
        assert_eq!(decode_content_line(b""), b"\n");
    }

    #[test]
    fn test_find_reserved_token() {
        assert_eq!(find_reserved_token(b"clean text\n"), None);
        assert_eq!(find_reserved_token(b"has NULLBYTE inside"), Some("NULLBYTE"));
        assert_eq!(find_reserved_token(b"ends at EOF\n"), Some("EOF"));
        assert_eq!(find_reserved_token(b"eof is fine"), None);
    }

    #[test]
    fn test_trim_trailing_slashes() {
        assert_eq!(trim_trailing_slashes(Path::new("dir/")), Path::new("dir"));
        assert_eq!(trim_trailing_slashes(Path::new("dir//")), Path::new("dir"));
        assert_eq!(trim_trailing_slashes(Path::new("a/b")), Path::new("a/b"));
        assert_eq!(trim_trailing_slashes(Path::new("/")), Path::new("/"));
    }

    #[test]
    fn test_entry_display_lines() {
        let mut out = Vec::new();
        Entry::Directory { path: "d".into(), mode: None }.write_line(&mut out).unwrap();
        Entry::File { path: "d/f".into(), lines: 0, mode: None }.write_line(&mut out).unwrap();
        Entry::Symlink { path: "d/l".into(), target: "f".into() }.write_line(&mut out).unwrap();
        assert_eq!(out, b"d/\nd/f\nd/l -> f\n");
    }

    #[test]
    fn test_exit_codes() {
        let err = ArchiveError::UnsupportedContent { path: "f".into(), token: "EOF" };
        assert_eq!(err.exit_code(), 2);
        let err = ArchiveError::MalformedArchive { line_number: 3, line: "x".into() };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("line 3"));
    }
}
