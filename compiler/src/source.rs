use std::cell::OnceCell;
use std::fmt;

use serde::Serialize;
use tracing::debug;

/// Identifies one file inside a [SourceSet].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(pub usize);

/// A half-open byte range `[begin, end)` of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file:  FileId,
    pub begin: usize,
    pub end:   usize,
}

/// A token: the exact text a [Location] covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceString {
    pub loc:  Location,
    pub text: String,
}

/// Position of a location for humans. Line and column are 1-based; the
/// column counts characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    pub line:   usize,
    pub column: usize,
    /// The full source line, without its line terminator.
    pub text:   String,
}

#[derive(Debug)]
pub struct SourceInfo {
    id:          FileId,
    name:        String,
    data:        Vec<u8>,
    line_starts: OnceCell<Vec<usize>>,
}

impl SourceInfo {
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn location(&self, begin: usize, end: usize) -> Location {
        Location { file: self.id, begin, end }
    }

    fn line_starts(&self) -> &[usize] {
        self.line_starts.get_or_init(|| {
            let mut starts = vec![0];
            starts.extend(
                self.data
                    .iter()
                    .enumerate()
                    .filter(|&(_, &b)| b == b'\n')
                    .map(|(i, _)| i + 1),
            );
            starts
        })
    }

    pub fn line_info(&self, loc: Location) -> LineInfo {
        let starts = self.line_starts();
        let begin = loc.begin.min(self.data.len());
        let line = starts.partition_point(|&start| start <= begin);
        let start = starts[line - 1];
        let end = starts.get(line).copied().unwrap_or(self.data.len());

        let column = String::from_utf8_lossy(&self.data[start..begin]).chars().count() + 1;
        let text = String::from_utf8_lossy(&self.data[start..end]);
        let text = text.trim_end_matches('\n').trim_end_matches('\r').to_string();
        LineInfo { line, column, text }
    }
}

/// Every file taking part in one compilation.
#[derive(Debug, Default)]
pub struct SourceSet {
    files: Vec<SourceInfo>,
}

impl SourceSet {
    pub fn new() -> SourceSet {
        SourceSet::default()
    }

    pub fn add(&mut self, name: &str, data: impl Into<Vec<u8>>) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(SourceInfo {
            id,
            name: name.to_string(),
            data: data.into(),
            line_starts: OnceCell::new(),
        });
        id
    }

    pub fn get(&self, id: FileId) -> &SourceInfo {
        &self.files[id.0]
    }

    pub fn line_info(&self, loc: Location) -> LineInfo {
        self.get(loc.file).line_info(loc)
    }
}

/// One reported error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub message:  String,
    /// `file:line:col - ERROR message`, the source line and a caret.
    pub rendered: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Collects the errors of one compilation.
pub struct Status<'a> {
    sources:     &'a SourceSet,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Status<'a> {
    pub fn new(sources: &'a SourceSet) -> Status<'a> {
        Status { sources, diagnostics: Vec::new() }
    }

    pub fn error(&mut self, location: Location, message: impl Into<String>) {
        let message = message.into();
        let info = self.sources.get(location.file);
        let line = info.line_info(location);
        let rendered = format!(
            "{}:{}:{} - ERROR {}\n{}\n{}^",
            info.name(),
            line.line,
            line.column,
            message,
            line.text,
            " ".repeat(line.column - 1)
        );
        debug!(file = info.name(), line = line.line, column = line.column, %message, "error");
        self.diagnostics.push(Diagnostic { location, message, rendered });
    }

    /// True once any error has been reported.
    pub fn should_stop(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn line_info_is_one_based() {
        let mut sources = SourceSet::new();
        let id = sources.add("t", "ab\ncdé f\n\nlast");
        let info = sources.get(id);
        let at = |begin| info.line_info(info.location(begin, begin + 1));

        assert_eq!(at(0), LineInfo { line: 1, column: 1, text: "ab".into() });
        assert_eq!(at(3), LineInfo { line: 2, column: 1, text: "cdé f".into() });
        // 'f' follows a two-byte character
        assert_eq!(at(8).column, 5);
        assert_eq!(at(10).line, 3);
        assert_eq!(at(11), LineInfo { line: 4, column: 1, text: "last".into() });
        assert_eq!(at(15), LineInfo { line: 4, column: 5, text: "last".into() });
    }

    #[test]
    fn status_renders_caret() {
        let mut sources = SourceSet::new();
        let id = sources.add("data.txt", "A{\n  foo: 1?\n}");
        let mut status = Status::new(&sources);
        assert!(!status.should_stop());

        status.error(sources.get(id).location(11, 12), "unexpected character");
        assert!(status.should_stop());
        assert_eq!(status.error_count(), 1);
        assert_eq!(
            status.diagnostics()[0].rendered,
            "data.txt:2:9 - ERROR unexpected character\n  foo: 1?\n        ^"
        );
    }
}
