//! Position conversion utilities.
//!
//! Spans are byte offsets. Diagnostics want line/column, and editors that
//! consume the tree talk in UTF-16 offsets, so both conversions live here.

/// Line and column of a byte offset, both zero-based.
///
/// `col` counts chars, not bytes, so carets line up under the source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub byte: usize,
    pub line: usize,
    pub col: usize,
}

impl Position {
    /// Position of `byte` in `source`. Offsets past the end are clamped.
    pub fn at(source: &str, byte: usize) -> Self {
        let mut byte = byte.min(source.len());
        while !source.is_char_boundary(byte) {
            byte -= 1;
        }
        let before = &source[..byte];
        let line = before.matches('\n').count();
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let col = source[line_start..byte].chars().count();
        Self { byte, line, col }
    }
}

/// Convert a byte offset to a UTF-16 offset.
///
/// # Arguments
/// * `source` - The source string
/// * `byte_offset` - The byte offset to convert
///
/// # Returns
/// The UTF-16 offset corresponding to the byte offset.
pub fn byte_to_utf16(source: &str, byte_offset: usize) -> usize {
    let byte_offset = byte_offset.min(source.len());
    source[..byte_offset].encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii() {
        let source = "hello world";
        assert_eq!(byte_to_utf16(source, 0), 0);
        assert_eq!(byte_to_utf16(source, 11), 11);
    }

    #[test]
    fn test_emoji() {
        let source = "hello 👋 world";
        // 4 bytes, 2 UTF-16 code units
        assert_eq!(byte_to_utf16(source, 6), 6);
        assert_eq!(byte_to_utf16(source, 10), 8);
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(byte_to_utf16("hello", 100), 5);
    }

    #[test]
    fn test_line_and_column() {
        let source = "<p>\n  @name\n</p>";
        let pos = Position::at(source, 6);
        assert_eq!((pos.line, pos.col), (1, 2));
        assert_eq!(Position::at(source, 0), Position { byte: 0, line: 0, col: 0 });
    }

    #[test]
    fn test_column_counts_chars() {
        let source = "café @x";
        let pos = Position::at(source, 6);
        assert_eq!((pos.line, pos.col), (0, 5));
    }

    #[test]
    fn test_position_clamped_to_char_boundary() {
        let source = "é";
        assert_eq!(Position::at(source, 1).byte, 0);
        assert_eq!(Position::at(source, 99).byte, 2);
    }
}
