//! Recursive-descent Newick parser.
//!
//! Handles nested parenthesised subtrees, quoted and unquoted labels,
//! branch lengths after `:`, internal labels, and bracketed comments
//! (`[...]`, including the `[&R]`/`[&U]` rootedness annotations common in
//! Nexus tree statements). One tree per `;`-terminated statement.

use arbora_core::{NodeId, Tree, TreeBuilder};

use crate::ReaderError;

const FORMAT: &str = "newick";

pub(crate) fn parse_trees(input: &str) -> Result<Vec<Tree>, ReaderError> {
    let mut cursor = Cursor::new(input);
    let mut trees = Vec::new();
    loop {
        cursor.skip_trivia();
        if cursor.at_end() {
            break;
        }
        trees.push(parse_one(&mut cursor)?);
    }
    Ok(trees)
}

fn parse_one(cursor: &mut Cursor<'_>) -> Result<Tree, ReaderError> {
    let mut builder = TreeBuilder::new();
    let root = parse_subtree(cursor, &mut builder)?;
    cursor.skip_trivia();
    cursor.expect(b';')?;
    Ok(builder.finish(root))
}

fn parse_subtree(cursor: &mut Cursor<'_>, builder: &mut TreeBuilder) -> Result<NodeId, ReaderError> {
    cursor.skip_trivia();
    let id = if cursor.peek() == Some(b'(') {
        cursor.bump();
        let mut children = vec![parse_subtree(cursor, builder)?];
        loop {
            cursor.skip_trivia();
            match cursor.peek() {
                Some(b',') => {
                    cursor.bump();
                    children.push(parse_subtree(cursor, builder)?);
                }
                Some(b')') => {
                    cursor.bump();
                    break;
                }
                _ => return Err(cursor.error("expected `,` or `)` in subtree")),
            }
        }
        let id = builder.join_children(children);
        // Internal labels are tolerated; clade identity ignores them.
        cursor.skip_trivia();
        let label = parse_label(cursor)?;
        if !label.is_empty() {
            builder.set_label(id, label);
        }
        id
    } else {
        let label = parse_label(cursor)?;
        if label.is_empty() {
            return Err(cursor.error("expected a leaf label"));
        }
        builder.leaf(label)
    };

    cursor.skip_trivia();
    if cursor.peek() == Some(b':') {
        cursor.bump();
        let length = parse_number(cursor)?;
        builder.set_branch_length(id, length);
    }
    Ok(id)
}

fn parse_label(cursor: &mut Cursor<'_>) -> Result<String, ReaderError> {
    cursor.skip_trivia();
    if cursor.peek() == Some(b'\'') {
        return parse_quoted_label(cursor);
    }
    // Delimiters are all ASCII, so a byte scan keeps multi-byte labels
    // intact and the slice below stays on char boundaries.
    let start = cursor.position;
    while let Some(byte) = cursor.peek() {
        if matches!(byte, b'(' | b')' | b'[' | b']' | b',' | b':' | b';') || byte.is_ascii_whitespace()
        {
            break;
        }
        cursor.bump();
    }
    Ok(cursor.input[start..cursor.position].to_owned())
}

fn parse_quoted_label(cursor: &mut Cursor<'_>) -> Result<String, ReaderError> {
    cursor.bump();
    let mut label = String::new();
    let mut start = cursor.position;
    loop {
        match cursor.peek() {
            Some(b'\'') => {
                label.push_str(&cursor.input[start..cursor.position]);
                cursor.bump();
                // A doubled quote is an escaped quote inside the label.
                if cursor.peek() == Some(b'\'') {
                    label.push('\'');
                    cursor.bump();
                    start = cursor.position;
                } else {
                    return Ok(label);
                }
            }
            Some(_) => cursor.bump(),
            None => return Err(cursor.error("unterminated quoted label")),
        }
    }
}

fn parse_number(cursor: &mut Cursor<'_>) -> Result<f64, ReaderError> {
    cursor.skip_trivia();
    let start = cursor.position;
    while let Some(byte) = cursor.peek() {
        if byte.is_ascii_digit() || matches!(byte, b'+' | b'-' | b'.' | b'e' | b'E') {
            cursor.bump();
        } else {
            break;
        }
    }
    let raw = &cursor.input[start..cursor.position];
    raw.parse()
        .map_err(|_| cursor.error(&format!("`{raw}` is not a branch length")))
}

struct Cursor<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.position).copied()
    }

    fn bump(&mut self) {
        self.position += 1;
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Skips whitespace and bracketed comments (which may nest).
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(byte) if byte.is_ascii_whitespace() => self.bump(),
                Some(b'[') => {
                    let mut depth = 0_usize;
                    while let Some(byte) = self.peek() {
                        self.bump();
                        match byte {
                            b'[' => depth += 1,
                            b']' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ReaderError> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", byte as char)))
        }
    }

    fn error(&self, message: &str) -> ReaderError {
        ReaderError::Parse {
            format: FORMAT,
            position: self.position,
            message: message.to_owned(),
        }
    }
}
