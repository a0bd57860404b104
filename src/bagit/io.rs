use std::io::Read;

use snafu::ResultExt;

use crate::bagit::consts::*;
use crate::bagit::error::*;

/// A line and the 1-based line number it started on
pub type NumberedLine = (usize, String);

/// Iteratively reads lines. Lines can be terminated by CR, LF, or CRLF.
pub struct LineReader<R: Read> {
    reader: R,
    buf: [u8; BUF_SIZE],
    position: usize,
    read: usize,
    line_num: usize,
    pending_cr: bool,
    end: bool,
}

/// Iteratively reads BagIt tag lines. Tag lines can be terminated by CR, LF, or CRLF. Lines
/// that have any number of leading spaces or tabs are considered to be part of the previous line.
/// All connected lines are joined by stripping the leading whitespace and inserting a single space.
pub struct TagLineReader<R: Read> {
    reader: LineReader<R>,
    next: Option<NumberedLine>,
}

pub fn is_space_or_tab(c: char) -> bool {
    c == SPACE || c == TAB
}

impl<R: Read> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: [0; BUF_SIZE],
            position: 0,
            read: 0,
            line_num: 0,
            pending_cr: false,
            end: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let read = self.reader.read(&mut self.buf).context(IoGeneralSnafu)?;
        if read == 0 {
            self.end = true;
        }
        self.read = read;
        self.position = 0;
        Ok(())
    }

    fn complete(&mut self, line: Vec<u8>) -> Option<Result<NumberedLine>> {
        self.line_num += 1;
        let num = self.line_num;
        Some(bytes_to_string(line).map(|l| (num, l)))
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = Result<NumberedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        let mut has_content = false;

        loop {
            if self.position >= self.read {
                if self.end {
                    return if has_content {
                        self.complete(line)
                    } else {
                        None
                    };
                }
                if let Err(e) = self.fill() {
                    self.end = true;
                    return Some(Err(e));
                }
                continue;
            }

            let b = self.buf[self.position];
            self.position += 1;

            // the LF of a CRLF pair
            if self.pending_cr {
                self.pending_cr = false;
                if b == LF_B {
                    continue;
                }
            }

            match b {
                CR_B => {
                    self.pending_cr = true;
                    return self.complete(line);
                }
                LF_B => return self.complete(line),
                _ => {
                    line.push(b);
                    has_content = true;
                }
            }
        }
    }
}

impl<R: Read> TagLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: LineReader::new(reader),
            next: None,
        }
    }
}

impl<R: Read> Iterator for TagLineReader<R> {
    type Item = Result<NumberedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut current = self.next.take();

        loop {
            match self.reader.next() {
                Some(Err(e)) => return Some(Err(e)),
                None => return current.map(Ok),
                Some(Ok((num, read))) => match current.as_mut() {
                    Some((_, value)) if read.starts_with(is_space_or_tab) => {
                        value.push(SPACE);
                        value.push_str(read.trim_start_matches(is_space_or_tab));
                    }
                    Some(_) => {
                        self.next = Some((num, read));
                        return current.map(Ok);
                    }
                    None => current = Some((num, read)),
                },
            }
        }
    }
}

fn bytes_to_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).context(InvalidStringSnafu {})
}
