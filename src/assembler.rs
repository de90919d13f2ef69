//! Message assembly over a push-back line queue.
//!
//! SHEF messages cross line boundaries: `.A`/`.E` continue on numbered
//! continuation lines, `.B` carries a multi-line header and a body closed by
//! `.END`. The assembler owns the input handle, strips the `=`/`&` line
//! trailers and colon-fenced comment fields, frames complete messages, and
//! pushes back the first line of the next message when it over-reads.

use std::collections::VecDeque;
use std::io::BufRead;

use crate::{
    diagnostics::Diagnostics,
    errors::Error,
    grammar::{continuation_pattern, MSG_START},
};

/// Lines fetched from the input per read burst.
const READ_BATCH: usize = 100;

/// A framed message, ready for one of the three message parsers.
#[derive(Debug, Clone)]
pub struct Message {
    /// Cleaned text: comment fields and trailers stripped, lines joined
    /// with `\n`, `.END` synthesized when the input lacked it.
    pub text: String,

    /// The source lines exactly as read.
    pub raw: String,

    /// 1-based line number the message started on.
    pub start_line: usize,
}

pub(crate) struct Assembler {
    input: Option<Box<dyn BufRead>>,
    queue: VecDeque<String>,
    line_number: usize,
}

/// Remove colon-delimited comment fields from a message line.
fn remove_comment_fields(line: &str) -> String {
    let mut in_comment = false;
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        if c == ':' {
            in_comment = !in_comment;
        } else if !in_comment {
            out.push(c);
        }
    }
    out
}

/// Strip the accepted message-continuation trailers: `=`, `&`, `&=`.
fn strip_trailers(line: &str) -> &str {
    line.trim_end_matches('=')
        .trim_end_matches('&')
        .trim_end_matches('=')
}

impl Assembler {
    pub(crate) fn new() -> Self {
        Self {
            input: None,
            queue: VecDeque::new(),
            line_number: 0,
        }
    }

    pub(crate) fn set_input(&mut self, input: Box<dyn BufRead>) {
        self.input = Some(input);
        self.queue.clear();
        self.line_number = 0;
    }

    pub(crate) fn lines_read(&self) -> usize {
        self.line_number
    }

    /// Pull the next batch of lines into the queue, closing the input at
    /// end of stream. I/O failures are reported and skipped.
    fn fill_queue(&mut self, diag: &mut Diagnostics) -> Result<(), Error> {
        let Some(input) = self.input.as_mut() else {
            return Ok(());
        };
        for _ in 0..READ_BATCH {
            let mut line = String::new();
            match input.read_line(&mut line) {
                Err(e) => {
                    diag.set_line_number(self.line_number);
                    diag.error(&format!("Line read error: {}", e))?;
                    continue;
                }
                Ok(0) => {
                    self.input = None;
                    break;
                }
                Ok(_) => {
                    if line.ends_with('\n') {
                        line.pop();
                        if line.ends_with('\r') {
                            line.pop();
                        }
                        self.queue.push_back(line);
                    } else {
                        self.queue.push_back(line);
                        self.input = None;
                        break;
                    }
                }
            }
        }
        log::debug!("Put {} lines into input queue", self.queue.len());
        Ok(())
    }

    /// Assemble the next complete message, or `None` at end of input.
    pub(crate) fn next_message(
        &mut self,
        diag: &mut Diagnostics,
    ) -> Result<Option<Message>, Error> {
        diag.clear_message();

        let mut raw_lines: Vec<String> = Vec::new();
        let mut message_lines: Vec<String> = Vec::new();
        let mut message_type = '\0';
        let mut revised = false;
        let mut in_header = false;

        loop {
            while let Some(line) = self.queue.pop_front() {
                self.line_number += 1;
                diag.set_line_number(self.line_number);
                log::debug!("Removed line from input queue [{}]", line);
                let message_line = strip_trailers(&remove_comment_fields(&line)).to_string();

                if message_type == '\0' {
                    // looking for the first line of a message
                    if message_line.is_empty() || !line.starts_with('.') {
                        continue;
                    }
                    if !MSG_START.is_match(&message_line) {
                        diag.error(&format!("Invalid line: [{}]", line))?;
                        continue;
                    }
                    let bytes = message_line.as_bytes();
                    message_type = bytes[1].to_ascii_uppercase() as char;
                    revised = bytes[2].to_ascii_uppercase() == b'R';
                    raw_lines.push(line);
                    message_lines.push(message_line);
                    in_header = message_type == 'B';
                } else if message_type == 'B' {
                    raw_lines.push(line.clone());
                    message_lines.push(message_line.clone());
                    if message_line.starts_with('.') {
                        if in_header
                            && continuation_pattern(message_type, revised).is_match(&message_line)
                        {
                            continue;
                        }
                        if !message_line.starts_with(".END") {
                            if continuation_pattern(message_type, revised).is_match(&message_line)
                            {
                                // a continuation after body lines: drop the
                                // stray body line and resume the header
                                diag.error(".B message has data between header lines")?;
                                message_lines.pop();
                                message_lines.pop();
                                message_lines.push(message_line);
                                in_header = true;
                                continue;
                            }
                            // next message begins without .END: push it back
                            self.line_number -= 1;
                            diag.set_line_number(self.line_number);
                            log::debug!("Restored line to input queue  [{}]", line);
                            self.queue.push_front(line);
                            message_lines.pop();
                            raw_lines.pop();
                            let start_line = self.line_number - raw_lines.len() + 1;
                            let raw = raw_lines.join("\n");
                            message_lines.push(".END".to_string());
                            let text = message_lines.join("\n");
                            diag.set_message(start_line, &raw, &text);
                            diag.error(
                                ".B message not finished before next message - missing \".END\" appended",
                            )?;
                            return Ok(Some(Message {
                                text,
                                raw,
                                start_line,
                            }));
                        }
                        in_header = false;
                        message_type = '\0';
                        break;
                    } else {
                        in_header = false;
                    }
                } else if continuation_pattern(message_type, revised).is_match(&message_line) {
                    raw_lines.push(line);
                    message_lines.push(message_line);
                } else {
                    self.line_number -= 1;
                    diag.set_line_number(self.line_number);
                    log::debug!("Restored line to input queue  [{}]", line);
                    self.queue.push_front(line);
                    message_type = '\0';
                    break;
                }
            }

            if !message_lines.is_empty() && message_type == '\0' {
                // done with message
                break;
            } else if self.input.is_none() && self.queue.is_empty() {
                if message_type == 'B' {
                    let start_line = self.line_number - raw_lines.len() + 1;
                    let raw = raw_lines.join("\n");
                    diag.set_message(start_line, &raw, &message_lines.join("\n"));
                    diag.error(
                        ".B message not finished before input exhaused - missing \".END\" appended",
                    )?;
                    message_lines.push(".END".to_string());
                }
                break;
            } else {
                self.fill_queue(diag)?;
            }
        }

        if message_lines.is_empty() {
            return Ok(None);
        }

        let start_line = self.line_number - raw_lines.len() + 1;
        let raw = raw_lines.join("\n");
        let text = message_lines.join("\n");
        diag.set_message(start_line, &raw, &text);
        log::debug!(
            "Assembled message starting at line {}:\n\t{}",
            start_line,
            raw.replace('\n', "\n\t")
        );
        Ok(Some(Message {
            text,
            raw,
            start_line,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn assemble(input: &str) -> (Vec<Message>, Diagnostics) {
        let mut assembler = Assembler::new();
        assembler.set_input(Box::new(Cursor::new(input.to_string())));
        let mut diag = Diagnostics::new(500);
        let mut messages = Vec::new();
        while let Some(message) = assembler.next_message(&mut diag).unwrap() {
            messages.push(message);
        }
        (messages, diag)
    }

    #[test]
    fn single_dot_a() {
        let (messages, diag) = assemble(".A LOCA 20240501 Z DH12/HG 12.34\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, ".A LOCA 20240501 Z DH12/HG 12.34");
        assert_eq!(messages[0].start_line, 1);
        assert_eq!(diag.error_count(), 0);
    }

    #[test]
    fn comment_fields_and_trailers() {
        let (messages, _) = assemble(".A LOCA 20240501 Z DH12/HG 1.5 : gage :=\n");
        assert_eq!(messages[0].text, ".A LOCA 20240501 Z DH12/HG 1.5 ");
    }

    #[test]
    fn continuation_lines() {
        let (messages, _) = assemble(".A LOCA 20240501 Z DH12/HG 1.5=\n.A1 /TA 20.0\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].text,
            ".A LOCA 20240501 Z DH12/HG 1.5\n.A1 /TA 20.0"
        );
    }

    #[test]
    fn push_back_between_messages() {
        let (messages, _) = assemble(
            ".A AAA 20240501 Z DH12/HG 1.5\n.A BBB 20240501 Z DH12/HG 2.5\n",
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].start_line, 2);
    }

    #[test]
    fn invalid_line_reported() {
        let (messages, diag) = assemble("garbage .A\n.A LOCA 20240501 Z DH12/HG 1.5\n");
        // non-dot garbage is skipped silently, dot-garbage errors
        assert_eq!(messages.len(), 1);
        assert_eq!(diag.error_count(), 0);

        let (messages, diag) = assemble(".X LOCA\n.A LOCA 20240501 Z DH12/HG 1.5\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn dot_b_framing() {
        let (messages, diag) = assemble(
            ".B STN 20240601 Z DH12/HG/QR\nLOC1 1.2/3.4\nLOC2 5.6/7.8\n.END\n",
        );
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.ends_with(".END"));
        assert_eq!(diag.error_count(), 0);
    }

    #[test]
    fn dot_b_missing_end_at_eof() {
        let (messages, diag) = assemble(".B STN 20240601 Z DH12/HG\nLOC1 1.2\n");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.ends_with(".END"));
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn dot_b_missing_end_before_next_message() {
        let (messages, diag) = assemble(
            ".B STN 20240601 Z DH12/HG\nLOC1 1.2\n.A AAA 20240501 Z DH12/HG 1.5\n",
        );
        assert_eq!(messages.len(), 2);
        assert!(messages[0].text.ends_with(".END"));
        assert_eq!(messages[1].text, ".A AAA 20240501 Z DH12/HG 1.5");
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn dot_b_header_continuation() {
        let (messages, _) = assemble(
            ".B STN 20240601 Z DH12/HG\n.B1 /QR\nLOC1 1.2/3.4\n.END\n",
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].text,
            ".B STN 20240601 Z DH12/HG\n.B1 /QR\nLOC1 1.2/3.4\n.END"
        );
    }
}
