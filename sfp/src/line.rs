//! The newline-delimited syscall grammar the kernel reads from its children,
//! plus a reusable frame parser for assembling complete lines out of partial
//! reads.
//!
//! One small type handles every line-oriented channel: push bytes as they
//! arrive, drain whatever complete lines are now available, keep the
//! remainder for the next push.

use std::collections::VecDeque;

/// One line emitted by an application process on the kernel's inbound
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppLine {
    Tick { app: u32, pid: u32, pc: u32 },
    Done { app: u32, pid: u32, pc: u32 },
    Read { app: u32, pid: u32, path: String, offset: i64 },
    Write { app: u32, pid: u32, path: String, offset: i64, payload: Vec<u8> },
    Add { app: u32, pid: u32, path: String, name: String },
    Rem { app: u32, pid: u32, path: String, name: String },
    ListDir { app: u32, pid: u32, path: String },
}

impl AppLine {
    pub fn app(&self) -> u32 {
        match self {
            AppLine::Tick { app, .. }
            | AppLine::Done { app, .. }
            | AppLine::Read { app, .. }
            | AppLine::Write { app, .. }
            | AppLine::Add { app, .. }
            | AppLine::Rem { app, .. }
            | AppLine::ListDir { app, .. } => *app,
        }
    }

    /// Whether this line represents a syscall (as opposed to TICK/DONE,
    /// which are scheduler bookkeeping only).
    pub fn is_syscall(&self) -> bool {
        !matches!(self, AppLine::Tick { .. } | AppLine::Done { .. })
    }

    /// Render the wire form, e.g. `"TICK A1 123 4\n"`.
    pub fn format(&self) -> String {
        match self {
            AppLine::Tick { app, pid, pc } => format!("TICK A{app} {pid} {pc}\n"),
            AppLine::Done { app, pid, pc } => format!("DONE A{app} {pid} {pc}\n"),
            AppLine::Read { app, pid, path, offset } => {
                format!("READ A{app} {pid} {path} {offset}\n")
            }
            AppLine::Write { app, pid, path, offset, payload } => {
                let payload = String::from_utf8_lossy(payload);
                format!("WRITE A{app} {pid} {path} {offset} {payload}\n")
            }
            AppLine::Add { app, pid, path, name } => format!("ADD A{app} {pid} {path} {name}\n"),
            AppLine::Rem { app, pid, path, name } => format!("REM A{app} {pid} {path} {name}\n"),
            AppLine::ListDir { app, pid, path } => format!("LISTDIR A{app} {pid} {path}\n"),
        }
    }

    /// Parse a single line (without its trailing newline). Returns `None`
    /// for malformed or unrecognized lines; the caller logs and drops them
    /// without blocking the originating PCB.
    pub fn parse(line: &str) -> Option<AppLine> {
        let mut fields = line.split_whitespace();
        let keyword = fields.next()?;
        let app = parse_app_id(fields.next()?)?;
        let pid: u32 = fields.next()?.parse().ok()?;

        match keyword {
            "TICK" => {
                let pc: u32 = fields.next()?.parse().ok()?;
                Some(AppLine::Tick { app, pid, pc })
            }
            "DONE" => {
                let pc: u32 = fields.next()?.parse().ok()?;
                Some(AppLine::Done { app, pid, pc })
            }
            "READ" => {
                let path = fields.next()?.to_string();
                let offset: i64 = fields.next()?.parse().ok()?;
                Some(AppLine::Read { app, pid, path, offset })
            }
            "WRITE" => {
                let path = fields.next()?.to_string();
                let offset: i64 = fields.next()?.parse().ok()?;
                let payload: Vec<u8> = fields.collect::<Vec<_>>().join(" ").into_bytes();
                Some(AppLine::Write { app, pid, path, offset, payload })
            }
            "ADD" => {
                let path = fields.next()?.to_string();
                let name = fields.next()?.to_string();
                Some(AppLine::Add { app, pid, path, name })
            }
            "REM" => {
                let path = fields.next()?.to_string();
                let name = fields.next()?.to_string();
                Some(AppLine::Rem { app, pid, path, name })
            }
            "LISTDIR" => {
                let path = fields.next()?.to_string();
                Some(AppLine::ListDir { app, pid, path })
            }
            _ => None,
        }
    }
}

/// Parses `"A3"` into `3`. The leading `A` is mandatory per the grammar.
fn parse_app_id(token: &str) -> Option<u32> {
    let digits = token.strip_prefix('A')?;
    digits.parse().ok()
}

/// Accumulates bytes from a non-blocking channel and hands back complete
/// lines as they become available, holding the trailing partial line
/// across calls.
#[derive(Debug, Default)]
pub struct LineParser {
    partial: Vec<u8>,
}

impl LineParser {
    pub fn new() -> Self {
        LineParser { partial: Vec::new() }
    }

    /// Feed newly read bytes in and drain every complete line they produce
    /// (including any complete lines left over from a previous partial
    /// fragment). Lines are returned stripped of their trailing `\n` (and
    /// any `\r` before it).
    pub fn push(&mut self, bytes: &[u8]) -> VecDeque<String> {
        self.partial.extend_from_slice(bytes);
        let mut lines = VecDeque::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let rest = self.partial.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.partial, rest);
            line.pop(); // trailing \n
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push_back(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tick_and_done() {
        assert_eq!(
            AppLine::parse("TICK A1 42 7"),
            Some(AppLine::Tick { app: 1, pid: 42, pc: 7 })
        );
        assert_eq!(
            AppLine::parse("DONE A3 99 12"),
            Some(AppLine::Done { app: 3, pid: 99, pc: 12 })
        );
    }

    #[test]
    fn parses_all_syscall_shapes() {
        assert_eq!(
            AppLine::parse("READ A2 1 /A2/file.txt 16"),
            Some(AppLine::Read { app: 2, pid: 1, path: "/A2/file.txt".into(), offset: 16 })
        );
        assert_eq!(
            AppLine::parse("WRITE A2 1 /A2/file.txt 0 Hello"),
            Some(AppLine::Write {
                app: 2,
                pid: 1,
                path: "/A2/file.txt".into(),
                offset: 0,
                payload: b"Hello".to_vec()
            })
        );
        assert_eq!(
            AppLine::parse("ADD A4 1 /A4 sub"),
            Some(AppLine::Add { app: 4, pid: 1, path: "/A4".into(), name: "sub".into() })
        );
        assert_eq!(
            AppLine::parse("REM A4 1 /A4 sub"),
            Some(AppLine::Rem { app: 4, pid: 1, path: "/A4".into(), name: "sub".into() })
        );
        assert_eq!(
            AppLine::parse("LISTDIR A4 1 /A4"),
            Some(AppLine::ListDir { app: 4, pid: 1, path: "/A4".into() })
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(AppLine::parse(""), None);
        assert_eq!(AppLine::parse("BOGUS A1 1 2 3"), None);
        assert_eq!(AppLine::parse("TICK 1 2 3"), None); // missing "A" prefix
        assert_eq!(AppLine::parse("TICK A1 2"), None); // missing pc field
    }

    #[test]
    fn format_round_trips_through_parse() {
        let line = AppLine::Write {
            app: 1,
            pid: 55,
            path: "/A1/f".into(),
            offset: 32,
            payload: b"abc".to_vec(),
        };
        let rendered = line.format();
        assert_eq!(rendered, "WRITE A1 55 /A1/f 32 abc\n");
        assert_eq!(AppLine::parse(rendered.trim_end()), Some(line));
    }

    #[test]
    fn line_parser_handles_split_reads() {
        let mut parser = LineParser::new();
        assert!(parser.push(b"TICK A1 1 ").is_empty());
        let lines = parser.push(b"5\nDONE A1 1 6\nincomplete");
        assert_eq!(lines, VecDeque::from(["TICK A1 1 5".to_string(), "DONE A1 1 6".to_string()]));

        let more = parser.push(b" rest\n");
        assert_eq!(more, VecDeque::from(["incomplete rest".to_string()]));
    }

    #[test]
    fn line_parser_strips_carriage_return() {
        let mut parser = LineParser::new();
        let lines = parser.push(b"TICK A1 1 1\r\n");
        assert_eq!(lines, VecDeque::from(["TICK A1 1 1".to_string()]));
    }
}
