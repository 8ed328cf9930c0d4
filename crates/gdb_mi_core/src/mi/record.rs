use serde::Serialize;

use super::parser::{parse_c_string, parse_results};
use super::value::MiValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

impl ResultClass {
    fn parse(class: &str) -> Option<Self> {
        match class {
            "done" => Some(Self::Done),
            "running" => Some(Self::Running),
            "connected" => Some(Self::Connected),
            "error" => Some(Self::Error),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Running => "running",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Exit => "exit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncKind {
    /// `*`
    Exec,
    /// `+`
    Status,
    /// `=`
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// `~`
    Console,
    /// `@`
    Target,
    /// `&`
    Log,
    /// Unprefixed or unclassifiable output.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub token: Option<u64>,
    pub class: ResultClass,
    pub payload: MiValue,
}

impl ResultRecord {
    /// The `msg` field of an `^error` record, falling back to the unparsed
    /// payload when the record was malformed.
    pub fn error_message(&self) -> Option<&str> {
        self.payload
            .get_str("msg")
            .or_else(|| self.payload.get_str("raw"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncRecord {
    pub token: Option<u64>,
    pub kind: AsyncKind,
    pub class: String,
    pub payload: MiValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub kind: StreamKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Result(ResultRecord),
    Async(AsyncRecord),
    Stream(StreamRecord),
    /// `(gdb)` prompt or a blank line.
    Prompt,
}

/// Classifies one line of debugger output. Never fails: anything that does
/// not fit the MI grammar comes back as raw stream text.
pub fn parse_line(line: &str) -> Record {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_end() == "(gdb)" {
        return Record::Prompt;
    }

    let token_len = line.bytes().take_while(u8::is_ascii_digit).count();
    let (token_str, rest) = line.split_at(token_len);
    let token = if token_str.is_empty() {
        None
    } else {
        match token_str.parse::<u64>() {
            Ok(token) => Some(token),
            Err(_) => return raw(line),
        }
    };

    let Some(prefix) = rest.chars().next() else {
        return raw(line);
    };
    let body = &rest[prefix.len_utf8()..];

    match prefix {
        '^' => {
            let (class, payload) = split_class(body);
            match ResultClass::parse(class) {
                Some(class) => Record::Result(ResultRecord {
                    token,
                    class,
                    payload: decode_payload(line, payload),
                }),
                None => raw(line),
            }
        }
        '*' | '+' | '=' => {
            let (class, payload) = split_class(body);
            if class.is_empty() {
                return raw(line);
            }
            let kind = match prefix {
                '*' => AsyncKind::Exec,
                '+' => AsyncKind::Status,
                _ => AsyncKind::Notify,
            };
            Record::Async(AsyncRecord {
                token,
                kind,
                class: class.to_string(),
                payload: decode_payload(line, payload),
            })
        }
        '~' | '@' | '&' if token.is_none() => {
            let kind = match prefix {
                '~' => StreamKind::Console,
                '@' => StreamKind::Target,
                _ => StreamKind::Log,
            };
            match parse_c_string(body) {
                Ok(text) => Record::Stream(StreamRecord { kind, text }),
                Err(_) => raw(line),
            }
        }
        _ => raw(line),
    }
}

fn raw(line: &str) -> Record {
    Record::Stream(StreamRecord {
        kind: StreamKind::Raw,
        text: line.to_string(),
    })
}

fn split_class(body: &str) -> (&str, &str) {
    body.split_once(',').unwrap_or((body, ""))
}

fn decode_payload(line: &str, payload: &str) -> MiValue {
    match parse_results(payload) {
        Ok(results) => MiValue::Tuple(results),
        Err(err) => {
            tracing::warn!("Malformed MI payload ({}): {}", err, line);
            MiValue::Tuple(vec![("raw".to_string(), MiValue::Const(payload.to_string()))])
        }
    }
}
