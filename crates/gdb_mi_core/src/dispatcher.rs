use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::error::MiError;
use crate::mi::{MiValue, ResultClass, ResultRecord};

/// Successful outcome of one MI command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub class: ResultClass,
    pub payload: MiValue,
    /// Stream text captured while an untokenized command was in flight.
    pub output: Vec<String>,
}

pub(crate) type Outcome = Result<CommandReply, MiError>;

#[derive(Debug)]
pub(crate) struct PendingCommand {
    command: String,
    sent_at: Instant,
    waiter: oneshot::Sender<Outcome>,
    output: Vec<String>,
}

impl PendingCommand {
    fn new(command: &str) -> (Self, oneshot::Receiver<Outcome>) {
        let (waiter, rx) = oneshot::channel();
        let pending = Self {
            command: command.to_string(),
            sent_at: Instant::now(),
            waiter,
            output: Vec::new(),
        };
        (pending, rx)
    }

    fn resolve(self, record: ResultRecord) {
        tracing::debug!(
            "Resolved '{}' with ^{} after {:?}",
            self.command,
            record.class.as_str(),
            self.sent_at.elapsed()
        );
        let outcome = match record.class {
            ResultClass::Error => Err(MiError::Command {
                message: record
                    .error_message()
                    .unwrap_or("unknown debugger error")
                    .to_string(),
                code: record.payload.get_str("code").map(str::to_string),
                command: self.command,
            }),
            class => Ok(CommandReply {
                class,
                payload: record.payload,
                output: self.output,
            }),
        };
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.waiter.send(outcome);
    }

    fn fail(self, err: MiError) {
        let _ = self.waiter.send(Err(err));
    }
}

/// Token-to-waiter bookkeeping. Lives inside the session mutex; every method
/// is synchronous so the lock is never held across I/O.
#[derive(Debug, Default)]
pub(crate) struct Correlator {
    next_token: u64,
    pending: HashMap<u64, PendingCommand>,
    untokenized: Option<PendingCommand>,
    /// Untokenized commands that timed out; their replies may still arrive.
    stale_untokenized: usize,
}

impl Correlator {
    pub fn register(&mut self, command: &str) -> (u64, oneshot::Receiver<Outcome>) {
        self.next_token += 1;
        let token = self.next_token;
        let (pending, rx) = PendingCommand::new(command);
        self.pending.insert(token, pending);
        (token, rx)
    }

    /// Callers serialize untokenized sends; a second registration while one
    /// is outstanding would make matching ambiguous.
    pub fn register_untokenized(&mut self, command: &str) -> oneshot::Receiver<Outcome> {
        debug_assert!(self.untokenized.is_none(), "untokenized command already in flight");
        let (pending, rx) = PendingCommand::new(command);
        self.untokenized = Some(pending);
        rx
    }

    /// Removes an expired command. Returns `false` if it had already been
    /// resolved.
    pub fn expire(&mut self, token: u64) -> bool {
        self.pending.remove(&token).is_some()
    }

    pub fn expire_untokenized(&mut self) -> bool {
        if self.untokenized.take().is_some() {
            self.stale_untokenized += 1;
            true
        } else {
            false
        }
    }

    /// Drops an untokenized command that never reached the debugger.
    pub fn cancel_untokenized(&mut self) {
        self.untokenized = None;
    }

    pub fn resolve(&mut self, record: ResultRecord) {
        match record.token {
            Some(token) => match self.pending.remove(&token) {
                Some(pending) => pending.resolve(record),
                None => tracing::warn!(
                    "Dropping ^{} for token {} with no waiting command (expired or unknown)",
                    record.class.as_str(),
                    token
                ),
            },
            None => {
                if self.stale_untokenized > 0 {
                    self.stale_untokenized -= 1;
                    tracing::warn!(
                        "Dropping late ^{} for a timed-out untokenized command",
                        record.class.as_str()
                    );
                    return;
                }
                match self.untokenized.take() {
                    Some(pending) => pending.resolve(record),
                    None => tracing::warn!(
                        "Dropping unsolicited untokenized ^{}",
                        record.class.as_str()
                    ),
                }
            }
        }
    }

    /// Appends stream text to the in-flight untokenized command, if any.
    pub fn capture_stream(&mut self, text: &str) -> bool {
        match self.untokenized.as_mut() {
            Some(pending) => {
                pending.output.push(text.to_string());
                true
            }
            None => false,
        }
    }

    /// Fails every outstanding command. Returns how many were failed.
    pub fn fail_all(&mut self, make_error: impl Fn() -> MiError) -> usize {
        let mut failed = 0;
        for (_, pending) in self.pending.drain() {
            pending.fail(make_error());
            failed += 1;
        }
        if let Some(pending) = self.untokenized.take() {
            pending.fail(make_error());
            failed += 1;
        }
        self.stale_untokenized = 0;
        failed
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len() + usize::from(self.untokenized.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mi::{parse_line, Record};

    fn result(line: &str) -> ResultRecord {
        match parse_line(line) {
            Record::Result(record) => record,
            other => panic!("Expected result record, got {other:?}"),
        }
    }

    #[test]
    fn test_tokens_are_monotonic_and_unique() {
        let mut correlator = Correlator::default();
        let (a, _rx_a) = correlator.register("-exec-continue");
        let (b, _rx_b) = correlator.register("-exec-interrupt");
        assert_eq!((a, b), (1, 2));
        assert!(correlator.expire(a));
        let (c, _rx_c) = correlator.register("-target-detach");
        assert_eq!(c, 3);
        assert_eq!(correlator.outstanding(), 2);
    }

    #[test]
    fn test_out_of_order_results_match_by_token() {
        let mut correlator = Correlator::default();
        let (first, mut rx_first) = correlator.register("-data-evaluate-expression $rax");
        let (second, mut rx_second) = correlator.register("-data-evaluate-expression $rip");

        correlator.resolve(result(&format!(r#"{second}^done,value="0x401000""#)));
        correlator.resolve(result(&format!(r#"{first}^done,value="42""#)));

        let first_reply = rx_first.try_recv().unwrap().unwrap();
        let second_reply = rx_second.try_recv().unwrap().unwrap();
        assert_eq!(first_reply.payload.get_str("value"), Some("42"));
        assert_eq!(second_reply.payload.get_str("value"), Some("0x401000"));
        assert_eq!(correlator.outstanding(), 0);
    }

    #[test]
    fn test_error_result_maps_to_command_error() {
        let mut correlator = Correlator::default();
        let (token, mut rx) = correlator.register("-break-delete 9");
        correlator.resolve(result(&format!(r#"{token}^error,msg="No breakpoint number 9.""#)));

        match rx.try_recv().unwrap() {
            Err(MiError::Command { command, message, code }) => {
                assert_eq!(command, "-break-delete 9");
                assert_eq!(message, "No breakpoint number 9.");
                assert_eq!(code, None);
            }
            other => panic!("Expected CommandError, got {other:?}"),
        }
    }

    #[test]
    fn test_late_result_for_expired_token_is_dropped() {
        let mut correlator = Correlator::default();
        let (token, _rx) = correlator.register("-exec-continue");
        assert!(correlator.expire(token));
        assert!(!correlator.expire(token));

        correlator.resolve(result(&format!("{token}^running")));
        assert_eq!(correlator.outstanding(), 0);
    }

    #[test]
    fn test_untokenized_matches_next_untokenized_result_only() {
        let mut correlator = Correlator::default();
        let (token, mut rx_tok) = correlator.register("-exec-continue");
        let mut rx_raw = correlator.register_untokenized("info registers rip");

        assert!(correlator.capture_stream("rip            0x401000\n"));
        correlator.resolve(result(&format!("{token}^running")));
        assert!(rx_raw.try_recv().is_err(), "tokenized result must not resolve raw command");

        correlator.resolve(result("^done"));
        let reply = rx_raw.try_recv().unwrap().unwrap();
        assert_eq!(reply.output, vec!["rip            0x401000\n".to_string()]);
        assert_eq!(rx_tok.try_recv().unwrap().unwrap().class, ResultClass::Running);
        assert!(!correlator.capture_stream("stray"));
    }

    #[test]
    fn test_expired_untokenized_reply_does_not_resolve_next_command() {
        let mut correlator = Correlator::default();
        let _rx_old = correlator.register_untokenized("info threads");
        assert!(correlator.expire_untokenized());

        let mut rx_new = correlator.register_untokenized("info frame");
        correlator.resolve(result(r#"^done,late="yes""#));
        assert!(rx_new.try_recv().is_err());

        correlator.resolve(result("^done"));
        let reply = rx_new.try_recv().unwrap().unwrap();
        assert_eq!(reply.payload.get_str("late"), None);
    }

    #[test]
    fn test_fail_all_resolves_every_waiter() {
        let mut correlator = Correlator::default();
        let (_, mut rx_a) = correlator.register("-exec-continue");
        let mut rx_b = correlator.register_untokenized("info threads");

        assert_eq!(correlator.fail_all(|| MiError::SessionStopped), 2);
        assert!(matches!(rx_a.try_recv().unwrap(), Err(MiError::SessionStopped)));
        assert!(matches!(rx_b.try_recv().unwrap(), Err(MiError::SessionStopped)));
        assert_eq!(correlator.outstanding(), 0);
    }
}
