use std::collections::{HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::mi::{AsyncKind, AsyncRecord, MiValue, StreamRecord};
use crate::session::SessionShared;
use crate::state::{Breakpoint, SessionState};

pub const MAX_SIDE_LOG_ENTRIES: usize = 1024;
pub const MAX_PENDING_HITS: usize = 1024;

const STOP_REASONS: &[&str] = &[
    "breakpoint-hit",
    "watchpoint-trigger",
    "read-watchpoint-trigger",
    "access-watchpoint-trigger",
    "watchpoint-scope",
    "function-finished",
    "location-reached",
    "end-stepping-range",
    "signal-received",
    "solib-event",
    "fork",
    "vfork",
    "syscall-entry",
    "syscall-return",
    "exec",
    "no-history",
];

const EXIT_REASONS: &[&str] = &["exited", "exited-normally", "exited-signalled"];

/// One stop of the debugged program, as filed into the pending-hits queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopEvent {
    pub breakpoint_number: Option<u32>,
    pub reason: String,
    pub thread_id: Option<String>,
    pub address: Option<String>,
    pub frame: Value,
    pub timestamp: u64,
}

impl StopEvent {
    fn from_payload(reason: &str, payload: &MiValue) -> Self {
        let frame = payload.get("frame");
        Self {
            breakpoint_number: payload.get_str("bkptno").and_then(|n| n.parse().ok()),
            reason: reason.to_string(),
            thread_id: payload.get_str("thread-id").map(str::to_string),
            address: frame.and_then(|f| f.get_str("addr")).map(str::to_string),
            frame: frame.map(MiValue::to_json).unwrap_or(Value::Null),
            timestamp: timestamp_millis(),
        }
    }

    fn key(&self) -> StopKey {
        (
            self.reason.clone(),
            self.thread_id.clone(),
            self.breakpoint_number,
            self.address.clone(),
        )
    }
}

type StopKey = (String, Option<String>, Option<u32>, Option<String>);

/// Pending stop events. A stop is filed at most once per run: repeated
/// `*stopped` records with the same key are dropped until the next
/// `*running` starts a new epoch. Holds at most `MAX_PENDING_HITS` events;
/// the oldest are dropped first.
#[derive(Debug, Default)]
pub struct HitQueue {
    events: VecDeque<StopEvent>,
    run_epoch: u64,
    filed_this_run: HashSet<StopKey>,
    dropped: u64,
}

impl HitQueue {
    pub fn begin_run(&mut self) {
        self.run_epoch += 1;
        self.filed_this_run.clear();
    }

    pub fn file(&mut self, event: StopEvent) -> bool {
        if !self.filed_this_run.insert(event.key()) {
            return false;
        }
        self.events.push_back(event);
        while self.events.len() > MAX_PENDING_HITS {
            self.events.pop_front();
            self.dropped += 1;
        }
        true
    }

    pub fn drain(&mut self) -> Vec<StopEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn run_epoch(&self) -> u64 {
        self.run_epoch
    }

    /// Events evicted unread since the session started.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideLogEntry {
    pub seq: u64,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub detail: Value,
}

/// Bounded ring of records nobody was waiting for.
#[derive(Debug, Default)]
pub struct SideLog {
    entries: VecDeque<SideLogEntry>,
    next_seq: u64,
}

impl SideLog {
    pub fn push(&mut self, source: &'static str, class: Option<String>, detail: Value) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.entries.push_back(SideLogEntry {
            seq,
            source,
            class,
            detail,
        });
        while self.entries.len() > MAX_SIDE_LOG_ENTRIES {
            self.entries.pop_front();
        }
    }

    pub fn recent(&self, count: usize) -> Vec<SideLogEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn async_source(kind: AsyncKind) -> &'static str {
    match kind {
        AsyncKind::Exec => "exec",
        AsyncKind::Status => "status",
        AsyncKind::Notify => "notify",
    }
}

pub(crate) fn route_async(shared: &mut SessionShared, record: AsyncRecord) {
    tracing::debug!("Async record: {:?} {}", record.kind, record.class);
    match (record.kind, record.class.as_str()) {
        (AsyncKind::Exec, "stopped") => route_stop(shared, record),
        (AsyncKind::Exec, "running") => {
            shared.hits.begin_run();
            tracing::debug!("Run {} started", shared.hits.run_epoch());
            if shared.state.has_inferior() {
                shared.state = SessionState::Running;
            }
        }
        (AsyncKind::Notify, "breakpoint-created" | "breakpoint-modified") => {
            match record
                .payload
                .get("bkpt")
                .and_then(|bkpt| Breakpoint::from_mi(bkpt, None))
            {
                Some(breakpoint) => shared.breakpoints.insert(breakpoint),
                None => log_unrouted(shared, record),
            }
        }
        (AsyncKind::Notify, "breakpoint-deleted") => {
            match record.payload.get_str("id").and_then(|id| id.parse::<u32>().ok()) {
                Some(number) => {
                    shared.breakpoints.remove(number);
                }
                None => log_unrouted(shared, record),
            }
        }
        _ => log_unrouted(shared, record),
    }
}

fn route_stop(shared: &mut SessionShared, record: AsyncRecord) {
    let Some(reason) = record.payload.get_str("reason") else {
        // GDB reports the initial stop after attach without a reason.
        shared.stop_seq += 1;
        if shared.state.has_inferior() {
            shared.state = SessionState::Stopped;
        }
        return;
    };

    let exited = EXIT_REASONS.contains(&reason);
    if !exited && !STOP_REASONS.contains(&reason) {
        tracing::debug!("Unrecognized stop reason '{}', recorded in side log", reason);
        log_unrouted(shared, record);
        return;
    }

    let event = StopEvent::from_payload(reason, &record.payload);
    shared.stop_seq += 1;
    if shared.hits.file(event) {
        tracing::debug!("Filed stop event: reason={}", reason);
    } else {
        tracing::debug!("Suppressed duplicate stop record: reason={}", reason);
    }

    if shared.state.has_inferior() {
        if exited {
            shared.state = SessionState::Exited;
            shared.attached_pid = None;
        } else {
            shared.state = SessionState::Stopped;
        }
    }
}

fn log_unrouted(shared: &mut SessionShared, record: AsyncRecord) {
    shared.side_log.push(
        async_source(record.kind),
        Some(record.class),
        record.payload.to_json(),
    );
}

pub(crate) fn log_stream(shared: &mut SessionShared, record: &StreamRecord) {
    let source = match record.kind {
        crate::mi::StreamKind::Console => "console",
        crate::mi::StreamKind::Target => "target",
        crate::mi::StreamKind::Log => "log",
        crate::mi::StreamKind::Raw => "raw",
    };
    shared
        .side_log
        .push(source, None, Value::String(record.text.clone()));
}

fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mi::{parse_line, Record};
    use serde_json::json;

    fn shared_in(state: SessionState) -> SessionShared {
        let mut shared = SessionShared::new();
        shared.state = state;
        shared
    }

    fn feed(shared: &mut SessionShared, line: &str) {
        match parse_line(line) {
            Record::Async(record) => route_async(shared, record),
            other => panic!("Expected async record, got {other:?}"),
        }
    }

    #[test]
    fn test_breakpoint_hit_is_filed_and_stops_session() {
        let mut shared = shared_in(SessionState::Running);
        feed(
            &mut shared,
            r#"*stopped,reason="breakpoint-hit",disp="keep",bkptno="1",frame={addr="0x401000",func="main"},thread-id="2""#,
        );

        assert_eq!(shared.state, SessionState::Stopped);
        let hits = shared.hits.drain();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].breakpoint_number, Some(1));
        assert_eq!(hits[0].reason, "breakpoint-hit");
        assert_eq!(hits[0].thread_id.as_deref(), Some("2"));
        assert_eq!(hits[0].address.as_deref(), Some("0x401000"));
        assert_eq!(hits[0].frame, json!({ "addr": "0x401000", "func": "main" }));
        assert!(hits[0].timestamp > 0);
        assert!(shared.hits.drain().is_empty());
    }

    #[test]
    fn test_duplicate_stop_records_are_filed_once_per_run() {
        let mut shared = shared_in(SessionState::Running);
        let stop = r#"*stopped,reason="breakpoint-hit",bkptno="1",frame={addr="0x401000"},thread-id="1""#;
        feed(&mut shared, stop);
        feed(&mut shared, stop);
        assert_eq!(shared.hits.len(), 1);

        feed(&mut shared, r#"*running,thread-id="all""#);
        assert_eq!(shared.state, SessionState::Running);
        feed(&mut shared, stop);
        assert_eq!(shared.hits.len(), 2);
        assert_eq!(shared.hits.run_epoch(), 1);
    }

    #[test]
    fn test_signal_stop_is_filed_without_breakpoint_number() {
        let mut shared = shared_in(SessionState::Running);
        feed(
            &mut shared,
            r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt",frame={addr="0x7f00"},thread-id="1""#,
        );
        let hits = shared.hits.drain();
        assert_eq!(hits[0].reason, "signal-received");
        assert_eq!(hits[0].breakpoint_number, None);
    }

    #[test]
    fn test_stop_without_reason_changes_state_only() {
        let mut shared = shared_in(SessionState::Attached);
        feed(&mut shared, r#"*stopped,frame={addr="0x7f00"},thread-id="1""#);
        assert_eq!(shared.state, SessionState::Stopped);
        assert!(shared.hits.is_empty());
        assert_eq!(shared.stop_seq, 1);
    }

    #[test]
    fn test_unknown_stop_reason_goes_to_side_log() {
        let mut shared = shared_in(SessionState::Running);
        feed(&mut shared, r#"*stopped,reason="quantum-tunneling",thread-id="1""#);
        assert_eq!(shared.state, SessionState::Running);
        assert!(shared.hits.is_empty());
        let logged = shared.side_log.recent(1);
        assert_eq!(logged[0].source, "exec");
        assert_eq!(logged[0].class.as_deref(), Some("stopped"));
    }

    #[test]
    fn test_exit_moves_session_to_exited() {
        let mut shared = shared_in(SessionState::Running);
        shared.attached_pid = Some(1234);
        feed(&mut shared, r#"*stopped,reason="exited-normally""#);
        assert_eq!(shared.state, SessionState::Exited);
        assert_eq!(shared.attached_pid, None);
        assert_eq!(shared.hits.drain()[0].reason, "exited-normally");
    }

    #[test]
    fn test_stop_outside_attached_states_keeps_state() {
        let mut shared = shared_in(SessionState::Started);
        feed(&mut shared, r#"*stopped,reason="breakpoint-hit",bkptno="3""#);
        assert_eq!(shared.state, SessionState::Started);
        assert_eq!(shared.hits.len(), 1);
    }

    #[test]
    fn test_breakpoint_notifications_sync_table() {
        let mut shared = shared_in(SessionState::Stopped);
        feed(
            &mut shared,
            r#"=breakpoint-created,bkpt={number="5",type="breakpoint",enabled="y",addr="0x0000000000401136"}"#,
        );
        assert_eq!(shared.breakpoints.get(5).map(|bp| bp.address.as_str()), Some("0x0000000000401136"));

        feed(
            &mut shared,
            r#"=breakpoint-modified,bkpt={number="5",type="breakpoint",enabled="n",addr="0x0000000000401136"}"#,
        );
        assert_eq!(shared.breakpoints.get(5).map(|bp| bp.enabled), Some(false));

        feed(&mut shared, r#"=breakpoint-deleted,id="5""#);
        assert!(shared.breakpoints.is_empty());
    }

    #[test]
    fn test_other_notifications_are_side_logged() {
        let mut shared = shared_in(SessionState::Started);
        feed(&mut shared, r#"=thread-group-added,id="i1""#);
        feed(&mut shared, r#"=library-loaded,id="/lib/libc.so.6",thread-group="i1""#);
        assert_eq!(shared.state, SessionState::Started);
        let entries = shared.side_log.recent(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].detail, json!({ "id": "i1" }));
        assert_eq!(entries[1].seq, 1);
    }

    #[test]
    fn test_hit_queue_is_bounded() {
        let mut queue = HitQueue::default();
        for thread in 0..(MAX_PENDING_HITS + 5) {
            let filed = queue.file(StopEvent {
                breakpoint_number: None,
                reason: "watchpoint-trigger".to_string(),
                thread_id: Some(thread.to_string()),
                address: Some("0x401000".to_string()),
                frame: Value::Null,
                timestamp: 0,
            });
            assert!(filed);
        }
        assert_eq!(queue.len(), MAX_PENDING_HITS);
        assert_eq!(queue.dropped(), 5);

        let hits = queue.drain();
        assert_eq!(hits[0].thread_id.as_deref(), Some("5"));
        assert!(queue.is_empty());
        assert_eq!(queue.dropped(), 5);
    }

    #[test]
    fn test_side_log_is_bounded() {
        let mut log = SideLog::default();
        for i in 0..(MAX_SIDE_LOG_ENTRIES + 10) {
            log.push("console", None, json!(i));
        }
        assert_eq!(log.len(), MAX_SIDE_LOG_ENTRIES);
        let oldest = log.recent(MAX_SIDE_LOG_ENTRIES)[0].seq;
        assert_eq!(oldest, 10);
        assert_eq!(log.recent(3).len(), 3);
    }
}
