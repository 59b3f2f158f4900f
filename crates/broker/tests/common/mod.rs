#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use replication_broker::{EventContext, StreamListener};
use replication_events::{
    ChangeAttribute, Envelope, EventMeta, ReplicatedEvent, StreamEvent, StreamEventKind,
};
use replication_outgoing::{OutgoingQueue, Result};

#[derive(Default)]
pub struct RecordingQueue {
    pub envelopes: Mutex<Vec<Envelope>>,
}

impl RecordingQueue {
    pub fn stream_events(&self) -> Vec<StreamEvent> {
        self.envelopes
            .lock()
            .iter()
            .filter_map(|envelope| match envelope.decode() {
                Ok(ReplicatedEvent::Stream(event)) => Some(event),
                _ => None,
            })
            .collect()
    }
}

impl OutgoingQueue for RecordingQueue {
    fn queue_event(&self, envelope: Envelope) -> Result<()> {
        self.envelopes.lock().push(envelope);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub seen: Mutex<Vec<(StreamEvent, EventContext)>>,
}

impl RecordingListener {
    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

impl StreamListener for RecordingListener {
    fn on_stream_event(&self, event: &StreamEvent, context: &EventContext) {
        self.seen.lock().push((event.clone(), context.clone()));
    }
}

pub fn change(project: &str, number: u32) -> ChangeAttribute {
    ChangeAttribute {
        project: project.to_string(),
        branch: "main".to_string(),
        number,
        id: format!("I{number:040}"),
        subject: "Add frobnicator".to_string(),
        topic: None,
    }
}

pub fn comment_added(node: &str, nano: i64) -> StreamEvent {
    StreamEvent::new(
        EventMeta::new(node, 1_700_000_000_000, nano),
        StreamEventKind::CommentAdded {
            change: change("ProjectA", 17),
            patch_set: 2,
            author: 1000,
            comment: "Looks good".to_string(),
            approvals: Vec::new(),
        },
    )
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
