#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use indexmap::IndexMap;
use volley_core::SuccessCondition;
use volley_traits::{BoxError, Clock, Connector, ManualClock, Reply, RequestDescriptor, Session};

pub const SUCCESS_BODY: &str = r#"{"code":0,"data":{"apply_result":3,"deadline":1745251200}}"#;
pub const PAST_WINDOW_BODY: &str = r#"{"code":0,"data":{"apply_result":1,"deadline":1745337600}}"#;

/// One scripted reaction of the fake server.
#[derive(Debug, Clone)]
pub enum Step {
    Reply {
        after: Duration,
        status: u16,
        body: String,
        headers_after: Option<Duration>,
    },
    Fail {
        after: Duration,
        error: String,
    },
}

pub fn ok(after_ms: u64, body: &str) -> Step {
    Step::Reply {
        after: Duration::from_millis(after_ms),
        status: 200,
        body: body.to_string(),
        headers_after: None,
    }
}

/// Reply whose headers arrive `headers_ms` in; the full reply takes `after_ms`.
pub fn ok_with_headers(after_ms: u64, headers_ms: u64, body: &str) -> Step {
    Step::Reply {
        after: Duration::from_millis(after_ms),
        status: 200,
        body: body.to_string(),
        headers_after: Some(Duration::from_millis(headers_ms)),
    }
}

pub fn fail(after_ms: u64, error: &str) -> Step {
    Step::Fail {
        after: Duration::from_millis(after_ms),
        error: error.to_string(),
    }
}

/// Fake transport driven by a script; advances the manual clock by each
/// step's latency and records the wall time at which every send started.
#[derive(Clone)]
pub struct ScriptedConnector {
    clock: ManualClock,
    steps: Arc<Mutex<VecDeque<Step>>>,
    sends: Arc<Mutex<Vec<DateTime<Utc>>>>,
    opened: Arc<AtomicUsize>,
    refuse: bool,
}

impl ScriptedConnector {
    pub fn new(clock: ManualClock, steps: Vec<Step>) -> Self {
        Self {
            clock,
            steps: Arc::new(Mutex::new(steps.into())),
            sends: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(AtomicUsize::new(0)),
            refuse: false,
        }
    }

    /// Connector whose session setup always fails.
    pub fn refusing(clock: ManualClock) -> Self {
        Self {
            refuse: true,
            ..Self::new(clock, Vec::new())
        }
    }

    pub fn sends(&self) -> Vec<DateTime<Utc>> {
        self.sends.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

pub struct ScriptedSession {
    inner: ScriptedConnector,
}

impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    fn open(&self, _request: &RequestDescriptor) -> Result<Self::Session, BoxError> {
        if self.refuse {
            return Err("connection pool unavailable".into());
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            inner: self.clone(),
        })
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn send(&self) -> Result<Reply, BoxError> {
        let c = &self.inner;
        c.sends.lock().unwrap().push(c.clock.wall());
        // An exhausted script keeps answering with the success body.
        let step = c
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ok(0, SUCCESS_BODY));
        match step {
            Step::Reply {
                after,
                status,
                body,
                headers_after,
            } => {
                c.clock.advance(after);
                Ok(Reply {
                    status,
                    body,
                    headers_after,
                })
            }
            Step::Fail { after, error } => {
                c.clock.advance(after);
                Err(error.into())
            }
        }
    }
}

pub fn descriptor() -> RequestDescriptor {
    let mut headers = IndexMap::new();
    headers.insert("Host".to_string(), "api.example.com".to_string());
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    RequestDescriptor {
        url: "https://api.example.com/apply".to_string(),
        headers,
        body: serde_json::json!({ "is_retry": true }),
    }
}

pub fn cst() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

pub fn dispatcher(
    connector: ScriptedConnector,
    clock: ManualClock,
) -> volley_core::WaveDispatcher<ScriptedConnector, ManualClock> {
    volley_core::WaveDispatcher::new(
        connector,
        clock,
        descriptor(),
        SuccessCondition::default(),
        cst(),
    )
}
