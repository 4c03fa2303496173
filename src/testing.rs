//! Mock collaborators for exercising the fetch loop and the pipeline without
//! network, sleeps, or mail.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::fetcher::{Reply, Sleeper, Transport};
use crate::notify::Notifier;

/// Replays a fixed script of replies, then refuses connections.
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<Reply, String>>>,
    calls: Mutex<usize>,
}

impl MockTransport {
    pub fn new(replies: Vec<Result<Reply, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, _url: &str) -> Result<Reply, String> {
        *self.calls.lock().unwrap() += 1;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("connection refused".into()))
    }
}

/// Accepts the request and never answers.
#[derive(Default)]
pub struct HangingTransport {
    calls: Mutex<usize>,
}

impl HangingTransport {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Transport for HangingTransport {
    async fn get(&self, _url: &str) -> Result<Reply, String> {
        *self.calls.lock().unwrap() += 1;
        std::future::pending().await
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct MockSleeper(Mutex<Vec<Duration>>);

impl MockSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for MockSleeper {
    async fn sleep(&self, delay: Duration) {
        self.0.lock().unwrap().push(delay);
    }
}

/// Captures (subject, body) pairs and reports delivery.
#[derive(Default)]
pub struct MockNotifier(Mutex<Vec<(String, String)>>);

impl MockNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, subject: &str, body: &str) -> bool {
        self.0.lock().unwrap().push((subject.into(), body.into()));
        true
    }
}

/// Always fails to deliver.
pub struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn notify(&self, _subject: &str, _body: &str) -> bool {
        false
    }
}

pub fn ok(body: &str) -> Result<Reply, String> {
    Ok(Reply {
        status: 200,
        body: body.into(),
    })
}

pub fn status(code: u16) -> Result<Reply, String> {
    Ok(Reply {
        status: code,
        body: String::new(),
    })
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}
