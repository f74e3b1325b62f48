use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::FetchError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET against a data source. Non-2xx statuses are returned, not raised;
/// only connection-level failures are errors.
pub trait Transport: Send + Sync {
    fn get(&self, url: String) -> BoxFuture<'_, Result<Response, FetchError>>;
}

/// Plain HTTP GET via `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: String) -> BoxFuture<'_, Result<Response, FetchError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(&url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| FetchError::transport(format!("GET {url}: {e}")))?;

            let status = resp.status().as_u16();
            let body = resp
                .bytes()
                .await
                .map_err(|e| FetchError::transport(format!("reading {url}: {e}")))?;

            Ok(Response {
                status,
                body: body.to_vec(),
            })
        })
    }
}

/// A canned reply for [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    Respond {
        status: u16,
        body: Vec<u8>,
        delay: Duration,
    },
    /// Never answers; only a timeout or cancellation ends the call.
    Hang,
    Disconnect,
}

/// In-process transport replaying scripted replies per URL.
///
/// Replies are consumed in order; the last one repeats once the script runs
/// out. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<BTreeMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: impl Into<String>, reply: Scripted) -> &Self {
        self.scripts
            .lock()
            .entry(url.into())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn respond(&self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.push(
            url,
            Scripted::Respond {
                status,
                body: body.into(),
                delay: Duration::ZERO,
            },
        )
    }

    pub fn respond_after(
        &self,
        url: impl Into<String>,
        delay: Duration,
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> &Self {
        self.push(
            url,
            Scripted::Respond {
                status,
                body: body.into(),
                delay,
            },
        )
    }

    pub fn hang(&self, url: impl Into<String>) -> &Self {
        self.push(url, Scripted::Hang)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == url).count()
    }

    fn next_reply(&self, url: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: String) -> BoxFuture<'_, Result<Response, FetchError>> {
        self.calls.lock().push(url.clone());
        let reply = self.next_reply(&url);
        Box::pin(async move {
            match reply {
                Some(Scripted::Respond {
                    status,
                    body,
                    delay,
                }) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(Response { status, body })
                }
                Some(Scripted::Hang) => std::future::pending().await,
                Some(Scripted::Disconnect) => {
                    Err(FetchError::transport(format!("GET {url}: connection reset")))
                }
                None => Err(FetchError::transport(format!("GET {url}: no route"))),
            }
        })
    }
}
