//! Fakes shared by the unit tests: a scripted HTTP transport and a manual clock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use url::Url;

use crate::error::AppError;
use crate::fetch::{Clock, FetchSettings, Fetcher, HttpTransport, RateLimiter, RawResponse, TransportError};
use crate::models::checkpoint::BatchCheckpoint;
use crate::models::company::Company;
use crate::storage::{CheckpointStore, RosterStore};

/// Clock whose `sleep` returns immediately and advances virtual time.
pub struct FakeClock {
    start: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap() += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

#[derive(Clone)]
enum Scripted {
    Page { final_url: Option<String>, body: String },
    Status(u16),
    Error(TransportError),
    Panic,
}

#[derive(Default)]
struct ScriptState {
    responses: HashMap<String, VecDeque<Scripted>>,
    calls: HashMap<String, usize>,
}

/// Transport answering from a per-URL script. The last scripted response
/// for a URL repeats forever; unscripted URLs answer 404.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

fn key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, url: &str, response: Scripted) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .entry(key(url))
            .or_default()
            .push_back(response);
        self
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.push(
            url,
            Scripted::Page {
                final_url: None,
                body: body.to_string(),
            },
        )
    }

    pub fn redirect(self, url: &str, final_url: &str, body: &str) -> Self {
        self.push(
            url,
            Scripted::Page {
                final_url: Some(final_url.to_string()),
                body: body.to_string(),
            },
        )
    }

    pub fn status(self, url: &str, status: u16) -> Self {
        self.push(url, Scripted::Status(status))
    }

    pub fn error(self, url: &str, error: TransportError) -> Self {
        self.push(url, Scripted::Error(error))
    }

    /// Simulates a bug: the request panics instead of returning.
    pub fn panic(self, url: &str) -> Self {
        self.push(url, Scripted::Panic)
    }

    pub fn calls(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&key(url))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &Url, _timeout: Duration) -> Result<RawResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        let k = url.to_string();
        *state.calls.entry(k.clone()).or_default() += 1;

        let scripted = match state.responses.get_mut(&k) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        drop(state);

        match scripted {
            Some(Scripted::Page { final_url, body }) => Ok(RawResponse {
                status: 200,
                final_url: final_url
                    .and_then(|u| Url::parse(&u).ok())
                    .unwrap_or_else(|| url.clone()),
                body,
            }),
            Some(Scripted::Status(status)) => Ok(RawResponse {
                status,
                final_url: url.clone(),
                body: String::new(),
            }),
            Some(Scripted::Error(e)) => Err(e),
            Some(Scripted::Panic) => panic!("scripted panic for {url}"),
            None => Ok(RawResponse {
                status: 404,
                final_url: url.clone(),
                body: String::new(),
            }),
        }
    }
}

/// Fetcher over `transport` with a fake clock, so no test ever really sleeps.
pub fn fetcher_with(transport: ScriptedTransport, settings: FetchSettings) -> (Fetcher, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::new());
    let limiter = Arc::new(RateLimiter::new(clock.clone(), settings.min_host_interval));
    (Fetcher::new(Arc::new(transport), limiter, settings), clock)
}

pub fn company(index: usize, name: &str, careers_url: Option<&str>) -> Company {
    let mut company = Company::new(index, name);
    company.careers_url = careers_url.map(String::from);
    company
}

/// A Lever board listing the given postings in page order.
pub fn lever_board(titles: &[&str]) -> String {
    let postings: String = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            format!(
                r#"<div class="posting" data-qa-posting-id="{i}">
                    <a class="posting-title" href="https://jobs.lever.co/acme/{i}">
                        <h5 data-qa="posting-name">{title}</h5>
                        <div class="posting-categories">
                            <span class="sort-by-location posting-category">Berlin</span>
                        </div>
                    </a>
                </div>"#
            )
        })
        .collect();
    format!(r#"<html><body><div class="postings-group">{postings}</div></body></html>"#)
}

/// Roster held in memory. Saves can be made to fail from the Nth call on,
/// standing in for a crash between batches.
#[derive(Default)]
pub struct MemoryRosterStore {
    companies: Mutex<Vec<Company>>,
    saves: Mutex<usize>,
    fail_from_save: Option<usize>,
}

impl MemoryRosterStore {
    pub fn new(companies: Vec<Company>) -> Self {
        Self {
            companies: Mutex::new(companies),
            ..Default::default()
        }
    }

    pub fn failing_from_save(mut self, nth: usize) -> Self {
        self.fail_from_save = Some(nth);
        self
    }

    pub fn snapshot(&self) -> Vec<Company> {
        self.companies.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl RosterStore for MemoryRosterStore {
    async fn load(&self) -> Result<Vec<Company>, AppError> {
        Ok(self.snapshot())
    }

    async fn save(&self, companies: &[Company]) -> Result<(), AppError> {
        let mut saves = self.saves.lock().unwrap();
        *saves += 1;
        if self.fail_from_save.is_some_and(|nth| *saves >= nth) {
            return Err(AppError::write(
                "memory",
                std::io::Error::other("simulated crash"),
            ));
        }
        *self.companies.lock().unwrap() = companies.to_vec();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoint: Mutex<Option<BatchCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn current(&self) -> Option<BatchCheckpoint> {
        self.checkpoint.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<BatchCheckpoint>, AppError> {
        Ok(self.current())
    }

    async fn save(&self, checkpoint: &BatchCheckpoint) -> Result<(), AppError> {
        *self.checkpoint.lock().unwrap() = Some(checkpoint.clone());
        Ok(())
    }
}
