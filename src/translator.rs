use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio_util::sync::CancellationToken;

use crate::api::{self, TranslateError};
use crate::config::Config;
use crate::history::{History, HistoryEntry};
use crate::logger;
use crate::prompt;
use crate::stream::{SseDecoder, StreamEvent};

/// Cancellation handle for exactly one translation attempt.
///
/// Clones share the underlying token, so cancelling any clone stops the
/// attempt. Attempt identity is the allocation itself: two tokens belong to
/// the same attempt iff they point at the same inner token, which is what the
/// UI uses to discard events from superseded attempts.
#[derive(Clone)]
pub struct CancelToken(Arc<CancellationToken>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(CancellationToken::new()))
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.0.cancelled().await;
    }

    pub fn same_attempt(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// One translation request as handed to the worker.
pub struct Job {
    pub input: String,
    pub source: String,
    pub target: String,
    pub token: CancelToken,
}

/// Terminal result of one attempt.
pub enum Outcome {
    Done(String),
    Cancelled,
    Failed(String),
}

/// Events for the UI thread. Every event carries the attempt's token so the
/// UI can drop anything from an attempt it no longer considers active.
pub enum UiEvent {
    /// Headers received; the loading indicator can go away.
    Started(CancelToken),
    /// One incremental text fragment.
    Delta(CancelToken, String),
    /// The attempt settled, one way or another.
    Finished(CancelToken, Outcome),
}

/// Spawns the worker thread that owns the tokio runtime and runs jobs one at
/// a time. Serializing jobs here is what makes single-flight a real join:
/// by the time a queued job starts, the cancelled predecessor has fully
/// unwound, so no settling delay is needed.
pub fn spawn_worker(
    cfg: Arc<Mutex<Config>>,
    history: Arc<Mutex<History>>,
    jobs: Receiver<Job>,
    events: Sender<UiEvent>,
) {
    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("tokio rt");
        while let Ok(job) = jobs.recv() {
            let outcome = if job.token.is_cancelled() {
                // Stopped while still queued.
                Outcome::Cancelled
            } else {
                rt.block_on(run_job(&cfg, &history, &job, &events))
            };
            let _ = events.send(UiEvent::Finished(job.token.clone(), outcome));
        }
    });
}

/// Runs one attempt to completion. All errors are absorbed into an `Outcome`
/// here; nothing propagates past the controller.
async fn run_job(
    cfg: &Arc<Mutex<Config>>,
    history: &Arc<Mutex<History>>,
    job: &Job,
    events: &Sender<UiEvent>,
) -> Outcome {
    let cfg = cfg.lock().unwrap().clone();
    match translate(&cfg, job, events).await {
        Ok(text) => {
            if !text.is_empty() {
                let entry = HistoryEntry::new(&job.source, &job.target, &job.input, &text);
                if let Err(e) = history.lock().unwrap().add(entry) {
                    logger::log(&format!("failed to persist history: {e}"));
                }
            }
            Outcome::Done(text)
        }
        Err(TranslateError::Cancelled) => Outcome::Cancelled,
        Err(e) => {
            logger::log(&format!("translation failed: {e}"));
            Outcome::Failed(e.to_string())
        }
    }
}

async fn translate(
    cfg: &Config,
    job: &Job,
    events: &Sender<UiEvent>,
) -> Result<String, TranslateError> {
    if cfg.api_key.is_empty() {
        // The UI checks this before queueing; kept as a guard for env-driven
        // config changes between queueing and execution.
        return Err(TranslateError::MissingApiKey);
    }

    let prompts = prompt::build_prompts(&job.source, &job.target, &job.input);
    let resp = api::send_chat(&api::CLIENT, cfg, &prompts, &job.token).await?;
    let _ = events.send(UiEvent::Started(job.token.clone()));

    if cfg.stream {
        consume_sse(resp.bytes_stream(), &job.token, |delta| {
            let _ = events.send(UiEvent::Delta(job.token.clone(), delta));
        })
        .await
    } else {
        // The body read has to honor a stop request too; a cancel arriving
        // after headers must not surface as a completed translation.
        let parsed: api::ChatResponse = with_cancel(resp.json(), &job.token).await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(TranslateError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Races a fallible future against the attempt's token. Cancellation wins
/// when both are ready, matching the stream path's chunk-boundary checks.
pub(crate) async fn with_cancel<T, E>(
    fut: impl Future<Output = Result<T, E>>,
    token: &CancelToken,
) -> Result<T, TranslateError>
where
    E: Into<TranslateError>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(TranslateError::Cancelled),
        out = fut => out.map_err(Into::into),
    }
}

/// Drains an SSE byte stream into the accumulated translation, invoking
/// `on_delta` for every fragment. Cancellation is checked at every chunk
/// boundary; once the token trips, no further events are emitted.
pub(crate) async fn consume_sse<S, E>(
    mut stream: S,
    token: &CancelToken,
    mut on_delta: impl FnMut(String),
) -> Result<String, TranslateError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<TranslateError>,
{
    let mut decoder = SseDecoder::new();
    let mut full = String::new();

    'read: loop {
        let next = tokio::select! {
            // Cancellation wins over a ready chunk.
            biased;
            _ = token.cancelled() => return Err(TranslateError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let bytes = chunk.map_err(Into::into)?;
        for event in decoder.feed(&bytes) {
            match event {
                StreamEvent::Delta(text) => {
                    full.push_str(&text);
                    on_delta(text);
                }
                StreamEvent::Done => break 'read,
                StreamEvent::Malformed(line) => {
                    logger::log(&format!("skipping malformed stream line: {line}"));
                }
            }
        }
    }
    Ok(full)
}
