//! Replayable view of a live audio stream
//!
//! A live session may fail before producing its first result, in which
//! case the next provider must hear the call from the beginning. A pump
//! task drains the caller's audio into a shared buffer that keeps every
//! chunk until the dispatcher commits to a provider (or the recording
//! exceeds its cap). Each new subscriber starts at the oldest retained
//! chunk. Only the newest subscriber receives audio; older ones end.
//!
//! The buffer lock is never held across an await, so a subscriber parked
//! on a slow source cannot block `commit` or a new subscription.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::types::{AudioFormat, AudioStream, ChunkStream};

struct FeedState {
    chunks: VecDeque<Bytes>,
    /// Sequence number of `chunks[0]`
    first_seq: usize,
    replay_bytes: usize,
    recording: bool,
    overflowed: bool,
    ended: bool,
    generation: u64,
}

impl FeedState {
    fn push(&mut self, chunk: Bytes, max_replay_bytes: usize) {
        if self.recording {
            self.replay_bytes += chunk.len();
            if self.replay_bytes > max_replay_bytes {
                self.recording = false;
                self.overflowed = true;
            }
        }
        self.chunks.push_back(chunk);
    }

    fn next_seq(&self) -> usize {
        self.first_seq + self.chunks.len()
    }

    /// Chunk at `cursor`, forgetting older chunks once replay is off
    fn take(&mut self, cursor: usize) -> Option<Bytes> {
        let chunk = self.chunks.get(cursor.checked_sub(self.first_seq)?).cloned()?;
        if !self.recording {
            while self.first_seq <= cursor && self.chunks.pop_front().is_some() {
                self.first_seq += 1;
            }
        }
        Some(chunk)
    }
}

struct Shared {
    state: Mutex<FeedState>,
    changed: watch::Sender<u64>,
}

impl Shared {
    fn notify(&self) {
        self.changed.send_modify(|version| *version = version.wrapping_add(1));
    }
}

pub(crate) struct LiveFeed {
    shared: Arc<Shared>,
    pump: JoinHandle<()>,
    format: AudioFormat,
    sample_rate: Option<u32>,
}

impl LiveFeed {
    /// Start draining `stream`; must be called inside a Tokio runtime
    pub(crate) fn new(stream: AudioStream, max_replay_bytes: usize) -> Self {
        let (format, sample_rate, chunks) = stream.into_parts();
        let (changed, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            state: Mutex::new(FeedState {
                chunks: VecDeque::new(),
                first_seq: 0,
                replay_bytes: 0,
                recording: true,
                overflowed: false,
                ended: false,
                generation: 0,
            }),
            changed,
        });
        let pump = tokio::spawn(pump(chunks, Arc::clone(&shared), max_replay_bytes));
        Self {
            shared,
            pump,
            format,
            sample_rate,
        }
    }

    /// Start a new subscriber, ending any earlier one
    ///
    /// Returns `None` when audio already consumed can no longer be replayed.
    pub(crate) fn subscribe(&self) -> Option<AudioStream> {
        let (generation, start) = {
            let mut state = self.shared.state.lock();
            if state.overflowed {
                return None;
            }
            state.generation += 1;
            (state.generation, state.first_seq)
        };
        // Wakes the previous subscriber so it sees the new generation
        self.shared.notify();

        let changed = self.shared.changed.subscribe();
        let chunks = futures::stream::unfold(
            (Arc::clone(&self.shared), start, changed),
            move |(shared, cursor, mut changed)| async move {
                loop {
                    changed.mark_unchanged();
                    let chunk = {
                        let mut state = shared.state.lock();
                        if state.generation != generation {
                            return None;
                        }
                        if state.ended && cursor >= state.next_seq() {
                            return None;
                        }
                        state.take(cursor)
                    };
                    if let Some(chunk) = chunk {
                        return Some((chunk, (shared, cursor + 1, changed)));
                    }
                    if changed.changed().await.is_err() {
                        return None;
                    }
                }
            },
        );

        let mut stream = AudioStream::new(self.format, chunks);
        if let Some(rate) = self.sample_rate {
            stream = stream.with_sample_rate(rate);
        }
        Some(stream)
    }

    /// Stop recording; no further fallback will happen
    pub(crate) fn commit(&self) {
        self.shared.state.lock().recording = false;
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.pump.abort();
        self.shared.state.lock().ended = true;
        self.shared.notify();
    }
}

async fn pump(mut source: ChunkStream, shared: Arc<Shared>, max_replay_bytes: usize) {
    while let Some(chunk) = source.next().await {
        shared.state.lock().push(chunk, max_replay_bytes);
        shared.notify();
    }
    shared.state.lock().ended = true;
    shared.notify();
}
