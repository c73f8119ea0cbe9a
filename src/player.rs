// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, info, span, warn, Level, Span};

use crate::error::EngineError;
use crate::metronome::{beats_to_cover, MetronomeClickTrack, TimeSignature};
use crate::sequence::{total_beats, NoteEvent, RenderedBuffer, Tempo};
use crate::transport::PlaybackTransport;

/// How many session events are kept for a slow reader before new ones are dropped.
const EVENT_BUFFER: usize = 64;

/// Where a call and response session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No worker exists.
    Idle,
    /// The worker is looping.
    Running,
    /// A stop was requested and the worker is finishing its current segment.
    Stopping,
}

/// The result of asking a session to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session was already running; nothing changed.
    AlreadyRunning,
}

/// The result of asking a session to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// No session was running; nothing changed.
    NotRunning,
}

/// Progress reports from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    /// The call of the given cycle (counted from zero) finished playing.
    CallPlayed { cycle: u64 },
    /// The response of the given cycle finished playing.
    ResponsePlayed { cycle: u64 },
    /// The worker exited after playing the given number of calls.
    Stopped { cycles: u64 },
    /// The worker hit an error and is exiting.
    Failed { reason: String },
}

struct Session {
    join: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

struct Inner {
    state: SessionState,
    session: Option<Session>,
}

impl Inner {
    /// Joins a worker that already exited on its own.
    fn reap(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        let finished = self
            .session
            .as_ref()
            .is_some_and(|session| session.join.is_finished());
        if !finished {
            return;
        }
        if let Some(session) = self.session.take() {
            if session.join.join().is_err() {
                error!("Call and response worker panicked");
            }
        }
        self.state = SessionState::Idle;
    }
}

/// Loops a call (the rendered lick) and a response (a metronome click track of the
/// same length) on a background worker until stopped.
///
/// Only one worker exists at a time. Stopping is cooperative: the stop flag is
/// checked between segments, so the segment that's playing when `stop` is called
/// always finishes first.
pub struct CallAndResponsePlayer {
    transport: PlaybackTransport,
    metronome: Arc<MetronomeClickTrack>,
    inner: Mutex<Inner>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    span: Span,
}

impl CallAndResponsePlayer {
    /// Creates an idle player.
    pub fn new(
        transport: PlaybackTransport,
        metronome: Arc<MetronomeClickTrack>,
    ) -> CallAndResponsePlayer {
        let (events_tx, events_rx) = crossbeam_channel::bounded(EVENT_BUFFER);
        CallAndResponsePlayer {
            transport,
            metronome,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                session: None,
            }),
            events_tx,
            events_rx,
            span: span!(Level::INFO, "call and response"),
        }
    }

    /// Returns a receiver for session events. Events are dropped when nobody reads
    /// them, and whatever is still unread when a new session starts is discarded.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        let mut inner = self.inner.lock();
        inner.reap();
        inner.state
    }

    /// Returns true while a worker is looping.
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Starts looping the events. Everything that can be checked up front is checked
    /// here, before the worker is spawned: the tempo, the event durations and the
    /// metronome clicks.
    pub fn start(
        &self,
        events: &[NoteEvent],
        bpm: f64,
        time_signature: &TimeSignature,
    ) -> Result<StartOutcome, EngineError> {
        let _enter = self.span.enter();

        let mut inner = self.inner.lock();
        inner.reap();
        if inner.state != SessionState::Idle {
            warn!(state = ?inner.state, "Call and response is already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let tempo = Tempo::new(bpm)?;
        if events.is_empty() {
            return Err(EngineError::EmptySequence);
        }
        for event in events {
            event.validate()?;
        }
        self.metronome.ensure_ready()?;

        let response_beats = beats_to_cover(total_beats(events)).max(1);
        let response = self.metronome.build(response_beats, tempo, time_signature)?;

        // Unread events belong to an earlier session.
        let stale = self.events_rx.try_iter().count();
        if stale > 0 {
            info!(stale, "Discarded unread session events");
        }

        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            transport: self.transport.clone(),
            events: events.to_vec(),
            tempo,
            response,
            stop: stop.clone(),
            events_tx: self.events_tx.clone(),
        };
        let parent = self.span.clone();
        let join = thread::Builder::new()
            .name("call-and-response".to_string())
            .spawn(move || {
                let _enter = parent.enter();
                worker.run();
            })
            .map_err(EngineError::Worker)?;

        info!(
            events = events.len(),
            tempo = %tempo,
            time_signature = %time_signature,
            response_beats,
            "Started call and response"
        );
        inner.session = Some(Session { join, stop });
        inner.state = SessionState::Running;
        Ok(StartOutcome::Started)
    }

    /// Stops the session and waits for the worker to exit. The segment currently
    /// playing finishes first.
    pub fn stop(&self) -> StopOutcome {
        let _enter = self.span.enter();

        let session = {
            let mut inner = self.inner.lock();
            inner.reap();
            if inner.state != SessionState::Running {
                return StopOutcome::NotRunning;
            }
            let Some(session) = inner.session.take() else {
                inner.state = SessionState::Idle;
                return StopOutcome::NotRunning;
            };
            inner.state = SessionState::Stopping;
            session
        };

        info!("Stopping call and response");
        session.stop.store(true, Ordering::Release);
        if session.join.join().is_err() {
            error!("Call and response worker panicked");
        }

        self.inner.lock().state = SessionState::Idle;
        info!("Call and response stopped");
        StopOutcome::Stopped
    }
}

impl Drop for CallAndResponsePlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread owns.
struct Worker {
    transport: PlaybackTransport,
    events: Vec<NoteEvent>,
    tempo: Tempo,
    response: RenderedBuffer,
    stop: Arc<AtomicBool>,
    events_tx: Sender<SessionEvent>,
}

impl Worker {
    fn run(self) {
        self.emit(SessionEvent::Started);

        let mut cycles = 0;
        let result = self.cycle(&mut cycles);
        if let Err(e) = result {
            error!(err = %e, cycles, "Call and response failed");
            self.emit(SessionEvent::Failed {
                reason: e.to_string(),
            });
        }

        info!(cycles, "Call and response worker exiting");
        self.emit(SessionEvent::Stopped { cycles });
    }

    /// Plays call, response, call, response, ... until the stop flag is seen.
    fn cycle(&self, cycles: &mut u64) -> Result<(), EngineError> {
        loop {
            if self.stopped() {
                return Ok(());
            }

            // Rendered every cycle so a key change shows up on the next call.
            let call = self.transport.render(&self.events, self.tempo)?;
            self.transport.play_rendered(&call)?;
            self.emit(SessionEvent::CallPlayed { cycle: *cycles });
            *cycles += 1;

            if self.stopped() {
                return Ok(());
            }

            self.transport.play_rendered(&self.response)?;
            self.emit(SessionEvent::ResponsePlayed {
                cycle: *cycles - 1,
            });
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn emit(&self, event: SessionEvent) {
        // Full or disconnected means nobody is listening.
        let _ = self.events_tx.try_send(event);
    }
}
