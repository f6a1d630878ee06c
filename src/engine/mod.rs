//! Polling engine: attach/detach lifecycle, wait-and-dispatch loop and the
//! recording sub-mode.
//!
//! One mutex covers the backend, the binding table, edge state and the
//! attached device arena. The polling thread takes it once per wake-up,
//! collects the resulting notifications and emits them after releasing it,
//! so observers and recorders may call back into the engine (including
//! [`InputEngine::detach`]) from their own callbacks.

mod observers;
mod runner;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::backend::{CooperativeLevel, DeviceBackend, WindowHandle};
use crate::bindings::{Binding, BindingTable};
use crate::catalog::DeviceCatalog;
use crate::config::EngineConfig;
use crate::edge::InputState;
use crate::error::{Error, Result};
use crate::handoff::HandoffQueue;
use crate::identifier::InputIdentifier;

pub use observers::ObserverId;

use observers::Observers;
use runner::Core;

/// Lifecycle state of an [`InputEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EngineState {
    Detached = 0,
    Attaching = 1,
    Running = 2,
    Detaching = 3,
}

impl EngineState {
    #[inline(always)]
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Attaching,
            2 => EngineState::Running,
            3 => EngineState::Detaching,
            _ => EngineState::Detached,
        }
    }
}

/// Notification that a bound command changed state.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStateChanged<C> {
    pub command: C,
    pub state: InputState,
    /// Axis position in percent, present for [`InputState::Axis`].
    pub axis_percent: Option<f64>,
}

impl<C> CommandStateChanged<C> {
    pub fn new(command: C, state: InputState) -> Self {
        Self {
            command,
            axis_percent: state.axis_percent(),
            state,
        }
    }
}

type Recorder = Box<dyn FnMut(InputIdentifier) + Send + 'static>;

/// State shared with the polling thread.
struct Shared<B, C> {
    core: Mutex<Core<B, C>>,
    state: AtomicU8,
    /// Set by a detach that arrived while attaching.
    detach_requested: AtomicBool,
    recording: AtomicBool,
    observers: Observers<C>,
    catalog: DeviceCatalog,
    config: EngineConfig,
}

impl<B, C> Shared<B, C> {
    #[inline(always)]
    fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[inline(always)]
    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn transition(&self, from: EngineState, to: EngineState) -> Result<()> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| Error::InvalidState {
                expected: from,
                actual: EngineState::from_u8(actual),
            })
    }
}

/// Threads and signals of one attach session.
struct Session {
    running: Arc<AtomicBool>,
    stop: Sender<()>,
    poller: JoinHandle<()>,
    delivery: Option<(Arc<HandoffQueue<InputIdentifier>>, JoinHandle<()>)>,
}

/// Input binding and dispatch engine.
///
/// Share it through an `Arc` when callbacks need to reach the engine.
/// Dropping the engine detaches it.
pub struct InputEngine<B: DeviceBackend, C: Clone + Send + 'static> {
    shared: Arc<Shared<B, C>>,
    session: Mutex<Option<Session>>,
}

impl<B: DeviceBackend, C: Clone + Send + 'static> InputEngine<B, C> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core::new(backend)),
                state: AtomicU8::new(EngineState::Detached as u8),
                detach_requested: AtomicBool::new(false),
                recording: AtomicBool::new(false),
                observers: Observers::new(),
                catalog: DeviceCatalog::new(),
                config: config.validated(),
            }),
            session: Mutex::new(None),
        }
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Whether the engine is running in recording mode.
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::Acquire)
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Devices attached by the current session.
    #[inline]
    pub fn catalog(&self) -> &DeviceCatalog {
        &self.shared.catalog
    }

    /// Attaches every device in background, shared mode.
    pub fn attach(&self) -> Result<()> {
        self.start(CooperativeLevel::BackgroundShared, None)
    }

    /// Attaches every device in foreground, exclusive mode for `window`.
    pub fn attach_to_window(&self, window: WindowHandle) -> Result<()> {
        if window.is_null() {
            return Err(Error::Argument("window handle is null".to_string()));
        }
        self.start(CooperativeLevel::ForegroundExclusive(window), None)
    }

    /// Attaches in recording mode. Each recorded gesture is passed to
    /// `recorder` on a dedicated delivery thread, in the order performed.
    pub fn attach_recorder<F>(&self, recorder: F) -> Result<()>
    where
        F: FnMut(InputIdentifier) + Send + 'static,
    {
        self.start(CooperativeLevel::BackgroundShared, Some(Box::new(recorder)))
    }

    pub fn attach_recorder_to_window<F>(&self, window: WindowHandle, recorder: F) -> Result<()>
    where
        F: FnMut(InputIdentifier) + Send + 'static,
    {
        if window.is_null() {
            return Err(Error::Argument("window handle is null".to_string()));
        }
        self.start(
            CooperativeLevel::ForegroundExclusive(window),
            Some(Box::new(recorder)),
        )
    }

    /// Replaces all bindings. See [`BindingTable::set_bindings`].
    pub fn set_bindings<I>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = Binding<C>>,
    {
        self.shared.core.lock().bindings.set_bindings(bindings)
    }

    /// Snapshot of the current binding table.
    pub fn bindings(&self) -> BindingTable<C> {
        self.shared.core.lock().bindings.clone()
    }

    /// Registers a callback invoked on the polling thread for every
    /// command state change.
    pub fn add_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&CommandStateChanged<C>) + Send + Sync + 'static,
    {
        self.shared.observers.add(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.shared.observers.remove(id)
    }

    /// Channel receiving every command state change. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> Receiver<CommandStateChanged<C>> {
        self.shared.observers.subscribe()
    }

    fn start(&self, level: CooperativeLevel, recorder: Option<Recorder>) -> Result<()> {
        self.shared
            .transition(EngineState::Detached, EngineState::Attaching)?;
        self.shared.detach_requested.store(false, Ordering::SeqCst);

        match self.start_session(level, recorder) {
            Ok(session) => {
                *self.session.lock() = Some(session);
                self.shared.set_state(EngineState::Running);
                info!(
                    "Engine attached ({} devices, recording: {})",
                    self.shared.catalog.len(),
                    self.is_recording()
                );
                if self.shared.detach_requested.swap(false, Ordering::SeqCst) {
                    debug!("Detach requested while attaching");
                    self.detach()?;
                }
                Ok(())
            }
            Err(e) => {
                self.shared.recording.store(false, Ordering::Release);
                self.shared.set_state(EngineState::Detached);
                Err(e)
            }
        }
    }

    fn start_session(&self, level: CooperativeLevel, recorder: Option<Recorder>) -> Result<Session> {
        let config = &self.shared.config;

        let wakes = {
            let mut core = self.shared.core.lock();
            let wakes = core.acquire_all(level, config.buffer_size, &self.shared.catalog)?;
            core.bindings.rebuild();
            core.edges.reset();
            wakes
        };

        let delivery = match recorder {
            Some(recorder) => match spawn_delivery(&config.delivery_thread_name, recorder) {
                Ok(delivery) => Some(delivery),
                Err(e) => {
                    self.release_devices();
                    return Err(e);
                }
            },
            None => None,
        };

        if let Some((queue, _)) = &delivery {
            self.shared.core.lock().recorder = Some(Arc::clone(queue));
            self.shared.recording.store(true, Ordering::Release);
            info!("Recording started");
        }

        let running = Arc::new(AtomicBool::new(true));
        let (stop, stop_rx) = crossbeam_channel::bounded(1);

        let shared = Arc::clone(&self.shared);
        let poller_running = Arc::clone(&running);
        let spawned = thread::Builder::new()
            .name(config.polling_thread_name.clone())
            .spawn(move || runner::run(shared, poller_running, stop_rx, wakes));

        let poller = match spawned {
            Ok(poller) => poller,
            Err(source) => {
                if let Some((queue, handle)) = delivery {
                    queue.cancel();
                    let _ = handle.join();
                }
                self.release_devices();
                return Err(Error::Spawn {
                    name: config.polling_thread_name.clone(),
                    source,
                });
            }
        };

        Ok(Session {
            running,
            stop,
            poller,
            delivery,
        })
    }

    /// Stops polling and releases every device.
    ///
    /// A no-op when detached or already detaching. A call made while the
    /// engine is attaching is carried out as soon as the attach completes.
    /// Safe to call from an observer or a recorder callback: the calling
    /// thread is never joined.
    pub fn detach(&self) -> Result<()> {
        loop {
            match self
                .shared
                .transition(EngineState::Running, EngineState::Detaching)
            {
                Ok(()) => break,
                Err(Error::InvalidState {
                    actual: EngineState::Attaching,
                    ..
                }) => {
                    self.shared.detach_requested.store(true, Ordering::SeqCst);
                    // Attach has not published Running yet, so it will see the request.
                    if self.state() != EngineState::Running {
                        debug!("Detach deferred until attach completes");
                        return Ok(());
                    }
                }
                Err(_) => {
                    debug!("Detach ignored, engine is {:?}", self.state());
                    return Ok(());
                }
            }
        }

        let Some(session) = self.session.lock().take() else {
            self.shared.set_state(EngineState::Detached);
            return Ok(());
        };
        let current = thread::current().id();

        session.running.store(false, Ordering::Release);
        let _ = session.stop.try_send(());
        join_unless_current(session.poller, current, "polling");

        if let Some((queue, handle)) = session.delivery {
            queue.cancel();
            join_unless_current(handle, current, "delivery");
        }

        self.release_devices();
        self.shared.set_state(EngineState::Detached);
        info!("Engine detached");
        Ok(())
    }

    fn release_devices(&self) {
        let mut core = self.shared.core.lock();
        core.release_all();
        core.bindings.clear_partitions();
        core.edges.reset();
        core.recorder = None;
        drop(core);

        self.shared.catalog.clear();
        self.shared.recording.store(false, Ordering::Release);
    }
}

impl<B: DeviceBackend, C: Clone + Send + 'static> Drop for InputEngine<B, C> {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

fn join_unless_current(handle: JoinHandle<()>, current: ThreadId, what: &str) {
    if handle.thread().id() == current {
        debug!("Detach called on the {} thread, not joining it", what);
        return;
    }
    if handle.join().is_err() {
        warn!("The {} thread panicked", what);
    }
}

fn spawn_delivery(
    name: &str,
    mut recorder: Recorder,
) -> Result<(Arc<HandoffQueue<InputIdentifier>>, JoinHandle<()>)> {
    let queue = Arc::new(HandoffQueue::new());
    let consumer = Arc::clone(&queue);

    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            while let Some(id) = consumer.try_dequeue() {
                debug!("Delivering recorded input {}", id);
                recorder(id);
            }
        })
        .map_err(|source| Error::Spawn {
            name: name.to_string(),
            source,
        })?;

    Ok((queue, handle))
}
