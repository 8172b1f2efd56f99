//! A single Hare consensus instance.
//!
//! [`ConsensusProcess`] is the handle other components hold. The protocol
//! itself runs on a dedicated thread that owns the [`RoundState`] and reacts
//! to three event sources: inbound messages, the round clock and
//! cancellation. Rounds are split in two halves. Round state rolls over at
//! the boundary and our own message goes out at the midpoint, so a peer
//! whose clock runs slightly ahead or behind still receives it within the
//! same round.

mod clock;
mod round;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{at, bounded, select, unbounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::config::Config;
use crate::message::{HareMessage, InstanceId};
use crate::network::NetworkService;
use crate::oracle::Rolacle;
use crate::set::Set;
use crate::signing::{PubKey, Signing};
use crate::{Error, Result};

use self::clock::RoundClock;
use self::round::RoundState;

/// The agreed set of a terminated instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationOutput {
    pub instance_id: InstanceId,
    pub set: Set,
}

/// Called once with the instance id when an instance has stopped.
pub type FinishHook = Box<dyn FnOnce(InstanceId) + Send>;

pub struct ConsensusProcess {
    instance_id: InstanceId,
    pub_key: PubKey,
    round_duration: Duration,
    /// Taken by the event loop on start.
    state: Mutex<Option<RoundState>>,
    closed: AtomicBool,
    inbox_tx: Sender<HareMessage>,
    inbox_rx: Receiver<HareMessage>,
    /// Dropped to cancel the event loop.
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
    /// `None` once the instance has stopped.
    finish_hooks: Mutex<Option<Vec<FinishHook>>>,
    outputs: Sender<TerminationOutput>,
}

impl ConsensusProcess {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Config,
        instance_id: InstanceId,
        set: Set,
        oracle: Arc<dyn Rolacle>,
        signing: Arc<dyn Signing>,
        network: Arc<dyn NetworkService>,
        outputs: Sender<TerminationOutput>,
    ) -> Arc<Self> {
        let round_duration = cfg.round_duration();
        let state = RoundState::new(cfg, instance_id, set, oracle, signing, network);
        let (inbox_tx, inbox_rx) = unbounded();
        let (close_tx, close_rx) = bounded(0);
        let (done_tx, done_rx) = bounded(1);

        Arc::new(Self {
            instance_id,
            pub_key: state.pub_key.clone(),
            round_duration,
            state: Mutex::new(Some(state)),
            closed: AtomicBool::new(false),
            inbox_tx,
            inbox_rx,
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
            finish_hooks: Mutex::new(Some(Vec::new())),
            outputs,
        })
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn pub_key(&self) -> &PubKey {
        &self.pub_key
    }

    /// Launches the event loop. Fails if the instance was started or closed before.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut slot = lock(&self.state);
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::InstanceClosed);
        }
        match slot.as_ref() {
            Some(state) => state.cfg.validate()?,
            None => return Err(Error::AlreadyStarted),
        }

        if let Some(state) = slot.take() {
            let process = Arc::clone(self);
            let spawned = thread::Builder::new()
                .name(format!("hare-{}", self.instance_id))
                .spawn(move || process.event_loop(state));
            if let Err(err) = spawned {
                drop(slot);
                self.abort_start();
                return Err(err.into());
            }
            info!("[HARE-{}] started by {}", self.instance_id, self.pub_key.short());
        }
        Ok(())
    }

    // The state went down with the thread that could not be spawned, so
    // nothing will ever run the loop. Stop here instead.
    fn abort_start(&self) {
        warn!("[HARE-{}] event loop could not be spawned", self.instance_id);
        self.closed.store(true, Ordering::SeqCst);
        drop(lock(&self.close_tx).take());
        self.signal_done();
    }

    /// Registers `hook` to run once the instance has stopped, or runs it
    /// right away if it already has.
    pub fn on_finish(&self, hook: FinishHook) {
        let mut hooks = lock(&self.finish_hooks);
        match hooks.as_mut() {
            Some(hooks) => hooks.push(hook),
            None => {
                drop(hooks);
                hook(self.instance_id);
            }
        }
    }

    /// Hands an inbound message to the event loop. Returns `false` once the
    /// instance is closed.
    pub fn deliver(&self, msg: HareMessage) -> bool {
        if self.is_closed() {
            return false;
        }
        self.inbox_tx.send(msg).is_ok()
    }

    /// Requests cancellation. Safe to call any number of times, from any thread.
    pub fn close(&self) {
        let never_started = {
            let mut slot = lock(&self.state);
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            slot.take().is_some()
        };

        debug!("[HARE-{}] close requested", self.instance_id);
        drop(lock(&self.close_tx).take());

        if never_started {
            self.signal_done();
        }
    }

    /// Yields a single `()` once the instance has fully stopped, either by
    /// termination or cancellation. Every returned receiver shares that one
    /// signal, after which the channel reports disconnection.
    pub fn close_channel(&self) -> Receiver<()> {
        self.done_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn event_loop(self: Arc<Self>, mut state: RoundState) {
        let inbox = self.inbox_rx.clone();
        let cancel = self.close_rx.clone();
        let mut clock = RoundClock::new(Instant::now(), self.round_duration);

        loop {
            let half_round_over = at(clock.next_deadline());
            select! {
                recv(cancel) -> _ => {
                    info!("[HARE-{}] cancelled in round {}", self.instance_id, state.k);
                    break;
                }
                recv(inbox) -> msg => {
                    if let Ok(msg) = msg {
                        if let Err(err) = state.handle_message(msg) {
                            warn!("[HARE-{}] dropping message: {}", self.instance_id, err);
                        }
                    }
                }
                recv(half_round_over) -> _ => {
                    if clock.tick() {
                        if let Err(err) = state.send_round_messages() {
                            warn!("[HARE-{}] failed to send in round {}: {}", self.instance_id, state.k, err);
                        }
                    } else {
                        state.advance();
                    }
                }
            }

            if let Some(set) = state.take_result() {
                info!(
                    "[HARE-{}] terminated after {} iterations with {:?}",
                    self.instance_id,
                    state.iteration() + 1,
                    set
                );
                let output = TerminationOutput {
                    instance_id: self.instance_id,
                    set,
                };
                if self.outputs.send(output).is_err() {
                    warn!("[HARE-{}] nobody listens for the output", self.instance_id);
                }
                break;
            }
        }

        self.closed.store(true, Ordering::SeqCst);
        self.signal_done();
    }

    fn signal_done(&self) {
        let hooks = lock(&self.finish_hooks).take().unwrap_or_default();
        for hook in hooks {
            hook(self.instance_id);
        }
        if let Some(done) = lock(&self.done_tx).take() {
            let _ = done.send(());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
