use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{Effect, Reducer};

enum Message<A> {
    Action(A),
    Shutdown,
}

/// Sends actions into a store from anywhere, e.g. from handler bundles
pub type Dispatcher<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Owner side of a running store. Dropping the handle stops the store task
/// and every timer it started.
pub struct StoreHandle<R: Reducer> {
    sender: flume::Sender<Message<R::Action>>,
    state: watch::Receiver<R::State>,
    task: Option<JoinHandle<()>>,
}

impl<R: Reducer + 'static> StoreHandle<R> {
    /// Spawns the store loop on the current tokio runtime
    pub fn spawn(state: R::State, environment: R::Environment) -> Self {
        let (sender, receiver) = flume::unbounded();
        let (publisher, subscriber) = watch::channel(state.clone());
        if let Some(action) = R::initial_action() {
            let _ = sender.send(Message::Action(action));
        }
        let task = tokio::spawn(run::<R>(
            state,
            Arc::new(environment),
            receiver,
            sender.clone(),
            publisher,
        ));
        Self {
            sender,
            state: subscriber,
            task: Some(task),
        }
    }

    pub fn send(&self, action: R::Action) {
        if self.sender.send(Message::Action(action)).is_err() {
            log::warn!("store is not running, dropping action");
        }
    }

    pub fn dispatcher(&self) -> Dispatcher<R::Action> {
        let sender = self.sender.clone();
        Arc::new(move |action| {
            let _ = sender.send(Message::Action(action));
        })
    }

    pub fn state(&self) -> R::State {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<R::State> {
        self.state.clone()
    }

    /// Resolves with the first published state matching `predicate`
    pub async fn wait_until(&self, mut predicate: impl FnMut(&R::State) -> bool) -> R::State {
        let mut receiver = self.state.clone();
        loop {
            {
                let current = receiver.borrow_and_update();
                if predicate(&current) {
                    return current.clone();
                }
            }
            if receiver.changed().await.is_err() {
                return receiver.borrow().clone();
            }
        }
    }

    pub async fn shutdown(mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<R: Reducer> Drop for StoreHandle<R> {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.sender.send(Message::Shutdown);
        }
    }
}

async fn run<R: Reducer + 'static>(
    mut state: R::State,
    environment: Arc<R::Environment>,
    receiver: flume::Receiver<Message<R::Action>>,
    sender: flume::Sender<Message<R::Action>>,
    publisher: watch::Sender<R::State>,
) {
    let mut tasks: HashMap<String, JoinHandle<()>> = HashMap::new();
    while let Ok(message) = receiver.recv_async().await {
        let Message::Action(action) = message else {
            break;
        };
        let effect = R::reduce(action, &mut state, &environment);
        publisher.send_replace(state.clone());
        execute(effect, &sender, &mut tasks);
    }
    for (id, task) in tasks.drain() {
        log::trace!("stopping {id}");
        task.abort();
    }
}

fn execute<A: Clone + Send + 'static>(
    effect: Effect<A>,
    sender: &flume::Sender<Message<A>>,
    tasks: &mut HashMap<String, JoinHandle<()>>,
) {
    for effect in effect.into_vec() {
        match effect {
            Effect::None | Effect::Multiple(_) => (),
            Effect::Action(action) => {
                let _ = sender.send(Message::Action(action));
            }
            Effect::Future(future) => {
                let sender = sender.clone();
                tokio::spawn(async move {
                    if let Some(action) = future.await {
                        let _ = sender.send(Message::Action(action));
                    }
                });
            }
            Effect::Task { id, future } => {
                let sender = sender.clone();
                let handle = tokio::spawn(async move {
                    if let Some(action) = future.await {
                        let _ = sender.send(Message::Action(action));
                    }
                });
                if let Some(previous) = tasks.insert(id, handle) {
                    previous.abort();
                }
            }
            Effect::Timer {
                interval,
                action,
                id,
            } => {
                let sender = sender.clone();
                let handle = tokio::spawn(async move {
                    let mut ticks = tokio::time::interval_at(Instant::now() + interval, interval);
                    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticks.tick().await;
                        if sender.send(Message::Action(action.clone())).is_err() {
                            break;
                        }
                    }
                });
                if let Some(previous) = tasks.insert(id, handle) {
                    previous.abort();
                }
            }
            Effect::Cancel(id) => {
                if let Some(task) = tasks.remove(&id) {
                    task.abort();
                }
            }
        }
    }
}
