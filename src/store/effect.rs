use std::fmt::Debug;
use std::pin::Pin;
use std::time::Duration;

use futures_util::Future;

pub type EffectFuture<A> = Pin<Box<dyn Future<Output = Option<A>> + Send + 'static>>;

/// Follow-up work returned by a reducer. The store executes it after the
/// new state has been published.
pub enum Effect<A> {
    None,
    Action(A),
    Future(EffectFuture<A>),
    /// A future that can be aborted through `Cancel` with the same id.
    /// Spawning a task with a running id aborts the older one.
    Task {
        id: String,
        future: EffectFuture<A>,
    },
    /// Repeatedly sends `action` every `interval` until cancelled.
    /// Starting a timer with an id that is already running replaces it.
    Timer {
        interval: Duration,
        action: A,
        id: String,
    },
    /// Stops the timer or task with this id
    Cancel(String),
    Multiple(Vec<Effect<A>>),
}

impl<A> Effect<A> {
    pub const NONE: Self = Effect::None;

    pub fn action(action: A) -> Self {
        Effect::Action(action)
    }

    pub fn future<T, F, M>(future: F, mapper: M) -> Self
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
        M: FnOnce(T) -> A + Send + 'static,
        A: Send + 'static,
    {
        Effect::Future(Box::pin(async move { Some(mapper(future.await)) }))
    }

    pub fn cancellable<T, F, M>(future: F, mapper: M, id: &str) -> Self
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
        M: FnOnce(T) -> A + Send + 'static,
        A: Send + 'static,
    {
        Effect::Task {
            id: id.to_string(),
            future: Box::pin(async move { Some(mapper(future.await)) }),
        }
    }

    pub fn timer(interval: Duration, action: A, id: &str) -> Self {
        Effect::Timer {
            interval,
            action,
            id: id.to_string(),
        }
    }

    pub fn cancel(id: &str) -> Self {
        Effect::Cancel(id.to_string())
    }

    pub fn merge2(a: Effect<A>, b: Effect<A>) -> Self {
        Self::merge(vec![a, b])
    }

    pub fn merge3(a: Effect<A>, b: Effect<A>, c: Effect<A>) -> Self {
        Self::merge(vec![a, b, c])
    }

    pub fn merge(effects: Vec<Effect<A>>) -> Self {
        let mut effects: Vec<_> = effects.into_iter().filter(|e| !e.is_none()).collect();
        match effects.len() {
            0 => Effect::None,
            1 => effects.remove(0),
            _ => Effect::Multiple(effects),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Effect::None)
    }

    /// Flattens nested `Multiple` effects into a plain list, preserving order
    pub fn into_vec(self) -> Vec<Effect<A>> {
        let mut output = Vec::new();
        let mut stack = vec![self];
        while let Some(effect) = stack.pop() {
            match effect {
                Effect::None => (),
                Effect::Multiple(inner) => stack.extend(inner.into_iter().rev()),
                other => output.push(other),
            }
        }
        output
    }
}

impl<A: Debug> Debug for Effect<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Action(action) => f.debug_tuple("Action").field(action).finish(),
            Self::Future(_) => write!(f, "Future"),
            Self::Task { id, .. } => f.debug_struct("Task").field("id", id).finish(),
            Self::Timer {
                interval,
                action,
                id,
            } => f
                .debug_struct("Timer")
                .field("interval", interval)
                .field("action", action)
                .field("id", id)
                .finish(),
            Self::Cancel(id) => f.debug_tuple("Cancel").field(id).finish(),
            Self::Multiple(effects) => f.debug_list().entries(effects).finish(),
        }
    }
}

#[cfg(test)]
impl<A> Effect<A> {
    pub fn future_count(&self) -> usize {
        match self {
            Effect::Future(_) | Effect::Task { .. } => 1,
            Effect::Multiple(effects) => effects.iter().map(Effect::future_count).sum(),
            _ => 0,
        }
    }

    pub fn timer_ids(&self) -> Vec<String> {
        match self {
            Effect::Timer { id, .. } => vec![id.clone()],
            Effect::Multiple(effects) => effects.iter().flat_map(Effect::timer_ids).collect(),
            _ => Vec::new(),
        }
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        match self {
            Effect::Cancel(id) => vec![id.clone()],
            Effect::Multiple(effects) => effects.iter().flat_map(Effect::cancelled_ids).collect(),
            _ => Vec::new(),
        }
    }

    /// Awaits every future and returns the produced actions together with
    /// the immediate ones, in effect order. Timers are ignored.
    pub async fn resolve(self) -> Vec<A> {
        let mut actions = Vec::new();
        for effect in self.into_vec() {
            match effect {
                Effect::Action(action) => actions.push(action),
                Effect::Future(future) | Effect::Task { future, .. } => {
                    actions.extend(future.await)
                }
                _ => (),
            }
        }
        actions
    }
}
