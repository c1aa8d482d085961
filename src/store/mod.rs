mod effect;
mod runtime;

pub use effect::{Effect, EffectFuture};
pub use runtime::{Dispatcher, StoreHandle};

use std::fmt::Debug;

/// A component's state machine. All mutation happens in `reduce`, which the
/// store calls for one action at a time.
pub trait Reducer {
    type Action: Clone + Debug + Send + 'static;

    type State: Clone + Send + Sync + 'static;

    type Environment: Send + Sync + 'static;

    fn reduce(
        action: Self::Action,
        state: &mut Self::State,
        environment: &Self::Environment,
    ) -> Effect<Self::Action>;

    fn initial_action() -> Option<Self::Action> {
        None
    }
}
