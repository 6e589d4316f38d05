mod debounce;
mod join;
mod latest;
mod map;
mod periodic;
mod reduce;
mod repeat;
mod state;

pub use debounce::debounce;
pub use join::join;
pub use latest::{latest, latest2, latest_named};
pub use map::{dedup, filter, filter_map, map};
pub use periodic::periodic;
pub use reduce::{append, fold};
pub use repeat::repeat;
pub use state::{state, State};
