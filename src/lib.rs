//! Revision-tracking reactive values and composable async channels.
//!
//! The [`reactor`] module tracks reads and writes of observable values and
//! re-runs registered reactions when their transitive inputs change. The
//! [`pipe`] module canonicalizes iterators, futures, and streams into
//! multi-reader channels with replayable history and transform combinators.

pub mod macros;
pub mod pipe;
pub mod reactor;

pub use pipe::channels::{
	join, latest, latest2, latest_named, periodic, repeat, state, State,
};
pub use pipe::queue::{queue, Queue};
pub use pipe::{Channel, ChannelError, Reader, Writable, REPLAY_ALL};
pub use reactor::atom::Atom;
pub use reactor::collections::{TrackedMap, TrackedSet, TrackedVec};
pub use reactor::computed::{ComputeFn, Computed};
pub use reactor::memo::Memo;
pub use reactor::reaction::{Reaction, UpdateFn};
pub use reactor::reactor::Reactor;
pub use reactor::reuse::{reuse, Hashed};
pub use reactor::revision::Revision;
pub use reactor::{batch, in_batch, AccessSet, ChangeSet, React, Track};
