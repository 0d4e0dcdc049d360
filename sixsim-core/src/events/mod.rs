//! ## sixsim-core::events
//! **Scheduled events and their ordering key**
//!
//! An event is an action bound to a virtual time. The action type is left
//! generic so this crate stays independent of the engine that invokes it.

use std::borrow::Cow;
use std::fmt;

use crate::{Asn, NodeId};

pub mod queue;

pub use queue::EventQueue;

/// Owner of a tag. `Engine` is reserved for sentinels injected by the engine
/// itself (pause, end of simulation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagScope {
    Engine,
    Node(NodeId),
    Global,
}

/// Identity of a pending event. At most one event per tag is pending at any
/// time, so scheduling under an existing tag replaces the earlier event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    scope: TagScope,
    name: Cow<'static, str>,
}

impl Tag {
    /// Reserved engine tag. Collaborators should not construct these.
    pub const fn engine(name: &'static str) -> Self {
        Self {
            scope: TagScope::Engine,
            name: Cow::Borrowed(name),
        }
    }

    pub fn node(id: NodeId, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            scope: TagScope::Node(id),
            name: name.into(),
        }
    }

    pub fn global(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            scope: TagScope::Global,
            name: name.into(),
        }
    }

    pub fn scope(&self) -> TagScope {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_reserved(&self) -> bool {
        self.scope == TagScope::Engine
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            TagScope::Engine => write!(f, "engine/{}", self.name),
            TagScope::Node(id) => write!(f, "node{}/{}", id, self.name),
            TagScope::Global => write!(f, "{}", self.name),
        }
    }
}

/// Ordering key of the queue. Field order matters: the derived `Ord` compares
/// time first, then priority, then insertion sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub time: Asn,
    pub priority: i32,
    pub sequence: u64,
}

/// A pending event.
pub struct Event<A> {
    key: EventKey,
    tag: Option<Tag>,
    action: A,
}

impl<A> Event<A> {
    pub fn key(&self) -> EventKey {
        self.key
    }

    pub fn time(&self) -> Asn {
        self.key.time
    }

    pub fn priority(&self) -> i32 {
        self.key.priority
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    /// Splits the event into its tag and action, consuming it.
    pub fn into_parts(self) -> (Option<Tag>, A) {
        (self.tag, self.action)
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("key", &self.key)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}
