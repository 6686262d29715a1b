// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The data unit that travels down a strategy chain.
//!
//! A frame is owned by exactly one chain traversal at a time: strategies
//! receive it by value and hand it back. That ownership is what makes the
//! component reads lock-free. Out-of-band access from another thread (debug
//! inspection, side channels) goes through [`SharedFrame`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::component::{Component, ComponentMap, ComponentTag};

pub type FrameId = u64;

/// Process-wide id source. Ids are never reused.
static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// A frame shared for out-of-band structural access.
pub type SharedFrame = Arc<Mutex<Frame>>;

pub struct Frame {
    id: FrameId,
    components: ComponentMap,
    /// Type names of the attached components, for diagnostics only.
    tags: Vec<ComponentTag>,
    disposed: bool,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
            components: ComponentMap::new(),
            tags: Vec::new(),
            disposed: false,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Attach a component, replacing any existing one of the same type.
    /// Ignored once the frame has been disposed.
    pub fn add<C: Component>(&mut self, component: C) {
        if self.disposed {
            tracing::warn!(
                "[Frame {}] add({}) after dispose ignored",
                self.id,
                ComponentTag::of::<C>()
            );
            return;
        }
        if self.components.insert(component).is_none() {
            self.tags.push(ComponentTag::of::<C>());
        }
    }

    /// Builder-style [`Frame::add`].
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.add(component);
        self
    }

    pub fn get<C: Component>(&self) -> Option<&C> {
        self.components.get::<C>()
    }

    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components.get_mut::<C>()
    }

    pub fn has<C: Component>(&self) -> bool {
        self.components.contains::<C>()
    }

    pub fn remove<C: Component>(&mut self) -> Option<C> {
        let removed = self.components.remove::<C>();
        if removed.is_some() {
            let tag = ComponentTag::of::<C>();
            self.tags.retain(|t| *t != tag);
        }
        removed
    }

    /// Number of attached components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component_tags(&self) -> &[ComponentTag] {
        &self.tags
    }

    /// Drop every component. Idempotent and irreversible.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.components.clear();
        self.tags.clear();
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn into_shared(self) -> SharedFrame {
        Arc::new(Mutex::new(self))
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("components", &self.tags)
            .field("disposed", &self.disposed)
            .finish()
    }
}
