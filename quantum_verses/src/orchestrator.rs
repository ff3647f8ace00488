//! Verse orchestrator
//!
//! Owns the registry of verse factories and the single active instance. On
//! every selection change the outgoing instance is disposed completely
//! before the incoming factory runs; the two never share the mount.

use crate::config::Options;
use crate::equations::Equation;
use crate::error::{Result, VerseError};
use crate::lifecycle::{Animation, FrameTime, Instance, Mount};
use crate::route::{History, Route, VerseId};
use crate::stage::HostEvent;
use crate::verses::placeholder;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Builds an animation on a mount from its options
pub type Factory = Box<dyn Fn(&mut Mount, &Options) -> Result<Box<dyn Animation>>>;

pub struct VerseEntry {
    pub id: VerseId,
    pub title: &'static str,
    pub equations: &'static [Equation],
    pub variables: &'static [(&'static str, &'static str)],
    factory: Factory,
}

impl VerseEntry {
    pub fn new<F>(id: VerseId, title: &'static str, factory: F) -> Self
    where
        F: Fn(&mut Mount, &Options) -> Result<Box<dyn Animation>> + 'static,
    {
        Self {
            id,
            title,
            equations: &[],
            variables: &[],
            factory: Box::new(factory),
        }
    }

    pub fn with_equations(
        mut self,
        equations: &'static [Equation],
        variables: &'static [(&'static str, &'static str)],
    ) -> Self {
        self.equations = equations;
        self.variables = variables;
        self
    }
}

#[derive(Default)]
pub struct VerseRegistry {
    entries: BTreeMap<VerseId, VerseEntry>,
}

impl VerseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a verse, replacing any previous entry with the same id
    pub fn register(&mut self, entry: VerseEntry) {
        if self.entries.insert(entry.id, entry).is_some() {
            log::warn!("Verse registry: replaced an existing entry");
        }
    }

    pub fn get(&self, id: VerseId) -> Option<&VerseEntry> {
        self.entries.get(&id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &VerseEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next registered id, wrapping to the first
    pub fn next_after(&self, id: VerseId) -> Option<VerseId> {
        self.entries
            .range((Bound::Excluded(id), Bound::Unbounded))
            .next()
            .or_else(|| self.entries.iter().next())
            .map(|(id, _)| *id)
    }

    /// Previous registered id, wrapping to the last
    pub fn previous_before(&self, id: VerseId) -> Option<VerseId> {
        self.entries
            .range(..id)
            .next_back()
            .or_else(|| self.entries.iter().next_back())
            .map(|(id, _)| *id)
    }
}

/// Result of a selection; the placeholder case is not an error to callers
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Loaded(VerseId),
    Placeholder { id: VerseId, reason: String },
}

impl Selection {
    pub fn id(&self) -> VerseId {
        match self {
            Selection::Loaded(id) | Selection::Placeholder { id, .. } => *id,
        }
    }
}

pub struct Orchestrator {
    registry: VerseRegistry,
    options: BTreeMap<VerseId, Options>,
    active: Option<Instance>,
    placeholder_active: bool,
    history: History,
}

impl Orchestrator {
    pub fn new(registry: VerseRegistry) -> Self {
        Self {
            registry,
            options: BTreeMap::new(),
            active: None,
            placeholder_active: false,
            history: History::new(),
        }
    }

    pub fn with_options(mut self, options: BTreeMap<VerseId, Options>) -> Self {
        self.options = options;
        self
    }

    /// Options used the next time `id` is mounted
    pub fn set_options(&mut self, id: VerseId, options: Options) {
        self.options.insert(id, options);
    }

    pub fn options_mut(&mut self, id: VerseId) -> &mut Options {
        self.options.entry(id).or_default()
    }

    pub fn registry(&self) -> &VerseRegistry {
        &self.registry
    }

    pub fn current(&self) -> Option<VerseId> {
        self.active.as_ref().map(Instance::id)
    }

    pub fn current_entry(&self) -> Option<&VerseEntry> {
        self.current().and_then(|id| self.registry.get(id))
    }

    pub fn route(&self) -> Option<Route> {
        self.current().map(Route::new)
    }

    pub fn active(&self) -> Option<&Instance> {
        self.active.as_ref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.active.is_some() && self.placeholder_active
    }

    /// Switch to `id` and record it in the history
    pub fn select_verse(&mut self, id: VerseId, mount: &mut Mount) -> Selection {
        self.history.push(id);
        self.load(id, mount)
    }

    pub fn navigate(&mut self, route: Route, mount: &mut Mount) -> Selection {
        self.select_verse(route.verse, mount)
    }

    pub fn navigate_link(&mut self, link: &str, mount: &mut Mount) -> Result<Selection> {
        Ok(self.navigate(Route::parse(link)?, mount))
    }

    pub fn next(&mut self, mount: &mut Mount) -> Option<Selection> {
        let from = self.current().unwrap_or(VerseId(0));
        let id = self.registry.next_after(from)?;
        Some(self.select_verse(id, mount))
    }

    pub fn previous(&mut self, mount: &mut Mount) -> Option<Selection> {
        let from = self.current().unwrap_or(VerseId(u32::MAX));
        let id = self.registry.previous_before(from)?;
        Some(self.select_verse(id, mount))
    }

    pub fn back(&mut self, mount: &mut Mount) -> Option<Selection> {
        let id = self.history.back()?;
        Some(self.load(id, mount))
    }

    pub fn forward(&mut self, mount: &mut Mount) -> Option<Selection> {
        let id = self.history.forward()?;
        Some(self.load(id, mount))
    }

    /// Remount the current verse, picking up changed options
    pub fn reload(&mut self, mount: &mut Mount) -> Option<Selection> {
        let id = self.current()?;
        Some(self.load(id, mount))
    }

    fn load(&mut self, id: VerseId, mount: &mut Mount) -> Selection {
        self.teardown(mount);

        let options = self.options.get(&id).cloned().unwrap_or_default();
        let launched = match self.registry.get(id) {
            Some(entry) => {
                Instance::launch(id, mount, |mount| (entry.factory)(mount, &options))
            }
            None => Err(VerseError::UnknownVerse(id.0)),
        };

        match launched {
            Ok(instance) => {
                self.active = Some(instance);
                self.placeholder_active = false;
                Selection::Loaded(id)
            }
            Err(err) => {
                let reason = err.to_string();
                log::warn!("{id}: {reason}; mounting placeholder");
                if !mount.live_resources().is_empty() {
                    log::warn!(
                        "{id}: failed init left {:?} behind",
                        mount.live_resources()
                    );
                    mount.force_clear();
                }
                self.active = Some(Instance::running(id, placeholder::mount(mount, id)));
                self.placeholder_active = true;
                Selection::Placeholder { id, reason }
            }
        }
    }

    fn teardown(&mut self, mount: &mut Mount) {
        let Some(mut instance) = self.active.take() else {
            return;
        };
        instance.dispose(mount);
        let leftover = mount.live_resources();
        if !leftover.is_empty() {
            log::warn!(
                "{} did not release {:?}; clearing mount",
                instance.id(),
                leftover
            );
            mount.force_clear();
        }
        self.placeholder_active = false;
    }

    /// Deliver queued control edits to the active instance
    pub fn dispatch_controls(&mut self, mount: &mut Mount) {
        let events = mount.panel.drain_events();
        if let Some(active) = self.active.as_mut() {
            for event in events {
                active.control(event, mount);
            }
        }
    }

    /// Resizes always reach the stage; other events only reach listeners
    pub fn dispatch_host_event(&mut self, event: HostEvent, mount: &mut Mount) {
        if let HostEvent::Resized { width, height } = event {
            mount.stage.resize(width, height);
        }
        if !mount.stage.is_listening(event.kind()) {
            return;
        }
        if let Some(active) = self.active.as_mut() {
            active.host_event(event, mount);
        }
    }

    /// One host frame: apply pending control edits, then update
    pub fn frame(&mut self, frame: FrameTime, mount: &mut Mount) {
        self.dispatch_controls(mount);
        if let Some(active) = self.active.as_mut() {
            active.frame(frame, mount);
        }
    }

    pub fn shutdown(&mut self, mount: &mut Mount) {
        self.teardown(mount);
    }
}
