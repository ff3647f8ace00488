//! The control mount point and control bindings
//!
//! Scenes add widgets to the [`ControlPanel`]; the egui layer draws them and
//! writes user edits back through [`ControlPanel::set_value`], which queues a
//! [`ControlEvent`]. Each scene keeps a [`ControlBindings`] table that maps
//! widget ids back to its own control enum.

use std::collections::VecDeque;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId(u32);

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetKind {
    Slider {
        value: f32,
        min: f32,
        max: f32,
        step: f32,
    },
    Checkbox {
        checked: bool,
    },
    Button,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: WidgetId,
    pub label: String,
    pub kind: WidgetKind,
    /// Text mirrored next to the widget
    pub readout: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Number(f32),
    Toggle(bool),
    Pressed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlEvent {
    pub widget: WidgetId,
    pub value: ControlValue,
}

pub struct ControlPanel {
    widgets: Vec<Widget>,
    pending: VecDeque<ControlEvent>,
    message: Option<String>,
    next_id: u32,
    attached: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self {
            widgets: Vec::new(),
            pending: VecDeque::new(),
            message: None,
            next_id: 0,
            attached: true,
        }
    }

    pub fn detached() -> Self {
        Self {
            attached: false,
            ..Self::new()
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    fn push(&mut self, label: &str, kind: WidgetKind) -> WidgetId {
        self.next_id += 1;
        let id = WidgetId(self.next_id);
        let readout = readout_for(&kind);
        self.widgets.push(Widget {
            id,
            label: label.to_string(),
            kind,
            readout,
        });
        id
    }

    pub fn add_slider(
        &mut self,
        label: &str,
        value: f32,
        range: RangeInclusive<f32>,
        step: f32,
    ) -> WidgetId {
        let (min, max) = (*range.start(), *range.end());
        self.push(
            label,
            WidgetKind::Slider {
                value: value.clamp(min, max),
                min,
                max,
                step,
            },
        )
    }

    pub fn add_checkbox(&mut self, label: &str, checked: bool) -> WidgetId {
        self.push(label, WidgetKind::Checkbox { checked })
    }

    pub fn add_button(&mut self, label: &str) -> WidgetId {
        self.push(label, WidgetKind::Button)
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    /// Record a user edit: update the widget, refresh its readout and queue
    /// an event. Returns false for unknown widgets or mismatched values.
    pub fn set_value(&mut self, id: WidgetId, value: ControlValue) -> bool {
        let Some(widget) = self.widgets.iter_mut().find(|w| w.id == id) else {
            return false;
        };
        let value = match (&mut widget.kind, value) {
            (WidgetKind::Slider { value: v, min, max, .. }, ControlValue::Number(n)) => {
                *v = n.clamp(*min, *max);
                ControlValue::Number(*v)
            }
            (WidgetKind::Checkbox { checked }, ControlValue::Toggle(b)) => {
                *checked = b;
                value
            }
            (WidgetKind::Button, ControlValue::Pressed) => value,
            _ => return false,
        };
        widget.readout = readout_for(&widget.kind);
        self.pending.push_back(ControlEvent { widget: id, value });
        true
    }

    pub fn drain_events(&mut self) -> Vec<ControlEvent> {
        self.pending.drain(..).collect()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn live_widgets(&self) -> usize {
        self.widgets.len()
    }

    /// Tear the panel down; pending events die with the widgets
    pub fn clear(&mut self) {
        self.widgets.clear();
        self.pending.clear();
        self.message = None;
    }
}

fn readout_for(kind: &WidgetKind) -> String {
    match kind {
        WidgetKind::Slider { value, step, .. } => {
            let decimals = if *step >= 1.0 {
                0
            } else {
                (-step.log10() - 1e-3).ceil().clamp(0.0, 4.0) as usize
            };
            format!("{value:.decimals$}")
        }
        WidgetKind::Checkbox { checked } => (if *checked { "on" } else { "off" }).to_string(),
        WidgetKind::Button => String::new(),
    }
}

/// Maps panel widgets to a scene's own control enum
pub struct ControlBindings<C> {
    bindings: Vec<(WidgetId, C)>,
}

impl<C: Copy> Default for ControlBindings<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Copy> ControlBindings<C> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub fn slider(
        &mut self,
        panel: &mut ControlPanel,
        label: &str,
        value: f32,
        range: RangeInclusive<f32>,
        step: f32,
        control: C,
    ) -> WidgetId {
        let id = panel.add_slider(label, value, range, step);
        self.bindings.push((id, control));
        id
    }

    pub fn checkbox(
        &mut self,
        panel: &mut ControlPanel,
        label: &str,
        checked: bool,
        control: C,
    ) -> WidgetId {
        let id = panel.add_checkbox(label, checked);
        self.bindings.push((id, control));
        id
    }

    pub fn button(&mut self, panel: &mut ControlPanel, label: &str, control: C) -> WidgetId {
        let id = panel.add_button(label);
        self.bindings.push((id, control));
        id
    }

    pub fn resolve(&self, event: &ControlEvent) -> Option<(C, ControlValue)> {
        self.bindings
            .iter()
            .find(|(id, _)| *id == event.widget)
            .map(|(_, control)| (*control, event.value))
    }

    /// Widget bound to `control`, for tests and readout updates
    pub fn widget_for(&self, control: C) -> Option<WidgetId>
    where
        C: PartialEq,
    {
        self.bindings
            .iter()
            .find(|(_, c)| *c == control)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}
