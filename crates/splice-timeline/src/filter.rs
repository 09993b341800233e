//! Filter attachments and their parameters.

use serde::{Deserialize, Serialize};
use splice_core::{Frame, KeyframeTrack, Result, SpliceError};
use uuid::Uuid;

use crate::clip::{ItemId, TrackId};

/// Where a filter instance is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterScope {
    Clip,
    Track,
    Timeline,
}

/// Address of a filter list inside a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOwner {
    Timeline,
    Track(TrackId),
    /// A clip or transition on a track.
    Item { track: TrackId, item: ItemId },
}

impl FilterOwner {
    /// Scope a filter must declare to live on this owner.
    pub fn scope(self) -> FilterScope {
        match self {
            Self::Timeline => FilterScope::Timeline,
            Self::Track(_) => FilterScope::Track,
            Self::Item { .. } => FilterScope::Clip,
        }
    }
}

/// Static value of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// A named parameter, optionally animated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Value used when the parameter has no keyframes.
    pub value: ParamValue,
    pub keyframes: Option<KeyframeTrack>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
            keyframes: None,
        }
    }

    /// Whether this parameter carries at least one key.
    pub fn is_animated(&self) -> bool {
        self.keyframes.as_ref().is_some_and(|k| !k.is_empty())
    }
}

/// An effect instance attached to a clip, track or the whole timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterAttachment {
    pub id: Uuid,
    /// Effect type identifier (e.g. "brightness").
    pub filter_type: String,
    pub scope: FilterScope,
    /// Parameters in declaration order.
    pub parameters: Vec<Parameter>,
    pub keyframes_enabled: bool,
    /// At most one filter of this type may live on the same owner.
    pub unique: bool,
}

impl FilterAttachment {
    /// Create a filter with no parameters.
    pub fn new(filter_type: impl Into<String>, scope: FilterScope) -> Self {
        Self {
            id: Uuid::new_v4(),
            filter_type: filter_type.into(),
            scope,
            parameters: Vec::new(),
            keyframes_enabled: false,
            unique: false,
        }
    }

    /// Builder: add a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    /// Builder: mark the filter as unique per owner.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    fn parameter_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        let filter_type = &self.filter_type;
        self.parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| SpliceError::NotFound(format!("parameter '{name}' on {filter_type}")))
    }

    /// Set the static value of a parameter, adding it if missing.
    pub fn set_parameter(&mut self, name: &str, value: ParamValue) {
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(param) => param.value = value,
            None => self.parameters.push(Parameter::new(name, value)),
        }
    }

    /// Insert or update a key on a numeric parameter. Enables keyframes.
    pub fn set_keyframe(&mut self, name: &str, offset: Frame, value: f64) -> Result<()> {
        if offset < 0 {
            return Err(SpliceError::InvalidRange(format!(
                "keyframe offset {offset} is negative"
            )));
        }
        let param = self.parameter_mut(name)?;
        if param.value.as_number().is_none() {
            return Err(SpliceError::InvalidRange(format!(
                "parameter '{name}' is not numeric"
            )));
        }
        param
            .keyframes
            .get_or_insert_with(KeyframeTrack::default)
            .insert_or_update(offset, value);
        self.keyframes_enabled = true;
        Ok(())
    }

    /// Remove a key. Returns `NotFound` when there is no key at `offset`.
    pub fn remove_keyframe(&mut self, name: &str, offset: Frame) -> Result<f64> {
        let param = self.parameter_mut(name)?;
        let removed = param.keyframes.as_mut().and_then(|k| k.remove(offset));
        if param.keyframes.as_ref().is_some_and(KeyframeTrack::is_empty) {
            param.keyframes = None;
        }
        removed.ok_or_else(|| SpliceError::NotFound(format!("keyframe at {offset} on '{name}'")))
    }

    /// Turn animation on or off.
    ///
    /// Turning it off collapses every animated parameter to its value at
    /// `playhead` and drops the keys.
    pub fn set_keyframes_enabled(&mut self, enabled: bool, playhead: Frame) {
        if !enabled {
            for param in &mut self.parameters {
                if let Some(value) = param.keyframes.take().and_then(|k| k.evaluate(playhead)) {
                    param.value = ParamValue::Number(value);
                }
            }
        }
        self.keyframes_enabled = enabled;
    }

    /// Effective value of a parameter at `offset`.
    pub fn value_at(&self, name: &str, offset: Frame) -> Option<ParamValue> {
        let param = self.parameter(name)?;
        if self.keyframes_enabled {
            if let Some(v) = param.keyframes.as_ref().and_then(|k| k.evaluate(offset)) {
                return Some(ParamValue::Number(v));
            }
        }
        Some(param.value.clone())
    }

    /// Two copies of this filter for the halves of an owner cut at `at`.
    pub fn split_at(&self, at: Frame) -> (Self, Self) {
        let mut left = self.clone();
        let mut right = self.clone();
        for (l, r) in left.parameters.iter_mut().zip(&mut right.parameters) {
            if let Some(keys) = &l.keyframes {
                let (head, tail) = keys.split_at(at);
                l.keyframes = Some(head).filter(|k| !k.is_empty());
                r.keyframes = Some(tail).filter(|k| !k.is_empty());
            }
        }
        (left, right)
    }

    /// Move every key by `delta` frames.
    pub fn shift_keys(&mut self, delta: Frame) {
        for keys in self.parameters.iter_mut().filter_map(|p| p.keyframes.as_mut()) {
            keys.shift(delta);
        }
    }

    /// Equal to `other` apart from keyframe curves.
    pub(crate) fn same_setup(&self, other: &FilterAttachment) -> bool {
        self.id == other.id
            && self.filter_type == other.filter_type
            && self.scope == other.scope
            && self.keyframes_enabled == other.keyframes_enabled
            && self.unique == other.unique
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.name == b.name && a.value == b.value)
    }

    /// Append the curves of `next`, which starts `offset` frames after this
    /// filter's owner.
    pub(crate) fn join(&mut self, next: &FilterAttachment, offset: Frame) {
        for (param, other) in self.parameters.iter_mut().zip(&next.parameters) {
            let joined = match (param.keyframes.take(), &other.keyframes) {
                (None, None) => None,
                (Some(left), None) => Some(left.join(&KeyframeTrack::default(), offset)),
                (Some(left), Some(right)) => Some(left.join(right, offset)),
                (None, Some(right)) => {
                    Some(KeyframeTrack::new(right.interpolation).join(right, offset))
                }
            };
            param.keyframes = joined.filter(|k| !k.is_empty());
        }
    }

    pub(crate) fn keys_well_ordered(&self) -> bool {
        self.parameters
            .iter()
            .filter_map(|p| p.keyframes.as_ref())
            .all(KeyframeTrack::is_well_ordered)
    }
}

/// Add `filter` to `filters`, enforcing the one-per-owner rule for unique types.
pub fn attach(
    filters: &mut Vec<FilterAttachment>,
    filter: FilterAttachment,
    index: Option<usize>,
) -> Result<()> {
    if filters.iter().any(|f| f.id == filter.id) {
        return Err(SpliceError::DuplicateFilter(format!(
            "filter {} is already attached",
            filter.id
        )));
    }
    let clashes = filters
        .iter()
        .any(|f| f.filter_type == filter.filter_type && (f.unique || filter.unique));
    if clashes {
        return Err(SpliceError::DuplicateFilter(format!(
            "only one {} filter is allowed",
            filter.filter_type
        )));
    }
    let index = index.unwrap_or(filters.len()).min(filters.len());
    filters.insert(index, filter);
    Ok(())
}

/// Remove a filter by id.
pub fn detach(filters: &mut Vec<FilterAttachment>, id: Uuid) -> Result<FilterAttachment> {
    let pos = position(filters, id)?;
    Ok(filters.remove(pos))
}

/// Move a filter to `to_index` (clamped to the list).
pub fn reorder(filters: &mut [FilterAttachment], id: Uuid, to_index: usize) -> Result<()> {
    let from = position(filters, id)?;
    let to = to_index.min(filters.len() - 1);
    if from < to {
        filters[from..=to].rotate_left(1);
    } else {
        filters[to..=from].rotate_right(1);
    }
    Ok(())
}

/// Look up a filter by id.
pub fn find_mut(filters: &mut [FilterAttachment], id: Uuid) -> Result<&mut FilterAttachment> {
    let pos = position(filters, id)?;
    Ok(&mut filters[pos])
}

fn position(filters: &[FilterAttachment], id: Uuid) -> Result<usize> {
    filters
        .iter()
        .position(|f| f.id == id)
        .ok_or_else(|| SpliceError::NotFound(format!("filter {id}")))
}
