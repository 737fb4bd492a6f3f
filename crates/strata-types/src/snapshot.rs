use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::error::{TypeError, TypeResult};
use crate::identity::{SampleId, TensorId};
use crate::object::ObjectId;
use crate::tensor::TensorMeta;

/// One sample of a tensor: its identity and a reference to its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSlot {
    pub id: SampleId,
    pub value: ObjectId,
}

/// The full state of one live tensor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorState {
    pub id: TensorId,
    pub name: String,
    pub meta: TensorMeta,
    /// Samples in index order.
    pub samples: Vec<SampleSlot>,
}

impl TensorState {
    pub fn new(id: TensorId, name: impl Into<String>, meta: TensorMeta) -> Self {
        Self {
            id,
            name: name.into(),
            meta,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the sample with the given id.
    pub fn position(&self, sample: SampleId) -> Option<usize> {
        self.samples.iter().position(|s| s.id == sample)
    }

    pub fn get(&self, sample: SampleId) -> Option<&SampleSlot> {
        self.samples.iter().find(|s| s.id == sample)
    }

    pub fn sample_ids(&self) -> impl Iterator<Item = SampleId> + '_ {
        self.samples.iter().map(|s| s.id)
    }

    fn require_position(&self, sample: SampleId) -> TypeResult<usize> {
        self.position(sample).ok_or(TypeError::UnknownSample {
            tensor: self.id,
            sample,
        })
    }
}

/// The tensor state of a revision: every live tensor keyed by identity.
///
/// Names are unique among live tensors; replay enforces it. `aliases` maps
/// ids of tensors folded in from other branches to the tensor that absorbed
/// them. An aliased id is never live again.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    tensors: BTreeMap<TensorId, TensorState>,
    #[serde(default)]
    aliases: BTreeMap<TensorId, TensorId>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn contains(&self, id: TensorId) -> bool {
        self.tensors.contains_key(&id)
    }

    pub fn get(&self, id: TensorId) -> Option<&TensorState> {
        self.tensors.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&TensorState> {
        self.tensors.values().find(|t| t.name == name)
    }

    pub fn id_of(&self, name: &str) -> Option<TensorId> {
        self.by_name(name).map(|t| t.id)
    }

    /// Live tensors in identity order.
    pub fn tensors(&self) -> impl Iterator<Item = &TensorState> {
        self.tensors.values()
    }

    /// The tensor an aliased id was folded into.
    pub fn alias_of(&self, id: TensorId) -> Option<TensorId> {
        self.aliases.get(&id).copied()
    }

    /// `(alias, tensor)` pairs in alias order.
    pub fn aliases(&self) -> impl Iterator<Item = (TensorId, TensorId)> + '_ {
        self.aliases.iter().map(|(a, t)| (*a, *t))
    }

    /// Whether `id` is live or aliased here.
    pub fn knows(&self, id: TensorId) -> bool {
        self.contains(id) || self.aliases.contains_key(&id)
    }

    /// Copy with every tensor id passed through `map`. Aliases are dropped;
    /// the copy is only meant for comparison.
    ///
    /// `map` must not send two live tensors to the same id.
    pub fn renumbered(&self, map: impl Fn(TensorId) -> TensorId) -> Snapshot {
        let tensors = self
            .tensors
            .values()
            .map(|state| {
                let id = map(state.id);
                (id, TensorState { id, ..state.clone() })
            })
            .collect();
        Snapshot {
            tensors,
            aliases: BTreeMap::new(),
        }
    }

    /// Sorted names of live tensors.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.values().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Apply every change in order. Stops at the first invalid change,
    /// leaving the changes before it applied.
    pub fn apply_all<'a>(&mut self, changes: impl IntoIterator<Item = &'a Change>) -> TypeResult<()> {
        for change in changes {
            self.apply(change)?;
        }
        Ok(())
    }

    /// Apply one change, validating it against the current state.
    pub fn apply(&mut self, change: &Change) -> TypeResult<()> {
        match change {
            Change::CreateTensor { tensor, name, meta } => {
                self.check_insertable(*tensor, name)?;
                self.tensors
                    .insert(*tensor, TensorState::new(*tensor, name.clone(), meta.clone()));
            }
            Change::ReviveTensor { state } => {
                self.check_insertable(state.id, &state.name)?;
                self.tensors.insert(state.id, state.clone());
            }
            Change::DeleteTensor { tensor } => {
                self.tensors
                    .remove(tensor)
                    .ok_or(TypeError::UnknownTensor(*tensor))?;
            }
            Change::RenameTensor { tensor, from, to } => {
                if from != to && self.by_name(to).is_some() {
                    return Err(TypeError::NameTaken(to.clone()));
                }
                let state = self.state_mut(*tensor)?;
                if state.name != *from {
                    return Err(TypeError::NameMismatch {
                        tensor: *tensor,
                        expected: from.clone(),
                        actual: state.name.clone(),
                    });
                }
                state.name = to.clone();
            }
            Change::Append {
                tensor,
                sample,
                value,
            } => {
                let state = self.state_mut(*tensor)?;
                if state.position(*sample).is_some() {
                    return Err(TypeError::DuplicateSample {
                        tensor: *tensor,
                        sample: *sample,
                    });
                }
                state.samples.push(SampleSlot {
                    id: *sample,
                    value: *value,
                });
            }
            Change::Update {
                tensor,
                sample,
                value,
            } => {
                let state = self.state_mut(*tensor)?;
                let idx = state.require_position(*sample)?;
                state.samples[idx].value = *value;
            }
            Change::Remove { tensor, sample } => {
                let state = self.state_mut(*tensor)?;
                let idx = state.require_position(*sample)?;
                state.samples.remove(idx);
            }
            Change::Clear { tensor, removed } => {
                let state = self.state_mut(*tensor)?;
                for sample in removed {
                    state.require_position(*sample)?;
                }
                state.samples.clear();
            }
            Change::AliasTensor { alias, tensor } => {
                if self.knows(*alias) {
                    return Err(TypeError::DuplicateTensor(*alias));
                }
                if !self.contains(*tensor) {
                    return Err(TypeError::UnknownTensor(*tensor));
                }
                self.aliases.insert(*alias, *tensor);
            }
        }
        Ok(())
    }

    fn state_mut(&mut self, id: TensorId) -> TypeResult<&mut TensorState> {
        self.tensors.get_mut(&id).ok_or(TypeError::UnknownTensor(id))
    }

    fn check_insertable(&self, id: TensorId, name: &str) -> TypeResult<()> {
        if self.knows(id) {
            return Err(TypeError::DuplicateTensor(id));
        }
        if self.by_name(name).is_some() {
            return Err(TypeError::NameTaken(name.to_string()));
        }
        Ok(())
    }
}
