//! Read and write handles onto one tensor of a [`Dataset`].

use strata_types::{Array, Change, Htype, ObjectId, SampleId, TensorId, TensorMeta, TensorState};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{DatasetError, DatasetResult};

fn slot_at(state: &TensorState, index: usize) -> DatasetResult<ObjectId> {
    state
        .samples
        .get(index)
        .map(|slot| slot.value)
        .ok_or(DatasetError::IndexOutOfBounds {
            index,
            len: state.len(),
        })
}

fn read_all(dataset: &Dataset, state: &TensorState) -> DatasetResult<Vec<Array>> {
    state
        .samples
        .iter()
        .map(|slot| dataset.load_value(&slot.value))
        .collect()
}

fn visible_ids(state: &TensorState) -> Option<Vec<SampleId>> {
    state.meta.with_identity.then(|| state.sample_ids().collect())
}

/// Read-only view of a tensor in the working state.
#[derive(Clone, Copy)]
pub struct Tensor<'a> {
    dataset: &'a Dataset,
    state: &'a TensorState,
}

impl<'a> Tensor<'a> {
    pub(crate) fn new(dataset: &'a Dataset, state: &'a TensorState) -> Self {
        Self { dataset, state }
    }

    pub fn id(&self) -> TensorId {
        self.state.id
    }

    pub fn name(&self) -> &'a str {
        &self.state.name
    }

    pub fn meta(&self) -> &'a TensorMeta {
        &self.state.meta
    }

    pub fn htype(&self) -> &'a Htype {
        &self.state.meta.htype
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn get(&self, index: usize) -> DatasetResult<Array> {
        self.dataset.load_value(&slot_at(self.state, index)?)
    }

    /// Every sample value, in index order.
    pub fn values(&self) -> DatasetResult<Vec<Array>> {
        read_all(self.dataset, self.state)
    }

    /// Sample ids in index order, or `None` for a tensor created without
    /// identity tracking.
    pub fn sample_ids(&self) -> Option<Vec<SampleId>> {
        visible_ids(self.state)
    }
}

impl std::fmt::Debug for Tensor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.state.id)
            .field("name", &self.state.name)
            .field("len", &self.state.len())
            .finish()
    }
}

/// Mutable handle onto a tensor on the checked-out branch. Every edit is
/// recorded as a pending change.
pub struct TensorMut<'a> {
    dataset: &'a mut Dataset,
    id: TensorId,
}

impl<'a> TensorMut<'a> {
    pub(crate) fn new(dataset: &'a mut Dataset, id: TensorId) -> Self {
        Self { dataset, id }
    }

    fn state(&self) -> DatasetResult<&TensorState> {
        self.dataset.tensor_state(self.id)
    }

    fn store(&self, value: &Array) -> DatasetResult<ObjectId> {
        let compression = self.state()?.meta.sample_compression;
        self.dataset.store_value(value, compression)
    }

    pub fn id(&self) -> TensorId {
        self.id
    }

    /// Read-only view of the current state.
    pub fn view(&self) -> DatasetResult<Tensor<'_>> {
        Ok(Tensor::new(self.dataset, self.state()?))
    }

    pub fn len(&self) -> DatasetResult<usize> {
        Ok(self.state()?.len())
    }

    pub fn is_empty(&self) -> DatasetResult<bool> {
        Ok(self.state()?.is_empty())
    }

    pub fn get(&self, index: usize) -> DatasetResult<Array> {
        self.dataset.load_value(&slot_at(self.state()?, index)?)
    }

    pub fn values(&self) -> DatasetResult<Vec<Array>> {
        read_all(self.dataset, self.state()?)
    }

    pub fn sample_ids(&self) -> DatasetResult<Option<Vec<SampleId>>> {
        Ok(visible_ids(self.state()?))
    }

    /// Append one sample, returning its new id.
    pub fn append(&mut self, value: impl Into<Array>) -> DatasetResult<SampleId> {
        let value = self.store(&value.into())?;
        let sample = self.dataset.allocate_sample();
        self.dataset.record(Change::Append {
            tensor: self.id,
            sample,
            value,
        })?;
        Ok(sample)
    }

    pub fn extend<I>(&mut self, values: I) -> DatasetResult<Vec<SampleId>>
    where
        I: IntoIterator,
        I::Item: Into<Array>,
    {
        values.into_iter().map(|v| self.append(v)).collect()
    }

    /// Overwrite the sample at `index`. Writing the value it already holds
    /// records nothing.
    pub fn set(&mut self, index: usize, value: impl Into<Array>) -> DatasetResult<()> {
        let current = slot_at(self.state()?, index)?;
        let sample = self.state()?.samples[index].id;
        let value = self.store(&value.into())?;
        if value == current {
            debug!(tensor = %self.id, index, "value unchanged");
            return Ok(());
        }
        self.dataset.record(Change::Update {
            tensor: self.id,
            sample,
            value,
        })
    }

    /// Remove the sample at `index`, shifting later samples down.
    pub fn pop(&mut self, index: usize) -> DatasetResult<Array> {
        let value = self.get(index)?;
        let sample = self.state()?.samples[index].id;
        self.dataset.record(Change::Remove {
            tensor: self.id,
            sample,
        })?;
        Ok(value)
    }

    /// Remove every sample.
    pub fn clear(&mut self) -> DatasetResult<()> {
        let removed: Vec<SampleId> = self.state()?.sample_ids().collect();
        self.dataset.record(Change::Clear {
            tensor: self.id,
            removed,
        })
    }
}
