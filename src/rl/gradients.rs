//! Named Gradient Maps
//!
//! Gradients are kept outside the burn graph, keyed by parameter name, so they
//! can be summed across steps and trajectories before one update.

use std::collections::BTreeMap;

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::error::{A3cError, Result};

/// Dense gradient for one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl GradientTensor {
    /// `values` must fill `shape` exactly
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        let len: usize = shape.iter().product();
        if len != values.len() {
            return Err(A3cError::Tensor(format!(
                "{} gradient values do not fill shape {:?}",
                values.len(),
                shape
            )));
        }
        Ok(Self { shape, values })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            values: vec![0.0; len],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    fn add_assign(&mut self, other: &GradientTensor) {
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += *b;
        }
    }

    /// Largest elementwise absolute difference
    pub fn max_abs_diff(&self, other: &GradientTensor) -> f32 {
        if self.shape != other.shape {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }

    /// Materialise on a backend; `D` must equal the rank of the shape.
    pub fn to_tensor<B: Backend, const D: usize>(&self, device: &B::Device) -> Tensor<B, D> {
        Tensor::from_data(
            TensorData::new(self.values.clone(), self.shape.clone()),
            device,
        )
    }
}

/// Parameter name -> gradient, summed over any number of backward passes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradientMap {
    entries: BTreeMap<String, GradientTensor>,
}

impl GradientMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// All-zero map for the given parameter shapes
    pub fn zeros(shapes: &BTreeMap<String, Vec<usize>>) -> Self {
        Self {
            entries: shapes
                .iter()
                .map(|(name, shape)| (name.clone(), GradientTensor::zeros(shape.clone())))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, gradient: GradientTensor) {
        self.entries.insert(name.into(), gradient);
    }

    pub fn get(&self, name: &str) -> Option<&GradientTensor> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GradientTensor)> {
        self.entries.iter()
    }

    /// Add `other` into this map.
    ///
    /// Names missing here are initialised with the incoming tensor. Shapes are
    /// checked for every shared name before anything is added, so a mismatch
    /// leaves the map untouched.
    pub fn accumulate(&mut self, other: GradientMap) -> Result<()> {
        for (name, incoming) in &other.entries {
            if let Some(existing) = self.entries.get(name) {
                if existing.shape != incoming.shape {
                    return Err(A3cError::ShapeMismatch {
                        parameter: name.clone(),
                        expected: existing.shape.clone(),
                        actual: incoming.shape.clone(),
                    });
                }
            }
        }

        for (name, incoming) in other.entries {
            match self.entries.get_mut(&name) {
                Some(existing) => existing.add_assign(&incoming),
                None => {
                    self.entries.insert(name, incoming);
                }
            }
        }
        Ok(())
    }

    /// Sum of all maps
    pub fn sum<I>(maps: I) -> Result<GradientMap>
    where
        I: IntoIterator<Item = GradientMap>,
    {
        let mut total = GradientMap::new();
        for map in maps {
            total.accumulate(map)?;
        }
        Ok(total)
    }

    /// Same names and every element within `tolerance`
    pub fn approx_eq(&self, other: &GradientMap, tolerance: f32) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(name, tensor)| {
                other
                    .entries
                    .get(name)
                    .map_or(false, |o| tensor.max_abs_diff(o) <= tolerance)
            })
    }

    /// Whether every element is exactly zero
    pub fn is_zero(&self) -> bool {
        self.entries
            .values()
            .all(|t| t.values.iter().all(|v| *v == 0.0))
    }
}
