//! Inversion of forward element mappings.
//!
//! A forward mapping `old_to_new` sends each source element to one target (or
//! to [`INVALID_INDEX`] to drop it). Its inverse lists, for every target, the
//! sources that land on it, in increasing source order.

use crate::data::value_type::{INVALID_INDEX, Index};
use crate::mesh_error::MeshError;

/// CSR list of sources per target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InverseMapping {
    /// Source indices, grouped by target.
    pub data: Vec<Index>,
    /// `data[offsets[t] .. offsets[t + 1]]` are the sources of target `t`.
    pub offsets: Vec<Index>,
}

impl InverseMapping {
    pub fn num_targets(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Sources of target `t`, in ascending order.
    pub fn sources(&self, t: usize) -> &[Index] {
        match (self.offsets.get(t), self.offsets.get(t + 1)) {
            (Some(&b), Some(&e)) => &self.data[b as usize..e as usize],
            _ => &[],
        }
    }

    /// First target with no source, if any.
    pub fn first_empty_target(&self) -> Option<usize> {
        self.offsets.windows(2).position(|w| w[0] == w[1])
    }

    /// Every target has at least one source.
    pub fn is_surjective(&self) -> bool {
        self.first_empty_target().is_none()
    }

    /// Identity of length `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            data: (0..n as Index).collect(),
            offsets: (0..=n as Index).collect(),
        }
    }

    /// Lowest source of each target ([`INVALID_INDEX`] when empty).
    pub fn first_sources(&self) -> Vec<Index> {
        (0..self.num_targets())
            .map(|t| self.sources(t).first().copied().unwrap_or(INVALID_INDEX))
            .collect()
    }

    /// Backward mapping with optional offsets, as accepted by the attribute
    /// transfer routines: target `t` gathers `data[offsets[t]..offsets[t+1]]`,
    /// or the single source `data[t]` when no offsets are given.
    ///
    /// Each group is sorted, so [`MappingPolicy::KeepFirst`] keeps the lowest
    /// source index whatever order the caller listed them in.
    ///
    /// [`MappingPolicy::KeepFirst`]: crate::algs::mapping_policy::MappingPolicy::KeepFirst
    pub fn from_backward(
        mut data: Vec<Index>,
        offsets: Option<Vec<Index>>,
    ) -> Result<Self, MeshError> {
        let offsets = match offsets {
            Some(o) => {
                let ok = o.first() == Some(&0)
                    && o.windows(2).all(|w| w[0] <= w[1])
                    && o.last().map(|&l| l as usize) == Some(data.len());
                if !ok {
                    return Err(MeshError::LengthMismatch {
                        what: "mapping offsets",
                        expected: data.len(),
                        found: o.last().map_or(0, |&l| l as usize),
                    });
                }
                o
            }
            None => (0..=data.len() as Index).collect(),
        };
        for w in offsets.windows(2) {
            data[w[0] as usize..w[1] as usize].sort_unstable();
        }
        Ok(Self { data, offsets })
    }
}

/// Invert `old_to_new` onto `num_targets` targets. [`INVALID_INDEX`] entries
/// are skipped; any other entry must be below `num_targets`.
pub fn invert_mapping(old_to_new: &[Index], num_targets: usize) -> Result<InverseMapping, MeshError> {
    let mut offsets = vec![0 as Index; num_targets + 1];
    for &t in old_to_new {
        if t == INVALID_INDEX {
            continue;
        }
        if t as usize >= num_targets {
            return Err(MeshError::out_of_range("mapping target", t as usize, num_targets));
        }
        offsets[t as usize + 1] += 1;
    }
    for i in 0..num_targets {
        offsets[i + 1] += offsets[i];
    }
    let mut cursor = offsets.clone();
    let mut data = vec![INVALID_INDEX; offsets[num_targets] as usize];
    for (s, &t) in old_to_new.iter().enumerate() {
        if t == INVALID_INDEX {
            continue;
        }
        let slot = &mut cursor[t as usize];
        data[*slot as usize] = s as Index;
        *slot += 1;
    }
    Ok(InverseMapping { data, offsets })
}

/// Number of targets implied by a forward mapping: one past the largest
/// valid entry.
pub fn count_targets(old_to_new: &[Index]) -> usize {
    old_to_new
        .iter()
        .filter(|&&t| t != INVALID_INDEX)
        .map(|&t| t as usize + 1)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_are_grouped_and_sorted() {
        let inv = invert_mapping(&[1, 0, 1, INVALID_INDEX, 0], 2).unwrap();
        assert_eq!(inv.num_targets(), 2);
        assert_eq!(inv.sources(0), &[1, 4]);
        assert_eq!(inv.sources(1), &[0, 2]);
        assert!(inv.is_surjective());
        assert_eq!(inv.first_sources(), vec![1, 0]);
    }

    #[test]
    fn empty_targets_are_detected() {
        let inv = invert_mapping(&[0, 2], 3).unwrap();
        assert_eq!(inv.first_empty_target(), Some(1));
        assert!(invert_mapping(&[3], 3).is_err());
        assert_eq!(count_targets(&[0, 2, INVALID_INDEX]), 3);
    }

    #[test]
    fn backward_offsets_validated() {
        let inv = InverseMapping::from_backward(vec![2, 0, 1], Some(vec![0, 2, 3])).unwrap();
        assert_eq!(inv.sources(0), &[0, 2]);
        assert_eq!(inv.first_sources(), vec![0, 1]);
        assert_eq!(inv.sources(1), &[1]);
        assert!(InverseMapping::from_backward(vec![0], Some(vec![0, 2])).is_err());
        let plain = InverseMapping::from_backward(vec![5, 4], None).unwrap();
        assert_eq!(plain.sources(1), &[4]);
        assert_eq!(InverseMapping::identity(2).sources(1), &[1]);
    }
}
