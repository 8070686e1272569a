//! Class balancing of the training coordinates.

use rand::{seq::SliceRandom, Rng};

use crate::{
    error::{RoadSegError, RoadSegResult},
    geometry::SampleCoord,
    labels::{LabelClassLists, PixelClass},
};

/// One training example: a pixel of a training image and its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingSample {
    pub coord: SampleCoord,
    pub class: PixelClass,
}

/// The balanced training set.
///
/// Holds every background coordinate followed by the same number of road
/// coordinates. The two classes form contiguous blocks; mixing happens later
/// through per-epoch index permutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSet {
    samples: Vec<TrainingSample>,
}

impl TrainingSet {
    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples at the given positions, in the order given.
    pub fn select(&self, indices: &[usize]) -> Vec<TrainingSample> {
        indices.iter().map(|&index| self.samples[index]).collect()
    }
}

/// Equalises the class counts by replicating the road list.
///
/// The road list is shuffled, repeated `ceil(background / road)` times and cut
/// back to exactly as many coordinates as the background list. The result is
/// `background` followed by the replicated road coordinates.
///
/// Equal class counts are accepted and leave the road list at its shuffled
/// original length.
///
/// # Errors
///
/// Returns [`RoadSegError::ClassImbalance`] when there are no road pixels or
/// when road pixels outnumber background pixels.
pub fn balance<R: Rng + ?Sized>(
    lists: LabelClassLists,
    rng: &mut R,
) -> RoadSegResult<TrainingSet> {
    let LabelClassLists {
        background,
        mut road,
    } = lists;
    let (background_count, road_count) = (background.len(), road.len());
    if road_count == 0 || background_count < road_count {
        return Err(RoadSegError::ClassImbalance {
            background: background_count,
            road: road_count,
        });
    }

    road.shuffle(rng);
    let multiplier = background_count.div_ceil(road_count);
    let mut road = road.repeat(multiplier);
    road.truncate(background_count);

    tracing::info!(
        background = background_count,
        road = road_count,
        multiplier,
        "balanced training classes"
    );

    let samples = background
        .into_iter()
        .map(|coord| TrainingSample {
            coord,
            class: PixelClass::Background,
        })
        .chain(road.into_iter().map(|coord| TrainingSample {
            coord,
            class: PixelClass::Road,
        }))
        .collect();

    Ok(TrainingSet { samples })
}
