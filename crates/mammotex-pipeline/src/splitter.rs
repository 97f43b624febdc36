//! Patient-level train/test partitioning.
//!
//! Splits are drawn over patient ids, never over samples, so that all images of
//! one patient land on the same side. Label balance is not enforced; it is
//! measured after the fact by [`LabelBalance`] and logged.
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::PipelineError;
use crate::io::partition_record::{read_partition_record, write_partition_record};
use crate::registry::{PatientId, PatientRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Train,
    Test,
}

/// Disjoint train/test patient sets. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    train: BTreeSet<PatientId>,
    test: BTreeSet<PatientId>,
}

impl Partition {
    pub fn from_assignment<I, J>(train: I, test: J) -> Result<Self>
    where
        I: IntoIterator<Item = PatientId>,
        J: IntoIterator<Item = PatientId>,
    {
        let train: BTreeSet<PatientId> = train.into_iter().collect();
        let test: BTreeSet<PatientId> = test.into_iter().collect();
        if let Some(shared) = train.intersection(&test).next() {
            return Err(PipelineError::InvalidSplit(format!(
                "patient {} assigned to both train and test",
                shared
            ))
            .into());
        }
        Ok(Self { train, test })
    }

    /// Rebuild a partition from the two record files written by a previous split.
    pub fn from_records(train_path: &Path, test_path: &Path) -> Result<Self> {
        PartitionRecords::read(train_path, test_path)?.partition()
    }

    pub fn train_ids(&self) -> &BTreeSet<PatientId> {
        &self.train
    }

    pub fn test_ids(&self) -> &BTreeSet<PatientId> {
        &self.test
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn side_of(&self, patient_id: PatientId) -> Option<Side> {
        if self.train.contains(&patient_id) {
            Some(Side::Train)
        } else if self.test.contains(&patient_id) {
            Some(Side::Test)
        } else {
            None
        }
    }

    /// Attach labels to both sides, in patient id order.
    pub fn records(&self, registry: &PatientRegistry) -> Result<PartitionRecords> {
        let label_all = |ids: &BTreeSet<PatientId>| -> Result<Vec<(PatientId, bool)>> {
            ids.iter()
                .map(|&id| -> Result<(PatientId, bool)> { Ok((id, registry.label(id)?)) })
                .collect()
        };
        Ok(PartitionRecords {
            train: label_all(&self.train)?,
            test: label_all(&self.test)?,
        })
    }
}

/// Split `patient_ids` into `round(train_fraction * n)` train patients and the rest.
///
/// The train set is a seeded sample without replacement over the ids in
/// ascending order, so the same population, fraction and seed always give the
/// same assignment.
pub fn split_patients(
    patient_ids: &BTreeSet<PatientId>,
    train_fraction: f64,
    seed: u64,
) -> Result<Partition> {
    if !(0.0..=1.0).contains(&train_fraction) {
        return Err(PipelineError::InvalidSplit(format!(
            "train fraction {} is outside [0, 1]",
            train_fraction
        ))
        .into());
    }
    if patient_ids.is_empty() {
        return Err(PipelineError::EmptyInput("no patients to split".to_string()).into());
    }

    let ids: Vec<PatientId> = patient_ids.iter().copied().collect();
    let n_train = (train_fraction * ids.len() as f64).round() as usize;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let chosen = rand::seq::index::sample(&mut rng, ids.len(), n_train);

    let train: BTreeSet<PatientId> = chosen.iter().map(|i| ids[i]).collect();
    let test = ids.iter().copied().filter(|id| !train.contains(id));

    let partition = Partition::from_assignment(train.iter().copied(), test)?;
    log::info!(
        "Split {} patients with seed {}: train={}, test={}",
        ids.len(),
        seed,
        partition.train.len(),
        partition.test.len()
    );
    Ok(partition)
}

/// `(patient_id, label)` rows of both sides of a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecords {
    pub train: Vec<(PatientId, bool)>,
    pub test: Vec<(PatientId, bool)>,
}

impl PartitionRecords {
    pub fn write(&self, train_path: &Path, test_path: &Path) -> Result<()> {
        write_partition_record(train_path, &self.train)?;
        write_partition_record(test_path, &self.test)?;
        log::info!(
            "Recorded partition to {} and {}",
            train_path.display(),
            test_path.display()
        );
        Ok(())
    }

    pub fn read(train_path: &Path, test_path: &Path) -> Result<Self> {
        Ok(Self {
            train: read_partition_record(train_path)?,
            test: read_partition_record(test_path)?,
        })
    }

    pub fn partition(&self) -> Result<Partition> {
        Partition::from_assignment(
            self.train.iter().map(|&(id, _)| id),
            self.test.iter().map(|&(id, _)| id),
        )
    }

    /// Labels of every recorded patient, for reuse without the label table.
    pub fn registry(&self) -> Result<PatientRegistry> {
        PatientRegistry::from_records(self.train.iter().chain(&self.test).copied())
    }

    pub fn label_balance(&self) -> LabelBalance {
        let cases = |rows: &[(PatientId, bool)]| rows.iter().filter(|(_, label)| *label).count();
        LabelBalance {
            train_patients: self.train.len(),
            train_cases: cases(&self.train),
            test_patients: self.test.len(),
            test_cases: cases(&self.test),
        }
    }
}

/// Realized case ratios of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelBalance {
    pub train_patients: usize,
    pub train_cases: usize,
    pub test_patients: usize,
    pub test_cases: usize,
}

fn ratio(cases: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        cases as f64 / total as f64
    }
}

impl LabelBalance {
    pub fn population_ratio(&self) -> f64 {
        ratio(
            self.train_cases + self.test_cases,
            self.train_patients + self.test_patients,
        )
    }

    pub fn train_ratio(&self) -> f64 {
        ratio(self.train_cases, self.train_patients)
    }

    pub fn test_ratio(&self) -> f64 {
        ratio(self.test_cases, self.test_patients)
    }

    /// Largest absolute gap between a side's case ratio and the population's.
    pub fn max_deviation(&self) -> f64 {
        let population = self.population_ratio();
        let mut deviation = 0.0f64;
        if self.train_patients > 0 {
            deviation = deviation.max((self.train_ratio() - population).abs());
        }
        if self.test_patients > 0 {
            deviation = deviation.max((self.test_ratio() - population).abs());
        }
        deviation
    }

    pub fn log_summary(&self) {
        log::info!("----- Partition Label Balance -----");
        log::info!(
            "population: {:.3} cases ({} patients)",
            self.population_ratio(),
            self.train_patients + self.test_patients
        );
        log::info!(
            "train: {} cases / {} patients ({:.3})",
            self.train_cases,
            self.train_patients,
            self.train_ratio()
        );
        log::info!(
            "test: {} cases / {} patients ({:.3})",
            self.test_cases,
            self.test_patients,
            self.test_ratio()
        );
        log::info!("max deviation from population: {:.3}", self.max_deviation());
    }
}

/// Reuse the records at the given paths when both exist, otherwise split and record.
pub fn load_or_split(
    patient_ids: &BTreeSet<PatientId>,
    registry: &PatientRegistry,
    train_fraction: f64,
    seed: u64,
    train_path: &Path,
    test_path: &Path,
) -> Result<PartitionRecords> {
    if train_path.exists() && test_path.exists() {
        log::info!(
            "Reusing recorded partition {} / {}",
            train_path.display(),
            test_path.display()
        );
        let records = PartitionRecords::read(train_path, test_path)?;
        let partition = records.partition()?;
        if let Some(missing) = patient_ids.iter().find(|id| partition.side_of(**id).is_none()) {
            bail!(
                "recorded partition does not cover patient {}; remove {} and {} to re-split",
                missing,
                train_path.display(),
                test_path.display()
            );
        }
        return Ok(records);
    }

    let partition = split_patients(patient_ids, train_fraction, seed)?;
    let records = partition.records(registry)?;
    records.write(train_path, test_path)?;
    Ok(records)
}
