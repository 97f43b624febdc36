//! On-disk fixtures shared by the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mammotex_pipeline::registry::{PatientId, PatientRegistry};
use ndarray::Array2;
use ndarray_npy::write_npy;

pub const FEATURES: [&str; 3] = ["a", "b", "c"];

pub fn sample_dir(root: &Path, patient_id: PatientId, sample: &str) -> PathBuf {
    let dir = root.join(patient_id.to_string()).join(sample);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Mean and std tables with one row, columns in reverse catalog order.
pub fn write_stats(dir: &Path, means: [f64; 3], stds: [f64; 3]) {
    let sample = dir.file_name().unwrap().to_string_lossy().into_owned();
    let row = |v: [f64; 3]| format!("c,b,a\n{},{},{}\n", v[2], v[1], v[0]);
    std::fs::write(dir.join(format!("{}_mean.csv", sample)), row(means)).unwrap();
    std::fs::write(dir.join(format!("{}_std.csv", sample)), row(stds)).unwrap();
}

/// A full-ones mask and one ramp map per feature, offset by `fill`.
pub fn write_maps(dir: &Path, shape: (usize, usize), fill: f32) {
    let sample = dir.file_name().unwrap().to_string_lossy().into_owned();
    write_npy(dir.join(format!("{}_mask.npy", sample)), &Array2::<f32>::ones(shape)).unwrap();
    for (k, feature) in FEATURES.iter().enumerate() {
        let map = Array2::from_shape_fn(shape, |(r, c)| fill * (k as f32 + 1.0) + (r * shape.1 + c) as f32);
        write_npy(dir.join(format!("{}_feature_{}.npy", sample, feature)), &map).unwrap();
    }
}

pub fn write_labels(path: &Path, labels: &[(PatientId, bool)]) {
    let mut text = String::from("patient_id,case_status\n");
    for (id, label) in labels {
        text.push_str(&format!("{},{}\n", id, u8::from(*label)));
    }
    std::fs::write(path, text).unwrap();
}

pub fn registry(labels: &[(PatientId, bool)]) -> PatientRegistry {
    PatientRegistry::from_records(labels.iter().copied()).unwrap()
}

/// Four patients with tabular and imaging artifacts; patient 1 has two images.
pub fn small_cohort(root: &Path) -> Vec<(PatientId, bool)> {
    let labels = vec![(1, true), (2, false), (3, false), (4, true)];
    for (id, sample, fill) in [
        (1, "L_CC", 1.0f32),
        (1, "R_CC", 2.0),
        (2, "L_CC", -3.0),
        (3, "R_MLO", 4.0),
        (4, "L_MLO", -5.0),
    ] {
        let dir = sample_dir(root, id, sample);
        let base = id as f64;
        write_stats(&dir, [base, base + 1.0, base + 2.0], [0.1, 0.2, 0.3]);
        write_maps(&dir, (6, 5), fill);
    }
    labels
}
