//! File formats read and written by the pipeline.
pub mod artifacts;
pub mod feature_table;
pub mod partition_record;
pub mod stats_table;
pub mod tensor_export;
pub mod volume;

pub use artifacts::{parse_artifact, scan_sample_dir, Artifact, ArtifactKind, SampleArtifacts};
pub use feature_table::{read_feature_table, write_feature_table};
pub use partition_record::{read_partition_record, write_partition_record};
pub use tensor_export::export_tensors;
