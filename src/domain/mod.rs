// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts
// of a segmentation training run.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Plain Rust structs, enums, and traits; the one exception
//     is TrainError, whose variants keep the io / image error
//     they wrap as #[source] so the cause chain survives
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Typed failures of the driver
pub mod error;

// pixAcc / mIoU accumulator
pub mod metric;

// Validation score and best-score tracking
pub mod score;

// Seams between the loop controller and its collaborators
pub mod traits;
