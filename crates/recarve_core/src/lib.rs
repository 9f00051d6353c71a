pub mod engine;
mod error;
pub mod groups;
pub mod reader;
pub mod scanners;
pub mod signatures;
pub mod sink;
mod traits;

pub use engine::{CarveConfig, CarveEvent, CarveSummary, CarvingEngine, PassSummary, RecoveredFile};
pub use error::{CoreError, Result};
pub use groups::{GroupAllocator, GroupNaming, RecoveryGroup};
pub use reader::BlockReader;
pub use scanners::SignatureScanner;
pub use signatures::{Category, EndMarker, Selection, Signature, SignatureRegistry};
pub use sink::{MemorySink, OutputSink};
pub use traits::BlockSource;
