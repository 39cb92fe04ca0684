pub use crate::criteria::{CmpOp, Criteria, Expr};
pub use crate::error::{GenepopError, Result, SubsampleKind};
pub use crate::identifier::{FieldType, FieldValue, IdSchema, IdSchemaBuilder, IdValues};
pub use crate::registry::{IndividualSubsample, LocusSubsample, PopulationSubsample, Selection, SubsampleRegistry};
pub use crate::sampling::cohorts::{CohortParams, CohortValue};
pub use crate::sampling::individuals::SizeBounds;
pub use crate::sampling::loci::LocusWindow;
pub use crate::sampling::relateds::RelatedsParams;
pub use crate::sampling::scheme::{SamplePlan, SamplingScheme, Scheme};
pub use crate::source::{GenepopSource, LocusLayout};
pub use crate::stats::{AlleleStatistics, StatsOptions};
pub use crate::writer::{LineTerminator, WriteOptions};
