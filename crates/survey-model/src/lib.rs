pub mod audit;
pub mod code;
pub mod error;
pub mod quality;
pub mod redact;
pub mod registry;
pub mod rule;
pub mod taxonomy;

pub use audit::{ImputationOutcome, ImputationRecord, ImputedCell};
pub use code::{format_numeric, normalize_code, parse_number};
pub use error::{ModelError, Result};
pub use quality::QualityFlag;
pub use redact::{REDACTED_VALUE, log_data_enabled, redact_value, set_log_data};
pub use registry::{DataSource, StatusInfo, VariableMappingEntry, VariableStatus};
pub use rule::{CodeRange, Level, LevelMap, RecodeRule, VariableKind};
pub use taxonomy::{ResponseCategory, is_administered};
