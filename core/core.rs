pub mod builder;
pub mod config;
pub mod entry;
pub mod error;
pub mod explain;
pub mod export;
pub mod file_types;
pub mod filter;
pub mod loader;
pub mod overrides;
pub mod reader;
pub mod rules;
pub mod selection;
pub mod workspace;

pub use builder::{build_annotated_tree, build_complete_tree};
pub use config::{Config, ExportConfig, RulesConfig};
pub use entry::{Entry, EntryHandle, EntryKind, Selection, Tree, TreeStats};
pub use error::{AppError, Result};
pub use explain::{ExclusionReason, InclusionRecord, InclusionStatus, inclusion_report};
pub use export::{
    ExportArtifact, ExportItem, ExportOptions, ExportRecord, RecordOutcome, assemble, collect,
    compose_prompt, estimate_tokens,
};
pub use file_types::{FileCategory, FileClassifier};
pub use filter::apply_filters;
pub use loader::{LoadOutcome, LoadTicket, LoadToken, load_children};
pub use overrides::OverrideSet;
pub use reader::{DirectoryReader, FileReader, LocalFs, MemoryFs, RawEntry};
pub use rules::{ActiveRules, ExclusionRule, RuleOrigin, RuleRegistry};
pub use selection::update_selection;
pub use workspace::{LoadStep, RootSelection, Workspace};
