//! List pages: configuration, sources, execution and presentation.

pub mod builder;
pub mod configuration;
pub mod execution;
pub mod extension;
pub mod source;

pub use builder::{ListBuild, ListBuilder, ListItem, PagerInfo, SelectedFilter};
pub use configuration::{
    CONFIGURATION_VERSION, ContextualPresetFilter, ContextualValueSource, ListPageConfiguration,
    ListPresetFilter, SortSpec,
};
pub use execution::{ListExecution, ListExecutionManager, ListRequest};
pub use extension::{ListExtension, ListExtensionRegistry};
pub use source::{ListSource, ListSourceRegistry, SortOption, facet_source_id};
