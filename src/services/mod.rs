mod content_extractor;
mod link_discovery;

pub use content_extractor::ContentExtractor;
pub use link_discovery::LinkDiscovery;
