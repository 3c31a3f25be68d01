//! Runtime configuration.

/// Default number of commits one burst of self-triggered updates may cause
/// beyond the first before requests are dropped.
pub const DEFAULT_RENDER_BURST_CAP: u32 = 10;

/// Tunables of a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Render requests are dropped once an instance's burst counter exceeds
    /// this (default: 10).
    pub render_burst_cap: u32,
    /// Remove whatever the container holds before an instance's first commit
    /// (default: true).
    pub clear_container_on_first_render: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            render_burst_cap: DEFAULT_RENDER_BURST_CAP,
            clear_container_on_first_render: true,
        }
    }
}

impl RuntimeConfig {
    pub fn with_render_burst_cap(mut self, cap: u32) -> Self {
        self.render_burst_cap = cap;
        self
    }

    pub fn with_clear_container_on_first_render(mut self, clear: bool) -> Self {
        self.clear_container_on_first_render = clear;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.render_burst_cap, 10);
        assert!(config.clear_container_on_first_render);
    }

    #[test]
    fn test_builders() {
        let config = RuntimeConfig::default()
            .with_render_burst_cap(3)
            .with_clear_container_on_first_render(false);
        assert_eq!(config.render_burst_cap, 3);
        assert!(!config.clear_container_on_first_render);
    }
}
