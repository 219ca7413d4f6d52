//! Session configuration

/// What the session driver does when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop and return the error
    #[default]
    Halt,
    /// Log the error and keep stepping
    LogAndContinue,
}

/// Emulator settings handed to [`crate::system::NesSystem::with_config`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// Start here after reset instead of the reset vector
    /// (nestest automation mode uses `0xC000`)
    pub start_pc: Option<u16>,
    pub error_policy: ErrorPolicy,
    /// Upper bound on frames `run_frames` will emulate
    pub max_frames: Option<u64>,
}

impl EmulatorConfig {
    pub fn with_start_pc(mut self, pc: u16) -> Self {
        self.start_pc = Some(pc);
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Frames to run when `requested` are asked for
    pub fn frame_limit(&self, requested: u64) -> u64 {
        self.max_frames.map_or(requested, |max| requested.min(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_halt_on_error() {
        let config = EmulatorConfig::default();
        assert_eq!(config.error_policy, ErrorPolicy::Halt);
        assert_eq!(config.start_pc, None);
        assert_eq!(config.frame_limit(10), 10);
    }

    #[test]
    fn test_frame_limit_caps_request() {
        let config = EmulatorConfig::default().with_max_frames(3);
        assert_eq!(config.frame_limit(10), 3);
        assert_eq!(config.frame_limit(2), 2);
    }
}
