use std::fmt;

/// Local workgroup dimensions of a compute shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GroupSize {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total invocations per workgroup.
    pub fn invocations(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y) * u64::from(self.z)
    }
}

impl Default for GroupSize {
    fn default() -> Self {
        Self::new(64, 1, 1)
    }
}

impl fmt::Display for GroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Presentation strategy requested from the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VsyncMode {
    /// Wait for vertical blank (FIFO).
    #[default]
    On,
    /// Prefer immediate presentation, falling back to mailbox and then FIFO.
    Off,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_size_counts_invocations() {
        let group = GroupSize::new(16, 16, 2);
        assert_eq!(group.invocations(), 512);
        assert_eq!(group.to_string(), "16x16x2");
        assert_eq!(GroupSize::default(), GroupSize::new(64, 1, 1));
    }
}
