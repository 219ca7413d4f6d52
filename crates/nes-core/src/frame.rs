//! Completed frames and the renderer seam

/// Visible width in pixels
pub const WIDTH: usize = 256;
/// Visible height in pixels
pub const HEIGHT: usize = 240;

/// 256x240 RGBA8 picture
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; WIDTH * HEIGHT * 4],
        }
    }

    /// Row-major RGBA bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * WIDTH + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub(crate) fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        let i = (y * WIDTH + x) * 4;
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    /// Pixels packed as `0x00RRGGBB`, the layout most window toolkits blit
    pub fn to_rgb32(&self) -> Vec<u32> {
        self.pixels
            .chunks_exact(4)
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameBuffer({WIDTH}x{HEIGHT})")
    }
}

/// Consumer of completed frames
///
/// Called at most once per emulated frame with a buffer the emulator no
/// longer writes to.
pub trait Renderer {
    fn render(&mut self, frame: &FrameBuffer);
}

/// Keeps the most recent frame
#[derive(Debug, Default)]
pub struct LastFrame {
    pub frame: Option<FrameBuffer>,
    pub count: u64,
}

impl Renderer for LastFrame {
    fn render(&mut self, frame: &FrameBuffer) {
        self.frame = Some(frame.clone());
        self.count += 1;
    }
}
