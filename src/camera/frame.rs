use std::sync::Arc;

/// RGB8 の映像フレーム。画素バッファは共有されるので clone は安価。
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Frame {
    /// `pixels` は行優先の RGB で、長さは width * height * 3 であること
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> anyhow::Result<Self> {
        let pixels = pixels.into();
        let expected = width as usize * height as usize * 3;
        anyhow::ensure!(
            pixels.len() == expected,
            "frame {}x{} needs {} bytes, got {}",
            width,
            height,
            expected,
            pixels.len()
        );
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 単色フレーム
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// (x, y) の RGB
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }
}

/// 現在のフレームを要求に応じて返す。キャプチャのライフサイクルは持たない。
pub trait FrameSource {
    /// まだ再生が始まっていなければ None
    fn current_frame(&self) -> Option<Frame>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn current_frame(&self) -> Option<Frame> {
        (**self).current_frame()
    }
}
