use anyhow::Result;
use minifb::{Key, Window, WindowOptions};

use crate::camera::Frame;
use crate::render::framebuffer::FrameBuffer;

/// minifbを使用したオーバーレイウィンドウ
///
/// 映像を背面に描き、その上に骨格レイヤーを重ねる。
/// `update` はリフレッシュレートに合わせて戻る。
pub struct OverlayWindow {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl OverlayWindow {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize, target_fps: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )?;
        window.set_target_fps(target_fps);

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// 現在のウィンドウサイズ。変わっていたらバッファも合わせる。
    pub fn size(&mut self) -> (usize, usize) {
        let (w, h) = self.window.get_size();
        let (w, h) = (w.max(1), h.max(1));
        if (w, h) != (self.width, self.height) {
            self.width = w;
            self.height = h;
            self.buffer = vec![0u32; w * h];
        }
        (self.width, self.height)
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    /// 映像フレームをウィンドウ全体に拡大縮小して描く（最近傍）
    pub fn draw_frame(&mut self, frame: &Frame) {
        if frame.is_empty() {
            self.buffer.fill(0);
            return;
        }
        let (fw, fh) = (frame.width() as usize, frame.height() as usize);
        for y in 0..self.height {
            let sy = y * fh / self.height;
            for x in 0..self.width {
                let sx = x * fw / self.width;
                let [r, g, b] = frame.rgb(sx as u32, sy as u32);
                self.buffer[y * self.width + x] = (r as u32) << 16 | (g as u32) << 8 | b as u32;
            }
        }
    }

    /// 骨格レイヤーを重ねる
    pub fn composite(&mut self, overlay: &FrameBuffer) {
        if (overlay.width(), overlay.height()) == (self.width, self.height) {
            overlay.composite_onto(&mut self.buffer);
        }
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }
}
