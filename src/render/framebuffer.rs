use super::skeleton::Canvas;

/// 不透明フラグ。クリア済みのピクセルは 0。
const OPAQUE: u32 = 0xFF00_0000;

/// u32 ピクセルバッファの描画レイヤー。
/// 描いたピクセルだけを映像の上に重ねる。
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pixels: Vec<u32>,
    width: usize,
    height: usize,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// サイズが変わったら作り直す（中身は消える）
    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    /// (x, y) に描かれている色。未描画なら None。
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let px = self.pixels[y * self.width + x];
        (px & OPAQUE != 0).then_some(px & 0x00FF_FFFF)
    }

    /// 描画済みピクセルを同じサイズの `dst` に重ねる
    pub fn composite_onto(&self, dst: &mut [u32]) {
        for (d, &s) in dst.iter_mut().zip(self.pixels.iter()) {
            if s & OPAQUE != 0 {
                *d = s & 0x00FF_FFFF;
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.pixels[y as usize * self.width + x as usize] = OPAQUE | color;
        }
    }

    /// 線分をキャンバス（＋ブラシ幅）の矩形に切り詰める（Liang-Barsky）。
    /// 完全に外なら None。
    fn clip_segment(&self, from: (f32, f32), to: (f32, f32), margin: f32) -> Option<((f32, f32), (f32, f32))> {
        // 遠い端点でも誤差が出ないよう f64 で計算
        let (fx, fy) = (from.0 as f64, from.1 as f64);
        let dx = to.0 as f64 - fx;
        let dy = to.1 as f64 - fy;
        let margin = margin as f64;
        let (x_min, y_min) = (-margin, -margin);
        let x_max = self.width as f64 - 1.0 + margin;
        let y_max = self.height as f64 - 1.0 + margin;

        let mut t0 = 0.0f64;
        let mut t1 = 1.0f64;
        for (p, q) in [(-dx, fx - x_min), (dx, x_max - fx), (-dy, fy - y_min), (dy, y_max - fy)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }

        Some((
            ((fx + t0 * dx) as f32, (fy + t0 * dy) as f32),
            ((fx + t1 * dx) as f32, (fy + t1 * dy) as f32),
        ))
    }

    /// 線幅ぶんの正方形ブラシ
    fn stamp(&mut self, x: i32, y: i32, width: i32, color: u32) {
        let lo = -(width - 1) / 2;
        for dy in lo..lo + width {
            for dx in lo..lo + width {
                self.set_pixel(x + dx, y + dy, color);
            }
        }
    }
}

impl Canvas for FrameBuffer {
    fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Bresenhamのアルゴリズムで線を描画
    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: u32, width: f32) {
        let brush = (width.round() as i32).max(1);
        if ![from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
            return;
        }
        let Some((from, to)) = self.clip_segment(from, to, brush as f32) else {
            return;
        };
        let (x0, y0) = (from.0.round() as i32, from.1.round() as i32);
        let (x1, y1) = (to.0.round() as i32, to.1.round() as i32);

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.stamp(x, y, brush, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn circle(&mut self, center: (f32, f32), radius: f32, fill: u32, outline: u32, outline_width: f32) {
        let half = outline_width / 2.0;
        let outer = radius + half;
        let inner = radius - half;
        let reach = outer.ceil() as i32;
        let (cx, cy) = (center.0.round() as i32, center.1.round() as i32);

        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let d = ((dx * dx + dy * dy) as f32).sqrt();
                if d > outer {
                    continue;
                }
                let color = if outline_width > 0.0 && d >= inner { outline } else { fill };
                self.set_pixel(cx + dx, cy + dy, color);
            }
        }
    }
}
