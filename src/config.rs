use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::device::Backend;
use crate::render::RenderStyle;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// MoveNet Lightning (ONNX) のパス
    #[serde(default = "default_model_path")]
    pub path: String,
    /// "gpu" なら CUDA を試す（cuda feature が必要）
    #[serde(default = "default_backend")]
    pub backend: Backend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_joint_radius")]
    pub joint_radius: f32,
    #[serde(default = "default_line_width")]
    pub line_width: f32,
    #[serde(default = "default_outline_width")]
    pub outline_width: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    #[serde(default = "default_window_title")]
    pub title: String,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

fn default_model_path() -> String { "models/movenet_lightning.onnx".to_string() }
fn default_backend() -> Backend { Backend::Gpu }
fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }
fn default_joint_radius() -> f32 { 5.0 }
fn default_line_width() -> f32 { 2.0 }
fn default_outline_width() -> f32 { 1.0 }
fn default_window_title() -> String { "Pose Overlay".to_string() }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            backend: default_backend(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            joint_radius: default_joint_radius(),
            line_width: default_line_width(),
            outline_width: default_outline_width(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_window_title(),
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

impl From<&RenderConfig> for RenderStyle {
    fn from(config: &RenderConfig) -> Self {
        Self {
            joint_radius: config.joint_radius,
            line_width: config.line_width,
            outline_width: config.outline_width,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 読めなければデフォルト値で続行する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = format!("{:#}", e), "using default config");
                Self::default()
            }
        }
    }
}
