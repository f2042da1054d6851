// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.
// The loaded struct is immutable and passed by reference to constructors.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::Path;
use crate::backend::{RenderError, SamplerSettings};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub graphics: GraphicsConfig,
    pub descriptors: DescriptorConfig,
    pub textures: TextureConfig,
    pub debug: DebugConfig,
}

/// Application identity
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Lit Renderer".to_string(),
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub max_frames_in_flight: usize,
    pub resolution: [u32; 2],
    pub shadow_map_size: u32,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: 2,
            resolution: [1280, 720],
            shadow_map_size: 2048,
        }
    }
}

/// Descriptor pool sizing
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    pub max_sets: u32,
    pub uniform_buffers_per_set: u32,
    pub samplers_per_set: u32,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            max_sets: 256,
            uniform_buffers_per_set: 2,
            samplers_per_set: 2,
        }
    }
}

/// Texture sampling settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub generate_mipmaps: bool,
    pub anisotropy: bool,
    pub max_anisotropy: f32,
}

impl Default for TextureConfig {
    fn default() -> Self {
        let sampler = SamplerSettings::default();
        Self {
            generate_mipmaps: sampler.generate_mipmaps,
            anisotropy: sampler.anisotropy,
            max_anisotropy: sampler.max_anisotropy,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    /// Frames the headless demo runs before tearing down
    pub demo_frames: u32,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: false,
            log_file: "vulkan_debug.log".to_string(),
            demo_frames: 120,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no resource could be created with
    pub fn validate(&self) -> std::result::Result<(), RenderError> {
        let invalid = |msg: &str| Err(RenderError::InvalidConfig(msg.to_string()));

        if self.graphics.max_frames_in_flight == 0 {
            return invalid("graphics.max_frames_in_flight must be at least 1");
        }
        if self.graphics.resolution.contains(&0) {
            return invalid("graphics.resolution must be non-zero");
        }
        if self.graphics.shadow_map_size == 0 {
            return invalid("graphics.shadow_map_size must be non-zero");
        }
        if self.descriptors.max_sets == 0 {
            return invalid("descriptors.max_sets must be at least 1");
        }
        if self.descriptors.uniform_buffers_per_set == 0 && self.descriptors.samplers_per_set == 0 {
            return invalid("descriptors must reserve at least one descriptor type");
        }
        Ok(())
    }

    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.graphics.resolution[0],
            height: self.graphics.resolution[1],
        }
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            generate_mipmaps: self.textures.generate_mipmaps,
            anisotropy: self.textures.anisotropy,
            max_anisotropy: self.textures.max_anisotropy,
        }
    }

    /// Pool sizes for `max_sets` sets of the configured shape
    pub fn descriptor_pool_sizes(&self) -> Vec<vk::DescriptorPoolSize> {
        let d = &self.descriptors;
        [
            (vk::DescriptorType::UNIFORM_BUFFER, d.uniform_buffers_per_set),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, d.samplers_per_set),
        ]
        .into_iter()
        .filter(|&(_, per_set)| per_set > 0)
        .map(|(ty, per_set)| vk::DescriptorPoolSize {
            ty,
            descriptor_count: per_set * d.max_sets,
        })
        .collect()
    }
}
