// Lit Renderer - Vulkan resource core
//
// Device memory, buffers, textures, per-frame uniforms and descriptor
// binding for lit, textured, shadow-mapped scenes.

pub mod backend;
pub mod config;
pub mod scene;
