// Descriptor set layouts, pools, sets and binding updates
//
// Pools are fixed-capacity: the declared set count and per-type descriptor
// counts are tracked on the CPU and an allocation that would exceed them
// fails instead of growing the pool. Sets hold a weak token of their pool
// so use after the pool is destroyed or reset is caught.

use ash::vk;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use super::buffer::{Buffer, BufferView};
use super::error::{RenderError, Result};
use super::texture::Texture;
use super::VulkanDevice;

/// Per-type descriptor counts, one entry per type
pub type DescriptorCounts = Vec<(vk::DescriptorType, u32)>;

/// Sum descriptor counts per type, preserving first-seen order
fn merge_counts<I>(counts: I) -> DescriptorCounts
where
    I: IntoIterator<Item = (vk::DescriptorType, u32)>,
{
    let mut merged: DescriptorCounts = Vec::new();
    for (ty, count) in counts {
        match merged.iter_mut().find(|(t, _)| *t == ty) {
            Some((_, total)) => *total += count,
            None => merged.push((ty, count)),
        }
    }
    merged
}

// =============================================================================
// LAYOUTS
// =============================================================================

/// Builder for descriptor set layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding
    pub fn binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    pub fn uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, 1, stage_flags)
    }

    pub fn storage_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::STORAGE_BUFFER, 1, stage_flags)
    }

    pub fn combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, stage_flags)
    }

    pub fn sampled_image(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::SAMPLED_IMAGE, 1, stage_flags)
    }

    pub fn uniform_texel_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_TEXEL_BUFFER, 1, stage_flags)
    }

    /// Descriptors one set with this layout consumes from a pool
    pub fn counts(&self) -> DescriptorCounts {
        merge_counts(self.bindings.iter().map(|b| (b.descriptor_type, b.descriptor_count)))
    }

    pub fn build(self, device: &Arc<VulkanDevice>) -> Result<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(&self.bindings);

        let handle = unsafe { device.device.create_descriptor_set_layout(&layout_info, None)? };

        Ok(DescriptorSetLayout {
            handle,
            counts: self.counts(),
            bindings: self.bindings,
            device: device.clone(),
        })
    }
}

/// Descriptor set layout with its binding table
pub struct DescriptorSetLayout {
    pub handle: vk::DescriptorSetLayout,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
    counts: DescriptorCounts,
    device: Arc<VulkanDevice>,
}

impl DescriptorSetLayout {
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    pub fn counts(&self) -> &[(vk::DescriptorType, u32)] {
        &self.counts
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_descriptor_set_layout(self.handle, None);
        }
    }
}

// =============================================================================
// POOL CAPACITY
// =============================================================================

/// CPU-side bookkeeping of what a pool can still hand out
#[derive(Debug, Clone)]
pub struct PoolBudget {
    max_sets: u32,
    outstanding: u32,
    declared: HashMap<vk::DescriptorType, u32>,
    remaining: HashMap<vk::DescriptorType, u32>,
}

impl PoolBudget {
    pub fn new(pool_sizes: &[vk::DescriptorPoolSize], max_sets: u32) -> Result<Self> {
        if pool_sizes.is_empty() {
            return Err(RenderError::EmptyPoolSizes);
        }
        if max_sets == 0 {
            return Err(RenderError::InvalidConfig(
                "descriptor pool max_sets must be at least 1".to_string(),
            ));
        }

        let declared: HashMap<_, _> = merge_counts(
            pool_sizes.iter().map(|s| (s.ty, s.descriptor_count)),
        )
        .into_iter()
        .collect();

        Ok(Self {
            max_sets,
            outstanding: 0,
            remaining: declared.clone(),
            declared,
        })
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn remaining(&self, ty: vk::DescriptorType) -> u32 {
        self.remaining.get(&ty).copied().unwrap_or(0)
    }

    /// Reserve one set per entry of `sets`, all or nothing
    pub fn reserve(&mut self, sets: &[&[(vk::DescriptorType, u32)]]) -> Result<()> {
        let requested = sets.len() as u32;
        if self.outstanding + requested > self.max_sets {
            return Err(RenderError::PoolExhausted {
                requested,
                outstanding: self.outstanding,
                max_sets: self.max_sets,
            });
        }

        let totals = merge_counts(sets.iter().flat_map(|counts| counts.iter().copied()));
        for &(ty, count) in &totals {
            let available = self.remaining(ty);
            if count > available {
                return Err(RenderError::PoolTypeExhausted {
                    ty,
                    requested: count,
                    available,
                });
            }
        }

        for (ty, count) in totals {
            if let Some(left) = self.remaining.get_mut(&ty) {
                *left -= count;
            }
        }
        self.outstanding += requested;
        Ok(())
    }

    /// Return one set's descriptors to the pool
    pub fn release(&mut self, counts: &[(vk::DescriptorType, u32)]) {
        self.outstanding = self.outstanding.saturating_sub(1);
        for &(ty, count) in counts {
            if let (Some(left), Some(&cap)) = (self.remaining.get_mut(&ty), self.declared.get(&ty)) {
                *left = (*left + count).min(cap);
            }
        }
    }

    pub fn reset(&mut self) {
        self.outstanding = 0;
        self.remaining = self.declared.clone();
    }
}

// =============================================================================
// POOL
// =============================================================================

/// Fixed-capacity descriptor pool
pub struct DescriptorPool {
    pub handle: vk::DescriptorPool,
    budget: PoolBudget,
    /// Replaced on reset and dropped with the pool; sets keep a `Weak` to it
    liveness: Arc<()>,
    device: Arc<VulkanDevice>,
}

impl DescriptorPool {
    /// Create a pool serving up to `max_sets` sets drawn from `pool_sizes`
    pub fn new(
        device: &Arc<VulkanDevice>,
        pool_sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
    ) -> Result<Self> {
        let budget = PoolBudget::new(pool_sizes, max_sets)?;

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let handle = unsafe { device.device.create_descriptor_pool(&pool_info, None)? };

        log::info!("Created descriptor pool: {} sets, {} pool size(s)", max_sets, pool_sizes.len());

        Ok(Self {
            handle,
            budget,
            liveness: Arc::new(()),
            device: device.clone(),
        })
    }

    pub fn max_sets(&self) -> u32 {
        self.budget.max_sets()
    }

    /// Sets currently allocated and not freed
    pub fn outstanding(&self) -> u32 {
        self.budget.outstanding()
    }

    pub fn remaining(&self, ty: vk::DescriptorType) -> u32 {
        self.budget.remaining(ty)
    }

    /// Allocate one set per layout in a single call
    pub fn allocate(&mut self, layouts: &[&DescriptorSetLayout]) -> Result<Vec<DescriptorSet>> {
        if layouts.is_empty() {
            return Ok(Vec::new());
        }

        let demands: Vec<&[(vk::DescriptorType, u32)]> =
            layouts.iter().map(|layout| layout.counts()).collect();
        self.budget.reserve(&demands)?;

        let handles: Vec<vk::DescriptorSetLayout> = layouts.iter().map(|l| l.handle).collect();
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.handle)
            .set_layouts(&handles);

        let sets = match unsafe { self.device.device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(e) => {
                for counts in &demands {
                    self.budget.release(counts);
                }
                return Err(match e {
                    vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                        RenderError::PoolExhausted {
                            requested: layouts.len() as u32,
                            outstanding: self.budget.outstanding(),
                            max_sets: self.budget.max_sets(),
                        }
                    }
                    other => other.into(),
                });
            }
        };

        let token = Arc::downgrade(&self.liveness);
        Ok(sets
            .into_iter()
            .zip(layouts)
            .map(|(handle, layout)| DescriptorSet {
                handle,
                pool: token.clone(),
                counts: layout.counts().to_vec(),
            })
            .collect())
    }

    /// Return sets to the pool
    pub fn free(&mut self, sets: Vec<DescriptorSet>) -> Result<()> {
        if sets.is_empty() {
            return Ok(());
        }

        let token = Arc::downgrade(&self.liveness);
        for set in &sets {
            if !set.is_valid() {
                return Err(RenderError::StaleDescriptorSet);
            }
            if !Weak::ptr_eq(&set.pool, &token) {
                return Err(RenderError::ForeignDescriptorSet);
            }
        }

        let handles: Vec<vk::DescriptorSet> = sets.iter().map(|s| s.handle).collect();
        unsafe { self.device.device.free_descriptor_sets(self.handle, &handles)? };

        for set in &sets {
            self.budget.release(&set.counts);
        }
        Ok(())
    }

    /// Free every set at once. Outstanding `DescriptorSet`s become stale.
    pub fn reset(&mut self) -> Result<()> {
        unsafe {
            self.device
                .device
                .reset_descriptor_pool(self.handle, vk::DescriptorPoolResetFlags::empty())?;
        }
        self.liveness = Arc::new(());
        self.budget.reset();
        Ok(())
    }

    /// Destroy the pool now; every set drawn from it becomes stale
    pub fn destroy(self) {}
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        log::info!("Destroying descriptor pool ({} set(s) outstanding)", self.budget.outstanding());
        unsafe {
            self.device.device.destroy_descriptor_pool(self.handle, None);
        }
    }
}

// =============================================================================
// SETS AND WRITES
// =============================================================================

/// Descriptor set allocated from a `DescriptorPool`
#[derive(Debug)]
pub struct DescriptorSet {
    handle: vk::DescriptorSet,
    pool: Weak<()>,
    counts: DescriptorCounts,
}

impl DescriptorSet {
    /// Whether the owning pool is still alive and has not been reset
    pub fn is_valid(&self) -> bool {
        self.pool.strong_count() > 0
    }

    /// Raw handle for binding at draw time
    pub fn handle(&self) -> Result<vk::DescriptorSet> {
        if self.is_valid() {
            Ok(self.handle)
        } else {
            Err(RenderError::StaleDescriptorSet)
        }
    }

    /// Write every entry of `writes` into this set in one update call.
    ///
    /// Takes effect for command buffers submitted after this returns.
    pub fn update(&self, device: &VulkanDevice, writes: &[DescriptorWrite]) -> Result<()> {
        let set = self.handle()?;
        if writes.is_empty() {
            return Ok(());
        }

        let prepared = PreparedWrites::new(writes);
        let vk_writes = prepared.to_vk(set);

        unsafe { device.device.update_descriptor_sets(&vk_writes, &[]) };
        Ok(())
    }
}

/// One binding update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescriptorWrite {
    UniformBuffer {
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    StorageBuffer {
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    CombinedImageSampler {
        binding: u32,
        sampler: vk::Sampler,
        image_view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    /// `buffer`, `offset` and `range` describe what `view` covers; only the view is written
    UniformTexelBuffer {
        binding: u32,
        buffer: vk::Buffer,
        view: vk::BufferView,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    SampledImage {
        binding: u32,
        image_view: vk::ImageView,
        layout: vk::ImageLayout,
    },
}

impl DescriptorWrite {
    /// Whole `buffer` as a uniform buffer
    pub fn uniform_buffer(binding: u32, buffer: &Buffer) -> Self {
        Self::UniformBuffer {
            binding,
            buffer: buffer.handle,
            offset: 0,
            range: buffer.size,
        }
    }

    pub fn storage_buffer(binding: u32, buffer: &Buffer) -> Self {
        Self::StorageBuffer {
            binding,
            buffer: buffer.handle,
            offset: 0,
            range: buffer.size,
        }
    }

    /// Texture's view and sampler in the layout it is sampled in
    pub fn texture(binding: u32, texture: &Texture) -> Self {
        Self::CombinedImageSampler {
            binding,
            sampler: texture.sampler,
            image_view: texture.image.view,
            layout: texture.sampled_layout(),
        }
    }

    pub fn texel_buffer(binding: u32, buffer: &Buffer, view: &BufferView) -> Self {
        Self::UniformTexelBuffer {
            binding,
            buffer: buffer.handle,
            view: view.handle,
            offset: 0,
            range: buffer.size,
        }
    }

    /// Image view without sampler, in `SHADER_READ_ONLY_OPTIMAL`
    pub fn sampled_image(binding: u32, image_view: vk::ImageView) -> Self {
        Self::SampledImage {
            binding,
            image_view,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    pub fn binding(&self) -> u32 {
        match *self {
            Self::UniformBuffer { binding, .. }
            | Self::StorageBuffer { binding, .. }
            | Self::CombinedImageSampler { binding, .. }
            | Self::UniformTexelBuffer { binding, .. }
            | Self::SampledImage { binding, .. } => binding,
        }
    }

    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Self::UniformBuffer { .. } => vk::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer { .. } => vk::DescriptorType::STORAGE_BUFFER,
            Self::CombinedImageSampler { .. } => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Self::UniformTexelBuffer { .. } => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            Self::SampledImage { .. } => vk::DescriptorType::SAMPLED_IMAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum InfoSlot {
    Buffer(usize),
    Image(usize),
    TexelView(usize),
}

/// Info arrays for a batch of writes. Must outlive the `vk::WriteDescriptorSet`s
/// built from it, which point into these vectors.
struct PreparedWrites {
    entries: Vec<(u32, vk::DescriptorType, InfoSlot)>,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    image_infos: Vec<vk::DescriptorImageInfo>,
    texel_views: Vec<vk::BufferView>,
}

impl PreparedWrites {
    fn new(writes: &[DescriptorWrite]) -> Self {
        let mut prepared = Self {
            entries: Vec::with_capacity(writes.len()),
            buffer_infos: Vec::new(),
            image_infos: Vec::new(),
            texel_views: Vec::new(),
        };

        for write in writes {
            let slot = match *write {
                DescriptorWrite::UniformBuffer { buffer, offset, range, .. }
                | DescriptorWrite::StorageBuffer { buffer, offset, range, .. } => {
                    prepared.buffer_infos.push(vk::DescriptorBufferInfo { buffer, offset, range });
                    InfoSlot::Buffer(prepared.buffer_infos.len() - 1)
                }
                DescriptorWrite::CombinedImageSampler { sampler, image_view, layout, .. } => {
                    prepared.image_infos.push(vk::DescriptorImageInfo {
                        sampler,
                        image_view,
                        image_layout: layout,
                    });
                    InfoSlot::Image(prepared.image_infos.len() - 1)
                }
                DescriptorWrite::SampledImage { image_view, layout, .. } => {
                    prepared.image_infos.push(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view,
                        image_layout: layout,
                    });
                    InfoSlot::Image(prepared.image_infos.len() - 1)
                }
                DescriptorWrite::UniformTexelBuffer { view, .. } => {
                    prepared.texel_views.push(view);
                    InfoSlot::TexelView(prepared.texel_views.len() - 1)
                }
            };
            prepared.entries.push((write.binding(), write.descriptor_type(), slot));
        }

        prepared
    }

    fn to_vk(&self, set: vk::DescriptorSet) -> Vec<vk::WriteDescriptorSet> {
        self.entries
            .iter()
            .map(|&(binding, ty, slot)| {
                let write = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(ty);

                match slot {
                    InfoSlot::Buffer(i) => write
                        .buffer_info(std::slice::from_ref(&self.buffer_infos[i]))
                        .build(),
                    InfoSlot::Image(i) => write
                        .image_info(std::slice::from_ref(&self.image_infos[i]))
                        .build(),
                    InfoSlot::TexelView(i) => write
                        .texel_buffer_view(std::slice::from_ref(&self.texel_views[i]))
                        .build(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    const UBO: vk::DescriptorType = vk::DescriptorType::UNIFORM_BUFFER;
    const SAMPLER: vk::DescriptorType = vk::DescriptorType::COMBINED_IMAGE_SAMPLER;

    fn pool_size(ty: vk::DescriptorType, descriptor_count: u32) -> vk::DescriptorPoolSize {
        vk::DescriptorPoolSize { ty, descriptor_count }
    }

    #[test]
    fn empty_pool_sizes_are_rejected() {
        assert!(matches!(PoolBudget::new(&[], 4), Err(RenderError::EmptyPoolSizes)));
        assert!(matches!(
            PoolBudget::new(&[pool_size(UBO, 1)], 0),
            Err(RenderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn exactly_max_sets_allocations_succeed() {
        let mut budget = PoolBudget::new(&[pool_size(UBO, 100)], 3).unwrap();
        let layout: &[(vk::DescriptorType, u32)] = &[(UBO, 1)];

        for _ in 0..3 {
            budget.reserve(&[layout]).unwrap();
        }
        assert_eq!(budget.outstanding(), 3);

        let err = budget.reserve(&[layout]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::PoolExhausted { requested: 1, outstanding: 3, max_sets: 3 }
        ));
    }

    #[test]
    fn batch_reservation_is_all_or_nothing() {
        let mut budget = PoolBudget::new(&[pool_size(UBO, 10)], 2).unwrap();
        let layout: &[(vk::DescriptorType, u32)] = &[(UBO, 1)];

        assert!(budget.reserve(&[layout, layout, layout]).is_err());
        assert_eq!(budget.outstanding(), 0);
        assert_eq!(budget.remaining(UBO), 10);

        budget.reserve(&[layout, layout]).unwrap();
        assert_eq!(budget.outstanding(), 2);
    }

    #[test]
    fn per_type_counts_are_enforced() {
        let mut budget = PoolBudget::new(&[pool_size(UBO, 4), pool_size(SAMPLER, 1)], 10).unwrap();
        let material: &[(vk::DescriptorType, u32)] = &[(UBO, 2), (SAMPLER, 1)];

        budget.reserve(&[material]).unwrap();
        assert_eq!(budget.remaining(UBO), 2);
        assert_eq!(budget.remaining(SAMPLER), 0);

        let err = budget.reserve(&[material]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::PoolTypeExhausted { ty: SAMPLER, requested: 1, available: 0 }
        ));
        // Nothing reserved by the failed attempt
        assert_eq!(budget.remaining(UBO), 2);
    }

    #[test]
    fn undeclared_type_cannot_be_allocated() {
        let mut budget = PoolBudget::new(&[pool_size(UBO, 4)], 4).unwrap();
        let layout: &[(vk::DescriptorType, u32)] = &[(SAMPLER, 1)];
        assert!(matches!(
            budget.reserve(&[layout]),
            Err(RenderError::PoolTypeExhausted { available: 0, .. })
        ));
    }

    #[test]
    fn release_and_reset_restore_capacity() {
        let mut budget = PoolBudget::new(&[pool_size(UBO, 2), pool_size(UBO, 1)], 2).unwrap();
        assert_eq!(budget.remaining(UBO), 3);

        let layout: &[(vk::DescriptorType, u32)] = &[(UBO, 1)];
        budget.reserve(&[layout, layout]).unwrap();
        budget.release(layout);
        assert_eq!(budget.outstanding(), 1);
        assert_eq!(budget.remaining(UBO), 2);

        budget.reserve(&[layout]).unwrap();
        budget.reset();
        assert_eq!(budget.outstanding(), 0);
        assert_eq!(budget.remaining(UBO), 3);
    }

    #[test]
    fn layout_counts_merge_by_type() {
        let builder = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .uniform_buffer(1, vk::ShaderStageFlags::FRAGMENT)
            .combined_image_sampler(2, vk::ShaderStageFlags::FRAGMENT)
            .binding(3, SAMPLER, 4, vk::ShaderStageFlags::FRAGMENT);

        assert_eq!(builder.counts(), vec![(UBO, 2), (SAMPLER, 5)]);
    }

    #[test]
    fn stale_set_is_rejected_once_pool_token_drops() {
        let token = Arc::new(());
        let set = DescriptorSet {
            handle: vk::DescriptorSet::from_raw(42),
            pool: Arc::downgrade(&token),
            counts: vec![(UBO, 1)],
        };

        assert!(set.is_valid());
        assert_eq!(set.handle().unwrap().as_raw(), 42);

        drop(token);
        assert!(!set.is_valid());
        assert!(matches!(set.handle(), Err(RenderError::StaleDescriptorSet)));
    }

    #[test]
    fn write_kinds_map_to_descriptor_types() {
        let buffer = vk::Buffer::from_raw(1);
        let view = vk::ImageView::from_raw(2);

        let writes = [
            DescriptorWrite::UniformBuffer { binding: 0, buffer, offset: 0, range: 64 },
            DescriptorWrite::StorageBuffer { binding: 1, buffer, offset: 0, range: 64 },
            DescriptorWrite::CombinedImageSampler {
                binding: 2,
                sampler: vk::Sampler::from_raw(3),
                image_view: view,
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
            DescriptorWrite::UniformTexelBuffer {
                binding: 3,
                buffer,
                view: vk::BufferView::from_raw(4),
                offset: 0,
                range: 64,
            },
            DescriptorWrite::sampled_image(4, view),
        ];

        let types: Vec<_> = writes.iter().map(|w| w.descriptor_type()).collect();
        assert_eq!(types, vec![
            UBO,
            vk::DescriptorType::STORAGE_BUFFER,
            SAMPLER,
            vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            vk::DescriptorType::SAMPLED_IMAGE,
        ]);
        let bindings: Vec<_> = writes.iter().map(|w| w.binding()).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn prepared_writes_point_at_their_own_infos() {
        let writes = [
            DescriptorWrite::UniformBuffer {
                binding: 0,
                buffer: vk::Buffer::from_raw(10),
                offset: 16,
                range: 128,
            },
            DescriptorWrite::CombinedImageSampler {
                binding: 1,
                sampler: vk::Sampler::from_raw(11),
                image_view: vk::ImageView::from_raw(12),
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
            DescriptorWrite::UniformTexelBuffer {
                binding: 2,
                buffer: vk::Buffer::from_raw(13),
                view: vk::BufferView::from_raw(14),
                offset: 0,
                range: 32,
            },
        ];

        let prepared = PreparedWrites::new(&writes);
        let set = vk::DescriptorSet::from_raw(99);
        let vk_writes = prepared.to_vk(set);

        assert_eq!(vk_writes.len(), 3);
        for (w, expected) in vk_writes.iter().zip(&writes) {
            assert_eq!(w.dst_set, set);
            assert_eq!(w.dst_binding, expected.binding());
            assert_eq!(w.descriptor_type, expected.descriptor_type());
            assert_eq!(w.descriptor_count, 1);
        }

        let buffer_info = unsafe { &*vk_writes[0].p_buffer_info };
        assert_eq!(buffer_info.buffer.as_raw(), 10);
        assert_eq!(buffer_info.offset, 16);
        assert_eq!(buffer_info.range, 128);
        assert!(vk_writes[0].p_image_info.is_null());

        let image_info = unsafe { &*vk_writes[1].p_image_info };
        assert_eq!(image_info.sampler.as_raw(), 11);
        assert_eq!(image_info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

        let texel_view = unsafe { *vk_writes[2].p_texel_buffer_view };
        assert_eq!(texel_view.as_raw(), 14);
    }
}
