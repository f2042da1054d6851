// Memory type selection
//
// Every buffer and image allocation goes through here to pick the
// device memory type its backing allocation lives in.

use ash::vk;
use super::error::{RenderError, Result};

/// Find the first memory type allowed by `type_filter` whose flags contain `properties`.
///
/// `type_filter` is the `memory_type_bits` of a resource's memory requirements:
/// bit `i` set means memory type `i` can back the resource.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let count = memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);

    (0..count)
        .find(|&i| {
            let has_type = (type_filter & (1 << i)) != 0;
            let has_properties = memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties);
            has_type && has_properties
        })
        .ok_or(RenderError::NoCompatibleMemoryType {
            type_filter,
            properties,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = types.len() as u32;
        for (i, &flags) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn picks_first_type_matching_filter_and_flags() {
        let props = properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(find_memory_type(&props, 0b111, HOST).unwrap(), 1);
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn respects_type_filter_bits() {
        let props = properties(&[HOST, HOST, HOST]);
        // Only type 2 allowed
        assert_eq!(find_memory_type(&props, 0b100, HOST).unwrap(), 2);
    }

    #[test]
    fn superset_of_requested_flags_is_accepted() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL | HOST]);
        assert_eq!(find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(), 0);
    }

    #[test]
    fn fails_when_nothing_matches() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, HOST]);

        let err = find_memory_type(&props, 0b01, HOST).unwrap_err();
        assert!(matches!(err, RenderError::NoCompatibleMemoryType { type_filter: 0b01, .. }));

        assert!(find_memory_type(&props, 0, vk::MemoryPropertyFlags::empty()).is_err());
    }

    #[test]
    fn ignores_bits_beyond_memory_type_count() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert!(find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::empty()).is_err());
    }

    #[test]
    fn result_always_satisfies_both_constraints() {
        let table = [
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | HOST,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ];
        let props = properties(&table);
        let requests = [
            vk::MemoryPropertyFlags::empty(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ];

        for filter in 0u32..16 {
            for &wanted in &requests {
                match find_memory_type(&props, filter, wanted) {
                    Ok(i) => {
                        assert_ne!(filter & (1 << i), 0);
                        assert!(table[i as usize].contains(wanted));
                    }
                    Err(_) => {
                        let any = (0..table.len())
                            .any(|i| filter & (1 << i) != 0 && table[i].contains(wanted));
                        assert!(!any, "filter {filter:#b} with {wanted:?} should have matched");
                    }
                }
            }
        }
    }
}
