//! Queue family bookkeeping and physical device ranking

use ash::vk;

/// The four capabilities queue families are sorted by
const CAPABILITIES: [vk::QueueFlags; 4] = [
    vk::QueueFlags::GRAPHICS,
    vk::QueueFlags::COMPUTE,
    vk::QueueFlags::TRANSFER,
    vk::QueueFlags::SPARSE_BINDING,
];

/// Queue families of one physical device, indexed by capability
#[derive(Debug, Clone, Default)]
pub struct QueueFamilyTable {
    families: Vec<vk::QueueFamilyProperties>,
    present: Vec<bool>,
    graphics: Vec<u32>,
    compute: Vec<u32>,
    transfer: Vec<u32>,
    sparse: Vec<u32>,
}

impl QueueFamilyTable {
    /// Build the table from the device's family properties and the
    /// per-family presentation support for the window surface
    pub fn new(families: Vec<vk::QueueFamilyProperties>, present: Vec<bool>) -> Self {
        let mut table = Self {
            families,
            present,
            ..Self::default()
        };

        for (index, family) in table.families.iter().enumerate() {
            let Ok(index) = u32::try_from(index) else { break };
            let flags = family.queue_flags;
            if flags.contains(vk::QueueFlags::GRAPHICS) {
                table.graphics.push(index);
            }
            if flags.contains(vk::QueueFlags::COMPUTE) {
                table.compute.push(index);
            }
            if flags.contains(vk::QueueFlags::TRANSFER) {
                table.transfer.push(index);
            }
            if flags.contains(vk::QueueFlags::SPARSE_BINDING) {
                table.sparse.push(index);
            }
        }
        table
    }

    /// Number of queue families
    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Raw family properties
    pub fn families(&self) -> &[vk::QueueFamilyProperties] {
        &self.families
    }

    /// How many queues the family offers
    pub fn queue_limit(&self, family: u32) -> Option<u32> {
        self.families.get(family as usize).map(|f| f.queue_count)
    }

    /// Whether the family can present to the surface; `None` when out of range
    pub fn supports_present(&self, family: u32) -> Option<bool> {
        if (family as usize) < self.families.len() {
            Some(self.present.get(family as usize).copied().unwrap_or(false))
        } else {
            None
        }
    }

    /// Families having `flag`, which must be exactly one of graphics,
    /// compute, transfer or sparse binding
    pub fn indexes_for(&self, flag: vk::QueueFlags) -> Option<&[u32]> {
        match flag {
            vk::QueueFlags::GRAPHICS => Some(&self.graphics),
            vk::QueueFlags::COMPUTE => Some(&self.compute),
            vk::QueueFlags::TRANSFER => Some(&self.transfer),
            vk::QueueFlags::SPARSE_BINDING => Some(&self.sparse),
            _ => None,
        }
    }

    /// First family having `flag` and none of the other three capabilities
    pub fn exclusive_index(&self, flag: vk::QueueFlags) -> Option<u32> {
        let candidates = self.indexes_for(flag)?;
        let others: Vec<&[u32]> = CAPABILITIES
            .iter()
            .filter(|&&cap| cap != flag)
            .filter_map(|&cap| self.indexes_for(cap))
            .collect();

        candidates
            .iter()
            .copied()
            .find(|index| others.iter().all(|list| !list.contains(index)))
    }

    /// Graphics and present family, preferring one family that does both
    pub fn graphics_present(&self) -> Option<(u32, u32)> {
        let can_present = |family: u32| self.supports_present(family).unwrap_or(false);

        if let Some(&both) = self.graphics.iter().find(|&&g| can_present(g)) {
            return Some((both, both));
        }

        let graphics = self.graphics.first().copied()?;
        let present = (0..self.families.len())
            .filter_map(|i| u32::try_from(i).ok())
            .find(|&i| can_present(i))?;
        Some((graphics, present))
    }
}

/// Preference order for device types, lower is better
pub fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 4,
    }
}

/// Index of the best usable device; ties keep enumeration order
pub fn pick_device(candidates: &[(vk::PhysicalDeviceType, &QueueFamilyTable)]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, (_, table))| table.graphics_present().is_some())
        .min_by_key(|(index, (device_type, _))| (device_type_rank(*device_type), *index))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    /// Typical desktop layout: all-rounder, async compute, dedicated transfer
    fn desktop() -> QueueFamilyTable {
        QueueFamilyTable::new(
            vec![
                family(
                    vk::QueueFlags::GRAPHICS
                        | vk::QueueFlags::COMPUTE
                        | vk::QueueFlags::TRANSFER
                        | vk::QueueFlags::SPARSE_BINDING,
                    16,
                ),
                family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 8),
                family(vk::QueueFlags::TRANSFER, 2),
            ],
            vec![true, false, false],
        )
    }

    #[test]
    fn test_indexes_by_capability() {
        let table = desktop();
        assert_eq!(table.indexes_for(vk::QueueFlags::GRAPHICS), Some(&[0][..]));
        assert_eq!(table.indexes_for(vk::QueueFlags::COMPUTE), Some(&[0, 1][..]));
        assert_eq!(table.indexes_for(vk::QueueFlags::TRANSFER), Some(&[0, 1, 2][..]));
        assert_eq!(table.indexes_for(vk::QueueFlags::SPARSE_BINDING), Some(&[0][..]));
        assert_eq!(
            table.indexes_for(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            None
        );
    }

    #[test]
    fn test_exclusive_index() {
        let table = desktop();
        assert_eq!(table.exclusive_index(vk::QueueFlags::TRANSFER), Some(2));
        // family 1 also transfers, so compute has no exclusive family
        assert_eq!(table.exclusive_index(vk::QueueFlags::COMPUTE), None);
        assert_eq!(table.exclusive_index(vk::QueueFlags::GRAPHICS), None);
    }

    #[test]
    fn test_limits_and_present_range() {
        let table = desktop();
        assert_eq!(table.family_count(), 3);
        assert_eq!(table.queue_limit(1), Some(8));
        assert_eq!(table.queue_limit(3), None);
        assert_eq!(table.supports_present(0), Some(true));
        assert_eq!(table.supports_present(2), Some(false));
        assert_eq!(table.supports_present(7), None);
    }

    #[test]
    fn test_graphics_present_prefers_shared_family() {
        let table = QueueFamilyTable::new(
            vec![
                family(vk::QueueFlags::GRAPHICS, 1),
                family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            ],
            vec![false, true],
        );
        assert_eq!(table.graphics_present(), Some((1, 1)));
    }

    #[test]
    fn test_graphics_present_split_families() {
        let table = QueueFamilyTable::new(
            vec![
                family(vk::QueueFlags::GRAPHICS, 1),
                family(vk::QueueFlags::TRANSFER, 1),
            ],
            vec![false, true],
        );
        assert_eq!(table.graphics_present(), Some((0, 1)));

        let headless = QueueFamilyTable::new(vec![family(vk::QueueFlags::GRAPHICS, 1)], vec![false]);
        assert_eq!(headless.graphics_present(), None);
    }

    #[test]
    fn test_pick_device_prefers_discrete() {
        let usable = desktop();
        let unusable = QueueFamilyTable::new(vec![family(vk::QueueFlags::COMPUTE, 1)], vec![true]);

        let candidates = [
            (vk::PhysicalDeviceType::CPU, &usable),
            (vk::PhysicalDeviceType::DISCRETE_GPU, &unusable),
            (vk::PhysicalDeviceType::INTEGRATED_GPU, &usable),
            (vk::PhysicalDeviceType::DISCRETE_GPU, &usable),
        ];
        assert_eq!(pick_device(&candidates), Some(3));
        assert_eq!(pick_device(&candidates[..3]), Some(2));
        assert_eq!(pick_device(&candidates[1..2]), None);
    }
}
