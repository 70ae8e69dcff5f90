//! Physical and logical devices
//!
//! [`Devices`] examines every physical device at construction, then owns the
//! logical device and everything created from it: named queues with their
//! command pools, the swapchain, named buffers and memory, and descriptors.
//! Resources are looked up by name, and bad names or indexes come back as
//! errors that are also logged and sent to the error hook.

use super::commands::CommandPool;
use super::descriptors::{DescriptorPool, DescriptorSetLayout};
use super::instance::vk_string;
use super::memory::{find_memory_type, Buffer, DeviceMemory};
use super::queue_family::{pick_device, QueueFamilyTable};
use super::swapchain::{SurfaceSupport, Swapchain};
use super::{VulkanError, VulkanResult};
use crate::foundation::hook::EventHook;
use crate::DrunkSpock;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Instance};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_char, CStr};

/// Queues wanted from one family at logical device creation
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    /// Queue family index
    pub family: u32,
    /// One priority per queue
    pub priorities: Vec<f32>,
}

impl QueueRequest {
    /// Request queues with the given priorities
    pub fn new(family: u32, priorities: Vec<f32>) -> Self {
        Self { family, priorities }
    }

    /// Request a single full-priority queue
    pub fn single(family: u32) -> Self {
        Self::new(family, vec![1.0])
    }
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// An image is ready for rendering
    Image {
        /// Index into the chain images
        index: u32,
        /// The swapchain still works but no longer matches the surface exactly
        suboptimal: bool,
    },
    /// The swapchain must be rebuilt before rendering
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Not presented; the swapchain must be rebuilt
    OutOfDate,
}

struct PhysicalInfo {
    handle: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    memory: vk::PhysicalDeviceMemoryProperties,
    families: QueueFamilyTable,
}

struct LogicalDevice {
    device: Device,
    phys_index: usize,
}

struct NamedQueue {
    queue: vk::Queue,
    family: u32,
}

/// Physical device information plus the logical device and its resources
pub struct Devices {
    instance: Instance,
    surface_loader: Surface,
    physicals: Vec<PhysicalInfo>,
    logical: Option<LogicalDevice>,
    queues: HashMap<String, NamedQueue>,
    command_pools: HashMap<String, CommandPool>,
    buffers: HashMap<String, Buffer>,
    memories: HashMap<String, DeviceMemory>,
    swapchain: Option<Swapchain>,
    descriptor_pool: Option<DescriptorPool>,
    layouts: Vec<DescriptorSetLayout>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    descriptor_source: Option<(String, vk::DeviceSize)>,
    prefer_mailbox: bool,
    error_hook: RefCell<EventHook<String>>,
    out_of_date_hook: RefCell<EventHook<()>>,
}

impl Devices {
    /// Examine every physical device against the window surface of `spock`
    pub fn new(spock: &DrunkSpock) -> VulkanResult<Self> {
        let surface = spock.surface().ok_or(VulkanError::NoSurface)?;
        let instance = spock.instance().clone();
        let surface_loader = spock.surface_loader().clone();

        let handles = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };
        if handles.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "No Vulkan physical devices found".to_string(),
            ));
        }

        let mut physicals = Vec::with_capacity(handles.len());
        for handle in handles {
            let (properties, features, memory, family_props) = unsafe {
                (
                    instance.get_physical_device_properties(handle),
                    instance.get_physical_device_features(handle),
                    instance.get_physical_device_memory_properties(handle),
                    instance.get_physical_device_queue_family_properties(handle),
                )
            };

            let mut present = Vec::with_capacity(family_props.len());
            for family in 0..u32::try_from(family_props.len()).unwrap_or(u32::MAX) {
                let supported = unsafe {
                    surface_loader
                        .get_physical_device_surface_support(handle, family, surface)
                        .map_err(VulkanError::Api)?
                };
                present.push(supported);
            }

            log::info!(
                "Found GPU {}: {} ({:?}), {} queue families",
                physicals.len(),
                vk_string(&properties.device_name),
                properties.device_type,
                family_props.len()
            );

            physicals.push(PhysicalInfo {
                handle,
                properties,
                features,
                memory,
                families: QueueFamilyTable::new(family_props, present),
            });
        }

        Ok(Self {
            instance,
            surface_loader,
            physicals,
            logical: None,
            queues: HashMap::new(),
            command_pools: HashMap::new(),
            buffers: HashMap::new(),
            memories: HashMap::new(),
            swapchain: None,
            descriptor_pool: None,
            layouts: Vec::new(),
            descriptor_sets: Vec::new(),
            descriptor_source: None,
            prefer_mailbox: true,
            error_hook: RefCell::new(EventHook::new()),
            out_of_date_hook: RefCell::new(EventHook::new()),
        })
    }

    /// Receive every error message this object reports
    pub fn set_error_hook(&mut self, hook: impl FnMut(&String) + 'static) {
        self.error_hook.get_mut().set(hook);
    }

    /// Be told when presentation finds the swapchain out of date
    pub fn set_out_of_date_hook(&mut self, hook: impl FnMut(&()) + 'static) {
        self.out_of_date_hook.get_mut().set(hook);
    }

    /// Whether swapchains use mailbox presentation when available
    pub fn set_prefer_mailbox(&mut self, prefer: bool) {
        self.prefer_mailbox = prefer;
    }

    fn spam(&self, err: VulkanError) -> VulkanError {
        let msg = err.to_string();
        log::error!("{}", msg);
        if let Ok(mut hook) = self.error_hook.try_borrow_mut() {
            hook.invoke(&msg);
        }
        err
    }

    fn physical(&self, index: usize) -> VulkanResult<&PhysicalInfo> {
        self.physicals.get(index).ok_or_else(|| {
            self.spam(VulkanError::PhysicalIndexOutOfRange {
                index,
                count: self.physicals.len(),
            })
        })
    }

    fn logical(&self) -> VulkanResult<&LogicalDevice> {
        self.logical.as_ref().ok_or_else(|| self.spam(VulkanError::NoLogicalDevice))
    }

    fn named_queue(&self, name: &str) -> VulkanResult<&NamedQueue> {
        self.queues.get(name).ok_or_else(|| {
            self.spam(VulkanError::UnknownName {
                kind: "queue",
                name: name.to_string(),
            })
        })
    }

    fn named_buffer(&self, name: &str) -> VulkanResult<&Buffer> {
        lookup(&self.buffers, "buffer", name).map_err(|e| self.spam(e))
    }

    fn named_memory(&self, name: &str) -> VulkanResult<&DeviceMemory> {
        lookup(&self.memories, "memory", name).map_err(|e| self.spam(e))
    }

    fn chain(&self) -> VulkanResult<&Swapchain> {
        self.swapchain.as_ref().ok_or_else(|| self.spam(VulkanError::NoSwapchain))
    }

    // ---- physical devices ----

    /// Number of physical devices
    pub fn num_physical_devices(&self) -> usize {
        self.physicals.len()
    }

    /// Properties of physical device `index`
    pub fn physical_device_props(&self, index: usize) -> VulkanResult<&vk::PhysicalDeviceProperties> {
        Ok(&self.physical(index)?.properties)
    }

    /// Features of physical device `index`
    pub fn physical_device_features(&self, index: usize) -> VulkanResult<&vk::PhysicalDeviceFeatures> {
        Ok(&self.physical(index)?.features)
    }

    /// Name of physical device `index`
    pub fn physical_device_name(&self, index: usize) -> VulkanResult<String> {
        Ok(vk_string(&self.physical(index)?.properties.device_name))
    }

    /// Queue families of physical device `index`
    pub fn queue_families(&self, index: usize) -> VulkanResult<&QueueFamilyTable> {
        Ok(&self.physical(index)?.families)
    }

    /// Whether `family` of physical device `phys` can present to the surface
    pub fn supports_present(&self, phys: usize, family: u32) -> VulkanResult<bool> {
        self.physical(phys)?
            .families
            .supports_present(family)
            .ok_or_else(|| self.spam(VulkanError::BadQueueFamily { family }))
    }

    /// Families of device `phys` with capability `flag` (one of graphics,
    /// compute, transfer or sparse binding)
    pub fn family_indexes_for(&self, flag: vk::QueueFlags, phys: usize) -> Option<&[u32]> {
        self.physicals.get(phys)?.families.indexes_for(flag)
    }

    /// First family of device `phys` with `flag` and none of the other capabilities
    pub fn exclusive_family_index(&self, flag: vk::QueueFlags, phys: usize) -> Option<u32> {
        self.physicals.get(phys)?.families.exclusive_index(flag)
    }

    /// Best device that can both draw and present
    pub fn suitable_device_index(&self) -> Option<usize> {
        let candidates: Vec<_> = self
            .physicals
            .iter()
            .map(|p| (p.properties.device_type, &p.families))
            .collect();
        pick_device(&candidates)
    }

    /// Graphics and present family for device `phys`, sharing one family when possible
    pub fn graphics_present_families(&self, phys: usize) -> Option<(u32, u32)> {
        self.physicals.get(phys)?.families.graphics_present()
    }

    // ---- logical device and queues ----

    /// Create the logical device on physical device `phys`.
    ///
    /// The swapchain extension is always enabled.
    pub fn create_logical_device(
        &mut self,
        phys: usize,
        requests: &[QueueRequest],
        extensions: &[&CStr],
        features: Option<vk::PhysicalDeviceFeatures>,
    ) -> VulkanResult<()> {
        if self.logical.is_some() {
            return Err(self.spam(VulkanError::InvalidOperation {
                reason: "Logical device already created".to_string(),
            }));
        }
        let info = self.physical(phys)?;

        for request in requests {
            let limit = info
                .families
                .queue_limit(request.family)
                .ok_or_else(|| self.spam(VulkanError::BadQueueFamily { family: request.family }))?;
            let wanted = u32::try_from(request.priorities.len()).unwrap_or(u32::MAX);
            if wanted == 0 || wanted > limit {
                return Err(self.spam(VulkanError::BadQueueIndex {
                    family: request.family,
                    index: wanted.saturating_sub(1),
                }));
            }
        }

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = requests
            .iter()
            .map(|r| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(r.family)
                    .queue_priorities(&r.priorities)
                    .build()
            })
            .collect();

        let mut extension_names: Vec<&CStr> = extensions.to_vec();
        if !extension_names.contains(&SwapchainLoader::name()) {
            extension_names.push(SwapchainLoader::name());
        }
        let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|e| e.as_ptr()).collect();

        let enabled_features = features.unwrap_or_default();
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&enabled_features);

        let device = unsafe {
            self.instance
                .create_device(info.handle, &create_info, None)
                .map_err(|e| self.spam(VulkanError::Api(e)))?
        };

        log::info!(
            "Logical device created on {} with {} queue families",
            vk_string(&info.properties.device_name),
            requests.len()
        );

        self.logical = Some(LogicalDevice { device, phys_index: phys });
        Ok(())
    }

    /// Name queue `index` of `family` and create a command pool for it under the same name
    pub fn set_queue_name(
        &mut self,
        name: &str,
        family: u32,
        index: u32,
        pool_flags: vk::CommandPoolCreateFlags,
    ) -> VulkanResult<()> {
        if self.queues.contains_key(name) {
            return Err(self.spam(VulkanError::NameInUse {
                kind: "queue",
                name: name.to_string(),
            }));
        }

        let logical = self.logical()?;
        check_queue_index(&self.physicals[logical.phys_index].families, family, index)
            .map_err(|e| self.spam(e))?;

        let device = logical.device.clone();
        let queue = unsafe { device.get_device_queue(family, index) };
        let pool = CommandPool::new(device, family, pool_flags).map_err(|e| self.spam(e))?;

        log::debug!("Queue {} = family {} index {}", name, family, index);
        self.queues.insert(name.to_string(), NamedQueue { queue, family });
        self.command_pools.insert(name.to_string(), pool);
        Ok(())
    }

    /// Queue handle by name
    pub fn queue(&self, name: &str) -> VulkanResult<vk::Queue> {
        Ok(self.named_queue(name)?.queue)
    }

    /// Family of a named queue
    pub fn queue_family(&self, name: &str) -> VulkanResult<u32> {
        Ok(self.named_queue(name)?.family)
    }

    /// Submit work to a named queue, signaling `fence` (may be null) when done
    pub fn submit_to_queue(&self, name: &str, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()> {
        let queue = self.named_queue(name)?.queue;
        let device = &self.logical()?.device;
        unsafe {
            device
                .queue_submit(queue, submits, fence)
                .map_err(|e| self.spam(VulkanError::Api(e)))
        }
    }

    /// Block until a named queue is idle
    pub fn queue_wait_idle(&self, name: &str) -> VulkanResult<()> {
        let queue = self.named_queue(name)?.queue;
        let device = &self.logical()?.device;
        unsafe { device.queue_wait_idle(queue).map_err(|e| self.spam(VulkanError::Api(e))) }
    }

    /// Block until the whole device is idle; does nothing without a device
    pub fn wait_idle(&self) -> VulkanResult<()> {
        match &self.logical {
            Some(logical) => unsafe {
                logical
                    .device
                    .device_wait_idle()
                    .map_err(|e| self.spam(VulkanError::Api(e)))
            },
            None => Ok(()),
        }
    }

    /// Command pool created for a named queue
    pub fn command_pool(&self, name: &str) -> VulkanResult<&CommandPool> {
        self.command_pools.get(name).ok_or_else(|| {
            self.spam(VulkanError::UnknownName {
                kind: "pool",
                name: name.to_string(),
            })
        })
    }

    /// The logical device
    pub fn logical_device(&self) -> VulkanResult<&Device> {
        Ok(&self.logical()?.device)
    }

    // ---- swapchain ----

    /// Build the swapchain and its descriptor pool for a `width` x `height` window
    pub fn create_swapchain(&mut self, spock: &DrunkSpock, width: u32, height: u32) -> VulkanResult<()> {
        if self.swapchain.is_some() {
            return Err(self.spam(VulkanError::InvalidOperation {
                reason: "Swapchain already exists, use recreate_swapchain".to_string(),
            }));
        }
        self.build_swapchain(spock, width, height, vk::SwapchainKHR::null())
    }

    /// Wait for the device, then replace the swapchain with one of the new size.
    ///
    /// Descriptor sets made by [`Self::create_descriptor_sets`] are rebuilt
    /// against the same buffers.
    pub fn recreate_swapchain(&mut self, spock: &DrunkSpock, width: u32, height: u32) -> VulkanResult<()> {
        self.wait_idle()?;

        let old = self.swapchain.take();
        self.descriptor_sets.clear();
        self.descriptor_pool = None;

        let old_handle = old.as_ref().map_or_else(vk::SwapchainKHR::null, Swapchain::handle);
        let built = self.build_swapchain(spock, width, height, old_handle);
        drop(old);
        built?;

        let image_count = self.chain_image_views().len();
        if !self.layouts.is_empty() && self.layouts.len() != image_count {
            self.layouts.clear();
            self.create_descriptor_layout()?;
        }
        if let Some((prefix, size)) = self.descriptor_source.clone() {
            self.create_descriptor_sets(&prefix, size)?;
        }
        Ok(())
    }

    fn build_swapchain(
        &mut self,
        spock: &DrunkSpock,
        width: u32,
        height: u32,
        old: vk::SwapchainKHR,
    ) -> VulkanResult<()> {
        let surface = spock.surface().ok_or_else(|| self.spam(VulkanError::NoSurface))?;
        let logical = self.logical()?;
        let phys = self.physicals[logical.phys_index].handle;
        let device = logical.device.clone();

        let support =
            SurfaceSupport::query(&self.surface_loader, phys, surface).map_err(|e| self.spam(e))?;

        let swapchain = Swapchain::new(
            spock.instance(),
            device.clone(),
            &support,
            surface,
            vk::Extent2D { width, height },
            self.prefer_mailbox,
            old,
        )
        .map_err(|e| self.spam(e))?;

        let count = u32::try_from(swapchain.image_views().len()).unwrap_or(u32::MAX);
        let pool = DescriptorPool::uniform_buffers(device, count).map_err(|e| self.spam(e))?;

        self.swapchain = Some(swapchain);
        self.descriptor_pool = Some(pool);
        Ok(())
    }

    /// Destroy the image views, the descriptor pool and the swapchain
    pub fn destroy_swapchain_stuff(&mut self) {
        self.descriptor_sets.clear();
        self.descriptor_pool = None;
        self.swapchain = None;
    }

    /// Acquire the next chain image, signaling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<Acquired> {
        match self.chain()?.acquire_next_image(semaphore) {
            Ok((index, suboptimal)) => Ok(Acquired::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
            Err(e) => Err(self.spam(VulkanError::Api(e))),
        }
    }

    /// Present `image_index` on the named queue once `semaphore` is signaled.
    ///
    /// Out-of-date and suboptimal results fire the out-of-date hook.
    pub fn queue_present(&self, semaphore: vk::Semaphore, image_index: u32, present_queue: &str) -> VulkanResult<PresentOutcome> {
        let queue = self.named_queue(present_queue)?.queue;
        let outcome = match self.chain()?.present(queue, semaphore, image_index) {
            Ok(false) => PresentOutcome::Presented,
            Ok(true) => PresentOutcome::Suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => PresentOutcome::OutOfDate,
            Err(e) => return Err(self.spam(VulkanError::Api(e))),
        };

        if outcome != PresentOutcome::Presented {
            log::debug!("Swapchain needs rebuilding: {:?}", outcome);
            if let Ok(mut hook) = self.out_of_date_hook.try_borrow_mut() {
                hook.invoke(&());
            }
        }
        Ok(outcome)
    }

    /// Swapchain image extent
    pub fn chain_extent(&self) -> VulkanResult<vk::Extent2D> {
        Ok(self.chain()?.extent())
    }

    /// Swapchain image format
    pub fn chain_format(&self) -> VulkanResult<vk::Format> {
        Ok(self.chain()?.format().format)
    }

    /// One view per swapchain image; empty without a swapchain
    pub fn chain_image_views(&self) -> &[vk::ImageView] {
        self.swapchain.as_ref().map_or(&[][..], Swapchain::image_views)
    }

    // ---- buffers and memory ----

    /// Create an unbound buffer called `name`
    pub fn create_buffer(
        &mut self,
        size: vk::DeviceSize,
        name: &str,
        usage: vk::BufferUsageFlags,
        sharing: vk::SharingMode,
        family_indexes: &[u32],
    ) -> VulkanResult<()> {
        if self.buffers.contains_key(name) {
            return Err(self.spam(VulkanError::NameInUse {
                kind: "buffer",
                name: name.to_string(),
            }));
        }
        let device = self.logical()?.device.clone();
        let buffer = Buffer::new(device, size, usage, sharing, family_indexes).map_err(|e| self.spam(e))?;
        self.buffers.insert(name.to_string(), buffer);
        Ok(())
    }

    /// Allocate memory sized for buffer `name`, stored under the same name
    pub fn create_buffer_memory(&mut self, name: &str, props: vk::MemoryPropertyFlags) -> VulkanResult<()> {
        if self.memories.contains_key(name) {
            return Err(self.spam(VulkanError::MemoryAlreadyAllocated { name: name.to_string() }));
        }
        let logical = self.logical()?;
        let requirements = self.named_buffer(name)?.memory_requirements();
        let mem_props = &self.physicals[logical.phys_index].memory;
        let type_index =
            find_memory_type(mem_props, requirements.memory_type_bits, props).map_err(|e| self.spam(e))?;

        let memory = DeviceMemory::allocate(logical.device.clone(), requirements.size, type_index)
            .map_err(|e| self.spam(e))?;
        self.memories.insert(name.to_string(), memory);
        Ok(())
    }

    /// Copy `data` to the start of memory `mem_name`
    pub fn copy_into_memory<T: bytemuck::Pod>(&self, mem_name: &str, data: &[T]) -> VulkanResult<()> {
        self.named_memory(mem_name)?.write(data).map_err(|e| self.spam(e))
    }

    /// Bind memory `mem_name` to buffer `buf_name`
    pub fn bind_memory_to_buffer(&self, mem_name: &str, buf_name: &str) -> VulkanResult<()> {
        let (memory, buffer) =
            memory_and_buffer(&self.memories, &self.buffers, mem_name, buf_name).map_err(|e| self.spam(e))?;
        buffer.bind(memory).map_err(|e| self.spam(e))
    }

    /// Copy `size` bytes from `src` to `dst` with a one-time command buffer on `queue`
    pub fn copy_buffer(&self, queue: &str, src: &str, dst: &str, size: vk::DeviceSize) -> VulkanResult<()> {
        let src = self.named_buffer(src)?.handle();
        let dst = self.named_buffer(dst)?.handle();
        let pool = self.command_pool(queue)?;
        let queue = self.named_queue(queue)?.queue;

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        pool.run_one_time(queue, |device, cb| unsafe {
            device.cmd_copy_buffer(cb, src, dst, &[region]);
        })
        .map_err(|e| self.spam(e))
    }

    /// Destroy buffer `name` and the memory allocated for it; false if there was no such buffer
    pub fn destroy_buffer(&mut self, name: &str) -> bool {
        remove_with_memory(&mut self.buffers, &mut self.memories, name)
    }

    /// Buffer handle by name
    pub fn buffer(&self, name: &str) -> VulkanResult<vk::Buffer> {
        Ok(self.named_buffer(name)?.handle())
    }

    /// Bind buffer `name` as vertex buffer 0
    pub fn bind_vb(&self, cb: vk::CommandBuffer, name: &str) -> VulkanResult<()> {
        let buffer = self.named_buffer(name)?.handle();
        let device = &self.logical()?.device;
        unsafe {
            device.cmd_bind_vertex_buffers(cb, 0, &[buffer], &[0]);
        }
        Ok(())
    }

    /// Bind buffer `name` as a 16-bit index buffer
    pub fn bind_ib(&self, cb: vk::CommandBuffer, name: &str) -> VulkanResult<()> {
        let buffer = self.named_buffer(name)?.handle();
        let device = &self.logical()?.device;
        unsafe {
            device.cmd_bind_index_buffer(cb, buffer, 0, vk::IndexType::UINT16);
        }
        Ok(())
    }

    // ---- descriptors ----

    /// One layout per chain image, each with a vertex-stage uniform buffer at binding 0
    pub fn create_descriptor_layout(&mut self) -> VulkanResult<()> {
        let count = self.chain()?.image_views().len();
        let device = self.logical()?.device.clone();

        let layouts = (0..count)
            .map(|_| DescriptorSetLayout::uniform_buffer(device.clone(), 0, vk::ShaderStageFlags::VERTEX))
            .collect::<VulkanResult<Vec<_>>>()
            .map_err(|e| self.spam(e))?;

        self.layouts = layouts;
        Ok(())
    }

    /// Allocate one set per chain image and point set `i` at buffer `{prefix}{i}`
    pub fn create_descriptor_sets(&mut self, prefix: &str, size: vk::DeviceSize) -> VulkanResult<()> {
        let count = self.chain()?.image_views().len();
        if self.layouts.len() != count {
            return Err(self.spam(VulkanError::InvalidOperation {
                reason: format!(
                    "{} descriptor layouts for {} chain images, call create_descriptor_layout first",
                    self.layouts.len(),
                    count
                ),
            }));
        }

        let buffers = (0..count)
            .map(|i| self.named_buffer(&format!("{prefix}{i}")).map(Buffer::handle))
            .collect::<VulkanResult<Vec<_>>>()?;

        let pool = self
            .descriptor_pool
            .as_ref()
            .ok_or_else(|| self.spam(VulkanError::NoSwapchain))?;
        let handles = self.descriptor_set_layouts();
        let sets = pool.allocate(&handles).map_err(|e| self.spam(e))?;

        for (&set, &buffer) in sets.iter().zip(&buffers) {
            pool.write_uniform_buffer(set, buffer, size);
        }

        self.descriptor_sets = sets;
        self.descriptor_source = Some((prefix.to_string(), size));
        Ok(())
    }

    /// Descriptor set layout handles, one per chain image
    pub fn descriptor_set_layouts(&self) -> Vec<vk::DescriptorSetLayout> {
        self.layouts.iter().map(DescriptorSetLayout::handle).collect()
    }

    /// Descriptor set for chain image `index`
    pub fn descriptor_set(&self, index: usize) -> Option<vk::DescriptorSet> {
        self.descriptor_sets.get(index).copied()
    }
}

/// Entry `name` of a named registry
fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &'static str, name: &str) -> VulkanResult<&'a T> {
    map.get(name).ok_or_else(|| VulkanError::UnknownName {
        kind,
        name: name.to_string(),
    })
}

/// Queue `index` must exist in `family`: the index is below the family's queue count
fn check_queue_index(families: &QueueFamilyTable, family: u32, index: u32) -> VulkanResult<()> {
    let limit = families
        .queue_limit(family)
        .ok_or(VulkanError::BadQueueFamily { family })?;
    if index >= limit {
        return Err(VulkanError::BadQueueIndex { family, index });
    }
    Ok(())
}

/// Memory and buffer for a bind, each found under its own name
fn memory_and_buffer<'a, M, B>(
    memories: &'a HashMap<String, M>,
    buffers: &'a HashMap<String, B>,
    mem_name: &str,
    buf_name: &str,
) -> VulkanResult<(&'a M, &'a B)> {
    Ok((lookup(memories, "memory", mem_name)?, lookup(buffers, "buffer", buf_name)?))
}

/// Drop buffer `name` along with the memory allocated under the same name
fn remove_with_memory<B, M>(buffers: &mut HashMap<String, B>, memories: &mut HashMap<String, M>, name: &str) -> bool {
    let removed = buffers.remove(name).is_some();
    if removed {
        memories.remove(name);
    }
    removed
}

impl Drop for Devices {
    fn drop(&mut self) {
        let Some(logical) = self.logical.take() else {
            return;
        };
        unsafe {
            let _ = logical.device.device_wait_idle();
        }

        self.destroy_swapchain_stuff();
        self.buffers.clear();
        self.memories.clear();
        self.command_pools.clear();
        self.layouts.clear();
        self.queues.clear();

        unsafe {
            logical.device.destroy_device(None);
        }
        log::debug!("Logical device destroyed");
    }
}
