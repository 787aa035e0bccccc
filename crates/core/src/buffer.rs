use smallvec::{SmallVec, smallvec};
use std::sync::{Arc, Mutex};

use crate::format::{ColorSpaceProfile, DynamicRangeProfile, PixelFormat, Resolution};
use crate::metrics::Counters;

/// Handle to a pooled buffer.
///
/// When dropped, the backing allocation is returned to the originating
/// pool so later frames reuse memory without reallocating.
///
/// # Example
/// ```rust
/// use argus_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_capacity(2, 1024);
/// let mut lease = pool.lease();
/// lease.resize(16);
/// assert_eq!(lease.len(), 16);
/// ```
pub struct BufferLease {
    pool: Arc<PoolInner>,
    buf: Option<Vec<u8>>,
}

impl BufferLease {
    /// Borrow as an immutable slice.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }

    /// Borrow as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }

    /// Current length of the buffer.
    pub fn len(&self) -> usize {
        self.buf.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ensure the buffer holds exactly `len` zero-initialized-or-old bytes.
    pub fn resize(&mut self, len: usize) {
        if let Some(buf) = self.buf.as_mut() {
            if buf.capacity() < len {
                buf.reserve(len - buf.capacity());
            }
            buf.resize(len, 0);
        }
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.recycle(buf);
        }
    }
}

/// Buffer pool handing out reusable owned allocations.
///
/// # Example
/// ```rust
/// use argus_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_limits(4, 1 << 20, 8);
/// let _lease = pool.lease();
/// assert_eq!(pool.counters().pool_hits(), 1);
/// ```
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
    counters: Arc<Counters>,
}

impl BufferPool {
    /// Create a pool with `capacity` preallocated buffers of `chunk_size` bytes.
    pub fn with_capacity(capacity: usize, chunk_size: usize) -> Self {
        Self::with_limits(capacity, chunk_size, capacity)
    }

    /// Create a pool with `capacity` preallocated buffers and a maximum
    /// retained free list of `max_free`.
    pub fn with_limits(capacity: usize, chunk_size: usize, max_free: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(vec![0; chunk_size]);
        }
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                chunk_size,
                max_free,
            }),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Acquire a buffer, allocating if the pool is empty.
    pub fn lease(&self) -> BufferLease {
        let buf = self
            .inner
            .free
            .lock()
            .unwrap()
            .pop()
            .inspect(|_| {
                self.counters.pool_hit();
            })
            .unwrap_or_else(|| {
                self.counters.pool_miss();
                vec![0; self.inner.chunk_size]
            });
        BufferLease {
            pool: self.inner.clone(),
            buf: Some(buf),
        }
    }

    /// Shared counters for this pool.
    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }
}

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    chunk_size: usize,
    max_free: usize,
}

impl PoolInner {
    fn recycle(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free.lock().unwrap();
        if free.len() < self.max_free {
            free.push(buf);
        }
    }
}

/// Geometry of one plane inside a stream buffer.
#[derive(Debug, Clone, Copy)]
pub struct PlaneLayout {
    /// Length of the plane in bytes.
    pub len: usize,
    /// Stride in bytes.
    pub stride: usize,
}

/// Compute the plane layouts for a format at a resolution.
///
/// Strides are tight; the emulator owns its memory and has no alignment
/// constraints from external allocators.
pub fn plane_layouts(format: PixelFormat, resolution: Resolution) -> SmallVec<[PlaneLayout; 3]> {
    let width = resolution.width.get() as usize;
    let height = resolution.height.get() as usize;
    match format {
        PixelFormat::Yuv420 => {
            let chroma_w = width.div_ceil(2);
            let chroma_h = height.div_ceil(2);
            smallvec![
                PlaneLayout {
                    len: width * height,
                    stride: width,
                },
                PlaneLayout {
                    len: chroma_w * chroma_h,
                    stride: chroma_w,
                },
                PlaneLayout {
                    len: chroma_w * chroma_h,
                    stride: chroma_w,
                },
            ]
        }
        other => {
            let bpp = other.bytes_per_pixel().unwrap_or(4);
            smallvec![PlaneLayout {
                len: width * height * bpp,
                stride: width * bpp,
            }]
        }
    }
}

/// One per-stream buffer owned by a capture request.
///
/// Ownership crosses three hand-offs (controller, pipeline, result
/// callback); at each hand-off exactly one owner exists, enforced by
/// move semantics.
///
/// # Example
/// ```rust
/// use argus_core::prelude::*;
///
/// let pool = BufferPool::with_capacity(1, 1 << 16);
/// let res = Resolution::new(4, 4).unwrap();
/// let buffer = SensorBuffer::allocate(
///     &pool,
///     StreamSpec {
///         stream_id: 7,
///         format: PixelFormat::Raw16,
///         resolution: res,
///         color_space: ColorSpaceProfile::Unspecified,
///         dynamic_range: DynamicRangeProfile::Standard,
///         is_input: false,
///     },
///     0,
///     1,
/// );
/// assert_eq!(buffer.planes().len(), 1);
/// assert_eq!(buffer.planes()[0].len(), 4 * 4 * 2);
/// ```
pub struct SensorBuffer {
    pub stream_id: u32,
    pub pipeline_id: u32,
    pub frame_number: u32,
    pub format: PixelFormat,
    pub resolution: Resolution,
    pub color_space: ColorSpaceProfile,
    pub dynamic_range: DynamicRangeProfile,
    pub is_input: bool,
    layouts: SmallVec<[PlaneLayout; 3]>,
    planes: SmallVec<[BufferLease; 3]>,
}

/// Stream description used to allocate a [`SensorBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct StreamSpec {
    pub stream_id: u32,
    pub format: PixelFormat,
    pub resolution: Resolution,
    pub color_space: ColorSpaceProfile,
    pub dynamic_range: DynamicRangeProfile,
    pub is_input: bool,
}

impl SensorBuffer {
    /// Allocate pooled planes for one stream of one request.
    pub fn allocate(
        pool: &BufferPool,
        spec: StreamSpec,
        frame_number: u32,
        pipeline_id: u32,
    ) -> Self {
        let layouts = plane_layouts(spec.format, spec.resolution);
        let planes = layouts
            .iter()
            .map(|layout| {
                let mut lease = pool.lease();
                lease.resize(layout.len);
                lease
            })
            .collect();
        Self {
            stream_id: spec.stream_id,
            pipeline_id,
            frame_number,
            format: spec.format,
            resolution: spec.resolution,
            color_space: spec.color_space,
            dynamic_range: spec.dynamic_range,
            is_input: spec.is_input,
            layouts,
            planes,
        }
    }

    /// Plane layouts for this buffer.
    pub fn layouts(&self) -> &[PlaneLayout] {
        &self.layouts
    }

    /// Borrow every plane immutably.
    pub fn planes(&self) -> SmallVec<[&[u8]; 3]> {
        self.planes.iter().map(|p| p.as_slice()).collect()
    }

    /// Borrow every plane mutably.
    pub fn planes_mut(&mut self) -> SmallVec<[&mut [u8]; 3]> {
        self.planes.iter_mut().map(|p| p.as_mut_slice()).collect()
    }

    /// Stride in bytes of plane `index`.
    pub fn stride(&self, index: usize) -> usize {
        self.layouts.get(index).map(|l| l.stride).unwrap_or(0)
    }
}

impl std::fmt::Debug for SensorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorBuffer")
            .field("stream_id", &self.stream_id)
            .field("pipeline_id", &self.pipeline_id)
            .field("frame_number", &self.frame_number)
            .field("format", &self.format)
            .field("resolution", &self.resolution)
            .field("is_input", &self.is_input)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of per-stream buffers carried by one request.
pub type Buffers = Vec<SensorBuffer>;
