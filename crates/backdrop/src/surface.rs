//! Render surface sizing and viewport change notifications.
//!
//! The host owns a [`ViewportEvents`] hub and calls [`ViewportEvents::notify`]
//! whenever the viewport changes. Every mounted [`RenderSurface`] is
//! registered with the hub and recomputes its backing size inside `notify`,
//! so the next frame always sees the new size. The GPU viewport follows at
//! the start of that frame.
//!
//! Registrations are RAII guards. Dropping a surface deregisters it, and a
//! notification that races with teardown finds a dead cell and does nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::gpu::GraphicsDevice;

/// Size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_vec2(self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// How a viewport maps onto the backing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSizing {
    scale: f32,
    max_dimension: u32,
}

impl SurfaceSizing {
    pub fn new(scale: f32, max_dimension: u32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self {
            scale,
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Full-size mapping: the backing surface matches the viewport exactly.
    pub fn native() -> Self {
        Self::new(1.0, u32::MAX)
    }

    /// Backing size for `viewport`, never zero.
    ///
    /// Both sides share one factor, so the aspect ratio survives. When the
    /// longer side would pass the cap the factor shrinks to fit it.
    pub fn backing_size(&self, viewport: SurfaceSize) -> SurfaceSize {
        let longest = viewport.width.max(viewport.height) as f32;
        let mut factor = self.scale;
        if longest * factor > self.max_dimension as f32 {
            factor = self.max_dimension as f32 / longest;
        }
        let scaled = |value: u32| {
            let pixels = (value as f32 * factor).round();
            (pixels as u32).clamp(1, self.max_dimension)
        };
        SurfaceSize::new(scaled(viewport.width), scaled(viewport.height))
    }
}

impl Default for SurfaceSizing {
    fn default() -> Self {
        Self::native()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct CellState {
    size: SurfaceSize,
    generation: u64,
}

/// Backing size shared between a surface and the resize hub.
#[derive(Debug)]
struct SurfaceCell {
    sizing: SurfaceSizing,
    state: Mutex<CellState>,
}

impl SurfaceCell {
    fn new(sizing: SurfaceSizing, viewport: SurfaceSize) -> Self {
        Self {
            sizing,
            state: Mutex::new(CellState {
                size: sizing.backing_size(viewport),
                generation: 0,
            }),
        }
    }

    fn apply_viewport(&self, viewport: SurfaceSize) {
        let size = self.sizing.backing_size(viewport);
        let mut state = lock(&self.state);
        if state.size != size {
            state.size = size;
            state.generation += 1;
        }
    }

    fn snapshot(&self) -> (SurfaceSize, u64) {
        let state = lock(&self.state);
        (state.size, state.generation)
    }
}

#[derive(Debug)]
struct Listener {
    id: u64,
    cell: Weak<SurfaceCell>,
}

#[derive(Debug)]
struct HubState {
    viewport: SurfaceSize,
    listeners: Vec<Listener>,
    next_id: u64,
}

/// Process-wide source of viewport changes. Clones share one hub.
#[derive(Debug, Clone)]
pub struct ViewportEvents {
    inner: Arc<Mutex<HubState>>,
}

impl ViewportEvents {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubState {
                viewport: SurfaceSize::new(width.max(1), height.max(1)),
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Current viewport size.
    pub fn viewport(&self) -> SurfaceSize {
        lock(&self.inner).viewport
    }

    /// Records a new viewport and resizes every live surface before returning.
    pub fn notify(&self, width: u32, height: u32) {
        let viewport = SurfaceSize::new(width.max(1), height.max(1));
        let mut hub = lock(&self.inner);
        hub.viewport = viewport;
        hub.listeners.retain(|listener| match listener.cell.upgrade() {
            Some(cell) => {
                cell.apply_viewport(viewport);
                true
            }
            None => false,
        });
        tracing::trace!(width = viewport.width, height = viewport.height, "viewport changed");
    }

    /// Number of surfaces currently registered.
    pub fn listener_count(&self) -> usize {
        let hub = lock(&self.inner);
        hub.listeners
            .iter()
            .filter(|listener| listener.cell.strong_count() > 0)
            .count()
    }

    fn register(&self, cell: &Arc<SurfaceCell>) -> ResizeRegistration {
        let mut hub = lock(&self.inner);
        let id = hub.next_id;
        hub.next_id += 1;
        hub.listeners.push(Listener {
            id,
            cell: Arc::downgrade(cell),
        });
        ResizeRegistration {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }
}

/// Removes its surface from the hub when dropped.
#[derive(Debug)]
pub struct ResizeRegistration {
    id: u64,
    hub: Weak<Mutex<HubState>>,
}

impl Drop for ResizeRegistration {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            lock(&hub).listeners.retain(|listener| listener.id != self.id);
        }
    }
}

/// Backing surface of one render session.
#[derive(Debug)]
pub struct RenderSurface {
    cell: Arc<SurfaceCell>,
    registration: Option<ResizeRegistration>,
    applied: Option<u64>,
}

impl RenderSurface {
    /// Sizes the surface from the current viewport and subscribes to changes.
    pub fn mount(events: &ViewportEvents, sizing: SurfaceSizing) -> Self {
        let cell = Arc::new(SurfaceCell::new(sizing, events.viewport()));
        let registration = events.register(&cell);
        Self {
            cell,
            registration: Some(registration),
            applied: None,
        }
    }

    /// Backing size in pixels, as uploaded to `iResolution`.
    pub fn size(&self) -> SurfaceSize {
        self.cell.snapshot().0
    }

    pub fn sizing(&self) -> SurfaceSizing {
        self.cell.sizing
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Pushes the backing size to the device viewport if it changed since the
    /// last call, and returns it.
    pub fn sync_viewport<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> SurfaceSize {
        let (size, generation) = self.cell.snapshot();
        if self.applied != Some(generation) {
            device.set_viewport(size.width, size.height);
            self.applied = Some(generation);
            tracing::debug!(width = size.width, height = size.height, "surface resized");
        }
        size
    }

    /// Stops listening for viewport changes. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.registration = None;
    }
}
