use crate::gpu::{BufferId, GraphicsDevice};

/// Fullscreen quad corners in clip space, ordered for a triangle strip.
pub const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Vertices drawn per frame.
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Device-resident copy of [`QUAD_VERTICES`].
#[derive(Debug)]
pub struct QuadGeometry {
    buffer: BufferId,
}

impl QuadGeometry {
    pub fn upload<D: GraphicsDevice + ?Sized>(device: &mut D) -> Result<Self, String> {
        let buffer = device.create_vertex_buffer(&QUAD_VERTICES)?;
        Ok(Self { buffer })
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn vertex_count(&self) -> u32 {
        QUAD_VERTEX_COUNT
    }

    pub fn release<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_buffer(self.buffer);
    }
}
