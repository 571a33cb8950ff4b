use super::UniformValue;

/// CPU copy of a program's std140 uniform block.
///
/// Writes land at reflected member offsets; the whole block is flushed to the
/// GPU buffer before the next draw when anything changed.
#[derive(Debug, Clone)]
pub(crate) struct UniformStaging {
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformStaging {
    /// Allocates a zeroed block, rounded up to a 16-byte multiple.
    pub fn new(size: u32) -> Self {
        let padded = (size.max(16) as usize + 15) & !15;
        Self {
            bytes: vec![0; padded],
            dirty: true,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Copies `value` to `offset`. Returns false if it would overrun the block.
    pub fn write(&mut self, offset: u32, value: UniformValue) -> bool {
        let data: &[u8] = bytemuck::cast_slice(value.as_floats());
        let start = offset as usize;
        let Some(slot) = self.bytes.get_mut(start..start + data.len()) else {
            return false;
        };
        if *slot != *data {
            slot.copy_from_slice(data);
            self.dirty = true;
        }
        true
    }

    /// Returns the block if it changed since the last call.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if std::mem::take(&mut self.dirty) {
            Some(&self.bytes)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_rounds_to_std140_alignment() {
        assert_eq!(UniformStaging::new(60).len(), 64);
        assert_eq!(UniformStaging::new(0).len(), 16);
        assert_eq!(UniformStaging::new(64).len(), 64);
    }

    #[test]
    fn writes_land_at_offsets() {
        let mut staging = UniformStaging::new(64);
        assert!(staging.write(16, UniformValue::Vec3([1.0, 2.0, 3.0])));
        let bytes = staging.take_dirty().expect("dirty after write");
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(&floats[4..7], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn unchanged_values_do_not_dirty() {
        let mut staging = UniformStaging::new(16);
        staging.write(0, UniformValue::Float(1.0));
        assert!(staging.take_dirty().is_some());
        staging.write(0, UniformValue::Float(1.0));
        assert!(staging.take_dirty().is_none());
    }

    #[test]
    fn overrun_is_rejected() {
        let mut staging = UniformStaging::new(16);
        assert!(!staging.write(12, UniformValue::Vec2([1.0, 1.0])));
        assert!(!staging.write(u32::MAX - 2, UniformValue::Float(1.0)));
    }
}
