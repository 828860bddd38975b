//! Binary grid snapshots.
//!
//! Fixed little-endian layout, all integer fields four bytes wide:
//!
//! ```text
//! Header (12 bytes):
//!   Width: u32
//!   Height: u32
//!   Orientation count: u32
//!
//! Cells (width * height * 12 bytes):
//!   Type: u32
//!   State: u32
//!   Orientation index: u32
//!
//! Orientations (count * 12 bytes):
//!   X direction: f32
//!   Y direction: f32
//!   Cell count: u32
//! ```
//!
//! Decoding is all-or-nothing: any structural problem leaves the caller's
//! grid untouched. Older dumps without the orientation count and trailer
//! fail the length check and are rejected. The per-orientation cell counts
//! are rebuilt from the cell data after decoding rather than trusted.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;

use crate::schema::{Cell, CellType, Grid, Orientation};

/// Width of every integer field in the format.
const FIELD: usize = 4;
/// Bytes per serialised cell record.
const CELL_RECORD: usize = 3 * FIELD;
/// Bytes per serialised orientation record.
const ORIENTATION_RECORD: usize = 3 * FIELD;

/// Decoding and file-level failures.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("Snapshot has {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("Snapshot declares a zero-sized grid or empty orientation table")]
    ZeroDimension,
    #[error("Unknown cell type {value} at cell {cell}")]
    UnknownCellType { cell: usize, value: u32 },
    #[error("Cell {cell} references orientation {orientation}, table has {count}")]
    OrientationOutOfRange {
        cell: usize,
        orientation: u32,
        count: u32,
    },
}

/// Exact byte length of a grid's serialised form.
pub fn serialized_len(grid: &Grid) -> usize {
    3 * FIELD + grid.len() * CELL_RECORD + grid.num_orientations() * ORIENTATION_RECORD
}

/// Serialise a grid into the binary layout.
pub fn serialize(grid: &Grid) -> Vec<u8> {
    let mut out = Vec::with_capacity(serialized_len(grid));
    out.extend_from_slice(&(grid.width() as u32).to_le_bytes());
    out.extend_from_slice(&(grid.height() as u32).to_le_bytes());
    out.extend_from_slice(&(grid.num_orientations() as u32).to_le_bytes());

    for cell in &grid.cells {
        out.extend_from_slice(&(cell.cell_type as u32).to_le_bytes());
        out.extend_from_slice(&cell.state.to_le_bytes());
        out.extend_from_slice(&cell.orientation.to_le_bytes());
    }
    for orientation in &grid.orientations {
        out.extend_from_slice(&orientation.x_dir.to_le_bytes());
        out.extend_from_slice(&orientation.y_dir.to_le_bytes());
        out.extend_from_slice(&orientation.cell_count.to_le_bytes());
    }
    out
}

/// Decode a grid from the binary layout.
pub fn deserialize(bytes: &[u8]) -> Result<Grid, SnapshotError> {
    let mut cursor = Reader::new(bytes);

    let width = cursor.read_u32()? as usize;
    let height = cursor.read_u32()? as usize;
    let num_orientations = cursor.read_u32()?;
    if width == 0 || height == 0 || num_orientations == 0 {
        return Err(SnapshotError::ZeroDimension);
    }

    // Widened so an adversarial header cannot overflow the length check.
    let expected = (3 * FIELD) as u64
        + width as u64 * height as u64 * CELL_RECORD as u64
        + num_orientations as u64 * ORIENTATION_RECORD as u64;
    if (bytes.len() as u64) < expected {
        return Err(SnapshotError::Truncated {
            expected: expected as usize,
            actual: bytes.len(),
        });
    }
    let expected = expected as usize;
    if bytes.len() > expected {
        return Err(SnapshotError::TrailingBytes(bytes.len() - expected));
    }

    let mut cells = Vec::with_capacity(width * height);
    for i in 0..width * height {
        let type_value = cursor.read_u32()?;
        let state = cursor.read_u32()?;
        let orientation = cursor.read_u32()?;

        let cell_type = CellType::from_u32(type_value).ok_or(SnapshotError::UnknownCellType {
            cell: i,
            value: type_value,
        })?;
        if orientation >= num_orientations {
            return Err(SnapshotError::OrientationOutOfRange {
                cell: i,
                orientation,
                count: num_orientations,
            });
        }
        cells.push(Cell {
            cell_type,
            state,
            orientation,
        });
    }

    let mut orientations = Vec::with_capacity(num_orientations as usize);
    for _ in 0..num_orientations {
        let x_dir = cursor.read_f32()?;
        let y_dir = cursor.read_f32()?;
        let cell_count = cursor.read_u32()?;
        orientations.push(Orientation {
            x_dir,
            y_dir,
            cell_count,
        });
    }

    let mut grid = Grid::from_parts(width, height, cells, orientations);
    grid.rebuild_orientation_counts();
    Ok(grid)
}

/// Write a grid snapshot to a file.
pub fn save<P: AsRef<Path>>(grid: &Grid, path: P) -> Result<(), SnapshotError> {
    let bytes = serialize(grid);
    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    debug!(
        "saved {} byte snapshot to {}",
        bytes.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Read a grid snapshot from a file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Grid, SnapshotError> {
    let bytes = std::fs::read(&path)?;
    debug!(
        "loading {} byte snapshot from {}",
        bytes.len(),
        path.as_ref().display()
    );
    deserialize(&bytes)
}

/// Bounds-checked little-endian field reader.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self) -> Result<[u8; FIELD], SnapshotError> {
        let end = self.offset + FIELD;
        if end > self.bytes.len() {
            return Err(SnapshotError::Truncated {
                expected: end,
                actual: self.bytes.len(),
            });
        }
        let mut field = [0u8; FIELD];
        field.copy_from_slice(&self.bytes[self.offset..end]);
        self.offset = end;
        Ok(field)
    }

    fn read_u32(&mut self) -> Result<u32, SnapshotError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn read_f32(&mut self) -> Result<f32, SnapshotError> {
        Ok(f32::from_le_bytes(self.take()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_grid() -> Grid {
        let mut grid = Grid::with_orientations(
            6,
            4,
            vec![
                Orientation::new(1.0, 0.0),
                Orientation::new(0.0, -1.0),
                Orientation::new(0.7, 0.7),
            ],
        );
        for (i, cell) in grid.cells.iter_mut().enumerate() {
            cell.orientation = (i % 3) as u32;
            cell.state = (i % 9) as u32;
            cell.cell_type = match i % 5 {
                0 => CellType::Pacemaker,
                1 | 2 => CellType::Tissue,
                _ => CellType::RestingTissue,
            };
        }
        grid.rebuild_orientation_counts();
        grid
    }

    #[test]
    fn test_roundtrip_identity() {
        let grid = mixed_grid();
        let restored = deserialize(&serialize(&grid)).unwrap();
        assert_eq!(grid, restored);
    }

    #[test]
    fn test_layout_is_little_endian() {
        let grid = Grid::uniform(2, 1);
        let bytes = serialize(&grid);
        assert_eq!(serialized_len(&grid), bytes.len());
        // Header fields.
        assert_eq!(&bytes[0..4], &[2, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[1, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0]);
        // First cell: Tissue (1), state 0, orientation 0.
        assert_eq!(&bytes[12..16], &[1, 0, 0, 0]);
        assert_eq!(&bytes[16..20], &[0, 0, 0, 0]);
        // Orientation trailer: x_dir 1.0f32.
        let trailer = 12 + 2 * CELL_RECORD;
        assert_eq!(&bytes[trailer..trailer + 4], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_rejects_truncated() {
        let bytes = serialize(&mixed_grid());
        let err = deserialize(&bytes[..bytes.len() - 5]).unwrap_err();
        assert!(matches!(err, SnapshotError::Truncated { .. }));
    }

    #[test]
    fn test_rejects_short_header() {
        assert!(matches!(
            deserialize(&[0u8; 7]),
            Err(SnapshotError::Truncated { .. })
        ));
    }

    #[test]
    fn test_rejects_legacy_dump_without_orientation_trailer() {
        // The legacy variant stops after the cell records; the declared
        // sizes no longer match the payload.
        let grid = mixed_grid();
        let full = serialize(&grid);
        let legacy_len = full.len() - grid.num_orientations() * ORIENTATION_RECORD;
        assert!(deserialize(&full[..legacy_len]).is_err());
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = serialize(&mixed_grid());
        bytes.push(0);
        assert!(matches!(
            deserialize(&bytes),
            Err(SnapshotError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_rejects_unknown_cell_type() {
        let mut bytes = serialize(&Grid::uniform(2, 2));
        bytes[12] = 9;
        assert!(matches!(
            deserialize(&bytes),
            Err(SnapshotError::UnknownCellType { cell: 0, value: 9 })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_orientation() {
        let mut bytes = serialize(&Grid::uniform(2, 2));
        // First cell's orientation index field.
        bytes[20] = 4;
        assert!(matches!(
            deserialize(&bytes),
            Err(SnapshotError::OrientationOutOfRange { cell: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let mut bytes = serialize(&Grid::uniform(2, 2));
        bytes[0..4].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            deserialize(&bytes),
            Err(SnapshotError::ZeroDimension)
        ));
    }

    #[test]
    fn test_counts_rebuilt_from_cells() {
        // Stored counts are ignored in favour of a recount.
        let grid = mixed_grid();
        let mut bytes = serialize(&grid);
        let count_offset = bytes.len() - 4;
        bytes[count_offset..].copy_from_slice(&999u32.to_le_bytes());

        let restored = deserialize(&bytes).unwrap();
        assert_eq!(
            restored.orientations[2].cell_count,
            grid.orientations[2].cell_count
        );
    }

    #[test]
    fn test_file_roundtrip() {
        let grid = mixed_grid();
        let path =
            std::env::temp_dir().join(format!("myocard-snapshot-{}.bin", std::process::id()));
        save(&grid, &path).unwrap();
        let restored = load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(grid, restored);
    }
}
