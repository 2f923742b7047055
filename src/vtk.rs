use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer,
    Piece, UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

use crate::{function::VertexField, mesh::Mesh, Float, SimError};

/// A `.pvd` collection of time-tagged `.vtu` snapshots.
///
/// Snapshot `k` of `dir/name.pvd` is stored in `dir/nameNNNNNN.vtu`. The
/// collection file is rewritten after every snapshot so that it stays valid
/// if the run stops early.
#[derive(Debug)]
pub struct VtkFile {
    collection: PathBuf,
    directory: PathBuf,
    stem: String,
    datasets: Vec<(Float, String)>,
}

impl VtkFile {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let collection = path.as_ref().to_path_buf();
        let stem = collection
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SimError::invalid(
                    "output",
                    format!("`{}` has no usable file name", collection.display()),
                )
            })?
            .to_string();
        let directory = collection
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let file = Self {
            collection,
            directory,
            stem,
            datasets: Vec::new(),
        };
        file.write_collection()?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.collection
    }

    pub fn snapshots(&self) -> usize {
        self.datasets.len()
    }

    pub fn times(&self) -> impl Iterator<Item = Float> + '_ {
        self.datasets.iter().map(|(t, _)| *t)
    }

    /// Appends a snapshot of `field` at time `time`.
    pub fn write(&mut self, mesh: &Mesh, field: &VertexField, time: Float) -> Result<(), SimError> {
        if let Some(&(last, _)) = self.datasets.last() {
            if !(time > last) {
                return Err(SimError::invalid(
                    "time",
                    format!("snapshot at t = {time} does not follow t = {last}"),
                ));
            }
        }

        let name = format!("{}{:06}.vtu", self.stem, self.datasets.len());
        snapshot(mesh, field, &name)
            .export(self.directory.join(&name))
            .map_err(|e| SimError::Vtk(format!("{name}: {e:?}")))?;

        tracing::event!(
            tracing::Level::TRACE,
            "wrote {} ({}) at t = {}",
            name,
            field.name(),
            time
        );
        self.datasets.push((time, name));
        self.write_collection()
    }

    fn write_collection(&self) -> Result<(), SimError> {
        let mut output = BufWriter::new(File::create(&self.collection)?);
        writeln!(output, r#"<?xml version="1.0"?>"#)?;
        writeln!(output, r#"<VTKFile type="Collection" version="0.1">"#)?;
        writeln!(output, "  <Collection>")?;
        for (time, file) in &self.datasets {
            writeln!(
                output,
                r#"    <DataSet timestep="{time}" group="" part="0" file="{file}"/>"#
            )?;
        }
        writeln!(output, "  </Collection>")?;
        writeln!(output, "</VTKFile>")?;
        output.flush().map_err(SimError::from)
    }
}

// one unstructured-grid piece: the triangles with `field` attached to the vertices
fn snapshot(mesh: &Mesh, field: &VertexField, title: &str) -> Vtk {
    let points: Vec<Float> = mesh
        .vertices()
        .iter()
        .flat_map(|&[x, y]| [x, y, 0.0])
        .collect();
    let connectivity = mesh
        .cells()
        .iter()
        .flat_map(|&cell| cell.map(|v| v as u64))
        .collect();
    let offsets = (1..=mesh.num_cells() as u64).map(|c| 3 * c).collect();

    let elem = match field.components() {
        3 => ElementType::Vectors,
        num_comp => ElementType::Scalars {
            num_comp: num_comp as u32,
            lookup_table: None,
        },
    };

    let piece = UnstructuredGridPiece {
        points: IOBuffer::F64(points),
        cells: Cells {
            cell_verts: VertexNumbers::XML {
                connectivity,
                offsets,
            },
            types: vec![CellType::Triangle; mesh.num_cells()],
        },
        data: Attributes {
            point: vec![Attribute::DataArray(DataArray {
                name: field.name().to_string(),
                elem,
                data: IOBuffer::F64(field.values().to_vec()),
            })],
            cell: Vec::new(),
        },
    };

    Vtk {
        version: Version { major: 1, minor: 0 },
        title: title.to_string(),
        byte_order: if cfg!(target_endian = "little") {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        },
        file_path: None,
        data: DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        },
    }
}
