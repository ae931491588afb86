//! Morphing grid text files
//!
//! ```text
//! ScapeToad morphing grid file version 1.0
//! xsize: 64
//! ysize: 48
//! topleftx: 0.0
//! weres: 1000.0
//! rot1: 0
//! toplefty: 500000.0
//! rot2: 0
//! nsres: -1000.0
//! 0 0
//! 1.0032 0.0
//! ...
//! ```
//!
//! The first line is informational and accepted verbatim on read. Vertex
//! positions follow the header, `(xsize + 1) * (ysize + 1)` pairs in
//! row-major order. Numbers are written in shortest round-trip form.

use crate::error::{Error, Result};
use crate::morph::MorphGrid;
use crate::raster::GeoTransform;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// First line written to every morphing grid file
pub const MORPH_FILE_MAGIC: &str = "ScapeToad morphing grid file version 1.0";

const HEADER_KEYS: [&str; 8] = [
    "xsize", "ysize", "topleftx", "weres", "rot1", "toplefty", "rot2", "nsres",
];

/// Read a morphing grid file
pub fn read_morph_grid<P: AsRef<Path>>(path: P) -> Result<MorphGrid> {
    let file = File::open(path.as_ref())?;
    read_morph_grid_from_reader(BufReader::new(file))
}

/// Read a morphing grid from any buffered reader
pub fn read_morph_grid_from_reader<R: BufRead>(reader: R) -> Result<MorphGrid> {
    let mut lines = reader.lines();

    match lines.next() {
        Some(line) => {
            line?;
        }
        None => return Err(Error::format(1, "empty file")),
    }

    let mut values = [0.0f64; 8];
    let mut sizes = [0usize; 2];
    for (i, key) in HEADER_KEYS.iter().enumerate() {
        let line_no = i + 2;
        let line = lines
            .next()
            .ok_or_else(|| Error::format(line_no, format!("missing '{}' header", key)))??;

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::format(line_no, format!("expected '{}: <value>'", key)))?;
        if name.trim() != *key {
            return Err(Error::format(
                line_no,
                format!("expected header '{}', found '{}'", key, name.trim()),
            ));
        }

        let value = value.trim();
        if i < 2 {
            let size: i64 = value.parse().map_err(|_| {
                Error::format(line_no, format!("'{}' is not an integer: '{}'", key, value))
            })?;
            if size <= 0 {
                return Err(Error::format(
                    line_no,
                    format!("'{}' must be positive, got {}", key, size),
                ));
            }
            sizes[i] = size as usize;
        } else {
            values[i] = value.parse().map_err(|_| {
                Error::format(line_no, format!("'{}' is not a number: '{}'", key, value))
            })?;
        }
    }

    let [xsize, ysize] = sizes;
    let transform = GeoTransform::from_coefficients([
        values[2], values[3], values[4], values[5], values[6], values[7],
    ]);

    // Capacity grows from the body; the header alone is not trusted
    let expected = xsize
        .checked_add(1)
        .zip(ysize.checked_add(1))
        .and_then(|(w, h)| w.checked_mul(h))
        .and_then(|n| n.checked_mul(2))
        .ok_or_else(|| Error::format(3, format!("grid size {} x {} is too large", xsize, ysize)))?;
    let mut coords = Vec::new();
    let mut last_line = HEADER_KEYS.len() + 1;
    for (offset, line) in lines.enumerate() {
        let line = line?;
        let line_no = HEADER_KEYS.len() + 2 + offset;
        for token in line.split_whitespace() {
            if coords.len() == expected {
                return Err(Error::format(
                    line_no,
                    format!("more than {} coordinate values", expected),
                ));
            }
            let v: f64 = token.parse().map_err(|_| {
                Error::format(line_no, format!("invalid coordinate value '{}'", token))
            })?;
            coords.push(v);
        }
        last_line = line_no;
    }

    if coords.len() < expected {
        return Err(Error::format(
            last_line,
            format!(
                "expected {} coordinate values, found {}",
                expected,
                coords.len()
            ),
        ));
    }

    let shape = (ysize + 1, xsize + 1);
    let x = Array2::from_shape_fn(shape, |(iy, ix)| coords[2 * (iy * (xsize + 1) + ix)]);
    let y = Array2::from_shape_fn(shape, |(iy, ix)| coords[2 * (iy * (xsize + 1) + ix) + 1]);

    MorphGrid::from_arrays(xsize, ysize, transform, x, y)
}

/// Write a morphing grid file
pub fn write_morph_grid<P: AsRef<Path>>(grid: &MorphGrid, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_morph_grid_to_writer(grid, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a morphing grid to any writer
pub fn write_morph_grid_to_writer<W: Write>(grid: &MorphGrid, writer: &mut W) -> Result<()> {
    let [topleftx, weres, rot1, toplefty, rot2, nsres] = grid.transform().coefficients();

    writeln!(writer, "{}", MORPH_FILE_MAGIC)?;
    writeln!(writer, "xsize: {}", grid.xsize())?;
    writeln!(writer, "ysize: {}", grid.ysize())?;
    writeln!(writer, "topleftx: {}", topleftx)?;
    writeln!(writer, "weres: {}", weres)?;
    writeln!(writer, "rot1: {}", rot1)?;
    writeln!(writer, "toplefty: {}", toplefty)?;
    writeln!(writer, "rot2: {}", rot2)?;
    writeln!(writer, "nsres: {}", nsres)?;

    for (x, y) in grid.x().iter().zip(grid.y().iter()) {
        writeln!(writer, "{} {}", x, y)?;
    }
    Ok(())
}

/// Parse a morphing grid held in memory
pub fn read_morph_grid_from_str(text: &str) -> Result<MorphGrid> {
    read_morph_grid_from_reader(text.as_bytes())
}

/// Read a morphing grid from an unbuffered reader
pub fn read_morph_grid_from<R: Read>(reader: R) -> Result<MorphGrid> {
    read_morph_grid_from_reader(BufReader::new(reader))
}
