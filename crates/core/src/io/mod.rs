//! I/O operations for reading and writing rasters, vector layers and morphing grids

mod geojson_io;
mod geotiff;
mod morph_file;

pub use geojson_io::{read_geojson, read_geojson_from_str, write_geojson, write_geojson_to_writer};
pub use geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
pub use morph_file::{
    read_morph_grid, read_morph_grid_from, read_morph_grid_from_reader, read_morph_grid_from_str,
    write_morph_grid, write_morph_grid_to_writer, MORPH_FILE_MAGIC,
};
