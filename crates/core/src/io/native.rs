//! Native GeoTIFF band-stack reading/writing
//!
//! Uses the `tiff` crate. Every page (IFD) of a file is read as one or more
//! bands; pages with several samples per pixel contribute one band per
//! sample. Output is written one `Gray32Float` page per band.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// Read every page of a GeoTIFF as the bands of one raster
pub fn read_band_stack<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let file = File::open(path.as_ref())?;
    decode_stack(BufReader::new(file))
}

/// Same as [`read_band_stack`] but from an in-memory buffer
pub fn read_band_stack_from_buffer(data: &[u8]) -> Result<Raster> {
    decode_stack(Cursor::new(data))
}

/// Read several files and stack their bands in the given order.
///
/// All files must share the same dimensions; the transform of the first
/// file is kept.
pub fn read_raster_bands<P: AsRef<Path>>(paths: &[P]) -> Result<Raster> {
    let mut bands = Vec::new();
    let mut transform = None;
    for path in paths {
        let stack = read_band_stack(path)?;
        transform.get_or_insert(*stack.transform());
        for b in 0..stack.bands() {
            bands.push(stack.band(b)?);
        }
    }
    let mut raster = Raster::from_bands(&bands)?;
    if let Some(t) = transform {
        raster.set_transform(t);
    }
    Ok(raster)
}

fn tiff_err(context: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{context}: {e}"))
}

fn decode_stack<R>(reader: R) -> Result<Raster>
where
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;
    let transform = read_geotransform(&mut decoder)?;

    let mut bands: Vec<Array2<f64>> = Vec::new();
    loop {
        let (width, height) = decoder
            .dimensions()
            .map_err(tiff_err("Cannot read dimensions"))?;
        let (rows, cols) = (height as usize, width as usize);
        let samples = decode_samples(decoder.read_image().map_err(tiff_err("Cannot read image data"))?)?;

        let pixels = rows * cols;
        if pixels == 0 || samples.len() % pixels != 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let per_pixel = samples.len() / pixels;
        for s in 0..per_pixel {
            bands.push(Array2::from_shape_fn((rows, cols), |(r, c)| {
                samples[(r * cols + c) * per_pixel + s]
            }));
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(tiff_err("Cannot advance to next page"))?;
    }

    let mut raster = Raster::from_bands(&bands)?;
    if let Some(t) = transform {
        raster.set_transform(t);
    }
    Ok(raster)
}

fn decode_samples(result: DecodingResult) -> Result<Vec<f64>> {
    Ok(match result {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    })
}

/// `None` when the file carries no pixel scale or tiepoint
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Option<GeoTransform>> {
    let scale = find_f64_tag(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = find_f64_tag(decoder, Tag::ModelTiepointTag)?;
    Ok(match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => GeoTransform::from_geotiff_tags(&scale, &tiepoint),
        _ => None,
    })
}

fn find_f64_tag<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<f64>>> {
    decoder
        .find_tag(tag)
        .and_then(|value| value.map(|v| v.into_f64_vec()).transpose())
        .map_err(tiff_err("Cannot read georeferencing tag"))
}

/// Write all bands of a raster as pages of one GeoTIFF file
pub fn write_band_stack<P: AsRef<Path>>(raster: &Raster, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_stack(raster, std::io::BufWriter::new(file))
}

/// Write all bands of a raster into an in-memory GeoTIFF
pub fn write_band_stack_to_buffer(raster: &Raster) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_stack(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_stack<W>(raster: &Raster, writer: W) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;
    let (rows, cols) = raster.shape();
    let gt = raster.transform();

    for b in 0..raster.bands() {
        let data: Vec<f32> = raster.band(b)?.iter().map(|&v| v as f32).collect();

        let mut image = encoder
            .new_image::<Gray32Float>(cols as u32, rows as u32)
            .map_err(tiff_err("Cannot create TIFF image"))?;

        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &gt.pixel_scale()[..])
            .map_err(tiff_err("Cannot write scale tag"))?;
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &gt.tiepoint()[..])
            .map_err(tiff_err("Cannot write tiepoint tag"))?;

        // GTModelTypeGeoKey = Projected, GTRasterTypeGeoKey = PixelIsArea
        let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
            .map_err(tiff_err("Cannot write geokey tag"))?;

        image
            .write_data(&data)
            .map_err(tiff_err("Cannot write image data"))?;
    }

    Ok(())
}
