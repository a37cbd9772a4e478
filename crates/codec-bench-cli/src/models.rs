//! Built-in models the CLI can register.
//!
//! | Name            | Kind        | Round trip                           |
//! |-----------------|-------------|--------------------------------------|
//! | `raw`           | auto-saving | Shape header + little-endian samples |
//! | `png`           | encoder     | PNG, default deflate level           |
//! | `png-fast`      | auto-saving | PNG streamed straight into the slot  |
//! | `png-quantized` | encoder     | PNG of the samples with the LSB cleared (lossy) |

use std::io::{BufRead, Cursor, Seek, Write};

use codec_bench::{Error, Harness, ModelSpec, RawImage, Result, SampleKind, Samples};

/// Names accepted by [`register`].
pub const MODEL_NAMES: &[&str] = &["raw", "png", "png-fast", "png-quantized"];

/// Register the built-in model `name` on `harness`.
pub fn register(harness: &mut Harness, name: &str) -> Result<()> {
    let accepted = match name {
        "raw" => harness.set_model(name, raw()),
        "png" => harness.set_model(name, png_encoded(None)),
        "png-fast" => harness.set_model(name, png_fast()),
        "png-quantized" => harness.set_model(name, png_quantized()),
        _ => return Err(Error::UnknownModel(name.to_string())),
    };
    if !accepted {
        return Err(Error::codec(name, "incomplete model hooks"));
    }
    tracing::debug!(model = name, "registered");
    Ok(())
}

/// Uncompressed dump: a 13-byte shape header followed by the samples.
pub fn raw() -> ModelSpec<RawImage> {
    ModelSpec::new()
        .identity_preprocess()
        .auto_save(|img: &RawImage, slot| {
            let mut w = slot.writer()?;
            w.write_all(&raw_header(img))?;
            w.write_all(&img.to_le_bytes())?;
            w.flush()?;
            Ok(())
        })
        .restore(|slot| parse_raw(&slot.read()?))
}

fn kind_tag(kind: SampleKind) -> u8 {
    match kind {
        SampleKind::U8 => 0,
        SampleKind::U16 => 1,
        SampleKind::U32 => 2,
        SampleKind::F32 => 3,
        SampleKind::F64 => 4,
    }
}

fn raw_header(img: &RawImage) -> Vec<u8> {
    let mut header = Vec::with_capacity(13);
    for dim in [img.height(), img.width(), img.channels()] {
        header.extend_from_slice(&(dim as u32).to_le_bytes());
    }
    header.push(kind_tag(img.sample_kind()));
    header
}

fn parse_raw(bytes: &[u8]) -> Result<RawImage> {
    if bytes.len() < 13 {
        return Err(Error::codec("raw", "truncated header"));
    }
    let dim = |i: usize| {
        let b = &bytes[i * 4..i * 4 + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize
    };
    let kind = match bytes[12] {
        0 => SampleKind::U8,
        1 => SampleKind::U16,
        2 => SampleKind::U32,
        3 => SampleKind::F32,
        4 => SampleKind::F64,
        other => return Err(Error::codec("raw", format!("unknown sample kind {other}"))),
    };
    RawImage::from_le_bytes(dim(0), dim(1), dim(2), kind, &bytes[13..])
}

/// PNG with a separate encoder hook; the encoded buffer is persisted verbatim.
pub fn png_encoded(compression: Option<png::Compression>) -> ModelSpec<RawImage, Vec<u8>> {
    ModelSpec::new()
        .identity_preprocess()
        .encoder(move |img: &RawImage| {
            let mut buf = Vec::new();
            encode_png(&mut buf, img, compression)?;
            Ok(buf)
        })
        .persist_encoded(|bytes: &Vec<u8>, slot| slot.write(bytes))
        .restore(|slot| decode_png(Cursor::new(slot.read()?)))
}

/// PNG at the fast deflate level, encoded directly into the scratch slot.
pub fn png_fast() -> ModelSpec<RawImage> {
    ModelSpec::new()
        .identity_preprocess()
        .auto_save(|img: &RawImage, slot| {
            let mut w = slot.writer()?;
            encode_png(&mut w, img, Some(png::Compression::Fast))?;
            w.flush()?;
            Ok(())
        })
        .restore(|slot| decode_png(Cursor::new(slot.read()?)))
}

/// PNG of the image with every sample's least significant bit cleared.
///
/// Restores a different image than it was given, so runs with it are flagged lossy.
pub fn png_quantized() -> ModelSpec<RawImage, Vec<u8>> {
    png_encoded(None).encoder(|img: &RawImage| {
        let mut quantized = img.clone();
        match quantized.samples_mut() {
            Samples::U8(v) => v.iter_mut().for_each(|s| *s &= !1),
            Samples::U16(v) => v.iter_mut().for_each(|s| *s &= !1),
            _ => return Err(Error::codec("png-quantized", "only 8 and 16 bit images")),
        }
        let mut buf = Vec::new();
        encode_png(&mut buf, &quantized, None)?;
        Ok(buf)
    })
}

fn color_type(channels: usize) -> Result<png::ColorType> {
    Ok(match channels {
        1 => png::ColorType::Grayscale,
        2 => png::ColorType::GrayscaleAlpha,
        3 => png::ColorType::Rgb,
        4 => png::ColorType::Rgba,
        n => return Err(Error::codec("png", format!("unsupported channel count {n}"))),
    })
}

/// Encode an 8 or 16 bit image with 1 to 4 channels as PNG into `w`.
pub fn encode_png<W: Write>(
    w: W,
    img: &RawImage,
    compression: Option<png::Compression>,
) -> Result<()> {
    let (depth, data) = match img.samples() {
        Samples::U8(v) => (png::BitDepth::Eight, v.clone()),
        Samples::U16(v) => (
            png::BitDepth::Sixteen,
            v.iter().flat_map(|s| s.to_be_bytes()).collect(),
        ),
        other => {
            return Err(Error::codec(
                "png",
                format!("unsupported sample type {:?}", other.kind()),
            ));
        }
    };

    let mut encoder = png::Encoder::new(w, img.width() as u32, img.height() as u32);
    encoder.set_color(color_type(img.channels())?);
    encoder.set_depth(depth);
    if let Some(compression) = compression {
        encoder.set_compression(compression);
    }

    let mut writer = encoder
        .write_header()
        .map_err(|e| Error::codec("png", e))?;
    writer
        .write_image_data(&data)
        .map_err(|e| Error::codec("png", e))?;
    writer.finish().map_err(|e| Error::codec("png", e))?;
    Ok(())
}

/// Decode a PNG into a raw image, keeping its channel count and bit depth.
pub fn decode_png<R: BufRead + Seek>(reader: R) -> Result<RawImage> {
    let mut decoder = png::Decoder::new(reader);
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder
        .read_info()
        .map_err(|e| Error::codec("png", e))?;

    let buf_size = reader
        .output_buffer_size()
        .ok_or_else(|| Error::codec("png", "output buffer size unavailable"))?;
    let mut buf = vec![0u8; buf_size];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| Error::codec("png", e))?;
    buf.truncate(frame.buffer_size());

    let width = frame.width as usize;
    let height = frame.height as usize;
    let channels = frame.color_type.samples();

    match frame.bit_depth {
        png::BitDepth::Eight => RawImage::from_u8(height, width, channels, buf),
        png::BitDepth::Sixteen => {
            let samples = buf
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            RawImage::from_u16(height, width, channels, samples)
        }
        other => Err(Error::codec(
            "png",
            format!("unsupported bit depth {other:?} after expansion"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec_bench::{BenchConfig, PrimaryAction, VecDataset};

    fn gradient() -> RawImage {
        let data = (0..4 * 3 * 3).map(|i| (i * 7) as u8).collect();
        RawImage::from_u8(4, 3, 3, data).unwrap()
    }

    fn harness(dir: &tempfile::TempDir, images: Vec<RawImage>) -> Harness {
        let config = BenchConfig::builder().scratch_dir(dir.path()).build();
        Harness::new(&VecDataset::new(images), config).unwrap()
    }

    #[test]
    fn test_png_round_trip_keeps_shape() {
        let img = gradient();
        let mut buf = Vec::new();
        encode_png(&mut buf, &img, None).unwrap();
        assert_eq!(decode_png(Cursor::new(buf)).unwrap(), img);
    }

    #[test]
    fn test_png_round_trip_sixteen_bit() {
        let img = RawImage::from_u16(2, 2, 1, vec![0, 1, 256, 65535]).unwrap();
        let mut buf = Vec::new();
        encode_png(&mut buf, &img, Some(png::Compression::Fast)).unwrap();
        assert_eq!(decode_png(Cursor::new(buf)).unwrap(), img);
    }

    #[test]
    fn test_png_rejects_float_samples() {
        let img = RawImage::new(1, 1, 1, Samples::F32(vec![0.5])).unwrap();
        assert!(encode_png(Vec::new(), &img, None).is_err());
    }

    #[test]
    fn test_raw_header_round_trip() {
        let img = RawImage::from_u16(2, 3, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let mut bytes = raw_header(&img);
        bytes.extend_from_slice(&img.to_le_bytes());
        assert_eq!(parse_raw(&bytes).unwrap(), img);
        assert!(parse_raw(&bytes[..5]).is_err());
    }

    #[test]
    fn test_raw_huge_header_is_an_error() {
        let mut bytes = Vec::new();
        for _ in 0..3 {
            bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        }
        bytes.push(0);
        bytes.extend_from_slice(&[1, 2, 3, 4]);

        let err = parse_raw(&bytes).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { actual: 4, .. }));
    }

    #[test]
    fn test_register_known_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir, vec![gradient()]);
        for name in MODEL_NAMES {
            register(&mut harness, name).unwrap();
        }
        assert_eq!(harness.get_model("raw"), Some(PrimaryAction::Persist));
        assert_eq!(harness.get_model("png"), Some(PrimaryAction::Encoder));
        assert_eq!(harness.get_model("png-fast"), Some(PrimaryAction::Persist));

        let err = register(&mut harness, "jpeg").unwrap_err();
        assert!(matches!(err, Error::UnknownModel(ref n) if n == "jpeg"));
    }

    #[test]
    fn test_builtin_models_benchmark() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir, vec![gradient(), gradient()]);
        for name in MODEL_NAMES {
            register(&mut harness, name).unwrap();
        }

        let report = harness.run(2).unwrap();

        // 36 samples plus a 13-byte header.
        let raw = report.model("raw").unwrap();
        assert_eq!(raw.bpsp, vec![49.0 * 8.0 / 36.0; 2]);
        assert_eq!(raw.mismatches, 0);
        assert_eq!(report.model("png").unwrap().mismatches, 0);
        assert_eq!(report.model("png-fast").unwrap().mismatches, 0);
        assert_eq!(report.model("png-quantized").unwrap().mismatches, 2);

        assert!(report.lossy);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].model, "png-quantized");
    }
}
